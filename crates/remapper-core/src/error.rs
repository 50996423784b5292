//! Per-component error types.
//!
//! None of these are fatal to the host process: every call site that
//! produces one logs it and falls back to pass-through behavior. They exist
//! so that fallback decision is made by the caller, not buried in a bare
//! `bool`.

/// Failures while filling or reading the hardened-binary cache.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Any filesystem operation (copy, mkdir, rename) failed.
    #[error("cache i/o error: {0}")]
    Io(#[from] std::io::Error),
    /// The signing tool exited with a non-zero status.
    #[error("signer exited with a failure status")]
    SignerFailed,
    /// The sidecar metadata failed to parse.
    #[error("cache metadata error: {0}")]
    Meta(#[from] remapper_schema::CacheMetaError),
}

/// Failures in the Injection Loader's one-time environment parse.
/// Every variant here means the interposer becomes inert, not that the
/// host process is affected.
#[derive(Debug, thiserror::Error)]
pub enum LoaderError {
    /// `TARGET` was not set.
    #[error("TARGET environment variable not set")]
    MissingTarget,
    /// `MAPPINGS` was not set.
    #[error("MAPPINGS environment variable not set")]
    MissingMappings,
    /// The hardened-binary cache context could not be initialized.
    #[error("failed to initialize hardened-binary cache: {0}")]
    Cache(#[from] CacheError),
}
