//! CLI-local error type. Every other crate in the workspace uses `thiserror`
//! for its own typed errors; `anyhow` is reserved for the kind of ad hoc
//! error composition this CLI's single-pass flow never needs.

use std::path::PathBuf;

/// Everything that can send the CLI to a non-zero exit before (or instead
/// of) execing the target program.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// An argument starting with `-` that isn't `--debug-log` or `--`.
    #[error("unknown option: {0}")]
    UnknownOption(String),
    /// `--debug-log` given with no following value.
    #[error("--debug-log requires a value")]
    MissingDebugLogValue,
    /// Fewer than `<target-dir> <mapping> <program>` tokens were given.
    #[error("not enough arguments")]
    NotEnoughArguments,
    /// The mapping list between `<target-dir>` and `--` was empty.
    #[error("no mappings specified")]
    NoMappings,
    /// Nothing followed `--`, or followed the single implicit mapping.
    #[error("no command specified")]
    NoCommand,
    /// `std::env::current_dir` failed while making a relative path absolute.
    #[error("cannot determine current directory: {0}")]
    Cwd(#[source] std::io::Error),
    /// No interposer library sits next to this executable.
    #[error("cannot find interpose library at {0}")]
    MissingInterposer(PathBuf),
    /// `std::env::current_exe` failed while locating the interposer library.
    #[error("cannot determine the path of the running executable: {0}")]
    ExePath(#[source] std::io::Error),
    /// The hardened-binary cache context failed to initialize.
    #[error(transparent)]
    Cache(#[from] remapper_core::CacheError),
    /// The final `exec` of the target program failed.
    #[error("exec of {0:?} failed: {1}")]
    Exec(PathBuf, #[source] std::io::Error),
}
