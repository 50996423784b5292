//! Component F: the Injection Loader. Runs exactly once per process, reads
//! the environment contract, and builds the read-only state every other
//! component consumes thereafter.

use std::env;
use std::path::PathBuf;
use std::sync::OnceLock;

use remapper_schema::{Mapping, MappingTable};

use crate::cache::CacheContext;
use crate::error::LoaderError;
use crate::util;

/// The process-wide, read-only state populated by [`init`]. `None` means
/// the interposer is inert (a required variable was absent or malformed) —
/// every interposed call must fall back to pass-through in that case.
#[derive(Debug)]
pub struct Runtime {
    /// The parsed mapping table driving Component A.
    pub mappings: MappingTable,
    /// The hardened-binary cache context driving Components D and E.
    pub cache: CacheContext,
}

static RUNTIME: OnceLock<Option<Runtime>> = OnceLock::new();

/// Initialize (on first call) and return the process-wide runtime state.
/// Safe to call from every interposed entry point; after the first call
/// this is a plain load with no re-parsing.
pub fn init() -> &'static Option<Runtime> {
    RUNTIME.get_or_init(|| {
        init_logging();
        match build_runtime() {
            Ok(runtime) => Some(runtime),
            Err(error) => {
                tracing::debug!(%error, "remapper inert: configuration error");
                None
            }
        }
    })
}

fn build_runtime() -> Result<Runtime, LoaderError> {
    let target = env::var("TARGET").map_err(|_| LoaderError::MissingTarget)?;
    let mappings_str = env::var("MAPPINGS").map_err(|_| LoaderError::MissingMappings)?;
    let mappings = parse_mappings(&mappings_str);
    let table = MappingTable::new(target, mappings);
    if table.target_overlaps_a_mapping() {
        tracing::warn!(target = %table.target(), "target directory overlaps a configured mapping's parent");
    }

    let config_dir = env::var_os("CONFIG").map(PathBuf::from).unwrap_or_else(util::default_config_dir);
    let cache_dir = env::var_os("CACHE")
        .map(PathBuf::from)
        .unwrap_or_else(|| config_dir.join("cache"));
    let cache = CacheContext::new(config_dir, cache_dir)?;

    Ok(Runtime { mappings: table, cache })
}

fn parse_mappings(raw: &str) -> Vec<Mapping> {
    raw.split(':')
        .filter_map(|entry| {
            let entry = entry.trim();
            if entry.is_empty() {
                return None;
            }
            match Mapping::parse(entry) {
                Ok(mapping) => Some(mapping),
                Err(error) => {
                    tracing::debug!(entry, %error, "dropping malformed mapping entry");
                    None
                }
            }
        })
        .collect()
}

fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    // DEBUG_LOG unset means silent: no subscriber is installed at all, not
    // a stderr default, so an unconfigured process emits nothing.
    let Ok(path) = env::var("DEBUG_LOG") else {
        return;
    };

    let opened = std::fs::OpenOptions::new().create(true).append(true).open(&path);
    match opened {
        Ok(file) => {
            let (writer, guard) = tracing_appender::non_blocking(file);
            // The guard must outlive the subscriber, which in this process
            // means forever: the Injection Loader never tears state down.
            std::mem::forget(guard);
            let _ = fmt().with_writer(writer).with_env_filter(EnvFilter::from_default_env()).try_init();
        }
        // DEBUG_LOG set but unopenable: fall back to standard error.
        Err(_) => {
            let _ = fmt().with_env_filter(EnvFilter::from_default_env()).try_init();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_mappings_skips_malformed_and_empty_entries() {
        let mappings = parse_mappings("/h/.dummy*::onlyslash:/h/.other*");
        assert_eq!(mappings.len(), 2);
    }
}
