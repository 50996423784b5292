//! Path helpers: tilde expansion, absolute-ification, config/cache
//! directory resolution, and locating the injected library next to this
//! executable.

use std::path::{Path, PathBuf};

use crate::error::CliError;

/// Expand a leading `~` or `~/` to `$HOME`. `~user` forms are left
/// untouched, matching the original CLI (it does not support them either).
#[must_use]
pub fn expand_tilde(path: &str) -> String {
    if path == "~" {
        if let Some(home) = remapper_core::util::home_dir() {
            return home.to_string_lossy().into_owned();
        }
        return path.to_string();
    }
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = remapper_core::util::home_dir() {
            let mut joined = home;
            joined.push(rest);
            return joined.to_string_lossy().into_owned();
        }
    }
    path.to_string()
}

/// Expand `~` and make the result absolute against the current directory,
/// if it wasn't already.
pub fn make_absolute(path: &str) -> Result<PathBuf, CliError> {
    let expanded = PathBuf::from(expand_tilde(path));
    if expanded.is_absolute() {
        return Ok(expanded);
    }
    let cwd = std::env::current_dir().map_err(CliError::Cwd)?;
    Ok(cwd.join(expanded))
}

/// Resolve `CONFIG`, honoring an env override the same way the injected
/// library's Injection Loader does, so both land on the same directory.
pub fn resolve_config_dir() -> Result<PathBuf, CliError> {
    match std::env::var_os("CONFIG") {
        Some(raw) => make_absolute(&raw.to_string_lossy()),
        None => Ok(remapper_core::util::default_config_dir()),
    }
}

/// Resolve `CACHE`, defaulting to `<config_dir>/cache`.
pub fn resolve_cache_dir(config_dir: &Path) -> Result<PathBuf, CliError> {
    match std::env::var_os("CACHE") {
        Some(raw) => make_absolute(&raw.to_string_lossy()),
        None => Ok(config_dir.join("cache")),
    }
}

/// The interposer library's expected file name on this host: Linux's
/// `LD_PRELOAD` and macOS's `DYLD_INSERT_LIBRARIES` both want the shared
/// object itself, named the way `cargo build`'s `cdylib` output names it.
#[must_use]
pub fn interpose_file_name() -> &'static str {
    if cfg!(target_os = "macos") {
        "libremapper_interpose.dylib"
    } else {
        "libremapper_interpose.so"
    }
}

/// The environment variable the dynamic linker consults to inject a
/// library into a freshly exec'd process.
#[must_use]
pub fn inject_env_var() -> &'static str {
    if cfg!(target_os = "macos") {
        "DYLD_INSERT_LIBRARIES"
    } else {
        "LD_PRELOAD"
    }
}

/// Locate the interposer library next to this binary — the same
/// sibling-of-executable convention the original CLI used to find
/// `interpose.dylib` via `_NSGetExecutablePath`+`dirname`.
pub fn locate_interpose_lib() -> Result<PathBuf, CliError> {
    let exe = std::env::current_exe().map_err(CliError::ExePath)?;
    let exe = std::fs::canonicalize(&exe).unwrap_or(exe);
    let dir = exe.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."));
    let candidate = dir.join(interpose_file_name());
    if candidate.is_file() {
        return Ok(candidate);
    }
    Err(CliError::MissingInterposer(candidate))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expand_tilde_leaves_non_tilde_paths_untouched() {
        assert_eq!(expand_tilde("/abs/path"), "/abs/path");
        assert_eq!(expand_tilde("relative/path"), "relative/path");
    }

    #[test]
    fn expand_tilde_does_not_touch_tilde_user_form() {
        assert_eq!(expand_tilde("~someone/x"), "~someone/x");
    }
}
