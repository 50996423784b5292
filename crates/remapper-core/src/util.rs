//! Component H: home-directory lookup, recursive mkdir, atomic publish, PATH
//! resolution, and a shell-less child-process pipe.

use std::ffi::OsStr;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide counter backing the unique suffix in [`atomic_publish`] and
/// the hardened-binary cache's temp filenames, so concurrent publishers in
/// the same process never collide.
static PUBLISH_SEQ: AtomicU64 = AtomicU64::new(0);

/// Prefer `$HOME`; if unset or empty, consult the user database via the
/// reentrant `getpwuid_r` lookup. Deliberately does not depend on the `dirs`
/// crate: this runs inside an injected `cdylib` with no use for that crate's
/// non-Unix lookup paths.
#[must_use]
pub fn home_dir() -> Option<PathBuf> {
    if let Ok(home) = std::env::var("HOME") {
        if !home.is_empty() {
            return Some(PathBuf::from(home));
        }
    }
    passwd_home_dir()
}

#[allow(unsafe_code)]
fn passwd_home_dir() -> Option<PathBuf> {
    // SAFETY: `buf` backs the passwd struct's string fields for the
    // duration of the call; `getpwuid_r` never retains pointers into it
    // past return.
    unsafe {
        let uid = libc::geteuid();
        let mut buf = vec![0_i8; 4096];
        let mut pwd: libc::passwd = std::mem::zeroed();
        let mut result: *mut libc::passwd = std::ptr::null_mut();
        let rc = libc::getpwuid_r(uid, &mut pwd, buf.as_mut_ptr(), buf.len(), &mut result);
        if rc != 0 || result.is_null() || pwd.pw_dir.is_null() {
            return None;
        }
        let dir = std::ffi::CStr::from_ptr(pwd.pw_dir.cast_const());
        Some(PathBuf::from(dir.to_string_lossy().into_owned()))
    }
}

/// Default `CONFIG` directory when the environment variable is unset:
/// `$HOME/.remapper`, or the system temp directory if there is no home to
/// anchor to. Shared by the Injection Loader and the CLI front-end so both
/// land on the same directory without either hardcoding the other's default.
#[must_use]
pub fn default_config_dir() -> PathBuf {
    home_dir().map_or_else(std::env::temp_dir, |home| home.join(".remapper"))
}

/// Create every component of `path`, tolerating already-existing
/// directories. Equivalent to the C implementation's component-by-component
/// walk; `std::fs::create_dir_all` already gives exactly this contract.
pub fn mkdirs(path: &Path) -> io::Result<()> {
    std::fs::create_dir_all(path)
}

/// Write `data` to a temp sibling of `path` and rename it into place,
/// so a concurrent reader never observes a partial file. On rename
/// failure (a concurrent writer won the race) the temp file is removed;
/// that outcome is not itself an error.
pub fn atomic_publish(path: &Path, data: &[u8]) -> io::Result<()> {
    let seq = PUBLISH_SEQ.fetch_add(1, Ordering::Relaxed);
    let mut tmp = path.as_os_str().to_os_string();
    tmp.push(format!(".tmp.{}.{seq}", std::process::id()));
    let tmp_path = PathBuf::from(tmp);

    std::fs::write(&tmp_path, data)?;
    if std::fs::rename(&tmp_path, path).is_err() {
        let _ = std::fs::remove_file(&tmp_path);
    }
    Ok(())
}

/// Next value from the process-wide atomic counter, for callers (the
/// hardened-binary cache) that need a unique suffix of their own alongside
/// `atomic_publish`'s.
pub fn next_seq() -> u64 {
    PUBLISH_SEQ.fetch_add(1, Ordering::Relaxed)
}

/// Walk `$PATH` components, returning the first one under which `file`
/// exists and is executable. A `NULL`/unset `$PATH` yields `None`.
#[must_use]
pub fn resolve_in_path(file: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var).find_map(|dir| {
        let candidate = dir.join(file);
        is_executable(&candidate).then_some(candidate)
    })
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

/// Combined stdout+stderr and exit status of a [`run_no_shell`] invocation.
#[derive(Debug)]
pub struct ChildOutput {
    /// The child's exit status.
    pub status: ExitStatus,
    /// Stdout followed by stderr, concatenated for substring scanning.
    pub combined: Vec<u8>,
}

/// Run `program` with `args` directly — no shell, no `$PATH` reinterpretation
/// of arguments, argv passed verbatim. Used for every signer/diagnostic
/// utility invocation so that a path or argument containing arbitrary bytes
/// can never be reinterpreted.
pub fn run_no_shell(program: &Path, args: &[impl AsRef<OsStr>]) -> io::Result<ChildOutput> {
    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .output()?;
    let mut combined = output.stdout;
    combined.extend_from_slice(&output.stderr);
    Ok(ChildOutput {
        status: output.status,
        combined,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atomic_publish_creates_final_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("entry");
        atomic_publish(&path, b"hello").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"hello");
        assert!(std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(Result::ok)
            .all(|e| e.file_name() == "entry"));
    }

    #[test]
    fn mkdirs_tolerates_existing_dir() {
        let dir = tempfile::tempdir().unwrap();
        mkdirs(dir.path()).unwrap();
        mkdirs(dir.path()).unwrap();
    }

    #[test]
    fn resolve_in_path_finds_real_binary() {
        let found = resolve_in_path("ls");
        assert!(found.is_some());
    }

    #[test]
    fn run_no_shell_captures_output() {
        let out = run_no_shell(Path::new("/bin/echo"), &["hello"]).unwrap();
        assert!(out.status.success());
        assert_eq!(out.combined, b"hello\n");
    }
}
