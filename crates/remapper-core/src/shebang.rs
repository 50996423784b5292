//! Component E: the shebang pre-resolver.
//!
//! Defeats the kernel's own signature-stripping of script interpreters by
//! rewriting the exec *before* the kernel sees the script.

use std::io::Read;
use std::path::{Path, PathBuf};

use crate::cache::{self, CacheContext};

/// Host-managed roots whose binaries the kernel treats like hardened ones
/// even when `codesign` itself reports nothing unusual — read-only system
/// volumes on macOS.
pub const DEFAULT_PROTECTED_PREFIXES: &[&str] = &["/usr/bin/", "/usr/sbin/", "/bin/", "/sbin/", "/System/"];

/// A resolved substitution: the caller should `exec` `interpreter` with
/// `argument` (if any) inserted ahead of the original script path.
#[derive(Debug, Clone)]
pub struct ShebangSubstitution {
    /// The cached, re-signed interpreter to exec instead of the original.
    pub interpreter: PathBuf,
    /// The optional single argument that followed the interpreter path on
    /// the `#!` line (e.g. `-x`).
    pub argument: Option<String>,
}

/// Read up to 256 bytes of `path` and, if it begins with `#!`, decide
/// whether the named interpreter needs a re-signed cached copy and produce
/// the substitution. Returns `None` for "no substitution" in every case the
/// spec calls out: no shebang, read failure, interpreter doesn't need
/// re-signing, or the cache fill itself fails.
#[must_use]
pub fn resolve_shebang(ctx: &CacheContext, protected_prefixes: &[&str], path: &Path) -> Option<ShebangSubstitution> {
    let mut file = std::fs::File::open(path).ok()?;
    let mut buf = [0_u8; 256];
    let mut len = 0;
    while len < buf.len() {
        match file.read(&mut buf[len..]) {
            Ok(0) => break,
            Ok(n) => len += n,
            Err(_) => return None,
        }
    }
    let head = &buf[..len];
    if !head.starts_with(b"#!") {
        return None;
    }

    let line_end = head.iter().position(|&b| b == b'\n').unwrap_or(head.len());
    let line = std::str::from_utf8(&head[2..line_end]).ok()?.trim_start();
    let (interp, argument) = match line.split_once(' ') {
        Some((interp, arg)) => {
            let arg = arg.trim();
            (interp, (!arg.is_empty()).then(|| arg.to_string()))
        }
        None => (line, None),
    };
    if interp.is_empty() {
        return None;
    }

    let interp_path = Path::new(interp);
    let on_protected_prefix = protected_prefixes.iter().any(|prefix| interp.starts_with(prefix));
    let needs_resign = on_protected_prefix || cache::is_hardened(ctx, interp_path);
    if !needs_resign {
        return None;
    }

    let resolved = cache::resolve_hardened(ctx, interp_path, true);
    if resolved == interp_path {
        // Forced fill still failed to produce a cached copy.
        return None;
    }

    Some(ShebangSubstitution {
        interpreter: resolved,
        argument,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    fn ctx(dir: &tempfile::TempDir) -> CacheContext {
        CacheContext::new(dir.path().join("config"), dir.path().join("cache")).unwrap()
    }

    #[test]
    fn non_shebang_file_yields_no_substitution() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("plain.txt");
        std::fs::write(&script, b"just text\n").unwrap();
        assert!(resolve_shebang(&ctx(&dir), DEFAULT_PROTECTED_PREFIXES, &script).is_none());
    }

    #[test]
    fn unprotected_interpreter_yields_no_substitution() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("script.sh");
        std::fs::write(&script, b"#!/opt/homebrew/bin/bash -x\necho hi\n").unwrap();
        let mut perms = std::fs::metadata(&script).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&script, perms).unwrap();
        assert!(resolve_shebang(&ctx(&dir), DEFAULT_PROTECTED_PREFIXES, &script).is_none());
    }

    #[test]
    fn missing_file_yields_no_substitution() {
        let dir = tempfile::tempdir().unwrap();
        assert!(resolve_shebang(&ctx(&dir), DEFAULT_PROTECTED_PREFIXES, &dir.path().join("missing")).is_none());
    }
}
