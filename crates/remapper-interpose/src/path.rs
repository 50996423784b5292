//! Shared path-rewriting glue between the libc entry points and Component A.

use std::ffi::{CStr, CString};

/// Rewrite `path` against the active mapping table, if any. Returns `None`
/// on every condition that means "use the original path": no runtime (F
/// never ran, or a required env var was absent), no mapping matched, or the
/// rewritten path did not fit the buffer.
#[must_use]
pub fn rewrite(path: &CStr) -> Option<CString> {
    let runtime = remapper_core::init().as_ref()?;
    let mut buf = [0_u8; remapper_core::REWRITE_BUF_LEN];
    let len = remapper_core::rewrite_into(&runtime.mappings, path.to_bytes(), &mut buf)?;
    CString::new(&buf[..len]).ok()
}

/// As [`rewrite`], but first enforces the absolute-only invariant: a
/// relative path passed to an `*at`-family call must retain its `dirfd`
/// semantics and is never rewritten.
#[must_use]
pub fn rewrite_if_absolute(path: &CStr) -> Option<CString> {
    if !path.to_bytes().starts_with(b"/") {
        return None;
    }
    rewrite(path)
}
