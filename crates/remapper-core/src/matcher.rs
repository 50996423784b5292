//! Component A: the Pattern Matcher's hot-path entry point.
//!
//! [`remapper_schema::MappingTable::rewrite`] is the readable, allocating
//! reference implementation; this module re-expresses the identical
//! algorithm writing into a caller-owned buffer so the interposer never
//! allocates on a call it did not originate.

use remapper_schema::{MappingTable, MAX_COMPONENT_LEN};

/// Upper bound on a rewritten path, matching a generous native `PATH_MAX`.
/// Both Linux (4096) and Darwin (1024) fit comfortably under this.
pub const REWRITE_BUF_LEN: usize = 4096;

/// Attempt to rewrite `path` (raw bytes, as handed to us by the libc
/// caller) against `table`. On a match, the rewritten path is written into
/// `buf` and its length returned. On no match, on invalid UTF-8, or if the
/// rewritten path would not fit in `buf`, returns `None` — the caller must
/// then proceed with the original path unchanged (fail-open).
///
/// Only absolute paths are ever passed here; the `*at`-family callers in
/// `remapper-interpose` are responsible for checking that invariant before
/// calling in, since a relative path must retain `dirfd` semantics.
#[must_use]
pub fn rewrite_into(table: &MappingTable, path: &[u8], buf: &mut [u8]) -> Option<usize> {
    let path_str = std::str::from_utf8(path).ok()?;
    for mapping in table.mappings() {
        if !path_str.starts_with(mapping.parent()) {
            continue;
        }
        let rest = &path_str[mapping.parent().len()..];
        if rest.is_empty() {
            continue;
        }
        let component = rest.split('/').next().unwrap_or(rest);
        if component.is_empty() || component.len() > MAX_COMPONENT_LEN {
            continue;
        }
        if !mapping.component_matches(component) {
            continue;
        }
        let target = table.target();
        let total_len = target.len() + rest.len();
        if total_len > buf.len() {
            return None;
        }
        buf[..target.len()].copy_from_slice(target.as_bytes());
        buf[target.len()..total_len].copy_from_slice(rest.as_bytes());
        return Some(total_len);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use remapper_schema::Mapping;

    fn table() -> MappingTable {
        MappingTable::new("/t", [Mapping::parse("/h/.dummy*").unwrap()])
    }

    #[test]
    fn matches_and_writes_buffer() {
        let t = table();
        let mut buf = [0u8; REWRITE_BUF_LEN];
        let len = rewrite_into(&t, b"/h/.dummy-test/open.txt", &mut buf).unwrap();
        assert_eq!(&buf[..len], b"/t/.dummy-test/open.txt");
    }

    #[test]
    fn non_matching_path_returns_none() {
        let t = table();
        let mut buf = [0u8; REWRITE_BUF_LEN];
        assert!(rewrite_into(&t, b"/h/other/file", &mut buf).is_none());
    }

    #[test]
    fn invalid_utf8_fails_open() {
        let t = table();
        let mut buf = [0u8; REWRITE_BUF_LEN];
        assert!(rewrite_into(&t, b"/h/.dummy\xff", &mut buf).is_none());
    }

    #[test]
    fn oversized_rewrite_fails_open() {
        let t = table();
        let mut small = [0u8; 4];
        assert!(rewrite_into(&t, b"/h/.dummy-test/open.txt", &mut small).is_none());
    }
}
