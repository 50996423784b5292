use std::fmt;

/// Maximum number of simultaneously active mappings.
pub const MAX_MAPPINGS: usize = 64;

/// Maximum byte length of a mapping's glob suffix.
pub const MAX_GLOB_LEN: usize = 255;

/// Maximum byte length of a single path component considered for matching.
/// A component at or beyond this length is conservatively never matched.
pub const MAX_COMPONENT_LEN: usize = 255;

/// A single (parent, glob) mapping, derived by splitting an absolute
/// user-specified path at its last `/`.
///
/// `parent` is the prefix including the trailing `/`; `glob` is the suffix,
/// compiled once into a [`glob::Pattern`] so the hot rewrite path never
/// re-parses it.
#[derive(Clone)]
pub struct Mapping {
    parent: String,
    glob_src: String,
    pattern: glob::Pattern,
}

impl fmt::Debug for Mapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mapping")
            .field("parent", &self.parent)
            .field("glob", &self.glob_src)
            .finish()
    }
}

/// Errors that can occur while building a [`Mapping`] from user input.
#[derive(Debug, thiserror::Error)]
pub enum MappingError {
    /// The entry did not start with `/`.
    #[error("mapping entry is not an absolute path: {0:?}")]
    NotAbsolute(String),
    /// The entry had no `/` after its first byte, so there is no glob suffix.
    #[error("mapping entry has no component after its parent: {0:?}")]
    NoComponent(String),
    /// The glob suffix was empty or exceeded [`MAX_GLOB_LEN`].
    #[error("mapping glob {0:?} is empty or exceeds {MAX_GLOB_LEN} bytes")]
    GlobBounds(String),
    /// The glob suffix failed to compile as a shell glob pattern.
    #[error("mapping glob {0:?} is not a valid pattern: {1}")]
    InvalidGlob(String, glob::PatternError),
}

impl Mapping {
    /// Parse one mapping entry (as found in the colon-separated `MAPPINGS`
    /// string, or one CLI-supplied `<mapping>` argument).
    ///
    /// Splits at the last `/`; the prefix including that `/` becomes
    /// `parent`, the remainder becomes the glob. An entry whose only `/` is
    /// its first byte has no component to glob against and is rejected: a
    /// mapping must contain at least one `/` that is not its first character.
    pub fn parse(entry: &str) -> Result<Self, MappingError> {
        let entry = entry.trim();
        if !entry.starts_with('/') {
            return Err(MappingError::NotAbsolute(entry.to_string()));
        }
        let split_at = entry.rfind('/').expect("leading / guarantees a match");
        if split_at == 0 {
            return Err(MappingError::NoComponent(entry.to_string()));
        }
        let parent = &entry[..=split_at];
        let glob_src = &entry[split_at + 1..];
        if glob_src.is_empty() || glob_src.len() > MAX_GLOB_LEN {
            return Err(MappingError::GlobBounds(glob_src.to_string()));
        }
        let pattern = glob::Pattern::new(glob_src)
            .map_err(|e| MappingError::InvalidGlob(glob_src.to_string(), e))?;
        Ok(Self {
            parent: parent.to_string(),
            glob_src: glob_src.to_string(),
            pattern,
        })
    }

    /// The parent prefix, including its trailing `/`.
    #[must_use]
    pub fn parent(&self) -> &str {
        &self.parent
    }

    /// The raw glob source text (for diagnostics/`doctor` output).
    #[must_use]
    pub fn glob_source(&self) -> &str {
        &self.glob_src
    }

    /// Does `component` (a single path segment, containing no `/`) satisfy
    /// this mapping's glob?
    #[must_use]
    pub fn component_matches(&self, component: &str) -> bool {
        self.pattern.matches(component)
    }
}

/// An ordered sequence of mappings plus the `target` directory they redirect
/// into. First match wins in iteration order.
#[derive(Debug, Clone)]
pub struct MappingTable {
    target: String,
    mappings: Vec<Mapping>,
}

impl MappingTable {
    /// Build a table from an already-absolute target directory and an
    /// iterator of pre-parsed mappings, truncating silently at
    /// [`MAX_MAPPINGS`] as part of tolerant parsing.
    pub fn new(target: impl Into<String>, mappings: impl IntoIterator<Item = Mapping>) -> Self {
        let mut target = target.into();
        if !target.ends_with('/') {
            target.push('/');
        }
        let mappings = mappings.into_iter().take(MAX_MAPPINGS).collect();
        Self { target, mappings }
    }

    /// The target directory, guaranteed to end with `/`.
    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    /// The active mappings, in match order.
    #[must_use]
    pub fn mappings(&self) -> &[Mapping] {
        &self.mappings
    }

    /// Number of mappings currently held (always `<= MAX_MAPPINGS`).
    #[must_use]
    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    /// True if no mappings are active.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    /// Does `self.target` itself fall inside any configured mapping's
    /// parent? This is not forbidden, only worth a warning, since a rewrite
    /// that lands back inside a mapped prefix can make `rewrite`
    /// non-idempotent.
    #[must_use]
    pub fn target_overlaps_a_mapping(&self) -> bool {
        self.mappings
            .iter()
            .any(|m| self.target.starts_with(m.parent()) || m.parent().starts_with(&self.target))
    }

    /// Reference implementation of the pattern-matching rewrite rule,
    /// allocating a fresh `String` for the rewritten path. Used by the CLI's
    /// `doctor` command and by tests; the interposer's hot path uses
    /// [`remapper_core::matcher::rewrite_into`] instead, which performs the
    /// identical algorithm without allocating.
    #[must_use]
    pub fn rewrite(&self, path: &str) -> Option<String> {
        for mapping in &self.mappings {
            if !path.starts_with(mapping.parent()) {
                continue;
            }
            let rest = &path[mapping.parent().len()..];
            if rest.is_empty() {
                continue;
            }
            let component = rest.split('/').next().unwrap_or(rest);
            if component.is_empty() || component.len() > MAX_COMPONENT_LEN {
                continue;
            }
            if mapping.component_matches(component) {
                return Some(format!("{}{rest}", self.target));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> MappingTable {
        let mapping = Mapping::parse("/h/.dummy*").unwrap();
        MappingTable::new("/t", [mapping])
    }

    #[test]
    fn parses_parent_and_glob() {
        let m = Mapping::parse("/h/.dummy*").unwrap();
        assert_eq!(m.parent(), "/h/");
        assert_eq!(m.glob_source(), ".dummy*");
    }

    #[test]
    fn rejects_relative_entry() {
        assert!(matches!(
            Mapping::parse("h/.dummy*"),
            Err(MappingError::NotAbsolute(_))
        ));
    }

    #[test]
    fn rejects_entry_with_no_component() {
        assert!(matches!(
            Mapping::parse("/onlyslash"),
            Err(MappingError::NoComponent(_))
        ));
    }

    #[test]
    fn target_always_gets_trailing_slash() {
        let t = MappingTable::new("/t", []);
        assert_eq!(t.target(), "/t/");
    }

    #[test]
    fn scenario_1_rewrite_matches() {
        let t = table();
        assert_eq!(
            t.rewrite("/h/.dummy-test/open.txt").as_deref(),
            Some("/t/.dummy-test/open.txt")
        );
        assert_eq!(t.rewrite("/h/other/file"), None);
    }

    #[test]
    fn scenario_1_component_with_no_trailing_slash_still_matches() {
        let t = table();
        assert_eq!(t.rewrite("/h/.dummy-test").as_deref(), Some("/t/.dummy-test"));
    }

    #[test]
    fn path_equal_to_parent_does_not_match() {
        let t = table();
        assert_eq!(t.rewrite("/h/"), None);
    }

    #[test]
    fn oversized_component_is_unmatched() {
        let t = table();
        let huge = format!("/h/.dummy{}", "x".repeat(MAX_COMPONENT_LEN));
        assert_eq!(t.rewrite(&huge), None);
    }

    #[test]
    fn mappings_truncate_at_bound() {
        let many = (0..MAX_MAPPINGS + 10).map(|i| Mapping::parse(&format!("/h/.d{i}*")).unwrap());
        let t = MappingTable::new("/t", many);
        assert_eq!(t.len(), MAX_MAPPINGS);
    }

    #[test]
    fn detects_target_overlap() {
        let mapping = Mapping::parse("/h/.dummy*").unwrap();
        let t = MappingTable::new("/h/.dummy-cache", [mapping]);
        assert!(t.target_overlaps_a_mapping());
    }
}
