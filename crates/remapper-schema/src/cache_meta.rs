use std::fmt;

/// The `<payload>.meta` sidecar: the original file's modification time and
/// size at the moment the cache entry was filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheMeta {
    /// Original file's `st_mtime`, as seconds since the epoch.
    pub mtime: i64,
    /// Original file's `st_size`.
    pub size: u64,
}

/// Sidecar parse failure; any of these means the entry is treated as invalid
/// and re-filled.
#[derive(Debug, thiserror::Error)]
pub enum CacheMetaError {
    /// Fewer than two whitespace-separated integers were present.
    #[error("cache metadata line has no mtime/size pair: {0:?}")]
    Malformed(String),
    /// One of the two fields was not a valid decimal integer.
    #[error("cache metadata field is not an integer: {0:?}")]
    NotAnInteger(String),
}

impl CacheMeta {
    /// Format as the single-line sidecar contents: decimal mtime, one space,
    /// decimal size. No trailing newline is required by the format, but one
    /// is appended for readability; parsing ignores trailing whitespace.
    #[must_use]
    pub fn to_line(self) -> String {
        format!("{} {}", self.mtime, self.size)
    }

    /// Parse the sidecar contents. Trailing whitespace and any fields beyond
    /// the first two are ignored.
    pub fn parse(contents: &str) -> Result<Self, CacheMetaError> {
        let mut fields = contents.split_whitespace();
        let mtime = fields
            .next()
            .ok_or_else(|| CacheMetaError::Malformed(contents.to_string()))?;
        let size = fields
            .next()
            .ok_or_else(|| CacheMetaError::Malformed(contents.to_string()))?;
        let mtime = mtime
            .parse::<i64>()
            .map_err(|_| CacheMetaError::NotAnInteger(mtime.to_string()))?;
        let size = size
            .parse::<u64>()
            .map_err(|_| CacheMetaError::NotAnInteger(size.to_string()))?;
        Ok(Self { mtime, size })
    }
}

impl fmt::Display for CacheMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_line())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let meta = CacheMeta { mtime: 1_700_000_000, size: 4096 };
        let line = meta.to_line();
        assert_eq!(CacheMeta::parse(&line).unwrap(), meta);
    }

    #[test]
    fn ignores_trailing_whitespace_and_fields() {
        let meta = CacheMeta::parse("123 456  \n").unwrap();
        assert_eq!(meta, CacheMeta { mtime: 123, size: 456 });
    }

    #[test]
    fn rejects_single_field() {
        assert!(matches!(CacheMeta::parse("123"), Err(CacheMetaError::Malformed(_))));
    }

    #[test]
    fn rejects_non_integer() {
        assert!(matches!(
            CacheMeta::parse("abc 456"),
            Err(CacheMetaError::NotAnInteger(_))
        ));
    }
}
