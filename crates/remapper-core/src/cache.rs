//! Component D: the hardened-binary/protected-interpreter resign cache.
//!
//! The entitlements plist content, the `codesign` invocations, and the
//! cache/sidecar layout below follow the detection and re-sign procedure
//! from the hardened-runtime design this cache implements.

use std::ffi::OsStr;
use std::fs;
use std::os::unix::fs::{MetadataExt, PermissionsExt};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use remapper_schema::CacheMeta;

use crate::error::CacheError;
use crate::util;

/// Fixed content written to `<CONFIG>/entitlements.plist` the first time a
/// [`CacheContext`] is initialized. Grants the two entitlements that keep a
/// hardened binary's dynamic linker honoring injected environment variables
/// and accepting a non-Apple-signed interposer dylib.
const ENTITLEMENTS_PLIST: &str = concat!(
    "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n",
    "<!DOCTYPE plist PUBLIC \"-//Apple//DTD PLIST 1.0//EN\" ",
    "\"http://www.apple.com/DTDs/PropertyList-1.0.dtd\">\n",
    "<plist version=\"1.0\">\n",
    "<dict>\n",
    "\t<key>com.apple.security.cs.allow-dyld-environment-variables</key>\n",
    "\t<true/>\n",
    "\t<key>com.apple.security.cs.disable-library-validation</key>\n",
    "\t<true/>\n",
    "</dict>\n",
    "</plist>\n",
);

const MH_MAGIC_64: u32 = 0xfeed_facf;
const MH_CIGAM_64: u32 = 0xcffa_edfe;
const FAT_MAGIC: u32 = 0xcafe_babe;
const FAT_CIGAM: u32 = 0xbeba_feca;

/// Immutable per-process configuration for the hardened-binary cache.
/// Lives for the process lifetime; built once by the Injection Loader.
#[derive(Debug)]
pub struct CacheContext {
    cache_dir: PathBuf,
    config_dir: PathBuf,
    entitlements_path: PathBuf,
    codesign_path: PathBuf,
}

impl CacheContext {
    /// Populate paths, create `config_dir`/`cache_dir`, and write the
    /// entitlements descriptor if it is not already present.
    pub fn new(config_dir: PathBuf, cache_dir: PathBuf) -> Result<Self, CacheError> {
        util::mkdirs(&config_dir)?;
        util::mkdirs(&cache_dir)?;
        let entitlements_path = config_dir.join("entitlements.plist");
        if fs::metadata(&entitlements_path).is_err() {
            util::atomic_publish(&entitlements_path, ENTITLEMENTS_PLIST.as_bytes())?;
        }
        let codesign_path =
            util::resolve_in_path("codesign").unwrap_or_else(|| PathBuf::from("/usr/bin/codesign"));
        Ok(Self {
            cache_dir,
            config_dir,
            entitlements_path,
            codesign_path,
        })
    }

    /// The cache root directory.
    #[must_use]
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// The config root directory.
    #[must_use]
    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }
}

/// `<cache_dir><original_absolute_path>` — the original path is appended
/// verbatim (it already starts with `/`), preserving hierarchy under the
/// cache root.
#[must_use]
pub fn cache_path(cache_dir: &Path, original: &Path) -> PathBuf {
    let mut joined = cache_dir.as_os_str().to_os_string();
    joined.push(original.as_os_str());
    PathBuf::from(joined)
}

fn meta_path(cached: &Path) -> PathBuf {
    let mut joined = cached.as_os_str().to_os_string();
    joined.push(".meta");
    PathBuf::from(joined)
}

/// An entry is valid iff the payload exists, the sidecar exists and parses,
/// and both integers equal the current `stat()` of the original.
#[must_use]
pub fn cache_valid(cached: &Path, orig_mtime: i64, orig_size: u64) -> bool {
    if fs::metadata(cached).is_err() {
        return false;
    }
    let Ok(contents) = fs::read_to_string(meta_path(cached)) else {
        return false;
    };
    let Ok(meta) = CacheMeta::parse(&contents) else {
        return false;
    };
    meta.mtime == orig_mtime && meta.size == orig_size
}

/// Conservatively returns `true`
/// (hardened) when the signing tool cannot be invoked at all, so that the
/// caller attempts the cache path and fails loudly rather than silently
/// defeating interposition.
#[must_use]
pub fn is_hardened(ctx: &CacheContext, path: &Path) -> bool {
    if !looks_like_native_executable(path) {
        return false;
    }

    let runtime_check = util::run_no_shell(&ctx.codesign_path, &[OsStr::new("-dvvv"), path.as_os_str()]);
    let Ok(runtime_check) = runtime_check else {
        return true;
    };
    let has_runtime = String::from_utf8_lossy(&runtime_check.combined).contains("runtime");
    if !has_runtime {
        return false;
    }

    let entitlements_check = util::run_no_shell(
        &ctx.codesign_path,
        &[OsStr::new("-d"), OsStr::new("--entitlements"), OsStr::new("-"), path.as_os_str()],
    );
    let Ok(entitlements_check) = entitlements_check else {
        return true;
    };
    let has_dyld_entitlement =
        String::from_utf8_lossy(&entitlements_check.combined).contains("allow-dyld-environment-variables");

    !has_dyld_entitlement
}

fn looks_like_native_executable(path: &Path) -> bool {
    let Ok(mut file) = fs::File::open(path) else {
        return false;
    };
    use std::io::Read;
    let mut magic = [0_u8; 4];
    if file.read_exact(&mut magic).is_err() {
        return false;
    }
    let magic = u32::from_ne_bytes(magic);
    matches!(magic, MH_MAGIC_64 | MH_CIGAM_64 | FAT_MAGIC | FAT_CIGAM)
}

/// Cache-fill procedure: copy, re-sign, atomically rename, publish the
/// sidecar.
pub fn cache_create(ctx: &CacheContext, original: &Path, cached: &Path, mtime: i64, size: u64) -> Result<(), CacheError> {
    if let Some(parent) = cached.parent() {
        util::mkdirs(parent)?;
    }

    let seq = util::next_seq();
    let mut tmp = cached.as_os_str().to_os_string();
    tmp.push(format!(".tmp.{}.{seq}", std::process::id()));
    let tmp = PathBuf::from(tmp);

    if let Err(e) = fs::copy(original, &tmp) {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }
    if let Ok(meta) = fs::metadata(&tmp) {
        let mut perms = meta.permissions();
        let mode = perms.mode() | 0o111;
        perms.set_mode(mode);
        let _ = fs::set_permissions(&tmp, perms);
    }

    let sign = util::run_no_shell(
        &ctx.codesign_path,
        &[
            OsStr::new("--force"),
            OsStr::new("--sign"),
            OsStr::new("-"),
            OsStr::new("--entitlements"),
            ctx.entitlements_path.as_os_str(),
            tmp.as_os_str(),
        ],
    )?;
    if !sign.status.success() {
        let _ = fs::remove_file(&tmp);
        return Err(CacheError::SignerFailed);
    }

    if fs::rename(&tmp, cached).is_err() {
        // A concurrent filler won the race; both converge on identical bytes.
        let _ = fs::remove_file(&tmp);
    }

    let meta_line = CacheMeta { mtime, size }.to_line();
    util::atomic_publish(&meta_path(cached), meta_line.as_bytes())?;
    Ok(())
}

/// High-level entry point used by the Exec Interposer and the Shebang
/// Pre-resolver: check the on-disk cache, and if absent or stale, decide
/// whether a fill is needed and attempt one.
///
/// `force` skips the hardened-binary detection and always attempts a fill
/// once the path is confirmed to be a regular file — used by the shebang
/// pre-resolver when the interpreter sits on a protected prefix regardless
/// of whether `codesign` itself reports it as hardened.
#[must_use]
pub fn resolve_hardened(ctx: &CacheContext, path: &Path, force: bool) -> PathBuf {
    let Ok(meta) = fs::metadata(path) else {
        return path.to_path_buf();
    };
    if !meta.is_file() {
        return path.to_path_buf();
    }

    let cached = cache_path(&ctx.cache_dir, path);
    let mtime = meta.mtime();
    let size = meta.size();

    if cache_valid(&cached, mtime, size) {
        tracing::debug!(cached = %cached.display(), "hardened cache hit");
        return cached;
    }

    if !force && !is_hardened(ctx, path) {
        tracing::debug!(path = %path.display(), "not hardened, no substitution");
        return path.to_path_buf();
    }

    match cache_create(ctx, path, &cached, mtime, size) {
        Ok(()) => {
            tracing::debug!(cached = %cached.display(), "hardened cache filled");
            cached
        }
        Err(error) => {
            tracing::warn!(%error, path = %path.display(), "hardened cache fill failed, using original");
            path.to_path_buf()
        }
    }
}

/// Bounded capacity of the in-process hardened lookup table.
pub const IN_PROCESS_CACHE_CAP: usize = 128;

/// Result of the interposer-side acceleration lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HardenedState {
    /// `codesign` reported hardened runtime without the permissive entitlement.
    Hardened,
    /// The binary does not need a re-signed copy.
    NotHardened,
}

struct InProcessEntry {
    path: PathBuf,
    mtime: i64,
    size: u64,
    state: HardenedState,
}

/// Per-process, bounded (mtime, size, is_hardened) lookup table keyed by
/// original path. Scanned linearly; full-slot behavior is drop-on-insert,
/// no eviction. A stale key (same path, different mtime/size) simply fails
/// to match on lookup and is treated as unknown.
#[derive(Default)]
pub struct InProcessCache {
    entries: Mutex<Vec<InProcessEntry>>,
}

impl InProcessCache {
    /// An empty table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::with_capacity(IN_PROCESS_CACHE_CAP)),
        }
    }

    /// Look up `path` at the given `(mtime, size)`. Returns `None` if absent
    /// or stale.
    #[must_use]
    pub fn lookup(&self, path: &Path, mtime: i64, size: u64) -> Option<HardenedState> {
        let entries = self.entries.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        entries
            .iter()
            .find(|e| e.path == path && e.mtime == mtime && e.size == size)
            .map(|e| e.state)
    }

    /// Record a result. Dropped silently once the table is full.
    pub fn insert(&self, path: PathBuf, mtime: i64, size: u64, state: HardenedState) {
        let mut entries = self.entries.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if entries.len() >= IN_PROCESS_CACHE_CAP {
            return;
        }
        entries.push(InProcessEntry { path, mtime, size, state });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_path_concatenates_verbatim() {
        let p = cache_path(Path::new("/cache"), Path::new("/usr/local/bin/x"));
        assert_eq!(p, Path::new("/cache/usr/local/bin/x"));
    }

    #[test]
    fn cache_valid_requires_matching_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let cached = dir.path().join("payload");
        std::fs::write(&cached, b"data").unwrap();
        assert!(!cache_valid(&cached, 10, 4));

        util::atomic_publish(&meta_path(&cached), b"10 4").unwrap();
        assert!(cache_valid(&cached, 10, 4));
        assert!(!cache_valid(&cached, 11, 4));
    }

    #[test]
    fn in_process_cache_drops_on_insert_when_full() {
        let cache = InProcessCache::new();
        for i in 0..IN_PROCESS_CACHE_CAP {
            cache.insert(PathBuf::from(format!("/bin/p{i}")), 0, 0, HardenedState::NotHardened);
        }
        cache.insert(PathBuf::from("/bin/overflow"), 0, 0, HardenedState::Hardened);
        assert!(cache.lookup(Path::new("/bin/overflow"), 0, 0).is_none());
        assert!(cache.lookup(Path::new("/bin/p0"), 0, 0).is_some());
    }

    #[test]
    fn in_process_cache_treats_stale_key_as_unknown() {
        let cache = InProcessCache::new();
        cache.insert(PathBuf::from("/bin/p"), 10, 20, HardenedState::Hardened);
        assert!(cache.lookup(Path::new("/bin/p"), 11, 20).is_none());
        assert!(cache.lookup(Path::new("/bin/p"), 10, 20).is_some());
    }
}
