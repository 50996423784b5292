//! Component B: filesystem-call replacements.
//!
//! Each `*_impl` function takes the *real* underlying function as a plain
//! function pointer so the rewriting logic is identical regardless of how
//! macOS (`macos.rs`, per-symbol interpose table) or Linux (`linux.rs`,
//! `dlsym(RTLD_NEXT, ..)`) obtained that pointer — the mechanism is a driver,
//! the logic above it is not.
//!
//! On any failure to rewrite (no active mapping, oversized result), the
//! call proceeds with the original path untouched — fail-open.

use std::ffi::CStr;
use std::os::raw::{c_char, c_int};

use crate::path::{rewrite, rewrite_if_absolute};

pub type OpenFn = unsafe extern "C" fn(*const c_char, c_int, libc::mode_t) -> c_int;
pub type OpenAtFn = unsafe extern "C" fn(c_int, *const c_char, c_int, libc::mode_t) -> c_int;
pub type StatFn = unsafe extern "C" fn(*const c_char, *mut libc::stat) -> c_int;
pub type FstatAtFn = unsafe extern "C" fn(c_int, *const c_char, *mut libc::stat, c_int) -> c_int;
pub type AccessFn = unsafe extern "C" fn(*const c_char, c_int) -> c_int;
pub type FaccessAtFn = unsafe extern "C" fn(c_int, *const c_char, c_int, c_int) -> c_int;
pub type MkdirFn = unsafe extern "C" fn(*const c_char, libc::mode_t) -> c_int;
pub type MkdirAtFn = unsafe extern "C" fn(c_int, *const c_char, libc::mode_t) -> c_int;
pub type UnlinkFn = unsafe extern "C" fn(*const c_char) -> c_int;
pub type UnlinkAtFn = unsafe extern "C" fn(c_int, *const c_char, c_int) -> c_int;
pub type RenameFn = unsafe extern "C" fn(*const c_char, *const c_char) -> c_int;
pub type RenameAtFn = unsafe extern "C" fn(c_int, *const c_char, c_int, *const c_char) -> c_int;
pub type ReadlinkFn = unsafe extern "C" fn(*const c_char, *mut c_char, usize) -> isize;
pub type ReadlinkAtFn = unsafe extern "C" fn(c_int, *const c_char, *mut c_char, usize) -> isize;
pub type ChmodFn = unsafe extern "C" fn(*const c_char, libc::mode_t) -> c_int;
pub type FchmodAtFn = unsafe extern "C" fn(c_int, *const c_char, libc::mode_t, c_int) -> c_int;
pub type RealpathFn = unsafe extern "C" fn(*const c_char, *mut c_char) -> *mut c_char;
pub type RealpathChkFn = unsafe extern "C" fn(*const c_char, *mut c_char, usize) -> *mut c_char;
pub type CreatFn = unsafe extern "C" fn(*const c_char, libc::mode_t) -> c_int;
pub type OpendirFn = unsafe extern "C" fn(*const c_char) -> *mut libc::DIR;
pub type ChdirFn = unsafe extern "C" fn(*const c_char) -> c_int;
pub type ChownFn = unsafe extern "C" fn(*const c_char, libc::uid_t, libc::gid_t) -> c_int;
pub type FchownAtFn = unsafe extern "C" fn(c_int, *const c_char, libc::uid_t, libc::gid_t, c_int) -> c_int;
pub type SymlinkFn = unsafe extern "C" fn(*const c_char, *const c_char) -> c_int;
pub type SymlinkAtFn = unsafe extern "C" fn(*const c_char, c_int, *const c_char) -> c_int;
pub type LinkFn = unsafe extern "C" fn(*const c_char, *const c_char) -> c_int;
pub type LinkAtFn = unsafe extern "C" fn(c_int, *const c_char, c_int, *const c_char, c_int) -> c_int;
pub type TruncateFn = unsafe extern "C" fn(*const c_char, libc::off_t) -> c_int;
pub type FopenFn = unsafe extern "C" fn(*const c_char, *const c_char) -> *mut libc::FILE;

/// # Safety
/// `path` must be a valid NUL-terminated C string for the duration of the
/// call, as required of any libc path argument.
pub unsafe fn open_impl(real: OpenFn, path: *const c_char, flags: c_int, mode: libc::mode_t) -> c_int {
    let cpath = CStr::from_ptr(path);
    match rewrite(cpath) {
        Some(new_path) => real(new_path.as_ptr(), flags, mode),
        None => real(path, flags, mode),
    }
}

/// # Safety
/// Same contract as [`open_impl`]; `path` is only rewritten when absolute,
/// preserving `dirfd` semantics for relative paths.
pub unsafe fn openat_impl(real: OpenAtFn, dirfd: c_int, path: *const c_char, flags: c_int, mode: libc::mode_t) -> c_int {
    let cpath = CStr::from_ptr(path);
    match rewrite_if_absolute(cpath) {
        Some(new_path) => real(dirfd, new_path.as_ptr(), flags, mode),
        None => real(dirfd, path, flags, mode),
    }
}

/// # Safety
/// `path` and `buf` must be valid for the call; `buf` must point to a
/// writable `struct stat`.
pub unsafe fn stat_impl(real: StatFn, path: *const c_char, buf: *mut libc::stat) -> c_int {
    let cpath = CStr::from_ptr(path);
    match rewrite(cpath) {
        Some(new_path) => real(new_path.as_ptr(), buf),
        None => real(path, buf),
    }
}

/// # Safety
/// Same contract as [`stat_impl`], plus the `*at` absolute-only rule.
pub unsafe fn fstatat_impl(real: FstatAtFn, dirfd: c_int, path: *const c_char, buf: *mut libc::stat, flags: c_int) -> c_int {
    let cpath = CStr::from_ptr(path);
    match rewrite_if_absolute(cpath) {
        Some(new_path) => real(dirfd, new_path.as_ptr(), buf, flags),
        None => real(dirfd, path, buf, flags),
    }
}

/// # Safety
/// `path` must be a valid NUL-terminated C string.
pub unsafe fn access_impl(real: AccessFn, path: *const c_char, mode: c_int) -> c_int {
    let cpath = CStr::from_ptr(path);
    match rewrite(cpath) {
        Some(new_path) => real(new_path.as_ptr(), mode),
        None => real(path, mode),
    }
}

/// # Safety
/// Same contract as [`access_impl`], plus the `*at` absolute-only rule.
pub unsafe fn faccessat_impl(real: FaccessAtFn, dirfd: c_int, path: *const c_char, mode: c_int, flags: c_int) -> c_int {
    let cpath = CStr::from_ptr(path);
    match rewrite_if_absolute(cpath) {
        Some(new_path) => real(dirfd, new_path.as_ptr(), mode, flags),
        None => real(dirfd, path, mode, flags),
    }
}

/// # Safety
/// `path` must be a valid NUL-terminated C string.
pub unsafe fn mkdir_impl(real: MkdirFn, path: *const c_char, mode: libc::mode_t) -> c_int {
    let cpath = CStr::from_ptr(path);
    match rewrite(cpath) {
        Some(new_path) => real(new_path.as_ptr(), mode),
        None => real(path, mode),
    }
}

/// # Safety
/// Same contract as [`mkdir_impl`], plus the `*at` absolute-only rule.
pub unsafe fn mkdirat_impl(real: MkdirAtFn, dirfd: c_int, path: *const c_char, mode: libc::mode_t) -> c_int {
    let cpath = CStr::from_ptr(path);
    match rewrite_if_absolute(cpath) {
        Some(new_path) => real(dirfd, new_path.as_ptr(), mode),
        None => real(dirfd, path, mode),
    }
}

/// # Safety
/// `path` must be a valid NUL-terminated C string.
pub unsafe fn unlink_impl(real: UnlinkFn, path: *const c_char) -> c_int {
    let cpath = CStr::from_ptr(path);
    match rewrite(cpath) {
        Some(new_path) => real(new_path.as_ptr()),
        None => real(path),
    }
}

/// # Safety
/// Same contract as [`unlink_impl`], plus the `*at` absolute-only rule.
pub unsafe fn unlinkat_impl(real: UnlinkAtFn, dirfd: c_int, path: *const c_char, flags: c_int) -> c_int {
    let cpath = CStr::from_ptr(path);
    match rewrite_if_absolute(cpath) {
        Some(new_path) => real(dirfd, new_path.as_ptr(), flags),
        None => real(dirfd, path, flags),
    }
}

/// # Safety
/// `path` must be a valid NUL-terminated C string.
pub unsafe fn rmdir_impl(real: UnlinkFn, path: *const c_char) -> c_int {
    unlink_impl(real, path)
}

/// # Safety
/// `old` and `new` must each be valid NUL-terminated C strings.
pub unsafe fn rename_impl(real: RenameFn, old: *const c_char, new: *const c_char) -> c_int {
    let old_c = CStr::from_ptr(old);
    let new_c = CStr::from_ptr(new);
    let rewritten_old = rewrite(old_c);
    let rewritten_new = rewrite(new_c);
    let old_arg = rewritten_old.as_deref().map_or(old, CStr::as_ptr);
    let new_arg = rewritten_new.as_deref().map_or(new, CStr::as_ptr);
    real(old_arg, new_arg)
}

/// # Safety
/// Same contract as [`rename_impl`], plus the `*at` absolute-only rule on
/// each path independently.
pub unsafe fn renameat_impl(
    real: RenameAtFn,
    old_dirfd: c_int,
    old: *const c_char,
    new_dirfd: c_int,
    new: *const c_char,
) -> c_int {
    let old_c = CStr::from_ptr(old);
    let new_c = CStr::from_ptr(new);
    let rewritten_old = rewrite_if_absolute(old_c);
    let rewritten_new = rewrite_if_absolute(new_c);
    let old_arg = rewritten_old.as_deref().map_or(old, CStr::as_ptr);
    let new_arg = rewritten_new.as_deref().map_or(new, CStr::as_ptr);
    real(old_dirfd, old_arg, new_dirfd, new_arg)
}

/// # Safety
/// `path` must be a valid NUL-terminated C string; `buf` must be writable
/// for `bufsize` bytes.
pub unsafe fn readlink_impl(real: ReadlinkFn, path: *const c_char, buf: *mut c_char, bufsize: usize) -> isize {
    let cpath = CStr::from_ptr(path);
    match rewrite(cpath) {
        Some(new_path) => real(new_path.as_ptr(), buf, bufsize),
        None => real(path, buf, bufsize),
    }
}

/// # Safety
/// Same contract as [`readlink_impl`], plus the `*at` absolute-only rule.
pub unsafe fn readlinkat_impl(
    real: ReadlinkAtFn,
    dirfd: c_int,
    path: *const c_char,
    buf: *mut c_char,
    bufsize: usize,
) -> isize {
    let cpath = CStr::from_ptr(path);
    match rewrite_if_absolute(cpath) {
        Some(new_path) => real(dirfd, new_path.as_ptr(), buf, bufsize),
        None => real(dirfd, path, buf, bufsize),
    }
}

/// # Safety
/// `path` must be a valid NUL-terminated C string.
pub unsafe fn chmod_impl(real: ChmodFn, path: *const c_char, mode: libc::mode_t) -> c_int {
    let cpath = CStr::from_ptr(path);
    match rewrite(cpath) {
        Some(new_path) => real(new_path.as_ptr(), mode),
        None => real(path, mode),
    }
}

/// # Safety
/// Same contract as [`chmod_impl`], plus the `*at` absolute-only rule.
pub unsafe fn fchmodat_impl(real: FchmodAtFn, dirfd: c_int, path: *const c_char, mode: libc::mode_t, flags: c_int) -> c_int {
    let cpath = CStr::from_ptr(path);
    match rewrite_if_absolute(cpath) {
        Some(new_path) => real(dirfd, new_path.as_ptr(), mode, flags),
        None => real(dirfd, path, mode, flags),
    }
}

/// # Safety
/// `path` must be a valid NUL-terminated C string; `resolved` must either
/// be null or point at a writable buffer of at least `PATH_MAX` bytes.
pub unsafe fn realpath_impl(real: RealpathFn, path: *const c_char, resolved: *mut c_char) -> *mut c_char {
    let cpath = CStr::from_ptr(path);
    match rewrite(cpath) {
        Some(new_path) => real(new_path.as_ptr(), resolved),
        None => real(path, resolved),
    }
}

/// # Safety
/// Same contract as [`realpath_impl`], plus `resolvedlen` must be the true
/// capacity of `resolved` as the glibc fortified variant requires.
pub unsafe fn realpath_chk_impl(real: RealpathChkFn, path: *const c_char, resolved: *mut c_char, resolvedlen: usize) -> *mut c_char {
    let cpath = CStr::from_ptr(path);
    match rewrite(cpath) {
        Some(new_path) => real(new_path.as_ptr(), resolved, resolvedlen),
        None => real(path, resolved, resolvedlen),
    }
}

/// # Safety
/// `path` must be a valid NUL-terminated C string.
pub unsafe fn creat_impl(real: CreatFn, path: *const c_char, mode: libc::mode_t) -> c_int {
    let cpath = CStr::from_ptr(path);
    match rewrite(cpath) {
        Some(new_path) => real(new_path.as_ptr(), mode),
        None => real(path, mode),
    }
}

/// # Safety
/// `path` must be a valid NUL-terminated C string.
pub unsafe fn opendir_impl(real: OpendirFn, path: *const c_char) -> *mut libc::DIR {
    let cpath = CStr::from_ptr(path);
    match rewrite(cpath) {
        Some(new_path) => real(new_path.as_ptr()),
        None => real(path),
    }
}

/// # Safety
/// `path` must be a valid NUL-terminated C string.
pub unsafe fn chdir_impl(real: ChdirFn, path: *const c_char) -> c_int {
    let cpath = CStr::from_ptr(path);
    match rewrite(cpath) {
        Some(new_path) => real(new_path.as_ptr()),
        None => real(path),
    }
}

/// # Safety
/// `path` must be a valid NUL-terminated C string.
pub unsafe fn chown_impl(real: ChownFn, path: *const c_char, uid: libc::uid_t, gid: libc::gid_t) -> c_int {
    let cpath = CStr::from_ptr(path);
    match rewrite(cpath) {
        Some(new_path) => real(new_path.as_ptr(), uid, gid),
        None => real(path, uid, gid),
    }
}

/// # Safety
/// Same contract as [`chown_impl`], plus the `*at` absolute-only rule.
pub unsafe fn fchownat_impl(
    real: FchownAtFn,
    dirfd: c_int,
    path: *const c_char,
    uid: libc::uid_t,
    gid: libc::gid_t,
    flags: c_int,
) -> c_int {
    let cpath = CStr::from_ptr(path);
    match rewrite_if_absolute(cpath) {
        Some(new_path) => real(dirfd, new_path.as_ptr(), uid, gid, flags),
        None => real(dirfd, path, uid, gid, flags),
    }
}

/// # Safety
/// `target` and `linkpath` must each be valid NUL-terminated C strings.
/// Both are rewritten unconditionally: unlike `rename`, `symlink`'s first
/// argument is stored verbatim as link content rather than resolved, so
/// there is no `dirfd`-relative case to protect.
pub unsafe fn symlink_impl(real: SymlinkFn, target: *const c_char, linkpath: *const c_char) -> c_int {
    let target_c = CStr::from_ptr(target);
    let link_c = CStr::from_ptr(linkpath);
    let rewritten_target = rewrite(target_c);
    let rewritten_link = rewrite(link_c);
    let target_arg = rewritten_target.as_deref().map_or(target, CStr::as_ptr);
    let link_arg = rewritten_link.as_deref().map_or(linkpath, CStr::as_ptr);
    real(target_arg, link_arg)
}

/// # Safety
/// Same contract as [`symlink_impl`]; `linkpath` is subject to the `*at`
/// absolute-only rule since it is resolved against `newdirfd`, while
/// `target` (stored verbatim as link content) is always rewritten.
pub unsafe fn symlinkat_impl(real: SymlinkAtFn, target: *const c_char, newdirfd: c_int, linkpath: *const c_char) -> c_int {
    let target_c = CStr::from_ptr(target);
    let link_c = CStr::from_ptr(linkpath);
    let rewritten_target = rewrite(target_c);
    let rewritten_link = rewrite_if_absolute(link_c);
    let target_arg = rewritten_target.as_deref().map_or(target, CStr::as_ptr);
    let link_arg = rewritten_link.as_deref().map_or(linkpath, CStr::as_ptr);
    real(target_arg, newdirfd, link_arg)
}

/// # Safety
/// `oldpath` and `newpath` must each be valid NUL-terminated C strings.
pub unsafe fn link_impl(real: LinkFn, oldpath: *const c_char, newpath: *const c_char) -> c_int {
    let old_c = CStr::from_ptr(oldpath);
    let new_c = CStr::from_ptr(newpath);
    let rewritten_old = rewrite(old_c);
    let rewritten_new = rewrite(new_c);
    let old_arg = rewritten_old.as_deref().map_or(oldpath, CStr::as_ptr);
    let new_arg = rewritten_new.as_deref().map_or(newpath, CStr::as_ptr);
    real(old_arg, new_arg)
}

/// # Safety
/// Same contract as [`link_impl`], plus the `*at` absolute-only rule on
/// each path independently.
pub unsafe fn linkat_impl(
    real: LinkAtFn,
    olddirfd: c_int,
    oldpath: *const c_char,
    newdirfd: c_int,
    newpath: *const c_char,
    flags: c_int,
) -> c_int {
    let old_c = CStr::from_ptr(oldpath);
    let new_c = CStr::from_ptr(newpath);
    let rewritten_old = rewrite_if_absolute(old_c);
    let rewritten_new = rewrite_if_absolute(new_c);
    let old_arg = rewritten_old.as_deref().map_or(oldpath, CStr::as_ptr);
    let new_arg = rewritten_new.as_deref().map_or(newpath, CStr::as_ptr);
    real(olddirfd, old_arg, newdirfd, new_arg)
}

/// # Safety
/// `path` must be a valid NUL-terminated C string.
pub unsafe fn truncate_impl(real: TruncateFn, path: *const c_char, length: libc::off_t) -> c_int {
    let cpath = CStr::from_ptr(path);
    match rewrite(cpath) {
        Some(new_path) => real(new_path.as_ptr(), length),
        None => real(path, length),
    }
}

/// # Safety
/// `path` and `mode` must each be valid NUL-terminated C strings, per
/// `fopen`'s contract.
pub unsafe fn fopen_impl(real: FopenFn, path: *const c_char, mode: *const c_char) -> *mut libc::FILE {
    let cpath = CStr::from_ptr(path);
    match rewrite(cpath) {
        Some(new_path) => real(new_path.as_ptr(), mode),
        None => real(path, mode),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;
    use std::sync::Mutex;

    static LAST_CALL: Mutex<Option<String>> = Mutex::new(None);

    unsafe extern "C" fn fake_open(path: *const c_char, _flags: c_int, _mode: libc::mode_t) -> c_int {
        let seen = CStr::from_ptr(path).to_string_lossy().into_owned();
        *LAST_CALL.lock().unwrap() = Some(seen);
        0
    }

    unsafe extern "C" fn fake_symlink(target: *const c_char, linkpath: *const c_char) -> c_int {
        let seen = format!(
            "{}->{}",
            CStr::from_ptr(linkpath).to_string_lossy(),
            CStr::from_ptr(target).to_string_lossy(),
        );
        *LAST_CALL.lock().unwrap() = Some(seen);
        0
    }

    #[test]
    fn symlink_impl_without_runtime_passes_through_both_paths() {
        let target = CString::new("/some/target").unwrap();
        let linkpath = CString::new("/some/link").unwrap();
        let rc = unsafe { symlink_impl(fake_symlink, target.as_ptr(), linkpath.as_ptr()) };
        assert_eq!(rc, 0);
        assert_eq!(LAST_CALL.lock().unwrap().as_deref(), Some("/some/link->/some/target"));
    }

    #[test]
    fn open_impl_without_runtime_passes_through_original_path() {
        // No TARGET/MAPPINGS set in this test process: remapper_core::init()
        // returns None, so the original path must reach the real function.
        let path = CString::new("/some/untouched/path").unwrap();
        let rc = unsafe { open_impl(fake_open, path.as_ptr(), libc::O_RDONLY, 0) };
        assert_eq!(rc, 0);
        assert_eq!(LAST_CALL.lock().unwrap().as_deref(), Some("/some/untouched/path"));
    }
}
