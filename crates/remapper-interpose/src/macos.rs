//! macOS realization of Components B/C: the `__DATA,__interpose` linker
//! section mechanism (Apple's `DYLD_INTERPOSE`).
//!
//! Each `IT_*` static tells `dyld` "route every call to `old_func`'s symbol,
//! from any image, to `new_func` instead." The `real_*` extern declarations
//! are bound directly to the original libc symbol and called from inside
//! the `*_inception` bodies to reach the true implementation.

use std::os::raw::{c_char, c_int};

use crate::fs;

#[repr(C)]
struct Interpose {
    new_func: *const (),
    old_func: *const (),
}

// SAFETY: these are plain data pointers into this image's own code and into
// libc; dyld only ever reads them.
unsafe impl Sync for Interpose {}

extern "C" {
    #[link_name = "open"]
    fn real_open(path: *const c_char, flags: c_int, mode: libc::mode_t) -> c_int;
    #[link_name = "openat"]
    fn real_openat(dirfd: c_int, path: *const c_char, flags: c_int, mode: libc::mode_t) -> c_int;
    #[link_name = "stat"]
    fn real_stat(path: *const c_char, buf: *mut libc::stat) -> c_int;
    #[link_name = "lstat"]
    fn real_lstat(path: *const c_char, buf: *mut libc::stat) -> c_int;
    #[link_name = "fstatat"]
    fn real_fstatat(dirfd: c_int, path: *const c_char, buf: *mut libc::stat, flags: c_int) -> c_int;
    #[link_name = "access"]
    fn real_access(path: *const c_char, mode: c_int) -> c_int;
    #[link_name = "faccessat"]
    fn real_faccessat(dirfd: c_int, path: *const c_char, mode: c_int, flags: c_int) -> c_int;
    #[link_name = "mkdir"]
    fn real_mkdir(path: *const c_char, mode: libc::mode_t) -> c_int;
    #[link_name = "mkdirat"]
    fn real_mkdirat(dirfd: c_int, path: *const c_char, mode: libc::mode_t) -> c_int;
    #[link_name = "unlink"]
    fn real_unlink(path: *const c_char) -> c_int;
    #[link_name = "unlinkat"]
    fn real_unlinkat(dirfd: c_int, path: *const c_char, flags: c_int) -> c_int;
    #[link_name = "rmdir"]
    fn real_rmdir(path: *const c_char) -> c_int;
    #[link_name = "rename"]
    fn real_rename(old: *const c_char, new: *const c_char) -> c_int;
    #[link_name = "renameat"]
    fn real_renameat(old_dirfd: c_int, old: *const c_char, new_dirfd: c_int, new: *const c_char) -> c_int;
    #[link_name = "readlink"]
    fn real_readlink(path: *const c_char, buf: *mut c_char, bufsize: usize) -> isize;
    #[link_name = "readlinkat"]
    fn real_readlinkat(dirfd: c_int, path: *const c_char, buf: *mut c_char, bufsize: usize) -> isize;
    #[link_name = "chmod"]
    fn real_chmod(path: *const c_char, mode: libc::mode_t) -> c_int;
    #[link_name = "fchmodat"]
    fn real_fchmodat(dirfd: c_int, path: *const c_char, mode: libc::mode_t, flags: c_int) -> c_int;
    #[link_name = "realpath"]
    fn real_realpath(path: *const c_char, resolved: *mut c_char) -> *mut c_char;
    #[link_name = "creat"]
    fn real_creat(path: *const c_char, mode: libc::mode_t) -> c_int;
    #[link_name = "opendir"]
    fn real_opendir(path: *const c_char) -> *mut libc::DIR;
    #[link_name = "chdir"]
    fn real_chdir(path: *const c_char) -> c_int;
    #[link_name = "chown"]
    fn real_chown(path: *const c_char, uid: libc::uid_t, gid: libc::gid_t) -> c_int;
    #[link_name = "lchown"]
    fn real_lchown(path: *const c_char, uid: libc::uid_t, gid: libc::gid_t) -> c_int;
    #[link_name = "fchownat"]
    fn real_fchownat(dirfd: c_int, path: *const c_char, uid: libc::uid_t, gid: libc::gid_t, flags: c_int) -> c_int;
    #[link_name = "symlink"]
    fn real_symlink(target: *const c_char, linkpath: *const c_char) -> c_int;
    #[link_name = "symlinkat"]
    fn real_symlinkat(target: *const c_char, newdirfd: c_int, linkpath: *const c_char) -> c_int;
    #[link_name = "link"]
    fn real_link(oldpath: *const c_char, newpath: *const c_char) -> c_int;
    #[link_name = "linkat"]
    fn real_linkat(olddirfd: c_int, oldpath: *const c_char, newdirfd: c_int, newpath: *const c_char, flags: c_int) -> c_int;
    #[link_name = "truncate"]
    fn real_truncate(path: *const c_char, length: libc::off_t) -> c_int;
    #[link_name = "fopen"]
    fn real_fopen(path: *const c_char, mode: *const c_char) -> *mut libc::FILE;
    // The `$NOCANCEL` and `$DARWIN_EXTSN` suffixes name distinct symbols in
    // libSystem: the cancellation-point and legacy-ABI variants callers may
    // bind against instead of the plain name, depending on SDK version and
    // optimization settings. Each needs its own interpose entry below.
    #[link_name = "open$NOCANCEL"]
    fn real_open_nocancel(path: *const c_char, flags: c_int, mode: libc::mode_t) -> c_int;
    #[link_name = "openat$NOCANCEL"]
    fn real_openat_nocancel(dirfd: c_int, path: *const c_char, flags: c_int, mode: libc::mode_t) -> c_int;
    #[link_name = "fopen$DARWIN_EXTSN"]
    fn real_fopen_darwin_extsn(path: *const c_char, mode: *const c_char) -> *mut libc::FILE;
    #[link_name = "realpath$DARWIN_EXTSN"]
    fn real_realpath_darwin_extsn(path: *const c_char, resolved: *mut c_char) -> *mut c_char;
    #[link_name = "execve"]
    fn real_execve(path: *const c_char, argv: *const *const c_char, envp: *const *const c_char) -> c_int;
    #[link_name = "execv"]
    fn real_execv(path: *const c_char, argv: *const *const c_char) -> c_int;
    #[link_name = "execvp"]
    fn real_execvp(path: *const c_char, argv: *const *const c_char) -> c_int;
    #[link_name = "posix_spawn"]
    fn real_posix_spawn(
        pid: *mut libc::pid_t,
        path: *const c_char,
        file_actions: *const libc::posix_spawn_file_actions_t,
        attrp: *const libc::posix_spawnattr_t,
        argv: *const *mut c_char,
        envp: *const *mut c_char,
    ) -> c_int;
    #[link_name = "posix_spawnp"]
    fn real_posix_spawnp(
        pid: *mut libc::pid_t,
        path: *const c_char,
        file_actions: *const libc::posix_spawn_file_actions_t,
        attrp: *const libc::posix_spawnattr_t,
        argv: *const *mut c_char,
        envp: *const *mut c_char,
    ) -> c_int;
}

unsafe extern "C" fn open_inception(path: *const c_char, flags: c_int, mode: libc::mode_t) -> c_int {
    fs::open_impl(real_open, path, flags, mode)
}
unsafe extern "C" fn openat_inception(dirfd: c_int, path: *const c_char, flags: c_int, mode: libc::mode_t) -> c_int {
    fs::openat_impl(real_openat, dirfd, path, flags, mode)
}
unsafe extern "C" fn stat_inception(path: *const c_char, buf: *mut libc::stat) -> c_int {
    fs::stat_impl(real_stat, path, buf)
}
unsafe extern "C" fn lstat_inception(path: *const c_char, buf: *mut libc::stat) -> c_int {
    fs::stat_impl(real_lstat, path, buf)
}
unsafe extern "C" fn fstatat_inception(dirfd: c_int, path: *const c_char, buf: *mut libc::stat, flags: c_int) -> c_int {
    fs::fstatat_impl(real_fstatat, dirfd, path, buf, flags)
}
unsafe extern "C" fn access_inception(path: *const c_char, mode: c_int) -> c_int {
    fs::access_impl(real_access, path, mode)
}
unsafe extern "C" fn faccessat_inception(dirfd: c_int, path: *const c_char, mode: c_int, flags: c_int) -> c_int {
    fs::faccessat_impl(real_faccessat, dirfd, path, mode, flags)
}
unsafe extern "C" fn mkdir_inception(path: *const c_char, mode: libc::mode_t) -> c_int {
    fs::mkdir_impl(real_mkdir, path, mode)
}
unsafe extern "C" fn mkdirat_inception(dirfd: c_int, path: *const c_char, mode: libc::mode_t) -> c_int {
    fs::mkdirat_impl(real_mkdirat, dirfd, path, mode)
}
unsafe extern "C" fn unlink_inception(path: *const c_char) -> c_int {
    fs::unlink_impl(real_unlink, path)
}
unsafe extern "C" fn unlinkat_inception(dirfd: c_int, path: *const c_char, flags: c_int) -> c_int {
    fs::unlinkat_impl(real_unlinkat, dirfd, path, flags)
}
unsafe extern "C" fn rmdir_inception(path: *const c_char) -> c_int {
    fs::rmdir_impl(real_rmdir, path)
}
unsafe extern "C" fn rename_inception(old: *const c_char, new: *const c_char) -> c_int {
    fs::rename_impl(real_rename, old, new)
}
unsafe extern "C" fn renameat_inception(old_dirfd: c_int, old: *const c_char, new_dirfd: c_int, new: *const c_char) -> c_int {
    fs::renameat_impl(real_renameat, old_dirfd, old, new_dirfd, new)
}
unsafe extern "C" fn readlink_inception(path: *const c_char, buf: *mut c_char, bufsize: usize) -> isize {
    fs::readlink_impl(real_readlink, path, buf, bufsize)
}
unsafe extern "C" fn readlinkat_inception(dirfd: c_int, path: *const c_char, buf: *mut c_char, bufsize: usize) -> isize {
    fs::readlinkat_impl(real_readlinkat, dirfd, path, buf, bufsize)
}
unsafe extern "C" fn chmod_inception(path: *const c_char, mode: libc::mode_t) -> c_int {
    fs::chmod_impl(real_chmod, path, mode)
}
unsafe extern "C" fn fchmodat_inception(dirfd: c_int, path: *const c_char, mode: libc::mode_t, flags: c_int) -> c_int {
    fs::fchmodat_impl(real_fchmodat, dirfd, path, mode, flags)
}
unsafe extern "C" fn realpath_inception(path: *const c_char, resolved: *mut c_char) -> *mut c_char {
    fs::realpath_impl(real_realpath, path, resolved)
}
unsafe extern "C" fn creat_inception(path: *const c_char, mode: libc::mode_t) -> c_int {
    fs::creat_impl(real_creat, path, mode)
}
unsafe extern "C" fn opendir_inception(path: *const c_char) -> *mut libc::DIR {
    fs::opendir_impl(real_opendir, path)
}
unsafe extern "C" fn chdir_inception(path: *const c_char) -> c_int {
    fs::chdir_impl(real_chdir, path)
}
unsafe extern "C" fn chown_inception(path: *const c_char, uid: libc::uid_t, gid: libc::gid_t) -> c_int {
    fs::chown_impl(real_chown, path, uid, gid)
}
unsafe extern "C" fn lchown_inception(path: *const c_char, uid: libc::uid_t, gid: libc::gid_t) -> c_int {
    fs::chown_impl(real_lchown, path, uid, gid)
}
unsafe extern "C" fn fchownat_inception(dirfd: c_int, path: *const c_char, uid: libc::uid_t, gid: libc::gid_t, flags: c_int) -> c_int {
    fs::fchownat_impl(real_fchownat, dirfd, path, uid, gid, flags)
}
unsafe extern "C" fn symlink_inception(target: *const c_char, linkpath: *const c_char) -> c_int {
    fs::symlink_impl(real_symlink, target, linkpath)
}
unsafe extern "C" fn symlinkat_inception(target: *const c_char, newdirfd: c_int, linkpath: *const c_char) -> c_int {
    fs::symlinkat_impl(real_symlinkat, target, newdirfd, linkpath)
}
unsafe extern "C" fn link_inception(oldpath: *const c_char, newpath: *const c_char) -> c_int {
    fs::link_impl(real_link, oldpath, newpath)
}
unsafe extern "C" fn linkat_inception(olddirfd: c_int, oldpath: *const c_char, newdirfd: c_int, newpath: *const c_char, flags: c_int) -> c_int {
    fs::linkat_impl(real_linkat, olddirfd, oldpath, newdirfd, newpath, flags)
}
unsafe extern "C" fn truncate_inception(path: *const c_char, length: libc::off_t) -> c_int {
    fs::truncate_impl(real_truncate, path, length)
}
unsafe extern "C" fn fopen_inception(path: *const c_char, mode: *const c_char) -> *mut libc::FILE {
    fs::fopen_impl(real_fopen, path, mode)
}
unsafe extern "C" fn open_nocancel_inception(path: *const c_char, flags: c_int, mode: libc::mode_t) -> c_int {
    fs::open_impl(real_open_nocancel, path, flags, mode)
}
unsafe extern "C" fn openat_nocancel_inception(dirfd: c_int, path: *const c_char, flags: c_int, mode: libc::mode_t) -> c_int {
    fs::openat_impl(real_openat_nocancel, dirfd, path, flags, mode)
}
unsafe extern "C" fn fopen_darwin_extsn_inception(path: *const c_char, mode: *const c_char) -> *mut libc::FILE {
    fs::fopen_impl(real_fopen_darwin_extsn, path, mode)
}
unsafe extern "C" fn realpath_darwin_extsn_inception(path: *const c_char, resolved: *mut c_char) -> *mut c_char {
    fs::realpath_impl(real_realpath_darwin_extsn, path, resolved)
}

unsafe extern "C" fn execve_inception(path: *const c_char, argv: *const *const c_char, envp: *const *const c_char) -> c_int {
    crate::exec::execve_inception_body(real_execve, path, argv, envp)
}
unsafe extern "C" fn execv_inception(path: *const c_char, argv: *const *const c_char) -> c_int {
    crate::exec::execv_inception_body(real_execv, path, argv)
}
unsafe extern "C" fn execvp_inception(path: *const c_char, argv: *const *const c_char) -> c_int {
    crate::exec::execvp_inception_body(real_execvp, path, argv)
}
unsafe extern "C" fn posix_spawn_inception(
    pid: *mut libc::pid_t,
    path: *const c_char,
    file_actions: *const libc::posix_spawn_file_actions_t,
    attrp: *const libc::posix_spawnattr_t,
    argv: *const *mut c_char,
    envp: *const *mut c_char,
) -> c_int {
    crate::exec::posix_spawn_inception_body(real_posix_spawn, pid, path, file_actions, attrp, argv, envp)
}
unsafe extern "C" fn posix_spawnp_inception(
    pid: *mut libc::pid_t,
    path: *const c_char,
    file_actions: *const libc::posix_spawn_file_actions_t,
    attrp: *const libc::posix_spawnattr_t,
    argv: *const *mut c_char,
    envp: *const *mut c_char,
) -> c_int {
    crate::exec::posix_spawnp_inception_body(real_posix_spawnp, pid, path, file_actions, attrp, argv, envp)
}

macro_rules! interpose_entry {
    ($name:ident, $new:expr, $old:expr) => {
        #[used]
        #[link_section = "__DATA,__interpose"]
        static $name: Interpose = Interpose {
            new_func: $new as *const (),
            old_func: $old as *const (),
        };
    };
}

interpose_entry!(IT_OPEN, open_inception, real_open);
interpose_entry!(IT_OPENAT, openat_inception, real_openat);
interpose_entry!(IT_STAT, stat_inception, real_stat);
interpose_entry!(IT_LSTAT, lstat_inception, real_lstat);
interpose_entry!(IT_FSTATAT, fstatat_inception, real_fstatat);
interpose_entry!(IT_ACCESS, access_inception, real_access);
interpose_entry!(IT_FACCESSAT, faccessat_inception, real_faccessat);
interpose_entry!(IT_MKDIR, mkdir_inception, real_mkdir);
interpose_entry!(IT_MKDIRAT, mkdirat_inception, real_mkdirat);
interpose_entry!(IT_UNLINK, unlink_inception, real_unlink);
interpose_entry!(IT_UNLINKAT, unlinkat_inception, real_unlinkat);
interpose_entry!(IT_RMDIR, rmdir_inception, real_rmdir);
interpose_entry!(IT_RENAME, rename_inception, real_rename);
interpose_entry!(IT_RENAMEAT, renameat_inception, real_renameat);
interpose_entry!(IT_READLINK, readlink_inception, real_readlink);
interpose_entry!(IT_READLINKAT, readlinkat_inception, real_readlinkat);
interpose_entry!(IT_CHMOD, chmod_inception, real_chmod);
interpose_entry!(IT_FCHMODAT, fchmodat_inception, real_fchmodat);
interpose_entry!(IT_REALPATH, realpath_inception, real_realpath);
interpose_entry!(IT_CREAT, creat_inception, real_creat);
interpose_entry!(IT_OPENDIR, opendir_inception, real_opendir);
interpose_entry!(IT_CHDIR, chdir_inception, real_chdir);
interpose_entry!(IT_CHOWN, chown_inception, real_chown);
interpose_entry!(IT_LCHOWN, lchown_inception, real_lchown);
interpose_entry!(IT_FCHOWNAT, fchownat_inception, real_fchownat);
interpose_entry!(IT_SYMLINK, symlink_inception, real_symlink);
interpose_entry!(IT_SYMLINKAT, symlinkat_inception, real_symlinkat);
interpose_entry!(IT_LINK, link_inception, real_link);
interpose_entry!(IT_LINKAT, linkat_inception, real_linkat);
interpose_entry!(IT_TRUNCATE, truncate_inception, real_truncate);
interpose_entry!(IT_FOPEN, fopen_inception, real_fopen);
interpose_entry!(IT_OPEN_NOCANCEL, open_nocancel_inception, real_open_nocancel);
interpose_entry!(IT_OPENAT_NOCANCEL, openat_nocancel_inception, real_openat_nocancel);
interpose_entry!(IT_FOPEN_DARWIN_EXTSN, fopen_darwin_extsn_inception, real_fopen_darwin_extsn);
interpose_entry!(IT_REALPATH_DARWIN_EXTSN, realpath_darwin_extsn_inception, real_realpath_darwin_extsn);
interpose_entry!(IT_EXECVE, execve_inception, real_execve);
interpose_entry!(IT_EXECV, execv_inception, real_execv);
interpose_entry!(IT_EXECVP, execvp_inception, real_execvp);
interpose_entry!(IT_POSIX_SPAWN, posix_spawn_inception, real_posix_spawn);
interpose_entry!(IT_POSIX_SPAWNP, posix_spawnp_inception, real_posix_spawnp);
