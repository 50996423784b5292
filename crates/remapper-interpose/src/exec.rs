//! Component C: exec/spawn interposition.
//!
//! Resolves a bare program name via `$PATH`, consults the hardened-binary
//! cache, then the shebang pre-resolver, falling through to
//! the real call unmodified. A per-thread re-entrancy sentinel suppresses
//! recursive resolution while the signer/diagnostic child utilities those
//! two steps may spawn are themselves running.

use std::cell::Cell;
use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int};
use std::path::{Path, PathBuf};

use remapper_core::{resolve_shebang, CacheContext, DEFAULT_PROTECTED_PREFIXES};

thread_local! {
    /// Set while resolving an exec, so that a signer/diagnostic child this
    /// thread spawns does not recursively re-enter resolution.
    static RESOLVING: Cell<bool> = const { Cell::new(false) };
}

/// RAII guard that sets [`RESOLVING`] for its lifetime and always clears it
/// on drop, including on an early return or panic unwind.
struct ResolveGuard;

impl ResolveGuard {
    fn acquire() -> Option<Self> {
        let already = RESOLVING.with(Cell::get);
        if already {
            return None;
        }
        RESOLVING.with(|flag| flag.set(true));
        Some(Self)
    }
}

impl Drop for ResolveGuard {
    fn drop(&mut self) {
        RESOLVING.with(|flag| flag.set(false));
    }
}

/// The decision reached for a candidate exec target: either run the
/// original `program`/`argv` untouched, or run a substituted
/// program/argv pair (a cached hardened binary, or a cached interpreter
/// plus a rebuilt argv for a shebang substitution).
pub enum ExecPlan {
    /// No substitution: proceed with the caller's original arguments.
    Unchanged,
    /// Run `program` with `argv` instead of what the caller requested.
    Substitute { program: CString, argv: Vec<CString> },
}

/// Resolve what to actually exec for a candidate program path, given the
/// caller's original argv (`argv[0]` is the conventional program name, not
/// necessarily equal to `program`). Returns [`ExecPlan::Unchanged`] whenever
/// re-entrancy is detected, the cache is inert, or neither the hardened
/// cache nor the shebang pre-resolver substituted anything.
#[must_use]
pub fn plan_exec(program: &Path, original_argv: &[CString]) -> ExecPlan {
    let Some(guard) = ResolveGuard::acquire() else {
        return ExecPlan::Unchanged;
    };
    let plan = plan_exec_inner(program, original_argv);
    drop(guard);
    plan
}

fn plan_exec_inner(program: &Path, original_argv: &[CString]) -> ExecPlan {
    let Some(runtime) = remapper_core::init().as_ref() else {
        return ExecPlan::Unchanged;
    };

    let cached = remapper_core::cache::resolve_hardened(&runtime.cache, program, false);
    if cached != program {
        return substitute_program(&cached, original_argv);
    }

    if let Some(substitution) = resolve_shebang(&runtime.cache, DEFAULT_PROTECTED_PREFIXES, program) {
        let mut argv = Vec::with_capacity(original_argv.len() + 2);
        let interp_c = path_to_cstring(&substitution.interpreter);
        argv.push(interp_c.clone());
        if let Some(arg) = substitution.argument {
            if let Ok(arg_c) = CString::new(arg) {
                argv.push(arg_c);
            }
        }
        argv.extend(original_argv.iter().cloned());
        return ExecPlan::Substitute {
            program: interp_c,
            argv,
        };
    }

    ExecPlan::Unchanged
}

fn substitute_program(cached: &Path, original_argv: &[CString]) -> ExecPlan {
    let program = path_to_cstring(cached);
    let mut argv = Vec::with_capacity(original_argv.len());
    argv.push(program.clone());
    argv.extend(original_argv.iter().skip(1).cloned());
    ExecPlan::Substitute { program, argv }
}

fn path_to_cstring(path: &Path) -> CString {
    CString::new(path.as_os_str().as_encoded_bytes()).unwrap_or_else(|_| CString::new("").unwrap())
}

/// Resolve a bare program name (no `/`) against `$PATH`.
#[must_use]
pub fn resolve_bare_name(file: &CStr) -> Option<PathBuf> {
    let as_str = file.to_str().ok()?;
    if as_str.contains('/') {
        return Some(PathBuf::from(as_str));
    }
    remapper_core::util::resolve_in_path(as_str)
}

/// Exposed for callers that already hold a [`CacheContext`] (the namespace
/// redirector binary does not, but the interposer entry points do via
/// [`remapper_core::init`]).
pub fn is_hardened(ctx: &CacheContext, path: &Path) -> bool {
    remapper_core::cache::is_hardened(ctx, path)
}

type ExecveFn = unsafe extern "C" fn(*const c_char, *const *const c_char, *const *const c_char) -> c_int;

/// Shared body for `execve` (the real call never searches `$PATH`, so
/// `search_path` is always `false` here — kept as a parameter so this body
/// is reused verbatim by the `exec*p` family should a host need it).
///
/// # Safety
/// `path` must be a valid C string; `argv`/`envp` must each be a
/// NULL-terminated array of valid C string pointers, as required of any
/// `execve` caller.
pub unsafe fn execve_inception_body(
    real: ExecveFn,
    path: *const c_char,
    argv: *const *const c_char,
    envp: *const *const c_char,
) -> c_int {
    exec_like_body(real, path, argv, envp, false)
}

unsafe fn exec_like_body(real: ExecveFn, path: *const c_char, argv: *const *const c_char, envp: *const *const c_char, search_path: bool) -> c_int {
    let path_cstr = CStr::from_ptr(path);
    let Some(resolved) = resolve_target(path_cstr, search_path) else {
        return real(path, argv, envp);
    };

    let original_argv = collect_argv(argv);
    match plan_exec(&resolved, &original_argv) {
        ExecPlan::Unchanged => real(path, argv, envp),
        ExecPlan::Substitute { program, argv: new_argv } => {
            let ptrs = build_argv_ptrs(&new_argv);
            real(program.as_ptr(), ptrs.as_ptr(), envp)
        }
    }
}

fn resolve_target(path_cstr: &CStr, search_path: bool) -> Option<PathBuf> {
    if search_path {
        resolve_bare_name(path_cstr)
    } else {
        Some(PathBuf::from(path_cstr.to_string_lossy().into_owned()))
    }
}

unsafe fn collect_argv(argv: *const *const c_char) -> Vec<CString> {
    let mut out = Vec::new();
    let mut i = 0_isize;
    loop {
        let entry = *argv.offset(i);
        if entry.is_null() {
            break;
        }
        out.push(CStr::from_ptr(entry).to_owned());
        i += 1;
    }
    out
}

fn build_argv_ptrs(argv: &[CString]) -> Vec<*const c_char> {
    let mut ptrs: Vec<*const c_char> = argv.iter().map(|c| c.as_ptr()).collect();
    ptrs.push(std::ptr::null());
    ptrs
}

fn build_argv_ptrs_mut(argv: &[CString]) -> Vec<*mut c_char> {
    let mut ptrs: Vec<*mut c_char> = argv.iter().map(|c| c.as_ptr().cast_mut()).collect();
    ptrs.push(std::ptr::null_mut());
    ptrs
}

/// Signature shared by `execv` and `execvp` (neither takes an `envp`; both
/// inherit the caller's `environ`).
pub type ExecvFn = unsafe extern "C" fn(*const c_char, *const *const c_char) -> c_int;

/// # Safety
/// `path` must be a valid C string; `argv` must be a NULL-terminated array
/// of valid C string pointers, as required of any `execv` caller.
pub unsafe fn execv_inception_body(real: ExecvFn, path: *const c_char, argv: *const *const c_char) -> c_int {
    exec_like_body_no_envp(real, path, argv, false)
}

/// # Safety
/// Same contract as [`execv_inception_body`]; `path` is resolved against
/// `$PATH` first when it has no `/`.
pub unsafe fn execvp_inception_body(real: ExecvFn, path: *const c_char, argv: *const *const c_char) -> c_int {
    exec_like_body_no_envp(real, path, argv, true)
}

unsafe fn exec_like_body_no_envp(real: ExecvFn, path: *const c_char, argv: *const *const c_char, search_path: bool) -> c_int {
    let path_cstr = CStr::from_ptr(path);
    let Some(resolved) = resolve_target(path_cstr, search_path) else {
        return real(path, argv);
    };

    let original_argv = collect_argv(argv);
    match plan_exec(&resolved, &original_argv) {
        ExecPlan::Unchanged => real(path, argv),
        ExecPlan::Substitute { program, argv: new_argv } => {
            let ptrs = build_argv_ptrs(&new_argv);
            real(program.as_ptr(), ptrs.as_ptr())
        }
    }
}

/// Signature shared by `posix_spawn` and `posix_spawnp`.
pub type PosixSpawnFn = unsafe extern "C" fn(
    *mut libc::pid_t,
    *const c_char,
    *const libc::posix_spawn_file_actions_t,
    *const libc::posix_spawnattr_t,
    *const *mut c_char,
    *const *mut c_char,
) -> c_int;

/// # Safety
/// Same contract as [`execve_inception_body`], with the `argv`/`envp`
/// element type `posix_spawn` actually declares (`char *const[]`).
pub unsafe fn posix_spawn_inception_body(
    real: PosixSpawnFn,
    pid: *mut libc::pid_t,
    path: *const c_char,
    file_actions: *const libc::posix_spawn_file_actions_t,
    attrp: *const libc::posix_spawnattr_t,
    argv: *const *mut c_char,
    envp: *const *mut c_char,
) -> c_int {
    posix_spawn_like_body(real, pid, path, file_actions, attrp, argv, envp, false)
}

/// # Safety
/// Same contract as [`posix_spawn_inception_body`]; `path` is resolved
/// against `$PATH` first.
pub unsafe fn posix_spawnp_inception_body(
    real: PosixSpawnFn,
    pid: *mut libc::pid_t,
    path: *const c_char,
    file_actions: *const libc::posix_spawn_file_actions_t,
    attrp: *const libc::posix_spawnattr_t,
    argv: *const *mut c_char,
    envp: *const *mut c_char,
) -> c_int {
    posix_spawn_like_body(real, pid, path, file_actions, attrp, argv, envp, true)
}

#[allow(clippy::too_many_arguments)]
unsafe fn posix_spawn_like_body(
    real: PosixSpawnFn,
    pid: *mut libc::pid_t,
    path: *const c_char,
    file_actions: *const libc::posix_spawn_file_actions_t,
    attrp: *const libc::posix_spawnattr_t,
    argv: *const *mut c_char,
    envp: *const *mut c_char,
    search_path: bool,
) -> c_int {
    let path_cstr = CStr::from_ptr(path);
    let Some(resolved) = resolve_target(path_cstr, search_path) else {
        return real(pid, path, file_actions, attrp, argv, envp);
    };

    let original_argv = collect_argv(argv.cast());
    match plan_exec(&resolved, &original_argv) {
        ExecPlan::Unchanged => real(pid, path, file_actions, attrp, argv, envp),
        ExecPlan::Substitute { program, argv: new_argv } => {
            let ptrs = build_argv_ptrs_mut(&new_argv);
            real(pid, program.as_ptr(), file_actions, attrp, ptrs.as_ptr(), envp)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reentrant_plan_exec_short_circuits() {
        let _guard = ResolveGuard::acquire().unwrap();
        let argv = vec![CString::new("prog").unwrap()];
        assert!(matches!(plan_exec(Path::new("/bin/prog"), &argv), ExecPlan::Unchanged));
    }

    #[test]
    fn resolve_bare_name_with_slash_is_unchanged() {
        let file = CString::new("./local/prog").unwrap();
        assert_eq!(resolve_bare_name(&file), Some(PathBuf::from("./local/prog")));
    }

    static LAST_EXECV_CALL: std::sync::Mutex<Option<String>> = std::sync::Mutex::new(None);

    unsafe extern "C" fn fake_execv(path: *const c_char, _argv: *const *const c_char) -> c_int {
        let recorded = CStr::from_ptr(path).to_string_lossy().into_owned();
        *LAST_EXECV_CALL.lock().unwrap() = Some(recorded);
        0
    }

    #[test]
    fn execv_inception_body_without_runtime_passes_through_original_path() {
        // No TARGET/MAPPINGS configured in this test process, so
        // `remapper_core::init()` is inert and the original path reaches
        // the real function untouched.
        let path = CString::new("/some/untouched/prog").unwrap();
        let argv = [path.as_ptr(), std::ptr::null()];
        let rc = unsafe { execv_inception_body(fake_execv, path.as_ptr(), argv.as_ptr()) };
        assert_eq!(rc, 0);
        assert_eq!(LAST_EXECV_CALL.lock().unwrap().as_deref(), Some("/some/untouched/prog"));
    }
}
