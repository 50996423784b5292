//! Builds the injection environment and execs the target program.
//!
//! Resolves the program, collapses a `#!/usr/bin/env <prog>` shim (the
//! kernel would otherwise exec `/usr/bin/env` itself, and a SIP-protected
//! `env` strips `DYLD_INSERT_LIBRARIES` before it ever reaches the real
//! interpreter), warns about a literal shebang pointing at a protected
//! prefix, pre-checks the final binary against the hardened-binary cache,
//! then `exec`s.

use std::ffi::OsString;
use std::io::Read;
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::Command;

use remapper_core::shebang::DEFAULT_PROTECTED_PREFIXES;
use remapper_core::CacheContext;
use tracing::{info, warn};

use crate::args::ParsedArgs;
use crate::error::CliError;
use crate::paths;

/// Resolved pieces of the injection environment, surfaced separately so
/// `doctor` can print them without actually exec'ing anything.
pub struct Plan {
    /// Absolute redirection target directory.
    pub target: PathBuf,
    /// Absolute mapping entries.
    pub mappings: Vec<PathBuf>,
    /// Resolved `CONFIG` directory.
    pub config_dir: PathBuf,
    /// Resolved `CACHE` directory.
    pub cache_dir: PathBuf,
    /// Path to the interposer library found next to this executable.
    pub interpose_lib: PathBuf,
}

/// Resolve target/mappings/config/cache/interposer-lib without exec'ing
/// anything, so `doctor` can print the same plan `run` would act on.
pub fn build_plan(target_dir: &str, mapping_args: &[String]) -> Result<Plan, CliError> {
    let target = paths::make_absolute(target_dir)?;
    let mappings = mapping_args.iter().map(|m| paths::make_absolute(m)).collect::<Result<Vec<_>, _>>()?;
    let config_dir = paths::resolve_config_dir()?;
    let cache_dir = paths::resolve_cache_dir(&config_dir)?;
    let interpose_lib = paths::locate_interpose_lib()?;
    Ok(Plan { target, mappings, config_dir, cache_dir, interpose_lib })
}

/// Run the exec-wrapper: build the environment, resolve shebangs/hardened
/// binaries, and replace this process with the target program. Only
/// returns on failure (`exec` never returns on success).
pub fn run(parsed: ParsedArgs) -> Result<(), CliError> {
    let plan = build_plan(&parsed.target_dir, &parsed.mappings)?;

    // Set on the child via `Command::env`, not `std::env::set_var` on this
    // process — the exec-wrapper's own environment is none of this
    // program's business, only the target's.
    let mut child_env: Vec<(&'static str, OsString)> = vec![
        ("CONFIG", plan.config_dir.clone().into_os_string()),
        ("CACHE", plan.cache_dir.clone().into_os_string()),
        ("TARGET", plan.target.clone().into_os_string()),
        ("MAPPINGS", join_mappings(&plan.mappings)),
        (paths::inject_env_var(), plan.interpose_lib.clone().into_os_string()),
    ];
    if let Some(debug_log) = &parsed.debug_log {
        child_env.push(("DEBUG_LOG", debug_log.clone().into_os_string()));
    }

    info!(
        target = %plan.target.display(),
        mappings = ?plan.mappings,
        config = %plan.config_dir.display(),
        cache = %plan.cache_dir.display(),
        interpose_lib = %plan.interpose_lib.display(),
        "prepared injection environment",
    );

    let ctx = CacheContext::new(plan.config_dir.clone(), plan.cache_dir.clone())?;

    let program = &parsed.program[0];
    let mut resolved = resolve_program(program);
    let mut exec_argv: Vec<OsString> = parsed.program.iter().map(OsString::from).collect();

    if let Some((interp, extra_arg)) = collapse_env_shebang(&resolved) {
        let mut rewritten = vec![interp.clone().into_os_string()];
        if let Some(arg) = extra_arg {
            rewritten.push(OsString::from(arg));
        }
        rewritten.push(resolved.clone().into_os_string());
        rewritten.extend(exec_argv.into_iter().skip(1));
        info!(shebang_interpreter = %interp.display(), "collapsed #!/usr/bin/env shim");
        exec_argv = rewritten;
        resolved = interp;
    } else {
        warn_if_protected_shebang(&resolved);
    }

    let cached = remapper_core::cache::resolve_hardened(&ctx, &resolved, false);
    if cached != resolved {
        info!(original = %resolved.display(), cached = %cached.display(), "hardened binary detected, using cached signed copy");
        exec_argv[0] = cached.clone().into_os_string();
        resolved = cached;
    }

    let err = Command::new(&resolved).args(&exec_argv[1..]).envs(child_env).exec();
    Err(CliError::Exec(resolved, err))
}

fn join_mappings(mappings: &[PathBuf]) -> OsString {
    let mut joined = OsString::new();
    for (i, mapping) in mappings.iter().enumerate() {
        if i > 0 {
            joined.push(":");
        }
        joined.push(mapping.as_os_str());
    }
    joined
}

fn resolve_program(program: &str) -> PathBuf {
    if program.contains('/') {
        return PathBuf::from(program);
    }
    remapper_core::util::resolve_in_path(program).unwrap_or_else(|| PathBuf::from(program))
}

/// Collapse `#!/usr/bin/env <prog> [arg]` into a direct exec of the
/// resolved interpreter. Returns `None` for every other shebang shape
/// (including no shebang at all), leaving the runtime interposer's own
/// resolution to cover a literal interpreter path.
fn collapse_env_shebang(path: &Path) -> Option<(PathBuf, Option<String>)> {
    let mut file = std::fs::File::open(path).ok()?;
    let mut buf = [0_u8; 512];
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
    let rest = line.strip_prefix("/usr/bin/env ")?.trim_start();

    let (prog, extra) = match rest.split_once(' ') {
        Some((prog, extra)) => (prog, (!extra.trim().is_empty()).then(|| extra.trim().to_string())),
        None => (rest, None),
    };
    if prog.is_empty() {
        return None;
    }
    let resolved = remapper_core::util::resolve_in_path(prog)?;
    Some((resolved, extra))
}

/// Mirrors the original CLI's stderr warning: a literal shebang pointing
/// at a SIP/kernel-protected prefix will have its injected environment
/// variable stripped when the kernel itself execs the interpreter, so
/// interposition silently does not apply. The hardened-binary cache still
/// covers this for a binary invoked directly; a script's shebang line is
/// outside that mechanism's reach.
fn warn_if_protected_shebang(path: &Path) {
    let Ok(mut file) = std::fs::File::open(path) else { return };
    let mut buf = [0_u8; 512];
    let Ok(len) = file.read(&mut buf) else { return };
    let head = &buf[..len];
    if !head.starts_with(b"#!") {
        return;
    }
    let line_end = head.iter().position(|&b| b == b'\n').unwrap_or(head.len());
    let Ok(line) = std::str::from_utf8(&head[2..line_end]) else { return };
    let interp = line.trim_start();
    if DEFAULT_PROTECTED_PREFIXES.iter().any(|prefix| interp.starts_with(prefix)) {
        eprintln!(
            "remapper: warning: {} uses shebang '{interp}'\n\
             \x20 this interpreter lives on a protected prefix and may strip the injected\n\
             \x20 environment variable before interposition can take effect.",
            path.display(),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapse_env_shebang_ignores_plain_script() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("plain.sh");
        std::fs::write(&script, b"#!/bin/sh\necho hi\n").unwrap();
        assert!(collapse_env_shebang(&script).is_none());
    }

    #[test]
    fn collapse_env_shebang_resolves_env_prog() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("script.py");
        std::fs::write(&script, b"#!/usr/bin/env ls\nprint('hi')\n").unwrap();
        let found = collapse_env_shebang(&script);
        assert!(found.is_some());
    }

    #[test]
    fn join_mappings_colon_separates() {
        let mappings = vec![PathBuf::from("/h/.a*"), PathBuf::from("/h/.b*")];
        assert_eq!(join_mappings(&mappings), OsString::from("/h/.a*:/h/.b*"));
    }
}
