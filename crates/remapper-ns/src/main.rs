//! `remapper-ns`: the alternate-host namespace redirector.
//!
//! Used on hosts where library injection is unreliable for statically
//! linked programs. Instead of intercepting individual syscalls, this
//! binary discovers every filesystem entry a mapping matches, prepares an
//! empty placeholder for each at the target, enters a private user+mount
//! namespace, recursively bind-mounts each entry over its placeholder, and
//! execs the target program — never returning on success.
//!
//! Follows the usual Linux unprivileged-sandbox shape: deny setgroups,
//! write identity uid/gid maps, bind-mount, exec.

use std::ffi::CString;
use std::fs::File;
use std::path::{Path, PathBuf};

use clap::Parser;
use nix::mount::{mount, MsFlags};
use nix::sched::{unshare, CloneFlags};
use nix::unistd::execvp;
use remapper_schema::{Mapping, MappingTable};
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
enum NsError {
    #[error("failed to enter a private namespace: {0}")]
    Unshare(#[source] nix::Error),
    #[error("failed to write {0}: {1}")]
    IdMap(&'static str, #[source] std::io::Error),
    #[error("bind mount of {0:?} onto {1:?} failed: {2}")]
    Mount(PathBuf, PathBuf, #[source] nix::Error),
    #[error("exec of {0:?} failed: {1}")]
    Exec(PathBuf, #[source] nix::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Alternate-host namespace redirector: bind-mounts matched entries under
/// `target-dir`, then execs `program`.
#[derive(Parser, Debug)]
#[command(name = "remapper-ns", version)]
struct Args {
    /// Absolute directory entries are bind-mounted under.
    target_dir: PathBuf,

    /// Non-empty colon-separated list of absolute mapping paths, same
    /// format as the `MAPPINGS` environment contract.
    mappings: String,

    /// Program to exec once redirection is set up, followed by its args.
    #[arg(last = true, required = true)]
    program: Vec<String>,
}

fn main() {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();
    let args = Args::parse();

    if let Err(err) = run(&args) {
        warn!(error = %err, "namespace redirector failed");
        eprintln!("remapper-ns: {err}");
        if matches!(err, NsError::Unshare(_)) {
            eprintln!(
                "remapper-ns: unprivileged user namespaces may be disabled on this host \
                 (check /proc/sys/kernel/unprivileged_userns_clone or sysctl \
                 kernel.unprivileged_userns_clone)"
            );
        }
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), NsError> {
    let target = absolute(&args.target_dir);
    let mappings = parse_mappings(&args.mappings);
    let table = MappingTable::new(target.to_string_lossy(), mappings);

    let entries = discover(&table);
    if entries.is_empty() {
        warn!("no mapping matched any filesystem entry; executing target unmodified");
        return exec_program(&args.program);
    }

    for entry in &entries {
        prepare_placeholder(&target, entry)?;
    }

    enter_namespace()?;

    for entry in &entries {
        bind_mount(&target, entry)?;
    }

    exec_program(&args.program)
}

/// One filesystem entry discovered under a mapping's parent directory.
struct DiscoveredEntry {
    /// Absolute original path.
    source: PathBuf,
    /// Path relative to the mapping's parent, used to compute the
    /// placeholder location under `target`.
    relative: PathBuf,
    is_dir: bool,
}

/// Bound on discovered mount entries.
const MAX_MOUNT_ENTRIES: usize = 256;

fn discover(table: &MappingTable) -> Vec<DiscoveredEntry> {
    let mut found = Vec::new();
    'mappings: for mapping in table.mappings() {
        let parent = Path::new(mapping.parent());
        let Ok(read_dir) = std::fs::read_dir(parent) else {
            continue;
        };
        for entry in read_dir.flatten() {
            if found.len() >= MAX_MOUNT_ENTRIES {
                warn!(bound = MAX_MOUNT_ENTRIES, "mount entry bound reached, dropping remaining matches");
                break 'mappings;
            }
            let name = entry.file_name();
            let Some(name_str) = name.to_str() else {
                continue;
            };
            if !mapping.component_matches(name_str) {
                continue;
            }
            let Ok(metadata) = entry.metadata() else {
                continue;
            };
            found.push(DiscoveredEntry {
                source: entry.path(),
                relative: PathBuf::from(name_str),
                is_dir: metadata.is_dir(),
            });
        }
    }
    found
}

fn prepare_placeholder(target: &Path, entry: &DiscoveredEntry) -> Result<(), NsError> {
    let placeholder = target.join(&entry.relative);
    if let Some(parent) = placeholder.parent() {
        remapper_core::util::mkdirs(parent)?;
    }
    if entry.is_dir {
        remapper_core::util::mkdirs(&placeholder)?;
    } else if !placeholder.exists() {
        File::create(&placeholder)?;
    }
    Ok(())
}

fn enter_namespace() -> Result<(), NsError> {
    unshare(CloneFlags::CLONE_NEWUSER | CloneFlags::CLONE_NEWNS).map_err(NsError::Unshare)?;

    let uid = nix::unistd::getuid();
    let gid = nix::unistd::getgid();

    std::fs::write("/proc/self/setgroups", b"deny").map_err(|e| NsError::IdMap("setgroups", e))?;
    std::fs::write("/proc/self/uid_map", format!("{uid} {uid} 1\n")).map_err(|e| NsError::IdMap("uid_map", e))?;
    std::fs::write("/proc/self/gid_map", format!("{gid} {gid} 1\n")).map_err(|e| NsError::IdMap("gid_map", e))?;

    info!("entered private user+mount namespace with identity uid/gid mapping");
    Ok(())
}

fn bind_mount(target: &Path, entry: &DiscoveredEntry) -> Result<(), NsError> {
    let placeholder = target.join(&entry.relative);
    mount(
        Some(entry.source.as_path()),
        placeholder.as_path(),
        None::<&str>,
        MsFlags::MS_BIND | MsFlags::MS_REC,
        None::<&str>,
    )
    .map_err(|e| NsError::Mount(entry.source.clone(), placeholder, e))?;
    info!(from = %entry.source.display(), to = %placeholder.display(), "bind-mounted");
    Ok(())
}

fn exec_program(program_and_args: &[String]) -> Result<(), NsError> {
    let program = &program_and_args[0];
    let program_path = resolve_program(program);
    let argv: Vec<CString> = program_and_args
        .iter()
        .map(|s| CString::new(s.as_str()).unwrap_or_default())
        .collect();
    let program_c = CString::new(program_path.to_string_lossy().into_owned()).unwrap_or_default();

    execvp(&program_c, &argv).map_err(|e| NsError::Exec(program_path, e))?;
    unreachable!("execvp only returns on failure, which is handled above");
}

fn resolve_program(program: &str) -> PathBuf {
    if program.contains('/') {
        return PathBuf::from(program);
    }
    remapper_core::util::resolve_in_path(program).unwrap_or_else(|| PathBuf::from(program))
}

fn parse_mappings(raw: &str) -> Vec<Mapping> {
    raw.split(':')
        .filter_map(|entry| Mapping::parse(entry.trim()).ok())
        .collect()
}

fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_mappings_drops_malformed_entries() {
        let parsed = parse_mappings("/h/.dummy*:not-absolute:/p/s*");
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].parent(), "/h/");
        assert_eq!(parsed[1].parent(), "/p/");
    }

    #[test]
    fn discover_matches_entries_under_parent() {
        let dir = tempfile::tempdir().unwrap();
        let parent = dir.path().join("h");
        std::fs::create_dir_all(&parent).unwrap();
        std::fs::write(parent.join(".dummy-test"), b"x").unwrap();
        std::fs::write(parent.join("other"), b"y").unwrap();

        let mapping = Mapping::parse(&format!("{}/.dummy*", parent.display())).unwrap();
        let table = MappingTable::new("/t", vec![mapping]);
        let found = discover(&table);

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].relative, PathBuf::from(".dummy-test"));
        assert!(!found[0].is_dir);
    }

    #[test]
    fn discover_returns_empty_for_missing_parent() {
        let table = MappingTable::new("/t", vec![Mapping::parse("/nonexistent-parent-xyz/.dummy*").unwrap()]);
        assert!(discover(&table).is_empty());
    }
}
