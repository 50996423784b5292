//! `remapper`: the front-end CLI. Prepares the injection environment
//! (`TARGET`, `MAPPINGS`, `CONFIG`, `CACHE`, the platform injection
//! variable) and execs the target program with it — the component that
//! sits outside `remapper-core`, turning a handful of CLI arguments into
//! the environment contract the injected library reads on startup.
//!
//! The exec-wrapper grammar (`remapper [--debug-log <file>] <target-dir>
//! <mapping>... -- <program> [args...]`, or exactly one mapping when `--`
//! is absent) is ambiguous for `clap`'s derive positionals, so it is parsed
//! by hand in [`args`]; `remapper doctor` has an unambiguous grammar and
//! uses `clap` directly.

mod args;
mod doctor;
mod error;
mod inject;
mod paths;

use std::process::ExitCode;

use tracing_subscriber::EnvFilter;

use error::CliError;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let argv: Vec<String> = std::env::args().collect();
    let prog = argv.first().cloned().unwrap_or_else(|| "remapper".to_string());
    let rest = &argv[1..];

    match rest.first().map(String::as_str) {
        Some("doctor") => match doctor::run(&rest[1..]) {
            Ok(()) => ExitCode::SUCCESS,
            Err(err) => {
                eprintln!("remapper doctor: {err}");
                ExitCode::from(1)
            }
        },
        Some("--version") => {
            println!("remapper {}", env!("CARGO_PKG_VERSION"));
            ExitCode::SUCCESS
        }
        Some("--help" | "-h") => {
            print_usage(&prog);
            ExitCode::SUCCESS
        }
        _ => run_exec_wrapper(rest, &prog),
    }
}

fn run_exec_wrapper(rest: &[String], prog: &str) -> ExitCode {
    let parsed = match args::parse(rest) {
        Ok(parsed) => parsed,
        Err(err) => {
            eprintln!("remapper: {err}\n");
            print_usage(prog);
            return ExitCode::from(1);
        }
    };

    match inject::run(parsed) {
        Ok(()) => unreachable!("inject::run only returns on exec failure"),
        Err(CliError::Exec(path, err)) => {
            eprintln!("remapper: {path:?}: {err}");
            ExitCode::from(127)
        }
        Err(err) => {
            eprintln!("remapper: {err}");
            ExitCode::from(1)
        }
    }
}

fn print_usage(prog: &str) {
    eprintln!(
        "Usage: {prog} [--debug-log <file>] <target-dir> <mapping>... -- <program> [args...]\n\
         \n\
         Redirect filesystem paths matching <mapping> into <target-dir>.\n\
         \n\
         Mappings are full paths with optional globs in the last component.\n\
         Single-quote mappings to prevent shell glob expansion.\n\
         If '--' is absent, exactly one mapping is expected.\n\
         \n\
         Options:\n\
         \x20 --debug-log <file>   Log debug output to <file>\n\
         \n\
         Examples:\n\
         \x20 {prog} ~/v1 '~/.claude*' -- claude\n\
         \x20 {prog} ~/v1 '~/.codex*' codex --model X\n\
         \x20 {prog} --debug-log /tmp/rmp.log ~/v1 '~/.claude*' -- claude\n\
         \x20 {prog} doctor ~/v1 '~/.claude*'\n\
         \n\
         Environment variables:\n\
         \x20 CONFIG      Base directory (default: ~/.remapper/)\n\
         \x20 CACHE       Cache directory (default: $CONFIG/cache/)\n\
         \x20 DEBUG_LOG   Log file (enables debug logging when set)\n",
    );
}
