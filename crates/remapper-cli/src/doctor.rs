//! `remapper doctor`: a read-only diagnostic subcommand. Supplements the
//! exec-wrapper grammar with an operational surface that never touches a
//! target program, printing a health summary without mutating anything.

use std::path::Path;

use clap::Parser;

use crate::error::CliError;
use crate::inject;
use crate::paths;

#[derive(Parser, Debug)]
#[command(name = "remapper doctor", about = "Check config/cache reachability and print the resolved mapping table")]
pub struct DoctorArgs {
    /// Directory matched entries would be redirected into.
    target_dir: String,
    /// One or more mapping entries, same syntax as the exec-wrapper form.
    #[arg(required = true)]
    mappings: Vec<String>,
}

pub fn run(args: &[String]) -> Result<(), CliError> {
    let parsed = DoctorArgs::parse_from(std::iter::once("remapper doctor".to_string()).chain(args.iter().cloned()));
    let plan = inject::build_plan(&parsed.target_dir, &parsed.mappings)?;

    println!("target:         {}", plan.target.display());
    println!("mappings:");
    for mapping in &plan.mappings {
        println!("  - {}", mapping.display());
    }
    println!("config dir:     {} ({})", plan.config_dir.display(), reachability(&plan.config_dir));
    println!("cache dir:      {} ({})", plan.cache_dir.display(), reachability(&plan.cache_dir));
    println!("interpose lib:  {} ({})", plan.interpose_lib.display(), reachability(&plan.interpose_lib));
    println!("inject env var: {}", paths::inject_env_var());

    let codesign = remapper_core::util::resolve_in_path("codesign");
    match codesign {
        Some(path) => println!("signing tool:   {} (found)", path.display()),
        None => println!("signing tool:   codesign (not found on $PATH)"),
    }

    if plan.target.exists() && !plan.target.is_dir() {
        println!("warning:        target exists and is not a directory");
    }

    Ok(())
}

fn reachability(path: &Path) -> &'static str {
    if path.exists() {
        "exists"
    } else {
        "missing"
    }
}
