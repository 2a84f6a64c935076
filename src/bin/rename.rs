//! Bulk renamer for photos that have already been filed.
//!
//! ## Usage
//!
//! ```bash
//! herbarium-rename --dir successes/2024-03_successes --map newnames.csv
//! herbarium-rename --dir doubles --strip-prefix LACMIP --dry-run
//! ```

use anyhow::Result;
use std::path::PathBuf;
use tracing::info;

use herbarium_barcoder::config::LoggingConfig;
use herbarium_barcoder::logging;
use herbarium_barcoder::rename::{
    execute_plan, load_mappings, plan_mapped_renames, plan_prefix_strip, RenamePlan,
};

enum Mode {
    Map(PathBuf),
    StripPrefix(String),
}

struct RenameArgs {
    directory: PathBuf,
    mode: Mode,
    dry_run: bool,
}

fn main() -> Result<()> {
    let args = parse_args();

    let _ = logging::init(&LoggingConfig::default(), None);

    let plan = match &args.mode {
        Mode::Map(csv_path) => {
            let mappings = load_mappings(csv_path)?;
            info!("Loaded {} mappings from {:?}", mappings.len(), csv_path);
            plan_mapped_renames(&args.directory, &mappings)?
        }
        Mode::StripPrefix(prefix) => plan_prefix_strip(&args.directory, prefix)?,
    };

    print_plan(&plan);

    if args.dry_run {
        println!("Dry run: {} renames planned, nothing changed.", plan.operations.len());
        return Ok(());
    }

    let result = execute_plan(&plan);
    for (path, error) in &result.failed {
        eprintln!("Failed: {}: {}", path.display(), error);
    }
    println!(
        "{} renamed, {} failed, {} skipped.",
        result.succeeded.len(),
        result.failed.len(),
        plan.skipped.len()
    );

    if !result.failed.is_empty() {
        std::process::exit(1);
    }
    Ok(())
}

fn print_plan(plan: &RenamePlan) {
    for op in &plan.operations {
        println!(
            "{} -> {}",
            op.source.display(),
            op.destination
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default()
        );
    }
    for (path, reason) in &plan.skipped {
        println!("skip {}: {}", path.display(), reason);
    }
}

fn parse_args() -> RenameArgs {
    let args: Vec<String> = std::env::args().collect();
    let mut directory = None;
    let mut mode = None;
    let mut dry_run = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--dir" | "-d" => {
                directory = Some(PathBuf::from(required_value(&args, i)));
                i += 1;
            }
            "--map" | "-m" => {
                mode = Some(Mode::Map(PathBuf::from(required_value(&args, i))));
                i += 1;
            }
            "--strip-prefix" | "-s" => {
                mode = Some(Mode::StripPrefix(required_value(&args, i).to_string()));
                i += 1;
            }
            "--dry-run" | "-n" => {
                dry_run = true;
            }
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("herbarium-rename {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                print_help();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    let Some(mode) = mode else {
        eprintln!("Error: one of --map or --strip-prefix is required");
        print_help();
        std::process::exit(1);
    };

    RenameArgs {
        directory: directory.unwrap_or_else(|| PathBuf::from(".")),
        mode,
        dry_run,
    }
}

fn required_value(args: &[String], i: usize) -> &str {
    match args.get(i + 1) {
        Some(value) => value,
        None => {
            eprintln!("Error: {} requires a value", args[i]);
            std::process::exit(1);
        }
    }
}

fn print_help() {
    println!(
        r#"herbarium-rename - Rename filed specimen photos

USAGE:
    herbarium-rename [OPTIONS] (--map CSV | --strip-prefix PREFIX)

OPTIONS:
    --dir, -d DIR            Directory to rename in (default: current directory)
    --map, -m CSV            CSV with `original,new` columns; substitutes `new`
                             for `original` in matching file names
    --strip-prefix, -s P     Remove a leading `P_` and trailing `_a` from names
    --dry-run, -n            Print the plan without renaming anything
    --version, -V            Show version
    --help, -h               Show this help message

ENVIRONMENT:
    HERBARIUM_LOG            Log level (trace, debug, info, warn, error)

Files that would share a name are given `_a`, `_b`, ... suffixes in file-name
order before anything is renamed."#
    );
}
