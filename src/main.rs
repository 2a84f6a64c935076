use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::mpsc;

use herbarium_barcoder::config::ArchivePolicy;
use herbarium_barcoder::{
    decoder, logging, BatchProgress, BatchRunner, Config, RunDate, TaxonomyTable,
};

/// Command line overrides applied on top of the config file.
#[derive(Default)]
struct CliArgs {
    config_path: Option<PathBuf>,
    input_dir: Option<PathBuf>,
    prefix: Option<String>,
    archive: Option<ArchivePolicy>,
}

fn parse_args() -> CliArgs {
    let args: Vec<String> = std::env::args().collect();
    let mut cli = CliArgs::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("herbarium-barcoder {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--config" | "-c" => {
                cli.config_path = Some(PathBuf::from(required_value(&args, i)));
                i += 1;
            }
            "--input" | "-i" => {
                cli.input_dir = Some(PathBuf::from(required_value(&args, i)));
                i += 1;
            }
            "--prefix" | "-p" => {
                cli.prefix = Some(required_value(&args, i).to_string());
                i += 1;
            }
            "--delete-originals" => {
                cli.archive = Some(ArchivePolicy::Delete);
            }
            "--move-originals" => {
                cli.archive = Some(ArchivePolicy::Move);
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                print_help();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    cli
}

fn required_value(args: &[String], i: usize) -> &str {
    match args.get(i + 1) {
        Some(value) => value,
        None => {
            eprintln!("Error: {} requires an argument", args[i]);
            std::process::exit(1);
        }
    }
}

fn print_help() {
    println!(
        r#"herbarium-barcoder - File herbarium photos by their barcodes

USAGE:
    herbarium-barcoder [OPTIONS]

OPTIONS:
    --config, -c PATH     Path to config file
    --input, -i DIR       Directory of photos to process
    --prefix, -p CODE     Collection code (e.g. LACMIP)
    --delete-originals    Delete originals after filing
    --move-originals      Move originals to the dated originals directory
    --version, -V         Show version
    --help, -h            Show this help message

ENVIRONMENT:
    HERBARIUM_CONFIG      Path to config file (overrides default location)
    HERBARIUM_LOG         Log level (trace, debug, info, warn, error)

Config file location: $XDG_CONFIG_HOME/herbarium-barcoder/config.toml"#
    );
}

fn load_config(cli: &CliArgs) -> Result<Config> {
    let mut config = match &cli.config_path {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    if let Some(dir) = &cli.input_dir {
        config.input_dir = dir.clone();
    }
    if let Some(prefix) = &cli.prefix {
        config.collection_prefix = prefix.clone();
    }
    if let Some(archive) = cli.archive {
        config.output.archive = archive;
    }

    Ok(config)
}

fn main() -> Result<()> {
    let cli = parse_args();

    let config = load_config(&cli)?;
    let _ = logging::init(&config.logging, Some(Config::config_dir().join("logs")));

    let taxonomy = TaxonomyTable::load(&config.taxonomy_path())?;
    let decoder = decoder::from_config(&config.decoder);

    let runner = BatchRunner::new(config, decoder, taxonomy, RunDate::now());
    let (tx, rx) = mpsc::channel();

    let handle = std::thread::spawn(move || runner.run(Some(tx)));

    for event in rx {
        match event {
            BatchProgress::Started { total_files } => {
                println!("Processing {} photos", total_files);
            }
            BatchProgress::Photo { status, .. } => println!("{}", status),
            BatchProgress::Completed { .. } => {}
        }
    }

    let result = handle
        .join()
        .map_err(|_| anyhow::anyhow!("Batch thread panicked"))?
        .context("Batch run failed")?;

    println!(
        "{} successes\n{} failures.\nThis run took {} seconds",
        result.stats.successes,
        result.stats.failures,
        result.elapsed.as_secs_f64().round()
    );

    Ok(())
}
