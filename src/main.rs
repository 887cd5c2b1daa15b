use anyhow::{Context, Result};
use clap::Parser;
use entroscan::api::{CsvStore, ProcessDetector, ScanConfig};
use entroscan::args::Cli;
use entroscan::discovery;
use entroscan::sample::NpyLoader;
use entroscan::scan;
use std::process;

fn main() {
    env_logger::init();
    if let Err(e) = run() {
        log::error!("Error: {:#}", e);
        process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    if !cli.root.exists() {
        println!(
            "{} does not exist. First create these haystacks",
            cli.root.display()
        );
        return Ok(());
    }

    let config = ScanConfig::resolve(cli.config.as_deref()).context("Failed to load configuration")?;
    let settings = cli.settings(&config)?;
    log::info!(
        "Scanning {} with detector '{}' ({}), geometry={}, sweep={}",
        cli.root.display(),
        settings.params.detector_type,
        settings.binary.display(),
        settings.params.geometry,
        settings.params.sweep
    );

    let pairs = discovery::discover(&cli.root, cli.subdir.as_deref())
        .with_context(|| format!("Failed to discover haystacks under {}", cli.root.display()))?;

    let detector = ProcessDetector::new(&settings.binary, settings.timeout)?;
    let output_file = cli.root.join(settings.params.detector_type.results_file_name());
    let mut store = CsvStore::new(&output_file);

    let outcome = scan::run_scan(
        &pairs,
        &detector,
        &NpyLoader,
        &settings.params,
        settings.policy,
        &mut store,
    )
    .with_context(|| format!("Scan failed; {} was not modified", output_file.display()))?;

    if !outcome.skipped.is_empty() {
        log::warn!("{} samples were skipped", outcome.skipped.len());
    }
    log::info!("{} rows in table after adding {}", outcome.table.len(), outcome.added);
    println!("Completed Scan! Checkout results in {}", store.path().display());
    Ok(())
}
