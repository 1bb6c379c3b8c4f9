//! EVIO file read-speed benchmark.
//!
//! Reads one or more EVIO v2/v3 files as a single stream and prints event
//! statistics and throughput.

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::Parser;
use evio_core::{
    write_report, EvioFileOpener, SchemaVersion, StreamAggregator, StreamConfig, StreamError,
    StreamObserver,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::process::ExitCode;

/// Benchmark EVIO file read speed.
///
/// All files are read in the given order and reported as one combined stream.
#[derive(Parser, Debug)]
#[command(name = "eviobench")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// EVIO file(s), version 2 or 3
    #[arg(value_name = "CODA-FILE", required = true, num_args = 1..)]
    files: Vec<String>,
}

/// Shows per-file progress on a spinner.
struct ProgressObserver {
    bar: ProgressBar,
}

impl ProgressObserver {
    fn new() -> Result<Self> {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {msg}")
                .context("Invalid progress template")?,
        );
        bar.set_message("Starting...");
        Ok(Self { bar })
    }

    fn note(&self, line: String) {
        self.bar.suspend(|| eprintln!("{}", line));
        self.bar.tick();
    }
}

impl StreamObserver for ProgressObserver {
    fn source_opened(&mut self, name: &str) {
        self.bar.set_message(format!("Reading {}...", name));
        self.note(format!("Opened {}", name));
    }

    fn version(&mut self, _name: &str, version: SchemaVersion) {
        self.note(format!("EVIO version {}", version));
    }

    fn milestone(&mut self, event_number: u32) {
        self.note(event_number.to_string());
    }

    fn source_finished(&mut self, _name: &str) {
        self.note("End of file".to_string());
    }
}

fn run(args: &Args) -> Result<()> {
    let mut observer = ProgressObserver::new()?;
    let aggregator = StreamAggregator::new(StreamConfig::default());

    let outcome = aggregator.process_all(&mut EvioFileOpener, &args.files, &mut observer);
    observer.bar.finish_and_clear();
    let report = outcome?;

    write_report(io::stdout().lock(), &report).context("Failed to write report")?;
    Ok(())
}

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            e.exit()
        }
        Err(e) => {
            let _ = e.print();
            return ExitCode::from(1);
        }
    };

    // Quiet by default; RUST_LOG=debug shows per-file and per-block detail
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            match e.downcast_ref::<StreamError>() {
                Some(stream_error) => eprintln!("{}", stream_error),
                None => eprintln!("Error: {:#}", e),
            }
            ExitCode::from(2)
        }
    }
}
