use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use city_geocoder::store::load_existing;
use city_geocoder::{
    BatchPlan, BatchProcessor, GeocoderConfig, GeocoderError, JsonFileStore, NominatimClient,
    RecordStore, ResumeDecision, RunSummary, logging,
};
use clap::Parser;
use tracing::info;

const RULE: &str = "============================================================";

#[derive(Debug, Parser)]
#[command(
    name = "city-geocoder",
    version,
    about = "Resumable batch geocoder that enriches city records with coordinates"
)]
struct Cli {
    /// Only re-run records that have no coordinates in the previous output
    #[arg(long)]
    retry: bool,

    /// Continue after the records already in the previous output
    #[arg(long, conflicts_with_all = ["restart", "retry"])]
    resume: bool,

    /// Discard the previous output and start over
    #[arg(long, conflicts_with = "retry")]
    restart: bool,

    /// Input file with the city list
    #[arg(long)]
    input: Option<PathBuf>,

    /// Output file, rewritten at every checkpoint
    #[arg(long)]
    output: Option<PathBuf>,

    /// Configuration file (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn decide(&self, summary: &RunSummary) -> ResumeDecision {
        if self.resume {
            ResumeDecision::Continue
        } else if self.restart {
            ResumeDecision::Restart
        } else {
            ask_resume(summary)
        }
    }
}

/// Interactive fallback when neither `--resume` nor `--restart` is given
fn ask_resume(summary: &RunSummary) -> ResumeDecision {
    println!("\nFound existing progress:");
    println!("- Total: {} entries", summary.total);
    println!("- Successful: {}", summary.successful);
    println!("- Failed: {}", summary.failed);
    print!("\nContinue from where it stopped? (y/n): ");
    let _ = io::stdout().flush();

    let mut answer = String::new();
    match io::stdin().read_line(&mut answer) {
        Ok(_) if answer.trim().eq_ignore_ascii_case("y") => ResumeDecision::Continue,
        _ => ResumeDecision::Restart,
    }
}

fn print_summary(summary: &RunSummary, output: &std::path::Path) {
    println!("\n{RULE}");
    println!("GEOCODING COMPLETE!");
    println!("{RULE}");
    println!("Total locations: {}", summary.total);
    println!("Successfully geocoded: {}", summary.successful);
    println!("Failed: {}", summary.failed);
    println!("Success rate: {:.1}%", summary.success_rate());
    println!("\nOutput saved to: {}", output.display());

    if summary.failed > 0 {
        println!("\nTo retry only failed cities, run:");
        println!("city-geocoder --retry");
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match GeocoderConfig::load_from_path(cli.config.clone()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e:#}");
            return ExitCode::FAILURE;
        }
    };
    if let Some(input) = &cli.input {
        config.batch.input_path = input.clone();
    }
    if let Some(output) = &cli.output {
        config.batch.output_path = output.clone();
    }

    if let Err(e) = logging::init(&config.logging, cli.verbose) {
        eprintln!("Error: {e:#}");
        return ExitCode::FAILURE;
    }

    println!("Indonesia Cities Geocoder v{}", city_geocoder::VERSION);
    println!("{RULE}");
    println!("Input file: {}", config.batch.input_path.display());
    println!("Output file: {}", config.batch.output_path.display());
    println!("{RULE}");
    if cli.retry {
        println!("\n*** RETRY MODE: Will retry only failed cities ***\n");
    }

    let store = JsonFileStore::new();
    let input = match store.load(&config.batch.input_path) {
        Ok(records) => records,
        Err(e) => {
            eprintln!("Error reading input file: {}", e.user_message());
            return ExitCode::FAILURE;
        }
    };

    let prior = load_existing(&store, &config.batch.output_path);
    let plan = BatchPlan::build(input, prior, cli.retry, |summary| cli.decide(summary));

    let geocoder = match NominatimClient::new(config.geocoding.clone())
        .context("Failed to set up geocoding client")
    {
        Ok(geocoder) => geocoder,
        Err(e) => {
            eprintln!("\nError: {e:?}");
            return ExitCode::FAILURE;
        }
    };

    let output_path = config.batch.output_path.clone();
    let mut processor = BatchProcessor::new(geocoder, store, output_path.clone())
        .with_checkpoint_interval(config.batch.checkpoint_interval);

    tokio::select! {
        result = processor.run(plan) => match result {
            Ok(summary) => {
                info!("Run finished");
                print_summary(&summary, &output_path);
                ExitCode::SUCCESS
            }
            Err(e @ GeocoderError::Storage { .. }) => {
                eprintln!("{}", e.user_message());
                ExitCode::FAILURE
            }
            Err(e) => {
                let e = anyhow::Error::new(e).context("Batch run failed");
                eprintln!("\nError: {e:?}");
                ExitCode::FAILURE
            }
        },
        _ = tokio::signal::ctrl_c() => {
            println!("\n\nStopped by user. Progress has been saved.");
            ExitCode::SUCCESS
        }
    }
}
