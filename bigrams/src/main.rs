use std::process::ExitCode;

use bigrams::{
    core::spark::Spark,
    error::Result,
    pipeline::{self, HistogramEntry},
    Args, Config,
};
use clap::Parser;
use log::{error, LevelFilter, SetLoggerError};
use simplelog::{ColorChoice, TermLogger, TerminalMode};

fn init_logging(verbose: bool) -> std::result::Result<(), SetLoggerError> {
    let log_level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    TermLogger::init(
        log_level,
        simplelog::Config::default(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )
}

async fn run(args: Args) -> Result<Vec<HistogramEntry>> {
    let config = Config::load(&args)?;
    let lines = match &args.input {
        Some(path) => pipeline::read_lines(path).await?,
        None => pipeline::toy_corpus(),
    };
    let mut spark = Spark::new(&config).await;
    let mut histogram = pipeline::run(&mut spark, lines, config.partitions).await?;
    histogram.sort();
    Ok(histogram)
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    if let Err(e) = init_logging(args.verbose) {
        eprintln!("couldn't set up logging, continuing without it: {e}");
    }

    match run(args).await {
        Ok(histogram) => {
            println!("Histogram of how many bigrams share each count:");
            for entry in histogram {
                match serde_json::to_string(&entry) {
                    Ok(line) => println!("{line}"),
                    Err(e) => {
                        error!("couldn't print {entry:?}: {e}");
                        return ExitCode::FAILURE;
                    }
                }
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
