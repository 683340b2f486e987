//! `xray-triage`: classify chest X-ray images in batch and export a CSV report.

mod classify;
mod config;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand, ValueEnum};
use log::LevelFilter;
use triage_core::faq;
use triage_engine::Quoting;
use triage_logging::LogDestination;

use crate::config::TriageConfig;

#[derive(Parser, Debug)]
#[command(
    name = "xray-triage",
    version,
    about = "Batch X-ray classification against an inference service"
)]
struct Args {
    /// Log level (off, error, warn, info, debug, trace)
    #[arg(short, long, default_value = "warn", global = true)]
    log_level: String,

    /// Also write the log to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// RON configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Classify images and write the report
    Classify(ClassifyArgs),

    /// Ask the assistant a question about the system
    Ask {
        /// Question text; prints a greeting when omitted
        question: Vec<String>,
    },
}

#[derive(clap::Args, Debug)]
pub struct ClassifyArgs {
    /// Image files, processed in the given order
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Inference service URL
    #[arg(long)]
    endpoint: Option<String>,

    /// Classification calls kept in flight at once
    #[arg(long)]
    concurrency: Option<usize>,

    /// Directory the report is written to
    #[arg(short, long, default_value = ".")]
    out_dir: PathBuf,

    /// Report filename stem; the date and `.csv` are appended
    #[arg(long)]
    stem: Option<String>,

    /// Field quoting for the report
    #[arg(long, value_enum)]
    quote: Option<QuoteMode>,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum QuoteMode {
    None,
    Minimal,
}

impl From<QuoteMode> for Quoting {
    fn from(mode: QuoteMode) -> Self {
        match mode {
            QuoteMode::None => Quoting::None,
            QuoteMode::Minimal => Quoting::Minimal,
        }
    }
}

impl ClassifyArgs {
    fn apply_to(&self, config: &mut TriageConfig) -> anyhow::Result<()> {
        if let Some(endpoint) = &self.endpoint {
            config.endpoint = endpoint.clone();
        }
        if let Some(concurrency) = self.concurrency {
            config.concurrency = concurrency;
        }
        if let Some(stem) = &self.stem {
            config.report.stem = stem.clone();
        }
        if let Some(quote) = self.quote {
            config.report.quoting = quote.into();
        }
        config.validate().context("invalid command line override")
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();

    let level: LevelFilter = args
        .log_level
        .parse()
        .map_err(|_| anyhow!("unknown log level {:?}", args.log_level))?;
    let destination = match args.log_file.clone() {
        Some(path) => LogDestination::Both(path),
        None => LogDestination::Terminal,
    };
    triage_logging::initialize(destination, level);

    match args.command {
        Command::Ask { question } => {
            let question = question.join(" ");
            println!("{}", faq::respond(&question).unwrap_or(faq::GREETING));
            Ok(ExitCode::SUCCESS)
        }
        Command::Classify(classify_args) => {
            let mut config = match &args.config {
                Some(path) => TriageConfig::load(path)?,
                None => TriageConfig::default(),
            };
            classify_args.apply_to(&mut config)?;
            classify::run(&classify_args, &config).await
        }
    }
}
