mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use verdict_common::types::{Language, Mode};

#[derive(Parser)]
#[command(name = "verdict-cli")]
#[command(about = "Verdict CLI - Grade solutions and inspect exercise test data", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Run,
    Submit,
}

impl From<ModeArg> for Mode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::Run => Mode::Run,
            ModeArg::Submit => Mode::Submit,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Grade a source file against a question's test cases
    Grade {
        /// Question JSON file (test_cases, optional boilerplate)
        #[arg(short, long)]
        question: PathBuf,

        /// Source file to grade
        #[arg(short, long)]
        source: PathBuf,

        /// Language (java, python, cpp, c, javascript)
        #[arg(short, long)]
        language: Language,

        /// run uses visible cases, submit uses hidden ones
        #[arg(short, long, value_enum, default_value = "run")]
        mode: ModeArg,

        /// Treat the source as a solution region and merge it into the question's boilerplate
        #[arg(long, default_value = "false")]
        merge: bool,

        /// Print the full report as JSON
        #[arg(long, default_value = "false")]
        json: bool,
    },

    /// Show the atomic cases each test case record expands into
    Expand {
        /// Question JSON file
        #[arg(short, long)]
        question: PathBuf,

        /// Print cases as JSON
        #[arg(long, default_value = "false")]
        json: bool,
    },

    /// Print source with timing probes inserted at the RUNTIME CALC markers
    Instrument {
        /// Source file
        #[arg(short, long)]
        source: PathBuf,

        /// Language of the source
        #[arg(short, long)]
        language: Language,
    },

    /// List languages and their Judge0 ids
    ListLangs,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so --json output stays parseable
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Grade {
            question,
            source,
            language,
            mode,
            merge,
            json,
        } => {
            commands::grade(&question, &source, language, mode.into(), merge, json).await?;
        }
        Commands::Expand { question, json } => {
            commands::expand(&question, json)?;
        }
        Commands::Instrument { source, language } => {
            commands::instrument(&source, language)?;
        }
        Commands::ListLangs => {
            commands::list_languages()?;
        }
    }

    Ok(())
}
