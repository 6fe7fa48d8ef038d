//! The `examguard` command-line interface.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "examguard", version, about = "Proctored exam session simulator")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a scripted exam attempt against a question set
    Simulate {
        /// Path to .toml question set
        #[arg(long)]
        question_set: PathBuf,

        /// Path to .toml script of host signals, answers and submit clicks
        #[arg(long)]
        script: PathBuf,

        /// Candidate id recorded on the attempt
        #[arg(long, default_value = "candidate")]
        user: String,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,

        /// Store attempts as JSON files in this directory
        #[arg(long)]
        store_dir: Option<PathBuf>,

        /// Violations that force submission (overrides config)
        #[arg(long)]
        max_violations: Option<usize>,

        /// Decline the proctoring rules at the consent screen
        #[arg(long)]
        decline_rules: bool,

        /// Run on the wall clock instead of replaying instantly
        #[arg(long)]
        realtime: bool,

        /// Output format: text, json
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Validate question set TOML files
    Validate {
        /// Path to question set file or directory
        #[arg(long)]
        question_set: PathBuf,
    },

    /// Summarize stored attempts
    Summary {
        /// Directory of stored attempt files
        #[arg(long)]
        store_dir: PathBuf,
    },

    /// Create starter config, question set and script
    Init,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("examguard=info")),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Simulate {
            question_set,
            script,
            user,
            config,
            store_dir,
            max_violations,
            decline_rules,
            realtime,
            format,
        } => {
            commands::simulate::execute(commands::simulate::SimulateArgs {
                question_set,
                script,
                user,
                config,
                store_dir,
                max_violations,
                decline_rules,
                realtime,
                format,
            })
            .await
        }
        Commands::Validate { question_set } => commands::validate::execute(question_set),
        Commands::Summary { store_dir } => commands::summary::execute(store_dir),
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
