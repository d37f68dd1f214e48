//! appraise CLI — the user-facing command-line interface.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "appraise", version, about = "Staff evaluation scoring and workflow tooling")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score an evaluation instance and show the breakdown
    Score {
        /// Path to an evaluation instance JSON file
        #[arg(long)]
        instance: PathBuf,

        /// Output format: text, json
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Compare a self-evaluation against its supervisor evaluation
    Compare {
        /// Self-evaluation instance JSON
        #[arg(long)]
        auto: PathBuf,

        /// Supervisor evaluation instance JSON
        #[arg(long)]
        supervisor: PathBuf,

        /// Output format: text, markdown, json
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Validate template JSON files
    Validate {
        /// Path to a template file or directory
        #[arg(long)]
        template: PathBuf,
    },

    /// Create starter config and example template
    Init,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("appraise=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Score { instance, format } => commands::score::execute(instance, format),
        Commands::Compare {
            auto,
            supervisor,
            format,
        } => commands::compare::execute(auto, supervisor, format),
        Commands::Validate { template } => commands::validate::execute(template),
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
