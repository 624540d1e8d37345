/// reshelve CLI - propose and apply directory reorganizations
use clap::{Parser, Subcommand};
use reshelve::cli::{CliApp, CliCommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "reshelve-cli")]
#[command(about = "LLM-assisted directory reorganization", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute a reorganization plan once
    Plan {
        /// Directory to organize
        root: PathBuf,

        /// Print the plan as JSON instead of a tree
        #[arg(long)]
        json: bool,
    },

    /// Watch a directory and print a new plan after each change
    Watch {
        /// Directory to watch
        root: PathBuf,
    },

    /// Move one file or directory as proposed by a plan
    Commit {
        /// Directory the relative paths are resolved against
        base: PathBuf,

        /// Current path, relative to base
        src: PathBuf,

        /// Destination path, relative to base
        dst: PathBuf,
    },

    /// Show AI provider status
    Health,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let app = match CliApp::new().await {
        Ok(app) => app,
        Err(e) => {
            eprintln!("Failed to initialize CLI app: {}", e);
            std::process::exit(1);
        }
    };

    let command = match cli.command {
        Commands::Plan { root, json } => CliCommand::Plan { root, json },
        Commands::Watch { root } => CliCommand::Watch { root },
        Commands::Commit { base, src, dst } => CliCommand::Commit { base, src, dst },
        Commands::Health => CliCommand::Health,
    };

    if let Err(e) = app.execute(command).await {
        eprintln!("Command failed: {}", e);
        std::process::exit(1);
    }
}
