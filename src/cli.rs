/// CLI entry point for headless use
use crate::{
    commands,
    config::Config,
    core::{tree::render_tree, CommitRequest},
    services::PlanUpdate,
    state::AppState,
};
use futures::StreamExt;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug)]
pub enum CliCommand {
    Plan {
        root: PathBuf,
        json: bool,
    },
    Watch {
        root: PathBuf,
    },
    Commit {
        base: PathBuf,
        src: PathBuf,
        dst: PathBuf,
    },
    Health,
}

pub struct CliApp {
    state: AppState,
}

impl CliApp {
    /// Loads configuration, sets up logging and connects the AI provider
    pub async fn new() -> Result<Self, Box<dyn std::error::Error>> {
        dotenv::dotenv().ok();

        let config = Config::load()?;
        init_logging(&config);

        let state = AppState::new(config).await?;
        Ok(Self { state })
    }

    pub async fn execute(&self, command: CliCommand) -> Result<(), Box<dyn std::error::Error>> {
        match command {
            CliCommand::Plan { root, json } => {
                let plan = commands::compute_plan(&self.state, &root).await?;
                if json {
                    println!("{}", serde_json::to_string_pretty(&plan)?);
                } else {
                    print!("{}", render_tree(&root.display().to_string(), &plan));
                    println!("\n{} files", plan.len());
                }
            }

            CliCommand::Watch { root } => {
                let mut handle = commands::start_watch(&self.state, &root).await?;
                info!("Watching {} (Ctrl-C to stop)", root.display());

                loop {
                    tokio::select! {
                        _ = tokio::signal::ctrl_c() => {
                            info!("Interrupted");
                            break;
                        }
                        update = handle.updates().next() => match update {
                            Some(update) => {
                                println!("{}", serde_json::to_string(&update)?);
                                if let PlanUpdate::Terminated { error, .. } = &update {
                                    warn!("Session terminated: {}", error);
                                }
                            }
                            None => break,
                        }
                    }
                }

                handle.stop().await;
            }

            CliCommand::Commit { base, src, dst } => {
                let outcome = commands::commit(
                    &self.state,
                    CommitRequest {
                        base_path: base,
                        src_path: src,
                        dst_path: dst,
                    },
                )
                .await?;
                println!(
                    "Moved {} -> {}",
                    outcome.source.display(),
                    outcome.destination.display()
                );
            }

            CliCommand::Health => {
                let status = commands::health(&self.state).await;
                println!("{}", serde_json::to_string_pretty(&status)?);
            }
        }

        Ok(())
    }
}

/// `RUST_LOG` wins over the configured level
fn init_logging(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.get_log_filter()));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let result = if config.log_format == "json" {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    if let Err(e) = result {
        eprintln!("Logging already initialized: {}", e);
    }
}
