//! filestore: operate a local or GitHub-backed file store from the shell.
//!
//! ```text
//! filestore [--backend local|github] [--root DIR] <command>
//! filestore put notes/today.md "# Today"
//! filestore search todo --content --extension .md
//! filestore --backend github --github-owner octo --github-repo notes commit files.json
//! ```
//!
//! Results are printed as JSON on stdout; logs go to stderr.

mod commands;
mod config;

use std::sync::Arc;

use clap::Parser;
use filestore_core::StoreRepository;
use filestore_github::GitHubRepository;
use filestore_local::LocalRepository;
use filestore_service::{ServiceError, StoreService};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use commands::{Backend, Command};
use config::{BackendKind, Config};

#[derive(Parser, Debug)]
#[command(name = "filestore", version, about = "Read and write files in a local or GitHub-backed store")]
struct Cli {
    #[command(flatten)]
    config: Config,

    #[command(subcommand)]
    command: Command,
}

async fn open_backend(config: &Config) -> anyhow::Result<Backend> {
    match config.backend {
        BackendKind::Local => {
            let repo = LocalRepository::open(config.local_config()).await?;
            Ok(Backend::Local(Arc::new(repo)))
        }
        BackendKind::Github => {
            let repo = GitHubRepository::new(config.github_config()?)?;
            Ok(Backend::GitHub(Arc::new(repo)))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging (stderr, so stdout stays machine-readable)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let backend = open_backend(&cli.config).await?;
    let repository: Arc<dyn StoreRepository> = match &backend {
        Backend::Local(repo) => repo.clone(),
        Backend::GitHub(repo) => repo.clone(),
    };
    info!("Using {} backend", repository.backend_name());
    debug!("Config: {:?}", cli.config);

    let service = StoreService::new(repository).with_call_timeout(cli.config.timeout());

    match commands::run(cli.command, &service, &backend).await {
        Ok(output) => {
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(())
        }
        Err(e) => {
            if let Some(service_error) = e.downcast_ref::<ServiceError>() {
                let report = serde_json::json!({
                    "code": service_error.code.as_str(),
                    "storageCode": service_error.storage_code().map(|c| c.as_str()),
                    "message": service_error.describe(),
                    "applied": service_error.applied,
                });
                eprintln!("{}", serde_json::to_string_pretty(&report)?);
                std::process::exit(1);
            }
            Err(e)
        }
    }
}
