use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use filestore_github::{GitHubRepository, TreeFile};
use filestore_local::LocalRepository;
use filestore_service::{
    FileOperation, ProjectStructure, SearchOptions, StoreService, WriteOptions, DEFAULT_MAX_DEPTH,
};
use regex::Regex;
use serde_json::{json, Value};
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// The concrete backend, kept for backend-specific commands.
pub enum Backend {
    Local(Arc<LocalRepository>),
    GitHub(Arc<GitHubRepository>),
}

/// File content from the command line, a file, or stdin (in that order).
#[derive(Args, Debug)]
pub struct ContentArgs {
    /// Literal content
    pub content: Option<String>,

    /// Read content from this file
    #[arg(long, conflicts_with = "content")]
    pub file: Option<PathBuf>,
}

impl ContentArgs {
    async fn read(self) -> Result<String> {
        if let Some(content) = self.content {
            return Ok(content);
        }
        if let Some(file) = self.file {
            return tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()));
        }
        let mut content = String::new();
        tokio::io::stdin()
            .read_to_string(&mut content)
            .await
            .context("Failed to read content from stdin")?;
        Ok(content)
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print a file with its content
    Get {
        path: String,
        /// Branch, tag or commit (github only)
        #[arg(long = "ref")]
        git_ref: Option<String>,
    },

    /// List a directory
    Ls {
        #[arg(default_value = "")]
        path: String,
        #[arg(long = "ref")]
        git_ref: Option<String>,
    },

    /// Create or update a file
    Put {
        path: String,
        #[command(flatten)]
        content: ContentArgs,
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Create a file that must not exist yet
    Create {
        path: String,
        #[command(flatten)]
        content: ContentArgs,
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Update an existing file
    Update {
        path: String,
        #[command(flatten)]
        content: ContentArgs,
        #[arg(short, long)]
        message: Option<String>,
        /// Fail unless the stored hash is this one
        #[arg(long)]
        expected_hash: Option<String>,
    },

    /// Delete a file
    Rm {
        path: String,
        #[arg(short, long)]
        message: Option<String>,
        #[arg(long)]
        expected_hash: Option<String>,
    },

    /// Create a directory
    Mkdir {
        path: String,
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Copy a file
    Cp {
        source: String,
        destination: String,
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Move a file
    Mv {
        source: String,
        destination: String,
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Search file names, or contents with --content
    Search {
        term: String,
        /// Regex matched against file names
        #[arg(long)]
        pattern: Option<String>,
        /// File name suffix, e.g. ".md"
        #[arg(long)]
        extension: Option<String>,
        #[arg(long, default_value_t = DEFAULT_MAX_DEPTH)]
        max_depth: usize,
        /// Search file contents
        #[arg(long)]
        content: bool,
    },

    /// Count files, directories and bytes
    Stats,

    /// Copy files whose name matches PATTERN under DEST/<timestamp>/
    Backup {
        pattern: String,
        #[arg(long)]
        dest: Option<String>,
    },

    /// Create directories and templated files under BASE
    Scaffold {
        base: String,
        #[arg(long = "dir")]
        directories: Vec<String>,
        #[arg(long = "file")]
        files: Vec<String>,
        #[arg(long)]
        template: Option<String>,
    },

    /// Run the operations of a JSON file in order
    Batch { operations: PathBuf },

    /// Describe the remote repository (github only)
    Info,

    /// Commit the files of a JSON file in one commit (github only)
    Commit {
        files: PathBuf,
        #[arg(short, long, default_value = "Update files")]
        message: String,
        #[arg(long)]
        branch: Option<String>,
    },

    /// Remove the whole local root (local only)
    Cleanup,
}

async fn read_json<T: serde::de::DeserializeOwned>(path: &PathBuf) -> Result<T> {
    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_slice(&data).with_context(|| format!("Invalid JSON in {}", path.display()))
}

/// Cancelled on Ctrl-C.
fn interrupt_token() -> CancellationToken {
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, cancelling");
            child.cancel();
        }
    });
    token
}

pub async fn run(command: Command, service: &StoreService, backend: &Backend) -> Result<Value> {
    let output = match command {
        Command::Get { path, git_ref } => {
            json!(service.retrieve_file(&path, git_ref.as_deref()).await?)
        }
        Command::Ls { path, git_ref } => {
            json!(service.list_directory(&path, git_ref.as_deref()).await?)
        }
        Command::Put {
            path,
            content,
            message,
        } => {
            let content = content.read().await?;
            json!(
                service
                    .save_file(&path, content, message.as_deref(), WriteOptions::default())
                    .await?
            )
        }
        Command::Create {
            path,
            content,
            message,
        } => {
            let content = content.read().await?;
            json!(
                service
                    .create_file(&path, content, message.as_deref(), WriteOptions::default())
                    .await?
            )
        }
        Command::Update {
            path,
            content,
            message,
            expected_hash,
        } => {
            let content = content.read().await?;
            let options = WriteOptions {
                expected_hash,
                ..Default::default()
            };
            json!(
                service
                    .update_file(&path, content, message.as_deref(), options)
                    .await?
            )
        }
        Command::Rm {
            path,
            message,
            expected_hash,
        } => {
            let options = WriteOptions {
                expected_hash,
                ..Default::default()
            };
            json!(service.delete_file(&path, message.as_deref(), options).await?)
        }
        Command::Mkdir { path, message } => {
            json!(service.create_directory(&path, message.as_deref(), &[]).await?)
        }
        Command::Cp {
            source,
            destination,
            message,
        } => json!(
            service
                .copy_file(&source, &destination, message.as_deref())
                .await?
        ),
        Command::Mv {
            source,
            destination,
            message,
        } => json!(
            service
                .move_file(&source, &destination, message.as_deref())
                .await?
        ),
        Command::Search {
            term,
            pattern,
            extension,
            max_depth,
            content,
        } => {
            let pattern = pattern
                .map(|p| Regex::new(&p))
                .transpose()
                .context("Invalid --pattern")?;
            let options = SearchOptions {
                pattern,
                extension,
                max_depth,
                include_content: content,
                cancel: Some(interrupt_token()),
            };
            json!(service.search_files(&term, options).await?)
        }
        Command::Stats => {
            let stats = service.get_stats().await?;
            match backend {
                // Disk totals also count dotfiles the listing hides
                Backend::Local(repo) => json!({ "store": stats, "disk": repo.stats().await? }),
                Backend::GitHub(_) => json!(stats),
            }
        }
        Command::Backup { pattern, dest } => {
            let pattern = Regex::new(&pattern).context("Invalid backup pattern")?;
            json!(service.backup(&pattern, dest.as_deref()).await?)
        }
        Command::Scaffold {
            base,
            directories,
            files,
            template,
        } => {
            let structure = ProjectStructure {
                files,
                directories,
                template,
            };
            json!(service.create_project_structure(&base, &structure).await)
        }
        Command::Batch { operations } => {
            let operations: Vec<FileOperation> = read_json(&operations).await?;
            json!(service.batch_operations(operations).await)
        }
        Command::Info => {
            let Backend::GitHub(repo) = backend else {
                bail!("info is only supported by the github backend");
            };
            repo.repository_info().await?
        }
        Command::Commit {
            files,
            message,
            branch,
        } => {
            let Backend::GitHub(repo) = backend else {
                bail!("commit is only supported by the github backend");
            };
            let files: Vec<TreeFile> = read_json(&files).await?;
            let count = files.len();
            let sha = repo.commit_tree(files, &message, branch.as_deref()).await?;
            json!({ "commit": sha, "files": count })
        }
        Command::Cleanup => {
            let Backend::Local(repo) = backend else {
                bail!("cleanup is only supported by the local backend");
            };
            repo.cleanup().await?;
            json!({ "removed": repo.root() })
        }
    };
    Ok(output)
}
