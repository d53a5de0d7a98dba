//! Command line options for the git-drover tool.
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tokio::time::Duration;

use crate::backoff::BackoffPolicy;
use crate::commands;
use crate::errors::DroverError;
use crate::retry::RetrySettings;
use crate::scan::GH_OBJ_SIZE_LIMIT;

/// git-drover - Bulk-migrate git repositories from Bitbucket to GitHub.
#[derive(Parser, Debug)]
#[command(version, about)]
pub struct GitDroverCli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: DroverCommand,

    /// Maximum repositories processed at once.
    #[arg(long, global = true, default_value_t = 4)]
    pub concurrency: usize,

    /// Attempts per repository (1 initial + retries).
    #[arg(long, global = true, default_value_t = 4)]
    pub attempts: u32,

    /// Hard deadline for each attempt, in seconds.
    #[arg(long, global = true, default_value_t = 300)]
    pub task_timeout: u64,
}

/// The migration steps, one subcommand each.
#[derive(Subcommand, Debug)]
pub enum DroverCommand {
    /// List the repositories of a Bitbucket project into a file.
    List(ListArgs),

    /// Mirror-clone (or update) every repository in a list file.
    Mirror(MirrorArgs),

    /// Create one GitHub repository per local mirror.
    Create(CreateArgs),

    /// Push every local mirror to the GitHub organization.
    Push(PushArgs),

    /// Delete the GitHub repository of every local mirror.
    Delete(DeleteArgs),

    /// Scan cloned repositories for oversized objects.
    Scan(ScanArgs),
}

/// Options for the `list` subcommand.
#[derive(Args, Debug)]
pub struct ListArgs {
    /// Bitbucket project key.
    #[arg(long)]
    pub project_key: String,

    /// Bitbucket server base URL.
    #[arg(long)]
    pub base_url: String,

    /// Output file for the SSH clone URLs.
    #[arg(long, default_value = "bitbucket_repos.txt")]
    pub out: PathBuf,
}

/// Options for the `mirror` subcommand.
#[derive(Args, Debug)]
pub struct MirrorArgs {
    /// Path of the text file with the repositories to migrate.
    #[arg(long)]
    pub repo_list: PathBuf,

    /// Destination directory for the mirrors.
    #[arg(long)]
    pub dest: PathBuf,

    /// Clone prefix URL for bare repository names in the list.
    #[arg(long)]
    pub clone_prefix: Option<String>,
}

/// Options for the `create` subcommand.
#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Name of the GitHub organization.
    #[arg(long)]
    pub org_name: String,

    /// Path of the mirrored repositories.
    #[arg(long)]
    pub mirrored_repos_path: PathBuf,
}

/// Options for the `push` subcommand.
#[derive(Args, Debug)]
pub struct PushArgs {
    /// Name of the GitHub organization.
    #[arg(long)]
    pub org_name: String,

    /// Path of the mirrored repositories.
    #[arg(long)]
    pub mirrored_repos_path: PathBuf,

    /// Base URL of the destination host.
    #[arg(long, default_value = "https://github.com")]
    pub github_url: String,
}

/// Options for the `delete` subcommand.
#[derive(Args, Debug)]
pub struct DeleteArgs {
    /// Name of the GitHub organization.
    #[arg(long)]
    pub org_name: String,

    /// Path of the mirrored repositories.
    #[arg(long)]
    pub mirrored_repos_path: PathBuf,
}

/// Options for the `scan` subcommand.
#[derive(Args, Debug)]
pub struct ScanArgs {
    /// Path of the cloned repositories.
    #[arg(long)]
    pub cloned_repos_path: PathBuf,

    /// Object size limit in bytes.
    #[arg(long, default_value_t = GH_OBJ_SIZE_LIMIT)]
    pub size_limit: u64,
}

/// Run the git-drover tool with the provided command line options.
/// # Errors
/// Error if the selected subcommand fails.
pub async fn git_drover_main() -> Result<(), DroverError> {
    dotenv::dotenv().ok();
    let cli = GitDroverCli::parse();
    let settings = RetrySettings {
        max_attempts: cli.attempts.max(1),
        task_timeout: Duration::from_secs(cli.task_timeout),
        backoff: BackoffPolicy::new(Duration::from_secs(5), 0.3)
            .with_cap(Duration::from_secs(60))
            .with_jitter(0.2),
    };
    match &cli.command {
        DroverCommand::List(args) => commands::run_list(args, settings).await,
        DroverCommand::Mirror(args) => {
            commands::run_mirror(args, cli.concurrency, settings).await
        }
        DroverCommand::Create(args) => {
            commands::run_create(args, cli.concurrency, settings).await
        }
        DroverCommand::Push(args) => commands::run_push(args, cli.concurrency, settings).await,
        DroverCommand::Delete(args) => {
            commands::run_delete(args, cli.concurrency, settings).await
        }
        DroverCommand::Scan(args) => commands::run_scan(args, cli.concurrency, settings).await,
    }
}
