//! CLI command definitions and execution
//!
//! Every command except `account` and `completions` goes through a
//! [`FileClient`] built from the configuration file and `BFS_BACKEND`.

use std::sync::Arc;

use bfs_core::{Config, ConfigManager, FileClient, Result};
use bfs_store::{Backend, ObjectStoreAdapter};
use clap::{Parser, Subcommand};

use crate::exit_code::ExitCode;
use crate::output::OutputConfig;

mod account;
mod cat;
mod completions;
mod cp;
mod exists;
mod glob;
mod ls;
mod rm;
mod stat;

/// bfs - filesystem-style access to hierarchical object storage
///
/// Addresses objects by URL,
/// `<scheme>://<account>.<blob|dfs|queue>.<domain>/<container>/<key>`,
/// and loads CSV, TSV, Parquet and serialized tables from them.
#[derive(Parser, Debug)]
#[command(name = "bfs")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output format: human-readable or JSON
    #[arg(long, global = true, default_value = "false")]
    pub json: bool,

    /// Disable colored output
    #[arg(long, global = true, default_value = "false")]
    pub no_color: bool,

    /// Disable progress spinner
    #[arg(long, global = true, default_value = "false")]
    pub no_progress: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true, default_value = "false")]
    pub quiet: bool,

    /// Enable debug logging
    #[arg(long, global = true, default_value = "false")]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage storage account credentials
    #[command(subcommand)]
    Account(account::AccountCommands),

    /// List the entries directly below a folder
    Ls(ls::LsArgs),

    /// List the objects matching a wildcard pattern
    Glob(glob::GlobArgs),

    /// Check whether an object or folder exists
    Exists(exists::ExistsArgs),

    /// Show object metadata
    Stat(stat::StatArgs),

    /// Copy one object
    Cp(cp::CpArgs),

    /// Remove one object
    Rm(rm::RmArgs),

    /// Load tables and print them
    Cat(cat::CatArgs),

    /// Generate shell completion scripts
    Completions(completions::CompletionsArgs),
}

/// Execute the CLI command and return an exit code
pub async fn execute(cli: Cli) -> ExitCode {
    let output_config = OutputConfig {
        json: cli.json,
        no_color: cli.no_color,
        no_progress: cli.no_progress,
        quiet: cli.quiet,
    };

    match cli.command {
        Commands::Account(cmd) => account::execute(cmd, output_config),
        Commands::Ls(args) => ls::execute(args, output_config).await,
        Commands::Glob(args) => glob::execute(args, output_config).await,
        Commands::Exists(args) => exists::execute(args, output_config).await,
        Commands::Stat(args) => stat::execute(args, output_config).await,
        Commands::Cp(args) => cp::execute(args, output_config).await,
        Commands::Rm(args) => rm::execute(args, output_config).await,
        Commands::Cat(args) => cat::execute(args, output_config).await,
        Commands::Completions(args) => completions::execute(args),
    }
}

/// Configuration from `BFS_CONFIG_DIR` or the user config directory
fn load_config() -> Result<Config> {
    ConfigManager::new()?.load()
}

/// Client over the backend named by `BFS_BACKEND`
fn file_client(config: &Config) -> Result<FileClient> {
    let backend = Backend::from_env(config.accounts.clone())?;
    tracing::debug!(backend = %backend_label(&backend), "opening store");
    Ok(FileClient::new(Arc::new(ObjectStoreAdapter::new(backend)))
        .with_site(config.defaults.site())
        .with_worker_count(config.defaults.worker_count))
}

fn backend_label(backend: &Backend) -> String {
    match backend {
        Backend::Azure { accounts } => format!("azure ({} configured accounts)", accounts.len()),
        Backend::Local { root } => format!("local:{}", root.display()),
        Backend::Memory => "memory".to_string(),
    }
}
