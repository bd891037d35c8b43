//! CLI argument definitions

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// reecho: auto-reshare matching posts from a followed-accounts list
#[derive(Parser, Debug)]
#[command(name = "reecho")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Periodically scan list timelines and reshare matching posts
    Run(RunArgs),

    /// Manage per-account reshare criteria
    Criteria(CriteriaArgs),

    /// Manage registered accounts
    Account(AccountArgs),

    /// Configuration management
    Config(ConfigArgs),

    /// Validate configuration and show status
    Doctor(DoctorArgs),
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Log would-be reshares without issuing them
    #[arg(long)]
    pub dry_run: bool,

    /// Trigger one dispatch, wait for it, and exit
    #[arg(long)]
    pub once: bool,
}

#[derive(Args, Debug)]
pub struct CriteriaArgs {
    #[command(subcommand)]
    pub command: CriteriaCommands,
}

#[derive(Subcommand, Debug)]
pub enum CriteriaCommands {
    /// Save an account's criterion. Passing both fields empty clears it.
    Set {
        /// Account handle
        handle: String,

        /// Keyword pattern (case-insensitive regex)
        #[arg(long)]
        term: String,

        /// Source list identifier
        #[arg(long)]
        list_id: String,
    },

    /// Show an account's criterion
    Show {
        /// Account handle
        handle: String,
    },

    /// Clear an account's criterion
    Clear {
        /// Account handle
        handle: String,
    },

    /// List all stored criteria
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug)]
pub struct AccountArgs {
    #[command(subcommand)]
    pub command: AccountCommands,
}

#[derive(Subcommand, Debug)]
pub enum AccountCommands {
    /// Register an account (or replace its credentials)
    Add {
        /// Account handle
        handle: String,

        /// Environment variable holding the access token
        #[arg(long, default_value = "REECHO_ACCESS_KEY")]
        key_env: String,

        /// Environment variable holding the access token secret
        #[arg(long, default_value = "REECHO_ACCESS_SECRET")]
        secret_env: String,
    },

    /// List registered accounts
    List,
}

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Generate example configuration file
    Init {
        /// Path to write config file
        #[arg(long, default_value = "./reecho.toml")]
        path: PathBuf,

        /// Overwrite existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Args, Debug)]
pub struct DoctorArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}
