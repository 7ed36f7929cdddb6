use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

/// Count scheduled run outcomes in the last completed time window.
#[derive(Debug, Parser)]
#[command(name = "runtally")]
#[command(about = "runtally - Count scheduled job outcomes per time window as CSV", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Window length in seconds
    #[arg(short, long, global = true, value_name = "SECS")]
    pub interval: Option<u64>,

    /// Number of intervals the window spans
    #[arg(short = 'n', long, global = true, default_value = "1", value_name = "COUNT")]
    pub number: u64,

    /// Align the window end to a multiple of the interval
    #[arg(short, long, global = true)]
    pub round: bool,

    /// Increase log detail (-v failed, -vv ignored, -vvv detail, -vvvv raw payloads)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Rule profile replacing the built-in one
    #[arg(long, global = true, value_name = "PATH")]
    pub rules: Option<PathBuf>,

    #[command(subcommand)]
    pub command: SourceCommand,
}

#[derive(Debug, Subcommand)]
pub enum SourceCommand {
    /// Scheduled GitHub Actions workflow runs
    #[command(name = "github-workflows")]
    GithubWorkflows {
        /// Organisation or user owning the repositories
        #[arg(long)]
        owner: Option<String>,

        /// Workflow trigger to filter on
        #[arg(long, default_value = "schedule")]
        event: String,

        /// Repositories to count, or `all` for the profile defaults
        #[arg(required = true, value_name = "REPO")]
        repos: Vec<String>,
    },

    /// AWS SSM command invocations
    #[command(name = "ssm-commands")]
    SsmCommands {
        /// Named AWS CLI profile
        #[arg(short, long)]
        profile: Option<String>,

        /// AWS region
        #[arg(long)]
        region: Option<String>,
    },
}
