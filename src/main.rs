use anyhow::{Context, Result};
use clap::{ArgGroup, Parser, Subcommand};
use std::path::PathBuf;

use floop::floop_config::{CliOverrides, FloopConfig};
use floop::logging::{self, LogFormat};

mod cmd;

use cmd::clear::ClearScope;
use cmd::list::StatusFilter;
use cmd::watch::WatchArgs;

#[derive(Parser)]
#[command(name = "floop")]
#[command(version, about = "Feedback work orders as markdown files, closed by a coding agent")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log output format for diagnostics on stderr
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    pub log_format: LogFormat,

    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    /// Storage root for work orders. Overrides FLOOP_STORAGE_PATH and floop.toml.
    #[arg(long, global = true)]
    pub storage_path: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List work orders
    List {
        /// Which work orders to show
        #[arg(long, value_enum, default_value_t = StatusFilter::Pending)]
        status: StatusFilter,

        /// Only show work orders whose type contains this keyword
        #[arg(long = "type")]
        work_order_type: Option<String>,
    },
    /// Mark a pending work order as actioned (or reopen an actioned one)
    Action {
        /// Work order filename, e.g. 2026-01-01_120000_button-is-broken.md
        filename: String,

        /// What was done, appended under "Agent Notes"
        #[arg(long, conflicts_with = "reopen")]
        note: Option<String>,

        /// Move an actioned work order back to pending
        #[arg(long)]
        reopen: bool,
    },
    /// Delete work orders
    #[command(group(ArgGroup::new("scope").required(true).args(["actioned", "all"])))]
    Clear {
        /// Delete every actioned work order
        #[arg(long)]
        actioned: bool,

        /// Delete every work order, pending and actioned
        #[arg(long)]
        all: bool,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Accept new submissions
    Enable,
    /// Reject new submissions
    Disable,
    /// Show whether submissions are accepted, where work orders live, and counts
    Status,
    /// Run the feedback HTTP API
    Serve {
        /// Port to serve on (defaults to floop.toml, then 3142)
        #[arg(short, long)]
        port: Option<u16>,

        /// Address to bind
        #[arg(long)]
        host: Option<String>,

        /// Open the API in a browser once listening
        #[arg(long)]
        open: bool,
    },
    /// Hand pending work orders to a coding agent, oldest first
    Watch {
        /// Seconds between polls
        #[arg(long)]
        interval: Option<u64>,

        /// Process the current backlog once and exit
        #[arg(long)]
        once: bool,

        /// Comma-separated tools the agent may use
        #[arg(long)]
        tools: Option<String>,

        /// Model passed to the agent
        #[arg(long)]
        model: Option<String>,

        /// Seconds before an agent run is killed
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// View or validate configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Validate configuration and show any warnings
    Validate,
    /// Initialize a default floop.toml file
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.log_format);

    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    let config = FloopConfig::load(
        project_dir,
        CliOverrides {
            storage_path: cli.storage_path.clone(),
        },
    )?;
    for warning in config.validate() {
        tracing::warn!("{}", warning);
    }

    match cli.command {
        Commands::List {
            status,
            work_order_type,
        } => cmd::cmd_list(&config, status, work_order_type.as_deref())?,
        Commands::Action {
            filename,
            note,
            reopen,
        } => cmd::cmd_action(&config, &filename, note.as_deref(), reopen)?,
        Commands::Clear { all, yes, .. } => {
            let scope = if all { ClearScope::All } else { ClearScope::Actioned };
            cmd::cmd_clear(&config, scope, yes)?
        }
        Commands::Enable => cmd::cmd_enable(&config)?,
        Commands::Disable => cmd::cmd_disable(&config)?,
        Commands::Status => cmd::cmd_status(&config)?,
        Commands::Serve { port, host, open } => {
            cmd::cmd_serve(&config, port, host.as_deref(), open).await?
        }
        Commands::Watch {
            interval,
            once,
            tools,
            model,
            timeout,
        } => {
            let args = WatchArgs {
                interval,
                once,
                tools,
                model,
                timeout,
            };
            cmd::cmd_watch(&config, args).await?
        }
        Commands::Config { command } => cmd::cmd_config(&config, command)?,
    }

    Ok(())
}
