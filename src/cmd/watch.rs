//! Agent watcher: `floop watch`.

use std::time::Duration;

use anyhow::{Context, Result};

use floop::errors::WatchError;
use floop::floop_config::FloopConfig;
use floop::store::StoreHandle;
use floop::watcher::{ClaudeRunner, WatchOptions, Watcher, action_command_for, agent_exists};

/// CLI overrides for the `[watch]` section.
#[derive(Debug, Clone, Default)]
pub struct WatchArgs {
    pub interval: Option<u64>,
    pub once: bool,
    pub tools: Option<String>,
    pub model: Option<String>,
    pub timeout: Option<u64>,
}

pub async fn cmd_watch(config: &FloopConfig, args: WatchArgs) -> Result<()> {
    let claude_cmd = config.claude_cmd();
    if !agent_exists(claude_cmd) {
        return Err(WatchError::AgentNotFound(claude_cmd.to_string()).into());
    }

    let section = &config.toml.watch;
    let tools = args.tools.unwrap_or_else(|| section.tools.clone());
    let model = args.model.or_else(|| section.model.clone());
    let options = WatchOptions {
        interval: Duration::from_secs(args.interval.unwrap_or(section.interval)),
        timeout: Duration::from_secs(args.timeout.unwrap_or(section.timeout)),
        retries: section.retries,
        once: args.once,
        action_command: action_command_for(config.storage_path()),
    };

    let store = super::open_store(config)?;
    let runner = ClaudeRunner::new(claude_cmd, tools, model, config.project_dir.clone());
    let mut watcher = Watcher::new(StoreHandle::new(store), runner, options);

    let interrupted = tokio::select! {
        result = watcher.run() => {
            result.context("Watcher stopped")?;
            false
        }
        _ = tokio::signal::ctrl_c() => true,
    };

    if interrupted {
        println!();
        println!(
            "Watcher stopped. Handed out {} work order(s).",
            watcher.processed().len()
        );
    }

    Ok(())
}
