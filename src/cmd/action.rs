//! Close or reopen a work order: `floop action`.

use anyhow::{Result, bail};
use console::style;

use floop::floop_config::FloopConfig;
use floop::ui::icons;

pub fn cmd_action(config: &FloopConfig, filename: &str, note: Option<&str>, reopen: bool) -> Result<()> {
    let store = super::open_store(config)?;

    if reopen {
        if store.mark_pending(filename)? {
            println!("{}Reopened: {}", icons::CHECK, style(filename).green());
            return Ok(());
        }
        bail!("Could not reopen: {} (not found in actioned/)", filename);
    }

    let note = note.map(str::trim).filter(|n| !n.is_empty());
    if store.mark_actioned(filename, note)? {
        println!("{}Actioned: {}", icons::CHECK, style(filename).green());
        if let Some(note) = note {
            println!("   Note: {}", style(note).dim());
        }
        return Ok(());
    }
    bail!("Could not action: {} (not found in pending/)", filename);
}
