//! Bulk deletion: `floop clear`.

use anyhow::Result;
use dialoguer::Confirm;

use floop::floop_config::FloopConfig;
use floop::store::WorkOrderSummary;
use floop::ui::icons;

/// Which work orders `floop clear` removes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearScope {
    Actioned,
    All,
}

pub fn cmd_clear(config: &FloopConfig, scope: ClearScope, yes: bool) -> Result<()> {
    let store = super::open_store(config)?;
    let listing = store.all();

    let targets: Vec<&WorkOrderSummary> = match scope {
        ClearScope::All => listing.pending.iter().chain(listing.actioned.iter()).collect(),
        ClearScope::Actioned => listing.actioned.iter().collect(),
    };

    if targets.is_empty() {
        match scope {
            ClearScope::All => println!("No feedback items to clear."),
            ClearScope::Actioned => println!("No actioned items to clear."),
        }
        return Ok(());
    }

    let prompt = match scope {
        ClearScope::All => format!("Delete all {} feedback items (pending + actioned)?", targets.len()),
        ClearScope::Actioned => format!("Delete {} actioned feedback items?", targets.len()),
    };
    if !yes && !Confirm::new().with_prompt(prompt).default(false).interact()? {
        println!("Cancelled.");
        return Ok(());
    }

    let mut cleared = 0;
    for item in &targets {
        if store.delete(&item.filename, item.status)? {
            cleared += 1;
        } else {
            tracing::debug!(filename = %item.filename, status = %item.status, "already gone");
        }
    }

    println!("{}Cleared {} items.", icons::CHECK, cleared);
    if cleared < targets.len() {
        println!("{}{} items vanished before they could be deleted.", icons::WARN, targets.len() - cleared);
    }
    Ok(())
}
