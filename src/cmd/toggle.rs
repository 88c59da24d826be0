//! Submission sentinel and overview: `floop enable`, `floop disable`, `floop status`.

use anyhow::Result;
use console::style;

use floop::floop_config::FloopConfig;
use floop::ui::icons;

pub fn cmd_enable(config: &FloopConfig) -> Result<()> {
    let store = super::open_store(config)?;
    store.enable()?;
    println!("{}Floop widget enabled.", icons::CHECK);
    Ok(())
}

pub fn cmd_disable(config: &FloopConfig) -> Result<()> {
    let store = super::open_store(config)?;
    store.disable()?;
    println!("{}Floop widget disabled.", icons::CHECK);
    Ok(())
}

pub fn cmd_status(config: &FloopConfig) -> Result<()> {
    let store = super::open_store(config)?;
    let counts = store.counts();

    println!();
    println!("Floop Status");
    println!("============");
    println!();
    let enabled = if store.is_enabled() {
        style("enabled").green()
    } else {
        style("disabled").yellow()
    };
    println!("  Submissions: {}", enabled);
    println!("  Storage:     {}", store.root().display());
    println!(
        "  {}{} pending, {} actioned",
        icons::PROGRESS,
        counts.pending,
        counts.actioned
    );
    println!();
    Ok(())
}
