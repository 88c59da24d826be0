//! CLI command implementations.
//!
//! Each submodule owns one or more related `Commands` variants:
//!
//! | Module    | Commands handled                       |
//! |-----------|----------------------------------------|
//! | `list`    | `List`                                 |
//! | `action`  | `Action`                               |
//! | `clear`   | `Clear`                                |
//! | `toggle`  | `Enable`, `Disable`, `Status`          |
//! | `serve`   | `Serve`                                |
//! | `watch`   | `Watch`                                |
//! | `config`  | `Config`                               |

pub mod action;
pub mod clear;
pub mod config;
pub mod list;
pub mod serve;
pub mod toggle;
pub mod watch;

pub use action::cmd_action;
pub use clear::cmd_clear;
pub use config::cmd_config;
pub use list::cmd_list;
pub use serve::cmd_serve;
pub use toggle::{cmd_disable, cmd_enable, cmd_status};
pub use watch::cmd_watch;

use anyhow::{Context, Result};
use floop::floop_config::FloopConfig;
use floop::store::WorkOrderStore;

/// Open (creating if needed) the storage root the config points at.
fn open_store(config: &FloopConfig) -> Result<WorkOrderStore> {
    WorkOrderStore::open(config.storage_path()).with_context(|| {
        format!(
            "Failed to open feedback storage at {}",
            config.storage_path().display()
        )
    })
}
