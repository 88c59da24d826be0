//! Shared CLI icons.
//!
//! Each icon falls back to plain text on terminals without emoji support.

use console::Emoji;

// Status indicators
pub static CHECK: Emoji<'_, '_> = Emoji("\u{2705} ", "[OK] ");
pub static CROSS: Emoji<'_, '_> = Emoji("\u{274C} ", "[ERR] ");
pub static WARN: Emoji<'_, '_> = Emoji("\u{26A0}\u{FE0F}  ", "[WARN] ");

// Work order lifecycle
pub static WORK_ORDER: Emoji<'_, '_> = Emoji("\u{1F4CB} ", "");

// Watcher
pub static EYES: Emoji<'_, '_> = Emoji("\u{1F440} ", "");
pub static CLOCK: Emoji<'_, '_> = Emoji("\u{23F1}\u{FE0F}  ", "[T] ");

// Summaries
pub static PROGRESS: Emoji<'_, '_> = Emoji("\u{1F4CA} ", "");
