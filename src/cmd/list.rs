//! Work order listing: `floop list`.

use anyhow::Result;
use clap::ValueEnum;

use floop::floop_config::FloopConfig;
use floop::store::{Status, WorkOrderListing, WorkOrderSummary};
use floop::ui::icons;

const TITLE_WIDTH: usize = 60;

/// Which directories `floop list` shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum StatusFilter {
    #[default]
    Pending,
    Actioned,
    All,
}

pub fn cmd_list(config: &FloopConfig, status: StatusFilter, type_filter: Option<&str>) -> Result<()> {
    let store = super::open_store(config)?;
    let listing = store.all();

    let items = select(&listing, status, type_filter);

    println!();
    if items.is_empty() {
        println!("No feedback items found.");
    } else {
        println!(
            "{:<12} {:<63} {:<20} Filename",
            "Status", "Title", "Created"
        );
        println!(
            "{:<12} {:<63} {:<20} --------",
            "------", "-----", "-------"
        );
        for item in &items {
            println!(
                "{:<12} {:<63} {:<20} {}",
                status_cell(item.status),
                limit(&item.title, TITLE_WIDTH),
                item.created,
                item.filename
            );
        }
    }
    println!();
    println!(
        "{}{} pending, {} actioned",
        icons::PROGRESS,
        listing.pending.len(),
        listing.actioned.len()
    );

    Ok(())
}

/// Apply the status and case-insensitive type keyword filters.
fn select<'a>(
    listing: &'a WorkOrderListing,
    status: StatusFilter,
    type_filter: Option<&str>,
) -> Vec<&'a WorkOrderSummary> {
    let items: Vec<&WorkOrderSummary> = match status {
        StatusFilter::Pending => listing.pending.iter().collect(),
        StatusFilter::Actioned => listing.actioned.iter().collect(),
        StatusFilter::All => listing.pending.iter().chain(listing.actioned.iter()).collect(),
    };

    match type_filter.map(str::to_lowercase) {
        Some(keyword) if !keyword.is_empty() => items
            .into_iter()
            .filter(|item| item.work_order_type.to_lowercase().contains(&keyword))
            .collect(),
        _ => items,
    }
}

fn status_cell(status: Status) -> String {
    let label = match status {
        Status::Pending => "Pending",
        Status::Actioned => "Actioned",
    };
    format!("{} {}", status.emoji(), label)
}

/// Cut to `max` chars, marking the cut with `...`.
fn limit(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max).collect();
        format!("{}...", cut.trim_end())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(filename: &str, work_order_type: &str, status: Status) -> WorkOrderSummary {
        WorkOrderSummary {
            filename: filename.to_string(),
            title: filename.to_string(),
            work_order_type: work_order_type.to_string(),
            priority: String::new(),
            created: String::new(),
            status,
            has_screenshot: false,
        }
    }

    fn listing() -> WorkOrderListing {
        WorkOrderListing {
            pending: vec![
                summary("b.md", "🐛 Bug", Status::Pending),
                summary("a.md", "💬 Feedback", Status::Pending),
            ],
            actioned: vec![summary("c.md", "🐛 Bug", Status::Actioned)],
        }
    }

    #[test]
    fn test_select_by_status() {
        let listing = listing();
        assert_eq!(select(&listing, StatusFilter::Pending, None).len(), 2);
        assert_eq!(select(&listing, StatusFilter::Actioned, None).len(), 1);

        let all = select(&listing, StatusFilter::All, None);
        let names: Vec<&str> = all.iter().map(|s| s.filename.as_str()).collect();
        assert_eq!(names, vec!["b.md", "a.md", "c.md"]);
    }

    #[test]
    fn test_select_by_type_keyword_is_case_insensitive() {
        let listing = listing();
        let bugs = select(&listing, StatusFilter::All, Some("BUG"));
        assert_eq!(bugs.len(), 2);
        assert!(select(&listing, StatusFilter::Pending, Some("idea")).is_empty());
        assert_eq!(select(&listing, StatusFilter::Pending, Some("")).len(), 2);
    }

    #[test]
    fn test_limit() {
        assert_eq!(limit("short", 60), "short");
        let long = "é".repeat(70);
        let cut = limit(&long, 60);
        assert!(cut.ends_with("..."));
        assert_eq!(cut.chars().count(), 63);
    }

    #[test]
    fn test_status_cell() {
        assert_eq!(status_cell(Status::Pending), "🟡 Pending");
        assert_eq!(status_cell(Status::Actioned), "✅ Actioned");
    }
}
