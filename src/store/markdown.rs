//! Work-order markdown: rendering new files and reading metadata back out.
//!
//! The markdown file is the only record of a work order, so listing re-derives
//! title, created time, type and priority from the formatted lines with a
//! handful of line-anchored patterns. Parsing is best-effort: a missing line
//! yields an empty string, never an error.

use std::sync::LazyLock;

use chrono::NaiveDateTime;
use regex::Regex;

use super::models::{MAX_CAPTURED_ENTRIES, NewWorkOrder, Status, TargetedElement};
use crate::errors::StoreError;

/// Characters of the message used to build the filename slug.
pub const SLUG_SOURCE_CHARS: usize = 50;
/// Characters of the message shown in the `# ` heading.
pub const HEADING_MESSAGE_CHARS: usize = 80;
/// Characters of a targeted element's text kept in the file.
const ELEMENT_TEXT_CHARS: usize = 100;

pub const FILENAME_TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H%M%S";
pub const CREATED_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub const ACTIONED_FORMAT: &str = "%Y-%m-%d %H:%M";

static TITLE_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^# (.+)$").unwrap());

static STATUS_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\*\*Status:\*\* .+$").unwrap());

static CREATED_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\*\*Created:\*\* (.+)$").unwrap());

static TYPE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\*\*Type:\*\* (.+)$").unwrap());

static PRIORITY_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\*\*Priority:\*\* (.+)$").unwrap());

/// Metadata recovered from a work-order file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedMetadata {
    pub title: String,
    pub created: String,
    pub work_order_type: String,
    pub priority: String,
}

/// Lowercase ASCII slug of the first `max_chars` characters of `text`.
///
/// Accented Latin letters fold to their ASCII base (`é` to `e`, `ß` to `ss`)
/// and combining marks are dropped. Every other run of non-alphanumeric
/// characters becomes a single hyphen and leading/trailing hyphens are
/// dropped, so the result matches `[a-z0-9-]*`.
pub fn slugify(text: &str, max_chars: usize) -> String {
    let head: String = text.chars().take(max_chars).collect();
    let mut folded = String::with_capacity(head.len());
    for c in head.to_lowercase().chars() {
        if c.is_ascii_alphanumeric() {
            folded.push(c);
        } else if !('\u{0300}'..='\u{036F}').contains(&c) {
            folded.push_str(fold_latin(c).unwrap_or("-"));
        }
    }
    folded
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// ASCII spelling of a lowercase Latin-1 or Latin Extended-A letter.
fn fold_latin(c: char) -> Option<&'static str> {
    let ascii = match c {
        'à'..='å' | 'ā' | 'ă' | 'ą' => "a",
        'æ' => "ae",
        'ç' | 'ć' | 'ĉ' | 'ċ' | 'č' => "c",
        'ð' | 'ď' | 'đ' => "d",
        'è'..='ë' | 'ē' | 'ĕ' | 'ė' | 'ę' | 'ě' => "e",
        'ĝ' | 'ğ' | 'ġ' | 'ģ' => "g",
        'ĥ' | 'ħ' => "h",
        'ì'..='ï' | 'ĩ' | 'ī' | 'ĭ' | 'į' | 'ı' => "i",
        'ĵ' => "j",
        'ķ' => "k",
        'ĺ' | 'ļ' | 'ľ' | 'ŀ' | 'ł' => "l",
        'ñ' | 'ń' | 'ņ' | 'ň' => "n",
        'ò'..='ö' | 'ø' | 'ō' | 'ŏ' | 'ő' => "o",
        'œ' => "oe",
        'ŕ' | 'ŗ' | 'ř' => "r",
        'ß' => "ss",
        'ś' | 'ŝ' | 'ş' | 'š' => "s",
        'ţ' | 'ť' | 'ŧ' => "t",
        'þ' => "th",
        'ù'..='ü' | 'ũ' | 'ū' | 'ŭ' | 'ů' | 'ű' | 'ų' => "u",
        'ŵ' => "w",
        'ý' | 'ÿ' | 'ŷ' => "y",
        'ź' | 'ż' | 'ž' => "z",
        _ => return None,
    };
    Some(ascii)
}

/// Truncate to `max_chars` characters, appending `...` when shortened.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let head: String = text.chars().take(max_chars).collect();
    format!("{}...", head.trim_end())
}

/// Collapse line breaks so a value stays on one markdown line.
fn single_line(text: &str) -> String {
    text.split(['\r', '\n'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn table_cell(value: &str) -> String {
    single_line(value).replace('|', "\\|")
}

pub fn pending_status_line() -> String {
    format!("**Status:** {} Pending", Status::Pending.emoji())
}

pub fn actioned_status_line(at: NaiveDateTime) -> String {
    format!(
        "**Status:** {} Actioned ({})",
        Status::Actioned.emoji(),
        at.format(ACTIONED_FORMAT)
    )
}

/// Replace the metadata status line. Only the first match is touched so a
/// message that happens to quote a status line is left alone.
pub fn rewrite_status(content: &str, status_line: &str) -> String {
    STATUS_REGEX
        .replacen(content, 1, regex::NoExpand(status_line))
        .into_owned()
}

/// Append an `## Agent Notes` section.
pub fn append_notes(content: &str, note: &str) -> String {
    let mut out = content.trim_end_matches('\n').to_string();
    out.push_str("\n\n## Agent Notes\n\n");
    out.push_str(note.trim());
    out.push('\n');
    out
}

fn capture(regex: &Regex, content: &str) -> String {
    regex
        .captures(content)
        .and_then(|cap| cap.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default()
}

/// Pull the listing fields out of a work-order file.
pub fn parse_metadata(content: &str) -> ParsedMetadata {
    ParsedMetadata {
        title: capture(&TITLE_REGEX, content),
        created: capture(&CREATED_REGEX, content),
        work_order_type: capture(&TYPE_REGEX, content),
        priority: capture(&PRIORITY_REGEX, content),
    }
}

fn json_block(md: &mut String, heading: &str, map: &serde_json::Map<String, serde_json::Value>, section: &'static str) -> Result<(), StoreError> {
    if map.is_empty() {
        return Ok(());
    }
    let json = serde_json::to_string_pretty(map).map_err(|source| StoreError::Json { section, source })?;
    md.push_str(&format!("\n### {}\n\n```json\n{}\n```\n", heading, json));
    Ok(())
}

/// Format a coordinate without a trailing `.0` for whole numbers.
fn format_px(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        format!("{:.1}", value)
    }
}

fn targeted_element_section(element: &TargetedElement) -> Option<String> {
    let mut lines = Vec::new();
    if !element.selector.is_empty() {
        lines.push(format!("- **Selector:** `{}`", single_line(&element.selector)));
    }
    if !element.tag_name.is_empty() {
        lines.push(format!("- **Tag:** `{}`", element.tag_name.to_lowercase()));
    }
    let text = single_line(&element.text_content);
    if !text.is_empty() {
        lines.push(format!("- **Text:** {}", truncate_chars(&text, ELEMENT_TEXT_CHARS)));
    }
    if let Some(bbox) = element.bounding_box {
        lines.push(format!(
            "- **Bounding Box:** {}, {} ({}\u{00D7}{})",
            format_px(bbox.top),
            format_px(bbox.left),
            format_px(bbox.width),
            format_px(bbox.height)
        ));
    }
    if lines.is_empty() {
        return None;
    }
    Some(format!("\n## Targeted Element\n\n{}\n", lines.join("\n")))
}

/// Render the full markdown document for a new pending work order.
///
/// `screenshot_name` is the companion PNG's file name when one was written.
pub fn render(
    data: &NewWorkOrder,
    created: NaiveDateTime,
    screenshot_name: Option<&str>,
) -> Result<String, StoreError> {
    let kind = data.work_order_type;
    let heading = format!(
        "# {} {}: {}",
        kind.emoji(),
        kind.label(),
        truncate_chars(&single_line(&data.message), HEADING_MESSAGE_CHARS)
    );

    let mut meta = format!("{}\n", pending_status_line());
    meta.push_str(&format!("**Created:** {}\n", created.format(CREATED_FORMAT)));
    meta.push_str(&format!("**Type:** {}\n", kind.label()));
    if let Some(priority) = data.priority {
        meta.push_str(&format!("**Priority:** {} {}\n", priority.emoji(), priority.label()));
    }

    let mut md = format!("{}\n\n{}\n---\n\n## Message\n\n{}\n", heading, meta, data.message);

    let mut rows = Vec::new();
    if !data.url.is_empty() {
        rows.push(format!("| **URL** | `{}` |", table_cell(&data.url)));
    }
    if !data.route_name.is_empty() {
        rows.push(format!("| **Route** | `{}` |", table_cell(&data.route_name)));
    }
    if !data.route_action.is_empty() && data.route_action != "Closure" {
        rows.push(format!("| **Controller** | `{}` |", table_cell(&data.route_action)));
    }
    if !data.method.is_empty() {
        rows.push(format!("| **Method** | `{}` |", table_cell(&data.method)));
    }
    if let Some(view) = data.views.first() {
        rows.push(format!("| **View** | `{}` |", table_cell(view)));
    }
    if !data.user.is_empty() {
        rows.push(format!("| **User** | {} |", table_cell(&data.user)));
    }
    if !data.viewport.is_empty() {
        rows.push(format!("| **Viewport** | {} |", table_cell(&data.viewport)));
    }
    if !data.user_agent.is_empty() {
        rows.push(format!("| **Browser** | {} |", table_cell(&data.user_agent)));
    }

    if !rows.is_empty() {
        md.push_str("\n---\n\n## Page Context\n\n");
        md.push_str("| Property | Value |\n");
        md.push_str("|----------|-------|\n");
        md.push_str(&rows.join("\n"));
        md.push('\n');
    }

    json_block(&mut md, "Route Parameters", &data.route_params, "route parameters")?;
    json_block(&mut md, "Query Parameters", &data.query_params, "query parameters")?;

    if data.views.len() > 1 {
        md.push_str("\n### Views\n\n");
        for view in &data.views {
            md.push_str(&format!("- `{}`\n", single_line(view)));
        }
    }

    json_block(&mut md, "Extra Context", &data.extra_context, "extra context")?;

    if !data.console_errors.is_empty() {
        md.push_str("\n## Console Errors\n\n");
        for error in data.console_errors.iter().take(MAX_CAPTURED_ENTRIES) {
            match error.timestamp.as_deref().filter(|t| !t.is_empty()) {
                Some(ts) => md.push_str(&format!("- [{}] {}\n", ts, single_line(&error.message))),
                None => md.push_str(&format!("- {}\n", single_line(&error.message))),
            }
        }
    }

    if !data.network_failures.is_empty() {
        md.push_str("\n## Network Failures\n\n");
        for failure in data.network_failures.iter().take(MAX_CAPTURED_ENTRIES) {
            let mut line = String::from("- ");
            if let Some(ts) = failure.timestamp.as_deref().filter(|t| !t.is_empty()) {
                line.push_str(&format!("[{}] ", ts));
            }
            let method = failure.method.as_deref().filter(|m| !m.is_empty()).unwrap_or("GET");
            line.push_str(&format!("{} {}", method.to_uppercase(), single_line(&failure.url)));
            let status = failure.status.map(|s| s.to_string());
            let status_text = failure.status_text.as_deref().filter(|t| !t.is_empty());
            let outcome: Vec<&str> = status.as_deref().into_iter().chain(status_text).collect();
            if !outcome.is_empty() {
                line.push_str(&format!(" \u{2192} {}", outcome.join(" ")));
            }
            md.push_str(&line);
            md.push('\n');
        }
    }

    if let Some(section) = data.targeted_element.as_ref().and_then(targeted_element_section) {
        md.push_str(&section);
    }

    if let Some(name) = screenshot_name {
        md.push_str(&format!("\n## Screenshot\n\n![Screenshot]({})\n", name));
    }

    Ok(md)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::models::{BoundingBox, ConsoleError, NetworkFailure, Priority, WorkOrderType};
    use chrono::NaiveDate;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap().and_hms_opt(h, m, s).unwrap()
    }

    #[test]
    fn test_slugify_normal_message() {
        assert_eq!(slugify("Button is broken", 50), "button-is-broken");
    }

    #[test]
    fn test_slugify_special_characters() {
        assert_eq!(slugify("Fix @#$ the header!!", 50), "fix-the-header");
    }

    #[test]
    fn test_slugify_only_reads_leading_characters() {
        let message = "a".repeat(40) + " and then a much longer tail that is ignored";
        let slug = slugify(&message, SLUG_SOURCE_CHARS);
        assert_eq!(slug, format!("{}-and-then", "a".repeat(40)));
    }

    #[test]
    fn test_slugify_folds_accented_letters() {
        assert_eq!(slugify("Café crème", 50), "cafe-creme");
        assert_eq!(slugify("Straße ÉTÉ Łódź", 50), "strasse-ete-lodz");
        assert_eq!(slugify("Cafe\u{301} decomposed", 50), "cafe-decomposed");
    }

    #[test]
    fn test_slugify_unfoldable_letters_become_separator() {
        let slug = slugify("Заголовок слишком мал ok", 50);
        assert_eq!(slug, "ok");
        let slug = slugify("見出し fix 見出し", 50);
        assert_eq!(slug, "fix");
    }

    #[test]
    fn test_slugify_all_special_chars() {
        assert_eq!(slugify("!!! ???", 50), "");
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("short", 80), "short");
        let long = "x".repeat(90);
        let truncated = truncate_chars(&long, 80);
        assert_eq!(truncated, format!("{}...", "x".repeat(80)));
    }

    #[test]
    fn test_render_heading_and_metadata() {
        let data = NewWorkOrder::new("Button is broken")
            .with_type(WorkOrderType::Bug)
            .with_priority(Priority::High);
        let md = render(&data, at(9, 30, 5), None).unwrap();

        assert!(md.starts_with("# 🐛 Bug: Button is broken\n\n"));
        assert!(md.contains("**Status:** 🟡 Pending\n"));
        assert!(md.contains("**Created:** 2024-06-01 09:30:05\n"));
        assert!(md.contains("**Type:** Bug\n"));
        assert!(md.contains("**Priority:** 🔴 High\n"));
        assert!(md.contains("\n---\n\n## Message\n\nButton is broken\n"));
        assert!(!md.contains("## Page Context"));
    }

    #[test]
    fn test_render_omits_priority_when_unset() {
        let md = render(&NewWorkOrder::new("x"), at(0, 0, 0), None).unwrap();
        assert!(!md.contains("**Priority:**"));
        assert!(md.starts_with("# 💬 Feedback: x"));
    }

    #[test]
    fn test_render_page_context_table() {
        let mut data = NewWorkOrder::new("Needs work");
        data.url = "https://example.com/dashboard".into();
        data.route_name = "dashboard.index".into();
        data.route_action = "DashboardController@index".into();
        data.method = "GET".into();
        data.views = vec!["dashboard".into()];
        data.user = "Guest".into();
        data.viewport = "1280x720".into();
        data.user_agent = "Mozilla/5.0".into();

        let md = render(&data, at(1, 2, 3), None).unwrap();
        assert!(md.contains("## Page Context\n\n| Property | Value |\n|----------|-------|\n"));
        assert!(md.contains("| **URL** | `https://example.com/dashboard` |"));
        assert!(md.contains("| **Route** | `dashboard.index` |"));
        assert!(md.contains("| **Controller** | `DashboardController@index` |"));
        assert!(md.contains("| **View** | `dashboard` |"));
        assert!(md.contains("| **Browser** | Mozilla/5.0 |"));
        assert!(!md.contains("### Views"));
    }

    #[test]
    fn test_render_suppresses_closure_controller() {
        let mut data = NewWorkOrder::new("x");
        data.route_action = "Closure".into();
        let md = render(&data, at(1, 2, 3), None).unwrap();
        assert!(!md.contains("Controller"));
        assert!(!md.contains("## Page Context"));
    }

    #[test]
    fn test_render_params_and_views() {
        let mut data = NewWorkOrder::new("x");
        data.route_params.insert("id".into(), serde_json::json!(42));
        data.query_params.insert("tab".into(), serde_json::json!("billing"));
        data.views = vec!["layouts.app".into(), "users.show".into()];

        let md = render(&data, at(1, 2, 3), None).unwrap();
        assert!(md.contains("### Route Parameters\n\n```json\n{\n  \"id\": 42\n}\n```\n"));
        assert!(md.contains("### Query Parameters\n\n```json\n"));
        assert!(md.contains("### Views\n\n- `layouts.app`\n- `users.show`\n"));
    }

    #[test]
    fn test_render_console_and_network_sections() {
        let mut data = NewWorkOrder::new("x");
        data.console_errors = vec![
            ConsoleError {
                message: "TypeError: x is undefined".into(),
                timestamp: Some("12:00:01".into()),
            },
            ConsoleError {
                message: "no time".into(),
                timestamp: None,
            },
        ];
        data.network_failures = vec![NetworkFailure {
            url: "/api/save".into(),
            method: Some("post".into()),
            status: Some(500),
            status_text: Some("Internal Server Error".into()),
            timestamp: Some("12:00:02".into()),
        }];

        let md = render(&data, at(1, 2, 3), None).unwrap();
        assert!(md.contains("## Console Errors\n\n- [12:00:01] TypeError: x is undefined\n- no time\n"));
        assert!(md.contains("## Network Failures\n\n- [12:00:02] POST /api/save → 500 Internal Server Error\n"));
    }

    #[test]
    fn test_render_keeps_first_five_captured_entries() {
        let mut data = NewWorkOrder::new("x");
        data.console_errors = (0..7)
            .map(|i| ConsoleError {
                message: format!("error {}", i),
                timestamp: None,
            })
            .collect();

        let md = render(&data, at(1, 2, 3), None).unwrap();
        assert!(md.contains("- error 4\n"));
        assert!(!md.contains("error 5"));
    }

    #[test]
    fn test_render_targeted_element_and_screenshot() {
        let mut data = NewWorkOrder::new("x");
        data.targeted_element = Some(TargetedElement {
            selector: "#save".into(),
            tag_name: "BUTTON".into(),
            text_content: "Save".into(),
            bounding_box: Some(BoundingBox {
                top: 10.0,
                left: 20.5,
                width: 100.0,
                height: 32.0,
            }),
        });

        let md = render(&data, at(1, 2, 3), Some("2024-06-01_010203_x.png")).unwrap();
        assert!(md.contains("## Targeted Element\n\n- **Selector:** `#save`\n- **Tag:** `button`\n- **Text:** Save\n"));
        assert!(md.contains("- **Bounding Box:** 10, 20.5 (100×32)"));
        assert!(md.ends_with("## Screenshot\n\n![Screenshot](2024-06-01_010203_x.png)\n"));
    }

    #[test]
    fn test_rewrite_status_round_trip() {
        let md = render(&NewWorkOrder::new("x"), at(1, 2, 3), None).unwrap();
        let actioned = rewrite_status(&md, &actioned_status_line(at(4, 5, 6)));
        assert!(actioned.contains("**Status:** ✅ Actioned (2024-06-01 04:05)"));
        assert!(!actioned.contains("Pending"));

        let reopened = rewrite_status(&actioned, &pending_status_line());
        assert!(reopened.contains("**Status:** 🟡 Pending"));
        assert!(!reopened.contains("Actioned"));
    }

    #[test]
    fn test_rewrite_status_ignores_quoted_status_in_message() {
        let data = NewWorkOrder::new("x\n**Status:** quoted by the user");
        let md = render(&data, at(1, 2, 3), None).unwrap();
        let actioned = rewrite_status(&md, &actioned_status_line(at(4, 5, 6)));
        assert!(actioned.contains("**Status:** quoted by the user"));
    }

    #[test]
    fn test_append_notes() {
        let out = append_notes("# Title\n\nbody\n", "fixed margin");
        assert_eq!(out, "# Title\n\nbody\n\n## Agent Notes\n\nfixed margin\n");
    }

    #[test]
    fn test_parse_metadata_from_rendered_file() {
        let data = NewWorkOrder::new("Button is broken")
            .with_type(WorkOrderType::Bug)
            .with_priority(Priority::High);
        let md = render(&data, at(9, 30, 5), None).unwrap();
        let meta = parse_metadata(&md);
        assert_eq!(meta.title, "🐛 Bug: Button is broken");
        assert_eq!(meta.created, "2024-06-01 09:30:05");
        assert_eq!(meta.work_order_type, "Bug");
        assert_eq!(meta.priority, "🔴 High");
    }

    #[test]
    fn test_parse_metadata_tolerates_garbage() {
        let meta = parse_metadata("not a work order\r\n\u{0}\u{1}");
        assert_eq!(meta, ParsedMetadata::default());
    }
}
