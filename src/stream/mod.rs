use std::path::Path;

use serde::Deserialize;
use serde_json::Value;

/// Events from Claude CLI's stream-json output format
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum StreamEvent {
    #[serde(rename = "assistant")]
    Assistant {
        message: AssistantMessage,
        #[serde(default)]
        session_id: String,
    },

    #[serde(rename = "result")]
    Result {
        #[serde(default)]
        subtype: String,
        #[serde(default)]
        result: Option<String>,
        #[serde(default)]
        is_error: bool,
        #[serde(default)]
        duration_ms: Option<u64>,
        #[serde(default)]
        num_turns: Option<u32>,
        #[serde(default, alias = "total_cost_usd")]
        cost_usd: Option<f64>,
    },

    #[serde(rename = "system")]
    System {
        #[serde(default)]
        subtype: String,
    },

    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
pub struct AssistantMessage {
    #[serde(default)]
    pub content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum ContentBlock {
    #[serde(rename = "tool_use")]
    ToolUse {
        name: String,
        #[serde(default)]
        input: Value,
        #[serde(default)]
        id: String,
    },

    #[serde(rename = "text")]
    Text { text: String },

    #[serde(other)]
    Other,
}

/// Parse one NDJSON line; blank or unparseable lines yield `None`.
pub fn parse_line(line: &str) -> Option<StreamEvent> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match serde_json::from_str(line) {
        Ok(event) => Some(event),
        Err(e) => {
            tracing::debug!(error = %e, "ignoring non-event output line");
            None
        }
    }
}

/// One display line for a tool invocation, or `None` for tools not shown.
pub fn describe_tool_use(name: &str, input: &Value, project_dir: &Path) -> Option<String> {
    let field = |key: &str| input.get(key).and_then(|v| v.as_str()).unwrap_or("");
    let line = match name {
        "Read" => format!("\u{1F4C4} Read: {}", shorten_path(field("file_path"), project_dir)),
        "Edit" => format!("\u{270F}\u{FE0F}  Edit: {}", shorten_path(field("file_path"), project_dir)),
        "Write" => format!("\u{1F4DD} Write: {}", shorten_path(field("file_path"), project_dir)),
        "Glob" => format!("\u{1F50D} Glob: {}", field("pattern")),
        "Grep" => format!("\u{1F50E} Grep: {}", field("pattern")),
        "Bash" => format!("\u{26A1} Run: {}", truncate_str(field("command"), 60)),
        "Task" => {
            let desc = input
                .get("description")
                .or_else(|| input.get("prompt"))
                .and_then(|v| v.as_str())
                .unwrap_or("");
            format!("\u{1F916} Agent: {}", truncate_str(desc, 50))
        }
        _ => return None,
    };
    Some(line)
}

/// `🏁 Done (m:ss, N turns, $c.cc)`, omitting parts that are absent.
pub fn describe_result(duration_ms: Option<u64>, num_turns: Option<u32>, cost_usd: Option<f64>) -> String {
    let mut parts = Vec::new();
    if let Some(ms) = duration_ms {
        parts.push(format_elapsed((ms + 500) / 1000));
    }
    if let Some(turns) = num_turns {
        parts.push(format!("{} turns", turns));
    }
    if let Some(cost) = cost_usd {
        parts.push(format!("${:.2}", cost));
    }

    if parts.is_empty() {
        "\u{1F3C1} Done".to_string()
    } else {
        format!("\u{1F3C1} Done ({})", parts.join(", "))
    }
}

/// Seconds as `m:ss`.
pub fn format_elapsed(seconds: u64) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

/// Strip the project directory prefix so paths read relative to it.
fn shorten_path(path: &str, project_dir: &Path) -> String {
    Path::new(path)
        .strip_prefix(project_dir)
        .map(|p| p.display().to_string())
        .unwrap_or_else(|_| path.to_string())
}

/// Single-line, char-safe truncation with ellipsis.
fn truncate_str(s: &str, max_len: usize) -> String {
    let flat = s.replace('\n', " ");
    if flat.chars().count() <= max_len {
        flat
    } else {
        let cut: String = flat.chars().take(max_len).collect();
        format!("{}...", cut)
    }
}
