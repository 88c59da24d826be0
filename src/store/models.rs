use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Most console errors / network failures recorded per work order.
pub const MAX_CAPTURED_ENTRIES: usize = 5;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WorkOrderType {
    #[default]
    Feedback,
    Task,
    Idea,
    Bug,
}

impl WorkOrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Feedback => "feedback",
            Self::Task => "task",
            Self::Idea => "idea",
            Self::Bug => "bug",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Feedback => "Feedback",
            Self::Task => "Task",
            Self::Idea => "Idea",
            Self::Bug => "Bug",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            Self::Feedback => "\u{1F4AC}",
            Self::Task => "\u{1F4CB}",
            Self::Idea => "\u{1F4A1}",
            Self::Bug => "\u{1F41B}",
        }
    }

    /// Parse a type name, falling back to `Feedback` for anything unknown.
    pub fn parse_lenient(s: &str) -> Self {
        s.parse().unwrap_or_default()
    }
}

impl FromStr for WorkOrderType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "feedback" => Ok(Self::Feedback),
            "task" => Ok(Self::Task),
            "idea" => Ok(Self::Idea),
            "bug" => Ok(Self::Bug),
            _ => Err(format!("Invalid type: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            Self::Low => "\u{1F7E2}",
            Self::Medium => "\u{1F7E0}",
            Self::High => "\u{1F534}",
        }
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            _ => Err(format!("Invalid priority: {}", s)),
        }
    }
}

/// Which directory a work order lives in.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Pending,
    Actioned,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Actioned => "actioned",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            Self::Pending => "\u{1F7E1}",
            Self::Actioned => "\u{2705}",
        }
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "actioned" => Ok(Self::Actioned),
            _ => Err(format!("Invalid status: {}", s)),
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ConsoleError {
    pub message: String,
    #[serde(default)]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NetworkFailure {
    pub url: String,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub status: Option<i64>,
    #[serde(default, rename = "statusText")]
    pub status_text: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct BoundingBox {
    pub top: f64,
    pub left: f64,
    pub width: f64,
    pub height: f64,
}

/// The DOM element a user pointed at when submitting.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TargetedElement {
    #[serde(default)]
    pub selector: String,
    #[serde(default, alias = "tagName")]
    pub tag_name: String,
    #[serde(default, alias = "textContent")]
    pub text_content: String,
    #[serde(default, alias = "boundingBox")]
    pub bounding_box: Option<BoundingBox>,
}

/// Everything a caller can hand to `WorkOrderStore::store`.
///
/// Only `message` is required; empty strings and empty collections are
/// treated as "not provided" when rendering.
#[derive(Debug, Clone, Default)]
pub struct NewWorkOrder {
    pub message: String,
    pub work_order_type: WorkOrderType,
    pub priority: Option<Priority>,
    pub url: String,
    pub route_name: String,
    pub route_action: String,
    pub method: String,
    pub route_params: serde_json::Map<String, serde_json::Value>,
    pub query_params: serde_json::Map<String, serde_json::Value>,
    pub views: Vec<String>,
    pub viewport: String,
    pub user: String,
    pub user_agent: String,
    /// `data:image/png;base64,...` payload.
    pub screenshot: Option<String>,
    pub console_errors: Vec<ConsoleError>,
    pub network_failures: Vec<NetworkFailure>,
    pub targeted_element: Option<TargetedElement>,
    pub extra_context: serde_json::Map<String, serde_json::Value>,
}

impl NewWorkOrder {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn with_type(mut self, work_order_type: WorkOrderType) -> Self {
        self.work_order_type = work_order_type;
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }
}

/// Listing row parsed back out of a work-order file.
///
/// `work_order_type` and `priority` hold the rendered labels as they appear
/// in the file (e.g. `Bug`, `🔴 High`), or empty strings when missing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkOrderSummary {
    pub filename: String,
    pub title: String,
    #[serde(rename = "type")]
    pub work_order_type: String,
    pub priority: String,
    pub created: String,
    pub status: Status,
    pub has_screenshot: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct WorkOrderListing {
    pub pending: Vec<WorkOrderSummary>,
    pub actioned: Vec<WorkOrderSummary>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Counts {
    pub pending: usize,
    pub actioned: usize,
}
