use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Path, State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use tokio::sync::broadcast;

use super::ws::{WsMessage, broadcast_message};
use crate::errors::StoreError;
use crate::floop_config::FloopConfig;
use crate::store::{
    ConsoleError, MAX_CAPTURED_ENTRIES, NetworkFailure, NewWorkOrder, Priority, Status, StoreHandle,
    TargetedElement, WorkOrderType,
};

const MAX_CONSOLE_MESSAGE: usize = 500;
const MAX_TIMESTAMP: usize = 20;
const MAX_NETWORK_URL: usize = 2000;
const MAX_NETWORK_METHOD: usize = 10;
const MAX_STATUS_TEXT: usize = 200;

/// Room for the message and captured context on top of the screenshot.
const BODY_HEADROOM: usize = 1024 * 1024;

// ── Shared application state ──────────────────────────────────────────

/// Limits and defaults applied to `POST {prefix}`.
#[derive(Debug, Clone)]
pub struct SubmissionLimits {
    pub default_type: WorkOrderType,
    pub screenshot_max_size: usize,
    pub max_message_length: usize,
}

impl Default for SubmissionLimits {
    fn default() -> Self {
        Self {
            default_type: WorkOrderType::Feedback,
            screenshot_max_size: 5 * 1024 * 1024,
            max_message_length: 5000,
        }
    }
}

impl SubmissionLimits {
    /// Largest `POST {prefix}` body accepted before the JSON is parsed.
    pub fn body_limit(&self) -> usize {
        self.screenshot_max_size.saturating_add(BODY_HEADROOM)
    }

    fn screenshot_too_large(&self) -> String {
        format!("The screenshot must not be greater than {} bytes.", self.screenshot_max_size)
    }
}

impl From<&FloopConfig> for SubmissionLimits {
    fn from(config: &FloopConfig) -> Self {
        Self {
            default_type: config.default_type(),
            screenshot_max_size: config.toml.submission.screenshot_max_size,
            max_message_length: config.toml.submission.max_message_length,
        }
    }
}

pub struct AppState {
    pub store: StoreHandle,
    pub ws_tx: broadcast::Sender<String>,
    pub limits: SubmissionLimits,
}

pub type SharedState = Arc<AppState>;

// ── Request payload types ─────────────────────────────────────────────

/// Body of `POST {prefix}`. Underscore-prefixed fields are request context
/// injected by the widget.
#[derive(Debug, Default, Deserialize)]
pub struct SubmitRequest {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default, rename = "type")]
    pub work_order_type: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub screenshot: Option<String>,
    #[serde(default)]
    pub console_errors: Option<Vec<ConsoleError>>,
    #[serde(default)]
    pub network_failures: Option<Vec<NetworkFailure>>,
    #[serde(default)]
    pub targeted_element: Option<TargetedElement>,
    #[serde(default)]
    pub extra_context: Option<serde_json::Map<String, serde_json::Value>>,
    #[serde(default, rename = "_route_name")]
    pub route_name: Option<String>,
    #[serde(default, rename = "_route_action")]
    pub route_action: Option<String>,
    #[serde(default, rename = "_route_params")]
    pub route_params: Option<serde_json::Value>,
    #[serde(default, rename = "_query_params")]
    pub query_params: Option<serde_json::Value>,
    #[serde(default, rename = "_views")]
    pub views: Option<serde_json::Value>,
    #[serde(default, rename = "_viewport")]
    pub viewport: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ActionRequest {
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkOrderAction {
    Done,
    Reopen,
    Delete,
}

impl WorkOrderAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Done => "done",
            Self::Reopen => "reopen",
            Self::Delete => "delete",
        }
    }
}

impl FromStr for WorkOrderAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "done" => Ok(Self::Done),
            "reopen" => Ok(Self::Reopen),
            "delete" => Ok(Self::Delete),
            _ => Err(format!("Invalid action: {}", s)),
        }
    }
}

// ── Error handling ────────────────────────────────────────────────────

pub type FieldErrors = BTreeMap<String, Vec<String>>;

pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Forbidden(String),
    Unprocessable(FieldErrors),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            ApiError::Unprocessable(errors) => {
                return (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    Json(serde_json::json!({"success": false, "errors": errors})),
                )
                    .into_response();
            }
        };
        (status, Json(serde_json::json!({"success": false, "message": message}))).into_response()
    }
}

/// Log the underlying store failure and return a message free of paths.
fn storage_failure(e: StoreError) -> ApiError {
    tracing::error!(error = %e, "work order store failure");
    ApiError::Internal("Feedback storage is unavailable.".into())
}

fn single_error(field: &str, message: impl Into<String>) -> ApiError {
    let mut errors = FieldErrors::new();
    errors.insert(field.to_string(), vec![message.into()]);
    ApiError::Unprocessable(errors)
}

fn body_rejection(rejection: JsonRejection) -> ApiError {
    match rejection {
        JsonRejection::JsonDataError(e) => single_error("body", e.body_text()),
        other => ApiError::BadRequest(other.body_text()),
    }
}

// ── Router ────────────────────────────────────────────────────────────

/// Routes mounted under `prefix` (`""` or `/segment`), plus `/health`.
///
/// The submit route accepts bodies up to `limits.body_limit()` so that a
/// screenshot at `screenshot_max_size` still reaches validation.
pub fn api_router(prefix: &str, limits: &SubmissionLimits) -> Router<SharedState> {
    let root = if prefix.is_empty() { "/" } else { prefix };
    Router::new()
        .route(
            root,
            get(list_work_orders)
                .post(submit_work_order)
                .layer(DefaultBodyLimit::max(limits.body_limit())),
        )
        .route(&format!("{}/counts", prefix), get(work_order_counts))
        .route(&format!("{}/action", prefix), post(action_work_order))
        .route(&format!("{}/screenshots/{{filename}}", prefix), get(serve_screenshot))
        .route("/health", get(health_check))
}

// ── Validation ────────────────────────────────────────────────────────

fn push(errors: &mut FieldErrors, field: impl Into<String>, message: impl Into<String>) {
    errors.entry(field.into()).or_default().push(message.into());
}

fn check_len(errors: &mut FieldErrors, field: String, value: Option<&str>, max: usize) {
    if let Some(value) = value
        && value.chars().count() > max
    {
        let message = format!("The {} field must not be greater than {} characters.", field, max);
        push(errors, field, message);
    }
}

/// Field-keyed validation messages for a submission; empty when valid.
pub fn validate_submission(req: &SubmitRequest, limits: &SubmissionLimits) -> FieldErrors {
    let mut errors = FieldErrors::new();

    match req.message.as_deref().map(str::trim) {
        None | Some("") => push(&mut errors, "message", "The message field is required."),
        Some(message) => check_len(&mut errors, "message".into(), Some(message), limits.max_message_length),
    }

    if let Some(kind) = req.work_order_type.as_deref()
        && kind.parse::<WorkOrderType>().is_err()
    {
        push(&mut errors, "type", "The selected type is invalid.");
    }

    if let Some(priority) = req.priority.as_deref()
        && priority.parse::<Priority>().is_err()
    {
        push(&mut errors, "priority", "The selected priority is invalid.");
    }

    if let Some(screenshot) = req.screenshot.as_deref()
        && screenshot.len() > limits.screenshot_max_size
    {
        push(&mut errors, "screenshot", limits.screenshot_too_large());
    }

    if let Some(entries) = &req.console_errors {
        if entries.len() > MAX_CAPTURED_ENTRIES {
            push(
                &mut errors,
                "console_errors",
                format!("The console errors field must not have more than {} items.", MAX_CAPTURED_ENTRIES),
            );
        }
        for (i, entry) in entries.iter().enumerate() {
            if entry.message.trim().is_empty() {
                push(&mut errors, format!("console_errors.{}.message", i), "The message field is required.");
            }
            check_len(&mut errors, format!("console_errors.{}.message", i), Some(&entry.message), MAX_CONSOLE_MESSAGE);
            check_len(&mut errors, format!("console_errors.{}.timestamp", i), entry.timestamp.as_deref(), MAX_TIMESTAMP);
        }
    }

    if let Some(entries) = &req.network_failures {
        if entries.len() > MAX_CAPTURED_ENTRIES {
            push(
                &mut errors,
                "network_failures",
                format!("The network failures field must not have more than {} items.", MAX_CAPTURED_ENTRIES),
            );
        }
        for (i, entry) in entries.iter().enumerate() {
            if entry.url.trim().is_empty() {
                push(&mut errors, format!("network_failures.{}.url", i), "The url field is required.");
            }
            check_len(&mut errors, format!("network_failures.{}.url", i), Some(&entry.url), MAX_NETWORK_URL);
            check_len(&mut errors, format!("network_failures.{}.method", i), entry.method.as_deref(), MAX_NETWORK_METHOD);
            check_len(&mut errors, format!("network_failures.{}.statusText", i), entry.status_text.as_deref(), MAX_STATUS_TEXT);
            check_len(&mut errors, format!("network_failures.{}.timestamp", i), entry.timestamp.as_deref(), MAX_TIMESTAMP);
        }
    }

    errors
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

fn as_object(value: Option<serde_json::Value>) -> serde_json::Map<String, serde_json::Value> {
    match value {
        Some(serde_json::Value::Object(map)) => map,
        _ => serde_json::Map::new(),
    }
}

/// Combine a validated body with request headers into a `NewWorkOrder`.
pub fn build_work_order(req: SubmitRequest, headers: &HeaderMap, limits: &SubmissionLimits) -> NewWorkOrder {
    let views = match req.views {
        Some(serde_json::Value::Array(items)) => items
            .into_iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    };

    NewWorkOrder {
        message: req.message.unwrap_or_default().trim().to_string(),
        work_order_type: req
            .work_order_type
            .as_deref()
            .and_then(|t| t.parse().ok())
            .unwrap_or(limits.default_type),
        priority: req.priority.as_deref().and_then(|p| p.parse().ok()),
        url: header_str(headers, "x-feedback-url")
            .or_else(|| header_str(headers, header::REFERER.as_str()))
            .unwrap_or_default()
            .to_string(),
        method: header_str(headers, "x-feedback-method").unwrap_or("GET").to_string(),
        user: header_str(headers, "x-feedback-user").unwrap_or("Guest").to_string(),
        user_agent: header_str(headers, header::USER_AGENT.as_str())
            .unwrap_or_default()
            .to_string(),
        route_name: req.route_name.unwrap_or_default(),
        route_action: req.route_action.unwrap_or_default(),
        route_params: as_object(req.route_params),
        query_params: as_object(req.query_params),
        views,
        viewport: req.viewport.unwrap_or_default(),
        screenshot: req.screenshot.filter(|s| !s.trim().is_empty()),
        console_errors: req.console_errors.unwrap_or_default(),
        network_failures: req.network_failures.unwrap_or_default(),
        targeted_element: req.targeted_element,
        extra_context: req.extra_context.unwrap_or_default(),
    }
}

// ── Handlers ──────────────────────────────────────────────────────────

async fn health_check() -> &'static str {
    "ok"
}

async fn list_work_orders(State(state): State<SharedState>) -> Result<impl IntoResponse, ApiError> {
    let listing = state
        .store
        .call(|store| Ok(store.all()))
        .await
        .map_err(storage_failure)?;
    Ok(Json(listing))
}

async fn work_order_counts(State(state): State<SharedState>) -> Result<impl IntoResponse, ApiError> {
    let counts = state
        .store
        .call(|store| Ok(store.counts()))
        .await
        .map_err(storage_failure)?;
    Ok(Json(counts))
}

async fn submit_work_order(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: Result<Json<SubmitRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let enabled = state
        .store
        .call(|store| Ok(store.is_enabled()))
        .await
        .map_err(storage_failure)?;
    if !enabled {
        return Err(ApiError::Forbidden("Feedback is disabled.".into()));
    }

    let Json(req) = body.map_err(|rejection| {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            single_error("screenshot", state.limits.screenshot_too_large())
        } else {
            body_rejection(rejection)
        }
    })?;
    let errors = validate_submission(&req, &state.limits);
    if !errors.is_empty() {
        return Err(ApiError::Unprocessable(errors));
    }

    let work_order = build_work_order(req, &headers, &state.limits);
    let kind = work_order.work_order_type;
    let message = work_order.message.clone();

    let filename = state
        .store
        .call(move |store| store.store(&work_order))
        .await
        .map_err(|e| match e {
            StoreError::InvalidScreenshot(msg) => single_error("screenshot", msg),
            other => storage_failure(other),
        })?;

    broadcast_message(
        &state.ws_tx,
        &WsMessage::WorkOrderStored {
            filename: filename.clone(),
            work_order_type: kind,
            message,
        },
    );

    Ok(Json(serde_json::json!({
        "success": true,
        "filename": filename,
        "message": format!("{} submitted successfully.", kind.label()),
    })))
}

async fn action_work_order(
    State(state): State<SharedState>,
    body: Result<Json<ActionRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = body.map_err(body_rejection)?;

    let mut errors = FieldErrors::new();
    let filename = req.filename.as_deref().map(str::trim).unwrap_or_default().to_string();
    if filename.is_empty() {
        push(&mut errors, "filename", "The filename field is required.");
    }
    let action = match req.action.as_deref() {
        None | Some("") => {
            push(&mut errors, "action", "The action field is required.");
            None
        }
        Some(a) => match a.parse::<WorkOrderAction>() {
            Ok(action) => Some(action),
            Err(_) => {
                push(&mut errors, "action", "The selected action is invalid.");
                None
            }
        },
    };
    let Some(action) = action.filter(|_| errors.is_empty()) else {
        return Err(ApiError::Unprocessable(errors));
    };

    let note = req.note;
    let target = filename.clone();
    let done = state
        .store
        .call(move |store| match action {
            WorkOrderAction::Done => store.mark_actioned(&target, note.as_deref()),
            WorkOrderAction::Reopen => store.mark_pending(&target),
            WorkOrderAction::Delete => {
                Ok(store.delete(&target, Status::Pending)? || store.delete(&target, Status::Actioned)?)
            }
        })
        .await
        .map_err(storage_failure)?;

    if !done {
        return Err(ApiError::NotFound(format!(
            "Could not {} item: {}",
            action.as_str(),
            filename
        )));
    }

    let event = match action {
        WorkOrderAction::Done => WsMessage::WorkOrderActioned { filename },
        WorkOrderAction::Reopen => WsMessage::WorkOrderReopened { filename },
        WorkOrderAction::Delete => WsMessage::WorkOrderDeleted { filename },
    };
    broadcast_message(&state.ws_tx, &event);

    Ok(Json(serde_json::json!({
        "success": true,
        "message": format!("Item {} successfully.", action.as_str()),
    })))
}

/// Serve a companion screenshot. Accepts either the `.png` or the `.md` name.
async fn serve_screenshot(
    State(state): State<SharedState>,
    Path(filename): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let markdown_name = match filename.strip_suffix(".png") {
        Some(stem) => format!("{}.md", stem),
        None => filename.clone(),
    };

    let path = state
        .store
        .call(move |store| Ok(store.screenshot_path(&markdown_name)))
        .await
        .map_err(storage_failure)?
        .ok_or_else(|| ApiError::NotFound(format!("Screenshot not found: {}", filename)))?;

    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|e| storage_failure(StoreError::io("read", &path, e)))?;

    Ok((StatusCode::OK, [(header::CONTENT_TYPE, "image/png")], bytes))
}
