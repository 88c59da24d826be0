//! Work-order store: flat-file markdown persistence for feedback items.
//!
//! ## Layout
//!
//! ```text
//! <root>/
//!   .disabled                       presence = feedback capture disabled
//!   pending/<ts>_<slug>.md          awaiting action
//!   pending/<ts>_<slug>.png         optional companion screenshot
//!   actioned/<ts>_<slug>.md         resolved, status line rewritten
//!   actioned/<ts>_<slug>.png
//! ```
//!
//! The directory a file sits in is authoritative for its status; the
//! `**Status:**` line inside the file mirrors it for human and agent readers.
//! There is no index or cache: every listing rescans both directories.
//!
//! ## Moves
//!
//! `mark_actioned` / `mark_pending` move a markdown file and its companion
//! image as one unit, in this order:
//!
//! 1. write the destination markdown
//! 2. copy the companion image to the destination
//! 3. remove the source image
//! 4. remove the source markdown
//!
//! A crash part-way leaves a duplicate, never a lost work order.
//!
//! `store` writes the markdown before its companion image and removes the
//! markdown again if the image write fails, so a failed create leaves
//! neither file behind.
//!
//! ## Supporting Modules
//!
//! | Module       | Responsibility                                         |
//! |--------------|--------------------------------------------------------|
//! | `models`     | `NewWorkOrder`, `WorkOrderSummary`, type/priority enums |
//! | `markdown`   | Rendering, status rewrite, metadata extraction         |
//! | `screenshot` | Data-URL decoding for companion PNGs                   |

pub mod markdown;
pub mod models;
pub mod screenshot;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{Local, NaiveDateTime};

pub use models::*;

use crate::errors::StoreError;

const DISABLED_SENTINEL: &str = ".disabled";
const FALLBACK_SLUG: &str = "work-order";

/// File-backed CRUD and status transitions for work orders.
#[derive(Debug, Clone)]
pub struct WorkOrderStore {
    root: PathBuf,
    pending_dir: PathBuf,
    actioned_dir: PathBuf,
}

impl WorkOrderStore {
    /// Open the store rooted at `root`, creating `pending/` and `actioned/`
    /// (and any missing parents) if needed.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        let store = Self {
            pending_dir: root.join(Status::Pending.as_str()),
            actioned_dir: root.join(Status::Actioned.as_str()),
            root,
        };
        store.ensure_directories()?;
        Ok(store)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn dir(&self, status: Status) -> &Path {
        match status {
            Status::Pending => &self.pending_dir,
            Status::Actioned => &self.actioned_dir,
        }
    }

    fn ensure_directories(&self) -> Result<(), StoreError> {
        for dir in [&self.pending_dir, &self.actioned_dir] {
            std::fs::create_dir_all(dir).map_err(|e| StoreError::io("create directory", dir, e))?;
        }
        Ok(())
    }

    // ── Enabled flag ──────────────────────────────────────────────────

    pub fn is_enabled(&self) -> bool {
        !self.root.join(DISABLED_SENTINEL).exists()
    }

    pub fn enable(&self) -> Result<(), StoreError> {
        let flag = self.root.join(DISABLED_SENTINEL);
        match std::fs::remove_file(&flag) {
            Ok(()) => {
                tracing::info!("feedback capture enabled");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::io("remove", flag, e)),
        }
    }

    pub fn disable(&self) -> Result<(), StoreError> {
        self.ensure_directories()?;
        let flag = self.root.join(DISABLED_SENTINEL);
        let content = format!("Disabled at {}\n", Local::now().format(markdown::CREATED_FORMAT));
        std::fs::write(&flag, content).map_err(|e| StoreError::io("write", &flag, e))?;
        tracing::info!("feedback capture disabled");
        Ok(())
    }

    // ── Create ────────────────────────────────────────────────────────

    /// Persist a new pending work order and return its filename.
    pub fn store(&self, data: &NewWorkOrder) -> Result<String, StoreError> {
        self.store_at(data, Local::now().naive_local())
    }

    /// Persist a new pending work order with an explicit creation time.
    pub fn store_at(&self, data: &NewWorkOrder, created: NaiveDateTime) -> Result<String, StoreError> {
        self.ensure_directories()?;

        let filename = self.unique_filename(created, &data.message);
        let screenshot = match data.screenshot.as_deref().filter(|s| !s.trim().is_empty()) {
            Some(payload) => Some((companion_name(&filename), screenshot::decode_data_url(payload)?)),
            None => None,
        };

        let markdown = markdown::render(data, created, screenshot.as_ref().map(|(name, _)| name.as_str()))?;

        let md_path = self.pending_dir.join(&filename);
        std::fs::write(&md_path, markdown).map_err(|e| StoreError::io("write", &md_path, e))?;

        if let Some((name, bytes)) = &screenshot {
            let path = self.pending_dir.join(name);
            if let Err(e) = std::fs::write(&path, bytes) {
                // Leave no work order pointing at an image that was never written.
                if let Err(cleanup) = std::fs::remove_file(&md_path) {
                    tracing::warn!(path = %md_path.display(), error = %cleanup, "failed to remove work order");
                }
                return Err(StoreError::io("write", &path, e));
            }
        }

        tracing::info!(
            filename = %filename,
            kind = data.work_order_type.as_str(),
            screenshot = screenshot.is_some(),
            "work order stored"
        );
        Ok(filename)
    }

    /// `<YYYY-MM-DD_HHMMSS>_<slug>.md`, with `-2`, `-3`, ... appended to the
    /// slug if that name is already taken in either directory.
    fn unique_filename(&self, created: NaiveDateTime, message: &str) -> String {
        let mut slug = markdown::slugify(message, markdown::SLUG_SOURCE_CHARS);
        if slug.is_empty() {
            slug = FALLBACK_SLUG.to_string();
        }
        let stem = format!("{}_{}", created.format(markdown::FILENAME_TIMESTAMP_FORMAT), slug);

        let mut candidate = format!("{}.md", stem);
        let mut n = 2;
        while self.is_taken(&candidate) {
            candidate = format!("{}-{}.md", stem, n);
            n += 1;
        }
        candidate
    }

    fn is_taken(&self, filename: &str) -> bool {
        self.pending_dir.join(filename).exists() || self.actioned_dir.join(filename).exists()
    }

    // ── Transitions ───────────────────────────────────────────────────

    /// Move a pending work order to `actioned/`, stamping the status line
    /// and appending `## Agent Notes` when a note is given.
    ///
    /// Returns `Ok(false)` if the file is not in `pending/`.
    pub fn mark_actioned(&self, filename: &str, note: Option<&str>) -> Result<bool, StoreError> {
        let actioned_at = Local::now().naive_local();
        let note = note.map(str::trim).filter(|n| !n.is_empty());
        let moved = self.move_work_order(filename, Status::Pending, Status::Actioned, |content| {
            let content = markdown::rewrite_status(&content, &markdown::actioned_status_line(actioned_at));
            match note {
                Some(note) => markdown::append_notes(&content, note),
                None => content,
            }
        })?;
        if moved {
            tracing::info!(filename = %sanitise_filename(filename).unwrap_or_default(), noted = note.is_some(), "work order actioned");
        }
        Ok(moved)
    }

    /// Move an actioned work order back to `pending/`.
    ///
    /// Returns `Ok(false)` if the file is not in `actioned/`.
    pub fn mark_pending(&self, filename: &str) -> Result<bool, StoreError> {
        let moved = self.move_work_order(filename, Status::Actioned, Status::Pending, |content| {
            markdown::rewrite_status(&content, &markdown::pending_status_line())
        })?;
        if moved {
            tracing::info!(filename = %sanitise_filename(filename).unwrap_or_default(), "work order reopened");
        }
        Ok(moved)
    }

    fn move_work_order(
        &self,
        filename: &str,
        from: Status,
        to: Status,
        rewrite: impl FnOnce(String) -> String,
    ) -> Result<bool, StoreError> {
        let Some(name) = sanitise_filename(filename) else {
            return Ok(false);
        };
        let source = self.dir(from).join(&name);
        if !source.is_file() {
            return Ok(false);
        }
        self.ensure_directories()?;

        let content = std::fs::read_to_string(&source).map_err(|e| StoreError::io("read", &source, e))?;
        let dest = self.dir(to).join(&name);
        std::fs::write(&dest, rewrite(content)).map_err(|e| StoreError::io("write", &dest, e))?;

        let image = companion_name(&name);
        let source_image = self.dir(from).join(&image);
        if source_image.is_file() {
            let dest_image = self.dir(to).join(&image);
            std::fs::copy(&source_image, &dest_image).map_err(|e| StoreError::io("copy", &source_image, e))?;
            std::fs::remove_file(&source_image).map_err(|e| StoreError::io("remove", &source_image, e))?;
        }

        std::fs::remove_file(&source).map_err(|e| StoreError::io("remove", &source, e))?;
        Ok(true)
    }

    // ── Delete ────────────────────────────────────────────────────────

    /// Remove a work order and its companion image from `status`'s directory.
    ///
    /// Returns `Ok(false)` if the markdown file does not exist there.
    pub fn delete(&self, filename: &str, status: Status) -> Result<bool, StoreError> {
        let Some(name) = sanitise_filename(filename) else {
            return Ok(false);
        };
        let path = self.dir(status).join(&name);
        if !path.is_file() {
            return Ok(false);
        }

        let image = self.dir(status).join(companion_name(&name));
        match std::fs::remove_file(&image) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(StoreError::io("remove", image, e)),
        }
        std::fs::remove_file(&path).map_err(|e| StoreError::io("remove", &path, e))?;

        tracing::info!(filename = %name, status = %status, "work order deleted");
        Ok(true)
    }

    // ── Reads ─────────────────────────────────────────────────────────

    /// Both lists, newest first. Unreadable or malformed files degrade to
    /// empty fields (or are skipped if they vanish mid-scan).
    pub fn all(&self) -> WorkOrderListing {
        WorkOrderListing {
            pending: self.list_directory(Status::Pending),
            actioned: self.list_directory(Status::Actioned),
        }
    }

    pub fn counts(&self) -> Counts {
        Counts {
            pending: markdown_files(self.dir(Status::Pending)).len(),
            actioned: markdown_files(self.dir(Status::Actioned)).len(),
        }
    }

    /// Content of a pending work order, or `None` if it is no longer there.
    pub fn read_pending(&self, filename: &str) -> Result<Option<String>, StoreError> {
        let Some(name) = sanitise_filename(filename) else {
            return Ok(None);
        };
        let path = self.pending_dir.join(name);
        match std::fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::io("read", path, e)),
        }
    }

    /// Locate the companion image for `filename`, checking `pending/` first.
    pub fn screenshot_path(&self, filename: &str) -> Option<PathBuf> {
        let name = sanitise_filename(filename)?;
        let image = companion_name(&name);
        [Status::Pending, Status::Actioned]
            .into_iter()
            .map(|status| self.dir(status).join(&image))
            .find(|path| path.is_file())
    }

    fn list_directory(&self, status: Status) -> Vec<WorkOrderSummary> {
        let dir = self.dir(status);
        let mut items: Vec<WorkOrderSummary> = markdown_files(dir)
            .into_iter()
            .filter_map(|path| {
                let filename = path.file_name()?.to_str()?.to_string();
                let content = match std::fs::read(&path) {
                    Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
                    Err(e) => {
                        tracing::debug!(path = %path.display(), error = %e, "skipping unreadable work order");
                        return None;
                    }
                };
                let meta = markdown::parse_metadata(&content);
                Some(WorkOrderSummary {
                    has_screenshot: dir.join(companion_name(&filename)).is_file(),
                    filename,
                    title: meta.title,
                    work_order_type: meta.work_order_type,
                    priority: meta.priority,
                    created: meta.created,
                    status,
                })
            })
            .collect();

        items.sort_by(|a, b| b.filename.cmp(&a.filename));
        items
    }
}

/// Reduce a caller-supplied name to a bare `*.md` file name.
///
/// Directory components are stripped; anything that does not end in `.md`
/// (including `..` and empty names) is rejected.
pub fn sanitise_filename(filename: &str) -> Option<String> {
    let name = Path::new(filename.trim()).file_name()?.to_str()?;
    if name.len() > 3 && name.ends_with(".md") {
        Some(name.to_string())
    } else {
        None
    }
}

/// `foo.md` → `foo.png`.
pub fn companion_name(filename: &str) -> String {
    format!("{}.png", filename.strip_suffix(".md").unwrap_or(filename))
}

fn markdown_files(dir: &Path) -> Vec<PathBuf> {
    if !dir.is_dir() {
        return Vec::new();
    }
    let pattern = format!("{}/*.md", glob::Pattern::escape(&dir.to_string_lossy()));
    match glob::glob(&pattern) {
        Ok(paths) => paths.filter_map(|entry| entry.ok()).filter(|p| p.is_file()).collect(),
        Err(e) => {
            tracing::warn!(pattern = %pattern, error = %e, "invalid work order glob");
            Vec::new()
        }
    }
}

// ── Async handle ──────────────────────────────────────────────────────

/// Async-safe handle to the work-order store.
///
/// Runs every store call on tokio's blocking thread pool via
/// `spawn_blocking`, keeping synchronous file I/O off async worker threads.
#[derive(Clone)]
pub struct StoreHandle {
    inner: Arc<WorkOrderStore>,
}

impl StoreHandle {
    pub fn new(store: WorkOrderStore) -> Self {
        Self {
            inner: Arc::new(store),
        }
    }

    /// Run a closure against the store on a blocking thread.
    /// All data passed into `f` must be owned (`'static`).
    pub async fn call<F, R>(&self, f: F) -> Result<R, StoreError>
    where
        F: FnOnce(&WorkOrderStore) -> Result<R, StoreError> + Send + 'static,
        R: Send + 'static,
    {
        let store = self.inner.clone();
        tokio::task::spawn_blocking(move || f(&store))
            .await
            .map_err(|e| StoreError::TaskPanicked(e.to_string()))?
    }

    /// Direct access for cheap, non-I/O calls (paths, configuration).
    pub fn store(&self) -> &WorkOrderStore {
        &self.inner
    }
}
