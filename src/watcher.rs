//! Agent watcher: polls `pending/` and hands each new work order to a coding
//! agent, oldest first.
//!
//! The agent is expected to close the loop itself by running
//! `floop action <file> --note "..."`. The watcher only remembers which
//! filenames it has already handed out during this process so that an item
//! the agent failed to close is not retried forever.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use console::style;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

use crate::errors::WatchError;
use crate::store::StoreHandle;
use crate::stream::{self, ContentBlock, StreamEvent};
use crate::ui::icons;

const RULE_WIDTH: usize = 60;

/// How a single agent invocation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentOutcome {
    Succeeded,
    Failed { exit_code: Option<i32> },
    TimedOut,
}

impl AgentOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }
}

/// Abstraction over agent execution for testability.
/// Real implementation: `ClaudeRunner`.
#[async_trait]
pub trait AgentRunner: Send + Sync {
    async fn run(&self, prompt: &str, timeout: Duration) -> Result<AgentOutcome, WatchError>;
}

/// Runs the Claude CLI in print mode with stream-json output.
#[derive(Debug, Clone)]
pub struct ClaudeRunner {
    claude_cmd: String,
    tools: String,
    model: Option<String>,
    project_dir: PathBuf,
}

impl ClaudeRunner {
    pub fn new(
        claude_cmd: impl Into<String>,
        tools: impl Into<String>,
        model: Option<String>,
        project_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            claude_cmd: claude_cmd.into(),
            tools: tools.into(),
            model: model.filter(|m| !m.trim().is_empty()),
            project_dir: project_dir.into(),
        }
    }

    pub fn command_args(&self, prompt: &str) -> Vec<String> {
        let mut args = vec![
            "-p".to_string(),
            prompt.to_string(),
            "--verbose".to_string(),
            "--output-format".to_string(),
            "stream-json".to_string(),
            "--allowedTools".to_string(),
            self.tools.clone(),
        ];
        if let Some(model) = &self.model {
            args.push("--model".to_string());
            args.push(model.clone());
        }
        args
    }
}

#[async_trait]
impl AgentRunner for ClaudeRunner {
    async fn run(&self, prompt: &str, timeout: Duration) -> Result<AgentOutcome, WatchError> {
        let mut child = Command::new(&self.claude_cmd)
            .args(self.command_args(prompt))
            .current_dir(&self.project_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(WatchError::SpawnFailed)?;

        let stdout = child.stdout.take();
        let stderr_task = child.stderr.take().map(|stderr| {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    eprintln!("{}", style(line).red());
                }
            })
        });

        let started = Instant::now();
        let project_dir = self.project_dir.clone();
        let work = async {
            if let Some(stdout) = stdout {
                let mut lines = BufReader::new(stdout).lines();
                while let Some(line) = lines.next_line().await.map_err(WatchError::Output)? {
                    let elapsed = stream::format_elapsed(started.elapsed().as_secs());
                    for label in render_stream_line(&line, &project_dir) {
                        println!("  {}  {}", style(&elapsed).dim(), label);
                    }
                }
            }
            child.wait().await.map_err(WatchError::Output)
        };

        let result = tokio::time::timeout(timeout, work).await;
        let outcome = match result {
            Ok(status) => {
                let status = status?;
                if status.success() {
                    AgentOutcome::Succeeded
                } else {
                    AgentOutcome::Failed {
                        exit_code: status.code(),
                    }
                }
            }
            Err(_) => {
                if let Err(e) = child.kill().await {
                    tracing::warn!(error = %e, "failed to kill timed-out agent");
                }
                AgentOutcome::TimedOut
            }
        };

        if let Some(task) = stderr_task {
            let _ = task.await;
        }
        Ok(outcome)
    }
}

/// Display labels for one line of stream-json output.
pub fn render_stream_line(line: &str, project_dir: &Path) -> Vec<String> {
    match stream::parse_line(line) {
        Some(StreamEvent::Assistant { message, .. }) => message
            .content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::ToolUse { name, input, .. } => stream::describe_tool_use(name, input, project_dir),
                _ => None,
            })
            .collect(),
        Some(StreamEvent::Result {
            duration_ms,
            num_turns,
            cost_usd,
            ..
        }) => vec![stream::describe_result(duration_ms, num_turns, cost_usd)],
        _ => Vec::new(),
    }
}

/// True if `cmd` is an existing file path, or a file name found on `PATH`.
pub fn agent_exists(cmd: &str) -> bool {
    let path = Path::new(cmd);
    if path.components().count() > 1 {
        return path.is_file();
    }
    std::env::var_os("PATH")
        .map(|paths| std::env::split_paths(&paths).any(|dir| dir.join(cmd).is_file()))
        .unwrap_or(false)
}

/// Prompt handed to the agent for one work order.
pub fn build_prompt(filename: &str, content: &str, action_command: &str) -> String {
    format!(
        r#"You have a Floop work order to process.

## Work Order: {filename}

{content}

## Instructions

- The message says what to change; the page context says where it was reported.
- Find the code behind the route, controller or view before editing anything.
- Make the smallest change that resolves the request, in the style of the surrounding code.
- Do not touch any other work order.

## Important

- Process exactly ONE work order: {filename}
- When finished: {action_command} action {filename} --note="Brief description of what you changed"
- If you can't action it, still close the loop with a note explaining why
"#
    )
}

/// `floop --storage-path <root>`, so the agent actions the store being watched.
pub fn action_command_for(storage_path: &Path) -> String {
    let path = storage_path.display().to_string();
    let safe = |c: char| c.is_ascii_alphanumeric() || "/._-:~".contains(c);
    if !path.is_empty() && path.chars().all(safe) {
        format!("floop --storage-path {}", path)
    } else {
        format!("floop --storage-path '{}'", path.replace('\'', r"'\''"))
    }
}

#[derive(Debug, Clone)]
pub struct WatchOptions {
    pub interval: Duration,
    pub timeout: Duration,
    /// Extra attempts after the first failed run.
    pub retries: u32,
    pub once: bool,
    /// Command the agent runs to close the loop, e.g. `floop`.
    pub action_command: String,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            timeout: Duration::from_secs(300),
            retries: 2,
            once: false,
            action_command: "floop".to_string(),
        }
    }
}

/// Result of handing one work order to the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkOrderResult {
    Finished { attempts: u32 },
    Failed { attempts: u32 },
    Skipped,
}

pub struct Watcher<R> {
    store: StoreHandle,
    runner: R,
    options: WatchOptions,
    processed: HashSet<String>,
}

impl<R: AgentRunner> Watcher<R> {
    pub fn new(store: StoreHandle, runner: R, options: WatchOptions) -> Self {
        Self {
            store,
            runner,
            options,
            processed: HashSet::new(),
        }
    }

    pub fn processed(&self) -> &HashSet<String> {
        &self.processed
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Poll until cancelled, or for a single pass with `once`.
    pub async fn run(&mut self) -> Result<(), WatchError> {
        println!(
            "{}Floop watcher started (polling every {}s)",
            icons::EYES,
            self.options.interval.as_secs()
        );
        if !self.options.once {
            println!("Press Ctrl+C to stop");
        }
        println!();

        loop {
            let handled = self.poll_once().await?;
            if self.options.once {
                if handled == 0 {
                    println!("No new work orders to process.");
                }
                return Ok(());
            }
            tokio::time::sleep(self.options.interval).await;
        }
    }

    /// Process every pending work order not yet seen, oldest first.
    /// Returns how many were handed out.
    pub async fn poll_once(&mut self) -> Result<usize, WatchError> {
        let pending = self.store.call(|store| Ok(store.all().pending)).await?;

        let new_items: Vec<String> = pending
            .into_iter()
            .rev()
            .map(|summary| summary.filename)
            .filter(|filename| !self.processed.contains(filename))
            .collect();

        tracing::debug!(count = new_items.len(), "polled pending work orders");
        for filename in &new_items {
            self.processed.insert(filename.clone());
            self.process(filename).await?;
        }
        Ok(new_items.len())
    }

    pub async fn process(&self, filename: &str) -> Result<WorkOrderResult, WatchError> {
        let name = filename.to_string();
        let Some(content) = self.store.call(move |store| store.read_pending(&name)).await? else {
            println!(
                "{}{}",
                icons::WARN,
                style(format!("Skipping {}: file no longer exists.", filename)).yellow()
            );
            return Ok(WorkOrderResult::Skipped);
        };

        let rule = "\u{2500}".repeat(RULE_WIDTH);
        println!();
        println!("{}", style(&rule).dim());
        println!("{}Processing: {}", icons::WORK_ORDER, style(filename).bold());
        println!("{}", style(&rule).dim());
        println!();

        let prompt = build_prompt(filename, &content, &self.options.action_command);
        let max_attempts = self.options.retries + 1;

        for attempt in 1..=max_attempts {
            tracing::info!(filename, attempt, "running agent");
            let outcome = match self.runner.run(&prompt, self.options.timeout).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::warn!(filename, attempt, error = %e, "agent run failed");
                    println!("{}{}", icons::CROSS, style(&e).red());
                    AgentOutcome::Failed { exit_code: None }
                }
            };

            match outcome {
                AgentOutcome::Succeeded => {
                    println!();
                    println!("{}Finished: {}", icons::CHECK, filename);
                    return Ok(WorkOrderResult::Finished { attempts: attempt });
                }
                AgentOutcome::TimedOut => {
                    println!();
                    println!(
                        "{}{}",
                        icons::CLOCK,
                        style(format!("Timed out after {}s", self.options.timeout.as_secs())).yellow()
                    );
                }
                AgentOutcome::Failed {
                    exit_code: Some(code),
                } => {
                    println!("{}", style(format!("Exit code: {}", code)).yellow());
                }
                AgentOutcome::Failed { exit_code: None } => {}
            }

            if attempt < max_attempts {
                println!(
                    "{}",
                    style(format!("Attempt {} failed, retrying...", attempt)).yellow()
                );
            }
        }

        println!(
            "{}{}",
            icons::CROSS,
            style(format!(
                "Failed after {} attempts, skipping: {}",
                max_attempts, filename
            ))
            .red()
        );
        tracing::warn!(filename, attempts = max_attempts, "giving up on work order");
        Ok(WorkOrderResult::Failed {
            attempts: max_attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{NewWorkOrder, WorkOrderStore};
    use chrono::NaiveDate;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Replays queued outcomes (then succeeds) and records every prompt.
    #[derive(Default)]
    struct ScriptedRunner {
        outcomes: Mutex<VecDeque<AgentOutcome>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedRunner {
        fn with_outcomes(outcomes: impl IntoIterator<Item = AgentOutcome>) -> Self {
            Self {
                outcomes: Mutex::new(outcomes.into_iter().collect()),
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn prompts(&self) -> Vec<String> {
            self.prompts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl AgentRunner for ScriptedRunner {
        async fn run(&self, prompt: &str, _timeout: Duration) -> Result<AgentOutcome, WatchError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok(self
                .outcomes
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(AgentOutcome::Succeeded))
        }
    }

    fn make_store() -> (TempDir, StoreHandle) {
        let dir = TempDir::new().unwrap();
        let store = WorkOrderStore::open(dir.path()).unwrap();
        (dir, StoreHandle::new(store))
    }

    fn store_on_day(handle: &StoreHandle, message: &str, day: u32) -> String {
        let created = NaiveDate::from_ymd_opt(2024, 1, day)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        handle.store().store_at(&NewWorkOrder::new(message), created).unwrap()
    }

    fn once() -> WatchOptions {
        WatchOptions {
            interval: Duration::from_millis(1),
            once: true,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_processes_oldest_first() {
        let (_dir, store) = make_store();
        let newest = store_on_day(&store, "newest", 3);
        let oldest = store_on_day(&store, "oldest", 1);
        let middle = store_on_day(&store, "middle", 2);

        let mut watcher = Watcher::new(store, ScriptedRunner::default(), once());
        assert_eq!(watcher.poll_once().await.unwrap(), 3);

        let prompts = watcher.runner().prompts();
        assert_eq!(prompts.len(), 3);
        assert!(prompts[0].contains(&format!("## Work Order: {}", oldest)));
        assert!(prompts[1].contains(&format!("## Work Order: {}", middle)));
        assert!(prompts[2].contains(&format!("## Work Order: {}", newest)));
    }

    #[tokio::test]
    async fn test_never_reprocesses_within_one_run() {
        let (_dir, store) = make_store();
        store_on_day(&store, "stays pending", 1);

        let mut watcher = Watcher::new(store.clone(), ScriptedRunner::default(), once());
        assert_eq!(watcher.poll_once().await.unwrap(), 1);
        assert_eq!(watcher.poll_once().await.unwrap(), 0);

        let later = store_on_day(&store, "arrives later", 2);
        assert_eq!(watcher.poll_once().await.unwrap(), 1);
        assert_eq!(watcher.runner().prompts().len(), 2);
        assert!(watcher.processed().contains(&later));
    }

    #[tokio::test]
    async fn test_retries_failed_runs_twice() {
        let (_dir, store) = make_store();
        let filename = store_on_day(&store, "always fails", 1);
        let runner = ScriptedRunner::with_outcomes([
            AgentOutcome::Failed { exit_code: Some(1) },
            AgentOutcome::TimedOut,
            AgentOutcome::Failed { exit_code: Some(2) },
            AgentOutcome::Succeeded,
        ]);

        let watcher = Watcher::new(store, runner, once());
        let result = watcher.process(&filename).await.unwrap();
        assert_eq!(result, WorkOrderResult::Failed { attempts: 3 });
        assert_eq!(watcher.runner().prompts().len(), 3);
    }

    #[tokio::test]
    async fn test_succeeds_on_retry() {
        let (_dir, store) = make_store();
        let filename = store_on_day(&store, "flaky", 1);
        let runner = ScriptedRunner::with_outcomes([AgentOutcome::Failed { exit_code: Some(1) }]);

        let watcher = Watcher::new(store, runner, once());
        let result = watcher.process(&filename).await.unwrap();
        assert_eq!(result, WorkOrderResult::Finished { attempts: 2 });
    }

    #[tokio::test]
    async fn test_skips_work_order_that_disappeared() {
        let (_dir, store) = make_store();
        let filename = store_on_day(&store, "gone", 1);
        store.store().mark_actioned(&filename, None).unwrap();

        let watcher = Watcher::new(store, ScriptedRunner::default(), once());
        assert_eq!(watcher.process(&filename).await.unwrap(), WorkOrderResult::Skipped);
        assert!(watcher.runner().prompts().is_empty());
    }

    #[tokio::test]
    async fn test_run_once_with_nothing_pending_returns() {
        let (_dir, store) = make_store();
        let mut watcher = Watcher::new(store, ScriptedRunner::default(), once());
        watcher.run().await.unwrap();
        assert!(watcher.processed().is_empty());
    }

    #[test]
    fn test_build_prompt() {
        let prompt = build_prompt("2024-01-01_090000_fix.md", "# 🐛 Bug: fix", "floop");
        assert!(prompt.starts_with("You have a Floop work order to process."));
        assert!(prompt.contains("## Work Order: 2024-01-01_090000_fix.md"));
        assert!(prompt.contains("# 🐛 Bug: fix"));
        assert!(prompt.contains("floop action 2024-01-01_090000_fix.md --note="));
        assert!(prompt.contains("Process exactly ONE work order"));
    }

    #[test]
    fn test_prompt_names_watched_storage_path() {
        let command = action_command_for(Path::new("/srv/app/var/feedback"));
        assert_eq!(command, "floop --storage-path /srv/app/var/feedback");

        let prompt = build_prompt("2024-01-01_090000_fix.md", "# fix", &command);
        assert!(prompt.contains(
            "When finished: floop --storage-path /srv/app/var/feedback action 2024-01-01_090000_fix.md --note="
        ));
    }

    #[test]
    fn test_action_command_quotes_unusual_paths() {
        assert_eq!(
            action_command_for(Path::new("/home/me/My Site/feedback")),
            "floop --storage-path '/home/me/My Site/feedback'"
        );
        assert_eq!(
            action_command_for(Path::new("/tmp/it's")),
            r"floop --storage-path '/tmp/it'\''s'"
        );
    }

    #[test]
    fn test_claude_runner_args() {
        let runner = ClaudeRunner::new("claude", "Read,Edit", Some("opus".into()), "/srv/app");
        let args = runner.command_args("do it");
        assert_eq!(
            args,
            vec![
                "-p",
                "do it",
                "--verbose",
                "--output-format",
                "stream-json",
                "--allowedTools",
                "Read,Edit",
                "--model",
                "opus"
            ]
        );

        let runner = ClaudeRunner::new("claude", "Read", Some("  ".into()), "/srv/app");
        assert!(!runner.command_args("x").contains(&"--model".to_string()));
    }

    #[test]
    fn test_render_stream_line() {
        let project = Path::new("/srv/app");
        let line = r#"{"type":"assistant","message":{"content":[{"type":"text","text":"hi"},{"type":"tool_use","name":"Edit","input":{"file_path":"/srv/app/resources/views/home.blade.php"}}]}}"#;
        assert_eq!(
            render_stream_line(line, project),
            vec!["✏️  Edit: resources/views/home.blade.php".to_string()]
        );

        let result = r#"{"type":"result","subtype":"success","duration_ms":5000,"num_turns":2,"cost_usd":0.5}"#;
        assert_eq!(render_stream_line(result, project), vec!["🏁 Done (0:05, 2 turns, $0.50)".to_string()]);

        assert!(render_stream_line(r#"{"type":"system","subtype":"init"}"#, project).is_empty());
        assert!(render_stream_line("garbage", project).is_empty());
    }

    #[test]
    fn test_agent_exists() {
        assert!(!agent_exists("definitely-not-an-installed-agent-cli"));
        let exe = std::env::current_exe().unwrap();
        assert!(agent_exists(exe.to_str().unwrap()));
        assert!(!agent_exists("/nonexistent/dir/claude"));
    }

    #[tokio::test]
    async fn test_claude_runner_spawn_failure() {
        let runner = ClaudeRunner::new("/nonexistent/dir/claude", "Read", None, std::env::temp_dir());
        let err = runner.run("x", Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, WatchError::SpawnFailed(_)));
    }
}
