//! Browser driver sidecar
//!
//! The harness controls a real browser through a small Node script that
//! wraps Playwright and speaks newline-delimited JSON over stdio: a greeting
//! line on startup, then one response per command, with asynchronous event
//! lines (captured network requests) interleaved. Commands carry integer
//! ids; a background task pumps stdout, resolves each id against a pending
//! map and routes events to whichever recorder registered for them.

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout};
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, trace, warn};

use crate::config::TargetConfig;
use crate::error::{Error, Result};
use crate::intercept::{CaptureStore, CapturedRequest};
use crate::session::Session;

/// The sidecar script, staged to a temp directory at launch
const DRIVER_JS: &str = include_str!("driver.js");

type CommandOutcome = std::result::Result<serde_json::Value, String>;
type PendingMap = Arc<parking_lot::Mutex<HashMap<u64, oneshot::Sender<CommandOutcome>>>>;
type SinkMap = Arc<parking_lot::Mutex<HashMap<String, CaptureStore>>>;

/// Handle to the running driver process. Cheap to clone; sessions keep one.
#[derive(Clone)]
pub struct Driver {
    inner: Arc<DriverInner>,
}

struct DriverInner {
    config: TargetConfig,
    stdin: Mutex<ChildStdin>,
    child: Mutex<Option<Child>>,
    pid: Option<i32>,
    pending: PendingMap,
    sinks: SinkMap,
    next_id: AtomicU64,
    next_recorder: AtomicU64,
    next_session: AtomicU64,
    _stage: tempfile::TempDir,
}

impl Driver {
    /// Stage the driver script, spawn node, wait for the greeting and launch
    /// the configured browser engine.
    pub async fn launch(config: &TargetConfig) -> Result<Self> {
        check_playwright_installed()?;

        let stage = tempfile::tempdir()?;
        let script_path = stage.path().join("driver.js");
        std::fs::write(&script_path, DRIVER_JS)?;

        debug!("spawning browser driver: node {}", script_path.display());

        let node_path = std::env::current_dir()
            .map(|d| d.join("node_modules"))
            .unwrap_or_else(|_| "node_modules".into());

        let mut child = tokio::process::Command::new("node")
            .arg(&script_path)
            .env("NODE_PATH", node_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::Driver(format!("failed to spawn node: {}", e)))?;

        let pid = child.id().map(|p| p as i32);
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::Driver("driver stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Driver("driver stdout unavailable".to_string()))?;
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(pump_stderr(stderr));
        }

        let mut reader = BufReader::new(stdout);
        let mut line = String::new();
        let read = tokio::time::timeout(
            config.timeouts.driver_startup,
            reader.read_line(&mut line),
        );
        match read.await {
            Ok(Ok(0)) => return Err(Error::Driver("driver exited before greeting".to_string())),
            Ok(Ok(_)) => {}
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => {
                return Err(Error::Timeout {
                    what: "driver greeting".to_string(),
                    after: config.timeouts.driver_startup,
                })
            }
        }
        trace!("driver greeting: {}", line.trim());

        let greeting: DriverGreeting = serde_json::from_str(&line)
            .map_err(|e| Error::Driver(format!("invalid greeting: {}", e)))?;
        if !greeting.ready {
            return Err(Error::Driver("driver reported not ready".to_string()));
        }
        if let Some(version) = &greeting.version {
            debug!("playwright {} ready", version);
        }

        let pending: PendingMap = Arc::new(parking_lot::Mutex::new(HashMap::new()));
        let sinks: SinkMap = Arc::new(parking_lot::Mutex::new(HashMap::new()));
        tokio::spawn(pump_stdout(reader, pending.clone(), sinks.clone()));

        let driver = Self {
            inner: Arc::new(DriverInner {
                config: config.clone(),
                stdin: Mutex::new(stdin),
                child: Mutex::new(Some(child)),
                pid,
                pending,
                sinks,
                next_id: AtomicU64::new(1),
                next_recorder: AtomicU64::new(1),
                next_session: AtomicU64::new(1),
                _stage: stage,
            }),
        };

        #[derive(Serialize)]
        struct LaunchArgs {
            browser: &'static str,
            headless: bool,
        }

        driver
            .execute_void(
                "launch",
                Some(LaunchArgs {
                    browser: config.browser.as_str(),
                    headless: config.headless,
                }),
            )
            .await?;

        Ok(driver)
    }

    /// Open a fresh browser context with its own page. Each session is an
    /// independent client as far as the application can tell.
    pub async fn new_session(&self) -> Result<Session> {
        #[derive(Serialize)]
        struct ContextArgs {
            width: u32,
            height: u32,
        }

        #[derive(Deserialize)]
        struct ContextReply {
            context: String,
        }

        let reply: ContextReply = self
            .execute(
                "new-context",
                Some(ContextArgs {
                    width: self.inner.config.viewport_width,
                    height: self.inner.config.viewport_height,
                }),
            )
            .await?;

        let ordinal = self.inner.next_session.fetch_add(1, Ordering::Relaxed);
        debug!("opened session {} ({})", ordinal, reply.context);

        Ok(Session::new(
            self.clone(),
            reply.context,
            self.inner.config.base_url.clone(),
            self.inner.config.timeouts,
        ))
    }

    /// Send a command and wait for its reply.
    pub(crate) async fn execute<A: Serialize, R: DeserializeOwned>(
        &self,
        command: &str,
        arguments: Option<A>,
    ) -> Result<R> {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let cmd = DriverCommand {
            id,
            execute: command,
            arguments,
        };
        let line = serde_json::to_string(&cmd)?;

        let (tx, rx) = oneshot::channel();
        self.inner.pending.lock().insert(id, tx);

        trace!("driver command: {}", line);
        let write = async {
            let mut stdin = self.inner.stdin.lock().await;
            stdin.write_all(line.as_bytes()).await?;
            stdin.write_all(b"\n").await?;
            stdin.flush().await?;
            Ok::<_, std::io::Error>(())
        };
        if let Err(e) = write.await {
            self.inner.pending.lock().remove(&id);
            return Err(e.into());
        }

        match rx.await {
            Ok(Ok(value)) => Ok(serde_json::from_value(value)?),
            Ok(Err(desc)) => Err(Error::Driver(desc)),
            Err(_) => Err(Error::Driver(format!(
                "no reply to '{}': driver exited",
                command
            ))),
        }
    }

    /// Send a command whose result carries no data.
    pub(crate) async fn execute_void<A: Serialize>(
        &self,
        command: &str,
        arguments: Option<A>,
    ) -> Result<()> {
        let _: serde_json::Value = self.execute(command, arguments).await?;
        Ok(())
    }

    pub(crate) fn next_recorder_id(&self) -> String {
        format!(
            "rec-{}",
            self.inner.next_recorder.fetch_add(1, Ordering::Relaxed)
        )
    }

    pub(crate) fn register_sink(&self, id: String, store: CaptureStore) {
        self.inner.sinks.lock().insert(id, store);
    }

    pub(crate) fn unregister_sink(&self, id: &str) {
        self.inner.sinks.lock().remove(id);
    }

    /// Ask the driver to close the browser and exit, escalating to SIGTERM
    /// and then a kill if it does not.
    pub async fn shutdown(&self) -> Result<()> {
        let polite = tokio::time::timeout(
            Duration::from_secs(5),
            self.execute_void::<()>("shutdown", None),
        );
        if polite.await.is_err() {
            warn!("driver ignored shutdown command");
        }

        let mut guard = self.inner.child.lock().await;
        if let Some(mut child) = guard.take() {
            let waited = tokio::time::timeout(Duration::from_secs(5), child.wait()).await;
            if waited.is_err() {
                #[cfg(unix)]
                if let Some(pid) = self.inner.pid {
                    use nix::sys::signal::{kill, Signal};
                    use nix::unistd::Pid;
                    let _ = kill(Pid::from_raw(pid), Signal::SIGTERM);
                }
                if tokio::time::timeout(Duration::from_secs(2), child.wait())
                    .await
                    .is_err()
                {
                    warn!("driver did not exit; killing");
                    let _ = child.start_kill();
                    let _ = child.wait().await;
                }
            }
        }
        Ok(())
    }
}

/// Resolve replies against the pending map and feed request events to their
/// recorder's store.
async fn pump_stdout(mut reader: BufReader<ChildStdout>, pending: PendingMap, sinks: SinkMap) {
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                warn!("driver stdout read failed: {}", e);
                break;
            }
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        trace!("driver reply: {}", trimmed);

        let reply: DriverReply = match serde_json::from_str(trimmed) {
            Ok(reply) => reply,
            Err(e) => {
                warn!("unparseable driver line ({}): {}", e, trimmed);
                continue;
            }
        };

        if let Some(event) = reply.event {
            dispatch_event(&sinks, &event, reply.data);
            continue;
        }

        if let Some(id) = reply.id {
            let Some(tx) = pending.lock().remove(&id) else {
                warn!("driver reply for unknown id {}", id);
                continue;
            };
            let outcome = match reply.error {
                Some(fault) => Err(fault.desc),
                None => Ok(reply.result.unwrap_or(serde_json::Value::Null)),
            };
            let _ = tx.send(outcome);
        }
    }

    // Driver is gone; fail everything still waiting.
    for (_, tx) in pending.lock().drain() {
        let _ = tx.send(Err("driver exited".to_string()));
    }
}

fn dispatch_event(sinks: &SinkMap, event: &str, data: Option<serde_json::Value>) {
    if event != "route.request" {
        trace!("ignoring driver event '{}'", event);
        return;
    }
    let Some(data) = data else {
        warn!("route.request event without data");
        return;
    };
    let capture: RouteCapture = match serde_json::from_value(data) {
        Ok(capture) => capture,
        Err(e) => {
            warn!("malformed route.request event: {}", e);
            return;
        }
    };

    let Some(store) = sinks.lock().get(&capture.recorder).cloned() else {
        // Recorder already dropped; the route outlives it in the browser.
        trace!("request for retired recorder {}", capture.recorder);
        return;
    };

    let body = capture
        .body
        .as_deref()
        .and_then(|raw| serde_json::from_str(raw).ok())
        .unwrap_or(serde_json::Value::Null);

    store.lock().push(CapturedRequest {
        method: capture.method,
        url: capture.url,
        body,
        at: chrono::Utc::now(),
    });
}

async fn pump_stderr(stderr: tokio::process::ChildStderr) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        debug!("driver stderr: {}", line);
    }
}

/// Check that Playwright is reachable before spawning anything.
fn check_playwright_installed() -> Result<()> {
    let status = std::process::Command::new("npx")
        .args(["playwright", "--version"])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();

    match status {
        Ok(status) if status.success() => Ok(()),
        _ => Err(Error::PlaywrightNotFound),
    }
}

// Wire protocol types
#[derive(Debug, Serialize)]
struct DriverCommand<'a, A> {
    id: u64,
    execute: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    arguments: Option<A>,
}

#[derive(Debug, Deserialize)]
struct DriverReply {
    id: Option<u64>,
    #[serde(rename = "return")]
    result: Option<serde_json::Value>,
    error: Option<DriverFault>,
    event: Option<String>,
    data: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct DriverFault {
    desc: String,
}

#[derive(Debug, Deserialize)]
struct DriverGreeting {
    ready: bool,
    #[serde(default)]
    version: Option<String>,
}

/// A request observed by the driver's route hook
#[derive(Debug, Deserialize)]
struct RouteCapture {
    recorder: String,
    method: String,
    url: String,
    body: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_serialization() {
        #[derive(Serialize)]
        struct Args {
            url: String,
        }

        let cmd = DriverCommand {
            id: 7,
            execute: "goto",
            arguments: Some(Args {
                url: "/boards".to_string(),
            }),
        };
        let json = serde_json::to_string(&cmd).unwrap();
        assert!(json.contains("\"id\":7"));
        assert!(json.contains("\"execute\":\"goto\""));
        assert!(json.contains("\"arguments\""));
    }

    #[test]
    fn command_without_arguments_omits_the_field() {
        let cmd = DriverCommand::<()> {
            id: 1,
            execute: "shutdown",
            arguments: None,
        };
        let json = serde_json::to_string(&cmd).unwrap();
        assert!(!json.contains("arguments"));
    }

    #[test]
    fn reply_parsing() {
        let json = r#"{"id": 3, "return": {"count": 4}}"#;
        let reply: DriverReply = serde_json::from_str(json).unwrap();
        assert_eq!(reply.id, Some(3));
        assert_eq!(reply.result.unwrap()["count"], 4);
        assert!(reply.error.is_none());
    }

    #[test]
    fn error_reply_parsing() {
        let json = r#"{"id": 3, "error": {"desc": "no element matches"}}"#;
        let reply: DriverReply = serde_json::from_str(json).unwrap();
        assert_eq!(reply.error.unwrap().desc, "no element matches");
    }

    #[test]
    fn event_line_parsing() {
        let json = r#"{"event": "route.request", "data": {"recorder": "rec-1", "method": "POST", "url": "http://x/api/tickets/9/move", "body": "{\"current_column\": \"Done\"}"}}"#;
        let reply: DriverReply = serde_json::from_str(json).unwrap();
        assert_eq!(reply.event.as_deref(), Some("route.request"));

        let capture: RouteCapture = serde_json::from_value(reply.data.unwrap()).unwrap();
        assert_eq!(capture.recorder, "rec-1");
        assert_eq!(capture.method, "POST");
        assert!(capture.body.unwrap().contains("Done"));
    }

    #[test]
    fn greeting_parsing() {
        let json = r#"{"ready": true, "version": "1.41.0"}"#;
        let greeting: DriverGreeting = serde_json::from_str(json).unwrap();
        assert!(greeting.ready);
        assert_eq!(greeting.version.as_deref(), Some("1.41.0"));
    }
}
