//! Scoped network interception
//!
//! A [`RequestRecorder`] owns one route hook in the browser context: it
//! captures requests matching a URL pattern (and optional method list)
//! while letting them through, so assertions about what the UI sent never
//! disturb what the server received. Recorders are scoped objects; two
//! tests never share a capture buffer.
//!
//! Opt-in fault injection reuses the same hook to delay, reject or abort
//! the matched traffic.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::columns::Column;
use crate::driver::Driver;
use crate::error::{Error, Result};
use crate::session::Session;
use crate::wait::{wait_until, WaitOptions};

/// Shared buffer the driver's event pump appends into.
pub type CaptureStore = Arc<parking_lot::Mutex<Vec<CapturedRequest>>>;

/// One request seen by a recorder's route hook.
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub method: String,
    pub url: String,
    /// Parsed JSON body; `Null` when absent or not JSON.
    pub body: serde_json::Value,
    pub at: DateTime<Utc>,
}

impl CapturedRequest {
    /// View the body as a card-move payload.
    pub fn move_payload(&self) -> Result<MovePayload> {
        serde_json::from_value(self.body.clone()).map_err(|e| {
            Error::Assertion(format!(
                "request to {} does not carry a move payload: {} (body: {})",
                self.url, e, self.body
            ))
        })
    }
}

/// Body of a card-move request as the server expects it.
#[derive(Debug, Clone, Deserialize)]
pub struct MovePayload {
    pub current_column: String,
    #[serde(default)]
    pub board_id: Option<serde_json::Value>,
}

impl MovePayload {
    /// Assert the payload names the destination column by its API name.
    ///
    /// The mistakes this guards against have all been seen in the wild:
    /// sending the column's UI label, sending a slugified form of the
    /// name, or sending some other column entirely (usually the source).
    pub fn expect_destination(&self, destination: Column) -> Result<()> {
        let sent = self.current_column.as_str();
        let api = destination.api_name();
        if sent == api {
            return Ok(());
        }

        if sent == destination.ui_label() {
            return Err(Error::Assertion(format!(
                "move payload sent the UI label {:?} where the API expects {:?}",
                sent, api
            )));
        }
        if is_slug_of(sent, api) || is_slug_of(sent, destination.ui_label()) {
            return Err(Error::Assertion(format!(
                "move payload sent a slugified column {:?} where the API expects {:?}",
                sent, api
            )));
        }
        if let Ok(other) = Column::parse(sent) {
            return Err(Error::Assertion(format!(
                "move payload names column {:?}, not the destination {:?}",
                other.api_name(),
                api
            )));
        }
        Err(Error::Assertion(format!(
            "move payload sent unknown column {:?}, expected {:?}",
            sent, api
        )))
    }
}

fn is_slug_of(candidate: &str, name: &str) -> bool {
    let lower = name.to_lowercase();
    candidate == lower
        || candidate == lower.replace(' ', "-")
        || candidate == lower.replace(' ', "_")
        || candidate == lower.replace(' ', "")
}

/// A fault applied to matched requests instead of plain pass-through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Fault {
    /// Hold the request for `ms` before letting it through.
    Delay { ms: u64 },
    /// Short-circuit with an error status; the request never reaches the
    /// server.
    Status { status: u16 },
    /// Drop the connection.
    Abort,
}

pub struct RequestRecorder {
    driver: Driver,
    context: String,
    id: String,
    pattern: String,
    store: CaptureStore,
    window: Duration,
    poll_interval: Duration,
    stopped: bool,
}

impl Session {
    /// Record requests whose URL matches `pattern` (a regular expression),
    /// restricted to `methods` when non-empty. Traffic passes through.
    pub async fn intercept(&self, pattern: &str, methods: &[&str]) -> Result<RequestRecorder> {
        self.intercept_inner(pattern, methods, None).await
    }

    /// Like [`Session::intercept`], but apply `fault` to every match.
    pub async fn intercept_with_fault(
        &self,
        pattern: &str,
        methods: &[&str],
        fault: Fault,
    ) -> Result<RequestRecorder> {
        self.intercept_inner(pattern, methods, Some(fault)).await
    }

    async fn intercept_inner(
        &self,
        pattern: &str,
        methods: &[&str],
        fault: Option<Fault>,
    ) -> Result<RequestRecorder> {
        // Validate locally; a bad pattern should fail here, not inside the
        // browser process.
        regex::Regex::new(pattern)?;

        let driver = self.driver().clone();
        let id = driver.next_recorder_id();
        let store: CaptureStore = Arc::new(parking_lot::Mutex::new(Vec::new()));
        driver.register_sink(id.clone(), store.clone());

        #[derive(Serialize)]
        struct RouteArgs<'a> {
            context: &'a str,
            recorder: &'a str,
            pattern: &'a str,
            methods: Vec<&'a str>,
            #[serde(skip_serializing_if = "Option::is_none")]
            fault: Option<Fault>,
        }

        let started = driver
            .execute_void(
                "route-start",
                Some(RouteArgs {
                    context: self.context_id(),
                    recorder: &id,
                    pattern,
                    methods: methods.to_vec(),
                    fault,
                }),
            )
            .await;
        if let Err(e) = started {
            driver.unregister_sink(&id);
            return Err(e);
        }

        debug!(recorder = %id, pattern, ?fault, "route hook installed");
        Ok(RequestRecorder {
            driver,
            context: self.context_id().to_string(),
            id,
            pattern: pattern.to_string(),
            store,
            window: self.timeouts().correlation,
            poll_interval: self.timeouts().poll_interval,
            stopped: false,
        })
    }
}

impl RequestRecorder {
    /// Everything captured so far, oldest first.
    pub fn requests(&self) -> Vec<CapturedRequest> {
        self.store.lock().clone()
    }

    pub fn last(&self) -> Option<CapturedRequest> {
        self.store.lock().last().cloned()
    }

    pub fn count(&self) -> usize {
        self.store.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.lock().is_empty()
    }

    /// Forget captures so far; useful between a setup action and the one
    /// under test.
    pub fn clear(&self) {
        self.store.lock().clear();
    }

    pub fn matching<P>(&self, pred: P) -> Vec<CapturedRequest>
    where
        P: Fn(&CapturedRequest) -> bool,
    {
        self.store.lock().iter().filter(|r| pred(r)).cloned().collect()
    }

    /// Captures no older than `window`, for correlating a request with the
    /// UI action that caused it.
    pub fn within_last(&self, window: Duration) -> Vec<CapturedRequest> {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(window).unwrap_or_else(|_| chrono::Duration::seconds(10));
        self.store
            .lock()
            .iter()
            .filter(|r| r.at >= cutoff)
            .cloned()
            .collect()
    }

    /// Captures within the configured correlation window.
    pub fn recent(&self) -> Vec<CapturedRequest> {
        self.within_last(self.window)
    }

    /// Wait until a capture satisfies `pred`, up to the correlation
    /// timeout.
    pub async fn wait_for_match<P>(&self, what: &str, pred: P) -> Result<CapturedRequest>
    where
        P: Fn(&CapturedRequest) -> bool,
    {
        let store = &self.store;
        let pred = &pred;
        let opts = WaitOptions::new(self.window).with_interval(self.poll_interval);
        wait_until(what, &opts, || async move {
            Ok(store.lock().iter().find(|r| pred(r)).cloned())
        })
        .await
    }

    /// Wait for any capture at all.
    pub async fn wait_for_request(&self, what: &str) -> Result<CapturedRequest> {
        self.wait_for_match(what, |_| true).await
    }

    /// Remove the route hook from the browser. Captures stay readable.
    pub async fn stop(&mut self) -> Result<()> {
        if self.stopped {
            return Ok(());
        }
        self.stopped = true;
        self.driver.unregister_sink(&self.id);

        #[derive(Serialize)]
        struct StopArgs<'a> {
            context: &'a str,
            recorder: &'a str,
        }

        self.driver
            .execute_void(
                "route-stop",
                Some(StopArgs {
                    context: &self.context,
                    recorder: &self.id,
                }),
            )
            .await?;
        debug!(recorder = %self.id, pattern = %self.pattern, "route hook removed");
        Ok(())
    }
}

impl Drop for RequestRecorder {
    fn drop(&mut self) {
        // The browser-side hook may outlive us briefly; the event pump
        // drops captures for retired recorder ids.
        if !self.stopped {
            self.driver.unregister_sink(&self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(column: &str) -> MovePayload {
        MovePayload {
            current_column: column.to_string(),
            board_id: None,
        }
    }

    #[test]
    fn destination_accepts_the_api_name_only() {
        payload("Ready for QC")
            .expect_destination(Column::ReadyForQc)
            .unwrap();
        payload("Not Started")
            .expect_destination(Column::NotStarted)
            .unwrap();
    }

    #[test]
    fn destination_rejects_the_ui_label_with_a_hint() {
        let err = payload("TODO")
            .expect_destination(Column::NotStarted)
            .unwrap_err();
        assert!(err.to_string().contains("UI label"), "{err}");
    }

    #[test]
    fn destination_rejects_slugs_with_a_hint() {
        for slug in ["in-progress", "in_progress", "inprogress", "in progress"] {
            let err = payload(slug)
                .expect_destination(Column::InProgress)
                .unwrap_err();
            assert!(err.to_string().contains("slug"), "{slug}: {err}");
        }
    }

    #[test]
    fn destination_rejects_a_different_column() {
        let err = payload("Done")
            .expect_destination(Column::Blocked)
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("\"Done\""), "{msg}");
        assert!(msg.contains("\"Blocked\""), "{msg}");
    }

    #[test]
    fn move_payload_parses_from_a_captured_body() {
        let captured = CapturedRequest {
            method: "POST".to_string(),
            url: "http://127.0.0.1:3000/api/tickets/12/move".to_string(),
            body: serde_json::json!({ "current_column": "Done", "board_id": 3 }),
            at: Utc::now(),
        };
        let payload = captured.move_payload().unwrap();
        assert_eq!(payload.current_column, "Done");
        payload.expect_destination(Column::Done).unwrap();
    }

    #[test]
    fn non_move_bodies_fail_with_the_url_in_the_message() {
        let captured = CapturedRequest {
            method: "GET".to_string(),
            url: "http://127.0.0.1:3000/api/boards/".to_string(),
            body: serde_json::Value::Null,
            at: Utc::now(),
        };
        let err = captured.move_payload().unwrap_err();
        assert!(err.to_string().contains("/api/boards/"), "{err}");
    }

    #[test]
    fn fault_wire_shapes() {
        let delay = serde_json::to_value(Fault::Delay { ms: 1500 }).unwrap();
        assert_eq!(delay, serde_json::json!({ "kind": "delay", "ms": 1500 }));
        let status = serde_json::to_value(Fault::Status { status: 503 }).unwrap();
        assert_eq!(status, serde_json::json!({ "kind": "status", "status": 503 }));
        let abort = serde_json::to_value(Fault::Abort).unwrap();
        assert_eq!(abort, serde_json::json!({ "kind": "abort" }));
    }
}
