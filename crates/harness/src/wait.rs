//! Condition-based waiting
//!
//! Everything in the harness that has to wait for the application polls a
//! condition with a bounded timeout. Fixed-duration sleeps are reserved for
//! the single place that genuinely has no signal to poll (the drag settle
//! ceiling).

use std::future::Future;
use std::time::{Duration, Instant};

use tokio::time::sleep;
use tracing::trace;

use crate::error::{Error, Result};

/// Options for a wait loop
#[derive(Debug, Clone, Copy)]
pub struct WaitOptions {
    pub timeout: Duration,
    pub interval: Duration,
}

impl WaitOptions {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Self::default()
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            interval: Duration::from_millis(100),
        }
    }
}

/// Poll `probe` until it yields a value or the timeout elapses.
///
/// The probe returns `Ok(Some(v))` when the condition is met, `Ok(None)` to
/// keep polling. Probe errors are treated as "not yet" (elements detach and
/// re-render mid-poll); the last one is folded into the timeout error so the
/// failure names the real obstacle.
pub async fn wait_until<T, F, Fut>(what: &str, opts: &WaitOptions, mut probe: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
{
    let start = Instant::now();
    let mut last_err: Option<Error> = None;

    loop {
        match probe().await {
            Ok(Some(value)) => return Ok(value),
            Ok(None) => {}
            Err(e) => {
                trace!("probe for '{}' errored: {}", what, e);
                last_err = Some(e);
            }
        }

        if start.elapsed() >= opts.timeout {
            let what = match last_err {
                Some(e) => format!("{} (last error: {})", what, e),
                None => what.to_string(),
            };
            return Err(Error::Timeout {
                what,
                after: opts.timeout,
            });
        }

        sleep(opts.interval).await;
    }
}
