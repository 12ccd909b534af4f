//! Multi-client convergence
//!
//! Several sessions watch the same board; an edit in one must become
//! visible in all. [`await_convergence`] polls every session against a
//! predicate over its snapshot. When live propagation does not happen in
//! time, each lagging session gets exactly one reload and a grace window:
//! passing only then is still a pass, but a degraded one, reported as
//! [`Convergence::AfterReload`] so nobody mistakes eventual sync for
//! real-time sync.

use std::time::Duration;

use futures::future::join_all;
use tracing::{debug, warn};

use crate::config::Timeouts;
use crate::error::{Error, Result};
use crate::session::Session;
use crate::snapshot::BoardSnapshot;

/// How agreement was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Convergence {
    /// All sessions satisfied the predicate without intervention.
    Live,
    /// Agreement required reloading at least one session.
    AfterReload,
}

impl Convergence {
    pub fn is_live(self) -> bool {
        matches!(self, Convergence::Live)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ConvergeOptions {
    /// Ceiling for live convergence.
    pub timeout: Duration,
    pub interval: Duration,
    /// Ceiling for the post-reload recheck.
    pub reload_grace: Duration,
    /// Treat `AfterReload` as a failure instead of a degraded pass.
    pub require_live: bool,
}

impl ConvergeOptions {
    pub fn from_timeouts(timeouts: &Timeouts) -> Self {
        Self {
            timeout: timeouts.converge,
            interval: timeouts.poll_interval,
            reload_grace: timeouts.reload_grace,
            require_live: false,
        }
    }

    pub fn require_live(mut self) -> Self {
        self.require_live = true;
        self
    }
}

/// Wait until every session's board satisfies `check`.
pub async fn await_convergence<F>(
    sessions: &[&Session],
    what: &str,
    check: F,
    opts: &ConvergeOptions,
) -> Result<Convergence>
where
    F: Fn(&BoardSnapshot) -> bool,
{
    if sessions.is_empty() {
        return Ok(Convergence::Live);
    }

    if poll_all(sessions, &check, opts.timeout, opts.interval).await? {
        debug!(what, clients = sessions.len(), "converged live");
        return Ok(Convergence::Live);
    }

    warn!(
        what,
        clients = sessions.len(),
        waited = ?opts.timeout,
        "live convergence missed, reloading clients"
    );
    let reloads = join_all(sessions.iter().map(|s| s.reload())).await;
    for outcome in reloads {
        outcome?;
    }

    if poll_all(sessions, &check, opts.reload_grace, opts.interval).await? {
        if opts.require_live {
            return Err(Error::Convergence {
                sessions: sessions.len(),
                waited: opts.timeout,
            });
        }
        warn!(what, "converged only after reload");
        return Ok(Convergence::AfterReload);
    }

    Err(Error::Convergence {
        sessions: sessions.len(),
        waited: opts.timeout + opts.reload_grace,
    })
}

/// Poll until every session satisfies `check`, or `timeout` passes.
/// Returns whether they all did.
async fn poll_all<F>(
    sessions: &[&Session],
    check: &F,
    timeout: Duration,
    interval: Duration,
) -> Result<bool>
where
    F: Fn(&BoardSnapshot) -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        let snapshots = join_all(sessions.iter().map(|s| BoardSnapshot::capture(s))).await;
        let mut all_ok = true;
        for snapshot in snapshots {
            match snapshot {
                Ok(snap) if check(&snap) => {}
                Ok(_) => {
                    all_ok = false;
                }
                // A transient read failure counts as not-yet-converged.
                Err(e) => {
                    debug!("snapshot during convergence failed: {}", e);
                    all_ok = false;
                }
            }
        }
        if all_ok {
            return Ok(true);
        }
        if tokio::time::Instant::now() >= deadline {
            return Ok(false);
        }
        tokio::time::sleep(interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Timeouts;

    #[test]
    fn options_inherit_the_configured_ceilings() {
        let timeouts = Timeouts::default();
        let opts = ConvergeOptions::from_timeouts(&timeouts);
        assert_eq!(opts.timeout, timeouts.converge);
        assert_eq!(opts.reload_grace, timeouts.reload_grace);
        assert!(!opts.require_live);
        assert!(opts.require_live().require_live);
    }

    #[test]
    fn convergence_kinds_are_distinguishable() {
        assert!(Convergence::Live.is_live());
        assert!(!Convergence::AfterReload.is_live());
    }

    #[tokio::test]
    async fn empty_session_list_is_trivially_live() {
        let opts = ConvergeOptions::from_timeouts(&Timeouts::default());
        let got = await_convergence(&[], "nothing", |_| false, &opts)
            .await
            .unwrap();
        assert_eq!(got, Convergence::Live);
    }
}
