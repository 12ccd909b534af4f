//! Pointer-level drag simulation
//!
//! HTML5 drag events are synthesized by the browser from raw pointer
//! input, so the engine drives the mouse directly: hover the source,
//! press, stepped moves to the target, settle, release. Which column
//! received the drop is resolved from the DOM ancestry at the drop point,
//! never assumed from where the card started.
//!
//! The settle phase between the final move and the release exists because
//! drop zones activate asynchronously: releasing before the zone reports
//! active makes the drop a no-op. The wait is condition-based with the
//! configured ceiling as fallback.

use serde::Deserialize;
use tracing::{debug, warn};

use crate::board::dom;
use crate::columns::Column;
use crate::error::{Error, Result};
use crate::locator::{Locator, Point};
use crate::session::Session;
use crate::wait::{wait_until, WaitOptions};

const DEFAULT_STEPS: u32 = 12;
const SETTLE_POLL_MS: u64 = 20;

/// Where a drag currently stands. The full transition history is returned
/// in [`DragOutcome::trace`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragPhase {
    Idle,
    Armed,
    Hovering,
    Dropped,
    Settled,
}

impl std::fmt::Display for DragPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DragPhase::Idle => "idle",
            DragPhase::Armed => "armed",
            DragPhase::Hovering => "hovering",
            DragPhase::Dropped => "dropped",
            DragPhase::Settled => "settled",
        };
        f.write_str(s)
    }
}

/// What a finished drag did.
#[derive(Debug, Clone)]
pub struct DragOutcome {
    /// Column that received the drop, resolved from the drop point's DOM
    /// ancestry. `None` when the drag was cancelled.
    pub resolved: Option<Column>,
    pub cancelled: bool,
    /// Set when the drop point had no column ancestor; describes what was
    /// under the cursor instead.
    pub invalid_target: Option<String>,
    pub trace: Vec<DragPhase>,
}

impl DragOutcome {
    /// Assert the drag landed in `expected`.
    pub fn expect_landed(&self, expected: Column) -> Result<()> {
        if let Some(under) = &self.invalid_target {
            return Err(Error::InvalidDropTarget(under.clone()));
        }
        if self.cancelled {
            return Err(Error::Assertion(format!(
                "drag was cancelled, expected a drop into {:?}",
                expected.ui_label()
            )));
        }
        match self.resolved {
            Some(col) if col == expected => Ok(()),
            Some(col) => Err(Error::Assertion(format!(
                "drop resolved to column {:?}, expected {:?}",
                col.ui_label(),
                expected.ui_label()
            ))),
            None => Err(Error::Assertion(format!(
                "drop did not resolve to any column, expected {:?}",
                expected.ui_label()
            ))),
        }
    }

    /// Assert the drag ended cancelled, with no drop delivered.
    pub fn expect_cancelled(&self) -> Result<()> {
        if !self.cancelled {
            return Err(Error::Assertion(format!(
                "drag was not cancelled, it resolved to {:?}",
                self.resolved.map(|c| c.ui_label())
            )));
        }
        Ok(())
    }
}

enum Target {
    Element(Locator),
    Column(Column),
    Point(Point),
}

pub struct DragBuilder<'a> {
    session: &'a Session,
    source: Locator,
    steps: u32,
}

impl Session {
    /// Start describing a drag of the element behind `source`.
    pub fn drag(&self, source: Locator) -> DragBuilder<'_> {
        DragBuilder {
            session: self,
            source,
            steps: DEFAULT_STEPS,
        }
    }
}

impl<'a> DragBuilder<'a> {
    /// Number of intermediate pointer moves. More steps cope with
    /// drag-over handlers that sample pointer velocity.
    pub fn steps(mut self, steps: u32) -> Self {
        self.steps = steps.max(1);
        self
    }

    /// Drop onto another card (lands in that card's column).
    pub async fn drop_on_card(self, target: &Locator) -> Result<DragOutcome> {
        self.run(Target::Element(target.clone()), false).await
    }

    /// Drop onto a column region, for empty columns or end-of-list drops.
    pub async fn drop_on_column(self, column: Column) -> Result<DragOutcome> {
        self.run(Target::Column(column), false).await
    }

    /// Drop at an exact viewport point.
    pub async fn drop_at(self, point: Point) -> Result<DragOutcome> {
        self.run(Target::Point(point), false).await
    }

    /// Move over a column, then abort with Escape instead of dropping.
    pub async fn cancel_over_column(self, column: Column) -> Result<DragOutcome> {
        self.run(Target::Column(column), true).await
    }

    /// Move to a point, then abort with Escape instead of dropping.
    pub async fn cancel_at(self, point: Point) -> Result<DragOutcome> {
        self.run(Target::Point(point), true).await
    }

    async fn dest_point(&self, target: &Target) -> Result<Point> {
        let locator = match target {
            Target::Point(p) => return Ok(*p),
            Target::Element(l) => l.clone(),
            Target::Column(c) => self.session.board().column(*c),
        };
        let bbox = self.session.bbox(&locator).await?;
        Ok(bbox.center())
    }

    async fn run(self, target: Target, cancel: bool) -> Result<DragOutcome> {
        let session = self.session;
        let mut trace = vec![DragPhase::Idle];

        session.hover(&self.source).await?;
        let source_box = session.bbox(&self.source).await?;
        let start = source_box.center();
        let dest = self.dest_point(&target).await?;

        session.mouse_move(start.x, start.y, 1).await?;
        session.mouse_down().await?;
        trace.push(DragPhase::Armed);
        debug!(phase = %DragPhase::Armed, x = start.x, y = start.y, "drag armed");

        // A short offset move first; most dnd implementations ignore
        // presses that never cross their activation distance.
        session.mouse_move(start.x + 4.0, start.y + 4.0, 2).await?;
        session.mouse_move(dest.x, dest.y, self.steps).await?;
        trace.push(DragPhase::Hovering);
        debug!(phase = %DragPhase::Hovering, x = dest.x, y = dest.y, "drag hovering");

        if cancel {
            session.press("Escape").await?;
            session.mouse_up().await?;
            trace.push(DragPhase::Idle);
            debug!(phase = %DragPhase::Idle, "drag cancelled");
            return Ok(DragOutcome {
                resolved: None,
                cancelled: true,
                invalid_target: None,
                trace,
            });
        }

        let resolution = self.resolve_at(dest).await?;
        let resolved = match column_under_point(&resolution) {
            Ok(col) => col,
            Err(Error::InvalidDropTarget(under)) => {
                warn!(under = %under, "no column under drop point, cancelling drag");
                session.press("Escape").await?;
                session.mouse_up().await?;
                trace.push(DragPhase::Idle);
                return Ok(DragOutcome {
                    resolved: None,
                    cancelled: true,
                    invalid_target: Some(under),
                    trace,
                });
            }
            Err(e) => return Err(e),
        };

        self.wait_zone(dest, true).await?;
        session.mouse_up().await?;
        trace.push(DragPhase::Dropped);
        debug!(phase = %DragPhase::Dropped, column = %resolved, "drag dropped");

        self.wait_zone(dest, false).await?;
        trace.push(DragPhase::Settled);
        debug!(phase = %DragPhase::Settled, "drag settled");

        Ok(DragOutcome {
            resolved: Some(resolved),
            cancelled: false,
            invalid_target: None,
            trace,
        })
    }

    async fn resolve_at(&self, point: Point) -> Result<Resolution> {
        let expr = format!(
            "(() => {{ \
               const el = document.elementFromPoint({x}, {y}); \
               if (!el) return {{ column: null, under: 'nothing' }}; \
               const col = el.closest('{column}'); \
               if (!col) {{ \
                 const cls = el.className ? '.' + String(el.className).trim().split(/\\s+/).join('.') : ''; \
                 return {{ column: null, under: el.tagName.toLowerCase() + cls }}; \
               }} \
               const all = Array.from(document.querySelectorAll('{column}')); \
               return {{ column: all.indexOf(col), under: null }}; \
             }})()",
            x = point.x,
            y = point.y,
            column = dom::COLUMN,
        );
        let value = self.session.eval(&expr).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Wait for the drop zone under `point` to match `active`, giving up
    /// quietly at the settle ceiling.
    async fn wait_zone(&self, point: Point, active: bool) -> Result<()> {
        let session = self.session;
        let expr = format!(
            "(() => {{ \
               const el = document.elementFromPoint({x}, {y}); \
               const col = el && el.closest('{column}'); \
               return !!(col && (col.classList.contains('drag-over') || col.hasAttribute('data-drag-over'))); \
             }})()",
            x = point.x,
            y = point.y,
            column = dom::COLUMN,
        );
        let expr = expr.as_str();
        let opts = WaitOptions::new(session.timeouts().drag_settle)
            .with_interval(std::time::Duration::from_millis(SETTLE_POLL_MS));
        let what = if active { "drop zone active" } else { "drop zone cleared" };

        let waited = wait_until(what, &opts, || async move {
            let value = session.eval(expr).await?;
            let is_active = value.as_bool().unwrap_or(false);
            Ok((is_active == active).then_some(()))
        })
        .await;

        match waited {
            Ok(()) => Ok(()),
            Err(Error::Timeout { .. }) => {
                debug!(what, "zone state not observed, continuing after settle ceiling");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Resolution {
    column: Option<i64>,
    under: Option<String>,
}

/// Map a drop-point resolution onto a column, strictly by ancestry index.
fn column_under_point(resolution: &Resolution) -> Result<Column> {
    match resolution.column {
        Some(index) if index >= 0 => Column::from_index(index as usize)
            .ok_or_else(|| Error::InvalidDropTarget(format!("column region #{}", index))),
        _ => {
            let under = resolution
                .under
                .clone()
                .unwrap_or_else(|| "unknown element".to_string());
            Err(Error::InvalidDropTarget(under))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolution(column: Option<i64>, under: Option<&str>) -> Resolution {
        Resolution {
            column,
            under: under.map(str::to_string),
        }
    }

    #[test]
    fn resolves_every_column_by_index() {
        for (i, col) in Column::ALL.iter().enumerate() {
            let got = column_under_point(&resolution(Some(i as i64), None)).unwrap();
            assert_eq!(got, *col);
        }
    }

    #[test]
    fn rejects_points_outside_any_column() {
        let err = column_under_point(&resolution(None, Some("header.app-header"))).unwrap_err();
        match err {
            Error::InvalidDropTarget(under) => assert_eq!(under, "header.app-header"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn rejects_detached_drop_elements() {
        assert!(matches!(
            column_under_point(&resolution(Some(-1), Some("div.ghost"))),
            Err(Error::InvalidDropTarget(_))
        ));
        assert!(matches!(
            column_under_point(&resolution(Some(9), None)),
            Err(Error::InvalidDropTarget(_))
        ));
    }

    #[test]
    fn landed_assertion_names_both_columns() {
        let outcome = DragOutcome {
            resolved: Some(Column::Blocked),
            cancelled: false,
            invalid_target: None,
            trace: vec![
                DragPhase::Idle,
                DragPhase::Armed,
                DragPhase::Hovering,
                DragPhase::Dropped,
                DragPhase::Settled,
            ],
        };
        outcome.expect_landed(Column::Blocked).unwrap();
        let err = outcome.expect_landed(Column::Done).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("Blocked"), "{msg}");
        assert!(msg.contains("Done"), "{msg}");
    }

    #[test]
    fn cancelled_drag_reports_an_idle_tail() {
        let outcome = DragOutcome {
            resolved: None,
            cancelled: true,
            invalid_target: None,
            trace: vec![
                DragPhase::Idle,
                DragPhase::Armed,
                DragPhase::Hovering,
                DragPhase::Idle,
            ],
        };
        outcome.expect_cancelled().unwrap();
        assert_eq!(outcome.trace.last(), Some(&DragPhase::Idle));
        assert!(outcome.expect_landed(Column::Done).is_err());
    }

    #[test]
    fn invalid_target_surfaces_as_its_own_error() {
        let outcome = DragOutcome {
            resolved: None,
            cancelled: true,
            invalid_target: Some("body".to_string()),
            trace: vec![DragPhase::Idle, DragPhase::Armed, DragPhase::Hovering, DragPhase::Idle],
        };
        assert!(matches!(
            outcome.expect_landed(Column::Done),
            Err(Error::InvalidDropTarget(_))
        ));
        outcome.expect_cancelled().unwrap();
    }
}
