//! Board snapshots
//!
//! A [`BoardSnapshot`] is the observable state of the board reduced to
//! card titles per column. Snapshots taken around an operation answer the
//! question that actually matters after a failed drag or an injected
//! fault: did any card disappear? A vanished card is reported as a
//! deployment blocker, distinct from an ordinary assertion failure.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::columns::Column;
use crate::error::{Error, Result, Severity};
use crate::session::Session;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BoardSnapshot {
    /// Card titles per column, top to bottom, keyed in board order.
    pub columns: BTreeMap<Column, Vec<String>>,
    #[serde(skip)]
    pub taken_at: DateTime<Utc>,
}

/// What changed between two snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotDiff {
    /// Titles present before and gone everywhere after.
    pub missing: Vec<String>,
    /// Titles absent before and present after.
    pub added: Vec<String>,
    /// Titles that changed column, with (from, to).
    pub relocated: Vec<(String, Column, Column)>,
}

impl SnapshotDiff {
    pub fn is_empty(&self) -> bool {
        self.missing.is_empty() && self.added.is_empty() && self.relocated.is_empty()
    }
}

impl BoardSnapshot {
    /// Read the whole board through a session.
    pub async fn capture(session: &Session) -> Result<Self> {
        let view = session.board();
        let mut columns = BTreeMap::new();
        for column in Column::ALL {
            columns.insert(column, view.card_titles(column).await?);
        }
        Ok(Self {
            columns,
            taken_at: Utc::now(),
        })
    }

    pub fn from_columns(columns: BTreeMap<Column, Vec<String>>) -> Self {
        Self {
            columns,
            taken_at: Utc::now(),
        }
    }

    /// Stable fingerprint of the layout. Equal digests mean equal boards
    /// regardless of when the snapshots were taken.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        for (column, titles) in &self.columns {
            hasher.update(column.api_name().as_bytes());
            hasher.update([0x1f]);
            for title in titles {
                hasher.update(title.as_bytes());
                hasher.update([0x1e]);
            }
            hasher.update([0x1d]);
        }
        hex::encode(hasher.finalize())
    }

    pub fn total(&self) -> usize {
        self.columns.values().map(Vec::len).sum()
    }

    /// Column currently holding a card with exactly this title.
    pub fn position_of(&self, title: &str) -> Option<Column> {
        self.columns.iter().find_map(|(column, titles)| {
            titles.iter().any(|t| t == title).then_some(*column)
        })
    }

    /// True when a card whose title contains `fragment` sits in `column`.
    pub fn contains(&self, column: Column, fragment: &str) -> bool {
        self.columns
            .get(&column)
            .is_some_and(|titles| titles.iter().any(|t| t.contains(fragment)))
    }

    pub fn same_layout(&self, other: &BoardSnapshot) -> bool {
        self.columns == other.columns
    }

    /// Compare this snapshot (before) against a later one (after).
    pub fn diff(&self, after: &BoardSnapshot) -> SnapshotDiff {
        let mut diff = SnapshotDiff::default();

        for (column, titles) in &self.columns {
            for title in titles {
                match after.position_of(title) {
                    None => diff.missing.push(title.clone()),
                    Some(now) if now != *column => {
                        diff.relocated.push((title.clone(), *column, now));
                    }
                    Some(_) => {}
                }
            }
        }
        for titles in after.columns.values() {
            for title in titles {
                if self.position_of(title).is_none() {
                    diff.added.push(title.clone());
                }
            }
        }
        diff
    }

    /// Every card present before must still exist somewhere after.
    /// Relocation is fine; disappearance blocks the deployment.
    pub fn assert_no_loss(&self, after: &BoardSnapshot) -> Result<()> {
        let diff = self.diff(after);
        if diff.missing.is_empty() {
            return Ok(());
        }
        Err(Error::DataLoss {
            missing: diff.missing,
            severity: Severity::DeploymentBlocker,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(layout: &[(Column, &[&str])]) -> BoardSnapshot {
        let mut columns: BTreeMap<Column, Vec<String>> = BTreeMap::new();
        for column in Column::ALL {
            columns.insert(column, Vec::new());
        }
        for (column, titles) in layout {
            columns.insert(*column, titles.iter().map(|s| s.to_string()).collect());
        }
        BoardSnapshot::from_columns(columns)
    }

    #[test]
    fn digest_ignores_capture_time_but_not_layout() {
        let a = snapshot(&[(Column::NotStarted, &["Fix login", "Ship v2"])]);
        let b = snapshot(&[(Column::NotStarted, &["Fix login", "Ship v2"])]);
        assert_eq!(a.digest(), b.digest());

        let moved = snapshot(&[(Column::InProgress, &["Fix login", "Ship v2"])]);
        assert_ne!(a.digest(), moved.digest());
    }

    #[test]
    fn digest_distinguishes_order_within_a_column() {
        let a = snapshot(&[(Column::Done, &["one", "two"])]);
        let b = snapshot(&[(Column::Done, &["two", "one"])]);
        assert_ne!(a.digest(), b.digest());
    }

    #[test]
    fn diff_reports_relocation_without_loss() {
        let before = snapshot(&[(Column::NotStarted, &["Fix login"])]);
        let after = snapshot(&[(Column::Done, &["Fix login"])]);
        let diff = before.diff(&after);
        assert!(diff.missing.is_empty());
        assert_eq!(
            diff.relocated,
            vec![("Fix login".to_string(), Column::NotStarted, Column::Done)]
        );
        before.assert_no_loss(&after).unwrap();
    }

    #[test]
    fn vanished_card_is_a_deployment_blocker() {
        let before = snapshot(&[(Column::Blocked, &["Audit deps", "Fix login"])]);
        let after = snapshot(&[(Column::Blocked, &["Audit deps"])]);
        let err = before.assert_no_loss(&after).unwrap_err();
        assert!(err.is_data_loss());
        let msg = err.to_string();
        assert!(msg.contains("DEPLOYMENT BLOCKER"), "{msg}");
        assert!(msg.contains("Fix login"), "{msg}");
    }

    #[test]
    fn unchanged_layouts_compare_equal() {
        let a = snapshot(&[(Column::ReadyForQc, &["QA pass"])]);
        let b = snapshot(&[(Column::ReadyForQc, &["QA pass"])]);
        assert!(a.same_layout(&b));
        assert!(a.diff(&b).is_empty());
    }

    #[test]
    fn position_lookup_uses_exact_titles() {
        let snap = snapshot(&[(Column::InProgress, &["Fix login flow"])]);
        assert_eq!(snap.position_of("Fix login flow"), Some(Column::InProgress));
        assert_eq!(snap.position_of("Fix login"), None);
        assert!(snap.contains(Column::InProgress, "Fix login"));
    }
}
