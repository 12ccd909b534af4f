//! Declarative YAML scenarios
//!
//! A scenario describes one board-level flow: fixtures to create, drags
//! to perform, what the columns and the network must show afterwards.
//! Steps run in order against numbered sessions (session 0 exists
//! always; `sessions: 2` opens a second client for sync checks).

use std::path::Path;

use serde::{Deserialize, Serialize};

use boardwalk_harness::{Column, CreationPath, Fault};

use crate::error::{E2eError, E2eResult};

/// A complete scenario parsed from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Unique name for this scenario
    pub name: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Tags for filtering
    #[serde(default)]
    pub tags: Vec<String>,

    /// Number of concurrent browser sessions to open
    #[serde(default = "default_sessions")]
    pub sessions: usize,

    /// Steps to execute in order
    pub steps: Vec<Step>,
}

fn default_sessions() -> usize {
    1
}

/// A single step in a scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    /// Create a board (name auto-generated unless given)
    CreateBoard {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        via: CreationPath,
    },

    /// Create a card on the scenario's board
    CreateCard {
        title: String,
        #[serde(default)]
        column: Option<Column>,
        #[serde(default)]
        description: String,
        #[serde(default)]
        via: CreationPath,
    },

    /// Open the scenario's board in a session
    OpenBoard {
        #[serde(default)]
        session: usize,
    },

    /// Drag a card to a column (element addressing) or to a viewport
    /// point (pixel addressing); exactly one destination is required
    DragCard {
        title: String,
        #[serde(default)]
        to: Option<Column>,
        #[serde(default)]
        at: Option<[f64; 2]>,
        #[serde(default)]
        steps: Option<u32>,
        #[serde(default)]
        expect_cancel: bool,
        #[serde(default)]
        session: usize,
    },

    /// Assert a card is present in a column
    AssertColumnContains {
        column: Column,
        title: String,
        #[serde(default)]
        session: usize,
    },

    /// Assert a card is absent from a column
    AssertColumnNotContains {
        column: Column,
        title: String,
        #[serde(default)]
        session: usize,
    },

    /// Assert a column's card count
    AssertCardCount {
        column: Column,
        count: usize,
        #[serde(default)]
        session: usize,
    },

    /// Start recording requests matching a URL pattern
    RecordRequests {
        #[serde(default = "default_move_pattern")]
        pattern: String,
        #[serde(default = "default_move_methods")]
        methods: Vec<String>,
        #[serde(default)]
        session: usize,
    },

    /// Wait for a recorded move request and assert its destination column
    ExpectMovePayload { to: Column },

    /// Apply a fault to matching requests for the rest of the scenario
    InjectFault {
        fault: Fault,
        #[serde(default = "default_fault_pattern")]
        pattern: String,
        #[serde(default)]
        methods: Vec<String>,
        #[serde(default)]
        session: usize,
    },

    /// Assert a visible role=alert region, optionally checking its text
    AssertAlert {
        #[serde(default)]
        contains: Option<String>,
        #[serde(default)]
        session: usize,
    },

    /// Capture the board layout as the no-loss baseline
    SnapshotGuard {
        #[serde(default)]
        session: usize,
    },

    /// Assert no card vanished since the last snapshot_guard
    AssertNoLoss {
        #[serde(default)]
        session: usize,
    },

    /// Wait until every session's board satisfies a card/column condition
    Converge {
        column: Column,
        title: String,
        #[serde(default)]
        require_live: bool,
    },

    /// Reload a session
    Reload {
        #[serde(default)]
        session: usize,
    },

    /// Wait a fixed amount of time (use sparingly)
    Sleep { ms: u64 },

    /// Log a message
    Log { message: String },
}

fn default_move_pattern() -> String {
    "/api/tickets/.*/move".to_string()
}

fn default_move_methods() -> Vec<String> {
    vec!["POST".to_string()]
}

fn default_fault_pattern() -> String {
    "/api/".to_string()
}

impl Step {
    /// Short label for logs and results.
    pub fn describe(&self) -> String {
        match self {
            Step::CreateBoard { name, via } => match name {
                Some(name) => format!("create_board {:?} ({:?})", name, via),
                None => format!("create_board ({:?})", via),
            },
            Step::CreateCard { title, column, .. } => match column {
                Some(column) => format!("create_card {:?} in {:?}", title, column.ui_label()),
                None => format!("create_card {:?}", title),
            },
            Step::OpenBoard { session } => format!("open_board (session {})", session),
            Step::DragCard {
                title,
                to,
                at,
                expect_cancel,
                ..
            } => {
                let dest = match (to, at) {
                    (Some(column), _) => format!("to {:?}", column.ui_label()),
                    (None, Some([x, y])) => format!("to ({}, {})", x, y),
                    (None, None) => "nowhere".to_string(),
                };
                if *expect_cancel {
                    format!("drag_card {:?} {} (cancel)", title, dest)
                } else {
                    format!("drag_card {:?} {}", title, dest)
                }
            }
            Step::AssertColumnContains { column, title, .. } => {
                format!("assert {:?} in {:?}", title, column.ui_label())
            }
            Step::AssertColumnNotContains { column, title, .. } => {
                format!("assert {:?} not in {:?}", title, column.ui_label())
            }
            Step::AssertCardCount { column, count, .. } => {
                format!("assert {} card(s) in {:?}", count, column.ui_label())
            }
            Step::RecordRequests { pattern, .. } => format!("record_requests {:?}", pattern),
            Step::ExpectMovePayload { to } => {
                format!("expect_move_payload to {:?}", to.api_name())
            }
            Step::InjectFault { fault, pattern, .. } => {
                format!("inject_fault {:?} on {:?}", fault, pattern)
            }
            Step::AssertAlert { contains, .. } => match contains {
                Some(text) => format!("assert_alert containing {:?}", text),
                None => "assert_alert".to_string(),
            },
            Step::SnapshotGuard { .. } => "snapshot_guard".to_string(),
            Step::AssertNoLoss { .. } => "assert_no_loss".to_string(),
            Step::Converge {
                column,
                title,
                require_live,
            } => {
                if *require_live {
                    format!("converge {:?} in {:?} (live)", title, column.ui_label())
                } else {
                    format!("converge {:?} in {:?}", title, column.ui_label())
                }
            }
            Step::Reload { session } => format!("reload (session {})", session),
            Step::Sleep { ms } => format!("sleep {}ms", ms),
            Step::Log { message } => format!("log {:?}", message),
        }
    }
}

impl Scenario {
    /// Parse a scenario from a YAML string
    pub fn from_yaml(yaml: &str) -> E2eResult<Self> {
        let scenario: Scenario = serde_yaml::from_str(yaml)?;
        scenario.validate()?;
        Ok(scenario)
    }

    /// Parse a scenario from a YAML file
    pub fn from_file(path: &Path) -> E2eResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content).map_err(|e| match e {
            E2eError::Yaml(inner) => {
                E2eError::ScenarioParse(format!("{}: {}", path.display(), inner))
            }
            other => other,
        })
    }

    /// Load all scenarios from a directory, sorted by name
    pub fn load_all(dir: &Path) -> E2eResult<Vec<Self>> {
        let mut scenarios = Vec::new();

        for entry in walkdir::WalkDir::new(dir)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .extension()
                    .map(|ext| ext == "yaml" || ext == "yml")
                    .unwrap_or(false)
            })
        {
            scenarios.push(Self::from_file(entry.path())?);
        }

        Ok(scenarios)
    }

    /// Filter scenarios by tag
    pub fn filter_by_tag<'a>(scenarios: &'a [Self], tag: &str) -> Vec<&'a Self> {
        scenarios
            .iter()
            .filter(|s| s.tags.iter().any(|t| t == tag))
            .collect()
    }

    fn validate(&self) -> E2eResult<()> {
        let sessions = self.sessions.max(1);
        for step in &self.steps {
            if let Step::DragCard { to, at, .. } = step {
                if to.is_none() && at.is_none() {
                    return Err(E2eError::ScenarioParse(format!(
                        "{}: drag_card needs a destination ('to' column or 'at' point)",
                        self.name
                    )));
                }
            }
            if let Some(session) = step_session(step) {
                if session >= sessions {
                    return Err(E2eError::ScenarioParse(format!(
                        "{}: step {:?} uses session {} but only {} session(s) are declared",
                        self.name,
                        step.describe(),
                        session,
                        sessions
                    )));
                }
            }
        }
        Ok(())
    }
}

fn step_session(step: &Step) -> Option<usize> {
    match step {
        Step::OpenBoard { session }
        | Step::DragCard { session, .. }
        | Step::AssertColumnContains { session, .. }
        | Step::AssertColumnNotContains { session, .. }
        | Step::AssertCardCount { session, .. }
        | Step::RecordRequests { session, .. }
        | Step::InjectFault { session, .. }
        | Step::AssertAlert { session, .. }
        | Step::SnapshotGuard { session }
        | Step::AssertNoLoss { session }
        | Step::Reload { session } => Some(*session),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_drag_scenario() {
        let yaml = r#"
name: drag-to-done
description: Move a card to Done and verify persistence
tags:
  - drag
  - smoke
steps:
  - action: create_board
  - action: create_card
    title: Fix login
    column: Not Started
  - action: open_board
  - action: record_requests
  - action: drag_card
    title: Fix login
    to: Done
  - action: expect_move_payload
    to: Done
  - action: assert_column_contains
    column: Done
    title: Fix login
"#;
        let scenario = Scenario::from_yaml(yaml).unwrap();
        assert_eq!(scenario.name, "drag-to-done");
        assert_eq!(scenario.sessions, 1);
        assert_eq!(scenario.steps.len(), 7);
        assert!(matches!(
            scenario.steps[4],
            Step::DragCard {
                to: Some(Column::Done),
                expect_cancel: false,
                ..
            }
        ));
    }

    #[test]
    fn parses_multi_session_and_fault_steps() {
        let yaml = r#"
name: sync-check
sessions: 2
steps:
  - action: create_board
  - action: open_board
    session: 0
  - action: open_board
    session: 1
  - action: inject_fault
    fault:
      kind: status
      status: 503
  - action: converge
    column: Done
    title: Fix login
"#;
        let scenario = Scenario::from_yaml(yaml).unwrap();
        assert_eq!(scenario.sessions, 2);
        assert!(matches!(
            scenario.steps[3],
            Step::InjectFault {
                fault: Fault::Status { status: 503 },
                ..
            }
        ));
    }

    #[test]
    fn rejects_drags_without_a_destination() {
        let yaml = r#"
name: bad-drag
steps:
  - action: drag_card
    title: Fix login
"#;
        let err = Scenario::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("destination"), "{err}");
    }

    #[test]
    fn rejects_steps_addressing_undeclared_sessions() {
        let yaml = r#"
name: bad-session
steps:
  - action: open_board
    session: 1
"#;
        let err = Scenario::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("session 1"), "{err}");
    }

    #[test]
    fn pixel_addressed_drag_parses() {
        let yaml = r#"
name: pixel-drag
steps:
  - action: drag_card
    title: Fix login
    at: [880.0, 420.0]
    expect_cancel: true
"#;
        let scenario = Scenario::from_yaml(yaml).unwrap();
        assert!(matches!(
            scenario.steps[0],
            Step::DragCard {
                at: Some([x, y]),
                expect_cancel: true,
                ..
            } if x == 880.0 && y == 420.0
        ));
    }
}
