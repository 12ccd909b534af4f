//! Boardwalk E2E Scenario Framework
//!
//! This crate runs declarative board-level scenarios against a live
//! Boardwalk deployment:
//! - Parses YAML scenarios (fixtures, drags, assertions, faults)
//! - Drives browsers through the boardwalk-harness sidecar
//! - Verifies column state, network payloads and multi-client sync
//! - Writes a JSON suite report with per-step timings
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  Scenario Runner (Rust)                     │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ScenarioRunner                                             │
//! │    ├── run_all() / run_tagged() / run_named()               │
//! │    ├── run_scenario(spec) -> ScenarioResult                 │
//! │    └── write_results() -> suite-results.json                │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Scenario (YAML)                                            │
//! │    ├── name, description, tags, sessions                    │
//! │    └── steps: [Step]                                        │
//! │          ├── create_board / create_card { via: api|ui }     │
//! │          ├── drag_card { to | at, expect_cancel }           │
//! │          ├── assert_column_contains / _not_contains / count │
//! │          ├── record_requests / expect_move_payload          │
//! │          ├── inject_fault / assert_alert                    │
//! │          ├── snapshot_guard / assert_no_loss                │
//! │          └── converge { column, title, require_live }       │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod runner;
pub mod scenario;

pub use error::{E2eError, E2eResult};
pub use runner::{RunnerConfig, ScenarioResult, ScenarioRunner, StepResult, SuiteResult};
pub use scenario::{Scenario, Step};
