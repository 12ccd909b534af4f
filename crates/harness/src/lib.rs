//! Boardwalk Test Harness
//!
//! Browser-level test harness for the Boardwalk kanban application:
//! - Drives a real browser through a Node/Playwright sidecar process
//! - Creates and tears down board/card fixtures (UI or API path)
//! - Simulates drag and drop at the pointer level, with DOM-ancestry
//!   drop resolution
//! - Intercepts and asserts on the network traffic the UI generates
//! - Checks that concurrent clients converge on the same board state
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    Test (Rust)                               │
//! ├──────────────────────────────────────────────────────────────┤
//! │  Driver ──────── node driver.js ── Playwright ── browser     │
//! │    │   NDJSON commands/replies + route events over stdio     │
//! │    ├── Session (one browser context each)                    │
//! │    │     ├── BoardView      column/card queries, waits       │
//! │    │     ├── DragBuilder    arm → hover → settle → drop      │
//! │    │     └── RequestRecorder  scoped capture + faults        │
//! │    └── Session, Session …   multi-client convergence         │
//! ├──────────────────────────────────────────────────────────────┤
//! │  FixtureFactory ── ApiClient ──────────── HTTP API           │
//! │  BoardSnapshot / diff / data-loss check                      │
//! └──────────────────────────────────────────────────────────────┘
//! ```

pub mod a11y;
pub mod api;
pub mod board;
pub mod columns;
pub mod config;
pub mod converge;
pub mod drag;
pub mod driver;
pub mod error;
pub mod fixture;
pub mod intercept;
pub mod locator;
pub mod session;
pub mod snapshot;
pub mod wait;

// Re-export the types almost every test touches
pub use api::{ApiClient, BoardRecord, TicketCreate, TicketPatch, TicketRecord};
pub use board::BoardView;
pub use columns::Column;
pub use config::{Browser, TargetConfig, Timeouts};
pub use converge::{await_convergence, Convergence, ConvergeOptions};
pub use drag::{DragOutcome, DragPhase};
pub use driver::Driver;
pub use error::{Error, Result, Severity};
pub use fixture::{BoardHandle, CardHandle, CreationPath, FixtureFactory};
pub use intercept::{CapturedRequest, Fault, MovePayload, RequestRecorder};
pub use locator::{BoundingBox, Locator, Point, Selector};
pub use session::Session;
pub use snapshot::{BoardSnapshot, SnapshotDiff};
pub use wait::{wait_until, WaitOptions};

/// Harness version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
