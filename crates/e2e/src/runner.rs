//! Scenario runner
//!
//! Launches one browser driver per scenario, opens the declared number of
//! sessions, builds fixtures, executes steps in order and stops at the
//! first failing step. Failures leave a full-page screenshot per open
//! session in the artifacts directory. A scenario whose convergence step
//! needed a reload passes degraded, and the suite counts those
//! separately.

use std::path::PathBuf;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use boardwalk_harness::{
    a11y, await_convergence, ApiClient, BoardHandle, BoardSnapshot, Column, Convergence,
    ConvergeOptions, CreationPath, Driver, FixtureFactory, Point, RequestRecorder, Session,
    TargetConfig,
};

use crate::error::{E2eError, E2eResult};
use crate::scenario::{Scenario, Step};

/// Result of one executed step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub step: String,
    pub success: bool,
    pub duration_ms: u64,
    pub error: Option<String>,
}

/// Result of running a single scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub name: String,
    pub success: bool,
    /// Passed, but only after a convergence reload
    pub degraded: bool,
    pub duration_ms: u64,
    pub steps: Vec<StepResult>,
    pub screenshots: Vec<String>,
    pub error: Option<String>,
}

/// Result of running a scenario suite
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteResult {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub degraded: usize,
    pub skipped: usize,
    pub duration_ms: u64,
    pub results: Vec<ScenarioResult>,
}

/// Configuration for the scenario runner
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub target: TargetConfig,
    pub specs_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            target: TargetConfig::default(),
            specs_dir: PathBuf::from("specs"),
            output_dir: PathBuf::from("test-results"),
        }
    }
}

/// Main scenario runner
pub struct ScenarioRunner {
    config: RunnerConfig,
}

impl ScenarioRunner {
    pub fn new(config: RunnerConfig) -> Self {
        Self { config }
    }

    /// Run every scenario in the specs directory
    pub async fn run_all(&self) -> E2eResult<SuiteResult> {
        let scenarios = Scenario::load_all(&self.config.specs_dir)?;
        self.run_scenarios(&scenarios).await
    }

    /// Run scenarios matching a tag
    pub async fn run_tagged(&self, tag: &str) -> E2eResult<SuiteResult> {
        let scenarios = Scenario::load_all(&self.config.specs_dir)?;
        let filtered: Vec<Scenario> = Scenario::filter_by_tag(&scenarios, tag)
            .into_iter()
            .cloned()
            .collect();
        self.run_scenarios(&filtered).await
    }

    /// Run a single scenario by name
    pub async fn run_named(&self, name: &str) -> E2eResult<SuiteResult> {
        let scenarios = Scenario::load_all(&self.config.specs_dir)?;
        let scenario = scenarios
            .into_iter()
            .find(|s| s.name == name)
            .ok_or_else(|| E2eError::ScenarioNotFound(name.to_string()))?;
        self.run_scenarios(std::slice::from_ref(&scenario)).await
    }

    /// Run a list of scenarios against the configured target
    pub async fn run_scenarios(&self, scenarios: &[Scenario]) -> E2eResult<SuiteResult> {
        let start = Instant::now();

        // One readiness gate for the whole suite; a dead target fails fast
        // instead of once per scenario.
        let api = ApiClient::new(&self.config.target)?;
        api.wait_ready(self.config.target.timeouts.creation).await?;

        info!("Running {} scenario(s)...", scenarios.len());

        let mut results = Vec::new();
        let mut passed = 0;
        let mut failed = 0;
        let mut degraded = 0;
        let skipped = 0;

        for scenario in scenarios {
            match self.run_scenario(scenario).await {
                Ok(result) => {
                    if result.success {
                        passed += 1;
                        if result.degraded {
                            degraded += 1;
                            warn!("~ {} passed degraded ({} ms)", result.name, result.duration_ms);
                        } else {
                            info!("✓ {} ({} ms)", result.name, result.duration_ms);
                        }
                    } else {
                        failed += 1;
                        error!(
                            "✗ {} - {}",
                            result.name,
                            result.error.as_deref().unwrap_or("unknown error")
                        );
                    }
                    results.push(result);
                }
                Err(e) => {
                    failed += 1;
                    error!("✗ {} - {}", scenario.name, e);
                    results.push(ScenarioResult {
                        name: scenario.name.clone(),
                        success: false,
                        degraded: false,
                        duration_ms: 0,
                        steps: vec![],
                        screenshots: vec![],
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        let duration_ms = start.elapsed().as_millis() as u64;

        info!("");
        info!(
            "Scenario results: {} passed ({} degraded), {} failed, {} skipped ({} ms)",
            passed, degraded, failed, skipped, duration_ms
        );

        Ok(SuiteResult {
            total: scenarios.len(),
            passed,
            failed,
            degraded,
            skipped,
            duration_ms,
            results,
        })
    }

    /// Run one scenario in a fresh browser
    pub async fn run_scenario(&self, scenario: &Scenario) -> E2eResult<ScenarioResult> {
        debug!("Running scenario: {}", scenario.name);
        let start = Instant::now();

        let driver = Driver::launch(&self.config.target).await?;
        let result = self.drive(&driver, scenario, start).await;
        if let Err(e) = driver.shutdown().await {
            warn!("driver shutdown after '{}' failed: {}", scenario.name, e);
        }
        result
    }

    async fn drive(
        &self,
        driver: &Driver,
        scenario: &Scenario,
        start: Instant,
    ) -> E2eResult<ScenarioResult> {
        let mut sessions = Vec::new();
        for _ in 0..scenario.sessions.max(1) {
            sessions.push(driver.new_session().await?);
        }

        let mut state = ScenarioState {
            sessions,
            fixtures: FixtureFactory::new(&self.config.target)?,
            board: None,
            recorder: None,
            faults: Vec::new(),
            guard: None,
            degraded: false,
        };

        let mut step_results = Vec::new();
        let mut scenario_error: Option<String> = None;
        let mut screenshots = Vec::new();

        for step in &scenario.steps {
            let label = step.describe();
            debug!("step: {}", label);
            let step_start = Instant::now();

            match state.execute(step).await {
                Ok(()) => step_results.push(StepResult {
                    step: label,
                    success: true,
                    duration_ms: step_start.elapsed().as_millis() as u64,
                    error: None,
                }),
                Err(e) => {
                    let reason = e.to_string();
                    step_results.push(StepResult {
                        step: label.clone(),
                        success: false,
                        duration_ms: step_start.elapsed().as_millis() as u64,
                        error: Some(reason.clone()),
                    });
                    scenario_error = Some(format!("{}: {}", label, reason));
                    screenshots = self.capture_failure(&state.sessions, &scenario.name).await;
                    break;
                }
            }
        }

        if let Err(e) = state.fixtures.dispose().await {
            warn!("fixture cleanup after '{}' failed: {}", scenario.name, e);
        }

        Ok(ScenarioResult {
            name: scenario.name.clone(),
            success: scenario_error.is_none(),
            degraded: state.degraded,
            duration_ms: start.elapsed().as_millis() as u64,
            steps: step_results,
            screenshots,
            error: scenario_error,
        })
    }

    /// Best-effort full-page screenshot of every open session.
    async fn capture_failure(&self, sessions: &[Session], scenario: &str) -> Vec<String> {
        let dir = self.config.output_dir.join("screenshots");
        let mut paths = Vec::new();
        for (idx, session) in sessions.iter().enumerate() {
            let path = dir.join(format!("{}-s{}.png", scenario, idx));
            match session.screenshot(&path, true).await {
                Ok(()) => {
                    info!("failure screenshot: {}", path.display());
                    paths.push(path.to_string_lossy().to_string());
                }
                Err(e) => warn!("screenshot of session {} failed: {}", idx, e),
            }
        }
        paths
    }

    /// Write suite results to JSON
    pub fn write_results(&self, results: &SuiteResult) -> E2eResult<PathBuf> {
        std::fs::create_dir_all(&self.config.output_dir)?;

        let path = self.config.output_dir.join("suite-results.json");
        let json = serde_json::to_string_pretty(results)?;
        std::fs::write(&path, json)?;

        info!("Results written to: {}", path.display());
        Ok(path)
    }
}

/// Everything a running scenario accumulates
struct ScenarioState {
    sessions: Vec<Session>,
    fixtures: FixtureFactory,
    board: Option<BoardHandle>,
    recorder: Option<RequestRecorder>,
    /// Fault recorders stay alive so their route hooks keep applying
    faults: Vec<RequestRecorder>,
    guard: Option<BoardSnapshot>,
    degraded: bool,
}

impl ScenarioState {
    async fn execute(&mut self, step: &Step) -> boardwalk_harness::Result<()> {
        use boardwalk_harness::Error;

        match step {
            Step::CreateBoard { name, via } => {
                let name = match name {
                    Some(name) => name.clone(),
                    None => self.fixtures.unique_name("board"),
                };
                let board = match via {
                    CreationPath::Api => self.fixtures.create_board(&name, "").await?,
                    CreationPath::Ui => {
                        let session = self.session(0)?;
                        self.fixtures.create_board_ui(session, &name, "").await?
                    }
                };
                self.board = Some(board);
                Ok(())
            }

            Step::CreateCard {
                title,
                column,
                description,
                via,
            } => {
                let board = self.board()?.clone();
                let column = column.unwrap_or(Column::NotStarted);
                match via {
                    CreationPath::Api => {
                        self.fixtures
                            .create_card(&board, column, title, description)
                            .await?;
                    }
                    CreationPath::Ui => {
                        let session = self.session(0)?;
                        self.fixtures
                            .create_card_ui(session, &board, column, title)
                            .await?;
                    }
                }
                Ok(())
            }

            Step::OpenBoard { session } => {
                let board = self.board()?.clone();
                self.session(*session)?.board().open(&board.name).await
            }

            Step::DragCard {
                title,
                to,
                at,
                steps,
                expect_cancel,
                session,
            } => {
                let session = self.session(*session)?;
                let view = session.board();
                let mut builder = session.drag(view.card_anywhere(title));
                if let Some(steps) = steps {
                    builder = builder.steps(*steps);
                }

                let outcome = match (at, expect_cancel) {
                    (Some([x, y]), true) => builder.cancel_at(Point::new(*x, *y)).await?,
                    (Some([x, y]), false) => builder.drop_at(Point::new(*x, *y)).await?,
                    (None, true) => {
                        let column = to.ok_or_else(|| {
                            Error::Assertion("drag_card has no destination".to_string())
                        })?;
                        builder.cancel_over_column(column).await?
                    }
                    (None, false) => {
                        let column = to.ok_or_else(|| {
                            Error::Assertion("drag_card has no destination".to_string())
                        })?;
                        builder.drop_on_column(column).await?
                    }
                };

                if *expect_cancel {
                    outcome.expect_cancelled()
                } else if let Some(column) = to {
                    outcome.expect_landed(*column)
                } else {
                    Ok(())
                }
            }

            Step::AssertColumnContains {
                column,
                title,
                session,
            } => {
                self.session(*session)?
                    .board()
                    .expect_in_column(*column, title)
                    .await
            }

            Step::AssertColumnNotContains {
                column,
                title,
                session,
            } => {
                self.session(*session)?
                    .board()
                    .expect_not_in_column(*column, title)
                    .await
            }

            Step::AssertCardCount {
                column,
                count,
                session,
            } => {
                self.session(*session)?
                    .board()
                    .expect_count(*column, *count)
                    .await
            }

            Step::RecordRequests {
                pattern,
                methods,
                session,
            } => {
                let methods: Vec<&str> = methods.iter().map(String::as_str).collect();
                let recorder = self
                    .session(*session)?
                    .intercept(pattern, &methods)
                    .await?;
                self.recorder = Some(recorder);
                Ok(())
            }

            Step::ExpectMovePayload { to } => {
                let recorder = self.recorder.as_ref().ok_or_else(|| {
                    Error::Assertion(
                        "expect_move_payload needs a record_requests step first".to_string(),
                    )
                })?;
                let request = recorder
                    .wait_for_match("a card-move request", |r| {
                        r.method == "POST" && r.url.contains("/move")
                    })
                    .await?;
                request.move_payload()?.expect_destination(*to)
            }

            Step::InjectFault {
                fault,
                pattern,
                methods,
                session,
            } => {
                let methods: Vec<&str> = methods.iter().map(String::as_str).collect();
                let recorder = self
                    .session(*session)?
                    .intercept_with_fault(pattern, &methods, *fault)
                    .await?;
                self.faults.push(recorder);
                Ok(())
            }

            Step::AssertAlert { contains, session } => {
                let text = a11y::expect_alert(self.session(*session)?).await?;
                if let Some(expected) = contains {
                    if !text.contains(expected) {
                        return Err(Error::Assertion(format!(
                            "alert says {:?}, expected it to contain {:?}",
                            text, expected
                        )));
                    }
                }
                Ok(())
            }

            Step::SnapshotGuard { session } => {
                let snapshot = self.session(*session)?.board().snapshot().await?;
                self.guard = Some(snapshot);
                Ok(())
            }

            Step::AssertNoLoss { session } => {
                let guard = self.guard.as_ref().ok_or_else(|| {
                    Error::Assertion("assert_no_loss needs a snapshot_guard step first".to_string())
                })?;
                let after = self.session(*session)?.board().snapshot().await?;
                guard.assert_no_loss(&after)
            }

            Step::Converge {
                column,
                title,
                require_live,
            } => {
                let refs: Vec<&Session> = self.sessions.iter().collect();
                let mut opts = ConvergeOptions::from_timeouts(self.session(0)?.timeouts());
                if *require_live {
                    opts = opts.require_live();
                }
                let what = format!("{:?} in {:?}", title, column.ui_label());
                let column = *column;
                let title = title.clone();
                let outcome = await_convergence(
                    &refs,
                    &what,
                    move |snap| snap.contains(column, &title),
                    &opts,
                )
                .await?;
                if outcome == Convergence::AfterReload {
                    self.degraded = true;
                }
                Ok(())
            }

            Step::Reload { session } => self.session(*session)?.reload().await,

            Step::Sleep { ms } => {
                tokio::time::sleep(std::time::Duration::from_millis(*ms)).await;
                Ok(())
            }

            Step::Log { message } => {
                info!("{}", message);
                Ok(())
            }
        }
    }

    fn session(&self, idx: usize) -> boardwalk_harness::Result<&Session> {
        self.sessions.get(idx).ok_or_else(|| {
            boardwalk_harness::Error::Assertion(format!(
                "scenario addresses session {} but only {} are open",
                idx,
                self.sessions.len()
            ))
        })
    }

    fn board(&self) -> boardwalk_harness::Result<&BoardHandle> {
        self.board.as_ref().ok_or_else(|| {
            boardwalk_harness::Error::Assertion(
                "no board yet; add a create_board step".to_string(),
            )
        })
    }
}
