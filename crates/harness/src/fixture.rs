//! Board and card fixtures
//!
//! Every test runs against boards it created itself. [`FixtureFactory`]
//! hands out uniquely named boards and cards, tracks what it created, and
//! tears everything down through the API on [`FixtureFactory::dispose`].
//! Creation is verified within the creation timeout; a fixture that does
//! not materialize fails the test instead of letting later assertions
//! chase a board that was never there.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::api::{ApiClient, TicketCreate};
use crate::board::dom;
use crate::columns::Column;
use crate::config::{TargetConfig, Timeouts};
use crate::error::Result;
use crate::locator::{Locator, Selector};
use crate::session::Session;
use crate::wait::{wait_until, WaitOptions};

/// How a fixture gets created: through the HTTP API (fast, default) or by
/// driving the browser forms (exercises the creation UI itself).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CreationPath {
    #[default]
    Api,
    Ui,
}

/// A board this factory created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardHandle {
    pub id: String,
    pub name: String,
}

/// A card this factory created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardHandle {
    pub id: String,
    pub title: String,
    pub column: Column,
}

pub struct FixtureFactory {
    api: ApiClient,
    timeouts: Timeouts,
    run_tag: String,
    counter: AtomicU32,
    boards: Mutex<Vec<BoardHandle>>,
    disposed: AtomicBool,
}

impl FixtureFactory {
    pub fn new(config: &TargetConfig) -> Result<Self> {
        Ok(Self {
            api: ApiClient::new(config)?,
            timeouts: config.timeouts,
            run_tag: Utc::now().format("%H%M%S%3f").to_string(),
            counter: AtomicU32::new(0),
            boards: Mutex::new(Vec::new()),
            disposed: AtomicBool::new(false),
        })
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    /// A name no other test run (or earlier fixture in this run) can
    /// collide with.
    pub fn unique_name(&self, stem: &str) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        format!("{}-{}-{}", stem, self.run_tag, n)
    }

    /// Create a board through the API and wait until it is queryable.
    pub async fn create_board(&self, name: &str, description: &str) -> Result<BoardHandle> {
        let record = self.api.create_board(name, description).await?;
        let handle = BoardHandle {
            id: record.id,
            name: record.name,
        };
        debug!(board = %handle.name, id = %handle.id, "board created via api");
        self.boards.lock().push(handle.clone());
        Ok(handle)
    }

    /// Create a board by driving the dashboard form, then resolve its id
    /// through the API.
    pub async fn create_board_ui(
        &self,
        session: &Session,
        name: &str,
        description: &str,
    ) -> Result<BoardHandle> {
        session.goto("/").await?;
        session
            .click(&Locator::new(Selector::text(dom::BTN_NEW_BOARD)))
            .await?;
        session
            .fill(
                &Locator::new(Selector::placeholder(dom::PLACEHOLDER_BOARD_NAME)),
                name,
            )
            .await?;
        if !description.is_empty() {
            session
                .fill(
                    &Locator::new(Selector::placeholder(dom::PLACEHOLDER_DESCRIPTION)),
                    description,
                )
                .await?;
        }
        session
            .click(&Locator::new(Selector::text(dom::BTN_SAVE)))
            .await?;

        let id = self.resolve_board_id(name).await?;
        let handle = BoardHandle {
            id,
            name: name.to_string(),
        };
        debug!(board = %handle.name, id = %handle.id, "board created via ui");
        self.boards.lock().push(handle.clone());
        Ok(handle)
    }

    /// Create a card through the API and wait until it is queryable.
    pub async fn create_card(
        &self,
        board: &BoardHandle,
        column: Column,
        title: &str,
        description: &str,
    ) -> Result<CardHandle> {
        let record = self
            .api
            .create_ticket(&TicketCreate {
                title,
                description,
                board_id: &board.id,
                current_column: column,
                priority: None,
            })
            .await?;
        debug!(card = %record.title, id = %record.id, column = %column, "card created via api");
        Ok(CardHandle {
            id: record.id,
            title: record.title,
            column: record.current_column,
        })
    }

    /// Create a card by driving the column's add form on an open board,
    /// then resolve its id through the API.
    pub async fn create_card_ui(
        &self,
        session: &Session,
        board: &BoardHandle,
        column: Column,
        title: &str,
    ) -> Result<CardHandle> {
        let view = session.board();
        let add = view
            .column(column)
            .descendant(Selector::text(dom::BTN_ADD_TICKET));
        session.click(&add).await?;
        session
            .fill(
                &Locator::new(Selector::placeholder(dom::PLACEHOLDER_TICKET_TITLE)),
                title,
            )
            .await?;
        session
            .click(&Locator::new(Selector::text(dom::BTN_SAVE)))
            .await?;

        let id = self.resolve_card_id(board, title).await?;
        debug!(card = %title, id = %id, column = %column, "card created via ui");
        Ok(CardHandle {
            id,
            title: title.to_string(),
            column,
        })
    }

    async fn resolve_board_id(&self, name: &str) -> Result<String> {
        let api = &self.api;
        let opts =
            WaitOptions::new(self.timeouts.creation).with_interval(Duration::from_millis(250));
        wait_until(
            &format!("board {:?} queryable through the api", name),
            &opts,
            || async move {
                let boards = api.list_boards().await?;
                Ok(boards.into_iter().find(|b| b.name == name).map(|b| b.id))
            },
        )
        .await
    }

    async fn resolve_card_id(&self, board: &BoardHandle, title: &str) -> Result<String> {
        let api = &self.api;
        let board_id = board.id.as_str();
        let opts =
            WaitOptions::new(self.timeouts.creation).with_interval(Duration::from_millis(250));
        wait_until(
            &format!("card {:?} queryable through the api", title),
            &opts,
            || async move {
                let tickets = api.tickets_for_board(board_id).await?;
                Ok(tickets.into_iter().find(|t| t.title == title).map(|t| t.id))
            },
        )
        .await
    }

    /// Delete every board this factory created. Deletion keeps going past
    /// individual failures and reports the first one at the end.
    pub async fn dispose(&self) -> Result<()> {
        self.disposed.store(true, Ordering::Relaxed);
        let boards: Vec<BoardHandle> = std::mem::take(&mut *self.boards.lock());
        let mut first_err = None;
        for board in boards {
            match self.api.delete_board(&board.id).await {
                Ok(()) => debug!(board = %board.name, "fixture board deleted"),
                Err(e) => {
                    warn!(board = %board.name, error = %e, "failed to delete fixture board");
                    first_err.get_or_insert(e);
                }
            }
        }
        match first_err {
            None => Ok(()),
            Some(e) => Err(e),
        }
    }
}

impl Drop for FixtureFactory {
    fn drop(&mut self) {
        if self.disposed.load(Ordering::Relaxed) {
            return;
        }
        let leftovers = self.boards.lock();
        if !leftovers.is_empty() {
            let names: Vec<&str> = leftovers.iter().map(|b| b.name.as_str()).collect();
            warn!(
                boards = %names.join(", "),
                "fixture factory dropped without dispose(), boards left on the target"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn factory() -> FixtureFactory {
        FixtureFactory::new(&TargetConfig::default()).unwrap()
    }

    #[test]
    fn unique_names_never_repeat() {
        let f = factory();
        let a = f.unique_name("board");
        let b = f.unique_name("board");
        assert_ne!(a, b);
        assert!(a.starts_with("board-"));
        assert!(a.ends_with("-0"));
        assert!(b.ends_with("-1"));
        // Quietly dropping an empty factory must not warn.
        drop(f);
    }

    #[test]
    fn creation_path_parses_from_scenario_shorthand() {
        let api: CreationPath = serde_json::from_str("\"api\"").unwrap();
        let ui: CreationPath = serde_json::from_str("\"ui\"").unwrap();
        assert_eq!(api, CreationPath::Api);
        assert_eq!(ui, CreationPath::Ui);
        assert_eq!(CreationPath::default(), CreationPath::Api);
    }
}
