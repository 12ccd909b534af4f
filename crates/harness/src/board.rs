//! Kanban board DOM adapter
//!
//! [`BoardView`] translates board vocabulary (columns, cards, the detail
//! panel) into locator chains. Card lookups are always scoped to a column
//! region first, so a title appearing in two columns can never satisfy an
//! assertion about the wrong one.

use tracing::debug;

use crate::columns::Column;
use crate::error::{Error, Result};
use crate::locator::{Locator, Selector};
use crate::session::Session;
use crate::snapshot::BoardSnapshot;
use crate::wait::{wait_until, WaitOptions};

/// The application's DOM surface, kept in one place
pub(crate) mod dom {
    /// A column region on the board
    pub const COLUMN: &str = ".column";
    /// A board tile on the dashboard
    pub const BOARD_TILE: &str = ".board-card";
    /// A card on the board
    pub const CARD: &str = ".ticket-card";
    /// The card detail panel
    pub const DETAIL: &str = ".ticket-detail";

    pub const BTN_NEW_BOARD: &str = "New board";
    pub const BTN_ADD_TICKET: &str = "Add ticket";
    pub const BTN_SAVE: &str = "Save";
    pub const PLACEHOLDER_BOARD_NAME: &str = "Board name";
    pub const PLACEHOLDER_TICKET_TITLE: &str = "Ticket title";
    pub const PLACEHOLDER_DESCRIPTION: &str = "Description";
}

pub struct BoardView<'a> {
    session: &'a Session,
}

impl Session {
    /// Board-level view of whatever this session currently displays.
    pub fn board(&self) -> BoardView<'_> {
        BoardView { session: self }
    }
}

impl<'a> BoardView<'a> {
    /// The column region carrying this column's header label.
    pub fn column(&self, column: Column) -> Locator {
        Locator::new(Selector::css_with_text(dom::COLUMN, column.ui_label()))
    }

    /// A card with the given title (containment match), scoped to a column.
    pub fn card(&self, column: Column, title: &str) -> Locator {
        self.column(column)
            .descendant(Selector::css_with_text(dom::CARD, title))
    }

    /// A card with the given title anywhere on the board.
    pub fn card_anywhere(&self, title: &str) -> Locator {
        Locator::new(Selector::css_with_text(dom::CARD, title))
    }

    pub fn detail(&self) -> Locator {
        Locator::new(Selector::css(dom::DETAIL))
    }

    pub fn dialog(&self) -> Locator {
        Locator::new(Selector::role("dialog"))
    }

    /// Wait until the board has rendered its columns.
    pub async fn wait_ready(&self) -> Result<()> {
        self.session
            .wait_for(&Locator::new(Selector::css(dom::COLUMN)).first())
            .await
    }

    /// Navigate to the dashboard and open a board by name.
    pub async fn open(&self, board_name: &str) -> Result<()> {
        debug!("opening board {:?}", board_name);
        self.session.goto("/").await?;
        let tile = Locator::new(Selector::css_with_text(dom::BOARD_TILE, board_name));
        self.session.click(&tile).await?;
        self.wait_ready().await
    }

    /// Visible text of every card in a column, top to bottom.
    pub async fn card_titles(&self, column: Column) -> Result<Vec<String>> {
        let cards = self.column(column).descendant(Selector::css(dom::CARD));
        self.session.texts(&cards).await
    }

    pub async fn count_in(&self, column: Column) -> Result<usize> {
        let cards = self.column(column).descendant(Selector::css(dom::CARD));
        self.session.count(&cards).await
    }

    pub async fn total_cards(&self) -> Result<usize> {
        self.session
            .count(&Locator::new(Selector::css(dom::CARD)))
            .await
    }

    /// Open a card's detail panel.
    pub async fn open_card(&self, title: &str) -> Result<()> {
        self.session.click(&self.card_anywhere(title)).await?;
        self.session.wait_for(&self.detail()).await
    }

    /// Dismiss the detail panel.
    pub async fn close_card(&self) -> Result<()> {
        self.session.press("Escape").await?;
        self.session.wait_for_state(&self.detail(), "hidden").await
    }

    /// Capture which cards sit in which columns right now.
    pub async fn snapshot(&self) -> Result<BoardSnapshot> {
        BoardSnapshot::capture(self.session).await
    }

    /// Assert the card is (or becomes, within the element timeout) present
    /// in the column.
    pub async fn expect_in_column(&self, column: Column, title: &str) -> Result<()> {
        let locator = self.card(column, title);
        let session = self.session;
        let locator = &locator;
        let opts = WaitOptions::new(session.timeouts().element)
            .with_interval(session.timeouts().poll_interval);

        wait_until(
            &format!("card {:?} in column {:?}", title, column.ui_label()),
            &opts,
            || async move {
                let n = session.count(locator).await?;
                Ok((n > 0).then_some(()))
            },
        )
        .await
        .map_err(|e| Error::Assertion(e.to_string()))?;
        Ok(())
    }

    /// Assert the card is (or becomes, within the element timeout) absent
    /// from the column. Waiting matters here too: asserting absence right
    /// after a drop would pass vacuously while the board re-renders.
    pub async fn expect_not_in_column(&self, column: Column, title: &str) -> Result<()> {
        let locator = self.card(column, title);
        let session = self.session;
        let locator = &locator;
        let opts = WaitOptions::new(session.timeouts().element)
            .with_interval(session.timeouts().poll_interval);

        wait_until(
            &format!("card {:?} absent from column {:?}", title, column.ui_label()),
            &opts,
            || async move {
                let n = session.count(locator).await?;
                Ok((n == 0).then_some(()))
            },
        )
        .await
        .map_err(|e| Error::Assertion(e.to_string()))?;
        Ok(())
    }

    /// Assert a column settles at exactly `expected` cards.
    pub async fn expect_count(&self, column: Column, expected: usize) -> Result<()> {
        let view = self;
        let opts = WaitOptions::new(self.session.timeouts().element)
            .with_interval(self.session.timeouts().poll_interval);

        wait_until(
            &format!("{} card(s) in column {:?}", expected, column.ui_label()),
            &opts,
            || async move {
                let n = view.count_in(column).await?;
                Ok((n == expected).then_some(()))
            },
        )
        .await
        .map_err(|e| Error::Assertion(e.to_string()))?;
        Ok(())
    }
}
