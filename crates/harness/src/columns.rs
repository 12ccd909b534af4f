//! Board column identities
//!
//! The five workflow columns, with the two names each one carries: the label
//! rendered in the column header and the value the API stores. They differ
//! for the first column ("TODO" on screen, "Not Started" on the wire), which
//! is exactly the kind of mismatch assertions must not paper over. Tests
//! always address columns through this type, never through raw strings.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Number of columns on a board
pub const COLUMN_COUNT: usize = 5;

/// A workflow column, in board order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Column {
    #[serde(rename = "Not Started")]
    NotStarted,
    #[serde(rename = "In Progress")]
    InProgress,
    #[serde(rename = "Blocked")]
    Blocked,
    #[serde(rename = "Ready for QC")]
    ReadyForQc,
    #[serde(rename = "Done")]
    Done,
}

impl Column {
    /// All columns in on-screen order
    pub const ALL: [Column; COLUMN_COUNT] = [
        Column::NotStarted,
        Column::InProgress,
        Column::Blocked,
        Column::ReadyForQc,
        Column::Done,
    ];

    /// The value the API stores in `current_column`
    pub fn api_name(&self) -> &'static str {
        match self {
            Column::NotStarted => "Not Started",
            Column::InProgress => "In Progress",
            Column::Blocked => "Blocked",
            Column::ReadyForQc => "Ready for QC",
            Column::Done => "Done",
        }
    }

    /// The label rendered in the column header
    pub fn ui_label(&self) -> &'static str {
        match self {
            Column::NotStarted => "TODO",
            Column::InProgress => "In Progress",
            Column::Blocked => "Blocked",
            Column::ReadyForQc => "Ready for QC",
            Column::Done => "Done",
        }
    }

    pub fn from_api_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.api_name() == name)
    }

    pub fn from_ui_label(label: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.ui_label() == label)
    }

    /// Parse either spelling. Scenario files and CLI arguments accept both.
    pub fn parse(name: &str) -> Result<Self> {
        Self::from_api_name(name)
            .or_else(|| Self::from_ui_label(name))
            .ok_or_else(|| Error::Column(name.to_string()))
    }

    /// Position of this column on the board, left to right
    pub fn index(&self) -> usize {
        Self::ALL.iter().position(|c| c == self).unwrap_or(0)
    }

    /// Column at a board position. Drop resolution maps the matched DOM
    /// node's position through this.
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Every ordered (source, destination) pair of distinct columns
    pub fn pairs() -> impl Iterator<Item = (Column, Column)> {
        Self::ALL.iter().flat_map(|&from| {
            Self::ALL
                .iter()
                .filter(move |&&to| to != from)
                .map(move |&to| (from, to))
        })
    }
}

impl std::fmt::Display for Column {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.api_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_column_has_diverging_names() {
        assert_eq!(Column::NotStarted.ui_label(), "TODO");
        assert_eq!(Column::NotStarted.api_name(), "Not Started");
    }

    #[test]
    fn remaining_columns_share_their_names() {
        for column in Column::ALL.iter().skip(1) {
            assert_eq!(column.ui_label(), column.api_name());
        }
    }

    #[test]
    fn mapping_round_trips_both_ways() {
        for column in Column::ALL {
            assert_eq!(Column::from_api_name(column.api_name()), Some(column));
            assert_eq!(Column::from_ui_label(column.ui_label()), Some(column));
        }
    }

    #[test]
    fn parse_accepts_either_spelling() {
        assert_eq!(Column::parse("TODO").unwrap(), Column::NotStarted);
        assert_eq!(Column::parse("Not Started").unwrap(), Column::NotStarted);
        assert_eq!(Column::parse("Done").unwrap(), Column::Done);
        assert!(Column::parse("Icebox").is_err());
    }

    #[test]
    fn index_round_trips() {
        for (i, column) in Column::ALL.iter().enumerate() {
            assert_eq!(column.index(), i);
            assert_eq!(Column::from_index(i), Some(*column));
        }
        assert_eq!(Column::from_index(COLUMN_COUNT), None);
    }

    #[test]
    fn pairs_cover_every_distinct_combination() {
        let pairs: Vec<_> = Column::pairs().collect();
        assert_eq!(pairs.len(), COLUMN_COUNT * (COLUMN_COUNT - 1));
        assert!(pairs.iter().all(|(from, to)| from != to));
        assert!(pairs.contains(&(Column::Done, Column::NotStarted)));
    }

    #[test]
    fn serializes_as_api_name() {
        let json = serde_json::to_string(&Column::NotStarted).unwrap();
        assert_eq!(json, "\"Not Started\"");
        let back: Column = serde_json::from_str("\"Ready for QC\"").unwrap();
        assert_eq!(back, Column::ReadyForQc);
    }
}
