//! REST client for the board API
//!
//! The fixture path that bypasses the UI: boards and tickets are created,
//! mutated and deleted directly against the application's API. Also hosts
//! the readiness probe tests run before opening any browser.

use std::time::{Duration, Instant};

use serde::{Deserialize, Deserializer, Serialize};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::columns::Column;
use crate::config::TargetConfig;
use crate::error::{Error, Result};

pub struct ApiClient {
    http: reqwest::Client,
    base: String,
}

impl ApiClient {
    pub fn new(config: &TargetConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            http,
            base: config.api_url.trim_end_matches('/').to_string(),
        })
    }

    /// One probe against the board listing endpoint.
    pub async fn health(&self) -> Result<()> {
        let resp = self
            .http
            .get(format!("{}/api/boards/", self.base))
            .send()
            .await?;
        check(resp).await?;
        Ok(())
    }

    /// Poll until the application answers, tolerating connection refusals
    /// while it starts.
    pub async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let start = Instant::now();
        let mut attempts = 0usize;

        while start.elapsed() < timeout {
            attempts += 1;
            match self.health().await {
                Ok(()) => return Ok(()),
                Err(Error::Http(e)) if e.is_connect() => {
                    if attempts == 1 {
                        info!("waiting for the application to come up...");
                    }
                }
                Err(e) => warn!("readiness probe failed: {}", e),
            }
            sleep(Duration::from_millis(100)).await;
        }

        Err(Error::Timeout {
            what: format!("application ready after {} probe(s)", attempts),
            after: timeout,
        })
    }

    pub async fn list_boards(&self) -> Result<Vec<BoardRecord>> {
        let resp = self
            .http
            .get(format!("{}/api/boards/", self.base))
            .send()
            .await?;
        Ok(check(resp).await?.json().await?)
    }

    pub async fn create_board(&self, name: &str, description: &str) -> Result<BoardRecord> {
        #[derive(Serialize)]
        struct Body<'a> {
            name: &'a str,
            description: &'a str,
        }

        debug!("creating board {:?}", name);
        let resp = self
            .http
            .post(format!("{}/api/boards/", self.base))
            .json(&Body { name, description })
            .send()
            .await?;
        Ok(check(resp).await?.json().await?)
    }

    pub async fn delete_board(&self, id: &str) -> Result<()> {
        debug!("deleting board {}", id);
        let resp = self
            .http
            .delete(format!("{}/api/boards/{}", self.base, id))
            .send()
            .await?;
        check(resp).await?;
        Ok(())
    }

    pub async fn create_ticket(&self, ticket: &TicketCreate<'_>) -> Result<TicketRecord> {
        debug!("creating ticket {:?} in {}", ticket.title, ticket.current_column);
        let resp = self
            .http
            .post(format!("{}/api/tickets/", self.base))
            .json(ticket)
            .send()
            .await?;
        Ok(check(resp).await?.json().await?)
    }

    pub async fn tickets_for_board(&self, board_id: &str) -> Result<Vec<TicketRecord>> {
        let resp = self
            .http
            .get(format!("{}/api/tickets/", self.base))
            .query(&[("board_id", board_id)])
            .send()
            .await?;
        Ok(check(resp).await?.json().await?)
    }

    pub async fn update_ticket(&self, id: &str, patch: &TicketPatch<'_>) -> Result<TicketRecord> {
        let resp = self
            .http
            .patch(format!("{}/api/tickets/{}", self.base, id))
            .json(patch)
            .send()
            .await?;
        Ok(check(resp).await?.json().await?)
    }

    /// Move a ticket by naming its destination column. The payload carries
    /// the column's display name, never an index or slug.
    pub async fn move_ticket(&self, id: &str, to: Column) -> Result<TicketRecord> {
        #[derive(Serialize)]
        struct Body {
            current_column: Column,
        }

        debug!("moving ticket {} to {}", id, to);
        let resp = self
            .http
            .post(format!("{}/api/tickets/{}/move", self.base, id))
            .json(&Body { current_column: to })
            .send()
            .await?;
        Ok(check(resp).await?.json().await?)
    }

    /// Try to move a ticket to another board through a plain update.
    /// A ticket belongs to one board for life; the application must refuse
    /// the request or ignore the field. Returns the record from an accepted
    /// response, `None` when the request was refused outright.
    pub async fn try_reassign_board(
        &self,
        id: &str,
        board_id: &str,
    ) -> Result<Option<TicketRecord>> {
        #[derive(Serialize)]
        struct Body<'a> {
            board_id: &'a str,
        }

        let resp = self
            .http
            .patch(format!("{}/api/tickets/{}", self.base, id))
            .json(&Body { board_id })
            .send()
            .await?;
        if resp.status().is_success() {
            Ok(Some(resp.json().await?))
        } else {
            debug!("board reassignment refused with {}", resp.status());
            Ok(None)
        }
    }

    pub async fn bulk_update(
        &self,
        ticket_ids: &[&str],
        patch: &TicketPatch<'_>,
    ) -> Result<serde_json::Value> {
        #[derive(Serialize)]
        struct Body<'a> {
            ids: &'a [&'a str],
            update: &'a TicketPatch<'a>,
        }

        let resp = self
            .http
            .post(format!("{}/api/bulk/update", self.base))
            .json(&Body {
                ids: ticket_ids,
                update: patch,
            })
            .send()
            .await?;
        Ok(check(resp).await?.json().await?)
    }
}

/// Turn non-2xx responses into [`Error::Api`] with the body as detail.
async fn check(resp: reqwest::Response) -> Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let detail = resp.text().await.unwrap_or_default();
    let detail = if detail.len() > 300 {
        format!("{}...", &detail[..300])
    } else {
        detail
    };
    Err(Error::Api {
        status: status.as_u16(),
        detail,
    })
}

/// A board as the API reports it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardRecord {
    #[serde(deserialize_with = "flexible_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// A ticket as the API reports it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketRecord {
    #[serde(deserialize_with = "flexible_id")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(deserialize_with = "flexible_id")]
    pub board_id: String,
    pub current_column: Column,
    #[serde(default)]
    pub priority: Option<String>,
}

/// Fields for creating a ticket
#[derive(Debug, Clone, Serialize)]
pub struct TicketCreate<'a> {
    pub title: &'a str,
    pub description: &'a str,
    pub board_id: &'a str,
    pub current_column: Column,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<&'a str>,
}

/// Partial ticket update; unset fields are omitted from the payload
#[derive(Debug, Clone, Default, Serialize)]
pub struct TicketPatch<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_column: Option<Column>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<&'a str>,
}

/// Accept ids as strings or numbers; the harness handles them as strings.
fn flexible_id<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    match value {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "id must be a string or number, got {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_parse_from_numbers_and_strings() {
        let numeric: BoardRecord =
            serde_json::from_str(r#"{"id": 42, "name": "Sprint 9"}"#).unwrap();
        assert_eq!(numeric.id, "42");

        let textual: BoardRecord =
            serde_json::from_str(r#"{"id": "b-42", "name": "Sprint 9"}"#).unwrap();
        assert_eq!(textual.id, "b-42");
    }

    #[test]
    fn ticket_record_parses_column_by_api_name() {
        let json = r#"{
            "id": 7,
            "title": "Fix login",
            "board_id": "b-1",
            "current_column": "Not Started"
        }"#;
        let ticket: TicketRecord = serde_json::from_str(json).unwrap();
        assert_eq!(ticket.current_column, Column::NotStarted);
        assert_eq!(ticket.board_id, "b-1");
    }

    #[test]
    fn patch_omits_unset_fields() {
        let patch = TicketPatch {
            current_column: Some(Column::Done),
            ..Default::default()
        };
        let json = serde_json::to_string(&patch).unwrap();
        assert_eq!(json, r#"{"current_column":"Done"}"#);
    }

    #[test]
    fn ticket_create_serializes_api_column_name() {
        let create = TicketCreate {
            title: "Fix login",
            description: "",
            board_id: "b-1",
            current_column: Column::NotStarted,
            priority: None,
        };
        let json = serde_json::to_value(&create).unwrap();
        assert_eq!(json["current_column"], "Not Started");
        assert!(json.get("priority").is_none());
    }
}
