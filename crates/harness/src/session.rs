//! Browser sessions
//!
//! One [`Session`] is one browser context with one page: an independent
//! client with its own cookies, cache and network stack. The consistency
//! checker opens several of these against the same board.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::Timeouts;
use crate::driver::Driver;
use crate::error::Result;
use crate::locator::{BoundingBox, Locator};

pub struct Session {
    driver: Driver,
    ctx: String,
    base_url: String,
    timeouts: Timeouts,
}

#[derive(Serialize)]
struct LocatorArgs<'a> {
    context: &'a str,
    locator: &'a Locator,
    #[serde(rename = "timeoutMs")]
    timeout_ms: u64,
}

impl Session {
    pub(crate) fn new(driver: Driver, ctx: String, base_url: String, timeouts: Timeouts) -> Self {
        Self {
            driver,
            ctx,
            base_url,
            timeouts,
        }
    }

    pub fn timeouts(&self) -> &Timeouts {
        &self.timeouts
    }

    pub(crate) fn driver(&self) -> &Driver {
        &self.driver
    }

    pub(crate) fn context_id(&self) -> &str {
        &self.ctx
    }

    fn locator_args<'a>(&'a self, locator: &'a Locator) -> LocatorArgs<'a> {
        LocatorArgs {
            context: &self.ctx,
            locator,
            timeout_ms: self.timeouts.element.as_millis() as u64,
        }
    }

    /// Navigate to a path relative to the configured base URL (absolute URLs
    /// pass through untouched).
    pub async fn goto(&self, path: &str) -> Result<()> {
        #[derive(Serialize)]
        struct Args<'a> {
            context: &'a str,
            url: String,
        }

        let url = join_url(&self.base_url, path);
        debug!("goto {}", url);
        self.driver
            .execute_void("goto", Some(Args {
                context: &self.ctx,
                url,
            }))
            .await
    }

    pub async fn reload(&self) -> Result<()> {
        #[derive(Serialize)]
        struct Args<'a> {
            context: &'a str,
        }

        debug!("reload ({})", self.ctx);
        self.driver
            .execute_void("reload", Some(Args { context: &self.ctx }))
            .await
    }

    pub async fn click(&self, locator: &Locator) -> Result<()> {
        self.driver
            .execute_void("click", Some(self.locator_args(locator)))
            .await
    }

    pub async fn fill(&self, locator: &Locator, value: &str) -> Result<()> {
        #[derive(Serialize)]
        struct Args<'a> {
            context: &'a str,
            locator: &'a Locator,
            value: &'a str,
            #[serde(rename = "timeoutMs")]
            timeout_ms: u64,
        }

        self.driver
            .execute_void(
                "fill",
                Some(Args {
                    context: &self.ctx,
                    locator,
                    value,
                    timeout_ms: self.timeouts.element.as_millis() as u64,
                }),
            )
            .await
    }

    pub async fn hover(&self, locator: &Locator) -> Result<()> {
        self.driver
            .execute_void("hover", Some(self.locator_args(locator)))
            .await
    }

    /// Press a key at page level (e.g. "Escape", "Enter").
    pub async fn press(&self, key: &str) -> Result<()> {
        #[derive(Serialize)]
        struct Args<'a> {
            context: &'a str,
            key: &'a str,
        }

        self.driver
            .execute_void("press", Some(Args {
                context: &self.ctx,
                key,
            }))
            .await
    }

    /// Visible text of the first matching element.
    pub async fn text(&self, locator: &Locator) -> Result<String> {
        #[derive(Deserialize)]
        struct Reply {
            text: String,
        }

        let reply: Reply = self
            .driver
            .execute("text", Some(self.locator_args(locator)))
            .await?;
        Ok(reply.text)
    }

    /// Visible text of every matching element, in DOM order.
    pub async fn texts(&self, locator: &Locator) -> Result<Vec<String>> {
        #[derive(Deserialize)]
        struct Reply {
            texts: Vec<String>,
        }

        let reply: Reply = self
            .driver
            .execute("texts", Some(self.locator_args(locator)))
            .await?;
        Ok(reply.texts)
    }

    pub async fn count(&self, locator: &Locator) -> Result<usize> {
        #[derive(Deserialize)]
        struct Reply {
            count: usize,
        }

        let reply: Reply = self
            .driver
            .execute("count", Some(self.locator_args(locator)))
            .await?;
        Ok(reply.count)
    }

    pub async fn is_visible(&self, locator: &Locator) -> Result<bool> {
        #[derive(Deserialize)]
        struct Reply {
            visible: bool,
        }

        let reply: Reply = self
            .driver
            .execute("visible", Some(self.locator_args(locator)))
            .await?;
        Ok(reply.visible)
    }

    pub async fn attr(&self, locator: &Locator, name: &str) -> Result<Option<String>> {
        #[derive(Serialize)]
        struct Args<'a> {
            context: &'a str,
            locator: &'a Locator,
            name: &'a str,
            #[serde(rename = "timeoutMs")]
            timeout_ms: u64,
        }

        #[derive(Deserialize)]
        struct Reply {
            value: Option<String>,
        }

        let reply: Reply = self
            .driver
            .execute(
                "attr",
                Some(Args {
                    context: &self.ctx,
                    locator,
                    name,
                    timeout_ms: self.timeouts.element.as_millis() as u64,
                }),
            )
            .await?;
        Ok(reply.value)
    }

    pub async fn bbox(&self, locator: &Locator) -> Result<BoundingBox> {
        self.driver
            .execute("bbox", Some(self.locator_args(locator)))
            .await
    }

    /// Wait until the element is visible (the default element timeout).
    pub async fn wait_for(&self, locator: &Locator) -> Result<()> {
        self.wait_for_state(locator, "visible").await
    }

    /// Wait for a specific element state: visible, hidden, attached, detached.
    pub async fn wait_for_state(&self, locator: &Locator, state: &str) -> Result<()> {
        #[derive(Serialize)]
        struct Args<'a> {
            context: &'a str,
            locator: &'a Locator,
            state: &'a str,
            #[serde(rename = "timeoutMs")]
            timeout_ms: u64,
        }

        self.driver
            .execute_void(
                "wait-for",
                Some(Args {
                    context: &self.ctx,
                    locator,
                    state,
                    timeout_ms: self.timeouts.element.as_millis() as u64,
                }),
            )
            .await
    }

    pub async fn mouse_move(&self, x: f64, y: f64, steps: u32) -> Result<()> {
        #[derive(Serialize)]
        struct Args<'a> {
            context: &'a str,
            x: f64,
            y: f64,
            steps: u32,
        }

        self.driver
            .execute_void("mouse-move", Some(Args {
                context: &self.ctx,
                x,
                y,
                steps,
            }))
            .await
    }

    pub async fn mouse_down(&self) -> Result<()> {
        #[derive(Serialize)]
        struct Args<'a> {
            context: &'a str,
        }

        self.driver
            .execute_void("mouse-down", Some(Args { context: &self.ctx }))
            .await
    }

    pub async fn mouse_up(&self) -> Result<()> {
        #[derive(Serialize)]
        struct Args<'a> {
            context: &'a str,
        }

        self.driver
            .execute_void("mouse-up", Some(Args { context: &self.ctx }))
            .await
    }

    /// Evaluate a JavaScript expression in the page, returning its
    /// JSON-serializable value.
    pub async fn eval(&self, expression: &str) -> Result<serde_json::Value> {
        #[derive(Serialize)]
        struct Args<'a> {
            context: &'a str,
            expression: &'a str,
        }

        #[derive(Deserialize)]
        struct Reply {
            #[serde(default)]
            value: serde_json::Value,
        }

        let reply: Reply = self
            .driver
            .execute("eval", Some(Args {
                context: &self.ctx,
                expression,
            }))
            .await?;
        Ok(reply.value)
    }

    pub async fn screenshot(&self, path: &Path, full_page: bool) -> Result<()> {
        #[derive(Serialize)]
        struct Args<'a> {
            context: &'a str,
            path: String,
            #[serde(rename = "fullPage")]
            full_page: bool,
        }

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        self.driver
            .execute_void(
                "screenshot",
                Some(Args {
                    context: &self.ctx,
                    path: path.to_string_lossy().into_owned(),
                    full_page,
                }),
            )
            .await
    }

    /// Cut or restore this session's network. Other sessions are unaffected.
    pub async fn set_offline(&self, offline: bool) -> Result<()> {
        #[derive(Serialize)]
        struct Args<'a> {
            context: &'a str,
            offline: bool,
        }

        self.driver
            .execute_void("set-offline", Some(Args {
                context: &self.ctx,
                offline,
            }))
            .await
    }

    pub async fn close(&self) -> Result<()> {
        #[derive(Serialize)]
        struct Args<'a> {
            context: &'a str,
        }

        self.driver
            .execute_void("close-context", Some(Args { context: &self.ctx }))
            .await
    }
}

fn join_url(base: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_string();
    }
    let base = base.trim_end_matches('/');
    if path.starts_with('/') {
        format!("{}{}", base, path)
    } else {
        format!("{}/{}", base, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_url_handles_slashes() {
        assert_eq!(
            join_url("http://127.0.0.1:3000/", "/boards"),
            "http://127.0.0.1:3000/boards"
        );
        assert_eq!(
            join_url("http://127.0.0.1:3000", "boards"),
            "http://127.0.0.1:3000/boards"
        );
    }

    #[test]
    fn join_url_passes_absolute_urls_through() {
        assert_eq!(
            join_url("http://127.0.0.1:3000", "https://elsewhere/x"),
            "https://elsewhere/x"
        );
    }
}
