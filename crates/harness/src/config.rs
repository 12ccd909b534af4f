//! Target configuration
//!
//! One place for every URL, browser and timeout the harness uses. All values
//! can come from `BOARDWALK_*` environment variables so CI and local runs
//! point at the same knobs.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};

/// Environment variable naming the application under test.
pub const ENV_BASE_URL: &str = "BOARDWALK_BASE_URL";

/// Configuration for one target application
#[derive(Debug, Clone)]
pub struct TargetConfig {
    /// URL the browser navigates to
    pub base_url: String,

    /// URL the fixture API client talks to (defaults to `base_url`)
    pub api_url: String,

    /// Browser engine to launch
    pub browser: Browser,

    /// Run the browser headless
    pub headless: bool,

    /// Viewport dimensions
    pub viewport_width: u32,
    pub viewport_height: u32,

    /// Directory for screenshots and other failure artifacts
    pub artifacts_dir: PathBuf,

    /// All timing knobs
    pub timeouts: Timeouts,
}

impl Default for TargetConfig {
    fn default() -> Self {
        let base = "http://127.0.0.1:3000".to_string();
        Self {
            api_url: base.clone(),
            base_url: base,
            browser: Browser::Chromium,
            headless: true,
            viewport_width: 1280,
            viewport_height: 720,
            artifacts_dir: PathBuf::from("test-results"),
            timeouts: Timeouts::default(),
        }
    }
}

impl TargetConfig {
    /// Config pointing base and API URLs at one address.
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            api_url: base_url.clone(),
            base_url,
            ..Self::default()
        }
    }

    /// Build a config from `BOARDWALK_*` environment variables.
    ///
    /// `BOARDWALK_BASE_URL` is required; everything else falls back to
    /// defaults.
    pub fn from_env() -> Result<Self> {
        match Self::from_env_opt() {
            Some(config) => Ok(config),
            None => Err(Error::Config(format!("{} is not set", ENV_BASE_URL))),
        }
    }

    /// Like [`TargetConfig::from_env`], but returns `None` when the target is
    /// not configured. Tests use this to skip gracefully on machines without
    /// a running application.
    pub fn from_env_opt() -> Option<Self> {
        let base_url = std::env::var(ENV_BASE_URL).ok()?;
        let mut config = Self {
            api_url: std::env::var("BOARDWALK_API_URL").unwrap_or_else(|_| base_url.clone()),
            base_url,
            ..Self::default()
        };

        if let Ok(browser) = std::env::var("BOARDWALK_BROWSER") {
            config.browser = Browser::parse(&browser);
        }
        if let Ok(headless) = std::env::var("BOARDWALK_HEADLESS") {
            config.headless = headless != "0" && headless != "false";
        }
        if let Ok(dir) = std::env::var("BOARDWALK_ARTIFACTS_DIR") {
            config.artifacts_dir = PathBuf::from(dir);
        }

        Some(config)
    }

    /// Change the base URL. The API URL follows it unless it was overridden
    /// with [`TargetConfig::with_api_url`].
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        let url = url.into();
        if self.api_url == self.base_url {
            self.api_url = url.clone();
        }
        self.base_url = url;
        self
    }

    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    pub fn with_browser(mut self, browser: Browser) -> Self {
        self.browser = browser;
        self
    }

    pub fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    pub fn with_viewport(mut self, width: u32, height: u32) -> Self {
        self.viewport_width = width;
        self.viewport_height = height;
        self
    }

    pub fn with_artifacts_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.artifacts_dir = dir.into();
        self
    }
}

/// Browser engine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Browser {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl Browser {
    pub fn as_str(&self) -> &'static str {
        match self {
            Browser::Chromium => "chromium",
            Browser::Firefox => "firefox",
            Browser::Webkit => "webkit",
        }
    }

    /// Parse a browser name, defaulting to chromium for unknown values.
    pub fn parse(name: &str) -> Self {
        match name {
            "firefox" => Browser::Firefox,
            "webkit" => Browser::Webkit,
            _ => Browser::Chromium,
        }
    }
}

/// Timing knobs, kept together so no test hardcodes a sleep
#[derive(Debug, Clone, Copy)]
pub struct Timeouts {
    /// Waiting for an element to appear or change
    pub element: Duration,

    /// Waiting for a fixture (board, card) to be confirmed created
    pub creation: Duration,

    /// Ceiling on the pause between the last drag move and releasing the
    /// mouse button; the drop zone usually signals readiness sooner
    pub drag_settle: Duration,

    /// Waiting for all clients to agree on board state
    pub converge: Duration,

    /// Extra window after a reload during convergence checks
    pub reload_grace: Duration,

    /// How far back captured requests count as belonging to the current
    /// operation
    pub correlation: Duration,

    /// Waiting for the browser driver process to come up
    pub driver_startup: Duration,

    /// Polling interval for all wait loops
    pub poll_interval: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            element: Duration::from_secs(5),
            creation: Duration::from_secs(15),
            drag_settle: Duration::from_millis(250),
            converge: Duration::from_secs(10),
            reload_grace: Duration::from_secs(5),
            correlation: Duration::from_secs(10),
            driver_startup: Duration::from_secs(30),
            poll_interval: Duration::from_millis(100),
        }
    }
}
