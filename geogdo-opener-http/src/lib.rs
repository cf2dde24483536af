//! Opener adapter for door controllers with an HTTP API.
//!
//! Each action maps to a configured request (method, endpoint, body); door
//! status is read from a status endpoint returning the state as plain text.
//! The same start/stop-state contract applies as for the bus adapter: skip
//! when the door is not in the required start state, and poll status until
//! the required stop state appears or the timeout runs out.

use std::time::Duration;

use anyhow::Context as _;
use async_trait::async_trait;
use geogdo_opener_api::{Opener, OpenerError, StatusHint};
use geogdo_types::Action;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Default ceiling on waiting for the door to report its target state.
pub const DEFAULT_STATUS_TIMEOUT: Duration = Duration::from_secs(30);

/// Pause between status polls while waiting for a state change.
const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// One configured HTTP door command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpCommand {
    /// Matches [`Action::as_str`], so `open` or `close`.
    pub name: String,
    /// Path under the controller's base URL, e.g. `/command/open`.
    pub endpoint: String,
    /// HTTP method, e.g. `POST`.
    pub http_method: String,
    /// Request body sent verbatim; may be empty.
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub required_start_state: String,
    #[serde(default)]
    pub required_stop_state: String,
    /// Seconds to wait for the stop state, overriding the opener-wide
    /// timeout for this command only.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// Connection settings for one controller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpOpenerSettings {
    /// Scheme, host and port, e.g. `http://192.168.1.40:8080`.
    pub base_url: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// Path returning the door state as plain text, e.g. `/status`.
    #[serde(default)]
    pub status_endpoint: String,
    pub commands: Vec<HttpCommand>,
}

pub struct HttpOpener {
    name: String,
    settings: HttpOpenerSettings,
    status_timeout: Duration,
    client: reqwest::Client,
}

impl HttpOpener {
    pub fn new(name: impl Into<String>, settings: HttpOpenerSettings, status_timeout: Duration) -> Self {
        Self {
            name: name.into(),
            settings,
            status_timeout,
            client: reqwest::Client::new(),
        }
    }

    fn command_for(&self, action: Action) -> Option<&HttpCommand> {
        self.settings
            .commands
            .iter()
            .find(|c| c.name == action.as_str())
    }

    fn url_for(&self, endpoint: &str) -> String {
        let base = self.settings.base_url.trim_end_matches('/');
        let path = endpoint.trim_start_matches('/');
        format!("{base}/{path}")
    }

    fn request(&self, method: &str, url: &str) -> anyhow::Result<reqwest::RequestBuilder> {
        let method = reqwest::Method::from_bytes(method.as_bytes())
            .with_context(|| format!("invalid http method `{method}`"))?;
        let mut req = self.client.request(method, url);
        if !self.settings.username.is_empty() {
            req = req.basic_auth(&self.settings.username, Some(&self.settings.password));
        }
        Ok(req)
    }

    /// Current door state from the status endpoint, trimmed.
    async fn fetch_state(&self) -> anyhow::Result<String> {
        let url = self.url_for(&self.settings.status_endpoint);
        let resp = self
            .request("GET", &url)?
            .send()
            .await
            .with_context(|| format!("status request to {url} failed"))?
            .error_for_status()
            .context("status endpoint returned an error")?;
        let body = resp.text().await.context("reading status body")?;
        Ok(body.trim().to_string())
    }

    fn has_status(&self) -> bool {
        !self.settings.status_endpoint.is_empty()
    }

    fn effective_timeout(&self, cmd: &HttpCommand) -> Duration {
        cmd.timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(self.status_timeout)
    }

    async fn await_state(&self, expected: &str, timeout: Duration) -> Result<(), OpenerError> {
        let deadline = Instant::now() + timeout;
        loop {
            let last_state = self.fetch_state().await.map_err(OpenerError::Status)?;
            if last_state == expected {
                return Ok(());
            }
            if Instant::now() + POLL_INTERVAL > deadline {
                // The status endpoint says nothing about availability or
                // obstruction, so the hint stays generic.
                return Err(OpenerError::Timeout {
                    expected: expected.to_string(),
                    last_state,
                    hint: StatusHint::Unknown,
                });
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}

#[async_trait]
impl Opener for HttpOpener {
    fn name(&self) -> &str {
        &self.name
    }

    async fn set_state(&self, action: Action) -> Result<(), OpenerError> {
        let cmd = self
            .command_for(action)
            .ok_or(OpenerError::NoCommand(action))?
            .clone();

        if self.has_status() && !cmd.required_start_state.is_empty() {
            let current = self.fetch_state().await.map_err(OpenerError::Status)?;
            if current != cmd.required_start_state {
                warn!(
                    door = %self.name,
                    %action,
                    required = %cmd.required_start_state,
                    %current,
                    "door is not in the required start state, skipping command"
                );
                return Ok(());
            }
        }

        let url = self.url_for(&cmd.endpoint);
        debug!(door = %self.name, method = %cmd.http_method, %url, "sending door command");
        let req = self
            .request(&cmd.http_method, &url)
            .map_err(|source| OpenerError::Send { action, source })?;
        req.body(cmd.body.clone())
            .send()
            .await
            .map_err(anyhow::Error::from)
            .and_then(|r| r.error_for_status().map_err(anyhow::Error::from))
            .map_err(|source| OpenerError::Send { action, source })?;

        if !self.has_status() || cmd.required_stop_state.is_empty() {
            info!(door = %self.name, %action, "command sent, no status to await");
            return Ok(());
        }

        self.await_state(&cmd.required_stop_state, self.effective_timeout(&cmd))
            .await?;
        info!(door = %self.name, %action, state = %cmd.required_stop_state, "door reached target state");
        Ok(())
    }
}
