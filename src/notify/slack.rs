//! Slack incoming-webhook transport.

use anyhow::{Context, Result, anyhow, bail};
use serde::Serialize;

use crate::SlackConfig;
use crate::utils::config::SlackConsts;

/// Webhook message. `username` and `icon_url` are left out when empty.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct SlackMsg {
    pub channel: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub username: String,
    pub text: String,
    pub parse: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub icon_url: String,
}

impl SlackMsg {
    /// Message template from config; only `text` varies per notification.
    pub fn template(conf: &SlackConfig) -> Self {
        Self {
            channel: conf.channel.clone(),
            username: conf.username.clone(),
            text: String::new(),
            parse: SlackConsts::PARSE_MODE.to_string(),
            icon_url: conf.icon_url.clone(),
        }
    }

    pub fn with_text(&self, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..self.clone()
        }
    }

    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self).context("encode slack message")
    }
}

/// Delivers one message. Anything but a confirmed delivery is an `Err`.
pub trait Transport: Send + Sync {
    fn post(&self, msg: &SlackMsg) -> Result<()>;
}

/// POSTs `payload=<json>` form-encoded to the webhook URL; only HTTP 200 counts as delivered.
pub struct Webhook {
    url: String,
    agent: ureq::Agent,
}

impl Webhook {
    pub fn new(url: impl Into<String>) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(SlackConsts::REQUEST_TIMEOUT)
            .build();
        Self {
            url: url.into(),
            agent,
        }
    }
}

impl Transport for Webhook {
    fn post(&self, msg: &SlackMsg) -> Result<()> {
        let encoded = msg.encode()?;
        let resp = self
            .agent
            .post(&self.url)
            .send_form(&[(SlackConsts::PAYLOAD_FIELD, encoded.as_str())])
            .map_err(|e| match e {
                ureq::Error::Status(code, _) => anyhow!("webhook returned HTTP {code}"),
                ureq::Error::Transport(t) => anyhow!("webhook unreachable: {t}"),
            })?;
        if resp.status() != 200 {
            bail!("webhook returned HTTP {}", resp.status());
        }
        Ok(())
    }
}
