//! Microsoft Graph mailbox: lists `/me/messages`, replies with `/me/sendMail`.
//!
//! Takes an already-issued bearer token; acquiring one is left to the
//! deployment.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::config::{env_parse, env_required};
use crate::error::{ConfigError, MailError};
use crate::mail::MailSource;
use crate::pipeline::types::RawMessage;

/// Default Graph API root.
pub const DEFAULT_GRAPH_BASE_URL: &str = "https://graph.microsoft.com/v1.0";

/// Default number of messages fetched per batch.
pub const DEFAULT_FETCH_LIMIT: u32 = 25;

const SELECT_FIELDS: &str = "id,from,subject,bodyPreview,receivedDateTime";

// ── Configuration ───────────────────────────────────────────────────

#[derive(Debug)]
pub struct GraphConfig {
    pub base_url: String,
    pub access_token: SecretString,
    pub fetch_limit: u32,
}

impl GraphConfig {
    /// Build config from environment variables. `GRAPH_ACCESS_TOKEN` is required.
    pub fn from_env() -> Result<Self, ConfigError> {
        let access_token = env_required("GRAPH_ACCESS_TOKEN")?;
        let base_url = std::env::var("GRAPH_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_GRAPH_BASE_URL.to_string());
        let fetch_limit = env_parse("GRAPH_FETCH_LIMIT").unwrap_or(DEFAULT_FETCH_LIMIT);

        Ok(Self {
            base_url,
            access_token: SecretString::from(access_token),
            fetch_limit,
        })
    }
}

// ── Wire types ──────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct MessageList {
    #[serde(default)]
    value: Vec<GraphMessage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphMessage {
    #[serde(default)]
    id: String,
    from: Option<Recipient>,
    #[serde(default)]
    subject: Option<String>,
    #[serde(default)]
    body_preview: String,
    #[serde(default)]
    received_date_time: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Recipient {
    email_address: EmailAddress,
}

#[derive(Debug, Deserialize)]
struct EmailAddress {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    address: Option<String>,
}

impl GraphMessage {
    fn into_raw(self) -> Result<RawMessage, MailError> {
        let from = self.from.map(|r| r.email_address);
        let sender = from
            .as_ref()
            .and_then(|a| a.address.clone())
            .filter(|a| !a.is_empty())
            .ok_or_else(|| {
                MailError::InvalidMessage(format!("message {} has no sender address", self.id))
            })?;
        let received_at = self
            .received_date_time
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|d| d.with_timezone(&Utc));

        Ok(RawMessage {
            id: self.id,
            sender,
            sender_name: from.and_then(|a| a.name),
            subject: self.subject.unwrap_or_default(),
            body_preview: self.body_preview,
            received_at,
        })
    }
}

// ── Mailbox ─────────────────────────────────────────────────────────

pub struct GraphMailbox {
    config: GraphConfig,
    client: reqwest::Client,
}

impl GraphMailbox {
    pub fn new(config: GraphConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/{path}", self.config.base_url.trim_end_matches('/'))
    }

    fn fetch_error(reason: impl Into<String>) -> MailError {
        MailError::FetchFailed {
            source_name: "graph".into(),
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl MailSource for GraphMailbox {
    fn name(&self) -> &str {
        "graph"
    }

    async fn fetch_messages(&self) -> Result<Vec<RawMessage>, MailError> {
        let top = self.config.fetch_limit.to_string();
        let resp = self
            .client
            .get(self.api_url("me/messages"))
            .bearer_auth(self.config.access_token.expose_secret())
            .query(&[("$select", SELECT_FIELDS), ("$top", top.as_str())])
            .send()
            .await
            .map_err(|e| Self::fetch_error(e.to_string()))?;

        if resp.status() != StatusCode::OK {
            return Err(Self::fetch_error(format!(
                "messages endpoint returned {}",
                resp.status()
            )));
        }

        let list: MessageList = resp
            .json()
            .await
            .map_err(|e| Self::fetch_error(format!("invalid message list: {e}")))?;

        let mut messages = Vec::with_capacity(list.value.len());
        for item in list.value {
            match item.into_raw() {
                Ok(msg) => messages.push(msg),
                Err(e) => warn!(error = %e, "Skipping malformed Graph message"),
            }
        }

        debug!(count = messages.len(), "Fetched messages from Graph");
        Ok(messages)
    }

    async fn send_reply(
        &self,
        recipient: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), MailError> {
        let payload = serde_json::json!({
            "message": {
                "subject": subject,
                "body": {
                    "contentType": "Text",
                    "content": body,
                },
                "toRecipients": [
                    { "emailAddress": { "address": recipient } }
                ],
            }
        });

        let resp = self
            .client
            .post(self.api_url("me/sendMail"))
            .bearer_auth(self.config.access_token.expose_secret())
            .json(&payload)
            .send()
            .await
            .map_err(|e| MailError::SendFailed {
                recipient: recipient.to_string(),
                reason: e.to_string(),
            })?;

        if resp.status() != StatusCode::ACCEPTED {
            let status = resp.status();
            let detail = resp.text().await.unwrap_or_default();
            return Err(MailError::SendFailed {
                recipient: recipient.to_string(),
                reason: format!("sendMail returned {status}: {detail}"),
            });
        }

        info!(recipient, "Reply sent via Graph");
        Ok(())
    }
}
