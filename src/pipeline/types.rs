//! Shared types for the triage pipeline.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ResolveError, ResolveErrorKind};

/// Sentinel for a field the extractor could not find.
pub const NOT_AVAILABLE: &str = "N/A";

// ── Inbound message ─────────────────────────────────────────────────

/// One message as handed over by a mail source.
///
/// `body_preview` is whatever the source exposes: possibly truncated,
/// possibly HTML-stripped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawMessage {
    /// Source-native message id.
    pub id: String,
    /// Sender address; replies go here.
    pub sender: String,
    /// Display name of the sender, if the source provides one.
    pub sender_name: Option<String>,
    pub subject: String,
    pub body_preview: String,
    pub received_at: Option<DateTime<Utc>>,
}

// ── Extraction result ───────────────────────────────────────────────

/// Structured identification pulled out of one message body.
///
/// Fields hold [`NOT_AVAILABLE`] when nothing matched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartRequest {
    pub identifier: String,
    pub category: String,
}

impl PartRequest {
    pub fn new(identifier: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            category: category.into(),
        }
    }

    pub fn has_identifier(&self) -> bool {
        self.identifier != NOT_AVAILABLE
    }

    pub fn has_category(&self) -> bool {
        self.category != NOT_AVAILABLE
    }
}

// ── Routing outcome ─────────────────────────────────────────────────

/// Why a message was left for manual handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationReason {
    /// No category keyword in the body.
    NoCategory,
    /// A category matched but no vendor claims it.
    NoVendor,
    /// The vendor credential is missing.
    ConfigError,
    /// The vendor service failed or could not be reached.
    LookupError,
}

impl EscalationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoCategory => "no category matched",
            Self::NoVendor => "no vendor for category",
            Self::ConfigError => "config error",
            Self::LookupError => "lookup error",
        }
    }
}

impl fmt::Display for EscalationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&ResolveError> for EscalationReason {
    fn from(err: &ResolveError) -> Self {
        match err.kind() {
            ResolveErrorKind::Config => Self::ConfigError,
            ResolveErrorKind::Lookup => Self::LookupError,
        }
    }
}

/// Terminal result of routing one message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RoutingOutcome {
    /// A part number was found; the reply is ready to send.
    Resolved {
        part_number: String,
        reply_subject: String,
        reply_body: String,
        recipient: String,
    },
    /// Needs a human.
    Unresolved { reason: EscalationReason },
}

impl RoutingOutcome {
    /// Short label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Resolved { .. } => "resolved",
            Self::Unresolved { .. } => "unresolved",
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved { .. })
    }

    pub fn escalation_reason(&self) -> Option<EscalationReason> {
        match self {
            Self::Unresolved { reason } => Some(*reason),
            Self::Resolved { .. } => None,
        }
    }
}

// ── Processed message ───────────────────────────────────────────────

/// What happened to the auto-reply for a resolved message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyStatus {
    Sent,
    Failed(String),
}

/// Result of processing one message through the pipeline.
#[derive(Debug, Clone)]
pub struct ProcessedMessage {
    pub message: RawMessage,
    pub request: PartRequest,
    pub outcome: RoutingOutcome,
    /// `None` for unresolved messages: nothing was sent.
    pub reply: Option<ReplyStatus>,
}

/// Everything one batch run produced, in fetch order.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub messages: Vec<ProcessedMessage>,
}

impl BatchReport {
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn resolved_count(&self) -> usize {
        self.messages
            .iter()
            .filter(|m| m.outcome.is_resolved())
            .count()
    }

    pub fn escalated_count(&self) -> usize {
        self.len() - self.resolved_count()
    }

    /// Resolved messages whose reply could not be delivered.
    pub fn delivery_failures(&self) -> impl Iterator<Item = &ProcessedMessage> {
        self.messages
            .iter()
            .filter(|m| matches!(m.reply, Some(ReplyStatus::Failed(_))))
    }
}
