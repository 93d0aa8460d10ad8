//! Orchestrator: routes each message to a vendor and decides between
//! auto-reply and escalation.
//!
//! Per message:
//! 1. `extractor::extract()` → `PartRequest`
//! 2. no category → escalate
//! 3. `VendorRegistry::resolver_for()` → no vendor → escalate
//! 4. `PartResolver::resolve()` → error → escalate, part number → reply
//!
//! Messages are independent; nothing carries over from one to the next.
//! Escalation is reported through logging only, the mailbox is never touched.

use std::collections::HashSet;

use secrecy::SecretString;
use tracing::{debug, error, info, warn};

use crate::config::RunConfig;
use crate::error::MailError;
use crate::mail::MailSource;
use crate::pipeline::extractor;
use crate::pipeline::registry::VendorRegistry;
use crate::pipeline::types::{
    BatchReport, EscalationReason, PartRequest, ProcessedMessage, RawMessage, ReplyStatus,
    RoutingOutcome,
};

/// Drives the extraction-and-routing pipeline for message batches.
pub struct Orchestrator {
    config: RunConfig,
    registry: VendorRegistry,
}

impl Orchestrator {
    pub fn new(config: RunConfig, registry: VendorRegistry) -> Self {
        Self { config, registry }
    }

    /// Extract and route one message. Does not send anything.
    pub async fn process(&self, message: &RawMessage) -> (PartRequest, RoutingOutcome) {
        let request = extractor::extract(&message.body_preview);
        let outcome = self.route(&request, &message.sender).await;
        (request, outcome)
    }

    /// Route an already-extracted request.
    pub async fn route(&self, request: &PartRequest, recipient: &str) -> RoutingOutcome {
        if !request.has_category() {
            return unresolved(EscalationReason::NoCategory);
        }

        let Some(vendor) = self.registry.resolver_for(&request.category) else {
            debug!(category = %request.category, "No vendor claims category");
            return unresolved(EscalationReason::NoVendor);
        };

        let Some(resolver) = self.registry.resolver(vendor) else {
            warn!(vendor = %vendor, "Vendor classified but no resolver registered");
            return unresolved(EscalationReason::NoVendor);
        };

        let empty = SecretString::from(String::new());
        let credential = self
            .config
            .credentials
            .get(vendor.credential())
            .unwrap_or(&empty);

        match resolver.resolve(&request.identifier, credential).await {
            Ok(part_number) => {
                let reply_subject = format!("Quote for {}", request.category);
                let reply_body = format!(
                    "The part number for your {} is {}.",
                    request.category, part_number
                );
                RoutingOutcome::Resolved {
                    part_number,
                    reply_subject,
                    reply_body,
                    recipient: recipient.to_string(),
                }
            }
            Err(e) => {
                warn!(
                    vendor = %vendor,
                    identifier = %request.identifier,
                    error = %e,
                    "Part lookup failed"
                );
                unresolved(EscalationReason::from(&e))
            }
        }
    }

    /// Fetch one batch from `source`, route every message in order and send
    /// the replies for resolved ones.
    ///
    /// Only a failed fetch is an error. Individual lookup or delivery
    /// failures are recorded in the report and the batch carries on.
    pub async fn run_batch(&self, source: &dyn MailSource) -> Result<BatchReport, MailError> {
        let messages = self.fetch(source).await?;
        Ok(self.process_all(source, messages).await)
    }

    /// [`Orchestrator::run_batch`] for repeated polls: messages whose id is
    /// already in `seen` are skipped, and every processed id is added.
    pub async fn run_new(
        &self,
        source: &dyn MailSource,
        seen: &mut HashSet<String>,
    ) -> Result<BatchReport, MailError> {
        let mut messages = self.fetch(source).await?;
        let fetched = messages.len();
        messages.retain(|m| seen.insert(m.id.clone()));
        if messages.len() < fetched {
            debug!(
                source = source.name(),
                skipped = fetched - messages.len(),
                "Skipping already processed messages"
            );
        }
        Ok(self.process_all(source, messages).await)
    }

    async fn fetch(&self, source: &dyn MailSource) -> Result<Vec<RawMessage>, MailError> {
        source.fetch_messages().await.map_err(|e| {
            error!(source = source.name(), error = %e, "Could not fetch messages");
            e
        })
    }

    async fn process_all(&self, source: &dyn MailSource, messages: Vec<RawMessage>) -> BatchReport {
        info!(source = source.name(), count = messages.len(), "Processing message batch");

        let mut report = BatchReport {
            messages: Vec::with_capacity(messages.len()),
        };

        for message in messages {
            info!(
                id = %message.id,
                sender = %message.sender,
                subject = %message.subject,
                preview_len = message.body_preview.len(),
                "Processing message"
            );

            let (request, outcome) = self.process(&message).await;
            debug!(id = %message.id, outcome = outcome.label(), "Routed message");
            let reply = self.dispatch(source, &message, &request, &outcome).await;

            report.messages.push(ProcessedMessage {
                message,
                request,
                outcome,
                reply,
            });
        }

        info!(
            total = report.len(),
            resolved = report.resolved_count(),
            escalated = report.escalated_count(),
            "Batch processing complete"
        );
        report
    }

    /// Send the reply for a resolved outcome, or report the escalation.
    async fn dispatch(
        &self,
        source: &dyn MailSource,
        message: &RawMessage,
        request: &PartRequest,
        outcome: &RoutingOutcome,
    ) -> Option<ReplyStatus> {
        match outcome {
            RoutingOutcome::Resolved {
                part_number,
                reply_subject,
                reply_body,
                recipient,
            } => {
                info!(
                    id = %message.id,
                    part_number = %part_number,
                    "Resolved part, sending reply"
                );
                match source.send_reply(recipient, reply_subject, reply_body).await {
                    Ok(()) => Some(ReplyStatus::Sent),
                    Err(e) => {
                        warn!(id = %message.id, error = %e, "Reply delivery failed");
                        Some(ReplyStatus::Failed(e.to_string()))
                    }
                }
            }
            RoutingOutcome::Unresolved { reason } => {
                info!(
                    id = %message.id,
                    category = %request.category,
                    reason = %reason,
                    "Could not find part; moved for manual processing"
                );
                None
            }
        }
    }
}

fn unresolved(reason: EscalationReason) -> RoutingOutcome {
    RoutingOutcome::Unresolved { reason }
}
