use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Context;
use parts_triage::config::{
    DEFAULT_CREDENTIALS_PATH, MailBackend, RunConfig, RunMode, apply_env_overrides,
};
use parts_triage::credentials::{CredentialStore, Credentials, JsonCredentialStore};
use parts_triage::mail::{EmailConfig, GraphConfig, GraphMailbox, ImapMailbox, MailSource};
use parts_triage::pipeline::{BatchReport, Orchestrator, VendorRegistry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        tracing::debug!("rustls crypto provider already installed");
    }

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    eprintln!("🔧 Parts Triage v{}", env!("CARGO_PKG_VERSION"));

    // ── Credentials ──────────────────────────────────────────────────────
    let credentials_path = std::env::var("TRIAGE_CREDENTIALS_PATH")
        .unwrap_or_else(|_| DEFAULT_CREDENTIALS_PATH.to_string());
    let store = JsonCredentialStore::new(&credentials_path);
    let mut stored = store
        .load()
        .with_context(|| format!("loading credentials from {credentials_path}"))?;

    let overridden = apply_env_overrides(&mut stored);
    if overridden && std::env::var("TRIAGE_SAVE_CREDENTIALS").is_ok_and(|v| v == "1") {
        store.save(&stored).context("saving credentials")?;
        eprintln!("   Credentials saved to {credentials_path}");
    }
    let credentials = Credentials::from_map(&stored);
    eprintln!("   Credentials: {credentials_path}");

    // ── Mailbox ──────────────────────────────────────────────────────────
    let backend = MailBackend::from_env()?;
    let mailbox: Arc<dyn MailSource> = match backend {
        MailBackend::Graph => {
            credentials.require_mailbox()?;
            let graph = GraphConfig::from_env()?;
            eprintln!("   Mailbox: Microsoft Graph ({})", graph.base_url);
            Arc::new(GraphMailbox::new(graph))
        }
        MailBackend::Imap => {
            let email = EmailConfig::from_env()?;
            eprintln!(
                "   Mailbox: IMAP {} / SMTP {}",
                email.imap_host, email.smtp_host
            );
            Arc::new(ImapMailbox::new(email))
        }
    };

    // ── Pipeline ─────────────────────────────────────────────────────────
    let config = RunConfig::from_env(credentials);
    let registry = VendorRegistry::with_default_resolvers(&config)?;
    let orchestrator = Orchestrator::new(config, registry);

    match RunMode::from_env() {
        RunMode::Once => {
            let report = orchestrator.run_batch(mailbox.as_ref()).await?;
            print_summary(&report);
        }
        RunMode::Poll(interval) => {
            eprintln!("   Polling every {}s\n", interval.as_secs());
            let mut tick = tokio::time::interval(interval);
            let mut seen = HashSet::new();
            loop {
                tokio::select! {
                    _ = tick.tick() => {
                        match orchestrator.run_new(mailbox.as_ref(), &mut seen).await {
                            Ok(report) if report.is_empty() => {}
                            Ok(report) => print_summary(&report),
                            Err(e) => {
                                tracing::error!(error = %e, "Batch failed, retrying next tick")
                            }
                        }
                    }
                    _ = tokio::signal::ctrl_c() => {
                        tracing::info!("Shutting down");
                        break;
                    }
                }
            }
        }
    }

    Ok(())
}

fn print_summary(report: &BatchReport) {
    eprintln!(
        "   Processed {} message(s): {} replied, {} for manual processing",
        report.len(),
        report.resolved_count(),
        report.escalated_count()
    );
    for failed in report.delivery_failures() {
        eprintln!(
            "   Reply to {} not delivered ({})",
            failed.message.sender, failed.message.id
        );
    }
}
