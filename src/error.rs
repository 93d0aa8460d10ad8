//! Error types for parts-triage.

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Missing required configuration: {key}. {hint}")]
    MissingRequired { key: String, hint: String },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Credential persistence errors.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed credential file: {0}")]
    Json(#[from] serde_json::Error),
}

/// Mail source errors.
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    /// The mailbox could not be read at all. Fatal for the run.
    #[error("Failed to fetch messages from {source_name}: {reason}")]
    FetchFailed { source_name: String, reason: String },

    /// A reply could not be delivered.
    #[error("Failed to send reply to {recipient}: {reason}")]
    SendFailed { recipient: String, reason: String },

    #[error("Invalid message format: {0}")]
    InvalidMessage(String),
}

/// Vendor part lookup errors.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// The vendor credential is empty. Raised before any request is made.
    #[error("{vendor} lookup not configured: missing {credential}")]
    NotConfigured { vendor: String, credential: String },

    #[error("{vendor} lookup returned HTTP {status}")]
    Status { vendor: String, status: u16 },

    #[error("{vendor} lookup service unreachable: {reason}")]
    Unreachable { vendor: String, reason: String },
}

/// Coarse classification of a [`ResolveError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveErrorKind {
    Config,
    Lookup,
}

impl ResolveError {
    pub fn kind(&self) -> ResolveErrorKind {
        match self {
            Self::NotConfigured { .. } => ResolveErrorKind::Config,
            Self::Status { .. } | Self::Unreachable { .. } => ResolveErrorKind::Lookup,
        }
    }

    /// Whether another attempt could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::NotConfigured { .. } => false,
            Self::Status { status, .. } => matches!(status, 429 | 500 | 502 | 503 | 504),
            Self::Unreachable { .. } => true,
        }
    }
}
