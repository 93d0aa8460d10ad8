//! Configuration types.

use std::sync::Arc;
use std::time::Duration;

use crate::credentials::{CredentialMap, CredentialName, Credentials};
use crate::error::ConfigError;
use crate::vendors::retry::RetryConfig;

/// Default HPE PartSurfer host.
pub const DEFAULT_HPE_BASE_URL: &str = "https://partsurfer.hpe.com";

/// Default Lenovo support host.
pub const DEFAULT_LENOVO_BASE_URL: &str = "https://support.lenovo.com";

/// Default credential file, relative to the working directory.
pub const DEFAULT_CREDENTIALS_PATH: &str = "credentials.json";

/// Everything one triage run needs. Built once, then shared read-only.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub credentials: Arc<Credentials>,
    /// Retry policy for vendor lookups.
    pub retry: RetryConfig,
    /// Per-request timeout for vendor lookups.
    pub request_timeout: Duration,
    pub hpe_base_url: String,
    pub lenovo_base_url: String,
}

impl RunConfig {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials: Arc::new(credentials),
            retry: RetryConfig::default(),
            request_timeout: Duration::from_secs(15),
            hpe_base_url: DEFAULT_HPE_BASE_URL.to_string(),
            lenovo_base_url: DEFAULT_LENOVO_BASE_URL.to_string(),
        }
    }

    /// Build from environment variables on top of already-loaded credentials.
    pub fn from_env(credentials: Credentials) -> Self {
        Self::from_lookup(credentials, process_env)
    }

    /// Like [`RunConfig::from_env`], reading variables through `lookup`.
    pub fn from_lookup(credentials: Credentials, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::new(credentials);

        if let Some(url) = lookup("HPE_PARTS_BASE_URL") {
            config.hpe_base_url = url;
        }
        if let Some(url) = lookup("LENOVO_PARTS_BASE_URL") {
            config.lenovo_base_url = url;
        }
        if let Some(max) = parse_with::<u32>(&lookup, "TRIAGE_RETRY_MAX") {
            config.retry.max_retries = max;
        }
        if let Some(ms) = parse_with::<u64>(&lookup, "TRIAGE_RETRY_BASE_MS") {
            config.retry.base_delay = Duration::from_millis(ms);
        }
        if let Some(secs) = parse_with::<u64>(&lookup, "TRIAGE_HTTP_TIMEOUT_SECS") {
            config.request_timeout = Duration::from_secs(secs);
        }

        config
    }
}

/// Which mailbox implementation to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailBackend {
    Graph,
    Imap,
}

impl MailBackend {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(process_env)
    }

    /// `TRIAGE_MAIL_BACKEND`: `graph` (default) or `imap`, case-insensitive.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let Some(value) = lookup("TRIAGE_MAIL_BACKEND") else {
            return Ok(Self::Graph);
        };
        match value.to_ascii_lowercase().as_str() {
            "graph" => Ok(Self::Graph),
            "imap" => Ok(Self::Imap),
            other => Err(ConfigError::InvalidValue {
                key: "TRIAGE_MAIL_BACKEND".into(),
                message: format!("expected 'graph' or 'imap', got '{other}'"),
            }),
        }
    }
}

/// How the binary schedules batches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Once,
    Poll(Duration),
}

impl RunMode {
    pub fn from_env() -> Self {
        Self::from_lookup(process_env)
    }

    /// A positive `TRIAGE_POLL_INTERVAL_SECS` polls; anything else runs once.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        match parse_with::<u64>(&lookup, "TRIAGE_POLL_INTERVAL_SECS") {
            Some(secs) if secs > 0 => Self::Poll(Duration::from_secs(secs)),
            _ => Self::Once,
        }
    }
}

/// Overlay credential values from the environment onto a stored mapping.
///
/// Returns `true` if any value changed.
pub fn apply_env_overrides(map: &mut CredentialMap) -> bool {
    apply_overrides(map, process_env)
}

/// Overlay every credential `lookup` knows (by [`CredentialName::env_var`]).
pub fn apply_overrides(map: &mut CredentialMap, lookup: impl Fn(&str) -> Option<String>) -> bool {
    let mut changed = false;
    for name in CredentialName::ALL {
        if let Some(value) = lookup(name.env_var()) {
            let previous = map.insert(name.as_str().to_string(), value.clone());
            changed |= previous.as_deref() != Some(value.as_str());
        }
    }
    changed
}

fn process_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn parse_with<T: std::str::FromStr>(
    lookup: impl Fn(&str) -> Option<String>,
    key: &str,
) -> Option<T> {
    lookup(key).and_then(|s| s.parse().ok())
}

/// Read an environment variable, returning `None` if missing or malformed.
pub(crate) fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    parse_with(process_env, key)
}

/// Read a required environment variable.
pub(crate) fn env_required(key: &str) -> Result<String, ConfigError> {
    process_env(key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn new_uses_vendor_defaults() {
        let config = RunConfig::new(Credentials::default());
        assert_eq!(config.hpe_base_url, DEFAULT_HPE_BASE_URL);
        assert_eq!(config.lenovo_base_url, DEFAULT_LENOVO_BASE_URL);
        assert_eq!(config.retry.max_retries, RetryConfig::default().max_retries);
    }

    #[test]
    fn clones_share_credentials() {
        let config = RunConfig::new(Credentials::default().with(CredentialName::HpeApiKey, "k"));
        let copy = config.clone();
        assert!(Arc::ptr_eq(&config.credentials, &copy.credentials));
    }

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn lookup_overrides_urls_retry_and_timeout() {
        let lookup = vars(&[
            ("HPE_PARTS_BASE_URL", "http://hpe.local"),
            ("LENOVO_PARTS_BASE_URL", "http://lenovo.local"),
            ("TRIAGE_RETRY_MAX", "5"),
            ("TRIAGE_RETRY_BASE_MS", "20"),
            ("TRIAGE_HTTP_TIMEOUT_SECS", "3"),
        ]);
        let config = RunConfig::from_lookup(Credentials::default(), lookup);
        assert_eq!(config.hpe_base_url, "http://hpe.local");
        assert_eq!(config.lenovo_base_url, "http://lenovo.local");
        assert_eq!(config.retry.max_retries, 5);
        assert_eq!(config.retry.base_delay, Duration::from_millis(20));
        assert_eq!(config.request_timeout, Duration::from_secs(3));
    }

    #[test]
    fn malformed_numbers_keep_defaults() {
        let config = RunConfig::from_lookup(
            Credentials::default(),
            vars(&[("TRIAGE_RETRY_MAX", "lots"), ("TRIAGE_HTTP_TIMEOUT_SECS", "-1")]),
        );
        assert_eq!(config.retry.max_retries, RetryConfig::default().max_retries);
        assert_eq!(config.request_timeout, Duration::from_secs(15));
    }

    #[test]
    fn override_changing_a_value_reports_change() {
        let mut map = CredentialMap::from([("hpeApiKey".to_string(), "old".to_string())]);
        let changed = apply_overrides(&mut map, vars(&[("HPE_API_KEY", "new")]));
        assert!(changed);
        assert_eq!(map["hpeApiKey"], "new");
    }

    #[test]
    fn identical_override_reports_no_change() {
        let mut map = CredentialMap::from([("lenovoApiKey".to_string(), "same".to_string())]);
        let changed = apply_overrides(&mut map, vars(&[("LENOVO_API_KEY", "same")]));
        assert!(!changed);
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn override_adds_missing_credential() {
        let mut map = CredentialMap::new();
        assert!(apply_overrides(&mut map, vars(&[("O365_TENANT_ID", "tenant")])));
        assert_eq!(map["tenantId"], "tenant");
    }

    #[test]
    fn no_overrides_leave_map_untouched() {
        let mut map = CredentialMap::from([("clientId".to_string(), "id".to_string())]);
        assert!(!apply_overrides(&mut map, vars(&[])));
        assert_eq!(map["clientId"], "id");
    }

    #[test]
    fn mail_backend_selection() {
        assert_eq!(MailBackend::from_lookup(vars(&[])).unwrap(), MailBackend::Graph);
        assert_eq!(
            MailBackend::from_lookup(vars(&[("TRIAGE_MAIL_BACKEND", "IMAP")])).unwrap(),
            MailBackend::Imap
        );
        let err = MailBackend::from_lookup(vars(&[("TRIAGE_MAIL_BACKEND", "pop3")])).unwrap_err();
        assert!(
            matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "TRIAGE_MAIL_BACKEND")
        );
    }

    #[test]
    fn run_mode_polls_only_for_positive_interval() {
        assert_eq!(RunMode::from_lookup(vars(&[])), RunMode::Once);
        assert_eq!(
            RunMode::from_lookup(vars(&[("TRIAGE_POLL_INTERVAL_SECS", "0")])),
            RunMode::Once
        );
        assert_eq!(
            RunMode::from_lookup(vars(&[("TRIAGE_POLL_INTERVAL_SECS", "soon")])),
            RunMode::Once
        );
        assert_eq!(
            RunMode::from_lookup(vars(&[("TRIAGE_POLL_INTERVAL_SECS", "30")])),
            RunMode::Poll(Duration::from_secs(30))
        );
    }

    #[test]
    fn from_env_reads_process_environment() {
        // SAFETY: no other test in this crate reads TRIAGE_MAIL_BACKEND.
        unsafe { std::env::set_var("TRIAGE_MAIL_BACKEND", "imap") };
        let backend = MailBackend::from_env();
        unsafe { std::env::remove_var("TRIAGE_MAIL_BACKEND") };
        assert_eq!(backend.unwrap(), MailBackend::Imap);
    }
}
