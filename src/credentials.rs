//! Named credentials and their persistence.
//!
//! The store itself deals in plain `name → value` mappings so a saved file
//! round-trips exactly. [`Credentials`] is the in-memory, read-only view the
//! pipeline uses; every value is held as a [`SecretString`].

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use crate::error::{ConfigError, CredentialError};

/// Persisted form of the credentials: credential name to value.
pub type CredentialMap = BTreeMap<String, String>;

/// A vendor API key. Empty means "not configured".
pub type VendorCredential = SecretString;

/// Every credential the tool knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CredentialName {
    ClientId,
    ClientSecret,
    TenantId,
    HpeApiKey,
    LenovoApiKey,
}

impl CredentialName {
    pub const ALL: [CredentialName; 5] = [
        Self::ClientId,
        Self::ClientSecret,
        Self::TenantId,
        Self::HpeApiKey,
        Self::LenovoApiKey,
    ];

    /// Key used in the credential mapping.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ClientId => "clientId",
            Self::ClientSecret => "clientSecret",
            Self::TenantId => "tenantId",
            Self::HpeApiKey => "hpeApiKey",
            Self::LenovoApiKey => "lenovoApiKey",
        }
    }

    /// Environment variable that overrides the stored value.
    pub fn env_var(&self) -> &'static str {
        match self {
            Self::ClientId => "O365_CLIENT_ID",
            Self::ClientSecret => "O365_CLIENT_SECRET",
            Self::TenantId => "O365_TENANT_ID",
            Self::HpeApiKey => "HPE_API_KEY",
            Self::LenovoApiKey => "LENOVO_API_KEY",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|n| n.as_str() == name)
    }
}

impl fmt::Display for CredentialName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read-only credential set for one run.
#[derive(Debug, Default)]
pub struct Credentials {
    secrets: HashMap<CredentialName, SecretString>,
}

impl Credentials {
    /// Build from a stored mapping. Unknown keys are ignored.
    pub fn from_map(map: &CredentialMap) -> Self {
        let mut secrets = HashMap::new();
        for (key, value) in map {
            match CredentialName::parse(key) {
                Some(name) => {
                    secrets.insert(name, SecretString::from(value.clone()));
                }
                None => debug!(key = %key, "Ignoring unknown credential"),
            }
        }
        Self { secrets }
    }

    /// Set a single credential (builder style).
    pub fn with(mut self, name: CredentialName, value: impl Into<String>) -> Self {
        self.secrets.insert(name, SecretString::from(value.into()));
        self
    }

    /// The secret for `name`, if one was provided (possibly empty).
    pub fn get(&self, name: CredentialName) -> Option<&SecretString> {
        self.secrets.get(&name)
    }

    /// Whether `name` is present and non-empty.
    pub fn is_configured(&self, name: CredentialName) -> bool {
        self.get(name)
            .is_some_and(|s| !s.expose_secret().is_empty())
    }

    /// The mailbox app registration (client id, secret, tenant) is complete.
    pub fn mailbox_configured(&self) -> bool {
        [
            CredentialName::ClientId,
            CredentialName::ClientSecret,
            CredentialName::TenantId,
        ]
        .into_iter()
        .all(|n| self.is_configured(n))
    }

    /// Fail with [`ConfigError::MissingRequired`] unless the mailbox
    /// registration is complete.
    pub fn require_mailbox(&self) -> Result<(), ConfigError> {
        if self.mailbox_configured() {
            return Ok(());
        }
        Err(ConfigError::MissingRequired {
            key: "clientId/clientSecret/tenantId".into(),
            hint: "Set O365_CLIENT_ID, O365_CLIENT_SECRET and O365_TENANT_ID \
                   or add them to the credential file"
                .into(),
        })
    }

    /// Back to the persisted form. Every known name is present, missing ones empty.
    pub fn to_map(&self) -> CredentialMap {
        CredentialName::ALL
            .into_iter()
            .map(|name| {
                let value = self
                    .get(name)
                    .map(|s| s.expose_secret().to_string())
                    .unwrap_or_default();
                (name.as_str().to_string(), value)
            })
            .collect()
    }
}

/// Credential persistence collaborator.
pub trait CredentialStore: Send + Sync {
    fn load(&self) -> Result<CredentialMap, CredentialError>;

    fn save(&self, credentials: &CredentialMap) -> Result<(), CredentialError>;
}

/// Stores credentials as a flat JSON object on disk.
pub struct JsonCredentialStore {
    path: PathBuf,
}

impl JsonCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialStore for JsonCredentialStore {
    /// A missing file loads as an empty mapping.
    fn load(&self) -> Result<CredentialMap, CredentialError> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "No credential file, starting empty");
            return Ok(CredentialMap::new());
        }
        let raw = std::fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    fn save(&self, credentials: &CredentialMap) -> Result<(), CredentialError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(credentials)?;
        std::fs::write(&self.path, json)?;
        debug!(path = %self.path.display(), "Saved credentials");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_map() -> CredentialMap {
        CredentialName::ALL
            .into_iter()
            .map(|n| (n.as_str().to_string(), format!("value-{n}")))
            .collect()
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonCredentialStore::new(dir.path().join("credentials.json"));

        let map = full_map();
        store.save(&map).unwrap();
        assert_eq!(store.load().unwrap(), map);
    }

    #[test]
    fn save_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonCredentialStore::new(dir.path().join("nested/dir/creds.json"));
        store.save(&full_map()).unwrap();
        assert!(store.path().exists());
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonCredentialStore::new(dir.path().join("absent.json"));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        std::fs::write(&path, "not json").unwrap();
        let err = JsonCredentialStore::new(path).load().unwrap_err();
        assert!(matches!(err, CredentialError::Json(_)));
    }

    #[test]
    fn empty_value_is_not_configured() {
        let creds = Credentials::default()
            .with(CredentialName::LenovoApiKey, "")
            .with(CredentialName::HpeApiKey, "hpe-key");
        assert!(!creds.is_configured(CredentialName::LenovoApiKey));
        assert!(creds.is_configured(CredentialName::HpeApiKey));
        assert!(!creds.is_configured(CredentialName::ClientId));
    }

    #[test]
    fn from_map_ignores_unknown_keys() {
        let mut map = full_map();
        map.insert("somethingElse".into(), "x".into());
        let creds = Credentials::from_map(&map);
        assert_eq!(creds.to_map(), full_map());
    }

    #[test]
    fn mailbox_needs_all_three_settings() {
        let partial = Credentials::default()
            .with(CredentialName::ClientId, "id")
            .with(CredentialName::TenantId, "tenant");
        assert!(!partial.mailbox_configured());

        let complete = partial.with(CredentialName::ClientSecret, "secret");
        assert!(complete.mailbox_configured());
    }

    #[test]
    fn incomplete_mailbox_is_missing_required() {
        let partial = Credentials::default().with(CredentialName::ClientId, "id");
        let err = partial.require_mailbox().unwrap_err();
        assert!(
            matches!(err, ConfigError::MissingRequired { ref key, .. } if key.contains("tenantId"))
        );

        let complete = partial
            .with(CredentialName::ClientSecret, "secret")
            .with(CredentialName::TenantId, "tenant");
        assert!(complete.require_mailbox().is_ok());
    }

    #[test]
    fn debug_output_redacts_values() {
        let creds = Credentials::default().with(CredentialName::HpeApiKey, "super-secret");
        assert!(!format!("{creds:?}").contains("super-secret"));
    }
}
