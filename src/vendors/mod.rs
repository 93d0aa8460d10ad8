//! Vendor part lookups.
//!
//! Each vendor implements [`PartResolver`]. Resolvers check their credential
//! before touching the network and report HTTP failures as
//! [`ResolveError`]s, never panics.

pub mod hpe;
pub mod http;
pub mod lenovo;
pub mod retry;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::credentials::{CredentialName, VendorCredential};
use crate::error::ResolveError;

pub use hpe::HpeResolver;
pub use lenovo::LenovoResolver;

/// A vendor part number as returned by a resolver.
pub type PartNumber = String;

/// Vendors with a lookup service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VendorKind {
    Lenovo,
    Hpe,
}

impl VendorKind {
    /// Lowercase vendor name, also the text matched during classification.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Lenovo => "lenovo",
            Self::Hpe => "hpe",
        }
    }

    /// Credential the vendor's lookup requires.
    pub fn credential(&self) -> CredentialName {
        match self {
            Self::Lenovo => CredentialName::LenovoApiKey,
            Self::Hpe => CredentialName::HpeApiKey,
        }
    }
}

impl fmt::Display for VendorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Turns an identifier into a vendor part number.
#[async_trait]
pub trait PartResolver: Send + Sync {
    fn vendor(&self) -> VendorKind;

    /// Look up `identifier`.
    ///
    /// An empty `credential` fails with [`ResolveError::NotConfigured`]
    /// without issuing a request.
    async fn resolve(
        &self,
        identifier: &str,
        credential: &VendorCredential,
    ) -> Result<PartNumber, ResolveError>;
}
