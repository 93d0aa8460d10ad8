//! Lenovo support parts lookup.

use async_trait::async_trait;

use crate::config::RunConfig;
use crate::credentials::VendorCredential;
use crate::error::{ConfigError, ResolveError};
use crate::vendors::http::LookupClient;
use crate::vendors::{PartNumber, PartResolver, VendorKind};

/// Returned when the lookup page answers without a parseable part number.
pub const LENOVO_PLACEHOLDER_PART: &str = "LEN-56789";

pub struct LenovoResolver {
    http: LookupClient,
}

impl LenovoResolver {
    pub fn new(config: &RunConfig) -> Result<Self, ConfigError> {
        let http = LookupClient::new(
            VendorKind::Lenovo,
            &config.lenovo_base_url,
            config.request_timeout,
            config.retry.clone(),
            LENOVO_PLACEHOLDER_PART,
        )?;
        Ok(Self { http })
    }
}

#[async_trait]
impl PartResolver for LenovoResolver {
    fn vendor(&self) -> VendorKind {
        VendorKind::Lenovo
    }

    /// `GET {base}/us/en/partslookup/{model}/{serial}`.
    ///
    /// Messages carry a single identifier, so it fills both segments.
    async fn resolve(
        &self,
        identifier: &str,
        credential: &VendorCredential,
    ) -> Result<PartNumber, ResolveError> {
        let url = self
            .http
            .url_with_segments(&["us", "en", "partslookup", identifier, identifier]);
        self.http.lookup(url, &[], credential).await
    }
}
