//! HPE PartSurfer lookup.

use async_trait::async_trait;

use crate::config::RunConfig;
use crate::credentials::VendorCredential;
use crate::error::{ConfigError, ResolveError};
use crate::vendors::http::LookupClient;
use crate::vendors::{PartNumber, PartResolver, VendorKind};

/// Returned when PartSurfer answers without a parseable part number.
pub const HPE_PLACEHOLDER_PART: &str = "XYZ12345";

/// Looks parts up by serial number on PartSurfer.
pub struct HpeResolver {
    http: LookupClient,
}

impl HpeResolver {
    pub fn new(config: &RunConfig) -> Result<Self, ConfigError> {
        let http = LookupClient::new(
            VendorKind::Hpe,
            &config.hpe_base_url,
            config.request_timeout,
            config.retry.clone(),
            HPE_PLACEHOLDER_PART,
        )?;
        Ok(Self { http })
    }
}

#[async_trait]
impl PartResolver for HpeResolver {
    fn vendor(&self) -> VendorKind {
        VendorKind::Hpe
    }

    /// `GET {base}/Search.aspx?SearchText={identifier}`; the identifier is
    /// treated as a serial number.
    async fn resolve(
        &self,
        identifier: &str,
        credential: &VendorCredential,
    ) -> Result<PartNumber, ResolveError> {
        let url = self.http.url_with_segments(&["Search.aspx"]);
        self.http
            .lookup(url, &[("SearchText", identifier)], credential)
            .await
    }
}
