//! HTTP plumbing shared by the vendor resolvers.

use std::time::Duration;

use reqwest::Url;
use secrecy::ExposeSecret;
use tracing::{debug, info};

use crate::credentials::VendorCredential;
use crate::error::{ConfigError, ResolveError};
use crate::vendors::retry::{RetryConfig, with_retry};
use crate::vendors::{PartNumber, VendorKind};

/// Header carrying the vendor API key.
pub const API_KEY_HEADER: &str = "X-Api-Key";

/// A GET-only lookup client for one vendor.
pub struct LookupClient {
    vendor: VendorKind,
    client: reqwest::Client,
    base_url: Url,
    retry: RetryConfig,
    /// Returned when a successful response carries no part number.
    placeholder: &'static str,
}

impl LookupClient {
    pub fn new(
        vendor: VendorKind,
        base_url: &str,
        timeout: Duration,
        retry: RetryConfig,
        placeholder: &'static str,
    ) -> Result<Self, ConfigError> {
        let key = format!("{vendor} base URL");
        let base_url = Url::parse(base_url).map_err(|e| ConfigError::InvalidValue {
            key: key.clone(),
            message: e.to_string(),
        })?;
        if base_url.cannot_be_a_base() {
            return Err(ConfigError::InvalidValue {
                key,
                message: format!("'{base_url}' cannot be used as a base URL"),
            });
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ConfigError::InvalidValue {
                key: format!("{vendor} HTTP client"),
                message: e.to_string(),
            })?;

        Ok(Self {
            vendor,
            client,
            base_url,
            retry,
            placeholder,
        })
    }

    /// Base URL with `segments` appended as percent-encoded path segments.
    pub fn url_with_segments(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Issue the lookup. Empty credentials never reach the network.
    pub async fn lookup(
        &self,
        url: Url,
        query: &[(&str, &str)],
        credential: &VendorCredential,
    ) -> Result<PartNumber, ResolveError> {
        let vendor = self.vendor.name();
        let api_key = credential.expose_secret();
        if api_key.is_empty() {
            return Err(ResolveError::NotConfigured {
                vendor: vendor.to_string(),
                credential: self.vendor.credential().to_string(),
            });
        }

        debug!(vendor, url = %url, "Querying vendor parts service");

        let body = with_retry(&self.retry, vendor, || {
            let request = self
                .client
                .get(url.clone())
                .query(query)
                .header(API_KEY_HEADER, api_key);
            async move {
                let response = request
                    .send()
                    .await
                    .map_err(|e| ResolveError::Unreachable {
                        vendor: vendor.to_string(),
                        reason: e.to_string(),
                    })?;

                let status = response.status();
                if !status.is_success() {
                    return Err(ResolveError::Status {
                        vendor: vendor.to_string(),
                        status: status.as_u16(),
                    });
                }

                response
                    .text()
                    .await
                    .map_err(|e| ResolveError::Unreachable {
                        vendor: vendor.to_string(),
                        reason: format!("failed to read response body: {e}"),
                    })
            }
        })
        .await?;

        let part_number = parse_part_number(&body).unwrap_or_else(|| {
            debug!(vendor, "No part number in response, using placeholder");
            self.placeholder.to_string()
        });
        info!(vendor, part_number = %part_number, "Vendor lookup succeeded");
        Ok(part_number)
    }
}

/// Pull a part number out of a JSON response body.
///
/// Accepts `{"partNumber": ".."}` or `{"parts": [{"partNumber": ".."}, ..]}`.
/// Anything else (HTML pages, empty bodies) yields `None`.
pub fn parse_part_number(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body.trim()).ok()?;
    value
        .get("partNumber")
        .or_else(|| value.get("parts")?.get(0)?.get("partNumber"))
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
