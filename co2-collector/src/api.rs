//! co2signal HTTP client.
//!
//! One authenticated `GET {base}?countryCode={zone}` per call. No retry and no
//! local throttling: the 30 requests/hour/token limit is honoured by the
//! polling interval and the size of the token pool.

use crate::credentials::Credential;
use crate::error::{ConfigError, TransportError};
use reqwest::Url;
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_API_URL: &str = "https://api.co2signal.com/v1/latest";
pub const AUTH_HEADER: &str = "auth-token";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// JSON body returned for one zone request, whatever its API-level status.
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    /// Zone the request was issued for.
    pub zone: String,
    pub http_status: u16,
    pub body: Value,
}

/// Source of latest-reading responses.
pub trait CarbonApi {
    fn latest_for_zone(
        &self,
        zone: &str,
        credential: &Credential,
    ) -> impl Future<Output = Result<RawResponse, TransportError>> + Send;
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ConfigError> {
        let base_url = Url::parse(base_url).map_err(|e| ConfigError::InvalidUrl {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("co2-collector/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { http, base_url })
    }

    pub fn zone_url(&self, zone: &str) -> Url {
        let mut url = self.base_url.clone();
        url.query_pairs_mut().append_pair("countryCode", zone);
        url
    }
}

impl CarbonApi for ApiClient {
    async fn latest_for_zone(
        &self,
        zone: &str,
        credential: &Credential,
    ) -> Result<RawResponse, TransportError> {
        let url = self.zone_url(zone);
        debug!(zone, owner = %credential.owner, %url, "GET latest");

        let response = self
            .http
            .get(url)
            .header(AUTH_HEADER, &credential.token)
            .send()
            .await?;
        let http_status = response.status().as_u16();
        let bytes = response.bytes().await?;

        // Quota and token errors come back as JSON with a 4xx status; the parser classifies them.
        let body = serde_json::from_slice(&bytes).map_err(|source| TransportError::NotJson {
            status: http_status,
            source,
        })?;

        Ok(RawResponse {
            zone: zone.to_string(),
            http_status,
            body,
        })
    }
}
