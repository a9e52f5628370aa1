//! IP geolocation via ipinfo.io.

use std::fmt::Debug;
use std::net::IpAddr;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::{
    http::{client, fetch_json},
    model::GeoLocation,
};

const IPINFO_BASE_URL: &str = "https://ipinfo.io";

#[async_trait]
pub trait GeoLocator: Send + Sync + Debug {
    async fn locate(&self, ip: IpAddr) -> Result<GeoLocation>;
}

/// ipinfo.io client. The token is optional; anonymous use is rate limited.
#[derive(Debug, Clone)]
pub struct IpInfoClient {
    token: Option<String>,
    base_url: String,
    http: Client,
}

#[derive(Debug, Deserialize)]
struct IpInfoResponse {
    #[serde(default)]
    bogon: bool,
    city: Option<String>,
    region: Option<String>,
    country: Option<String>,
}

impl IpInfoClient {
    pub fn new(token: Option<String>) -> Self {
        Self::with_base_url(token, IPINFO_BASE_URL)
    }

    pub fn with_base_url(token: Option<String>, base_url: &str) -> Self {
        Self {
            token,
            base_url: base_url.trim_end_matches('/').to_string(),
            http: client(),
        }
    }
}

#[async_trait]
impl GeoLocator for IpInfoClient {
    async fn locate(&self, ip: IpAddr) -> Result<GeoLocation> {
        let mut request = self.http.get(format!("{}/{}/json", self.base_url, ip));
        if let Some(token) = &self.token {
            request = request.query(&[("token", token.as_str())]);
        }

        tracing::debug!(%ip, "Looking up location on ipinfo");
        let parsed: IpInfoResponse = fetch_json(request, "ipinfo lookup").await?;

        if parsed.bogon {
            return Err(anyhow!("ipinfo cannot locate non-public address {ip}"));
        }

        let city = parsed
            .city
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or_else(|| anyhow!("ipinfo returned no city for {ip}"))?;

        Ok(GeoLocation {
            ip,
            city,
            region: parsed.region.filter(|r| !r.is_empty()),
            country: parsed.country.filter(|c| !c.is_empty()),
        })
    }
}
