//! Client address extraction and public IP lookup.

use std::fmt::Debug;
use std::net::{IpAddr, SocketAddr};

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;

use crate::http::{client, fetch_json};

const IPIFY_BASE_URL: &str = "https://api.ipify.org";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ClientIpError {
    #[error("Invalid X-Forwarded-For entry '{0}'")]
    InvalidForwardedFor(String),
}

/// Pick the address a request originated from.
///
/// The first entry of `X-Forwarded-For` wins over the socket peer.
pub fn client_ip(
    forwarded_for: Option<&str>,
    peer: Option<SocketAddr>,
) -> Result<Option<IpAddr>, ClientIpError> {
    if let Some(header) = forwarded_for.map(str::trim).filter(|h| !h.is_empty()) {
        let first = header.split(',').next().unwrap_or_default().trim();
        return first
            .parse::<IpAddr>()
            .map(Some)
            .map_err(|_| ClientIpError::InvalidForwardedFor(first.to_string()));
    }

    Ok(peer.map(|addr| addr.ip()))
}

/// Whether `ip` is routable on the public internet.
pub fn is_public(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            !(v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_unspecified()
                || v4.is_broadcast())
        }
        IpAddr::V6(v6) => {
            if let Some(mapped) = v6.to_ipv4_mapped() {
                return is_public(IpAddr::V4(mapped));
            }
            let first = v6.segments()[0];
            let unique_local = (first & 0xfe00) == 0xfc00;
            let link_local = (first & 0xffc0) == 0xfe80;
            !(v6.is_loopback() || v6.is_unspecified() || unique_local || link_local)
        }
    }
}

/// Resolves the public address this process is seen under.
#[async_trait]
pub trait PublicIpLookup: Send + Sync + Debug {
    async fn public_ip(&self) -> Result<IpAddr>;
}

#[derive(Debug, Clone)]
pub struct IpifyClient {
    base_url: String,
    http: Client,
}

#[derive(Debug, Deserialize)]
struct IpifyResponse {
    ip: String,
}

impl IpifyClient {
    pub fn new() -> Self {
        Self::with_base_url(IPIFY_BASE_URL)
    }

    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http: client(),
        }
    }
}

impl Default for IpifyClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PublicIpLookup for IpifyClient {
    async fn public_ip(&self) -> Result<IpAddr> {
        let request = self
            .http
            .get(format!("{}/", self.base_url))
            .query(&[("format", "json")]);
        let parsed: IpifyResponse = fetch_json(request, "ipify lookup").await?;

        parsed
            .ip
            .parse()
            .with_context(|| format!("ipify returned an invalid address '{}'", parsed.ip))
    }
}
