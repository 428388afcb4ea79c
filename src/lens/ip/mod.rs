//! IP information lookup lens
//!
//! Resolves registration and geolocation metadata for an address. Every
//! field is optional; callers render missing ones as "Unknown".

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::time::Duration;

use crate::lens::utils::or_unknown;

/// BGPKIT IP information API
pub const DEFAULT_LOOKUP_URL: &str = "https://api.bgpkit.com/v3/utils/ip";

// =============================================================================
// Types
// =============================================================================

/// Registration and geolocation details for an IP address
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asn: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asn_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asn_country_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

impl IpDetails {
    /// Format details for display, with "Unknown" for missing fields
    pub fn format_text(&self) -> String {
        let asn = self.asn.map(|asn| format!("AS{}", asn));
        [
            ("Organization", self.organization.as_deref()),
            ("ASN", asn.as_deref()),
            ("ASN Description", self.asn_description.as_deref()),
            ("ASN Country", self.asn_country_code.as_deref()),
            ("City", self.city.as_deref()),
            ("Region", self.region.as_deref()),
            ("Country", self.country.as_deref()),
        ]
        .iter()
        .map(|(label, value)| format!("{}: {}", label, or_unknown(*value)))
        .collect::<Vec<_>>()
        .join("\n")
    }
}

/// Network information as returned by the lookup API
#[derive(Debug, Clone, Deserialize)]
struct IpAsnRouteInfo {
    asn: i64,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    country: Option<String>,
}

/// Lookup API response body
#[derive(Debug, Clone, Deserialize)]
struct IpInfo {
    #[serde(default)]
    country: Option<String>,
    #[serde(default)]
    asn: Option<IpAsnRouteInfo>,
}

impl From<IpInfo> for IpDetails {
    fn from(info: IpInfo) -> Self {
        let network = info.asn;
        Self {
            organization: network.as_ref().and_then(|n| n.name.clone()),
            asn: network.as_ref().map(|n| n.asn),
            asn_description: network.as_ref().map(|n| match &n.name {
                Some(name) => format!("AS{} {}", n.asn, name),
                None => format!("AS{}", n.asn),
            }),
            asn_country_code: network.as_ref().and_then(|n| n.country.clone()),
            city: None,
            region: None,
            country: info.country,
        }
    }
}

// =============================================================================
// Lens
// =============================================================================

/// Source of IP registration/geolocation metadata
pub trait LookupGateway: Send + Sync {
    fn lookup(&self, ip: IpAddr) -> Result<IpDetails>;
}

/// IP information lookup lens backed by the BGPKIT IP API
///
/// # Example
///
/// ```rust,ignore
/// use relaycheck::lens::ip::{IpLens, LookupGateway};
///
/// let lens = IpLens::default();
/// let details = lens.lookup("1.1.1.1".parse()?)?;
/// println!("{}", details.format_text());
/// ```
pub struct IpLens {
    url: String,
    agent: ureq::Agent,
}

impl IpLens {
    /// Create a new IP lens against `url` with a per-call timeout
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();
        Self {
            url: url.into(),
            agent,
        }
    }
}

impl Default for IpLens {
    fn default() -> Self {
        Self::new(DEFAULT_LOOKUP_URL, Duration::from_secs(10))
    }
}

impl LookupGateway for IpLens {
    fn lookup(&self, ip: IpAddr) -> Result<IpDetails> {
        let url = format!("{}?ip={}", self.url, ip);
        let info = self
            .agent
            .get(&url)
            .call()?
            .body_mut()
            .read_json::<IpInfo>()?;
        Ok(info.into())
    }
}

// =============================================================================
// Tests
// =============================================================================
