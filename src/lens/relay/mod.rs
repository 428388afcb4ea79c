//! Relay check lens
//!
//! Answers "is this address one of the provider's egress addresses?" by
//! refreshing the range cache if needed, testing membership, and merging the
//! verdict with registration metadata.

use chrono::Utc;
use serde::Serialize;
use std::net::IpAddr;
use std::sync::Arc;
use tracing::warn;

use crate::lens::ip::{IpDetails, LookupGateway};
use crate::lens::utils::{or_unknown, OutputFormat};
use crate::ranges::{parse_address, RangeCache, RangeResult};

// =============================================================================
// Types
// =============================================================================

/// Full answer for a single address
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelayCheckResult {
    pub ip: String,
    pub is_relay: bool,
    pub organization: String,
    pub city: String,
    pub country: String,
    /// Set when the verdict was computed from data that failed to refresh
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub stale: bool,
}

/// Membership-only answer, as returned by the JSON API
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MembershipResult {
    pub ip: String,
    pub result: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub stale: bool,
}

// =============================================================================
// Lens
// =============================================================================

/// Combines the range cache with an optional metadata lookup
#[derive(Clone)]
pub struct RelayLens {
    cache: Arc<RangeCache>,
    gateway: Option<Arc<dyn LookupGateway>>,
}

impl RelayLens {
    pub fn new(cache: Arc<RangeCache>, gateway: Arc<dyn LookupGateway>) -> Self {
        Self {
            cache,
            gateway: Some(gateway),
        }
    }

    /// A lens that never calls the metadata lookup
    pub fn without_lookup(cache: Arc<RangeCache>) -> Self {
        Self {
            cache,
            gateway: None,
        }
    }

    pub fn cache(&self) -> &Arc<RangeCache> {
        &self.cache
    }

    /// Check an address and enrich the verdict with metadata.
    ///
    /// The address is validated before anything else runs. A failed metadata
    /// lookup yields "Unknown" fields rather than an error.
    pub fn check(&self, input: &str) -> RangeResult<RelayCheckResult> {
        let addr = parse_address(input)?;
        let details = self.lookup_details(addr);
        let membership = self.membership(addr)?;

        Ok(RelayCheckResult {
            ip: membership.ip,
            is_relay: membership.result,
            organization: or_unknown(details.organization.as_deref()),
            city: or_unknown(details.city.as_deref()),
            country: or_unknown(details.country.as_deref()),
            stale: membership.stale,
        })
    }

    /// Check an address without the metadata lookup
    pub fn check_membership(&self, input: &str) -> RangeResult<MembershipResult> {
        let addr = parse_address(input)?;
        self.membership(addr)
    }

    /// Format a check result for display
    pub fn format_result(&self, result: &RelayCheckResult, format: &OutputFormat) -> String {
        if let Some(json) = format.to_json(result) {
            return json;
        }

        let verdict = if result.is_relay { "yes" } else { "no" };
        let mut lines = vec![
            format!("IP: {}", result.ip),
            format!("Egress relay: {}", verdict),
            format!("Organization: {}", result.organization),
            format!("City: {}", result.city),
            format!("Country: {}", result.country),
        ];
        if result.stale {
            lines.push("Warning: range data could not be refreshed and may be stale".to_string());
        }
        lines.join("\n")
    }

    fn lookup_details(&self, addr: IpAddr) -> IpDetails {
        let Some(gateway) = &self.gateway else {
            return IpDetails::default();
        };
        gateway.lookup(addr).unwrap_or_else(|e| {
            warn!("IP details lookup failed for {}: {}", addr, e);
            IpDetails::default()
        })
    }

    fn membership(&self, addr: IpAddr) -> RangeResult<MembershipResult> {
        let stale = self.refresh_for_query()?;
        Ok(MembershipResult {
            ip: addr.to_string(),
            result: self.cache.current_prefixes().contains(&addr),
            stale,
        })
    }

    /// Refresh before a query. Returns whether the data being served is stale.
    ///
    /// A failed refresh is tolerated while older data is available; with an
    /// empty cache there is nothing to answer from, so the error is returned.
    fn refresh_for_query(&self) -> RangeResult<bool> {
        match self.cache.ensure_fresh(Utc::now()) {
            Ok(_) => Ok(false),
            Err(e) => {
                if self.cache.current_prefixes().is_empty() {
                    return Err(e);
                }
                warn!("Serving stale range data: {}", e);
                Ok(true)
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
