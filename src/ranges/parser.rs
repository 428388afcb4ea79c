//! Parser for the published egress range list
//!
//! The list is CSV-like: one row per range, the first column holding the CIDR
//! string, followed by optional location columns, e.g.
//!
//! ```text
//! 172.224.224.0/27,GB,GB-EN,London,
//! 2a02:26f7:b3c0:4000::/64,US,US-CA,Los Angeles,
//! ```
//!
//! Rows whose first field is not a valid network prefix (including a header
//! row, if present) are skipped and counted, never surfaced as errors.

use ipnet::IpNet;
use std::net::IpAddr;
use tracing::debug;

use super::prefix_set::PrefixSet;

/// Result of parsing a range document
#[derive(Debug, Clone, Default)]
pub struct ParsedRanges {
    /// Valid, deduplicated prefixes
    pub prefixes: PrefixSet,
    /// Number of non-empty rows that did not start with a valid prefix
    pub skipped: usize,
}

/// Parse a single CIDR field.
///
/// Accepts `addr/len` and bare addresses (treated as host prefixes), optionally
/// wrapped in CSV double quotes. Prefixes with host bits set, such as
/// `203.0.113.5/24`, are rejected.
pub fn parse_prefix(field: &str) -> Option<IpNet> {
    let field = field.trim();
    let field = field
        .strip_prefix('"')
        .and_then(|f| f.strip_suffix('"'))
        .unwrap_or(field);
    let prefix = match field.parse::<IpNet>() {
        Ok(prefix) => prefix,
        Err(_) => IpNet::from(field.parse::<IpAddr>().ok()?),
    };
    (prefix.trunc() == prefix).then_some(prefix)
}

/// Parse raw range list text into a prefix set
pub fn parse_ranges(raw: &str) -> ParsedRanges {
    let mut parsed = ParsedRanges::default();

    let raw = raw.strip_prefix('\u{feff}').unwrap_or(raw);
    for line in raw.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let first_field = line.split(',').next().unwrap_or_default();
        match parse_prefix(first_field) {
            Some(prefix) => {
                parsed.prefixes.insert(prefix);
            }
            None => parsed.skipped += 1,
        }
    }

    if parsed.skipped > 0 {
        debug!(
            "skipped {} malformed range rows, kept {} prefixes",
            parsed.skipped,
            parsed.prefixes.len()
        );
    }

    parsed
}
