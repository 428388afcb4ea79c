//! Prefix set and membership test
//!
//! A [`PrefixSet`] is a flat, unordered collection of validated network
//! prefixes. Membership is a linear scan: every prefix is checked against the
//! address until one contains it. The published egress lists hold a few
//! thousand entries at most, so no trie is built.

use ipnet::IpNet;
use serde::{Serialize, Serializer};
use std::collections::HashSet;
use std::net::IpAddr;

use super::error::{RangeError, RangeResult};

/// A set of validated network prefixes, unique by normalized form
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrefixSet {
    prefixes: HashSet<IpNet>,
}

impl PrefixSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a prefix, returning false if it was already present
    pub fn insert(&mut self, prefix: IpNet) -> bool {
        self.prefixes.insert(prefix)
    }

    pub fn len(&self) -> usize {
        self.prefixes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty()
    }

    /// Number of IPv4 and IPv6 prefixes, in that order
    pub fn family_counts(&self) -> (usize, usize) {
        self.prefixes
            .iter()
            .fold((0, 0), |(v4, v6), prefix| match prefix {
                IpNet::V4(_) => (v4 + 1, v6),
                IpNet::V6(_) => (v4, v6 + 1),
            })
    }

    /// Check whether any prefix in the set contains the address.
    ///
    /// An IPv4 address never matches an IPv6 prefix and vice versa.
    pub fn contains(&self, addr: &IpAddr) -> bool {
        self.prefixes.iter().any(|prefix| prefix.contains(addr))
    }

    /// Sorted normalized text of every prefix
    pub fn to_sorted_strings(&self) -> Vec<String> {
        let mut prefixes: Vec<&IpNet> = self.prefixes.iter().collect();
        prefixes.sort();
        prefixes.into_iter().map(|p| p.to_string()).collect()
    }
}

impl FromIterator<IpNet> for PrefixSet {
    fn from_iter<I: IntoIterator<Item = IpNet>>(iter: I) -> Self {
        Self {
            prefixes: iter.into_iter().collect(),
        }
    }
}

impl Serialize for PrefixSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_sorted_strings().serialize(serializer)
    }
}

/// Parse a user-supplied address, trimming surrounding whitespace
pub fn parse_address(input: &str) -> RangeResult<IpAddr> {
    input
        .trim()
        .parse::<IpAddr>()
        .map_err(|_| RangeError::invalid_address(input))
}

/// Check whether a textual address falls within any prefix of the set.
///
/// Fails with [`RangeError::InvalidAddress`] before any prefix is examined if
/// the input is not an IPv4 or IPv6 address.
pub fn contains(address: &str, prefixes: &PrefixSet) -> RangeResult<bool> {
    let addr = parse_address(address)?;
    Ok(prefixes.contains(&addr))
}
