#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

//! relaycheck - egress IP range lookup
//!
//! relaycheck answers whether an IP address belongs to a published egress
//! proxy range list (by default the iCloud Private Relay egress ranges), and
//! enriches the answer with registration/geolocation metadata. It can be used
//! as a library, a command-line tool, or a small HTTP service.
//!
//! # Feature Flags
//!
//! | Feature | Description | Key Dependencies |
//! |---------|-------------|------------------|
//! | (none) | Range cache, membership test, lenses | `ipnet`, `ureq` |
//! | `cli` | CLI binary and HTTP server | `clap`, `axum`, `tokio` |
//!
//! # Architecture
//!
//! - **[`ranges`]**: the egress range list
//!   - `parser`: CSV rows into validated prefixes, skipping malformed rows
//!   - `prefix_set`: the prefix set and the containment test
//!   - `file_cache`: local copy whose modification time decides staleness
//!   - `cache`: [`RangeCache`], the refreshable process-wide snapshot
//!
//! - **[`lens`]**: business logic shared by CLI and server
//!   - `ip`: registration/geolocation lookup
//!   - `relay`: membership verdict merged with metadata
//!
//! - **[`config`]**: configuration management
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use relaycheck::{RangeCache, RelaycheckConfig};
//! use chrono::Utc;
//!
//! let config = RelaycheckConfig::new(&None)?;
//! let cache = RangeCache::from_config(&config)?;
//!
//! // Fetch or reuse the range list (no-op while fresh)
//! cache.ensure_fresh(Utc::now())?;
//!
//! if cache.is_member("172.224.224.5")? {
//!     println!("egress relay address");
//! }
//! ```

pub mod config;
pub mod lens;
pub mod ranges;

// Server module - requires CLI feature
#[cfg(feature = "cli")]
pub mod server;

pub use config::{format_size, RelaycheckConfig};

pub use ranges::{
    contains, parse_address, parse_ranges, CacheStatus, HttpRangeSource, PrefixSet, RangeCache,
    RangeError, RangeFileCache, RangeResult, RangeSource, RefreshOutcome, DEFAULT_RANGES_TTL,
    DEFAULT_RANGES_URL,
};

pub use lens::ip::{IpDetails, IpLens, LookupGateway};
pub use lens::relay::{MembershipResult, RelayCheckResult, RelayLens};
pub use lens::utils::OutputFormat;

#[cfg(feature = "cli")]
pub use server::{create_axum_router, start_server, ServerConfig, ServerState};
