//! Egress range list: parsing, local copy, remote source and the refreshable
//! membership cache.
//!
//! - `parser` - turns the published CSV into a [`PrefixSet`]
//! - `prefix_set` - the set type and the containment test
//! - `file_cache` - the on-disk copy whose mtime decides staleness
//! - `source` - where the list is fetched from
//! - `cache` - [`RangeCache`], tying the above together

pub mod cache;
pub mod error;
pub mod file_cache;
pub mod parser;
pub mod prefix_set;
pub mod source;

pub use cache::{CacheState, CacheStatus, RangeCache, RefreshOutcome};
pub use error::{RangeError, RangeResult};
pub use file_cache::{RangeFileCache, DEFAULT_RANGES_TTL, RANGES_CACHE_FILE};
pub use parser::{parse_prefix, parse_ranges, ParsedRanges};
pub use prefix_set::{contains, parse_address, PrefixSet};
pub use source::{HttpRangeSource, RangeSource, DEFAULT_FETCH_TIMEOUT, DEFAULT_RANGES_URL};
