//! Process-wide cache of the egress range list
//!
//! [`RangeCache`] owns the current prefix snapshot and decides, on each
//! explicit refresh call, whether the data is still fresh, can be warmed from
//! the local copy, or must be fetched again.
//!
//! Readers clone an `Arc` snapshot and never observe a half-applied refresh.
//! Refreshes are serialized by a separate guard that also records the outcome
//! of the last fetch attempt. A caller that waited on the guard while another
//! caller fetched takes that outcome instead of fetching again, so concurrent
//! triggers collapse into a single fetch whether it succeeds or fails.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;
use tracing::{info, warn};

use super::error::{RangeError, RangeResult};
use super::file_cache::RangeFileCache;
use super::parser::parse_ranges;
use super::prefix_set::{self, PrefixSet};
use super::source::{HttpRangeSource, RangeSource};
use crate::config::RelaycheckConfig;

/// Immutable snapshot of the cache contents
#[derive(Debug, Clone, Default)]
pub struct CacheState {
    pub prefixes: Arc<PrefixSet>,
    pub last_refreshed: Option<DateTime<Utc>>,
}

/// What a refresh call did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RefreshOutcome {
    /// Data was still fresh; nothing changed
    Fresh,
    /// In-memory set was empty and was populated from the local copy
    LoadedLocal { count: usize },
    /// The list was fetched from the remote origin
    Fetched { count: usize, skipped: usize },
}

impl std::fmt::Display for RefreshOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RefreshOutcome::Fresh => write!(f, "range data is fresh"),
            RefreshOutcome::LoadedLocal { count } => {
                write!(f, "loaded {} prefixes from local copy", count)
            }
            RefreshOutcome::Fetched { count, skipped } => write!(
                f,
                "fetched {} prefixes ({} rows skipped)",
                count, skipped
            ),
        }
    }
}

/// Summary of the cache, for status endpoints
#[derive(Debug, Clone, Serialize)]
pub struct CacheStatus {
    pub source_url: String,
    pub prefix_count: usize,
    pub ipv4_count: usize,
    pub ipv6_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_refreshed: Option<DateTime<Utc>>,
    pub local_copy_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_copy_modified: Option<DateTime<Utc>>,
    pub max_age_secs: u64,
}

/// Last fetch attempt, held under the refresh guard
#[derive(Debug, Default)]
struct FetchAttempt {
    generation: u64,
    error: Option<String>,
}

/// Refreshable cache of egress prefixes
pub struct RangeCache {
    state: RwLock<Arc<CacheState>>,
    refresh_guard: Mutex<FetchAttempt>,
    /// Mirrors `FetchAttempt::generation` for reads outside the guard
    fetch_generation: AtomicU64,
    file_cache: RangeFileCache,
    source: Box<dyn RangeSource>,
    max_age: Duration,
}

impl RangeCache {
    /// Create an empty cache backed by the given local copy and source
    pub fn new(
        file_cache: RangeFileCache,
        source: impl RangeSource + 'static,
        max_age: Duration,
    ) -> Self {
        Self {
            state: RwLock::new(Arc::new(CacheState::default())),
            refresh_guard: Mutex::new(FetchAttempt::default()),
            fetch_generation: AtomicU64::new(0),
            file_cache,
            source: Box::new(source),
            max_age,
        }
    }

    /// Create a cache using the configured data directory, URL, TTL and timeout
    pub fn from_config(config: &RelaycheckConfig) -> RangeResult<Self> {
        let file_cache = RangeFileCache::new(&config.data_dir)?;
        let source = HttpRangeSource::new(config.ranges_url.clone(), config.fetch_timeout());
        Ok(Self::new(file_cache, source, config.ranges_cache_ttl()))
    }

    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    pub fn file_cache(&self) -> &RangeFileCache {
        &self.file_cache
    }

    /// Current snapshot of prefixes and refresh time
    pub fn snapshot(&self) -> Arc<CacheState> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Current prefix set. Never triggers a refresh.
    pub fn current_prefixes(&self) -> Arc<PrefixSet> {
        self.snapshot().prefixes.clone()
    }

    pub fn last_refreshed(&self) -> Option<DateTime<Utc>> {
        self.snapshot().last_refreshed
    }

    /// Refresh the cache if data is older than the configured max age
    pub fn ensure_fresh(&self, now: DateTime<Utc>) -> RangeResult<RefreshOutcome> {
        self.refresh(now, self.max_age)
    }

    /// Refresh the cache if data is older than `max_age` at `now`.
    ///
    /// 1. Local copy younger than `max_age` and prefixes loaded: no-op.
    /// 2. Local copy younger than `max_age` but nothing loaded: parse the copy.
    /// 3. Otherwise fetch, overwrite the copy, and swap in the new prefixes.
    ///
    /// On fetch failure the previous prefixes and refresh time stay in effect.
    /// A caller that waited while another caller fetched gets that fetch's
    /// result (`Fresh` or its error) without fetching itself.
    pub fn refresh(&self, now: DateTime<Utc>, max_age: Duration) -> RangeResult<RefreshOutcome> {
        let seen = self.fetch_generation.load(Ordering::Acquire);
        let mut attempt = self.lock_refresh();

        if attempt.generation != seen {
            return match &attempt.error {
                None => Ok(RefreshOutcome::Fresh),
                Some(reason) => Err(RangeError::fetch(self.source.url(), reason)),
            };
        }

        if self.file_cache.is_fresh(now, max_age) {
            if !self.current_prefixes().is_empty() {
                return Ok(RefreshOutcome::Fresh);
            }
            if let Some(outcome) = self.load_local() {
                return Ok(outcome);
            }
        }

        self.record_fetch(&mut attempt, now)
    }

    /// Fetch from the remote origin regardless of freshness
    pub fn force_refresh(&self) -> RangeResult<RefreshOutcome> {
        let mut attempt = self.lock_refresh();
        self.record_fetch(&mut attempt, Utc::now())
    }

    /// Check whether an address is in the current prefix set.
    ///
    /// Does not refresh; call [`RangeCache::ensure_fresh`] first.
    pub fn is_member(&self, address: &str) -> RangeResult<bool> {
        prefix_set::contains(address, &self.current_prefixes())
    }

    pub fn status(&self) -> CacheStatus {
        let snapshot = self.snapshot();
        let (ipv4_count, ipv6_count) = snapshot.prefixes.family_counts();
        CacheStatus {
            source_url: self.source.url().to_string(),
            prefix_count: snapshot.prefixes.len(),
            ipv4_count,
            ipv6_count,
            last_refreshed: snapshot.last_refreshed,
            local_copy_path: self.file_cache.path().display().to_string(),
            local_copy_modified: self.file_cache.modified_at(),
            max_age_secs: self.max_age.as_secs(),
        }
    }

    fn lock_refresh(&self) -> MutexGuard<'_, FetchAttempt> {
        self.refresh_guard
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Fetch, then publish the attempt to callers queued on the guard
    fn record_fetch(
        &self,
        attempt: &mut FetchAttempt,
        now: DateTime<Utc>,
    ) -> RangeResult<RefreshOutcome> {
        let result = self.fetch_and_replace(now);
        attempt.generation += 1;
        attempt.error = match &result {
            Ok(_) => None,
            Err(RangeError::Fetch { reason, .. }) => Some(reason.clone()),
            Err(e) => Some(e.to_string()),
        };
        self.fetch_generation
            .store(attempt.generation, Ordering::Release);
        result
    }

    fn replace(&self, prefixes: PrefixSet, last_refreshed: Option<DateTime<Utc>>) {
        let next = Arc::new(CacheState {
            prefixes: Arc::new(prefixes),
            last_refreshed,
        });
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = next;
    }

    fn load_local(&self) -> Option<RefreshOutcome> {
        let raw = match self.file_cache.load() {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Unable to read local range copy, fetching instead: {}", e);
                return None;
            }
        };

        let parsed = parse_ranges(&raw);
        if parsed.prefixes.is_empty() {
            warn!(
                "Local range copy {:?} has no valid prefixes, fetching instead",
                self.file_cache.path()
            );
            return None;
        }

        let count = parsed.prefixes.len();
        self.replace(parsed.prefixes, self.file_cache.modified_at());
        info!(
            "Loaded {} prefixes from local copy {:?}",
            count,
            self.file_cache.path()
        );
        Some(RefreshOutcome::LoadedLocal { count })
    }

    fn fetch_and_replace(&self, now: DateTime<Utc>) -> RangeResult<RefreshOutcome> {
        let raw = self.source.fetch().inspect_err(|e| {
            warn!("Range refresh failed, keeping previous data: {}", e);
        })?;

        let parsed = parse_ranges(&raw);
        if parsed.prefixes.is_empty() {
            let err = RangeError::fetch(self.source.url(), "document contains no valid prefixes");
            warn!("Range refresh failed, keeping previous data: {}", err);
            return Err(err);
        }

        if let Err(e) = self.file_cache.store(&raw) {
            warn!("Unable to write local range copy: {}", e);
        }

        let count = parsed.prefixes.len();
        let skipped = parsed.skipped;
        self.replace(parsed.prefixes, Some(now));
        info!(
            "Fetched {} prefixes from {} ({} rows skipped)",
            count,
            self.source.url(),
            skipped
        );
        Ok(RefreshOutcome::Fetched { count, skipped })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    const DOC: &str = "203.0.113.0/24,US,US-CA,San Jose,\n2001:db8::/32,US,US-CA,San Jose,\n";

    /// In-memory source with a swappable body and a fetch counter
    #[derive(Clone)]
    struct FakeSource {
        body: Arc<Mutex<Option<String>>>,
        fetches: Arc<AtomicUsize>,
        delay: Duration,
    }

    impl FakeSource {
        fn new(body: &str) -> Self {
            Self {
                body: Arc::new(Mutex::new(Some(body.to_string()))),
                fetches: Arc::new(AtomicUsize::new(0)),
                delay: Duration::ZERO,
            }
        }

        fn set_body(&self, body: Option<&str>) {
            *self.body.lock().unwrap() = body.map(str::to_string);
        }

        fn fetches(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }
    }

    impl RangeSource for FakeSource {
        fn url(&self) -> &str {
            "https://ranges.test/egress-ip-ranges.csv"
        }

        fn fetch(&self) -> RangeResult<String> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(self.delay);
            self.body
                .lock()
                .unwrap()
                .clone()
                .ok_or_else(|| RangeError::fetch(self.url(), "connection refused"))
        }
    }

    fn setup(source: &FakeSource) -> (TempDir, RangeCache) {
        let temp_dir = tempfile::tempdir().unwrap();
        let file_cache = RangeFileCache::new(temp_dir.path().to_str().unwrap()).unwrap();
        let cache = RangeCache::new(file_cache, source.clone(), Duration::from_secs(24 * 60 * 60));
        (temp_dir, cache)
    }

    #[test]
    fn test_first_refresh_fetches() {
        let source = FakeSource::new(DOC);
        let (_dir, cache) = setup(&source);

        assert!(cache.current_prefixes().is_empty());
        assert!(cache.last_refreshed().is_none());

        let now = Utc::now();
        let outcome = cache.ensure_fresh(now).unwrap();
        assert_eq!(outcome, RefreshOutcome::Fetched { count: 2, skipped: 0 });
        assert_eq!(cache.current_prefixes().len(), 2);
        assert_eq!(cache.last_refreshed(), Some(now));
        assert!(cache.file_cache().exists());
        assert_eq!(cache.file_cache().load().unwrap(), DOC);
    }

    #[test]
    fn test_ensure_fresh_is_idempotent() {
        let source = FakeSource::new(DOC);
        let (_dir, cache) = setup(&source);

        cache.ensure_fresh(Utc::now()).unwrap();
        let before = cache.snapshot();

        let outcome = cache.ensure_fresh(Utc::now()).unwrap();
        assert_eq!(outcome, RefreshOutcome::Fresh);
        assert_eq!(source.fetches(), 1);

        let after = cache.snapshot();
        assert_eq!(before.prefixes, after.prefixes);
        assert_eq!(before.last_refreshed, after.last_refreshed);
    }

    #[test]
    fn test_exact_max_age_is_stale() {
        let source = FakeSource::new(DOC);
        let (_dir, cache) = setup(&source);
        let max_age = cache.max_age();

        cache.ensure_fresh(Utc::now()).unwrap();
        let modified_at = cache.file_cache().modified_at().unwrap();
        let max_age_chrono = chrono::Duration::from_std(max_age).unwrap();

        let just_before = modified_at + max_age_chrono - chrono::Duration::seconds(1);
        assert_eq!(cache.refresh(just_before, max_age).unwrap(), RefreshOutcome::Fresh);
        assert_eq!(source.fetches(), 1);

        let exactly = modified_at + max_age_chrono;
        let outcome = cache.refresh(exactly, max_age).unwrap();
        assert!(matches!(outcome, RefreshOutcome::Fetched { .. }));
        assert_eq!(source.fetches(), 2);
        assert_eq!(cache.last_refreshed(), Some(exactly));
    }

    #[test]
    fn test_warm_start_from_local_copy() {
        let source = FakeSource::new(DOC);
        let (dir, cache) = setup(&source);
        cache.ensure_fresh(Utc::now()).unwrap();
        assert_eq!(source.fetches(), 1);

        // A new process sharing the same data directory
        let restarted_source = FakeSource::new(DOC);
        let file_cache = RangeFileCache::new(dir.path().to_str().unwrap()).unwrap();
        let restarted = RangeCache::new(file_cache, restarted_source.clone(), cache.max_age());

        let outcome = restarted.ensure_fresh(Utc::now()).unwrap();
        assert_eq!(outcome, RefreshOutcome::LoadedLocal { count: 2 });
        assert_eq!(restarted_source.fetches(), 0);
        assert_eq!(restarted.current_prefixes(), cache.current_prefixes());
        assert_eq!(
            restarted.last_refreshed(),
            restarted.file_cache().modified_at()
        );
    }

    #[test]
    fn test_fetch_failure_keeps_previous_state() {
        let source = FakeSource::new(DOC);
        let (_dir, cache) = setup(&source);
        cache.ensure_fresh(Utc::now()).unwrap();
        let before = cache.snapshot();

        source.set_body(None);
        let err = cache.force_refresh().unwrap_err();
        assert!(matches!(err, RangeError::Fetch { .. }));

        let after = cache.snapshot();
        assert_eq!(before.prefixes, after.prefixes);
        assert_eq!(before.last_refreshed, after.last_refreshed);
        assert_eq!(cache.file_cache().load().unwrap(), DOC);
    }

    #[test]
    fn test_stale_fetch_failure_keeps_previous_state() {
        let source = FakeSource::new(DOC);
        let (_dir, cache) = setup(&source);
        cache.ensure_fresh(Utc::now()).unwrap();
        let before = cache.current_prefixes();

        source.set_body(None);
        let tomorrow = Utc::now() + chrono::Duration::hours(48);
        assert!(cache.ensure_fresh(tomorrow).is_err());
        assert_eq!(cache.current_prefixes(), before);
        assert!(cache.is_member("203.0.113.5").unwrap());
    }

    #[test]
    fn test_empty_document_rejected() {
        let source = FakeSource::new("<html>maintenance</html>\n");
        let (_dir, cache) = setup(&source);

        let err = cache.ensure_fresh(Utc::now()).unwrap_err();
        assert!(matches!(err, RangeError::Fetch { ref reason, .. } if reason.contains("no valid prefixes")));
        assert!(cache.current_prefixes().is_empty());
        assert!(cache.last_refreshed().is_none());
        assert!(!cache.file_cache().exists());
    }

    #[test]
    fn test_skipped_rows_reported() {
        let source = FakeSource::new("ip_prefix,country\n203.0.113.0/24,US\ngarbage\n");
        let (_dir, cache) = setup(&source);

        let outcome = cache.force_refresh().unwrap();
        assert_eq!(outcome, RefreshOutcome::Fetched { count: 1, skipped: 2 });
    }

    #[test]
    fn test_concurrent_refreshes_collapse() {
        let mut source = FakeSource::new(DOC);
        source.delay = Duration::from_millis(50);
        let (_dir, cache) = setup(&source);
        let cache = Arc::new(cache);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                std::thread::spawn(move || cache.ensure_fresh(Utc::now()).unwrap())
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(source.fetches(), 1);
        assert_eq!(cache.current_prefixes().len(), 2);
    }

    #[test]
    fn test_concurrent_failed_refreshes_collapse() {
        let mut source = FakeSource::new(DOC);
        source.delay = Duration::from_millis(100);
        let (_dir, cache) = setup(&source);
        cache.ensure_fresh(Utc::now()).unwrap();
        let before = cache.current_prefixes();

        source.set_body(None);
        let cache = Arc::new(cache);
        let later = Utc::now() + chrono::Duration::hours(48);
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                std::thread::spawn(move || cache.ensure_fresh(later))
            })
            .collect();
        for handle in handles {
            let err = handle.join().unwrap().unwrap_err();
            assert!(matches!(err, RangeError::Fetch { ref reason, .. } if reason == "connection refused"));
        }

        // One fetch for the initial load, one for the outage
        assert_eq!(source.fetches(), 2);
        assert_eq!(cache.current_prefixes(), before);

        // A later caller that did not wait on the failed attempt retries
        assert!(cache.ensure_fresh(later).is_err());
        assert_eq!(source.fetches(), 3);
    }

    #[test]
    fn test_membership_scenarios() {
        let source = FakeSource::new("203.0.113.0/24\n");
        let (_dir, cache) = setup(&source);

        // Empty set: any valid address is not a member
        assert!(!cache.is_member("203.0.113.5").unwrap());

        cache.ensure_fresh(Utc::now()).unwrap();
        assert!(cache.is_member("203.0.113.5").unwrap());
        assert!(!cache.is_member("198.51.100.7").unwrap());
        assert!(!cache.is_member("2001:db8::1").unwrap());
        assert!(cache.is_member("not-an-ip").unwrap_err().is_invalid_address());
    }

    #[test]
    fn test_status() {
        let source = FakeSource::new(DOC);
        let (_dir, cache) = setup(&source);
        cache.ensure_fresh(Utc::now()).unwrap();

        let status = cache.status();
        assert_eq!(status.prefix_count, 2);
        assert_eq!(status.ipv4_count, 1);
        assert_eq!(status.ipv6_count, 1);
        assert_eq!(status.max_age_secs, 86400);
        assert_eq!(status.source_url, "https://ranges.test/egress-ip-ranges.csv");
        assert!(status.local_copy_modified.is_some());

        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["prefix_count"], 2);
    }

    #[test]
    fn test_outcome_display() {
        assert_eq!(RefreshOutcome::Fresh.to_string(), "range data is fresh");
        assert_eq!(
            RefreshOutcome::Fetched { count: 3, skipped: 1 }.to_string(),
            "fetched 3 prefixes (1 rows skipped)"
        );
        assert_eq!(
            serde_json::to_string(&RefreshOutcome::LoadedLocal { count: 2 }).unwrap(),
            r#"{"outcome":"loaded_local","count":2}"#
        );
    }
}
