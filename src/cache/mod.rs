//! Calendar cache
//!
//! Decides whether the month held in the cache slot can be served for a
//! coordinate pair and instant, or whether a fresh month must be fetched.
//! Fetches are ordered by ticket: a fetch that completes after a newer one
//! has been committed is discarded.

mod store;

#[cfg(test)]
mod model;

pub use store::{CacheStore, FileStore, MemoryStore, CACHE_KEY};

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tracing::{debug, info, warn};

use crate::api::{CalendarRequest, ScheduleProvider};
use crate::error::PrayerError;
use crate::geo::Coordinates;
use crate::redact;
use crate::schedule::MonthlySchedule;

/// Entries older than this are refetched
pub const CACHE_MAX_AGE_HOURS: i64 = 24;

/// Coordinates moving more than this many degrees on either axis invalidate the entry
pub const COORDINATE_TOLERANCE_DEG: f64 = 0.01;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub coords: Coordinates,
    pub schedule: MonthlySchedule,
    pub captured_at: DateTime<Utc>,
}

/// Why an entry cannot be reused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaleReason {
    Moved,
    Expired,
    MonthChanged,
}

impl CacheEntry {
    /// None when the entry may be served for `coords` at `now` / `today`
    pub fn staleness(
        &self,
        coords: &Coordinates,
        now: DateTime<Utc>,
        today: NaiveDate,
    ) -> Option<StaleReason> {
        if !self.coords.is_within(coords, COORDINATE_TOLERANCE_DEG) {
            Some(StaleReason::Moved)
        } else if now.signed_duration_since(self.captured_at) > Duration::hours(CACHE_MAX_AGE_HOURS) {
            Some(StaleReason::Expired)
        } else if !self.schedule.covers_month_of(today) {
            Some(StaleReason::MonthChanged)
        } else {
            None
        }
    }
}

/// Where a resolved schedule came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleSource {
    /// Served from the slot without a network call
    Cached,
    /// Freshly fetched and committed to the slot
    Fetched,
    /// Fetched, but a newer fetch had already been committed
    Discarded,
}

#[derive(Debug, Clone)]
pub struct Resolved {
    pub schedule: MonthlySchedule,
    pub source: ScheduleSource,
}

/// Last-write-wins: a result may only replace one from an older ticket
#[inline]
pub fn should_commit(last_committed: u64, ticket: u64) -> bool {
    ticket > last_committed
}

struct Slot<S> {
    store: S,
    committed: u64,
}

pub struct CalendarCache<S, P> {
    slot: Mutex<Slot<S>>,
    provider: P,
    method: u8,
    tickets: AtomicU64,
}

impl<S: CacheStore, P: ScheduleProvider> CalendarCache<S, P> {
    pub fn new(store: S, provider: P, method: u8) -> Self {
        Self {
            slot: Mutex::new(Slot { store, committed: 0 }),
            provider,
            method,
            tickets: AtomicU64::new(0),
        }
    }

    /// Snapshot of the slot
    pub fn current(&self) -> Option<CacheEntry> {
        self.lock().store.get()
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Serve the cached month for `coords` if it is still valid at `now`,
    /// otherwise fetch the month containing `now`'s calendar date.
    pub fn resolve_schedule<Tz: TimeZone>(
        &self,
        coords: Coordinates,
        now: &DateTime<Tz>,
    ) -> impl Future<Output = Result<Resolved, PrayerError>> + '_ {
        let captured_at = now.with_timezone(&Utc);
        let today = now.date_naive();
        async move {
            if let Some(entry) = self.current() {
                match entry.staleness(&coords, captured_at, today) {
                    None => {
                        debug!("Serving cached schedule for {}-{:02}", entry.schedule.year(), entry.schedule.month());
                        return Ok(Resolved {
                            schedule: entry.schedule,
                            source: ScheduleSource::Cached,
                        });
                    }
                    Some(reason) => info!("Cached schedule is stale ({:?}), refetching", reason),
                }
            }
            self.fetch_and_commit(coords, captured_at, today).await
        }
    }

    /// Fetch unconditionally, e.g. on a manual retry
    pub fn refresh<Tz: TimeZone>(
        &self,
        coords: Coordinates,
        now: &DateTime<Tz>,
    ) -> impl Future<Output = Result<Resolved, PrayerError>> + '_ {
        let captured_at = now.with_timezone(&Utc);
        let today = now.date_naive();
        self.fetch_and_commit(coords, captured_at, today)
    }

    async fn fetch_and_commit(
        &self,
        coords: Coordinates,
        captured_at: DateTime<Utc>,
        today: NaiveDate,
    ) -> Result<Resolved, PrayerError> {
        let ticket = self.tickets.fetch_add(1, Ordering::SeqCst) + 1;
        let request = CalendarRequest::for_date(coords, self.method, today);

        // Prior entry stays untouched on failure
        let schedule = self.provider.fetch_month(&request).await?;

        let mut slot = self.lock();
        if !should_commit(slot.committed, ticket) {
            debug!(
                "Discarding fetch #{} for {}: #{} already committed",
                ticket,
                redact::coordinates(&coords),
                slot.committed
            );
            return Ok(Resolved {
                schedule,
                source: ScheduleSource::Discarded,
            });
        }

        slot.committed = ticket;
        let entry = CacheEntry {
            coords,
            schedule: schedule.clone(),
            captured_at,
        };
        if let Err(e) = slot.store.set(entry) {
            warn!("Schedule fetched but not persisted: {}", e);
        }

        Ok(Resolved {
            schedule,
            source: ScheduleSource::Fetched,
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Slot<S>> {
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::fixtures::month;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;
    use tokio::sync::Notify;

    /// Provider returning a fixed month per request and counting calls
    struct StubProvider {
        calls: AtomicUsize,
        fail: bool,
    }

    impl StubProvider {
        fn ok() -> Self {
            Self { calls: AtomicUsize::new(0), fail: false }
        }

        fn failing() -> Self {
            Self { calls: AtomicUsize::new(0), fail: true }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl ScheduleProvider for StubProvider {
        async fn fetch_month(&self, request: &CalendarRequest) -> Result<MonthlySchedule, PrayerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(PrayerError::FetchFailure("HTTP 503".into()));
            }
            Ok(month(request.year, request.month))
        }
    }

    fn casablanca() -> Coordinates {
        Coordinates::new(33.59, -7.62).unwrap()
    }

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 10, day, hour, 0, 0).unwrap()
    }

    fn seeded(captured_at: DateTime<Utc>) -> MemoryStore {
        MemoryStore::with_entry(CacheEntry {
            coords: casablanca(),
            schedule: month(2024, 10),
            captured_at,
        })
    }

    #[test]
    fn test_empty_slot_fetches_and_commits() {
        let cache = CalendarCache::new(MemoryStore::new(), StubProvider::ok(), 21);
        let resolved = tokio_test::block_on(cache.resolve_schedule(casablanca(), &at(14, 9))).unwrap();

        assert_eq!(resolved.source, ScheduleSource::Fetched);
        assert_eq!(resolved.schedule.month(), 10);
        assert_eq!(cache.provider.calls(), 1);

        let entry = cache.current().unwrap();
        assert_eq!(entry.captured_at, at(14, 9));
        assert_eq!(entry.coords, casablanca());
    }

    #[test]
    fn test_nearby_coordinates_reuse_cache() {
        let cache = CalendarCache::new(seeded(at(14, 8)), StubProvider::ok(), 21);
        let nearby = Coordinates::new(33.595, -7.615).unwrap();

        let resolved = tokio_test::block_on(cache.resolve_schedule(nearby, &at(14, 9))).unwrap();

        assert_eq!(resolved.source, ScheduleSource::Cached);
        assert_eq!(cache.provider.calls(), 0);
    }

    #[test]
    fn test_exactly_tolerance_apart_reuses_cache() {
        let cache = CalendarCache::new(seeded(at(14, 8)), StubProvider::ok(), 21);
        let edge = Coordinates::new(33.60, -7.62).unwrap();

        let resolved = tokio_test::block_on(cache.resolve_schedule(edge, &at(14, 9))).unwrap();

        assert_eq!(resolved.source, ScheduleSource::Cached);
        assert_eq!(cache.provider.calls(), 0);
    }

    #[test]
    fn test_expired_entry_refetches() {
        let cache = CalendarCache::new(seeded(at(13, 8)), StubProvider::ok(), 21);

        // 25 hours later, identical coordinates
        let resolved = tokio_test::block_on(cache.resolve_schedule(casablanca(), &at(14, 9))).unwrap();

        assert_eq!(resolved.source, ScheduleSource::Fetched);
        assert_eq!(cache.provider.calls(), 1);
        assert_eq!(cache.current().unwrap().captured_at, at(14, 9));
    }

    #[test]
    fn test_exactly_24_hours_is_still_fresh() {
        let cache = CalendarCache::new(seeded(at(13, 9)), StubProvider::ok(), 21);
        let resolved = tokio_test::block_on(cache.resolve_schedule(casablanca(), &at(14, 9))).unwrap();
        assert_eq!(resolved.source, ScheduleSource::Cached);
    }

    #[test]
    fn test_moved_coordinates_refetch() {
        let cache = CalendarCache::new(seeded(at(14, 8)), StubProvider::ok(), 21);
        let mecca = Coordinates::new(21.42, 39.83).unwrap();

        let resolved = tokio_test::block_on(cache.resolve_schedule(mecca, &at(14, 9))).unwrap();

        assert_eq!(resolved.source, ScheduleSource::Fetched);
        assert_eq!(cache.current().unwrap().coords, mecca);
    }

    #[test]
    fn test_month_rollover_refetches() {
        let cache = CalendarCache::new(seeded(at(31, 20)), StubProvider::ok(), 21);
        let november = Utc.with_ymd_and_hms(2024, 11, 1, 0, 30, 0).unwrap();

        let resolved = tokio_test::block_on(cache.resolve_schedule(casablanca(), &november)).unwrap();

        assert_eq!(resolved.source, ScheduleSource::Fetched);
        assert_eq!(resolved.schedule.month(), 11);
        assert_eq!(resolved.schedule.len(), 30);
    }

    #[test]
    fn test_failed_fetch_keeps_prior_entry() {
        let cache = CalendarCache::new(seeded(at(13, 8)), StubProvider::failing(), 21);

        let err = tokio_test::block_on(cache.resolve_schedule(casablanca(), &at(14, 9))).unwrap_err();

        assert!(matches!(err, PrayerError::FetchFailure(_)));
        assert_eq!(cache.current().unwrap().captured_at, at(13, 8));
    }

    #[test]
    fn test_refresh_ignores_fresh_entry() {
        let cache = CalendarCache::new(seeded(at(14, 8)), StubProvider::ok(), 21);
        let resolved = tokio_test::block_on(cache.refresh(casablanca(), &at(14, 9))).unwrap();
        assert_eq!(resolved.source, ScheduleSource::Fetched);
        assert_eq!(cache.provider.calls(), 1);
    }

    #[test]
    fn test_local_date_picks_month() {
        // 23:30 UTC on 31 Oct is already 1 Nov in UTC+1
        let tz = chrono::FixedOffset::east_opt(3600).unwrap();
        let now = tz.with_ymd_and_hms(2024, 11, 1, 0, 30, 0).unwrap();
        let cache = CalendarCache::new(MemoryStore::new(), StubProvider::ok(), 21);

        let resolved = tokio_test::block_on(cache.resolve_schedule(casablanca(), &now)).unwrap();

        assert_eq!(resolved.schedule.month(), 11);
        assert_eq!(cache.current().unwrap().captured_at, at(31, 23) + Duration::minutes(30));
    }

    #[test]
    fn test_should_commit() {
        assert!(should_commit(0, 1));
        assert!(should_commit(3, 5));
        assert!(!should_commit(5, 5));
        assert!(!should_commit(5, 4));
    }

    /// Provider whose first call blocks until released, so a second request
    /// can overtake it.
    struct GatedProvider {
        calls: AtomicUsize,
        gate: Arc<Notify>,
    }

    impl ScheduleProvider for GatedProvider {
        async fn fetch_month(&self, request: &CalendarRequest) -> Result<MonthlySchedule, PrayerError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call == 0 {
                self.gate.notified().await;
            }
            Ok(month(request.year, request.month))
        }
    }

    #[tokio::test]
    async fn test_late_fetch_is_discarded() {
        let gate = Arc::new(Notify::new());
        let cache = Arc::new(CalendarCache::new(
            MemoryStore::new(),
            GatedProvider { calls: AtomicUsize::new(0), gate: gate.clone() },
            21,
        ));
        let first_coords = casablanca();
        let second_coords = Coordinates::new(34.02, -6.84).unwrap();

        let slow = {
            let cache = cache.clone();
            tokio::spawn(async move { cache.refresh(first_coords, &at(14, 9)).await })
        };
        // Let the first request take its ticket and park on the gate
        while cache.provider.calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }

        let fast = cache.refresh(second_coords, &at(14, 10)).await.unwrap();
        assert_eq!(fast.source, ScheduleSource::Fetched);

        gate.notify_one();
        let late = slow.await.unwrap().unwrap();
        assert_eq!(late.source, ScheduleSource::Discarded);

        let entry = cache.current().unwrap();
        assert_eq!(entry.coords, second_coords);
        assert_eq!(entry.captured_at, at(14, 10));
    }
}
