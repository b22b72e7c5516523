//! Per-session, TTL-bounded hierarchy cache with single-flight refresh.
//!
//! The slot lives behind a plain `Mutex` that is only held to inspect or swap
//! it, never across an `.await`. A refresh runs on its own tokio task, which
//! settles the slot when the directory answers, whether or not anyone is still
//! waiting. Callers wait on a `Shared` handle to that task stored in the slot,
//! so N concurrent callers cost one directory round-trip and all see the same
//! result.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use serde::Serialize;

use orgscope_auth::{AccessLevel, Principal};
use orgscope_core::{Clock, SystemClock, UserId};
use orgscope_directory::{DirectoryClient, HierarchyFetchError, HierarchySnapshot, TeamHierarchyFetcher};

use crate::ScopeError;

type SharedFetch = Shared<BoxFuture<'static, Result<Arc<HierarchySnapshot>, HierarchyFetchError>>>;

/// Observable cache state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheState {
    Empty,
    Fresh,
    Stale,
    Refreshing,
}

enum Slot {
    Empty,
    Ready(Arc<HierarchySnapshot>),
    Refreshing { flight: u64, fetch: SharedFetch },
}

pub struct HierarchyCache<C> {
    owner: UserId,
    fetcher: Arc<TeamHierarchyFetcher<C>>,
    clock: Arc<dyn Clock>,
    ttl: chrono::Duration,
    slot: Arc<Mutex<Slot>>,
    next_flight: AtomicU64,
    fetches: AtomicU64,
}

impl<C> HierarchyCache<C>
where
    C: DirectoryClient + 'static,
{
    /// Cache bound to `owner`; other principals are refused.
    pub fn new(owner: UserId, fetcher: TeamHierarchyFetcher<C>, ttl: chrono::Duration) -> Self {
        Self {
            owner,
            fetcher: Arc::new(fetcher),
            clock: Arc::new(SystemClock),
            ttl,
            slot: Arc::new(Mutex::new(Slot::Empty)),
            next_flight: AtomicU64::new(0),
            fetches: AtomicU64::new(0),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn owner(&self) -> &UserId {
        &self.owner
    }

    pub fn ttl(&self) -> chrono::Duration {
        self.ttl
    }

    /// Number of directory fetches started since creation.
    pub fn fetch_count(&self) -> u64 {
        self.fetches.load(Ordering::Relaxed)
    }

    pub fn state(&self) -> CacheState {
        match &*self.lock() {
            Slot::Empty => CacheState::Empty,
            Slot::Refreshing { .. } => CacheState::Refreshing,
            Slot::Ready(snapshot) if snapshot.is_fresh(self.clock.now(), self.ttl) => CacheState::Fresh,
            Slot::Ready(_) => CacheState::Stale,
        }
    }

    /// Drop the cached snapshot; the next call refetches.
    ///
    /// An in-flight refresh is left alone and will still settle the slot.
    pub fn invalidate(&self) {
        let mut slot = self.lock();
        if matches!(*slot, Slot::Ready(_)) {
            *slot = Slot::Empty;
            tracing::debug!(principal_id = %self.owner, "hierarchy cache invalidated");
        }
    }

    /// Fresh snapshot for `principal`, refreshing at most once concurrently.
    ///
    /// On failure the slot is cleared and every joined caller receives the
    /// same error; the next call starts a new fetch. Dropping the returned
    /// future does not cancel a refresh it started. Must run inside a tokio
    /// runtime.
    pub async fn get_or_refresh(
        &self,
        level: AccessLevel,
        principal: &Principal,
    ) -> Result<Arc<HierarchySnapshot>, ScopeError> {
        if principal.id != self.owner {
            return Err(ScopeError::PrincipalMismatch {
                expected: self.owner.clone(),
                actual: principal.id.clone(),
            });
        }

        let fetch = {
            let mut slot = self.lock();
            match &*slot {
                Slot::Ready(snapshot) if snapshot.is_fresh(self.clock.now(), self.ttl) => {
                    tracing::debug!(principal_id = %self.owner, "hierarchy cache hit");
                    return Ok(Arc::clone(snapshot));
                }
                Slot::Refreshing { flight, fetch } => {
                    tracing::debug!(principal_id = %self.owner, flight, "joining in-flight refresh");
                    fetch.clone()
                }
                Slot::Empty | Slot::Ready(_) => {
                    let flight = self.next_flight.fetch_add(1, Ordering::Relaxed);
                    let fetch = self.start_fetch(flight, level, principal.clone());
                    *slot = Slot::Refreshing {
                        flight,
                        fetch: fetch.clone(),
                    };
                    tracing::info!(principal_id = %self.owner, level = %level, flight, "refreshing hierarchy");
                    fetch
                }
            }
        };

        fetch.await.map_err(ScopeError::from)
    }

    /// Spawn the fetch for `flight`. Must be called with the slot locked so
    /// the task cannot settle before the slot records the flight.
    fn start_fetch(&self, flight: u64, level: AccessLevel, principal: Principal) -> SharedFetch {
        self.fetches.fetch_add(1, Ordering::Relaxed);
        let fetcher = Arc::clone(&self.fetcher);
        let slot = Arc::clone(&self.slot);

        let task = tokio::spawn(async move {
            let result = fetcher.fetch(level, &principal).await.map(Arc::new);
            settle(&slot, flight, &principal.id, &result);
            result
        });

        let slot = Arc::clone(&self.slot);
        let owner = self.owner.clone();
        async move {
            match task.await {
                Ok(result) => result,
                Err(join_err) => {
                    let result = Err(HierarchyFetchError::Interrupted(join_err.to_string()));
                    settle(&slot, flight, &owner, &result);
                    result
                }
            }
        }
        .boxed()
        .shared()
    }

    fn lock(&self) -> MutexGuard<'_, Slot> {
        lock_slot(&self.slot)
    }
}

fn lock_slot(slot: &Mutex<Slot>) -> MutexGuard<'_, Slot> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Store the outcome of `flight`, unless a newer state already replaced it.
fn settle(
    slot: &Mutex<Slot>,
    flight: u64,
    owner: &UserId,
    result: &Result<Arc<HierarchySnapshot>, HierarchyFetchError>,
) {
    let mut slot = lock_slot(slot);
    let current = matches!(&*slot, Slot::Refreshing { flight: f, .. } if *f == flight);
    if !current {
        return;
    }

    *slot = match result {
        Ok(snapshot) => Slot::Ready(Arc::clone(snapshot)),
        Err(err) => {
            tracing::warn!(principal_id = %owner, error = %err, "hierarchy refresh failed; cache cleared");
            Slot::Empty
        }
    };
}

impl<C> core::fmt::Debug for HierarchyCache<C> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("HierarchyCache")
            .field("owner", &self.owner)
            .field("ttl", &self.ttl)
            .field("fetches", &self.fetches.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use orgscope_auth::Role;
    use orgscope_core::{DepartmentId, ManualClock, TenantId};
    use orgscope_directory::wire::{MemberNode, MembersResponse, TeamsResponse};
    use std::sync::atomic::AtomicBool;
    use std::time::Duration;

    /// Directory fake: counts calls, can fail, answers after a short delay so
    /// concurrent callers overlap.
    #[derive(Default)]
    struct CountingDirectory {
        calls: AtomicU64,
        failing: AtomicBool,
    }

    impl CountingDirectory {
        fn calls(&self) -> u64 {
            self.calls.load(Ordering::SeqCst)
        }

        fn set_failing(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl DirectoryClient for CountingDirectory {
        async fn tenant_teams(
            &self,
            _tenant: &TenantId,
            _department: Option<&DepartmentId>,
        ) -> Result<TeamsResponse, HierarchyFetchError> {
            Ok(TeamsResponse { results: vec![] })
        }

        async fn manager_teams(
            &self,
            _tenant: &TenantId,
            _manager: &UserId,
        ) -> Result<TeamsResponse, HierarchyFetchError> {
            Ok(TeamsResponse { results: vec![] })
        }

        async fn team_members(
            &self,
            _tenant: &TenantId,
            _lead: &UserId,
        ) -> Result<MembersResponse, HierarchyFetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            if self.failing.load(Ordering::SeqCst) {
                return Err(HierarchyFetchError::transport("connection refused"));
            }
            Ok(MembersResponse {
                results: vec![MemberNode {
                    member_user_id: Some("u2".into()),
                }],
            })
        }
    }

    fn lead() -> Principal {
        Principal::new(UserId::new("u1"), Role::TEAM_LEAD, TenantId::new("t1"))
    }

    fn cache(
        directory: &Arc<CountingDirectory>,
        clock: &Arc<ManualClock>,
    ) -> HierarchyCache<Arc<CountingDirectory>> {
        let fetcher = TeamHierarchyFetcher::new(Arc::clone(directory)).with_clock(clock.clone());
        HierarchyCache::new(UserId::new("u1"), fetcher, chrono::Duration::minutes(5))
            .with_clock(clock.clone())
    }

    #[tokio::test]
    async fn fresh_snapshot_is_reused() {
        let directory = Arc::new(CountingDirectory::default());
        let clock = Arc::new(ManualClock::default());
        let cache = cache(&directory, &clock);
        assert_eq!(cache.state(), CacheState::Empty);

        let first = cache.get_or_refresh(AccessLevel::Team, &lead()).await.unwrap();
        clock.advance(chrono::Duration::minutes(4));
        let second = cache.get_or_refresh(AccessLevel::Team, &lead()).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(directory.calls(), 1);
        assert_eq!(cache.state(), CacheState::Fresh);
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_fetch() {
        let directory = Arc::new(CountingDirectory::default());
        let clock = Arc::new(ManualClock::default());
        let cache = cache(&directory, &clock);
        let principal = lead();

        let results = futures::future::join_all(
            (0..16).map(|_| cache.get_or_refresh(AccessLevel::Team, &principal)),
        )
        .await;

        assert_eq!(directory.calls(), 1);
        assert_eq!(cache.fetch_count(), 1);
        let first = results[0].as_ref().unwrap();
        for result in &results {
            assert!(Arc::ptr_eq(first, result.as_ref().unwrap()));
        }
    }

    #[tokio::test]
    async fn expired_snapshot_is_refetched() {
        let directory = Arc::new(CountingDirectory::default());
        let clock = Arc::new(ManualClock::default());
        let cache = cache(&directory, &clock);

        cache.get_or_refresh(AccessLevel::Team, &lead()).await.unwrap();
        clock.advance(chrono::Duration::minutes(6));
        assert_eq!(cache.state(), CacheState::Stale);

        let refreshed = cache.get_or_refresh(AccessLevel::Team, &lead()).await.unwrap();
        assert_eq!(directory.calls(), 2);
        assert_eq!(refreshed.fetched_at(), clock.now());
    }

    #[tokio::test]
    async fn failure_reaches_every_joiner_and_clears_cache() {
        let directory = Arc::new(CountingDirectory::default());
        let clock = Arc::new(ManualClock::default());
        let cache = cache(&directory, &clock);

        cache.get_or_refresh(AccessLevel::Team, &lead()).await.unwrap();
        clock.advance(chrono::Duration::minutes(6));
        directory.set_failing(true);

        let principal = lead();
        let results = futures::future::join_all(
            (0..4).map(|_| cache.get_or_refresh(AccessLevel::Team, &principal)),
        )
        .await;

        let expected = ScopeError::Fetch(HierarchyFetchError::transport("connection refused"));
        for result in results {
            assert_eq!(result.unwrap_err(), expected);
        }
        assert_eq!(directory.calls(), 2);
        assert_eq!(cache.state(), CacheState::Empty);
    }

    #[tokio::test]
    async fn caller_after_failure_starts_new_fetch() {
        let directory = Arc::new(CountingDirectory::default());
        let clock = Arc::new(ManualClock::default());
        let cache = cache(&directory, &clock);

        directory.set_failing(true);
        assert!(cache.get_or_refresh(AccessLevel::Team, &lead()).await.is_err());

        directory.set_failing(false);
        let snapshot = cache.get_or_refresh(AccessLevel::Team, &lead()).await.unwrap();

        assert!(snapshot.contains_user(&UserId::new("u2")));
        assert_eq!(directory.calls(), 2);
    }

    #[tokio::test]
    async fn refresh_completes_after_its_caller_gives_up() {
        let directory = Arc::new(CountingDirectory::default());
        let clock = Arc::new(ManualClock::default());
        let cache = cache(&directory, &clock);

        let abandoned =
            tokio::time::timeout(Duration::from_millis(5), cache.get_or_refresh(AccessLevel::Team, &lead())).await;
        assert!(abandoned.is_err());
        assert_eq!(cache.state(), CacheState::Refreshing);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(cache.state(), CacheState::Fresh);

        let snapshot = cache.get_or_refresh(AccessLevel::Team, &lead()).await.unwrap();
        assert!(snapshot.contains_user(&UserId::new("u2")));
        assert_eq!(directory.calls(), 1);
    }

    #[tokio::test]
    async fn invalidate_forces_refetch() {
        let directory = Arc::new(CountingDirectory::default());
        let clock = Arc::new(ManualClock::default());
        let cache = cache(&directory, &clock);

        cache.get_or_refresh(AccessLevel::Team, &lead()).await.unwrap();
        cache.invalidate();
        assert_eq!(cache.state(), CacheState::Empty);

        cache.get_or_refresh(AccessLevel::Team, &lead()).await.unwrap();
        assert_eq!(directory.calls(), 2);
    }

    #[tokio::test]
    async fn other_principal_is_refused() {
        let directory = Arc::new(CountingDirectory::default());
        let clock = Arc::new(ManualClock::default());
        let cache = cache(&directory, &clock);
        let intruder = Principal::new(UserId::new("u9"), Role::TEAM_LEAD, TenantId::new("t1"));

        let err = cache.get_or_refresh(AccessLevel::Team, &intruder).await.unwrap_err();

        assert_eq!(
            err,
            ScopeError::PrincipalMismatch {
                expected: UserId::new("u1"),
                actual: UserId::new("u9"),
            }
        );
        assert_eq!(directory.calls(), 0);
    }
}
