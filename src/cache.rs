//! Derived read caches with explicit invalidation.
//!
//! The [`CacheCoordinator`] owns a set of named scopes. Reads go through
//! [`CacheCoordinator::get_or_populate`], which is the only way an entry is ever created.
//! Mutations evict: they build an [`InvalidationSet`] describing exactly which entries
//! their write affects and hand it to [`CacheCoordinator::invalidate`] once the write has
//! been committed. Entries are never updated in place.
//!
//! Each scope carries an epoch that every eviction bumps. A loader records the epoch
//! before reading the store and only installs its result if the epoch is unchanged,
//! so a read that raced with a committed write cannot leave a stale entry behind.

use crate::errors::Result;
use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;
use tracing::{debug, trace};

/// Named cache partitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheScope {
    /// Single student record, keyed by student ID
    Student,
    /// All students
    Students,
    /// Students whose status is active
    ActiveStudents,
    /// Courses a student takes through active enrollments, keyed by student ID
    StudentCourses,
    /// Single active enrollment view, keyed by enrollment ID
    Enrollment,
    /// Active enrollment views of a student, keyed by student ID
    EnrollmentsByStudent,
    /// Active enrollment views of a course, keyed by course ID
    CourseRoster,
}

impl CacheScope {
    /// Every scope.
    pub const ALL: [Self; 7] = [
        Self::Student,
        Self::Students,
        Self::ActiveStudents,
        Self::StudentCourses,
        Self::Enrollment,
        Self::EnrollmentsByStudent,
        Self::CourseRoster,
    ];

    /// Name used in logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Student => "student",
            Self::Students => "students",
            Self::ActiveStudents => "activeStudents",
            Self::StudentCourses => "studentCourses",
            Self::Enrollment => "enrollment",
            Self::EnrollmentsByStudent => "enrollmentsByStudent",
            Self::CourseRoster => "courseRoster",
        }
    }
}

/// Key of an entry within a scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// Entry for one record ID
    Id(i64),
    /// The single entry of a list scope such as [`CacheScope::Students`]
    All,
}

/// One eviction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eviction {
    /// Drop a single entry
    Entry(CacheScope, CacheKey),
    /// Drop every entry of the scope
    Scope(CacheScope),
}

impl Eviction {
    const fn scope(self) -> CacheScope {
        match self {
            Self::Entry(scope, _) | Self::Scope(scope) => scope,
        }
    }
}

/// The evictions one mutation performs after its write commits.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvalidationSet {
    evictions: Vec<Eviction>,
}

impl InvalidationSet {
    /// An empty set.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            evictions: Vec::new(),
        }
    }

    /// Adds a single-entry eviction.
    #[must_use]
    pub fn entry(mut self, scope: CacheScope, key: CacheKey) -> Self {
        self.evictions.push(Eviction::Entry(scope, key));
        self
    }

    /// Adds a whole-scope eviction.
    #[must_use]
    pub fn scope(mut self, scope: CacheScope) -> Self {
        self.evictions.push(Eviction::Scope(scope));
        self
    }

    /// Evictions in declaration order.
    #[must_use]
    pub fn evictions(&self) -> &[Eviction] {
        &self.evictions
    }

    /// Whether the set touches `scope` at all.
    #[must_use]
    pub fn touches(&self, scope: CacheScope) -> bool {
        self.evictions.iter().any(|e| e.scope() == scope)
    }
}

type CachedValue = Arc<dyn Any + Send + Sync>;

#[derive(Default)]
struct Inner {
    entries: HashMap<(CacheScope, CacheKey), CachedValue>,
    epochs: HashMap<CacheScope, u64>,
}

impl Inner {
    fn epoch(&self, scope: CacheScope) -> u64 {
        self.epochs.get(&scope).copied().unwrap_or(0)
    }
}

/// Hit and miss counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    /// Reads answered from the cache
    pub hits: u64,
    /// Reads that went to the store
    pub misses: u64,
}

/// Owner of all derived read caches.
#[derive(Default)]
pub struct CacheCoordinator {
    inner: RwLock<Inner>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl std::fmt::Debug for CacheCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheCoordinator")
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

impl CacheCoordinator {
    /// Creates an empty coordinator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached value for `(scope, key)`, or runs `loader` and caches its result.
    ///
    /// Loader errors are propagated and nothing is cached. If an eviction touching `scope`
    /// happens while the loader runs, the loaded value is returned to this caller but
    /// not installed.
    pub async fn get_or_populate<T, F, Fut>(
        &self,
        scope: CacheScope,
        key: CacheKey,
        loader: F,
    ) -> Result<T>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let epoch = {
            let inner = self.inner.read().await;
            if let Some(value) = inner
                .entries
                .get(&(scope, key))
                .and_then(|v| v.downcast_ref::<T>())
            {
                self.hits.fetch_add(1, Ordering::Relaxed);
                trace!(scope = scope.name(), ?key, "cache hit");
                return Ok(value.clone());
            }
            inner.epoch(scope)
        };

        self.misses.fetch_add(1, Ordering::Relaxed);
        trace!(scope = scope.name(), ?key, "cache miss");
        let value = loader().await?;

        let mut inner = self.inner.write().await;
        if inner.epoch(scope) == epoch {
            inner
                .entries
                .insert((scope, key), Arc::new(value.clone()) as CachedValue);
        } else {
            debug!(
                scope = scope.name(),
                ?key,
                "scope invalidated during load, not caching"
            );
        }
        Ok(value)
    }

    /// Applies every eviction in `set`. Call only after the write it covers is committed.
    pub async fn invalidate(&self, set: &InvalidationSet) {
        let mut inner = self.inner.write().await;
        for eviction in set.evictions() {
            match *eviction {
                Eviction::Entry(scope, key) => {
                    inner.entries.remove(&(scope, key));
                }
                Eviction::Scope(scope) => {
                    inner.entries.retain(|(s, _), _| *s != scope);
                }
            }
            *inner.epochs.entry(eviction.scope()).or_insert(0) += 1;
            trace!(?eviction, "cache eviction");
        }
        debug!(count = set.evictions().len(), "cache invalidated");
    }

    /// Drops every entry. The cache is advisory, so this never loses data.
    pub async fn clear(&self) {
        let mut inner = self.inner.write().await;
        inner.entries.clear();
        for scope in CacheScope::ALL {
            *inner.epochs.entry(scope).or_insert(0) += 1;
        }
    }

    /// Whether an entry is currently cached.
    pub async fn contains(&self, scope: CacheScope, key: CacheKey) -> bool {
        self.inner.read().await.entries.contains_key(&(scope, key))
    }

    /// Current hit and miss counts.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::Error;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test]
    async fn test_populates_on_first_miss_only() -> Result<()> {
        let cache = CacheCoordinator::new();
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let value: String = cache
                .get_or_populate(CacheScope::Student, CacheKey::Id(1), || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok("Alan Turing".to_string())
                })
                .await?;
            assert_eq!(value, "Alan Turing");
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.stats(), CacheStats { hits: 2, misses: 1 });
        Ok(())
    }

    #[tokio::test]
    async fn test_loader_error_is_not_cached() -> Result<()> {
        let cache = CacheCoordinator::new();
        let result: Result<i64> = cache
            .get_or_populate(CacheScope::Enrollment, CacheKey::Id(9), || async {
                Err(Error::not_found("enrollment", 9))
            })
            .await;
        assert!(matches!(result, Err(Error::NotFound { .. })));
        assert!(!cache.contains(CacheScope::Enrollment, CacheKey::Id(9)).await);
        Ok(())
    }

    #[tokio::test]
    async fn test_entry_eviction_forces_reload() -> Result<()> {
        let cache = CacheCoordinator::new();
        let _: i64 = cache
            .get_or_populate(CacheScope::Enrollment, CacheKey::Id(1), || async { Ok(1) })
            .await?;
        let _: i64 = cache
            .get_or_populate(CacheScope::Enrollment, CacheKey::Id(2), || async { Ok(2) })
            .await?;

        cache
            .invalidate(&InvalidationSet::new().entry(CacheScope::Enrollment, CacheKey::Id(1)))
            .await;

        assert!(!cache.contains(CacheScope::Enrollment, CacheKey::Id(1)).await);
        assert!(cache.contains(CacheScope::Enrollment, CacheKey::Id(2)).await);

        let reloaded: i64 = cache
            .get_or_populate(CacheScope::Enrollment, CacheKey::Id(1), || async { Ok(10) })
            .await?;
        assert_eq!(reloaded, 10);
        Ok(())
    }

    #[tokio::test]
    async fn test_scope_eviction_leaves_other_scopes() -> Result<()> {
        let cache = CacheCoordinator::new();
        for id in 1..=3 {
            let _: i64 = cache
                .get_or_populate(CacheScope::CourseRoster, CacheKey::Id(id), || async {
                    Ok(id)
                })
                .await?;
        }
        let _: Vec<i64> = cache
            .get_or_populate(CacheScope::Students, CacheKey::All, || async {
                Ok(vec![1, 2])
            })
            .await?;

        cache
            .invalidate(&InvalidationSet::new().scope(CacheScope::CourseRoster))
            .await;

        for id in 1..=3 {
            assert!(!cache.contains(CacheScope::CourseRoster, CacheKey::Id(id)).await);
        }
        assert!(cache.contains(CacheScope::Students, CacheKey::All).await);
        Ok(())
    }

    #[tokio::test]
    async fn test_load_racing_an_eviction_is_not_installed() -> Result<()> {
        let cache = CacheCoordinator::new();

        // The loader observes pre-write data, then the write commits and invalidates
        // before the loader finishes.
        let stale: String = cache
            .get_or_populate(CacheScope::Student, CacheKey::Id(5), || async {
                cache
                    .invalidate(
                        &InvalidationSet::new().entry(CacheScope::Student, CacheKey::Id(5)),
                    )
                    .await;
                Ok("before".to_string())
            })
            .await?;
        assert_eq!(stale, "before");
        assert!(!cache.contains(CacheScope::Student, CacheKey::Id(5)).await);

        let fresh: String = cache
            .get_or_populate(CacheScope::Student, CacheKey::Id(5), || async {
                Ok("after".to_string())
            })
            .await?;
        assert_eq!(fresh, "after");
        Ok(())
    }

    #[tokio::test]
    async fn test_clear_drops_everything() -> Result<()> {
        let cache = CacheCoordinator::new();
        let _: i64 = cache
            .get_or_populate(CacheScope::Student, CacheKey::Id(1), || async { Ok(1) })
            .await?;
        cache.clear().await;
        assert!(!cache.contains(CacheScope::Student, CacheKey::Id(1)).await);
        Ok(())
    }

    #[tokio::test]
    async fn test_load_racing_a_clear_is_not_installed() -> Result<()> {
        for scope in CacheScope::ALL {
            let cache = CacheCoordinator::new();
            let stale: i64 = cache
                .get_or_populate(scope, CacheKey::All, || async {
                    cache.clear().await;
                    Ok(1)
                })
                .await?;
            assert_eq!(stale, 1);
            assert!(
                !cache.contains(scope, CacheKey::All).await,
                "{} kept a load that raced a clear",
                scope.name()
            );
        }
        Ok(())
    }

    #[test]
    fn test_invalidation_set_touches() {
        let set = InvalidationSet::new()
            .entry(CacheScope::EnrollmentsByStudent, CacheKey::Id(3))
            .scope(CacheScope::Students);
        assert!(set.touches(CacheScope::EnrollmentsByStudent));
        assert!(set.touches(CacheScope::Students));
        assert!(!set.touches(CacheScope::Enrollment));
        assert_eq!(set.evictions().len(), 2);
    }
}
