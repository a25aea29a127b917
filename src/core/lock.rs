//! Exclusive per-student holds.
//!
//! [`LockManager`] hands out one async mutex per student ID. Holding the guard means no
//! other caller can start an exclusive unit of work on the same student. The guard is
//! released when it is dropped, so every exit path gives the hold back.
//!
//! On backends with row locks the student is read with `SELECT ... FOR UPDATE` inside a
//! transaction that lives as long as the hold, which also serializes writers in other
//! processes. `SQLite` has no row locks: there the read runs outside a transaction, so
//! a held student never pins a pooled connection and work on other students proceeds.

use crate::{
    entities::{Student, student},
    errors::{Error, Result},
};
use sea_orm::{DatabaseTransaction, DbBackend, QuerySelect, TransactionTrait, prelude::*};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, info, instrument, warn};

/// Registry of per-student mutexes.
#[derive(Debug, Default)]
pub struct LockManager {
    slots: Mutex<HashMap<i64, Arc<AsyncMutex<()>>>>,
}

/// Proof that the caller holds the exclusive slot for one student.
#[derive(Debug)]
pub struct StudentGuard {
    student_id: i64,
    _slot: OwnedMutexGuard<()>,
}

impl StudentGuard {
    /// Student this guard covers.
    #[must_use]
    pub const fn student_id(&self) -> i64 {
        self.student_id
    }
}

impl LockManager {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, student_id: i64) -> Arc<AsyncMutex<()>> {
        let mut slots = self
            .slots
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        // Drop slots nobody is holding or waiting on.
        slots.retain(|id, slot| *id == student_id || Arc::strong_count(slot) > 1);
        Arc::clone(slots.entry(student_id).or_default())
    }

    /// Waits up to `wait` for the exclusive slot of `student_id`.
    ///
    /// # Errors
    /// `Unavailable` if the slot is still held when `wait` elapses. Nothing is held
    /// in that case.
    pub async fn acquire_exclusive(&self, student_id: i64, wait: Duration) -> Result<StudentGuard> {
        let slot = self.slot(student_id);
        match tokio::time::timeout(wait, slot.lock_owned()).await {
            Ok(guard) => {
                debug!(student_id, "exclusive hold acquired");
                Ok(StudentGuard {
                    student_id,
                    _slot: guard,
                })
            }
            Err(_) => {
                warn!(student_id, ?wait, "timed out waiting for exclusive hold");
                Err(Error::Unavailable {
                    message: format!("timed out waiting for exclusive hold on student {student_id}"),
                })
            }
        }
    }

    /// Gives a hold back. Equivalent to dropping the guard.
    pub fn release(&self, guard: StudentGuard) {
        debug!(student_id = guard.student_id, "exclusive hold released");
        drop(guard);
    }

    /// Number of students with a live slot.
    #[must_use]
    pub fn tracked(&self) -> usize {
        self.slots
            .lock()
            .map_or_else(|poisoned| poisoned.into_inner().len(), |slots| slots.len())
    }
}

/// A student row read under an exclusive hold, valid until released.
///
/// [`LockedStudent::release`] commits the enclosing transaction, if any, and then
/// releases the hold. Dropping it without releasing rolls back and releases too.
#[derive(Debug)]
pub struct LockedStudent {
    student: student::Model,
    txn: Option<DatabaseTransaction>,
    guard: StudentGuard,
    acquired_at: Instant,
}

impl LockedStudent {
    /// The locked record.
    #[must_use]
    pub const fn student(&self) -> &student::Model {
        &self.student
    }

    /// Transaction the row lock belongs to. `None` on backends without row locks.
    #[must_use]
    pub const fn transaction(&self) -> Option<&DatabaseTransaction> {
        self.txn.as_ref()
    }

    /// When the hold was obtained.
    #[must_use]
    pub const fn acquired_at(&self) -> Instant {
        self.acquired_at
    }

    /// Commits the unit of work and releases the hold. Returns the release time.
    ///
    /// The hold is released even when the commit fails.
    pub async fn release(self) -> Result<Instant> {
        let Self { txn, guard, .. } = self;
        let committed = match txn {
            Some(txn) => txn.commit().await,
            None => Ok(()),
        };
        let released_at = Instant::now();
        drop(guard);
        committed?;
        Ok(released_at)
    }
}

/// Reads a student under an exclusive hold, keeping the hold for `hold` before returning.
///
/// The artificial `hold` models a slow critical section so that serialization of
/// concurrent callers is observable. Not for ordinary reads.
///
/// # Errors
/// - `Unavailable` if the hold cannot be obtained within `wait`
/// - `NotFound` if the student does not exist; the hold is released first
#[instrument(skip(db, locks))]
pub async fn lock_student(
    db: &DatabaseConnection,
    locks: &LockManager,
    student_id: i64,
    hold: Duration,
    wait: Duration,
) -> Result<LockedStudent> {
    let guard = locks.acquire_exclusive(student_id, wait).await?;

    let (student, txn) = if db.get_database_backend() == DbBackend::Sqlite {
        (Student::find_by_id(student_id).one(db).await?, None)
    } else {
        let txn = db.begin().await?;
        let student = Student::find_by_id(student_id)
            .lock_exclusive()
            .one(&txn)
            .await?;
        (student, Some(txn))
    };
    let student = student.ok_or_else(|| Error::not_found("student", student_id))?;
    let acquired_at = Instant::now();

    if !hold.is_zero() {
        tokio::time::sleep(hold).await;
    }

    info!(student_id, ?hold, "student locked");
    Ok(LockedStudent {
        student,
        txn,
        guard,
        acquired_at,
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::cache::CacheCoordinator;
    use crate::core::enrollment::create_enrollment;
    use crate::test_utils::*;
    use chrono::Utc;

    const WAIT: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn test_second_acquire_waits_for_release() -> Result<()> {
        let locks = LockManager::new();
        let first = locks.acquire_exclusive(1, WAIT).await?;

        let blocked = locks.acquire_exclusive(1, Duration::from_millis(20)).await;
        assert!(matches!(blocked, Err(Error::Unavailable { .. })));
        assert!(blocked.is_err_and(|e| e.is_retryable()));

        locks.release(first);
        let second = locks.acquire_exclusive(1, WAIT).await?;
        assert_eq!(second.student_id(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_different_students_do_not_block() -> Result<()> {
        let locks = LockManager::new();
        let _a = locks.acquire_exclusive(1, WAIT).await?;
        let b = locks
            .acquire_exclusive(2, Duration::from_millis(20))
            .await?;
        assert_eq!(b.student_id(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_idle_slots_are_pruned() -> Result<()> {
        let locks = LockManager::new();
        for id in 0..10 {
            let guard = locks.acquire_exclusive(id, WAIT).await?;
            locks.release(guard);
        }
        assert!(locks.tracked() <= 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_lock_missing_student_releases_hold() -> Result<()> {
        let db = setup_test_db().await?;
        let locks = LockManager::new();

        let result = lock_student(&db, &locks, 404, Duration::ZERO, WAIT).await;
        assert!(matches!(result, Err(Error::NotFound { entity: "student", .. })));

        // The failed attempt must not leave the slot held.
        let guard = locks
            .acquire_exclusive(404, Duration::from_millis(20))
            .await?;
        locks.release(guard);
        Ok(())
    }

    #[tokio::test]
    async fn test_concurrent_locks_are_serialized() -> Result<()> {
        let db = setup_test_db().await?;
        let student = create_test_student(&db, "E-001").await?;
        let locks = Arc::new(LockManager::new());
        let hold = Duration::from_millis(50);
        let student_id = student.id;

        let mut handles = Vec::new();
        for _ in 0..2 {
            let db = db.clone();
            let locks = Arc::clone(&locks);
            handles.push(tokio::spawn(async move {
                let locked = lock_student(&db, &locks, student_id, hold, WAIT).await?;
                assert_eq!(locked.student().enrollment_number, "E-001");
                let acquired = locked.acquired_at();
                let released = locked.release().await?;
                Ok::<_, Error>((acquired, released))
            }));
        }

        let mut spans = Vec::new();
        for handle in handles {
            let span = handle.await.unwrap()?;
            spans.push(span);
        }
        spans.sort_by_key(|(acquired, _)| *acquired);

        let (first_acquired, first_released) = spans[0];
        let (second_acquired, _) = spans[1];
        assert!(first_released >= first_acquired + hold);
        assert!(second_acquired >= first_released);
        Ok(())
    }

    #[tokio::test]
    async fn test_dropping_locked_student_releases_hold() -> Result<()> {
        let db = setup_test_db().await?;
        let student = create_test_student(&db, "E-002").await?;
        let locks = LockManager::new();

        let locked = lock_student(&db, &locks, student.id, Duration::ZERO, WAIT).await?;
        drop(locked);

        let again = lock_student(
            &db,
            &locks,
            student.id,
            Duration::ZERO,
            Duration::from_millis(200),
        )
        .await?;
        again.release().await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_hold_does_not_block_other_students() -> Result<()> {
        let db = setup_file_db().await?;
        let cache = CacheCoordinator::new();
        let held = create_test_student(&db, "E-001").await?;
        let other = create_test_student(&db, "E-002").await?;
        let course = create_test_course(&db, "MAT101").await?;
        let locks = LockManager::new();

        let locked = lock_student(&db, &locks, held.id, Duration::ZERO, WAIT).await?;
        assert!(locked.transaction().is_none());

        let today = Utc::now().date_naive();
        let view = tokio::time::timeout(
            Duration::from_secs(2),
            create_enrollment(&db, &cache, other.id, course.id, today),
        )
        .await
        .unwrap()?;
        assert_eq!(view.student_id, other.id);

        // The held student is only blocked for other exclusive holders.
        let blocked = locks
            .acquire_exclusive(held.id, Duration::from_millis(20))
            .await;
        assert!(matches!(blocked, Err(Error::Unavailable { .. })));

        locked.release().await?;
        Ok(())
    }
}
