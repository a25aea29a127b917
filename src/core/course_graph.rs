//! Prerequisite graph - cycle detection and edge maintenance.
//!
//! The graph is never held in memory between calls. Every traversal reads the
//! `course_prerequisites` edges it needs from the store, keyed by plain course IDs,
//! so there is no cached graph state that could drift from the store of record.

use crate::{
    entities::{Course, CoursePrerequisite, course, course_prerequisite},
    errors::{Error, Result},
};
use sea_orm::{QueryOrder, QuerySelect, Set, TransactionTrait, prelude::*};
use std::collections::HashSet;
use tracing::{debug, info, instrument, warn};

/// Direct prerequisite IDs of `course_id`.
pub async fn prerequisite_ids<C>(db: &C, course_id: i64) -> Result<Vec<i64>>
where
    C: ConnectionTrait,
{
    CoursePrerequisite::find()
        .select_only()
        .column(course_prerequisite::Column::PrerequisiteId)
        .filter(course_prerequisite::Column::CourseId.eq(course_id))
        .into_tuple::<i64>()
        .all(db)
        .await
        .map_err(Into::into)
}

/// Decides whether attaching `prerequisite_id` as a prerequisite of `course_id` would
/// create a cycle.
///
/// Walks the prerequisite chain of the candidate depth-first and reports `true` as soon
/// as `course_id` is reached. A missing ID on either side means "no cycle"; equal IDs
/// are a cycle without touching the store. The visited set keeps the walk within the
/// reachable subgraph even if the stored graph is already diamond-shaped or cyclic.
#[instrument(skip(db))]
pub async fn would_form_cycle<C>(
    db: &C,
    course_id: Option<i64>,
    prerequisite_id: Option<i64>,
) -> Result<bool>
where
    C: ConnectionTrait,
{
    let (Some(target), Some(start)) = (course_id, prerequisite_id) else {
        return Ok(false);
    };
    if target == start {
        return Ok(true);
    }

    let mut visited = HashSet::new();
    let mut stack = vec![start];

    while let Some(current) = stack.pop() {
        if current == target {
            debug!(current, "cycle found");
            return Ok(true);
        }
        if !visited.insert(current) {
            continue;
        }
        for next in prerequisite_ids(db, current).await? {
            if !visited.contains(&next) {
                stack.push(next);
            }
        }
    }

    Ok(false)
}

async fn require_course<C>(db: &C, course_id: i64) -> Result<course::Model>
where
    C: ConnectionTrait,
{
    Course::find_by_id(course_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("course", course_id))
}

/// Records that `prerequisite_id` must be completed before `course_id`.
///
/// The cycle check and the insert run in one transaction. Adding an edge that already
/// exists is a no-op.
///
/// # Errors
/// - `NotFound` if either course does not exist
/// - `Validation` if the edge would make a course (transitively) require itself
#[instrument(skip(db))]
pub async fn add_prerequisite(
    db: &DatabaseConnection,
    course_id: i64,
    prerequisite_id: i64,
) -> Result<()> {
    let txn = db.begin().await?;

    let course = require_course(&txn, course_id).await?;
    let prerequisite = require_course(&txn, prerequisite_id).await?;

    if would_form_cycle(&txn, Some(course_id), Some(prerequisite_id)).await? {
        warn!(
            course = %course.code,
            prerequisite = %prerequisite.code,
            "rejected prerequisite edge that would form a cycle"
        );
        return Err(Error::validation(format!(
            "adding {} as a prerequisite of {} would form a cycle",
            prerequisite.code, course.code
        )));
    }

    let existing = CoursePrerequisite::find_by_id((course_id, prerequisite_id))
        .one(&txn)
        .await?;
    if existing.is_some() {
        return Ok(());
    }

    let edge = course_prerequisite::ActiveModel {
        course_id: Set(course_id),
        prerequisite_id: Set(prerequisite_id),
    };
    CoursePrerequisite::insert(edge)
        .exec_without_returning(&txn)
        .await?;

    txn.commit().await?;
    info!(course = %course.code, prerequisite = %prerequisite.code, "prerequisite added");
    Ok(())
}

/// Removes the edge `course_id → prerequisite_id`. Returns whether an edge was removed.
pub async fn remove_prerequisite(
    db: &DatabaseConnection,
    course_id: i64,
    prerequisite_id: i64,
) -> Result<bool> {
    let result = CoursePrerequisite::delete_many()
        .filter(course_prerequisite::Column::CourseId.eq(course_id))
        .filter(course_prerequisite::Column::PrerequisiteId.eq(prerequisite_id))
        .exec(db)
        .await?;
    Ok(result.rows_affected > 0)
}

/// Courses that must be completed before `course_id`, ordered by code.
pub async fn prerequisites_of<C>(db: &C, course_id: i64) -> Result<Vec<course::Model>>
where
    C: ConnectionTrait,
{
    let ids = prerequisite_ids(db, course_id).await?;
    courses_by_ids(db, ids).await
}

/// Courses that list `course_id` as a prerequisite, ordered by code.
pub async fn dependents_of<C>(db: &C, course_id: i64) -> Result<Vec<course::Model>>
where
    C: ConnectionTrait,
{
    let ids: Vec<i64> = CoursePrerequisite::find()
        .select_only()
        .column(course_prerequisite::Column::CourseId)
        .filter(course_prerequisite::Column::PrerequisiteId.eq(course_id))
        .into_tuple()
        .all(db)
        .await?;
    courses_by_ids(db, ids).await
}

async fn courses_by_ids<C>(db: &C, ids: Vec<i64>) -> Result<Vec<course::Model>>
where
    C: ConnectionTrait,
{
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    Course::find()
        .filter(course::Column::Id.is_in(ids))
        .order_by_asc(course::Column::Code)
        .all(db)
        .await
        .map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;

    #[tokio::test]
    async fn test_absent_ids_never_form_a_cycle() -> Result<()> {
        // The store is empty, so only the absent-ID rule can answer.
        let db = setup_test_db().await?;
        assert!(!would_form_cycle(&db, None, Some(1)).await?);
        assert!(!would_form_cycle(&db, Some(1), None).await?);
        assert!(!would_form_cycle(&db, None, None).await?);
        Ok(())
    }

    #[tokio::test]
    async fn test_self_reference_short_circuits() -> Result<()> {
        let db = setup_test_db().await?;
        assert!(would_form_cycle(&db, Some(4), Some(4)).await?);
        Ok(())
    }

    #[tokio::test]
    async fn test_direct_reverse_edge_is_a_cycle() -> Result<()> {
        let db = setup_test_db().await?;
        let mat101 = create_test_course(&db, "MAT101").await?;
        let mat201 = create_test_course(&db, "MAT201").await?;

        add_prerequisite(&db, mat201.id, mat101.id).await?;

        assert!(would_form_cycle(&db, Some(mat101.id), Some(mat201.id)).await?);
        let result = add_prerequisite(&db, mat101.id, mat201.id).await;
        assert!(matches!(result, Err(Error::Validation { .. })));
        assert!(prerequisites_of(&db, mat101.id).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_transitive_chain_is_a_cycle() -> Result<()> {
        let db = setup_test_db().await?;
        let a = create_test_course(&db, "CSC101").await?;
        let b = create_test_course(&db, "CSC201").await?;
        let c = create_test_course(&db, "CSC301").await?;

        // c requires b, b requires a
        add_prerequisite(&db, c.id, b.id).await?;
        add_prerequisite(&db, b.id, a.id).await?;

        assert!(would_form_cycle(&db, Some(a.id), Some(c.id)).await?);
        assert!(would_form_cycle(&db, Some(a.id), Some(b.id)).await?);
        assert!(!would_form_cycle(&db, Some(c.id), Some(a.id)).await?);
        Ok(())
    }

    #[tokio::test]
    async fn test_diamond_is_not_a_cycle() -> Result<()> {
        let db = setup_test_db().await?;
        let base = create_test_course(&db, "PHY101").await?;
        let left = create_test_course(&db, "PHY201").await?;
        let right = create_test_course(&db, "PHY202").await?;
        let top = create_test_course(&db, "PHY301").await?;

        add_prerequisite(&db, left.id, base.id).await?;
        add_prerequisite(&db, right.id, base.id).await?;
        add_prerequisite(&db, top.id, left.id).await?;
        add_prerequisite(&db, top.id, right.id).await?;

        let extra = create_test_course(&db, "PHY401").await?;
        assert!(!would_form_cycle(&db, Some(extra.id), Some(top.id)).await?);
        add_prerequisite(&db, extra.id, top.id).await?;
        assert!(would_form_cycle(&db, Some(base.id), Some(extra.id)).await?);
        Ok(())
    }

    #[tokio::test]
    async fn test_traversal_terminates_on_stored_cycle() -> Result<()> {
        let db = setup_test_db().await?;
        let a = create_test_course(&db, "BIO101").await?;
        let b = create_test_course(&db, "BIO102").await?;
        let outsider = create_test_course(&db, "BIO999").await?;

        // Write a cycle directly, bypassing the check.
        for (course_id, prerequisite_id) in [(a.id, b.id), (b.id, a.id)] {
            CoursePrerequisite::insert(course_prerequisite::ActiveModel {
                course_id: Set(course_id),
                prerequisite_id: Set(prerequisite_id),
            })
            .exec_without_returning(&db)
            .await?;
        }

        assert!(!would_form_cycle(&db, Some(outsider.id), Some(a.id)).await?);
        Ok(())
    }

    #[tokio::test]
    async fn test_add_prerequisite_missing_course() -> Result<()> {
        let db = setup_test_db().await?;
        let course = create_test_course(&db, "MAT101").await?;
        let result = add_prerequisite(&db, course.id, 999).await;
        assert!(matches!(result, Err(Error::NotFound { entity: "course", .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_add_is_idempotent_and_remove_works() -> Result<()> {
        let db = setup_test_db().await?;
        let mat101 = create_test_course(&db, "MAT101").await?;
        let mat201 = create_test_course(&db, "MAT201").await?;

        add_prerequisite(&db, mat201.id, mat101.id).await?;
        add_prerequisite(&db, mat201.id, mat101.id).await?;

        let prerequisites = prerequisites_of(&db, mat201.id).await?;
        assert_eq!(prerequisites.len(), 1);
        assert_eq!(prerequisites[0].code, "MAT101");

        let dependents = dependents_of(&db, mat101.id).await?;
        assert_eq!(dependents.len(), 1);
        assert_eq!(dependents[0].code, "MAT201");

        assert!(remove_prerequisite(&db, mat201.id, mat101.id).await?);
        assert!(!remove_prerequisite(&db, mat201.id, mat101.id).await?);
        assert!(prerequisites_of(&db, mat201.id).await?.is_empty());

        // With the edge gone the reverse direction is allowed.
        add_prerequisite(&db, mat101.id, mat201.id).await?;
        Ok(())
    }
}
