//! Enrollment business logic - registration, status changes and cancellation.
//!
//! Writes follow the same order everywhere: check, persist, then apply the
//! invalidation set from [`write_invalidation`]. Reads return [`EnrollmentView`]s
//! with the student and course names already resolved.

use crate::{
    cache::{CacheCoordinator, CacheKey, CacheScope, InvalidationSet},
    core::{
        course_graph,
        lifecycle::{self, TransitionPolicy},
    },
    entities::{Course, Enrollment, EnrollmentStatus, Person, Student, course, enrollment, student},
    errors::{Error, Result},
};
use chrono::{NaiveDate, Utc};
use sea_orm::{QueryOrder, Set, SqlErr, prelude::*};
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, info, instrument, warn};

/// Read model of an enrollment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnrollmentView {
    /// Enrollment ID
    pub id: i64,
    /// Enrolled student
    pub student_id: i64,
    /// Student's full name
    pub student_name: String,
    /// Student's enrollment number
    pub enrollment_number: String,
    /// Course enrolled in
    pub course_id: i64,
    /// Course code
    pub course_code: String,
    /// Course name
    pub course_name: String,
    /// Date the enrollment takes effect
    pub enrollment_date: NaiveDate,
    /// Current status
    pub status: EnrollmentStatus,
    /// False once cancelled
    pub active: bool,
}

/// Evictions after any write to an enrollment of `student_id` in `course_id`.
#[must_use]
pub fn write_invalidation(enrollment_id: i64, student_id: i64, course_id: i64) -> InvalidationSet {
    InvalidationSet::new()
        .entry(CacheScope::EnrollmentsByStudent, CacheKey::Id(student_id))
        .entry(CacheScope::CourseRoster, CacheKey::Id(course_id))
        .entry(CacheScope::StudentCourses, CacheKey::Id(student_id))
        .entry(CacheScope::Enrollment, CacheKey::Id(enrollment_id))
}

/// Whether the student holds an active enrollment in the course.
pub async fn has_active_enrollment<C>(db: &C, student_id: i64, course_id: i64) -> Result<bool>
where
    C: ConnectionTrait,
{
    let count = Enrollment::find()
        .filter(enrollment::Column::StudentId.eq(student_id))
        .filter(enrollment::Column::CourseId.eq(course_id))
        .filter(enrollment::Column::Active.eq(true))
        .count(db)
        .await?;
    Ok(count > 0)
}

/// Whether the student may take `course_id` as far as prerequisites go.
///
/// A course without prerequisites is always satisfied. Otherwise one approved
/// enrollment in any listed prerequisite is enough.
pub async fn has_approved_prerequisite<C>(db: &C, student_id: i64, course_id: i64) -> Result<bool>
where
    C: ConnectionTrait,
{
    let prerequisites = course_graph::prerequisite_ids(db, course_id).await?;
    if prerequisites.is_empty() {
        return Ok(true);
    }
    let approved = Enrollment::find()
        .filter(enrollment::Column::StudentId.eq(student_id))
        .filter(enrollment::Column::CourseId.is_in(prerequisites))
        .filter(enrollment::Column::Status.eq(EnrollmentStatus::Approved))
        .count(db)
        .await?;
    Ok(approved > 0)
}

/// Resolves names for a batch of enrollment rows, keeping their order.
async fn project<C>(db: &C, rows: Vec<enrollment::Model>) -> Result<Vec<EnrollmentView>>
where
    C: ConnectionTrait,
{
    if rows.is_empty() {
        return Ok(Vec::new());
    }

    let mut student_ids: Vec<i64> = rows.iter().map(|r| r.student_id).collect();
    student_ids.sort_unstable();
    student_ids.dedup();
    let mut course_ids: Vec<i64> = rows.iter().map(|r| r.course_id).collect();
    course_ids.sort_unstable();
    course_ids.dedup();

    let students: HashMap<i64, (String, String)> = Student::find()
        .filter(student::Column::Id.is_in(student_ids))
        .find_also_related(Person)
        .all(db)
        .await?
        .into_iter()
        .filter_map(|(s, p)| p.map(|p| (s.id, (p.full_name(), s.enrollment_number))))
        .collect();
    let courses: HashMap<i64, course::Model> = Course::find()
        .filter(course::Column::Id.is_in(course_ids))
        .all(db)
        .await?
        .into_iter()
        .map(|c| (c.id, c))
        .collect();

    rows.into_iter()
        .map(|row| {
            let (student_name, enrollment_number) = students
                .get(&row.student_id)
                .cloned()
                .ok_or_else(|| Error::not_found("student", row.student_id))?;
            let course = courses
                .get(&row.course_id)
                .ok_or_else(|| Error::not_found("course", row.course_id))?;
            Ok(EnrollmentView {
                id: row.id,
                student_id: row.student_id,
                student_name,
                enrollment_number,
                course_id: row.course_id,
                course_code: course.code.clone(),
                course_name: course.name.clone(),
                enrollment_date: row.enrollment_date,
                status: row.status,
                active: row.active,
            })
        })
        .collect()
}

/// Finds an enrollment row regardless of its `active` flag.
pub async fn find_enrollment<C>(db: &C, enrollment_id: i64) -> Result<Option<enrollment::Model>>
where
    C: ConnectionTrait,
{
    Enrollment::find_by_id(enrollment_id)
        .one(db)
        .await
        .map_err(Into::into)
}

async fn require_enrollment(db: &DatabaseConnection, enrollment_id: i64) -> Result<enrollment::Model> {
    find_enrollment(db, enrollment_id)
        .await?
        .ok_or_else(|| Error::not_found("enrollment", enrollment_id))
}

/// Fetches an active enrollment through the `enrollment` cache scope.
///
/// # Errors
/// `NotFound` if the enrollment does not exist or has been cancelled.
pub async fn get_enrollment(
    db: &DatabaseConnection,
    cache: &CacheCoordinator,
    enrollment_id: i64,
) -> Result<EnrollmentView> {
    cache
        .get_or_populate(CacheScope::Enrollment, CacheKey::Id(enrollment_id), || async {
            let row = Enrollment::find_by_id(enrollment_id)
                .filter(enrollment::Column::Active.eq(true))
                .one(db)
                .await?
                .ok_or_else(|| Error::not_found("enrollment", enrollment_id))?;
            project(db, vec![row])
                .await?
                .pop()
                .ok_or_else(|| Error::not_found("enrollment", enrollment_id))
        })
        .await
}

/// Active enrollments of a student, oldest first, through the `enrollmentsByStudent` scope.
///
/// # Errors
/// `NotFound` if the student does not exist.
pub async fn list_enrollments_for_student(
    db: &DatabaseConnection,
    cache: &CacheCoordinator,
    student_id: i64,
) -> Result<Vec<EnrollmentView>> {
    cache
        .get_or_populate(
            CacheScope::EnrollmentsByStudent,
            CacheKey::Id(student_id),
            || async {
                if Student::find_by_id(student_id).one(db).await?.is_none() {
                    return Err(Error::not_found("student", student_id));
                }
                let rows = Enrollment::find()
                    .filter(enrollment::Column::StudentId.eq(student_id))
                    .filter(enrollment::Column::Active.eq(true))
                    .order_by_asc(enrollment::Column::EnrollmentDate)
                    .order_by_asc(enrollment::Column::Id)
                    .all(db)
                    .await?;
                project(db, rows).await
            },
        )
        .await
}

/// Active enrollments of a course, through the `courseRoster` scope.
///
/// # Errors
/// `NotFound` if the course does not exist.
pub async fn list_course_roster(
    db: &DatabaseConnection,
    cache: &CacheCoordinator,
    course_id: i64,
) -> Result<Vec<EnrollmentView>> {
    cache
        .get_or_populate(CacheScope::CourseRoster, CacheKey::Id(course_id), || async {
            if Course::find_by_id(course_id).one(db).await?.is_none() {
                return Err(Error::not_found("course", course_id));
            }
            let rows = Enrollment::find()
                .filter(enrollment::Column::CourseId.eq(course_id))
                .filter(enrollment::Column::Active.eq(true))
                .order_by_asc(enrollment::Column::Id)
                .all(db)
                .await?;
            project(db, rows).await
        })
        .await
}

/// Registers a student in a course as `PENDING`.
///
/// Checks run in this order: date, existence, duplicate, prerequisites.
///
/// # Errors
/// - `Validation` if `enrollment_date` is before today (UTC)
/// - `NotFound` if the student or course does not exist
/// - `Conflict` if an active enrollment for the pair already exists
/// - `PrerequisiteUnmet` if the course has prerequisites and none is approved
#[instrument(skip(db, cache))]
pub async fn create_enrollment(
    db: &DatabaseConnection,
    cache: &CacheCoordinator,
    student_id: i64,
    course_id: i64,
    enrollment_date: NaiveDate,
) -> Result<EnrollmentView> {
    let today = Utc::now().date_naive();
    if enrollment_date < today {
        return Err(Error::validation(format!(
            "enrollment date {enrollment_date} is in the past"
        )));
    }

    if Student::find_by_id(student_id).one(db).await?.is_none() {
        return Err(Error::not_found("student", student_id));
    }
    if Course::find_by_id(course_id).one(db).await?.is_none() {
        return Err(Error::not_found("course", course_id));
    }

    if has_active_enrollment(db, student_id, course_id).await? {
        return Err(duplicate(student_id, course_id));
    }
    if !has_approved_prerequisite(db, student_id, course_id).await? {
        return Err(Error::PrerequisiteUnmet {
            student_id,
            course_id,
        });
    }

    let created = insert_pending(db, student_id, course_id, enrollment_date).await?;

    cache
        .invalidate(&write_invalidation(created.id, student_id, course_id))
        .await;
    info!(enrollment_id = created.id, student_id, course_id, "enrollment created");

    get_enrollment(db, cache, created.id).await
}

fn duplicate(student_id: i64, course_id: i64) -> Error {
    Error::Conflict {
        message: format!("student {student_id} already has an active enrollment in course {course_id}"),
    }
}

/// Inserts an active `PENDING` row. A concurrent writer that got there first is caught
/// by the active-pair index and reported as `Conflict`.
async fn insert_pending(
    db: &DatabaseConnection,
    student_id: i64,
    course_id: i64,
    enrollment_date: NaiveDate,
) -> Result<enrollment::Model> {
    let row = enrollment::ActiveModel {
        student_id: Set(student_id),
        course_id: Set(course_id),
        enrollment_date: Set(enrollment_date),
        status: Set(EnrollmentStatus::Pending),
        active: Set(true),
        ..Default::default()
    };
    match row.insert(db).await {
        Ok(created) => Ok(created),
        Err(err) if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
            warn!(student_id, course_id, "concurrent duplicate enrollment rejected by index");
            Err(duplicate(student_id, course_id))
        }
        Err(err) => Err(err.into()),
    }
}

/// Overwrites the status of an active enrollment.
///
/// # Errors
/// - `NotFound` if the enrollment does not exist
/// - `InvalidState` if it is inactive, or `policy` rejects the transition
#[instrument(skip(db, cache))]
pub async fn update_enrollment_status(
    db: &DatabaseConnection,
    cache: &CacheCoordinator,
    enrollment_id: i64,
    status: EnrollmentStatus,
    policy: TransitionPolicy,
) -> Result<EnrollmentView> {
    let current = require_enrollment(db, enrollment_id).await?;
    lifecycle::check_status_update(&current, status, policy)?;

    let previous = current.status;
    let (student_id, course_id) = (current.student_id, current.course_id);
    let mut row: enrollment::ActiveModel = current.into();
    row.status = Set(status);
    row.update(db).await?;

    cache
        .invalidate(&write_invalidation(enrollment_id, student_id, course_id))
        .await;
    info!(enrollment_id, %previous, %status, "enrollment status updated");

    get_enrollment(db, cache, enrollment_id).await
}

/// Cancels an enrollment: status `CANCELLED`, `active` cleared.
///
/// Cancelling an already cancelled enrollment returns it unchanged.
///
/// # Errors
/// - `NotFound` if the enrollment does not exist
/// - `InvalidState` if it is approved
#[instrument(skip(db, cache))]
pub async fn cancel_enrollment(
    db: &DatabaseConnection,
    cache: &CacheCoordinator,
    enrollment_id: i64,
) -> Result<enrollment::Model> {
    let current = require_enrollment(db, enrollment_id).await?;
    lifecycle::check_cancel(&current)?;
    if !current.active {
        debug!(enrollment_id, "enrollment already inactive");
        return Ok(current);
    }

    let (student_id, course_id) = (current.student_id, current.course_id);
    let mut row: enrollment::ActiveModel = current.into();
    row.status = Set(EnrollmentStatus::Cancelled);
    row.active = Set(false);
    let cancelled = row.update(db).await?;

    cache
        .invalidate(&write_invalidation(enrollment_id, student_id, course_id))
        .await;
    info!(enrollment_id, student_id, course_id, "enrollment cancelled");

    Ok(cancelled)
}
