//! Student business logic - registration, administrative updates and deactivation.
//!
//! Reads go through the [`CacheCoordinator`]; every write commits first and then
//! applies the invalidation set declared next to it.

use crate::{
    cache::{CacheCoordinator, CacheKey, CacheScope, InvalidationSet},
    core::{
        auth::AuthContext,
        person::{self, NewPerson},
    },
    entities::{
        Course, Enrollment, Person, Student, StudentStatus, course, enrollment, person as person_entity,
        student,
    },
    errors::{Error, Result},
};
use chrono::{NaiveDate, Utc};
use sea_orm::{QueryOrder, QuerySelect, Set, TransactionTrait, prelude::*};
use serde::Serialize;
use tracing::{info, instrument};

/// A student together with the person record it references.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StudentRecord {
    /// Student row
    pub student: student::Model,
    /// Referenced person row
    pub person: person_entity::Model,
}

impl StudentRecord {
    /// Given and family name.
    #[must_use]
    pub fn full_name(&self) -> String {
        self.person.full_name()
    }

    /// Whether the student is currently active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.student.status == StudentStatus::Active
    }
}

/// Administrative changes to a student. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StudentUpdate {
    /// New given name
    pub first_name: Option<String>,
    /// New family name
    pub last_name: Option<String>,
    /// New email
    pub email: Option<String>,
    /// New date of birth
    pub birth_date: Option<NaiveDate>,
    /// New enrollment number
    pub enrollment_number: Option<String>,
    /// Setting `Active` reverses a deactivation
    pub status: Option<StudentStatus>,
}

/// Evictions after a student is created.
#[must_use]
pub fn created_invalidation() -> InvalidationSet {
    InvalidationSet::new()
        .entry(CacheScope::Students, CacheKey::All)
        .entry(CacheScope::ActiveStudents, CacheKey::All)
}

/// Evictions after a student is updated. Names are denormalized into enrollment views,
/// so those scopes go as well.
#[must_use]
pub fn updated_invalidation(student_id: i64) -> InvalidationSet {
    InvalidationSet::new()
        .entry(CacheScope::Student, CacheKey::Id(student_id))
        .entry(CacheScope::Students, CacheKey::All)
        .entry(CacheScope::ActiveStudents, CacheKey::All)
        .entry(CacheScope::EnrollmentsByStudent, CacheKey::Id(student_id))
        .scope(CacheScope::Enrollment)
        .scope(CacheScope::CourseRoster)
}

/// Evictions after a student is deactivated.
#[must_use]
pub fn deactivated_invalidation(student_id: i64) -> InvalidationSet {
    InvalidationSet::new()
        .entry(CacheScope::Student, CacheKey::Id(student_id))
        .entry(CacheScope::Students, CacheKey::All)
        .entry(CacheScope::ActiveStudents, CacheKey::All)
}

fn with_person(
    pair: (student::Model, Option<person_entity::Model>),
) -> Result<StudentRecord> {
    let (student, person) = pair;
    let person = person.ok_or_else(|| Error::not_found("person", student.person_id))?;
    Ok(StudentRecord { student, person })
}

async fn load_student<C>(db: &C, student_id: i64) -> Result<Option<StudentRecord>>
where
    C: ConnectionTrait,
{
    Student::find_by_id(student_id)
        .find_also_related(Person)
        .one(db)
        .await?
        .map(with_person)
        .transpose()
}

async fn enrollment_number_taken<C>(db: &C, number: &str, except: Option<i64>) -> Result<bool>
where
    C: ConnectionTrait,
{
    let mut query = Student::find().filter(student::Column::EnrollmentNumber.eq(number));
    if let Some(id) = except {
        query = query.filter(student::Column::Id.ne(id));
    }
    Ok(query.count(db).await? > 0)
}

/// Fetches a student by ID through the `student` cache scope.
///
/// # Errors
/// `NotFound` if the student does not exist.
pub async fn get_student(
    db: &DatabaseConnection,
    cache: &CacheCoordinator,
    student_id: i64,
) -> Result<StudentRecord> {
    cache
        .get_or_populate(CacheScope::Student, CacheKey::Id(student_id), || async {
            load_student(db, student_id)
                .await?
                .ok_or_else(|| Error::not_found("student", student_id))
        })
        .await
}

/// Finds a student by enrollment number.
pub async fn get_student_by_enrollment_number(
    db: &DatabaseConnection,
    enrollment_number: &str,
) -> Result<Option<StudentRecord>> {
    Student::find()
        .filter(student::Column::EnrollmentNumber.eq(enrollment_number))
        .find_also_related(Person)
        .one(db)
        .await?
        .map(with_person)
        .transpose()
}

/// All students ordered by enrollment number, through the `students` scope.
pub async fn list_students(
    db: &DatabaseConnection,
    cache: &CacheCoordinator,
) -> Result<Vec<StudentRecord>> {
    cache
        .get_or_populate(CacheScope::Students, CacheKey::All, || async {
            Student::find()
                .find_also_related(Person)
                .order_by_asc(student::Column::EnrollmentNumber)
                .all(db)
                .await?
                .into_iter()
                .map(with_person)
                .collect::<Result<Vec<_>>>()
        })
        .await
}

/// Active students ordered by enrollment number, through the `activeStudents` scope.
pub async fn list_active_students(
    db: &DatabaseConnection,
    cache: &CacheCoordinator,
) -> Result<Vec<StudentRecord>> {
    cache
        .get_or_populate(CacheScope::ActiveStudents, CacheKey::All, || async {
            Student::find()
                .filter(student::Column::Status.eq(StudentStatus::Active))
                .find_also_related(Person)
                .order_by_asc(student::Column::EnrollmentNumber)
                .all(db)
                .await?
                .into_iter()
                .map(with_person)
                .collect::<Result<Vec<_>>>()
        })
        .await
}

/// Courses the student takes through active enrollments, through the `studentCourses` scope.
///
/// # Errors
/// `NotFound` if the student does not exist.
pub async fn student_courses(
    db: &DatabaseConnection,
    cache: &CacheCoordinator,
    student_id: i64,
) -> Result<Vec<course::Model>> {
    cache
        .get_or_populate(CacheScope::StudentCourses, CacheKey::Id(student_id), || async {
            if Student::find_by_id(student_id).one(db).await?.is_none() {
                return Err(Error::not_found("student", student_id));
            }
            let course_ids: Vec<i64> = Enrollment::find()
                .select_only()
                .column(enrollment::Column::CourseId)
                .filter(enrollment::Column::StudentId.eq(student_id))
                .filter(enrollment::Column::Active.eq(true))
                .into_tuple()
                .all(db)
                .await?;
            if course_ids.is_empty() {
                return Ok(Vec::new());
            }
            Course::find()
                .filter(course::Column::Id.is_in(course_ids))
                .order_by_asc(course::Column::Code)
                .all(db)
                .await
                .map_err(Into::into)
        })
        .await
}

/// Registers a new active student.
///
/// # Errors
/// - `Validation` for blank names or enrollment number, or a malformed or blocked email
/// - `IntegrityViolation` if the email or enrollment number is already taken
#[instrument(skip(db, cache, actor, person))]
pub async fn create_student(
    db: &DatabaseConnection,
    cache: &CacheCoordinator,
    actor: &dyn AuthContext,
    person: NewPerson,
    enrollment_number: &str,
) -> Result<StudentRecord> {
    let enrollment_number = enrollment_number.trim();
    if enrollment_number.is_empty() {
        return Err(Error::validation("enrollment number cannot be empty"));
    }
    person::validate(&person)?;
    if enrollment_number_taken(db, enrollment_number, None).await? {
        return Err(Error::IntegrityViolation {
            message: format!("enrollment number {enrollment_number} already exists"),
        });
    }

    let txn = db.begin().await?;
    let person = person::insert(&txn, person).await?;
    let student = student::ActiveModel {
        person_id: Set(person.id),
        enrollment_number: Set(enrollment_number.to_string()),
        status: Set(StudentStatus::Active),
        created_by: Set(actor.principal().to_string()),
        created_at: Set(Utc::now().naive_utc()),
        modified_by: Set(None),
        modified_at: Set(None),
        deactivated_by: Set(None),
        deactivated_at: Set(None),
        deactivation_reason: Set(None),
        ..Default::default()
    }
    .insert(&txn)
    .await?;
    txn.commit().await?;

    cache.invalidate(&created_invalidation()).await;
    info!(student_id = student.id, %enrollment_number, "student created");

    get_student(db, cache, student.id).await
}

/// Applies an administrative update. Setting the status back to `Active` clears the
/// deactivation fields.
///
/// # Errors
/// - `NotFound` if the student does not exist
/// - `Validation` for blank replacement values or a bad email
/// - `IntegrityViolation` if the new email or enrollment number belongs to someone else
#[instrument(skip(db, cache, actor, update))]
pub async fn update_student(
    db: &DatabaseConnection,
    cache: &CacheCoordinator,
    actor: &dyn AuthContext,
    student_id: i64,
    update: StudentUpdate,
) -> Result<StudentRecord> {
    let current = load_student(db, student_id)
        .await?
        .ok_or_else(|| Error::not_found("student", student_id))?;

    let candidate = NewPerson {
        first_name: update
            .first_name
            .unwrap_or_else(|| current.person.first_name.clone()),
        last_name: update
            .last_name
            .unwrap_or_else(|| current.person.last_name.clone()),
        email: update.email.unwrap_or_else(|| current.person.email.clone()),
        birth_date: update.birth_date.unwrap_or(current.person.birth_date),
    };
    person::validate(&candidate)?;

    let email = candidate.email.trim().to_string();
    if email != current.person.email && person::email_exists(db, &email).await? {
        return Err(Error::IntegrityViolation {
            message: format!("email {email} already exists"),
        });
    }

    let enrollment_number = match update.enrollment_number {
        Some(number) => {
            let number = number.trim().to_string();
            if number.is_empty() {
                return Err(Error::validation("enrollment number cannot be empty"));
            }
            if enrollment_number_taken(db, &number, Some(student_id)).await? {
                return Err(Error::IntegrityViolation {
                    message: format!("enrollment number {number} already exists"),
                });
            }
            number
        }
        None => current.student.enrollment_number.clone(),
    };

    let now = Utc::now().naive_utc();
    let txn = db.begin().await?;

    let mut person: person_entity::ActiveModel = current.person.into();
    person.first_name = Set(candidate.first_name.trim().to_string());
    person.last_name = Set(candidate.last_name.trim().to_string());
    person.email = Set(email);
    person.birth_date = Set(candidate.birth_date);
    person.update(&txn).await?;

    let reactivate = update.status == Some(StudentStatus::Active)
        && current.student.status == StudentStatus::Inactive;
    let mut student: student::ActiveModel = current.student.into();
    student.enrollment_number = Set(enrollment_number);
    student.modified_by = Set(Some(actor.principal().to_string()));
    student.modified_at = Set(Some(now));
    if let Some(status) = update.status {
        student.status = Set(status);
    }
    if reactivate {
        student.deactivated_by = Set(None);
        student.deactivated_at = Set(None);
        student.deactivation_reason = Set(None);
    }
    student.update(&txn).await?;
    txn.commit().await?;

    cache.invalidate(&updated_invalidation(student_id)).await;
    info!(student_id, reactivate, "student updated");

    get_student(db, cache, student_id).await
}

/// Logically removes a student. A reason is required.
///
/// # Errors
/// - `Validation` if the reason is blank
/// - `NotFound` if the student does not exist
#[instrument(skip(db, cache, actor))]
pub async fn deactivate_student(
    db: &DatabaseConnection,
    cache: &CacheCoordinator,
    actor: &dyn AuthContext,
    student_id: i64,
    reason: &str,
) -> Result<StudentRecord> {
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(Error::validation("a deactivation reason is required"));
    }

    let current = Student::find_by_id(student_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("student", student_id))?;

    let mut student: student::ActiveModel = current.into();
    student.status = Set(StudentStatus::Inactive);
    student.deactivated_by = Set(Some(actor.principal().to_string()));
    student.deactivated_at = Set(Some(Utc::now().naive_utc()));
    student.deactivation_reason = Set(Some(reason.to_string()));
    student.update(db).await?;

    cache.invalidate(&deactivated_invalidation(student_id)).await;
    info!(student_id, "student deactivated");

    get_student(db, cache, student_id).await
}
