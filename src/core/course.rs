//! Course business logic - catalog entries and teacher assignment.
//!
//! Prerequisite edges are handled by [`crate::core::course_graph`].

use crate::{
    core::teacher,
    entities::{Course, course},
    errors::{Error, Result},
};
use regex::Regex;
use sea_orm::{Set, prelude::*};
use std::sync::LazyLock;
use tracing::{info, instrument};

#[allow(clippy::expect_used)] // literal pattern
static COURSE_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z]{3}\d{3}$").expect("course code pattern is valid"));

/// Checks that `code` is three uppercase letters followed by three digits.
///
/// # Errors
/// Returns `Validation` for any other shape.
pub fn validate_course_code(code: &str) -> Result<()> {
    if COURSE_CODE.is_match(code) {
        Ok(())
    } else {
        Err(Error::validation(format!(
            "invalid course code '{code}' (expected e.g. MAT101)"
        )))
    }
}

/// Finds a course by its unique ID.
pub async fn get_course_by_id<C>(db: &C, course_id: i64) -> Result<Option<course::Model>>
where
    C: ConnectionTrait,
{
    Course::find_by_id(course_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Finds a course by its catalog code.
pub async fn get_course_by_code(
    db: &DatabaseConnection,
    code: &str,
) -> Result<Option<course::Model>> {
    Course::find()
        .filter(course::Column::Code.eq(code))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Creates a course after validating the code, name and credit count.
///
/// # Errors
/// - `Validation` if the code does not match the pattern, the name is blank, or
///   credits are below 1
/// - `IntegrityViolation` if the code is already taken
#[instrument(skip(db))]
pub async fn create_course(
    db: &DatabaseConnection,
    code: &str,
    name: &str,
    credits: i32,
) -> Result<course::Model> {
    let code = code.trim();
    validate_course_code(code)?;

    if name.trim().is_empty() {
        return Err(Error::validation("course name cannot be empty"));
    }
    if credits < 1 {
        return Err(Error::validation(format!(
            "a course needs at least 1 credit, got {credits}"
        )));
    }

    if get_course_by_code(db, code).await?.is_some() {
        return Err(Error::IntegrityViolation {
            message: format!("course code {code} already exists"),
        });
    }

    let course = course::ActiveModel {
        code: Set(code.to_string()),
        name: Set(name.trim().to_string()),
        credits: Set(credits),
        teacher_id: Set(None),
        ..Default::default()
    };
    let created = course.insert(db).await?;
    info!(course_id = created.id, code = %created.code, "course created");
    Ok(created)
}

/// Assigns a teacher to a course.
///
/// # Errors
/// `NotFound` if either the course or the teacher does not exist.
#[instrument(skip(db))]
pub async fn assign_teacher(
    db: &DatabaseConnection,
    course_id: i64,
    teacher_id: i64,
) -> Result<course::Model> {
    let course = get_course_by_id(db, course_id)
        .await?
        .ok_or_else(|| Error::not_found("course", course_id))?;
    if teacher::get_teacher_by_id(db, teacher_id).await?.is_none() {
        return Err(Error::not_found("teacher", teacher_id));
    }

    let mut active: course::ActiveModel = course.into();
    active.teacher_id = Set(Some(teacher_id));
    active.update(db).await.map_err(Into::into)
}
