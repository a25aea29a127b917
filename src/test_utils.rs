//! Shared test utilities for the records core.
//!
//! This module provides common helper functions for setting up test databases
//! and creating test entities with sensible defaults.

use crate::{
    cache::CacheCoordinator,
    core::{auth::StaticPrincipal, course, person::NewPerson, student, teacher},
    entities::{self, EnrollmentStatus},
    errors::Result,
};
use chrono::{NaiveDate, Utc};
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use std::sync::atomic::{AtomicUsize, Ordering};

static FILE_DB_SEQ: AtomicUsize = AtomicUsize::new(0);

/// Installs a test-writer subscriber once per test binary.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    init_test_tracing();
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Path of a fresh, not yet created, temporary `SQLite` file.
#[must_use]
pub fn temp_db_path() -> std::path::PathBuf {
    let n = FILE_DB_SEQ.fetch_add(1, Ordering::Relaxed);
    let path = std::env::temp_dir().join(format!(
        "university-records-test-{}-{n}.sqlite",
        std::process::id()
    ));
    for suffix in ["", "-wal", "-shm"] {
        let _ = std::fs::remove_file(format!("{}{suffix}", path.display()));
    }
    path
}

/// Creates a file-backed `SQLite` database with a multi-connection pool.
///
/// Used where tests need connections that really run side by side.
pub async fn setup_file_db() -> Result<DatabaseConnection> {
    init_test_tracing();
    let url = format!("sqlite://{}?mode=rwc", temp_db_path().display());
    let db = crate::config::database::create_connection(&url, 4).await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Person input with a fixed birth date.
#[must_use]
pub fn test_person(first_name: &str, last_name: &str, email: &str) -> NewPerson {
    NewPerson {
        first_name: first_name.to_string(),
        last_name: last_name.to_string(),
        email: email.to_string(),
        birth_date: NaiveDate::from_ymd_opt(2003, 5, 17).unwrap_or_default(),
    }
}

/// Creates a test course with sensible defaults.
///
/// # Defaults
/// * `name`: "Course {code}"
/// * `credits`: 3
pub async fn create_test_course(
    db: &DatabaseConnection,
    code: &str,
) -> Result<entities::course::Model> {
    course::create_course(db, code, &format!("Course {code}"), 3).await
}

/// Creates a test teacher in the "Mathematics" department.
pub async fn create_test_teacher(
    db: &DatabaseConnection,
    employee_number: &str,
) -> Result<entities::teacher::Model> {
    let email = format!("{}@staff.uni.edu", employee_number.to_lowercase());
    teacher::create_teacher(
        db,
        test_person("Teacher", employee_number, &email),
        employee_number,
        "Mathematics",
    )
    .await
}

/// Creates an active test student named "Test {enrollment_number}".
///
/// The email is the lowercased enrollment number at `uni.edu`.
pub async fn create_test_student(
    db: &DatabaseConnection,
    enrollment_number: &str,
) -> Result<entities::student::Model> {
    let email = format!("{}@uni.edu", enrollment_number.to_lowercase());
    let record = student::create_student(
        db,
        &CacheCoordinator::new(),
        &StaticPrincipal::new("test_user"),
        test_person("Test", enrollment_number, &email),
        enrollment_number,
    )
    .await?;
    Ok(record.student)
}

/// Inserts an active `APPROVED` enrollment directly, bypassing the service checks.
pub async fn create_approved_enrollment(
    db: &DatabaseConnection,
    student_id: i64,
    course_id: i64,
) -> Result<entities::enrollment::Model> {
    entities::enrollment::ActiveModel {
        student_id: Set(student_id),
        course_id: Set(course_id),
        enrollment_date: Set(Utc::now().date_naive()),
        status: Set(EnrollmentStatus::Approved),
        active: Set(true),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Into::into)
}
