//! Database configuration module.
//!
//! This module handles the `SQLite` connection and table creation using `SeaORM`.
//! Tables are generated from the entity definitions with
//! `Schema::create_table_from_entity`, so the schema always matches the Rust structs.
//! The one constraint the entity macros cannot express, at most one active enrollment
//! per student and course, is added as a partial unique index.

use crate::entities::{Course, CoursePrerequisite, Enrollment, Person, Student, Teacher};
use crate::errors::{Error, Result};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbBackend, Schema};
use std::path::Path;
use tracing::{debug, info, instrument};

/// Default location of the records database when `DATABASE_URL` is unset.
pub const DEFAULT_DATABASE_URL: &str = "sqlite://data/university_records.sqlite?mode=rwc";

const ACTIVE_ENROLLMENT_INDEX: &str = "CREATE UNIQUE INDEX IF NOT EXISTS \
     idx_enrollments_active_pair ON enrollments (student_id, course_id) WHERE active";

/// Creates the parent directory of a file-backed `SQLite` URL so `mode=rwc` can create
/// the file. Other URLs are left alone.
pub fn prepare_sqlite_path(database_url: &str) -> Result<()> {
    let Some(rest) = database_url.strip_prefix("sqlite://") else {
        return Ok(());
    };
    let path = rest.split('?').next().unwrap_or_default();
    if path.is_empty() || path.contains(":memory:") {
        return Ok(());
    }
    if let Some(parent) = Path::new(path).parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| Error::Config {
            message: format!("Failed to create database directory {parent:?}: {e}"),
        })?;
    }
    Ok(())
}

fn is_in_memory(database_url: &str) -> bool {
    database_url.contains(":memory:") || database_url.contains("mode=memory")
}

/// Establishes a pool of up to `max_connections` connections to `database_url`.
///
/// A private in-memory `SQLite` database exists per connection, so it always gets a
/// single one. File-backed `SQLite` is switched to WAL so readers do not wait on the
/// writer.
#[instrument]
pub async fn create_connection(
    database_url: &str,
    max_connections: u32,
) -> Result<DatabaseConnection> {
    let in_memory = is_in_memory(database_url);
    let pool_size = if in_memory { 1 } else { max_connections.max(1) };
    debug!(pool_size, "Connecting to database");

    let mut options = ConnectOptions::new(database_url);
    options.max_connections(pool_size);
    let db = Database::connect(options).await?;

    if !in_memory && db.get_database_backend() == DbBackend::Sqlite {
        db.execute_unprepared("PRAGMA journal_mode=WAL").await?;
    }
    Ok(db)
}

/// Creates all tables in dependency order, plus the active-enrollment index.
///
/// Safe to call on an existing database: every statement is `IF NOT EXISTS`.
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    let mut persons = schema.create_table_from_entity(Person);
    let mut teachers = schema.create_table_from_entity(Teacher);
    let mut students = schema.create_table_from_entity(Student);
    let mut courses = schema.create_table_from_entity(Course);
    let mut prerequisites = schema.create_table_from_entity(CoursePrerequisite);
    let mut enrollments = schema.create_table_from_entity(Enrollment);

    for table in [
        persons.if_not_exists(),
        teachers.if_not_exists(),
        students.if_not_exists(),
        courses.if_not_exists(),
        prerequisites.if_not_exists(),
        enrollments.if_not_exists(),
    ] {
        db.execute(builder.build(&*table)).await?;
    }

    db.execute_unprepared(ACTIVE_ENROLLMENT_INDEX).await?;
    info!("Database tables ready");

    Ok(())
}
