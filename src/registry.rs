//! Application façade.
//!
//! A [`Registry`] owns the connection, the cache, the lock manager and the runtime
//! settings, and exposes the records operations with those collaborators already
//! wired in. It is cheap to clone and can be shared between tasks.

use crate::{
    cache::{CacheCoordinator, CacheStats},
    config::{catalog::CatalogConfig, database, settings::Settings},
    core::{
        auth::StaticPrincipal,
        catalog::{self, SeedReport},
        course, course_graph,
        enrollment::{self, EnrollmentView},
        lifecycle::TransitionPolicy,
        lock::{self, LockManager, LockedStudent},
        person::NewPerson,
        student::{self, StudentRecord, StudentUpdate},
        teacher,
    },
    entities::{CourseModel, EnrollmentModel, EnrollmentStatus, TeacherModel},
    errors::{Error, Result},
};
use chrono::NaiveDate;
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tracing::info;

/// Shared handle to the records core.
#[derive(Debug, Clone)]
pub struct Registry {
    db: DatabaseConnection,
    cache: Arc<CacheCoordinator>,
    locks: Arc<LockManager>,
    settings: Arc<Settings>,
    actor: StaticPrincipal,
}

impl Registry {
    /// Wraps an existing connection. Tables must already exist.
    #[must_use]
    pub fn new(db: DatabaseConnection, settings: Settings) -> Self {
        let actor = StaticPrincipal::new(settings.default_actor.clone());
        Self {
            db,
            cache: Arc::new(CacheCoordinator::new()),
            locks: Arc::new(LockManager::new()),
            settings: Arc::new(settings),
            actor,
        }
    }

    /// Connects to `settings.database_url` and creates any missing tables.
    pub async fn connect(settings: Settings) -> Result<Self> {
        database::prepare_sqlite_path(&settings.database_url)?;
        let db = database::create_connection(&settings.database_url, settings.max_connections).await?;
        database::create_tables(&db).await?;
        info!("Records registry ready");
        Ok(Self::new(db, settings))
    }

    /// Underlying connection.
    #[must_use]
    pub const fn database(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Runtime settings.
    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Cache hit and miss counts.
    #[must_use]
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Drops every cached read.
    pub async fn clear_cache(&self) {
        self.cache.clear().await;
    }

    fn policy(&self) -> TransitionPolicy {
        TransitionPolicy::from_strict(self.settings.strict_status_transitions)
    }

    /// Seeds the catalog file named in the settings, if it exists.
    pub async fn seed_from_settings(&self) -> Result<Option<SeedReport>> {
        let path = &self.settings.catalog_path;
        if !path.exists() {
            info!(?path, "No catalog file, skipping seed");
            return Ok(None);
        }
        let catalog = crate::config::catalog::load_catalog(path)?;
        self.seed_catalog(&catalog).await.map(Some)
    }

    /// Seeds teachers, courses, prerequisite edges and students.
    pub async fn seed_catalog(&self, catalog: &CatalogConfig) -> Result<SeedReport> {
        catalog::seed_catalog(&self.db, &self.cache, &self.actor, catalog).await
    }

    // Enrollments

    /// Registers a student in a course.
    pub async fn create_enrollment(
        &self,
        student_id: i64,
        course_id: i64,
        enrollment_date: NaiveDate,
    ) -> Result<EnrollmentView> {
        enrollment::create_enrollment(&self.db, &self.cache, student_id, course_id, enrollment_date)
            .await
    }

    /// Overwrites an enrollment's status under the configured transition policy.
    pub async fn update_enrollment_status(
        &self,
        enrollment_id: i64,
        status: EnrollmentStatus,
    ) -> Result<EnrollmentView> {
        enrollment::update_enrollment_status(
            &self.db,
            &self.cache,
            enrollment_id,
            status,
            self.policy(),
        )
        .await
    }

    /// Cancels an enrollment.
    pub async fn cancel_enrollment(&self, enrollment_id: i64) -> Result<EnrollmentModel> {
        enrollment::cancel_enrollment(&self.db, &self.cache, enrollment_id).await
    }

    /// One active enrollment.
    pub async fn get_enrollment(&self, enrollment_id: i64) -> Result<EnrollmentView> {
        enrollment::get_enrollment(&self.db, &self.cache, enrollment_id).await
    }

    /// Active enrollments of a student.
    pub async fn list_enrollments_for_student(&self, student_id: i64) -> Result<Vec<EnrollmentView>> {
        enrollment::list_enrollments_for_student(&self.db, &self.cache, student_id).await
    }

    /// Active enrollments of a course.
    pub async fn list_course_roster(&self, course_id: i64) -> Result<Vec<EnrollmentView>> {
        enrollment::list_course_roster(&self.db, &self.cache, course_id).await
    }

    // Prerequisite graph

    /// Whether attaching `prerequisite_id` to `course_id` would form a cycle.
    pub async fn would_form_cycle(
        &self,
        course_id: Option<i64>,
        prerequisite_id: Option<i64>,
    ) -> Result<bool> {
        course_graph::would_form_cycle(&self.db, course_id, prerequisite_id).await
    }

    /// Adds a prerequisite edge after the cycle check.
    pub async fn add_prerequisite(&self, course_id: i64, prerequisite_id: i64) -> Result<()> {
        course_graph::add_prerequisite(&self.db, course_id, prerequisite_id).await
    }

    /// Removes a prerequisite edge.
    pub async fn remove_prerequisite(&self, course_id: i64, prerequisite_id: i64) -> Result<bool> {
        course_graph::remove_prerequisite(&self.db, course_id, prerequisite_id).await
    }

    /// Direct prerequisites of a course.
    pub async fn prerequisites_of(&self, course_id: i64) -> Result<Vec<CourseModel>> {
        course_graph::prerequisites_of(&self.db, course_id).await
    }

    /// Courses that require `course_id`.
    pub async fn dependents_of(&self, course_id: i64) -> Result<Vec<CourseModel>> {
        course_graph::dependents_of(&self.db, course_id).await
    }

    // Students

    /// Reads a student under an exclusive hold, using the configured hold and wait.
    pub async fn lock_student(&self, student_id: i64) -> Result<LockedStudent> {
        lock::lock_student(
            &self.db,
            &self.locks,
            student_id,
            self.settings.lock_hold,
            self.settings.lock_wait_timeout,
        )
        .await
    }

    /// Registers a student.
    pub async fn create_student(
        &self,
        person: NewPerson,
        enrollment_number: &str,
    ) -> Result<StudentRecord> {
        student::create_student(&self.db, &self.cache, &self.actor, person, enrollment_number).await
    }

    /// One student by ID.
    pub async fn get_student(&self, student_id: i64) -> Result<StudentRecord> {
        student::get_student(&self.db, &self.cache, student_id).await
    }

    /// One student by enrollment number.
    pub async fn get_student_by_enrollment_number(
        &self,
        enrollment_number: &str,
    ) -> Result<StudentRecord> {
        student::get_student_by_enrollment_number(&self.db, enrollment_number)
            .await?
            .ok_or_else(|| Error::not_found("student", enrollment_number))
    }

    /// Every student.
    pub async fn list_students(&self) -> Result<Vec<StudentRecord>> {
        student::list_students(&self.db, &self.cache).await
    }

    /// Active students.
    pub async fn list_active_students(&self) -> Result<Vec<StudentRecord>> {
        student::list_active_students(&self.db, &self.cache).await
    }

    /// Administrative update.
    pub async fn update_student(
        &self,
        student_id: i64,
        update: StudentUpdate,
    ) -> Result<StudentRecord> {
        student::update_student(&self.db, &self.cache, &self.actor, student_id, update).await
    }

    /// Logical removal with a reason.
    pub async fn deactivate_student(&self, student_id: i64, reason: &str) -> Result<StudentRecord> {
        student::deactivate_student(&self.db, &self.cache, &self.actor, student_id, reason).await
    }

    /// Courses a student takes through active enrollments.
    pub async fn student_courses(&self, student_id: i64) -> Result<Vec<CourseModel>> {
        student::student_courses(&self.db, &self.cache, student_id).await
    }

    // Courses and teachers

    /// Creates a course.
    pub async fn create_course(&self, code: &str, name: &str, credits: i32) -> Result<CourseModel> {
        course::create_course(&self.db, code, name, credits).await
    }

    /// One course by ID.
    pub async fn get_course(&self, course_id: i64) -> Result<CourseModel> {
        course::get_course_by_id(&self.db, course_id)
            .await?
            .ok_or_else(|| Error::not_found("course", course_id))
    }

    /// Assigns a teacher to a course.
    pub async fn assign_teacher(&self, course_id: i64, teacher_id: i64) -> Result<CourseModel> {
        course::assign_teacher(&self.db, course_id, teacher_id).await
    }

    /// Creates a teacher.
    pub async fn create_teacher(
        &self,
        person: NewPerson,
        employee_number: &str,
        department: &str,
    ) -> Result<TeacherModel> {
        teacher::create_teacher(&self.db, person, employee_number, department).await
    }

    /// One teacher by ID.
    pub async fn get_teacher(&self, teacher_id: i64) -> Result<TeacherModel> {
        teacher::get_teacher_by_id(&self.db, teacher_id)
            .await?
            .ok_or_else(|| Error::not_found("teacher", teacher_id))
    }
}
