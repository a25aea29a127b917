//! Catalog seeding from a parsed `catalog.toml`.
//!
//! Seeding is idempotent: records that already exist (by employee number, course
//! code or enrollment number) are skipped, and existing prerequisite edges are left
//! alone. Prerequisite edges go through the normal cycle check.

use crate::{
    cache::CacheCoordinator,
    config::catalog::{CatalogConfig, PersonSeed},
    core::{auth::AuthContext, course, course_graph, person::NewPerson, student, teacher},
    errors::{Error, Result},
};
use sea_orm::DatabaseConnection;
use tracing::{debug, info, instrument, warn};

/// What one seeding pass created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedReport {
    /// Teachers inserted
    pub teachers: usize,
    /// Courses inserted
    pub courses: usize,
    /// Prerequisite edges inserted
    pub prerequisites: usize,
    /// Students inserted
    pub students: usize,
}

impl From<&PersonSeed> for NewPerson {
    fn from(seed: &PersonSeed) -> Self {
        Self {
            first_name: seed.first_name.clone(),
            last_name: seed.last_name.clone(),
            email: seed.email.clone(),
            birth_date: seed.birth_date,
        }
    }
}

/// Creates every catalog record that does not exist yet.
///
/// # Errors
/// - `Config` if a course names an unknown prerequisite code or teacher
/// - `Validation` if a seed record is malformed or an edge would form a cycle
#[instrument(skip(db, cache, actor, catalog))]
pub async fn seed_catalog(
    db: &DatabaseConnection,
    cache: &CacheCoordinator,
    actor: &dyn AuthContext,
    catalog: &CatalogConfig,
) -> Result<SeedReport> {
    info!(
        teachers = catalog.teachers.len(),
        courses = catalog.courses.len(),
        students = catalog.students.len(),
        "Seeding catalog"
    );
    let mut report = SeedReport::default();

    for seed in &catalog.teachers {
        if teacher::get_teacher_by_employee_number(db, &seed.employee_number)
            .await?
            .is_some()
        {
            debug!(employee_number = %seed.employee_number, "teacher exists, skipping");
            continue;
        }
        teacher::create_teacher(
            db,
            NewPerson::from(&seed.person),
            &seed.employee_number,
            &seed.department,
        )
        .await?;
        report.teachers += 1;
    }

    for seed in &catalog.courses {
        if course::get_course_by_code(db, &seed.code).await?.is_some() {
            debug!(code = %seed.code, "course exists, skipping");
            continue;
        }
        course::create_course(db, &seed.code, &seed.name, seed.credits).await?;
        report.courses += 1;
    }

    // Edges and assignments need every course of the file to exist first.
    for seed in &catalog.courses {
        let target = require_course(db, &seed.code).await?;
        let existing = course_graph::prerequisite_ids(db, target.id).await?;

        for code in &seed.prerequisites {
            let prerequisite = course::get_course_by_code(db, code)
                .await?
                .ok_or_else(|| Error::Config {
                    message: format!("course {} lists unknown prerequisite {code}", seed.code),
                })?;
            if existing.contains(&prerequisite.id) {
                continue;
            }
            course_graph::add_prerequisite(db, target.id, prerequisite.id).await?;
            report.prerequisites += 1;
        }

        if let Some(employee_number) = &seed.teacher {
            let assigned = teacher::get_teacher_by_employee_number(db, employee_number)
                .await?
                .ok_or_else(|| Error::Config {
                    message: format!(
                        "course {} names unknown teacher {employee_number}",
                        seed.code
                    ),
                })?;
            if target.teacher_id == Some(assigned.id) {
                continue;
            }
            if target.teacher_id.is_some() {
                warn!(code = %seed.code, %employee_number, "replacing assigned teacher");
            }
            course::assign_teacher(db, target.id, assigned.id).await?;
        }
    }

    for seed in &catalog.students {
        if student::get_student_by_enrollment_number(db, &seed.enrollment_number)
            .await?
            .is_some()
        {
            debug!(enrollment_number = %seed.enrollment_number, "student exists, skipping");
            continue;
        }
        student::create_student(
            db,
            cache,
            actor,
            NewPerson::from(&seed.person),
            &seed.enrollment_number,
        )
        .await?;
        report.students += 1;
    }

    info!(?report, "Finished seeding catalog");
    Ok(report)
}

async fn require_course(
    db: &DatabaseConnection,
    code: &str,
) -> Result<crate::entities::CourseModel> {
    course::get_course_by_code(db, code)
        .await?
        .ok_or_else(|| Error::not_found("course", code))
}
