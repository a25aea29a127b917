//! Teacher records - only what course assignment needs.

use crate::{
    core::person::{self, NewPerson},
    entities::{Teacher, teacher},
    errors::{Error, Result},
};
use sea_orm::{Set, TransactionTrait, prelude::*};
use tracing::info;

/// Finds a teacher by ID.
pub async fn get_teacher_by_id<C>(db: &C, teacher_id: i64) -> Result<Option<teacher::Model>>
where
    C: ConnectionTrait,
{
    Teacher::find_by_id(teacher_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Finds a teacher by employee number.
pub async fn get_teacher_by_employee_number(
    db: &DatabaseConnection,
    employee_number: &str,
) -> Result<Option<teacher::Model>> {
    Teacher::find()
        .filter(teacher::Column::EmployeeNumber.eq(employee_number))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Creates the person record and the teacher record in one transaction.
///
/// # Errors
/// - `Validation` for blank names, employee number or department, or a bad email
/// - `IntegrityViolation` if the email or employee number is already taken
pub async fn create_teacher(
    db: &DatabaseConnection,
    person: NewPerson,
    employee_number: &str,
    department: &str,
) -> Result<teacher::Model> {
    let employee_number = employee_number.trim();
    if employee_number.is_empty() {
        return Err(Error::validation("employee number cannot be empty"));
    }
    if department.trim().is_empty() {
        return Err(Error::validation("department cannot be empty"));
    }
    person::validate(&person)?;

    if get_teacher_by_employee_number(db, employee_number)
        .await?
        .is_some()
    {
        return Err(Error::IntegrityViolation {
            message: format!("employee number {employee_number} already exists"),
        });
    }

    let txn = db.begin().await?;
    let person = person::insert(&txn, person).await?;
    let teacher = teacher::ActiveModel {
        person_id: Set(person.id),
        employee_number: Set(employee_number.to_string()),
        department: Set(department.trim().to_string()),
        ..Default::default()
    }
    .insert(&txn)
    .await?;
    txn.commit().await?;

    info!(teacher_id = teacher.id, "teacher created");
    Ok(teacher)
}
