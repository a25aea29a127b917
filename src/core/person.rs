//! Person records shared by students and teachers.

use crate::{
    entities::{Person, person},
    errors::{Error, Result},
};
use chrono::NaiveDate;
use sea_orm::{Set, prelude::*};

/// Email domains that may not be used for new records.
pub const BLOCKED_EMAIL_DOMAINS: &[&str] = &["dominiobloqueado.com", "spam.com"];

/// Input for a new person record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPerson {
    /// Given name
    pub first_name: String,
    /// Family name
    pub last_name: String,
    /// Contact email
    pub email: String,
    /// Date of birth
    pub birth_date: NaiveDate,
}

/// Validates names and email shape, including the blocked-domain list.
///
/// # Errors
/// Returns `Validation` describing the first problem found.
pub fn validate(person: &NewPerson) -> Result<()> {
    if person.first_name.trim().is_empty() {
        return Err(Error::validation("first name cannot be empty"));
    }
    if person.last_name.trim().is_empty() {
        return Err(Error::validation("last name cannot be empty"));
    }

    let email = person.email.trim();
    let Some((local, domain)) = email.split_once('@') else {
        return Err(Error::validation(format!("invalid email '{email}'")));
    };
    if local.is_empty() || domain.is_empty() {
        return Err(Error::validation(format!("invalid email '{email}'")));
    }
    if BLOCKED_EMAIL_DOMAINS
        .iter()
        .any(|blocked| blocked.eq_ignore_ascii_case(domain))
    {
        return Err(Error::validation(format!(
            "email domain '{domain}' is not allowed"
        )));
    }
    Ok(())
}

/// Whether some person already uses `email`.
pub async fn email_exists<C>(db: &C, email: &str) -> Result<bool>
where
    C: ConnectionTrait,
{
    let count = Person::find()
        .filter(person::Column::Email.eq(email.trim()))
        .count(db)
        .await?;
    Ok(count > 0)
}

/// Finds a person by ID.
pub async fn get_person_by_id<C>(db: &C, person_id: i64) -> Result<Option<person::Model>>
where
    C: ConnectionTrait,
{
    Person::find_by_id(person_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Inserts a validated person.
///
/// # Errors
/// `IntegrityViolation` if the email is already used.
pub async fn insert<C>(db: &C, new: NewPerson) -> Result<person::Model>
where
    C: ConnectionTrait,
{
    if email_exists(db, &new.email).await? {
        return Err(Error::IntegrityViolation {
            message: format!("email {} already exists", new.email.trim()),
        });
    }

    person::ActiveModel {
        first_name: Set(new.first_name.trim().to_string()),
        last_name: Set(new.last_name.trim().to_string()),
        email: Set(new.email.trim().to_string()),
        birth_date: Set(new.birth_date),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::test_person;

    #[test]
    fn test_validate_accepts_well_formed_person() {
        assert!(validate(&test_person("Alan", "Turing", "alan@uni.edu")).is_ok());
    }

    #[test]
    fn test_validate_rejects_blank_names() {
        let result = validate(&test_person(" ", "Turing", "alan@uni.edu"));
        assert!(matches!(result, Err(Error::Validation { .. })));
        let result = validate(&test_person("Alan", "", "alan@uni.edu"));
        assert!(matches!(result, Err(Error::Validation { .. })));
    }

    #[test]
    fn test_validate_rejects_bad_and_blocked_emails() {
        for email in ["no-at-sign", "@uni.edu", "alan@", "alan@spam.com", "x@DominioBloqueado.com"] {
            let result = validate(&test_person("Alan", "Turing", email));
            assert!(
                matches!(result, Err(Error::Validation { .. })),
                "{email} should be rejected"
            );
        }
    }
}
