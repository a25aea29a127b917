//! Catalog seed loading from catalog.toml
//!
//! The seed file lists teachers, courses (with their prerequisite codes) and students
//! that should exist when the service starts. Seeding itself lives in
//! [`crate::core::catalog`]; this module only parses the file.

use crate::errors::{Error, Result};
use chrono::NaiveDate;
use serde::Deserialize;
use std::path::Path;

/// Configuration structure representing the entire catalog.toml file
#[derive(Debug, Default, Deserialize)]
pub struct CatalogConfig {
    /// Teachers to create
    #[serde(default)]
    pub teachers: Vec<TeacherSeed>,
    /// Courses to create, in any order
    #[serde(default)]
    pub courses: Vec<CourseSeed>,
    /// Students to create
    #[serde(default)]
    pub students: Vec<StudentSeed>,
}

/// Personal data shared by teacher and student seeds
#[derive(Debug, Deserialize, Clone)]
pub struct PersonSeed {
    /// Given name
    pub first_name: String,
    /// Family name
    pub last_name: String,
    /// Unique email
    pub email: String,
    /// Date of birth
    pub birth_date: NaiveDate,
}

/// A teacher to seed
#[derive(Debug, Deserialize, Clone)]
pub struct TeacherSeed {
    /// Unique employee number
    pub employee_number: String,
    /// Academic department
    pub department: String,
    /// Personal data
    #[serde(flatten)]
    pub person: PersonSeed,
}

/// A course to seed
#[derive(Debug, Deserialize, Clone)]
pub struct CourseSeed {
    /// Catalog code such as `MAT101`
    pub code: String,
    /// Course name
    pub name: String,
    /// Credit count
    pub credits: i32,
    /// Codes of the courses required before this one
    #[serde(default)]
    pub prerequisites: Vec<String>,
    /// Employee number of the assigned teacher
    #[serde(default)]
    pub teacher: Option<String>,
}

/// A student to seed
#[derive(Debug, Deserialize, Clone)]
pub struct StudentSeed {
    /// Unique enrollment number
    pub enrollment_number: String,
    /// Personal data
    #[serde(flatten)]
    pub person: PersonSeed,
}

/// Loads the catalog seed from a TOML file
///
/// # Errors
/// Returns an error if the file cannot be read or the TOML is invalid.
pub fn load_catalog<P: AsRef<Path>>(path: P) -> Result<CatalogConfig> {
    let path_ref = path.as_ref();
    tracing::debug!("Loading catalog seed from {:?}", path_ref);
    let contents = std::fs::read_to_string(path_ref).map_err(|e| Error::Config {
        message: format!("Failed to read catalog file {path_ref:?}: {e}"),
    })?;

    parse_catalog(&contents)
}

/// Parses catalog TOML text.
pub fn parse_catalog(contents: &str) -> Result<CatalogConfig> {
    toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse catalog.toml: {e}"),
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_parse_catalog() {
        let toml_str = r#"
            [[teachers]]
            employee_number = "T-100"
            department = "Mathematics"
            first_name = "Ada"
            last_name = "Lovelace"
            email = "ada@uni.edu"
            birth_date = "1980-12-10"

            [[courses]]
            code = "MAT101"
            name = "Calculus I"
            credits = 4
            teacher = "T-100"

            [[courses]]
            code = "MAT201"
            name = "Calculus II"
            credits = 4
            prerequisites = ["MAT101"]

            [[students]]
            enrollment_number = "E-001"
            first_name = "Alan"
            last_name = "Turing"
            email = "alan@uni.edu"
            birth_date = "2004-06-23"
        "#;

        let catalog = parse_catalog(toml_str).unwrap();
        assert_eq!(catalog.teachers.len(), 1);
        assert_eq!(catalog.teachers[0].person.first_name, "Ada");
        assert_eq!(catalog.courses.len(), 2);
        assert!(catalog.courses[0].prerequisites.is_empty());
        assert_eq!(catalog.courses[0].teacher.as_deref(), Some("T-100"));
        assert_eq!(catalog.courses[1].prerequisites, vec!["MAT101".to_string()]);
        assert_eq!(catalog.students[0].enrollment_number, "E-001");
        assert_eq!(
            catalog.students[0].person.birth_date,
            NaiveDate::from_ymd_opt(2004, 6, 23).unwrap()
        );
    }

    #[test]
    fn test_empty_catalog() {
        let catalog = parse_catalog("").unwrap();
        assert!(catalog.courses.is_empty());
        assert!(catalog.students.is_empty());
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let result = parse_catalog("[[courses]]\ncode = ");
        assert!(matches!(result, Err(Error::Config { .. })));
    }
}
