//! Student entity - Enrollment number, lifecycle status and audit trail.
//!
//! Personal data lives in the referenced `persons` row. Deactivation is logical:
//! the row keeps its data and records who deactivated it, when, and why.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Lifecycle status of a student record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum StudentStatus {
    /// Currently studying
    #[sea_orm(string_value = "active")]
    Active,
    /// Logically removed; may be reactivated by an administrative update
    #[sea_orm(string_value = "inactive")]
    Inactive,
}

/// Student database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "students")]
pub struct Model {
    /// Unique identifier for the student
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Personal data of this student
    #[sea_orm(unique)]
    pub person_id: i64,
    /// University-issued enrollment number, globally unique
    #[sea_orm(unique)]
    pub enrollment_number: String,
    /// Current lifecycle status
    pub status: StudentStatus,
    /// Principal that created the record
    pub created_by: String,
    /// When the record was created
    pub created_at: DateTime,
    /// Principal that last modified the record
    pub modified_by: Option<String>,
    /// When the record was last modified
    pub modified_at: Option<DateTime>,
    /// Principal that deactivated the record
    pub deactivated_by: Option<String>,
    /// When the record was deactivated
    pub deactivated_at: Option<DateTime>,
    /// Reason given for deactivation
    pub deactivation_reason: Option<String>,
}

/// Defines relationships between Student and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each student references one person
    #[sea_orm(
        belongs_to = "super::person::Entity",
        from = "Column::PersonId",
        to = "super::person::Column::Id"
    )]
    Person,
    /// One student has many enrollments
    #[sea_orm(has_many = "super::enrollment::Entity")]
    Enrollments,
}

impl Related<super::person::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Person.def()
    }
}

impl Related<super::enrollment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Enrollments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
