//! Person entity - Shared personal data referenced by students and teachers.
//!
//! Students and teachers do not inherit from a common base; each row points at one
//! `persons` row by ID instead.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Person database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "persons")]
pub struct Model {
    /// Unique identifier for the person
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Given name
    pub first_name: String,
    /// Family name
    pub last_name: String,
    /// Contact email, unique across all persons
    #[sea_orm(unique)]
    pub email: String,
    /// Date of birth
    pub birth_date: Date,
}

impl Model {
    /// Given and family name joined with a space.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Defines relationships between Person and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// A person may be a student
    #[sea_orm(has_many = "super::student::Entity")]
    Students,
    /// A person may be a teacher
    #[sea_orm(has_many = "super::teacher::Entity")]
    Teachers,
}

impl Related<super::student::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Students.def()
    }
}

impl Related<super::teacher::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Teachers.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
