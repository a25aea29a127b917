//! Course prerequisite entity - One directed edge of the prerequisite graph.
//!
//! A row `(course_id, prerequisite_id)` means `prerequisite_id` must be completed
//! before `course_id` may be taken. This table is the store of record for the graph.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Prerequisite edge database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "course_prerequisites")]
pub struct Model {
    /// Course that carries the requirement
    #[sea_orm(primary_key, auto_increment = false)]
    pub course_id: i64,
    /// Course that must be completed first
    #[sea_orm(primary_key, auto_increment = false)]
    pub prerequisite_id: i64,
}

/// Both ends of the edge reference `courses`
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// The course carrying the requirement
    #[sea_orm(
        belongs_to = "super::course::Entity",
        from = "Column::CourseId",
        to = "super::course::Column::Id"
    )]
    Course,
    /// The required course
    #[sea_orm(
        belongs_to = "super::course::Entity",
        from = "Column::PrerequisiteId",
        to = "super::course::Column::Id"
    )]
    Prerequisite,
}

impl ActiveModelBehavior for ActiveModel {}
