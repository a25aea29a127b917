//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the database tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod course;
pub mod course_prerequisite;
pub mod enrollment;
pub mod person;
pub mod student;
pub mod teacher;

// Re-export specific types to avoid conflicts
pub use course::{Column as CourseColumn, Entity as Course, Model as CourseModel};
pub use course_prerequisite::{
    Column as CoursePrerequisiteColumn, Entity as CoursePrerequisite,
    Model as CoursePrerequisiteModel,
};
pub use enrollment::{
    Column as EnrollmentColumn, Entity as Enrollment, EnrollmentStatus, Model as EnrollmentModel,
};
pub use person::{Column as PersonColumn, Entity as Person, Model as PersonModel};
pub use student::{
    Column as StudentColumn, Entity as Student, Model as StudentModel, StudentStatus,
};
pub use teacher::{Column as TeacherColumn, Entity as Teacher, Model as TeacherModel};
