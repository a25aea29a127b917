/// Acting principal for audit fields
pub mod auth;

/// Catalog seeding from catalog.toml
pub mod catalog;

/// Course records and teacher assignment
pub mod course;

/// Prerequisite graph and cycle detection
pub mod course_graph;

/// Enrollment registration, status changes and cancellation
pub mod enrollment;

/// Enrollment state machine rules
pub mod lifecycle;

/// Exclusive per-student holds
pub mod lock;

/// Person records shared by students and teachers
pub mod person;

/// Student registration, updates and deactivation
pub mod student;

/// Teacher records
pub mod teacher;
