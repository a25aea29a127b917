/// Database connection and table creation
pub mod database;

/// Catalog seed loading from catalog.toml
pub mod catalog;

/// Runtime settings from environment variables
pub mod settings;
