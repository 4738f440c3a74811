/// Database access layer
///
/// This module provides the PostgreSQL connection pool and migration runner.
///
/// # Modules
///
/// - [`pool`]: Connection pool creation, health checks, and statistics
/// - [`migrations`]: Schema migration runner built on `sqlx::migrate!`

pub mod migrations;
pub mod pool;
