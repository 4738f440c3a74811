//! # Facture Shared Library
//!
//! This crate contains the types, storage access, and authorization logic
//! shared by the Facture API server.
//!
//! ## Module Organization
//!
//! - `models`: Database models and data structures
//! - `auth`: Passwords, JWT sessions, and invitation tokens
//! - `authz`: Permission keys and the permission evaluator
//! - `plan`: Subscription-plan limits and the plan-limit evaluator
//! - `gate`: The request gate composing membership, permission, and plan checks
//! - `db`: Connection pool and migrations

pub mod auth;
pub mod authz;
pub mod db;
pub mod gate;
pub mod models;
pub mod plan;

/// Current version of the Facture shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
