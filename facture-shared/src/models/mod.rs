/// Database models for Facture
///
/// This module contains all database models and their CRUD operations.
///
/// # Models
///
/// - `user`: User accounts and authentication
/// - `organization`: Tenant boundary owning all business data
/// - `role`: Named permission-key sets, organization-scoped
/// - `membership`: User-organization bindings with a role
/// - `invitation`: Pending membership grants with single-use tokens
/// - `subscription`: Billing-provider status mirror
/// - `client`: CRM client records (plan-limited resource)
/// - `invoice`: Invoice records (monthly plan-limited resource)
/// - `audit`: Append-only audit log
///
/// # Example
///
/// ```no_run
/// use facture_shared::models::user::{User, CreateUser};
/// use facture_shared::db::pool::{create_pool, DatabaseConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::default()).await?;
///
/// let user = User::create(&pool, CreateUser {
///     email: "user@example.com".to_string(),
///     password_hash: "$argon2id$...".to_string(),
///     name: Some("Jo Doe".to_string()),
/// }).await?;
/// # Ok(())
/// # }
/// ```

pub mod audit;
pub mod client;
pub mod invitation;
pub mod invoice;
pub mod membership;
pub mod organization;
pub mod role;
pub mod subscription;
pub mod user;
