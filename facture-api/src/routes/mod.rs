/// API route handlers
///
/// Handlers are grouped by resource. Everything under the gated subtrees
/// goes through the request gate before touching data: membership first,
/// then the permission key, then any plan limit.

pub mod auth;
pub mod billing;
pub mod clients;
pub mod health;
pub mod invitations;
pub mod invoices;
pub mod members;
pub mod organizations;
