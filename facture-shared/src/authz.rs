/// Authorization helpers and permission checks
///
/// Permission checks are flat string-set membership: a role carries a set of
/// colon-namespaced permission keys (e.g. `invoice:create`) and a check
/// passes only on an exact key match. There is no wildcard expansion, no
/// prefix matching, and no priority-based implication; a role's `priority`
/// is display ordering only.
///
/// Every check is fail-closed: an unknown key, an empty permission set, or
/// a membership that can't be resolved all deny.
///
/// # Example
///
/// ```no_run
/// use facture_shared::authz::{keys, require_permission};
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// async fn check(pool: &PgPool, org_id: Uuid, user_id: Uuid) -> Result<(), Box<dyn std::error::Error>> {
///     let membership = require_permission(pool, org_id, user_id, keys::INVOICE_CREATE).await?;
///     assert_eq!(membership.organization_id, org_id);
///     Ok(())
/// }
/// ```

use sqlx::PgPool;
use uuid::Uuid;

use crate::models::membership::Membership;
use crate::models::role::Role;

/// Permission key constants
///
/// Keys are namespaced `resource:action`. Roles store these verbatim;
/// checks compare them verbatim.
pub mod keys {
    pub const ORGANIZATION_READ: &str = "org:read";
    pub const ORGANIZATION_UPDATE: &str = "org:update";
    pub const ORGANIZATION_DELETE: &str = "org:delete";

    pub const MEMBER_READ: &str = "member:read";
    pub const MEMBER_INVITE: &str = "member:invite";
    pub const MEMBER_UPDATE: &str = "member:update";
    pub const MEMBER_DELETE: &str = "member:delete";

    pub const CLIENT_CREATE: &str = "client:create";
    pub const CLIENT_READ: &str = "client:read";
    pub const CLIENT_UPDATE: &str = "client:update";
    pub const CLIENT_DELETE: &str = "client:delete";

    pub const INVOICE_CREATE: &str = "invoice:create";
    pub const INVOICE_READ: &str = "invoice:read";
    pub const INVOICE_UPDATE: &str = "invoice:update";
    pub const INVOICE_DELETE: &str = "invoice:delete";

    pub const AUDIT_READ: &str = "audit:read";
    pub const BILLING_MANAGE: &str = "billing:manage";

    /// Every known permission key
    pub const ALL: &[&str] = &[
        ORGANIZATION_READ,
        ORGANIZATION_UPDATE,
        ORGANIZATION_DELETE,
        MEMBER_READ,
        MEMBER_INVITE,
        MEMBER_UPDATE,
        MEMBER_DELETE,
        CLIENT_CREATE,
        CLIENT_READ,
        CLIENT_UPDATE,
        CLIENT_DELETE,
        INVOICE_CREATE,
        INVOICE_READ,
        INVOICE_UPDATE,
        INVOICE_DELETE,
        AUDIT_READ,
        BILLING_MANAGE,
    ];
}

/// Error type for authorization checks
#[derive(Debug, thiserror::Error)]
pub enum AuthzError {
    /// User is not a member of the organization
    #[error("Not a member of organization {0}")]
    NotMember(Uuid),

    /// Membership references a role that no longer exists
    #[error("Role {0} not found")]
    RoleNotFound(Uuid),

    /// Role doesn't grant the required permission
    #[error("Missing required permission: {0}")]
    PermissionDenied(String),

    /// Database error
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

/// Checks a permission key against a role's permission set
///
/// Pure exact-match lookup, fail-closed.
pub fn can(role: &Role, permission: &str) -> bool {
    role.allows(permission)
}

/// Resolves the user's membership in an organization, or denies
///
/// Membership is read fresh from the database on every call; nothing about
/// it is trusted from the session token.
///
/// # Errors
///
/// Returns `AuthzError::NotMember` if no membership exists
pub async fn require_membership(
    pool: &PgPool,
    organization_id: Uuid,
    user_id: Uuid,
) -> Result<Membership, AuthzError> {
    Membership::find(pool, organization_id, user_id)
        .await?
        .ok_or(AuthzError::NotMember(organization_id))
}

/// Requires a permission, resolving membership and role along the way
///
/// Returns the membership so callers can reuse it (e.g. for audit actor
/// context) without a second lookup.
///
/// # Errors
///
/// - `AuthzError::NotMember` if the user doesn't belong to the organization
/// - `AuthzError::RoleNotFound` if the membership's role row is missing
/// - `AuthzError::PermissionDenied` if the role doesn't grant the key
pub async fn require_permission(
    pool: &PgPool,
    organization_id: Uuid,
    user_id: Uuid,
    permission: &str,
) -> Result<Membership, AuthzError> {
    let membership = require_membership(pool, organization_id, user_id).await?;

    let role = Role::find_by_id(pool, membership.role_id)
        .await?
        .ok_or(AuthzError::RoleNotFound(membership.role_id))?;

    if !can(&role, permission) {
        return Err(AuthzError::PermissionDenied(permission.to_string()));
    }

    Ok(membership)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sqlx::types::Json;

    fn role_with(permissions: Vec<&str>) -> Role {
        Role {
            id: Uuid::new_v4(),
            organization_id: Some(Uuid::new_v4()),
            name: "test".to_string(),
            permissions: Json(permissions.into_iter().map(String::from).collect()),
            priority: 50,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_can_exact_match() {
        let role = role_with(vec![keys::INVOICE_CREATE, keys::CLIENT_READ]);

        assert!(can(&role, keys::INVOICE_CREATE));
        assert!(can(&role, keys::CLIENT_READ));
        assert!(!can(&role, keys::INVOICE_READ));
    }

    #[test]
    fn test_can_no_wildcard_or_prefix() {
        let role = role_with(vec!["invoice:*", "client"]);

        // Wildcards and prefixes are ordinary (unknown) strings
        assert!(!can(&role, keys::INVOICE_CREATE));
        assert!(!can(&role, keys::CLIENT_READ));
    }

    #[test]
    fn test_can_unknown_key_denies() {
        let role = role_with(vec![keys::INVOICE_CREATE]);

        assert!(!can(&role, "report:export"));
        assert!(!can(&role, ""));
    }

    #[test]
    fn test_can_empty_set_denies_everything() {
        let role = role_with(vec![]);

        for key in keys::ALL {
            assert!(!can(&role, key), "empty role should deny {}", key);
        }
    }

    #[test]
    fn test_all_keys_are_distinct() {
        let mut seen = std::collections::HashSet::new();
        for key in keys::ALL {
            assert!(seen.insert(key), "duplicate permission key: {}", key);
        }
    }
}
