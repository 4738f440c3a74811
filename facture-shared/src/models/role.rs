/// Role model and database operations
///
/// A role is a named, flat set of permission keys plus a display priority.
/// Permission keys are colon-namespaced strings (`resource:action`); the
/// evaluator does exact set-membership checks only: no wildcard or prefix
/// matching, and priority is never consulted for authorization (it orders
/// roles in the UI).
///
/// # Schema
///
/// ```sql
/// CREATE TABLE roles (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     organization_id UUID REFERENCES organizations(id) ON DELETE CASCADE,
///     name VARCHAR(100) NOT NULL,
///     permissions JSONB NOT NULL DEFAULT '[]',
///     priority INTEGER NOT NULL DEFAULT 0,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     UNIQUE (organization_id, name)
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::authz::keys;

/// Role model: a named bundle of permission keys
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Role {
    /// Unique role ID (UUID v4)
    pub id: Uuid,

    /// Owning organization (None for global templates)
    pub organization_id: Option<Uuid>,

    /// Role name (unique per organization)
    pub name: String,

    /// Flat set of permission keys (JSONB array)
    pub permissions: Json<Vec<String>>,

    /// Display ordering only; never used in authorization decisions
    pub priority: i32,

    /// When the role was created
    pub created_at: DateTime<Utc>,
}

impl Role {
    /// Checks whether this role's permission set contains `key`
    ///
    /// Exact string membership only.
    pub fn allows(&self, key: &str) -> bool {
        self.permissions.0.iter().any(|p| p == key)
    }
}

/// Input for creating a role
#[derive(Debug, Clone)]
pub struct CreateRole {
    /// Owning organization
    pub organization_id: Uuid,

    /// Role name
    pub name: String,

    /// Permission keys
    pub permissions: Vec<String>,

    /// Display priority
    pub priority: i32,
}

/// The four default roles seeded for every new organization
#[derive(Debug, Clone)]
pub struct DefaultRoles {
    pub owner: Role,
    pub admin: Role,
    pub member: Role,
    pub viewer: Role,
}

impl Role {
    /// Creates a role
    ///
    /// # Errors
    ///
    /// Returns an error if the name already exists in the organization or
    /// the insert fails
    pub async fn create<'e>(db: impl PgExecutor<'e>, data: CreateRole) -> Result<Self, sqlx::Error> {
        let role = sqlx::query_as::<_, Role>(
            r#"
            INSERT INTO roles (organization_id, name, permissions, priority)
            VALUES ($1, $2, $3, $4)
            RETURNING id, organization_id, name, permissions, priority, created_at
            "#,
        )
        .bind(data.organization_id)
        .bind(data.name)
        .bind(Json(data.permissions))
        .bind(data.priority)
        .fetch_one(db)
        .await?;

        Ok(role)
    }

    /// Finds a role by ID
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let role = sqlx::query_as::<_, Role>(
            r#"
            SELECT id, organization_id, name, permissions, priority, created_at
            FROM roles
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(role)
    }

    /// Finds a role by name within an organization
    pub async fn find_by_name(
        pool: &PgPool,
        organization_id: Uuid,
        name: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        let role = sqlx::query_as::<_, Role>(
            r#"
            SELECT id, organization_id, name, permissions, priority, created_at
            FROM roles
            WHERE organization_id = $1 AND name = $2
            "#,
        )
        .bind(organization_id)
        .bind(name)
        .fetch_optional(pool)
        .await?;

        Ok(role)
    }

    /// Lists an organization's roles, highest priority first
    pub async fn list_by_organization(
        pool: &PgPool,
        organization_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let roles = sqlx::query_as::<_, Role>(
            r#"
            SELECT id, organization_id, name, permissions, priority, created_at
            FROM roles
            WHERE organization_id = $1
            ORDER BY priority DESC, name ASC
            "#,
        )
        .bind(organization_id)
        .fetch_all(pool)
        .await?;

        Ok(roles)
    }

    /// Seeds the default roles for a new organization
    ///
    /// Called once at registration, inside the same transaction that
    /// creates the organization.
    pub async fn create_defaults(
        tx: &mut sqlx::PgConnection,
        organization_id: Uuid,
    ) -> Result<DefaultRoles, sqlx::Error> {
        let owner = Role::create(
            &mut *tx,
            CreateRole {
                organization_id,
                name: "owner".to_string(),
                permissions: owner_permissions(),
                priority: 100,
            },
        )
        .await?;

        let admin = Role::create(
            &mut *tx,
            CreateRole {
                organization_id,
                name: "admin".to_string(),
                permissions: admin_permissions(),
                priority: 75,
            },
        )
        .await?;

        let member = Role::create(
            &mut *tx,
            CreateRole {
                organization_id,
                name: "member".to_string(),
                permissions: member_permissions(),
                priority: 50,
            },
        )
        .await?;

        let viewer = Role::create(
            &mut *tx,
            CreateRole {
                organization_id,
                name: "viewer".to_string(),
                permissions: viewer_permissions(),
                priority: 25,
            },
        )
        .await?;

        Ok(DefaultRoles {
            owner,
            admin,
            member,
            viewer,
        })
    }
}

/// Permission set for the default `owner` role: every key
pub fn owner_permissions() -> Vec<String> {
    keys::ALL.iter().map(|k| k.to_string()).collect()
}

/// Permission set for the default `admin` role
///
/// Everything except billing management and organization deletion.
pub fn admin_permissions() -> Vec<String> {
    keys::ALL
        .iter()
        .filter(|k| **k != keys::BILLING_MANAGE && **k != keys::ORGANIZATION_DELETE)
        .map(|k| k.to_string())
        .collect()
}

/// Permission set for the default `member` role
pub fn member_permissions() -> Vec<String> {
    vec![
        keys::ORGANIZATION_READ.to_string(),
        keys::MEMBER_READ.to_string(),
        keys::CLIENT_CREATE.to_string(),
        keys::CLIENT_READ.to_string(),
        keys::CLIENT_UPDATE.to_string(),
        keys::CLIENT_DELETE.to_string(),
        keys::INVOICE_CREATE.to_string(),
        keys::INVOICE_READ.to_string(),
    ]
}

/// Permission set for the default `viewer` role: read-only keys
pub fn viewer_permissions() -> Vec<String> {
    vec![
        keys::ORGANIZATION_READ.to_string(),
        keys::MEMBER_READ.to_string(),
        keys::CLIENT_READ.to_string(),
        keys::INVOICE_READ.to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn role_with(permissions: Vec<&str>) -> Role {
        Role {
            id: Uuid::new_v4(),
            organization_id: Some(Uuid::new_v4()),
            name: "test".to_string(),
            permissions: Json(permissions.into_iter().map(String::from).collect()),
            priority: 0,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_allows_exact_match_only() {
        let role = role_with(vec!["client:create", "client:read"]);

        assert!(role.allows("client:create"));
        assert!(role.allows("client:read"));

        // No prefix, wildcard, or hierarchy matching
        assert!(!role.allows("client"));
        assert!(!role.allows("client:"));
        assert!(!role.allows("client:*"));
        assert!(!role.allows("client:creat"));
        assert!(!role.allows("client:created"));
        assert!(!role.allows("CLIENT:CREATE"));
    }

    #[test]
    fn test_allows_empty_set() {
        let role = role_with(vec![]);
        for key in keys::ALL {
            assert!(!role.allows(key));
        }
    }

    #[test]
    fn test_owner_has_every_key() {
        let perms = owner_permissions();
        for key in keys::ALL {
            assert!(perms.iter().any(|p| p == key), "owner missing {}", key);
        }
    }

    #[test]
    fn test_admin_excludes_billing_and_delete() {
        let perms = admin_permissions();
        assert!(!perms.iter().any(|p| p == keys::BILLING_MANAGE));
        assert!(!perms.iter().any(|p| p == keys::ORGANIZATION_DELETE));
        assert!(perms.iter().any(|p| p == keys::MEMBER_DELETE));
        assert!(perms.iter().any(|p| p == keys::AUDIT_READ));
    }

    #[test]
    fn test_member_cannot_manage_members() {
        let perms = member_permissions();
        assert!(!perms.iter().any(|p| p == keys::MEMBER_DELETE));
        assert!(!perms.iter().any(|p| p == keys::MEMBER_UPDATE));
        assert!(!perms.iter().any(|p| p == keys::MEMBER_INVITE));
        assert!(perms.iter().any(|p| p == keys::CLIENT_CREATE));
        assert!(perms.iter().any(|p| p == keys::INVOICE_CREATE));
    }

    #[test]
    fn test_viewer_is_read_only() {
        let perms = viewer_permissions();
        assert!(perms.iter().all(|p| p.ends_with(":read")));
        assert!(perms.iter().any(|p| p == keys::CLIENT_READ));
    }
}
