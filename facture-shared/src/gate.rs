/// Request gate composing membership, permission, and plan checks
///
/// Every tenant-scoped request passes through the gate before its handler
/// touches data. Checks run in a fixed order, and the first failure decides
/// the outcome:
///
/// 1. **Membership**: the user must belong to the organization. Failure
///    reads as "not found" so non-members can't distinguish "organization
///    exists" from "organization doesn't".
/// 2. **Permission**: the membership's role must grant the exact permission
///    key. Checked before plan limits so a denied caller never learns quota
///    state.
/// 3. **Plan limit**: for creating actions only, current usage must be
///    strictly under the plan's limit, and trials must not have expired.
///
/// Membership and role are read fresh from the database on every call;
/// revoking a membership or editing a role takes effect on the next
/// request without waiting for token expiry. Any store failure during a
/// check denies the request rather than guessing.
///
/// # Example
///
/// ```no_run
/// use facture_shared::gate::{Gate, GateRequest};
/// use facture_shared::authz::keys;
/// use facture_shared::plan::PlanAction;
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, org_id: Uuid, user_id: Uuid) -> Result<(), Box<dyn std::error::Error>> {
/// let gate = Gate::new(pool);
///
/// let pass = gate
///     .authorize(GateRequest {
///         organization_id: org_id,
///         user_id,
///         permission: keys::INVOICE_CREATE,
///         plan_action: Some(PlanAction::CreateInvoice),
///     })
///     .await?;
///
/// // pass.membership identifies the caller for audit recording
/// # Ok(())
/// # }
/// ```

use sqlx::PgPool;
use uuid::Uuid;

use crate::authz::{self, AuthzError};
use crate::models::membership::Membership;
use crate::models::role::Role;
use crate::plan::{PlanAction, PlanEnforcer, PlanError};

/// Error type for gate decisions
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    /// User is not a member of the organization; surfaces as not-found
    #[error("Organization not found")]
    NotMember(Uuid),

    /// Role doesn't grant the required permission
    #[error("Missing required permission: {0}")]
    PermissionDenied(String),

    /// Plan limit reached or trial expired
    #[error(transparent)]
    PlanDenied(PlanError),

    /// Store failure during a check; the request is denied
    #[error("Authorization check failed")]
    Store(#[source] sqlx::Error),
}

impl From<AuthzError> for GateError {
    fn from(err: AuthzError) -> Self {
        match err {
            AuthzError::NotMember(org) => GateError::NotMember(org),
            // A dangling role reference denies like a missing membership
            AuthzError::RoleNotFound(_) => GateError::PermissionDenied("unknown role".to_string()),
            AuthzError::PermissionDenied(key) => GateError::PermissionDenied(key),
            AuthzError::DatabaseError(e) => GateError::Store(e),
        }
    }
}

impl From<PlanError> for GateError {
    fn from(err: PlanError) -> Self {
        match err {
            PlanError::DatabaseError(e) => GateError::Store(e),
            other => GateError::PlanDenied(other),
        }
    }
}

/// A single authorization request
#[derive(Debug, Clone)]
pub struct GateRequest {
    /// Organization the request targets
    pub organization_id: Uuid,

    /// Authenticated user making the request
    pub user_id: Uuid,

    /// Permission key the handler requires
    pub permission: &'static str,

    /// Plan-limited action, for creating endpoints; None skips the plan
    /// check entirely
    pub plan_action: Option<PlanAction>,
}

/// Evidence that a request cleared every gate check
#[derive(Debug, Clone)]
pub struct GatePass {
    /// The caller's membership, freshly resolved
    pub membership: Membership,

    /// The role backing the membership
    pub role: Role,
}

/// The request gate
pub struct Gate {
    db: PgPool,
}

impl Gate {
    /// Creates a gate over a connection pool
    pub fn new(db: PgPool) -> Self {
        Gate { db }
    }

    /// Authorizes a request, running the checks in order
    ///
    /// # Errors
    ///
    /// - [`GateError::NotMember`] if the user doesn't belong to the
    ///   organization
    /// - [`GateError::PermissionDenied`] if the role doesn't grant the key
    /// - [`GateError::PlanDenied`] if the plan limit is reached or the
    ///   trial has expired
    /// - [`GateError::Store`] on any database failure (fail-closed)
    pub async fn authorize(&self, request: GateRequest) -> Result<GatePass, GateError> {
        let membership = authz::require_membership(
            &self.db,
            request.organization_id,
            request.user_id,
        )
        .await?;

        let role = Role::find_by_id(&self.db, membership.role_id)
            .await
            .map_err(GateError::Store)?
            .ok_or_else(|| GateError::PermissionDenied("unknown role".to_string()))?;

        if !authz::can(&role, request.permission) {
            return Err(GateError::PermissionDenied(request.permission.to_string()));
        }

        if let Some(action) = request.plan_action {
            let enforcer = PlanEnforcer::new(self.db.clone());
            enforcer.enforce(request.organization_id, action).await?;
        }

        Ok(GatePass { membership, role })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_member_reads_as_not_found() {
        let err = GateError::NotMember(Uuid::new_v4());
        assert_eq!(err.to_string(), "Organization not found");
    }

    #[test]
    fn test_authz_error_mapping() {
        let org = Uuid::new_v4();
        assert!(matches!(
            GateError::from(AuthzError::NotMember(org)),
            GateError::NotMember(id) if id == org
        ));

        assert!(matches!(
            GateError::from(AuthzError::PermissionDenied("invoice:create".to_string())),
            GateError::PermissionDenied(key) if key == "invoice:create"
        ));

        assert!(matches!(
            GateError::from(AuthzError::RoleNotFound(Uuid::new_v4())),
            GateError::PermissionDenied(_)
        ));
    }

    #[test]
    fn test_plan_error_mapping() {
        assert!(matches!(
            GateError::from(PlanError::TrialExpired),
            GateError::PlanDenied(PlanError::TrialExpired)
        ));

        assert!(matches!(
            GateError::from(PlanError::DatabaseError(sqlx::Error::PoolClosed)),
            GateError::Store(_)
        ));
    }
}
