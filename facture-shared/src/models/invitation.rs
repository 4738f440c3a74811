/// Invitation model and lifecycle
///
/// An invitation is a pending grant of a future membership, keyed by a
/// single-use token. Lifecycle: `pending -> accepted | expired | revoked`
/// (all terminal except pending). There is no background sweeper: the
/// `pending -> expired` transition is detected and persisted lazily whenever
/// an invitation is read past its expiry.
///
/// Accepting an invitation is one transaction: validate the token maps to a
/// pending, non-expired invitation; create the membership; mark the
/// invitation accepted; write the audit entry. Either all of it commits or
/// none of it does; a membership without an accepted invitation (or the
/// reverse) can never be observed.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE invitations (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     organization_id UUID NOT NULL REFERENCES organizations(id) ON DELETE CASCADE,
///     email VARCHAR(255) NOT NULL,
///     role_id UUID NOT NULL REFERENCES roles(id),
///     token_hash VARCHAR(64) NOT NULL UNIQUE,
///     status VARCHAR(20) NOT NULL DEFAULT 'pending',
///     expires_at TIMESTAMPTZ NOT NULL,
///     invited_by UUID NOT NULL REFERENCES users(id),
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::auth::token;
use crate::models::audit::{AuditEntry, NewAuditEntry};
use crate::models::membership::{CreateMembership, Membership};

/// Default invitation validity period
pub const INVITATION_TTL_DAYS: i64 = 7;

/// Invitation status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvitationStatus {
    /// Awaiting acceptance
    Pending,

    /// Accepted; membership was created
    Accepted,

    /// Passed its expiry before acceptance
    Expired,

    /// Withdrawn by an organization admin
    Revoked,
}

impl InvitationStatus {
    /// Converts status to string for database storage
    pub fn as_str(&self) -> &'static str {
        match self {
            InvitationStatus::Pending => "pending",
            InvitationStatus::Accepted => "accepted",
            InvitationStatus::Expired => "expired",
            InvitationStatus::Revoked => "revoked",
        }
    }

    /// Parses status from its database representation
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(InvitationStatus::Pending),
            "accepted" => Some(InvitationStatus::Accepted),
            "expired" => Some(InvitationStatus::Expired),
            "revoked" => Some(InvitationStatus::Revoked),
            _ => None,
        }
    }
}

/// Error type for invitation operations
#[derive(Debug, thiserror::Error)]
pub enum InvitationError {
    /// Token doesn't map to any invitation
    #[error("Invitation not found")]
    NotFound,

    /// Invitation passed its expiry
    #[error("Invitation has expired")]
    Expired,

    /// Invitation was revoked
    #[error("Invitation has been revoked")]
    Revoked,

    /// Invitation was already accepted
    #[error("Invitation has already been accepted")]
    AlreadyAccepted,

    /// Accepting user is already a member of the organization
    #[error("Already a member of this organization")]
    AlreadyMember,

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Invitation model
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Invitation {
    /// Unique invitation ID (UUID v4)
    pub id: Uuid,

    /// Organization the invitee would join
    pub organization_id: Uuid,

    /// Invitee email address
    pub email: String,

    /// Role the resulting membership will hold
    pub role_id: Uuid,

    /// SHA-256 hash of the single-use token; the plaintext is returned once
    /// at creation and never stored
    #[serde(skip_serializing)]
    pub token_hash: String,

    /// Current status (stored as text)
    pub status: String,

    /// When the invitation expires
    pub expires_at: DateTime<Utc>,

    /// User who issued the invitation
    pub invited_by: Uuid,

    /// When the invitation was created
    pub created_at: DateTime<Utc>,
}

impl Invitation {
    /// Gets the parsed status enum
    pub fn get_status(&self) -> Option<InvitationStatus> {
        InvitationStatus::parse(&self.status)
    }

    /// Computes the status as of `now`, applying lazy expiry
    ///
    /// A pending invitation past its expiry is effectively expired even if
    /// the row hasn't been updated yet. Terminal states are unaffected by
    /// the clock.
    pub fn effective_status(&self, now: DateTime<Utc>) -> Option<InvitationStatus> {
        match self.get_status()? {
            InvitationStatus::Pending if now > self.expires_at => Some(InvitationStatus::Expired),
            other => Some(other),
        }
    }
}

/// Input for creating an invitation
#[derive(Debug, Clone)]
pub struct CreateInvitation {
    /// Organization to invite into
    pub organization_id: Uuid,

    /// Invitee email address
    pub email: String,

    /// Role the membership will hold on acceptance
    pub role_id: Uuid,

    /// User issuing the invitation
    pub invited_by: Uuid,
}

/// Result of a successful invitation acceptance
#[derive(Debug, Clone)]
pub struct AcceptedInvitation {
    /// The invitation, now in `accepted` status
    pub invitation: Invitation,

    /// The membership created by the acceptance
    pub membership: Membership,
}

impl Invitation {
    /// Creates an invitation and returns it with the plaintext token
    ///
    /// The token is shown exactly once; only its SHA-256 hash is stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails
    pub async fn create<'e>(
        db: impl PgExecutor<'e>,
        data: CreateInvitation,
    ) -> Result<(Self, String), sqlx::Error> {
        let (plaintext, token_hash) = token::generate_invitation_token();
        let expires_at = Utc::now() + Duration::days(INVITATION_TTL_DAYS);

        let invitation = sqlx::query_as::<_, Invitation>(
            r#"
            INSERT INTO invitations (organization_id, email, role_id, token_hash, expires_at, invited_by)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, organization_id, email, role_id, token_hash, status, expires_at,
                      invited_by, created_at
            "#,
        )
        .bind(data.organization_id)
        .bind(data.email)
        .bind(data.role_id)
        .bind(&token_hash)
        .bind(expires_at)
        .bind(data.invited_by)
        .fetch_one(db)
        .await?;

        Ok((invitation, plaintext))
    }

    /// Lists an organization's invitations, persisting lazy expiry first
    ///
    /// Any pending invitation past its expiry is flipped to `expired` before
    /// the listing is returned, so callers never see a stale `pending`.
    pub async fn list_by_organization(
        pool: &PgPool,
        organization_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE invitations
            SET status = 'expired'
            WHERE organization_id = $1 AND status = 'pending' AND expires_at < NOW()
            "#,
        )
        .bind(organization_id)
        .execute(pool)
        .await?;

        let invitations = sqlx::query_as::<_, Invitation>(
            r#"
            SELECT id, organization_id, email, role_id, token_hash, status, expires_at,
                   invited_by, created_at
            FROM invitations
            WHERE organization_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(organization_id)
        .fetch_all(pool)
        .await?;

        Ok(invitations)
    }

    /// Revokes a pending invitation
    ///
    /// Only pending invitations can be revoked; terminal states are left
    /// untouched. Returns the revoked invitation, or None if no pending
    /// invitation matched.
    pub async fn revoke<'e>(
        db: impl PgExecutor<'e>,
        organization_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let invitation = sqlx::query_as::<_, Invitation>(
            r#"
            UPDATE invitations
            SET status = 'revoked'
            WHERE id = $1 AND organization_id = $2 AND status = 'pending'
            RETURNING id, organization_id, email, role_id, token_hash, status, expires_at,
                      invited_by, created_at
            "#,
        )
        .bind(id)
        .bind(organization_id)
        .fetch_optional(db)
        .await?;

        Ok(invitation)
    }

    /// Accepts an invitation by token, atomically
    ///
    /// One transaction covers the whole transition:
    /// 1. Lock the invitation row by token hash (`FOR UPDATE`)
    /// 2. Reject non-pending or expired invitations (persisting lazy expiry)
    /// 3. Create the membership
    /// 4. Mark the invitation accepted
    /// 5. Write the audit entry
    ///
    /// If any step fails the transaction rolls back: a created membership
    /// with a still-pending invitation can never be observed.
    ///
    /// # Errors
    ///
    /// - [`InvitationError::NotFound`] if the token matches nothing
    /// - [`InvitationError::Expired`] if the invitation passed its expiry
    ///   (the expiry is persisted before returning)
    /// - [`InvitationError::Revoked`] / [`InvitationError::AlreadyAccepted`]
    ///   for terminal states
    /// - [`InvitationError::AlreadyMember`] if the user already belongs to
    ///   the organization
    pub async fn accept(
        pool: &PgPool,
        plaintext_token: &str,
        user_id: Uuid,
    ) -> Result<AcceptedInvitation, InvitationError> {
        let token_hash = token::hash_invitation_token(plaintext_token);

        let mut tx = pool.begin().await?;

        let invitation = sqlx::query_as::<_, Invitation>(
            r#"
            SELECT id, organization_id, email, role_id, token_hash, status, expires_at,
                   invited_by, created_at
            FROM invitations
            WHERE token_hash = $1
            FOR UPDATE
            "#,
        )
        .bind(&token_hash)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(InvitationError::NotFound)?;

        match invitation.get_status() {
            Some(InvitationStatus::Pending) => {}
            Some(InvitationStatus::Accepted) => return Err(InvitationError::AlreadyAccepted),
            Some(InvitationStatus::Revoked) => return Err(InvitationError::Revoked),
            Some(InvitationStatus::Expired) => return Err(InvitationError::Expired),
            // Unknown status in the column reads as terminal
            None => return Err(InvitationError::NotFound),
        }

        if Utc::now() > invitation.expires_at {
            // Lazy expiry: persist the transition before rejecting
            sqlx::query("UPDATE invitations SET status = 'expired' WHERE id = $1")
                .bind(invitation.id)
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;
            return Err(InvitationError::Expired);
        }

        let existing = sqlx::query_as::<_, Membership>(
            r#"
            SELECT organization_id, user_id, role_id, created_at
            FROM memberships
            WHERE organization_id = $1 AND user_id = $2
            "#,
        )
        .bind(invitation.organization_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;

        if existing.is_some() {
            return Err(InvitationError::AlreadyMember);
        }

        let membership = Membership::create(
            &mut *tx,
            CreateMembership {
                organization_id: invitation.organization_id,
                user_id,
                role_id: invitation.role_id,
            },
        )
        .await?;

        let accepted = sqlx::query_as::<_, Invitation>(
            r#"
            UPDATE invitations
            SET status = 'accepted'
            WHERE id = $1
            RETURNING id, organization_id, email, role_id, token_hash, status, expires_at,
                      invited_by, created_at
            "#,
        )
        .bind(invitation.id)
        .fetch_one(&mut *tx)
        .await?;

        AuditEntry::record(
            &mut tx,
            NewAuditEntry {
                organization_id: invitation.organization_id,
                actor_user_id: user_id,
                action: "member.joined".to_string(),
                resource_type: "membership".to_string(),
                resource_id: Some(user_id.to_string()),
                metadata: serde_json::json!({ "invitation_id": invitation.id }),
            },
        )
        .await?;

        tx.commit().await?;

        Ok(AcceptedInvitation {
            invitation: accepted,
            membership,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invitation_with(status: &str, expires_at: DateTime<Utc>) -> Invitation {
        Invitation {
            id: Uuid::new_v4(),
            organization_id: Uuid::new_v4(),
            email: "invitee@example.com".to_string(),
            role_id: Uuid::new_v4(),
            token_hash: "deadbeef".to_string(),
            status: status.to_string(),
            expires_at,
            invited_by: Uuid::new_v4(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_status_parse_roundtrip() {
        for status in [
            InvitationStatus::Pending,
            InvitationStatus::Accepted,
            InvitationStatus::Expired,
            InvitationStatus::Revoked,
        ] {
            assert_eq!(InvitationStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(InvitationStatus::parse("cancelled"), None);
    }

    #[test]
    fn test_effective_status_pending_not_expired() {
        let now = Utc::now();
        let inv = invitation_with("pending", now + Duration::seconds(1));
        assert_eq!(inv.effective_status(now), Some(InvitationStatus::Pending));
    }

    #[test]
    fn test_effective_status_pending_past_expiry() {
        let now = Utc::now();
        let inv = invitation_with("pending", now - Duration::seconds(1));
        assert_eq!(inv.effective_status(now), Some(InvitationStatus::Expired));
    }

    #[test]
    fn test_effective_status_exactly_at_expiry_is_pending() {
        // Expiry is strict: the invitation is usable until now > expires_at
        let now = Utc::now();
        let inv = invitation_with("pending", now);
        assert_eq!(inv.effective_status(now), Some(InvitationStatus::Pending));
    }

    #[test]
    fn test_effective_status_terminal_states_ignore_clock() {
        let now = Utc::now();
        let past = now - Duration::days(30);

        for status in ["accepted", "revoked", "expired"] {
            let inv = invitation_with(status, past);
            assert_eq!(
                inv.effective_status(now),
                InvitationStatus::parse(status),
                "terminal status {} should not change",
                status
            );
        }
    }

    #[test]
    fn test_token_hash_not_serialized() {
        let inv = invitation_with("pending", Utc::now());
        let json = serde_json::to_string(&inv).unwrap();
        assert!(!json.contains("token_hash"));
        assert!(!json.contains("deadbeef"));
    }
}
