/// Plan-limit enforcement for organization billing plans
///
/// Quantity limits are enforced per organization at creation time:
/// - Clients: total per organization
/// - Invoices: created in the current calendar month (UTC)
/// - Members: total memberships per organization
///
/// # Limits by Plan
///
/// | Plan       | Clients   | Invoices/month | Members   |
/// |------------|-----------|----------------|-----------|
/// | Trial      | 5         | 10             | 2         |
/// | Starter    | 25        | 100            | 5         |
/// | Growth     | 250       | 1,000          | 25        |
/// | Enterprise | unlimited | unlimited      | unlimited |
///
/// Limits are strict: creation is allowed while `current < limit`, so the
/// request that would land exactly on the limit is the last one through.
/// Checks are read-then-write and not serialized against concurrent
/// requests; a small overshoot under contention is accepted.
///
/// An expired trial denies every limited action before any count runs.
///
/// # Example
///
/// ```no_run
/// use facture_shared::plan::{PlanEnforcer, PlanAction};
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, org_id: Uuid) -> Result<(), Box<dyn std::error::Error>> {
/// let enforcer = PlanEnforcer::new(pool);
/// enforcer.enforce(org_id, PlanAction::CreateInvoice).await?;
/// // create the invoice...
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::client::Client;
use crate::models::invoice::Invoice;
use crate::models::membership::Membership;
use crate::models::organization::{Organization, OrganizationPlan};

/// Plan enforcement error
#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    /// Plan limit reached for the requested action
    #[error("{action} limit reached for the {plan} plan ({current}/{limit})")]
    LimitExceeded {
        action: PlanAction,
        plan: OrganizationPlan,
        limit: u32,
        current: u32,
    },

    /// Trial period has ended
    #[error("Trial period has ended; upgrade to continue")]
    TrialExpired,

    /// Organization not found
    #[error("Organization not found: {0}")]
    OrganizationNotFound(Uuid),

    /// Database error
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

/// Action subject to plan limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanAction {
    /// Creating a client (counted against total clients)
    CreateClient,

    /// Creating an invoice (counted against the current calendar month)
    CreateInvoice,

    /// Adding a member, whether by invitation acceptance or directly
    AddMember,
}

impl PlanAction {
    /// Human-readable name
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanAction::CreateClient => "Client",
            PlanAction::CreateInvoice => "Monthly invoice",
            PlanAction::AddMember => "Member",
        }
    }
}

impl std::fmt::Display for PlanAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Quantity limits for a plan
///
/// `None` means unlimited.
#[derive(Debug, Clone, Copy)]
pub struct PlanLimits {
    /// Maximum clients per organization
    pub clients: Option<u32>,

    /// Maximum invoices per calendar month
    pub invoices_per_month: Option<u32>,

    /// Maximum memberships per organization
    pub members: Option<u32>,
}

impl PlanLimits {
    /// Gets quantity limits for a plan
    pub fn for_plan(plan: OrganizationPlan) -> Self {
        match plan {
            OrganizationPlan::Trial => PlanLimits {
                clients: Some(5),
                invoices_per_month: Some(10),
                members: Some(2),
            },
            OrganizationPlan::Starter => PlanLimits {
                clients: Some(25),
                invoices_per_month: Some(100),
                members: Some(5),
            },
            OrganizationPlan::Growth => PlanLimits {
                clients: Some(250),
                invoices_per_month: Some(1_000),
                members: Some(25),
            },
            OrganizationPlan::Enterprise => PlanLimits {
                clients: None,
                invoices_per_month: None,
                members: None,
            },
        }
    }

    /// Gets the limit for a specific action
    pub fn get(&self, action: PlanAction) -> Option<u32> {
        match action {
            PlanAction::CreateClient => self.clients,
            PlanAction::CreateInvoice => self.invoices_per_month,
            PlanAction::AddMember => self.members,
        }
    }

    /// Evaluates a count against the limit for an action
    ///
    /// Strict comparison: allowed while `current < limit`. Unlimited plans
    /// always allow.
    pub fn evaluate(&self, action: PlanAction, current: u32) -> LimitCheck {
        match self.get(action) {
            None => LimitCheck::unlimited(current),
            Some(limit) if current < limit => LimitCheck::allowed(current, limit),
            Some(limit) => LimitCheck::exceeded(current, limit),
        }
    }
}

/// Result of a plan-limit evaluation
#[derive(Debug, Clone)]
pub struct LimitCheck {
    /// Whether the action is within the limit
    pub allowed: bool,

    /// Current usage
    pub current: u32,

    /// Maximum allowed, if the plan has a limit
    pub limit: Option<u32>,
}

impl LimitCheck {
    /// Creates a result for an unlimited plan
    pub fn unlimited(current: u32) -> Self {
        LimitCheck {
            allowed: true,
            current,
            limit: None,
        }
    }

    /// Creates a result indicating headroom remains
    pub fn allowed(current: u32, limit: u32) -> Self {
        LimitCheck {
            allowed: true,
            current,
            limit: Some(limit),
        }
    }

    /// Creates a result indicating the limit is reached
    pub fn exceeded(current: u32, limit: u32) -> Self {
        LimitCheck {
            allowed: false,
            current,
            limit: Some(limit),
        }
    }
}

/// Decides whether an expired trial blocks an action
///
/// Only trial organizations expire. A trial with no `trial_ends_at` never
/// expires. The boundary instant itself is still inside the trial; only
/// `now > trial_ends_at` blocks.
pub fn trial_expired(
    plan: OrganizationPlan,
    trial_ends_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> bool {
    plan == OrganizationPlan::Trial && trial_ends_at.is_some_and(|ends_at| now > ends_at)
}

/// Computes the UTC calendar-month window containing `now`
///
/// Returns `[start, end)`: the first instant of the month and the first
/// instant of the next month. Invoice quotas reset at this boundary
/// regardless of when the previous month's invoices were created.
pub fn month_window(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let start_date = NaiveDate::from_ymd_opt(now.year(), now.month(), 1)
        .unwrap_or_else(|| now.date_naive());

    let (next_year, next_month) = if now.month() == 12 {
        (now.year() + 1, 1)
    } else {
        (now.year(), now.month() + 1)
    };
    let end_date =
        NaiveDate::from_ymd_opt(next_year, next_month, 1).unwrap_or_else(|| now.date_naive());

    let start = Utc.from_utc_datetime(&start_date.and_hms_opt(0, 0, 0).unwrap_or_default());
    let end = Utc.from_utc_datetime(&end_date.and_hms_opt(0, 0, 0).unwrap_or_default());

    (start, end)
}

/// Plan enforcement service
///
/// Reads the organization's plan and current usage, then evaluates the
/// requested action against the plan's limits.
pub struct PlanEnforcer {
    db: PgPool,
}

impl PlanEnforcer {
    /// Creates a new plan enforcer
    pub fn new(db: PgPool) -> Self {
        PlanEnforcer { db }
    }

    /// Checks whether an organization may perform an action
    ///
    /// An expired trial is rejected before any usage counting. An
    /// organization row with an unrecognized plan value is treated as
    /// trial, the most restrictive plan.
    ///
    /// # Errors
    ///
    /// - `PlanError::OrganizationNotFound` if the organization doesn't exist
    /// - `PlanError::TrialExpired` if the trial period has ended
    pub async fn check(
        &self,
        organization_id: Uuid,
        action: PlanAction,
    ) -> Result<LimitCheck, PlanError> {
        let organization = Organization::find_by_id(&self.db, organization_id)
            .await?
            .ok_or(PlanError::OrganizationNotFound(organization_id))?;

        let plan = organization.get_plan().unwrap_or(OrganizationPlan::Trial);

        if trial_expired(plan, organization.trial_ends_at, Utc::now()) {
            return Err(PlanError::TrialExpired);
        }

        let limits = PlanLimits::for_plan(plan);

        // Unlimited plans skip the count entirely
        if limits.get(action).is_none() {
            return Ok(LimitCheck::unlimited(0));
        }

        let current = match action {
            PlanAction::CreateClient => {
                Client::count_by_organization(&self.db, organization_id).await?
            }
            PlanAction::CreateInvoice => {
                Invoice::count_in_month(&self.db, organization_id, Utc::now()).await?
            }
            PlanAction::AddMember => {
                Membership::count_by_organization(&self.db, organization_id).await?
            }
        };

        Ok(limits.evaluate(action, current.max(0) as u32))
    }

    /// Enforces a plan limit, erroring when the action is denied
    ///
    /// # Errors
    ///
    /// Returns `PlanError::LimitExceeded` if the limit is reached, plus
    /// every error `check` can return
    pub async fn enforce(
        &self,
        organization_id: Uuid,
        action: PlanAction,
    ) -> Result<(), PlanError> {
        let result = self.check(organization_id, action).await?;

        if !result.allowed {
            let organization = Organization::find_by_id(&self.db, organization_id)
                .await?
                .ok_or(PlanError::OrganizationNotFound(organization_id))?;
            let plan = organization.get_plan().unwrap_or(OrganizationPlan::Trial);

            return Err(PlanError::LimitExceeded {
                action,
                plan,
                limit: result.limit.unwrap_or(0),
                current: result.current,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_plan_limits_trial() {
        let limits = PlanLimits::for_plan(OrganizationPlan::Trial);
        assert_eq!(limits.clients, Some(5));
        assert_eq!(limits.invoices_per_month, Some(10));
        assert_eq!(limits.members, Some(2));
    }

    #[test]
    fn test_plan_limits_starter() {
        let limits = PlanLimits::for_plan(OrganizationPlan::Starter);
        assert_eq!(limits.clients, Some(25));
        assert_eq!(limits.invoices_per_month, Some(100));
        assert_eq!(limits.members, Some(5));
    }

    #[test]
    fn test_plan_limits_growth() {
        let limits = PlanLimits::for_plan(OrganizationPlan::Growth);
        assert_eq!(limits.clients, Some(250));
        assert_eq!(limits.invoices_per_month, Some(1_000));
        assert_eq!(limits.members, Some(25));
    }

    #[test]
    fn test_plan_limits_enterprise_unlimited() {
        let limits = PlanLimits::for_plan(OrganizationPlan::Enterprise);
        assert_eq!(limits.clients, None);
        assert_eq!(limits.invoices_per_month, None);
        assert_eq!(limits.members, None);

        let check = limits.evaluate(PlanAction::CreateInvoice, u32::MAX);
        assert!(check.allowed);
        assert_eq!(check.limit, None);
    }

    #[test]
    fn test_evaluate_strict_boundary() {
        let limits = PlanLimits::for_plan(OrganizationPlan::Trial);

        // One below the limit: allowed
        let check = limits.evaluate(PlanAction::CreateClient, 4);
        assert!(check.allowed);

        // Exactly at the limit: denied
        let check = limits.evaluate(PlanAction::CreateClient, 5);
        assert!(!check.allowed);
        assert_eq!(check.limit, Some(5));

        // Past the limit (overshoot from a race): still denied
        let check = limits.evaluate(PlanAction::CreateClient, 6);
        assert!(!check.allowed);
    }

    #[test]
    fn test_evaluate_zero_usage() {
        let limits = PlanLimits::for_plan(OrganizationPlan::Trial);

        for action in [
            PlanAction::CreateClient,
            PlanAction::CreateInvoice,
            PlanAction::AddMember,
        ] {
            let check = limits.evaluate(action, 0);
            assert!(check.allowed, "{} should allow at zero usage", action);
        }
    }

    #[test]
    fn test_trial_expired_boundary() {
        use chrono::Duration;

        let now = Utc.with_ymd_and_hms(2026, 6, 15, 12, 0, 0).unwrap();

        // One second past the end: blocked
        assert!(trial_expired(
            OrganizationPlan::Trial,
            Some(now - Duration::seconds(1)),
            now,
        ));

        // One second of trial left: allowed
        assert!(!trial_expired(
            OrganizationPlan::Trial,
            Some(now + Duration::seconds(1)),
            now,
        ));

        // The boundary instant itself is still inside the trial
        assert!(!trial_expired(OrganizationPlan::Trial, Some(now), now));
    }

    #[test]
    fn test_trial_expired_only_applies_to_trial_plans() {
        use chrono::Duration;

        let now = Utc.with_ymd_and_hms(2026, 6, 15, 12, 0, 0).unwrap();
        let long_past = Some(now - Duration::days(90));

        // A stale trial_ends_at left on an upgraded organization is ignored
        for plan in [
            OrganizationPlan::Starter,
            OrganizationPlan::Growth,
            OrganizationPlan::Enterprise,
        ] {
            assert!(!trial_expired(plan, long_past, now), "{plan} should not expire");
        }

        // A trial with no end date never expires
        assert!(!trial_expired(OrganizationPlan::Trial, None, now));
    }

    #[test]
    fn test_month_window_mid_month() {
        let now = Utc.with_ymd_and_hms(2026, 3, 15, 12, 30, 0).unwrap();
        let (start, end) = month_window(now);

        assert_eq!(start, Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2026, 4, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_month_window_first_instant() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        let (start, end) = month_window(now);

        assert_eq!(start, now);
        assert_eq!(end, Utc.with_ymd_and_hms(2026, 4, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_month_window_last_instant() {
        let now = Utc.with_ymd_and_hms(2026, 3, 31, 23, 59, 59).unwrap();
        let (start, end) = month_window(now);

        assert_eq!(start, Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap());
        assert!(now < end);
    }

    #[test]
    fn test_month_window_december_rollover() {
        let now = Utc.with_ymd_and_hms(2025, 12, 20, 8, 0, 0).unwrap();
        let (start, end) = month_window(now);

        assert_eq!(start, Utc.with_ymd_and_hms(2025, 12, 1, 0, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_month_window_february_leap_year() {
        let now = Utc.with_ymd_and_hms(2024, 2, 29, 10, 0, 0).unwrap();
        let (start, end) = month_window(now);

        assert_eq!(start, Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_limit_check_constructors() {
        let check = LimitCheck::allowed(5, 10);
        assert!(check.allowed);
        assert_eq!(check.current, 5);
        assert_eq!(check.limit, Some(10));

        let check = LimitCheck::exceeded(10, 10);
        assert!(!check.allowed);

        let check = LimitCheck::unlimited(1_000_000);
        assert!(check.allowed);
        assert_eq!(check.limit, None);
    }

    #[test]
    fn test_plan_error_display() {
        let err = PlanError::LimitExceeded {
            action: PlanAction::CreateInvoice,
            plan: OrganizationPlan::Trial,
            limit: 10,
            current: 10,
        };
        assert_eq!(
            err.to_string(),
            "Monthly invoice limit reached for the trial plan (10/10)"
        );

        let err = PlanError::TrialExpired;
        assert!(err.to_string().contains("Trial period has ended"));
    }
}
