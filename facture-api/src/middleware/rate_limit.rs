/// Per-organization rate limiting middleware
///
/// Token bucket rate limiting with Redis-backed state so limits hold across
/// multiple API instances. Limits are applied per organization based on its
/// billing plan.
///
/// # Rate Limits by Plan
///
/// - **Trial**: 30 requests/minute
/// - **Starter**: 120 requests/minute
/// - **Growth**: 600 requests/minute
/// - **Enterprise**: 2000 requests/minute
///
/// # Algorithm
///
/// Token bucket: tokens refill at a constant rate, each request consumes
/// one, and a request is rejected with 429 when the bucket is empty. The
/// bucket state lives in Redis under `ratelimit:org:{organization_id}` with
/// a 2-minute TTL, and the refill-and-consume step runs as a single Lua
/// script so concurrent instances can't double-spend tokens.
///
/// # Headers
///
/// Responses include:
/// - `X-RateLimit-Limit`: requests allowed per minute
/// - `X-RateLimit-Remaining`: tokens remaining
/// - `Retry-After`: seconds to wait (429 responses only)

use crate::app::{AppState, AuthContext};
use crate::error::ApiError;
use axum::{
    extract::{Extension, Request, State},
    http::HeaderValue,
    middleware::Next,
    response::Response,
};
use facture_shared::models::organization::{Organization, OrganizationPlan};
use redis::aio::ConnectionManager;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Rate limit configuration for a plan
#[derive(Debug, Clone, Copy)]
pub struct RateLimit {
    /// Maximum requests per minute
    pub requests_per_minute: u32,

    /// Token refill rate (tokens per second)
    pub refill_rate: f64,

    /// Maximum tokens in bucket (burst capacity)
    pub bucket_capacity: u32,
}

impl RateLimit {
    /// Gets rate limit configuration for an organization plan
    pub fn for_plan(plan: OrganizationPlan) -> Self {
        match plan {
            OrganizationPlan::Trial => RateLimit {
                requests_per_minute: 30,
                refill_rate: 0.5,
                bucket_capacity: 30,
            },
            OrganizationPlan::Starter => RateLimit {
                requests_per_minute: 120,
                refill_rate: 2.0,
                bucket_capacity: 120,
            },
            OrganizationPlan::Growth => RateLimit {
                requests_per_minute: 600,
                refill_rate: 10.0,
                bucket_capacity: 600,
            },
            OrganizationPlan::Enterprise => RateLimit {
                requests_per_minute: 2000,
                refill_rate: 33.33,
                bucket_capacity: 2000,
            },
        }
    }
}

/// Result of a rate limit check
#[derive(Debug)]
pub struct RateLimitResult {
    /// Whether the request is allowed
    pub ok: bool,

    /// Tokens remaining
    pub remaining: u32,

    /// Seconds until a token is available (429 responses)
    pub retry_after: u64,
}

/// Rate limiting middleware layer
///
/// Checks the organization's bucket before processing the request. If the
/// bucket is empty, rejects with 429 and a Retry-After header. Redis being
/// unreachable fails open: the request proceeds without consuming a token,
/// since dropping traffic over rate-limit bookkeeping would outrank the
/// limit itself.
pub async fn rate_limit_layer(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let organization = Organization::find_by_id(&state.db, auth.org_id)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, org_id = %auth.org_id, "Failed to query organization");
            ApiError::InternalError("Failed to query organization".to_string())
        })?;

    // Unknown organization: let the gate produce the not-found response
    let Some(organization) = organization else {
        return Ok(next.run(request).await);
    };

    let plan = organization.get_plan().unwrap_or(OrganizationPlan::Trial);
    let rate_limit = RateLimit::for_plan(plan);

    let result = match check_rate_limit(state.redis.clone(), auth.org_id, rate_limit).await {
        Ok(result) => result,
        Err(e) => {
            tracing::warn!(error = %e, org_id = %auth.org_id, "Rate limit check failed, allowing request");
            let mut response = next.run(request).await;
            add_limit_headers(&mut response, rate_limit.requests_per_minute, None);
            return Ok(response);
        }
    };

    if !result.ok {
        return Err(ApiError::RateLimitExceeded {
            retry_after: result.retry_after,
            message: format!(
                "Rate limit exceeded. Try again in {} seconds",
                result.retry_after
            ),
        });
    }

    let mut response = next.run(request).await;
    add_limit_headers(
        &mut response,
        rate_limit.requests_per_minute,
        Some(result.remaining),
    );

    Ok(response)
}

fn add_limit_headers(response: &mut Response, limit: u32, remaining: Option<u32>) {
    if let Ok(value) = HeaderValue::from_str(&limit.to_string()) {
        response.headers_mut().insert("X-RateLimit-Limit", value);
    }
    if let Some(remaining) = remaining {
        if let Ok(value) = HeaderValue::from_str(&remaining.to_string()) {
            response
                .headers_mut()
                .insert("X-RateLimit-Remaining", value);
        }
    }
}

/// Checks the rate limit via the Redis token bucket
///
/// Refill and consume run atomically inside one Lua script.
async fn check_rate_limit(
    mut conn: ConnectionManager,
    organization_id: Uuid,
    rate_limit: RateLimit,
) -> Result<RateLimitResult, redis::RedisError> {
    let key = format!("ratelimit:org:{}", organization_id);
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    let script = redis::Script::new(
        r#"
        local key = KEYS[1]
        local capacity = tonumber(ARGV[1])
        local refill_rate = tonumber(ARGV[2])
        local now = tonumber(ARGV[3])

        local bucket = redis.call('HMGET', key, 'tokens', 'last_refill')
        local tokens = tonumber(bucket[1])
        local last_refill = tonumber(bucket[2])

        if not tokens then
            tokens = capacity
            last_refill = now
        end

        local elapsed = now - last_refill
        tokens = math.min(capacity, tokens + (elapsed * refill_rate))

        if tokens >= 1 then
            tokens = tokens - 1
            redis.call('HMSET', key, 'tokens', tokens, 'last_refill', now)
            redis.call('EXPIRE', key, 120)
            return {1, math.floor(tokens), 0}
        else
            return {0, 0, math.ceil((1 - tokens) / refill_rate)}
        end
        "#,
    );

    let result: Vec<i64> = script
        .key(&key)
        .arg(rate_limit.bucket_capacity)
        .arg(rate_limit.refill_rate)
        .arg(now)
        .invoke_async(&mut conn)
        .await?;

    Ok(RateLimitResult {
        ok: result.first().copied().unwrap_or(0) == 1,
        remaining: result.get(1).copied().unwrap_or(0).max(0) as u32,
        retry_after: result.get(2).copied().unwrap_or(1).max(0) as u64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_for_trial() {
        let limit = RateLimit::for_plan(OrganizationPlan::Trial);
        assert_eq!(limit.requests_per_minute, 30);
        assert_eq!(limit.bucket_capacity, 30);
        assert_eq!(limit.refill_rate, 0.5);
    }

    #[test]
    fn test_rate_limit_for_starter() {
        let limit = RateLimit::for_plan(OrganizationPlan::Starter);
        assert_eq!(limit.requests_per_minute, 120);
        assert_eq!(limit.bucket_capacity, 120);
        assert_eq!(limit.refill_rate, 2.0);
    }

    #[test]
    fn test_rate_limit_for_growth() {
        let limit = RateLimit::for_plan(OrganizationPlan::Growth);
        assert_eq!(limit.requests_per_minute, 600);
        assert_eq!(limit.bucket_capacity, 600);
        assert_eq!(limit.refill_rate, 10.0);
    }

    #[test]
    fn test_rate_limit_for_enterprise() {
        let limit = RateLimit::for_plan(OrganizationPlan::Enterprise);
        assert_eq!(limit.requests_per_minute, 2000);
        assert_eq!(limit.bucket_capacity, 2000);
        assert_eq!(limit.refill_rate, 33.33);
    }

    #[test]
    fn test_refill_rates_match_per_minute_limits() {
        for plan in [
            OrganizationPlan::Trial,
            OrganizationPlan::Starter,
            OrganizationPlan::Growth,
            OrganizationPlan::Enterprise,
        ] {
            let limit = RateLimit::for_plan(plan);
            let per_minute = limit.refill_rate * 60.0;
            assert!(
                (per_minute - limit.requests_per_minute as f64).abs() < 1.0,
                "{:?}: refill {} tokens/min vs limit {}",
                plan,
                per_minute,
                limit.requests_per_minute
            );
        }
    }
}
