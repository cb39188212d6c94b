//! Request interceptor and usage accountant.
//!
//! Gates every request under the protected prefix through API-key
//! validation and plan limits, then appends one usage record after the
//! downstream handler returns. Admission order is fixed: key → active
//! subscription → plan → monthly quota → concurrency window → dispatch
//! → ledger write. Rejections never touch the ledger.
//!
//! The concurrency check counts ledger entries in the trailing second,
//! so it measures request density rather than in-flight requests.
//! Likewise the gap between counting and the later insert means two
//! simultaneous requests can both pass a nearly-exhausted limit; there
//! is no cross-request lock.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};

use crate::errors::AppError;
use crate::store::postgres::NewUsage;
use crate::AppState;

/// Header carrying the subscription's opaque API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Trailing window for the concurrent-connection approximation.
pub const CONCURRENCY_WINDOW_SECS: i64 = 1;

/// Admission check plus usage accounting around the downstream handler.
pub async fn admit_and_forward(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let endpoint = req.uri().path().to_string();

    let api_key = req
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
        .ok_or(AppError::ApiKeyMissing)?
        .to_string();

    let subscription = state
        .db
        .find_active_subscription(&api_key)
        .await
        .map_err(AppError::Internal)?
        .ok_or(AppError::ApiKeyInvalid)?;

    let plan = state
        .db
        .get_plan(subscription.plan_id)
        .await
        .map_err(AppError::Internal)?
        .ok_or(AppError::PlanMissing {
            subscription_id: subscription.id,
            plan_id: subscription.plan_id,
        })?;

    let now = Utc::now();

    if let Some(limit) = plan.api_hit_limit {
        let hits = state
            .db
            .count_usage_since(subscription.company_id, subscription.id, month_start(now))
            .await
            .map_err(AppError::Internal)?;
        if over_limit(hits, limit) {
            tracing::warn!(
                subscription_id = subscription.id,
                hits,
                limit,
                "monthly quota exhausted"
            );
            return Err(AppError::QuotaExceeded);
        }
    }

    if let Some(limit) = plan.concurrent_connections {
        let since = now - Duration::seconds(CONCURRENCY_WINDOW_SECS);
        let recent = state
            .db
            .count_usage_since(subscription.company_id, subscription.id, since)
            .await
            .map_err(AppError::Internal)?;
        if over_limit(recent, limit) {
            tracing::warn!(
                subscription_id = subscription.id,
                recent,
                limit,
                "concurrency window exhausted"
            );
            return Err(AppError::ConcurrencyExceeded);
        }
    }

    // Admitted. If the client disconnects here the future is dropped
    // and no record is written; only completed requests are logged.
    let started = Instant::now();
    let response = next.run(req).await;
    let response_time_ms = started.elapsed().as_millis() as i32;

    state
        .db
        .insert_usage(&NewUsage {
            company_id: subscription.company_id,
            subscription_id: subscription.id,
            endpoint,
            status_code: response.status().as_u16() as i16,
            response_time_ms,
        })
        .await
        .map_err(AppError::Internal)?;

    Ok(response)
}

/// First instant of the calendar month containing `now` (UTC).
/// The quota window is month-aligned, never a rolling 30 days.
pub fn month_start(now: DateTime<Utc>) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
        .single()
        .expect("first of month is a valid UTC timestamp")
}

/// A limit is exhausted once the count reaches it.
pub fn over_limit(count: i64, limit: i32) -> bool {
    count >= i64::from(limit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, s)
            .unwrap()
            .and_utc()
    }

    #[test]
    fn month_start_mid_month() {
        let now = utc(2024, 7, 19, 15, 42, 9);
        assert_eq!(month_start(now), utc(2024, 7, 1, 0, 0, 0));
    }

    #[test]
    fn month_start_is_identity_at_boundary() {
        let boundary = utc(2024, 3, 1, 0, 0, 0);
        assert_eq!(month_start(boundary), boundary);
    }

    #[test]
    fn month_start_last_instant_of_month() {
        // 23:59:59 on the last day still belongs to the same month.
        let now = utc(2024, 2, 29, 23, 59, 59);
        assert_eq!(month_start(now), utc(2024, 2, 1, 0, 0, 0));
    }

    #[test]
    fn month_start_december() {
        // No year rollover: December counts against December 1st.
        let now = utc(2023, 12, 31, 12, 0, 0);
        assert_eq!(month_start(now), utc(2023, 12, 1, 0, 0, 0));
    }

    #[test]
    fn usage_from_previous_month_is_outside_window() {
        let now = utc(2024, 8, 1, 0, 0, 1);
        let last_month = utc(2024, 7, 31, 23, 59, 59);
        assert!(last_month < month_start(now));
    }

    #[test]
    fn over_limit_at_exact_boundary() {
        // L records already logged → the (L+1)th request is rejected.
        assert!(over_limit(100, 100));
        assert!(over_limit(101, 100));
        assert!(!over_limit(99, 100));
    }

    #[test]
    fn over_limit_zero_usage() {
        assert!(!over_limit(0, 1));
        assert!(over_limit(1, 1));
    }

    #[test]
    fn concurrency_window_excludes_older_records() {
        let now = utc(2024, 5, 10, 10, 0, 5);
        let since = now - Duration::seconds(CONCURRENCY_WINDOW_SECS);
        let two_seconds_ago = utc(2024, 5, 10, 10, 0, 3);
        let half_second_ago = now - Duration::milliseconds(500);
        assert!(two_seconds_ago < since);
        assert!(half_second_ago >= since);
    }
}
