//! Background job: expire subscriptions past their end date.
//!
//! Runs hourly. Rows are updated, not deleted, so history and the
//! usage ledger keep pointing at the expired subscription. The
//! interceptor itself never mutates subscription state; this sweeper
//! is the only internal writer.

use std::time::Duration;

use tokio::time;

use crate::store::postgres::PgStore;

/// Spawn the background expiry task. Call this once at startup.
pub fn spawn(db: PgStore) {
    tokio::spawn(async move {
        let mut interval = time::interval(Duration::from_secs(3600)); // every hour
        loop {
            interval.tick().await;
            match db.expire_overdue_subscriptions().await {
                Ok(0) => {}
                Ok(n) => tracing::info!(rows = n, "expired overdue subscriptions"),
                Err(e) => tracing::error!("subscription expiry sweep failed: {}", e),
            }
        }
    });
}
