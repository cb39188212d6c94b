use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run pending migrations from the migrations/ directory.
    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    // -- User Operations --

    pub async fn get_user_by_email(&self, email: &str) -> anyhow::Result<Option<UserRow>> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, name, email, otp_secret, is_active, created_at FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn insert_user(
        &self,
        name: &str,
        email: &str,
        otp_secret: &str,
    ) -> anyhow::Result<UserRow> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"INSERT INTO users (name, email, otp_secret, is_active)
               VALUES ($1, $2, $3, TRUE)
               RETURNING id, name, email, otp_secret, is_active, created_at"#,
        )
        .bind(name)
        .bind(email)
        .bind(otp_secret)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    // -- Subscription Operations --

    /// Point lookup used by the interceptor: key must match and the
    /// subscription must still be active. Never cached.
    pub async fn find_active_subscription(
        &self,
        api_key: &str,
    ) -> anyhow::Result<Option<SubscriptionRow>> {
        let row = sqlx::query_as::<_, SubscriptionRow>(
            r#"SELECT id, company_id, plan_id, api_key, start_date, end_date, status,
                      payment_provider, payment_ref, auto_renew, created_at
               FROM company_subscriptions
               WHERE api_key = $1 AND status = 'active'"#,
        )
        .bind(api_key)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn insert_subscription(
        &self,
        sub: &NewSubscription,
    ) -> anyhow::Result<SubscriptionRow> {
        let row = sqlx::query_as::<_, SubscriptionRow>(
            r#"INSERT INTO company_subscriptions
                   (company_id, plan_id, api_key, start_date, end_date, status, auto_renew)
               VALUES ($1, $2, $3, $4, $5, 'active', $6)
               RETURNING id, company_id, plan_id, api_key, start_date, end_date, status,
                         payment_provider, payment_ref, auto_renew, created_at"#,
        )
        .bind(sub.company_id)
        .bind(sub.plan_id)
        .bind(&sub.api_key)
        .bind(sub.start_date)
        .bind(sub.end_date)
        .bind(sub.auto_renew)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn list_subscriptions(
        &self,
        company_id: Option<i64>,
    ) -> anyhow::Result<Vec<SubscriptionRow>> {
        let rows = sqlx::query_as::<_, SubscriptionRow>(
            r#"SELECT id, company_id, plan_id, api_key, start_date, end_date, status,
                      payment_provider, payment_ref, auto_renew, created_at
               FROM company_subscriptions
               WHERE ($1::BIGINT IS NULL OR company_id = $1)
               ORDER BY created_at DESC"#,
        )
        .bind(company_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn cancel_subscription(&self, id: i64) -> anyhow::Result<bool> {
        let result = sqlx::query(
            "UPDATE company_subscriptions SET status = 'cancelled' WHERE id = $1 AND status = 'active'",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Flip active subscriptions past their end date to expired.
    /// Used by the background sweeper, never by the request path.
    pub async fn expire_overdue_subscriptions(&self) -> anyhow::Result<u64> {
        let result = sqlx::query(
            "UPDATE company_subscriptions SET status = 'expired' WHERE status = 'active' AND end_date < NOW()",
        )
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    // -- Plan Operations --

    pub async fn get_plan(&self, plan_id: i64) -> anyhow::Result<Option<PlanRow>> {
        let row = sqlx::query_as::<_, PlanRow>(
            r#"SELECT id, name, description, price_monthly, price_annual, api_hit_limit,
                      concurrent_connections, per_api_hit_price, is_active, created_at
               FROM plans WHERE id = $1"#,
        )
        .bind(plan_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn insert_plan(&self, plan: &NewPlan) -> anyhow::Result<PlanRow> {
        let row = sqlx::query_as::<_, PlanRow>(
            r#"INSERT INTO plans
                   (name, description, price_monthly, price_annual, api_hit_limit,
                    concurrent_connections, per_api_hit_price)
               VALUES ($1, $2, $3, $4, $5, $6, $7)
               RETURNING id, name, description, price_monthly, price_annual, api_hit_limit,
                         concurrent_connections, per_api_hit_price, is_active, created_at"#,
        )
        .bind(&plan.name)
        .bind(&plan.description)
        .bind(plan.price_monthly)
        .bind(plan.price_annual)
        .bind(plan.api_hit_limit)
        .bind(plan.concurrent_connections)
        .bind(plan.per_api_hit_price)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn list_plans(&self) -> anyhow::Result<Vec<PlanRow>> {
        let rows = sqlx::query_as::<_, PlanRow>(
            r#"SELECT id, name, description, price_monthly, price_annual, api_hit_limit,
                      concurrent_connections, per_api_hit_price, is_active, created_at
               FROM plans WHERE is_active = TRUE ORDER BY created_at ASC"#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    // -- Company Operations --

    pub async fn insert_company(&self, company: &NewCompany) -> anyhow::Result<CompanyRow> {
        let row = sqlx::query_as::<_, CompanyRow>(
            r#"INSERT INTO companies (name, contact_email, country)
               VALUES ($1, $2, $3)
               RETURNING id, name, contact_email, country, is_active, created_at"#,
        )
        .bind(&company.name)
        .bind(&company.contact_email)
        .bind(&company.country)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn list_companies(&self) -> anyhow::Result<Vec<CompanyRow>> {
        let rows = sqlx::query_as::<_, CompanyRow>(
            "SELECT id, name, contact_email, country, is_active, created_at FROM companies ORDER BY created_at ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    // -- Usage Ledger --

    /// Count ledger entries for a subscription at or after `since`.
    /// Backs both the calendar-month quota check and the 1-second
    /// concurrency approximation.
    pub async fn count_usage_since(
        &self,
        company_id: i64,
        subscription_id: i64,
        since: DateTime<Utc>,
    ) -> anyhow::Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"SELECT COUNT(*) FROM api_usages
               WHERE company_id = $1 AND subscription_id = $2 AND timestamp >= $3"#,
        )
        .bind(company_id)
        .bind(subscription_id)
        .bind(since)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    /// Append one usage record. Timestamp is assigned by the store.
    pub async fn insert_usage(&self, usage: &NewUsage) -> anyhow::Result<()> {
        sqlx::query(
            r#"INSERT INTO api_usages (company_id, subscription_id, endpoint, status_code, response_time_ms)
               VALUES ($1, $2, $3, $4, $5)"#,
        )
        .bind(usage.company_id)
        .bind(usage.subscription_id)
        .bind(&usage.endpoint)
        .bind(usage.status_code)
        .bind(usage.response_time_ms)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Billing/analytics rollup for one subscription.
    pub async fn usage_summary(
        &self,
        subscription_id: i64,
        month_start: DateTime<Utc>,
    ) -> anyhow::Result<UsageSummary> {
        let totals = sqlx::query_as::<_, (i64, Option<f64>)>(
            "SELECT COUNT(*), AVG(response_time_ms)::FLOAT8 FROM api_usages WHERE subscription_id = $1",
        )
        .bind(subscription_id)
        .fetch_one(&self.pool)
        .await?;

        let month_hits = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM api_usages WHERE subscription_id = $1 AND timestamp >= $2",
        )
        .bind(subscription_id)
        .bind(month_start)
        .fetch_one(&self.pool)
        .await?;

        let top_endpoints = sqlx::query_as::<_, EndpointStat>(
            r#"SELECT endpoint, COUNT(*) AS hits
               FROM api_usages WHERE subscription_id = $1
               GROUP BY endpoint ORDER BY hits DESC LIMIT 10"#,
        )
        .bind(subscription_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(UsageSummary {
            subscription_id,
            total_hits: totals.0,
            month_hits,
            avg_response_time_ms: totals.1,
            top_endpoints,
        })
    }

    // -- Invoice Operations --

    pub async fn insert_invoice(&self, invoice: &NewInvoice) -> anyhow::Result<InvoiceRow> {
        let row = sqlx::query_as::<_, InvoiceRow>(
            r#"INSERT INTO invoices
                   (company_id, subscription_id, amount, currency, payment_provider,
                    payment_status, payment_ref, due_date, paid_date)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
               RETURNING id, company_id, subscription_id, amount, currency, payment_provider,
                         payment_status, payment_ref, issue_date, due_date, paid_date"#,
        )
        .bind(invoice.company_id)
        .bind(invoice.subscription_id)
        .bind(invoice.amount)
        .bind(&invoice.currency)
        .bind(&invoice.payment_provider)
        .bind(&invoice.payment_status)
        .bind(&invoice.payment_ref)
        .bind(invoice.due_date)
        .bind(invoice.paid_date)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn list_invoices(&self, company_id: Option<i64>) -> anyhow::Result<Vec<InvoiceRow>> {
        let rows = sqlx::query_as::<_, InvoiceRow>(
            r#"SELECT id, company_id, subscription_id, amount, currency, payment_provider,
                      payment_status, payment_ref, issue_date, due_date, paid_date
               FROM invoices
               WHERE ($1::BIGINT IS NULL OR company_id = $1)
               ORDER BY issue_date DESC"#,
        )
        .bind(company_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    // -- Navigation Logs --

    pub async fn insert_navigation_log(&self, log: &NewNavigationLog) -> anyhow::Result<()> {
        sqlx::query(
            r#"INSERT INTO navigation_logs
                   (user_id, start_place, destination, start_time, end_time, time_taken_ms,
                    directions, status, message, error)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)"#,
        )
        .bind(log.user_id)
        .bind(&log.start_place)
        .bind(&log.destination)
        .bind(log.start_time)
        .bind(log.end_time)
        .bind(log.time_taken_ms)
        .bind(&log.directions)
        .bind(log.status)
        .bind(&log.message)
        .bind(&log.error)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn list_navigation_logs(
        &self,
        user_id: i64,
        limit: i64,
    ) -> anyhow::Result<Vec<NavigationLogRow>> {
        let rows = sqlx::query_as::<_, NavigationLogRow>(
            r#"SELECT id, user_id, start_place, destination, start_time, end_time, time_taken_ms,
                      directions, status, message, error, created_at
               FROM navigation_logs
               WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2"#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

// -- Row Types --

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct UserRow {
    pub id: i64,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub otp_secret: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct SubscriptionRow {
    pub id: i64,
    pub company_id: i64,
    pub plan_id: i64,
    pub api_key: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub status: String,
    pub payment_provider: Option<String>,
    pub payment_ref: Option<String>,
    pub auto_renew: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct PlanRow {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub price_monthly: Decimal,
    pub price_annual: Option<Decimal>,
    pub api_hit_limit: Option<i32>,
    pub concurrent_connections: Option<i32>,
    pub per_api_hit_price: Option<Decimal>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct CompanyRow {
    pub id: i64,
    pub name: String,
    pub contact_email: String,
    pub country: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct InvoiceRow {
    pub id: i64,
    pub company_id: i64,
    pub subscription_id: i64,
    pub amount: Decimal,
    pub currency: String,
    pub payment_provider: Option<String>,
    pub payment_status: Option<String>,
    pub payment_ref: Option<String>,
    pub issue_date: DateTime<Utc>,
    pub due_date: Option<DateTime<Utc>>,
    pub paid_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct NavigationLogRow {
    pub id: i64,
    pub user_id: i64,
    pub start_place: String,
    pub destination: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub time_taken_ms: i64,
    pub directions: Option<serde_json::Value>,
    pub status: bool,
    pub message: String,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow, Serialize)]
pub struct EndpointStat {
    pub endpoint: String,
    pub hits: i64,
}

#[derive(Debug, Serialize)]
pub struct UsageSummary {
    pub subscription_id: i64,
    pub total_hits: i64,
    pub month_hits: i64,
    pub avg_response_time_ms: Option<f64>,
    pub top_endpoints: Vec<EndpointStat>,
}

// -- Insert Payloads --

#[derive(Debug, Deserialize)]
pub struct NewSubscription {
    pub company_id: i64,
    pub plan_id: i64,
    pub api_key: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub auto_renew: bool,
}

#[derive(Debug, Deserialize)]
pub struct NewPlan {
    pub name: String,
    pub description: Option<String>,
    pub price_monthly: Decimal,
    pub price_annual: Option<Decimal>,
    pub api_hit_limit: Option<i32>,
    pub concurrent_connections: Option<i32>,
    pub per_api_hit_price: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
pub struct NewCompany {
    pub name: String,
    pub contact_email: String,
    pub country: Option<String>,
}

#[derive(Debug)]
pub struct NewUsage {
    pub company_id: i64,
    pub subscription_id: i64,
    pub endpoint: String,
    pub status_code: i16,
    pub response_time_ms: i32,
}

#[derive(Debug, Deserialize)]
pub struct NewInvoice {
    pub company_id: i64,
    pub subscription_id: i64,
    pub amount: Decimal,
    #[serde(default = "default_currency")]
    pub currency: String,
    pub payment_provider: Option<String>,
    pub payment_status: Option<String>,
    pub payment_ref: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub paid_date: Option<DateTime<Utc>>,
}

fn default_currency() -> String {
    "INR".to_string()
}

#[derive(Debug)]
pub struct NewNavigationLog {
    pub user_id: i64,
    pub start_place: String,
    pub destination: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub time_taken_ms: i64,
    pub directions: Option<serde_json::Value>,
    pub status: bool,
    pub message: String,
    pub error: Option<String>,
}
