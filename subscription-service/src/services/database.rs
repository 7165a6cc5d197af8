//! Database service for subscription-service.

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::engine::cycle::BillingCycle;
use crate::error::BillingError;
use crate::models::{
    BillingInterval, BillingPlan, BillingSettings, CreatePlan, Invoice, InvoiceDraft,
    InvoiceStatus, PlanItem, Subscription, UpdateSettings,
};
use crate::services::collaborators::{
    InvoiceStore, PlanCatalog, SettingsProvider, SubscriptionStore,
};
use crate::services::metrics::DB_QUERY_DURATION;

const SUBSCRIPTION_COLUMNS: &str = "subscription_id, customer_id, status, start_date, end_date, \
    trial_period_start, trial_period_end, current_invoice_start, current_invoice_end, \
    cancel_at_period_end, cancelation_date, generate_invoice_at_period_start, \
    generate_new_invoices_past_due_date, follow_calendar_months, \
    additional_discount_percentage, additional_discount_amount, days_until_due, tax_template, \
    submit_invoice, created_utc, updated_utc";

const INVOICE_COLUMNS: &str = "invoice_id, subscription_id, customer_id, posting_date, due_date, \
    from_date, to_date, status, total, discount_percentage, discount_amount, tax_template, \
    is_submitted, created_utc";

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "subscription-service"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check database health.
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["health_check"])
            .start_timer();

        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Health check failed: {}", e)))?;

        timer.observe_duration();
        Ok(())
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }

    // =========================================================================
    // Plan Operations
    // =========================================================================

    /// Create a new billing plan.
    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_plan(&self, input: &CreatePlan) -> Result<BillingPlan, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_plan"])
            .start_timer();

        let plan_id = Uuid::new_v4();
        let plan = sqlx::query_as::<_, BillingPlan>(
            r#"
            INSERT INTO billing_plans (plan_id, name, description, billing_interval, interval_count, price, currency)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING plan_id, name, description, billing_interval, interval_count, price, currency, is_active, created_utc, updated_utc
            "#,
        )
        .bind(plan_id)
        .bind(&input.name)
        .bind(&input.description)
        .bind(input.billing_interval.as_str())
        .bind(input.interval_count)
        .bind(input.price)
        .bind(&input.currency)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to create plan: {}", e)))?;

        timer.observe_duration();
        info!(plan_id = %plan.plan_id, name = %plan.name, "Plan created");

        Ok(plan)
    }

    /// Fetch a billing plan by id.
    #[instrument(skip(self))]
    pub async fn get_plan(&self, plan_id: Uuid) -> Result<BillingPlan, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_plan"])
            .start_timer();

        let plan = sqlx::query_as::<_, BillingPlan>(
            "SELECT plan_id, name, description, billing_interval, interval_count, price, currency, is_active, created_utc, updated_utc \
             FROM billing_plans WHERE plan_id = $1",
        )
        .bind(plan_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get plan: {}", e)))?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Plan {} not found", plan_id)))?;

        timer.observe_duration();
        Ok(plan)
    }

    // =========================================================================
    // Subscription Queries
    // =========================================================================

    /// Fetch a subscription by id.
    #[instrument(skip(self))]
    pub async fn get_subscription(
        &self,
        subscription_id: Uuid,
    ) -> Result<Subscription, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_subscription"])
            .start_timer();

        let query = format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE subscription_id = $1"
        );
        let sub = sqlx::query_as::<_, Subscription>(&query)
            .bind(subscription_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to get subscription: {}", e))
            })?
            .ok_or_else(|| {
                AppError::NotFound(anyhow::anyhow!("Subscription {} not found", subscription_id))
            })?;

        timer.observe_duration();
        Ok(sub)
    }

    /// List a subscription's linked invoices, newest period first.
    #[instrument(skip(self))]
    pub async fn list_invoices(&self, subscription_id: Uuid) -> Result<Vec<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_invoices"])
            .start_timer();

        let query = format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices \
             WHERE subscription_id = $1 AND detached = FALSE \
             ORDER BY to_date DESC"
        );
        let invoices = sqlx::query_as::<_, Invoice>(&query)
            .bind(subscription_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to list invoices: {}", e))
            })?;

        timer.observe_duration();
        Ok(invoices)
    }

    /// Update an invoice's payment status.
    #[instrument(skip(self))]
    pub async fn set_invoice_status(
        &self,
        invoice_id: Uuid,
        status: InvoiceStatus,
    ) -> Result<Invoice, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["set_invoice_status"])
            .start_timer();

        let query = format!(
            "UPDATE invoices SET status = $2 WHERE invoice_id = $1 RETURNING {INVOICE_COLUMNS}"
        );
        let invoice = sqlx::query_as::<_, Invoice>(&query)
            .bind(invoice_id)
            .bind(status.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to update invoice: {}", e))
            })?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice {} not found", invoice_id)))?;

        timer.observe_duration();
        Ok(invoice)
    }

    // =========================================================================
    // Settings Operations
    // =========================================================================

    /// Fetch the global billing settings row.
    #[instrument(skip(self))]
    pub async fn get_settings(&self) -> Result<BillingSettings, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_settings"])
            .start_timer();

        let settings = sqlx::query_as::<_, BillingSettings>(
            "SELECT grace_period_days, cancel_after_grace, prorate FROM billing_settings",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get settings: {}", e)))?;

        timer.observe_duration();
        Ok(settings)
    }

    /// Update the global billing settings row.
    #[instrument(skip(self, input))]
    pub async fn update_settings(
        &self,
        input: &UpdateSettings,
    ) -> Result<BillingSettings, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_settings"])
            .start_timer();

        let settings = sqlx::query_as::<_, BillingSettings>(
            r#"
            UPDATE billing_settings SET
                grace_period_days = COALESCE($1, grace_period_days),
                cancel_after_grace = COALESCE($2, cancel_after_grace),
                prorate = COALESCE($3, prorate)
            RETURNING grace_period_days, cancel_after_grace, prorate
            "#,
        )
        .bind(input.grace_period_days)
        .bind(input.cancel_after_grace)
        .bind(input.prorate)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to update settings: {}", e))
        })?;

        timer.observe_duration();
        info!(
            grace_period_days = settings.grace_period_days,
            cancel_after_grace = settings.cancel_after_grace,
            prorate = settings.prorate,
            "Billing settings updated"
        );
        Ok(settings)
    }
}

fn db_err(context: &str, error: sqlx::Error) -> BillingError {
    BillingError::Collaborator(anyhow::anyhow!("{}: {}", context, error))
}

#[async_trait]
impl PlanCatalog for Database {
    #[instrument(skip(self))]
    async fn billing_terms(&self, plan_id: Uuid) -> Result<BillingCycle, BillingError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["billing_terms"])
            .start_timer();

        let row = sqlx::query_as::<_, (String, i32)>(
            "SELECT billing_interval, interval_count FROM billing_plans WHERE plan_id = $1",
        )
        .bind(plan_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_err("Failed to load billing terms", e))?
        .ok_or_else(|| BillingError::NotFound(format!("Plan {} not found", plan_id)))?;

        timer.observe_duration();
        Ok(BillingCycle {
            interval: BillingInterval::from_string(&row.0),
            interval_count: row.1,
        })
    }

    #[instrument(skip(self))]
    async fn rate(
        &self,
        plan_id: Uuid,
        _qty: Decimal,
        _customer_id: Uuid,
        _period_start: NaiveDate,
        _period_end: NaiveDate,
        proration_factor: Option<Decimal>,
    ) -> Result<Decimal, BillingError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["plan_rate"])
            .start_timer();

        let price = sqlx::query_scalar::<_, Decimal>(
            "SELECT price FROM billing_plans WHERE plan_id = $1",
        )
        .bind(plan_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_err("Failed to load plan price", e))?
        .ok_or_else(|| BillingError::NotFound(format!("Plan {} not found", plan_id)))?;

        timer.observe_duration();
        Ok(match proration_factor {
            Some(factor) => price * factor,
            None => price,
        })
    }
}

#[async_trait]
impl InvoiceStore for Database {
    #[instrument(skip(self, draft), fields(subscription_id = %draft.subscription_id))]
    async fn create(&self, draft: &InvoiceDraft) -> Result<Invoice, BillingError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_invoice"])
            .start_timer();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_err("Failed to begin transaction", e))?;

        let invoice_id = Uuid::new_v4();
        let query = format!(
            r#"
            INSERT INTO invoices (invoice_id, subscription_id, customer_id, posting_date, due_date, from_date, to_date, status, total, discount_percentage, discount_amount, tax_template, is_submitted)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING {INVOICE_COLUMNS}
            "#
        );
        let invoice = sqlx::query_as::<_, Invoice>(&query)
            .bind(invoice_id)
            .bind(draft.subscription_id)
            .bind(draft.customer_id)
            .bind(draft.posting_date)
            .bind(draft.due_date)
            .bind(draft.from_date)
            .bind(draft.to_date)
            .bind(InvoiceStatus::Unpaid.as_str())
            .bind(draft.net_total())
            .bind(draft.discount_percentage)
            .bind(draft.discount_amount)
            .bind(&draft.tax_template)
            .bind(draft.submit)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| db_err("Failed to create invoice", e))?;

        for (position, line) in draft.lines.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO invoice_items (invoice_id, plan_id, qty, rate, amount, position)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(invoice_id)
            .bind(line.plan_id)
            .bind(line.qty)
            .bind(line.rate)
            .bind(line.amount)
            .bind(position as i32)
            .execute(&mut *tx)
            .await
            .map_err(|e| db_err("Failed to create invoice item", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| db_err("Failed to commit invoice", e))?;

        timer.observe_duration();
        Ok(invoice)
    }

    #[instrument(skip(self))]
    async fn latest(&self, subscription_id: Uuid) -> Result<Option<Invoice>, BillingError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["latest_invoice"])
            .start_timer();

        let query = format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices \
             WHERE subscription_id = $1 AND detached = FALSE \
             ORDER BY to_date DESC LIMIT 1"
        );
        let invoice = sqlx::query_as::<_, Invoice>(&query)
            .bind(subscription_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_err("Failed to load latest invoice", e))?;

        timer.observe_duration();
        Ok(invoice)
    }

    #[instrument(skip(self))]
    async fn has_outstanding(&self, subscription_id: Uuid) -> Result<bool, BillingError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["has_outstanding"])
            .start_timer();

        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM invoices \
             WHERE subscription_id = $1 AND detached = FALSE AND status != 'paid')",
        )
        .bind(subscription_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_err("Failed to check outstanding invoices", e))?;

        timer.observe_duration();
        Ok(exists)
    }

    #[instrument(skip(self))]
    async fn exists_for(&self, subscription_id: Uuid) -> Result<bool, BillingError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["invoice_exists"])
            .start_timer();

        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM invoices \
             WHERE subscription_id = $1 AND detached = FALSE)",
        )
        .bind(subscription_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_err("Failed to check invoice existence", e))?;

        timer.observe_duration();
        Ok(exists)
    }

    #[instrument(skip(self))]
    async fn unlink(&self, subscription_id: Uuid) -> Result<(), BillingError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["unlink_invoices"])
            .start_timer();

        sqlx::query("UPDATE invoices SET detached = TRUE WHERE subscription_id = $1")
            .bind(subscription_id)
            .execute(&self.pool)
            .await
            .map_err(|e| db_err("Failed to unlink invoices", e))?;

        timer.observe_duration();
        Ok(())
    }
}

#[async_trait]
impl SettingsProvider for Database {
    async fn grace_period_days(&self) -> Result<i32, BillingError> {
        let settings = self
            .get_settings()
            .await
            .map_err(|e| BillingError::Collaborator(anyhow::anyhow!("{}", e)))?;
        Ok(settings.grace_period_days)
    }

    async fn cancel_after_grace(&self) -> Result<bool, BillingError> {
        let settings = self
            .get_settings()
            .await
            .map_err(|e| BillingError::Collaborator(anyhow::anyhow!("{}", e)))?;
        Ok(settings.cancel_after_grace)
    }

    async fn prorate_enabled(&self) -> Result<bool, BillingError> {
        let settings = self
            .get_settings()
            .await
            .map_err(|e| BillingError::Collaborator(anyhow::anyhow!("{}", e)))?;
        Ok(settings.prorate)
    }
}

#[async_trait]
impl SubscriptionStore for Database {
    #[instrument(skip(self, sub, items), fields(subscription_id = %sub.subscription_id))]
    async fn insert(&self, sub: &Subscription, items: &[PlanItem]) -> Result<(), BillingError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["insert_subscription"])
            .start_timer();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_err("Failed to begin transaction", e))?;

        sqlx::query(
            r#"
            INSERT INTO subscriptions (subscription_id, customer_id, status, start_date, end_date, trial_period_start, trial_period_end, current_invoice_start, current_invoice_end, cancel_at_period_end, cancelation_date, generate_invoice_at_period_start, generate_new_invoices_past_due_date, follow_calendar_months, additional_discount_percentage, additional_discount_amount, days_until_due, tax_template, submit_invoice, created_utc, updated_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, $21)
            "#,
        )
        .bind(sub.subscription_id)
        .bind(sub.customer_id)
        .bind(&sub.status)
        .bind(sub.start_date)
        .bind(sub.end_date)
        .bind(sub.trial_period_start)
        .bind(sub.trial_period_end)
        .bind(sub.current_invoice_start)
        .bind(sub.current_invoice_end)
        .bind(sub.cancel_at_period_end)
        .bind(sub.cancelation_date)
        .bind(sub.generate_invoice_at_period_start)
        .bind(sub.generate_new_invoices_past_due_date)
        .bind(sub.follow_calendar_months)
        .bind(sub.additional_discount_percentage)
        .bind(sub.additional_discount_amount)
        .bind(sub.days_until_due)
        .bind(&sub.tax_template)
        .bind(sub.submit_invoice)
        .bind(sub.created_utc)
        .bind(sub.updated_utc)
        .execute(&mut *tx)
        .await
        .map_err(|e| db_err("Failed to insert subscription", e))?;

        for item in items {
            sqlx::query(
                r#"
                INSERT INTO subscription_plan_items (subscription_id, plan_id, qty, position)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(item.subscription_id)
            .bind(item.plan_id)
            .bind(item.qty)
            .bind(item.position)
            .execute(&mut *tx)
            .await
            .map_err(|e| db_err("Failed to insert plan item", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| db_err("Failed to commit subscription", e))?;

        timer.observe_duration();
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get(&self, subscription_id: Uuid) -> Result<Subscription, BillingError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["load_subscription"])
            .start_timer();

        let query = format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE subscription_id = $1"
        );
        let sub = sqlx::query_as::<_, Subscription>(&query)
            .bind(subscription_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_err("Failed to load subscription", e))?
            .ok_or_else(|| {
                BillingError::NotFound(format!("Subscription {} not found", subscription_id))
            })?;

        timer.observe_duration();
        Ok(sub)
    }

    #[instrument(skip(self))]
    async fn plan_items(&self, subscription_id: Uuid) -> Result<Vec<PlanItem>, BillingError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["plan_items"])
            .start_timer();

        let items = sqlx::query_as::<_, PlanItem>(
            "SELECT subscription_id, plan_id, qty, position FROM subscription_plan_items \
             WHERE subscription_id = $1 ORDER BY position",
        )
        .bind(subscription_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_err("Failed to load plan items", e))?;

        timer.observe_duration();
        Ok(items)
    }

    #[instrument(skip(self, sub), fields(subscription_id = %sub.subscription_id))]
    async fn update(&self, sub: &Subscription) -> Result<(), BillingError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_subscription"])
            .start_timer();

        sqlx::query(
            r#"
            UPDATE subscriptions SET
                status = $2,
                start_date = $3,
                current_invoice_start = $4,
                current_invoice_end = $5,
                cancelation_date = $6,
                updated_utc = NOW()
            WHERE subscription_id = $1
            "#,
        )
        .bind(sub.subscription_id)
        .bind(&sub.status)
        .bind(sub.start_date)
        .bind(sub.current_invoice_start)
        .bind(sub.current_invoice_end)
        .bind(sub.cancelation_date)
        .execute(&self.pool)
        .await
        .map_err(|e| db_err("Failed to update subscription", e))?;

        timer.observe_duration();
        Ok(())
    }

    #[instrument(skip(self))]
    async fn ids_excluding_cancelled(&self) -> Result<Vec<Uuid>, BillingError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["sweep_candidates"])
            .start_timer();

        let ids = sqlx::query_scalar::<_, Uuid>(
            "SELECT subscription_id FROM subscriptions WHERE status != 'cancelled' \
             ORDER BY created_utc",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_err("Failed to list sweep candidates", e))?;

        timer.observe_duration();
        Ok(ids)
    }
}
