//! Collaborator traits the billing engine drives. Production wires
//! these to Postgres; tests substitute in-memory fakes.

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::engine::cycle::BillingCycle;
use crate::error::BillingError;
use crate::models::{Invoice, InvoiceDraft, PlanItem, Subscription};

/// Plan lookups: billing terms and period pricing.
#[async_trait]
pub trait PlanCatalog: Send + Sync {
    /// Billing cadence configured on the plan.
    async fn billing_terms(&self, plan_id: Uuid) -> Result<BillingCycle, BillingError>;

    /// Unit rate for one plan line over a billing window. A proration
    /// factor scales the rate for partial periods.
    async fn rate(
        &self,
        plan_id: Uuid,
        qty: Decimal,
        customer_id: Uuid,
        period_start: NaiveDate,
        period_end: NaiveDate,
        proration_factor: Option<Decimal>,
    ) -> Result<Decimal, BillingError>;
}

/// Invoice creation and linked-invoice queries.
#[async_trait]
pub trait InvoiceStore: Send + Sync {
    async fn create(&self, draft: &InvoiceDraft) -> Result<Invoice, BillingError>;

    /// Latest linked invoice by billed period, newest first.
    async fn latest(&self, subscription_id: Uuid) -> Result<Option<Invoice>, BillingError>;

    async fn has_outstanding(&self, subscription_id: Uuid) -> Result<bool, BillingError>;

    async fn exists_for(&self, subscription_id: Uuid) -> Result<bool, BillingError>;

    /// Detaches all invoices from the subscription. Used on restart so
    /// billing history starts fresh; the invoices themselves survive.
    async fn unlink(&self, subscription_id: Uuid) -> Result<(), BillingError>;
}

/// Global billing policy.
#[async_trait]
pub trait SettingsProvider: Send + Sync {
    async fn grace_period_days(&self) -> Result<i32, BillingError>;
    async fn cancel_after_grace(&self) -> Result<bool, BillingError>;
    async fn prorate_enabled(&self) -> Result<bool, BillingError>;
}

/// Subscription persistence.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    async fn insert(
        &self,
        sub: &Subscription,
        items: &[PlanItem],
    ) -> Result<(), BillingError>;

    async fn get(&self, subscription_id: Uuid) -> Result<Subscription, BillingError>;

    async fn plan_items(&self, subscription_id: Uuid) -> Result<Vec<PlanItem>, BillingError>;

    async fn update(&self, sub: &Subscription) -> Result<(), BillingError>;

    /// Candidates for the periodic sweep.
    async fn ids_excluding_cancelled(&self) -> Result<Vec<Uuid>, BillingError>;
}
