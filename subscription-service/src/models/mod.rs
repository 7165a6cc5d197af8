//! Domain models for subscription-service.

mod invoice;
mod plan;
mod settings;
mod subscription;

pub use invoice::{Invoice, InvoiceDraft, InvoiceLine, InvoiceStatus};
pub use plan::{BillingInterval, BillingPlan, CreatePlan};
pub use settings::{BillingSettings, UpdateSettings};
pub use subscription::{
    CreateSubscription, PlanItem, PlanSelection, Subscription, SubscriptionStatus,
};
