//! Subscription model.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Subscription status, re-derived from current facts every tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Trialling,
    Active,
    PastDueDate,
    Unpaid,
    Cancelled,
    Completed,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Trialling => "trialling",
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::PastDueDate => "past_due_date",
            SubscriptionStatus::Unpaid => "unpaid",
            SubscriptionStatus::Cancelled => "cancelled",
            SubscriptionStatus::Completed => "completed",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "trialling" => SubscriptionStatus::Trialling,
            "past_due_date" => SubscriptionStatus::PastDueDate,
            "unpaid" => SubscriptionStatus::Unpaid,
            "cancelled" => SubscriptionStatus::Cancelled,
            "completed" => SubscriptionStatus::Completed,
            _ => SubscriptionStatus::Active,
        }
    }
}

/// Subscription aggregate. The current invoice window
/// (`current_invoice_start`/`current_invoice_end`) is the period the
/// next invoice bills for; it advances each time an invoice is
/// generated.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Subscription {
    pub subscription_id: Uuid,
    pub customer_id: Uuid,
    pub status: String,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub trial_period_start: Option<NaiveDate>,
    pub trial_period_end: Option<NaiveDate>,
    pub current_invoice_start: NaiveDate,
    pub current_invoice_end: NaiveDate,
    pub cancel_at_period_end: bool,
    pub cancelation_date: Option<NaiveDate>,
    pub generate_invoice_at_period_start: bool,
    pub generate_new_invoices_past_due_date: bool,
    pub follow_calendar_months: bool,
    pub additional_discount_percentage: Option<Decimal>,
    pub additional_discount_amount: Option<Decimal>,
    pub days_until_due: i32,
    pub tax_template: Option<String>,
    pub submit_invoice: bool,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl Subscription {
    pub fn status(&self) -> SubscriptionStatus {
        SubscriptionStatus::from_string(&self.status)
    }

    pub fn set_status(&mut self, status: SubscriptionStatus) {
        self.status = status.as_str().to_string();
    }

    /// Builds a subscription from creation input. The billing period
    /// and status are placeholders until the engine computes them.
    pub fn from_create(input: &CreateSubscription) -> Self {
        let now = Utc::now();
        Subscription {
            subscription_id: Uuid::new_v4(),
            customer_id: input.customer_id,
            status: SubscriptionStatus::Active.as_str().to_string(),
            start_date: input.start_date,
            end_date: input.end_date,
            trial_period_start: input.trial_period_start,
            trial_period_end: input.trial_period_end,
            current_invoice_start: input.start_date,
            current_invoice_end: input.start_date,
            cancel_at_period_end: input.cancel_at_period_end,
            cancelation_date: None,
            generate_invoice_at_period_start: input.generate_invoice_at_period_start,
            generate_new_invoices_past_due_date: input.generate_new_invoices_past_due_date,
            follow_calendar_months: input.follow_calendar_months,
            additional_discount_percentage: input.additional_discount_percentage,
            additional_discount_amount: input.additional_discount_amount,
            days_until_due: input.days_until_due,
            tax_template: input.tax_template.clone(),
            submit_invoice: input.submit_invoice,
            created_utc: now,
            updated_utc: now,
        }
    }
}

/// Plan line on a subscription. All lines must share one billing cycle.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PlanItem {
    pub subscription_id: Uuid,
    pub plan_id: Uuid,
    pub qty: Decimal,
    pub position: i32,
}

/// A plan reference with quantity, as supplied at creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanSelection {
    pub plan_id: Uuid,
    pub qty: Decimal,
}

/// Input for creating a subscription.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateSubscription {
    pub customer_id: Uuid,
    pub plans: Vec<PlanSelection>,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub trial_period_start: Option<NaiveDate>,
    pub trial_period_end: Option<NaiveDate>,
    #[serde(default)]
    pub cancel_at_period_end: bool,
    #[serde(default)]
    pub generate_invoice_at_period_start: bool,
    #[serde(default)]
    pub generate_new_invoices_past_due_date: bool,
    #[serde(default)]
    pub follow_calendar_months: bool,
    pub additional_discount_percentage: Option<Decimal>,
    pub additional_discount_amount: Option<Decimal>,
    #[serde(default)]
    pub days_until_due: i32,
    pub tax_template: Option<String>,
    #[serde(default)]
    pub submit_invoice: bool,
}
