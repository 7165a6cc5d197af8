//! Billing plan model.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Billing interval unit for plans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingInterval {
    Day,
    Week,
    Month,
    Year,
}

impl BillingInterval {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillingInterval::Day => "day",
            BillingInterval::Week => "week",
            BillingInterval::Month => "month",
            BillingInterval::Year => "year",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "day" => BillingInterval::Day,
            "week" => BillingInterval::Week,
            "year" => BillingInterval::Year,
            _ => BillingInterval::Month,
        }
    }
}

/// Billing plan.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BillingPlan {
    pub plan_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub billing_interval: String,
    pub interval_count: i32,
    pub price: Decimal,
    pub currency: String,
    pub is_active: bool,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

/// Input for creating a plan.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatePlan {
    pub name: String,
    pub description: Option<String>,
    pub billing_interval: BillingInterval,
    pub interval_count: i32,
    pub price: Decimal,
    pub currency: String,
}
