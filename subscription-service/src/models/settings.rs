//! Billing settings model (singleton).

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Global billing policy knobs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, FromRow)]
pub struct BillingSettings {
    /// Days past an invoice due date before punitive status applies.
    pub grace_period_days: i32,
    /// Cancel (rather than mark Unpaid) once the grace period lapses.
    pub cancel_after_grace: bool,
    /// Prorate mid-period invoices.
    pub prorate: bool,
}

impl Default for BillingSettings {
    fn default() -> Self {
        BillingSettings {
            grace_period_days: 0,
            cancel_after_grace: false,
            prorate: false,
        }
    }
}

/// Input for updating billing settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateSettings {
    pub grace_period_days: Option<i32>,
    pub cancel_after_grace: Option<bool>,
    pub prorate: Option<bool>,
}
