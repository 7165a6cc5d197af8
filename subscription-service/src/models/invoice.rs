//! Invoice model. Invoices are owned by the invoicing collaborator;
//! the engine only creates and reads them.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Invoice payment status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Unpaid,
    Paid,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Unpaid => "unpaid",
            InvoiceStatus::Paid => "paid",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "paid" => InvoiceStatus::Paid,
            _ => InvoiceStatus::Unpaid,
        }
    }
}

/// Invoice generated for a subscription billing period.
/// `from_date`/`to_date` mirror the billed period.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Invoice {
    pub invoice_id: Uuid,
    pub subscription_id: Uuid,
    pub customer_id: Uuid,
    pub posting_date: NaiveDate,
    pub due_date: NaiveDate,
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
    pub status: String,
    pub total: Decimal,
    pub discount_percentage: Option<Decimal>,
    pub discount_amount: Option<Decimal>,
    pub tax_template: Option<String>,
    pub is_submitted: bool,
    pub created_utc: DateTime<Utc>,
}

impl Invoice {
    pub fn is_paid(&self) -> bool {
        InvoiceStatus::from_string(&self.status) == InvoiceStatus::Paid
    }
}

/// Line item on an invoice draft.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceLine {
    pub plan_id: Uuid,
    pub qty: Decimal,
    pub rate: Decimal,
    pub amount: Decimal,
}

/// Input handed to the invoicing collaborator.
#[derive(Debug, Clone)]
pub struct InvoiceDraft {
    pub subscription_id: Uuid,
    pub customer_id: Uuid,
    pub posting_date: NaiveDate,
    pub due_date: NaiveDate,
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
    pub lines: Vec<InvoiceLine>,
    pub discount_percentage: Option<Decimal>,
    pub discount_amount: Option<Decimal>,
    pub tax_template: Option<String>,
    pub submit: bool,
}

impl InvoiceDraft {
    /// Line total net of the draft's discounts, floored at zero.
    pub fn net_total(&self) -> Decimal {
        let gross: Decimal = self.lines.iter().map(|line| line.amount).sum();
        let mut total = gross;
        if let Some(pct) = self.discount_percentage {
            total -= gross * pct / Decimal::ONE_HUNDRED;
        }
        if let Some(amount) = self.discount_amount {
            total -= amount;
        }
        total.max(Decimal::ZERO)
    }
}
