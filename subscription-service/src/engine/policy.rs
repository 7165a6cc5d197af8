//! Invoice generation policy and proration.

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::models::{Invoice, Subscription};

use super::period::BillingPeriod;

/// Whether a tick at `today` should generate an invoice for the
/// current billing period.
///
/// Prepaid subscriptions bill when the period opens, postpaid ones
/// when it closes. A pending cancellation suppresses generation
/// entirely; the cancel flow issues any final invoice itself.
pub fn should_generate_invoice(
    sub: &Subscription,
    today: NaiveDate,
    is_new: bool,
    has_outstanding: bool,
) -> bool {
    if sub.cancelation_date.is_some() {
        return false;
    }
    if sub.generate_invoice_at_period_start {
        return today == sub.current_invoice_start || is_new;
    }
    if today == sub.current_invoice_end {
        return !(has_outstanding && !sub.generate_new_invoices_past_due_date);
    }
    false
}

/// Whether `latest` already covers `period`, keyed on posting date so
/// a second tick on the same day stays a no-op.
pub fn is_current_invoice_generated(latest: Option<&Invoice>, period: BillingPeriod) -> bool {
    match latest {
        Some(invoice) => {
            invoice.posting_date >= period.start && invoice.posting_date <= period.end
        }
        None => false,
    }
}

/// Fraction of the period elapsed through `today`, with inclusive day
/// counts. Prepaid subscriptions always bill the full period.
pub fn proration_factor(
    start: NaiveDate,
    end: NaiveDate,
    today: NaiveDate,
    prepaid: bool,
) -> Decimal {
    if prepaid {
        return Decimal::ONE;
    }
    let total = (end - start).num_days() + 1;
    if total <= 0 {
        return Decimal::ONE;
    }
    let elapsed = (today - start).num_days() + 1;
    Decimal::from(elapsed) / Decimal::from(total)
}
