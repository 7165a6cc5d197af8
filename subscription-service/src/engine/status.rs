//! Status derivation. Status is a function of the subscription's
//! dates, its latest invoice, and the global grace policy; ticks
//! re-derive it instead of mutating it piecemeal.

use chrono::{Days, NaiveDate};

use crate::models::{Invoice, Subscription, SubscriptionStatus};

use super::period::is_trialling;

/// Facts a status derivation needs beyond the subscription row.
pub struct StatusFacts<'a> {
    /// No invoice has ever been generated for this subscription.
    pub is_new: bool,
    /// At least one linked invoice is unpaid.
    pub has_outstanding: bool,
    /// Most recent linked invoice, if any.
    pub current_invoice: Option<&'a Invoice>,
    pub grace_period_days: i32,
    pub cancel_after_grace: bool,
}

fn invoice_past_due(invoice: &Invoice, today: NaiveDate) -> bool {
    !invoice.is_paid() && today > invoice.due_date
}

fn past_grace_period(invoice: &Invoice, grace_period_days: i32, today: NaiveDate) -> bool {
    invoice_past_due(invoice, today)
        && today > invoice.due_date + Days::new(grace_period_days.max(0) as u64)
}

/// Derives the status a subscription should hold as of `today`.
/// Cancelled subscriptions never reach this function.
pub fn derive_status(
    sub: &Subscription,
    facts: &StatusFacts<'_>,
    today: NaiveDate,
) -> SubscriptionStatus {
    if is_trialling(sub, today, facts.is_new) {
        return SubscriptionStatus::Trialling;
    }

    if sub.status() == SubscriptionStatus::Active {
        if let Some(end_date) = sub.end_date {
            if today > end_date {
                return SubscriptionStatus::Completed;
            }
        }
    }

    if let Some(invoice) = facts.current_invoice {
        if past_grace_period(invoice, facts.grace_period_days, today) {
            return if facts.cancel_after_grace {
                SubscriptionStatus::Cancelled
            } else {
                SubscriptionStatus::Unpaid
            };
        }
        if invoice_past_due(invoice, today) {
            return SubscriptionStatus::PastDueDate;
        }
    }

    if !facts.has_outstanding {
        return SubscriptionStatus::Active;
    }

    if facts.is_new {
        return SubscriptionStatus::Active;
    }

    sub.status()
}
