//! Status derivation across the grace period and lifecycle edges.

mod common;

use chrono::{NaiveDate, Utc};
use common::{create_input, d};
use subscription_service::engine::{derive_status, StatusFacts};
use subscription_service::models::{
    Invoice, InvoiceStatus, Subscription, SubscriptionStatus,
};
use uuid::Uuid;

fn active_sub(start: NaiveDate) -> Subscription {
    let input = create_input(Uuid::new_v4(), start);
    Subscription::from_create(&input)
}

fn invoice(due_date: NaiveDate, status: InvoiceStatus) -> Invoice {
    Invoice {
        invoice_id: Uuid::new_v4(),
        subscription_id: Uuid::new_v4(),
        customer_id: Uuid::new_v4(),
        posting_date: due_date,
        due_date,
        from_date: due_date,
        to_date: due_date,
        status: status.as_str().to_string(),
        total: Default::default(),
        discount_percentage: None,
        discount_amount: None,
        tax_template: None,
        is_submitted: false,
        created_utc: Utc::now(),
    }
}

fn facts<'a>(inv: Option<&'a Invoice>, grace_days: i32, cancel_after: bool) -> StatusFacts<'a> {
    StatusFacts {
        is_new: false,
        has_outstanding: inv.map_or(false, |i| !i.is_paid()),
        current_invoice: inv,
        grace_period_days: grace_days,
        cancel_after_grace: cancel_after,
    }
}

#[test]
fn unpaid_invoice_before_due_date_keeps_subscription_active() {
    let sub = active_sub(d(2024, 1, 1));
    let inv = invoice(d(2024, 2, 1), InvoiceStatus::Unpaid);

    let status = derive_status(&sub, &facts(Some(&inv), 5, false), d(2024, 1, 30));
    assert_eq!(status, SubscriptionStatus::Active);
}

#[test]
fn overdue_invoice_within_grace_is_past_due() {
    let sub = active_sub(d(2024, 1, 1));
    let inv = invoice(d(2024, 2, 1), InvoiceStatus::Unpaid);

    assert_eq!(
        derive_status(&sub, &facts(Some(&inv), 5, false), d(2024, 2, 2)),
        SubscriptionStatus::PastDueDate
    );
    // The last day of grace still counts as within it.
    assert_eq!(
        derive_status(&sub, &facts(Some(&inv), 5, false), d(2024, 2, 6)),
        SubscriptionStatus::PastDueDate
    );
}

#[test]
fn lapsed_grace_marks_unpaid_or_cancels_per_settings() {
    let sub = active_sub(d(2024, 1, 1));
    let inv = invoice(d(2024, 2, 1), InvoiceStatus::Unpaid);

    assert_eq!(
        derive_status(&sub, &facts(Some(&inv), 5, false), d(2024, 2, 7)),
        SubscriptionStatus::Unpaid
    );
    assert_eq!(
        derive_status(&sub, &facts(Some(&inv), 5, true), d(2024, 2, 7)),
        SubscriptionStatus::Cancelled
    );
}

#[test]
fn trial_takes_precedence_over_overdue_invoices() {
    let mut sub = active_sub(d(2024, 1, 1));
    sub.trial_period_start = Some(d(2024, 1, 1));
    sub.trial_period_end = Some(d(2024, 3, 1));
    let inv = invoice(d(2024, 1, 15), InvoiceStatus::Unpaid);

    let mut f = facts(Some(&inv), 0, true);
    f.is_new = true;

    assert_eq!(
        derive_status(&sub, &f, d(2024, 2, 1)),
        SubscriptionStatus::Trialling
    );
}

#[test]
fn active_subscription_past_end_date_completes() {
    let mut sub = active_sub(d(2024, 1, 1));
    sub.end_date = Some(d(2024, 6, 30));
    let inv = invoice(d(2024, 6, 1), InvoiceStatus::Paid);

    assert_eq!(
        derive_status(&sub, &facts(Some(&inv), 5, false), d(2024, 7, 1)),
        SubscriptionStatus::Completed
    );
}

#[test]
fn settled_invoices_return_subscription_to_active() {
    let mut sub = active_sub(d(2024, 1, 1));
    sub.set_status(SubscriptionStatus::PastDueDate);
    let inv = invoice(d(2024, 2, 1), InvoiceStatus::Paid);

    assert_eq!(
        derive_status(&sub, &facts(Some(&inv), 5, false), d(2024, 2, 10)),
        SubscriptionStatus::Active
    );
}

#[test]
fn unresolved_facts_preserve_previous_status() {
    let mut sub = active_sub(d(2024, 1, 1));
    sub.set_status(SubscriptionStatus::PastDueDate);

    let f = StatusFacts {
        is_new: false,
        has_outstanding: true,
        current_invoice: None,
        grace_period_days: 5,
        cancel_after_grace: false,
    };

    assert_eq!(
        derive_status(&sub, &f, d(2024, 2, 10)),
        SubscriptionStatus::PastDueDate
    );
}
