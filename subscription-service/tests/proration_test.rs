//! Proration math and prorated invoice totals.

mod common;

use common::{create_input, d, World};
use rust_decimal::Decimal;
use subscription_service::engine::proration_factor;
use subscription_service::models::BillingInterval;

#[test]
fn factor_counts_days_inclusively() {
    let factor = proration_factor(d(2024, 1, 1), d(2024, 1, 31), d(2024, 1, 10), false);
    assert_eq!(factor, Decimal::from(10) / Decimal::from(31));
}

#[test]
fn prepaid_periods_never_prorate() {
    let factor = proration_factor(d(2024, 1, 1), d(2024, 1, 31), d(2024, 1, 10), true);
    assert_eq!(factor, Decimal::ONE);
}

#[test]
fn single_day_period_is_whole() {
    let factor = proration_factor(d(2024, 1, 1), d(2024, 1, 1), d(2024, 1, 1), false);
    assert_eq!(factor, Decimal::ONE);
}

#[tokio::test]
async fn cancellation_mid_period_prorates_the_final_invoice() {
    let world = World::new();
    world.set_prorate(true);
    let plan = world.add_plan(BillingInterval::Day, 10, Decimal::from(100));
    let input = create_input(plan, d(2024, 1, 1));
    let processor = world.processor();

    let sub = processor
        .create_subscription(&input, d(2024, 1, 1))
        .await
        .unwrap();
    processor
        .cancel(sub.subscription_id, d(2024, 1, 5))
        .await
        .unwrap();

    let invoices = world.invoices_for(sub.subscription_id);
    assert_eq!(invoices.len(), 1);
    assert_eq!(invoices[0].from_date, d(2024, 1, 1));
    assert_eq!(invoices[0].to_date, d(2024, 1, 5));
    // 5 of 10 days consumed.
    assert_eq!(invoices[0].total, Decimal::from(50));
}

#[tokio::test]
async fn full_period_invoice_bills_the_whole_rate_with_proration_on() {
    let world = World::new();
    world.set_prorate(true);
    let plan = world.add_plan(BillingInterval::Day, 10, Decimal::from(100));
    let input = create_input(plan, d(2024, 1, 1));
    let processor = world.processor();

    let sub = processor
        .create_subscription(&input, d(2024, 1, 1))
        .await
        .unwrap();
    let outcome = processor
        .process_tick(sub.subscription_id, d(2024, 1, 10))
        .await
        .unwrap();

    assert!(outcome.invoice_id.is_some());
    let invoices = world.invoices_for(sub.subscription_id);
    assert_eq!(invoices[0].total, Decimal::from(100));
}
