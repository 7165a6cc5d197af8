//! Billing period computation: trial overlay, cycle arithmetic,
//! calendar-month alignment, and end-date clamping.

use chrono::{Datelike, Days, NaiveDate};

use crate::models::{BillingInterval, Subscription};

use super::cycle::{last_day_of_month, BillingCycle};

/// One billing period, both endpoints inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BillingPeriod {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// A subscription is trialling while it has not billed yet and today
/// falls on or before the trial end.
pub fn is_trialling(sub: &Subscription, today: NaiveDate, is_new: bool) -> bool {
    is_new && sub.trial_period_end.map_or(false, |end| today <= end)
}

fn period_start(
    sub: &Subscription,
    as_of: Option<NaiveDate>,
    today: NaiveDate,
    is_new: bool,
) -> NaiveDate {
    if is_new {
        if let Some(trial_end) = sub.trial_period_end {
            if trial_end > sub.start_date {
                return trial_end + Days::new(1);
            }
        }
    }
    if let Some(trial_start) = sub.trial_period_start {
        if is_trialling(sub, today, is_new) {
            return trial_start;
        }
    }
    as_of.unwrap_or(today)
}

fn period_end(
    sub: &Subscription,
    cycle: Option<BillingCycle>,
    start: NaiveDate,
    today: NaiveDate,
    is_new: bool,
) -> NaiveDate {
    if let Some(trial_end) = sub.trial_period_end {
        if is_trialling(sub, today, is_new) && start < trial_end {
            return clamp_to_end_date(sub, trial_end);
        }
    }

    let mut end = match cycle {
        Some(cycle) => {
            let mut end = cycle.period_end_from(start);
            if is_new && sub.start_date < start {
                // A trial pushed the billable start forward; keep the
                // cadence anchored on the subscription start when the
                // anchored end still covers this period.
                let from_start = cycle.period_end_from(sub.start_date);
                if from_start >= start {
                    end = from_start;
                }
            }
            end
        }
        None => last_day_of_month(start),
    };

    if sub.follow_calendar_months {
        if let Some(cycle) = cycle {
            if cycle.interval == BillingInterval::Month {
                end = snap_to_calendar_month(end, cycle.interval_count, start);
            }
        }
    }

    clamp_to_end_date(sub, end)
}

fn clamp_to_end_date(sub: &Subscription, end: NaiveDate) -> NaiveDate {
    match sub.end_date {
        Some(sub_end) if end > sub_end => sub_end,
        _ => end,
    }
}

/// Pulls a monthly period end back to the close of the nearest
/// calendar boundary month, so N-month periods line up with calendar
/// quarters, halves, or years.
fn snap_to_calendar_month(end: NaiveDate, interval_count: i32, period_start: NaiveDate) -> NaiveDate {
    let mut boundary = interval_count;
    let mut calendar_month = interval_count.min(12);
    while boundary <= 12 {
        if boundary <= end.month() as i32 {
            calendar_month = boundary;
        }
        boundary += interval_count;
    }

    let mut year = end.year();
    if calendar_month - interval_count <= 0 && period_start.month() != 1 {
        calendar_month = 12;
        year -= 1;
    }

    let anchor = NaiveDate::from_ymd_opt(year, calendar_month as u32, 1)
        .expect("first of month is a valid date");
    last_day_of_month(anchor)
}

/// Computes the billing period in effect at `as_of` (or `today` when
/// `as_of` is `None`). `is_new` marks a subscription that has never
/// billed, which is when trial overlays apply.
pub fn compute_period(
    sub: &Subscription,
    cycle: Option<BillingCycle>,
    as_of: Option<NaiveDate>,
    today: NaiveDate,
    is_new: bool,
) -> BillingPeriod {
    let start = period_start(sub, as_of, today, is_new);
    let end = period_end(sub, cycle, start, today, is_new);
    BillingPeriod { start, end }
}

/// The period immediately after the current one.
pub fn advance_period(
    sub: &Subscription,
    cycle: Option<BillingCycle>,
    today: NaiveDate,
) -> BillingPeriod {
    let next_start = sub.current_invoice_end + Days::new(1);
    compute_period(sub, cycle, Some(next_start), today, false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CreateSubscription, SubscriptionStatus};
    use uuid::Uuid;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn sub_starting(start: NaiveDate) -> Subscription {
        let input = CreateSubscription {
            customer_id: Uuid::new_v4(),
            plans: vec![],
            start_date: start,
            end_date: None,
            trial_period_start: None,
            trial_period_end: None,
            cancel_at_period_end: false,
            generate_invoice_at_period_start: false,
            generate_new_invoices_past_due_date: false,
            follow_calendar_months: false,
            additional_discount_percentage: None,
            additional_discount_amount: None,
            days_until_due: 0,
            tax_template: None,
            submit_invoice: false,
        };
        let mut sub = Subscription::from_create(&input);
        sub.set_status(SubscriptionStatus::Active);
        sub
    }

    fn monthly(count: i32) -> Option<BillingCycle> {
        Some(BillingCycle {
            interval: BillingInterval::Month,
            interval_count: count,
        })
    }

    #[test]
    fn trial_window_covers_period_while_trialling() {
        let mut sub = sub_starting(d(2024, 1, 31));
        sub.trial_period_start = Some(d(2024, 1, 1));
        sub.trial_period_end = Some(d(2024, 1, 31));
        let period = compute_period(&sub, monthly(1), Some(d(2024, 1, 31)), d(2024, 1, 15), true);
        assert_eq!(period.start, d(2024, 1, 1));
        assert_eq!(period.end, d(2024, 1, 31));
    }

    #[test]
    fn billable_period_starts_after_trial_end() {
        let mut sub = sub_starting(d(2024, 1, 10));
        sub.trial_period_start = Some(d(2024, 1, 1));
        sub.trial_period_end = Some(d(2024, 1, 31));
        let period = compute_period(&sub, monthly(1), Some(d(2024, 1, 10)), d(2024, 1, 15), true);
        assert_eq!(period.start, d(2024, 2, 1));
        assert_eq!(period.end, d(2024, 2, 10));
    }

    #[test]
    fn no_cycle_bills_to_calendar_month_end() {
        let sub = sub_starting(d(2024, 4, 10));
        let period = compute_period(&sub, None, Some(d(2024, 4, 10)), d(2024, 4, 10), true);
        assert_eq!(period.end, d(2024, 4, 30));
    }

    #[test]
    fn calendar_months_snap_quarterly_end() {
        let mut sub = sub_starting(d(2024, 5, 10));
        sub.follow_calendar_months = true;
        sub.end_date = Some(d(2026, 1, 1));
        let period = compute_period(&sub, monthly(3), Some(d(2024, 5, 10)), d(2024, 5, 10), true);
        assert_eq!(period.end, d(2024, 6, 30));
    }

    #[test]
    fn calendar_months_snap_rolls_back_before_first_boundary() {
        let mut sub = sub_starting(d(2024, 11, 10));
        sub.follow_calendar_months = true;
        sub.end_date = Some(d(2026, 1, 1));
        let period = compute_period(&sub, monthly(3), Some(d(2024, 11, 10)), d(2024, 11, 10), true);
        assert_eq!(period.end, d(2024, 12, 31));
    }

    #[test]
    fn period_end_never_exceeds_end_date() {
        let mut sub = sub_starting(d(2024, 1, 1));
        sub.end_date = Some(d(2024, 1, 20));
        let period = compute_period(&sub, monthly(1), Some(d(2024, 1, 1)), d(2024, 1, 1), true);
        assert_eq!(period.end, d(2024, 1, 20));
    }
}
