//! Billing cycle resolution and interval arithmetic.

use chrono::{Datelike, Days, Months, NaiveDate};

use crate::error::BillingError;
use crate::models::BillingInterval;

/// A billing cadence: the interval unit and how many of them make one
/// period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BillingCycle {
    pub interval: BillingInterval,
    pub interval_count: i32,
}

impl BillingCycle {
    /// End of the period that begins at `start`.
    ///
    /// Day and week periods are inclusive spans, so a 1-day period
    /// ends on its own start date. Month and year periods land on the
    /// same day-of-month `interval_count` months later, clamped to the
    /// last day when the target month is shorter.
    pub fn period_end_from(&self, start: NaiveDate) -> NaiveDate {
        let count = self.interval_count as u32;
        match self.interval {
            BillingInterval::Day => start + Days::new(count as u64 - 1),
            BillingInterval::Week => start + Days::new(count as u64 * 7 - 1),
            BillingInterval::Month => start + Months::new(count),
            BillingInterval::Year => start + Months::new(count * 12),
        }
    }
}

/// Last day of the month containing `date`.
pub fn last_day_of_month(date: NaiveDate) -> NaiveDate {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    // The first of a month always exists.
    NaiveDate::from_ymd_opt(year, month, 1).expect("first of month is a valid date")
        - Days::new(1)
}

/// Resolves a subscription's single billing cycle from its plans'
/// billing terms. All plans on one subscription must agree; a
/// subscription with no plans bills to the end of the calendar month
/// and resolves to `None`.
pub fn resolve_billing_cycle(
    cycles: &[BillingCycle],
) -> Result<Option<BillingCycle>, BillingError> {
    for cycle in cycles {
        if cycle.interval_count < 1 {
            return Err(BillingError::Configuration(format!(
                "billing interval count must be at least 1, got {}",
                cycle.interval_count
            )));
        }
    }
    let mut resolved: Option<BillingCycle> = None;
    for cycle in cycles {
        match resolved {
            None => resolved = Some(*cycle),
            Some(existing) if existing != *cycle => {
                return Err(BillingError::Configuration(
                    "all plans on a subscription must share the same billing interval and count"
                        .to_string(),
                ));
            }
            Some(_) => {}
        }
    }
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn cycle(interval: BillingInterval, count: i32) -> BillingCycle {
        BillingCycle {
            interval,
            interval_count: count,
        }
    }

    #[test]
    fn month_period_clamps_to_short_months() {
        let monthly = cycle(BillingInterval::Month, 1);
        assert_eq!(monthly.period_end_from(d(2024, 1, 31)), d(2024, 2, 29));
        assert_eq!(monthly.period_end_from(d(2023, 1, 31)), d(2023, 2, 28));
        assert_eq!(monthly.period_end_from(d(2024, 3, 15)), d(2024, 4, 15));
    }

    #[test]
    fn day_and_week_periods_are_inclusive() {
        assert_eq!(
            cycle(BillingInterval::Day, 10).period_end_from(d(2024, 1, 1)),
            d(2024, 1, 10)
        );
        assert_eq!(
            cycle(BillingInterval::Day, 1).period_end_from(d(2024, 1, 1)),
            d(2024, 1, 1)
        );
        assert_eq!(
            cycle(BillingInterval::Week, 2).period_end_from(d(2024, 1, 1)),
            d(2024, 1, 14)
        );
    }

    #[test]
    fn year_period_is_twelve_months_per_count() {
        assert_eq!(
            cycle(BillingInterval::Year, 1).period_end_from(d(2024, 2, 29)),
            d(2025, 2, 28)
        );
    }

    #[test]
    fn last_day_of_month_handles_december() {
        assert_eq!(last_day_of_month(d(2024, 12, 5)), d(2024, 12, 31));
        assert_eq!(last_day_of_month(d(2024, 2, 1)), d(2024, 2, 29));
    }

    #[test]
    fn resolve_rejects_mixed_cycles() {
        let cycles = [
            cycle(BillingInterval::Month, 1),
            cycle(BillingInterval::Month, 3),
        ];
        assert!(matches!(
            resolve_billing_cycle(&cycles),
            Err(BillingError::Configuration(_))
        ));
    }

    #[test]
    fn resolve_rejects_nonpositive_count() {
        let cycles = [cycle(BillingInterval::Month, 0)];
        assert!(matches!(
            resolve_billing_cycle(&cycles),
            Err(BillingError::Configuration(_))
        ));
    }

    #[test]
    fn resolve_accepts_agreeing_cycles_and_empty() {
        let cycles = [
            cycle(BillingInterval::Week, 2),
            cycle(BillingInterval::Week, 2),
        ];
        assert_eq!(
            resolve_billing_cycle(&cycles).unwrap(),
            Some(cycle(BillingInterval::Week, 2))
        );
        assert_eq!(resolve_billing_cycle(&[]).unwrap(), None);
    }
}
