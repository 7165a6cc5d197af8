//! Creation-time validation of subscription configuration.

use crate::error::BillingError;
use crate::models::{BillingInterval, Subscription};

use super::cycle::BillingCycle;

pub fn validate_trial_window(sub: &Subscription) -> Result<(), BillingError> {
    match (sub.trial_period_start, sub.trial_period_end) {
        (None, None) => Ok(()),
        (Some(start), Some(end)) => {
            if end < start {
                return Err(BillingError::Configuration(
                    "trial period end cannot precede trial period start".to_string(),
                ));
            }
            if start > sub.start_date {
                return Err(BillingError::Configuration(
                    "trial period start cannot be after the subscription start date".to_string(),
                ));
            }
            Ok(())
        }
        _ => Err(BillingError::Configuration(
            "trial period start and end must both be set or both be empty".to_string(),
        )),
    }
}

pub fn validate_calendar_months(
    sub: &Subscription,
    cycle: Option<BillingCycle>,
) -> Result<(), BillingError> {
    if !sub.follow_calendar_months {
        return Ok(());
    }
    if sub.end_date.is_none() {
        return Err(BillingError::Configuration(
            "calendar month alignment requires an end date".to_string(),
        ));
    }
    match cycle {
        Some(cycle) if cycle.interval == BillingInterval::Month => Ok(()),
        _ => Err(BillingError::Configuration(
            "calendar month alignment requires a monthly billing interval".to_string(),
        )),
    }
}

pub fn validate_end_date(
    sub: &Subscription,
    cycle: Option<BillingCycle>,
) -> Result<(), BillingError> {
    let (Some(end_date), Some(cycle)) = (sub.end_date, cycle) else {
        return Ok(());
    };
    if end_date <= cycle.period_end_from(sub.start_date) {
        return Err(BillingError::Configuration(
            "subscription end date must fall after the first billing period".to_string(),
        ));
    }
    Ok(())
}
