//! Subscription lifecycle orchestration: create, tick, cancel,
//! restart, and the bulk sweep.

use chrono::{Days, NaiveDate};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::error::BillingError;
use crate::models::{
    CreateSubscription, Invoice, InvoiceDraft, InvoiceLine, PlanItem, Subscription,
    SubscriptionStatus,
};
use crate::services::collaborators::{
    InvoiceStore, PlanCatalog, SettingsProvider, SubscriptionStore,
};
use crate::services::metrics::{record_invoice_generated, record_sweep_tick};

use super::cycle::{resolve_billing_cycle, BillingCycle};
use super::period::{advance_period, compute_period, is_trialling, BillingPeriod};
use super::policy::{is_current_invoice_generated, proration_factor, should_generate_invoice};
use super::status::{derive_status, StatusFacts};
use super::validate::{validate_calendar_months, validate_end_date, validate_trial_window};

/// Result of processing one subscription at one date.
#[derive(Debug, Clone, Serialize)]
pub struct TickOutcome {
    pub subscription_id: Uuid,
    pub invoice_id: Option<Uuid>,
    pub status: SubscriptionStatus,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
}

/// Result of a bulk sweep over all non-cancelled subscriptions.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct SweepSummary {
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Drives subscription billing against its collaborators. `today`
/// always arrives as an argument, so backfills and tests can run any
/// date deterministically.
pub struct SubscriptionProcessor<S, P, I, G> {
    store: S,
    plans: P,
    invoices: I,
    settings: G,
}

impl<S, P, I, G> SubscriptionProcessor<S, P, I, G>
where
    S: SubscriptionStore,
    P: PlanCatalog,
    I: InvoiceStore,
    G: SettingsProvider,
{
    pub fn new(store: S, plans: P, invoices: I, settings: G) -> Self {
        SubscriptionProcessor {
            store,
            plans,
            invoices,
            settings,
        }
    }

    async fn cycle_for(&self, items: &[PlanItem]) -> Result<Option<BillingCycle>, BillingError> {
        let mut cycles = Vec::with_capacity(items.len());
        for item in items {
            cycles.push(self.plans.billing_terms(item.plan_id).await?);
        }
        resolve_billing_cycle(&cycles)
    }

    /// Validates and persists a new subscription with its first
    /// billing period and status.
    #[tracing::instrument(skip(self, input), fields(customer_id = %input.customer_id))]
    pub async fn create_subscription(
        &self,
        input: &CreateSubscription,
        today: NaiveDate,
    ) -> Result<Subscription, BillingError> {
        if input.plans.is_empty() {
            return Err(BillingError::Configuration(
                "a subscription needs at least one plan".to_string(),
            ));
        }

        let mut sub = Subscription::from_create(input);
        validate_trial_window(&sub)?;

        let items: Vec<PlanItem> = input
            .plans
            .iter()
            .enumerate()
            .map(|(position, selection)| PlanItem {
                subscription_id: sub.subscription_id,
                plan_id: selection.plan_id,
                qty: selection.qty,
                position: position as i32,
            })
            .collect();
        let cycle = self.cycle_for(&items).await?;

        validate_calendar_months(&sub, cycle)?;
        validate_end_date(&sub, cycle)?;

        let period = compute_period(&sub, cycle, Some(sub.start_date), today, true);
        sub.current_invoice_start = period.start;
        sub.current_invoice_end = period.end;
        sub.set_status(if is_trialling(&sub, today, true) {
            SubscriptionStatus::Trialling
        } else {
            SubscriptionStatus::Active
        });

        self.store.insert(&sub, &items).await?;
        tracing::info!(
            subscription_id = %sub.subscription_id,
            status = %sub.status,
            period_start = %period.start,
            period_end = %period.end,
            "subscription created"
        );
        Ok(sub)
    }

    async fn create_invoice_for(
        &self,
        sub: &Subscription,
        items: &[PlanItem],
        from_date: NaiveDate,
        to_date: NaiveDate,
        posting_date: NaiveDate,
        today: NaiveDate,
        is_new: bool,
    ) -> Result<Invoice, BillingError> {
        // Proration runs over the full billing period even when the
        // invoice covers less of it, so the factor reflects how much
        // of the period was actually consumed.
        let prorate = self.settings.prorate_enabled().await?;
        let factor = if prorate {
            Some(proration_factor(
                sub.current_invoice_start,
                sub.current_invoice_end,
                today,
                sub.generate_invoice_at_period_start,
            ))
        } else {
            None
        };

        let mut lines = Vec::with_capacity(items.len());
        for item in items {
            let rate = self
                .plans
                .rate(
                    item.plan_id,
                    item.qty,
                    sub.customer_id,
                    from_date,
                    to_date,
                    factor,
                )
                .await?;
            lines.push(InvoiceLine {
                plan_id: item.plan_id,
                qty: item.qty,
                rate,
                amount: rate * item.qty,
            });
        }

        // A trial period bills at zero via a full discount so the
        // invoice trail still shows what was covered.
        let discount_percentage = if is_trialling(sub, today, is_new) {
            Some(Decimal::ONE_HUNDRED)
        } else {
            sub.additional_discount_percentage
        };

        let draft = InvoiceDraft {
            subscription_id: sub.subscription_id,
            customer_id: sub.customer_id,
            posting_date,
            due_date: posting_date + Days::new(sub.days_until_due.max(0) as u64),
            from_date,
            to_date,
            lines,
            discount_percentage,
            discount_amount: sub.additional_discount_amount,
            tax_template: sub.tax_template.clone(),
            submit: sub.submit_invoice,
        };
        let invoice = self.invoices.create(&draft).await?;
        record_invoice_generated();
        tracing::info!(
            subscription_id = %sub.subscription_id,
            invoice_id = %invoice.invoice_id,
            from_date = %from_date,
            to_date = %to_date,
            "invoice generated"
        );
        Ok(invoice)
    }

    /// Processes one subscription as of `today`: generates the period
    /// invoice when due, advances the billing window, and re-derives
    /// status. Nothing is persisted if invoice creation fails.
    #[tracing::instrument(skip(self), fields(subscription_id = %subscription_id, today = %today))]
    pub async fn process_tick(
        &self,
        subscription_id: Uuid,
        today: NaiveDate,
    ) -> Result<TickOutcome, BillingError> {
        let mut sub = self.store.get(subscription_id).await?;
        if sub.status() == SubscriptionStatus::Cancelled {
            return Ok(TickOutcome {
                subscription_id,
                invoice_id: None,
                status: SubscriptionStatus::Cancelled,
                period_start: sub.current_invoice_start,
                period_end: sub.current_invoice_end,
            });
        }

        let items = self.store.plan_items(subscription_id).await?;
        let cycle = self.cycle_for(&items).await?;
        let mut is_new = !self.invoices.exists_for(subscription_id).await?;
        let latest = self.invoices.latest(subscription_id).await?;
        let has_outstanding = self.invoices.has_outstanding(subscription_id).await?;

        let period = BillingPeriod {
            start: sub.current_invoice_start,
            end: sub.current_invoice_end,
        };
        let mut invoice_id = None;
        if !is_current_invoice_generated(latest.as_ref(), period)
            && should_generate_invoice(&sub, today, is_new, has_outstanding)
        {
            let posting_date = if sub.generate_invoice_at_period_start {
                period.start
            } else {
                period.end
            };
            let invoice = self
                .create_invoice_for(
                    &sub,
                    &items,
                    period.start,
                    period.end,
                    posting_date,
                    today,
                    is_new,
                )
                .await?;
            invoice_id = Some(invoice.invoice_id);
            is_new = false;

            let next = advance_period(&sub, cycle, today);
            sub.current_invoice_start = next.start;
            sub.current_invoice_end = next.end;
        }

        if today > sub.current_invoice_end {
            if let Some(end_date) = sub.end_date {
                if sub.cancel_at_period_end && today > end_date {
                    sub.set_status(SubscriptionStatus::Cancelled);
                    sub.cancelation_date = Some(today);
                }
            }
        }

        if sub.status() != SubscriptionStatus::Cancelled {
            let latest = self.invoices.latest(subscription_id).await?;
            let has_outstanding = self.invoices.has_outstanding(subscription_id).await?;
            let facts = StatusFacts {
                is_new,
                has_outstanding,
                current_invoice: latest.as_ref(),
                grace_period_days: self.settings.grace_period_days().await?,
                cancel_after_grace: self.settings.cancel_after_grace().await?,
            };
            let status = derive_status(&sub, &facts, today);
            if status == SubscriptionStatus::Cancelled {
                sub.cancelation_date = Some(today);
            }
            sub.set_status(status);
        }

        self.store.update(&sub).await?;
        Ok(TickOutcome {
            subscription_id,
            invoice_id,
            status: sub.status(),
            period_start: sub.current_invoice_start,
            period_end: sub.current_invoice_end,
        })
    }

    /// Cancels a subscription as of `today`. An active postpaid
    /// subscription gets a final invoice covering the consumed part of
    /// the current period.
    #[tracing::instrument(skip(self), fields(subscription_id = %subscription_id, today = %today))]
    pub async fn cancel(
        &self,
        subscription_id: Uuid,
        today: NaiveDate,
    ) -> Result<Subscription, BillingError> {
        let mut sub = self.store.get(subscription_id).await?;
        if sub.status() == SubscriptionStatus::Cancelled {
            return Ok(sub);
        }

        let needs_final_invoice =
            sub.status() == SubscriptionStatus::Active && !sub.generate_invoice_at_period_start;
        let from_date = sub.current_invoice_start;

        sub.set_status(SubscriptionStatus::Cancelled);
        sub.cancelation_date = Some(today);

        if needs_final_invoice {
            let items = self.store.plan_items(subscription_id).await?;
            self.create_invoice_for(&sub, &items, from_date, today, today, today, false)
                .await?;
        }

        self.store.update(&sub).await?;
        tracing::info!(subscription_id = %subscription_id, "subscription cancelled");
        Ok(sub)
    }

    /// Restarts a cancelled subscription from `today`. Previous
    /// invoices are unlinked so the new run bills from scratch.
    #[tracing::instrument(skip(self), fields(subscription_id = %subscription_id, today = %today))]
    pub async fn restart(
        &self,
        subscription_id: Uuid,
        today: NaiveDate,
    ) -> Result<Subscription, BillingError> {
        let mut sub = self.store.get(subscription_id).await?;
        if sub.status() != SubscriptionStatus::Cancelled {
            return Err(BillingError::PolicyViolation(
                "only a cancelled subscription can be restarted".to_string(),
            ));
        }

        self.invoices.unlink(subscription_id).await?;

        sub.cancelation_date = None;
        sub.start_date = today;
        let items = self.store.plan_items(subscription_id).await?;
        let cycle = self.cycle_for(&items).await?;
        let period = compute_period(&sub, cycle, Some(today), today, true);
        sub.current_invoice_start = period.start;
        sub.current_invoice_end = period.end;
        sub.set_status(SubscriptionStatus::Active);

        self.store.update(&sub).await?;
        tracing::info!(subscription_id = %subscription_id, "subscription restarted");
        Ok(sub)
    }

    /// Processes every non-cancelled subscription. One failing
    /// subscription is logged and counted without stopping the sweep.
    #[tracing::instrument(skip(self), fields(today = %today))]
    pub async fn process_all(&self, today: NaiveDate) -> Result<SweepSummary, BillingError> {
        let ids = self.store.ids_excluding_cancelled().await?;
        let mut summary = SweepSummary {
            processed: ids.len(),
            succeeded: 0,
            failed: 0,
        };
        for id in ids {
            match self.process_tick(id, today).await {
                Ok(_) => {
                    summary.succeeded += 1;
                    record_sweep_tick("ok");
                }
                Err(error) => {
                    summary.failed += 1;
                    record_sweep_tick("error");
                    tracing::error!(
                        subscription_id = %id,
                        error = %error,
                        "failed to process subscription"
                    );
                }
            }
        }
        tracing::info!(
            processed = summary.processed,
            succeeded = summary.succeeded,
            failed = summary.failed,
            "subscription sweep finished"
        );
        Ok(summary)
    }
}
