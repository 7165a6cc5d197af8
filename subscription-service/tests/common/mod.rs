//! In-memory collaborators for driving the billing engine in tests.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use subscription_service::engine::cycle::BillingCycle;
use subscription_service::engine::SubscriptionProcessor;
use subscription_service::error::BillingError;
use subscription_service::models::{
    BillingInterval, CreateSubscription, Invoice, InvoiceDraft, InvoiceStatus, PlanItem,
    PlanSelection, Subscription,
};
use subscription_service::services::collaborators::{
    InvoiceStore, PlanCatalog, SettingsProvider, SubscriptionStore,
};

pub fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

struct StoredPlan {
    cycle: BillingCycle,
    price: Decimal,
}

#[derive(Default)]
struct Inner {
    plans: Mutex<HashMap<Uuid, StoredPlan>>,
    subscriptions: Mutex<HashMap<Uuid, Subscription>>,
    plan_items: Mutex<HashMap<Uuid, Vec<PlanItem>>>,
    invoices: Mutex<Vec<Invoice>>,
    grace_period_days: Mutex<i32>,
    cancel_after_grace: Mutex<bool>,
    prorate: Mutex<bool>,
    fail_invoice_for: Mutex<Option<Uuid>>,
}

/// Shared in-memory world implementing every collaborator trait.
#[derive(Clone, Default)]
pub struct World {
    inner: Arc<Inner>,
}

impl World {
    pub fn new() -> Self {
        World::default()
    }

    pub fn processor(&self) -> SubscriptionProcessor<World, World, World, World> {
        SubscriptionProcessor::new(self.clone(), self.clone(), self.clone(), self.clone())
    }

    pub fn add_plan(&self, interval: BillingInterval, count: i32, price: Decimal) -> Uuid {
        let plan_id = Uuid::new_v4();
        self.inner.plans.lock().unwrap().insert(
            plan_id,
            StoredPlan {
                cycle: BillingCycle {
                    interval,
                    interval_count: count,
                },
                price,
            },
        );
        plan_id
    }

    pub fn monthly_plan(&self, price: Decimal) -> Uuid {
        self.add_plan(BillingInterval::Month, 1, price)
    }

    pub fn subscription(&self, id: Uuid) -> Subscription {
        self.inner
            .subscriptions
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .expect("subscription should exist")
    }

    pub fn invoices_for(&self, subscription_id: Uuid) -> Vec<Invoice> {
        self.inner
            .invoices
            .lock()
            .unwrap()
            .iter()
            .filter(|invoice| invoice.subscription_id == subscription_id)
            .cloned()
            .collect()
    }

    pub fn mark_all_paid(&self, subscription_id: Uuid) {
        for invoice in self.inner.invoices.lock().unwrap().iter_mut() {
            if invoice.subscription_id == subscription_id {
                invoice.status = InvoiceStatus::Paid.as_str().to_string();
            }
        }
    }

    pub fn set_grace(&self, days: i32, cancel_after_grace: bool) {
        *self.inner.grace_period_days.lock().unwrap() = days;
        *self.inner.cancel_after_grace.lock().unwrap() = cancel_after_grace;
    }

    pub fn set_prorate(&self, prorate: bool) {
        *self.inner.prorate.lock().unwrap() = prorate;
    }

    /// The next invoice creation for this subscription fails.
    pub fn fail_next_invoice_for(&self, subscription_id: Uuid) {
        *self.inner.fail_invoice_for.lock().unwrap() = Some(subscription_id);
    }
}

/// Creation input with library defaults; tests tweak fields as needed.
pub fn create_input(plan_id: Uuid, start: NaiveDate) -> CreateSubscription {
    CreateSubscription {
        customer_id: Uuid::new_v4(),
        plans: vec![PlanSelection {
            plan_id,
            qty: Decimal::ONE,
        }],
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
    }
}

#[async_trait]
impl PlanCatalog for World {
    async fn billing_terms(&self, plan_id: Uuid) -> Result<BillingCycle, BillingError> {
        let plans = self.inner.plans.lock().unwrap();
        plans
            .get(&plan_id)
            .map(|plan| plan.cycle)
            .ok_or_else(|| BillingError::NotFound(format!("Plan {} not found", plan_id)))
    }

    async fn rate(
        &self,
        plan_id: Uuid,
        _qty: Decimal,
        _customer_id: Uuid,
        _period_start: NaiveDate,
        _period_end: NaiveDate,
        proration_factor: Option<Decimal>,
    ) -> Result<Decimal, BillingError> {
        let plans = self.inner.plans.lock().unwrap();
        let price = plans
            .get(&plan_id)
            .map(|plan| plan.price)
            .ok_or_else(|| BillingError::NotFound(format!("Plan {} not found", plan_id)))?;
        Ok(match proration_factor {
            Some(factor) => price * factor,
            None => price,
        })
    }
}

#[async_trait]
impl InvoiceStore for World {
    async fn create(&self, draft: &InvoiceDraft) -> Result<Invoice, BillingError> {
        let mut fail_for = self.inner.fail_invoice_for.lock().unwrap();
        if *fail_for == Some(draft.subscription_id) {
            *fail_for = None;
            return Err(BillingError::Collaborator(anyhow::anyhow!(
                "invoice backend unavailable"
            )));
        }
        drop(fail_for);

        let invoice = Invoice {
            invoice_id: Uuid::new_v4(),
            subscription_id: draft.subscription_id,
            customer_id: draft.customer_id,
            posting_date: draft.posting_date,
            due_date: draft.due_date,
            from_date: draft.from_date,
            to_date: draft.to_date,
            status: InvoiceStatus::Unpaid.as_str().to_string(),
            total: draft.net_total(),
            discount_percentage: draft.discount_percentage,
            discount_amount: draft.discount_amount,
            tax_template: draft.tax_template.clone(),
            is_submitted: draft.submit,
            created_utc: Utc::now(),
        };
        self.inner.invoices.lock().unwrap().push(invoice.clone());
        Ok(invoice)
    }

    async fn latest(&self, subscription_id: Uuid) -> Result<Option<Invoice>, BillingError> {
        let invoices = self.inner.invoices.lock().unwrap();
        Ok(invoices
            .iter()
            .filter(|invoice| invoice.subscription_id == subscription_id)
            .max_by_key(|invoice| invoice.to_date)
            .cloned())
    }

    async fn has_outstanding(&self, subscription_id: Uuid) -> Result<bool, BillingError> {
        let invoices = self.inner.invoices.lock().unwrap();
        Ok(invoices
            .iter()
            .any(|invoice| invoice.subscription_id == subscription_id && !invoice.is_paid()))
    }

    async fn exists_for(&self, subscription_id: Uuid) -> Result<bool, BillingError> {
        let invoices = self.inner.invoices.lock().unwrap();
        Ok(invoices
            .iter()
            .any(|invoice| invoice.subscription_id == subscription_id))
    }

    async fn unlink(&self, subscription_id: Uuid) -> Result<(), BillingError> {
        self.inner
            .invoices
            .lock()
            .unwrap()
            .retain(|invoice| invoice.subscription_id != subscription_id);
        Ok(())
    }
}

#[async_trait]
impl SettingsProvider for World {
    async fn grace_period_days(&self) -> Result<i32, BillingError> {
        Ok(*self.inner.grace_period_days.lock().unwrap())
    }

    async fn cancel_after_grace(&self) -> Result<bool, BillingError> {
        Ok(*self.inner.cancel_after_grace.lock().unwrap())
    }

    async fn prorate_enabled(&self) -> Result<bool, BillingError> {
        Ok(*self.inner.prorate.lock().unwrap())
    }
}

#[async_trait]
impl SubscriptionStore for World {
    async fn insert(&self, sub: &Subscription, items: &[PlanItem]) -> Result<(), BillingError> {
        self.inner
            .subscriptions
            .lock()
            .unwrap()
            .insert(sub.subscription_id, sub.clone());
        self.inner
            .plan_items
            .lock()
            .unwrap()
            .insert(sub.subscription_id, items.to_vec());
        Ok(())
    }

    async fn get(&self, subscription_id: Uuid) -> Result<Subscription, BillingError> {
        self.inner
            .subscriptions
            .lock()
            .unwrap()
            .get(&subscription_id)
            .cloned()
            .ok_or_else(|| {
                BillingError::NotFound(format!("Subscription {} not found", subscription_id))
            })
    }

    async fn plan_items(&self, subscription_id: Uuid) -> Result<Vec<PlanItem>, BillingError> {
        Ok(self
            .inner
            .plan_items
            .lock()
            .unwrap()
            .get(&subscription_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn update(&self, sub: &Subscription) -> Result<(), BillingError> {
        self.inner
            .subscriptions
            .lock()
            .unwrap()
            .insert(sub.subscription_id, sub.clone());
        Ok(())
    }

    async fn ids_excluding_cancelled(&self) -> Result<Vec<Uuid>, BillingError> {
        let subs = self.inner.subscriptions.lock().unwrap();
        let mut ids: Vec<(chrono::DateTime<Utc>, Uuid)> = subs
            .values()
            .filter(|sub| sub.status != "cancelled")
            .map(|sub| (sub.created_utc, sub.subscription_id))
            .collect();
        ids.sort();
        Ok(ids.into_iter().map(|(_, id)| id).collect())
    }
}
