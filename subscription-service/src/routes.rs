//! HTTP API for subscription-service.

use axum::{
    extract::{Path, Query, State},
    routing::{get, post, put},
    Json, Router,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use service_core::error::AppError;
use uuid::Uuid;

use crate::engine::{SubscriptionProcessor, SweepSummary, TickOutcome};
use crate::models::{
    BillingPlan, BillingSettings, CreatePlan, CreateSubscription, Invoice, InvoiceStatus,
    Subscription, UpdateSettings,
};
use crate::services::metrics::{record_subscription_operation, record_sweep_run};
use crate::services::Database;
use crate::startup::AppState;

/// Date override for billing operations. Defaults to the current UTC
/// date; backfills and tests pass an explicit date.
#[derive(Debug, Deserialize)]
pub struct AsOfParams {
    pub today: Option<NaiveDate>,
}

impl AsOfParams {
    fn resolve(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| Utc::now().date_naive())
    }
}

#[derive(Debug, Deserialize)]
pub struct SetInvoiceStatus {
    pub status: InvoiceStatus,
}

fn processor(db: &Database) -> SubscriptionProcessor<Database, Database, Database, Database> {
    SubscriptionProcessor::new(db.clone(), db.clone(), db.clone(), db.clone())
}

pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/plans", post(create_plan))
        .route("/plans/:plan_id", get(get_plan))
        .route("/subscriptions", post(create_subscription))
        .route("/subscriptions/:subscription_id", get(get_subscription))
        .route(
            "/subscriptions/:subscription_id/invoices",
            get(list_invoices),
        )
        .route(
            "/subscriptions/:subscription_id/cancel",
            post(cancel_subscription),
        )
        .route(
            "/subscriptions/:subscription_id/restart",
            post(restart_subscription),
        )
        .route(
            "/subscriptions/:subscription_id/process",
            post(process_subscription),
        )
        .route("/process-all", post(process_all))
        .route("/settings", get(get_settings).put(update_settings))
        .route("/invoices/:invoice_id/status", put(set_invoice_status))
}

async fn create_plan(
    State(state): State<AppState>,
    Json(input): Json<CreatePlan>,
) -> Result<Json<BillingPlan>, AppError> {
    let plan = state.db.create_plan(&input).await?;
    Ok(Json(plan))
}

async fn get_plan(
    State(state): State<AppState>,
    Path(plan_id): Path<Uuid>,
) -> Result<Json<BillingPlan>, AppError> {
    let plan = state.db.get_plan(plan_id).await?;
    Ok(Json(plan))
}

async fn create_subscription(
    State(state): State<AppState>,
    Query(params): Query<AsOfParams>,
    Json(input): Json<CreateSubscription>,
) -> Result<Json<Subscription>, AppError> {
    let sub = processor(&state.db)
        .create_subscription(&input, params.resolve())
        .await?;
    record_subscription_operation("create");
    Ok(Json(sub))
}

async fn get_subscription(
    State(state): State<AppState>,
    Path(subscription_id): Path<Uuid>,
) -> Result<Json<Subscription>, AppError> {
    let sub = state.db.get_subscription(subscription_id).await?;
    Ok(Json(sub))
}

async fn list_invoices(
    State(state): State<AppState>,
    Path(subscription_id): Path<Uuid>,
) -> Result<Json<Vec<Invoice>>, AppError> {
    let invoices = state.db.list_invoices(subscription_id).await?;
    Ok(Json(invoices))
}

async fn cancel_subscription(
    State(state): State<AppState>,
    Path(subscription_id): Path<Uuid>,
    Query(params): Query<AsOfParams>,
) -> Result<Json<Subscription>, AppError> {
    let sub = processor(&state.db)
        .cancel(subscription_id, params.resolve())
        .await?;
    record_subscription_operation("cancel");
    Ok(Json(sub))
}

async fn restart_subscription(
    State(state): State<AppState>,
    Path(subscription_id): Path<Uuid>,
    Query(params): Query<AsOfParams>,
) -> Result<Json<Subscription>, AppError> {
    let sub = processor(&state.db)
        .restart(subscription_id, params.resolve())
        .await?;
    record_subscription_operation("restart");
    Ok(Json(sub))
}

async fn process_subscription(
    State(state): State<AppState>,
    Path(subscription_id): Path<Uuid>,
    Query(params): Query<AsOfParams>,
) -> Result<Json<TickOutcome>, AppError> {
    let outcome = processor(&state.db)
        .process_tick(subscription_id, params.resolve())
        .await?;
    record_subscription_operation("process");
    Ok(Json(outcome))
}

async fn process_all(
    State(state): State<AppState>,
    Query(params): Query<AsOfParams>,
) -> Result<Json<SweepSummary>, AppError> {
    let summary = processor(&state.db).process_all(params.resolve()).await?;
    record_sweep_run(if summary.failed == 0 { "ok" } else { "partial" });
    Ok(Json(summary))
}

async fn get_settings(State(state): State<AppState>) -> Result<Json<BillingSettings>, AppError> {
    let settings = state.db.get_settings().await?;
    Ok(Json(settings))
}

async fn update_settings(
    State(state): State<AppState>,
    Json(input): Json<UpdateSettings>,
) -> Result<Json<BillingSettings>, AppError> {
    let settings = state.db.update_settings(&input).await?;
    Ok(Json(settings))
}

async fn set_invoice_status(
    State(state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
    Json(input): Json<SetInvoiceStatus>,
) -> Result<Json<Invoice>, AppError> {
    let invoice = state.db.set_invoice_status(invoice_id, input.status).await?;
    Ok(Json(invoice))
}
