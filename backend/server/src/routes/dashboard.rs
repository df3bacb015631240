use std::sync::Arc;

use axum::{Json, extract::State};
use serde::Deserialize;

use super::Query;
use crate::{
    auth::AuthUser,
    dashboard::{CashflowPoint, Dashboard, build, cashflow, clamp_months},
    error::AppError,
    ledger::Transaction,
    snapshot::TenantSnapshot,
    state::AppState,
    utils::{Month, today},
};

#[derive(Deserialize)]
pub struct DashboardQuery {
    pub month: Option<String>,
}

#[derive(Deserialize)]
pub struct CashflowQuery {
    pub months: Option<u32>,
}

pub async fn dashboard_handler(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Query(query): Query<DashboardQuery>,
) -> Result<Json<Dashboard>, AppError> {
    let month = match query.month.as_deref() {
        Some(raw) => Month::parse(raw)?,
        None => Month::containing(today()),
    };

    let data = TenantSnapshot::load(&state, auth.tenant_id).await?;

    Ok(Json(build(&data, month)))
}

pub async fn cashflow_handler(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Query(query): Query<CashflowQuery>,
) -> Result<Json<Vec<CashflowPoint>>, AppError> {
    let transactions = state.repo::<Transaction>(&auth).list().await?;

    Ok(Json(cashflow(
        &transactions,
        Month::containing(today()),
        clamp_months(query.months),
    )))
}
