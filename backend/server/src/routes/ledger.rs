use std::sync::Arc;

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::Response,
};
use uuid::Uuid;

use super::{Path, Payload, Query, created};
use crate::{
    auth::AuthUser,
    error::AppError,
    ledger::{
        LedgerSummary, Transaction, TransactionFilter, TransactionInput, sort_newest_first,
        summarize,
    },
    rules::{RuleEntity, RulesService},
    state::AppState,
};

async fn filtered(
    state: &AppState,
    auth: &AuthUser,
    filter: &TransactionFilter,
) -> Result<Vec<Transaction>, AppError> {
    Ok(state
        .repo::<Transaction>(auth)
        .list()
        .await?
        .into_iter()
        .filter(|transaction| filter.matches(transaction))
        .collect())
}

pub async fn list_handler(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Query(filter): Query<TransactionFilter>,
) -> Result<Json<Vec<Transaction>>, AppError> {
    let mut transactions = filtered(&state, &auth, &filter).await?;
    sort_newest_first(&mut transactions);

    Ok(Json(transactions))
}

pub async fn summary_handler(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Query(filter): Query<TransactionFilter>,
) -> Result<Json<LedgerSummary>, AppError> {
    let range = TransactionFilter {
        from: filter.from,
        to: filter.to,
        ..TransactionFilter::default()
    };

    Ok(Json(summarize(&filtered(&state, &auth, &range).await?)))
}

pub async fn get_handler(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Transaction>, AppError> {
    Ok(Json(state.repo::<Transaction>(&auth).find(id).await?))
}

pub async fn create_handler(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Payload(input): Payload<TransactionInput>,
) -> Result<Response, AppError> {
    let transaction = Transaction::create(input)?;

    state.repo::<Transaction>(&auth).put(&transaction).await?;
    RulesService::new(&state, auth.tenant_id)
        .evaluate_after_write(RuleEntity::Transaction, transaction.id, &transaction)
        .await;

    Ok(created(transaction))
}

pub async fn update_handler(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Payload(input): Payload<TransactionInput>,
) -> Result<Json<Transaction>, AppError> {
    let repo = state.repo::<Transaction>(&auth);
    let mut transaction = repo.find(id).await?;

    transaction.apply(input)?;
    repo.put(&transaction).await?;
    RulesService::new(&state, auth.tenant_id)
        .evaluate_after_write(RuleEntity::Transaction, transaction.id, &transaction)
        .await;

    Ok(Json(transaction))
}

pub async fn delete_handler(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    auth.require_manager()?;

    if !state.repo::<Transaction>(&auth).delete(id).await? {
        return Err(AppError::NotFound);
    }

    Ok(StatusCode::NO_CONTENT)
}
