use std::sync::Arc;

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::Response,
};
use tracing::info;
use uuid::Uuid;

use super::{Path, Payload, Query, created};
use crate::{
    auth::AuthUser,
    error::AppError,
    rules::{Alert, AlertFilter, Rule, RuleInput, RuleTest, RuleTestResult, sort_alerts},
    state::AppState,
};

pub async fn list_handler(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<Vec<Rule>>, AppError> {
    let mut rules = state.repo::<Rule>(&auth).list().await?;
    rules.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

    Ok(Json(rules))
}

pub async fn get_handler(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Rule>, AppError> {
    Ok(Json(state.repo::<Rule>(&auth).find(id).await?))
}

pub async fn create_handler(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Payload(input): Payload<RuleInput>,
) -> Result<Response, AppError> {
    auth.require_manager()?;

    let rule = Rule::create(input)?;
    state.repo::<Rule>(&auth).put(&rule).await?;

    info!(tenant = %auth.tenant_id, rule = %rule.id, "Rule created: {}", rule.name);

    Ok(created(rule))
}

pub async fn update_handler(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Payload(input): Payload<RuleInput>,
) -> Result<Json<Rule>, AppError> {
    auth.require_manager()?;

    let repo = state.repo::<Rule>(&auth);
    let mut rule = repo.find(id).await?;

    rule.apply(input)?;
    repo.put(&rule).await?;

    Ok(Json(rule))
}

pub async fn delete_handler(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    auth.require_manager()?;

    if !state.repo::<Rule>(&auth).delete(id).await? {
        return Err(AppError::NotFound);
    }

    Ok(StatusCode::NO_CONTENT)
}

pub async fn test_handler(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Payload(input): Payload<RuleTest>,
) -> Result<Json<RuleTestResult>, AppError> {
    let rule = state.repo::<Rule>(&auth).find(id).await?;

    Ok(Json(rule.test(&input.record)))
}

pub async fn list_alerts_handler(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Query(filter): Query<AlertFilter>,
) -> Result<Json<Vec<Alert>>, AppError> {
    let mut alerts: Vec<Alert> = state
        .repo::<Alert>(&auth)
        .list()
        .await?
        .into_iter()
        .filter(|alert| filter.matches(alert))
        .collect();

    sort_alerts(&mut alerts);

    Ok(Json(alerts))
}

pub async fn ack_alert_handler(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Alert>, AppError> {
    let repo = state.repo::<Alert>(&auth);
    let mut alert = repo.find(id).await?;

    if !alert.acknowledged {
        alert.acknowledged = true;
        repo.put(&alert).await?;
    }

    Ok(Json(alert))
}

pub async fn delete_alert_handler(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    auth.require_manager()?;

    if !state.repo::<Alert>(&auth).delete(id).await? {
        return Err(AppError::NotFound);
    }

    Ok(StatusCode::NO_CONTENT)
}
