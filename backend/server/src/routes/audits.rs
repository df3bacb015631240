use std::sync::Arc;

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::Response,
};
use uuid::Uuid;

use super::{Path, Payload, created};
use crate::{
    audits::{Audit, AuditInput, MaturityOverview, overview},
    auth::AuthUser,
    error::AppError,
    state::AppState,
};

pub async fn list_handler(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<Vec<Audit>>, AppError> {
    let mut audits = state.repo::<Audit>(&auth).list().await?;
    audits.sort_by(|a, b| b.date.cmp(&a.date).then(b.created_at.cmp(&a.created_at)));

    Ok(Json(audits))
}

pub async fn overview_handler(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<MaturityOverview>, AppError> {
    let audits = state.repo::<Audit>(&auth).list().await?;

    Ok(Json(overview(&audits)))
}

pub async fn get_handler(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Audit>, AppError> {
    Ok(Json(state.repo::<Audit>(&auth).find(id).await?))
}

pub async fn create_handler(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Payload(input): Payload<AuditInput>,
) -> Result<Response, AppError> {
    let audit = Audit::create(input)?;
    state.repo::<Audit>(&auth).put(&audit).await?;

    Ok(created(audit))
}

pub async fn update_handler(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Payload(input): Payload<AuditInput>,
) -> Result<Json<Audit>, AppError> {
    let repo = state.repo::<Audit>(&auth);
    let mut audit = repo.find(id).await?;

    audit.apply(input)?;
    repo.put(&audit).await?;

    Ok(Json(audit))
}

pub async fn delete_handler(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    auth.require_manager()?;

    if !state.repo::<Audit>(&auth).delete(id).await? {
        return Err(AppError::NotFound);
    }

    Ok(StatusCode::NO_CONTENT)
}
