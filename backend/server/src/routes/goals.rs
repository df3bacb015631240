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
    auth::AuthUser,
    error::AppError,
    goals::{CheckIn, Goal, GoalInput, GoalsService, SyncReport},
    state::AppState,
};

pub async fn list_handler(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<Vec<Goal>>, AppError> {
    let mut goals = state.repo::<Goal>(&auth).list().await?;
    goals.sort_by(|a, b| {
        a.period_start
            .cmp(&b.period_start)
            .then(a.created_at.cmp(&b.created_at))
    });

    Ok(Json(goals))
}

pub async fn get_handler(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Goal>, AppError> {
    Ok(Json(state.repo::<Goal>(&auth).find(id).await?))
}

pub async fn create_handler(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Payload(input): Payload<GoalInput>,
) -> Result<Response, AppError> {
    let mut goal = Goal::create(input)?;

    GoalsService::new(&state, auth.tenant_id)
        .sync_one(&mut goal)
        .await?;
    state.repo::<Goal>(&auth).put(&goal).await?;

    Ok(created(goal))
}

pub async fn update_handler(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Payload(input): Payload<GoalInput>,
) -> Result<Json<Goal>, AppError> {
    let repo = state.repo::<Goal>(&auth);
    let mut goal = repo.find(id).await?;

    goal.apply(input)?;
    GoalsService::new(&state, auth.tenant_id)
        .sync_one(&mut goal)
        .await?;
    repo.put(&goal).await?;

    Ok(Json(goal))
}

pub async fn delete_handler(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    auth.require_manager()?;

    if !state.repo::<Goal>(&auth).delete(id).await? {
        return Err(AppError::NotFound);
    }

    Ok(StatusCode::NO_CONTENT)
}

pub async fn check_in_handler(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path((id, key_result_id)): Path<(Uuid, Uuid)>,
    Payload(input): Payload<CheckIn>,
) -> Result<Json<Goal>, AppError> {
    let repo = state.repo::<Goal>(&auth);
    let mut goal = repo.find(id).await?;

    goal.check_in(key_result_id, input.current_value)?;
    repo.put(&goal).await?;

    Ok(Json(goal))
}

pub async fn sync_handler(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<SyncReport>, AppError> {
    Ok(Json(GoalsService::new(&state, auth.tenant_id).sync().await?))
}
