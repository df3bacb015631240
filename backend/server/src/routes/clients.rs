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
    clients::{Client, ClientFilter, ClientInput},
    error::AppError,
    rules::{RuleEntity, RulesService},
    state::AppState,
};

pub async fn list_handler(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Query(filter): Query<ClientFilter>,
) -> Result<Json<Vec<Client>>, AppError> {
    let mut clients: Vec<Client> = state
        .repo::<Client>(&auth)
        .list()
        .await?
        .into_iter()
        .filter(|client| filter.matches(client))
        .collect();

    clients.sort_by_key(|client| client.name.to_lowercase());

    Ok(Json(clients))
}

pub async fn get_handler(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Client>, AppError> {
    Ok(Json(state.repo::<Client>(&auth).find(id).await?))
}

pub async fn create_handler(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Payload(input): Payload<ClientInput>,
) -> Result<Response, AppError> {
    let client = Client::create(input)?;

    state.repo::<Client>(&auth).put(&client).await?;
    RulesService::new(&state, auth.tenant_id)
        .evaluate_after_write(RuleEntity::Client, client.id, &client)
        .await;

    Ok(created(client))
}

pub async fn update_handler(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Payload(input): Payload<ClientInput>,
) -> Result<Json<Client>, AppError> {
    let repo = state.repo::<Client>(&auth);
    let mut client = repo.find(id).await?;

    client.apply(input)?;
    repo.put(&client).await?;
    RulesService::new(&state, auth.tenant_id)
        .evaluate_after_write(RuleEntity::Client, client.id, &client)
        .await;

    Ok(Json(client))
}

pub async fn delete_handler(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    auth.require_manager()?;

    if !state.repo::<Client>(&auth).delete(id).await? {
        return Err(AppError::NotFound);
    }

    Ok(StatusCode::NO_CONTENT)
}
