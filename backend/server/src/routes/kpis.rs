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
    kpis::{Kpi, KpiEntry, KpiEntryInput, KpiInput, KpiView},
    rules::{RuleEntity, RulesService},
    state::AppState,
};

async fn entries_of(state: &AppState, auth: &AuthUser, kpi_id: Uuid) -> Result<Vec<KpiEntry>, AppError> {
    Ok(state
        .repo::<KpiEntry>(auth)
        .list()
        .await?
        .into_iter()
        .filter(|entry| entry.kpi_id == kpi_id)
        .collect())
}

pub async fn list_handler(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<Vec<KpiView>>, AppError> {
    let kpi_repo = state.repo::<Kpi>(&auth);
    let entry_repo = state.repo::<KpiEntry>(&auth);
    let (kpis, entries) = tokio::try_join!(kpi_repo.list(), entry_repo.list())?;

    let mut views: Vec<KpiView> = kpis
        .into_iter()
        .map(|kpi| KpiView::new(kpi, &entries))
        .collect();
    views.sort_by_key(|view| view.kpi.name.to_lowercase());

    Ok(Json(views))
}

pub async fn get_handler(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<KpiView>, AppError> {
    let kpi = state.repo::<Kpi>(&auth).find(id).await?;
    let entries = entries_of(&state, &auth, id).await?;

    Ok(Json(KpiView::new(kpi, &entries)))
}

pub async fn create_handler(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Payload(input): Payload<KpiInput>,
) -> Result<Response, AppError> {
    let kpi = Kpi::create(input)?;
    state.repo::<Kpi>(&auth).put(&kpi).await?;

    Ok(created(KpiView::new(kpi, &[])))
}

pub async fn update_handler(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Payload(input): Payload<KpiInput>,
) -> Result<Json<KpiView>, AppError> {
    let repo = state.repo::<Kpi>(&auth);
    let mut kpi = repo.find(id).await?;

    kpi.apply(input)?;
    repo.put(&kpi).await?;

    let entries = entries_of(&state, &auth, id).await?;

    Ok(Json(KpiView::new(kpi, &entries)))
}

pub async fn delete_handler(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    auth.require_manager()?;

    let entries = entries_of(&state, &auth, id).await?;

    if !state.repo::<Kpi>(&auth).delete(id).await? {
        return Err(AppError::NotFound);
    }

    let entry_repo = state.repo::<KpiEntry>(&auth);
    for entry in &entries {
        entry_repo.delete(entry.id).await?;
    }

    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_entries_handler(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<KpiEntry>>, AppError> {
    state.repo::<Kpi>(&auth).find(id).await?;

    let mut entries = entries_of(&state, &auth, id).await?;
    entries.sort_by(|a, b| a.date.cmp(&b.date).then(a.created_at.cmp(&b.created_at)));

    Ok(Json(entries))
}

pub async fn create_entry_handler(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Payload(input): Payload<KpiEntryInput>,
) -> Result<Response, AppError> {
    let kpi = state.repo::<Kpi>(&auth).find(id).await?;
    let entry = KpiEntry::create(&kpi, input)?;

    state.repo::<KpiEntry>(&auth).put(&entry).await?;
    RulesService::new(&state, auth.tenant_id)
        .evaluate_after_write(RuleEntity::KpiEntry, entry.id, &entry)
        .await;

    Ok(created(entry))
}
