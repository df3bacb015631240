use std::sync::Arc;

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::Response,
};
use tracing::info;
use uuid::Uuid;

use super::{Path, Payload, created};
use crate::{
    auth::AuthUser,
    error::AppError,
    flows::{
        Board, Card, CardInput, Flow, FlowInput, MoveCard, board, compact_stage,
        occupied_removed_stages, place_card, validate_stages,
    },
    rules::{RuleEntity, RulesService},
    state::AppState,
    store::Repo,
    utils::require_text,
};

async fn flow_cards(repo: &Repo<'_, Card>, flow_id: Uuid) -> Result<Vec<Card>, AppError> {
    Ok(repo
        .list()
        .await?
        .into_iter()
        .filter(|card| card.flow_id == flow_id)
        .collect())
}

async fn find_card(repo: &Repo<'_, Card>, flow_id: Uuid, card_id: Uuid) -> Result<Card, AppError> {
    repo.get(card_id)
        .await?
        .filter(|card| card.flow_id == flow_id)
        .ok_or(AppError::NotFound)
}

/// Stores `card` at `position` in its stage, closing the gap in `left_stage` if it moved out of one.
async fn save_placement(
    repo: &Repo<'_, Card>,
    card: Card,
    position: Option<usize>,
    left_stage: Option<String>,
) -> Result<Card, AppError> {
    let siblings = flow_cards(repo, card.flow_id).await?;
    let id = card.id;
    let fallback = card.clone();

    let mut changed = place_card(siblings.clone(), card, position);

    if let Some(stage) = left_stage {
        let remaining: Vec<Card> = siblings.into_iter().filter(|other| other.id != id).collect();
        changed.extend(compact_stage(remaining, &stage));
    }

    for card in &changed {
        repo.put(card).await?;
    }

    Ok(changed
        .into_iter()
        .find(|card| card.id == id)
        .unwrap_or(fallback))
}

pub async fn list_handler(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<Vec<Flow>>, AppError> {
    let mut flows = state.repo::<Flow>(&auth).list().await?;
    flows.sort_by(|a, b| a.created_at.cmp(&b.created_at));

    Ok(Json(flows))
}

pub async fn get_handler(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Flow>, AppError> {
    Ok(Json(state.repo::<Flow>(&auth).find(id).await?))
}

pub async fn create_handler(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Payload(input): Payload<FlowInput>,
) -> Result<Response, AppError> {
    let flow = Flow::create(input)?;
    state.repo::<Flow>(&auth).put(&flow).await?;

    Ok(created(flow))
}

pub async fn update_handler(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Payload(input): Payload<FlowInput>,
) -> Result<Json<Flow>, AppError> {
    let repo = state.repo::<Flow>(&auth);
    let mut flow = repo.find(id).await?;

    let name = require_text("name", &input.name)?;
    let stages = validate_stages(&input.stages)?;

    let cards = flow_cards(&state.repo::<Card>(&auth), id).await?;
    let occupied = occupied_removed_stages(&flow, &stages, &cards);
    if !occupied.is_empty() {
        return Err(AppError::Conflict(format!(
            "stages still hold cards: {}",
            occupied.join(", ")
        )));
    }

    flow.name = name;
    flow.stages = stages;
    repo.put(&flow).await?;

    Ok(Json(flow))
}

pub async fn delete_handler(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    auth.require_manager()?;

    let card_repo = state.repo::<Card>(&auth);
    let cards = flow_cards(&card_repo, id).await?;

    if !state.repo::<Flow>(&auth).delete(id).await? {
        return Err(AppError::NotFound);
    }

    for card in &cards {
        card_repo.delete(card.id).await?;
    }

    info!(tenant = %auth.tenant_id, flow = %id, "Deleted flow and {} cards", cards.len());

    Ok(StatusCode::NO_CONTENT)
}

pub async fn board_handler(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Board>, AppError> {
    let flow = state.repo::<Flow>(&auth).find(id).await?;
    let cards = flow_cards(&state.repo::<Card>(&auth), id).await?;

    Ok(Json(board(flow, cards)))
}

pub async fn list_cards_handler(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Card>>, AppError> {
    let flow = state.repo::<Flow>(&auth).find(id).await?;
    let mut cards = flow_cards(&state.repo::<Card>(&auth), id).await?;

    let stage_index = |card: &Card| flow.stages.iter().position(|s| *s == card.stage);
    cards.sort_by_key(|card| (stage_index(card), card.position));

    Ok(Json(cards))
}

pub async fn get_card_handler(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path((id, card_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Card>, AppError> {
    Ok(Json(find_card(&state.repo::<Card>(&auth), id, card_id).await?))
}

pub async fn create_card_handler(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Payload(input): Payload<CardInput>,
) -> Result<Response, AppError> {
    let flow = state.repo::<Flow>(&auth).find(id).await?;
    let position = input.position;
    let card = Card::create(&flow, input)?;

    let card = save_placement(&state.repo::<Card>(&auth), card, position, None).await?;
    RulesService::new(&state, auth.tenant_id)
        .evaluate_after_write(RuleEntity::Card, card.id, &card)
        .await;

    Ok(created(card))
}

pub async fn update_card_handler(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path((id, card_id)): Path<(Uuid, Uuid)>,
    Payload(input): Payload<CardInput>,
) -> Result<Json<Card>, AppError> {
    let flow = state.repo::<Flow>(&auth).find(id).await?;
    let repo = state.repo::<Card>(&auth);
    let mut card = find_card(&repo, id, card_id).await?;

    let previous_stage = card.stage.clone();
    let position = input.position;
    card.apply(&flow, input)?;

    let card = if card.stage != previous_stage {
        save_placement(&repo, card, position, Some(previous_stage)).await?
    } else if position.is_some() {
        save_placement(&repo, card, position, None).await?
    } else {
        repo.put(&card).await?;
        card
    };

    RulesService::new(&state, auth.tenant_id)
        .evaluate_after_write(RuleEntity::Card, card.id, &card)
        .await;

    Ok(Json(card))
}

pub async fn delete_card_handler(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path((id, card_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, AppError> {
    auth.require_manager()?;

    let repo = state.repo::<Card>(&auth);
    let card = find_card(&repo, id, card_id).await?;
    repo.delete(card.id).await?;

    for other in compact_stage(flow_cards(&repo, id).await?, &card.stage) {
        repo.put(&other).await?;
    }

    Ok(StatusCode::NO_CONTENT)
}

pub async fn move_card_handler(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(card_id): Path<Uuid>,
    Payload(input): Payload<MoveCard>,
) -> Result<Json<Card>, AppError> {
    let repo = state.repo::<Card>(&auth);
    let mut card = repo.find(card_id).await?;
    let flow = state.repo::<Flow>(&auth).find(card.flow_id).await?;

    let stage = input.stage.trim();
    if !flow.has_stage(stage) {
        return Err(AppError::validation(format!(
            "stage '{stage}' does not exist in flow '{}'",
            flow.name
        )));
    }

    let left_stage = (card.stage != stage).then(|| card.stage.clone());
    card.stage = stage.to_string();
    card.updated_at = chrono::Utc::now();

    let card = save_placement(&repo, card, input.position, left_stage).await?;

    info!(tenant = %auth.tenant_id, card = %card.id, "Moved card to {} at {}", card.stage, card.position);

    RulesService::new(&state, auth.tenant_id)
        .evaluate_after_write(RuleEntity::Card, card.id, &card)
        .await;

    Ok(Json(card))
}
