//! # Operating flows
//!
//! Kanban boards: a flow owns an ordered list of stages, cards live in exactly one stage.
//!
//! - Positions are dense per stage (0, 1, 2, ...) after every placement
//! - Cards placed without a position go to the end of the stage
//! - Removing a stage that still holds cards is refused
use std::collections::{HashMap, HashSet};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::AppError,
    store::Record,
    utils::{money, optional_text, require_non_negative, require_text},
};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Flow {
    pub id: Uuid,
    pub name: String,
    pub stages: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Record for Flow {
    const COLLECTION: &'static str = "flows";

    fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct FlowInput {
    pub name: String,
    pub stages: Vec<String>,
}

impl Flow {
    pub fn create(input: FlowInput) -> Result<Self, AppError> {
        Ok(Self {
            id: Uuid::new_v4(),
            name: require_text("name", &input.name)?,
            stages: validate_stages(&input.stages)?,
            created_at: Utc::now(),
        })
    }

    pub fn has_stage(&self, stage: &str) -> bool {
        self.stages.iter().any(|s| s == stage)
    }
}

pub fn validate_stages(stages: &[String]) -> Result<Vec<String>, AppError> {
    let stages: Vec<String> = stages.iter().map(|s| s.trim().to_string()).collect();

    if stages.is_empty() || stages.iter().any(String::is_empty) {
        return Err(AppError::validation("a flow needs at least one named stage"));
    }

    let mut seen = HashSet::new();
    if !stages.iter().all(|stage| seen.insert(stage.to_lowercase())) {
        return Err(AppError::validation("stage names must be unique"));
    }

    Ok(stages)
}

/// Stages removed by an update that still hold cards.
pub fn occupied_removed_stages(flow: &Flow, new_stages: &[String], cards: &[Card]) -> Vec<String> {
    flow.stages
        .iter()
        .filter(|stage| !new_stages.contains(stage))
        .filter(|stage| cards.iter().any(|card| &card.stage == *stage))
        .cloned()
        .collect()
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Card {
    pub id: Uuid,
    pub flow_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub stage: String,
    pub client_id: Option<Uuid>,
    pub assignee_id: Option<Uuid>,
    pub value: f64,
    pub due_date: Option<NaiveDate>,
    pub position: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record for Card {
    const COLLECTION: &'static str = "cards";

    fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct CardInput {
    pub title: String,
    pub description: Option<String>,
    /// Defaults to the flow's first stage.
    pub stage: Option<String>,
    pub client_id: Option<Uuid>,
    pub assignee_id: Option<Uuid>,
    #[serde(default)]
    pub value: f64,
    pub due_date: Option<NaiveDate>,
    pub position: Option<usize>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct MoveCard {
    pub stage: String,
    pub position: Option<usize>,
}

impl Card {
    pub fn create(flow: &Flow, input: CardInput) -> Result<Self, AppError> {
        let now = Utc::now();
        let mut card = Self {
            id: Uuid::new_v4(),
            flow_id: flow.id,
            title: String::new(),
            description: None,
            stage: String::new(),
            client_id: None,
            assignee_id: None,
            value: 0.0,
            due_date: None,
            position: usize::MAX,
            created_at: now,
            updated_at: now,
        };

        card.apply(flow, input)?;

        Ok(card)
    }

    pub fn apply(&mut self, flow: &Flow, input: CardInput) -> Result<(), AppError> {
        let stage = match input.stage {
            Some(stage) => stage.trim().to_string(),
            None if self.stage.is_empty() => flow.stages.first().cloned().unwrap_or_default(),
            None => self.stage.clone(),
        };

        if !flow.has_stage(&stage) {
            return Err(AppError::validation(format!(
                "stage '{stage}' does not exist in flow '{}'",
                flow.name
            )));
        }

        self.title = require_text("title", &input.title)?;
        self.description = optional_text(input.description);
        self.value = money(require_non_negative("value", input.value)?);
        self.client_id = input.client_id;
        self.assignee_id = input.assignee_id;
        self.due_date = input.due_date;
        self.stage = stage;
        self.updated_at = Utc::now();

        Ok(())
    }
}

/// Places `card` in its stage among `stage_cards`, renumbering the stage.
///
/// Returns every card of the stage whose position changed, `card` included.
pub fn place_card(stage_cards: Vec<Card>, mut card: Card, position: Option<usize>) -> Vec<Card> {
    let mut ordered: Vec<Card> = stage_cards
        .into_iter()
        .filter(|other| other.id != card.id && other.stage == card.stage)
        .collect();

    ordered.sort_by_key(|other| (other.position, other.created_at));

    let index = position.unwrap_or(ordered.len()).min(ordered.len());
    card.position = usize::MAX;
    ordered.insert(index, card);

    ordered
        .into_iter()
        .enumerate()
        .filter_map(|(index, mut other)| {
            (other.position != index).then(|| {
                other.position = index;
                other
            })
        })
        .collect()
}

/// Renumbers `stage` after a card left it. Returns the cards whose position changed.
pub fn compact_stage(cards: Vec<Card>, stage: &str) -> Vec<Card> {
    let mut ordered: Vec<Card> = cards.into_iter().filter(|card| card.stage == stage).collect();
    ordered.sort_by_key(|card| (card.position, card.created_at));

    ordered
        .into_iter()
        .enumerate()
        .filter_map(|(index, mut card)| {
            (card.position != index).then(|| {
                card.position = index;
                card
            })
        })
        .collect()
}

#[derive(Debug, Serialize)]
pub struct BoardColumn {
    pub stage: String,
    pub total_value: f64,
    pub cards: Vec<Card>,
}

#[derive(Debug, Serialize)]
pub struct Board {
    pub flow: Flow,
    pub columns: Vec<BoardColumn>,
}

pub fn board(flow: Flow, cards: Vec<Card>) -> Board {
    let mut by_stage: HashMap<String, Vec<Card>> = HashMap::new();
    for card in cards.into_iter().filter(|card| card.flow_id == flow.id) {
        by_stage.entry(card.stage.clone()).or_default().push(card);
    }

    let columns = flow
        .stages
        .iter()
        .map(|stage| {
            let mut cards = by_stage.remove(stage).unwrap_or_default();
            cards.sort_by_key(|card| (card.position, card.created_at));

            BoardColumn {
                stage: stage.clone(),
                total_value: money(cards.iter().map(|card| card.value).sum()),
                cards,
            }
        })
        .collect();

    Board { flow, columns }
}
