//! # Process maturity audits
//!
//! Questionnaires scored 0 to 5 per business area (sales, finance, operations, ...).
//!
//! | Score     | Level        |
//! |-----------|--------------|
//! | `< 1.0`   | `initial`    |
//! | `< 2.0`   | `managed`    |
//! | `< 3.0`   | `defined`    |
//! | `< 4.0`   | `measured`   |
//! | otherwise | `optimizing` |
use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::AppError,
    store::Record,
    utils::{optional_text, require_text, round_to},
};

pub const MAX_SCORE: u8 = 5;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaturityLevel {
    Initial,
    Managed,
    Defined,
    Measured,
    Optimizing,
}

impl MaturityLevel {
    pub fn from_score(score: f64) -> Self {
        match score {
            s if s < 1.0 => MaturityLevel::Initial,
            s if s < 2.0 => MaturityLevel::Managed,
            s if s < 3.0 => MaturityLevel::Defined,
            s if s < 4.0 => MaturityLevel::Measured,
            _ => MaturityLevel::Optimizing,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuditItem {
    pub question: String,
    pub score: u8,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Audit {
    pub id: Uuid,
    pub area: String,
    pub date: NaiveDate,
    pub items: Vec<AuditItem>,
    pub notes: Option<String>,
    pub score: f64,
    pub level: MaturityLevel,
    pub created_at: DateTime<Utc>,
}

impl Record for Audit {
    const COLLECTION: &'static str = "audits";

    fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct AuditInput {
    pub area: String,
    pub date: NaiveDate,
    pub items: Vec<AuditItem>,
    pub notes: Option<String>,
}

impl Audit {
    pub fn create(input: AuditInput) -> Result<Self, AppError> {
        let mut audit = Self {
            id: Uuid::new_v4(),
            area: String::new(),
            date: input.date,
            items: Vec::new(),
            notes: None,
            score: 0.0,
            level: MaturityLevel::Initial,
            created_at: Utc::now(),
        };

        audit.apply(input)?;

        Ok(audit)
    }

    pub fn apply(&mut self, input: AuditInput) -> Result<(), AppError> {
        if input.items.is_empty() {
            return Err(AppError::validation("an audit needs at least one item"));
        }

        let items = input
            .items
            .into_iter()
            .map(|item| {
                if item.score > MAX_SCORE {
                    return Err(AppError::validation(format!(
                        "scores range from 0 to {MAX_SCORE}"
                    )));
                }

                Ok(AuditItem {
                    question: require_text("question", &item.question)?,
                    score: item.score,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        self.area = require_text("area", &input.area)?;
        self.date = input.date;
        self.notes = optional_text(input.notes);
        self.score = maturity_score(&items);
        self.level = MaturityLevel::from_score(self.score);
        self.items = items;

        Ok(())
    }
}

pub fn maturity_score(items: &[AuditItem]) -> f64 {
    if items.is_empty() {
        return 0.0;
    }

    let total: u32 = items.iter().map(|item| u32::from(item.score)).sum();

    round_to(f64::from(total) / items.len() as f64, 2)
}

#[derive(Debug, Serialize, PartialEq)]
pub struct AreaMaturity {
    pub area: String,
    pub audit_id: Uuid,
    pub date: NaiveDate,
    pub score: f64,
    pub level: MaturityLevel,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct MaturityOverview {
    pub areas: Vec<AreaMaturity>,
    pub average: f64,
    pub level: Option<MaturityLevel>,
}

/// Latest audit per area (areas compared case-insensitively), plus their average score.
pub fn overview<'a>(audits: impl IntoIterator<Item = &'a Audit>) -> MaturityOverview {
    let mut latest: HashMap<String, &Audit> = HashMap::new();

    for audit in audits {
        latest
            .entry(audit.area.to_lowercase())
            .and_modify(|current| {
                if (audit.date, audit.created_at) > (current.date, current.created_at) {
                    *current = audit;
                }
            })
            .or_insert(audit);
    }

    let mut areas: Vec<AreaMaturity> = latest
        .into_values()
        .map(|audit| AreaMaturity {
            area: audit.area.clone(),
            audit_id: audit.id,
            date: audit.date,
            score: audit.score,
            level: audit.level,
        })
        .collect();

    areas.sort_by(|a, b| a.area.to_lowercase().cmp(&b.area.to_lowercase()));

    let average = if areas.is_empty() {
        0.0
    } else {
        round_to(
            areas.iter().map(|area| area.score).sum::<f64>() / areas.len() as f64,
            2,
        )
    };

    MaturityOverview {
        level: (!areas.is_empty()).then(|| MaturityLevel::from_score(average)),
        areas,
        average,
    }
}
