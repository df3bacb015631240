//! # Goals
//!
//! Objectives with measurable key results (OKRs).
//!
//! ## Progress
//!
//! - Key result: `(current - start) / (target - start)`, clamped to 0..=100 percent
//! - Works for decreasing targets too (cut costs from 10k to 8k: 9k is 50%)
//! - `target == start` is all or nothing
//! - Goal: mean of its key results, 0 without key results
//!
//! ## Sync
//!
//! Key results bound to a [`Metric`] take their current value from live aggregates of the
//! tenant. Money metrics only look at paid ledger entries inside the goal period.
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::{
    audits,
    clients::ClientStatus,
    error::AppError,
    kpis,
    ledger::TransactionKind,
    snapshot::TenantSnapshot,
    state::AppState,
    store::Record,
    utils::{money, optional_text, require_number, require_text, round_to},
};

const VALUE_TOLERANCE: f64 = 1e-6;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Metric {
    Revenue,
    Expenses,
    Profit,
    ActiveClients,
    NewClients,
    Headcount,
    CardsInStage { flow_id: Uuid, stage: String },
    KpiLatest { kpi_id: Uuid },
    MaturityAverage,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KeyResult {
    pub id: Uuid,
    pub title: String,
    pub metric: Option<Metric>,
    pub start_value: f64,
    pub target_value: f64,
    pub current_value: f64,
    pub progress: f64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct KeyResultInput {
    /// Present when updating an existing key result.
    pub id: Option<Uuid>,
    pub title: String,
    pub metric: Option<Metric>,
    #[serde(default)]
    pub start_value: f64,
    pub target_value: f64,
    pub current_value: Option<f64>,
}

pub fn progress(start: f64, target: f64, current: f64) -> f64 {
    let span = target - start;

    if span.abs() < VALUE_TOLERANCE {
        return if current >= target { 100.0 } else { 0.0 };
    }

    round_to(((current - start) / span * 100.0).clamp(0.0, 100.0), 1)
}

impl KeyResult {
    fn from_input(input: KeyResultInput, existing: Option<&KeyResult>) -> Result<Self, AppError> {
        require_number("start_value", input.start_value)?;
        require_number("target_value", input.target_value)?;

        let current_value = input
            .current_value
            .map(|value| require_number("current_value", value))
            .transpose()?
            .or(existing.map(|kr| kr.current_value))
            .unwrap_or(input.start_value);

        let mut key_result = Self {
            id: existing.map(|kr| kr.id).unwrap_or_else(Uuid::new_v4),
            title: require_text("key result title", &input.title)?,
            metric: input.metric,
            start_value: input.start_value,
            target_value: input.target_value,
            current_value,
            progress: 0.0,
        };

        key_result.refresh();

        Ok(key_result)
    }

    pub fn refresh(&mut self) {
        self.progress = progress(self.start_value, self.target_value, self.current_value);
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Goal {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub key_results: Vec<KeyResult>,
    pub progress: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record for Goal {
    const COLLECTION: &'static str = "goals";

    fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct GoalInput {
    pub title: String,
    pub description: Option<String>,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    #[serde(default)]
    pub key_results: Vec<KeyResultInput>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct CheckIn {
    pub current_value: f64,
}

impl Goal {
    pub fn create(input: GoalInput) -> Result<Self, AppError> {
        let now = Utc::now();
        let mut goal = Self {
            id: Uuid::new_v4(),
            title: String::new(),
            description: None,
            period_start: input.period_start,
            period_end: input.period_end,
            key_results: Vec::new(),
            progress: 0.0,
            created_at: now,
            updated_at: now,
        };

        goal.apply(input)?;

        Ok(goal)
    }

    /// Replaces the goal's fields, keeping ids and check-ins of key results matched by id.
    pub fn apply(&mut self, input: GoalInput) -> Result<(), AppError> {
        if input.period_end < input.period_start {
            return Err(AppError::validation("period_end must not precede period_start"));
        }

        let key_results = input
            .key_results
            .into_iter()
            .map(|kr| {
                let existing = kr
                    .id
                    .and_then(|id| self.key_results.iter().find(|current| current.id == id));

                KeyResult::from_input(kr, existing)
            })
            .collect::<Result<Vec<_>, _>>()?;

        self.title = require_text("title", &input.title)?;
        self.description = optional_text(input.description);
        self.period_start = input.period_start;
        self.period_end = input.period_end;
        self.key_results = key_results;
        self.refresh();

        Ok(())
    }

    pub fn check_in(&mut self, key_result_id: Uuid, value: f64) -> Result<(), AppError> {
        require_number("current_value", value)?;

        let key_result = self
            .key_results
            .iter_mut()
            .find(|kr| kr.id == key_result_id)
            .ok_or(AppError::NotFound)?;

        if key_result.metric.is_some() {
            return Err(AppError::validation(
                "key result is bound to a metric and updates on sync",
            ));
        }

        key_result.current_value = value;
        self.refresh();

        Ok(())
    }

    pub fn refresh(&mut self) {
        for key_result in &mut self.key_results {
            key_result.refresh();
        }

        self.progress = if self.key_results.is_empty() {
            0.0
        } else {
            round_to(
                self.key_results.iter().map(|kr| kr.progress).sum::<f64>()
                    / self.key_results.len() as f64,
                1,
            )
        };
        self.updated_at = Utc::now();
    }

    pub fn in_period(&self, date: NaiveDate) -> bool {
        date >= self.period_start && date <= self.period_end
    }
}

/// Live value of a metric for one goal, `None` when there is nothing to measure yet.
pub fn metric_value(metric: &Metric, goal: &Goal, data: &TenantSnapshot) -> Option<f64> {
    let paid_total = |kind: TransactionKind| {
        money(
            data.transactions
                .iter()
                .filter(|t| t.kind == kind && t.paid && goal.in_period(t.date))
                .map(|t| t.amount)
                .sum(),
        )
    };

    match metric {
        Metric::Revenue => Some(paid_total(TransactionKind::Income)),
        Metric::Expenses => Some(paid_total(TransactionKind::Expense)),
        Metric::Profit => Some(money(
            paid_total(TransactionKind::Income) - paid_total(TransactionKind::Expense),
        )),
        Metric::ActiveClients => Some(
            data.clients
                .iter()
                .filter(|c| c.status == ClientStatus::Active)
                .count() as f64,
        ),
        Metric::NewClients => Some(
            data.clients
                .iter()
                .filter(|c| goal.in_period(c.created_at.date_naive()))
                .count() as f64,
        ),
        Metric::Headcount => Some(data.employees.iter().filter(|e| e.active).count() as f64),
        Metric::CardsInStage { flow_id, stage } => Some(
            data.cards
                .iter()
                .filter(|c| c.flow_id == *flow_id && c.stage == *stage)
                .count() as f64,
        ),
        Metric::KpiLatest { kpi_id } => {
            kpis::latest(*kpi_id, &data.kpi_entries).map(|entry| entry.value)
        }
        Metric::MaturityAverage => {
            let overview = audits::overview(&data.audits);
            (!overview.areas.is_empty()).then_some(overview.average)
        }
    }
}

/// Pulls metric values into the goal. Returns how many key results changed.
pub fn sync_goal(goal: &mut Goal, data: &TenantSnapshot) -> usize {
    let mut changed = 0;

    let values: Vec<Option<f64>> = goal
        .key_results
        .iter()
        .map(|kr| kr.metric.as_ref().and_then(|m| metric_value(m, goal, data)))
        .collect();

    for (key_result, value) in goal.key_results.iter_mut().zip(values) {
        let Some(value) = value else {
            continue;
        };

        if (key_result.current_value - value).abs() > VALUE_TOLERANCE {
            key_result.current_value = value;
            changed += 1;
        }
    }

    if changed > 0 {
        goal.refresh();
    }

    changed
}

#[derive(Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct SyncReport {
    pub goals_updated: usize,
    pub key_results_updated: usize,
}

/// Recomputes metric-bound key results of every goal of a tenant.
pub struct GoalsService<'a> {
    state: &'a AppState,
    tenant_id: Uuid,
}

impl<'a> GoalsService<'a> {
    pub fn new(state: &'a AppState, tenant_id: Uuid) -> Self {
        Self { state, tenant_id }
    }

    pub async fn sync(&self) -> Result<SyncReport, AppError> {
        let mut data = TenantSnapshot::load(self.state, self.tenant_id).await?;
        let goals = std::mem::take(&mut data.goals);
        let repo = self.state.tenant_repo::<Goal>(self.tenant_id);
        let mut report = SyncReport::default();

        for mut goal in goals {
            let changed = sync_goal(&mut goal, &data);

            if changed > 0 {
                repo.put(&goal).await?;
                report.goals_updated += 1;
                report.key_results_updated += changed;
            }
        }

        info!(
            tenant = %self.tenant_id,
            goals = report.goals_updated,
            key_results = report.key_results_updated,
            "Goals synced"
        );

        Ok(report)
    }

    /// Syncs a single goal before it is stored.
    pub async fn sync_one(&self, goal: &mut Goal) -> Result<(), AppError> {
        if goal.key_results.iter().all(|kr| kr.metric.is_none()) {
            return Ok(());
        }

        let data = TenantSnapshot::load(self.state, self.tenant_id).await?;
        sync_goal(goal, &data);

        Ok(())
    }
}
