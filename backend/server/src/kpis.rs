use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::AppError,
    store::Record,
    utils::{optional_text, require_number, require_text},
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    #[default]
    HigherIsBetter,
    LowerIsBetter,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KpiStatus {
    OnTrack,
    OffTrack,
    NoData,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Kpi {
    pub id: Uuid,
    pub name: String,
    pub unit: Option<String>,
    pub target: f64,
    pub direction: Direction,
    pub created_at: DateTime<Utc>,
}

impl Record for Kpi {
    const COLLECTION: &'static str = "kpis";

    fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct KpiInput {
    pub name: String,
    pub unit: Option<String>,
    pub target: f64,
    #[serde(default)]
    pub direction: Direction,
}

impl Kpi {
    pub fn create(input: KpiInput) -> Result<Self, AppError> {
        let mut kpi = Self {
            id: Uuid::new_v4(),
            name: String::new(),
            unit: None,
            target: 0.0,
            direction: Direction::default(),
            created_at: Utc::now(),
        };

        kpi.apply(input)?;

        Ok(kpi)
    }

    pub fn apply(&mut self, input: KpiInput) -> Result<(), AppError> {
        self.name = require_text("name", &input.name)?;
        self.unit = optional_text(input.unit);
        self.target = require_number("target", input.target)?;
        self.direction = input.direction;

        Ok(())
    }

    pub fn status(&self, latest: Option<&KpiEntry>) -> KpiStatus {
        let Some(entry) = latest else {
            return KpiStatus::NoData;
        };

        let met = match self.direction {
            Direction::HigherIsBetter => entry.value >= self.target,
            Direction::LowerIsBetter => entry.value <= self.target,
        };

        if met {
            KpiStatus::OnTrack
        } else {
            KpiStatus::OffTrack
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KpiEntry {
    pub id: Uuid,
    pub kpi_id: Uuid,
    pub value: f64,
    pub date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

impl Record for KpiEntry {
    const COLLECTION: &'static str = "kpi_entries";

    fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct KpiEntryInput {
    pub value: f64,
    pub date: NaiveDate,
}

impl KpiEntry {
    pub fn create(kpi: &Kpi, input: KpiEntryInput) -> Result<Self, AppError> {
        Ok(Self {
            id: Uuid::new_v4(),
            kpi_id: kpi.id,
            value: require_number("value", input.value)?,
            date: input.date,
            created_at: Utc::now(),
        })
    }
}

/// Latest entry of one KPI: greatest date, then the most recently recorded.
pub fn latest<'a>(kpi_id: Uuid, entries: &'a [KpiEntry]) -> Option<&'a KpiEntry> {
    entries
        .iter()
        .filter(|entry| entry.kpi_id == kpi_id)
        .max_by(|a, b| a.date.cmp(&b.date).then(a.created_at.cmp(&b.created_at)))
}

#[derive(Debug, Serialize)]
pub struct KpiView {
    #[serde(flatten)]
    pub kpi: Kpi,
    pub latest_value: Option<f64>,
    pub latest_date: Option<NaiveDate>,
    pub status: KpiStatus,
}

impl KpiView {
    pub fn new(kpi: Kpi, entries: &[KpiEntry]) -> Self {
        let latest = latest(kpi.id, entries);

        Self {
            latest_value: latest.map(|entry| entry.value),
            latest_date: latest.map(|entry| entry.date),
            status: kpi.status(latest),
            kpi,
        }
    }
}
