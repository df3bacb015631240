use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::AppError,
    store::Record,
    utils::{money, normalize, optional_text, require_non_negative, require_text},
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientStatus {
    #[default]
    Lead,
    Prospect,
    Active,
    Churned,
}

impl ClientStatus {
    pub const ALL: [ClientStatus; 4] = [
        ClientStatus::Lead,
        ClientStatus::Prospect,
        ClientStatus::Active,
        ClientStatus::Churned,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ClientStatus::Lead => "lead",
            ClientStatus::Prospect => "prospect",
            ClientStatus::Active => "active",
            ClientStatus::Churned => "churned",
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Client {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub segment: Option<String>,
    pub status: ClientStatus,
    pub monthly_value: f64,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record for Client {
    const COLLECTION: &'static str = "clients";

    fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct ClientInput {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub segment: Option<String>,
    #[serde(default)]
    pub status: ClientStatus,
    #[serde(default)]
    pub monthly_value: f64,
    pub notes: Option<String>,
}

impl Client {
    pub fn create(input: ClientInput) -> Result<Self, AppError> {
        let now = Utc::now();
        let mut client = Self {
            id: Uuid::new_v4(),
            name: String::new(),
            email: None,
            phone: None,
            company: None,
            segment: None,
            status: ClientStatus::Lead,
            monthly_value: 0.0,
            notes: None,
            created_at: now,
            updated_at: now,
        };

        client.apply(input)?;

        Ok(client)
    }

    pub fn apply(&mut self, input: ClientInput) -> Result<(), AppError> {
        self.name = require_text("name", &input.name)?;
        self.monthly_value = money(require_non_negative("monthly_value", input.monthly_value)?);
        self.email = optional_text(input.email).map(|e| e.to_lowercase());
        self.phone = optional_text(input.phone);
        self.company = optional_text(input.company);
        self.segment = optional_text(input.segment);
        self.notes = optional_text(input.notes);
        self.status = input.status;
        self.updated_at = Utc::now();

        Ok(())
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ClientFilter {
    pub status: Option<ClientStatus>,
    pub q: Option<String>,
}

impl ClientFilter {
    pub fn matches(&self, client: &Client) -> bool {
        if self.status.is_some_and(|status| status != client.status) {
            return false;
        }

        let Some(query) = self.q.as_deref().map(normalize).filter(|q| !q.is_empty()) else {
            return true;
        };

        [Some(&client.name), client.company.as_ref(), client.email.as_ref()]
            .into_iter()
            .flatten()
            .any(|text| text.to_lowercase().contains(&query))
    }
}
