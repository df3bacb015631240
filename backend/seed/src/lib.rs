//! # Demo data
//!
//! Populates a fresh tenant through the public API, so everything seeded went through the same
//! validation, rules and goal sync as real traffic.
//!
//! ## Steps
//! 1. Register a company and keep the owner's token
//! 2. Create the alert rule first, so the ledger below raises alerts
//! 3. Clients, then a sales flow whose cards point at them
//! 4. A month of ledger entries, the roster, a KPI with weekly entries and one audit
//! 5. A goal bound to revenue and active clients
//! 6. `POST /goals/sync`
use anyhow::{Context, bail};
use chrono::{Datelike, Local, NaiveDate, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};

pub mod demo;

pub struct SeedOptions {
    pub base_url: String,
    pub clients: usize,
    pub email: Option<String>,
    pub password: String,
}

#[derive(Debug)]
pub struct SeedReport {
    pub email: String,
    pub requests: usize,
    pub goals_updated: usize,
    pub key_results_updated: usize,
}

#[derive(Deserialize)]
struct SyncReport {
    goals_updated: usize,
    key_results_updated: usize,
}

struct Api {
    client: Client,
    base_url: String,
    token: Option<String>,
    sent: usize,
}

impl Api {
    fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
            sent: 0,
        }
    }

    async fn post(&mut self, path: &str, body: &Value) -> anyhow::Result<Value> {
        let mut request = self
            .client
            .post(format!("{}{path}", self.base_url))
            .json(body);

        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("POST {path}"))?;

        let status = response.status();

        #[cfg(feature = "verbose")]
        println!("POST {path}: {status}");

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            bail!("POST {path} failed with {status}: {text}");
        }

        self.sent += 1;

        Ok(response.json().await?)
    }

    /// Creates every record and returns their ids.
    async fn post_all(&mut self, path: &str, bodies: &[Value]) -> anyhow::Result<Vec<String>> {
        let mut ids = Vec::with_capacity(bodies.len());

        for body in bodies {
            ids.push(id_of(&self.post(path, body).await?)?);
        }

        Ok(ids)
    }
}

fn id_of(record: &Value) -> anyhow::Result<String> {
    record["id"]
        .as_str()
        .map(str::to_string)
        .context("response without an id")
}

fn progress_bar(steps: u64) -> ProgressBar {
    let pb = ProgressBar::new(steps);

    match ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
    ) {
        Ok(style) => pb.set_style(style.progress_chars("=> ")),
        Err(e) => eprintln!("Falling back to the default progress style: {e}"),
    }

    pb
}

pub async fn seed(options: SeedOptions) -> anyhow::Result<SeedReport> {
    let today: NaiveDate = Local::now().date_naive();
    let email = options
        .email
        .unwrap_or_else(|| format!("demo+{}@gestor.dev", Utc::now().timestamp()));

    let mut api = Api::new(&options.base_url);
    let pb = progress_bar(8);

    pb.set_message("Registering company");
    let auth = api
        .post(
            "/auth/register",
            &json!({
                "company": "Padaria Demonstração",
                "name": "Dona Demo",
                "email": email,
                "password": options.password,
            }),
        )
        .await?;
    api.token = Some(
        auth["token"]
            .as_str()
            .context("register response without a token")?
            .to_string(),
    );
    pb.inc(1);

    pb.set_message("Creating rule");
    api.post("/rules", &demo::large_expense_rule()).await?;
    pb.inc(1);

    pb.set_message(format!("Creating {} clients", options.clients));
    let client_ids = api.post_all("/clients", &demo::clients(options.clients)).await?;
    pb.inc(1);

    pb.set_message("Creating sales flow");
    let flow_id = id_of(&api.post("/flows", &demo::sales_flow()).await?)?;
    api.post_all(&format!("/flows/{flow_id}/cards"), &demo::cards(&client_ids))
        .await?;
    pb.inc(1);

    pb.set_message(format!("Recording {}", today.format("%B %Y")));
    api.post_all("/transactions", &demo::transactions(today))
        .await?;
    pb.inc(1);

    pb.set_message("Hiring team");
    let hired_at = today.with_day(1).unwrap_or(today);
    api.post_all("/employees", &demo::employees(hired_at)).await?;
    pb.inc(1);

    pb.set_message("Recording KPI and audit");
    let kpi_id = id_of(&api.post("/kpis", &demo::kpi()).await?)?;
    api.post_all(&format!("/kpis/{kpi_id}/entries"), &demo::kpi_entries(today))
        .await?;
    api.post("/audits", &demo::audit(today)).await?;
    pb.inc(1);

    pb.set_message("Setting goal");
    api.post("/goals", &demo::revenue_goal(today)).await?;
    let sync: SyncReport = serde_json::from_value(api.post("/goals/sync", &json!({})).await?)?;
    pb.inc(1);

    pb.finish_with_message("Done");

    Ok(SeedReport {
        email,
        requests: api.sent,
        goals_updated: sync.goals_updated,
        key_results_updated: sync.key_results_updated,
    })
}
