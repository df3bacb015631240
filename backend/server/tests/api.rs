use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{
        HeaderName, Method, Request, StatusCode,
        header::{AUTHORIZATION, CONTENT_DISPOSITION, CONTENT_TYPE},
    },
};
use chrono::{DateTime, Utc};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use gestor_server::{
    app,
    config::{Config, StoreBackend},
    state::AppState,
    store::{MemoryStore, Store, StoreError},
    utils::{Month, today},
};

const PASSWORD: &str = "senha-segura";

/// Memory store that can be told to refuse writes to one collection.
#[derive(Default)]
struct TestStore {
    inner: MemoryStore,
    refused: Mutex<Option<&'static str>>,
}

impl TestStore {
    fn refuse_writes(&self, collection: Option<&'static str>) {
        *self.refused.lock().unwrap() = collection;
    }

    async fn count(&self, scope: &str, collection: &str) -> usize {
        self.inner.list(scope, collection).await.unwrap().len()
    }
}

#[async_trait]
impl Store for TestStore {
    async fn get(&self, scope: &str, collection: &str, id: &str) -> Result<Option<String>, StoreError> {
        self.inner.get(scope, collection, id).await
    }

    async fn list(&self, scope: &str, collection: &str) -> Result<Vec<String>, StoreError> {
        self.inner.list(scope, collection).await
    }

    async fn put(&self, scope: &str, collection: &str, id: &str, value: String) -> Result<(), StoreError> {
        if *self.refused.lock().unwrap() == Some(collection) {
            return Err(StoreError::Backend("write refused".into()));
        }

        self.inner.put(scope, collection, id, value).await
    }

    async fn delete(&self, scope: &str, collection: &str, id: &str) -> Result<bool, StoreError> {
        self.inner.delete(scope, collection, id).await
    }
}

struct TestApp {
    router: Router,
    store: Arc<TestStore>,
}

struct Reply {
    status: StatusCode,
    content_type: Option<String>,
    disposition: Option<String>,
    text: String,
}

impl Reply {
    fn json(&self) -> Value {
        serde_json::from_str(&self.text).unwrap_or(Value::Null)
    }
}

impl TestApp {
    fn new() -> Self {
        let config = Config {
            port: 0,
            store_backend: StoreBackend::Memory,
            redis_url: String::new(),
            token_secret: "test-secret-test-secret-test-secret".to_string(),
            token_ttl_hours: 1,
            cors_origins: Vec::new(),
        };

        let store = Arc::new(TestStore::default());
        let state = AppState::with_store(config, store.clone());

        Self {
            router: app(state),
            store,
        }
    }

    async fn request(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Reply {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(token) = token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
        }

        let body = match body {
            Some(value) => {
                builder = builder.header(CONTENT_TYPE, "application/json");
                Body::from(serde_json::to_vec(&value).unwrap())
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();

        let header = |name: HeaderName| {
            response
                .headers()
                .get(name)
                .map(|value| value.to_str().unwrap().to_string())
        };
        let status = response.status();
        let content_type = header(CONTENT_TYPE);
        let disposition = header(CONTENT_DISPOSITION);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();

        Reply {
            status,
            content_type,
            disposition,
            text: String::from_utf8(bytes.to_vec()).unwrap(),
        }
    }

    async fn get(&self, uri: &str, token: &str) -> Reply {
        self.request(Method::GET, uri, Some(token), None).await
    }

    async fn post(&self, uri: &str, token: &str, body: Value) -> Reply {
        self.request(Method::POST, uri, Some(token), Some(body)).await
    }

    async fn put(&self, uri: &str, token: &str, body: Value) -> Reply {
        self.request(Method::PUT, uri, Some(token), Some(body)).await
    }

    async fn tenant_of(&self, token: &str) -> String {
        self.get("/auth/me", token).await.json()["tenant_id"]
            .as_str()
            .unwrap()
            .to_string()
    }

    /// Registers a company and returns the owner's token.
    async fn register(&self, email: &str) -> String {
        let reply = self
            .request(
                Method::POST,
                "/auth/register",
                None,
                Some(json!({
                    "company": "Padaria Central",
                    "name": "Ana Souza",
                    "email": email,
                    "password": PASSWORD,
                })),
            )
            .await;

        assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.text);
        reply.json()["token"].as_str().unwrap().to_string()
    }
}

#[tokio::test]
async fn test_health_needs_no_token() {
    let app = TestApp::new();

    let reply = app.request(Method::GET, "/health", None, None).await;

    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.text, "ok");
}

#[tokio::test]
async fn test_register_login_and_me() {
    let app = TestApp::new();
    let token = app.register("Ana@Padaria.com.br").await;

    let me = app.get("/auth/me", &token).await.json();
    assert_eq!(me["email"], "ana@padaria.com.br");
    assert_eq!(me["role"], "owner");
    assert!(me.get("password_hash").is_none());

    let duplicate = app
        .request(
            Method::POST,
            "/auth/register",
            None,
            Some(json!({
                "company": "Outra",
                "name": "Outra Pessoa",
                "email": "ana@padaria.com.br",
                "password": PASSWORD,
            })),
        )
        .await;
    assert_eq!(duplicate.status, StatusCode::CONFLICT);

    let wrong = app
        .request(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "email": "ana@padaria.com.br", "password": "errada-demais" })),
        )
        .await;
    assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);

    let unknown = app
        .request(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "email": "ninguem@padaria.com.br", "password": PASSWORD })),
        )
        .await;
    assert_eq!(unknown.status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong.json(), unknown.json());

    let login = app
        .request(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "email": " ANA@padaria.com.br ", "password": PASSWORD })),
        )
        .await;
    assert_eq!(login.status, StatusCode::OK);
    assert_eq!(login.json()["user"]["id"], me["id"]);
}

#[tokio::test]
async fn test_short_password_is_rejected() {
    let app = TestApp::new();

    let reply = app
        .request(
            Method::POST,
            "/auth/register",
            None,
            Some(json!({
                "company": "Padaria",
                "name": "Ana",
                "email": "ana@padaria.com.br",
                "password": "curta",
            })),
        )
        .await;

    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_missing_or_bad_token_is_unauthorized() {
    let app = TestApp::new();

    let missing = app.request(Method::GET, "/clients", None, None).await;
    let garbage = app.get("/clients", "not-a-token").await;

    assert_eq!(missing.status, StatusCode::UNAUTHORIZED);
    assert_eq!(garbage.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_malformed_payload() {
    let app = TestApp::new();
    let token = app.register("ana@padaria.com.br").await;

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/clients")
                .header(AUTHORIZATION, format!("Bearer {token}"))
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from("{\"name\": "))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_tenants_are_isolated() {
    let app = TestApp::new();
    let first = app.register("ana@padaria.com.br").await;
    let second = app.register("bruno@oficina.com.br").await;

    let client = app
        .post("/clients", &first, json!({ "name": "Mercado Bom Preço", "status": "active" }))
        .await;
    assert_eq!(client.status, StatusCode::CREATED);
    let id = client.json()["id"].as_str().unwrap().to_string();

    let foreign = app.get(&format!("/clients/{id}"), &second).await;
    assert_eq!(foreign.status, StatusCode::NOT_FOUND);
    assert_eq!(app.get("/clients", &second).await.json(), json!([]));

    let own = app.get("/clients?status=active&q=bom", &first).await.json();
    assert_eq!(own.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_members_cannot_delete_or_manage() {
    let app = TestApp::new();
    let owner = app.register("ana@padaria.com.br").await;

    let created = app
        .post(
            "/users",
            &owner,
            json!({ "name": "Carla", "email": "carla@padaria.com.br", "password": PASSWORD }),
        )
        .await;
    assert_eq!(created.status, StatusCode::CREATED);
    assert_eq!(created.json()["role"], "member");

    let login = app
        .request(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "email": "carla@padaria.com.br", "password": PASSWORD })),
        )
        .await
        .json();
    let member = login["token"].as_str().unwrap();

    let client = app.post("/clients", member, json!({ "name": "Loja Azul" })).await;
    assert_eq!(client.status, StatusCode::CREATED);
    let id = client.json()["id"].as_str().unwrap().to_string();

    let delete = app
        .request(Method::DELETE, &format!("/clients/{id}"), Some(member), None)
        .await;
    assert_eq!(delete.status, StatusCode::FORBIDDEN);

    let rule = app
        .post(
            "/rules",
            member,
            json!({
                "name": "Cliente perdido",
                "entity": "client",
                "field": "status",
                "operator": "eq",
                "threshold": "churned",
            }),
        )
        .await;
    assert_eq!(rule.status, StatusCode::FORBIDDEN);

    let owner_delete = app
        .request(Method::DELETE, &format!("/clients/{id}"), Some(&owner), None)
        .await;
    assert_eq!(owner_delete.status, StatusCode::NO_CONTENT);
    assert_eq!(app.get("/users", &owner).await.json().as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_rule_raises_alert_on_write() {
    let app = TestApp::new();
    let token = app.register("ana@padaria.com.br").await;

    let rule = app
        .post(
            "/rules",
            &token,
            json!({
                "name": "Despesa alta",
                "entity": "transaction",
                "field": "amount",
                "operator": "gt",
                "threshold": 10000,
                "severity": "critical",
            }),
        )
        .await;
    assert_eq!(rule.status, StatusCode::CREATED);
    let rule_id = rule.json()["id"].as_str().unwrap().to_string();

    let dry_run = app
        .post(
            &format!("/rules/{rule_id}/test"),
            &token,
            json!({ "record": { "amount": "12000" } }),
        )
        .await
        .json();
    assert_eq!(dry_run["matched"], true);

    for amount in [500.0, 15000.0] {
        let reply = app
            .post(
                "/transactions",
                &token,
                json!({
                    "kind": "expense",
                    "category": "Equipamentos",
                    "amount": amount,
                    "date": today(),
                }),
            )
            .await;
        assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.text);
    }

    let alerts = app.get("/alerts", &token).await.json();
    let alerts = alerts.as_array().unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0]["severity"], "critical");
    assert_eq!(alerts[0]["rule_id"], rule_id.as_str());
    assert!(alerts[0]["message"].as_str().unwrap().starts_with("Despesa alta: amount gt 10000"));

    let dashboard = app.get("/dashboard", &token).await.json();
    assert_eq!(dashboard["alerts"]["critical"], 1);
    assert_eq!(dashboard["finance"]["expenses"], 15500.0);

    let alert_id = alerts[0]["id"].as_str().unwrap();
    let ack = app
        .request(Method::POST, &format!("/alerts/{alert_id}/ack"), Some(&token), None)
        .await;
    assert_eq!(ack.status, StatusCode::OK);

    let open = app.get("/alerts?acknowledged=false", &token).await.json();
    assert_eq!(open, json!([]));
}

#[tokio::test]
async fn test_goals_sync_pulls_revenue() {
    let app = TestApp::new();
    let token = app.register("ana@padaria.com.br").await;
    let month = Month::containing(today());

    let goal = app
        .post(
            "/goals",
            &token,
            json!({
                "title": "Faturar mais",
                "period_start": month.first,
                "period_end": month.last,
                "key_results": [
                    {
                        "title": "Receita do mês",
                        "metric": { "kind": "revenue" },
                        "target_value": 10000.0,
                    },
                    {
                        "title": "Pesquisa de satisfação",
                        "target_value": 10.0,
                    },
                ],
            }),
        )
        .await;
    assert_eq!(goal.status, StatusCode::CREATED, "{}", goal.text);
    let goal = goal.json();
    let goal_id = goal["id"].as_str().unwrap().to_string();
    assert_eq!(goal["progress"], 0.0);

    app.post(
        "/transactions",
        &token,
        json!({
            "kind": "income",
            "category": "Vendas",
            "amount": 5000.0,
            "date": today(),
        }),
    )
    .await;

    let report = app.post("/goals/sync", &token, json!({})).await.json();
    assert_eq!(report, json!({ "goals_updated": 1, "key_results_updated": 1 }));

    let again = app.post("/goals/sync", &token, json!({})).await.json();
    assert_eq!(again["goals_updated"], 0);

    let goal = app.get(&format!("/goals/{goal_id}"), &token).await.json();
    assert_eq!(goal["key_results"][0]["current_value"], 5000.0);
    assert_eq!(goal["key_results"][0]["progress"], 50.0);
    assert_eq!(goal["progress"], 25.0);

    let bound = goal["key_results"][0]["id"].as_str().unwrap();
    let refused = app
        .request(
            Method::PATCH,
            &format!("/goals/{goal_id}/key-results/{bound}"),
            Some(&token),
            Some(json!({ "current_value": 9000.0 })),
        )
        .await;
    assert_eq!(refused.status, StatusCode::BAD_REQUEST);

    let manual = goal["key_results"][1]["id"].as_str().unwrap();
    let checked = app
        .request(
            Method::PATCH,
            &format!("/goals/{goal_id}/key-results/{manual}"),
            Some(&token),
            Some(json!({ "current_value": 10.0 })),
        )
        .await
        .json();
    assert_eq!(checked["progress"], 75.0);
}

#[tokio::test]
async fn test_card_moves_keep_positions_dense() {
    let app = TestApp::new();
    let token = app.register("ana@padaria.com.br").await;

    let flow = app
        .post(
            "/flows",
            &token,
            json!({ "name": "Vendas", "stages": ["Prospecção", "Proposta", "Fechado"] }),
        )
        .await
        .json();
    let flow_id = flow["id"].as_str().unwrap().to_string();

    let mut cards = Vec::new();
    for title in ["Padaria", "Mercado", "Oficina"] {
        let card = app
            .post(
                &format!("/flows/{flow_id}/cards"),
                &token,
                json!({ "title": title, "value": 1000.0 }),
            )
            .await;
        assert_eq!(card.status, StatusCode::CREATED);
        cards.push(card.json());
    }
    assert_eq!(cards[2]["stage"], "Prospecção");
    assert_eq!(cards[2]["position"], 2);

    let first_id = cards[0]["id"].as_str().unwrap();
    let moved = app
        .post(
            &format!("/cards/{first_id}/move"),
            &token,
            json!({ "stage": "Proposta" }),
        )
        .await
        .json();
    assert_eq!(moved["stage"], "Proposta");
    assert_eq!(moved["position"], 0);

    let board = app.get(&format!("/flows/{flow_id}/board"), &token).await.json();
    let columns = board["columns"].as_array().unwrap();
    let titles = |column: &Value| -> Vec<(String, u64)> {
        column["cards"]
            .as_array()
            .unwrap()
            .iter()
            .map(|card| {
                (
                    card["title"].as_str().unwrap().to_string(),
                    card["position"].as_u64().unwrap(),
                )
            })
            .collect()
    };
    assert_eq!(
        titles(&columns[0]),
        vec![("Mercado".to_string(), 0), ("Oficina".to_string(), 1)]
    );
    assert_eq!(titles(&columns[1]), vec![("Padaria".to_string(), 0)]);
    assert_eq!(columns[1]["total_value"], 1000.0);

    let bad_stage = app
        .post(
            &format!("/cards/{first_id}/move"),
            &token,
            json!({ "stage": "Arquivado" }),
        )
        .await;
    assert_eq!(bad_stage.status, StatusCode::BAD_REQUEST);

    let shrink = app
        .request(
            Method::PUT,
            &format!("/flows/{flow_id}"),
            Some(&token),
            Some(json!({ "name": "Vendas", "stages": ["Prospecção", "Fechado"] })),
        )
        .await;
    assert_eq!(shrink.status, StatusCode::CONFLICT);

    let delete = app
        .request(Method::DELETE, &format!("/flows/{flow_id}"), Some(&token), None)
        .await;
    assert_eq!(delete.status, StatusCode::NO_CONTENT);

    let orphan = app
        .get(&format!("/flows/{flow_id}/cards/{first_id}"), &token)
        .await;
    assert_eq!(orphan.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_kpi_status_follows_latest_entry() {
    let app = TestApp::new();
    let token = app.register("ana@padaria.com.br").await;

    let kpi = app
        .post(
            "/kpis",
            &token,
            json!({ "name": "Ticket médio", "target": 100.0 }),
        )
        .await
        .json();
    assert_eq!(kpi["status"], "no_data");
    let kpi_id = kpi["id"].as_str().unwrap().to_string();

    for (value, date) in [(120.0, "2024-03-01"), (80.0, "2024-02-01")] {
        let entry = app
            .post(
                &format!("/kpis/{kpi_id}/entries"),
                &token,
                json!({ "value": value, "date": date }),
            )
            .await;
        assert_eq!(entry.status, StatusCode::CREATED);
    }

    let view = app.get(&format!("/kpis/{kpi_id}"), &token).await.json();
    assert_eq!(view["latest_value"], 120.0);
    assert_eq!(view["status"], "on_track");

    let entries = app.get(&format!("/kpis/{kpi_id}/entries"), &token).await.json();
    assert_eq!(entries[0]["date"], "2024-02-01");
}

#[tokio::test]
async fn test_csv_export() {
    let app = TestApp::new();
    let token = app.register("ana@padaria.com.br").await;

    app.post(
        "/clients",
        &token,
        json!({ "name": "Silva, Souza & Cia", "monthly_value": 250.0 }),
    )
    .await;

    let export = app.get("/export/clients", &token).await;

    assert_eq!(export.status, StatusCode::OK);
    assert!(export.content_type.unwrap().starts_with("text/csv"));
    assert_eq!(
        export.disposition.as_deref(),
        Some("attachment; filename=\"clients.csv\"")
    );

    let mut lines = export.text.lines();
    assert_eq!(
        lines.next(),
        Some("id,name,company,email,phone,segment,status,monthly_value,created_at")
    );
    assert!(lines.next().unwrap().contains("\"Silva, Souza & Cia\""));

    let unknown = app.get("/export/users", &token).await;
    assert_eq!(unknown.status, StatusCode::NOT_FOUND);
}

fn id_of(reply: &Reply) -> String {
    reply.json()["id"].as_str().unwrap().to_string()
}

fn assert_json_error(reply: &Reply, status: StatusCode) {
    assert_eq!(reply.status, status, "{}", reply.text);
    assert_eq!(reply.content_type.as_deref(), Some("application/json"));
    assert!(reply.json()["error"].is_string(), "{}", reply.text);
}

#[tokio::test]
async fn test_oversized_amounts_are_rejected() {
    let app = TestApp::new();
    let token = app.register("ana@padaria.com.br").await;

    let huge = app
        .post(
            "/transactions",
            &token,
            json!({ "kind": "income", "category": "Vendas", "amount": 1e307, "date": today() }),
        )
        .await;
    assert_json_error(&huge, StatusCode::BAD_REQUEST);

    let client = app
        .post("/clients", &token, json!({ "name": "Loja Azul", "monthly_value": 1e307 }))
        .await;
    assert_json_error(&client, StatusCode::BAD_REQUEST);

    let entry = app
        .post(
            "/transactions",
            &token,
            json!({ "kind": "income", "category": "Vendas", "amount": 1e9, "date": today() }),
        )
        .await;
    assert_eq!(entry.status, StatusCode::CREATED);

    assert_eq!(app.get("/transactions", &token).await.status, StatusCode::OK);
    assert_eq!(app.get("/dashboard", &token).await.status, StatusCode::OK);
    assert_eq!(
        app.post("/goals/sync", &token, json!({})).await.status,
        StatusCode::OK
    );
}

#[tokio::test]
async fn test_bad_path_and_query_answer_json_errors() {
    let app = TestApp::new();
    let token = app.register("ana@padaria.com.br").await;

    assert_json_error(&app.get("/clients/not-a-uuid", &token).await, StatusCode::BAD_REQUEST);
    assert_json_error(&app.get("/clients?status=bogus", &token).await, StatusCode::BAD_REQUEST);
    assert_json_error(
        &app.get("/dashboard/cashflow?months=-1", &token).await,
        StatusCode::BAD_REQUEST,
    );
    assert_json_error(
        &app.get("/transactions?from=ontem", &token).await,
        StatusCode::BAD_REQUEST,
    );
}

#[tokio::test]
async fn test_numeric_text_threshold_matches_stored_amounts() {
    let app = TestApp::new();
    let token = app.register("ana@padaria.com.br").await;

    let rule = app
        .post(
            "/rules",
            &token,
            json!({
                "name": "Valor exato",
                "entity": "transaction",
                "field": "amount",
                "operator": "eq",
                "threshold": "15000",
            }),
        )
        .await;
    assert_eq!(rule.status, StatusCode::CREATED);
    let rule_id = id_of(&rule);

    app.post(
        "/transactions",
        &token,
        json!({ "kind": "expense", "category": "Obras", "amount": 15000, "date": today() }),
    )
    .await;

    let dry_run = app
        .post(
            &format!("/rules/{rule_id}/test"),
            &token,
            json!({ "record": { "amount": 15000 } }),
        )
        .await
        .json();
    assert_eq!(dry_run["matched"], true);

    let alerts = app.get("/alerts", &token).await.json();
    assert_eq!(alerts.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_every_matching_rule_raises_an_alert_in_creation_order() {
    let app = TestApp::new();
    let token = app.register("ana@padaria.com.br").await;

    let mut rule_ids = Vec::new();
    for (name, field, operator, threshold, active) in [
        ("Despesa acima de mil", "amount", "gt", json!(1000), true),
        ("Aluguel", "category", "eq", json!("aluguel"), true),
        ("Desligada", "amount", "gt", json!(0), false),
    ] {
        let rule = app
            .post(
                "/rules",
                &token,
                json!({
                    "name": name,
                    "entity": "transaction",
                    "field": field,
                    "operator": operator,
                    "threshold": threshold,
                    "active": active,
                }),
            )
            .await;
        assert_eq!(rule.status, StatusCode::CREATED, "{}", rule.text);
        rule_ids.push(id_of(&rule));
    }

    let transaction = app
        .post(
            "/transactions",
            &token,
            json!({ "kind": "expense", "category": "Aluguel", "amount": 5000.0, "date": today() }),
        )
        .await;
    let transaction_id = id_of(&transaction);

    let alerts = app.get("/alerts", &token).await.json();
    let alerts = alerts.as_array().unwrap();
    assert_eq!(alerts.len(), 2);
    assert!(alerts.iter().all(|alert| alert["record_id"] == transaction_id.as_str()));

    let raised_at = |rule_id: &str| -> DateTime<Utc> {
        let alert = alerts
            .iter()
            .find(|alert| alert["rule_id"] == rule_id)
            .unwrap();
        alert["created_at"].as_str().unwrap().parse().unwrap()
    };
    assert!(raised_at(&rule_ids[0]) <= raised_at(&rule_ids[1]));
    assert!(alerts.iter().all(|alert| alert["rule_id"] != rule_ids[2].as_str()));
}

#[tokio::test]
async fn test_deleting_kpi_deletes_its_entries() {
    let app = TestApp::new();
    let token = app.register("ana@padaria.com.br").await;
    let tenant = app.tenant_of(&token).await;

    let kpi = app
        .post("/kpis", &token, json!({ "name": "Ticket médio", "target": 100.0 }))
        .await;
    let kpi_id = id_of(&kpi);

    for date in ["2024-03-01", "2024-03-08"] {
        app.post(
            &format!("/kpis/{kpi_id}/entries"),
            &token,
            json!({ "value": 90.0, "date": date }),
        )
        .await;
    }
    assert_eq!(app.store.count(&tenant, "kpi_entries").await, 2);

    let delete = app
        .request(Method::DELETE, &format!("/kpis/{kpi_id}"), Some(&token), None)
        .await;
    assert_eq!(delete.status, StatusCode::NO_CONTENT);

    assert_eq!(app.store.count(&tenant, "kpi_entries").await, 0);
    assert_eq!(
        app.get(&format!("/kpis/{kpi_id}"), &token).await.status,
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn test_card_update_to_new_stage_compacts_old_stage() {
    let app = TestApp::new();
    let token = app.register("ana@padaria.com.br").await;

    let flow = app
        .post(
            "/flows",
            &token,
            json!({ "name": "Vendas", "stages": ["Prospecção", "Proposta"] }),
        )
        .await;
    let flow_id = id_of(&flow);

    let mut card_ids = Vec::new();
    for title in ["Padaria", "Mercado", "Oficina"] {
        let card = app
            .post(&format!("/flows/{flow_id}/cards"), &token, json!({ "title": title }))
            .await;
        card_ids.push(id_of(&card));
    }

    let updated = app
        .put(
            &format!("/flows/{flow_id}/cards/{}", card_ids[0]),
            &token,
            json!({ "title": "Padaria Central", "stage": "Proposta" }),
        )
        .await;
    assert_eq!(updated.status, StatusCode::OK, "{}", updated.text);
    let updated = updated.json();
    assert_eq!(updated["stage"], "Proposta");
    assert_eq!(updated["position"], 0);

    let cards = app.get(&format!("/flows/{flow_id}/cards"), &token).await.json();
    let mut left: Vec<(String, u64)> = cards
        .as_array()
        .unwrap()
        .iter()
        .filter(|card| card["stage"] == "Prospecção")
        .map(|card| {
            (
                card["title"].as_str().unwrap().to_string(),
                card["position"].as_u64().unwrap(),
            )
        })
        .collect();
    left.sort_by_key(|(_, position)| *position);

    assert_eq!(
        left,
        vec![("Mercado".to_string(), 0), ("Oficina".to_string(), 1)]
    );
}

#[tokio::test]
async fn test_ledger_summary_uses_date_range_only() {
    let app = TestApp::new();
    let token = app.register("ana@padaria.com.br").await;

    for (kind, amount, date, paid) in [
        ("income", 1000.0, "2024-03-05", true),
        ("income", 400.0, "2024-03-10", false),
        ("expense", 300.0, "2024-03-12", false),
        ("expense", 999.0, "2024-04-02", true),
    ] {
        let reply = app
            .post(
                "/transactions",
                &token,
                json!({
                    "kind": kind,
                    "category": "Geral",
                    "amount": amount,
                    "date": date,
                    "paid": paid,
                }),
            )
            .await;
        assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.text);
    }

    let summary = app
        .get(
            "/ledger/summary?from=2024-03-01&to=2024-03-31&kind=expense",
            &token,
        )
        .await
        .json();

    assert_eq!(summary["income"], 1400.0);
    assert_eq!(summary["expense"], 300.0);
    assert_eq!(summary["balance"], 1100.0);
    assert_eq!(summary["receivables"], 400.0);
    assert_eq!(summary["payables"], 300.0);
    assert_eq!(summary["by_category"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_employee_summary_counts_active_only() {
    let app = TestApp::new();
    let token = app.register("ana@padaria.com.br").await;

    for (name, department, salary, active) in [
        ("Bruno Lima", "Comercial", 2800.0, true),
        ("Carla Costa", "Comercial", 2600.0, true),
        ("Diego Silva", "Financeiro", 4200.0, false),
    ] {
        let reply = app
            .post(
                "/employees",
                &token,
                json!({
                    "name": name,
                    "position": "Analista",
                    "department": department,
                    "salary": salary,
                    "hired_at": "2024-01-15",
                    "active": active,
                }),
            )
            .await;
        assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.text);
    }

    let summary = app.get("/employees/summary", &token).await.json();

    assert_eq!(summary["headcount"], 2);
    assert_eq!(summary["payroll"], 5400.0);
    assert_eq!(summary["by_department"], json!({ "Comercial": 2 }));
}

#[tokio::test]
async fn test_audit_overview_keeps_latest_per_area() {
    let app = TestApp::new();
    let token = app.register("ana@padaria.com.br").await;

    for (area, date, scores) in [
        ("Financeiro", "2024-01-10", [1, 1]),
        ("financeiro", "2024-03-10", [3, 4]),
        ("Comercial", "2024-02-01", [2, 2]),
    ] {
        let items: Vec<Value> = scores
            .iter()
            .map(|score| json!({ "question": "Processo documentado?", "score": score }))
            .collect();

        let reply = app
            .post("/audits", &token, json!({ "area": area, "date": date, "items": items }))
            .await;
        assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.text);
    }

    let overview = app.get("/audits/overview", &token).await.json();
    let areas = overview["areas"].as_array().unwrap();

    assert_eq!(areas.len(), 2);
    assert_eq!(areas[0]["area"], "Comercial");
    assert_eq!(areas[1]["score"], 3.5);
    assert_eq!(areas[1]["date"], "2024-03-10");
    assert_eq!(overview["average"], 2.75);
    assert_eq!(overview["level"], "defined");
}

#[tokio::test]
async fn test_cashflow_window_is_clamped() {
    let app = TestApp::new();
    let token = app.register("ana@padaria.com.br").await;

    app.post(
        "/transactions",
        &token,
        json!({ "kind": "income", "category": "Vendas", "amount": 1000.0, "date": today() }),
    )
    .await;

    let default = app.get("/dashboard/cashflow", &token).await.json();
    let points = default.as_array().unwrap();
    assert_eq!(points.len(), 6);
    assert_eq!(points[5]["month"], Month::containing(today()).label());
    assert_eq!(points[5]["revenue"], 1000.0);
    assert_eq!(points[0]["revenue"], 0.0);

    let capped = app.get("/dashboard/cashflow?months=100", &token).await.json();
    assert_eq!(capped.as_array().unwrap().len(), 24);

    let floor = app.get("/dashboard/cashflow?months=0", &token).await.json();
    assert_eq!(floor.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_failed_signup_releases_email() {
    let app = TestApp::new();

    app.store.refuse_writes(Some("users"));
    let failed = app
        .request(
            Method::POST,
            "/auth/register",
            None,
            Some(json!({
                "company": "Padaria Central",
                "name": "Ana Souza",
                "email": "ana@padaria.com.br",
                "password": PASSWORD,
            })),
        )
        .await;
    assert_json_error(&failed, StatusCode::INTERNAL_SERVER_ERROR);

    app.store.refuse_writes(None);
    let token = app.register("ana@padaria.com.br").await;
    assert_eq!(app.get("/auth/me", &token).await.status, StatusCode::OK);
}
