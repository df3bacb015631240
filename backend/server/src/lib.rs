//! Documentation of a multi-tenant business management backend.
//!
//! One company registers, becomes a tenant, and manages its clients, Kanban flows, ledger, roster,
//! KPIs, maturity audits, goals and alert rules through a JSON REST API.
//!
//!
//!
//! # General Infrastructure
//! - Single axum server, stateless apart from the store
//! - Every request past `/auth` carries a `Bearer` token signed with `TOKEN_SECRET`
//! - The token names the tenant, handlers never take a tenant id from the path or body
//! - Records are JSON documents grouped by tenant and collection
//!
//!
//!
//! # Storage
//!
//! ## Redis
//! Each `(tenant, collection)` pair is one Redis hash, `gestor:{tenant}:{collection}`, mapping record
//! ids to JSON. Lookups are O(1) and listing a collection is a single `HVALS`. Aggregations (dashboard,
//! goal sync) read whole collections, which stays cheap at the size of one small company.
//!
//! ## Memory
//! `STORE_BACKEND=memory` swaps Redis for an in-process map. Used in development and by the tests,
//! nothing survives a restart.
//!
//! ## Login
//! Emails are unique across tenants. The `global` scope holds a `user_index` collection keyed by a
//! UUIDv5 of the lowercased email, pointing at the tenant and user id.
//!
//!
//!
//! # Derived data
//!
//! - Rules run right after each write of a watched record and store alerts
//! - `POST /goals/sync` recomputes every metric-bound key result
//! - The dashboard is computed per request from a snapshot of all the tenant's collections
//!
//!
//!
//! # Setup
//!
//! View current docs.
//! ```sh
//! cargo doc --open
//! ```
//!
//! Run locally without Redis.
//! ```sh
//! TOKEN_SECRET=$(openssl rand -hex 32) STORE_BACKEND=memory RUST_LOG=info cargo run -p gestor
//! ```
//!
//! Populate a demo tenant.
//! ```sh
//! cargo run -p gestor-seed -- http://localhost:8080 --clients 25
//! ```
//!
//!
//!
//! # Configuration
//!
//! | Variable          | Default                  |
//! |-------------------|--------------------------|
//! | `RUST_PORT`       | `8080`                   |
//! | `STORE_BACKEND`   | `memory`                 |
//! | `REDIS_URL`       | `redis://127.0.0.1:6379` |
//! | `TOKEN_SECRET`    | required, 32+ bytes      |
//! | `TOKEN_TTL_HOURS` | `12`                     |
//! | `CORS_ORIGINS`    | any origin               |
//!
//! `TOKEN_SECRET` is read from `/run/secrets/TOKEN_SECRET` first, then from the environment.
use std::{sync::Arc, time::Duration};

use axum::{
    Router,
    http::{
        HeaderValue, Method,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    routing::{delete, get, patch, post},
};

use signal::{
    ctrl_c,
    unix::{SignalKind, signal},
};
use tokio::{net::TcpListener, signal};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

pub mod audits;
pub mod auth;
pub mod clients;
pub mod config;
pub mod dashboard;
pub mod database;
pub mod error;
pub mod export;
pub mod flows;
pub mod goals;
pub mod hr;
pub mod kpis;
pub mod ledger;
pub mod routes;
pub mod rules;
pub mod snapshot;
pub mod state;
pub mod store;
pub mod utils;

use config::Config;
use routes::health_handler;
use state::AppState;

fn cors(origins: &[String]) -> CorsLayer {
    let allow_origin: AllowOrigin = if origins.is_empty() {
        Any.into()
    } else {
        AllowOrigin::list(origins.iter().filter_map(|origin| {
            HeaderValue::from_str(origin)
                .inspect_err(|_| warn!("Ignoring invalid CORS origin {origin}"))
                .ok()
        }))
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .max_age(Duration::from_secs(60 * 60))
}

pub fn app(state: Arc<AppState>) -> Router {
    use routes::{audits, auth, clients, dashboard, export, flows, goals, hr, kpis, ledger, rules};

    Router::new()
        .route("/health", get(health_handler))
        .route("/auth/register", post(auth::register_handler))
        .route("/auth/login", post(auth::login_handler))
        .route("/auth/me", get(auth::me_handler))
        .route(
            "/users",
            get(auth::list_users_handler).post(auth::create_user_handler),
        )
        .route(
            "/clients",
            get(clients::list_handler).post(clients::create_handler),
        )
        .route(
            "/clients/{id}",
            get(clients::get_handler)
                .put(clients::update_handler)
                .delete(clients::delete_handler),
        )
        .route("/flows", get(flows::list_handler).post(flows::create_handler))
        .route(
            "/flows/{id}",
            get(flows::get_handler)
                .put(flows::update_handler)
                .delete(flows::delete_handler),
        )
        .route("/flows/{id}/board", get(flows::board_handler))
        .route(
            "/flows/{id}/cards",
            get(flows::list_cards_handler).post(flows::create_card_handler),
        )
        .route(
            "/flows/{id}/cards/{card_id}",
            get(flows::get_card_handler)
                .put(flows::update_card_handler)
                .delete(flows::delete_card_handler),
        )
        .route("/cards/{id}/move", post(flows::move_card_handler))
        .route(
            "/transactions",
            get(ledger::list_handler).post(ledger::create_handler),
        )
        .route(
            "/transactions/{id}",
            get(ledger::get_handler)
                .put(ledger::update_handler)
                .delete(ledger::delete_handler),
        )
        .route("/ledger/summary", get(ledger::summary_handler))
        .route("/employees", get(hr::list_handler).post(hr::create_handler))
        .route("/employees/summary", get(hr::summary_handler))
        .route(
            "/employees/{id}",
            get(hr::get_handler)
                .put(hr::update_handler)
                .delete(hr::delete_handler),
        )
        .route("/kpis", get(kpis::list_handler).post(kpis::create_handler))
        .route(
            "/kpis/{id}",
            get(kpis::get_handler)
                .put(kpis::update_handler)
                .delete(kpis::delete_handler),
        )
        .route(
            "/kpis/{id}/entries",
            get(kpis::list_entries_handler).post(kpis::create_entry_handler),
        )
        .route(
            "/audits",
            get(audits::list_handler).post(audits::create_handler),
        )
        .route("/audits/overview", get(audits::overview_handler))
        .route(
            "/audits/{id}",
            get(audits::get_handler)
                .put(audits::update_handler)
                .delete(audits::delete_handler),
        )
        .route("/goals", get(goals::list_handler).post(goals::create_handler))
        .route("/goals/sync", post(goals::sync_handler))
        .route(
            "/goals/{id}",
            get(goals::get_handler)
                .put(goals::update_handler)
                .delete(goals::delete_handler),
        )
        .route(
            "/goals/{id}/key-results/{kr_id}",
            patch(goals::check_in_handler),
        )
        .route("/rules", get(rules::list_handler).post(rules::create_handler))
        .route(
            "/rules/{id}",
            get(rules::get_handler)
                .put(rules::update_handler)
                .delete(rules::delete_handler),
        )
        .route("/rules/{id}/test", post(rules::test_handler))
        .route("/alerts", get(rules::list_alerts_handler))
        .route("/alerts/{id}", delete(rules::delete_alert_handler))
        .route("/alerts/{id}/ack", post(rules::ack_alert_handler))
        .route("/dashboard", get(dashboard::dashboard_handler))
        .route("/dashboard/cashflow", get(dashboard::cashflow_handler))
        .route("/export/{resource}", get(export::export_handler))
        .layer(cors(&state.config.cors_origins))
        .with_state(state)
}

pub async fn start_server() -> anyhow::Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Loading config...");
    let config = Config::load()?;

    info!("Initializing state...");
    let state = AppState::new(config).await?;

    info!("Starting server...");

    let address = format!("0.0.0.0:{}", state.config.port);
    let app = app(state);

    info!("Binding to {address}");

    let listener = TcpListener::bind(&address).await?;
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutting down...");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                error!("Failed to install Ctrl+C handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                error!("Failed to install signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
