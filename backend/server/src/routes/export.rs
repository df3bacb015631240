use std::sync::Arc;

use axum::{
    extract::State,
    http::header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    response::{IntoResponse, Response},
};
use tracing::info;

use super::Path;
use crate::{
    auth::AuthUser,
    clients::Client,
    error::AppError,
    export::{ExportResource, alerts_csv, clients_csv, employees_csv, transactions_csv},
    hr::Employee,
    ledger::{Transaction, sort_newest_first},
    rules::{Alert, sort_alerts},
    state::AppState,
};

pub async fn export_handler(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(resource): Path<String>,
) -> Result<Response, AppError> {
    let resource: ExportResource = resource.parse()?;

    let body = match resource {
        ExportResource::Clients => {
            let mut clients = state.repo::<Client>(&auth).list().await?;
            clients.sort_by_key(|client| client.name.to_lowercase());
            clients_csv(&clients)?
        }
        ExportResource::Transactions => {
            let mut transactions = state.repo::<Transaction>(&auth).list().await?;
            sort_newest_first(&mut transactions);
            transactions_csv(&transactions)?
        }
        ExportResource::Employees => {
            let mut employees = state.repo::<Employee>(&auth).list().await?;
            employees.sort_by_key(|employee| employee.name.to_lowercase());
            employees_csv(&employees)?
        }
        ExportResource::Alerts => {
            let mut alerts = state.repo::<Alert>(&auth).list().await?;
            sort_alerts(&mut alerts);
            alerts_csv(&alerts)?
        }
    };

    info!(tenant = %auth.tenant_id, "Exported {} ({} bytes)", resource.file_name(), body.len());

    Ok((
        [
            (CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", resource.file_name()),
            ),
        ],
        body,
    )
        .into_response())
}
