use std::sync::Arc;

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::Response,
};
use uuid::Uuid;

use super::{Path, Payload, Query, created};
use crate::{
    auth::AuthUser,
    error::AppError,
    hr::{Employee, EmployeeFilter, EmployeeInput, RosterSummary, summarize},
    rules::{RuleEntity, RulesService},
    state::AppState,
};

pub async fn list_handler(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Query(filter): Query<EmployeeFilter>,
) -> Result<Json<Vec<Employee>>, AppError> {
    let mut employees: Vec<Employee> = state
        .repo::<Employee>(&auth)
        .list()
        .await?
        .into_iter()
        .filter(|employee| filter.matches(employee))
        .collect();

    employees.sort_by_key(|employee| employee.name.to_lowercase());

    Ok(Json(employees))
}

pub async fn summary_handler(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<RosterSummary>, AppError> {
    let employees = state.repo::<Employee>(&auth).list().await?;

    Ok(Json(summarize(&employees)))
}

pub async fn get_handler(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Employee>, AppError> {
    Ok(Json(state.repo::<Employee>(&auth).find(id).await?))
}

pub async fn create_handler(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Payload(input): Payload<EmployeeInput>,
) -> Result<Response, AppError> {
    let employee = Employee::create(input)?;

    state.repo::<Employee>(&auth).put(&employee).await?;
    RulesService::new(&state, auth.tenant_id)
        .evaluate_after_write(RuleEntity::Employee, employee.id, &employee)
        .await;

    Ok(created(employee))
}

pub async fn update_handler(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Payload(input): Payload<EmployeeInput>,
) -> Result<Json<Employee>, AppError> {
    let repo = state.repo::<Employee>(&auth);
    let mut employee = repo.find(id).await?;

    employee.apply(input)?;
    repo.put(&employee).await?;
    RulesService::new(&state, auth.tenant_id)
        .evaluate_after_write(RuleEntity::Employee, employee.id, &employee)
        .await;

    Ok(Json(employee))
}

pub async fn delete_handler(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    auth.require_manager()?;

    if !state.repo::<Employee>(&auth).delete(id).await? {
        return Err(AppError::NotFound);
    }

    Ok(StatusCode::NO_CONTENT)
}
