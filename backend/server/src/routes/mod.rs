//! HTTP handlers, one module per resource. The router itself lives in [`crate::app`].
use axum::{
    extract::{
        FromRequest, FromRequestParts,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::debug;

use crate::error::AppError;

pub mod audits;
pub mod auth;
pub mod clients;
pub mod dashboard;
pub mod export;
pub mod flows;
pub mod goals;
pub mod hr;
pub mod kpis;
pub mod ledger;
pub mod rules;

/// JSON body extractor that answers malformed payloads with [`AppError`].
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct Payload<T>(pub T);

/// Path extractor that answers unparsable segments with [`AppError`].
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct Path<T>(pub T);

/// Query string extractor that answers bad filters with [`AppError`].
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct Query<T>(pub T);

impl<T: Serialize> IntoResponse for Payload<T> {
    fn into_response(self) -> Response {
        axum::Json(self.0).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        debug!("Rejected payload: {rejection}");

        match rejection {
            JsonRejection::JsonDataError(e) => AppError::Validation(e.body_text()),
            _ => AppError::MalformedPayload,
        }
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        debug!("Rejected path: {rejection}");

        match rejection {
            PathRejection::FailedToDeserializePathParams(e) => AppError::Validation(e.body_text()),
            other => AppError::internal(other),
        }
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        debug!("Rejected query: {rejection}");

        AppError::Validation(rejection.body_text())
    }
}

pub fn created<T: Serialize>(body: T) -> Response {
    (StatusCode::CREATED, axum::Json(body)).into_response()
}

pub async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}
