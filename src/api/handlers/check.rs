//! Flow listing and the pre-flight check used by the authentication pipeline.

use axum::{
    extract::{rejection::JsonRejection, Extension, Query},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use tracing::debug;

use super::types::{ApiError, ErrorBody, FlowCheckQuery, FlowCheckRequest, TenantId};
use super::FlowState;
use crate::flows::{subjects::candidate_subjects, BlockCheck, FlowDefinition};

#[utoipa::path(
    get,
    path = "/v1/flows",
    responses(
        (status = 200, description = "Registered flows in registration order.", body = [FlowDefinition]),
    ),
    tag = "flows"
)]
pub async fn list_flows(state: Extension<Arc<FlowState>>) -> impl IntoResponse {
    Json(state.registry().flows().to_vec())
}

#[utoipa::path(
    post,
    path = "/v1/flow/check",
    request_body = FlowCheckRequest,
    params(
        FlowCheckQuery,
        ("tenant-id" = String, Header, description = "Tenant scope")
    ),
    responses(
        (status = 200, description = "Check outcome.", body = BlockCheck),
        (status = 400, description = "Invalid input.", body = ErrorBody),
        (status = 403, description = "Flow blocked (only with enforce=true).", body = ErrorBody),
        (status = 500, description = "Block store failure.", body = ErrorBody),
    ),
    tag = "flows"
)]
pub async fn check(
    tenant: TenantId,
    query: Option<Query<FlowCheckQuery>>,
    state: Extension<Arc<FlowState>>,
    payload: Result<Json<FlowCheckRequest>, JsonRejection>,
) -> impl IntoResponse {
    let Json(payload) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return ApiError::from(rejection).into_response(),
    };
    let enforce = query.is_some_and(|Query(query)| query.enforce);

    let path = payload.path.trim();
    if path.is_empty() {
        return ApiError::invalid("path is required").into_response();
    }

    let subjects = candidate_subjects(&payload.subjects, &payload.extra);
    debug!("Checking {} candidate subject(s) for {path}", subjects.len());

    match state
        .checks(payload.subject_kind)
        .check(path, &tenant.0, &subjects)
        .await
    {
        Ok(outcome) if enforce && outcome.blocked => match outcome.ensure_allowed() {
            Ok(()) => StatusCode::OK.into_response(),
            Err(err) => ApiError::from(err).into_response(),
        },
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(err) => ApiError::from(err).into_response(),
    }
}
