//! User identifier block administration.

use axum::{
    extract::{rejection::JsonRejection, Extension, Query},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

use super::blocks::{self, BLOCKED_MESSAGE, UNBLOCKED_MESSAGE};
use super::types::{
    ApiError, ErrorBody, TenantId, UserBlockRequest, UserBlockResponse, UserBlockedFlowsQuery,
    UserBlockedFlowsResponse, UserUnblockRequest, UserUnblockResponse,
};
use super::FlowState;
use crate::flows::SubjectKind;

#[utoipa::path(
    post,
    path = "/v1/user/flow/block",
    request_body = UserBlockRequest,
    params(("tenant-id" = String, Header, description = "Tenant scope")),
    responses(
        (status = 200, description = "Flows blocked for the user.", body = UserBlockResponse),
        (status = 400, description = "Invalid input or unknown flow.", body = ErrorBody),
        (status = 500, description = "Block store failure.", body = ErrorBody),
    ),
    tag = "users"
)]
pub async fn block(
    tenant: TenantId,
    state: Extension<Arc<FlowState>>,
    payload: Result<Json<UserBlockRequest>, JsonRejection>,
) -> impl IntoResponse {
    let Json(payload) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return ApiError::from(rejection).into_response(),
    };

    match blocks::block(
        &state,
        &tenant,
        SubjectKind::User,
        &payload.user_identifier,
        &payload.block_flows,
        &payload.reason,
        payload.unblocked_at,
    )
    .await
    {
        Ok(blocked) => (
            StatusCode::OK,
            Json(UserBlockResponse {
                user_identifier: blocked.subject,
                blocked_flows: blocked.flows,
                message: BLOCKED_MESSAGE.to_string(),
            }),
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/v1/user/flow/unblock",
    request_body = UserUnblockRequest,
    params(("tenant-id" = String, Header, description = "Tenant scope")),
    responses(
        (status = 200, description = "Flows unblocked for the user.", body = UserUnblockResponse),
        (status = 400, description = "Invalid input or unknown flow.", body = ErrorBody),
        (status = 500, description = "Block store failure.", body = ErrorBody),
    ),
    tag = "users"
)]
pub async fn unblock(
    tenant: TenantId,
    state: Extension<Arc<FlowState>>,
    payload: Result<Json<UserUnblockRequest>, JsonRejection>,
) -> impl IntoResponse {
    let Json(payload) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return ApiError::from(rejection).into_response(),
    };

    match blocks::unblock(
        &state,
        &tenant,
        SubjectKind::User,
        &payload.user_identifier,
        &payload.unblock_flows,
    )
    .await
    {
        Ok(unblocked) => (
            StatusCode::OK,
            Json(UserUnblockResponse {
                user_identifier: unblocked.subject,
                unblocked_flows: unblocked.flows,
                message: UNBLOCKED_MESSAGE.to_string(),
            }),
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/v1/user/flow/blocked",
    params(
        UserBlockedFlowsQuery,
        ("tenant-id" = String, Header, description = "Tenant scope")
    ),
    responses(
        (status = 200, description = "Blocks currently in force.", body = UserBlockedFlowsResponse),
        (status = 400, description = "Missing user identifier.", body = ErrorBody),
        (status = 500, description = "Block store failure.", body = ErrorBody),
    ),
    tag = "users"
)]
pub async fn blocked_flows(
    tenant: TenantId,
    query: Option<Query<UserBlockedFlowsQuery>>,
    state: Extension<Arc<FlowState>>,
) -> impl IntoResponse {
    let user_identifier = query.map(|Query(query)| query.user_identifier).unwrap_or_default();

    match blocks::active_flows(&state, &tenant, SubjectKind::User, &user_identifier).await {
        Ok(active) => (
            StatusCode::OK,
            Json(UserBlockedFlowsResponse {
                user_identifier: active.subject,
                total_count: active.flows.len(),
                blocked_flows: active.flows,
            }),
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}
