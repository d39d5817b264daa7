//! Contact (email / phone) block administration.

use axum::{
    extract::{rejection::JsonRejection, Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

use super::blocks::{self, BLOCKED_MESSAGE, UNBLOCKED_MESSAGE};
use super::types::{
    ApiError, ContactBlockRequest, ContactBlockResponse, ContactBlockedFlowsResponse,
    ContactUnblockRequest, ContactUnblockResponse, ErrorBody, TenantId,
};
use super::FlowState;
use crate::flows::SubjectKind;

#[utoipa::path(
    post,
    path = "/v1/contact/block",
    request_body = ContactBlockRequest,
    params(("tenant-id" = String, Header, description = "Tenant scope")),
    responses(
        (status = 200, description = "Flows blocked for the contact.", body = ContactBlockResponse),
        (status = 400, description = "Invalid input or unknown flow.", body = ErrorBody),
        (status = 500, description = "Block store failure.", body = ErrorBody),
    ),
    tag = "contacts"
)]
pub async fn block(
    tenant: TenantId,
    state: Extension<Arc<FlowState>>,
    payload: Result<Json<ContactBlockRequest>, JsonRejection>,
) -> impl IntoResponse {
    let Json(payload) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return ApiError::from(rejection).into_response(),
    };

    match blocks::block(
        &state,
        &tenant,
        SubjectKind::Contact,
        &payload.contact,
        &payload.block_flows,
        &payload.reason,
        payload.unblocked_at,
    )
    .await
    {
        Ok(blocked) => (
            StatusCode::OK,
            Json(ContactBlockResponse {
                contact: blocked.subject,
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
    path = "/v1/contact/unblock",
    request_body = ContactUnblockRequest,
    params(("tenant-id" = String, Header, description = "Tenant scope")),
    responses(
        (status = 200, description = "Flows unblocked for the contact.", body = ContactUnblockResponse),
        (status = 400, description = "Invalid input or unknown flow.", body = ErrorBody),
        (status = 500, description = "Block store failure.", body = ErrorBody),
    ),
    tag = "contacts"
)]
pub async fn unblock(
    tenant: TenantId,
    state: Extension<Arc<FlowState>>,
    payload: Result<Json<ContactUnblockRequest>, JsonRejection>,
) -> impl IntoResponse {
    let Json(payload) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return ApiError::from(rejection).into_response(),
    };

    match blocks::unblock(
        &state,
        &tenant,
        SubjectKind::Contact,
        &payload.contact,
        &payload.unblock_flows,
    )
    .await
    {
        Ok(unblocked) => (
            StatusCode::OK,
            Json(ContactUnblockResponse {
                contact: unblocked.subject,
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
    path = "/v1/contact/{contact}/blocked-flows",
    params(
        ("contact" = String, Path, description = "Email address or phone number"),
        ("tenant-id" = String, Header, description = "Tenant scope")
    ),
    responses(
        (status = 200, description = "Blocks currently in force.", body = ContactBlockedFlowsResponse),
        (status = 400, description = "Invalid contact.", body = ErrorBody),
        (status = 500, description = "Block store failure.", body = ErrorBody),
    ),
    tag = "contacts"
)]
pub async fn blocked_flows(
    tenant: TenantId,
    Path(contact): Path<String>,
    state: Extension<Arc<FlowState>>,
) -> impl IntoResponse {
    match blocks::active_flows(&state, &tenant, SubjectKind::Contact, &contact).await {
        Ok(active) => (
            StatusCode::OK,
            Json(ContactBlockedFlowsResponse {
                contact: active.subject,
                total_count: active.flows.len(),
                blocked_flows: active.flows,
            }),
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}
