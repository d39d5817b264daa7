//! Request/response types for the flow blocking APIs.
//!
//! These payloads are shared between handlers and `OpenAPI` generation. Field
//! names are camelCase on the wire.

use async_trait::async_trait;
use axum::{
    extract::{rejection::JsonRejection, FromRequestParts},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::error;
use utoipa::ToSchema;

use crate::flows::{subjects::ExtraFields, FlowError, FlowRegistry, SubjectKind};

pub const TENANT_HEADER: &str = "tenant-id";

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ContactBlockRequest {
    pub contact: String,
    pub block_flows: Vec<String>,
    pub reason: String,
    /// Unix seconds after which the block no longer applies.
    pub unblocked_at: i64,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ContactUnblockRequest {
    pub contact: String,
    pub unblock_flows: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ContactBlockResponse {
    pub contact: String,
    pub blocked_flows: Vec<String>,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ContactUnblockResponse {
    pub contact: String,
    pub unblocked_flows: Vec<String>,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ContactBlockedFlowsResponse {
    pub contact: String,
    /// Names of the flows currently blocked.
    pub blocked_flows: Vec<String>,
    pub total_count: usize,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserBlockRequest {
    pub user_identifier: String,
    pub block_flows: Vec<String>,
    pub reason: String,
    /// Unix seconds after which the block no longer applies.
    pub unblocked_at: i64,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserUnblockRequest {
    pub user_identifier: String,
    pub unblock_flows: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserBlockResponse {
    pub user_identifier: String,
    pub blocked_flows: Vec<String>,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserUnblockResponse {
    pub user_identifier: String,
    pub unblocked_flows: Vec<String>,
    pub message: String,
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct UserBlockedFlowsQuery {
    pub user_identifier: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserBlockedFlowsResponse {
    pub user_identifier: String,
    /// Names of the flows currently blocked.
    pub blocked_flows: Vec<String>,
    pub total_count: usize,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FlowCheckRequest {
    /// Request path the caller is about to serve.
    pub path: String,
    pub subject_kind: SubjectKind,
    #[serde(default)]
    pub subjects: Vec<String>,
    /// Remaining payload fields; identifiers are extracted from known keys.
    #[serde(flatten)]
    #[schema(value_type = Object)]
    pub extra: ExtraFields,
}

#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct FlowCheckQuery {
    /// Answer a blocked check with `403` instead of `200`.
    #[serde(default)]
    pub enforce: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

/// Errors returned to API callers as `{"error": {"code", "message"}}`.
#[derive(Debug)]
pub enum ApiError {
    InvalidRequest(String),
    FlowBlocked(String),
    Internal,
}

impl ApiError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            Self::InvalidRequest(message) => {
                (StatusCode::BAD_REQUEST, "invalid_request", message.clone())
            }
            Self::FlowBlocked(reason) => (StatusCode::FORBIDDEN, "flow_blocked", reason.clone()),
            Self::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_server_error",
                "Internal server error".to_string(),
            ),
        }
    }
}

impl From<FlowError> for ApiError {
    fn from(err: FlowError) -> Self {
        match err {
            FlowError::UnknownFlow(name) => Self::InvalidRequest(format!("Unknown flow: {name}")),
            FlowError::Blocked { reason, .. } => Self::FlowBlocked(reason),
            FlowError::Store(err) => {
                error!("Flow block store failure: {err}");
                Self::Internal
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::InvalidRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();
        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        };
        (status, Json(body)).into_response()
    }
}

/// Tenant scope taken from the `tenant-id` header.
#[derive(Debug, Clone)]
pub struct TenantId(pub String);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for TenantId {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(TENANT_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|tenant| !tenant.is_empty())
            .map(|tenant| Self(tenant.to_string()))
            .ok_or_else(|| ApiError::invalid(format!("Missing {TENANT_HEADER} header")))
    }
}

/// Validated block/unblock command, common to both subject kinds.
#[derive(Debug, PartialEq, Eq)]
pub struct BlockCommand {
    pub subject: String,
    pub flows: Vec<String>,
    pub reason: String,
    pub unblocked_at: i64,
}

/// Trim and check a subject; contacts must also look like an email or phone number.
///
/// # Errors
/// Returns `ApiError::InvalidRequest` if the subject is blank or malformed.
pub fn validate_subject(kind: SubjectKind, subject: &str) -> Result<String, ApiError> {
    let subject = subject.trim();
    if subject.is_empty() {
        return Err(ApiError::invalid(format!("{kind} is required")));
    }
    if kind == SubjectKind::Contact && !crate::flows::subjects::valid_contact(subject) {
        return Err(ApiError::invalid(
            "contact must be an email address or a phone number",
        ));
    }
    Ok(subject.to_string())
}

/// Require at least one flow and that every flow is registered.
///
/// # Errors
/// Returns `ApiError::InvalidRequest` naming the valid flows.
pub fn validate_flows(registry: &FlowRegistry, flows: &[String]) -> Result<Vec<String>, ApiError> {
    let flows: Vec<String> = flows.iter().map(|flow| flow.trim().to_string()).collect();
    if flows.is_empty() {
        return Err(ApiError::invalid("at least one flow is required"));
    }
    if let Some(unknown) = flows.iter().find(|flow| !registry.contains(flow)) {
        return Err(ApiError::invalid(format!(
            "Unknown flow: {unknown}. Valid flows: {}",
            registry.names().collect::<Vec<_>>().join(", ")
        )));
    }
    Ok(flows)
}

/// Validate a block request body.
///
/// # Errors
/// Returns `ApiError::InvalidRequest` on the first failing rule.
pub fn validate_block(
    registry: &FlowRegistry,
    kind: SubjectKind,
    subject: &str,
    flows: &[String],
    reason: &str,
    unblocked_at: i64,
) -> Result<BlockCommand, ApiError> {
    let subject = validate_subject(kind, subject)?;
    let flows = validate_flows(registry, flows)?;
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(ApiError::invalid("reason is required"));
    }
    if unblocked_at <= 0 {
        return Err(ApiError::invalid("unblockedAt must be a positive unix timestamp"));
    }
    Ok(BlockCommand {
        subject,
        flows,
        reason: reason.to_string(),
        unblocked_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flows(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| (*name).to_string()).collect()
    }

    #[test]
    fn block_command_is_trimmed() {
        let registry = FlowRegistry::builtin();
        let command = validate_block(
            &registry,
            SubjectKind::Contact,
            " +15551234 ",
            &flows(&["signin", " signup"]),
            " spam ",
            1_700_000_060,
        );
        assert!(matches!(
            command,
            Ok(BlockCommand { ref subject, ref reason, .. }) if subject == "+15551234" && reason == "spam"
        ));
    }

    #[test]
    fn unknown_flow_lists_valid_flows() {
        let registry = FlowRegistry::builtin();
        let result = validate_flows(&registry, &flows(&["signin", "teleport"]));
        match result {
            Err(ApiError::InvalidRequest(message)) => {
                assert!(message.contains("teleport"));
                assert!(message.contains("signin, signup, passwordless"));
            }
            other => panic!("expected invalid request, got {other:?}"),
        }
    }

    #[test]
    fn rejects_bad_block_requests() {
        let registry = FlowRegistry::builtin();
        let signin = flows(&["signin"]);
        let cases = [
            (SubjectKind::Contact, " ", signin.clone(), "spam", 10),
            (SubjectKind::Contact, "nobody", signin.clone(), "spam", 10),
            (SubjectKind::User, "u1", Vec::new(), "spam", 10),
            (SubjectKind::User, "u1", signin.clone(), "  ", 10),
            (SubjectKind::User, "u1", signin, "spam", 0),
        ];
        for (kind, subject, flow_names, reason, unblocked_at) in cases {
            let result = validate_block(&registry, kind, subject, &flow_names, reason, unblocked_at);
            assert!(
                matches!(result, Err(ApiError::InvalidRequest(_))),
                "{subject:?} {flow_names:?} {reason:?} {unblocked_at}"
            );
        }
    }

    #[test]
    fn user_identifiers_are_opaque() {
        let result = validate_subject(SubjectKind::User, "  0f3c-user  ");
        assert!(matches!(result, Ok(ref subject) if subject == "0f3c-user"));
    }

    #[test]
    fn flow_errors_map_to_api_errors() {
        assert!(matches!(
            ApiError::from(FlowError::UnknownFlow("x".to_string())),
            ApiError::InvalidRequest(_)
        ));
        assert!(matches!(
            ApiError::from(FlowError::Blocked {
                flow: "signin".to_string(),
                reason: "spam".to_string()
            }),
            ApiError::FlowBlocked(ref reason) if reason == "spam"
        ));
        assert!(matches!(
            ApiError::from(FlowError::from(sqlx::Error::PoolTimedOut)),
            ApiError::Internal
        ));
    }
}
