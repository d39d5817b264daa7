//! Block administration shared by the contact and user endpoints.
//!
//! Handlers decode their own payloads and build their own responses; validation
//! and the engine call live here, selected by `SubjectKind`.

use super::types::{validate_block, validate_flows, validate_subject, ApiError, TenantId};
use super::FlowState;
use crate::flows::SubjectKind;

pub const BLOCKED_MESSAGE: &str = "Flows blocked successfully";
pub const UNBLOCKED_MESSAGE: &str = "Flows unblocked successfully";

/// A normalised subject and the flow names an operation touched.
#[derive(Debug, PartialEq, Eq)]
pub struct SubjectFlows {
    pub subject: String,
    pub flows: Vec<String>,
}

/// Validate and block `flows` for `subject`.
///
/// # Errors
/// `ApiError::InvalidRequest` on bad input, `ApiError::Internal` on store failure.
pub async fn block(
    state: &FlowState,
    tenant: &TenantId,
    kind: SubjectKind,
    subject: &str,
    flows: &[String],
    reason: &str,
    unblocked_at: i64,
) -> Result<SubjectFlows, ApiError> {
    let command = validate_block(state.registry(), kind, subject, flows, reason, unblocked_at)?;

    let flows = state
        .engine(kind)
        .block(
            &tenant.0,
            &command.subject,
            &command.flows,
            &command.reason,
            command.unblocked_at,
        )
        .await?;

    Ok(SubjectFlows {
        subject: command.subject,
        flows,
    })
}

/// Validate and unblock `flows` for `subject`.
///
/// # Errors
/// `ApiError::InvalidRequest` on bad input, `ApiError::Internal` on store failure.
pub async fn unblock(
    state: &FlowState,
    tenant: &TenantId,
    kind: SubjectKind,
    subject: &str,
    flows: &[String],
) -> Result<SubjectFlows, ApiError> {
    let subject = validate_subject(kind, subject)?;
    let flows = validate_flows(state.registry(), flows)?;

    let flows = state.engine(kind).unblock(&tenant.0, &subject, &flows).await?;

    Ok(SubjectFlows { subject, flows })
}

/// Names of the flows currently blocked for `subject`.
///
/// # Errors
/// `ApiError::InvalidRequest` on a bad subject, `ApiError::Internal` on store failure.
pub async fn active_flows(
    state: &FlowState,
    tenant: &TenantId,
    kind: SubjectKind,
    subject: &str,
) -> Result<SubjectFlows, ApiError> {
    let subject = validate_subject(kind, subject)?;

    let flows = state
        .engine(kind)
        .list_active(&tenant.0, &subject)
        .await?
        .into_iter()
        .map(|record| record.flow_name)
        .collect();

    Ok(SubjectFlows { subject, flows })
}
