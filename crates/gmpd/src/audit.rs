//! Audit trail for mutation attempts.

use std::fmt;
use std::sync::Arc;

/// Audit records are emitted on this tracing target.
pub const AUDIT_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::audit");

/// Mutation recorded in the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    Created,
    Modified,
}

impl fmt::Display for AuditAction {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(match self {
            Self::Created => "created",
            Self::Modified => "modified",
        })
    }
}

/// Whether the attempt succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditOutcome {
    Success,
    Failure,
}

impl fmt::Display for AuditOutcome {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(match self {
            Self::Success => "success",
            Self::Failure => "failure",
        })
    }
}

/// One audit entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditRecord {
    /// Kind of resource, e.g. `ticket`.
    pub resource_kind: &'static str,
    /// Identifier of the resource; `None` when a creation failed.
    pub resource_id: Option<String>,
    pub action: AuditAction,
    pub outcome: AuditOutcome,
}

impl AuditRecord {
    /// Record of a successful mutation.
    pub fn success(resource_kind: &'static str, resource_id: impl Into<String>, action: AuditAction) -> Self {
        Self {
            resource_kind,
            resource_id: Some(resource_id.into()),
            action,
            outcome: AuditOutcome::Success,
        }
    }

    /// Record of a failed mutation.
    #[must_use]
    pub fn failure(resource_kind: &'static str, resource_id: Option<String>, action: AuditAction) -> Self {
        Self {
            resource_kind,
            resource_id,
            action,
            outcome: AuditOutcome::Failure,
        }
    }
}

/// Destination for audit records.
pub trait AuditSink: Send + Sync {
    /// Records one mutation attempt.
    fn record(&self, record: &AuditRecord);
}

impl<T> AuditSink for Arc<T>
where
    T: AuditSink + ?Sized,
{
    fn record(&self, record: &AuditRecord) {
        (**self).record(record);
    }
}

/// Sink writing audit records as structured tracing events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, record: &AuditRecord) {
        let resource_id = record.resource_id.as_deref().unwrap_or("-");
        match record.outcome {
            AuditOutcome::Success => tracing::info!(
                target: AUDIT_TARGET,
                resource_kind = record.resource_kind,
                resource_id,
                action = %record.action,
                outcome = %record.outcome,
                "{} {resource_id} has been {}",
                record.resource_kind,
                record.action,
            ),
            AuditOutcome::Failure => tracing::warn!(
                target: AUDIT_TARGET,
                resource_kind = record.resource_kind,
                resource_id,
                action = %record.action,
                outcome = %record.outcome,
                "{} could not be {}",
                record.resource_kind,
                record.action,
            ),
        }
    }
}
