//! Interprets service responses into a semantic outcome.
//!
//! The service can answer HTTP 200 while embedding
//! `{"status": "failure", "error": {"message", "detail"}}` when it aborted a
//! request early, so success is always judged from the body as well as the
//! status. Reads and writes share the envelope shape but apply different
//! policy to what they find in it.

use crate::servicenow::error::TerminalKind;
use model::records::skipped::DropReason;
use serde::Deserialize;
use serde_json::Value;

/// The service ran out of its internal execution-time budget.
pub const EXECUTION_BUDGET_SIGNATURE: &str = "maximum execution time exceeded";
/// Access-control rejection of a write.
pub const ACL_DENIAL_SIGNATURE: &str = "ACL Exception";
/// Insert collided with an existing unique key.
pub const DUPLICATE_INSERT_SIGNATURE: &str = "Unique Key violation detected by database";
/// Update targeted a row that does not exist.
pub const MISSING_TARGET_SIGNATURE: &str = "No Record found";

/// The embedded failure object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceFailure {
    pub message: Option<String>,
    pub detail: Option<String>,
}

impl ServiceFailure {
    pub fn message(&self) -> &str {
        self.message.as_deref().unwrap_or_default()
    }

    fn mentions(&self, signature: &str) -> bool {
        let needle = signature.to_ascii_lowercase();
        [self.message.as_deref(), self.detail.as_deref()]
            .into_iter()
            .flatten()
            .any(|text| text.to_ascii_lowercase().contains(&needle))
    }

    pub fn exceeded_execution_budget(&self) -> bool {
        self.mentions(EXECUTION_BUDGET_SIGNATURE)
    }

    pub fn describe(&self, status: u16) -> String {
        let message = self.message();
        match self.detail.as_deref().filter(|d| !d.is_empty()) {
            None if message.is_empty() => format!("HTTP {status}"),
            None => message.to_string(),
            Some(detail) if message.is_empty() => detail.to_string(),
            Some(detail) => format!("{message}: {detail}"),
        }
    }

    /// Reads the `error` member whatever its shape. Non-string values are kept
    /// as their JSON text.
    fn from_value(value: Value) -> Self {
        match value {
            Value::String(message) => ServiceFailure {
                message: Some(message),
                detail: None,
            },
            Value::Object(fields) => ServiceFailure {
                message: fields.get("message").and_then(text),
                detail: fields.get("detail").and_then(text),
            },
            Value::Null => ServiceFailure::default(),
            other => ServiceFailure {
                message: Some(other.to_string()),
                detail: None,
            },
        }
    }
}

fn text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    status: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Success,
    Retryable(ServiceFailure),
    RecordDropped(DropReason, ServiceFailure),
    Terminal { kind: TerminalKind, detail: String },
}

/// Extracts the embedded failure object from a response body. A
/// `"status": "failure"` marker or a non-null `error` member is always a
/// failure, even when the error object itself is malformed.
pub fn embedded_failure(body: &str) -> Option<ServiceFailure> {
    let envelope: ErrorEnvelope = serde_json::from_str(body).ok()?;
    let failed = envelope
        .status
        .as_ref()
        .and_then(Value::as_str)
        .is_some_and(|status| status.eq_ignore_ascii_case("failure"));

    match envelope.error {
        Some(Value::Null) | None if failed => Some(ServiceFailure::default()),
        Some(Value::Null) | None => None,
        Some(error) => Some(ServiceFailure::from_value(error)),
    }
}

/// Read policy: the execution-budget signature on a success status is
/// retryable, anything else unsuccessful is terminal for the page.
pub fn classify_read(status: u16, body: &str) -> Classification {
    let failure = embedded_failure(body);
    let success = (200..300).contains(&status);

    match failure {
        None if success => Classification::Success,
        Some(failure) if success && failure.exceeded_execution_budget() => {
            Classification::Retryable(failure)
        }
        Some(failure) => Classification::Terminal {
            kind: if failure.mentions(ACL_DENIAL_SIGNATURE) {
                TerminalKind::PermissionDenied
            } else {
                TerminalKind::Unrecognized
            },
            detail: failure.describe(status),
        },
        None => Classification::Terminal {
            kind: TerminalKind::Unrecognized,
            detail: format!("HTTP {status}: {}", snippet(body)),
        },
    }
}

/// Write policy for one batch sub-response. `body` is the decoded sub-response body.
pub fn classify_write(status: u16, body: &str) -> Classification {
    if (200..300).contains(&status) {
        return Classification::Success;
    }

    let failure = embedded_failure(body).unwrap_or_else(|| ServiceFailure {
        message: None,
        detail: (!body.trim().is_empty()).then(|| snippet(body)),
    });

    if failure.mentions(ACL_DENIAL_SIGNATURE) {
        return Classification::Terminal {
            kind: TerminalKind::PermissionDenied,
            detail: failure.describe(status),
        };
    }
    if failure.mentions(DUPLICATE_INSERT_SIGNATURE) {
        return Classification::RecordDropped(DropReason::DuplicateInsert, failure);
    }
    if failure.mentions(MISSING_TARGET_SIGNATURE) {
        return Classification::RecordDropped(DropReason::MissingUpdateTarget, failure);
    }
    if failure.exceeded_execution_budget() {
        return Classification::Retryable(failure);
    }

    Classification::Terminal {
        kind: TerminalKind::Unrecognized,
        detail: failure.describe(status),
    }
}

fn snippet(body: &str) -> String {
    body.trim().chars().take(512).collect()
}
