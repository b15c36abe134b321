//! Error types for SCIM conformance checking.
//!
//! Errors are split along the boundaries the engine cares about: what the
//! transport reports ([`ProtocolError`]), what value generation can fail with
//! ([`GenerationError`]), what a single check captures ([`CheckError`]), and
//! the optional end-of-run aggregate ([`ConformanceFailure`]). Every check
//! converts its error into a [`CheckResult`](crate::report::CheckResult);
//! nothing escapes a check into its neighbours.

/// Classification of a protocol-level failure reported by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolErrorKind {
    /// The target resource, schema, or endpoint does not exist (404-class).
    NotFound,
    /// The server rejected the request as malformed or invalid.
    InvalidRequest,
    /// The request conflicted with server state (e.g. uniqueness).
    Conflict,
    /// The server answered, but the body could not be parsed as expected.
    MalformedResponse,
    /// The request never completed (connection refused, timeout, ...).
    Transport,
    /// Any other non-2xx outcome.
    Other,
}

impl std::fmt::Display for ProtocolErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::NotFound => "not found",
            Self::InvalidRequest => "invalid request",
            Self::Conflict => "conflict",
            Self::MalformedResponse => "malformed response",
            Self::Transport => "transport",
            Self::Other => "other",
        };
        f.write_str(name)
    }
}

/// Error raised by the [`ScimClient`](crate::client::ScimClient) collaborator.
///
/// The engine treats a `NotFound` kind as the expected outcome of its
/// negative-path probes and any kind as a check failure everywhere else.
#[derive(Debug, Clone, thiserror::Error)]
#[error("protocol error ({kind}{}): {detail}", .status.map(|s| format!(", status {s}")).unwrap_or_default())]
pub struct ProtocolError {
    /// Failure classification.
    pub kind: ProtocolErrorKind,
    /// HTTP status code, when one was received.
    pub status: Option<u16>,
    /// Human-readable detail from the server or transport.
    pub detail: String,
}

impl ProtocolError {
    /// Create a not-found error, the kind negative-path checks expect.
    pub fn not_found(detail: impl Into<String>) -> Self {
        Self {
            kind: ProtocolErrorKind::NotFound,
            status: Some(404),
            detail: detail.into(),
        }
    }

    /// Create a malformed-response error.
    pub fn malformed(detail: impl Into<String>) -> Self {
        Self {
            kind: ProtocolErrorKind::MalformedResponse,
            status: None,
            detail: detail.into(),
        }
    }

    /// Whether this error is the well-defined "not found" outcome.
    pub fn is_not_found(&self) -> bool {
        self.kind == ProtocolErrorKind::NotFound
    }
}

/// Errors from the schema-driven value generator.
///
/// Generation never fails for missing optional metadata; it fails only when a
/// required attribute has no representable strategy or when a required
/// reference target could not be created.
#[derive(Debug, Clone, thiserror::Error)]
pub enum GenerationError {
    /// A required attribute has a base type the generator cannot represent.
    #[error("no generation strategy for required attribute '{attribute}' of type '{kind}'")]
    UnrepresentableType { attribute: String, kind: String },

    /// Creating the target of a required reference attribute failed.
    #[error("could not create referenced {resource_type} for required attribute '{attribute}': {source}")]
    ReferenceTargetFailed {
        attribute: String,
        resource_type: String,
        source: ProtocolError,
    },

    /// The schema needed to generate a referenced resource is not known.
    #[error("no discovered schema for referenced resource type '{resource_type}'")]
    UnknownReferenceTarget { resource_type: String },

    /// A resource type declares a required extension whose schema was never
    /// discovered.
    #[error("no discovered schema for required extension '{schema_uri}'")]
    MissingExtensionSchema { schema_uri: String },
}

/// Error captured by a single check.
///
/// One of these is stored on the ERROR [`CheckResult`](crate::report::CheckResult)
/// it produced, and re-surfaced by [`ConformanceFailure`] when the run is
/// configured to raise.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CheckError {
    /// The transport reported a failure the check did not expect.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The value generator could not prepare the check's payload.
    #[error(transparent)]
    Generation(#[from] GenerationError),

    /// A server response did not match the expected shape, value, or status.
    #[error("assertion failed: expected {expected}, got {actual}")]
    Assertion { expected: String, actual: String },

    /// The server accepted an operation that was expected to fail.
    #[error("negative path violated: {probe} was expected to fail but {outcome}")]
    NegativePath { probe: String, outcome: String },

    /// An earlier step this check depends on failed, so its subject is missing.
    #[error("prerequisite step '{step}' failed, no resource to operate on")]
    Prerequisite { step: String },

    /// A temporary or test resource could not be deleted during teardown.
    #[error("cleanup of {resource_type} '{id}' failed: {source}")]
    Cleanup {
        resource_type: String,
        id: String,
        source: ProtocolError,
    },
}

impl CheckError {
    /// Create an assertion error from expected/actual descriptions.
    pub fn assertion(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::Assertion {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Create a negative-path violation error.
    pub fn negative_path(probe: impl Into<String>, outcome: impl Into<String>) -> Self {
        Self::NegativePath {
            probe: probe.into(),
            outcome: outcome.into(),
        }
    }
}

/// One failed check inside a [`ConformanceFailure`].
#[derive(Debug, Clone)]
pub struct FailedCheck {
    /// Title of the check that failed.
    pub title: String,
    /// Resource type the check was exercising, if any.
    pub resource_type: Option<String>,
    /// The error the check captured.
    pub error: CheckError,
}

/// Aggregate error returned when `raise_exceptions` is enabled.
///
/// Collects every ERROR result's captured error at the end of the run, so the
/// caller can inspect each original failure. Cleanup errors are excluded;
/// cleanup is advisory.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{} conformance check(s) failed", .failures.len())]
pub struct ConformanceFailure {
    /// One entry per failed check, in result order.
    pub failures: Vec<FailedCheck>,
}

/// Result alias for transport operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_error_display_includes_status() {
        let err = ProtocolError::not_found("no such resource");
        assert!(err.to_string().contains("not found"));
        assert!(err.to_string().contains("404"));
        assert!(err.is_not_found());
    }

    #[test]
    fn generation_error_names_attribute() {
        let err = GenerationError::UnrepresentableType {
            attribute: "userName".into(),
            kind: "frob".into(),
        };
        assert!(err.to_string().contains("userName"));
    }

    #[test]
    fn check_error_wraps_protocol_error() {
        let err = CheckError::from(ProtocolError::malformed("bad json"));
        assert!(matches!(err, CheckError::Protocol(_)));
        assert!(err.to_string().contains("bad json"));
    }

    #[test]
    fn conformance_failure_counts_entries() {
        let failure = ConformanceFailure {
            failures: vec![FailedCheck {
                title: "resource-create".into(),
                resource_type: Some("User".into()),
                error: CheckError::assertion("201", "500"),
            }],
        };
        assert!(failure.to_string().contains("1 conformance check"));
    }
}
