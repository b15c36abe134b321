//! Check outcome records.
//!
//! Every probe the engine runs produces exactly one [`CheckResult`], whether
//! it executed, failed, or was skipped by tag filtering. Results are
//! append-only: the caller receives them in execution order and the count is
//! fully determined by discovery plus filtering, before any check runs.

use crate::error::CheckError;
use crate::tags::Tag;
use serde::Serialize;

/// Outcome status of one check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    /// The server behaved as the protocol requires.
    Success,
    /// The server response violated an expectation, or the check could not
    /// be prepared.
    Error,
    /// The check did not execute (tag filtering or unmet prerequisite).
    Skipped,
}

/// One recorded outcome of a single probe.
///
/// Immutable once produced; appended to the run's result sequence and never
/// mutated afterward.
#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    /// Outcome status.
    pub status: Status,
    /// Stable check name, e.g. `resource-create`.
    pub title: String,
    /// What the check verifies.
    pub description: String,
    /// Tags the check carries.
    #[serde(serialize_with = "serialize_tags")]
    pub tags: Vec<Tag>,
    /// Resource type involved, if any.
    pub resource_type: Option<String>,
    /// Why the check succeeded, was skipped, or failed.
    pub reason: Option<String>,
    /// Captured error detail, present iff `status` is [`Status::Error`].
    #[serde(skip)]
    pub error: Option<CheckError>,
}

fn serialize_tags<S: serde::Serializer>(tags: &[Tag], ser: S) -> Result<S::Ok, S::Error> {
    ser.collect_seq(tags.iter().map(Tag::to_string))
}

impl CheckResult {
    /// Whether the check executed and passed.
    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }

    /// Whether the check failed.
    pub fn is_error(&self) -> bool {
        self.status == Status::Error
    }

    /// Whether the check was skipped.
    pub fn is_skipped(&self) -> bool {
        self.status == Status::Skipped
    }
}
