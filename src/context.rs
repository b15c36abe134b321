//! Per-run execution state and the check execution boundary.
//!
//! A [`CheckContext`] is created at the start of a run and discarded at the
//! end; it owns the registry of temporary resources created along the way so
//! teardown is a single auditable pass. [`run_check`] is the boundary every
//! check executes behind: it applies tag filtering and converts any error
//! into an ERROR [`CheckResult`] instead of letting it escape into the next
//! check.

use crate::client::{ScimClient, ScimClientExt};
use crate::error::CheckError;
use crate::report::{CheckResult, Status};
use crate::tags::{Tag, TagFilter};
use log::{debug, warn};
use std::collections::BTreeSet;

/// Configuration for one conformance run.
#[derive(Debug, Clone, Default)]
pub struct CheckConfig {
    /// Execute only checks with at least one tag under these. Empty = all.
    pub include_tags: BTreeSet<Tag>,
    /// Skip checks with any tag under these.
    pub exclude_tags: BTreeSet<Tag>,
    /// Restrict CRUD checks to these resource type names. Empty = all
    /// discovered.
    pub resource_types: BTreeSet<String>,
    /// Return all captured errors as one aggregate
    /// [`ConformanceFailure`](crate::error::ConformanceFailure) at the end of
    /// the run. Default: failures surface only as ERROR results.
    pub raise_exceptions: bool,
}

impl CheckConfig {
    /// The tag filter implied by this configuration.
    pub fn tag_filter(&self) -> TagFilter {
        TagFilter {
            include: self.include_tags.clone(),
            exclude: self.exclude_tags.clone(),
        }
    }

    /// Whether a discovered resource type is in scope for CRUD checks.
    pub fn resource_type_in_scope(&self, name: &str) -> bool {
        self.resource_types.is_empty() || self.resource_types.contains(name)
    }
}

/// A resource created during the run solely to support the checks, tracked
/// for best-effort deletion at run end.
#[derive(Debug, Clone)]
pub struct TemporaryResource {
    /// Resource type name.
    pub resource_type: String,
    /// Collection endpoint the resource lives under (e.g. `/Users`).
    pub endpoint: String,
    /// Server-assigned id.
    pub id: String,
}

impl TemporaryResource {
    /// Path of the individual resource.
    pub fn path(&self) -> String {
        format!("{}/{}", self.endpoint, self.id)
    }
}

/// Owned registry of temporary resources, single cleanup pass at run end.
///
/// Entries a check already deleted itself are unregistered so every id gets
/// exactly one delete attempt.
#[derive(Debug, Default)]
pub struct ResourceRegistry {
    entries: Vec<TemporaryResource>,
}

impl ResourceRegistry {
    /// Track a created resource for teardown.
    pub fn register(&mut self, resource: TemporaryResource) {
        debug!(
            "registered temporary {} '{}' for cleanup",
            resource.resource_type, resource.id
        );
        self.entries.push(resource);
    }

    /// Drop a tracked resource that was already deleted by a check.
    pub fn unregister(&mut self, endpoint: &str, id: &str) {
        self.entries
            .retain(|entry| !(entry.endpoint == endpoint && entry.id == id));
    }

    /// Number of currently tracked resources.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no resources are tracked.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Mutable state for a single conformance run.
///
/// Exactly one context exists per invocation of the entry point; a run is not
/// re-entrant and a second run needs a fresh context.
pub struct CheckContext<'a> {
    /// Connection to the server under test.
    pub client: &'a mut dyn ScimClient,
    /// Run configuration.
    pub config: &'a CheckConfig,
    /// Temporary resources awaiting teardown.
    pub registry: ResourceRegistry,
}

impl<'a> CheckContext<'a> {
    /// Create the context for one run.
    pub fn new(client: &'a mut dyn ScimClient, config: &'a CheckConfig) -> Self {
        Self {
            client,
            config,
            registry: ResourceRegistry::default(),
        }
    }

    /// Delete every still-tracked resource, most recent first, one attempt
    /// each. Failures become ERROR results but are advisory: they are
    /// excluded from the aggregate raise.
    pub(crate) fn cleanup(&mut self) -> Vec<CheckResult> {
        let mut entries = std::mem::take(&mut self.registry.entries);
        entries.reverse();

        let mut results = Vec::new();
        for entry in entries {
            match self.client.delete(&entry.path()) {
                Ok(_) => {
                    debug!("cleaned up {} '{}'", entry.resource_type, entry.id);
                }
                Err(err) if err.is_not_found() => {
                    // Already gone, e.g. cascade-deleted with its referent.
                    debug!("{} '{}' was already gone", entry.resource_type, entry.id);
                }
                Err(err) => {
                    warn!(
                        "failed to clean up {} '{}': {err}",
                        entry.resource_type, entry.id
                    );
                    results.push(CheckResult {
                        status: Status::Error,
                        title: "cleanup".into(),
                        description: "Delete resources created during the run.".into(),
                        tags: vec![Tag::new("cleanup")],
                        resource_type: Some(entry.resource_type.clone()),
                        reason: Some(format!(
                            "could not delete {} '{}': {err}",
                            entry.resource_type, entry.id
                        )),
                        error: Some(CheckError::Cleanup {
                            resource_type: entry.resource_type,
                            id: entry.id,
                            source: err,
                        }),
                    });
                }
            }
        }
        results
    }
}

/// Static description of one registered check.
#[derive(Debug, Clone, Copy)]
pub(crate) struct CheckSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub tags: &'static [&'static str],
}

impl CheckSpec {
    pub(crate) fn tag_values(&self) -> Vec<Tag> {
        self.tags.iter().map(|t| Tag::new(t)).collect()
    }
}

/// What a check body reports when it does not fail.
pub(crate) enum CheckOutcome {
    /// The server behaved as required.
    Pass(String),
    /// The check could not meaningfully run (unsupported feature, nothing to
    /// exercise).
    Skip(String),
}

/// Execute one check behind the tag filter and the error boundary.
pub(crate) fn run_check<F>(
    ctx: &mut CheckContext<'_>,
    spec: &CheckSpec,
    resource_type: Option<&str>,
    body: F,
) -> CheckResult
where
    F: FnOnce(&mut CheckContext<'_>) -> Result<CheckOutcome, CheckError>,
{
    let tags = spec.tag_values();
    if !ctx.config.tag_filter().allows(&tags) {
        return skip_check(spec, resource_type, "skipped by tag filtering");
    }

    debug!("running check '{}' ({:?})", spec.name, resource_type);
    let (status, reason, error) = match body(ctx) {
        Ok(CheckOutcome::Pass(reason)) => (Status::Success, reason, None),
        Ok(CheckOutcome::Skip(reason)) => (Status::Skipped, reason, None),
        Err(err) => (Status::Error, err.to_string(), Some(err)),
    };

    CheckResult {
        status,
        title: spec.name.into(),
        description: spec.description.into(),
        tags,
        resource_type: resource_type.map(str::to_owned),
        reason: Some(reason),
        error,
    }
}

/// Produce a SKIPPED result for a check that never executed.
pub(crate) fn skip_check(
    spec: &CheckSpec,
    resource_type: Option<&str>,
    reason: &str,
) -> CheckResult {
    CheckResult {
        status: Status::Skipped,
        title: spec.name.into(),
        description: spec.description.into(),
        tags: spec.tag_values(),
        resource_type: resource_type.map(str::to_owned),
        reason: Some(reason.into()),
        error: None,
    }
}
