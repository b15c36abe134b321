//! Top-level conformance run.
//!
//! Drives the whole sequence: discovery first, then the CRUD/filter checks
//! for every in-scope resource type in discovery order, then one best-effort
//! cleanup pass over all temporary resources. Execution is strictly
//! sequential — later checks depend on state created by earlier ones.

use crate::client::ScimClient;
use crate::context::{CheckConfig, CheckContext};
use crate::crud;
use crate::discovery;
use crate::error::{CheckError, ConformanceFailure, FailedCheck};
use crate::report::CheckResult;
use crate::tags::Tag;
use log::info;
use std::collections::BTreeSet;

/// Run all conformance checks against a server.
///
/// Always produces one [`CheckResult`] per registered check in scope,
/// whether it ran, failed, or was skipped. With
/// [`raise_exceptions`](CheckConfig::raise_exceptions) unset (the default)
/// this never returns `Err`; with it set, every captured check error is
/// returned at the end as a single [`ConformanceFailure`] — cleanup errors
/// excepted, cleanup being advisory.
pub fn check_server(
    client: &mut dyn ScimClient,
    config: &CheckConfig,
) -> Result<Vec<CheckResult>, ConformanceFailure> {
    let mut ctx = CheckContext::new(client, config);
    let mut results = Vec::new();

    let caps = discovery::run_discovery(&mut ctx, &mut results);
    info!(
        "discovery finished: {} resource types, {} schemas",
        caps.resource_types.len(),
        caps.schemas.len()
    );

    for rt in &caps.resource_types {
        if !config.resource_type_in_scope(&rt.name) {
            continue;
        }
        if caps.schema_for(rt).is_some() {
            results.extend(crud::check_resource_type(&mut ctx, &caps, rt));
        } else {
            results.extend(crud::skip_resource_type(
                &rt.name,
                "the schema for this resource type was not discovered",
            ));
        }
    }

    results.extend(ctx.cleanup());

    if config.raise_exceptions {
        let failures: Vec<FailedCheck> = results
            .iter()
            .filter(|result| result.is_error())
            .filter_map(|result| match &result.error {
                Some(CheckError::Cleanup { .. }) | None => None,
                Some(error) => Some(FailedCheck {
                    title: result.title.clone(),
                    resource_type: result.resource_type.clone(),
                    error: error.clone(),
                }),
            })
            .collect();
        if !failures.is_empty() {
            return Err(ConformanceFailure { failures });
        }
    }

    Ok(results)
}

/// All hierarchical tags used by the registered check suite, sorted for
/// reproducible iteration.
pub fn available_tags() -> Vec<Tag> {
    let tags: BTreeSet<Tag> = discovery::DISCOVERY_CHECKS
        .iter()
        .chain(crud::CRUD_CHECKS)
        .flat_map(|spec| spec.tag_values())
        .collect();
    tags.into_iter().collect()
}

/// The standard SCIM resource type names the engine knows how to test,
/// sorted.
pub fn standard_resource_types() -> Vec<&'static str> {
    vec!["Group", "User"]
}
