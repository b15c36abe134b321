//! Discovery resolver.
//!
//! Learns what the server under test supports before any CRUD check runs:
//! the `/ServiceProviderConfig` document, the `/ResourceTypes` listing, and
//! the `/Schemas` definitions. The three probes are independent — one failing
//! records one ERROR result and the rest continue, so partial discovery is
//! allowed. Resource types whose schema never resolved get their CRUD
//! sequence skipped downstream, not aborted.

use crate::client::ScimClientExt;
use crate::context::{CheckContext, CheckOutcome, CheckSpec, run_check};
use crate::error::{CheckError, ProtocolError};
use crate::report::CheckResult;
use crate::schema::{ListResponse, ResourceType, SchemaDefinition, ServiceProviderConfig};
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

/// Everything discovery learned about the server.
///
/// Rebuilt fresh on every run; never cached across runs.
#[derive(Debug, Clone, Default)]
pub struct ServerCapabilities {
    /// The `/ServiceProviderConfig` document, when it resolved.
    pub service_provider_config: Option<ServiceProviderConfig>,
    /// Discovered resource types, in server order.
    pub resource_types: Vec<ResourceType>,
    /// Discovered schema definitions, keyed by schema URI.
    pub schemas: HashMap<String, SchemaDefinition>,
}

impl ServerCapabilities {
    /// The primary schema of a resource type, when discovered.
    pub fn schema_for(&self, resource_type: &ResourceType) -> Option<&SchemaDefinition> {
        self.schemas.get(&resource_type.schema_uri)
    }

    /// Look up a resource type by name (case-insensitive).
    pub fn resource_type_by_name(&self, name: &str) -> Option<&ResourceType> {
        self.resource_types
            .iter()
            .find(|rt| rt.name.eq_ignore_ascii_case(name))
    }

    /// Whether the server advertises PATCH support. Assumed when the
    /// configuration document was not discovered, so the checks still probe.
    pub fn patch_supported(&self) -> bool {
        self.service_provider_config
            .as_ref()
            .map(|config| config.patch.supported)
            .unwrap_or(true)
    }

    /// Whether the server advertises filter support. Assumed when the
    /// configuration document was not discovered.
    pub fn filter_supported(&self) -> bool {
        self.service_provider_config
            .as_ref()
            .map(|config| config.filter.supported)
            .unwrap_or(true)
    }
}

pub(crate) const SERVICE_PROVIDER_CONFIG: CheckSpec = CheckSpec {
    name: "service-provider-config",
    description: "Fetch and parse the /ServiceProviderConfig document.",
    tags: &["discovery:config"],
};

pub(crate) const RESOURCE_TYPES: CheckSpec = CheckSpec {
    name: "resource-types",
    description: "Fetch and parse the /ResourceTypes listing.",
    tags: &["discovery:resource-types"],
};

pub(crate) const RESOURCE_TYPES_BY_ID: CheckSpec = CheckSpec {
    name: "resource-types-by-id",
    description: "Each discovered resource type must be retrievable individually by its id.",
    tags: &["discovery:resource-types"],
};

pub(crate) const RESOURCE_TYPES_UNKNOWN_ID: CheckSpec = CheckSpec {
    name: "resource-types-unknown-id",
    description: "A request for an invalid resource type id must return a not-found error.",
    tags: &["discovery:resource-types"],
};

pub(crate) const SCHEMAS: CheckSpec = CheckSpec {
    name: "schemas",
    description: "Fetch and parse the /Schemas listing.",
    tags: &["discovery:schemas"],
};

pub(crate) const SCHEMAS_BY_ID: CheckSpec = CheckSpec {
    name: "schemas-by-id",
    description: "Each discovered schema must be retrievable individually by its id.",
    tags: &["discovery:schemas"],
};

pub(crate) const CORE_SCHEMAS_PRESENT: CheckSpec = CheckSpec {
    name: "core-schemas-present",
    description: "The mandatory meta-schemas (ServiceProviderConfig, ResourceType, Schema) \
                  must be listed on /Schemas.",
    tags: &["discovery:schemas"],
};

pub(crate) const RESOURCE_TYPE_SCHEMAS: CheckSpec = CheckSpec {
    name: "resource-type-schemas",
    description: "Every schema a resource type references (primary and extensions) must be \
                  retrievable from the Schemas endpoint.",
    tags: &["discovery:resource-types"],
};

pub(crate) const SCHEMAS_UNKNOWN_ID: CheckSpec = CheckSpec {
    name: "schemas-unknown-id",
    description: "A request for an invalid schema id must return a not-found error.",
    tags: &["discovery:schemas"],
};

pub(crate) const RANDOM_URL: CheckSpec = CheckSpec {
    name: "random-url",
    description: "A request to a random URL must return a not-found error.",
    tags: &["misc"],
};

/// All discovery checks, in execution order.
pub(crate) const DISCOVERY_CHECKS: &[CheckSpec] = &[
    SERVICE_PROVIDER_CONFIG,
    RESOURCE_TYPES,
    RESOURCE_TYPES_BY_ID,
    RESOURCE_TYPES_UNKNOWN_ID,
    SCHEMAS,
    SCHEMAS_BY_ID,
    CORE_SCHEMAS_PRESENT,
    RESOURCE_TYPE_SCHEMAS,
    SCHEMAS_UNKNOWN_ID,
    RANDOM_URL,
];

/// Meta-schema URIs every conformant server must expose.
const CORE_SCHEMA_URIS: [&str; 3] = [
    "urn:ietf:params:scim:schemas:core:2.0:ServiceProviderConfig",
    "urn:ietf:params:scim:schemas:core:2.0:ResourceType",
    "urn:ietf:params:scim:schemas:core:2.0:Schema",
];

/// Run all discovery checks and assemble the server's capabilities.
///
/// Capability resolution is run infrastructure, not a check: the three
/// documents are fetched even when the corresponding check results are
/// filtered out by tags, so a run scoped to CRUD tags alone still knows the
/// server's resource types and schemas. Only the negative-path probes are
/// gated behind the filter.
pub(crate) fn run_discovery(
    ctx: &mut CheckContext<'_>,
    results: &mut Vec<CheckResult>,
) -> ServerCapabilities {
    let mut caps = ServerCapabilities::default();

    let outcome = resolve_config(ctx, &mut caps);
    results.push(run_check(ctx, &SERVICE_PROVIDER_CONFIG, None, move |_| outcome));

    let outcome = resolve_resource_types(ctx, &mut caps);
    results.push(run_check(ctx, &RESOURCE_TYPES, None, move |_| outcome));

    let type_ids: Vec<String> = caps
        .resource_types
        .iter()
        .map(|rt| rt.id.clone().unwrap_or_else(|| rt.name.clone()))
        .collect();
    results.push(run_check(ctx, &RESOURCE_TYPES_BY_ID, None, |ctx| {
        if type_ids.is_empty() {
            return Ok(CheckOutcome::Skip(
                "no resource types were discovered to fetch individually".into(),
            ));
        }
        let mut failed = Vec::new();
        for id in &type_ids {
            if let Err(err) = ctx.client.get(&format!("/ResourceTypes/{id}")) {
                failed.push(format!("{id}: {err}"));
            }
        }
        if failed.is_empty() {
            Ok(CheckOutcome::Pass(format!(
                "all {} resource types retrievable by id",
                type_ids.len()
            )))
        } else {
            Err(CheckError::assertion(
                "every resource type retrievable by id",
                failed.join("; "),
            ))
        }
    }));

    results.push(run_check(ctx, &RESOURCE_TYPES_UNKNOWN_ID, None, |ctx| {
        expect_not_found(ctx, &format!("/ResourceTypes/{}", Uuid::new_v4()))
    }));

    let outcome = resolve_schemas(ctx, &mut caps);
    results.push(run_check(ctx, &SCHEMAS, None, move |_| outcome));

    // Borrow the assembled map immutably from here on.
    let schema_ids: Vec<String> = {
        let mut ids: Vec<String> = caps.schemas.keys().cloned().collect();
        ids.sort_unstable();
        ids
    };

    results.push(run_check(ctx, &SCHEMAS_BY_ID, None, |ctx| {
        if schema_ids.is_empty() {
            return Ok(CheckOutcome::Skip(
                "no schemas were discovered to fetch individually".into(),
            ));
        }
        let mut failed = Vec::new();
        for id in &schema_ids {
            if let Err(err) = ctx.client.get(&format!("/Schemas/{id}")) {
                failed.push(format!("{id}: {err}"));
            }
        }
        if failed.is_empty() {
            Ok(CheckOutcome::Pass(format!(
                "all {} schemas retrievable by id",
                schema_ids.len()
            )))
        } else {
            Err(CheckError::assertion(
                "every schema retrievable by id",
                failed.join("; "),
            ))
        }
    }));

    results.push(run_check(ctx, &CORE_SCHEMAS_PRESENT, None, |_| {
        if caps.schemas.is_empty() {
            return Ok(CheckOutcome::Skip(
                "no schemas were discovered to inspect".into(),
            ));
        }
        let missing: Vec<&str> = CORE_SCHEMA_URIS
            .iter()
            .copied()
            .filter(|uri| !caps.schemas.contains_key(*uri))
            .collect();
        if missing.is_empty() {
            Ok(CheckOutcome::Pass("all core meta-schemas are listed".into()))
        } else {
            Err(CheckError::assertion(
                "core meta-schemas listed on /Schemas",
                format!("missing: {}", missing.join(", ")),
            ))
        }
    }));

    // Every schema URI a resource type points at, primary first.
    let referenced: Vec<(String, Vec<String>)> = caps
        .resource_types
        .iter()
        .map(|rt| {
            let mut uris = vec![rt.schema_uri.clone()];
            uris.extend(rt.schema_extensions.iter().map(|ext| ext.schema_uri.clone()));
            (rt.name.clone(), uris)
        })
        .collect();
    results.push(run_check(ctx, &RESOURCE_TYPE_SCHEMAS, None, |ctx| {
        if referenced.is_empty() {
            return Ok(CheckOutcome::Skip(
                "no resource types were discovered to cross-check".into(),
            ));
        }
        let mut checked = 0usize;
        let mut failed = Vec::new();
        for (name, uris) in &referenced {
            for uri in uris {
                checked += 1;
                if let Err(err) = ctx.client.get(&format!("/Schemas/{uri}")) {
                    failed.push(format!("{name} -> {uri}: {err}"));
                }
            }
        }
        if failed.is_empty() {
            Ok(CheckOutcome::Pass(format!(
                "all {checked} referenced schemas retrievable"
            )))
        } else {
            Err(CheckError::assertion(
                "every schema referenced by a resource type retrievable",
                failed.join("; "),
            ))
        }
    }));

    results.push(run_check(ctx, &SCHEMAS_UNKNOWN_ID, None, |ctx| {
        expect_not_found(ctx, &format!("/Schemas/{}", Uuid::new_v4()))
    }));

    results.push(run_check(ctx, &RANDOM_URL, None, |ctx| {
        expect_not_found(ctx, &format!("/{}", Uuid::new_v4()))
    }));

    caps
}

fn resolve_config(
    ctx: &mut CheckContext<'_>,
    caps: &mut ServerCapabilities,
) -> Result<CheckOutcome, CheckError> {
    let (_, body) = ctx.client.get("/ServiceProviderConfig")?;
    let config: ServiceProviderConfig = parse(&body, "/ServiceProviderConfig")?;
    let reason = format!(
        "service provider config resolved (patch: {}, filter: {})",
        config.patch.supported, config.filter.supported
    );
    caps.service_provider_config = Some(config);
    Ok(CheckOutcome::Pass(reason))
}

fn resolve_resource_types(
    ctx: &mut CheckContext<'_>,
    caps: &mut ServerCapabilities,
) -> Result<CheckOutcome, CheckError> {
    let (_, body) = ctx.client.get("/ResourceTypes")?;
    let list: ListResponse = parse(&body, "/ResourceTypes")?;
    let mut resource_types = Vec::new();
    for entry in &list.resources {
        let rt: ResourceType = parse(entry, "/ResourceTypes entry")?;
        resource_types.push(rt);
    }
    if resource_types.is_empty() {
        return Err(CheckError::assertion(
            "at least one resource type",
            "an empty /ResourceTypes listing",
        ));
    }
    let names: Vec<&str> = resource_types.iter().map(|rt| rt.name.as_str()).collect();
    let reason = format!("resource types available: {}", names.join(", "));
    caps.resource_types = resource_types;
    Ok(CheckOutcome::Pass(reason))
}

fn resolve_schemas(
    ctx: &mut CheckContext<'_>,
    caps: &mut ServerCapabilities,
) -> Result<CheckOutcome, CheckError> {
    let (_, body) = ctx.client.get("/Schemas")?;
    let list: ListResponse = parse(&body, "/Schemas")?;
    let mut schemas = HashMap::new();
    for entry in &list.resources {
        let schema: SchemaDefinition = parse(entry, "/Schemas entry")?;
        schemas.insert(schema.id.clone(), schema);
    }
    if schemas.is_empty() {
        return Err(CheckError::assertion(
            "at least one schema",
            "an empty /Schemas listing",
        ));
    }
    let mut ids: Vec<&str> = schemas.keys().map(String::as_str).collect();
    ids.sort_unstable();
    let reason = format!("schemas available: {}", ids.join(", "));
    caps.schemas = schemas;
    Ok(CheckOutcome::Pass(reason))
}

/// Probe a path that must not exist and demand a not-found protocol error.
pub(crate) fn expect_not_found(
    ctx: &mut CheckContext<'_>,
    path: &str,
) -> Result<CheckOutcome, CheckError> {
    match ctx.client.get(path) {
        Err(err) if err.is_not_found() => Ok(CheckOutcome::Pass(format!(
            "{path} correctly returned a not-found error"
        ))),
        Err(err) => Err(CheckError::negative_path(
            format!("GET {path}"),
            format!("failed with the wrong kind of error: {err}"),
        )),
        Ok((status, _)) => Err(CheckError::negative_path(
            format!("GET {path}"),
            format!("the server answered with status {status}"),
        )),
    }
}

/// Parse a JSON body into a typed model, mapping failure to a malformed
/// response error naming the endpoint.
pub(crate) fn parse<T: serde::de::DeserializeOwned>(
    body: &Value,
    what: &str,
) -> Result<T, CheckError> {
    serde_json::from_value(body.clone())
        .map_err(|err| ProtocolError::malformed(format!("{what} could not be parsed: {err}")).into())
}
