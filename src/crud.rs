//! CRUD and filter checks for one resource type.
//!
//! Runs the ordered create → read → query/filter → replace → patch → delete
//! sequence, each step gated by its own tag. Skips propagate downstream (a
//! step whose subject never existed because an earlier step was filtered out
//! is itself skipped), but errors do not abort: later steps still run and
//! record their own outcome. Every resource the sequence creates is
//! registered for teardown; the delete step unregisters its subject so
//! cleanup attempts each id exactly once.

use crate::client::{ScimClientExt, resource_id};
use crate::context::{CheckContext, CheckOutcome, CheckSpec, TemporaryResource, run_check, skip_check};
use crate::discovery::{ServerCapabilities, expect_not_found, parse};
use crate::error::CheckError;
use crate::generator::{
    build_create_payload, build_probe_payload, build_replacement_payload, filterable_attribute,
    generate_attribute,
};
use crate::report::CheckResult;
use crate::schema::{
    AttributeDefinition, AttributeType, ListResponse, Mutability, ResourceType, SchemaDefinition,
};
use serde_json::{Value, json};
use uuid::Uuid;

pub(crate) const CREATE: CheckSpec = CheckSpec {
    name: "resource-create",
    description: "POST a generated payload and expect a created resource with a server id.",
    tags: &["crud:create"],
};

pub(crate) const READ: CheckSpec = CheckSpec {
    name: "resource-read",
    description: "GET the created resource by id and verify the writable attributes round-trip.",
    tags: &["crud:read"],
};

pub(crate) const READ_UNKNOWN_ID: CheckSpec = CheckSpec {
    name: "resource-read-unknown-id",
    description: "GET with a syntactically valid unknown id must return a not-found error.",
    tags: &["crud:read"],
};

pub(crate) const LIST: CheckSpec = CheckSpec {
    name: "resource-list",
    description: "GET the collection endpoint and expect the created resource to be listed.",
    tags: &["crud:query"],
};

pub(crate) const FILTER_MATCH: CheckSpec = CheckSpec {
    name: "resource-filter-match",
    description: "An equality filter on a written attribute must match the created resource.",
    tags: &["crud:query"],
};

pub(crate) const FILTER_EXCLUDE: CheckSpec = CheckSpec {
    name: "resource-filter-exclude",
    description: "An equality filter on a value never written must not match the created resource.",
    tags: &["crud:query"],
};

pub(crate) const REPLACE: CheckSpec = CheckSpec {
    name: "resource-replace",
    description: "PUT a full replacement payload and verify the new values on a subsequent read.",
    tags: &["crud:update"],
};

pub(crate) const REPLACE_UNKNOWN_ID: CheckSpec = CheckSpec {
    name: "resource-replace-unknown-id",
    description: "PUT with a syntactically valid unknown id must return a not-found error.",
    tags: &["crud:update"],
};

pub(crate) const PATCH_REPLACE: CheckSpec = CheckSpec {
    name: "resource-patch-replace",
    description: "PATCH-replace one attribute and verify only the targeted attribute changed.",
    tags: &["crud:patch"],
};

pub(crate) const PATCH_ADD: CheckSpec = CheckSpec {
    name: "resource-patch-add",
    description: "PATCH-add a value for an optional attribute and verify it is set afterwards.",
    tags: &["crud:patch"],
};

pub(crate) const PATCH_REMOVE: CheckSpec = CheckSpec {
    name: "resource-patch-remove",
    description: "PATCH-remove an optional attribute and verify it is absent afterwards.",
    tags: &["crud:patch"],
};

pub(crate) const PATCH_UNKNOWN_ID: CheckSpec = CheckSpec {
    name: "resource-patch-unknown-id",
    description: "PATCH with a syntactically valid unknown id must return a not-found error.",
    tags: &["crud:patch"],
};

pub(crate) const DELETE: CheckSpec = CheckSpec {
    name: "resource-delete",
    description: "DELETE the created resource and verify a subsequent read is not found.",
    tags: &["crud:delete"],
};

pub(crate) const DELETE_UNKNOWN_ID: CheckSpec = CheckSpec {
    name: "resource-delete-unknown-id",
    description: "DELETE with a syntactically valid unknown id must return a not-found error.",
    tags: &["crud:delete"],
};

/// All per-resource-type checks, in execution order.
pub(crate) const CRUD_CHECKS: &[CheckSpec] = &[
    CREATE,
    READ,
    READ_UNKNOWN_ID,
    LIST,
    FILTER_MATCH,
    FILTER_EXCLUDE,
    REPLACE,
    REPLACE_UNKNOWN_ID,
    PATCH_REPLACE,
    PATCH_ADD,
    PATCH_REMOVE,
    PATCH_UNKNOWN_ID,
    DELETE,
    DELETE_UNKNOWN_ID,
];

/// The resource under test for one resource-type sequence.
struct Subject {
    endpoint: String,
    id: String,
    /// Writable attributes submitted on the last write.
    sent: Value,
    /// Latest server representation.
    current: Value,
    /// Attribute name and value the filter checks query on.
    filter: Option<(String, String)>,
}

impl Subject {
    fn path(&self) -> String {
        format!("{}/{}", self.endpoint, self.id)
    }
}

/// Resolve the subject resource or bail out of the check body: skipped when
/// create never ran, an error when create ran and failed.
macro_rules! require_subject {
    ($subject:expr, $create_skipped:expr) => {
        match &$subject {
            Some(subject) => subject,
            None if $create_skipped => {
                return Ok(CheckOutcome::Skip(
                    "prerequisite check 'resource-create' was skipped".into(),
                ));
            }
            None => {
                return Err(CheckError::Prerequisite {
                    step: "resource-create".into(),
                });
            }
        }
    };
}

/// Emit SKIPPED results for every check of a resource type that cannot be
/// exercised (e.g. its schema failed to resolve during discovery).
pub(crate) fn skip_resource_type(resource_type: &str, reason: &str) -> Vec<CheckResult> {
    CRUD_CHECKS
        .iter()
        .map(|spec| skip_check(spec, Some(resource_type), reason))
        .collect()
}

/// Run the full check sequence for one resource type.
pub(crate) fn check_resource_type(
    ctx: &mut CheckContext<'_>,
    caps: &ServerCapabilities,
    rt: &ResourceType,
) -> Vec<CheckResult> {
    // The caller only dispatches resource types whose schema resolved.
    let Some(schema) = caps.schema_for(rt) else {
        return skip_resource_type(&rt.name, "no discovered schema for this resource type");
    };

    let mut results = Vec::new();
    let mut subject: Option<Subject> = None;
    let endpoint = rt.endpoint_path();

    let create_result = run_check(ctx, &CREATE, Some(&rt.name), |ctx| {
        let payload = build_create_payload(ctx, caps, rt, true)?;
        let (status, body) = ctx.client.post(&endpoint, &payload)?;
        if status != 201 {
            return Err(CheckError::assertion("status 201", format!("status {status}")));
        }
        let id = resource_id(&body)?;
        ctx.registry.register(TemporaryResource {
            resource_type: rt.name.clone(),
            endpoint: endpoint.clone(),
            id: id.clone(),
        });
        verify_written(caps, rt, &payload, &body)?;
        let filter = filterable_attribute(schema).and_then(|attr| {
            payload
                .get(&attr.name)
                .and_then(Value::as_str)
                .map(|value| (attr.name.clone(), value.to_owned()))
        });
        let reason = format!("created {} '{id}'", rt.name);
        subject = Some(Subject {
            endpoint: endpoint.clone(),
            id,
            sent: payload,
            current: body,
            filter,
        });
        Ok(CheckOutcome::Pass(reason))
    });
    let create_skipped = create_result.is_skipped();
    results.push(create_result);

    results.push(run_check(ctx, &READ, Some(&rt.name), |ctx| {
        let subject = require_subject!(subject, create_skipped);
        let (status, body) = ctx.client.get(&subject.path())?;
        if status != 200 {
            return Err(CheckError::assertion("status 200", format!("status {status}")));
        }
        let id = resource_id(&body)?;
        if id != subject.id {
            return Err(CheckError::assertion(
                format!("id '{}'", subject.id),
                format!("id '{id}'"),
            ));
        }
        verify_written(caps, rt, &subject.sent, &body)?;
        Ok(CheckOutcome::Pass(format!(
            "read back {} '{}' with all written attributes intact",
            rt.name, subject.id
        )))
    }));

    results.push(run_check(ctx, &READ_UNKNOWN_ID, Some(&rt.name), |ctx| {
        expect_not_found(ctx, &format!("{endpoint}/{}", Uuid::new_v4()))
    }));

    results.push(run_check(ctx, &LIST, Some(&rt.name), |ctx| {
        let subject = require_subject!(subject, create_skipped);
        let (_, body) = ctx.client.get(&endpoint)?;
        let list: ListResponse = parse(&body, &endpoint)?;
        if list_contains(&list.resources, &subject.id) {
            Ok(CheckOutcome::Pass(format!(
                "{} '{}' is present in the collection listing",
                rt.name, subject.id
            )))
        } else {
            Err(CheckError::assertion(
                format!("'{}' listed on {endpoint}", subject.id),
                "a listing without it".to_owned(),
            ))
        }
    }));

    results.push(run_check(ctx, &FILTER_MATCH, Some(&rt.name), |ctx| {
        let subject = require_subject!(subject, create_skipped);
        if !caps.filter_supported() {
            return Ok(CheckOutcome::Skip(
                "the server does not advertise filter support".into(),
            ));
        }
        let Some((attr, value)) = &subject.filter else {
            return Ok(CheckOutcome::Skip(
                "the schema offers no single-valued string attribute to filter on".into(),
            ));
        };
        let (_, body) = ctx.client.get(&filter_path(&endpoint, attr, value))?;
        let list: ListResponse = parse(&body, &endpoint)?;
        if list_contains(&list.resources, &subject.id) {
            Ok(CheckOutcome::Pass(format!(
                "filter {attr} eq \"{value}\" matched {} '{}'",
                rt.name, subject.id
            )))
        } else {
            Err(CheckError::assertion(
                format!("filter {attr} eq \"{value}\" to match '{}'", subject.id),
                "a result set without it".to_owned(),
            ))
        }
    }));

    results.push(run_check(ctx, &FILTER_EXCLUDE, Some(&rt.name), |ctx| {
        let subject = require_subject!(subject, create_skipped);
        if !caps.filter_supported() {
            return Ok(CheckOutcome::Skip(
                "the server does not advertise filter support".into(),
            ));
        }
        let Some((attr, _)) = &subject.filter else {
            return Ok(CheckOutcome::Skip(
                "the schema offers no single-valued string attribute to filter on".into(),
            ));
        };
        let mismatch = Uuid::new_v4().to_string();
        let (_, body) = ctx.client.get(&filter_path(&endpoint, attr, &mismatch))?;
        let list: ListResponse = parse(&body, &endpoint)?;
        if list_contains(&list.resources, &subject.id) {
            Err(CheckError::negative_path(
                format!("filter {attr} eq \"{mismatch}\""),
                format!("it matched {} '{}' anyway", rt.name, subject.id),
            ))
        } else {
            Ok(CheckOutcome::Pass(format!(
                "filter {attr} eq \"{mismatch}\" correctly excluded '{}'",
                subject.id
            )))
        }
    }));

    let mut replaced: Option<(Value, Value)> = None;
    results.push(run_check(ctx, &REPLACE, Some(&rt.name), |ctx| {
        let subject_ref = require_subject!(subject, create_skipped);
        let payload = build_replacement_payload(ctx, caps, rt, &subject_ref.current)?;
        let (status, _) = ctx.client.put(&subject_ref.path(), &payload)?;
        if status != 200 {
            return Err(CheckError::assertion("status 200", format!("status {status}")));
        }
        let (_, after) = ctx.client.get(&subject_ref.path())?;
        verify_written(caps, rt, &payload, &after)?;
        let reason = format!(
            "replaced {} '{}' and read the new values back",
            rt.name, subject_ref.id
        );
        replaced = Some((payload, after));
        Ok(CheckOutcome::Pass(reason))
    }));
    if let (Some(subject), Some((sent, after))) = (subject.as_mut(), replaced) {
        subject.sent = sent;
        subject.current = after;
        if let Some((name, value)) = &mut subject.filter {
            if let Some(new_value) = subject.sent.get(&*name).and_then(Value::as_str) {
                *value = new_value.to_owned();
            }
        }
    }

    results.push(run_check(ctx, &REPLACE_UNKNOWN_ID, Some(&rt.name), |ctx| {
        let unknown = Uuid::new_v4().to_string();
        // A body-validating server must still reach its id lookup.
        let mut payload = build_probe_payload(rt, schema);
        payload["id"] = json!(unknown);
        expect_write_not_found(
            ctx.client
                .put(&format!("{endpoint}/{unknown}"), &payload),
            &format!("PUT {endpoint}/{unknown}"),
        )
    }));

    let mut patched: Option<(Value, Value)> = None;
    results.push(run_check(ctx, &PATCH_REPLACE, Some(&rt.name), |ctx| {
        let subject_ref = require_subject!(subject, create_skipped);
        if !caps.patch_supported() {
            return Ok(CheckOutcome::Skip(
                "the server does not advertise PATCH support".into(),
            ));
        }
        let Some(target) = patchable_attribute(schema) else {
            return Ok(CheckOutcome::Skip(
                "the schema offers no single-valued writable attribute to patch".into(),
            ));
        };
        let Some(new_value) = generate_attribute(ctx, caps, &rt.name, target)? else {
            return Ok(CheckOutcome::Skip(format!(
                "no value could be generated for '{}'",
                target.name
            )));
        };

        let op = patch_op("replace", &target.name, Some(new_value.clone()));
        let (status, _) = ctx.client.patch(&subject_ref.path(), &op)?;
        if status != 200 && status != 204 {
            return Err(CheckError::assertion(
                "status 200 or 204",
                format!("status {status}"),
            ));
        }
        let (_, after) = ctx.client.get(&subject_ref.path())?;
        match after.get(&target.name) {
            Some(actual) if value_matches(&new_value, actual) => {}
            other => {
                return Err(CheckError::assertion(
                    format!("'{}' patched to {new_value}", target.name),
                    format!("{other:?}"),
                ));
            }
        }
        // Only the targeted attribute may change.
        let mut untouched = subject_ref.sent.clone();
        if let Some(map) = untouched.as_object_mut() {
            map.remove(&target.name);
        }
        verify_written(caps, rt, &untouched, &after)?;

        let mut sent = subject_ref.sent.clone();
        sent[&target.name] = new_value;
        let reason = format!(
            "patch-replaced '{}' on {} '{}' without disturbing other attributes",
            target.name, rt.name, subject_ref.id
        );
        patched = Some((sent, after));
        Ok(CheckOutcome::Pass(reason))
    }));
    if let (Some(subject), Some((sent, after))) = (subject.as_mut(), patched) {
        subject.sent = sent;
        subject.current = after;
    }

    let mut patched: Option<(Value, Value)> = None;
    results.push(run_check(ctx, &PATCH_ADD, Some(&rt.name), |ctx| {
        let subject_ref = require_subject!(subject, create_skipped);
        if !caps.patch_supported() {
            return Ok(CheckOutcome::Skip(
                "the server does not advertise PATCH support".into(),
            ));
        }
        let Some(target) = optional_patchable_attribute(schema) else {
            return Ok(CheckOutcome::Skip(
                "the schema offers no optional single-valued writable attribute to add".into(),
            ));
        };
        let Some(new_value) = generate_attribute(ctx, caps, &rt.name, target)? else {
            return Ok(CheckOutcome::Skip(format!(
                "no value could be generated for '{}'",
                target.name
            )));
        };

        let op = patch_op("add", &target.name, Some(new_value.clone()));
        let (status, _) = ctx.client.patch(&subject_ref.path(), &op)?;
        if status != 200 && status != 204 {
            return Err(CheckError::assertion(
                "status 200 or 204",
                format!("status {status}"),
            ));
        }
        let (_, after) = ctx.client.get(&subject_ref.path())?;
        match after.get(&target.name) {
            Some(actual) if value_matches(&new_value, actual) => {}
            other => {
                return Err(CheckError::assertion(
                    format!("'{}' added as {new_value}", target.name),
                    format!("{other:?}"),
                ));
            }
        }
        let mut untouched = subject_ref.sent.clone();
        if let Some(map) = untouched.as_object_mut() {
            map.remove(&target.name);
        }
        verify_written(caps, rt, &untouched, &after)?;

        let mut sent = subject_ref.sent.clone();
        sent[&target.name] = new_value;
        let reason = format!(
            "patch-added '{}' on {} '{}'",
            target.name, rt.name, subject_ref.id
        );
        patched = Some((sent, after));
        Ok(CheckOutcome::Pass(reason))
    }));
    if let (Some(subject), Some((sent, after))) = (subject.as_mut(), patched) {
        subject.sent = sent;
        subject.current = after;
    }

    let mut patched: Option<(Value, Value)> = None;
    results.push(run_check(ctx, &PATCH_REMOVE, Some(&rt.name), |ctx| {
        let subject_ref = require_subject!(subject, create_skipped);
        if !caps.patch_supported() {
            return Ok(CheckOutcome::Skip(
                "the server does not advertise PATCH support".into(),
            ));
        }
        // Removing a required attribute would be legitimately rejected.
        let Some(target) = optional_patchable_attribute(schema) else {
            return Ok(CheckOutcome::Skip(
                "the schema offers no optional single-valued writable attribute to remove".into(),
            ));
        };

        let op = patch_op("remove", &target.name, None);
        let (status, _) = ctx.client.patch(&subject_ref.path(), &op)?;
        if status != 200 && status != 204 {
            return Err(CheckError::assertion(
                "status 200 or 204",
                format!("status {status}"),
            ));
        }
        let (_, after) = ctx.client.get(&subject_ref.path())?;
        match after.get(&target.name) {
            None | Some(Value::Null) => {}
            Some(actual) => {
                return Err(CheckError::assertion(
                    format!("'{}' absent after removal", target.name),
                    actual.to_string(),
                ));
            }
        }
        let mut untouched = subject_ref.sent.clone();
        if let Some(map) = untouched.as_object_mut() {
            map.remove(&target.name);
        }
        verify_written(caps, rt, &untouched, &after)?;

        let mut sent = subject_ref.sent.clone();
        if let Some(map) = sent.as_object_mut() {
            map.remove(&target.name);
        }
        let reason = format!(
            "patch-removed '{}' from {} '{}'",
            target.name, rt.name, subject_ref.id
        );
        patched = Some((sent, after));
        Ok(CheckOutcome::Pass(reason))
    }));
    if let (Some(subject), Some((sent, after))) = (subject.as_mut(), patched) {
        subject.sent = sent;
        subject.current = after;
    }

    results.push(run_check(ctx, &PATCH_UNKNOWN_ID, Some(&rt.name), |ctx| {
        if !caps.patch_supported() {
            return Ok(CheckOutcome::Skip(
                "the server does not advertise PATCH support".into(),
            ));
        }
        // Patch a real schema attribute so a body-validating server still
        // reaches its id lookup.
        let Some(target) = patchable_attribute(schema) else {
            return Ok(CheckOutcome::Skip(
                "the schema offers no single-valued writable attribute to patch".into(),
            ));
        };
        let Some(value) = generate_attribute(ctx, caps, &rt.name, target)? else {
            return Ok(CheckOutcome::Skip(format!(
                "no value could be generated for '{}'",
                target.name
            )));
        };
        let unknown = Uuid::new_v4().to_string();
        let op = patch_op("replace", &target.name, Some(value));
        expect_write_not_found(
            ctx.client.patch(&format!("{endpoint}/{unknown}"), &op),
            &format!("PATCH {endpoint}/{unknown}"),
        )
    }));

    let mut deleted = false;
    results.push(run_check(ctx, &DELETE, Some(&rt.name), |ctx| {
        let subject_ref = require_subject!(subject, create_skipped);
        let (status, _) = ctx.client.delete(&subject_ref.path())?;
        if status != 204 {
            return Err(CheckError::assertion("status 204", format!("status {status}")));
        }
        // The resource is gone; cleanup must not try again.
        ctx.registry.unregister(&subject_ref.endpoint, &subject_ref.id);
        deleted = true;

        match ctx.client.get(&subject_ref.path()) {
            Err(err) if err.is_not_found() => Ok(CheckOutcome::Pass(format!(
                "deleted {} '{}' and the subsequent read was not found",
                rt.name, subject_ref.id
            ))),
            Err(err) => Err(CheckError::negative_path(
                format!("GET {} after delete", subject_ref.path()),
                format!("failed with the wrong kind of error: {err}"),
            )),
            Ok((status, _)) => Err(CheckError::negative_path(
                format!("GET {} after delete", subject_ref.path()),
                format!("the server answered with status {status}"),
            )),
        }
    }));
    if deleted {
        subject = None;
    }
    let _ = subject;

    results.push(run_check(ctx, &DELETE_UNKNOWN_ID, Some(&rt.name), |ctx| {
        let unknown = Uuid::new_v4().to_string();
        expect_write_not_found(
            ctx.client.delete(&format!("{endpoint}/{unknown}")),
            &format!("DELETE {endpoint}/{unknown}"),
        )
    }));

    results
}

/// Whether a listing contains a resource with the given id.
fn list_contains(resources: &[Value], id: &str) -> bool {
    resources
        .iter()
        .any(|resource| resource.get("id").and_then(Value::as_str) == Some(id))
}

fn filter_path(endpoint: &str, attribute: &str, value: &str) -> String {
    format!("{endpoint}?filter={attribute} eq \"{value}\"")
}

/// Demand that a write against an unknown id failed with not-found.
fn expect_write_not_found(
    outcome: crate::error::ProtocolResult<(u16, Value)>,
    probe: &str,
) -> Result<CheckOutcome, CheckError> {
    match outcome {
        Err(err) if err.is_not_found() => Ok(CheckOutcome::Pass(format!(
            "{probe} correctly returned a not-found error"
        ))),
        Err(err) => Err(CheckError::negative_path(
            probe.to_owned(),
            format!("failed with the wrong kind of error: {err}"),
        )),
        Ok((status, _)) => Err(CheckError::negative_path(
            probe.to_owned(),
            format!("the server answered with status {status}"),
        )),
    }
}

/// Build a PatchOp message with a single operation.
fn patch_op(op: &str, path: &str, value: Option<Value>) -> Value {
    let mut operation = json!({"op": op, "path": path});
    if let Some(value) = value {
        operation["value"] = value;
    }
    json!({
        "schemas": ["urn:ietf:params:scim:api:messages:2.0:PatchOp"],
        "Operations": [operation],
    })
}

/// The attribute the patch checks target: single-valued, read-write, scalar.
fn patchable_attribute(schema: &SchemaDefinition) -> Option<&AttributeDefinition> {
    schema.attributes.iter().find(|attr| {
        attr.mutability == Mutability::ReadWrite
            && !attr.multi_valued
            && !matches!(
                attr.data_type,
                AttributeType::Complex | AttributeType::Reference
            )
    })
}

/// Like [`patchable_attribute`], restricted to optional attributes: the
/// add/remove patch checks must not strip a required value.
fn optional_patchable_attribute(schema: &SchemaDefinition) -> Option<&AttributeDefinition> {
    schema.attributes.iter().find(|attr| {
        !attr.required
            && attr.mutability == Mutability::ReadWrite
            && !attr.multi_valued
            && !matches!(
                attr.data_type,
                AttributeType::Complex | AttributeType::Reference
            )
    })
}

/// Verify every writable attribute submitted in `sent` round-trips in
/// `returned`, for the primary schema and any extension the payload carries
/// under its URI.
fn verify_written(
    caps: &ServerCapabilities,
    rt: &ResourceType,
    sent: &Value,
    returned: &Value,
) -> Result<(), CheckError> {
    let Some(schema) = caps.schema_for(rt) else {
        return Ok(());
    };
    verify_attributes(schema, sent, returned)?;

    for ext in &rt.schema_extensions {
        let Some(ext_schema) = caps.schemas.get(&ext.schema_uri) else {
            continue;
        };
        let Some(sent_ext) = sent.get(&ext.schema_uri) else {
            continue;
        };
        match returned.get(&ext.schema_uri) {
            Some(actual) => verify_attributes(ext_schema, sent_ext, actual)?,
            None => {
                return Err(CheckError::assertion(
                    format!("extension '{}' present in the response", ext.schema_uri),
                    "a response without it".to_owned(),
                ));
            }
        }
    }
    Ok(())
}

/// Verify one schema's worth of submitted attributes against a returned
/// object. Write-only attributes are exempt; servers must not echo them.
fn verify_attributes(
    schema: &SchemaDefinition,
    sent: &Value,
    returned: &Value,
) -> Result<(), CheckError> {
    let Some(sent_map) = sent.as_object() else {
        return Ok(());
    };
    for (name, sent_value) in sent_map {
        if matches!(name.as_str(), "schemas" | "id" | "meta") {
            continue;
        }
        let Some(attr) = schema.attribute(name) else {
            continue;
        };
        if attr.mutability == Mutability::WriteOnly {
            continue;
        }
        match returned.get(name) {
            Some(actual) if value_matches(sent_value, actual) => {}
            Some(actual) => {
                return Err(CheckError::assertion(
                    format!("'{name}' to round-trip as {sent_value}"),
                    actual.to_string(),
                ));
            }
            None => {
                return Err(CheckError::assertion(
                    format!("'{name}' present in the response"),
                    "a response without it".to_owned(),
                ));
            }
        }
    }
    Ok(())
}

/// Structural subset comparison: every value the engine wrote must appear in
/// the server's representation, which may carry additional server-assigned
/// fields alongside.
fn value_matches(sent: &Value, actual: &Value) -> bool {
    match (sent, actual) {
        (Value::Object(sent), Value::Object(actual)) => sent
            .iter()
            .all(|(key, value)| actual.get(key).is_some_and(|a| value_matches(value, a))),
        (Value::Array(sent), Value::Array(actual)) => sent
            .iter()
            .all(|value| actual.iter().any(|a| value_matches(value, a))),
        _ => sent == actual,
    }
}
