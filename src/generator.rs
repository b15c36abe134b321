//! Schema-driven random value generation.
//!
//! Synthesizes protocol-conformant attribute values from discovered
//! [`AttributeDefinition`]s: random scalars within safe ranges, canonical
//! values picked from the declared set, recursive complex values, and
//! reference values backed by real resources. Reference targets are created
//! through the server itself and registered as temporary resources, so a
//! generated `$ref`/`value` pair always points at something that exists.
//!
//! The generator never fails over missing optional metadata. It fails only
//! when a required attribute cannot be produced, and the caller converts that
//! into an ERROR result for the one check being prepared.

use crate::client::{ScimClientExt, resource_id};
use crate::context::{CheckContext, TemporaryResource};
use crate::discovery::ServerCapabilities;
use crate::error::{CheckError, GenerationError};
use crate::schema::{AttributeDefinition, AttributeType, Mutability, ResourceType};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use chrono::{DateTime, SecondsFormat, Utc};
use log::debug;
use rand::{Rng, seq::SliceRandom};
use serde_json::{Map, Value, json};
use uuid::Uuid;

/// Attributes the engine never writes; the server owns them.
const SERVER_OWNED: [&str; 3] = ["id", "meta", "schemas"];

/// A resource created to satisfy a reference-typed attribute.
#[derive(Debug, Clone)]
pub(crate) struct ReferenceTarget {
    /// Resource type name of the created target.
    pub resource_type: String,
    /// Server-assigned id.
    pub id: String,
    /// Path of the created resource, used for `$ref` values.
    pub location: String,
    /// Display text taken from the created resource, when it has one.
    pub display: Option<String>,
}

/// Build a create payload for a resource type.
///
/// Fills required attributes always; with `fill_all`, every attribute the
/// client may write on create. Read-only attributes are never populated.
/// Extension schema attributes are nested under their extension URI, which is
/// also appended to the payload's `schemas` array.
pub(crate) fn build_create_payload(
    ctx: &mut CheckContext<'_>,
    caps: &ServerCapabilities,
    resource_type: &ResourceType,
    fill_all: bool,
) -> Result<Value, CheckError> {
    let schema = caps.schema_for(resource_type).ok_or_else(|| {
        CheckError::Generation(GenerationError::UnknownReferenceTarget {
            resource_type: resource_type.name.clone(),
        })
    })?;

    let mut obj = Map::new();
    let mut schema_uris = vec![resource_type.schema_uri.clone()];
    fill_attributes(ctx, caps, &resource_type.name, schema, fill_all, &mut obj)?;

    for ext in &resource_type.schema_extensions {
        if !(ext.required || fill_all) {
            continue;
        }
        let Some(ext_schema) = caps.schemas.get(&ext.schema_uri) else {
            if ext.required {
                return Err(GenerationError::MissingExtensionSchema {
                    schema_uri: ext.schema_uri.clone(),
                }
                .into());
            }
            continue;
        };
        let mut ext_obj = Map::new();
        fill_attributes(ctx, caps, &resource_type.name, ext_schema, fill_all, &mut ext_obj)?;
        if !ext_obj.is_empty() {
            schema_uris.push(ext.schema_uri.clone());
            obj.insert(ext.schema_uri.clone(), Value::Object(ext_obj));
        }
    }

    obj.insert("schemas".into(), json!(schema_uris));
    Ok(Value::Object(obj))
}

/// Fill one object with generated values for a schema's attributes.
fn fill_attributes(
    ctx: &mut CheckContext<'_>,
    caps: &ServerCapabilities,
    subject_type: &str,
    schema: &crate::schema::SchemaDefinition,
    fill_all: bool,
    obj: &mut Map<String, Value>,
) -> Result<(), CheckError> {
    for attr in &schema.attributes {
        if SERVER_OWNED.contains(&attr.name.as_str()) || !attr.is_writable_on_create() {
            continue;
        }
        if !(attr.required || fill_all) {
            continue;
        }
        match generate_attribute(ctx, caps, subject_type, attr)? {
            Some(value) => {
                obj.insert(attr.name.clone(), value);
            }
            None if attr.required => {
                return Err(GenerationError::UnrepresentableType {
                    attribute: attr.name.clone(),
                    kind: attr.data_type.to_string(),
                }
                .into());
            }
            None => {}
        }
    }
    Ok(())
}

/// Build a full replacement payload from the current server representation.
///
/// Read-write and write-only attributes get fresh values; immutable
/// attributes are carried over from `current` unchanged; read-only
/// attributes are left out. Extensions present on the current resource (or
/// declared required) are regenerated the same way under their URI.
pub(crate) fn build_replacement_payload(
    ctx: &mut CheckContext<'_>,
    caps: &ServerCapabilities,
    resource_type: &ResourceType,
    current: &Value,
) -> Result<Value, CheckError> {
    let schema = caps.schema_for(resource_type).ok_or_else(|| {
        CheckError::Generation(GenerationError::UnknownReferenceTarget {
            resource_type: resource_type.name.clone(),
        })
    })?;

    let mut obj = Map::new();
    let mut schema_uris = vec![resource_type.schema_uri.clone()];
    if let Some(id) = current.get("id") {
        obj.insert("id".into(), id.clone());
    }
    refill_attributes(ctx, caps, &resource_type.name, schema, current, &mut obj)?;

    for ext in &resource_type.schema_extensions {
        if !(ext.required || current.get(&ext.schema_uri).is_some()) {
            continue;
        }
        let Some(ext_schema) = caps.schemas.get(&ext.schema_uri) else {
            if ext.required {
                return Err(GenerationError::MissingExtensionSchema {
                    schema_uri: ext.schema_uri.clone(),
                }
                .into());
            }
            continue;
        };
        let current_ext = current.get(&ext.schema_uri).cloned().unwrap_or(Value::Null);
        let mut ext_obj = Map::new();
        refill_attributes(ctx, caps, &resource_type.name, ext_schema, &current_ext, &mut ext_obj)?;
        if !ext_obj.is_empty() {
            schema_uris.push(ext.schema_uri.clone());
            obj.insert(ext.schema_uri.clone(), Value::Object(ext_obj));
        }
    }

    obj.insert("schemas".into(), json!(schema_uris));
    Ok(Value::Object(obj))
}

/// Fill one object with replacement values: regenerate what the client may
/// change, carry immutables over from `current`, leave read-only out.
fn refill_attributes(
    ctx: &mut CheckContext<'_>,
    caps: &ServerCapabilities,
    subject_type: &str,
    schema: &crate::schema::SchemaDefinition,
    current: &Value,
    obj: &mut Map<String, Value>,
) -> Result<(), CheckError> {
    for attr in &schema.attributes {
        if SERVER_OWNED.contains(&attr.name.as_str()) {
            continue;
        }
        match attr.mutability {
            Mutability::ReadOnly => {}
            Mutability::Immutable => {
                if let Some(value) = current.get(&attr.name) {
                    obj.insert(attr.name.clone(), value.clone());
                }
            }
            Mutability::ReadWrite | Mutability::WriteOnly => {
                match generate_attribute(ctx, caps, subject_type, attr)? {
                    Some(value) => {
                        obj.insert(attr.name.clone(), value);
                    }
                    None if attr.required => {
                        return Err(GenerationError::UnrepresentableType {
                            attribute: attr.name.clone(),
                            kind: attr.data_type.to_string(),
                        }
                        .into());
                    }
                    None => {}
                }
            }
        }
    }
    Ok(())
}

/// Build a payload for write probes against unknown ids: required,
/// non-reference scalar attributes only, so a server that validates the body
/// before routing still reaches its id lookup.
pub(crate) fn build_probe_payload(
    resource_type: &ResourceType,
    schema: &crate::schema::SchemaDefinition,
) -> Value {
    let mut obj = Map::new();
    obj.insert("schemas".into(), json!([resource_type.schema_uri]));
    for attr in &schema.attributes {
        if !attr.required || !attr.is_writable_on_create() {
            continue;
        }
        if matches!(
            attr.data_type,
            AttributeType::Reference | AttributeType::Complex
        ) {
            continue;
        }
        let value = generate_scalar(attr.data_type, &attr.name, None);
        let value = if attr.multi_valued { json!([value]) } else { value };
        obj.insert(attr.name.clone(), value);
    }
    Value::Object(obj)
}

/// Generate one value conformant to an attribute definition.
///
/// Returns `Ok(None)` when the attribute should be left unset: it is not
/// writable, or it is an optional reference whose target could not be
/// created. Multi-valued attributes come back as an array with at least one
/// entry.
pub(crate) fn generate_attribute(
    ctx: &mut CheckContext<'_>,
    caps: &ServerCapabilities,
    subject_type: &str,
    attr: &AttributeDefinition,
) -> Result<Option<Value>, CheckError> {
    if !attr.is_writable_on_create() {
        return Ok(None);
    }

    let entry = generate_single(ctx, caps, subject_type, attr, None)?;
    Ok(match entry {
        Some(value) if attr.multi_valued => Some(json!([value])),
        other => other,
    })
}

/// Generate one entry of an attribute (the element value for multi-valued
/// attributes). `parent` carries the enclosing complex attribute, used for
/// name-based format hints like `emails.value`.
fn generate_single(
    ctx: &mut CheckContext<'_>,
    caps: &ServerCapabilities,
    subject_type: &str,
    attr: &AttributeDefinition,
    parent: Option<&AttributeDefinition>,
) -> Result<Option<Value>, CheckError> {
    if !attr.canonical_values.is_empty() {
        let mut rng = rand::thread_rng();
        let choice = attr
            .canonical_values
            .choose(&mut rng)
            .cloned()
            .unwrap_or_default();
        return Ok(Some(Value::String(choice)));
    }

    match attr.data_type {
        AttributeType::Complex => generate_complex(ctx, caps, subject_type, attr),
        AttributeType::Reference => generate_reference(ctx, caps, subject_type, attr),
        scalar => Ok(Some(generate_scalar(scalar, &attr.name, parent))),
    }
}

/// Generate a complex value, recursing into children.
///
/// If a child is reference-typed with a concrete target, the target resource
/// is created first and the identifying and companion children (`$ref`,
/// `value`, `display`, `type`) are taken from the created resource's actual
/// returned fields, so the pair is always coherent.
fn generate_complex(
    ctx: &mut CheckContext<'_>,
    caps: &ServerCapabilities,
    subject_type: &str,
    attr: &AttributeDefinition,
) -> Result<Option<Value>, CheckError> {
    let reference = match reference_child_target(attr, subject_type) {
        Some(target) => match create_reference_target(ctx, caps, &attr.name, &target) {
            Ok(created) => Some(created),
            Err(err) if attr.required => return Err(err),
            Err(err) => {
                debug!(
                    "leaving optional attribute '{}' unset, reference target failed: {err}",
                    attr.name
                );
                return Ok(None);
            }
        },
        None => None,
    };

    let mut obj = Map::new();
    for child in &attr.sub_attributes {
        if !child.is_writable_on_create() {
            continue;
        }
        if let Some(target) = &reference {
            let value = match child.name.as_str() {
                _ if child.data_type == AttributeType::Reference => {
                    Some(Value::String(target.location.clone()))
                }
                "value" => Some(Value::String(target.id.clone())),
                "display" | "displayName" => target.display.clone().map(Value::String),
                "type" => Some(Value::String(target.resource_type.clone())),
                _ => None,
            };
            if let Some(value) = value {
                obj.insert(child.name.clone(), value);
                continue;
            }
        }
        if let Some(value) = generate_single(ctx, caps, subject_type, child, Some(attr))? {
            obj.insert(child.name.clone(), value);
        } else if child.required {
            return Err(GenerationError::UnrepresentableType {
                attribute: format!("{}.{}", attr.name, child.name),
                kind: child.data_type.to_string(),
            }
            .into());
        }
    }

    Ok(Some(Value::Object(obj)))
}

/// Generate a top-level reference value. Concrete targets get a freshly
/// created resource's location; external/URI references get a random URL.
fn generate_reference(
    ctx: &mut CheckContext<'_>,
    caps: &ServerCapabilities,
    subject_type: &str,
    attr: &AttributeDefinition,
) -> Result<Option<Value>, CheckError> {
    let target = attr
        .concrete_reference_targets()
        .find(|t| !t.eq_ignore_ascii_case(subject_type))
        .map(str::to_owned);

    match target {
        Some(target) => match create_reference_target(ctx, caps, &attr.name, &target) {
            Ok(created) => Ok(Some(Value::String(created.location))),
            Err(err) if attr.required => Err(err),
            Err(_) => Ok(None),
        },
        None => Ok(Some(Value::String(format!("https://{}.test", Uuid::new_v4())))),
    }
}

/// Pick which resource type a reference-typed child of `attr` points at,
/// excluding the subject's own type to keep generation finite.
fn reference_child_target(attr: &AttributeDefinition, subject_type: &str) -> Option<String> {
    attr.sub_attributes
        .iter()
        .filter(|child| child.data_type == AttributeType::Reference)
        .flat_map(AttributeDefinition::concrete_reference_targets)
        .find(|target| !target.eq_ignore_ascii_case(subject_type))
        .map(str::to_owned)
}

/// Create a minimal resource of the referenced type and register it for
/// cleanup. The target is scaffolding for the check being prepared, not a
/// check subject of its own.
pub(crate) fn create_reference_target(
    ctx: &mut CheckContext<'_>,
    caps: &ServerCapabilities,
    attribute: &str,
    target_type: &str,
) -> Result<ReferenceTarget, CheckError> {
    let resource_type = caps
        .resource_type_by_name(target_type)
        .ok_or_else(|| GenerationError::UnknownReferenceTarget {
            resource_type: target_type.to_owned(),
        })?
        .clone();

    let payload = build_create_payload(ctx, caps, &resource_type, false)?;
    let endpoint = resource_type.endpoint_path();
    let (_, body) = ctx.client.post(&endpoint, &payload).map_err(|source| {
        GenerationError::ReferenceTargetFailed {
            attribute: attribute.to_owned(),
            resource_type: resource_type.name.clone(),
            source,
        }
    })?;

    let id = resource_id(&body).map_err(|source| GenerationError::ReferenceTargetFailed {
        attribute: attribute.to_owned(),
        resource_type: resource_type.name.clone(),
        source,
    })?;

    ctx.registry.register(TemporaryResource {
        resource_type: resource_type.name.clone(),
        endpoint: endpoint.clone(),
        id: id.clone(),
    });

    let display = ["displayName", "userName", "name"]
        .iter()
        .find_map(|field| body.get(*field).and_then(Value::as_str))
        .map(str::to_owned);

    Ok(ReferenceTarget {
        resource_type: resource_type.name.clone(),
        location: format!("{endpoint}/{id}"),
        id,
        display,
    })
}

/// Generate a random scalar of the given type.
///
/// String values honor name-based format hints: attributes that look like
/// email addresses or phone numbers get syntactically valid ones, since
/// format-sensitive servers reject arbitrary text there (RFC 7643 §4.1.2
/// recommends RFC 5321 / RFC 3966 formats without expressing that in the
/// schema).
fn generate_scalar(
    kind: AttributeType,
    name: &str,
    parent: Option<&AttributeDefinition>,
) -> Value {
    let mut rng = rand::thread_rng();
    match kind {
        AttributeType::String => Value::String(generate_string(name, parent)),
        AttributeType::Boolean => Value::Bool(rng.gen_bool(0.5)),
        AttributeType::Integer => Value::from(rng.gen_range(0i64..=1_000_000)),
        AttributeType::Decimal => serde_json::Number::from_f64(
            (rng.gen_range(0.0f64..1000.0) * 100.0).round() / 100.0,
        )
        .map(Value::Number)
        .unwrap_or_else(|| Value::from(0)),
        AttributeType::DateTime => {
            let secs = rng.gen_range(946_684_800i64..1_893_456_000);
            let stamp = DateTime::<Utc>::from_timestamp(secs, 0).unwrap_or_else(Utc::now);
            Value::String(stamp.to_rfc3339_opts(SecondsFormat::Secs, true))
        }
        AttributeType::Binary => {
            let bytes: [u8; 16] = rng.r#gen();
            Value::String(BASE64.encode(bytes))
        }
        AttributeType::Reference | AttributeType::Complex => {
            // Handled by the dedicated paths; unreachable via generate_single.
            Value::Null
        }
    }
}

fn generate_string(name: &str, parent: Option<&AttributeDefinition>) -> String {
    let hint = format!(
        "{} {}",
        parent.map(|p| p.name.as_str()).unwrap_or(""),
        name
    )
    .to_ascii_lowercase();

    if hint.contains("email") {
        format!("{}@{}.test", Uuid::new_v4(), Uuid::new_v4())
    } else if hint.contains("phone") {
        let mut rng = rand::thread_rng();
        format!(
            "tel:+1-{:03}-{:03}-{:04}",
            rng.gen_range(200..999),
            rng.gen_range(100..999),
            rng.gen_range(0..10000)
        )
    } else {
        Uuid::new_v4().to_string()
    }
}

/// Pick the attribute filter checks key on: a single-valued, read-write
/// string the engine wrote on create. Unique attributes are preferred since
/// an equality filter on them identifies exactly the created resource.
pub(crate) fn filterable_attribute(
    schema: &crate::schema::SchemaDefinition,
) -> Option<&AttributeDefinition> {
    let candidates = schema.attributes.iter().filter(|attr| {
        attr.data_type == AttributeType::String
            && !attr.multi_valued
            && attr.mutability == Mutability::ReadWrite
            && attr.canonical_values.is_empty()
            && !SERVER_OWNED.contains(&attr.name.as_str())
    });
    let mut fallback = None;
    for attr in candidates {
        if attr.uniqueness != crate::schema::Uniqueness::None {
            return Some(attr);
        }
        if attr.required && fallback.is_none() {
            fallback = Some(attr);
        }
    }
    fallback
}
