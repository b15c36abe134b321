//! Type definitions for discovered SCIM schemas and configuration.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A schema definition discovered from the server's `/Schemas` endpoint.
///
/// Describes the structure of one resource type (or extension) as the set of
/// its attribute definitions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaDefinition {
    /// Unique schema identifier (URI).
    pub id: String,
    /// Human-readable schema name.
    #[serde(default)]
    pub name: Option<String>,
    /// Schema description.
    #[serde(default)]
    pub description: Option<String>,
    /// Attribute definitions, in declaration order.
    #[serde(default)]
    pub attributes: Vec<AttributeDefinition>,
}

impl SchemaDefinition {
    /// Find a top-level attribute by name (case-insensitive, as SCIM
    /// attribute names are).
    pub fn attribute(&self, name: &str) -> Option<&AttributeDefinition> {
        self.attributes
            .iter()
            .find(|attr| attr.name.eq_ignore_ascii_case(name))
    }
}

/// Recursive definition of one schema attribute.
///
/// Complex attributes carry their children in `sub_attributes`; the protocol
/// forbids complex-in-complex nesting, so traversal is always finite.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeDefinition {
    /// Attribute name.
    pub name: String,
    /// Base data type.
    #[serde(rename = "type", default)]
    pub data_type: AttributeType,
    /// Whether this attribute holds a list of values.
    #[serde(default)]
    pub multi_valued: bool,
    /// Whether a value must be supplied on create.
    #[serde(default)]
    pub required: bool,
    /// Whether string comparison is case-sensitive.
    #[serde(default)]
    pub case_exact: bool,
    /// Who may write the attribute, and when.
    #[serde(default)]
    pub mutability: Mutability,
    /// Uniqueness scope of the value.
    #[serde(default)]
    pub uniqueness: Uniqueness,
    /// Closed set of allowed values, when declared.
    #[serde(default)]
    pub canonical_values: Vec<String>,
    /// For reference attributes, the names of referenceable targets
    /// (resource type names, or `"external"` / `"uri"`).
    #[serde(default)]
    pub reference_types: Vec<String>,
    /// Child definitions for complex attributes.
    #[serde(default)]
    pub sub_attributes: Vec<AttributeDefinition>,
}

impl Default for AttributeDefinition {
    fn default() -> Self {
        Self {
            name: String::new(),
            data_type: AttributeType::String,
            multi_valued: false,
            required: false,
            case_exact: false,
            mutability: Mutability::ReadWrite,
            uniqueness: Uniqueness::None,
            canonical_values: Vec::new(),
            reference_types: Vec::new(),
            sub_attributes: Vec::new(),
        }
    }
}

impl AttributeDefinition {
    /// Whether this is a complex attribute with children.
    pub fn is_complex(&self) -> bool {
        self.data_type == AttributeType::Complex
    }

    /// Whether a create payload may carry this attribute.
    pub fn is_writable_on_create(&self) -> bool {
        self.mutability != Mutability::ReadOnly
    }

    /// Whether a replace payload may change this attribute.
    pub fn is_writable_on_replace(&self) -> bool {
        matches!(self.mutability, Mutability::ReadWrite | Mutability::WriteOnly)
    }

    /// Find a sub-attribute by name (case-insensitive).
    pub fn sub_attribute(&self, name: &str) -> Option<&AttributeDefinition> {
        self.sub_attributes
            .iter()
            .find(|attr| attr.name.eq_ignore_ascii_case(name))
    }

    /// Resource type names this reference attribute can point at, with the
    /// non-resource `external` / `uri` markers filtered out.
    pub fn concrete_reference_targets(&self) -> impl Iterator<Item = &str> {
        self.reference_types
            .iter()
            .map(String::as_str)
            .filter(|target| !target.eq_ignore_ascii_case("external") && !target.eq_ignore_ascii_case("uri"))
    }
}

/// SCIM attribute base types (RFC 7643 §2.3).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum AttributeType {
    #[default]
    String,
    Boolean,
    Decimal,
    Integer,
    DateTime,
    Binary,
    Reference,
    Complex,
}

impl std::fmt::Display for AttributeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::String => "string",
            Self::Boolean => "boolean",
            Self::Decimal => "decimal",
            Self::Integer => "integer",
            Self::DateTime => "dateTime",
            Self::Binary => "binary",
            Self::Reference => "reference",
            Self::Complex => "complex",
        };
        f.write_str(name)
    }
}

/// Attribute mutability (RFC 7643 §2.2).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum Mutability {
    ReadOnly,
    #[default]
    ReadWrite,
    Immutable,
    WriteOnly,
}

/// Attribute uniqueness scope.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum Uniqueness {
    #[default]
    None,
    Server,
    Global,
}

/// One entry of the server's `/ResourceTypes` listing.
///
/// Maps a resource type name to its endpoint, primary schema, and extension
/// schemas.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceType {
    /// Resource type identifier, when the server assigns one.
    #[serde(default)]
    pub id: Option<String>,
    /// Resource type name (e.g. `User`).
    pub name: String,
    /// Endpoint path relative to the SCIM base URL (e.g. `/Users`).
    pub endpoint: String,
    /// URI of the primary schema.
    #[serde(rename = "schema")]
    pub schema_uri: String,
    /// Extension schemas layered on the primary one.
    #[serde(default)]
    pub schema_extensions: Vec<SchemaExtension>,
}

impl ResourceType {
    /// Endpoint path with a guaranteed leading slash.
    pub fn endpoint_path(&self) -> String {
        if self.endpoint.starts_with('/') {
            self.endpoint.clone()
        } else {
            format!("/{}", self.endpoint)
        }
    }
}

/// Reference to an extension schema on a [`ResourceType`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaExtension {
    /// URI of the extension schema.
    #[serde(rename = "schema")]
    pub schema_uri: String,
    /// Whether resources of the type must carry the extension.
    #[serde(default)]
    pub required: bool,
}

/// The server's `/ServiceProviderConfig` document, reduced to the features
/// the checks key on.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceProviderConfig {
    /// PATCH support.
    #[serde(default)]
    pub patch: SupportedFeature,
    /// Filter support.
    #[serde(default)]
    pub filter: SupportedFeature,
    /// Bulk support (unused by the checks, kept for callers).
    #[serde(default)]
    pub bulk: SupportedFeature,
    /// Sort support (unused by the checks, kept for callers).
    #[serde(default)]
    pub sort: SupportedFeature,
}

/// A feature toggle inside [`ServiceProviderConfig`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportedFeature {
    /// Whether the server advertises the feature.
    #[serde(default)]
    pub supported: bool,
    /// Feature-specific limit (e.g. filter `maxResults`).
    #[serde(default)]
    pub max_results: Option<u64>,
}

/// A SCIM list response envelope (RFC 7644 §3.4.2).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResponse {
    /// Declared total, when the server provides one.
    #[serde(default)]
    pub total_results: Option<u64>,
    /// The returned resources, left as raw JSON.
    #[serde(rename = "Resources", default)]
    pub resources: Vec<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn members_attribute() -> AttributeDefinition {
        serde_json::from_value(json!({
            "name": "members",
            "type": "complex",
            "multiValued": true,
            "subAttributes": [
                {"name": "value", "type": "string", "mutability": "immutable"},
                {"name": "$ref", "type": "reference", "referenceTypes": ["User", "Group"],
                 "mutability": "immutable"},
                {"name": "display", "type": "string", "mutability": "immutable"}
            ]
        }))
        .expect("valid attribute JSON")
    }

    #[test]
    fn deserializes_with_defaults() {
        let attr: AttributeDefinition =
            serde_json::from_value(json!({"name": "userName"})).unwrap();
        assert_eq!(attr.data_type, AttributeType::String);
        assert!(!attr.required);
        assert_eq!(attr.mutability, Mutability::ReadWrite);
    }

    #[test]
    fn complex_attribute_exposes_children() {
        let members = members_attribute();
        assert!(members.is_complex());
        assert!(members.sub_attribute("Value").is_some());
        let ref_attr = members.sub_attribute("$ref").unwrap();
        let targets: Vec<_> = ref_attr.concrete_reference_targets().collect();
        assert_eq!(targets, vec!["User", "Group"]);
    }

    #[test]
    fn external_reference_targets_are_filtered() {
        let attr: AttributeDefinition = serde_json::from_value(json!({
            "name": "profileUrl",
            "type": "reference",
            "referenceTypes": ["external"]
        }))
        .unwrap();
        assert_eq!(attr.concrete_reference_targets().count(), 0);
    }

    #[test]
    fn list_response_reads_capitalized_resources_key() {
        let list: ListResponse = serde_json::from_value(json!({
            "totalResults": 1,
            "Resources": [{"id": "42"}]
        }))
        .unwrap();
        assert_eq!(list.total_results, Some(1));
        assert_eq!(list.resources.len(), 1);
    }

    #[test]
    fn resource_type_normalizes_endpoint() {
        let rt: ResourceType = serde_json::from_value(json!({
            "name": "User",
            "endpoint": "Users",
            "schema": "urn:ietf:params:scim:schemas:core:2.0:User"
        }))
        .unwrap();
        assert_eq!(rt.endpoint_path(), "/Users");
    }
}
