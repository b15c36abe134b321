//! SCIM schema and discovery wire models.
//!
//! These are the client-side views of the structures a SCIM server exposes on
//! its discovery endpoints (RFC 7643): schemas with their recursive attribute
//! definitions, resource types, and the service provider configuration.
//! Deserialization is tolerant — anything a server may omit defaults rather
//! than fails, since malformed discovery data is itself a check outcome, not
//! a crash.

mod types;

pub use types::{
    AttributeDefinition, AttributeType, ListResponse, Mutability, ResourceType, SchemaDefinition,
    SchemaExtension, ServiceProviderConfig, SupportedFeature, Uniqueness,
};
