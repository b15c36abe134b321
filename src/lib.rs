//! SCIM 2.0 server conformance checker.
//!
//! Drives a SCIM server through discovery, CRUD round-trips, filter queries,
//! and patch operations, and reports every outcome as a
//! [`CheckResult`] — pass, fail, or skip — without panicking or erroring by
//! default, so callers can aggregate and inspect results.
//!
//! # Core Components
//!
//! - [`check_server`] - Run the full conformance suite against a server
//! - [`ScimClient`] - Trait for supplying the transport to the server under test
//! - [`CheckConfig`] - Tag filtering, resource-type scoping, raise-on-error
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use scim_conformance::{CheckConfig, check_server};
//! # fn example(client: &mut dyn scim_conformance::ScimClient) {
//! let config = CheckConfig::default();
//! let results = check_server(client, &config).expect("default config never raises");
//! for result in &results {
//!     println!("{:?} {}", result.status, result.title);
//! }
//! # }
//! ```
//!
//! Checks are selected with hierarchical [`Tag`]s: `include_tags = {"crud"}`
//! runs every CRUD check, `exclude_tags = {"crud:delete"}` skips just the
//! delete ones. Skipped checks still produce results, so the result count is
//! predictable from discovery plus filtering alone.

pub mod client;
pub mod context;
mod crud;
pub mod discovery;
pub mod error;
mod generator;
pub mod report;
mod runner;
pub mod schema;
pub mod tags;

// Re-export the public surface for convenience
pub use client::{Method, ScimClient, ScimClientExt};
pub use context::{CheckConfig, CheckContext, ResourceRegistry, TemporaryResource};
pub use discovery::ServerCapabilities;
pub use error::{
    CheckError, ConformanceFailure, FailedCheck, GenerationError, ProtocolError,
    ProtocolErrorKind, ProtocolResult,
};
pub use report::{CheckResult, Status};
pub use runner::{available_tags, check_server, standard_resource_types};
pub use schema::{
    AttributeDefinition, AttributeType, ListResponse, Mutability, ResourceType, SchemaDefinition,
    SchemaExtension, ServiceProviderConfig, SupportedFeature, Uniqueness,
};
pub use tags::{Tag, TagFilter};
