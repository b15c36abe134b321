//! In-memory mock SCIM server for integration tests.
//!
//! Implements [`ScimClient`] over plain maps: discovery endpoints, CRUD on
//! `/Users` and `/Groups`, equality filters, and PATCH. Misbehavior switches
//! let tests exercise the negative paths (a server that answers 200 on
//! unknown ids, refuses creations, or fails deletions).

use scim_conformance::{Method, ProtocolError, ProtocolErrorKind, ProtocolResult, ScimClient};
use serde_json::{Value, json};
use std::collections::BTreeMap;

const USER_SCHEMA_URI: &str = "urn:ietf:params:scim:schemas:core:2.0:User";
const GROUP_SCHEMA_URI: &str = "urn:ietf:params:scim:schemas:core:2.0:Group";
pub const ENTERPRISE_URI: &str = "urn:ietf:params:scim:schemas:extension:enterprise:2.0:User";

pub struct MockServer {
    resources: BTreeMap<&'static str, BTreeMap<String, Value>>,
    next_id: u64,
    /// Every DELETE path received, in order.
    pub delete_calls: Vec<String>,
    /// Advertise and honor PATCH.
    pub patch_supported: bool,
    /// Misbehave: answer 200 instead of 404 on unknown ids and URLs.
    pub accept_unknown_ids: bool,
    /// Misbehave: refuse creation for this resource type name.
    pub fail_create_for: Option<String>,
    /// Misbehave: every DELETE fails with a server error.
    pub fail_deletes: bool,
    /// Validate PUT/PATCH bodies before looking up the target id, the way a
    /// strict server does.
    pub validate_writes: bool,
}

impl MockServer {
    pub fn new() -> Self {
        Self {
            resources: [("Users", BTreeMap::new()), ("Groups", BTreeMap::new())].into(),
            next_id: 0,
            delete_calls: Vec::new(),
            patch_supported: true,
            accept_unknown_ids: false,
            fail_create_for: None,
            fail_deletes: false,
            validate_writes: false,
        }
    }

    pub fn stored(&self, collection: &str) -> &BTreeMap<String, Value> {
        &self.resources[collection]
    }

    pub fn is_empty(&self) -> bool {
        self.resources.values().all(BTreeMap::is_empty)
    }

    fn not_found_or(&self, path: &str, fallback: Value) -> ProtocolResult<(u16, Value)> {
        if self.accept_unknown_ids {
            Ok((200, fallback))
        } else {
            Err(ProtocolError::not_found(format!("{path} does not exist")))
        }
    }

    fn service_provider_config(&self) -> Value {
        json!({
            "schemas": ["urn:ietf:params:scim:schemas:core:2.0:ServiceProviderConfig"],
            "patch": {"supported": self.patch_supported},
            "filter": {"supported": true, "maxResults": 200},
            "bulk": {"supported": false},
            "sort": {"supported": false}
        })
    }

    fn resource_types(&self) -> Vec<Value> {
        vec![
            json!({
                "id": "User", "name": "User", "endpoint": "/Users",
                "schema": USER_SCHEMA_URI,
                "schemaExtensions": [{"schema": ENTERPRISE_URI, "required": false}]
            }),
            json!({
                "id": "Group", "name": "Group", "endpoint": "/Groups",
                "schema": GROUP_SCHEMA_URI
            }),
        ]
    }

    fn schemas(&self) -> Vec<Value> {
        let meta = |uri: &str, name: &str| {
            json!({"id": uri, "name": name, "attributes": []})
        };
        vec![
            json!({
                "id": USER_SCHEMA_URI,
                "name": "User",
                "attributes": [
                    {"name": "userName", "type": "string", "required": true,
                     "uniqueness": "server"},
                    {"name": "displayName", "type": "string"},
                    {"name": "active", "type": "boolean"},
                    {"name": "emails", "type": "complex", "multiValued": true,
                     "subAttributes": [
                        {"name": "value", "type": "string"},
                        {"name": "type", "type": "string",
                         "canonicalValues": ["work", "home"]},
                        {"name": "primary", "type": "boolean"}
                     ]},
                    {"name": "groups", "type": "complex", "multiValued": true,
                     "mutability": "readOnly",
                     "subAttributes": [{"name": "value", "type": "string"}]}
                ]
            }),
            json!({
                "id": GROUP_SCHEMA_URI,
                "name": "Group",
                "attributes": [
                    {"name": "displayName", "type": "string", "required": true},
                    {"name": "externalId", "type": "string"},
                    {"name": "members", "type": "complex", "multiValued": true,
                     "subAttributes": [
                        {"name": "value", "type": "string"},
                        {"name": "$ref", "type": "reference",
                         "referenceTypes": ["User", "Group"]},
                        {"name": "display", "type": "string"},
                        {"name": "type", "type": "string",
                         "canonicalValues": ["User", "Group"]}
                     ]}
                ]
            }),
            json!({
                "id": ENTERPRISE_URI,
                "name": "EnterpriseUser",
                "attributes": [
                    {"name": "employeeNumber", "type": "string"},
                    {"name": "department", "type": "string"}
                ]
            }),
            meta(
                "urn:ietf:params:scim:schemas:core:2.0:ServiceProviderConfig",
                "ServiceProviderConfig",
            ),
            meta("urn:ietf:params:scim:schemas:core:2.0:ResourceType", "ResourceType"),
            meta("urn:ietf:params:scim:schemas:core:2.0:Schema", "Schema"),
        ]
    }

    fn list_response(resources: Vec<Value>) -> Value {
        json!({
            "schemas": ["urn:ietf:params:scim:api:messages:2.0:ListResponse"],
            "totalResults": resources.len(),
            "Resources": resources
        })
    }

    fn collection_of(path: &str) -> Option<(&'static str, &'static str)> {
        if path == "/Users" || path.starts_with("/Users/") {
            Some(("Users", "User"))
        } else if path == "/Groups" || path.starts_with("/Groups/") {
            Some(("Groups", "Group"))
        } else {
            None
        }
    }

    fn required_attribute(type_name: &str) -> &'static str {
        match type_name {
            "User" => "userName",
            _ => "displayName",
        }
    }

    fn known_attributes(type_name: &str) -> &'static [&'static str] {
        match type_name {
            "User" => &["userName", "displayName", "active", "emails", "groups"],
            _ => &["displayName", "externalId", "members"],
        }
    }

    /// Strict-mode body validation, applied before the id lookup.
    fn validate_put(&self, type_name: &str, payload: Option<&Value>) -> ProtocolResult<()> {
        let required = Self::required_attribute(type_name);
        let present = payload
            .and_then(|body| body.get(required))
            .and_then(Value::as_str)
            .is_some();
        if present {
            Ok(())
        } else {
            Err(ProtocolError {
                kind: ProtocolErrorKind::InvalidRequest,
                status: Some(400),
                detail: format!("missing required attribute '{required}'"),
            })
        }
    }

    /// Strict-mode patch validation: every op path must name a known attribute.
    fn validate_patch(&self, type_name: &str, payload: Option<&Value>) -> ProtocolResult<()> {
        let operations = payload
            .and_then(|body| body.get("Operations"))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        for operation in &operations {
            let path = operation.get("path").and_then(Value::as_str).unwrap_or("");
            if !Self::known_attributes(type_name).contains(&path) {
                return Err(ProtocolError {
                    kind: ProtocolErrorKind::InvalidRequest,
                    status: Some(400),
                    detail: format!("'{path}' is not an attribute of {type_name}"),
                });
            }
        }
        Ok(())
    }

    fn create(
        &mut self,
        collection: &'static str,
        type_name: &str,
        payload: Option<&Value>,
    ) -> ProtocolResult<(u16, Value)> {
        if self.fail_create_for.as_deref() == Some(type_name) {
            return Err(ProtocolError {
                kind: ProtocolErrorKind::Other,
                status: Some(500),
                detail: format!("{type_name} creation is refused"),
            });
        }
        let mut body = payload.cloned().unwrap_or_else(|| json!({}));
        let required = Self::required_attribute(type_name);
        if body.get(required).and_then(Value::as_str).is_none() {
            return Err(ProtocolError {
                kind: ProtocolErrorKind::InvalidRequest,
                status: Some(400),
                detail: format!("missing required attribute '{required}'"),
            });
        }
        self.next_id += 1;
        let id = format!("{}-{}", type_name.to_ascii_lowercase(), self.next_id);
        body["id"] = json!(id);
        body["meta"] = json!({
            "resourceType": type_name,
            "location": format!("/{collection}/{id}")
        });
        self.resources
            .get_mut(collection)
            .expect("known collection")
            .insert(id, body.clone());
        Ok((201, body))
    }

    fn filtered_list(&self, collection: &str, query: Option<&str>) -> ProtocolResult<Value> {
        let all = self.resources[collection].values().cloned();
        let resources: Vec<Value> = match query.and_then(parse_eq_filter) {
            Some((attribute, value)) => all
                .filter(|resource| {
                    resource.get(&attribute).and_then(Value::as_str) == Some(value.as_str())
                })
                .collect(),
            None => all.collect(),
        };
        Ok(Self::list_response(resources))
    }

    fn apply_patch(resource: &mut Value, op_body: Option<&Value>) -> ProtocolResult<()> {
        let operations = op_body
            .and_then(|body| body.get("Operations"))
            .and_then(Value::as_array)
            .ok_or_else(|| ProtocolError {
                kind: ProtocolErrorKind::InvalidRequest,
                status: Some(400),
                detail: "PatchOp without Operations".into(),
            })?;
        for operation in operations {
            let op = operation.get("op").and_then(Value::as_str).unwrap_or("");
            let path = operation.get("path").and_then(Value::as_str).unwrap_or("");
            let target = resource.as_object_mut().expect("stored resources are objects");
            match op {
                "add" | "replace" => {
                    let value = operation.get("value").cloned().unwrap_or(Value::Null);
                    target.insert(path.to_owned(), value);
                }
                "remove" => {
                    target.remove(path);
                }
                other => {
                    return Err(ProtocolError {
                        kind: ProtocolErrorKind::InvalidRequest,
                        status: Some(400),
                        detail: format!("unsupported patch op '{other}'"),
                    });
                }
            }
        }
        Ok(())
    }
}

fn parse_eq_filter(query: &str) -> Option<(String, String)> {
    let filter = query.strip_prefix("filter=")?;
    let (attribute, rest) = filter.split_once(" eq ")?;
    let value = rest.trim().trim_matches('"');
    Some((attribute.trim().to_owned(), value.to_owned()))
}

impl ScimClient for MockServer {
    fn request(
        &mut self,
        method: Method,
        path: &str,
        payload: Option<&Value>,
    ) -> ProtocolResult<(u16, Value)> {
        let (path, query) = match path.split_once('?') {
            Some((p, q)) => (p, Some(q)),
            None => (path, None),
        };

        // Discovery endpoints
        match (method, path) {
            (Method::Get, "/ServiceProviderConfig") => {
                return Ok((200, self.service_provider_config()));
            }
            (Method::Get, "/ResourceTypes") => {
                return Ok((200, Self::list_response(self.resource_types())));
            }
            (Method::Get, "/Schemas") => {
                return Ok((200, Self::list_response(self.schemas())));
            }
            _ => {}
        }
        if method == Method::Get {
            if let Some(id) = path.strip_prefix("/ResourceTypes/") {
                let found = self
                    .resource_types()
                    .into_iter()
                    .find(|rt| rt.get("id").and_then(Value::as_str) == Some(id));
                return match found {
                    Some(rt) => Ok((200, rt)),
                    None => self.not_found_or(path, json!({})),
                };
            }
            if let Some(id) = path.strip_prefix("/Schemas/") {
                let found = self
                    .schemas()
                    .into_iter()
                    .find(|schema| schema.get("id").and_then(Value::as_str) == Some(id));
                return match found {
                    Some(schema) => Ok((200, schema)),
                    None => self.not_found_or(path, json!({})),
                };
            }
        }

        let Some((collection, type_name)) = Self::collection_of(path) else {
            return self.not_found_or(path, json!({}));
        };

        let id = path
            .strip_prefix(&format!("/{collection}/"))
            .map(str::to_owned);

        match (method, id) {
            (Method::Post, None) => self.create(collection, type_name, payload),
            (Method::Get, None) => Ok((200, self.filtered_list(collection, query)?)),
            (Method::Get, Some(id)) => match self.resources[collection].get(&id) {
                Some(resource) => Ok((200, resource.clone())),
                None => self.not_found_or(path, json!({"id": id})),
            },
            (Method::Put, Some(id)) => {
                if self.validate_writes {
                    self.validate_put(type_name, payload)?;
                }
                if !self.resources[collection].contains_key(&id) {
                    return self.not_found_or(path, json!({"id": id}));
                }
                let mut body = payload.cloned().unwrap_or_else(|| json!({}));
                body["id"] = json!(id);
                body["meta"] = json!({
                    "resourceType": type_name,
                    "location": format!("/{collection}/{id}")
                });
                self.resources
                    .get_mut(collection)
                    .expect("known collection")
                    .insert(id, body.clone());
                Ok((200, body))
            }
            (Method::Patch, Some(id)) => {
                if !self.patch_supported {
                    return Err(ProtocolError {
                        kind: ProtocolErrorKind::InvalidRequest,
                        status: Some(501),
                        detail: "PATCH is not implemented".into(),
                    });
                }
                if self.validate_writes {
                    self.validate_patch(type_name, payload)?;
                }
                let Some(mut resource) =
                    self.resources[collection].get(&id).cloned()
                else {
                    return self.not_found_or(path, json!({"id": id}));
                };
                Self::apply_patch(&mut resource, payload)?;
                self.resources
                    .get_mut(collection)
                    .expect("known collection")
                    .insert(id, resource.clone());
                Ok((200, resource))
            }
            (Method::Delete, Some(id)) => {
                self.delete_calls.push(path.to_owned());
                if self.fail_deletes {
                    return Err(ProtocolError {
                        kind: ProtocolErrorKind::Other,
                        status: Some(500),
                        detail: "deletions are refused".into(),
                    });
                }
                match self
                    .resources
                    .get_mut(collection)
                    .expect("known collection")
                    .remove(&id)
                {
                    Some(_) => Ok((204, Value::Null)),
                    None if self.accept_unknown_ids => Ok((204, Value::Null)),
                    None => Err(ProtocolError::not_found(format!("{path} does not exist"))),
                }
            }
            _ => Err(ProtocolError {
                kind: ProtocolErrorKind::InvalidRequest,
                status: Some(405),
                detail: format!("{method} not allowed on {path}"),
            }),
        }
    }
}
