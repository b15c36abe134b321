//! Transport boundary for the conformance engine.
//!
//! The engine never speaks HTTP itself. Callers supply a [`ScimClient`]
//! implementation that performs the actual protocol requests and returns
//! parsed JSON bodies or typed [`ProtocolError`]s. The engine treats any
//! error as either an expected negative-path outcome or a check failure,
//! depending on which check issued the request.

use crate::error::{ProtocolError, ProtocolResult};
use serde_json::Value;

/// HTTP method of a SCIM request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        };
        f.write_str(name)
    }
}

/// Connection to the SCIM server under test.
///
/// `path` is relative to the server's SCIM base URL (e.g. `/Users`,
/// `/Schemas/urn:...`). Implementations own per-request concerns such as
/// authentication and timeouts; a hung request blocks the whole run by
/// design, since the engine is strictly sequential.
pub trait ScimClient {
    /// Perform one request and return the status code and parsed body.
    ///
    /// Non-2xx outcomes must surface as [`ProtocolError`] with a faithful
    /// `kind`; in particular, 404 responses must map to
    /// [`ProtocolErrorKind::NotFound`](crate::error::ProtocolErrorKind::NotFound)
    /// for the negative-path checks to be meaningful.
    fn request(&mut self, method: Method, path: &str, payload: Option<&Value>)
    -> ProtocolResult<(u16, Value)>;
}

/// Convenience wrappers over [`ScimClient::request`].
///
/// Blanket-implemented; checks use these instead of spelling out methods.
pub trait ScimClientExt: ScimClient {
    fn get(&mut self, path: &str) -> ProtocolResult<(u16, Value)> {
        self.request(Method::Get, path, None)
    }

    fn post(&mut self, path: &str, payload: &Value) -> ProtocolResult<(u16, Value)> {
        self.request(Method::Post, path, Some(payload))
    }

    fn put(&mut self, path: &str, payload: &Value) -> ProtocolResult<(u16, Value)> {
        self.request(Method::Put, path, Some(payload))
    }

    fn patch(&mut self, path: &str, payload: &Value) -> ProtocolResult<(u16, Value)> {
        self.request(Method::Patch, path, Some(payload))
    }

    fn delete(&mut self, path: &str) -> ProtocolResult<(u16, Value)> {
        self.request(Method::Delete, path, None)
    }
}

impl<C: ScimClient + ?Sized> ScimClientExt for C {}

/// Extract the server-assigned `id` from a resource body.
pub(crate) fn resource_id(body: &Value) -> ProtocolResult<String> {
    body.get("id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(str::to_owned)
        .ok_or_else(|| ProtocolError::malformed("response body has no usable 'id' attribute"))
}
