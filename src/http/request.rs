//! Request correlation.
//!
//! # Responsibilities
//! - Resolve the correlation ID for each inbound request
//! - Carry the ID and its bound logger to handlers via request extensions
//!
//! # Design Decisions
//! - An inbound `x-request-id` is trusted verbatim; uniqueness is the
//!   caller's (or gateway's) responsibility and the format is not checked
//! - Header values that are not valid visible ASCII are treated as absent
//! - Generated IDs are UUID v4 (122 random bits)

use std::fmt;

use axum::http::{HeaderMap, HeaderName};
use uuid::Uuid;

use crate::observability::StructuredLogger;

/// Correlation header name.
pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Opaque correlation identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestId(String);

impl RequestId {
    /// Generate a fresh UUID v4 identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for RequestId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Use the inbound `x-request-id` when present, otherwise generate one.
pub fn resolve_request_id(headers: &HeaderMap) -> RequestId {
    headers
        .get(&X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .map(|v| RequestId(v.to_string()))
        .unwrap_or_else(RequestId::generate)
}

/// Per-request observability context, inserted into request extensions.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: RequestId,
    pub logger: StructuredLogger,
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_inbound_header_is_propagated() {
        let mut headers = HeaderMap::new();
        headers.insert(X_REQUEST_ID, HeaderValue::from_static("abc-123"));
        assert_eq!(resolve_request_id(&headers).as_str(), "abc-123");
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let mut headers = HeaderMap::new();
        let name = HeaderName::from_bytes(b"X-Request-ID").unwrap();
        headers.insert(name, HeaderValue::from_static("upper"));
        assert_eq!(resolve_request_id(&headers).as_str(), "upper");
    }

    #[test]
    fn test_missing_header_generates_uuid_v4() {
        let id = resolve_request_id(&HeaderMap::new());
        let parsed = Uuid::parse_str(id.as_str()).unwrap();
        assert_eq!(parsed.get_version_num(), 4);
    }

    #[test]
    fn test_generated_ids_differ() {
        let headers = HeaderMap::new();
        assert_ne!(resolve_request_id(&headers), resolve_request_id(&headers));
    }

    #[test]
    fn test_non_text_header_generates_new_id() {
        let mut headers = HeaderMap::new();
        headers.insert(X_REQUEST_ID, HeaderValue::from_bytes(&[0xff, 0xfe]).unwrap());
        let id = resolve_request_id(&headers);
        assert!(Uuid::parse_str(id.as_str()).is_ok());
    }
}
