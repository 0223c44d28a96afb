//! Prefer header handling.
//!
//! The gateway honors two Prefer directives: `handling=strict` turns
//! unknown search parameters into a 400 instead of being ignored, and
//! `return=minimal` suppresses write response bodies.
//! See: https://hl7.org/fhir/http.html#ops

use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, StatusCode, request::Parts},
};

/// Extracted Prefer header values from a request.
#[derive(Debug, Default)]
pub struct PreferHeader {
    /// Return preference (minimal, representation).
    return_preference: Option<String>,

    /// Handling preference (strict, lenient).
    handling: Option<String>,
}

impl PreferHeader {
    /// Creates a new PreferHeader from a HeaderMap.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let prefer = headers
            .get("prefer")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");

        let mut result = Self::default();

        for directive in prefer.split(',') {
            let directive = directive.trim();

            if let Some(value) = directive.strip_prefix("return=") {
                result.return_preference = Some(value.to_string());
            } else if let Some(value) = directive.strip_prefix("handling=") {
                result.handling = Some(value.to_string());
            }
        }

        result
    }

    /// Returns the handling preference.
    pub fn handling(&self) -> Option<&str> {
        self.handling.as_deref()
    }

    /// Checks if strict handling is requested.
    ///
    /// Under strict handling a search parameter the federation cannot
    /// interpret rejects the whole request; the lenient default ignores it.
    pub fn is_strict(&self) -> bool {
        self.handling.as_deref() == Some("strict")
    }

    /// Checks if minimal return is requested.
    pub fn is_minimal(&self) -> bool {
        self.return_preference.as_deref() == Some("minimal")
    }
}

/// Axum extractor for Prefer header.
impl<S> FromRequestParts<S> for PreferHeader
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(PreferHeader::from_headers(&parts.headers))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_handling_strict() {
        let mut headers = HeaderMap::new();
        headers.insert("prefer", HeaderValue::from_static("handling=strict"));

        let prefer = PreferHeader::from_headers(&headers);
        assert_eq!(prefer.handling(), Some("strict"));
        assert!(prefer.is_strict());
    }

    #[test]
    fn test_handling_lenient() {
        let mut headers = HeaderMap::new();
        headers.insert("prefer", HeaderValue::from_static("handling=lenient"));

        let prefer = PreferHeader::from_headers(&headers);
        assert!(!prefer.is_strict());
    }

    #[test]
    fn test_return_minimal() {
        let mut headers = HeaderMap::new();
        headers.insert("prefer", HeaderValue::from_static("return=minimal"));

        let prefer = PreferHeader::from_headers(&headers);
        assert!(prefer.is_minimal());
    }

    #[test]
    fn test_multiple_directives() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "prefer",
            HeaderValue::from_static("return=minimal, handling=strict"),
        );

        let prefer = PreferHeader::from_headers(&headers);
        assert!(prefer.is_minimal());
        assert!(prefer.is_strict());
    }

    #[test]
    fn test_empty() {
        let headers = HeaderMap::new();
        let prefer = PreferHeader::from_headers(&headers);

        assert!(prefer.handling().is_none());
        assert!(!prefer.is_strict());
        assert!(!prefer.is_minimal());
    }
}
