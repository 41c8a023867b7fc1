//! Request metadata shared by the body stream and the inspection path.
//!
//! # Responsibilities
//! - Carry method, path and headers of an incoming request
//! - Stay independent of how the body is delivered
//!
//! # Design Decisions
//! - Uses the `http` crate types so the proxy layer can forward without
//!   re-parsing
//! - Path is kept as received (no normalisation)

use http::{HeaderMap, Method};

/// Method, path and headers of one HTTP request.
#[derive(Debug, Clone)]
pub struct HttpRequestData {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
}

impl HttpRequestData {
    pub fn new(method: Method, path: impl Into<String>, headers: HeaderMap) -> Self {
        Self {
            method,
            path: path.into(),
            headers,
        }
    }
}

impl Default for HttpRequestData {
    fn default() -> Self {
        Self::new(Method::GET, "/", HeaderMap::new())
    }
}
