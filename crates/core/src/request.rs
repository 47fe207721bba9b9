use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { f.write_str(self.as_str()) }
}

/// Caller-side request options; `url` may be relative to the connection base.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestOpts {
    pub method: Method,
    pub url: String,
    pub body: Option<Value>,
    pub headers: Vec<(String, String)>,
    /// When false a 401 is returned as a plain HTTP error without the
    /// unauthenticated signal.
    pub redirect_unauthorized: bool,
}

impl RequestOpts {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self { method, url: url.into(), body: None, headers: Vec::new(), redirect_unauthorized: true }
    }

    pub fn get(url: impl Into<String>) -> Self { Self::new(Method::Get, url) }

    pub fn body(mut self, body: Value) -> Self { self.body = Some(body); self }

    pub fn header(mut self, k: impl Into<String>, v: impl Into<String>) -> Self {
        self.headers.push((k.into(), v.into()));
        self
    }
}

/// Fully resolved request handed to an HTTP client.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    /// Parsed JSON body; `Null` when empty, a string when not JSON.
    pub body: Value,
}

impl HttpResponse {
    pub fn new(status: u16, body: Value) -> Self { Self { status, body } }

    pub fn is_success(&self) -> bool { (200..300).contains(&self.status) }
}
