//! Request and response types handed to route handlers

use axum::body::Bytes;
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// HTTP methods a route can answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Delete,
    Put,
    Patch,
}

impl HttpMethod {
    /// Methods a route answers when none are given
    pub const ALL: [HttpMethod; 5] = [
        HttpMethod::Get,
        HttpMethod::Post,
        HttpMethod::Delete,
        HttpMethod::Put,
        HttpMethod::Patch,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
        }
    }

    /// Format a method list the way handler sections store it: `GET,POST`
    pub fn join(methods: &[HttpMethod]) -> String {
        methods.iter().map(|m| m.as_str()).collect::<Vec<_>>().join(",")
    }

    /// Parse a handler section method list
    pub fn parse_list(list: &str) -> crate::Result<Vec<HttpMethod>> {
        list.split(',')
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(HttpMethod::from_str)
            .collect()
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "DELETE" => Ok(HttpMethod::Delete),
            "PUT" => Ok(HttpMethod::Put),
            "PATCH" => Ok(HttpMethod::Patch),
            other => Err(Error::Config(format!("unsupported HTTP method '{}'", other))),
        }
    }
}

impl TryFrom<&Method> for HttpMethod {
    type Error = Error;

    fn try_from(method: &Method) -> crate::Result<Self> {
        HttpMethod::from_str(method.as_str())
    }
}

/// Response content types a service can default to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentType {
    TextPlain,
    ApplicationJson,
    TextHtml,
    Custom(String),
}

impl ContentType {
    pub fn as_str(&self) -> &str {
        match self {
            ContentType::TextPlain => "text/plain; charset=utf-8",
            ContentType::ApplicationJson => "application/json; charset=utf-8",
            ContentType::TextHtml => "text/html; charset=utf-8",
            ContentType::Custom(value) => value,
        }
    }

    pub fn header_value(&self) -> crate::Result<HeaderValue> {
        HeaderValue::from_str(self.as_str())
            .map_err(|e| Error::Config(format!("invalid content type '{}': {}", self.as_str(), e)))
    }
}

/// Incoming request as seen by a handler
#[derive(Debug, Clone)]
pub struct HttpRequest {
    method: HttpMethod,
    path: String,
    path_args: HashMap<String, String>,
    args: HashMap<String, String>,
    headers: HeaderMap,
    body: Bytes,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            path_args: HashMap::new(),
            args: HashMap::new(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    pub fn with_path_args(mut self, path_args: HashMap<String, String>) -> Self {
        self.path_args = path_args;
        self
    }

    pub fn with_args(mut self, args: HashMap<String, String>) -> Self {
        self.args = args;
        self
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_body(mut self, body: Bytes) -> Self {
        self.body = body;
        self
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Query argument; empty when the argument is absent
    pub fn get_arg(&self, name: &str) -> &str {
        self.args.get(name).map(String::as_str).unwrap_or("")
    }

    pub fn has_arg(&self, name: &str) -> bool {
        self.args.contains_key(name)
    }

    /// Query argument that must be present
    pub fn require_arg(&self, name: &str) -> crate::Result<&str> {
        self.args
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| Error::InvalidInput(format!("missing query argument '{}'", name)))
    }

    /// Path segment captured by a `{name}` placeholder; empty when absent
    pub fn get_path_arg(&self, name: &str) -> &str {
        self.path_args.get(name).map(String::as_str).unwrap_or("")
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Handler response with optional status and content type
#[derive(Debug, Clone)]
pub struct HttpResponse {
    status: StatusCode,
    content_type: Option<ContentType>,
    body: String,
}

impl HttpResponse {
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            status: StatusCode::OK,
            content_type: None,
            body: body.into(),
        }
    }

    pub fn status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    pub fn content_type(mut self, content_type: ContentType) -> Self {
        self.content_type = Some(content_type);
        self
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    /// Build the wire response; `fallback` applies when no content type was set
    pub fn into_response_with(self, fallback: Option<&ContentType>) -> Response {
        let content_type = self.content_type.as_ref().or(fallback);
        let mut response = (self.status, self.body).into_response();
        if let Some(content_type) = content_type {
            if let Ok(value) = content_type.header_value() {
                response.headers_mut().insert(header::CONTENT_TYPE, value);
            }
        }
        response
    }
}

/// Values a handler may return
pub trait IntoHttpResponse {
    fn into_http_response(self) -> crate::Result<HttpResponse>;
}

impl IntoHttpResponse for HttpResponse {
    fn into_http_response(self) -> crate::Result<HttpResponse> {
        Ok(self)
    }
}

impl IntoHttpResponse for String {
    fn into_http_response(self) -> crate::Result<HttpResponse> {
        Ok(HttpResponse::new(self))
    }
}

impl IntoHttpResponse for &'static str {
    fn into_http_response(self) -> crate::Result<HttpResponse> {
        Ok(HttpResponse::new(self))
    }
}

impl<T: IntoHttpResponse> IntoHttpResponse for crate::Result<T> {
    fn into_http_response(self) -> crate::Result<HttpResponse> {
        self.and_then(IntoHttpResponse::into_http_response)
    }
}
