//! Replayable request descriptions

use super::error::ClientError;
use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, RequestBuilder};
use serde::Serialize;

/// Description of an outbound API call.
///
/// Unlike a `reqwest::RequestBuilder` this can be rebuilt any number of
/// times, which the session coordinator needs to replay a request after a
/// credential refresh.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    body: Option<serde_json::Value>,
    headers: HeaderMap,
    public: bool,
    retried: bool,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            headers: HeaderMap::new(),
            public: false,
            retried: false,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Append a query parameter
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Set a JSON body
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self, ClientError> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    /// Add an extra header. `Authorization` is owned by the coordinator and
    /// is overwritten on send.
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Mark the request as unauthenticated: no bearer credential is attached
    /// and a 401 is returned to the caller as-is (login, registration).
    pub fn public(mut self) -> Self {
        self.public = true;
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn body(&self) -> Option<&serde_json::Value> {
        self.body.as_ref()
    }

    pub fn is_public(&self) -> bool {
        self.public
    }

    /// Whether this request has already been replayed after a refresh
    pub fn is_retried(&self) -> bool {
        self.retried
    }

    pub(crate) fn mark_retried(&mut self) {
        self.retried = true;
    }

    /// Build a transport request against `base_url`, attaching `token` as a
    /// bearer credential when present
    pub(crate) fn build(
        &self,
        client: &Client,
        base_url: &str,
        token: Option<&str>,
    ) -> RequestBuilder {
        let url = format!("{}{}", base_url, self.path);
        let mut headers = self.headers.clone();
        headers.remove(header::AUTHORIZATION);

        let mut request = client.request(self.method.clone(), url).headers(headers);

        if !self.query.is_empty() {
            request = request.query(&self.query);
        }
        if let Some(body) = &self.body {
            request = request.json(body);
        }
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }

        request
    }
}

/// Percent-encode `value` for use as a single path segment, so that ids
/// containing `/`, `?` or `#` cannot address another resource
pub fn encode_segment(value: &str) -> String {
    match value {
        "." => "%2E".to_string(),
        ".." => "%2E%2E".to_string(),
        _ => url::form_urlencoded::byte_serialize(value.as_bytes())
            .collect::<String>()
            .replace('+', "%20"),
    }
}
