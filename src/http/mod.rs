//! Outbound HTTP on behalf of state logic
//!
//! States whose next step depends on a remote service reach it through an
//! [`HttpApi`], which builds requests, applies auth and body encoding, and
//! hands them to an [`HttpTransport`] for delivery.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::errors::{ErrorKind, InteractionError};

/// HTTP methods supported by the API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = InteractionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "HEAD" => Ok(Method::Head),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "DELETE" => Ok(Method::Delete),
            other => Err(InteractionError::configuration(format!(
                "unsupported http method '{other}'"
            ))),
        }
    }
}

/// A query parameter appended to a request url
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Param {
    pub name: String,
    pub value: String,
}

impl Param {
    pub fn new(name: impl Into<String>, value: impl ToString) -> Self {
        Self {
            name: name.into(),
            value: value.to_string(),
        }
    }
}

pub type Headers = BTreeMap<String, Vec<String>>;

/// An outbound HTTP request
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Headers,
    pub params: Vec<Param>,
    pub body: Option<String>,
}

impl HttpRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Headers::new(),
            params: Vec::new(),
            body: None,
        }
    }

    /// The url with query params appended
    pub fn to_url(&self) -> Result<String, String> {
        if self.params.is_empty() {
            return reqwest::Url::parse(&self.url)
                .map(|_| self.url.clone())
                .map_err(|e| e.to_string());
        }
        let pairs = self
            .params
            .iter()
            .map(|p| (p.name.as_str(), p.value.as_str()));
        reqwest::Url::parse_with_params(&self.url, pairs)
            .map(String::from)
            .map_err(|e| e.to_string())
    }
}

impl fmt::Display for HttpRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HttpRequest {} {}", self.method, self.url)?;
        if let Some(body) = &self.body {
            write!(f, " body={body}")?;
        }
        if !self.params.is_empty() {
            let params = serde_json::to_string(&self.params).map_err(|_| fmt::Error)?;
            write!(f, " params={params}")?;
        }
        Ok(())
    }
}

/// A response to an [`HttpRequest`]
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub request: HttpRequest,
    pub code: u16,
    pub body: Option<String>,
    /// The decoded body
    pub data: Option<serde_json::Value>,
}

impl HttpResponse {
    pub fn new(request: HttpRequest, code: u16, body: Option<String>) -> Self {
        Self {
            request,
            code,
            body,
            data: None,
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.code)
    }
}

impl fmt::Display for HttpResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HttpResponse {}", self.code)?;
        if let Some(body) = &self.body {
            write!(f, " body={body}")?;
        }
        Ok(())
    }
}

fn with_reason(reason: &Option<String>) -> String {
    reason
        .as_deref()
        .map(|r| format!(" ({r})"))
        .unwrap_or_default()
}

/// Failures of outbound HTTP calls
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    /// The request never produced a response
    #[error("HTTP request failed: {request}{}", with_reason(.reason))]
    Request {
        request: Box<HttpRequest>,
        reason: Option<String>,
    },

    /// A response arrived but was an error or could not be decoded
    #[error("HTTP response error: {response}{}", with_reason(.reason))]
    Response {
        response: Box<HttpResponse>,
        reason: Option<String>,
    },
}

impl HttpError {
    pub fn reason(&self) -> Option<&str> {
        match self {
            HttpError::Request { reason, .. } | HttpError::Response { reason, .. } => {
                reason.as_deref()
            }
        }
    }

    pub fn request(&self) -> &HttpRequest {
        match self {
            HttpError::Request { request, .. } => request,
            HttpError::Response { response, .. } => &response.request,
        }
    }

    pub fn response(&self) -> Option<&HttpResponse> {
        match self {
            HttpError::Request { .. } => None,
            HttpError::Response { response, .. } => Some(response),
        }
    }
}

impl From<HttpError> for InteractionError {
    fn from(err: HttpError) -> Self {
        InteractionError::with_message(ErrorKind::Http, err.to_string()).with_cause(err)
    }
}

/// What a transport reports back for a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportReply {
    /// The transport could not complete the request
    Failed { reason: Option<String> },
    /// The remote service answered
    Response { code: u16, body: Option<String> },
}

/// Delivers HTTP requests
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: &HttpRequest) -> TransportReply;
}

/// Transport backed by a `reqwest` client
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: &HttpRequest) -> TransportReply {
        let url = match request.to_url() {
            Ok(url) => url,
            Err(reason) => return TransportReply::Failed { reason: Some(reason) },
        };

        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Head => reqwest::Method::HEAD,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        };

        let mut builder = self.client.request(method, &url);
        for (name, values) in &request.headers {
            for value in values {
                builder = builder.header(name.as_str(), value.as_str());
            }
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(%url, error = %e, "HTTP transport failure");
                return TransportReply::Failed {
                    reason: Some(e.to_string()),
                };
            }
        };

        let code = response.status().as_u16();
        match response.text().await {
            Ok(body) if body.is_empty() => TransportReply::Response { code, body: None },
            Ok(body) => TransportReply::Response {
                code,
                body: Some(body),
            },
            Err(e) => TransportReply::Failed {
                reason: Some(e.to_string()),
            },
        }
    }
}

/// How request data and response bodies are encoded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Codec {
    /// Bodies are passed through as text
    #[default]
    Text,
    /// Bodies are JSON documents
    Json,
}

impl Codec {
    fn encode(self, data: &serde_json::Value) -> Result<String, serde_json::Error> {
        match (self, data) {
            (Codec::Text, serde_json::Value::String(text)) => Ok(text.clone()),
            _ => serde_json::to_string(data),
        }
    }

    fn decode(self, body: &str) -> Result<serde_json::Value, serde_json::Error> {
        match self {
            Codec::Text => Ok(serde_json::Value::String(body.to_string())),
            Codec::Json => serde_json::from_str(body),
        }
    }
}

/// Per-request options
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestOptions {
    pub headers: Headers,
    pub params: Vec<Param>,
    pub data: Option<serde_json::Value>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.entry(name.into()).or_default().push(value.into());
        self
    }

    pub fn param(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.params.push(Param::new(name, value));
        self
    }

    pub fn data(mut self, data: impl Into<serde_json::Value>) -> Self {
        self.data = Some(data.into());
        self
    }
}

/// Client for outbound HTTP calls
#[derive(Clone)]
pub struct HttpApi {
    transport: Arc<dyn HttpTransport>,
    codec: Codec,
    headers: Headers,
    auth: Option<(String, String)>,
}

impl HttpApi {
    /// Text API: request data and response bodies are passed through
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            transport,
            codec: Codec::Text,
            headers: Headers::new(),
            auth: None,
        }
    }

    /// JSON API: request data is encoded and response bodies decoded as JSON
    pub fn json(transport: Arc<dyn HttpTransport>) -> Self {
        let mut api = Self::new(transport);
        api.codec = Codec::Json;
        api.headers.insert(
            "Content-Type".to_string(),
            vec!["application/json; charset=utf-8".to_string()],
        );
        api
    }

    pub fn with_basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.auth = Some((username.into(), password.into()));
        self
    }

    pub fn codec(&self) -> Codec {
        self.codec
    }

    pub async fn get(&self, url: &str, options: RequestOptions) -> Result<HttpResponse, HttpError> {
        self.request(Method::Get, url, options).await
    }

    pub async fn head(&self, url: &str, options: RequestOptions) -> Result<HttpResponse, HttpError> {
        self.request(Method::Head, url, options).await
    }

    pub async fn post(&self, url: &str, options: RequestOptions) -> Result<HttpResponse, HttpError> {
        self.request(Method::Post, url, options).await
    }

    pub async fn put(&self, url: &str, options: RequestOptions) -> Result<HttpResponse, HttpError> {
        self.request(Method::Put, url, options).await
    }

    pub async fn delete(&self, url: &str, options: RequestOptions) -> Result<HttpResponse, HttpError> {
        self.request(Method::Delete, url, options).await
    }

    fn build(&self, method: Method, url: &str, options: RequestOptions) -> Result<HttpRequest, HttpError> {
        let mut request = HttpRequest::new(method, url);
        request.headers = self.headers.clone();
        for (name, values) in options.headers {
            request.headers.insert(name, values);
        }
        if let Some((username, password)) = &self.auth {
            let token = BASE64.encode(format!("{username}:{password}"));
            request
                .headers
                .insert("Authorization".to_string(), vec![format!("Basic {token}")]);
        }
        request.params = options.params;

        if let Some(data) = &options.data {
            match self.codec.encode(data) {
                Ok(body) => request.body = Some(body),
                Err(e) => {
                    return Err(HttpError::Request {
                        request: Box::new(request),
                        reason: Some(format!("Could not encode request ({e})")),
                    });
                }
            }
        }
        Ok(request)
    }

    /// Perform a request
    ///
    /// Responses outside the 200 range and bodies the codec cannot decode are
    /// errors.
    pub async fn request(
        &self,
        method: Method,
        url: &str,
        options: RequestOptions,
    ) -> Result<HttpResponse, HttpError> {
        let request = self.build(method, url, options)?;
        debug!(%request, "Sending HTTP request");

        let (code, body) = match self.transport.send(&request).await {
            TransportReply::Failed { reason } => {
                return Err(HttpError::Request {
                    request: Box::new(request),
                    reason,
                });
            }
            TransportReply::Response { code, body } => (code, body),
        };

        let mut response = HttpResponse::new(request, code, body);
        if !response.is_success() {
            return Err(HttpError::Response {
                response: Box::new(response),
                reason: None,
            });
        }

        if let Some(body) = &response.body {
            match self.codec.decode(body) {
                Ok(data) => response.data = Some(data),
                Err(e) => {
                    return Err(HttpError::Response {
                        response: Box::new(response),
                        reason: Some(format!("Could not parse response ({e})")),
                    });
                }
            }
        }

        Ok(response)
    }
}

impl fmt::Debug for HttpApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpApi")
            .field("codec", &self.codec)
            .field("headers", &self.headers)
            .field("auth", &self.auth.as_ref().map(|(user, _)| user))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::sync::Mutex;

    /// Replies with a canned answer and keeps the requests it saw
    struct CannedTransport {
        reply: TransportReply,
        seen: Mutex<Vec<HttpRequest>>,
    }

    impl CannedTransport {
        fn new(reply: TransportReply) -> Arc<Self> {
            Arc::new(Self {
                reply,
                seen: Mutex::new(Vec::new()),
            })
        }

        fn ok(code: u16, body: &str) -> Arc<Self> {
            Self::new(TransportReply::Response {
                code,
                body: Some(body.to_string()),
            })
        }
    }

    #[async_trait]
    impl HttpTransport for CannedTransport {
        async fn send(&self, request: &HttpRequest) -> TransportReply {
            self.seen.lock().await.push(request.clone());
            self.reply.clone()
        }
    }

    #[test]
    fn test_request_url_includes_params() {
        let mut request = HttpRequest::new(Method::Get, "http://foo.com/");
        request.params = vec![Param::new("a", 1), Param::new("b", 2)];
        assert_eq!(request.to_url().unwrap(), "http://foo.com/?a=1&b=2");

        let plain = HttpRequest::new(Method::Get, "http://foo.com/");
        assert_eq!(plain.to_url().unwrap(), "http://foo.com/");
    }

    #[test]
    fn test_request_url_without_params_is_unchanged() {
        let request = HttpRequest::new(Method::Get, "http://foo.com/users/1");
        assert_eq!(request.to_url().unwrap(), "http://foo.com/users/1");

        let bad = HttpRequest::new(Method::Get, "not a url");
        assert!(bad.to_url().is_err());
    }

    #[test]
    fn test_request_display() {
        let mut request = HttpRequest::new(Method::Get, "http://foo.com/");
        request.body = Some(r#"{"foo":"bar"}"#.to_string());
        request.params = vec![Param::new("bar", "baz")];

        let text = request.to_string();
        assert!(text.contains("GET"));
        assert!(text.contains("http://foo.com/"));
        assert!(text.contains(r#"{"foo":"bar"}"#));
        assert!(text.contains(r#"[{"name":"bar","value":"baz"}]"#));
    }

    #[test]
    fn test_response_display() {
        let request = HttpRequest::new(Method::Get, "http://foo.com/");
        let response = HttpResponse::new(request, 404, Some("nope".to_string()));
        let text = response.to_string();
        assert!(text.contains("404"));
        assert!(text.contains("nope"));
    }

    #[test]
    fn test_method_parsing() {
        assert_eq!("get".parse::<Method>().unwrap(), Method::Get);
        assert_eq!("DELETE".parse::<Method>().unwrap(), Method::Delete);
        assert!("PATCH".parse::<Method>().is_err());
    }

    #[tokio::test]
    async fn test_get_passes_text_through() {
        let transport = CannedTransport::ok(200, r#"{"foo": "bar"}"#);
        let api = HttpApi::new(transport.clone());

        let response = api.get("http://foo.com/", RequestOptions::new()).await.unwrap();
        assert_eq!(response.code, 200);
        assert_eq!(response.data, Some(json!(r#"{"foo": "bar"}"#)));
    }

    #[tokio::test]
    async fn test_head_without_body_has_no_data() {
        let transport = CannedTransport::new(TransportReply::Response {
            code: 200,
            body: None,
        });
        let api = HttpApi::new(transport);

        let response = api.head("http://foo.com/", RequestOptions::new()).await.unwrap();
        assert_eq!(response.data, None);
    }

    #[tokio::test]
    async fn test_accepts_any_code_in_200_range() {
        let api = HttpApi::new(CannedTransport::ok(201, "201 Created"));
        let response = api
            .request(Method::Get, "http://foo.com/", RequestOptions::new())
            .await
            .unwrap();
        assert_eq!(response.code, 201);
    }

    #[tokio::test]
    async fn test_basic_auth_header() {
        let transport = CannedTransport::ok(200, "");
        let api = HttpApi::new(transport.clone()).with_basic_auth("me", "pw");

        api.get("http://foo.com/", RequestOptions::new()).await.unwrap();

        let seen = transport.seen.lock().await;
        assert_eq!(
            seen[0].headers.get("Authorization"),
            Some(&vec!["Basic bWU6cHc=".to_string()])
        );
    }

    #[tokio::test]
    async fn test_error_codes_are_response_errors() {
        let api = HttpApi::new(CannedTransport::ok(404, "404 Not Found"));
        let err = api.get("http://foo.com/", RequestOptions::new()).await.unwrap_err();

        let response = err.response().expect("response error");
        assert_eq!(response.code, 404);
        assert_eq!(response.body.as_deref(), Some("404 Not Found"));
    }

    #[tokio::test]
    async fn test_undecodable_body_is_response_error() {
        let api = HttpApi::json(CannedTransport::ok(200, "not json"));
        let err = api.get("http://foo.com/", RequestOptions::new()).await.unwrap_err();

        assert!(matches!(err, HttpError::Response { .. }));
        assert!(err.reason().unwrap().starts_with("Could not parse response ("));
        assert_eq!(err.response().unwrap().code, 200);
    }

    #[tokio::test]
    async fn test_transport_failure_is_request_error() {
        let transport = CannedTransport::new(TransportReply::Failed {
            reason: Some("No apparent reason".to_string()),
        });
        let api = HttpApi::new(transport);
        let err = api.get("http://foo.com/", RequestOptions::new()).await.unwrap_err();

        assert!(matches!(err, HttpError::Request { .. }));
        assert_eq!(err.reason(), Some("No apparent reason"));
        assert_eq!(err.request().url, "http://foo.com/");
        assert_eq!(err.request().method, Method::Get);

        let err = InteractionError::from(err);
        assert_eq!(err.kind(), ErrorKind::Http);
        assert!(err.message().contains("No apparent reason"));
    }

    #[tokio::test]
    async fn test_json_api_encodes_and_decodes() {
        let transport = CannedTransport::ok(200, r#"{"foo": "bar"}"#);
        let api = HttpApi::json(transport.clone());

        let response = api
            .post("http://foo.com/", RequestOptions::new().data(json!({"lerp": "larp"})))
            .await
            .unwrap();

        assert_eq!(response.data, Some(json!({"foo": "bar"})));
        assert_eq!(response.request.body.as_deref(), Some(r#"{"lerp":"larp"}"#));
        assert_eq!(
            response.request.headers.get("Content-Type"),
            Some(&vec!["application/json; charset=utf-8".to_string()])
        );
    }
}
