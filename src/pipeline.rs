//! Pipeline Contracts Module
//!
//! The request type passed between middleware stages and the two traits the
//! surrounding proxy provides: the next handler in the chain and the
//! subrequest primitive that drives the full chain beneath this middleware.

use crate::sink::ResponseSink;
use crate::Result;
use async_trait::async_trait;
use bytes::Bytes;
use hyper::header::HeaderName;
use hyper::{HeaderMap, Method};

/// A request travelling through the proxy pipeline.
///
/// The middleware owns no transport; it only reads and rewrites this
/// representation and hands bodies to sinks.
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    pub method: Method,
    /// Decoded request path, e.g. `/v1/account/container/object`.
    pub path: String,
    /// Raw query string without the leading `?`.
    pub query: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ProxyRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: String::new(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = query.into();
        self
    }

    pub fn with_header(mut self, name: HeaderName, value: &str) -> Result<Self> {
        self.headers.insert(name, value.parse()?);
        Ok(self)
    }

    pub fn with_body(mut self, body: Bytes) -> Self {
        self.body = body;
        self
    }

    /// First value of a query parameter, or `None` when absent.
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query.split('&').find_map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (key == name).then_some(value)
        })
    }

    /// Header value as a string, empty when absent or non-UTF-8.
    pub fn header(&self, name: &HeaderName) -> &str {
        header_str(&self.headers, name)
    }
}

/// Header value lookup that mirrors `Header().Get`: missing or unreadable
/// values read as the empty string.
pub fn header_str<'a>(headers: &'a HeaderMap, name: &HeaderName) -> &'a str {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
}

/// The next handler in the middleware chain.
#[async_trait]
pub trait PipelineHandler: Send + Sync {
    async fn serve(&self, sink: &mut dyn ResponseSink, req: &mut ProxyRequest) -> Result<()>;
}

/// The subrequest primitive supplied by the surrounding proxy.
///
/// Drives the full middleware chain beneath this one and writes status,
/// headers, and body into `sink`. It returns only after the sink has
/// received the final byte. `tag` identifies the caller for observability;
/// `authorize_again` false reuses the outer request's authorization
/// decision.
#[async_trait]
pub trait SubrequestClient: Send + Sync {
    async fn subrequest(
        &self,
        sink: &mut dyn ResponseSink,
        req: ProxyRequest,
        tag: &str,
        authorize_again: bool,
    ) -> Result<()>;
}
