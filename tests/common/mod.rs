#![allow(dead_code)]

//! In-memory proxy backend used by the scenario tests.
//!
//! Implements both pipeline contracts over a map of stored objects and
//! records every request it handles, so tests can assert the exact
//! sequence of subrequests the middleware issues.

use async_trait::async_trait;
use bytes::Bytes;
use hyper::header::{
    HeaderName, CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, ETAG, IF_NONE_MATCH, LAST_MODIFIED,
    RANGE,
};
use hyper::{HeaderMap, Method, StatusCode};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use xlo_proxy::config::LargeObjectConfig;
use xlo_proxy::headers::{
    X_OBJECT_MANIFEST, X_OBJECT_SYSMETA_SLO_ETAG, X_OBJECT_SYSMETA_SLO_SIZE,
    X_STATIC_LARGE_OBJECT,
};
use xlo_proxy::middleware::LargeObjectMiddleware;
use xlo_proxy::path::parse_proxy_path;
use xlo_proxy::pipeline::{PipelineHandler, ProxyRequest, SubrequestClient};
use xlo_proxy::range::parse_range;
use xlo_proxy::sink::{CaptureSink, ResponseSink};
use xlo_proxy::Result;

pub const HTTP_DATE: &str = "Mon, 02 Jan 2006 15:04:05 GMT";
pub const ISO_DATE: &str = "2006-01-02T15:04:05.00000";

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub body: Bytes,
    pub content_type: String,
    pub etag: String,
    pub extra_headers: Vec<(HeaderName, String)>,
    pub last_modified: String,
}

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub query: String,
    pub headers: HeaderMap,
}

impl RecordedRequest {
    pub fn range(&self) -> &str {
        self.headers
            .get(RANGE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
    }
}

/// Backend dispatcher standing in for everything beneath the middleware.
#[derive(Default)]
pub struct MockBackend {
    objects: Mutex<BTreeMap<String, StoredObject>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl MockBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Store an object directly, bypassing the request path.
    pub fn put_object(
        &self,
        path: &str,
        body: impl Into<Bytes>,
        etag: &str,
        content_type: &str,
        extra_headers: Vec<(HeaderName, String)>,
    ) {
        self.objects.lock().unwrap().insert(
            path.to_string(),
            StoredObject {
                body: body.into(),
                content_type: content_type.to_string(),
                etag: etag.to_string(),
                extra_headers,
                last_modified: HTTP_DATE.to_string(),
            },
        );
    }

    pub fn get_object(&self, path: &str) -> Option<StoredObject> {
        self.objects.lock().unwrap().get(path).cloned()
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requests_to(&self, path: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.path == path)
            .collect()
    }

    async fn handle(&self, sink: &mut dyn ResponseSink, req: &ProxyRequest) -> Result<()> {
        self.requests.lock().unwrap().push(RecordedRequest {
            method: req.method.clone(),
            path: req.path.clone(),
            query: req.query.clone(),
            headers: req.headers.clone(),
        });
        match req.method {
            Method::GET | Method::HEAD => self.handle_read(sink, req).await,
            Method::PUT => self.handle_put(sink, req).await,
            Method::DELETE => self.handle_delete(sink, req).await,
            _ => sink.write_header(StatusCode::METHOD_NOT_ALLOWED).await,
        }
    }

    async fn handle_read(&self, sink: &mut dyn ResponseSink, req: &ProxyRequest) -> Result<()> {
        let parsed = match parse_proxy_path(&req.path) {
            Ok(parsed) => parsed,
            Err(_) => return sink.write_header(StatusCode::NOT_FOUND).await,
        };
        if parsed.object.is_none() {
            return self.handle_listing(sink, req).await;
        }

        let object = self.objects.lock().unwrap().get(&req.path).cloned();
        let Some(object) = object else {
            return sink.write_header(StatusCode::NOT_FOUND).await;
        };
        {
            let headers = sink.headers_mut();
            headers.insert(CONTENT_TYPE, object.content_type.parse().unwrap());
            headers.insert(ETAG, object.etag.parse().unwrap());
            headers.insert(LAST_MODIFIED, object.last_modified.parse().unwrap());
            for (name, value) in &object.extra_headers {
                headers.insert(name.clone(), value.parse().unwrap());
            }
        }

        // conditional resolution honors X-Backend-Etag-Is-At like a real
        // object server
        let if_none_match = req.header(&IF_NONE_MATCH).to_string();
        if !if_none_match.is_empty() && if_none_match.trim_matches('"') == effective_etag(&object, req)
        {
            return sink.write_header(StatusCode::NOT_MODIFIED).await;
        }

        let total = object.body.len() as i64;
        let range_header = req
            .headers
            .get(RANGE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        if !range_header.is_empty() {
            return match parse_range(&range_header, total) {
                Ok(ranges) if ranges.len() == 1 => {
                    let r = ranges[0];
                    let headers = sink.headers_mut();
                    headers.insert(
                        CONTENT_RANGE,
                        format!("bytes {}-{}/{}", r.start, r.end - 1, total)
                            .parse()
                            .unwrap(),
                    );
                    headers.insert(CONTENT_LENGTH, r.len().into());
                    sink.write_header(StatusCode::PARTIAL_CONTENT).await?;
                    if req.method == Method::GET {
                        sink.write(&object.body[r.start as usize..r.end as usize])
                            .await?;
                    }
                    Ok(())
                }
                _ => sink.write_header(StatusCode::RANGE_NOT_SATISFIABLE).await,
            };
        }
        sink.headers_mut().insert(CONTENT_LENGTH, total.into());
        sink.write_header(StatusCode::OK).await?;
        if req.method == Method::GET {
            sink.write(&object.body).await?;
        }
        Ok(())
    }

    async fn handle_listing(&self, sink: &mut dyn ResponseSink, req: &ProxyRequest) -> Result<()> {
        let prefix = req.query_param("prefix").unwrap_or("").to_string();
        let container_prefix = format!("{}/", req.path.trim_end_matches('/'));
        let entries: Vec<serde_json::Value> = self
            .objects
            .lock()
            .unwrap()
            .iter()
            .filter_map(|(path, object)| {
                let name = path.strip_prefix(&container_prefix)?;
                name.starts_with(&prefix).then(|| {
                    serde_json::json!({
                        "name": name,
                        "bytes": object.body.len(),
                        "hash": object.etag,
                        "content_type": object.content_type,
                        "last_modified": ISO_DATE,
                    })
                })
            })
            .collect();
        let body = serde_json::to_vec(&entries)?;
        {
            let headers = sink.headers_mut();
            headers.insert(CONTENT_TYPE, "application/json".parse().unwrap());
            headers.insert(CONTENT_LENGTH, body.len().into());
        }
        sink.write_header(StatusCode::OK).await?;
        if req.method == Method::GET {
            sink.write(&body).await?;
        }
        Ok(())
    }

    async fn handle_put(&self, sink: &mut dyn ResponseSink, req: &ProxyRequest) -> Result<()> {
        let mut extra_headers = Vec::new();
        for name in [
            X_STATIC_LARGE_OBJECT,
            X_OBJECT_SYSMETA_SLO_ETAG,
            X_OBJECT_SYSMETA_SLO_SIZE,
            X_OBJECT_MANIFEST,
        ] {
            let value = req.header(&name);
            if !value.is_empty() {
                extra_headers.push((name.clone(), value.to_string()));
            }
        }
        let content_type = match req.header(&CONTENT_TYPE) {
            "" => "application/octet-stream".to_string(),
            other => other.to_string(),
        };
        self.objects.lock().unwrap().insert(
            req.path.clone(),
            StoredObject {
                body: req.body.clone(),
                content_type,
                etag: format!("{:x}", md5::compute(&req.body)),
                extra_headers,
                last_modified: HTTP_DATE.to_string(),
            },
        );
        sink.write_header(StatusCode::CREATED).await
    }

    async fn handle_delete(&self, sink: &mut dyn ResponseSink, req: &ProxyRequest) -> Result<()> {
        let removed = self.objects.lock().unwrap().remove(&req.path).is_some();
        if removed {
            sink.write_header(StatusCode::NO_CONTENT).await
        } else {
            sink.write_header(StatusCode::NOT_FOUND).await
        }
    }
}

/// The etag conditional requests compare against: the first alternate
/// location named by `X-Backend-Etag-Is-At` that the object carries, else
/// the object's own etag.
fn effective_etag(object: &StoredObject, req: &ProxyRequest) -> String {
    use xlo_proxy::headers::X_BACKEND_ETAG_IS_AT;
    for location in req.header(&X_BACKEND_ETAG_IS_AT).split(',') {
        let location = location.trim().to_ascii_lowercase();
        if location.is_empty() {
            continue;
        }
        if let Some((_, value)) = object
            .extra_headers
            .iter()
            .find(|(name, _)| name.as_str() == location)
        {
            return value.clone();
        }
    }
    object.etag.clone()
}

#[async_trait]
impl PipelineHandler for MockBackend {
    async fn serve(&self, sink: &mut dyn ResponseSink, req: &mut ProxyRequest) -> Result<()> {
        self.handle(sink, req).await
    }
}

#[async_trait]
impl SubrequestClient for MockBackend {
    async fn subrequest(
        &self,
        sink: &mut dyn ResponseSink,
        req: ProxyRequest,
        _tag: &str,
        _authorize_again: bool,
    ) -> Result<()> {
        self.handle(sink, &req).await
    }
}

/// Middleware wired to a fresh mock backend.
pub fn middleware_fixture() -> (Arc<MockBackend>, LargeObjectMiddleware) {
    let backend = MockBackend::new();
    let middleware = LargeObjectMiddleware::new(
        LargeObjectConfig::default(),
        backend.clone(),
        backend.clone(),
    );
    (backend, middleware)
}

/// Drive one client request through the middleware, returning the client
/// side response sink.
pub async fn drive(middleware: &LargeObjectMiddleware, mut req: ProxyRequest) -> CaptureSink {
    let mut client = CaptureSink::new();
    middleware
        .serve(&mut client, &mut req)
        .await
        .expect("middleware serve failed");
    client
}

pub fn header<'a>(sink: &'a CaptureSink, name: &HeaderName) -> &'a str {
    sink.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
}
