//! Response Sinks Module
//!
//! The response-writer shims subrequests and the client write path go
//! through. All three sinks share one capability set: header access, a
//! one-shot status write, and body writes. The identify sink classifies
//! large object responses on the way out, the capture sink buffers a whole
//! subrequest for the middleware to read, and the forward sink streams a
//! subrequest body straight to the client.

use crate::headers::{X_OBJECT_MANIFEST, X_STATIC_LARGE_OBJECT};
use crate::pipeline::header_str;
use crate::Result;
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use hyper::header::{HeaderValue, CONTENT_LENGTH, CONTENT_TYPE};
use hyper::{HeaderMap, StatusCode};

/// Capability set shared by every response writer in the pipeline.
#[async_trait]
pub trait ResponseSink: Send {
    fn headers(&self) -> &HeaderMap;
    fn headers_mut(&mut self) -> &mut HeaderMap;
    /// Status written so far, if any.
    fn status(&self) -> Option<StatusCode>;
    async fn write_header(&mut self, status: StatusCode) -> Result<()>;
    async fn write(&mut self, buf: &[u8]) -> Result<usize>;
}

/// Buffers status, headers, and the complete body of one subrequest.
#[derive(Debug, Default)]
pub struct CaptureSink {
    status: Option<StatusCode>,
    headers: HeaderMap,
    body: BytesMut,
}

impl CaptureSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn take_body(&mut self) -> Bytes {
        std::mem::take(&mut self.body).freeze()
    }
}

#[async_trait]
impl ResponseSink for CaptureSink {
    fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    fn status(&self) -> Option<StatusCode> {
        self.status
    }

    async fn write_header(&mut self, status: StatusCode) -> Result<()> {
        self.status = Some(status);
        Ok(())
    }

    async fn write(&mut self, buf: &[u8]) -> Result<usize> {
        self.body.extend_from_slice(buf);
        Ok(buf.len())
    }
}

/// Streams body writes into a downstream writer while swallowing the
/// subrequest's own status and headers.
pub struct ForwardSink<'a> {
    downstream: &'a mut dyn ResponseSink,
    status: Option<StatusCode>,
    headers: HeaderMap,
}

impl<'a> ForwardSink<'a> {
    pub fn new(downstream: &'a mut dyn ResponseSink) -> Self {
        Self {
            downstream,
            status: None,
            headers: HeaderMap::new(),
        }
    }
}

#[async_trait]
impl ResponseSink for ForwardSink<'_> {
    fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    fn status(&self) -> Option<StatusCode> {
        self.status
    }

    async fn write_header(&mut self, status: StatusCode) -> Result<()> {
        self.status = Some(status);
        Ok(())
    }

    async fn write(&mut self, buf: &[u8]) -> Result<usize> {
        self.downstream.write(buf).await
    }
}

/// Wraps the upstream client writer on GET/HEAD and classifies the
/// response when the next handler writes its status.
///
/// Unclassified responses pass straight through. A static large object
/// response has its status suppressed and its manifest body buffered for
/// the read orchestrator; a dynamic one has its status suppressed and its
/// body discarded, since the manifest comes from a container listing.
pub struct IdentifySink<'a> {
    upstream: &'a mut dyn ResponseSink,
    /// True when the client asked for the raw manifest
    /// (`multipart-manifest=get`), which must not trigger DLO handling.
    raw_manifest: bool,
    status: Option<StatusCode>,
    is_slo: bool,
    is_dlo: bool,
    body: BytesMut,
}

impl<'a> IdentifySink<'a> {
    pub fn new(upstream: &'a mut dyn ResponseSink, raw_manifest: bool) -> Self {
        Self {
            upstream,
            raw_manifest,
            status: None,
            is_slo: false,
            is_dlo: false,
            body: BytesMut::new(),
        }
    }

    pub fn is_slo(&self) -> bool {
        self.is_slo
    }

    pub fn is_dlo(&self) -> bool {
        self.is_dlo
    }

    pub fn raw_manifest(&self) -> bool {
        self.raw_manifest
    }

    /// The buffered manifest body.
    pub fn take_body(&mut self) -> Bytes {
        std::mem::take(&mut self.body).freeze()
    }

    /// Direct access to the client writer, bypassing classification.
    pub fn upstream_mut(&mut self) -> &mut dyn ResponseSink {
        &mut *self.upstream
    }
}

#[async_trait]
impl ResponseSink for IdentifySink<'_> {
    fn headers(&self) -> &HeaderMap {
        self.upstream.headers()
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        self.upstream.headers_mut()
    }

    fn status(&self) -> Option<StatusCode> {
        self.status
    }

    async fn write_header(&mut self, status: StatusCode) -> Result<()> {
        self.status = Some(status);
        let headers = self.upstream.headers();
        if !header_str(headers, &X_OBJECT_MANIFEST).is_empty() && !self.raw_manifest {
            self.is_dlo = true;
        }
        if header_str(headers, &X_STATIC_LARGE_OBJECT) == "True" {
            self.is_slo = true;
        }
        if !self.is_slo && !self.is_dlo {
            return self.upstream.write_header(status).await;
        }
        Ok(())
    }

    async fn write(&mut self, buf: &[u8]) -> Result<usize> {
        if self.is_dlo {
            Ok(buf.len())
        } else if self.is_slo {
            self.body.extend_from_slice(buf);
            Ok(buf.len())
        } else {
            self.upstream.write(buf).await
        }
    }
}

/// Write a plain-text error response in one shot.
pub async fn simple_error_response(
    sink: &mut dyn ResponseSink,
    status: StatusCode,
    msg: &str,
) -> Result<()> {
    let headers = sink.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
    headers.insert(CONTENT_LENGTH, HeaderValue::from(msg.len()));
    sink.write_header(status).await?;
    sink.write(msg.as_bytes()).await?;
    Ok(())
}

/// Write a bodyless response for the given status.
pub async fn standard_response(sink: &mut dyn ResponseSink, status: StatusCode) -> Result<()> {
    sink.headers_mut()
        .insert(CONTENT_LENGTH, HeaderValue::from_static("0"));
    sink.write_header(status).await
}
