//! Dispatcher Module
//!
//! The large object middleware itself: method and query parameter routing,
//! identify-sink wrapping on reads, and capability registration.

use crate::config::LargeObjectConfig;
use crate::headers::{X_BACKEND_ETAG_IS_AT, X_OBJECT_MANIFEST};
use crate::info::register_swift_info;
use crate::path::is_valid_dlo_header;
use crate::pipeline::{PipelineHandler, ProxyRequest, SubrequestClient};
use crate::sink::{simple_error_response, IdentifySink, ResponseSink};
use crate::{delete, read, write, Result};
use async_trait::async_trait;
use hyper::header::HeaderValue;
use hyper::{Method, StatusCode};
use serde_json::json;
use std::sync::Arc;

/// Request filter that composes stored segments into logical large objects
/// on reads and decomposes client manifests on writes.
///
/// Sits between auth and the backend dispatcher; everything beneath it is
/// reached through the subrequest primitive.
pub struct LargeObjectMiddleware {
    config: LargeObjectConfig,
    next: Arc<dyn PipelineHandler>,
    client: Arc<dyn SubrequestClient>,
}

impl LargeObjectMiddleware {
    pub fn new(
        config: LargeObjectConfig,
        next: Arc<dyn PipelineHandler>,
        client: Arc<dyn SubrequestClient>,
    ) -> Self {
        register_swift_info(
            "slo",
            json!({
                "max_manifest_segments": config.max_manifest_segments,
                "max_manifest_size": config.max_manifest_size,
                "min_segment_size": config.min_segment_size,
            }),
        );
        register_swift_info("dlo", json!({ "max_segments": config.dlo_max_segments }));
        Self {
            config,
            next,
            client,
        }
    }
}

/// Append an etag location to `X-Backend-Etag-Is-At` so the backend
/// resolves conditional requests against the combined etag sysmeta.
fn update_etag_is_at(req: &mut ProxyRequest, etag_location: &str) -> Result<()> {
    let current = req.header(&X_BACKEND_ETAG_IS_AT);
    let value = if current.is_empty() {
        etag_location.to_string()
    } else {
        format!("{},{}", current, etag_location)
    };
    req.headers
        .insert(X_BACKEND_ETAG_IS_AT, HeaderValue::from_str(&value)?);
    Ok(())
}

#[async_trait]
impl PipelineHandler for LargeObjectMiddleware {
    async fn serve(&self, sink: &mut dyn ResponseSink, req: &mut ProxyRequest) -> Result<()> {
        let func = req
            .query_param("multipart-manifest")
            .unwrap_or_default()
            .to_string();

        if req.method == Method::PUT && !req.header(&X_OBJECT_MANIFEST).is_empty() {
            if !is_valid_dlo_header(req.header(&X_OBJECT_MANIFEST)) {
                return simple_error_response(
                    sink,
                    StatusCode::BAD_REQUEST,
                    "X-Object-Manifest must be in the format container/prefix",
                )
                .await;
            }
            if func == "put" {
                return simple_error_response(
                    sink,
                    StatusCode::BAD_REQUEST,
                    "Cannot be both SLO and DLO",
                )
                .await;
            }
        }
        if req.method == Method::PUT && func == "put" {
            return write::handle_slo_put(
                self.client.as_ref(),
                self.config.max_manifest_segments,
                sink,
                req,
            )
            .await;
        }
        if req.method == Method::DELETE && func == "delete" {
            return delete::handle_slo_delete(
                self.client.as_ref(),
                self.next.as_ref(),
                &self.config,
                sink,
                req,
            )
            .await;
        }
        if req.method == Method::GET || req.method == Method::HEAD {
            if func != "get" {
                update_etag_is_at(req, "X-Object-Sysmeta-Slo-Etag")?;
            }
            let mut identify = IdentifySink::new(sink, func == "get");
            self.next.serve(&mut identify, req).await?;
            if identify.is_slo() {
                return read::handle_slo_get(self.client.as_ref(), &self.config, &mut identify, req)
                    .await;
            }
            if identify.is_dlo() {
                return read::handle_dlo_get(self.client.as_ref(), &mut identify, req).await;
            }
            return Ok(());
        }
        self.next.serve(sink, req).await
    }
}
