//! Delete Cascade Module
//!
//! `DELETE ?multipart-manifest=delete` fetches the manifest, issues a
//! best-effort manifest-aware delete for every segment in order, then lets
//! the next handler remove the manifest object itself.

use crate::config::LargeObjectConfig;
use crate::manifest::fetch_slo_manifest;
use crate::path::{parse_proxy_path, split_segment_path};
use crate::pipeline::{PipelineHandler, ProxyRequest, SubrequestClient};
use crate::segment::SegmentDescriptor;
use crate::sink::{simple_error_response, CaptureSink, ResponseSink};
use crate::Result;
use hyper::{Method, StatusCode};
use tracing::debug;

/// Handle `DELETE ?multipart-manifest=delete`.
pub async fn handle_slo_delete(
    client: &dyn SubrequestClient,
    next: &dyn PipelineHandler,
    config: &LargeObjectConfig,
    sink: &mut dyn ResponseSink,
    req: &mut ProxyRequest,
) -> Result<()> {
    let path = parse_proxy_path(&req.path).ok();
    let Some(path) = path.filter(|p| p.object.is_some()) else {
        return simple_error_response(
            sink,
            StatusCode::BAD_REQUEST,
            &format!(
                "invalid must multipath DELETE to an object path: {}",
                req.path
            ),
        )
        .await;
    };

    let manifest = match fetch_slo_manifest(client, &req.path, config.max_manifest_size).await {
        Ok(manifest) => manifest,
        Err(err) => {
            return simple_error_response(
                sink,
                StatusCode::BAD_REQUEST,
                &format!("invalid manifest json: {}", err),
            )
            .await;
        }
    };
    delete_all_segments(client, &path.account, &manifest).await;
    // the next handler removes the manifest object itself; its status is
    // the response regardless of how the cascade went
    next.serve(sink, req).await
}

/// Issue one manifest-aware delete per segment, in manifest order.
///
/// The cascade is best effort: per-segment failures, including segment
/// references that cannot be split, are logged and skipped.
async fn delete_all_segments(
    client: &dyn SubrequestClient,
    account: &str,
    manifest: &[SegmentDescriptor],
) {
    for si in manifest {
        let (container, object) = match split_segment_path(&si.name) {
            Ok(parts) => parts,
            Err(err) => {
                debug!(name = %si.name, error = %err, "skipping invalid segment reference");
                continue;
            }
        };
        let seg_req =
            ProxyRequest::new(Method::DELETE, format!("/v1/{}/{}/{}", account, container, object))
                .with_query("multipart-manifest=delete");
        let mut capture = CaptureSink::new();
        if let Err(err) = client.subrequest(&mut capture, seg_req, "slo", false).await {
            debug!(name = %si.name, error = %err, "segment delete subrequest failed");
        }
    }
}
