//! Read Orchestrator Module
//!
//! GET/HEAD handling for large objects once the identify sink has
//! classified the backend response: raw manifest replies, HEAD and
//! conditional short-circuits, manifest refetch, and the byte feeder that
//! walks the manifest streaming ranged segment subrequests to the client.

use crate::config::LargeObjectConfig;
use crate::headers::{X_OBJECT_MANIFEST, X_OBJECT_SYSMETA_SLO_ETAG, X_OBJECT_SYSMETA_SLO_SIZE};
use crate::manifest::{build_dlo_manifest, convert_manifest, fetch_slo_manifest};
use crate::path::{parse_proxy_path, split_segment_path};
use crate::pipeline::{header_str, ProxyRequest, SubrequestClient};
use crate::range::{parse_content_range, parse_range, HttpRange};
use crate::segment::{combined_etag, strip_swift_bytes, total_length, SegmentDescriptor};
use crate::sink::{simple_error_response, ForwardSink, IdentifySink, ResponseSink};
use crate::Result;
use hyper::header::{
    HeaderValue, CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, ETAG, IF_MATCH, IF_NONE_MATCH,
    RANGE,
};
use hyper::{Method, StatusCode};
use tracing::{debug, error};

/// Decide whether the buffered backend body is an adequate manifest.
///
/// Cross-segment range math needs the complete manifest, which is only
/// in hand when the backend happened to return the whole manifest body.
pub(crate) fn needs_refetch(sink: &IdentifySink<'_>, req: &ProxyRequest) -> bool {
    if req.method == Method::HEAD {
        return true;
    }
    let has_range = !req.header(&RANGE).is_empty();
    if has_range && sink.status() == Some(StatusCode::RANGE_NOT_SATISFIABLE) {
        return true;
    }
    if has_range
        && matches!(
            sink.status(),
            Some(StatusCode::OK) | Some(StatusCode::PARTIAL_CONTENT)
        )
    {
        return match parse_content_range(header_str(sink.headers(), &CONTENT_RANGE)) {
            Some((start, end, total)) => !(start == 0 && end == total - 1),
            None => true,
        };
    }
    false
}

/// Handle a response classified as a static large object.
pub async fn handle_slo_get(
    client: &dyn SubrequestClient,
    config: &LargeObjectConfig,
    sink: &mut IdentifySink<'_>,
    req: &ProxyRequest,
) -> Result<()> {
    let (content_type, _) = strip_swift_bytes(header_str(sink.headers(), &CONTENT_TYPE));
    sink.headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_str(&content_type)?);

    if sink.raw_manifest() {
        return serve_raw_manifest(sink, req).await;
    }

    let slo_etag = header_str(sink.headers(), &X_OBJECT_SYSMETA_SLO_ETAG).to_string();
    let saved_size = header_str(sink.headers(), &X_OBJECT_SYSMETA_SLO_SIZE).to_string();
    let status = sink.status().unwrap_or(StatusCode::OK);
    let is_conditional = (!req.header(&IF_MATCH).is_empty()
        || !req.header(&IF_NONE_MATCH).is_empty())
        && (status == StatusCode::NOT_MODIFIED || status == StatusCode::PRECONDITION_FAILED);

    // Sysmeta is authoritative for HEAD and for precondition short
    // circuits; no segment subrequests are issued for either.
    if (req.method == Method::HEAD || is_conditional)
        && (!slo_etag.is_empty() || !saved_size.is_empty())
    {
        let headers = sink.headers_mut();
        headers.insert(CONTENT_LENGTH, HeaderValue::from_str(&saved_size)?);
        headers.insert(ETAG, HeaderValue::from_str(&format!("\"{}\"", slo_etag))?);
        return sink.upstream_mut().write_header(status).await;
    }

    let manifest: Vec<SegmentDescriptor> = if needs_refetch(sink, req) {
        match fetch_slo_manifest(client, &req.path, config.max_manifest_size).await {
            Ok(manifest) => manifest,
            Err(err) => {
                debug!(path = %req.path, error = %err, "manifest refetch failed");
                return simple_error_response(
                    sink.upstream_mut(),
                    StatusCode::BAD_REQUEST,
                    "invalid slo manifest",
                )
                .await;
            }
        }
    } else {
        let body = sink.take_body();
        if body.len() > config.max_manifest_size {
            return simple_error_response(
                sink.upstream_mut(),
                StatusCode::BAD_REQUEST,
                "invalid slo manifest",
            )
            .await;
        }
        match serde_json::from_slice(&body) {
            Ok(manifest) => manifest,
            Err(err) => {
                debug!(path = %req.path, error = %err, "undecodable manifest body");
                return simple_error_response(
                    sink.upstream_mut(),
                    StatusCode::BAD_REQUEST,
                    "invalid slo manifest",
                )
                .await;
            }
        }
    };
    byte_feeder(client, sink, req, &slo_etag, &saved_size, manifest).await
}

/// Re-emit the buffered manifest for a `multipart-manifest=get` request,
/// optionally projected into the client PUT form.
async fn serve_raw_manifest(sink: &mut IdentifySink<'_>, req: &ProxyRequest) -> Result<()> {
    let mut manifest_bytes = sink.take_body();
    if req.query_param("format") == Some("raw") {
        match convert_manifest(&manifest_bytes) {
            Ok(converted) => manifest_bytes = converted.into(),
            Err(err) => {
                debug!(path = %req.path, error = %err, "raw manifest conversion failed");
                return simple_error_response(
                    sink.upstream_mut(),
                    StatusCode::BAD_REQUEST,
                    "invalid slo manifest",
                )
                .await;
            }
        }
    } else {
        sink.headers_mut().insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/json; charset=utf-8"),
        );
    }
    let etag = header_str(sink.headers(), &ETAG)
        .trim_matches('"')
        .to_string();
    let headers = sink.headers_mut();
    headers.insert(CONTENT_LENGTH, HeaderValue::from(manifest_bytes.len()));
    headers.insert(ETAG, HeaderValue::from_str(&etag)?);
    let upstream = sink.upstream_mut();
    upstream.write_header(StatusCode::OK).await?;
    upstream.write(&manifest_bytes).await?;
    Ok(())
}

/// Handle a response classified as a dynamic large object.
pub async fn handle_dlo_get(
    client: &dyn SubrequestClient,
    sink: &mut IdentifySink<'_>,
    req: &ProxyRequest,
) -> Result<()> {
    let object_path = parse_proxy_path(&req.path)
        .ok()
        .filter(|p| p.object.is_some());
    if object_path.is_none() {
        return simple_error_response(
            sink.upstream_mut(),
            StatusCode::BAD_REQUEST,
            &format!("invalid must multipath PUT to an object path: {}", req.path),
        )
        .await;
    }
    let account = object_path.map(|p| p.account).unwrap_or_default();

    let (container, prefix) =
        match split_segment_path(header_str(sink.headers(), &X_OBJECT_MANIFEST)) {
            Ok(parts) => parts,
            Err(_) => {
                return simple_error_response(
                    sink.upstream_mut(),
                    StatusCode::BAD_REQUEST,
                    "invalid dlo manifest path",
                )
                .await;
            }
        };
    let manifest = match build_dlo_manifest(client, &account, &container, &prefix).await {
        Ok(manifest) => manifest,
        Err(err) => {
            debug!(container = %container, prefix = %prefix, error = %err, "dlo listing failed");
            return simple_error_response(
                sink.upstream_mut(),
                StatusCode::BAD_REQUEST,
                &format!("can not build dlo manifest at: {}?{}", container, prefix),
            )
            .await;
        }
    };
    byte_feeder(client, sink, req, "", "", manifest).await
}

/// Commit headers and stream the requested byte window of the combined
/// object to the client.
///
/// Persisted etag and size are used as-is when both are present; otherwise
/// both are recomputed from the manifest. Ranged responses intentionally
/// answer 200 with a shortened body rather than 206.
async fn byte_feeder(
    client: &dyn SubrequestClient,
    sink: &mut IdentifySink<'_>,
    req: &ProxyRequest,
    xlo_etag: &str,
    xlo_size: &str,
    manifest: Vec<SegmentDescriptor>,
) -> Result<()> {
    let mut etag = xlo_etag.to_string();
    let mut total: i64 = 0;
    let mut have_total = false;
    if !xlo_size.is_empty() {
        if let Ok(size) = xlo_size.parse::<i64>() {
            total = size;
            have_total = true;
        }
    }
    if etag.is_empty() || !have_total {
        total = total_length(&manifest);
        etag = combined_etag(&manifest);
    }

    let mut content_length = total;
    let mut req_range = HttpRange {
        start: 0,
        end: total,
    };
    let range_header = req.header(&RANGE);
    if !range_header.is_empty() {
        match parse_range(range_header, total) {
            Ok(ranges) => {
                if ranges.len() != 1 {
                    return simple_error_response(
                        sink.upstream_mut(),
                        StatusCode::BAD_REQUEST,
                        "invalid multi range",
                    )
                    .await;
                }
                req_range = ranges[0];
                content_length = req_range.len();
            }
            Err(_) => {
                return simple_error_response(
                    sink.upstream_mut(),
                    StatusCode::BAD_REQUEST,
                    "invalid range",
                )
                .await;
            }
        }
    }

    let headers = sink.headers_mut();
    headers.insert(CONTENT_LENGTH, HeaderValue::from_str(&content_length.to_string())?);
    headers.insert(ETAG, HeaderValue::from_str(&format!("\"{}\"", etag))?);
    sink.upstream_mut().write_header(StatusCode::OK).await?;
    feed_out_segments(client, sink, req, manifest, req_range).await
}

/// Walk the manifest in order, sliding the client range across segment
/// boundaries and piping each contributing sub-extent to the client.
///
/// A non-2xx segment subrequest or a failed client write terminates the
/// stream; headers are already committed so only truncation is possible.
async fn feed_out_segments(
    client: &dyn SubrequestClient,
    sink: &mut IdentifySink<'_>,
    req: &ProxyRequest,
    manifest: Vec<SegmentDescriptor>,
    mut req_range: HttpRange,
) -> Result<()> {
    let account = match parse_proxy_path(&req.path) {
        Ok(path) => path.account,
        Err(err) => {
            error!(path = %req.path, error = %err, "invalid originating request path");
            return Ok(());
        }
    };
    for si in &manifest {
        let (seg_len, _) = si.contribution();
        if req_range.start >= seg_len {
            req_range.start -= seg_len;
            req_range.end -= seg_len;
            if req_range.end < 0 {
                return Ok(());
            }
            continue;
        }
        if req_range.end < 0 {
            return Ok(());
        }
        let segment_range = si.segment_range();
        let mut sub_start = segment_range.start;
        if req_range.start > 0 {
            sub_start += req_range.start;
        }
        let mut sub_end = segment_range.end;
        if sub_end > segment_range.start + req_range.end {
            sub_end = segment_range.start + req_range.end;
        }
        if sub_end <= 0 {
            continue;
        }
        let (container, object) = match split_segment_path(&si.name) {
            Ok(parts) => parts,
            Err(err) => {
                error!(name = %si.name, error = %err, "invalid segment reference");
                return Ok(());
            }
        };
        let sub_path = format!("/v1/{}/{}/{}", account, container, object);
        let sub_range = HttpRange {
            start: sub_start,
            end: sub_end,
        };
        let sub_req = ProxyRequest::new(Method::GET, sub_path.as_str())
            .with_header(RANGE, &sub_range.to_header_value())?;
        let mut forward = ForwardSink::new(sink.upstream_mut());
        client.subrequest(&mut forward, sub_req, "slo", false).await?;
        if !forward.status().map_or(false, |s| s.is_success()) {
            debug!(path = %sub_path, marker = "Segment404", "segment not found");
            return Ok(());
        }
        req_range.start -= seg_len;
        req_range.end -= seg_len;
    }
    Ok(())
}
