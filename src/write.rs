//! PUT Authoring Module
//!
//! Validates a client-supplied manifest against live segment HEADs,
//! computes the combined etag and logical size, and persists the rewritten
//! manifest with its sysmeta.

use crate::headers::{
    X_COPY_FROM, X_OBJECT_SYSMETA_SLO_ETAG, X_OBJECT_SYSMETA_SLO_SIZE, X_STATIC_LARGE_OBJECT,
};
use crate::manifest::parse_put_manifest;
use crate::path::{parse_proxy_path, split_segment_path};
use crate::pipeline::{header_str, ProxyRequest, SubrequestClient};
use crate::range::parse_range;
use crate::segment::{strip_swift_bytes, SegmentDescriptor};
use crate::sink::{simple_error_response, standard_response, CaptureSink, ResponseSink};
use crate::Result;
use bytes::Buf;
use chrono::NaiveDateTime;
use hyper::header::{CONTENT_LENGTH, CONTENT_TYPE, ETAG, LAST_MODIFIED, TRANSFER_ENCODING};
use hyper::{Method, StatusCode};
use tracing::debug;

/// Handle `PUT ?multipart-manifest=put`.
pub async fn handle_slo_put(
    client: &dyn SubrequestClient,
    max_manifest_segments: usize,
    sink: &mut dyn ResponseSink,
    req: &ProxyRequest,
) -> Result<()> {
    let path = parse_proxy_path(&req.path).ok();
    let Some((account, own_container, own_object)) =
        path.as_ref().and_then(|p| p.object_parts())
    else {
        return simple_error_response(
            sink,
            StatusCode::BAD_REQUEST,
            &format!("invalid must multipath PUT to an object path: {}", req.path),
        )
        .await;
    };
    if req.header(&CONTENT_LENGTH).is_empty() && req.header(&TRANSFER_ENCODING) != "chunked" {
        return standard_response(sink, StatusCode::LENGTH_REQUIRED).await;
    }
    if !req.header(&X_COPY_FROM).is_empty() {
        return simple_error_response(
            sink,
            StatusCode::METHOD_NOT_ALLOWED,
            "Multipart Manifest PUTs cannot be COPY requests",
        )
        .await;
    }

    let (manifest, mut errors) =
        parse_put_manifest(req.body.clone().reader(), max_manifest_segments);
    if !errors.is_empty() {
        return simple_error_response(sink, StatusCode::BAD_REQUEST, &errors.join("\n")).await;
    }

    let mut to_put: Vec<SegmentDescriptor> = Vec::with_capacity(manifest.len());
    let mut total_size: i64 = 0;
    let mut slo_etag = md5::Context::new();
    for (index, spm) in manifest.iter().enumerate() {
        let (container, object) = match split_segment_path(&spm.path) {
            Ok(parts) => parts,
            Err(_) => {
                errors.push(format!("invalid manifest path: {}", spm.path));
                break;
            }
        };
        if container == own_container && object == own_object {
            errors.push(format!("manifest cannot reference itself: {}", spm.path));
            break;
        }

        let seg_path = format!("/v1/{}/{}/{}", account, container, object);
        let head_req = ProxyRequest::new(Method::HEAD, seg_path.as_str());
        let mut head = CaptureSink::new();
        client.subrequest(&mut head, head_req, "slo", false).await?;
        if head.status() != Some(StatusCode::OK) {
            let status = head.status().map_or(0, |s| s.as_u16());
            errors.push(format!("{} response on segment: {}", status, seg_path));
            continue;
        }
        let content_length: i64 = match header_str(head.headers(), &CONTENT_LENGTH).parse() {
            Ok(len) => len,
            Err(_) => {
                errors.push(format!("bad content-length on segment: {}", seg_path));
                continue;
            }
        };
        let seg_etag = header_str(head.headers(), &ETAG)
            .trim_matches('"')
            .to_string();
        let is_slo = header_str(head.headers(), &X_STATIC_LARGE_OBJECT) == "True";

        if let Some(size_bytes) = spm.size_bytes {
            if size_bytes > 0 && content_length != size_bytes {
                errors.push(format!(
                    "Unmatching ContentLength (manifest {}) != (segment actual {}) response on segment: {}",
                    size_bytes, content_length, seg_path
                ));
                continue;
            }
        }

        let mut segment_size = content_length;
        let mut parsed_range = spm.range.clone();
        if let Some(range) = &spm.range {
            let ranges = match parse_range(&format!("bytes={}", range), content_length) {
                Ok(ranges) => ranges,
                Err(_) => {
                    errors.push(format!("Index {}: invalid range", index));
                    continue;
                }
            };
            if ranges.len() != 1 {
                errors.push(format!(
                    "Index {}:  multiple ranges (only one allowed)",
                    index
                ));
                continue;
            }
            segment_size = ranges[0].len();
            parsed_range = Some(format!("{}-{}", ranges[0].start, ranges[0].end - 1));
        }
        total_size += segment_size;

        if let Some(etag) = &spm.etag {
            if !etag.is_empty() && *etag != seg_etag {
                errors.push(format!(
                    "Etag Mismatch on {}: {} != {}",
                    spm.path, etag, seg_etag
                ));
                continue;
            }
        }

        let (content_type, _) = strip_swift_bytes(header_str(head.headers(), &CONTENT_TYPE));
        let descriptor = SegmentDescriptor {
            hash: seg_etag,
            last_modified: format_manifest_date(header_str(head.headers(), &LAST_MODIFIED)),
            bytes: content_length,
            name: spm.path.clone(),
            content_type,
            range: parsed_range.filter(|r| !r.is_empty()),
            sub_slo: is_slo,
        };
        let (_, token) = descriptor.contribution();
        slo_etag.consume(token.as_bytes());
        to_put.push(descriptor);
    }
    if !errors.is_empty() {
        return simple_error_response(sink, StatusCode::BAD_REQUEST, &errors.join("\n")).await;
    }

    let computed_etag = format!("{:x}", slo_etag.compute());
    let client_etag = req.header(&ETAG);
    if !client_etag.is_empty() && client_etag.trim_matches('"') != computed_etag {
        return simple_error_response(sink, StatusCode::UNPROCESSABLE_ENTITY, "Invalid Etag").await;
    }

    let mut content_type = req.header(&CONTENT_TYPE).to_string();
    if content_type.is_empty() {
        content_type = mime_guess::from_path(own_object)
            .first_raw()
            .unwrap_or("application/octet-stream")
            .to_string();
    }

    let body = serde_json::to_vec(&to_put)?;
    debug!(
        path = %req.path,
        segments = to_put.len(),
        total_size,
        etag = %computed_etag,
        "persisting slo manifest"
    );
    let put_req = ProxyRequest::new(Method::PUT, req.path.clone())
        .with_header(
            CONTENT_TYPE,
            &format!("{};swift_bytes={}", content_type, total_size),
        )?
        .with_header(X_STATIC_LARGE_OBJECT, "True")?
        .with_header(X_OBJECT_SYSMETA_SLO_ETAG, &computed_etag)?
        .with_header(X_OBJECT_SYSMETA_SLO_SIZE, &total_size.to_string())?
        .with_header(ETAG, &format!("{:x}", md5::compute(&body)))?
        .with_header(CONTENT_LENGTH, &body.len().to_string())?
        .with_body(body.into());
    client.subrequest(sink, put_req, "slo", false).await
}

/// Render a segment's `Last-Modified` HTTP date in the manifest timestamp
/// form, `YYYY-MM-DDTHH:MM:SS.sssss`.
fn format_manifest_date(http_date: &str) -> String {
    let parsed = chrono::DateTime::parse_from_rfc2822(http_date)
        .map(|dt| dt.naive_utc())
        .or_else(|_| NaiveDateTime::parse_from_str(http_date, "%a, %d %b %Y %H:%M:%S GMT"))
        .unwrap_or_default();
    format!(
        "{}.{:05}",
        parsed.format("%Y-%m-%dT%H:%M:%S"),
        parsed.and_utc().timestamp_subsec_nanos() / 10_000
    )
}
