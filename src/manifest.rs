//! Manifest Builders Module
//!
//! Fetches persisted SLO manifests, derives DLO manifests from container
//! listings, parses client PUT manifests as a bounded stream, and projects
//! persisted manifests back into the client form.

use crate::pipeline::{ProxyRequest, SubrequestClient};
use crate::segment::{ClientManifestItem, SegmentDescriptor};
use crate::sink::{CaptureSink, ResponseSink};
use crate::{ProxyError, Result};
use hyper::{Method, StatusCode};
use serde::de::{DeserializeSeed, SeqAccess, Visitor};
use std::fmt;
use std::io::Read;

/// Fetch and decode the persisted manifest behind an SLO object path.
pub async fn fetch_slo_manifest(
    client: &dyn SubrequestClient,
    path: &str,
    max_manifest_size: usize,
) -> Result<Vec<SegmentDescriptor>> {
    let req = ProxyRequest::new(Method::GET, path).with_query("multipart-manifest=get");
    let mut capture = CaptureSink::new();
    client.subrequest(&mut capture, req, "slo", false).await?;
    if capture.status() != Some(StatusCode::OK) || capture.body().is_empty() {
        return Err(ProxyError::InvalidManifest(
            "Error fetching manifest".to_string(),
        ));
    }
    if capture.body().len() > max_manifest_size {
        return Err(ProxyError::InvalidManifest(format!(
            "manifest body exceeds {} bytes",
            max_manifest_size
        )));
    }
    serde_json::from_slice(capture.body()).map_err(|e| ProxyError::InvalidManifest(e.to_string()))
}

/// Build a DLO manifest by listing `container` with `prefix`.
///
/// Listing entries come back ordered by the container server; each entry's
/// name is rewritten to the `container/name` form manifests use.
pub async fn build_dlo_manifest(
    client: &dyn SubrequestClient,
    account: &str,
    container: &str,
    prefix: &str,
) -> Result<Vec<SegmentDescriptor>> {
    let req = ProxyRequest::new(Method::GET, format!("/v1/{}/{}", account, container))
        .with_query(format!("format=json&prefix={}", prefix));
    let mut capture = CaptureSink::new();
    client.subrequest(&mut capture, req, "slo", false).await?;
    if capture.status() != Some(StatusCode::OK) || capture.body().is_empty() {
        return Err(ProxyError::InvalidManifest(
            "Error fetching manifest".to_string(),
        ));
    }
    let mut manifest: Vec<SegmentDescriptor> = serde_json::from_slice(capture.body())
        .map_err(|e| ProxyError::InvalidManifest(e.to_string()))?;
    for entry in &mut manifest {
        entry.name = format!("{}/{}", container, entry.name);
    }
    Ok(manifest)
}

/// Project a persisted manifest into the client PUT form
/// (`{path, etag, size_bytes, range}`).
pub fn convert_manifest(manifest_bytes: &[u8]) -> Result<Vec<u8>> {
    let saved: Vec<SegmentDescriptor> = serde_json::from_slice(manifest_bytes)?;
    let put_form: Vec<ClientManifestItem> = saved
        .into_iter()
        .map(|si| ClientManifestItem {
            path: si.name,
            etag: Some(si.hash),
            size_bytes: Some(si.bytes),
            range: si.range,
        })
        .collect();
    Ok(serde_json::to_vec(&put_form)?)
}

/// Parse a client PUT manifest from a request body as a bounded stream.
///
/// The body must be a JSON array; items are decoded and validated one at a
/// time, never materializing the document as a whole. Validation failures
/// are collected per index; parsing stops early on a structural error or
/// when the segment bound is exceeded.
pub fn parse_put_manifest<R: Read>(
    body: R,
    max_segments: usize,
) -> (Vec<ClientManifestItem>, Vec<String>) {
    let mut items = Vec::new();
    let mut errors = Vec::new();
    let mut de = serde_json::Deserializer::from_reader(body);
    let outcome = ManifestSeed {
        items: &mut items,
        errors: &mut errors,
        max_segments,
    }
    .deserialize(&mut de);
    // A failure before any element was seen means the document was not an
    // array at all; later failures have already been recorded per index.
    if outcome.is_err() && items.is_empty() && errors.is_empty() {
        errors.push("Invalid manifest json- not a list.".to_string());
    }
    (items, errors)
}

struct ManifestSeed<'a> {
    items: &'a mut Vec<ClientManifestItem>,
    errors: &'a mut Vec<String>,
    max_segments: usize,
}

impl<'de> DeserializeSeed<'de> for ManifestSeed<'_> {
    type Value = ();

    fn deserialize<D>(self, deserializer: D) -> std::result::Result<(), D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        deserializer.deserialize_seq(self)
    }
}

impl<'de> Visitor<'de> for ManifestSeed<'_> {
    type Value = ();

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("a JSON array of segment references")
    }

    fn visit_seq<A>(self, mut seq: A) -> std::result::Result<(), A::Error>
    where
        A: SeqAccess<'de>,
    {
        let mut index = 0usize;
        loop {
            match seq.next_element::<ClientManifestItem>() {
                Ok(Some(item)) => {
                    if index >= self.max_segments {
                        self.errors
                            .push("Invalid manifest json- too many segments".to_string());
                        break;
                    }
                    validate_manifest_item(index, item, self.items, self.errors);
                    index += 1;
                }
                Ok(None) => break,
                Err(_) => {
                    self.errors
                        .push("Invalid manifest json- invalid format.".to_string());
                    break;
                }
            }
        }
        Ok(())
    }
}

fn validate_manifest_item(
    index: usize,
    item: ClientManifestItem,
    items: &mut Vec<ClientManifestItem>,
    errors: &mut Vec<String>,
) {
    if !item.path.trim_start_matches('/').contains('/') {
        errors.push(format!(
            "Index {}: path does not refer to an object. Path must be of the form /container/object.",
            index
        ));
        return;
    }
    if item.size_bytes.unwrap_or(0) < 0 {
        errors.push(format!(
            "Index {}: too small; each segment must be at least 1 byte.",
            index
        ));
        return;
    }
    if let Some(range) = &item.range {
        if range.matches('-').count() != 1 {
            errors.push(format!(
                "Index {}: invalid or multiple ranges (only one allowed)",
                index
            ));
            return;
        }
    }
    items.push(item);
}
