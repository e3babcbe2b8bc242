//! Byte Range Module
//!
//! Parsing and arithmetic for HTTP `Range` request headers and
//! `Content-Range` response headers. Ranges are kept half-open internally
//! (`end` exclusive); the inclusive wire form only appears at
//! serialization time.

use crate::{ProxyError, Result};

/// A half-open byte range: `start` is inclusive, `end` is exclusive.
///
/// Signed so that the segment walk can decrement both endpoints below zero
/// while sliding a client range across segment boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpRange {
    pub start: i64,
    pub end: i64,
}

impl HttpRange {
    /// Number of bytes covered by this range.
    pub fn len(&self) -> i64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// Render as an inclusive wire-form `Range` header value.
    ///
    /// The `-1` here is the only place the half-open to inclusive
    /// conversion happens.
    pub fn to_header_value(&self) -> String {
        format!("bytes={}-{}", self.start, self.end - 1)
    }
}

/// Parse an HTTP `Range` request header against a known content length.
///
/// Accepts `bytes=start-end`, `bytes=start-` and `bytes=-suffix` forms,
/// comma separated. Inclusive wire endpoints are normalized to half-open
/// ranges, with `end` clamped to the content length. A range whose start
/// lies at or beyond the content length is unsatisfiable and rejected.
pub fn parse_range(header: &str, content_length: i64) -> Result<Vec<HttpRange>> {
    let ranges_str = header
        .strip_prefix("bytes=")
        .ok_or_else(|| ProxyError::InvalidRange("range unit must be bytes".to_string()))?;

    let mut ranges = Vec::new();
    for spec in ranges_str.split(',') {
        ranges.push(parse_range_spec(spec.trim(), content_length)?);
    }
    if ranges.is_empty() {
        return Err(ProxyError::InvalidRange(
            "no range specifications found".to_string(),
        ));
    }
    Ok(ranges)
}

fn parse_range_spec(spec: &str, content_length: i64) -> Result<HttpRange> {
    let (start_str, end_str) = spec
        .split_once('-')
        .ok_or_else(|| ProxyError::InvalidRange(format!("malformed range spec: {}", spec)))?;

    match (start_str.is_empty(), end_str.is_empty()) {
        (false, false) => {
            let start = parse_offset(start_str)?;
            let end = parse_offset(end_str)?;
            if start > end {
                return Err(ProxyError::InvalidRange(
                    "range start after range end".to_string(),
                ));
            }
            if start >= content_length {
                return Err(ProxyError::InvalidRange(
                    "range start beyond content length".to_string(),
                ));
            }
            Ok(HttpRange {
                start,
                end: end.min(content_length - 1) + 1,
            })
        }
        (false, true) => {
            let start = parse_offset(start_str)?;
            if start >= content_length {
                return Err(ProxyError::InvalidRange(
                    "range start beyond content length".to_string(),
                ));
            }
            Ok(HttpRange {
                start,
                end: content_length,
            })
        }
        (true, false) => {
            let suffix = parse_offset(end_str)?;
            if suffix == 0 {
                return Err(ProxyError::InvalidRange(
                    "zero length suffix range".to_string(),
                ));
            }
            Ok(HttpRange {
                start: (content_length - suffix).max(0),
                end: content_length,
            })
        }
        (true, true) => Err(ProxyError::InvalidRange(
            "empty range specification".to_string(),
        )),
    }
}

fn parse_offset(s: &str) -> Result<i64> {
    s.trim()
        .parse::<i64>()
        .map_err(|_| ProxyError::InvalidRange(format!("invalid range offset: {}", s)))
}

/// Parse a `Content-Range` response header of the form `bytes A-B/C`.
///
/// Returns the inclusive endpoints and the total size as parsed. Any other
/// shape, including an unknown `*` total, yields `None`.
pub fn parse_content_range(header: &str) -> Option<(i64, i64, i64)> {
    let rest = header.trim().strip_prefix("bytes ")?;
    let (range_part, total_str) = rest.split_once('/')?;
    let total: i64 = total_str.parse().ok()?;
    let (start_str, end_str) = range_part.split_once('-')?;
    let start: i64 = start_str.parse().ok()?;
    let end: i64 = end_str.parse().ok()?;
    if start > end || end >= total {
        return None;
    }
    Some((start, end, total))
}
