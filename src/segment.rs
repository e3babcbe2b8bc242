//! Segment Descriptor Module
//!
//! The persisted manifest entry type, the client-side PUT manifest entry
//! type, and the per-segment range and hash arithmetic that feeds combined
//! etag and length computation.

use crate::range::{parse_range, HttpRange};
use serde::{Deserialize, Serialize};

/// One entry of a persisted manifest.
///
/// For an SLO this is the stored form; for a DLO the same shape is derived
/// from a container listing at read time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentDescriptor {
    /// Etag of the referenced object at manifest creation.
    pub hash: String,
    /// Authoring-time timestamp, `YYYY-MM-DDTHH:MM:SS.sssss`.
    #[serde(default)]
    pub last_modified: String,
    /// Full size of the referenced object.
    pub bytes: i64,
    /// `container/object` path of the referenced segment.
    pub name: String,
    #[serde(default)]
    pub content_type: String,
    /// Optional `start-end` sub-extent of the referenced object.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<String>,
    /// True when the referenced object is itself a static large object.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub sub_slo: bool,
}

impl SegmentDescriptor {
    /// Effective length and etag-contribution token for this segment.
    ///
    /// An unranged segment contributes its full size and bare hash; a
    /// ranged one contributes the range length and a `hash:range;` token.
    pub fn contribution(&self) -> (i64, String) {
        if let Some(range) = &self.range {
            let seg_range = self.segment_range();
            return (seg_range.len(), format!("{}:{};", self.hash, range));
        }
        (self.bytes, self.hash.clone())
    }

    /// The extent of the referenced object this segment consumes, or the
    /// whole object when no range is set or the range fails to parse.
    pub fn segment_range(&self) -> HttpRange {
        if let Some(range) = &self.range {
            if let Ok(ranges) = parse_range(&format!("bytes={}", range), self.bytes) {
                if ranges.len() == 1 {
                    return ranges[0];
                }
            }
        }
        HttpRange {
            start: 0,
            end: self.bytes,
        }
    }
}

/// One entry of a client-supplied PUT manifest.
///
/// `etag` and `size_bytes` may be omitted or null, which defers to the
/// live segment HEAD during authoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientManifestItem {
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub etag: Option<String>,
    #[serde(default)]
    pub size_bytes: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<String>,
}

/// Combined etag over an ordered manifest: hex MD5 of the concatenated
/// per-segment hash tokens.
pub fn combined_etag<'a, I>(segments: I) -> String
where
    I: IntoIterator<Item = &'a SegmentDescriptor>,
{
    let mut ctx = md5::Context::new();
    for segment in segments {
        let (_, token) = segment.contribution();
        ctx.consume(token.as_bytes());
    }
    format!("{:x}", ctx.compute())
}

/// Total logical length over an ordered manifest.
pub fn total_length<'a, I>(segments: I) -> i64
where
    I: IntoIterator<Item = &'a SegmentDescriptor>,
{
    segments.into_iter().map(|s| s.contribution().0).sum()
}

/// Strip any `swift_bytes=` parameter from a content type, returning the
/// cleaned type and the logical size the parameter carried.
pub fn strip_swift_bytes(content_type: &str) -> (String, Option<i64>) {
    let mut swift_bytes = None;
    let mut kept = Vec::new();
    for part in content_type.split(';') {
        let trimmed = part.trim();
        if let Some(value) = trimmed.strip_prefix("swift_bytes=") {
            swift_bytes = value.parse::<i64>().ok();
        } else if !trimmed.is_empty() {
            kept.push(trimmed);
        }
    }
    (kept.join(";"), swift_bytes)
}
