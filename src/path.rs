//! Path Parsing Module
//!
//! Splits Swift-style proxy paths (`/v1/<account>[/<container>[/<object>]]`)
//! and the `container/object` references that appear inside manifests and
//! the `X-Object-Manifest` header.

use crate::{ProxyError, Result};

/// Parsed proxy request path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyPath {
    pub account: String,
    pub container: Option<String>,
    pub object: Option<String>,
}

impl ProxyPath {
    /// Account, container, and object when the path denotes an object.
    pub fn object_parts(&self) -> Option<(&str, &str, &str)> {
        match (&self.container, &self.object) {
            (Some(container), Some(object)) => {
                Some((self.account.as_str(), container.as_str(), object.as_str()))
            }
            _ => None,
        }
    }
}

/// Parse a proxy request path of the form `/v1/<account>[/<container>[/<object>]]`.
///
/// Object names may themselves contain `/`; everything after the container
/// segment belongs to the object.
pub fn parse_proxy_path(path: &str) -> Result<ProxyPath> {
    let trimmed = path.trim_start_matches('/');
    let mut parts = trimmed.splitn(4, '/');
    let version = parts.next().unwrap_or("");
    if version != "v1" {
        return Err(ProxyError::InvalidRequest(format!(
            "invalid proxy path: {}",
            path
        )));
    }
    let account = match parts.next() {
        Some(a) if !a.is_empty() => a.to_string(),
        _ => {
            return Err(ProxyError::InvalidRequest(format!(
                "invalid proxy path: {}",
                path
            )))
        }
    };
    let container = parts.next().filter(|c| !c.is_empty()).map(str::to_string);
    let object = parts.next().filter(|o| !o.is_empty()).map(str::to_string);
    if object.is_some() && container.is_none() {
        return Err(ProxyError::InvalidRequest(format!(
            "invalid proxy path: {}",
            path
        )));
    }
    Ok(ProxyPath {
        account,
        container,
        object,
    })
}

/// Split a manifest segment reference into `(container, object)`.
///
/// The reference must contain exactly one separating `/` after any leading
/// slashes, with non-empty parts on both sides.
pub fn split_segment_path(path: &str) -> Result<(String, String)> {
    let trimmed = path.trim_start_matches('/');
    match trimmed.split_once('/') {
        Some((container, object)) if !container.is_empty() && !object.is_empty() => {
            Ok((container.to_string(), object.to_string()))
        }
        _ => Err(ProxyError::InvalidRequest(format!(
            "invalid segment path: {}",
            path
        ))),
    }
}

/// Validate an `X-Object-Manifest` header value (`container/prefix`).
pub fn is_valid_dlo_header(manifest: &str) -> bool {
    if manifest.starts_with('/') || manifest.contains('?') || manifest.contains('&') {
        return false;
    }
    match manifest.split_once('/') {
        Some((container, prefix)) => !container.is_empty() && !prefix.is_empty(),
        None => false,
    }
}
