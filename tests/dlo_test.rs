//! Dynamic large object scenarios: listing-driven manifests, range
//! arithmetic across discovered segments, and DLO marker validation.

mod common;

use common::{drive, header, middleware_fixture, MockBackend};
use hyper::header::{CONTENT_LENGTH, ETAG, RANGE};
use hyper::{Method, StatusCode};
use xlo_proxy::headers::X_OBJECT_MANIFEST;
use xlo_proxy::pipeline::ProxyRequest;
use xlo_proxy::sink::ResponseSink;

/// Two 4-byte segments under a `p_` prefix plus one unrelated object, all
/// behind a zero-length DLO marker object.
fn dlo_fixture(backend: &MockBackend) {
    backend.put_object("/v1/a/c/p_0", "abcd", "h0", "application/octet-stream", vec![]);
    backend.put_object("/v1/a/c/p_1", "efgh", "h1", "application/octet-stream", vec![]);
    backend.put_object("/v1/a/c/unrelated", "zz", "hz", "application/octet-stream", vec![]);
    backend.put_object(
        "/v1/a/c/dyn",
        "",
        "d41d8cd98f00b204e9800998ecf8427e",
        "application/octet-stream",
        vec![(X_OBJECT_MANIFEST, "c/p_".to_string())],
    );
}

#[tokio::test]
async fn test_dlo_get_whole_object() {
    let (backend, middleware) = middleware_fixture();
    dlo_fixture(&backend);

    let client = drive(&middleware, ProxyRequest::new(Method::GET, "/v1/a/c/dyn")).await;
    assert_eq!(client.status(), Some(StatusCode::OK));
    assert_eq!(header(&client, &CONTENT_LENGTH), "8");
    assert_eq!(client.body(), b"abcdefgh");
    // etag and length are always computed on the fly from the listing
    assert_eq!(
        header(&client, &ETAG),
        format!("\"{:x}\"", md5::compute("h0h1"))
    );

    let listings = backend.requests_to("/v1/a/c");
    assert_eq!(listings.len(), 1);
    assert_eq!(listings[0].query, "format=json&prefix=p_");
}

#[tokio::test]
async fn test_dlo_get_cross_segment_range() {
    let (backend, middleware) = middleware_fixture();
    dlo_fixture(&backend);

    let req = ProxyRequest::new(Method::GET, "/v1/a/c/dyn")
        .with_header(RANGE, "bytes=2-5")
        .unwrap();
    let client = drive(&middleware, req).await;
    assert_eq!(client.status(), Some(StatusCode::OK));
    assert_eq!(header(&client, &CONTENT_LENGTH), "4");
    assert_eq!(client.body(), b"cdef");

    let p0 = backend.requests_to("/v1/a/c/p_0");
    let p1 = backend.requests_to("/v1/a/c/p_1");
    assert_eq!(p0[0].range(), "bytes=2-3");
    assert_eq!(p1[0].range(), "bytes=0-1");
}

#[tokio::test]
async fn test_dlo_range_outside_object_is_rejected() {
    let (backend, middleware) = middleware_fixture();
    dlo_fixture(&backend);

    let req = ProxyRequest::new(Method::GET, "/v1/a/c/dyn")
        .with_header(RANGE, "bytes=100-200")
        .unwrap();
    let client = drive(&middleware, req).await;
    assert_eq!(client.status(), Some(StatusCode::BAD_REQUEST));
    assert_eq!(client.body(), b"invalid range");
}

#[tokio::test]
async fn test_dlo_multi_range_is_rejected() {
    let (backend, middleware) = middleware_fixture();
    dlo_fixture(&backend);

    let req = ProxyRequest::new(Method::GET, "/v1/a/c/dyn")
        .with_header(RANGE, "bytes=0-1,3-4")
        .unwrap();
    let client = drive(&middleware, req).await;
    assert_eq!(client.status(), Some(StatusCode::BAD_REQUEST));
    assert_eq!(client.body(), b"invalid multi range");
}

#[tokio::test]
async fn test_dlo_marker_with_bad_manifest_header() {
    let (backend, middleware) = middleware_fixture();
    backend.put_object(
        "/v1/a/c/dyn",
        "",
        "d41d8cd98f00b204e9800998ecf8427e",
        "application/octet-stream",
        vec![(X_OBJECT_MANIFEST, "no-slash".to_string())],
    );

    let client = drive(&middleware, ProxyRequest::new(Method::GET, "/v1/a/c/dyn")).await;
    assert_eq!(client.status(), Some(StatusCode::BAD_REQUEST));
    assert_eq!(client.body(), b"invalid dlo manifest path");
}

#[tokio::test]
async fn test_dlo_put_validates_marker_header() {
    let (_, middleware) = middleware_fixture();
    let req = ProxyRequest::new(Method::PUT, "/v1/a/c/dyn")
        .with_header(X_OBJECT_MANIFEST, "no-slash")
        .unwrap()
        .with_header(CONTENT_LENGTH, "0")
        .unwrap();
    let client = drive(&middleware, req).await;
    assert_eq!(client.status(), Some(StatusCode::BAD_REQUEST));
    assert_eq!(
        client.body(),
        b"X-Object-Manifest must be in the format container/prefix"
    );
}

#[tokio::test]
async fn test_dlo_marker_put_passes_through() {
    let (backend, middleware) = middleware_fixture();
    let req = ProxyRequest::new(Method::PUT, "/v1/a/c/dyn")
        .with_header(X_OBJECT_MANIFEST, "c/p_")
        .unwrap()
        .with_header(CONTENT_LENGTH, "0")
        .unwrap();
    let client = drive(&middleware, req).await;
    assert_eq!(client.status(), Some(StatusCode::CREATED));
    let stored = backend.get_object("/v1/a/c/dyn").unwrap();
    assert!(stored
        .extra_headers
        .iter()
        .any(|(name, value)| name == &X_OBJECT_MANIFEST && value == "c/p_"));
}

#[tokio::test]
async fn test_raw_manifest_fetch_of_dlo_marker_passes_through() {
    let (backend, middleware) = middleware_fixture();
    dlo_fixture(&backend);

    let req = ProxyRequest::new(Method::GET, "/v1/a/c/dyn").with_query("multipart-manifest=get");
    let client = drive(&middleware, req).await;
    // the zero-length marker itself, not the composed object
    assert_eq!(client.status(), Some(StatusCode::OK));
    assert!(client.body().is_empty());
    assert!(backend.requests_to("/v1/a/c/p_0").is_empty());
}
