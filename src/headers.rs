//! Swift header vocabulary used by the large object middleware.

use hyper::header::HeaderName;

pub const X_STATIC_LARGE_OBJECT: HeaderName =
    HeaderName::from_static("x-static-large-object");
pub const X_OBJECT_MANIFEST: HeaderName = HeaderName::from_static("x-object-manifest");
pub const X_OBJECT_SYSMETA_SLO_ETAG: HeaderName =
    HeaderName::from_static("x-object-sysmeta-slo-etag");
pub const X_OBJECT_SYSMETA_SLO_SIZE: HeaderName =
    HeaderName::from_static("x-object-sysmeta-slo-size");
pub const X_BACKEND_ETAG_IS_AT: HeaderName =
    HeaderName::from_static("x-backend-etag-is-at");
pub const X_COPY_FROM: HeaderName = HeaderName::from_static("x-copy-from");
