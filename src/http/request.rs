//! Request handling and classification.
//!
//! # Responsibilities
//! - Generate a unique request ID (UUID v4) and echo it on the response
//! - Classify requests as primary or sub-requests
//! - Prepare request headers for forwarding to the origin
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - A sub-request is announced by a `RequestKind` extension set by an
//!   in-process embedder
//! - The `X-Sub-Request` header is client-controlled and is only honoured
//!   when the deployment opts in (the edge must strip it from client
//!   requests); the extension always wins
//! - The sub-request marker never reaches the origin

use axum::http::{HeaderMap, HeaderName, Request};
use tower_http::request_id::{
    MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer,
};

/// Request ID header name.
pub static X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Header marking a request as an embedded fragment fetch.
pub static X_SUB_REQUEST: HeaderName = HeaderName::from_static("x-sub-request");

/// Whether a request is the outermost one or an embedded fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestKind {
    #[default]
    Primary,
    SubRequest,
}

impl RequestKind {
    /// Classify a request from its `RequestKind` extension only.
    pub fn of<B>(request: &Request<B>) -> Self {
        Self::classify(request, false)
    }

    /// Classify a request, also honouring `X-Sub-Request` when
    /// `trust_header` is set.
    pub fn classify<B>(request: &Request<B>, trust_header: bool) -> Self {
        if let Some(kind) = request.extensions().get::<RequestKind>() {
            return *kind;
        }
        if trust_header && request.headers().contains_key(&X_SUB_REQUEST) {
            RequestKind::SubRequest
        } else {
            RequestKind::Primary
        }
    }

    pub fn is_primary(&self) -> bool {
        matches!(self, RequestKind::Primary)
    }
}

/// Read the request ID assigned by `SetRequestIdLayer`.
pub fn request_id(headers: &HeaderMap) -> String {
    headers
        .get(&X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string()
}

/// Assigns an `x-request-id` to requests that arrive without one.
pub fn set_request_id_layer() -> SetRequestIdLayer<MakeRequestUuid> {
    SetRequestIdLayer::new(X_REQUEST_ID.clone(), MakeRequestUuid)
}

/// Copies the request's `x-request-id` onto the response.
pub fn propagate_request_id_layer() -> PropagateRequestIdLayer {
    PropagateRequestIdLayer::new(X_REQUEST_ID.clone())
}

/// Remove headers that are meaningful only between the edge and this proxy.
pub fn strip_internal_headers(headers: &mut HeaderMap) {
    headers.remove(&X_SUB_REQUEST);
}
