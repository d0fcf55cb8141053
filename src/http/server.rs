//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the forwarding handler
//! - Wire up middleware (tracing, request ID, timeout, surrogate keys)
//! - Bind server to listener
//! - Forward requests to the origin and stream responses back
//! - Observability (metrics, correlation IDs)

use std::str::FromStr;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::State,
    http::{
        uri::{Authority, PathAndQuery, Scheme},
        Request, StatusCode, Uri, Version,
    },
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::ProxyConfig;
use crate::http::request::{
    propagate_request_id_layer, request_id, set_request_id_layer, strip_internal_headers,
};
use crate::lifecycle::shutdown;
use crate::observability::metrics;
use crate::surrogate::{SurrogateKeyLayer, SurrogateKeyProjector};

/// Errors raised while building or running the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid upstream address `{0}`")]
    InvalidUpstream(String),

    #[error("server IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub client: Client<HttpConnector, Body>,
    pub upstream: Authority,
}

/// HTTP server for the surrogate key proxy.
pub struct HttpServer {
    router: Router,
    config: ProxyConfig,
}

impl HttpServer {
    /// Create a server that logs truncation notices through `tracing`.
    pub fn new(config: ProxyConfig) -> Result<Self, ServerError> {
        Self::with_projector(config, SurrogateKeyProjector::default())
    }

    /// Create a server using the given projector.
    pub fn with_projector(
        config: ProxyConfig,
        projector: SurrogateKeyProjector,
    ) -> Result<Self, ServerError> {
        let upstream = Authority::from_str(&config.upstream.address)
            .map_err(|_| ServerError::InvalidUpstream(config.upstream.address.clone()))?;

        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(Duration::from_secs(config.timeouts.connect_secs)));
        let client = Client::builder(TokioExecutor::new()).build(connector);

        let state = AppState { client, upstream };
        let projector = projector.with_strip_cache_tags(config.surrogate_keys.strip_cache_tags);
        let router = Self::build_router(&config, state, projector);

        Ok(Self { router, config })
    }

    /// Build the Axum router with all middleware layers.
    ///
    /// Request order: trace → set request ID → propagate request ID →
    /// surrogate keys → timeout → handler. The surrogate layer sits outside
    /// the timeout so that timeout responses are projected too.
    #[allow(deprecated)]
    fn build_router(
        config: &ProxyConfig,
        state: AppState,
        projector: SurrogateKeyProjector,
    ) -> Router {
        let mut router = Router::new()
            .route("/{*path}", any(proxy_handler))
            .route("/", any(proxy_handler))
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)));

        if config.surrogate_keys.enabled {
            router = router.layer(
                SurrogateKeyLayer::new(projector)
                    .trust_sub_request_header(config.surrogate_keys.trust_sub_request_header),
            );
        } else {
            tracing::warn!("Surrogate key projection disabled");
        }

        router
            .layer(propagate_request_id_layer())
            .layer(set_request_id_layer())
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ServerError> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            upstream = %self.config.upstream.address,
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown::wait(shutdown))
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// The configured router, for serving in-process.
    pub fn into_router(self) -> Router {
        self.router
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }
}

/// Forward a request to the origin.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start_time = Instant::now();
    let request_id = request_id(request.headers());
    let method = request.method().to_string();

    let (mut parts, body) = request.into_parts();
    tracing::debug!(
        request_id = %request_id,
        method = %method,
        path = %parts.uri.path(),
        "Proxying request"
    );

    strip_internal_headers(&mut parts.headers);
    parts.version = Version::HTTP_11;
    parts.uri = match upstream_uri(&parts.uri, &state.upstream) {
        Some(uri) => uri,
        None => {
            tracing::warn!(request_id = %request_id, uri = %parts.uri, "Unroutable request URI");
            metrics::record_request(&method, 400, start_time);
            return (StatusCode::BAD_REQUEST, "Invalid request URI").into_response();
        }
    };

    match state.client.request(Request::from_parts(parts, body)).await {
        Ok(response) => {
            metrics::record_request(&method, response.status().as_u16(), start_time);
            into_axum_response(response)
        }
        Err(e) => {
            tracing::error!(request_id = %request_id, error = %e, "Upstream error");
            metrics::record_request(&method, 502, start_time);
            (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response()
        }
    }
}

/// Point `uri` at the origin, keeping path and query.
fn upstream_uri(uri: &Uri, upstream: &Authority) -> Option<Uri> {
    let mut uri_parts = uri.clone().into_parts();
    uri_parts.scheme = Some(Scheme::HTTP);
    uri_parts.authority = Some(upstream.clone());
    if uri_parts.path_and_query.is_none() {
        uri_parts.path_and_query = Some(PathAndQuery::from_static("/"));
    }
    Uri::from_parts(uri_parts).ok()
}

fn into_axum_response(response: hyper::Response<hyper::body::Incoming>) -> Response {
    let (parts, body) = response.into_parts();
    Response::from_parts(parts, Body::new(body))
}
