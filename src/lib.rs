//! Surrogate key proxy library.
//!
//! Sits between a CDN edge and an origin that labels responses with
//! `X-Drupal-Cache-Tags`, and mirrors those tags into the `Surrogate-Key`
//! header the edge uses for purging.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod surrogate;

pub use config::schema::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use surrogate::{SurrogateKeyLayer, SurrogateKeyProjector};
