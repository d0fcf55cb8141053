//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware chain)
//!     → request.rs (request ID, primary/sub-request classification)
//!     → origin (hyper client)
//!     → surrogate layer (Surrogate-Key on primary responses)
//!     → Send to client
//! ```

pub mod request;
pub mod server;

pub use request::{RequestKind, X_REQUEST_ID, X_SUB_REQUEST};
pub use server::{HttpServer, ServerError};
