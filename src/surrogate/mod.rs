//! Surrogate key subsystem.
//!
//! # Data Flow
//! ```text
//! origin response (X-Drupal-Cache-Tags: "node:1 node:2 ...")
//!     → layer.rs (skip sub-requests)
//!     → projector.rs (size check against 16 KB)
//!         ≤ limit: copy verbatim
//!         > limit: fingerprint.rs per tag, notice logged once
//!     → Surrogate-Key header on the response
//!     → CDN edge
//! ```
//!
//! # Design Decisions
//! - Stateless: each response is projected on its own, nothing is cached
//! - Collaborators (notice sink) are injected, never looked up globally
//! - Purge keys are recomputed from tags with the same fingerprint function

pub mod fingerprint;
pub mod layer;
pub mod projector;

pub use fingerprint::{fingerprint, purge_key_list, purge_keys, Fingerprint, PurgeKeys};
pub use layer::{SurrogateKeyLayer, SurrogateKeyService};
pub use projector::{
    NoticeSink, Projection, SurrogateKeyProjector, TracingNotice, CACHE_TAGS, MAX_HEADER_BYTES,
    SURROGATE_KEY,
};
