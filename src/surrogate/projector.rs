//! Cache tag to surrogate key projection.
//!
//! # Responsibilities
//! - Mirror `X-Drupal-Cache-Tags` into `Surrogate-Key` on outgoing responses
//! - Replace every tag with its fingerprint when the raw list exceeds the
//!   16 KB limit the CDN accepts for the header
//! - Report each fingerprinted response through the injected notice sink
//!
//! # Design Decisions
//! - The size decision is taken on the raw inbound value, before any rewrite
//! - Tags are split on a single space; empty tokens are kept and fingerprinted
//! - Duplicates are kept; order is preserved
//! - Header bytes are never required to be UTF-8

use std::borrow::Cow;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use axum::http::{HeaderMap, HeaderName, HeaderValue, Response};

use crate::observability::metrics;
use crate::surrogate::fingerprint::Fingerprint;

/// Header the origin uses to list a response's cache tags.
pub static CACHE_TAGS: HeaderName = HeaderName::from_static("x-drupal-cache-tags");

/// Header the CDN edge maps to purge keys.
pub static SURROGATE_KEY: HeaderName = HeaderName::from_static("surrogate-key");

/// Largest raw cache-tags value that is copied verbatim.
pub const MAX_HEADER_BYTES: usize = 16384;

const TRUNCATION_NOTICE: &str = "X-Drupal-Cache-Tags header size exceeded the 16 KB limit that the CDN supports; replaced the cache tags with hashed equivalents.";

/// Receives the notice emitted when a tag list had to be fingerprinted.
///
/// Called inline on the response path, so implementations must not block.
/// A panicking sink is caught and the notice is dropped.
pub trait NoticeSink: Send + Sync {
    fn notice(&self, message: &str);
}

/// Notice sink backed by `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotice;

impl NoticeSink for TracingNotice {
    fn notice(&self, message: &str) {
        tracing::info!(target: "surrogate_key", "{}", message);
    }
}

/// Which form of the tag list ended up in `Surrogate-Key`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Projection {
    /// Raw value copied unchanged.
    Verbatim,
    /// Every tag replaced by its fingerprint.
    Fingerprinted { tags: usize },
}

impl Projection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Projection::Verbatim => "verbatim",
            Projection::Fingerprinted { .. } => "fingerprinted",
        }
    }
}

/// Replace each space-separated tag in `raw` by its fingerprint.
///
/// Returns the joined fingerprints and the number of tags.
pub fn fingerprint_tags(raw: &[u8]) -> (String, usize) {
    let mut out = String::with_capacity(raw.len() / 2);
    let mut count = 0;
    for tag in raw.split(|b| *b == b' ') {
        if count > 0 {
            out.push(' ');
        }
        out.push_str(Fingerprint::of(tag).as_str());
        count += 1;
    }
    (out, count)
}

/// Compute the `Surrogate-Key` value for a raw cache-tags value.
pub fn surrogate_key_value(raw: &[u8]) -> (Cow<'_, [u8]>, Projection) {
    if raw.len() <= MAX_HEADER_BYTES {
        return (Cow::Borrowed(raw), Projection::Verbatim);
    }
    let (joined, tags) = fingerprint_tags(raw);
    (Cow::Owned(joined.into_bytes()), Projection::Fingerprinted { tags })
}

/// Writes `Surrogate-Key` onto primary responses.
#[derive(Clone)]
pub struct SurrogateKeyProjector {
    notices: Arc<dyn NoticeSink>,
    strip_cache_tags: bool,
}

impl std::fmt::Debug for SurrogateKeyProjector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SurrogateKeyProjector")
            .field("strip_cache_tags", &self.strip_cache_tags)
            .finish_non_exhaustive()
    }
}

impl SurrogateKeyProjector {
    pub fn new(notices: Arc<dyn NoticeSink>) -> Self {
        Self {
            notices,
            strip_cache_tags: false,
        }
    }

    /// Remove the origin's cache-tags header once it has been projected.
    pub fn with_strip_cache_tags(mut self, strip: bool) -> Self {
        self.strip_cache_tags = strip;
        self
    }

    /// Set `Surrogate-Key` from the cache-tags header in `headers`.
    ///
    /// A missing cache-tags header produces an empty `Surrogate-Key`.
    pub fn project(&self, headers: &mut HeaderMap) -> Projection {
        let raw = headers
            .get(&CACHE_TAGS)
            .cloned()
            .unwrap_or_else(|| HeaderValue::from_static(""));

        let (bytes, projection) = surrogate_key_value(raw.as_bytes());
        let value = match bytes {
            Cow::Borrowed(_) => raw.clone(),
            // Hex digits and spaces only.
            Cow::Owned(bytes) => {
                HeaderValue::from_bytes(&bytes).unwrap_or_else(|_| HeaderValue::from_static(""))
            }
        };

        if let Projection::Fingerprinted { tags } = projection {
            let notices = &self.notices;
            let delivered =
                panic::catch_unwind(AssertUnwindSafe(|| notices.notice(TRUNCATION_NOTICE)));
            if delivered.is_err() {
                tracing::warn!("Notice sink panicked; truncation notice dropped");
            }
            tracing::debug!(tags, projected_bytes = value.len(), "Fingerprinted cache tags");
        }
        metrics::record_projection(projection.as_str(), value.len());

        headers.insert(SURROGATE_KEY.clone(), value);
        if self.strip_cache_tags {
            headers.remove(&CACHE_TAGS);
        }
        projection
    }

    pub fn project_response<B>(&self, response: &mut Response<B>) -> Projection {
        self.project(response.headers_mut())
    }
}

impl Default for SurrogateKeyProjector {
    fn default() -> Self {
        Self::new(Arc::new(TracingNotice))
    }
}
