//! Cache tag fingerprints.
//!
//! A fingerprint is the first three lowercase hex characters of the MD5
//! digest of a tag's raw bytes. It is a lossy proxy for the tag: 4096
//! buckets, collisions expected. The hash is fixed so that fingerprints
//! computed at purge time match the ones sent to the edge earlier.

use std::fmt;

/// Width of a fingerprint in hex characters.
pub const FINGERPRINT_WIDTH: usize = 3;

/// A short, deterministic proxy for a single cache tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; FINGERPRINT_WIDTH]);

impl Fingerprint {
    /// Fingerprint a tag given as raw header bytes.
    pub fn of(tag: &[u8]) -> Self {
        let digest = md5::compute(tag);
        let hex = format!("{:x}", digest);
        let mut out = [0u8; FINGERPRINT_WIDTH];
        out.copy_from_slice(&hex.as_bytes()[..FINGERPRINT_WIDTH]);
        Self(out)
    }

    pub fn as_str(&self) -> &str {
        // Always ASCII hex digits.
        std::str::from_utf8(&self.0).unwrap_or_default()
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fingerprint a tag given as a string.
pub fn fingerprint(tag: &str) -> Fingerprint {
    Fingerprint::of(tag.as_bytes())
}

/// The keys under which an object tagged `tag` may be known at the edge.
///
/// A response is sent either with its tags verbatim or with their
/// fingerprints, depending on the size of the whole tag list, so purging a
/// tag reliably means purging both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurgeKeys {
    pub tag: String,
    pub fingerprint: Fingerprint,
}

impl PurgeKeys {
    /// Both keys, verbatim tag first.
    pub fn keys(&self) -> [&str; 2] {
        [self.tag.as_str(), self.fingerprint.as_str()]
    }
}

pub fn purge_keys(tag: &str) -> PurgeKeys {
    PurgeKeys {
        tag: tag.to_string(),
        fingerprint: fingerprint(tag),
    }
}

/// Purge keys for a batch of tags, deduplicated, in first-seen order.
pub fn purge_key_list<'a, I>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for tag in tags {
        let keys = purge_keys(tag);
        for key in keys.keys() {
            if seen.insert(key.to_string()) {
                out.push(key.to_string());
            }
        }
    }
    out
}
