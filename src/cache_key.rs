use std::fmt;

use sha2::Digest as _;

use crate::descriptor::ProblemDescriptor;

/// Hex digits kept from the digest.
pub const CACHE_KEY_LEN: usize = 12;

/// Stable identity of a descriptor's rendered artifact.
///
/// Derived from `(kind, operand1, operand2, style)` only. `answer` is deliberately not part of
/// the identity, so descriptors that differ only in their answer share one cache entry.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn derive(descriptor: &ProblemDescriptor) -> Self {
        let canonical = canonical_form(descriptor);
        let digest = sha2::Sha256::digest(canonical.as_bytes());
        let mut hex = String::with_capacity(digest.len() * 2);
        for b in digest {
            hex.push_str(&format!("{:02x}", b));
        }
        hex.truncate(CACHE_KEY_LEN);
        Self(hex)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Artifact base name (no extension): `<prefix>_<hash>`.
    pub fn file_stem(&self, prefix: &str) -> String {
        format!("{prefix}_{}", self.0)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn canonical_form(d: &ProblemDescriptor) -> String {
    format!("{}_{}_{}_{}", d.kind, d.operand1, d.operand2, d.style)
}
