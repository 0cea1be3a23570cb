//! Cache key generation: one fingerprint per distinct request.

use sha2::{Digest, Sha256};
use std::fmt;

/// A content-addressed cache key derived from the full request shape.
///
/// Two requests share a fingerprint exactly when method, URL, query parameters
/// and body all match; parameter order does not matter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestFingerprint {
    prefix: String,
    digest: String,
}

impl RequestFingerprint {
    pub fn new(
        prefix: &str,
        method: &str,
        url: &str,
        params: &[(String, String)],
        body: Option<&[u8]>,
    ) -> Self {
        let mut sorted: Vec<&(String, String)> = params.iter().collect();
        sorted.sort();

        let mut hasher = Sha256::new();
        hasher.update(method.to_uppercase().as_bytes());
        hasher.update(b"\n");
        hasher.update(url.as_bytes());
        hasher.update(b"\n");
        for (key, value) in sorted {
            hasher.update(key.as_bytes());
            hasher.update(b"=");
            hasher.update(value.as_bytes());
            hasher.update(b"&");
        }
        if let Some(body) = body {
            hasher.update(b"\n");
            hasher.update(body);
        }

        Self {
            prefix: prefix.replace('/', "_"),
            digest: hex::encode(hasher.finalize()),
        }
    }

    /// File name for the cached payload under the cache directory.
    pub fn file_name(&self) -> String {
        format!("{}_{}.json", self.prefix, self.digest)
    }
}

impl fmt::Display for RequestFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.prefix, self.digest)
    }
}
