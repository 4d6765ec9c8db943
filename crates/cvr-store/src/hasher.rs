use cvr_types::ContentHash;

/// Domain-separated BLAKE3 content hasher.
///
/// Each hasher carries a domain tag that is prepended to every hash
/// computation, so a payload and a record with identical bytes never
/// produce the same hash.
pub struct ContentHasher {
    domain: &'static str,
}

impl ContentHasher {
    /// Hasher for contract payloads.
    pub const PAYLOAD: Self = Self {
        domain: "cvr-payload-v1",
    };
    /// Hasher for deployment record integrity hashes.
    pub const RECORD: Self = Self {
        domain: "cvr-record-v1",
    };

    /// Hash raw bytes with domain separation.
    pub fn hash(&self, data: &[u8]) -> ContentHash {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.domain.as_bytes());
        hasher.update(b":");
        hasher.update(data);
        ContentHash::from_hash(*hasher.finalize().as_bytes())
    }

    /// Verify that data produces the expected hash.
    pub fn verify(&self, data: &[u8], expected: &ContentHash) -> bool {
        self.hash(data) == *expected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic() {
        let data = b"contract bytecode";
        assert_eq!(
            ContentHasher::PAYLOAD.hash(data),
            ContentHasher::PAYLOAD.hash(data)
        );
    }

    #[test]
    fn different_domains_produce_different_hashes() {
        let data = b"same content";
        assert_ne!(
            ContentHasher::PAYLOAD.hash(data),
            ContentHasher::RECORD.hash(data)
        );
    }

    #[test]
    fn verify_correct_and_tampered() {
        let id = ContentHasher::PAYLOAD.hash(b"original");
        assert!(ContentHasher::PAYLOAD.verify(b"original", &id));
        assert!(!ContentHasher::PAYLOAD.verify(b"tampered", &id));
    }
}
