use sha2::{Digest, Sha256};
use std::fmt::Display;

/// A SHA-256 digest, stored raw and rendered as lowercase hex.
///
/// Invariant 3 of the data model: chunk digests are SHA-256 of the chunk
/// bytes, and the file digest is SHA-256 of the concatenated original bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Sha256Digest([u8; 32]);

impl Sha256Digest {
    pub fn compute(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        Self(hasher.finalize().into())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, DigestParseError> {
        let bytes = hex::decode(s).map_err(|_| DigestParseError)?;
        let arr: [u8; 32] = bytes.try_into().map_err(|_| DigestParseError)?;
        Ok(Self(arr))
    }
}

impl std::fmt::Debug for Sha256Digest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Sha256Digest({})", self.to_hex())
    }
}

impl Display for Sha256Digest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("malformed sha-256 digest")]
pub struct DigestParseError;

/// Incrementally hashes a stream of chunk payloads to produce the whole-file
/// digest without buffering the file.
#[derive(Default)]
pub struct FileDigestAccumulator {
    hasher: Sha256,
}

impl FileDigestAccumulator {
    pub fn new() -> Self {
        Self {
            hasher: Sha256::new(),
        }
    }

    pub fn update(&mut self, bytes: &[u8]) {
        self.hasher.update(bytes);
    }

    pub fn finish(self) -> Sha256Digest {
        Sha256Digest(self.hasher.finalize().into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_hex_round_trips() {
        let d = Sha256Digest::compute(b"hello world");
        let hex = d.to_hex();
        let parsed = Sha256Digest::from_hex(&hex).unwrap();
        assert_eq!(d, parsed);
    }

    #[test]
    fn accumulator_matches_one_shot_digest_of_concatenation() {
        let mut acc = FileDigestAccumulator::new();
        acc.update(b"hello ");
        acc.update(b"world");
        let incremental = acc.finish();

        let one_shot = Sha256Digest::compute(b"hello world");
        assert_eq!(incremental, one_shot);
    }

    #[test]
    fn known_vector() {
        // sha256("") == e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855
        let d = Sha256Digest::compute(b"");
        assert_eq!(
            d.to_hex(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
