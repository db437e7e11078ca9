use digest::Digest;
use md5::Md5;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VerificationError {
    #[error("Verification failed: expected {}, got {}",
        hex::encode(.expected),
        hex::encode(.actual)
    )]
    VerificationFailed { expected: Vec<u8>, actual: Vec<u8> },

    #[error("Invalid {kind:?} digest {value:?}: {reason}")]
    InvalidDigest {
        kind: ChecksumKind,
        value: String,
        reason: String,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChecksumKind {
    Md5,
    Sha256,
}

impl ChecksumKind {
    fn digest_len(self) -> usize {
        match self {
            ChecksumKind::Md5 => 16,
            ChecksumKind::Sha256 => 32,
        }
    }
}

/// An expected digest as carried by a depot manifest entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "algorithm", content = "value", rename_all = "lowercase")]
pub enum ContentDigest {
    Md5(#[serde(with = "hex::serde")] Vec<u8>),
    Sha256(#[serde(with = "hex::serde")] Vec<u8>),
}

impl ContentDigest {
    pub fn from_hex_digest(kind: ChecksumKind, value: &str) -> Result<Self, VerificationError> {
        let bytes = hex::decode(value).map_err(|e| VerificationError::InvalidDigest {
            kind,
            value: value.to_string(),
            reason: e.to_string(),
        })?;
        if bytes.len() != kind.digest_len() {
            return Err(VerificationError::InvalidDigest {
                kind,
                value: value.to_string(),
                reason: format!("expected {} bytes, got {}", kind.digest_len(), bytes.len()),
            });
        }
        Ok(match kind {
            ChecksumKind::Md5 => ContentDigest::Md5(bytes),
            ChecksumKind::Sha256 => ContentDigest::Sha256(bytes),
        })
    }

    pub fn kind(&self) -> ChecksumKind {
        match self {
            ContentDigest::Md5(_) => ChecksumKind::Md5,
            ContentDigest::Sha256(_) => ChecksumKind::Sha256,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            ContentDigest::Md5(bytes) | ContentDigest::Sha256(bytes) => bytes,
        }
    }

    pub fn digest_hex(&self) -> String {
        hex::encode(self.as_bytes())
    }
}

enum ContentDigestHasher {
    Md5(Md5),
    Sha256(Sha256),
}

pub struct ContentDigestVerifier {
    hasher: ContentDigestHasher,
    expected_digest: Vec<u8>,
}

impl ContentDigestVerifier {
    #[inline]
    pub fn new(content_digest: &ContentDigest) -> Self {
        match content_digest {
            ContentDigest::Md5(expected_digest) => Self {
                hasher: ContentDigestHasher::Md5(Md5::new()),
                expected_digest: expected_digest.clone(),
            },
            ContentDigest::Sha256(expected_digest) => Self {
                hasher: ContentDigestHasher::Sha256(Sha256::new()),
                expected_digest: expected_digest.clone(),
            },
        }
    }

    #[inline]
    pub fn update(&mut self, data: impl AsRef<[u8]>) {
        match &mut self.hasher {
            ContentDigestHasher::Md5(digest) => Digest::update(digest, data.as_ref()),
            ContentDigestHasher::Sha256(digest) => Digest::update(digest, data.as_ref()),
        };
    }

    pub fn verify(self) -> Result<(), VerificationError> {
        let actual_digest = match self.hasher {
            ContentDigestHasher::Md5(digest) => digest.finalize().to_vec(),
            ContentDigestHasher::Sha256(digest) => digest.finalize().to_vec(),
        };

        if actual_digest == self.expected_digest {
            Ok(())
        } else {
            Err(VerificationError::VerificationFailed {
                expected: self.expected_digest,
                actual: actual_digest,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HELLO_MD5: &str = "5d41402abc4b2a76b9719d911017c592";
    const HELLO_SHA256: &str = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";

    #[test]
    fn test_md5_verifier_accepts_matching_content() {
        let digest = ContentDigest::from_hex_digest(ChecksumKind::Md5, HELLO_MD5).unwrap();
        let mut verifier = ContentDigestVerifier::new(&digest);
        verifier.update(b"hel");
        verifier.update(b"lo");
        assert!(verifier.verify().is_ok());
    }

    #[test]
    fn test_sha256_verifier_rejects_other_content() {
        let digest = ContentDigest::from_hex_digest(ChecksumKind::Sha256, HELLO_SHA256).unwrap();
        let mut verifier = ContentDigestVerifier::new(&digest);
        verifier.update(b"hello!");
        let err = verifier.verify().unwrap_err();
        assert!(err.to_string().contains(HELLO_SHA256));
    }

    #[test]
    fn test_from_hex_digest_rejects_wrong_length() {
        let result = ContentDigest::from_hex_digest(ChecksumKind::Sha256, HELLO_MD5);
        assert!(matches!(
            result,
            Err(VerificationError::InvalidDigest { .. })
        ));
    }

    #[test]
    fn test_digest_serde_representation() {
        let digest = ContentDigest::from_hex_digest(ChecksumKind::Md5, HELLO_MD5).unwrap();
        let json = serde_json::to_value(&digest).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "algorithm": "md5", "value": HELLO_MD5 })
        );
        let parsed: ContentDigest = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, digest);
        assert_eq!(parsed.kind(), ChecksumKind::Md5);
    }
}
