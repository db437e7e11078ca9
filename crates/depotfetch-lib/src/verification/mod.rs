pub mod content_digest_hasher;
mod file_hash;

pub use content_digest_hasher::{
    ChecksumKind, ContentDigest, ContentDigestVerifier, VerificationError,
};
pub use file_hash::file_matches;
