//! Cryptographic primitives used by RPKI.
//!
//! All actual cryptography is provided by *ring*. This module only wraps
//! the algorithm identifiers and value types RPKI uses.

pub use self::digest::{sha1_digest, verify_sha256, Digest, DigestAlgorithm};
pub use self::keys::{
    KeyIdentifier, PublicKey, PublicKeyFormat, SignatureVerificationError
};
pub use self::signature::RpkiSignatureAlgorithm;

pub mod digest;
pub mod keys;
pub mod signature;
