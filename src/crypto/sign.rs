//! Deterministic RSA signatures over content hashes.
//!
//! The audit logger signs the SHA-256 content hash of each record, not the
//! record bytes themselves, so that signing is idempotent: re-signing an
//! unchanged record under the same key yields identical signature bytes.
//! PKCS#1 v1.5 padding is used because it is deterministic; randomized-salt
//! schemes would produce a different signature on every call.

use crate::error::{Error, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rsa::{Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};

/// Sign a content hash, returning a base64-encoded signature.
pub fn sign_content_hash(private_key: &RsaPrivateKey, content_hash: &str) -> Result<String> {
    let digest = Sha256::digest(content_hash.as_bytes());
    let signature = private_key
        .sign(Pkcs1v15Sign::new::<Sha256>(), &digest)
        .map_err(|e| Error::crypto(format!("signing failed: {}", e)))?;
    Ok(BASE64.encode(signature))
}

/// Verify a base64-encoded signature against a content hash.
///
/// Returns `Ok(false)` for a well-formed but non-matching signature and
/// `Err` only for malformed input (bad base64).
pub fn verify_content_hash(
    public_key: &RsaPublicKey,
    content_hash: &str,
    signature_b64: &str,
) -> Result<bool> {
    let signature = BASE64
        .decode(signature_b64)
        .map_err(|e| Error::crypto(format!("invalid signature encoding: {}", e)))?;
    let digest = Sha256::digest(content_hash.as_bytes());

    Ok(public_key
        .verify(Pkcs1v15Sign::new::<Sha256>(), &digest, &signature)
        .is_ok())
}
