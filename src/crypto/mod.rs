//! Cryptographic primitives for document integrity and audit trails.
//!
//! - **hash**: SHA-256 of byte slices and chunked file reads
//! - **keys**: RSA key pair generation and PEM persistence
//! - **sign**: deterministic RSA signatures over content hashes

pub mod hash;
pub mod keys;
pub mod sign;

pub use hash::{secure_bytes, secure_id, sha256_bytes, sha256_file};
pub use keys::{SigningKeyPair, VerifyingKeyHandle};
pub use sign::{sign_content_hash, verify_content_hash};
