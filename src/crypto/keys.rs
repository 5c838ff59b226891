//! RSA key pair generation and PEM persistence.
//!
//! Keys live in `<storage>/signing_keys/{private,public}.pem`. On first start
//! the pair is generated and written with owner-only permissions; subsequent
//! starts load the existing pair.

use crate::error::{Error, Result};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::{RsaPrivateKey, RsaPublicKey};
use std::fs;
use std::path::Path;
use tracing::info;

/// RSA modulus size for audit signing keys.
const KEY_BITS: usize = 2048;

/// Private key file name within the signing keys directory.
pub const PRIVATE_KEY_FILE: &str = "private.pem";
/// Public key file name within the signing keys directory.
pub const PUBLIC_KEY_FILE: &str = "public.pem";

/// An RSA signing key pair for audit logs.
pub struct SigningKeyPair {
    private: RsaPrivateKey,
    public: RsaPublicKey,
}

impl SigningKeyPair {
    /// Generate a fresh key pair.
    pub fn generate() -> Result<Self> {
        let mut rng = rand::thread_rng();
        let private = RsaPrivateKey::new(&mut rng, KEY_BITS)
            .map_err(|e| Error::crypto(format!("key generation failed: {}", e)))?;
        let public = RsaPublicKey::from(&private);
        Ok(Self { private, public })
    }

    /// Load a key pair from `dir`.
    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let private_pem = fs::read_to_string(dir.join(PRIVATE_KEY_FILE))?;
        let public_pem = fs::read_to_string(dir.join(PUBLIC_KEY_FILE))?;

        let private = RsaPrivateKey::from_pkcs8_pem(&private_pem)
            .map_err(|e| Error::crypto(format!("failed to parse private key: {}", e)))?;
        let public = RsaPublicKey::from_public_key_pem(&public_pem)
            .map_err(|e| Error::crypto(format!("failed to parse public key: {}", e)))?;

        Ok(Self { private, public })
    }

    /// Load the key pair from `dir`, generating and persisting one if absent.
    pub fn load_or_generate(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        if dir.join(PRIVATE_KEY_FILE).exists() && dir.join(PUBLIC_KEY_FILE).exists() {
            return Self::load(dir);
        }

        fs::create_dir_all(dir)?;
        let pair = Self::generate()?;
        pair.save(dir)?;
        info!("Generated new signing key pair in {}", dir.display());
        Ok(pair)
    }

    /// Persist both keys to `dir` with owner-only permissions.
    pub fn save(&self, dir: impl AsRef<Path>) -> Result<()> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let private_pem = self
            .private
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| Error::crypto(format!("failed to encode private key: {}", e)))?;
        let public_pem = self
            .public
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| Error::crypto(format!("failed to encode public key: {}", e)))?;

        let private_path = dir.join(PRIVATE_KEY_FILE);
        let public_path = dir.join(PUBLIC_KEY_FILE);
        fs::write(&private_path, private_pem.as_bytes())?;
        fs::write(&public_path, public_pem.as_bytes())?;
        restrict_permissions(&private_path)?;
        restrict_permissions(&public_path)?;

        Ok(())
    }

    /// Access the private key.
    pub fn private_key(&self) -> &RsaPrivateKey {
        &self.private
    }

    /// Access the public key.
    pub fn public_key(&self) -> &RsaPublicKey {
        &self.public
    }

    /// Split off a verify-only handle.
    pub fn verifying_handle(&self) -> VerifyingKeyHandle {
        VerifyingKeyHandle {
            public: self.public.clone(),
        }
    }
}

/// A verify-only key handle, safe to hand to validators.
#[derive(Clone)]
pub struct VerifyingKeyHandle {
    public: RsaPublicKey,
}

impl VerifyingKeyHandle {
    /// Load a public key from a PEM file.
    pub fn from_pem_file(path: impl AsRef<Path>) -> Result<Self> {
        let pem = fs::read_to_string(path)?;
        let public = RsaPublicKey::from_public_key_pem(&pem)
            .map_err(|e| Error::crypto(format!("failed to parse public key: {}", e)))?;
        Ok(Self { public })
    }

    /// Access the public key.
    pub fn public_key(&self) -> &RsaPublicKey {
        &self.public
    }
}

/// Set 0600 on POSIX; no-op elsewhere.
fn restrict_permissions(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = fs::metadata(path)?.permissions();
        perms.set_mode(0o600);
        fs::set_permissions(path, perms)?;
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_and_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let pair = SigningKeyPair::generate().unwrap();
        pair.save(dir.path()).unwrap();

        let loaded = SigningKeyPair::load(dir.path()).unwrap();
        assert_eq!(pair.public_key(), loaded.public_key());
    }

    #[test]
    fn test_load_or_generate_is_stable() {
        let dir = tempfile::tempdir().unwrap();
        let first = SigningKeyPair::load_or_generate(dir.path()).unwrap();
        let second = SigningKeyPair::load_or_generate(dir.path()).unwrap();
        assert_eq!(first.public_key(), second.public_key());
    }

    #[cfg(unix)]
    #[test]
    fn test_private_key_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        SigningKeyPair::load_or_generate(dir.path()).unwrap();

        let mode = fs::metadata(dir.path().join(PRIVATE_KEY_FILE))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
