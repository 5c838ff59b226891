//! Secure temp files and directories.

use crate::crypto::{secure_bytes, secure_id};
use crate::error::{Error, Result};
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::warn;

/// AES-GCM nonce length in bytes.
const NONCE_LEN: usize = 12;

/// A temp file with owner-only permissions and secure deletion on drop.
///
/// When created with [`SecureTempFile::encrypted_in`], writes are sealed with
/// AES-256-GCM under a per-file random key; the nonce is stored as a prefix
/// of the on-disk payload. The key never leaves the process.
pub struct SecureTempFile {
    path: PathBuf,
    cipher: Option<Aes256Gcm>,
    removed: bool,
}

impl SecureTempFile {
    /// Create a plaintext temp file inside `dir`.
    pub fn create_in(dir: impl AsRef<Path>) -> Result<Self> {
        Self::new_in(dir, None)
    }

    /// Create a temp file whose contents are encrypted at rest.
    pub fn encrypted_in(dir: impl AsRef<Path>) -> Result<Self> {
        let key_bytes = secure_bytes(32);
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key_bytes));
        Self::new_in(dir, Some(cipher))
    }

    fn new_in(dir: impl AsRef<Path>, cipher: Option<Aes256Gcm>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let path = dir.join(format!("vtmp_{}", secure_id()));
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)?;
        restrict_file_permissions(&file)?;

        Ok(Self {
            path,
            cipher,
            removed: false,
        })
    }

    /// Path of the temp file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the file contents.
    pub fn write(&self, data: &[u8]) -> Result<()> {
        let payload = match &self.cipher {
            Some(cipher) => {
                let nonce_bytes = secure_bytes(NONCE_LEN);
                let nonce = Nonce::from_slice(&nonce_bytes);
                let mut sealed = cipher
                    .encrypt(nonce, data)
                    .map_err(|e| Error::crypto(format!("temp file encryption failed: {}", e)))?;
                let mut payload = nonce_bytes;
                payload.append(&mut sealed);
                payload
            }
            None => data.to_vec(),
        };
        fs::write(&self.path, payload)?;
        Ok(())
    }

    /// Read the full file contents, decrypting if the file is encrypted.
    pub fn read_all(&self) -> Result<Vec<u8>> {
        let mut raw = Vec::new();
        File::open(&self.path)?.read_to_end(&mut raw)?;

        match &self.cipher {
            Some(cipher) => {
                if raw.len() < NONCE_LEN {
                    return Err(Error::crypto("encrypted temp file truncated".to_string()));
                }
                let (nonce_bytes, sealed) = raw.split_at(NONCE_LEN);
                cipher
                    .decrypt(Nonce::from_slice(nonce_bytes), sealed)
                    .map_err(|e| Error::crypto(format!("temp file decryption failed: {}", e)))
            }
            None => Ok(raw),
        }
    }

    /// Overwrite with random bytes and remove. Called automatically on drop.
    pub fn shred(&mut self) -> Result<()> {
        if self.removed {
            return Ok(());
        }
        shred_file(&self.path)?;
        self.removed = true;
        Ok(())
    }
}

impl Drop for SecureTempFile {
    fn drop(&mut self) {
        if let Err(e) = self.shred() {
            warn!("Failed to securely remove temp file {}: {}", self.path.display(), e);
        }
    }
}

/// A 0700 temp directory that securely deletes its contents on drop.
pub struct SecureTempDir {
    path: PathBuf,
    removed: bool,
}

impl SecureTempDir {
    /// Create a fresh scope directory under `parent`.
    pub fn create_in(parent: impl AsRef<Path>) -> Result<Self> {
        let parent = parent.as_ref();
        fs::create_dir_all(parent)?;

        let path = parent.join(format!("vscope_{}", secure_id()));
        fs::create_dir(&path)?;
        restrict_dir_permissions(&path)?;

        Ok(Self {
            path,
            removed: false,
        })
    }

    /// Path of the scope directory.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create a plaintext temp file inside this scope.
    pub fn create_file(&self) -> Result<SecureTempFile> {
        SecureTempFile::create_in(&self.path)
    }

    /// Create an encrypted temp file inside this scope.
    pub fn create_encrypted_file(&self) -> Result<SecureTempFile> {
        SecureTempFile::encrypted_in(&self.path)
    }

    /// Recursively shred and remove the scope. Called automatically on drop.
    pub fn shred(&mut self) -> Result<()> {
        if self.removed {
            return Ok(());
        }
        for entry in walkdir::WalkDir::new(&self.path)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if entry.file_type().is_file() {
                shred_file(entry.path())?;
            }
        }
        fs::remove_dir_all(&self.path)?;
        self.removed = true;
        Ok(())
    }
}

impl Drop for SecureTempDir {
    fn drop(&mut self) {
        if let Err(e) = self.shred() {
            warn!("Failed to securely remove temp dir {}: {}", self.path.display(), e);
        }
    }
}

/// Overwrite a file with random bytes of the same length, then unlink it.
fn shred_file(path: &Path) -> Result<()> {
    if !path.exists() {
        return Ok(());
    }
    let len = fs::metadata(path)?.len() as usize;
    if len > 0 {
        let noise = secure_bytes(len);
        let mut file = OpenOptions::new().write(true).open(path)?;
        file.write_all(&noise)?;
        file.sync_all()?;
    }
    fs::remove_file(path)?;
    Ok(())
}

fn restrict_file_permissions(file: &File) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = file.metadata()?.permissions();
        perms.set_mode(0o600);
        file.set_permissions(perms)?;
    }
    #[cfg(not(unix))]
    {
        let _ = file;
    }
    Ok(())
}

fn restrict_dir_permissions(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = fs::metadata(path)?.permissions();
        perms.set_mode(0o700);
        fs::set_permissions(path, perms)?;
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
    Ok(())
}
