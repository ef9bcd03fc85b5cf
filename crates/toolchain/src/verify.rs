//! Download verification.
//!
//! Release archives are checked against the `SHA256SUMS` file published with
//! each release, and that file is checked against its detached GPG signature.

use crate::error::{Error, Result};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Verify `data` against the digest listed for `filename` in a
/// `SHA256SUMS` file (`<hex digest>  <file name>` per line).
pub fn checksum(sums: &[u8], data: &[u8], filename: &str) -> Result<()> {
    let sums = String::from_utf8_lossy(sums);
    let expected = sums
        .lines()
        .find_map(|line| {
            let mut parts = line.split_whitespace();
            let digest = parts.next()?;
            (parts.next()? == filename).then(|| digest.to_lowercase())
        })
        .ok_or_else(|| Error::ChecksumNotFound(filename.to_string()))?;

    let actual = format!("{:x}", Sha256::digest(data));
    if actual != expected {
        return Err(Error::ChecksumMismatch {
            file: filename.to_string(),
            expected,
            actual,
        });
    }

    log::debug!("Checksum verified for {filename}");
    Ok(())
}

/// Detached signature verification.
pub trait Verifier: Send + Sync {
    /// Verify `signature` over `data`.
    fn verify(&self, data: &[u8], signature: &[u8]) -> Result<()>;
}

/// Verifies signatures with the `gpg` executable.
///
/// When a public key file is configured it is imported into the user
/// keyring before each verification.
#[derive(Debug, Clone, Default)]
pub struct GpgVerifier {
    public_key: Option<PathBuf>,
}

impl GpgVerifier {
    /// Create a verifier relying on keys already in the keyring.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a verifier importing `public_key` first.
    #[must_use]
    pub fn with_public_key(public_key: impl Into<PathBuf>) -> Self {
        Self {
            public_key: Some(public_key.into()),
        }
    }

    fn gpg(args: &[&Path]) -> Result<std::process::Output> {
        let gpg = which::which("gpg").map_err(|_| Error::ToolNotFound("gpg".to_string()))?;
        Command::new(&gpg)
            .args(args)
            .output()
            .map_err(|e| Error::io(&gpg, e))
    }
}

impl Verifier for GpgVerifier {
    fn verify(&self, data: &[u8], signature: &[u8]) -> Result<()> {
        if let Some(key) = &self.public_key {
            let output = Self::gpg(&[Path::new("--import"), key])?;
            if !output.status.success() {
                return Err(Error::InvalidSignature(format!(
                    "unable to import {}: {}",
                    key.display(),
                    String::from_utf8_lossy(&output.stderr).trim()
                )));
            }
        }

        let tmp = tempfile::tempdir().map_err(|e| Error::io(std::env::temp_dir(), e))?;
        let data_path = tmp.path().join("data");
        let signature_path = tmp.path().join("data.sig");
        fs::write(&data_path, data).map_err(|e| Error::io(&data_path, e))?;
        fs::write(&signature_path, signature).map_err(|e| Error::io(&signature_path, e))?;

        let output = Self::gpg(&[Path::new("--verify"), &signature_path, &data_path])?;
        if !output.status.success() {
            return Err(Error::InvalidSignature(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) struct AcceptAll;

#[cfg(test)]
impl Verifier for AcceptAll {
    fn verify(&self, _data: &[u8], _signature: &[u8]) -> Result<()> {
        Ok(())
    }
}
