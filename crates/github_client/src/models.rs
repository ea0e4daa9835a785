//! Wire models shared by the channel implementations.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::errors::Error;

#[cfg(test)]
#[path = "models_tests.rs"]
mod tests;

/// Public key GitHub hands out for encrypting Actions secrets.
///
/// Returned by the `actions/secrets/public-key` endpoints at both the
/// organization and repository scope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActionsPublicKey {
    /// Identifier echoed back when storing a secret.
    pub key_id: String,
    /// Base64-encoded X25519 public key.
    pub key: String,
}

impl ActionsPublicKey {
    /// Seals a plaintext secret value for upload.
    ///
    /// GitHub requires secret values to be encrypted with a libsodium sealed
    /// box against this key before they are PUT to the API; the result is
    /// base64-encoded.
    pub fn seal(&self, plaintext: &str) -> Result<String, Error> {
        let key_bytes = BASE64
            .decode(&self.key)
            .map_err(|e| Error::InvalidResponse(format!("public key is not base64: {e}")))?;
        let key_array: [u8; 32] = key_bytes.as_slice().try_into().map_err(|_| {
            Error::InvalidResponse(format!(
                "public key has {} bytes, expected 32",
                key_bytes.len()
            ))
        })?;
        let public_key = crypto_box::PublicKey::from(key_array);
        let sealed = public_key
            .seal(&mut crypto_box::aead::OsRng, plaintext.as_bytes())
            .map_err(|e| Error::ApiError(format!("sealing secret value failed: {e}")))?;
        Ok(BASE64.encode(sealed))
    }
}

/// Summary of a repository security advisory, as listed at the
/// organization scope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SecurityAdvisory {
    pub ghsa_id: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub severity: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub published_at: Option<String>,
}
