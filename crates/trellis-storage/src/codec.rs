use std::fmt;

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::{
    config::StorageConfig,
    error::{codec_err, StorageError},
};

/// Turns JSON values into the text handed to a driver and back.
///
/// `Plain` is bare JSON. `Sealed` is AES-256-GCM keyed by the SHA-256 digest of
/// the configured secret, with a fresh nonce per write.
#[derive(Clone)]
pub enum Codec {
    Plain,
    Sealed(Box<Aes256Gcm>),
}

#[derive(Debug, Serialize, Deserialize)]
struct SealedBlob {
    nonce: String,
    ciphertext: String,
}

impl Codec {
    pub fn from_config(config: &StorageConfig) -> Result<Self, StorageError> {
        match (&config.encrypted, &config.encryption_key) {
            (true, Some(secret)) => Self::sealed(secret),
            _ => Ok(Codec::Plain),
        }
    }

    pub fn sealed(secret: &str) -> Result<Self, StorageError> {
        let digest = Sha256::digest(secret.as_bytes());
        let cipher = Aes256Gcm::new_from_slice(digest.as_slice())
            .map_err(|e| codec_err(format!("cipher init failed: {e}")))?;
        Ok(Codec::Sealed(Box::new(cipher)))
    }

    pub fn is_encrypted(&self) -> bool {
        matches!(self, Codec::Sealed(_))
    }

    pub fn encode(&self, value: &Value) -> Result<String, StorageError> {
        let json = serde_json::to_string(value).map_err(codec_err)?;
        let cipher = match self {
            Codec::Plain => return Ok(json),
            Codec::Sealed(cipher) => cipher,
        };

        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = cipher
            .encrypt(&nonce, json.as_bytes())
            .map_err(|e| codec_err(format!("encrypt failed: {e}")))?;

        let blob = SealedBlob {
            nonce: URL_SAFE_NO_PAD.encode(nonce.as_slice()),
            ciphertext: URL_SAFE_NO_PAD.encode(ciphertext),
        };
        serde_json::to_string(&blob).map_err(codec_err)
    }

    pub fn decode(&self, text: &str) -> Result<Value, StorageError> {
        let cipher = match self {
            Codec::Plain => return serde_json::from_str(text).map_err(codec_err),
            Codec::Sealed(cipher) => cipher,
        };

        let blob: SealedBlob = serde_json::from_str(text)
            .map_err(|e| codec_err(format!("sealed blob malformed: {e}")))?;
        let nonce_bytes = URL_SAFE_NO_PAD
            .decode(blob.nonce)
            .map_err(|e| codec_err(format!("nonce decode failed: {e}")))?;
        if nonce_bytes.len() != 12 {
            return Err(codec_err(format!(
                "expected 12 nonce bytes, got {}",
                nonce_bytes.len()
            )));
        }
        let ciphertext = URL_SAFE_NO_PAD
            .decode(blob.ciphertext)
            .map_err(|e| codec_err(format!("ciphertext decode failed: {e}")))?;

        let plaintext = cipher
            .decrypt(Nonce::from_slice(&nonce_bytes), ciphertext.as_ref())
            .map_err(|e| codec_err(format!("decrypt failed: {e}")))?;
        serde_json::from_slice(&plaintext).map_err(codec_err)
    }
}

impl fmt::Debug for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Codec::Plain => f.write_str("Codec::Plain"),
            Codec::Sealed(_) => f.write_str("Codec::Sealed(..)"),
        }
    }
}
