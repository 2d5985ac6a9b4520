//! eWeLink LAN payload encryption and decryption.
//! AES-128-CBC with PKCS#7 padding, keyed by the MD5 digest of the device key.

use crate::error::{Result, SonoffError};
use aes::Aes128;
use base64::{Engine as _, engine::general_purpose};
use cbc::{Decryptor, Encryptor};
use cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, block_padding::Pkcs7};
use md5::{Digest, Md5};
use rand::RngCore;

pub const IV_LEN: usize = 16;

/// LanCipher holds the 16-byte AES key derived from a device key.
#[derive(Clone)]
pub struct LanCipher {
    /// MD5(device key)
    key: [u8; 16],
}

impl LanCipher {
    /// Derive the cipher key from the raw device key.
    pub fn new(device_key: &str) -> Self {
        let digest = Md5::digest(device_key.as_bytes());
        let mut key = [0u8; 16];
        key.copy_from_slice(&digest);
        Self { key }
    }

    /// Encrypt raw bytes with the given 16-byte IV.
    pub fn encrypt(&self, data: &[u8], iv: &[u8]) -> Result<Vec<u8>> {
        let encryptor = Encryptor::<Aes128>::new_from_slices(&self.key, iv)
            .map_err(|_| SonoffError::EncryptionFailed)?;
        Ok(encryptor.encrypt_padded_vec_mut::<Pkcs7>(data))
    }

    /// Decrypt raw bytes with the given 16-byte IV and strip the padding.
    pub fn decrypt(&self, data: &[u8], iv: &[u8]) -> Result<Vec<u8>> {
        if data.is_empty() || data.len() % 16 != 0 {
            return Err(SonoffError::DecryptionFailed);
        }
        let decryptor = Decryptor::<Aes128>::new_from_slices(&self.key, iv)
            .map_err(|_| SonoffError::DecryptionFailed)?;
        decryptor
            .decrypt_padded_vec_mut::<Pkcs7>(data)
            .map_err(|_| SonoffError::DecryptionFailed)
    }
}

/// Encrypt `plaintext` and return it base64 encoded. `iv` is base64 encoded.
pub fn encrypt_message(plaintext: &[u8], key: &str, iv: &str) -> Result<String> {
    let iv_bytes = decode_iv(iv).map_err(|_| SonoffError::EncryptionFailed)?;
    let encrypted = LanCipher::new(key).encrypt(plaintext, &iv_bytes)?;
    Ok(general_purpose::STANDARD.encode(encrypted))
}

/// Decrypt a base64 encoded ciphertext. `iv` is base64 encoded.
pub fn decrypt_message(ciphertext: &str, key: &str, iv: &str) -> Result<Vec<u8>> {
    let iv_bytes = decode_iv(iv).map_err(|_| SonoffError::DecryptionFailed)?;
    let data = general_purpose::STANDARD
        .decode(ciphertext.trim())
        .map_err(|_| SonoffError::DecryptionFailed)?;
    LanCipher::new(key).decrypt(&data, &iv_bytes)
}

/// Fresh random IV for an outgoing LAN request.
pub fn generate_iv() -> [u8; IV_LEN] {
    let mut iv = [0u8; IV_LEN];
    rand::rng().fill_bytes(&mut iv);
    iv
}

pub fn encode_iv(iv: &[u8]) -> String {
    general_purpose::STANDARD.encode(iv)
}

fn decode_iv(iv: &str) -> Result<Vec<u8>> {
    let bytes = general_purpose::STANDARD
        .decode(iv.trim())
        .map_err(|e| SonoffError::DecodeError(format!("Invalid iv: {}", e)))?;
    if bytes.len() != IV_LEN {
        return Err(SonoffError::DecodeError(format!(
            "Invalid iv length: {}",
            bytes.len()
        )));
    }
    Ok(bytes)
}
