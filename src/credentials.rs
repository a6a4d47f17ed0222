//! Broker credentials and client identity.
//!
//! Passwords are kept encrypted in the configuration and only decrypted right
//! before a handshake. The cipher is AES in CBC mode with PKCS#7 padding over a
//! base64 ciphertext; the key length picks AES-128, AES-192 or AES-256.

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, KeyIvInit};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::fmt;
use uuid::Uuid;

use crate::config::CipherConfig;

/// Key used by the deployed control system to encrypt stored broker passwords.
pub const DEFAULT_KEY: &str = "TRACRDBPasswordKey.TRACR";
/// IV paired with [`DEFAULT_KEY`], zero-extended to a full block.
pub const DEFAULT_IV: &str = "password";

const BLOCK_SIZE: usize = 16;

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("Password is not valid base64: {0}")]
    Encoding(#[from] base64::DecodeError),

    #[error("Unsupported key length {0}, expected 16, 24 or 32 bytes")]
    KeyLength(usize),

    #[error("IV is longer than one block ({0} bytes)")]
    IvLength(usize),

    #[error("Password could not be decrypted")]
    Cipher,

    #[error("Decrypted password is not UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Turns a stored password into the one presented to the broker.
pub trait Decrypt: Send + Sync {
    fn decrypt(&self, ciphertext: &str) -> Result<String, CredentialError>;
}

/// Passwords stored in clear text.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaintextPassword;

impl Decrypt for PlaintextPassword {
    fn decrypt(&self, ciphertext: &str) -> Result<String, CredentialError> {
        Ok(ciphertext.to_string())
    }
}

/// AES-CBC/PKCS#7 decryption of base64 encoded passwords.
#[derive(Clone)]
pub struct AesCbcDecryptor {
    key: Vec<u8>,
    iv: [u8; BLOCK_SIZE],
}

impl fmt::Debug for AesCbcDecryptor {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("AesCbcDecryptor")
            .field("key_bits", &(self.key.len() * 8))
            .finish_non_exhaustive()
    }
}

impl AesCbcDecryptor {
    pub fn new(key: &[u8], iv: &[u8]) -> Result<Self, CredentialError> {
        if !matches!(key.len(), 16 | 24 | 32) {
            return Err(CredentialError::KeyLength(key.len()));
        }
        if iv.len() > BLOCK_SIZE {
            return Err(CredentialError::IvLength(iv.len()));
        }

        let mut padded_iv = [0u8; BLOCK_SIZE];
        padded_iv[..iv.len()].copy_from_slice(iv);

        Ok(Self {
            key: key.to_vec(),
            iv: padded_iv,
        })
    }

    pub fn from_config(cipher: &CipherConfig) -> Result<Self, CredentialError> {
        Self::new(cipher.key.as_bytes(), cipher.iv.as_bytes())
    }

    /// Decryptor matching the passwords written by the deployed control system.
    pub fn deployment_default() -> Result<Self, CredentialError> {
        Self::new(DEFAULT_KEY.as_bytes(), DEFAULT_IV.as_bytes())
    }
}

macro_rules! cbc_decrypt {
    ($cipher:ty, $key:expr, $iv:expr, $buf:expr) => {
        cbc::Decryptor::<$cipher>::new_from_slices($key, $iv)
            .map_err(|_| CredentialError::KeyLength($key.len()))?
            .decrypt_padded_mut::<Pkcs7>($buf)
            .map_err(|_| CredentialError::Cipher)?
            .len()
    };
}

impl Decrypt for AesCbcDecryptor {
    fn decrypt(&self, ciphertext: &str) -> Result<String, CredentialError> {
        let mut buf = STANDARD.decode(ciphertext.trim())?;

        let plain_len = match self.key.len() {
            16 => cbc_decrypt!(aes::Aes128, &self.key, &self.iv, &mut buf),
            24 => cbc_decrypt!(aes::Aes192, &self.key, &self.iv, &mut buf),
            32 => cbc_decrypt!(aes::Aes256, &self.key, &self.iv, &mut buf),
            other => return Err(CredentialError::KeyLength(other)),
        };

        buf.truncate(plain_len);
        Ok(String::from_utf8(buf)?)
    }
}

/// Identity presented to the broker on every connect of this process.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientId(String);

impl ClientId {
    pub fn generate() -> Self {
        Self(format!("NCHS Sniffer {}", Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ClientId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aes::cipher::BlockEncryptMut;

    macro_rules! encrypt {
        ($cipher:ty, $key:expr, $iv:expr, $plain:expr) => {{
            let plain: &str = $plain;
            let mut full_iv = [0u8; BLOCK_SIZE];
            full_iv[..$iv.len()].copy_from_slice($iv);

            let mut buf = vec![0u8; plain.len() + BLOCK_SIZE];
            buf[..plain.len()].copy_from_slice(plain.as_bytes());
            let encrypted = cbc::Encryptor::<$cipher>::new_from_slices($key, &full_iv)
                .unwrap()
                .encrypt_padded_mut::<Pkcs7>(&mut buf, plain.len())
                .unwrap();
            STANDARD.encode(encrypted)
        }};
    }

    #[test]
    fn decrypts_deployment_passwords() {
        let stored = encrypt!(aes::Aes192, DEFAULT_KEY.as_bytes(), DEFAULT_IV.as_bytes(), "guest");
        let decryptor = AesCbcDecryptor::deployment_default().unwrap();

        assert_eq!(decryptor.decrypt(&stored).unwrap(), "guest");
    }

    #[test]
    fn key_length_selects_cipher() {
        let key = b"0123456789abcdef0123456789abcdef";
        let stored = encrypt!(
            aes::Aes256,
            key,
            b"iv",
            "a longer password than one block"
        );
        let decryptor = AesCbcDecryptor::new(key, b"iv").unwrap();

        assert_eq!(
            decryptor.decrypt(&stored).unwrap(),
            "a longer password than one block"
        );
    }

    #[test]
    fn rejects_bad_input() {
        assert!(matches!(
            AesCbcDecryptor::new(b"short", b"iv"),
            Err(CredentialError::KeyLength(5))
        ));
        assert!(matches!(
            AesCbcDecryptor::new(DEFAULT_KEY.as_bytes(), &[0u8; 17]),
            Err(CredentialError::IvLength(17))
        ));

        let decryptor = AesCbcDecryptor::deployment_default().unwrap();
        assert!(matches!(
            decryptor.decrypt("not base64!"),
            Err(CredentialError::Encoding(_))
        ));
        assert!(decryptor.decrypt(&STANDARD.encode([1u8; 5])).is_err());
    }

    #[test]
    fn plaintext_passes_through() {
        assert_eq!(PlaintextPassword.decrypt("guest").unwrap(), "guest");
    }

    #[test]
    fn client_ids_are_unique_and_prefixed() {
        let first = ClientId::generate();
        let second = ClientId::generate();

        assert!(first.as_str().starts_with("NCHS Sniffer "));
        assert_ne!(first, second);
    }
}
