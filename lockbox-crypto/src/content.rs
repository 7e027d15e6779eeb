//! Content encryption with a one-time AES-256-GCM key.
//!
//! Every call to [`encrypt_content`] generates a fresh content key and IV, so
//! an IV is never reused under the same key. The encrypted file body has the
//! fixed layout:
//!
//! ```text
//! [ iv: 12 bytes ][ auth_tag: 16 bytes ][ ciphertext: remainder ]
//! ```
//!
//! This layout is a compatibility boundary with previously encrypted files.

use crate::error::{CryptoError, CryptoResult};
use aes::Aes256;
use aes_gcm::aead::{AeadInPlace, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce, Tag};
use ctr::cipher::{KeyIvInit, StreamCipher};
use rand::rngs::OsRng;
use rand::RngCore;
use tracing::warn;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Content key size in bytes (AES-256).
pub const CONTENT_KEY_SIZE: usize = 32;
/// GCM IV size in bytes (96 bits).
pub const IV_SIZE: usize = 12;
/// GCM authentication tag size in bytes.
pub const AUTH_TAG_SIZE: usize = 16;

/// GCM keystream: AES-256-CTR with a 32-bit big-endian block counter.
type Aes256Ctr32 = ctr::Ctr32BE<Aes256>;

/// One-time symmetric key for a single file body. Zeroized on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct ContentKey([u8; CONTENT_KEY_SIZE]);

impl ContentKey {
    /// Generates a uniformly random content key.
    pub fn generate() -> Self {
        let mut bytes = [0u8; CONTENT_KEY_SIZE];
        OsRng.fill_bytes(&mut bytes);
        let key = Self(bytes);
        bytes.zeroize();
        key
    }

    pub fn from_slice(bytes: &[u8]) -> CryptoResult<Self> {
        if bytes.len() != CONTENT_KEY_SIZE {
            return Err(CryptoError::InvalidKeyLength {
                expected: CONTENT_KEY_SIZE,
                actual: bytes.len(),
            });
        }
        let mut buf = [0u8; CONTENT_KEY_SIZE];
        buf.copy_from_slice(bytes);
        let key = Self(buf);
        buf.zeroize();
        Ok(key)
    }

    pub fn as_bytes(&self) -> &[u8; CONTENT_KEY_SIZE] {
        &self.0
    }
}

impl std::fmt::Debug for ContentKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ContentKey(<redacted>)")
    }
}

/// Whether the GCM tag must verify before plaintext is returned.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TagPolicy {
    #[default]
    Verify,
    /// Degraded recovery of damaged files. Every use is logged.
    Bypass,
}

/// An encrypted file body: IV, detached tag, and ciphertext.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnvelopeCiphertext {
    pub iv: [u8; IV_SIZE],
    pub auth_tag: [u8; AUTH_TAG_SIZE],
    pub ciphertext: Vec<u8>,
}

impl EnvelopeCiphertext {
    /// Minimum length of a serialized body (empty plaintext).
    pub const HEADER_SIZE: usize = IV_SIZE + AUTH_TAG_SIZE;

    /// Serializes to `iv ‖ auth_tag ‖ ciphertext`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(Self::HEADER_SIZE + self.ciphertext.len());
        out.extend_from_slice(&self.iv);
        out.extend_from_slice(&self.auth_tag);
        out.extend_from_slice(&self.ciphertext);
        out
    }

    /// Parses `iv ‖ auth_tag ‖ ciphertext`.
    pub fn from_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        if bytes.len() < Self::HEADER_SIZE {
            return Err(CryptoError::MalformedCiphertext(format!(
                "encrypted body is {} bytes, need at least {}",
                bytes.len(),
                Self::HEADER_SIZE
            )));
        }

        let mut iv = [0u8; IV_SIZE];
        iv.copy_from_slice(&bytes[..IV_SIZE]);
        let mut auth_tag = [0u8; AUTH_TAG_SIZE];
        auth_tag.copy_from_slice(&bytes[IV_SIZE..Self::HEADER_SIZE]);

        Ok(Self {
            iv,
            auth_tag,
            ciphertext: bytes[Self::HEADER_SIZE..].to_vec(),
        })
    }
}

/// Encrypts a file body under a freshly generated content key and IV.
///
/// Returns the content key so the caller can wrap it; it must not outlive
/// the surrounding operation.
pub fn encrypt_content(plaintext: &[u8]) -> CryptoResult<(ContentKey, EnvelopeCiphertext)> {
    let key = ContentKey::generate();

    let mut iv = [0u8; IV_SIZE];
    OsRng.fill_bytes(&mut iv);

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));
    let mut buffer = plaintext.to_vec();
    let tag = cipher
        .encrypt_in_place_detached(Nonce::from_slice(&iv), b"", &mut buffer)
        .map_err(|e| CryptoError::Encryption(format!("content encryption failed: {e}")))?;

    let mut auth_tag = [0u8; AUTH_TAG_SIZE];
    auth_tag.copy_from_slice(tag.as_slice());

    Ok((
        key,
        EnvelopeCiphertext {
            iv,
            auth_tag,
            ciphertext: buffer,
        },
    ))
}

/// Decrypts a file body.
///
/// With [`TagPolicy::Verify`] a tag mismatch fails with
/// [`CryptoError::AuthenticationFailed`] and no bytes are released.
pub fn decrypt_content(
    key: &ContentKey,
    envelope: &EnvelopeCiphertext,
    policy: TagPolicy,
) -> CryptoResult<Vec<u8>> {
    let mut buffer = envelope.ciphertext.clone();

    match policy {
        TagPolicy::Verify => {
            let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));
            cipher
                .decrypt_in_place_detached(
                    Nonce::from_slice(&envelope.iv),
                    b"",
                    &mut buffer,
                    Tag::from_slice(&envelope.auth_tag),
                )
                .map_err(|_| CryptoError::AuthenticationFailed)?;
        }
        TagPolicy::Bypass => {
            warn!(
                bytes = envelope.ciphertext.len(),
                "decrypting file body WITHOUT authentication tag check"
            );
            // GCM encrypts the payload starting at counter block J0 + 1 = IV ‖ 0x00000002.
            let mut counter_block = [0u8; 16];
            counter_block[..IV_SIZE].copy_from_slice(&envelope.iv);
            counter_block[15] = 2;
            let mut keystream = Aes256Ctr32::new_from_slices(key.as_bytes(), &counter_block)
                .map_err(|e| CryptoError::Decryption(format!("keystream init failed: {e}")))?;
            keystream.apply_keystream(&mut buffer);
        }
    }

    Ok(buffer)
}
