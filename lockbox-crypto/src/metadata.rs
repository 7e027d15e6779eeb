//! Outer envelope around a serialized wrapped key.
//!
//! The wrapped-key JSON is encrypted with AES-256-CBC under a random key, and
//! that key is stored right next to the ciphertext:
//!
//! ```text
//! {"key":"<base64 32 bytes>","iv":"<base64 16 bytes>","data":"<base64 ciphertext>"}
//! ```
//!
//! This is obfuscation, not protection: anyone holding the record can open
//! it. Confidentiality of the content key rests entirely on the ECIES wrap.
//!
//! Records written before the envelope existed hold the raw wrapped-key JSON.
//! [`decode_stored_key`] accepts both forms.

use crate::error::{CryptoError, CryptoResult};
use crate::wrap::WrappedKey;
use aes::Aes256;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

const ENVELOPE_KEY_SIZE: usize = 32;
const ENVELOPE_IV_SIZE: usize = 16;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// The `{key, iv, data}` obfuscation envelope. All fields are standard base64.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataEnvelope {
    pub key: String,
    pub iv: String,
    pub data: String,
}

impl MetadataEnvelope {
    pub fn to_json(&self) -> CryptoResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> CryptoResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| CryptoError::MalformedCiphertext(format!("metadata envelope json: {e}")))
    }
}

/// The two shapes a stored `encryptedKey` field can take.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoredKey {
    Envelope(MetadataEnvelope),
    Raw(WrappedKey),
}

impl StoredKey {
    /// Classifies a stored value. A JSON object with a `key` member is an
    /// envelope; anything else must be a raw wrapped key.
    pub fn parse(stored: &str) -> CryptoResult<Self> {
        let value: serde_json::Value = serde_json::from_str(stored)
            .map_err(|e| CryptoError::MalformedCiphertext(format!("stored key json: {e}")))?;

        let is_envelope = value
            .as_object()
            .is_some_and(|obj| obj.contains_key("key"));

        if is_envelope {
            serde_json::from_value(value)
                .map(StoredKey::Envelope)
                .map_err(|e| CryptoError::MalformedCiphertext(format!("metadata envelope: {e}")))
        } else {
            serde_json::from_value(value)
                .map(StoredKey::Raw)
                .map_err(|e| CryptoError::MalformedCiphertext(format!("wrapped key: {e}")))
        }
    }

    /// Resolves to the inner wrapped key, opening the envelope if present.
    pub fn into_wrapped(self) -> CryptoResult<WrappedKey> {
        match self {
            StoredKey::Raw(wrapped) => Ok(wrapped),
            StoredKey::Envelope(envelope) => {
                let inner = unwrap_metadata(&envelope)?;
                let json = std::str::from_utf8(&inner).map_err(|e| {
                    CryptoError::MalformedCiphertext(format!("envelope payload is not utf-8: {e}"))
                })?;
                WrappedKey::from_json(json)
            }
        }
    }
}

/// Seals `plaintext` in a fresh envelope.
pub fn wrap_metadata(plaintext: &[u8]) -> CryptoResult<MetadataEnvelope> {
    let mut key = Zeroizing::new([0u8; ENVELOPE_KEY_SIZE]);
    let mut iv = [0u8; ENVELOPE_IV_SIZE];
    OsRng.fill_bytes(key.as_mut());
    OsRng.fill_bytes(&mut iv);

    let data = Aes256CbcEnc::new_from_slices(key.as_ref(), &iv)
        .map_err(|e| CryptoError::Encryption(format!("metadata envelope init failed: {e}")))?
        .encrypt_padded_vec_mut::<Pkcs7>(plaintext);

    Ok(MetadataEnvelope {
        key: STANDARD.encode(key.as_ref()),
        iv: STANDARD.encode(iv),
        data: STANDARD.encode(data),
    })
}

/// Opens an envelope produced by [`wrap_metadata`].
pub fn unwrap_metadata(envelope: &MetadataEnvelope) -> CryptoResult<Zeroizing<Vec<u8>>> {
    let key = Zeroizing::new(decode_field("key", &envelope.key)?);
    let iv = decode_field("iv", &envelope.iv)?;
    let data = decode_field("data", &envelope.data)?;

    if key.len() != ENVELOPE_KEY_SIZE || iv.len() != ENVELOPE_IV_SIZE {
        return Err(CryptoError::MalformedCiphertext(format!(
            "metadata envelope key/iv are {}/{} bytes, expected {ENVELOPE_KEY_SIZE}/{ENVELOPE_IV_SIZE}",
            key.len(),
            iv.len()
        )));
    }

    let plain = Aes256CbcDec::new_from_slices(&key, &iv)
        .map_err(|e| CryptoError::Decryption(format!("metadata envelope init failed: {e}")))?
        .decrypt_padded_vec_mut::<Pkcs7>(&data)
        .map_err(|_| CryptoError::MalformedCiphertext("metadata envelope padding".to_string()))?;

    Ok(Zeroizing::new(plain))
}

/// Serializes a wrapped key into the form stored in a file record.
pub fn encode_stored_key(wrapped: &WrappedKey) -> CryptoResult<String> {
    wrap_metadata(wrapped.to_json()?.as_bytes())?.to_json()
}

/// Parses a stored `encryptedKey` value in either of its two forms.
pub fn decode_stored_key(stored: &str) -> CryptoResult<WrappedKey> {
    StoredKey::parse(stored)?.into_wrapped()
}

fn decode_field(name: &str, value: &str) -> CryptoResult<Vec<u8>> {
    STANDARD
        .decode(value)
        .map_err(|e| CryptoError::MalformedCiphertext(format!("metadata envelope {name}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::ContentKey;
    use crate::keys::generate_key_pair;
    use crate::wrap::{unwrap_key, wrap_key};

    #[test]
    fn envelope_roundtrip() {
        let env = wrap_metadata(b"{\"hello\":1}").unwrap();
        assert_eq!(unwrap_metadata(&env).unwrap().as_slice(), b"{\"hello\":1}");
    }

    #[test]
    fn envelope_json_has_three_base64_fields() {
        let env = wrap_metadata(b"payload").unwrap();
        let value: serde_json::Value = serde_json::from_str(&env.to_json().unwrap()).unwrap();
        let obj = value.as_object().unwrap();
        assert_eq!(obj.len(), 3);
        assert_eq!(STANDARD.decode(obj["key"].as_str().unwrap()).unwrap().len(), 32);
        assert_eq!(STANDARD.decode(obj["iv"].as_str().unwrap()).unwrap().len(), 16);
        assert_eq!(STANDARD.decode(obj["data"].as_str().unwrap()).unwrap().len(), 16);
    }

    #[test]
    fn stored_key_accepts_envelope_form() {
        let kp = generate_key_pair();
        let content_key = ContentKey::generate();
        let wrapped = wrap_key(&content_key, &kp.public).unwrap();

        let stored = encode_stored_key(&wrapped).unwrap();
        assert!(matches!(StoredKey::parse(&stored).unwrap(), StoredKey::Envelope(_)));

        let decoded = decode_stored_key(&stored).unwrap();
        assert_eq!(decoded, wrapped);
        let opened = unwrap_key(&decoded, &kp.private).unwrap();
        assert_eq!(opened.as_bytes(), content_key.as_bytes());
    }

    #[test]
    fn stored_key_accepts_raw_legacy_form() {
        let kp = generate_key_pair();
        let wrapped = wrap_key(&ContentKey::generate(), &kp.public).unwrap();
        let raw = wrapped.to_json().unwrap();

        assert!(matches!(StoredKey::parse(&raw).unwrap(), StoredKey::Raw(_)));
        assert_eq!(decode_stored_key(&raw).unwrap(), wrapped);
    }

    #[test]
    fn garbage_is_malformed() {
        assert!(matches!(
            decode_stored_key("not json"),
            Err(CryptoError::MalformedCiphertext(_))
        ));
        assert!(matches!(
            decode_stored_key(r#"{"unrelated":true}"#),
            Err(CryptoError::MalformedCiphertext(_))
        ));
    }

    #[test]
    fn envelope_with_bad_base64_is_malformed() {
        let env = MetadataEnvelope {
            key: "!!!".to_string(),
            iv: STANDARD.encode([0u8; 16]),
            data: STANDARD.encode([0u8; 16]),
        };
        assert!(matches!(
            unwrap_metadata(&env),
            Err(CryptoError::MalformedCiphertext(_))
        ));
    }
}
