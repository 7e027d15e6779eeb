//! Content-key wrapping with secp256k1 ECIES.
//!
//! Each wrap generates an ephemeral key pair and derives key material from
//! the ECDH shared secret with the recipient:
//!
//! 1. `shared = X(ephemeral_sk · recipient_pk)` (32 bytes)
//! 2. `enc_key ‖ mac_key = SHA-512(shared)`
//! 3. `ciphertext = AES-256-CBC(enc_key, iv, content_key)` with PKCS#7 padding
//! 4. `mac = HMAC-SHA256(mac_key, iv ‖ ephemeral_pk ‖ ciphertext)`
//!
//! The construction and the JSON shape are compatible with the `eccrypto`
//! JavaScript package, so previously stored wrapped keys remain readable.

use crate::content::{ContentKey, CONTENT_KEY_SIZE};
use crate::error::{CryptoError, CryptoResult};
use crate::keys::{PrivateKey, PublicKey, PUBLIC_KEY_SIZE};
use aes::Aes256;
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use hmac::{Hmac, Mac};
use k256::ecdh::{diffie_hellman, EphemeralSecret, SharedSecret};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256, Sha512};
use zeroize::Zeroizing;

/// CBC IV size in bytes.
pub const WRAP_IV_SIZE: usize = 16;
/// HMAC-SHA256 output size in bytes.
pub const MAC_SIZE: usize = 32;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;
type HmacSha256 = Hmac<Sha256>;

/// A content key sealed under a recipient's public key.
///
/// Field order is part of the stored format: ephemeral public key, IV, MAC,
/// ciphertext. In JSON every field is a Node `Buffer` object
/// (`{"type":"Buffer","data":[..]}`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WrappedKey {
    #[serde(with = "node_buffer")]
    pub ephem_public_key: Vec<u8>,
    #[serde(with = "node_buffer")]
    pub iv: Vec<u8>,
    #[serde(with = "node_buffer")]
    pub mac: Vec<u8>,
    #[serde(with = "node_buffer")]
    pub ciphertext: Vec<u8>,
}

impl WrappedKey {
    const FIXED_SIZE: usize = PUBLIC_KEY_SIZE + WRAP_IV_SIZE + MAC_SIZE;

    pub fn to_json(&self) -> CryptoResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> CryptoResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| CryptoError::MalformedCiphertext(format!("wrapped key json: {e}")))
    }

    /// Binary form: `ephemeral_pk(65) ‖ iv(16) ‖ mac(32) ‖ ciphertext`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(Self::FIXED_SIZE + self.ciphertext.len());
        out.extend_from_slice(&self.ephem_public_key);
        out.extend_from_slice(&self.iv);
        out.extend_from_slice(&self.mac);
        out.extend_from_slice(&self.ciphertext);
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        if bytes.len() <= Self::FIXED_SIZE {
            return Err(CryptoError::MalformedCiphertext(format!(
                "wrapped key is {} bytes, need more than {}",
                bytes.len(),
                Self::FIXED_SIZE
            )));
        }
        let (ephem, rest) = bytes.split_at(PUBLIC_KEY_SIZE);
        let (iv, rest) = rest.split_at(WRAP_IV_SIZE);
        let (mac, ciphertext) = rest.split_at(MAC_SIZE);
        Ok(Self {
            ephem_public_key: ephem.to_vec(),
            iv: iv.to_vec(),
            mac: mac.to_vec(),
            ciphertext: ciphertext.to_vec(),
        })
    }
}

/// Wraps a content key for `recipient`.
pub fn wrap_key(content_key: &ContentKey, recipient: &PublicKey) -> CryptoResult<WrappedKey> {
    wrap_bytes(content_key.as_bytes(), recipient)
}

/// Unwraps a content key with the recipient's private key.
///
/// A MAC mismatch (wrong key, tampering) fails with
/// [`CryptoError::WrapIntegrityFailure`]. A verified envelope that does not
/// yield a 32-byte key fails with [`CryptoError::KeyMismatch`].
pub fn unwrap_key(wrapped: &WrappedKey, recipient: &PrivateKey) -> CryptoResult<ContentKey> {
    let plain = unwrap_bytes(wrapped, recipient)?;
    if plain.len() != CONTENT_KEY_SIZE {
        return Err(CryptoError::KeyMismatch(format!(
            "unwrapped {} bytes, expected a {CONTENT_KEY_SIZE}-byte content key",
            plain.len()
        )));
    }
    ContentKey::from_slice(&plain)
}

/// ECIES-encrypts arbitrary bytes for `recipient`.
pub fn wrap_bytes(plaintext: &[u8], recipient: &PublicKey) -> CryptoResult<WrappedKey> {
    let ephemeral = EphemeralSecret::random(&mut OsRng);
    let ephem_public_key = PublicKey::from_inner(ephemeral.public_key()).to_bytes().to_vec();

    let shared = ephemeral.diffie_hellman(recipient.as_inner());
    let (enc_key, mac_key) = derive_keys(&shared);

    let mut iv = [0u8; WRAP_IV_SIZE];
    OsRng.fill_bytes(&mut iv);

    let ciphertext = Aes256CbcEnc::new_from_slices(&enc_key[..], &iv)
        .map_err(|e| CryptoError::Encryption(format!("key wrap init failed: {e}")))?
        .encrypt_padded_vec_mut::<Pkcs7>(plaintext);

    let mac = compute_mac(&mac_key[..], &iv, &ephem_public_key, &ciphertext)?
        .finalize()
        .into_bytes()
        .to_vec();

    Ok(WrappedKey {
        ephem_public_key,
        iv: iv.to_vec(),
        mac,
        ciphertext,
    })
}

/// Opens bytes sealed by [`wrap_bytes`].
pub fn unwrap_bytes(wrapped: &WrappedKey, recipient: &PrivateKey) -> CryptoResult<Zeroizing<Vec<u8>>> {
    if wrapped.iv.len() != WRAP_IV_SIZE {
        return Err(CryptoError::MalformedCiphertext(format!(
            "wrap iv is {} bytes, expected {WRAP_IV_SIZE}",
            wrapped.iv.len()
        )));
    }
    let ephem = PublicKey::from_bytes(&wrapped.ephem_public_key)
        .map_err(|e| CryptoError::MalformedCiphertext(format!("ephemeral public key: {e}")))?;

    let shared = diffie_hellman(
        recipient.as_inner().to_nonzero_scalar(),
        ephem.as_inner().as_affine(),
    );
    let (enc_key, mac_key) = derive_keys(&shared);

    compute_mac(&mac_key[..], &wrapped.iv, &wrapped.ephem_public_key, &wrapped.ciphertext)?
        .verify_slice(&wrapped.mac)
        .map_err(|_| CryptoError::WrapIntegrityFailure)?;

    let plain = Aes256CbcDec::new_from_slices(&enc_key[..], &wrapped.iv)
        .map_err(|e| CryptoError::Decryption(format!("key unwrap init failed: {e}")))?
        .decrypt_padded_vec_mut::<Pkcs7>(&wrapped.ciphertext)
        .map_err(|_| CryptoError::KeyMismatch("verified envelope failed to unpad".to_string()))?;

    Ok(Zeroizing::new(plain))
}

/// Splits `SHA-512(shared_x)` into the encryption and MAC keys.
fn derive_keys(shared: &SharedSecret) -> (Zeroizing<[u8; 32]>, Zeroizing<[u8; 32]>) {
    let hash = Sha512::digest(shared.raw_secret_bytes());
    let mut enc_key = Zeroizing::new([0u8; 32]);
    let mut mac_key = Zeroizing::new([0u8; 32]);
    enc_key.copy_from_slice(&hash[..32]);
    mac_key.copy_from_slice(&hash[32..]);
    (enc_key, mac_key)
}

fn compute_mac(
    mac_key: &[u8],
    iv: &[u8],
    ephem_public_key: &[u8],
    ciphertext: &[u8],
) -> CryptoResult<HmacSha256> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(mac_key)
        .map_err(|e| CryptoError::Encryption(format!("hmac init failed: {e}")))?;
    mac.update(iv);
    mac.update(ephem_public_key);
    mac.update(ciphertext);
    Ok(mac)
}

/// Serde adapter for Node's `Buffer.toJSON()` shape.
mod node_buffer {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize)]
    struct BufferOut<'a> {
        #[serde(rename = "type")]
        kind: &'static str,
        data: &'a [u8],
    }

    #[derive(Deserialize)]
    struct BufferIn {
        data: Vec<u8>,
    }

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        BufferOut {
            kind: "Buffer",
            data: bytes,
        }
        .serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        BufferIn::deserialize(deserializer).map(|b| b.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::generate_key_pair;

    #[test]
    fn json_uses_node_buffer_shape_in_field_order() {
        let recipient = generate_key_pair();
        let wrapped = wrap_key(&ContentKey::generate(), &recipient.public).unwrap();
        let json = wrapped.to_json().unwrap();

        assert!(json.starts_with(r#"{"ephemPublicKey":{"type":"Buffer","data":["#));
        let ephem = json.find("\"ephemPublicKey\"").unwrap();
        let iv = json.find("\"iv\"").unwrap();
        let mac = json.find("\"mac\"").unwrap();
        let ct = json.find("\"ciphertext\"").unwrap();
        assert!(ephem < iv && iv < mac && mac < ct);
    }

    #[test]
    fn field_widths() {
        let recipient = generate_key_pair();
        let wrapped = wrap_key(&ContentKey::generate(), &recipient.public).unwrap();
        assert_eq!(wrapped.ephem_public_key.len(), PUBLIC_KEY_SIZE);
        assert_eq!(wrapped.ephem_public_key[0], 0x04);
        assert_eq!(wrapped.iv.len(), WRAP_IV_SIZE);
        assert_eq!(wrapped.mac.len(), MAC_SIZE);
        // 32-byte key + full PKCS#7 padding block
        assert_eq!(wrapped.ciphertext.len(), 48);
    }

    #[test]
    fn binary_form_roundtrip() {
        let recipient = generate_key_pair();
        let wrapped = wrap_key(&ContentKey::generate(), &recipient.public).unwrap();
        let parsed = WrappedKey::from_bytes(&wrapped.to_bytes()).unwrap();
        assert_eq!(parsed, wrapped);
    }

    #[test]
    fn non_key_payload_is_key_mismatch() {
        let recipient = generate_key_pair();
        let wrapped = wrap_bytes(b"sixteen byte msg", &recipient.public).unwrap();
        let err = unwrap_key(&wrapped, &recipient.private).unwrap_err();
        assert!(matches!(err, CryptoError::KeyMismatch(_)));
    }

    #[test]
    fn bad_iv_width_is_malformed() {
        let recipient = generate_key_pair();
        let mut wrapped = wrap_key(&ContentKey::generate(), &recipient.public).unwrap();
        wrapped.iv.pop();
        assert!(matches!(
            unwrap_key(&wrapped, &recipient.private),
            Err(CryptoError::MalformedCiphertext(_))
        ));
    }
}
