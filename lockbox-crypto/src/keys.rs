//! secp256k1 key pairs, minted one per protected file.
//!
//! The private half never leaves the local secret store; the public half is
//! published in the file record as a hex-encoded uncompressed SEC1 point.

use crate::error::{CryptoError, CryptoResult};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use rand::rngs::OsRng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use zeroize::Zeroizing;

/// Size of a secp256k1 private scalar in bytes.
pub const PRIVATE_KEY_SIZE: usize = 32;
/// Size of an uncompressed SEC1 public key in bytes.
pub const PUBLIC_KEY_SIZE: usize = 65;

/// secp256k1 private key. The inner scalar is zeroized on drop.
#[derive(Clone)]
pub struct PrivateKey(k256::SecretKey);

impl PrivateKey {
    /// Parses a raw 32-byte scalar.
    pub fn from_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        if bytes.len() != PRIVATE_KEY_SIZE {
            return Err(CryptoError::InvalidKeyLength {
                expected: PRIVATE_KEY_SIZE,
                actual: bytes.len(),
            });
        }
        k256::SecretKey::from_slice(bytes)
            .map(Self)
            .map_err(|_| CryptoError::InvalidKey("scalar out of range for secp256k1".to_string()))
    }

    /// Parses a hex-encoded 32-byte scalar.
    pub fn from_hex(hex_str: &str) -> CryptoResult<Self> {
        let bytes = Zeroizing::new(
            hex::decode(hex_str).map_err(|e| CryptoError::InvalidKey(format!("bad hex: {e}")))?,
        );
        Self::from_bytes(&bytes)
    }

    /// Returns the raw scalar bytes.
    pub fn to_bytes(&self) -> Zeroizing<[u8; PRIVATE_KEY_SIZE]> {
        let mut out = Zeroizing::new([0u8; PRIVATE_KEY_SIZE]);
        out.copy_from_slice(&self.0.to_bytes());
        out
    }

    pub fn to_hex(&self) -> Zeroizing<String> {
        Zeroizing::new(hex::encode(self.to_bytes().as_ref()))
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.0.public_key())
    }

    pub(crate) fn as_inner(&self) -> &k256::SecretKey {
        &self.0
    }
}

impl std::fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PrivateKey(<redacted>)")
    }
}

/// secp256k1 public key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PublicKey(k256::PublicKey);

impl PublicKey {
    /// Parses a SEC1 point (uncompressed 65 bytes or compressed 33 bytes).
    pub fn from_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        k256::PublicKey::from_sec1_bytes(bytes)
            .map(Self)
            .map_err(|_| CryptoError::InvalidKey("not a valid secp256k1 point".to_string()))
    }

    pub fn from_hex(hex_str: &str) -> CryptoResult<Self> {
        let bytes =
            hex::decode(hex_str).map_err(|e| CryptoError::InvalidKey(format!("bad hex: {e}")))?;
        Self::from_bytes(&bytes)
    }

    /// Returns the uncompressed SEC1 encoding (`0x04 ‖ X ‖ Y`).
    pub fn to_bytes(&self) -> [u8; PUBLIC_KEY_SIZE] {
        let point = self.0.to_encoded_point(false);
        let mut out = [0u8; PUBLIC_KEY_SIZE];
        out.copy_from_slice(point.as_bytes());
        out
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    pub(crate) fn from_inner(inner: k256::PublicKey) -> Self {
        Self(inner)
    }

    pub(crate) fn as_inner(&self) -> &k256::PublicKey {
        &self.0
    }
}

impl Serialize for PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        PublicKey::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// A per-file key pair.
#[derive(Debug, Clone)]
pub struct KeyPair {
    pub private: PrivateKey,
    pub public: PublicKey,
}

impl KeyPair {
    /// Reconstructs a key pair from its private half.
    pub fn from_private(private: PrivateKey) -> Self {
        let public = private.public_key();
        Self { private, public }
    }
}

/// Generates a new secp256k1 key pair from the OS CSPRNG. Nothing is persisted.
pub fn generate_key_pair() -> KeyPair {
    KeyPair::from_private(PrivateKey(k256::SecretKey::random(&mut OsRng)))
}
