//! Encryption layer for lockbox.
//!
//! Provides per-file hybrid envelope encryption using:
//! - secp256k1 key pairs, one minted per protected file
//! - AES-256-GCM for content encryption with a one-time content key
//! - ECIES (ECDH + AES-256-CBC + HMAC-SHA256) for wrapping the content key
//! - A self-contained AES-256-CBC metadata envelope for stored key fields
//! - Argon2id + ChaCha20-Poly1305 for protecting secrets at rest
//!
//! # Architecture
//!
//! Every encryption call generates a fresh content key and IV:
//!
//! 1. **Content Key**: A random AES-256 key that encrypts the file body.
//!    It exists only for the duration of one encrypt/decrypt call.
//!
//! 2. **Wrapped Key**: The content key sealed under the file's public key
//!    with an ephemeral ECDH exchange. Exactly one wrapped key accompanies
//!    each encrypted file body and both are needed to recover plaintext.
//!
//! 3. **Metadata Envelope**: The serialized wrapped key is obscured before it
//!    is stored as a database field. The envelope carries its own key, so it
//!    hides structure but is not an access-control boundary.

mod cipher;
pub mod content;
mod error;
mod key;
pub mod keys;
pub mod metadata;
pub mod wrap;

pub use cipher::{decrypt, encrypt, EncryptedData, NONCE_SIZE, TAG_SIZE};
pub use content::{
    decrypt_content, encrypt_content, ContentKey, EnvelopeCiphertext, TagPolicy, AUTH_TAG_SIZE,
    CONTENT_KEY_SIZE, IV_SIZE,
};
pub use error::{CryptoError, CryptoResult};
pub use key::{derive_key, generate_random_key, DerivedKey, KdfParams, Salt, KEY_SIZE, SALT_SIZE};
pub use keys::{generate_key_pair, KeyPair, PrivateKey, PublicKey, PRIVATE_KEY_SIZE, PUBLIC_KEY_SIZE};
pub use metadata::{
    decode_stored_key, encode_stored_key, unwrap_metadata, wrap_metadata, MetadataEnvelope,
    StoredKey,
};
pub use wrap::{unwrap_bytes, unwrap_key, wrap_bytes, wrap_key, WrappedKey, MAC_SIZE, WRAP_IV_SIZE};
