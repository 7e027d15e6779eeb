use lockbox_crypto::{
    decode_stored_key, decrypt_content, encode_stored_key, encrypt_content, generate_key_pair,
    unwrap_key, unwrap_metadata, wrap_key, wrap_metadata, ContentKey, CryptoError,
    EnvelopeCiphertext, MetadataEnvelope, TagPolicy, WrappedKey, AUTH_TAG_SIZE, IV_SIZE,
};
use pretty_assertions::assert_eq;

fn unhex(s: &str) -> Vec<u8> {
    hex::decode(s).unwrap()
}

#[test]
fn full_publish_and_open_cycle() {
    let file_keys = generate_key_pair();
    let (content_key, envelope) = encrypt_content(b"quarterly report").unwrap();
    let stored = encode_stored_key(&wrap_key(&content_key, &file_keys.public).unwrap()).unwrap();
    let body = envelope.to_bytes();
    drop(content_key);

    let wrapped = decode_stored_key(&stored).unwrap();
    let recovered_key = unwrap_key(&wrapped, &file_keys.private).unwrap();
    let parsed = EnvelopeCiphertext::from_bytes(&body).unwrap();
    let plain = decrypt_content(&recovered_key, &parsed, TagPolicy::Verify).unwrap();

    assert_eq!(plain, b"quarterly report");
}

#[test]
fn body_layout_is_iv_then_tag_then_ciphertext() {
    let (_, envelope) = encrypt_content(b"abc").unwrap();
    let body = envelope.to_bytes();

    assert_eq!(body.len(), IV_SIZE + AUTH_TAG_SIZE + 3);
    assert_eq!(&body[..IV_SIZE], &envelope.iv);
    assert_eq!(&body[IV_SIZE..IV_SIZE + AUTH_TAG_SIZE], &envelope.auth_tag);
    assert_eq!(&body[IV_SIZE + AUTH_TAG_SIZE..], envelope.ciphertext.as_slice());
}

#[test]
fn same_plaintext_encrypts_differently() {
    let (k1, e1) = encrypt_content(b"same bytes").unwrap();
    let (k2, e2) = encrypt_content(b"same bytes").unwrap();
    assert_ne!(k1.as_bytes(), k2.as_bytes());
    assert_ne!(e1.iv, e2.iv);
    assert_ne!(e1.to_bytes(), e2.to_bytes());
}

#[test]
fn any_flipped_bit_fails_authentication() {
    let (key, envelope) = encrypt_content(b"tamper me please").unwrap();
    let body = envelope.to_bytes();

    for byte in [0, IV_SIZE, IV_SIZE + AUTH_TAG_SIZE, body.len() - 1] {
        let mut damaged = body.clone();
        damaged[byte] ^= 0x01;
        let parsed = EnvelopeCiphertext::from_bytes(&damaged).unwrap();
        let err = decrypt_content(&key, &parsed, TagPolicy::Verify).unwrap_err();
        assert!(matches!(err, CryptoError::AuthenticationFailed), "byte {byte}");
    }
}

#[test]
fn bypass_recovers_body_with_damaged_tag() {
    let (key, mut envelope) = encrypt_content(b"partially damaged file").unwrap();
    envelope.auth_tag[0] ^= 0xff;

    assert!(decrypt_content(&key, &envelope, TagPolicy::Verify).is_err());
    let plain = decrypt_content(&key, &envelope, TagPolicy::Bypass).unwrap();
    assert_eq!(plain, b"partially damaged file");
}

#[test]
fn gcm_known_answer_all_zero_key_and_iv() {
    // AES-256-GCM, K = 0^256, IV = 0^96, P = 0^128.
    let key = ContentKey::from_slice(&[0u8; 32]).unwrap();
    let mut auth_tag = [0u8; AUTH_TAG_SIZE];
    auth_tag.copy_from_slice(&unhex("d0d1c8a799996bf0265b98b5d48ab919"));
    let envelope = EnvelopeCiphertext {
        iv: [0u8; IV_SIZE],
        auth_tag,
        ciphertext: unhex("cea7403d4d606b6e074ec5d3baf39d18"),
    };

    assert_eq!(
        decrypt_content(&key, &envelope, TagPolicy::Verify).unwrap(),
        vec![0u8; 16]
    );
    assert_eq!(
        decrypt_content(&key, &envelope, TagPolicy::Bypass).unwrap(),
        vec![0u8; 16]
    );
}

#[test]
fn unwrap_with_wrong_private_key_fails_integrity() {
    let owner = generate_key_pair();
    let stranger = generate_key_pair();
    let wrapped = wrap_key(&ContentKey::generate(), &owner.public).unwrap();

    let err = unwrap_key(&wrapped, &stranger.private).unwrap_err();
    assert!(matches!(err, CryptoError::WrapIntegrityFailure));
}

#[test]
fn tampered_wrapped_ciphertext_fails_integrity() {
    let owner = generate_key_pair();
    let mut wrapped = wrap_key(&ContentKey::generate(), &owner.public).unwrap();
    wrapped.ciphertext[0] ^= 0x80;

    assert!(matches!(
        unwrap_key(&wrapped, &owner.private),
        Err(CryptoError::WrapIntegrityFailure)
    ));
}

#[test]
fn wrapping_twice_gives_distinct_ephemeral_keys() {
    let owner = generate_key_pair();
    let key = ContentKey::generate();
    let a = wrap_key(&key, &owner.public).unwrap();
    let b = wrap_key(&key, &owner.public).unwrap();
    assert_ne!(a.ephem_public_key, b.ephem_public_key);
    assert_ne!(a.ciphertext, b.ciphertext);
}

#[test]
fn wrapped_key_json_roundtrip() {
    let owner = generate_key_pair();
    let wrapped = wrap_key(&ContentKey::generate(), &owner.public).unwrap();
    let parsed = WrappedKey::from_json(&wrapped.to_json().unwrap()).unwrap();
    assert_eq!(parsed, wrapped);
}

#[test]
fn truncated_body_is_malformed() {
    let err = EnvelopeCiphertext::from_bytes(&[7u8; 10]).unwrap_err();
    assert!(matches!(err, CryptoError::MalformedCiphertext(_)));
}

mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn content_always_roundtrips(plain in proptest::collection::vec(any::<u8>(), 0..1024)) {
            let (key, envelope) = encrypt_content(&plain).unwrap();
            let parsed = EnvelopeCiphertext::from_bytes(&envelope.to_bytes()).unwrap();
            let recovered = decrypt_content(&key, &parsed, TagPolicy::Verify).unwrap();
            prop_assert_eq!(recovered, plain);
        }

        #[test]
        fn stored_key_always_opens(seed in proptest::array::uniform32(any::<u8>())) {
            let owner = generate_key_pair();
            let key = ContentKey::from_slice(&seed).unwrap();
            let stored = encode_stored_key(&wrap_key(&key, &owner.public).unwrap()).unwrap();
            let opened = unwrap_key(&decode_stored_key(&stored).unwrap(), &owner.private).unwrap();
            prop_assert_eq!(opened.as_bytes(), key.as_bytes());
        }

        #[test]
        fn metadata_envelope_roundtrips(blob in proptest::collection::vec(any::<u8>(), 0..2048)) {
            let json = wrap_metadata(&blob).unwrap().to_json().unwrap();
            let envelope = MetadataEnvelope::from_json(&json).unwrap();
            let recovered = unwrap_metadata(&envelope).unwrap();
            prop_assert_eq!(recovered.as_slice(), blob.as_slice());
        }
    }
}
