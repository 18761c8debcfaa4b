//! Transport encryption for agent payloads.
//!
//! Wire format of an encrypted frame:
//!
//! ```text
//! +------+----------------+---------------------------+
//! | 0x03 | 12-byte nonce  | AES-256-GCM ciphertext+tag|
//! +------+----------------+---------------------------+
//! ```
//!
//! The key is derived from the configured shared secret with
//! HKDF-SHA256. Anything that does not start with the marker byte is a
//! plaintext frame; whether that is acceptable depends on the host's
//! encryption mode, which the fetcher enforces.

use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM};
use ring::hkdf;
use ring::rand::{SecureRandom, SystemRandom};
use vigil_common::error::FetchError;

/// Marker byte that opens every encrypted frame.
pub const ENCRYPTED_MARKER: u8 = 0x03;

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;
const KEY_LEN: usize = 32;

const HKDF_SALT: &[u8] = b"vigil-agent-transport";
const HKDF_INFO: &[u8] = b"payload encryption v1";

/// Whether `data` claims to be an encrypted frame.
pub fn is_encrypted(data: &[u8]) -> bool {
    data.first() == Some(&ENCRYPTED_MARKER)
}

fn derive_key(secret: &str) -> Result<LessSafeKey, FetchError> {
    let salt = hkdf::Salt::new(hkdf::HKDF_SHA256, HKDF_SALT);
    let prk = salt.extract(secret.as_bytes());
    let okm = prk
        .expand(&[HKDF_INFO], hkdf::HKDF_SHA256)
        .map_err(|_| FetchError::Decryption("key derivation failed".to_string()))?;
    let mut key_bytes = [0u8; KEY_LEN];
    okm.fill(&mut key_bytes)
        .map_err(|_| FetchError::Decryption("key derivation failed".to_string()))?;
    let unbound = UnboundKey::new(&AES_256_GCM, &key_bytes)
        .map_err(|_| FetchError::Decryption("invalid key material".to_string()))?;
    Ok(LessSafeKey::new(unbound))
}

/// Decrypt an encrypted frame (marker byte included) with the shared
/// secret.
///
/// A frame too short to hold nonce and tag is a protocol error; an
/// authentication failure (wrong secret, tampered payload) is a
/// decryption error.
pub fn decrypt_payload(frame: &[u8], secret: &str) -> Result<Vec<u8>, FetchError> {
    if frame.len() < 1 + NONCE_LEN + TAG_LEN {
        return Err(FetchError::Protocol(format!(
            "truncated encrypted frame ({} bytes)",
            frame.len()
        )));
    }
    let (nonce_bytes, ciphertext) = frame[1..].split_at(NONCE_LEN);

    let key = derive_key(secret)?;
    let nonce = Nonce::try_assume_unique_for_key(nonce_bytes)
        .map_err(|_| FetchError::Protocol("invalid nonce".to_string()))?;

    let mut buf = ciphertext.to_vec();
    let plaintext = key
        .open_in_place(nonce, Aad::empty(), &mut buf)
        .map_err(|_| {
            FetchError::Decryption("authentication failed (wrong shared secret?)".to_string())
        })?;
    Ok(plaintext.to_vec())
}

/// Build an encrypted frame around `plaintext` with a random nonce.
///
/// The production agent does its own encryption; this side is used by
/// the agent simulator and the test suite.
pub fn encrypt_payload(plaintext: &[u8], secret: &str) -> Result<Vec<u8>, FetchError> {
    let key = derive_key(secret)?;

    let rng = SystemRandom::new();
    let mut nonce_bytes = [0u8; NONCE_LEN];
    rng.fill(&mut nonce_bytes)
        .map_err(|_| FetchError::Decryption("nonce generation failed".to_string()))?;
    let nonce = Nonce::assume_unique_for_key(nonce_bytes);

    let mut buf = plaintext.to_vec();
    key.seal_in_place_append_tag(nonce, Aad::empty(), &mut buf)
        .map_err(|_| FetchError::Decryption("encryption failed".to_string()))?;

    let mut frame = Vec::with_capacity(1 + NONCE_LEN + buf.len());
    frame.push(ENCRYPTED_MARKER);
    frame.extend_from_slice(&nonce_bytes);
    frame.extend_from_slice(&buf);
    Ok(frame)
}
