use chacha20poly1305::aead::{Aead, Payload};
use chacha20poly1305::{ChaCha20Poly1305, Key, KeyInit, Nonce};
use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::Zeroize;

use crate::error::{Error, Result};

// KEY_ROTATION_INTERVAL is the number of messages sent on a single
// cipher stream before the keys are rotated forwards.
const KEY_ROTATION_INTERVAL: u64 = 1000;

/// Encapsulates the state for the AEAD used to encrypt/authenticate a single
/// direction: a handshake `temp_k`, or a transport `sk`/`rk`.
///
/// The nonce is a plain counter that is rendered into the 12-byte wire layout
/// (bytes 4..5 little-endian, the rest zero) only at the point of use. Reusing
/// one `CipherState` across several AEAD calls before the next key derivation
/// is what gives act 3's static-key encryption its nonce of 1 without
/// special-casing it in code.
pub(crate) struct CipherState {
    nonce: u64,
    secret_key: [u8; 32],
    // salt is mixed with secret_key on rotation to derive the next key. For
    // the transport ciphers this starts as a copy of the final chaining key
    // and then evolves independently per direction.
    salt: [u8; 32],
}

impl Drop for CipherState {
    fn drop(&mut self) {
        self.scrub();
    }
}

impl CipherState {
    pub(crate) fn new(key: [u8; 32]) -> Self {
        CipherState {
            nonce: 0,
            secret_key: key,
            salt: [0; 32],
        }
    }

    pub(crate) fn with_salt(salt: [u8; 32], key: [u8; 32]) -> Self {
        CipherState {
            nonce: 0,
            secret_key: key,
            salt,
        }
    }

    // Wipes the secret material. Factored out of `Drop::drop` (rather than
    // inlined there) so the wipe itself, not just its scheduling, has a
    // direct test below.
    fn scrub(&mut self) {
        self.secret_key.zeroize();
        self.salt.zeroize();
    }

    fn nonce_bytes(&self) -> [u8; 12] {
        let mut nonce = [0u8; 12];
        nonce[4..12].copy_from_slice(&self.nonce.to_le_bytes());
        nonce
    }

    /// Returns `ciphertext || 16-byte tag`.
    pub(crate) fn encrypt(&mut self, associated_data: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
        let cipher = ChaCha20Poly1305::new(Key::from_slice(&self.secret_key));
        let nonce = self.nonce_bytes();
        let ciphertext = cipher
            .encrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: plaintext,
                    aad: associated_data,
                },
            )
            .expect("chacha20poly1305 encryption cannot fail for in-bounds inputs");
        self.advance();
        Ok(ciphertext)
    }

    /// Expects `ciphertext` to be `ct || 16-byte tag`. `bad_tag` is the
    /// caller-specific error to surface on authentication failure (the acts
    /// and the transport each have their own variant).
    pub(crate) fn decrypt(
        &mut self,
        associated_data: &[u8],
        ciphertext: &[u8],
        bad_tag: Error,
    ) -> Result<Vec<u8>> {
        let cipher = ChaCha20Poly1305::new(Key::from_slice(&self.secret_key));
        let nonce = self.nonce_bytes();
        let plaintext = cipher
            .decrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: ciphertext,
                    aad: associated_data,
                },
            )
            .map_err(|_| bad_tag)?;
        self.advance();
        Ok(plaintext)
    }

    // Called after every successful encrypt/decrypt. Rotation compares the
    // post-increment counter to the interval, so the 1000th use of a key is
    // the one that triggers rotation.
    fn advance(&mut self) {
        self.nonce += 1;
        if self.nonce == KEY_ROTATION_INTERVAL {
            self.rotate();
        }
    }

    fn rotate(&mut self) {
        let hkdf = Hkdf::<Sha256>::extract(Some(&self.salt), &self.secret_key);
        let mut okm = [0u8; 64];
        hkdf.expand(&[], &mut okm)
            .expect("64 is a valid HKDF-SHA256 output length");

        self.salt.copy_from_slice(&okm[..32]);
        self.secret_key.copy_from_slice(&okm[32..]);
        self.nonce = 0;
        okm.zeroize();

        tracing::debug!("cipher key rotated");
    }

    #[cfg(test)]
    pub(crate) fn secret_key(&self) -> [u8; 32] {
        self.secret_key
    }

    #[cfg(test)]
    pub(crate) fn nonce(&self) -> u64 {
        self.nonce
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encrypt_decrypt_round_trips() {
        let mut send = CipherState::new([7; 32]);
        let mut recv = CipherState::new([7; 32]);

        let ct = send.encrypt(b"aad", b"hello noise").unwrap();
        let pt = recv.decrypt(b"aad", &ct, Error::TransportBadTag).unwrap();
        assert_eq!(pt, b"hello noise");
    }

    #[test]
    fn wrong_associated_data_fails_closed() {
        let mut send = CipherState::new([7; 32]);
        let mut recv = CipherState::new([7; 32]);

        let ct = send.encrypt(b"aad-one", b"hello noise").unwrap();
        let err = recv.decrypt(b"aad-two", &ct, Error::TransportBadTag).unwrap_err();
        assert!(matches!(err, Error::TransportBadTag));
    }

    #[test]
    fn flipped_tag_byte_fails_closed() {
        let mut send = CipherState::new([7; 32]);
        let mut recv = CipherState::new([7; 32]);

        let mut ct = send.encrypt(&[], b"hello noise").unwrap();
        let last = ct.len() - 1;
        ct[last] ^= 0x01;
        let err = recv.decrypt(&[], &ct, Error::TransportBadTag).unwrap_err();
        assert!(matches!(err, Error::TransportBadTag));
    }

    #[test]
    fn key_rotates_exactly_at_the_thousandth_use() {
        let mut cipher = CipherState::with_salt([9; 32], [3; 32]);
        let key_before = cipher.secret_key();

        for _ in 0..999 {
            cipher.encrypt(&[], b"x").unwrap();
        }
        assert_eq!(cipher.nonce(), 999);
        assert_eq!(cipher.secret_key(), key_before, "key must not rotate early");

        cipher.encrypt(&[], b"x").unwrap();
        assert_eq!(cipher.nonce(), 0, "nonce resets on rotation");
        assert_ne!(cipher.secret_key(), key_before, "key must rotate on the 1000th use");
    }

    #[test]
    fn drop_wipes_the_secret_key_and_salt() {
        // `forbid(unsafe_code)` rules out reading a value's backing memory
        // after it has actually gone out of scope, so this exercises the
        // same `scrub` call `Drop::drop` makes rather than reading freed
        // memory.
        let mut cipher = CipherState::with_salt([9; 32], [3; 32]);
        cipher.scrub();
        assert_eq!(cipher.secret_key(), [0; 32]);
        assert_eq!(cipher.salt, [0; 32]);
    }
}
