use hkdf::Hkdf;
use sha2::{Digest, Sha256};
use zeroize::Zeroize;

use crate::cipher::CipherState;
use crate::error::{Error, Result};

/// Houses the rolling handshake hash `h`, the chaining key `ck`, and the
/// transient AEAD cipher derived from the latest `mix_key`. This is the piece
/// that all three acts, for both roles, funnel their ECDH outputs through.
pub(crate) struct SymmetricState {
    cipher_state: CipherState,
    chaining_key: [u8; 32],
    handshake_digest: [u8; 32],
}

impl Drop for SymmetricState {
    fn drop(&mut self) {
        self.scrub();
    }
}

impl SymmetricState {
    /// Initializes `h`/`ck` from the protocol name, then mixes in the
    /// prologue and the seed public key, so a `SymmetricState` is never
    /// observed half-initialized.
    pub(crate) fn new(protocol_name: &[u8], prologue: &[u8], seed_pub: &[u8]) -> Self {
        let mut handshake_digest = [0u8; 32];
        handshake_digest.copy_from_slice(&Sha256::digest(protocol_name));
        let chaining_key = handshake_digest;

        let mut state = SymmetricState {
            cipher_state: CipherState::new([0; 32]),
            chaining_key,
            handshake_digest,
        };
        state.mix_hash(prologue);
        state.mix_hash(seed_pub);
        state
    }

    /// Hashes `data` into the cumulative handshake digest, which is later
    /// used as the associated data for every AEAD operation.
    pub(crate) fn mix_hash(&mut self, data: &[u8]) {
        let mut hasher = Sha256::new();
        hasher.update(self.handshake_digest);
        hasher.update(data);
        self.handshake_digest.copy_from_slice(&hasher.finalize());
    }

    /// Ratchets the chaining key forward with an ECDH output and derives the
    /// next transient AEAD key, replacing the cipher state wholesale.
    pub(crate) fn mix_key(&mut self, ikm: &[u8]) {
        let hkdf = Hkdf::<Sha256>::extract(Some(&self.chaining_key), ikm);
        let mut okm = [0u8; 64];
        hkdf.expand(&[], &mut okm)
            .expect("64 is a valid HKDF-SHA256 output length");

        self.chaining_key.copy_from_slice(&okm[..32]);
        let temp_key: [u8; 32] = okm[32..].try_into().expect("slice is exactly 32 bytes");
        okm.zeroize();

        self.cipher_state = CipherState::new(temp_key);
    }

    /// Encrypts `plaintext` under the current temp key with `h` as associated
    /// data, then mixes the ciphertext into `h`.
    pub(crate) fn encrypt_and_hash(&mut self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let ciphertext = self.cipher_state.encrypt(&self.handshake_digest, plaintext)?;
        self.mix_hash(&ciphertext);
        Ok(ciphertext)
    }

    /// Decrypts `ciphertext` under the current temp key with `h` as
    /// associated data, then mixes the ciphertext into `h`. `bad_tag` is
    /// surfaced verbatim on authentication failure.
    pub(crate) fn decrypt_and_hash(&mut self, ciphertext: &[u8], bad_tag: Error) -> Result<Vec<u8>> {
        let associated_data = self.handshake_digest;
        let plaintext = self
            .cipher_state
            .decrypt(&associated_data, ciphertext, bad_tag)?;
        self.mix_hash(ciphertext);
        Ok(plaintext)
    }

    // Wipes `ck`/`h`. Factored out of `Drop::drop` so the wipe itself has a
    // direct test below, not just its scheduling.
    fn scrub(&mut self) {
        self.chaining_key.zeroize();
        self.handshake_digest.zeroize();
    }

    pub(crate) fn chaining_key(&self) -> [u8; 32] {
        self.chaining_key
    }

    #[cfg(test)]
    pub(crate) fn handshake_digest(&self) -> [u8; 32] {
        self.handshake_digest
    }
}
