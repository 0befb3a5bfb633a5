use crate::cipher::CipherState;
use crate::error::{Error, Result};

/// The largest plaintext payload a single transport message may carry.
pub const MAX_MESSAGE_LEN: usize = u16::MAX as usize;

/// Post-handshake encryption state: independent send/receive ciphers, each
/// with its own nonce counter and key-rotation schedule.
pub(crate) struct TransportState {
    send: CipherState,
    recv: CipherState,
}

impl TransportState {
    pub(crate) fn new(chaining_key: [u8; 32], sk: [u8; 32], rk: [u8; 32]) -> Self {
        TransportState {
            send: CipherState::with_salt(chaining_key, sk),
            recv: CipherState::with_salt(chaining_key, rk),
        }
    }

    pub(crate) fn encrypt_message(&mut self, plaintext: &[u8]) -> Result<Vec<u8>> {
        encrypt_message(&mut self.send, plaintext)
    }

    pub(crate) fn decrypt_length(&mut self, length_frame: &[u8]) -> Result<u16> {
        decrypt_length(&mut self.recv, length_frame)
    }

    pub(crate) fn decrypt_message(&mut self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        decrypt_message(&mut self.recv, ciphertext)
    }

    pub(crate) fn split(self) -> (Sender, Receiver) {
        (Sender { cipher: self.send }, Receiver { cipher: self.recv })
    }

    #[cfg(test)]
    pub(crate) fn send_key(&self) -> [u8; 32] {
        self.send.secret_key()
    }

    #[cfg(test)]
    pub(crate) fn recv_key(&self) -> [u8; 32] {
        self.recv.secret_key()
    }
}

fn encrypt_message(cipher: &mut CipherState, plaintext: &[u8]) -> Result<Vec<u8>> {
    if plaintext.len() > MAX_MESSAGE_LEN {
        return Err(Error::MessageTooLarge(plaintext.len()));
    }

    // Encrypt+auth'd length prefix first; encrypting it is itself a use of
    // the key and therefore advances/rotates sn on its own, independent of
    // the body that follows.
    let length = (plaintext.len() as u16).to_be_bytes();
    let mut framed = cipher.encrypt(&[], &length)?;
    let mut body = cipher.encrypt(&[], plaintext)?;
    framed.append(&mut body);

    tracing::trace!(len = plaintext.len(), "transport message encrypted");
    Ok(framed)
}

fn decrypt_length(cipher: &mut CipherState, length_frame: &[u8]) -> Result<u16> {
    let plaintext = cipher.decrypt(&[], length_frame, Error::TransportBadTag)?;
    Ok(u16::from_be_bytes([plaintext[0], plaintext[1]]))
}

fn decrypt_message(cipher: &mut CipherState, ciphertext: &[u8]) -> Result<Vec<u8>> {
    let plaintext = cipher.decrypt(&[], ciphertext, Error::TransportBadTag)?;
    tracing::trace!(len = plaintext.len(), "transport message decrypted");
    Ok(plaintext)
}

/// The sending half of a transport cipher split via `NoiseState::split`.
///
/// Owns only what a writer task needs: the send key and its nonce counter.
pub struct Sender {
    cipher: CipherState,
}

impl Sender {
    pub fn encrypt_message(&mut self, plaintext: &[u8]) -> Result<Vec<u8>> {
        encrypt_message(&mut self.cipher, plaintext)
    }
}

/// The receiving half of a transport cipher split via `NoiseState::split`.
///
/// Callers must call `decrypt_length` then `decrypt_message` in strict
/// alternation; there is no way to recover synchronization otherwise.
pub struct Receiver {
    cipher: CipherState,
}

impl Receiver {
    pub fn decrypt_length(&mut self, length_frame: &[u8]) -> Result<u16> {
        decrypt_length(&mut self.cipher, length_frame)
    }

    pub fn decrypt_message(&mut self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        decrypt_message(&mut self.cipher, ciphertext)
    }
}
