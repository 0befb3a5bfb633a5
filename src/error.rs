use thiserror::Error;

/// Every way the handshake or transport cipher can refuse to proceed.
///
/// On any variant the owning `NoiseState`/`Transport` is terminal: there is no
/// retry or resync, the connection must be dropped.
#[derive(Debug, Error)]
pub enum Error {
    #[error("act one: expected 50 bytes, got {0}")]
    Act1ReadFailed(usize),
    #[error("act one: unsupported handshake version {0}")]
    Act1BadVersion(u8),
    #[error("act one: AEAD tag verification failed")]
    Act1BadTag,

    #[error("act two: expected 50 bytes, got {0}")]
    Act2ReadFailed(usize),
    #[error("act two: unsupported handshake version {0}")]
    Act2BadVersion(u8),
    #[error("act two: AEAD tag verification failed")]
    Act2BadTag,

    #[error("act three: expected 66 bytes, got {0}")]
    Act3ReadFailed(usize),
    #[error("act three: unsupported handshake version {0}")]
    Act3BadVersion(u8),
    #[error("act three: AEAD tag verification failed")]
    Act3BadTag,

    #[error("transport: AEAD tag verification failed")]
    TransportBadTag,

    #[error("handshake method called out of sequence")]
    OutOfSequence,

    #[error("message exceeds the maximum payload length of 65535 bytes ({0} given)")]
    MessageTooLarge(usize),

    #[error("malformed public key: {0}")]
    Crypto(#[from] secp256k1::Error),
}

pub type Result<T> = core::result::Result<T, Error>;
