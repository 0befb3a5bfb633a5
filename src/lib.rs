//! Noise_XK_secp256k1_ChaChaPoly_SHA256 handshake and transport cipher for
//! Lightning Network peer connections, as specified by BOLT #8.
//!
//! This crate is the security boundary of a peer connection: it runs the
//! three-act Noise XK handshake to authenticate the remote party and derive
//! forward-secret session keys, then frames the resulting byte stream as
//! length-prefixed, authenticated, encrypted messages with periodic key
//! rotation. It does not open sockets, generate keys, or parse the Lightning
//! messages carried inside the transport frames (those are the caller's job).
#![forbid(unsafe_code)]

mod cipher;
mod error;
mod handshake;
mod symmetric;
mod transport;

pub use error::{Error, Result};
pub use handshake::{Initiator, NoiseState, Responder, Role};
pub use transport::{Receiver, Sender, MAX_MESSAGE_LEN};

pub use secp256k1::{PublicKey, SecretKey};

#[cfg(test)]
mod tests;
