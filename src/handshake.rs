use core::marker::PhantomData;

use hkdf::Hkdf;
use secp256k1::ecdh::SharedSecret;
use secp256k1::{PublicKey, SecretKey, SECP256K1};
use sha2::Sha256;
use zeroize::Zeroize;

use crate::error::{Error, Result};
use crate::symmetric::SymmetricState;
use crate::transport::{Receiver, Sender, TransportState};

const PROTOCOL_NAME: &[u8] = b"Noise_XK_secp256k1_ChaChaPoly_SHA256";
const PROLOGUE: &[u8] = b"lightning";

const ACT_ONE_TWO_SIZE: usize = 1 + 33 + 16;
const ACT_THREE_SIZE: usize = 1 + 33 + 16 + 16;
const HANDSHAKE_VERSION: u8 = 0;

mod sealed {
    pub trait Sealed {}
    impl Sealed for super::Initiator {}
    impl Sealed for super::Responder {}
}

/// Distinguishes the two handshake roles at the type level, so that the
/// asymmetric HKDF split at the end of act 3 cannot be crossed by calling the
/// wrong role's methods.
pub trait Role: sealed::Sealed {
    #[doc(hidden)]
    const IS_INITIATOR: bool;
}

/// The side that knows the peer's static public key before the handshake
/// begins, and speaks first.
#[derive(Debug, Clone, Copy)]
pub struct Initiator;

/// The side that learns the peer's static public key in act 3.
#[derive(Debug, Clone, Copy)]
pub struct Responder;

impl Role for Initiator {
    const IS_INITIATOR: bool = true;
}
impl Role for Responder {
    const IS_INITIATOR: bool = false;
}

fn ecdh(point: &PublicKey, scalar: &SecretKey) -> [u8; 32] {
    // secp256k1's `ecdh` feature hashes the compressed shared point with
    // SHA-256 by default, which is exactly the `ecdh` primitive BOLT #8
    // specifies (not a bespoke hash picked by this crate).
    SharedSecret::new(point, scalar).secret_bytes()
}

// Tracks how far a handshake has progressed so an out-of-order call fails
// instead of silently reusing or skipping a step.
#[derive(PartialEq, Eq)]
enum Step {
    Fresh,
    ActOneDone,
    ActTwoDone,
}

struct HandshakeState<R: Role> {
    symmetric: SymmetricState,
    local_static: SecretKey,
    local_ephemeral: SecretKey,
    remote_static: Option<PublicKey>,
    remote_ephemeral: Option<PublicKey>,
    step: Step,
    _role: PhantomData<R>,
}

enum Inner<R: Role> {
    Handshake(HandshakeState<R>),
    Transport(TransportState),
    Terminated,
}

/// The Noise_XK_secp256k1_ChaChaPoly_SHA256 handshake and transport state
/// machine for one Lightning peer connection (BOLT #8).
///
/// `R` is `Initiator` or `Responder`; only the six role-appropriate act
/// methods are available on a given instance. Once act 3 completes, the
/// handshake-only methods disappear (the state transitions internally) and
/// `encrypt_message`/`decrypt_length`/`decrypt_message`/`split` become the
/// only valid operations, regardless of role.
pub struct NoiseState<R: Role> {
    inner: Inner<R>,
}

impl<R: Role> NoiseState<R> {
    fn take_handshake(&mut self, expected: Step) -> Result<HandshakeState<R>> {
        match core::mem::replace(&mut self.inner, Inner::Terminated) {
            Inner::Handshake(hs) if hs.step == expected => Ok(hs),
            _ => Err(Error::OutOfSequence),
        }
    }

    fn transport_mut(&mut self) -> Result<&mut TransportState> {
        match &mut self.inner {
            Inner::Transport(transport) => Ok(transport),
            _ => Err(Error::OutOfSequence),
        }
    }

    /// Transport send. Valid only once the handshake has completed.
    pub fn encrypt_message(&mut self, plaintext: &[u8]) -> Result<Vec<u8>> {
        self.transport_mut()?.encrypt_message(plaintext)
    }

    /// First phase of transport receive: decrypts the 18-byte length frame.
    /// Must be followed by exactly one `decrypt_message` call before the next
    /// `decrypt_length`.
    pub fn decrypt_length(&mut self, length_frame: &[u8]) -> Result<u16> {
        self.transport_mut()?.decrypt_length(length_frame)
    }

    /// Second phase of transport receive: decrypts the message body.
    pub fn decrypt_message(&mut self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        self.transport_mut()?.decrypt_message(ciphertext)
    }

    /// Consumes the handshake-complete state into independent `Sender`/
    /// `Receiver` halves so the read and write paths can live on different
    /// tasks.
    pub fn split(self) -> Result<(Sender, Receiver)> {
        match self.inner {
            Inner::Transport(transport) => Ok(transport.split()),
            _ => Err(Error::OutOfSequence),
        }
    }

    #[cfg(test)]
    pub(crate) fn transport_keys(&self) -> Option<([u8; 32], [u8; 32])> {
        match &self.inner {
            Inner::Transport(transport) => Some((transport.send_key(), transport.recv_key())),
            _ => None,
        }
    }
}

impl NoiseState<Initiator> {
    /// Constructs an initiator. `local_ephemeral` must be freshly generated
    /// per connection by the caller (key generation is out of scope here).
    pub fn new_initiator(
        local_static: SecretKey,
        local_ephemeral: SecretKey,
        remote_static: PublicKey,
    ) -> Self {
        let symmetric = SymmetricState::new(PROTOCOL_NAME, PROLOGUE, &remote_static.serialize());
        NoiseState {
            inner: Inner::Handshake(HandshakeState {
                symmetric,
                local_static,
                local_ephemeral,
                remote_static: Some(remote_static),
                remote_ephemeral: None,
                step: Step::Fresh,
                _role: PhantomData,
            }),
        }
    }

    /// Produces act 1: `0x00 || epk(33) || tag(16)`, 50 bytes.
    pub fn initiator_act1(&mut self) -> Result<[u8; 50]> {
        let mut hs = self.take_handshake(Step::Fresh)?;

        let local_ephemeral_pub = PublicKey::from_secret_key(SECP256K1, &hs.local_ephemeral);
        let epk = local_ephemeral_pub.serialize();
        hs.symmetric.mix_hash(&epk);

        let remote_static = hs
            .remote_static
            .expect("initiator always knows the remote static key");
        let shared = ecdh(&remote_static, &hs.local_ephemeral);
        hs.symmetric.mix_key(&shared);

        let tag = hs.symmetric.encrypt_and_hash(&[])?;

        let mut out = [0u8; 50];
        out[0] = HANDSHAKE_VERSION;
        out[1..34].copy_from_slice(&epk);
        out[34..50].copy_from_slice(&tag);

        hs.step = Step::ActOneDone;
        self.inner = Inner::Handshake(hs);
        tracing::debug!("initiator act 1 sent");
        Ok(out)
    }

    /// Consumes act 2: validates and processes the responder's 50-byte
    /// reply.
    pub fn initiator_act2(&mut self, message: &[u8]) -> Result<()> {
        let mut hs = self.take_handshake(Step::ActOneDone)?;

        if message.len() != ACT_ONE_TWO_SIZE {
            return Err(Error::Act2ReadFailed(message.len()));
        }
        if message[0] != HANDSHAKE_VERSION {
            return Err(Error::Act2BadVersion(message[0]));
        }
        let remote_ephemeral = PublicKey::from_slice(&message[1..34])?;
        let tag = &message[34..50];

        hs.symmetric.mix_hash(&remote_ephemeral.serialize());
        let shared = ecdh(&remote_ephemeral, &hs.local_ephemeral);
        hs.symmetric.mix_key(&shared);
        hs.symmetric.decrypt_and_hash(tag, Error::Act2BadTag)?;

        hs.remote_ephemeral = Some(remote_ephemeral);
        hs.step = Step::ActTwoDone;
        self.inner = Inner::Handshake(hs);
        tracing::debug!("initiator act 2 received");
        Ok(())
    }

    /// Produces act 3 and completes the handshake, transitioning this
    /// `NoiseState` into its transport phase.
    pub fn initiator_act3(&mut self) -> Result<[u8; 66]> {
        let mut hs = self.take_handshake(Step::ActTwoDone)?;

        let local_static_pub = PublicKey::from_secret_key(SECP256K1, &hs.local_static);
        let encrypted_static = hs.symmetric.encrypt_and_hash(&local_static_pub.serialize())?;

        let remote_ephemeral = hs
            .remote_ephemeral
            .expect("act 2 populates the remote ephemeral key");
        let shared = ecdh(&remote_ephemeral, &hs.local_static);
        hs.symmetric.mix_key(&shared);

        let final_tag = hs.symmetric.encrypt_and_hash(&[])?;

        let (send_key, recv_key) = split_transport_keys::<Initiator>(hs.symmetric.chaining_key());
        let transport = TransportState::new(hs.symmetric.chaining_key(), send_key, recv_key);

        let mut out = [0u8; 66];
        out[0] = HANDSHAKE_VERSION;
        out[1..50].copy_from_slice(&encrypted_static);
        out[50..66].copy_from_slice(&final_tag);

        self.inner = Inner::Transport(transport);
        tracing::debug!("initiator act 3 sent; handshake complete");
        Ok(out)
    }
}

impl NoiseState<Responder> {
    /// Constructs a responder. The remote static key is unknown until act 3.
    pub fn new_responder(local_static: SecretKey, local_ephemeral: SecretKey) -> Self {
        let local_static_pub = PublicKey::from_secret_key(SECP256K1, &local_static);
        let symmetric = SymmetricState::new(PROTOCOL_NAME, PROLOGUE, &local_static_pub.serialize());
        NoiseState {
            inner: Inner::Handshake(HandshakeState {
                symmetric,
                local_static,
                local_ephemeral,
                remote_static: None,
                remote_ephemeral: None,
                step: Step::Fresh,
                _role: PhantomData,
            }),
        }
    }

    /// Consumes act 1: validates and processes the initiator's 50-byte
    /// opening message.
    pub fn receive_act1(&mut self, message: &[u8]) -> Result<()> {
        let mut hs = self.take_handshake(Step::Fresh)?;

        if message.len() != ACT_ONE_TWO_SIZE {
            return Err(Error::Act1ReadFailed(message.len()));
        }
        if message[0] != HANDSHAKE_VERSION {
            return Err(Error::Act1BadVersion(message[0]));
        }
        let remote_ephemeral = PublicKey::from_slice(&message[1..34])?;
        let tag = &message[34..50];

        hs.symmetric.mix_hash(&remote_ephemeral.serialize());
        let shared = ecdh(&remote_ephemeral, &hs.local_static);
        hs.symmetric.mix_key(&shared);
        hs.symmetric.decrypt_and_hash(tag, Error::Act1BadTag)?;

        hs.remote_ephemeral = Some(remote_ephemeral);
        hs.step = Step::ActOneDone;
        self.inner = Inner::Handshake(hs);
        tracing::debug!("responder act 1 received");
        Ok(())
    }

    /// Produces act 2. Named `receive_act2` for parity with the other five
    /// engine entry points even though it emits the outbound message rather
    /// than consuming one.
    pub fn receive_act2(&mut self) -> Result<[u8; 50]> {
        let mut hs = self.take_handshake(Step::ActOneDone)?;

        let local_ephemeral_pub = PublicKey::from_secret_key(SECP256K1, &hs.local_ephemeral);
        let epk = local_ephemeral_pub.serialize();
        hs.symmetric.mix_hash(&epk);

        let remote_ephemeral = hs
            .remote_ephemeral
            .expect("act 1 populates the remote ephemeral key");
        let shared = ecdh(&remote_ephemeral, &hs.local_ephemeral);
        hs.symmetric.mix_key(&shared);

        let tag = hs.symmetric.encrypt_and_hash(&[])?;

        let mut out = [0u8; 50];
        out[0] = HANDSHAKE_VERSION;
        out[1..34].copy_from_slice(&epk);
        out[34..50].copy_from_slice(&tag);

        hs.step = Step::ActTwoDone;
        self.inner = Inner::Handshake(hs);
        tracing::debug!("responder act 2 sent");
        Ok(out)
    }

    /// Consumes act 3, learning and authenticating the initiator's
    /// static public key, and completes the handshake. Returns the learned
    /// key so the caller can check it against whatever access policy applies
    /// at a layer above this crate.
    pub fn receive_act3(&mut self, message: &[u8]) -> Result<PublicKey> {
        let mut hs = self.take_handshake(Step::ActTwoDone)?;

        if message.len() != ACT_THREE_SIZE {
            return Err(Error::Act3ReadFailed(message.len()));
        }
        if message[0] != HANDSHAKE_VERSION {
            return Err(Error::Act3BadVersion(message[0]));
        }
        let encrypted_static = &message[1..50];
        let final_tag = &message[50..66];

        let remote_static_bytes = hs
            .symmetric
            .decrypt_and_hash(encrypted_static, Error::Act3BadTag)?;
        let remote_static = PublicKey::from_slice(&remote_static_bytes)?;

        let local_ephemeral = hs.local_ephemeral;
        let shared = ecdh(&remote_static, &local_ephemeral);
        hs.symmetric.mix_key(&shared);

        hs.symmetric.decrypt_and_hash(final_tag, Error::Act3BadTag)?;

        let (send_key, recv_key) = split_transport_keys::<Responder>(hs.symmetric.chaining_key());
        let transport = TransportState::new(hs.symmetric.chaining_key(), send_key, recv_key);

        self.inner = Inner::Transport(transport);
        tracing::debug!("responder act 3 received; handshake complete");
        Ok(remote_static)
    }
}

// Derives the transport send/receive keys from the final chaining key, with
// the role-dependent assignment baked into the type parameter rather than an
// `if initiator` branch at the call site.
fn split_transport_keys<R: Role>(chaining_key: [u8; 32]) -> ([u8; 32], [u8; 32]) {
    let hkdf = Hkdf::<Sha256>::extract(Some(&chaining_key), &[]);
    let mut okm = [0u8; 64];
    hkdf.expand(&[], &mut okm)
        .expect("64 is a valid HKDF-SHA256 output length");

    let first: [u8; 32] = okm[..32].try_into().expect("slice is exactly 32 bytes");
    let second: [u8; 32] = okm[32..].try_into().expect("slice is exactly 32 bytes");
    okm.zeroize();

    if R::IS_INITIATOR {
        (first, second) // sk := first, rk := second
    } else {
        (second, first) // sk := second, rk := first
    }
}
