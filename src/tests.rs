//! End-to-end BOLT #8 test vectors, exercised only through the public API.
//!
//! Keys and expected ciphertexts below are the well-known deterministic
//! vectors published alongside BOLT #8 ("Test Vectors" section): initiator
//! static/ephemeral keys of repeated `0x11`/`0x12` bytes, responder
//! static/ephemeral keys of repeated `0x21`/`0x22` bytes.

use crate::{NoiseState, PublicKey, SecretKey};

fn key(hex_str: &str) -> SecretKey {
    let bytes = hex::decode(hex_str).unwrap();
    SecretKey::from_slice(&bytes).unwrap()
}

const INITIATOR_STATIC: &str = "1111111111111111111111111111111111111111111111111111111111111111";
const INITIATOR_EPHEMERAL: &str = "1212121212121212121212121212121212121212121212121212121212121212";
const RESPONDER_STATIC: &str = "2121212121212121212121212121212121212121212121212121212121212121";
const RESPONDER_EPHEMERAL: &str = "2222222222222222222222222222222222222222222222222222222222222222";

const ACT_ONE_EXPECTED: &str =
    "00036360e856310ce5d294e8be33fc807077dc56ac80d95d9cd4ddbd21325eff73f70df6086551151f58b8afe6c195782c6a";
const ACT_TWO_EXPECTED: &str =
    "0002466d7fcae563e5cb09a0d1870bb580344804617879a14949cf22285f1bae3f276e2470b93aac583c9ef6eafca3f730ae";
// The published act 3 vector runs to 66 bytes; this crate's copy of the
// vector text only carries the first 50 (version || encrypted static key ||
// first half of the final tag). Assert the prefix we have and the length
// act 3 must be, rather than hold out for bytes this copy doesn't contain.
const ACT_THREE_EXPECTED_PREFIX: &str =
    "00b9e3a702e93e3a9948c2ed6e5fd7590a6e1c3a0344cfc9d5b57357049aa22355361aa02e55a8fc28fef5bd6d71ad0c3822";

const INITIATOR_SEND_KEY: &str = "969ab31b4d288cedf6218839b27a3e2140827047f2c0f01bf5c04435d43511a9";
const INITIATOR_RECV_KEY: &str = "bb9020b8965f4df047e07f955f3c4b88418984aadc5cdb35096b9ea8fa5c3442";

fn initiator_static_key() -> SecretKey {
    key(INITIATOR_STATIC)
}

fn responder_static_key() -> SecretKey {
    key(RESPONDER_STATIC)
}

#[test]
fn act_one_matches_the_published_vector() {
    let responder_pub = PublicKey::from_secret_key(secp256k1::SECP256K1, &responder_static_key());
    let mut initiator =
        NoiseState::new_initiator(initiator_static_key(), key(INITIATOR_EPHEMERAL), responder_pub);

    let act1 = initiator.initiator_act1().unwrap();
    assert_eq!(hex::encode(act1), ACT_ONE_EXPECTED);
}

#[test]
fn act_two_matches_the_published_vector() {
    let responder_pub = PublicKey::from_secret_key(secp256k1::SECP256K1, &responder_static_key());
    let mut initiator =
        NoiseState::new_initiator(initiator_static_key(), key(INITIATOR_EPHEMERAL), responder_pub);
    let mut responder = NoiseState::new_responder(responder_static_key(), key(RESPONDER_EPHEMERAL));

    let act1 = initiator.initiator_act1().unwrap();
    responder.receive_act1(&act1).unwrap();
    let act2 = responder.receive_act2().unwrap();
    assert_eq!(hex::encode(act2), ACT_TWO_EXPECTED);
}

#[test]
fn full_handshake_matches_the_published_vectors_and_derives_the_published_keys() {
    let responder_pub = PublicKey::from_secret_key(secp256k1::SECP256K1, &responder_static_key());
    let mut initiator =
        NoiseState::new_initiator(initiator_static_key(), key(INITIATOR_EPHEMERAL), responder_pub);
    let mut responder = NoiseState::new_responder(responder_static_key(), key(RESPONDER_EPHEMERAL));

    let act1 = initiator.initiator_act1().unwrap();
    assert_eq!(hex::encode(act1), ACT_ONE_EXPECTED);
    responder.receive_act1(&act1).unwrap();

    let act2 = responder.receive_act2().unwrap();
    assert_eq!(hex::encode(act2), ACT_TWO_EXPECTED);
    initiator.initiator_act2(&act2).unwrap();

    let act3 = initiator.initiator_act3().unwrap();
    assert_eq!(act3.len(), 66, "act 3 is version(1) || ct(49) || tag(16)");
    assert_eq!(hex::encode(&act3[..50]), ACT_THREE_EXPECTED_PREFIX);

    let learned = responder.receive_act3(&act3).unwrap();
    assert_eq!(learned, PublicKey::from_secret_key(secp256k1::SECP256K1, &initiator_static_key()));

    let expected_sk: [u8; 32] = hex::decode(INITIATOR_SEND_KEY).unwrap().try_into().unwrap();
    let expected_rk: [u8; 32] = hex::decode(INITIATOR_RECV_KEY).unwrap().try_into().unwrap();
    let (initiator_sk, initiator_rk) = initiator.transport_keys().unwrap();
    assert_eq!(initiator_sk, expected_sk);
    assert_eq!(initiator_rk, expected_rk);
    assert_eq!(responder.transport_keys().unwrap(), (expected_rk, expected_sk));

    let from_initiator = initiator.encrypt_message(b"swordfish").unwrap();
    let len = responder.decrypt_length(&from_initiator[..18]).unwrap();
    let pt = responder
        .decrypt_message(&from_initiator[18..18 + len as usize + 16])
        .unwrap();
    assert_eq!(pt, b"swordfish");

    let from_responder = responder.encrypt_message(b"acknowledged").unwrap();
    let len = initiator.decrypt_length(&from_responder[..18]).unwrap();
    let pt = initiator
        .decrypt_message(&from_responder[18..18 + len as usize + 16])
        .unwrap();
    assert_eq!(pt, b"acknowledged");
}

#[test]
fn split_senders_and_receivers_keep_talking_across_many_messages() {
    let responder_pub = PublicKey::from_secret_key(secp256k1::SECP256K1, &responder_static_key());
    let mut initiator =
        NoiseState::new_initiator(initiator_static_key(), key(INITIATOR_EPHEMERAL), responder_pub);
    let mut responder = NoiseState::new_responder(responder_static_key(), key(RESPONDER_EPHEMERAL));

    let act1 = initiator.initiator_act1().unwrap();
    responder.receive_act1(&act1).unwrap();
    let act2 = responder.receive_act2().unwrap();
    initiator.initiator_act2(&act2).unwrap();
    let act3 = initiator.initiator_act3().unwrap();
    responder.receive_act3(&act3).unwrap();

    let (mut initiator_tx, mut initiator_rx) = initiator.split().unwrap();
    let (mut responder_tx, mut responder_rx) = responder.split().unwrap();

    for i in 0u32..5 {
        let msg = format!("message {i}");
        let framed = initiator_tx.encrypt_message(msg.as_bytes()).unwrap();
        let len = responder_rx.decrypt_length(&framed[..18]).unwrap();
        let pt = responder_rx
            .decrypt_message(&framed[18..18 + len as usize + 16])
            .unwrap();
        assert_eq!(pt, msg.as_bytes());
    }

    let reply = responder_tx.encrypt_message(b"ack").unwrap();
    let len = initiator_rx.decrypt_length(&reply[..18]).unwrap();
    let pt = initiator_rx.decrypt_message(&reply[18..18 + len as usize + 16]).unwrap();
    assert_eq!(pt, b"ack");
}
