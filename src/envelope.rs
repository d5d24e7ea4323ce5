// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! The MAC-authenticated envelope and the key material derived from the
//! randomized password.
//!
//! The envelope carries no ciphertext: the client's long-term key pair is
//! re-derived from the randomized password and the envelope nonce, and the
//! MAC binds that derivation to the server public key and both identities.

use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use rand::{CryptoRng, RngCore};
use sha2::Sha512;
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::errors::utils::check_slice_size;
use crate::errors::ProtocolError;
use crate::group::ELEMENT_LEN;
use crate::key_exchange::{HASH_LEN, MAC_LEN};
use crate::keypair::{KeyPair, PublicKey};
use crate::opaque::Identifiers;
use crate::serialization::UpdateExt;

const STR_MASKING_KEY: &[u8] = b"MaskingKey";
const STR_AUTH_KEY: &[u8] = b"AuthKey";
const STR_EXPORT_KEY: &[u8] = b"ExportKey";
const STR_PRIVATE_KEY: &[u8] = b"PrivateKey";

/// Length of the envelope nonce.
pub const NONCE_LEN: usize = 32;
/// Length of a serialized envelope.
pub const ENVELOPE_LEN: usize = NONCE_LEN + MAC_LEN;

const SEED_LEN: usize = 32;

/// An envelope as stored in the registration record and recovered during
/// login: a fresh nonce and a MAC over the cleartext credentials.
#[derive(Clone, Debug, Eq, PartialEq, Zeroize, ZeroizeOnDrop)]
pub struct Envelope {
    pub(crate) nonce: [u8; NONCE_LEN],
    pub(crate) auth_tag: [u8; MAC_LEN],
}

impl Envelope {
    pub fn serialize(&self) -> [u8; ENVELOPE_LEN] {
        let mut out = [0u8; ENVELOPE_LEN];
        out[..NONCE_LEN].copy_from_slice(&self.nonce);
        out[NONCE_LEN..].copy_from_slice(&self.auth_tag);
        out
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let checked = check_slice_size(bytes, ENVELOPE_LEN, "envelope")?;
        let mut nonce = [0u8; NONCE_LEN];
        let mut auth_tag = [0u8; MAC_LEN];
        nonce.copy_from_slice(&checked[..NONCE_LEN]);
        auth_tag.copy_from_slice(&checked[NONCE_LEN..]);
        Ok(Self { nonce, auth_tag })
    }
}

/// The output of sealing: the envelope itself, the derived client public
/// key, and the two keys the caller keeps (masking key for the record,
/// export key for the application).
pub(crate) struct SealResult {
    pub(crate) envelope: Envelope,
    pub(crate) client_public_key: PublicKey,
    pub(crate) masking_key: Zeroizing<[u8; HASH_LEN]>,
    pub(crate) export_key: Zeroizing<[u8; HASH_LEN]>,
}

/// The output of a successful open: the re-derived client key pair and the
/// export key.
#[derive(Debug)]
pub(crate) struct OpenResult {
    pub(crate) client_keypair: KeyPair,
    pub(crate) export_key: Zeroizing<[u8; HASH_LEN]>,
}

/// Seals an envelope under the randomized password with a fresh nonce.
pub(crate) fn seal<R: RngCore + CryptoRng>(
    rng: &mut R,
    randomized_pwd: &Hkdf<Sha512>,
    server_s_pk: &PublicKey,
    ids: Identifiers<'_>,
) -> Result<SealResult, ProtocolError> {
    let mut nonce = [0u8; NONCE_LEN];
    rng.try_fill_bytes(&mut nonce)
        .map_err(|_| ProtocolError::Randomness)?;
    seal_with_nonce(randomized_pwd, nonce, server_s_pk, ids)
}

/// Deterministic tail of [`seal`], split out so fixed-nonce vectors can
/// drive it.
pub(crate) fn seal_with_nonce(
    randomized_pwd: &Hkdf<Sha512>,
    nonce: [u8; NONCE_LEN],
    server_s_pk: &PublicKey,
    ids: Identifiers<'_>,
) -> Result<SealResult, ProtocolError> {
    let keys = EnvelopeKeys::derive(randomized_pwd, &nonce)?;
    let masking_key = derive_masking_key(randomized_pwd)?;

    let client_public_key = *keys.client_keypair.public();
    let client_pk_bytes = client_public_key.to_bytes();
    let server_pk_bytes = server_s_pk.to_bytes();
    let (id_u, id_s) = ids.resolve(&client_pk_bytes, &server_pk_bytes)?;

    let auth_tag = compute_auth_tag(&keys.auth_key, &nonce, &server_pk_bytes, id_s, id_u)?;

    Ok(SealResult {
        envelope: Envelope { nonce, auth_tag },
        client_public_key,
        masking_key,
        export_key: keys.export_key,
    })
}

/// Re-derives the client credentials from the randomized password and
/// checks the envelope MAC in constant time.
///
/// `server_s_pk` arrives as the raw unmasked bytes: they enter the MAC
/// before any validity check, so a wrong password surfaces here as
/// [`ProtocolError::EnvelopeRecovery`] and nowhere else.
pub(crate) fn open(
    randomized_pwd: &Hkdf<Sha512>,
    envelope: &Envelope,
    server_s_pk: &[u8; ELEMENT_LEN],
    ids: Identifiers<'_>,
) -> Result<OpenResult, ProtocolError> {
    let keys = EnvelopeKeys::derive(randomized_pwd, &envelope.nonce)?;

    let client_pk_bytes = keys.client_keypair.public().to_bytes();
    let (id_u, id_s) = ids.resolve(&client_pk_bytes, server_s_pk)?;

    let expected_tag =
        compute_auth_tag(&keys.auth_key, &envelope.nonce, server_s_pk, id_s, id_u)?;
    if expected_tag[..].ct_eq(&envelope.auth_tag).unwrap_u8() != 1 {
        return Err(ProtocolError::EnvelopeRecovery);
    }

    Ok(OpenResult {
        client_keypair: keys.client_keypair,
        export_key: keys.export_key,
    })
}

/// `masking_key = Expand(randomized_pwd, "MaskingKey", Nh)`; not bound to
/// the envelope nonce, since the server applies it before the envelope is
/// in play.
pub(crate) fn derive_masking_key(
    randomized_pwd: &Hkdf<Sha512>,
) -> Result<Zeroizing<[u8; HASH_LEN]>, ProtocolError> {
    let mut masking_key = Zeroizing::new([0u8; HASH_LEN]);
    randomized_pwd
        .expand(STR_MASKING_KEY, masking_key.as_mut())
        .map_err(|_| expand_error("masking_key", HASH_LEN))?;
    Ok(masking_key)
}

/// The per-envelope derivations: MAC key, export key, and the client's
/// long-term key pair grown from a 32-byte seed.
struct EnvelopeKeys {
    auth_key: Zeroizing<[u8; MAC_LEN]>,
    export_key: Zeroizing<[u8; HASH_LEN]>,
    client_keypair: KeyPair,
}

impl EnvelopeKeys {
    fn derive(
        randomized_pwd: &Hkdf<Sha512>,
        nonce: &[u8; NONCE_LEN],
    ) -> Result<Self, ProtocolError> {
        let mut auth_key = Zeroizing::new([0u8; MAC_LEN]);
        randomized_pwd
            .expand_multi_info(&[nonce, STR_AUTH_KEY], auth_key.as_mut())
            .map_err(|_| expand_error("auth_key", MAC_LEN))?;

        let mut export_key = Zeroizing::new([0u8; HASH_LEN]);
        randomized_pwd
            .expand_multi_info(&[nonce, STR_EXPORT_KEY], export_key.as_mut())
            .map_err(|_| expand_error("export_key", HASH_LEN))?;

        let mut seed = Zeroizing::new([0u8; SEED_LEN]);
        randomized_pwd
            .expand_multi_info(&[nonce, STR_PRIVATE_KEY], seed.as_mut())
            .map_err(|_| expand_error("private_key_seed", SEED_LEN))?;
        let client_keypair = KeyPair::derive_auth_keypair(seed.as_ref())?;

        Ok(Self {
            auth_key,
            export_key,
            client_keypair,
        })
    }
}

// An Expand call can only fail when the requested output exceeds the HKDF
// bound.
fn expand_error(name: &'static str, requested: usize) -> ProtocolError {
    ProtocolError::SizeError {
        name,
        len: 255 * HASH_LEN,
        actual_len: requested,
    }
}

/// `MAC(auth_key, nonce || server_pk || len(idS) || idS || len(idU) || idU)`
fn compute_auth_tag(
    auth_key: &[u8; MAC_LEN],
    nonce: &[u8; NONCE_LEN],
    server_s_pk: &[u8; ELEMENT_LEN],
    id_s: &[u8],
    id_u: &[u8],
) -> Result<[u8; MAC_LEN], ProtocolError> {
    let mut mac = Hmac::<Sha512>::new_from_slice(auth_key).map_err(|_| ProtocolError::SizeError {
        name: "auth_key",
        len: MAC_LEN,
        actual_len: auth_key.len(),
    })?;
    mac.update(nonce);
    mac.update(server_s_pk);
    mac.update_prefixed(id_s);
    mac.update_prefixed(id_u);

    let mut tag = [0u8; MAC_LEN];
    tag.copy_from_slice(mac.finalize().into_bytes().as_slice());
    Ok(tag)
}

#[cfg(test)]
mod tests {
    use rand::rngs::OsRng;

    use super::*;
    use crate::ciphersuite::CfrgTestSuite;
    use crate::oprf;

    fn randomized_pwd(password: &[u8]) -> Hkdf<Sha512> {
        let mut rng = OsRng;
        let n = crate::group::element_to_bytes(&crate::group::scalarmult_base(
            &crate::group::random_scalar(&mut rng).unwrap(),
        ));
        oprf::finalize::<CfrgTestSuite>(password, &n).unwrap()
    }

    fn server_pk() -> PublicKey {
        *KeyPair::generate_random(&mut OsRng).unwrap().public()
    }

    #[test]
    fn seal_then_open_recovers_the_same_keypair() {
        let rwd = randomized_pwd(b"hunter2");
        let pk = server_pk();

        let sealed = seal(&mut OsRng, &rwd, &pk, Identifiers::default()).unwrap();
        let opened = open(
            &rwd,
            &sealed.envelope,
            &pk.to_bytes(),
            Identifiers::default(),
        )
        .unwrap();

        assert_eq!(*opened.client_keypair.public(), sealed.client_public_key);
        assert_eq!(*opened.export_key, *sealed.export_key);
    }

    #[test]
    fn open_rejects_a_flipped_tag_bit() {
        let rwd = randomized_pwd(b"hunter2");
        let pk = server_pk();

        let sealed = seal(&mut OsRng, &rwd, &pk, Identifiers::default()).unwrap();
        let mut tampered = sealed.envelope.clone();
        tampered.auth_tag[0] ^= 0x01;

        assert_eq!(
            open(&rwd, &tampered, &pk.to_bytes(), Identifiers::default()).unwrap_err(),
            ProtocolError::EnvelopeRecovery
        );
    }

    #[test]
    fn open_is_bound_to_the_identities() {
        let rwd = randomized_pwd(b"hunter2");
        let pk = server_pk();
        let ids = Identifiers {
            client: Some(b"alice"),
            server: Some(b"example.com"),
        };

        let sealed = seal(&mut OsRng, &rwd, &pk, ids).unwrap();
        assert!(open(&rwd, &sealed.envelope, &pk.to_bytes(), ids).is_ok());
        assert_eq!(
            open(
                &rwd,
                &sealed.envelope,
                &pk.to_bytes(),
                Identifiers {
                    client: Some(b"mallory"),
                    server: Some(b"example.com"),
                },
            )
            .unwrap_err(),
            ProtocolError::EnvelopeRecovery
        );
    }

    #[test]
    fn envelope_serialization_round_trips() {
        let rwd = randomized_pwd(b"hunter2");
        let sealed = seal(&mut OsRng, &rwd, &server_pk(), Identifiers::default()).unwrap();
        let restored = Envelope::deserialize(&sealed.envelope.serialize()).unwrap();
        assert_eq!(restored, sealed.envelope);
        assert!(Envelope::deserialize(&[0u8; ENVELOPE_LEN - 1]).is_err());
    }
}
