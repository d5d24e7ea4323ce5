// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! The oblivious pseudo-random function at the heart of the protocol:
//! `Blind`, `Evaluate`, `Unblind` and `Finalize` in OPRF mode over
//! ristretto255, following the VOPRF-08 draft byte formats.

use curve25519_dalek::ristretto::RistrettoPoint;
use curve25519_dalek::scalar::Scalar;
use digest::Digest;
use hkdf::Hkdf;
use rand::{CryptoRng, RngCore};
use sha2::Sha512;
use zeroize::Zeroizing;

use crate::ciphersuite::CipherSuite;
use crate::errors::ProtocolError;
use crate::group;
use crate::group::ELEMENT_LEN;
use crate::serialization::UpdateExt;
use crate::slow_hash::{SlowHash, HARDENED_LEN};

const STR_FINALIZE: &[u8] = b"Finalize-VOPRF08-\x00\x00\x01";

pub(crate) struct BlindResult {
    pub(crate) blind: Scalar,
    pub(crate) blinded_element: RistrettoPoint,
}

/// `Blind`: maps the input to the group and randomizes it with a fresh
/// scalar.
pub(crate) fn blind<R: RngCore + CryptoRng>(
    input: &[u8],
    rng: &mut R,
) -> Result<BlindResult, ProtocolError> {
    let hashed = group::hash_to_group(&[input])?;
    let blind = group::random_scalar(rng)?;
    let blinded_element = group::scalarmult(&blind, &hashed)?;
    Ok(BlindResult {
        blind,
        blinded_element,
    })
}

/// `KeyGen`: a fresh OPRF private key. Only the secret half of the key pair
/// is ever needed.
pub(crate) fn keygen<R: RngCore + CryptoRng>(rng: &mut R) -> Result<Scalar, ProtocolError> {
    group::random_scalar(rng)
}

/// `Evaluate`: applies the server's key to a blinded element received from
/// the peer. The element encoding is validated first.
pub(crate) fn evaluate(
    key: &Scalar,
    blinded_element: &[u8; ELEMENT_LEN],
) -> Result<[u8; ELEMENT_LEN], ProtocolError> {
    let element = group::element_from_slice(blinded_element)?;
    Ok(group::element_to_bytes(&group::scalarmult(key, &element)?))
}

/// `Unblind`: removes the blinding scalar from the evaluated element. The
/// element encoding is validated first.
pub(crate) fn unblind(
    blind: &Scalar,
    evaluated_element: &[u8; ELEMENT_LEN],
) -> Result<[u8; ELEMENT_LEN], ProtocolError> {
    let element = group::element_from_slice(evaluated_element)?;
    let inverted = group::scalar_invert(blind)?;
    Ok(group::element_to_bytes(&group::scalarmult(
        &inverted, &element,
    )?))
}

/// `Finalize`: composes the input with the unblinded element, hardens the
/// digest, and extracts the 64-byte randomized password.
///
/// The returned HKDF state is keyed with the randomized password and feeds
/// every later `Expand` (masking key, envelope keys, client key-pair seed).
pub(crate) fn finalize<CS: CipherSuite>(
    input: &[u8],
    unblinded_element: &[u8; ELEMENT_LEN],
) -> Result<Hkdf<Sha512>, ProtocolError> {
    let mut hasher = Sha512::new();
    hasher.update_prefixed(input);
    hasher.update_prefixed(CS::FINALIZE_INFO);
    hasher.update_prefixed(unblinded_element);
    hasher.update_prefixed(STR_FINALIZE);

    let mut digest = Zeroizing::new([0u8; HARDENED_LEN]);
    digest.copy_from_slice(hasher.finalize().as_slice());

    let hardened = CS::Ksf::hash(&digest)?;

    let mut ikm = Zeroizing::new([0u8; 2 * HARDENED_LEN]);
    ikm[..HARDENED_LEN].copy_from_slice(digest.as_ref());
    ikm[HARDENED_LEN..].copy_from_slice(hardened.as_ref());

    let (_, randomized_pwd) = Hkdf::<Sha512>::extract(None, ikm.as_ref());
    Ok(randomized_pwd)
}

#[cfg(test)]
mod tests {
    use rand::rngs::OsRng;

    use super::*;
    use crate::ciphersuite::CfrgTestSuite;

    // The unblinded element must equal the direct evaluation of the key on
    // the hashed input, independent of the blinding scalar.
    #[test]
    fn blind_evaluate_unblind_composes_to_the_prf() {
        let mut rng = OsRng;
        let input = b"hunter2";
        let key = keygen(&mut rng).unwrap();

        let BlindResult {
            blind,
            blinded_element,
        } = blind(input, &mut rng).unwrap();
        let evaluated = evaluate(&key, &group::element_to_bytes(&blinded_element)).unwrap();
        let unblinded = unblind(&blind, &evaluated).unwrap();

        let hashed = group::hash_to_group(&[input.as_slice()]).unwrap();
        let direct = group::element_to_bytes(&group::scalarmult(&key, &hashed).unwrap());
        assert_eq!(unblinded, direct);
    }

    #[test]
    fn evaluate_rejects_invalid_elements() {
        let mut rng = OsRng;
        let key = keygen(&mut rng).unwrap();
        assert_eq!(
            evaluate(&key, &[0u8; ELEMENT_LEN]),
            Err(ProtocolError::InvalidPoint)
        );
        assert_eq!(
            evaluate(&key, &[0xffu8; ELEMENT_LEN]),
            Err(ProtocolError::InvalidPoint)
        );
    }

    #[test]
    fn finalize_separates_inputs() {
        let n = {
            let mut rng = OsRng;
            group::element_to_bytes(&group::scalarmult_base(&keygen(&mut rng).unwrap()))
        };
        let mut a = [0u8; 64];
        let mut b = [0u8; 64];
        finalize::<CfrgTestSuite>(b"password one", &n)
            .unwrap()
            .expand(b"probe", &mut a)
            .unwrap();
        finalize::<CfrgTestSuite>(b"password two", &n)
            .unwrap()
            .expand(b"probe", &mut b)
            .unwrap();
        assert_ne!(a, b);
    }
}
