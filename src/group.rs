// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Thin wrappers around ristretto255 point and scalar arithmetic.
//!
//! Everything a peer can influence comes through [`element_from_slice`],
//! which enforces the canonical validity check (decompression succeeds and
//! the element is not the identity) before the bytes are ever used as the
//! base of a scalar multiplication.

use curve25519_dalek::constants::RISTRETTO_BASEPOINT_TABLE;
use curve25519_dalek::ristretto::{CompressedRistretto, RistrettoPoint};
use curve25519_dalek::scalar::Scalar;
use curve25519_dalek::traits::Identity;
use rand::{CryptoRng, RngCore};
use zeroize::Zeroizing;

use crate::errors::ProtocolError;
use crate::hash2curve::{expand_message_xmd, STR_HASH_TO_GROUP};

/// Length of a serialized group element.
pub const ELEMENT_LEN: usize = 32;
/// Length of a serialized scalar.
pub const SCALAR_LEN: usize = 32;

const UNIFORM_BYTES_LEN: usize = 64;

/// Samples a uniform non-zero scalar by wide reduction of 64 RNG bytes.
pub(crate) fn random_scalar<R: RngCore + CryptoRng>(rng: &mut R) -> Result<Scalar, ProtocolError> {
    loop {
        let mut wide = Zeroizing::new([0u8; UNIFORM_BYTES_LEN]);
        rng.try_fill_bytes(wide.as_mut())
            .map_err(|_| ProtocolError::Randomness)?;
        let scalar = Scalar::from_bytes_mod_order_wide(&wide);
        if scalar != Scalar::ZERO {
            return Ok(scalar);
        }
    }
}

pub(crate) fn scalar_invert(scalar: &Scalar) -> Result<Scalar, ProtocolError> {
    if scalar == &Scalar::ZERO {
        return Err(ProtocolError::InvalidPoint);
    }
    Ok(scalar.invert())
}

/// Deserializes a canonical scalar, e.g. when rebuilding client state.
pub(crate) fn scalar_from_slice(bytes: &[u8; SCALAR_LEN]) -> Result<Scalar, ProtocolError> {
    Option::from(Scalar::from_canonical_bytes(*bytes)).ok_or(ProtocolError::InvalidPoint)
}

/// The canonical is-valid-point check applied to all peer-supplied element
/// encodings: must decompress and must not be the identity.
pub(crate) fn element_from_slice(
    bytes: &[u8; ELEMENT_LEN],
) -> Result<RistrettoPoint, ProtocolError> {
    let element = CompressedRistretto(*bytes)
        .decompress()
        .ok_or(ProtocolError::InvalidPoint)?;
    if element == RistrettoPoint::identity() {
        return Err(ProtocolError::InvalidPoint);
    }
    Ok(element)
}

pub(crate) fn scalarmult_base(scalar: &Scalar) -> RistrettoPoint {
    scalar * RISTRETTO_BASEPOINT_TABLE
}

/// Scalar multiplication with the identity-result rejection libsodium
/// applies to its `crypto_scalarmult_ristretto255`.
pub(crate) fn scalarmult(
    scalar: &Scalar,
    element: &RistrettoPoint,
) -> Result<RistrettoPoint, ProtocolError> {
    let product = element * scalar;
    if product == RistrettoPoint::identity() {
        return Err(ProtocolError::InvalidPoint);
    }
    Ok(product)
}

pub(crate) fn element_to_bytes(element: &RistrettoPoint) -> [u8; ELEMENT_LEN] {
    element.compress().to_bytes()
}

/// `HashToGroup`: expands `msg` to 64 uniform bytes under the group DST and
/// maps them through the ristretto255 one-way map.
pub(crate) fn hash_to_group(msg: &[&[u8]]) -> Result<RistrettoPoint, ProtocolError> {
    let mut uniform_bytes = Zeroizing::new([0u8; UNIFORM_BYTES_LEN]);
    expand_message_xmd(msg, STR_HASH_TO_GROUP, uniform_bytes.as_mut())?;
    Ok(RistrettoPoint::from_uniform_bytes(&uniform_bytes))
}

/// `HashToScalar`: expands `msg` to 64 uniform bytes under `dst` and reduces
/// them mod the group order.
pub(crate) fn hash_to_scalar(msg: &[&[u8]], dst: &[u8]) -> Result<Scalar, ProtocolError> {
    let mut uniform_bytes = Zeroizing::new([0u8; UNIFORM_BYTES_LEN]);
    expand_message_xmd(msg, dst, uniform_bytes.as_mut())?;
    Ok(Scalar::from_bytes_mod_order_wide(&uniform_bytes))
}

#[cfg(test)]
mod tests {
    use rand::rngs::OsRng;

    use super::*;
    use crate::hash2curve::STR_HASH_TO_SCALAR;

    #[test]
    fn identity_encoding_is_rejected() {
        assert_eq!(
            element_from_slice(&[0u8; ELEMENT_LEN]),
            Err(ProtocolError::InvalidPoint)
        );
    }

    #[test]
    fn non_canonical_encoding_is_rejected() {
        // 2^255 - 1 is not a field element encoding.
        let bytes = [0xffu8; ELEMENT_LEN];
        assert_eq!(element_from_slice(&bytes), Err(ProtocolError::InvalidPoint));
    }

    #[test]
    fn valid_encoding_round_trips() {
        let mut rng = OsRng;
        let point = scalarmult_base(&random_scalar(&mut rng).unwrap());
        let bytes = element_to_bytes(&point);
        assert_eq!(element_from_slice(&bytes).unwrap(), point);
    }

    #[test]
    fn invert_undoes_multiplication() {
        let mut rng = OsRng;
        let r = random_scalar(&mut rng).unwrap();
        let p = hash_to_group(&[b"some input"]).unwrap();
        let blinded = scalarmult(&r, &p).unwrap();
        let unblinded = scalarmult(&scalar_invert(&r).unwrap(), &blinded).unwrap();
        assert_eq!(element_to_bytes(&unblinded), element_to_bytes(&p));
    }

    #[test]
    fn zero_scalar_cannot_be_inverted() {
        assert_eq!(
            scalar_invert(&Scalar::ZERO),
            Err(ProtocolError::InvalidPoint)
        );
    }

    #[test]
    fn hash_to_scalar_is_deterministic_and_tagged() {
        let a = hash_to_scalar(&[b"seed"], STR_HASH_TO_SCALAR).unwrap();
        let b = hash_to_scalar(&[b"seed"], STR_HASH_TO_SCALAR).unwrap();
        let c = hash_to_scalar(&[b"seed"], crate::hash2curve::STR_DERIVE_AUTH_KEY_PAIR).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
