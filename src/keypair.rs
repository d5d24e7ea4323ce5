// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Key pairs on ristretto255.

use curve25519_dalek::ristretto::RistrettoPoint;
use curve25519_dalek::scalar::Scalar;
use rand::{CryptoRng, RngCore};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::errors::ProtocolError;
use crate::group;
use crate::group::{ELEMENT_LEN, SCALAR_LEN};
use crate::hash2curve::STR_DERIVE_AUTH_KEY_PAIR;

/// A ristretto255 secret scalar. Zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct PrivateKey(pub(crate) Scalar);

impl PrivateKey {
    pub fn random<R: RngCore + CryptoRng>(rng: &mut R) -> Result<Self, ProtocolError> {
        Ok(Self(group::random_scalar(rng)?))
    }

    /// Deserializes a canonical scalar encoding.
    pub fn from_bytes(bytes: &[u8; SCALAR_LEN]) -> Result<Self, ProtocolError> {
        Ok(Self(group::scalar_from_slice(bytes)?))
    }

    pub fn to_bytes(&self) -> [u8; SCALAR_LEN] {
        self.0.to_bytes()
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey::from_element(&group::scalarmult_base(&self.0))
    }
}

/// A serialized ristretto255 element.
///
/// Values built through [`PublicKey::from_bytes`] have passed the validity
/// check; values recovered by unmasking a credential response are carried as
/// raw bytes until the envelope authenticates them.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PublicKey(pub(crate) [u8; ELEMENT_LEN]);

impl PublicKey {
    pub fn from_bytes(bytes: &[u8; ELEMENT_LEN]) -> Result<Self, ProtocolError> {
        group::element_from_slice(bytes)?;
        Ok(Self(*bytes))
    }

    pub(crate) fn from_element(element: &RistrettoPoint) -> Self {
        Self(group::element_to_bytes(element))
    }

    pub fn to_bytes(&self) -> [u8; ELEMENT_LEN] {
        self.0
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    pub(crate) fn to_element(&self) -> Result<RistrettoPoint, ProtocolError> {
        group::element_from_slice(&self.0)
    }
}

/// A ristretto255 key pair. The secret half zeroizes on drop.
#[derive(Clone)]
pub struct KeyPair {
    private: PrivateKey,
    public: PublicKey,
}

impl core::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("KeyPair")
            .field("private", &"[redacted]")
            .field("public", &self.public)
            .finish()
    }
}

impl KeyPair {
    pub fn generate_random<R: RngCore + CryptoRng>(rng: &mut R) -> Result<Self, ProtocolError> {
        Ok(Self::from_private_key(PrivateKey::random(rng)?))
    }

    pub fn from_private_key(private: PrivateKey) -> Self {
        let public = private.public_key();
        Self { private, public }
    }

    /// `DeriveAuthKeyPair`: hashes a uniform seed to a scalar under the
    /// key-pair derivation tag.
    pub(crate) fn derive_auth_keypair(seed: &[u8]) -> Result<Self, ProtocolError> {
        let scalar = group::hash_to_scalar(&[seed], STR_DERIVE_AUTH_KEY_PAIR)?;
        if scalar == Scalar::ZERO {
            return Err(ProtocolError::InvalidPoint);
        }
        Ok(Self::from_private_key(PrivateKey(scalar)))
    }

    pub fn private(&self) -> &PrivateKey {
        &self.private
    }

    pub fn public(&self) -> &PublicKey {
        &self.public
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::OsRng;

    use super::*;

    #[test]
    fn public_key_round_trips_through_bytes() {
        let kp = KeyPair::generate_random(&mut OsRng).unwrap();
        let restored = PublicKey::from_bytes(&kp.public().to_bytes()).unwrap();
        assert_eq!(restored, *kp.public());
    }

    #[test]
    fn derive_auth_keypair_is_deterministic() {
        let a = KeyPair::derive_auth_keypair(b"thirty-two bytes of seed material").unwrap();
        let b = KeyPair::derive_auth_keypair(b"thirty-two bytes of seed material").unwrap();
        assert_eq!(a.public(), b.public());
        assert_eq!(a.private().to_bytes(), b.private().to_bytes());
    }

    #[test]
    fn private_key_survives_serialization() {
        let kp = KeyPair::generate_random(&mut OsRng).unwrap();
        let restored = PrivateKey::from_bytes(&kp.private().to_bytes()).unwrap();
        assert_eq!(restored.public_key(), *kp.public());
    }
}
