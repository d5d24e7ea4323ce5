// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Trait for the memory-hard function applied to the OPRF output before the
//! randomized password is extracted.

use zeroize::Zeroizing;

use crate::errors::ProtocolError;

/// Output length of the hardening step; matches the SHA-512 digest it
/// hardens.
pub const HARDENED_LEN: usize = 64;

pub trait SlowHash {
    fn hash(input: &[u8; HARDENED_LEN]) -> Result<Zeroizing<[u8; HARDENED_LEN]>, ProtocolError>;
}

/// The identity function, used when interoperating with the CFRG test
/// vectors, which fix the memory-hard function to a no-op.
pub struct NoOpHash;

impl SlowHash for NoOpHash {
    fn hash(input: &[u8; HARDENED_LEN]) -> Result<Zeroizing<[u8; HARDENED_LEN]>, ProtocolError> {
        Ok(Zeroizing::new(*input))
    }
}

/// Argon2id with libsodium's interactive cost profile: 64 MiB, two passes,
/// one lane, an all-zero salt.
#[cfg(feature = "argon2")]
pub struct Argon2Interactive;

#[cfg(feature = "argon2")]
impl SlowHash for Argon2Interactive {
    fn hash(input: &[u8; HARDENED_LEN]) -> Result<Zeroizing<[u8; HARDENED_LEN]>, ProtocolError> {
        let params = argon2::Params::new(64 * 1024, 2, 1, Some(HARDENED_LEN))
            .map_err(|_| ProtocolError::Ksf)?;
        let hasher =
            argon2::Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);
        let mut output = Zeroizing::new([0u8; HARDENED_LEN]);
        hasher
            .hash_password_into(input, &[0u8; 16], output.as_mut())
            .map_err(|_| ProtocolError::Ksf)?;
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_is_identity() {
        let input = [0x5au8; HARDENED_LEN];
        assert_eq!(*NoOpHash::hash(&input).unwrap(), input);
    }

    #[cfg(feature = "argon2")]
    #[test]
    fn argon2_is_deterministic_and_not_identity() {
        let input = [0x5au8; HARDENED_LEN];
        let a = Argon2Interactive::hash(&input).unwrap();
        let b = Argon2Interactive::hash(&input).unwrap();
        assert_eq!(*a, *b);
        assert_ne!(*a, input);
    }
}
