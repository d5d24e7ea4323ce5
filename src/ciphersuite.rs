// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Defines the configuration of the protocol.
//!
//! The group, hash, KDF and MAC are fixed (ristretto255 with SHA-512); the
//! two remaining axes, the password hardening function and the OPRF
//! finalize info, are chosen once at the type level.

use crate::slow_hash::SlowHash;

pub trait CipherSuite {
    /// Memory-hard function applied to the OPRF output.
    type Ksf: SlowHash;
    /// Info string mixed into the OPRF `Finalize` hash.
    const FINALIZE_INFO: &'static [u8];
}

/// The default suite: Argon2id at interactive cost, with the `"OPAQUE01"`
/// finalize info.
#[cfg(feature = "argon2")]
pub struct Ristretto255Sha512;

#[cfg(feature = "argon2")]
impl CipherSuite for Ristretto255Sha512 {
    type Ksf = crate::slow_hash::Argon2Interactive;
    const FINALIZE_INFO: &'static [u8] = b"OPAQUE01";
}

/// Interop suite for the published CFRG test vectors: identity hardening
/// and an empty finalize info. Nothing else changes.
pub struct CfrgTestSuite;

impl CipherSuite for CfrgTestSuite {
    type Ksf = crate::slow_hash::NoOpHash;
    const FINALIZE_INFO: &'static [u8] = b"";
}
