// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! `expand_message_xmd` with SHA-512, as specified by the hash-to-curve
//! draft, together with the domain-separation tags this crate is locked to.
//!
//! The tags are pinned to the VOPRF-08 draft byte strings. Interoperability
//! with peers built from the same draft depends on them never being
//! "modernised" to a later draft or RFC.

use digest::Digest;
use sha2::Sha512;

use crate::errors::ProtocolError;

/// Domain separation tag for hashing to a group element.
pub(crate) const STR_HASH_TO_GROUP: &[u8] = b"HashToGroup-VOPRF08-\x00\x00\x01";
/// Domain separation tag for hashing to a scalar.
pub(crate) const STR_HASH_TO_SCALAR: &[u8] = b"HashToScalar-VOPRF08-\x00\x00\x01";
/// Domain separation tag for deriving the client's long-term key pair.
pub(crate) const STR_DERIVE_AUTH_KEY_PAIR: &[u8] = b"OPAQUE-DeriveAuthKeyPair";

const B_IN_BYTES: usize = 64;
// SHA-512 input block size; the draft requires a block of zeroes as prefix.
const Z_PAD: [u8; 128] = [0u8; 128];

/// Fills `uniform_bytes` with the XMD expansion of `msg` (absorbed as the
/// concatenation of its parts) under `dst`.
pub(crate) fn expand_message_xmd(
    msg: &[&[u8]],
    dst: &[u8],
    uniform_bytes: &mut [u8],
) -> Result<(), ProtocolError> {
    let len_in_bytes = uniform_bytes.len();
    let ell = (len_in_bytes + B_IN_BYTES - 1) / B_IN_BYTES;
    if ell > 255 || len_in_bytes == 0 || len_in_bytes > u16::MAX as usize {
        return Err(ProtocolError::SizeError {
            name: "len_in_bytes",
            len: 255 * B_IN_BYTES,
            actual_len: len_in_bytes,
        });
    }
    if dst.len() > 255 {
        return Err(ProtocolError::SizeError {
            name: "dst",
            len: 255,
            actual_len: dst.len(),
        });
    }
    let dst_len = [dst.len() as u8];

    // b_0 = H(Z_pad || msg || I2OSP(len_in_bytes, 2) || I2OSP(0, 1) || DST_prime)
    let mut hasher = Sha512::new();
    hasher.update(Z_PAD);
    for part in msg {
        hasher.update(part);
    }
    hasher.update((len_in_bytes as u16).to_be_bytes());
    hasher.update([0u8]);
    hasher.update(dst);
    hasher.update(dst_len);
    let b_0 = hasher.finalize();

    // b_1 = H(b_0 || I2OSP(1, 1) || DST_prime)
    let mut b_i = Sha512::new()
        .chain_update(&b_0)
        .chain_update([1u8])
        .chain_update(dst)
        .chain_update(dst_len)
        .finalize();

    let mut offset = 0;
    let mut i = 1u8;
    loop {
        let take = B_IN_BYTES.min(len_in_bytes - offset);
        uniform_bytes[offset..offset + take].copy_from_slice(&b_i[..take]);
        offset += take;
        if offset == len_in_bytes {
            return Ok(());
        }

        // b_i = H(strxor(b_0, b_(i - 1)) || I2OSP(i, 1) || DST_prime)
        i += 1;
        let mut xored = [0u8; B_IN_BYTES];
        for (x, (a, b)) in xored.iter_mut().zip(b_0.iter().zip(b_i.iter())) {
            *x = a ^ b;
        }
        b_i = Sha512::new()
            .chain_update(xored)
            .chain_update([i])
            .chain_update(dst)
            .chain_update(dst_len)
            .finalize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_oversized_output() {
        let mut out = vec![0u8; 255 * B_IN_BYTES + 1];
        assert!(matches!(
            expand_message_xmd(&[b"msg"], STR_HASH_TO_GROUP, &mut out),
            Err(ProtocolError::SizeError { .. })
        ));
    }

    #[test]
    fn rejects_empty_output_and_long_dst() {
        let mut empty: [u8; 0] = [];
        assert!(expand_message_xmd(&[b"msg"], STR_HASH_TO_GROUP, &mut empty).is_err());

        let mut out = [0u8; 32];
        let dst = [0x42u8; 256];
        assert!(expand_message_xmd(&[b"msg"], &dst, &mut out).is_err());
    }

    #[test]
    fn multi_part_message_absorbs_like_concatenation() {
        let mut split = [0u8; 96];
        let mut joined = [0u8; 96];
        expand_message_xmd(&[b"pass", b"word"], STR_HASH_TO_GROUP, &mut split).unwrap();
        expand_message_xmd(&[b"password"], STR_HASH_TO_GROUP, &mut joined).unwrap();
        assert_eq!(split, joined);
    }

    #[test]
    fn length_and_dst_are_domain_separating() {
        let mut short = [0u8; 64];
        let mut long = [0u8; 192];
        expand_message_xmd(&[b"input"], STR_HASH_TO_SCALAR, &mut short).unwrap();
        expand_message_xmd(&[b"input"], STR_HASH_TO_SCALAR, &mut long).unwrap();
        assert_ne!(short, long[..64], "length is hashed into b_0");

        // Distinct DSTs must separate domains.
        let mut other = [0u8; 64];
        expand_message_xmd(&[b"input"], STR_HASH_TO_GROUP, &mut other).unwrap();
        assert_ne!(short, other);
    }
}
