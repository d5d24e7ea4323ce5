// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Helpers for the length-prefixed byte strings that appear inside hashed
//! and MACed inputs. All length prefixes are two bytes, big-endian.

use digest::Update;

pub(crate) fn i2osp2(len: usize) -> [u8; 2] {
    debug_assert!(len <= u16::MAX as usize);
    (len as u16).to_be_bytes()
}

/// Extension for hash and MAC states that absorb `I2OSP(len, 2) || bytes`
/// style fields.
pub(crate) trait UpdateExt: Update {
    fn update_prefixed(&mut self, bytes: &[u8]) {
        self.update(&i2osp2(bytes.len()));
        self.update(bytes);
    }
}

impl<T: Update> UpdateExt for T {}

#[cfg(test)]
mod tests {
    use digest::Digest;
    use sha2::Sha512;

    use super::*;

    #[test]
    fn prefixed_update_matches_manual_concatenation() {
        let mut streamed = Sha512::new();
        Update::update(&mut streamed, b"head");
        streamed.update_prefixed(b"body");

        let manual = Sha512::digest([b"head".as_slice(), &[0, 4], b"body"].concat());
        assert_eq!(streamed.finalize(), manual);
    }

    #[test]
    fn empty_field_still_carries_its_prefix() {
        let mut streamed = Sha512::new();
        streamed.update_prefixed(b"");
        assert_eq!(Sha512::digest([0u8, 0]), streamed.finalize());
    }
}
