// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! A list of error types which are produced during an execution of the
//! protocol

use displaydoc::Display;

/// Represents an error occurring during the protocol
///
/// Every failing operation zeroizes the secret buffers it owns before
/// returning one of these discriminants; no variant carries data derived
/// from secrets.
///
/// Callers relaying a failure to the peer must answer uniformly for
/// [`EnvelopeRecovery`](ProtocolError::EnvelopeRecovery) and
/// [`Handshake`](ProtocolError::Handshake): distinguishing them on the wire
/// turns credential recovery into a password oracle.
#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq)]
pub enum ProtocolError {
    /// Peer-supplied group element failed the ristretto255 validity check
    InvalidPoint,
    /// Envelope contents could not be authenticated
    EnvelopeRecovery,
    /// A handshake MAC did not match its expected value
    Handshake,
    /// The password hardening function failed
    Ksf,
    /// The random number generator failed to produce output
    Randomness,
    /// {name} is of incorrect size: expected {len}, got {actual_len}
    SizeError {
        /// name of the byte sequence checked
        name: &'static str,
        /// expected size
        len: usize,
        /// actual size
        actual_len: usize,
    },
}

impl std::error::Error for ProtocolError {}

pub(crate) mod utils {
    use super::ProtocolError;

    pub fn check_slice_size<'a>(
        slice: &'a [u8],
        expected_len: usize,
        arg_name: &'static str,
    ) -> Result<&'a [u8], ProtocolError> {
        if slice.len() != expected_len {
            return Err(ProtocolError::SizeError {
                name: arg_name,
                len: expected_len,
                actual_len: slice.len(),
            });
        }
        Ok(slice)
    }

    /// Rejects any byte string whose length cannot be carried in the
    /// two-byte, big-endian prefixes used throughout the wire formats.
    pub fn check_two_byte_length<'a>(
        bytes: &'a [u8],
        arg_name: &'static str,
    ) -> Result<&'a [u8], ProtocolError> {
        if bytes.len() > u16::MAX as usize {
            return Err(ProtocolError::SizeError {
                name: arg_name,
                len: u16::MAX as usize,
                actual_len: bytes.len(),
            });
        }
        Ok(bytes)
    }
}
