// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! The byte-exact wire messages.
//!
//! Every message is an explicit concatenation of fixed-size fields with the
//! offsets spelled out below; nothing depends on compiler layout. Group
//! element encodings are only size-checked here. The validity check runs at
//! the point of use, before any scalar multiplication on peer input.

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::envelope::{Envelope, ENVELOPE_LEN, NONCE_LEN};
use crate::errors::utils::check_slice_size;
use crate::errors::ProtocolError;
use crate::group::{ELEMENT_LEN, SCALAR_LEN};
use crate::key_exchange::{HASH_LEN, MAC_LEN};

/// Length of the credential request (KE1): `M || nonceU || X_u`.
pub const CREDENTIAL_REQUEST_LEN: usize = ELEMENT_LEN + NONCE_LEN + ELEMENT_LEN;
/// Length of the masked `server_pk || envelope` block.
pub const MASKED_RESPONSE_LEN: usize = ELEMENT_LEN + ENVELOPE_LEN;
/// Length of the credential response (KE2).
pub const CREDENTIAL_RESPONSE_LEN: usize =
    ELEMENT_LEN + NONCE_LEN + MASKED_RESPONSE_LEN + NONCE_LEN + ELEMENT_LEN + MAC_LEN;
/// Length of the registration request: the blinded password element.
pub const REGISTRATION_REQUEST_LEN: usize = ELEMENT_LEN;
/// Length of the registration response: `Z || pkS`.
pub const REGISTRATION_RESPONSE_LEN: usize = 2 * ELEMENT_LEN;
/// Length of the registration record: `client_pk || masking_key || envelope`.
pub const REGISTRATION_RECORD_LEN: usize = ELEMENT_LEN + HASH_LEN + ENVELOPE_LEN;
/// Length of the server-side user record: `kU || skS || registration record`.
pub const USER_RECORD_LEN: usize = 2 * SCALAR_LEN + REGISTRATION_RECORD_LEN;

/// First message of registration: the blinded password.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RegistrationRequest {
    pub(crate) blinded_element: [u8; ELEMENT_LEN],
}

impl RegistrationRequest {
    pub fn serialize(&self) -> [u8; REGISTRATION_REQUEST_LEN] {
        self.blinded_element
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let checked = check_slice_size(bytes, REGISTRATION_REQUEST_LEN, "registration_request")?;
        let mut blinded_element = [0u8; ELEMENT_LEN];
        blinded_element.copy_from_slice(checked);
        Ok(Self { blinded_element })
    }
}

/// Second message of registration: the evaluated element and the server's
/// long-term public key.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RegistrationResponse {
    pub(crate) evaluated_element: [u8; ELEMENT_LEN],
    pub(crate) server_s_pk: [u8; ELEMENT_LEN],
}

impl RegistrationResponse {
    pub fn serialize(&self) -> [u8; REGISTRATION_RESPONSE_LEN] {
        let mut out = [0u8; REGISTRATION_RESPONSE_LEN];
        out[..ELEMENT_LEN].copy_from_slice(&self.evaluated_element);
        out[ELEMENT_LEN..].copy_from_slice(&self.server_s_pk);
        out
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let checked = check_slice_size(bytes, REGISTRATION_RESPONSE_LEN, "registration_response")?;
        let mut evaluated_element = [0u8; ELEMENT_LEN];
        let mut server_s_pk = [0u8; ELEMENT_LEN];
        evaluated_element.copy_from_slice(&checked[..ELEMENT_LEN]);
        server_s_pk.copy_from_slice(&checked[ELEMENT_LEN..]);
        Ok(Self {
            evaluated_element,
            server_s_pk,
        })
    }
}

/// Third message of registration, produced by the client and stored by the
/// server. The masking key is secret; the record zeroizes on drop.
#[derive(Clone, Debug, Eq, PartialEq, Zeroize, ZeroizeOnDrop)]
pub struct RegistrationRecord {
    pub(crate) client_s_pk: [u8; ELEMENT_LEN],
    pub(crate) masking_key: [u8; HASH_LEN],
    pub(crate) envelope: Envelope,
}

impl RegistrationRecord {
    pub fn serialize(&self) -> [u8; REGISTRATION_RECORD_LEN] {
        let mut out = [0u8; REGISTRATION_RECORD_LEN];
        out[..ELEMENT_LEN].copy_from_slice(&self.client_s_pk);
        out[ELEMENT_LEN..ELEMENT_LEN + HASH_LEN].copy_from_slice(&self.masking_key);
        out[ELEMENT_LEN + HASH_LEN..].copy_from_slice(&self.envelope.serialize());
        out
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let checked = check_slice_size(bytes, REGISTRATION_RECORD_LEN, "registration_record")?;
        let mut client_s_pk = [0u8; ELEMENT_LEN];
        let mut masking_key = [0u8; HASH_LEN];
        client_s_pk.copy_from_slice(&checked[..ELEMENT_LEN]);
        masking_key.copy_from_slice(&checked[ELEMENT_LEN..ELEMENT_LEN + HASH_LEN]);
        Ok(Self {
            client_s_pk,
            masking_key,
            envelope: Envelope::deserialize(&checked[ELEMENT_LEN + HASH_LEN..])?,
        })
    }
}

/// The canonical per-user record the server persists: the OPRF key, the
/// server's long-term secret, and the client's registration record.
/// Zeroizes on drop.
#[derive(Clone, Debug, Eq, PartialEq, Zeroize, ZeroizeOnDrop)]
pub struct UserRecord {
    pub(crate) oprf_key: [u8; SCALAR_LEN],
    pub(crate) server_s_sk: [u8; SCALAR_LEN],
    pub(crate) record: RegistrationRecord,
}

impl UserRecord {
    pub fn serialize(&self) -> [u8; USER_RECORD_LEN] {
        let mut out = [0u8; USER_RECORD_LEN];
        out[..SCALAR_LEN].copy_from_slice(&self.oprf_key);
        out[SCALAR_LEN..2 * SCALAR_LEN].copy_from_slice(&self.server_s_sk);
        out[2 * SCALAR_LEN..].copy_from_slice(&self.record.serialize());
        out
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let checked = check_slice_size(bytes, USER_RECORD_LEN, "user_record")?;
        let mut oprf_key = [0u8; SCALAR_LEN];
        let mut server_s_sk = [0u8; SCALAR_LEN];
        oprf_key.copy_from_slice(&checked[..SCALAR_LEN]);
        server_s_sk.copy_from_slice(&checked[SCALAR_LEN..2 * SCALAR_LEN]);
        Ok(Self {
            oprf_key,
            server_s_sk,
            record: RegistrationRecord::deserialize(&checked[2 * SCALAR_LEN..])?,
        })
    }
}

/// KE1: the blinded password, the client nonce, and the client's ephemeral
/// public key.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CredentialRequest {
    pub(crate) blinded_element: [u8; ELEMENT_LEN],
    pub(crate) client_nonce: [u8; NONCE_LEN],
    pub(crate) client_e_pk: [u8; ELEMENT_LEN],
}

impl CredentialRequest {
    pub fn serialize(&self) -> [u8; CREDENTIAL_REQUEST_LEN] {
        let mut out = [0u8; CREDENTIAL_REQUEST_LEN];
        out[..ELEMENT_LEN].copy_from_slice(&self.blinded_element);
        out[ELEMENT_LEN..ELEMENT_LEN + NONCE_LEN].copy_from_slice(&self.client_nonce);
        out[ELEMENT_LEN + NONCE_LEN..].copy_from_slice(&self.client_e_pk);
        out
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let checked = check_slice_size(bytes, CREDENTIAL_REQUEST_LEN, "credential_request")?;
        let mut blinded_element = [0u8; ELEMENT_LEN];
        let mut client_nonce = [0u8; NONCE_LEN];
        let mut client_e_pk = [0u8; ELEMENT_LEN];
        blinded_element.copy_from_slice(&checked[..ELEMENT_LEN]);
        client_nonce.copy_from_slice(&checked[ELEMENT_LEN..ELEMENT_LEN + NONCE_LEN]);
        client_e_pk.copy_from_slice(&checked[ELEMENT_LEN + NONCE_LEN..]);
        Ok(Self {
            blinded_element,
            client_nonce,
            client_e_pk,
        })
    }
}

/// KE2: the evaluated element, the masking nonce, the masked credential
/// block, the server nonce, the server's ephemeral public key, and the
/// server MAC.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CredentialResponse {
    pub(crate) evaluated_element: [u8; ELEMENT_LEN],
    pub(crate) masking_nonce: [u8; NONCE_LEN],
    pub(crate) masked_response: [u8; MASKED_RESPONSE_LEN],
    pub(crate) server_nonce: [u8; NONCE_LEN],
    pub(crate) server_e_pk: [u8; ELEMENT_LEN],
    pub(crate) server_mac: [u8; MAC_LEN],
}

impl CredentialResponse {
    pub fn serialize(&self) -> [u8; CREDENTIAL_RESPONSE_LEN] {
        let mut out = [0u8; CREDENTIAL_RESPONSE_LEN];
        out[..CREDENTIAL_RESPONSE_LEN - MAC_LEN].copy_from_slice(&self.to_bytes_without_mac());
        out[CREDENTIAL_RESPONSE_LEN - MAC_LEN..].copy_from_slice(&self.server_mac);
        out
    }

    /// The first five fields, in wire order: exactly the slice of KE2 the
    /// transcript preamble absorbs.
    pub(crate) fn to_bytes_without_mac(&self) -> [u8; CREDENTIAL_RESPONSE_LEN - MAC_LEN] {
        let mut out = [0u8; CREDENTIAL_RESPONSE_LEN - MAC_LEN];
        let mut offset = 0;
        for field in [
            &self.evaluated_element[..],
            &self.masking_nonce[..],
            &self.masked_response[..],
            &self.server_nonce[..],
            &self.server_e_pk[..],
        ] {
            out[offset..offset + field.len()].copy_from_slice(field);
            offset += field.len();
        }
        out
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let checked = check_slice_size(bytes, CREDENTIAL_RESPONSE_LEN, "credential_response")?;
        let mut evaluated_element = [0u8; ELEMENT_LEN];
        let mut masking_nonce = [0u8; NONCE_LEN];
        let mut masked_response = [0u8; MASKED_RESPONSE_LEN];
        let mut server_nonce = [0u8; NONCE_LEN];
        let mut server_e_pk = [0u8; ELEMENT_LEN];
        let mut server_mac = [0u8; MAC_LEN];

        let mut offset = 0;
        for (dst, len) in [
            (&mut evaluated_element[..], ELEMENT_LEN),
            (&mut masking_nonce[..], NONCE_LEN),
            (&mut masked_response[..], MASKED_RESPONSE_LEN),
            (&mut server_nonce[..], NONCE_LEN),
            (&mut server_e_pk[..], ELEMENT_LEN),
            (&mut server_mac[..], MAC_LEN),
        ] {
            dst.copy_from_slice(&checked[offset..offset + len]);
            offset += len;
        }

        Ok(Self {
            evaluated_element,
            masking_nonce,
            masked_response,
            server_nonce,
            server_e_pk,
            server_mac,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_response_round_trips_and_prefixes() {
        let response = CredentialResponse {
            evaluated_element: [1u8; ELEMENT_LEN],
            masking_nonce: [2u8; NONCE_LEN],
            masked_response: [3u8; MASKED_RESPONSE_LEN],
            server_nonce: [4u8; NONCE_LEN],
            server_e_pk: [5u8; ELEMENT_LEN],
            server_mac: [6u8; MAC_LEN],
        };
        let bytes = response.serialize();
        assert_eq!(bytes.len(), 320);
        assert_eq!(
            bytes[..CREDENTIAL_RESPONSE_LEN - MAC_LEN],
            response.to_bytes_without_mac()
        );
        assert_eq!(CredentialResponse::deserialize(&bytes).unwrap(), response);
        assert!(CredentialResponse::deserialize(&bytes[1..]).is_err());
    }

    #[test]
    fn credential_request_layout_is_m_nonce_keyshare() {
        let request = CredentialRequest {
            blinded_element: [0xaa; ELEMENT_LEN],
            client_nonce: [0xbb; NONCE_LEN],
            client_e_pk: [0xcc; ELEMENT_LEN],
        };
        let bytes = request.serialize();
        assert_eq!(bytes.len(), 96);
        assert!(bytes[..32].iter().all(|&b| b == 0xaa));
        assert!(bytes[32..64].iter().all(|&b| b == 0xbb));
        assert!(bytes[64..].iter().all(|&b| b == 0xcc));
        assert_eq!(CredentialRequest::deserialize(&bytes).unwrap(), request);
    }

    #[test]
    fn user_record_round_trips() {
        let record = UserRecord {
            oprf_key: [7u8; SCALAR_LEN],
            server_s_sk: [8u8; SCALAR_LEN],
            record: RegistrationRecord {
                client_s_pk: [9u8; ELEMENT_LEN],
                masking_key: [10u8; HASH_LEN],
                envelope: Envelope::deserialize(&[11u8; ENVELOPE_LEN]).unwrap(),
            },
        };
        let bytes = record.serialize();
        assert_eq!(bytes.len(), 256);
        assert_eq!(UserRecord::deserialize(&bytes).unwrap(), record);
    }

    #[test]
    fn registration_messages_round_trip() {
        let request = RegistrationRequest {
            blinded_element: [0x11; ELEMENT_LEN],
        };
        assert_eq!(
            RegistrationRequest::deserialize(&request.serialize()).unwrap(),
            request
        );

        let response = RegistrationResponse {
            evaluated_element: [0x22; ELEMENT_LEN],
            server_s_pk: [0x33; ELEMENT_LEN],
        };
        assert_eq!(
            RegistrationResponse::deserialize(&response.serialize()).unwrap(),
            response
        );
        assert!(RegistrationResponse::deserialize(&[0u8; 63]).is_err());
    }
}
