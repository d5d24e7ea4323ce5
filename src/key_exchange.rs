// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! The triple Diffie-Hellman key schedule: transcript preamble, 96-byte
//! initial keying material, and the HKDF-derived session and MAC keys.

use curve25519_dalek::ristretto::RistrettoPoint;
use curve25519_dalek::scalar::Scalar;
use digest::Digest;
use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use sha2::Sha512;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::errors::ProtocolError;
use crate::group;
use crate::group::ELEMENT_LEN;
use crate::serialization::{i2osp2, UpdateExt};

/// Length of an HMAC-SHA-512 tag and key.
pub const MAC_LEN: usize = 64;
/// Length of a SHA-512 digest.
pub const HASH_LEN: usize = 64;
/// Length of the concatenated triple-DH shared secrets.
pub(crate) const IKM_LEN: usize = 3 * ELEMENT_LEN;

// Fixed context label of the transcript preamble. Locked to the draft the
// wire format was built from; changing it breaks interoperability.
const STR_RFC: &[u8] = b"RFCXXXX";
const STR_OPAQUE_PREFIX: &[u8] = b"OPAQUE-";
const STR_HANDSHAKE_SECRET: &[u8] = b"HandshakeSecret";
const STR_SESSION_KEY: &[u8] = b"SessionKey";
const STR_SERVER_MAC: &[u8] = b"ServerMAC";
const STR_CLIENT_MAC: &[u8] = b"ClientMAC";

/// The keys both roles derive from the handshake: the session key handed to
/// the caller and the two transcript-bound MAC keys. Zeroized on drop;
/// `km2`/`km3` never leave the crate.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub(crate) struct SessionKeys {
    pub(crate) session_key: [u8; HASH_LEN],
    pub(crate) km2: [u8; MAC_LEN],
    pub(crate) km3: [u8; MAC_LEN],
}

/// `HKDF-Expand-Label`: expands under
/// `I2OSP(L, 2) || I2OSP(7 + |label|, 1) || "OPAQUE-" || label` followed by
/// the length-prefixed transcript context (or a zero length octet).
fn expand_label(
    secret: &Hkdf<Sha512>,
    label: &[u8],
    transcript: Option<&[u8; HASH_LEN]>,
    okm: &mut [u8],
) -> Result<(), ProtocolError> {
    let length = i2osp2(okm.len());
    let label_length = [(STR_OPAQUE_PREFIX.len() + label.len()) as u8];
    let result = match transcript {
        Some(transcript) => secret.expand_multi_info(
            &[
                &length,
                &label_length,
                STR_OPAQUE_PREFIX,
                label,
                &[HASH_LEN as u8],
                transcript,
            ],
            okm,
        ),
        None => secret.expand_multi_info(
            &[&length, &label_length, STR_OPAQUE_PREFIX, label, &[0u8]],
            okm,
        ),
    };
    result.map_err(|_| ProtocolError::SizeError {
        name: "okm",
        len: 255 * HASH_LEN,
        actual_len: okm.len(),
    })
}

/// Hashes the transcript preamble: the fixed context label, the caller
/// context, the client identity, the full KE1 bytes, the server identity,
/// and the first five fields of KE2.
pub(crate) fn preamble(
    context: &[u8],
    client_identity: &[u8],
    ke1: &[u8],
    server_identity: &[u8],
    ke2_prefix: &[u8],
) -> [u8; HASH_LEN] {
    let mut hasher = Sha512::new();
    hasher.update(STR_RFC);
    hasher.update_prefixed(context);
    hasher.update_prefixed(client_identity);
    hasher.update(ke1);
    hasher.update_prefixed(server_identity);
    hasher.update(ke2_prefix);

    let mut out = [0u8; HASH_LEN];
    out.copy_from_slice(hasher.finalize().as_slice());
    out
}

/// Server-side triple-DH keying material:
/// `x_s * X_u || skS * X_u || x_s * pkU`.
pub(crate) fn server_3dh_ikm(
    server_e_sk: &Scalar,
    server_s_sk: &Scalar,
    client_e_pk: &RistrettoPoint,
    client_s_pk: &RistrettoPoint,
) -> Result<Zeroizing<[u8; IKM_LEN]>, ProtocolError> {
    triple_dh_ikm(
        group::scalarmult(server_e_sk, client_e_pk)?,
        group::scalarmult(server_s_sk, client_e_pk)?,
        group::scalarmult(server_e_sk, client_s_pk)?,
    )
}

/// Client-side triple-DH keying material:
/// `x_u * X_s || x_u * pkS || skU * X_s`.
pub(crate) fn client_3dh_ikm(
    client_e_sk: &Scalar,
    client_s_sk: &Scalar,
    server_e_pk: &RistrettoPoint,
    server_s_pk: &RistrettoPoint,
) -> Result<Zeroizing<[u8; IKM_LEN]>, ProtocolError> {
    triple_dh_ikm(
        group::scalarmult(client_e_sk, server_e_pk)?,
        group::scalarmult(client_e_sk, server_s_pk)?,
        group::scalarmult(client_s_sk, server_e_pk)?,
    )
}

fn triple_dh_ikm(
    dh1: RistrettoPoint,
    dh2: RistrettoPoint,
    dh3: RistrettoPoint,
) -> Result<Zeroizing<[u8; IKM_LEN]>, ProtocolError> {
    let mut ikm = Zeroizing::new([0u8; IKM_LEN]);
    ikm[..ELEMENT_LEN].copy_from_slice(&group::element_to_bytes(&dh1));
    ikm[ELEMENT_LEN..2 * ELEMENT_LEN].copy_from_slice(&group::element_to_bytes(&dh2));
    ikm[2 * ELEMENT_LEN..].copy_from_slice(&group::element_to_bytes(&dh3));
    Ok(ikm)
}

/// Derives the session key and the two MAC keys from the triple-DH keying
/// material, binding each to the transcript preamble.
pub(crate) fn derive_keys(
    ikm: &[u8; IKM_LEN],
    preamble: &[u8; HASH_LEN],
) -> Result<SessionKeys, ProtocolError> {
    let (mut prk, extracted) = Hkdf::<Sha512>::extract(None, ikm);

    let mut handshake_secret = Zeroizing::new([0u8; HASH_LEN]);
    expand_label(
        &extracted,
        STR_HANDSHAKE_SECRET,
        Some(preamble),
        handshake_secret.as_mut(),
    )?;

    let mut keys = SessionKeys {
        session_key: [0u8; HASH_LEN],
        km2: [0u8; MAC_LEN],
        km3: [0u8; MAC_LEN],
    };
    let result = expand_label(
        &extracted,
        STR_SESSION_KEY,
        Some(preamble),
        &mut keys.session_key,
    )
    .and_then(|()| {
        let handshake = Hkdf::<Sha512>::from_prk(handshake_secret.as_ref()).map_err(|_| {
            ProtocolError::SizeError {
                name: "handshake_secret",
                len: HASH_LEN,
                actual_len: handshake_secret.len(),
            }
        })?;
        expand_label(&handshake, STR_SERVER_MAC, None, &mut keys.km2)?;
        expand_label(&handshake, STR_CLIENT_MAC, None, &mut keys.km3)
    });

    prk.as_mut_slice().zeroize();
    match result {
        Ok(()) => Ok(keys),
        Err(e) => {
            keys.zeroize();
            Err(e)
        }
    }
}

/// One-shot HMAC-SHA-512 under a 64-byte transcript key.
pub(crate) fn mac(key: &[u8; MAC_LEN], message: &[u8]) -> Result<[u8; MAC_LEN], ProtocolError> {
    let mut mac = Hmac::<Sha512>::new_from_slice(key).map_err(|_| ProtocolError::SizeError {
        name: "mac_key",
        len: MAC_LEN,
        actual_len: key.len(),
    })?;
    mac.update(message);

    let mut out = [0u8; MAC_LEN];
    out.copy_from_slice(mac.finalize().into_bytes().as_slice());
    Ok(out)
}

/// The input the client MAC authenticates: the hash of the preamble digest
/// concatenated with the server MAC.
pub(crate) fn client_mac_input(
    preamble: &[u8; HASH_LEN],
    server_mac: &[u8; MAC_LEN],
) -> [u8; HASH_LEN] {
    let mut hasher = Sha512::new();
    hasher.update(preamble);
    hasher.update(server_mac);

    let mut out = [0u8; HASH_LEN];
    out.copy_from_slice(hasher.finalize().as_slice());
    out
}

#[cfg(test)]
mod tests {
    use rand::rngs::OsRng;

    use super::*;

    fn keypair() -> (Scalar, RistrettoPoint) {
        let sk = group::random_scalar(&mut OsRng).unwrap();
        (sk, group::scalarmult_base(&sk))
    }

    #[test]
    fn both_roles_derive_the_same_ikm() {
        let (sks, pks) = keypair();
        let (sku, pku) = keypair();
        let (xs, epks) = keypair();
        let (xu, epku) = keypair();

        let server = server_3dh_ikm(&xs, &sks, &epku, &pku).unwrap();
        let client = client_3dh_ikm(&xu, &sku, &epks, &pks).unwrap();
        assert_eq!(*server, *client);
    }

    #[test]
    fn derived_keys_are_bound_to_the_preamble() {
        let ikm = [7u8; IKM_LEN];
        let p1 = preamble(b"ctx", b"alice", &[1u8; 96], b"server", &[2u8; 256]);
        let p2 = preamble(b"ctx", b"alice", &[1u8; 96], b"server", &[3u8; 256]);

        let k1 = derive_keys(&ikm, &p1).unwrap();
        let k1_again = derive_keys(&ikm, &p1).unwrap();
        let k2 = derive_keys(&ikm, &p2).unwrap();

        assert_eq!(k1.session_key, k1_again.session_key);
        assert_ne!(k1.session_key, k2.session_key);
        assert_ne!(k1.km2, k1.km3);
    }

    #[test]
    fn preamble_is_sensitive_to_identity_lengths() {
        // "ab" + "c" and "a" + "bc" must hash differently thanks to the
        // two-byte length prefixes.
        let p1 = preamble(b"", b"ab", &[0u8; 96], b"c", &[0u8; 256]);
        let p2 = preamble(b"", b"a", &[0u8; 96], b"bc", &[0u8; 256]);
        assert_ne!(p1, p2);
    }
}
