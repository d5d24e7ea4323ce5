// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Provides the main OPAQUE API: the registration and login flows.
//!
//! Each flow is driven by a state type whose `finish` consumes it, so a
//! given instance can fire exactly one transition; every state type
//! zeroizes its secrets on drop, including the early-exit paths.

use core::marker::PhantomData;

use curve25519_dalek::scalar::Scalar;
use hkdf::Hkdf;
use rand::{CryptoRng, RngCore};
use sha2::Sha512;
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::ciphersuite::CipherSuite;
use crate::envelope;
use crate::envelope::{Envelope, NONCE_LEN};
use crate::errors::utils::check_two_byte_length;
use crate::errors::ProtocolError;
use crate::group;
use crate::group::ELEMENT_LEN;
use crate::key_exchange;
use crate::key_exchange::{HASH_LEN, MAC_LEN};
use crate::keypair::{PrivateKey, PublicKey};
use crate::messages::{
    CredentialRequest, CredentialResponse, RegistrationRecord, RegistrationRequest,
    RegistrationResponse, UserRecord, MASKED_RESPONSE_LEN,
};
use crate::oprf;

const STR_CREDENTIAL_RESPONSE_PAD: &[u8] = b"CredentialResponsePad";

/// Optional client and server identities. When one is absent (or empty),
/// the corresponding 32-byte long-term public key stands in for it; the
/// defaulting is computed identically on both endpoints.
#[derive(Clone, Copy, Debug, Default)]
pub struct Identifiers<'a> {
    pub client: Option<&'a [u8]>,
    pub server: Option<&'a [u8]>,
}

impl<'a> Identifiers<'a> {
    pub(crate) fn resolve<'p>(
        self,
        client_s_pk: &'p [u8; ELEMENT_LEN],
        server_s_pk: &'p [u8; ELEMENT_LEN],
    ) -> Result<(&'p [u8], &'p [u8]), ProtocolError>
    where
        'a: 'p,
    {
        let id_u = match self.client {
            Some(id) if !id.is_empty() => check_two_byte_length(id, "client_identity")?,
            _ => &client_s_pk[..],
        };
        let id_s = match self.server {
            Some(id) if !id.is_empty() => check_two_byte_length(id, "server_identity")?,
            _ => &server_s_pk[..],
        };
        Ok((id_u, id_s))
    }
}

// Registration
// ============

/// The state the client holds between issuing a registration request and
/// finalizing it.
pub struct ClientRegistration<CS: CipherSuite> {
    blind: Scalar,
    password: Vec<u8>,
    _cs: PhantomData<CS>,
}

// Not derived because of the phantom suite parameter.
impl<CS: CipherSuite> Zeroize for ClientRegistration<CS> {
    fn zeroize(&mut self) {
        self.blind.zeroize();
        self.password.zeroize();
    }
}

impl<CS: CipherSuite> Drop for ClientRegistration<CS> {
    fn drop(&mut self) {
        self.zeroize();
    }
}

pub struct ClientRegistrationStartResult<CS: CipherSuite> {
    pub message: RegistrationRequest,
    pub state: ClientRegistration<CS>,
}

pub struct ClientRegistrationFinishResult {
    pub record: RegistrationRecord,
    pub export_key: Zeroizing<[u8; HASH_LEN]>,
}

impl<CS: CipherSuite> ClientRegistration<CS> {
    /// `CreateRegistrationRequest`: blinds the password.
    pub fn start<R: RngCore + CryptoRng>(
        rng: &mut R,
        password: &[u8],
    ) -> Result<ClientRegistrationStartResult<CS>, ProtocolError> {
        check_two_byte_length(password, "password")?;
        let blinded = oprf::blind(password, rng)?;
        Ok(ClientRegistrationStartResult {
            message: RegistrationRequest {
                blinded_element: group::element_to_bytes(&blinded.blinded_element),
            },
            state: Self {
                blind: blinded.blind,
                password: password.to_vec(),
                _cs: PhantomData,
            },
        })
    }

    /// `FinalizeRequest`: unblinds the server's evaluation, derives the
    /// randomized password, and seals the envelope. Returns the record for
    /// the server and the export key for the caller.
    pub fn finish<R: RngCore + CryptoRng>(
        self,
        rng: &mut R,
        response: &RegistrationResponse,
        ids: Identifiers<'_>,
    ) -> Result<ClientRegistrationFinishResult, ProtocolError> {
        let unblinded = Zeroizing::new(oprf::unblind(&self.blind, &response.evaluated_element)?);
        let randomized_pwd = oprf::finalize::<CS>(&self.password, &unblinded)?;

        let server_s_pk = PublicKey::from_bytes(&response.server_s_pk)?;
        let sealed = envelope::seal(rng, &randomized_pwd, &server_s_pk, ids)?;

        Ok(ClientRegistrationFinishResult {
            record: RegistrationRecord {
                client_s_pk: sealed.client_public_key.to_bytes(),
                masking_key: *sealed.masking_key,
                envelope: sealed.envelope,
            },
            export_key: sealed.export_key,
        })
    }
}

/// The secrets the server holds between answering a registration request
/// and storing the resulting record.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct ServerRegistration {
    oprf_key: Scalar,
    server_s_sk: PrivateKey,
}

pub struct ServerRegistrationStartResult {
    pub message: RegistrationResponse,
    pub state: ServerRegistration,
}

impl ServerRegistration {
    /// `CreateRegistrationResponse`: validates the blinded element, draws a
    /// per-user OPRF key, evaluates, and publishes the server public key.
    /// The long-term secret is caller-provided or freshly random.
    pub fn start<R: RngCore + CryptoRng>(
        rng: &mut R,
        request: &RegistrationRequest,
        server_s_sk: Option<PrivateKey>,
    ) -> Result<ServerRegistrationStartResult, ProtocolError> {
        let oprf_key = oprf::keygen(rng)?;
        let evaluated_element = oprf::evaluate(&oprf_key, &request.blinded_element)?;

        let server_s_sk = match server_s_sk {
            Some(key) => key,
            None => PrivateKey::random(rng)?,
        };
        let server_s_pk = server_s_sk.public_key();

        Ok(ServerRegistrationStartResult {
            message: RegistrationResponse {
                evaluated_element,
                server_s_pk: server_s_pk.to_bytes(),
            },
            state: ServerRegistration {
                oprf_key,
                server_s_sk,
            },
        })
    }

    /// `StoreUserRecord`: stitches the OPRF key, the long-term secret, and
    /// the client's record into the persistent user record. Deterministic in
    /// its inputs.
    pub fn finish(self, record: RegistrationRecord) -> UserRecord {
        UserRecord {
            oprf_key: self.oprf_key.to_bytes(),
            server_s_sk: self.server_s_sk.to_bytes(),
            record,
        }
    }
}

/// Single-process registration: the composite of
/// `CreateRegistrationRequest`, `CreateRegistrationResponse`,
/// `FinalizeRequest` and `StoreUserRecord`, for deployments where the
/// record is provisioned where the password already lives.
pub fn register<CS: CipherSuite, R: RngCore + CryptoRng>(
    rng: &mut R,
    password: &[u8],
    server_s_sk: Option<PrivateKey>,
    ids: Identifiers<'_>,
) -> Result<(UserRecord, Zeroizing<[u8; HASH_LEN]>), ProtocolError> {
    let client_start = ClientRegistration::<CS>::start(rng, password)?;
    let server_start = ServerRegistration::start(rng, &client_start.message, server_s_sk)?;
    let client_finish = client_start
        .state
        .finish(rng, &server_start.message, ids)?;
    let user_record = server_start.state.finish(client_finish.record);
    Ok((user_record, client_finish.export_key))
}

// Login
// =====

/// The state the client holds between sending KE1 and consuming KE2.
pub struct ClientLogin<CS: CipherSuite> {
    blind: Scalar,
    client_e_sk: Scalar,
    client_nonce: [u8; NONCE_LEN],
    blinded_element: [u8; ELEMENT_LEN],
    password: Vec<u8>,
    _cs: PhantomData<CS>,
}

// Not derived because of the phantom suite parameter.
impl<CS: CipherSuite> Zeroize for ClientLogin<CS> {
    fn zeroize(&mut self) {
        self.blind.zeroize();
        self.client_e_sk.zeroize();
        self.client_nonce.zeroize();
        self.blinded_element.zeroize();
        self.password.zeroize();
    }
}

impl<CS: CipherSuite> Drop for ClientLogin<CS> {
    fn drop(&mut self) {
        self.zeroize();
    }
}

pub struct ClientLoginStartResult<CS: CipherSuite> {
    pub message: CredentialRequest,
    pub state: ClientLogin<CS>,
}

pub struct ClientLoginFinishResult {
    /// The MAC to send as the final flight; the server checks it with
    /// [`ServerLogin::finish`].
    pub client_mac: [u8; MAC_LEN],
    pub session_key: Zeroizing<[u8; HASH_LEN]>,
    pub export_key: Zeroizing<[u8; HASH_LEN]>,
}

impl<CS: CipherSuite> ClientLogin<CS> {
    /// `CreateCredentialRequest`: blinds the password and attaches a fresh
    /// nonce and ephemeral key share.
    pub fn start<R: RngCore + CryptoRng>(
        rng: &mut R,
        password: &[u8],
    ) -> Result<ClientLoginStartResult<CS>, ProtocolError> {
        check_two_byte_length(password, "password")?;
        let blinded = oprf::blind(password, rng)?;
        let blinded_element = group::element_to_bytes(&blinded.blinded_element);

        let client_e_sk = group::random_scalar(rng)?;
        let mut client_nonce = [0u8; NONCE_LEN];
        rng.try_fill_bytes(&mut client_nonce)
            .map_err(|_| ProtocolError::Randomness)?;

        Ok(ClientLoginStartResult {
            message: CredentialRequest {
                blinded_element,
                client_nonce,
                client_e_pk: group::element_to_bytes(&group::scalarmult_base(&client_e_sk)),
            },
            state: Self {
                blind: blinded.blind,
                client_e_sk,
                client_nonce,
                blinded_element,
                password: password.to_vec(),
                _cs: PhantomData,
            },
        })
    }

    /// `RecoverCredentials`: unblinds the OPRF evaluation, unmasks and
    /// opens the envelope, verifies the server MAC, and produces the client
    /// MAC together with the session and export keys.
    ///
    /// A wrong password fails as
    /// [`EnvelopeRecovery`](ProtocolError::EnvelopeRecovery) before any MAC
    /// leaves the client.
    pub fn finish(
        self,
        response: &CredentialResponse,
        ids: Identifiers<'_>,
        context: &[u8],
    ) -> Result<ClientLoginFinishResult, ProtocolError> {
        check_two_byte_length(context, "context")?;

        let unblinded = Zeroizing::new(oprf::unblind(&self.blind, &response.evaluated_element)?);
        let randomized_pwd = oprf::finalize::<CS>(&self.password, &unblinded)?;

        // Unmask server_pk || envelope. The public-key bytes stay raw until
        // the envelope has authenticated them.
        let masking_key = envelope::derive_masking_key(&randomized_pwd)?;
        let pad = credential_response_pad(&masking_key, &response.masking_nonce)?;
        let mut unmasked = Zeroizing::new([0u8; MASKED_RESPONSE_LEN]);
        for (out, (masked, pad)) in unmasked
            .iter_mut()
            .zip(response.masked_response.iter().zip(pad.iter()))
        {
            *out = masked ^ pad;
        }
        let mut server_s_pk = [0u8; ELEMENT_LEN];
        server_s_pk.copy_from_slice(&unmasked[..ELEMENT_LEN]);
        let recovered_envelope = Envelope::deserialize(&unmasked[ELEMENT_LEN..])?;

        let opened = envelope::open(&randomized_pwd, &recovered_envelope, &server_s_pk, ids)?;
        let client_s_pk = opened.client_keypair.public().to_bytes();
        let (id_u, id_s) = ids.resolve(&client_s_pk, &server_s_pk)?;

        // Only now is the recovered key material treated as group elements.
        let server_s_pk_element = group::element_from_slice(&server_s_pk)?;
        let server_e_pk_element = group::element_from_slice(&response.server_e_pk)?;

        let ke1 = CredentialRequest {
            blinded_element: self.blinded_element,
            client_nonce: self.client_nonce,
            client_e_pk: group::element_to_bytes(&group::scalarmult_base(&self.client_e_sk)),
        }
        .serialize();
        let preamble = key_exchange::preamble(
            context,
            id_u,
            &ke1,
            id_s,
            &response.to_bytes_without_mac(),
        );

        let ikm = key_exchange::client_3dh_ikm(
            &self.client_e_sk,
            &opened.client_keypair.private().0,
            &server_e_pk_element,
            &server_s_pk_element,
        )?;
        let keys = key_exchange::derive_keys(&ikm, &preamble)?;

        let expected_server_mac = key_exchange::mac(&keys.km2, &preamble)?;
        if expected_server_mac[..]
            .ct_eq(&response.server_mac)
            .unwrap_u8()
            != 1
        {
            return Err(ProtocolError::Handshake);
        }

        let client_mac = key_exchange::mac(
            &keys.km3,
            &key_exchange::client_mac_input(&preamble, &expected_server_mac),
        )?;

        Ok(ClientLoginFinishResult {
            client_mac,
            session_key: Zeroizing::new(keys.session_key),
            export_key: opened.export_key,
        })
    }
}

/// The state the server holds between sending KE2 and checking the
/// client's final MAC. Zeroizes on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct ServerLogin {
    session_key: [u8; HASH_LEN],
    expected_client_mac: [u8; MAC_LEN],
}

pub struct ServerLoginStartResult {
    pub message: CredentialResponse,
    pub state: ServerLogin,
}

impl ServerLogin {
    /// `CreateCredentialResponse`: evaluates the OPRF, masks the credential
    /// block, runs the server side of the triple-DH, and MACs the
    /// transcript.
    pub fn start<R: RngCore + CryptoRng>(
        rng: &mut R,
        record: &UserRecord,
        request: &CredentialRequest,
        ids: Identifiers<'_>,
        context: &[u8],
    ) -> Result<ServerLoginStartResult, ProtocolError> {
        check_two_byte_length(context, "context")?;

        let oprf_key = group::scalar_from_slice(&record.oprf_key)?;
        let evaluated_element = oprf::evaluate(&oprf_key, &request.blinded_element)?;

        let client_e_pk = group::element_from_slice(&request.client_e_pk)?;
        let client_s_pk = group::element_from_slice(&record.record.client_s_pk)?;

        let server_s_sk = PrivateKey::from_bytes(&record.server_s_sk)?;
        let server_s_pk = server_s_sk.public_key().to_bytes();

        // masked_response = (server_pk || envelope) XOR pad
        let mut masking_nonce = [0u8; NONCE_LEN];
        rng.try_fill_bytes(&mut masking_nonce)
            .map_err(|_| ProtocolError::Randomness)?;
        let pad = credential_response_pad(&record.record.masking_key, &masking_nonce)?;
        let mut masked_response = [0u8; MASKED_RESPONSE_LEN];
        masked_response[..ELEMENT_LEN].copy_from_slice(&server_s_pk);
        masked_response[ELEMENT_LEN..].copy_from_slice(&record.record.envelope.serialize());
        for (masked, pad) in masked_response.iter_mut().zip(pad.iter()) {
            *masked ^= pad;
        }

        let mut server_nonce = [0u8; NONCE_LEN];
        rng.try_fill_bytes(&mut server_nonce)
            .map_err(|_| ProtocolError::Randomness)?;
        let server_e_sk = group::random_scalar(rng)?;
        let server_e_pk = group::element_to_bytes(&group::scalarmult_base(&server_e_sk));

        let mut response = CredentialResponse {
            evaluated_element,
            masking_nonce,
            masked_response,
            server_nonce,
            server_e_pk,
            server_mac: [0u8; MAC_LEN],
        };

        let (id_u, id_s) = ids.resolve(&record.record.client_s_pk, &server_s_pk)?;
        let preamble = key_exchange::preamble(
            context,
            id_u,
            &request.serialize(),
            id_s,
            &response.to_bytes_without_mac(),
        );

        let ikm =
            key_exchange::server_3dh_ikm(&server_e_sk, &server_s_sk.0, &client_e_pk, &client_s_pk)?;
        let keys = key_exchange::derive_keys(&ikm, &preamble)?;

        response.server_mac = key_exchange::mac(&keys.km2, &preamble)?;
        let expected_client_mac = key_exchange::mac(
            &keys.km3,
            &key_exchange::client_mac_input(&preamble, &response.server_mac),
        )?;

        Ok(ServerLoginStartResult {
            message: response,
            state: ServerLogin {
                session_key: keys.session_key,
                expected_client_mac,
            },
        })
    }

    /// `UserAuth`: constant-time comparison of the received client MAC
    /// against the expected one. Consumes the state; on success the session
    /// key is released to the caller.
    pub fn finish(
        self,
        client_mac: &[u8; MAC_LEN],
    ) -> Result<Zeroizing<[u8; HASH_LEN]>, ProtocolError> {
        if self.expected_client_mac[..].ct_eq(client_mac).unwrap_u8() != 1 {
            return Err(ProtocolError::Handshake);
        }
        Ok(Zeroizing::new(self.session_key))
    }
}

/// `credential_response_pad = Expand(masking_key, masking_nonce ||
/// "CredentialResponsePad", Npk + Ne)`, with the masking key acting as the
/// PRK.
fn credential_response_pad(
    masking_key: &[u8; HASH_LEN],
    masking_nonce: &[u8; NONCE_LEN],
) -> Result<Zeroizing<[u8; MASKED_RESPONSE_LEN]>, ProtocolError> {
    let masking = Hkdf::<Sha512>::from_prk(masking_key).map_err(|_| ProtocolError::SizeError {
        name: "masking_key",
        len: HASH_LEN,
        actual_len: masking_key.len(),
    })?;
    let mut pad = Zeroizing::new([0u8; MASKED_RESPONSE_LEN]);
    masking
        .expand_multi_info(&[masking_nonce, STR_CREDENTIAL_RESPONSE_PAD], pad.as_mut())
        .map_err(|_| ProtocolError::SizeError {
            name: "credential_response_pad",
            len: 255 * HASH_LEN,
            actual_len: MASKED_RESPONSE_LEN,
        })?;
    Ok(pad)
}
