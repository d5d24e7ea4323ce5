// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! An implementation of the OPAQUE augmented password-authenticated key
//! exchange, fixed to the ristretto255 / SHA-512 suite.
//!
//! OPAQUE lets a client holding only a password and a server holding a
//! per-user record derive, over a single round trip, a mutually
//! authenticated session key, without the server ever seeing the password
//! and without pre-shared certificates. A stolen server database yields
//! nothing better than an offline dictionary attack, and that attack is
//! priced by a memory-hard function.
//!
//! The crate exposes pure message-transforming operations only: transport,
//! storage and lockout policy belong to the caller. Every operation takes
//! its randomness source as a parameter and returns fixed-size wire
//! messages.
//!
//! # Minimal example
//!
//! Registration in one process (e.g. an enrolment tool that already holds
//! the password), followed by a login exchange:
//!
//! ```
//! use opaque_r255::{register, CfrgTestSuite, ClientLogin, Identifiers, ServerLogin};
//! # use opaque_r255::ProtocolError;
//! use rand::rngs::OsRng;
//!
//! let mut rng = OsRng;
//! let ids = Identifiers::default(); // identities default to the public keys
//!
//! // Server-side provisioning.
//! let (user_record, registration_export_key) =
//!     register::<CfrgTestSuite, _>(&mut rng, b"hunter2", None, ids)?;
//!
//! // Login: KE1 from the client...
//! let client_start = ClientLogin::<CfrgTestSuite>::start(&mut rng, b"hunter2")?;
//! // ...KE2 from the server...
//! let server_start =
//!     ServerLogin::start(&mut rng, &user_record, &client_start.message, ids, b"")?;
//! // ...and the client's final MAC.
//! let client_finish = client_start.state.finish(&server_start.message, ids, b"")?;
//! let session_key = server_start.state.finish(&client_finish.client_mac)?;
//!
//! assert_eq!(*session_key, *client_finish.session_key);
//! assert_eq!(*registration_export_key, *client_finish.export_key);
//! # Ok::<(), ProtocolError>(())
//! ```
//!
//! The example selects [`CfrgTestSuite`] so it runs without the password
//! hardening cost; production deployments want [`Ristretto255Sha512`],
//! which prices each guess with Argon2id at interactive parameters.
//!
//! # Secret hygiene
//!
//! State types ([`ClientRegistration`], [`ClientLogin`],
//! [`ServerRegistration`], [`ServerLogin`], [`UserRecord`]) zeroize their
//! secrets on drop, and each `finish` consumes its state so an instance can
//! complete at most one exchange. Failing operations zeroize everything
//! they own before returning a [`ProtocolError`].

#![deny(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

mod ciphersuite;
mod envelope;
mod errors;
mod group;
mod hash2curve;
mod key_exchange;
mod keypair;
mod messages;
mod opaque;
mod oprf;
mod serialization;
mod slow_hash;

#[cfg(test)]
mod tests;

#[cfg(feature = "argon2")]
pub use crate::ciphersuite::Ristretto255Sha512;
pub use crate::ciphersuite::{CfrgTestSuite, CipherSuite};
pub use crate::envelope::{Envelope, ENVELOPE_LEN, NONCE_LEN};
pub use crate::errors::ProtocolError;
pub use crate::group::{ELEMENT_LEN, SCALAR_LEN};
pub use crate::key_exchange::{HASH_LEN, MAC_LEN};
pub use crate::keypair::{KeyPair, PrivateKey, PublicKey};
pub use crate::messages::{
    CredentialRequest, CredentialResponse, RegistrationRecord, RegistrationRequest,
    RegistrationResponse, UserRecord, CREDENTIAL_REQUEST_LEN, CREDENTIAL_RESPONSE_LEN,
    MASKED_RESPONSE_LEN, REGISTRATION_RECORD_LEN, REGISTRATION_REQUEST_LEN,
    REGISTRATION_RESPONSE_LEN, USER_RECORD_LEN,
};
#[cfg(feature = "argon2")]
pub use crate::slow_hash::Argon2Interactive;
pub use crate::slow_hash::{NoOpHash, SlowHash};

pub use crate::opaque::{
    register, ClientLogin, ClientLoginFinishResult, ClientLoginStartResult, ClientRegistration,
    ClientRegistrationFinishResult, ClientRegistrationStartResult, Identifiers, ServerLogin,
    ServerLoginStartResult, ServerRegistration, ServerRegistrationStartResult,
};
