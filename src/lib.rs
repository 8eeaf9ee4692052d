// Copyright 2024 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

//! Attestation evidence creation, verification and challenge-response
//! emulation for Arm PSA and CCA tokens.
//!
//! This crate provides:
//! * JSON claims loading for the PSA claims-set (both the
//!   `PSA_IOT_PROFILE_1` and `http://arm.com/psa/2.0.0` profiles) and for
//!   the CCA platform and realm claims-sets, with strict or permissive
//!   validation
//! * CBOR/COSE Sign1 token encoding, signing and verification using JWK
//!   key material
//! * the two challenge-response roles (attester and relying party) behind
//!   the single [`challenge_response::EvidenceBuilder`] contract, plus a
//!   blocking driver for Veraison-style verification API sessions

pub mod cca;
pub mod challenge_response;
mod common;
mod errors;
pub mod key;
pub mod psa;
#[cfg(test)]
pub(crate) mod test_common;

pub use common::ValidationMode;
pub use errors::Error;
