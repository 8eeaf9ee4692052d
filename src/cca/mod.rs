// Copyright 2024 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

//! CCA attestation token support.
//!
//! A CCA token is a CBOR-tagged collection of two independently signed
//! COSE Sign1 tokens: the platform token (signed by the CCA platform
//! attestation key) and the realm token (signed by the realm attestation
//! key).  The two halves are bound together by the platform challenge
//! claim, which carries a digest of the realm public key claim.  For the
//! syntax and semantics of the claims-sets, see §A.7 of the Realm
//! Management Monitor [RMM] specification.
//!
//! [RMM]: https://developer.arm.com/documentation/den0137/latest

pub use self::evidence::Evidence;
pub use self::platform::Platform;
pub use self::platform::CCA_PLATFORM_PROFILE;
pub use self::realm::Realm;

mod evidence;
mod platform;
mod realm;
