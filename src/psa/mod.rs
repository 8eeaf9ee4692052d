// Copyright 2024 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

//! PSA attestation token support.
//!
//! A PSA token is a single COSE Sign1 envelope over a CBOR claims-set.
//! Two claims-set profiles are supported: the legacy `PSA_IOT_PROFILE_1`
//! and `http://arm.com/psa/2.0.0`.  [`Claims::from_json`] disambiguates
//! between the two by trying each profile in turn.

pub use self::claims::Claims;
pub use self::claims::Profile;
pub use self::claims::SwComponent;
pub(crate) use self::claims::JsonSwComponent;
pub use self::claims::{PSA_PROFILE_1, PSA_PROFILE_2};
pub use self::evidence::Evidence;

mod claims;
mod evidence;
