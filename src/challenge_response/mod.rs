// Copyright 2024 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

//! Challenge-response evidence supply.
//!
//! A challenge-response session against a verification service follows a
//! single shape regardless of the token format and of how the evidence
//! comes to be: the service supplies a nonce and the list of media types
//! it accepts, and the emulated endpoint answers with evidence bytes and
//! the one media type it selected.  [`EvidenceBuilder`] is that contract.
//!
//! Two builder variants exist per token format:
//! * the attester builders create fresh evidence, binding the session
//!   nonce into the claims before signing;
//! * the relying-party builders replay an already signed token, checking
//!   that the session nonce equals the one embedded in it.
//!
//! The session driver ([`client::ChallengeResponseSession`]) is agnostic to
//! which variant it is given.

pub mod cca;
pub mod client;
pub mod psa;

use crate::errors::Error;

/// Media type of the PSA attestation token
pub const PSA_EVIDENCE_MEDIA_TYPE: &str = "application/psa-attestation-token";

/// Media type of the CCA attestation token
pub const CCA_EVIDENCE_MEDIA_TYPE: &str =
    r#"application/eat-collection; profile="http://arm.com/CCA-SSD/1.0.0""#;

/// The evidence supply contract: given the session nonce and the media
/// types the verification service accepts, produce the evidence bytes and
/// the media type they are encoded in.  Called exactly once per
/// challenge-response round.
pub trait EvidenceBuilder {
    fn build_evidence(
        &mut self,
        nonce: &[u8],
        accept: &[String],
    ) -> Result<(Vec<u8>, String), Error>;
}

/// Scan the offered media types for the one this builder supports.
/// Absence is a negotiation failure, never retried.
fn negotiate(supported: &str, accept: &[String]) -> Result<(), Error> {
    if accept.iter().any(|ct| ct == supported) {
        return Ok(());
    }

    Err(Error::MediaType {
        expected: supported.to_string(),
        offered: accept.join(", "),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negotiation_scans_the_whole_list() {
        let accept = vec![
            "a".to_string(),
            PSA_EVIDENCE_MEDIA_TYPE.to_string(),
            "b".to_string(),
        ];

        assert!(negotiate(PSA_EVIDENCE_MEDIA_TYPE, &accept).is_ok());
    }

    #[test]
    fn negotiation_failure_names_both_sides() {
        let accept = vec!["unrelated/type".to_string(), "other/type".to_string()];

        let e = negotiate(CCA_EVIDENCE_MEDIA_TYPE, &accept).unwrap_err();
        assert_eq!(
            e,
            Error::MediaType {
                expected: CCA_EVIDENCE_MEDIA_TYPE.to_string(),
                offered: "unrelated/type, other/type".to_string(),
            }
        );
    }
}
