// Copyright 2024 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

//! CCA evidence builders for the two challenge-response roles.

use super::{negotiate, EvidenceBuilder, CCA_EVIDENCE_MEDIA_TYPE};
use crate::cca::Evidence;
use crate::errors::Error;
use crate::key::Signer;
use crate::ValidationMode;

/// Builds a fresh CCA token on demand.  The session nonce lands in the
/// realm challenge claim; the platform and realm claims-sets are then
/// signed with their respective keys.
pub struct AttesterEvidenceBuilder {
    evidence: Evidence,
    platform_signer: Signer,
    realm_signer: Signer,
    mode: ValidationMode,
}

impl AttesterEvidenceBuilder {
    pub fn new(
        evidence: Evidence,
        platform_signer: Signer,
        realm_signer: Signer,
        mode: ValidationMode,
    ) -> Self {
        Self {
            evidence,
            platform_signer,
            realm_signer,
            mode,
        }
    }
}

impl EvidenceBuilder for AttesterEvidenceBuilder {
    fn build_evidence(
        &mut self,
        nonce: &[u8],
        accept: &[String],
    ) -> Result<(Vec<u8>, String), Error> {
        negotiate(CCA_EVIDENCE_MEDIA_TYPE, accept)?;

        self.evidence.realm.set_challenge(nonce)?;

        let token = match self.mode {
            ValidationMode::Strict => self
                .evidence
                .sign(&self.platform_signer, &self.realm_signer),
            ValidationMode::Permissive => self
                .evidence
                .sign_unvalidated(&self.platform_signer, &self.realm_signer),
        }?;

        Ok((token, CCA_EVIDENCE_MEDIA_TYPE.to_string()))
    }
}

/// Replays an already signed CCA token.  The realm challenge is extracted
/// once, at construction; the token is returned unmodified if and only if
/// the session nonce equals it.
pub struct RelyingPartyEvidenceBuilder {
    token: Vec<u8>,
    nonce: Vec<u8>,
}

impl RelyingPartyEvidenceBuilder {
    pub fn from_token(token: Vec<u8>) -> Result<Self, Error> {
        let nonce = Evidence::decode(&token)?.realm.get_challenge()?.to_vec();

        Ok(Self { token, nonce })
    }

    /// The challenge embedded in the token's realm claims-set, to be
    /// echoed to the verification service when creating the session
    pub fn nonce(&self) -> &[u8] {
        &self.nonce
    }
}

impl EvidenceBuilder for RelyingPartyEvidenceBuilder {
    fn build_evidence(
        &mut self,
        nonce: &[u8],
        accept: &[String],
    ) -> Result<(Vec<u8>, String), Error> {
        negotiate(CCA_EVIDENCE_MEDIA_TYPE, accept)?;

        if nonce != self.nonce {
            return Err(Error::NonceMismatch {
                expected: hex::encode(&self.nonce),
                got: hex::encode(nonce),
            });
        }

        Ok((self.token.clone(), CCA_EVIDENCE_MEDIA_TYPE.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_common::{TEST_CCA_CLAIMS, TEST_ES256_KEY};

    fn accept_with_supported() -> Vec<String> {
        vec![
            "unrelated/type".to_string(),
            CCA_EVIDENCE_MEDIA_TYPE.to_string(),
        ]
    }

    fn test_builder() -> AttesterEvidenceBuilder {
        let evidence =
            Evidence::decode_claims_from_json(TEST_CCA_CLAIMS.as_bytes(), ValidationMode::Strict)
                .unwrap();

        AttesterEvidenceBuilder::new(
            evidence,
            Signer::from_jwk(TEST_ES256_KEY.as_bytes()).unwrap(),
            Signer::from_jwk(TEST_ES256_KEY.as_bytes()).unwrap(),
            ValidationMode::Strict,
        )
    }

    #[test]
    fn attester_binds_the_session_nonce() {
        let nonce = [0x41; 64];

        let (token, media_type) = test_builder()
            .build_evidence(&nonce, &accept_with_supported())
            .expect("building evidence");

        assert_eq!(media_type, CCA_EVIDENCE_MEDIA_TYPE);

        let e = Evidence::decode(&token).expect("decoding produced evidence");
        assert_eq!(e.realm.get_challenge().unwrap(), nonce.as_slice());
    }

    #[test]
    fn attester_negotiation_failure() {
        let accept = vec!["unrelated/type".to_string()];

        let e = test_builder()
            .build_evidence(&[0x41; 64], &accept)
            .unwrap_err();

        assert_eq!(
            e,
            Error::MediaType {
                expected: CCA_EVIDENCE_MEDIA_TYPE.to_string(),
                offered: "unrelated/type".to_string(),
            }
        );
    }

    #[test]
    fn attester_rejects_bad_nonce_size() {
        // the realm challenge is fixed at 64 bytes
        let e = test_builder()
            .build_evidence(&[0x41; 48], &accept_with_supported())
            .unwrap_err();

        assert!(matches!(e, Error::Nonce(_)), "got {e:?}");
    }

    fn replay_fixture(nonce: &[u8]) -> (Vec<u8>, RelyingPartyEvidenceBuilder) {
        let mut b = test_builder();
        let (token, _) = b.build_evidence(nonce, &accept_with_supported()).unwrap();
        let rp = RelyingPartyEvidenceBuilder::from_token(token.clone()).unwrap();

        (token, rp)
    }

    #[test]
    fn relying_party_replays_on_matching_nonce() {
        let nonce = [0x42; 64];
        let (token, mut rp) = replay_fixture(&nonce);

        assert_eq!(rp.nonce(), nonce.as_slice());

        let (evidence, media_type) = rp
            .build_evidence(&nonce, &accept_with_supported())
            .expect("replaying token");

        assert_eq!(media_type, CCA_EVIDENCE_MEDIA_TYPE);
        assert_eq!(evidence, token);

        let (again, _) = rp.build_evidence(&nonce, &accept_with_supported()).unwrap();
        assert_eq!(again, token);
    }

    #[test]
    fn relying_party_rejects_foreign_nonce() {
        let nonce = [0x42; 64];
        let (_, mut rp) = replay_fixture(&nonce);

        let other = [0x43; 64];
        let e = rp
            .build_evidence(&other, &accept_with_supported())
            .unwrap_err();

        assert_eq!(
            e,
            Error::NonceMismatch {
                expected: hex::encode(nonce),
                got: hex::encode(other),
            }
        );
    }
}
