// Copyright 2024 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

//! PSA evidence builders for the two challenge-response roles.

use super::{negotiate, EvidenceBuilder, PSA_EVIDENCE_MEDIA_TYPE};
use crate::errors::Error;
use crate::key::Signer;
use crate::psa::{Claims, Evidence, Profile};
use crate::ValidationMode;

/// Builds a fresh PSA token on demand, binding the session nonce into the
/// claims-set before signing
pub struct AttesterEvidenceBuilder {
    claims: Claims,
    signer: Signer,
    mode: ValidationMode,
    declared_profile: Option<Profile>,
}

impl AttesterEvidenceBuilder {
    pub fn new(claims: Claims, signer: Signer, mode: ValidationMode) -> Self {
        Self {
            claims,
            signer,
            mode,
            declared_profile: None,
        }
    }

    /// Record the profile the operator asked for.  If it does not match
    /// the profile derived from the claims, evidence building fails rather
    /// than silently overriding either.
    pub fn with_declared_profile(mut self, profile: Profile) -> Self {
        self.declared_profile = Some(profile);
        self
    }
}

impl EvidenceBuilder for AttesterEvidenceBuilder {
    fn build_evidence(
        &mut self,
        nonce: &[u8],
        accept: &[String],
    ) -> Result<(Vec<u8>, String), Error> {
        negotiate(PSA_EVIDENCE_MEDIA_TYPE, accept)?;

        self.claims.set_nonce(nonce)?;

        let derived = self.claims.profile();
        if let Some(declared) = self.declared_profile {
            if declared != derived {
                return Err(Error::Profile(format!(
                    "declared profile {declared} does not match claims profile {derived}"
                )));
            }
        }

        let evidence = Evidence::new(self.claims.clone());

        let token = match self.mode {
            ValidationMode::Strict => evidence.sign(&self.signer),
            ValidationMode::Permissive => evidence.sign_unvalidated(&self.signer),
        }?;

        Ok((token, PSA_EVIDENCE_MEDIA_TYPE.to_string()))
    }
}

/// Replays an already signed PSA token.  The token's embedded nonce is
/// extracted once, at construction; the token is returned unmodified if
/// and only if the session nonce equals it.
pub struct RelyingPartyEvidenceBuilder {
    token: Vec<u8>,
    nonce: Vec<u8>,
}

impl RelyingPartyEvidenceBuilder {
    pub fn from_token(token: Vec<u8>) -> Result<Self, Error> {
        let nonce = Evidence::decode(&token)?.claims.get_nonce()?.to_vec();

        Ok(Self { token, nonce })
    }

    /// The nonce embedded in the token, to be echoed to the verification
    /// service when creating the session
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
        negotiate(PSA_EVIDENCE_MEDIA_TYPE, accept)?;

        if nonce != self.nonce {
            return Err(Error::NonceMismatch {
                expected: hex::encode(&self.nonce),
                got: hex::encode(nonce),
            });
        }

        Ok((self.token.clone(), PSA_EVIDENCE_MEDIA_TYPE.to_string()))
    }
}
