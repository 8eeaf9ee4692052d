// Copyright 2024 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use super::claims::Claims;
use crate::errors::Error;
use crate::key::{PublicKey, Signer};
use cose::message::CoseMessage;

/// A PSA attestation token: one claims-set wrapped in a COSE Sign1
/// envelope
#[derive(Debug)]
pub struct Evidence {
    pub claims: Claims,
}

impl Evidence {
    pub fn new(claims: Claims) -> Self {
        Self { claims }
    }

    /// Validate the claims-set (challenge included) and produce the signed
    /// token
    pub fn sign(&self, signer: &Signer) -> Result<Vec<u8>, Error> {
        self.claims.validate(true)?;

        signer.sign(self.claims.to_cbor()?)
    }

    /// Produce a signed token from the claims-set as it is.  Only
    /// reachable from permissively loaded claims; used to generate
    /// deliberately invalid evidence for negative testing.
    pub fn sign_unvalidated(&self, signer: &Signer) -> Result<Vec<u8>, Error> {
        signer.sign(self.claims.to_cbor()?)
    }

    /// Decode the claims-set embedded in a signed token, without checking
    /// the signature
    pub fn decode(buf: &[u8]) -> Result<Evidence, Error> {
        let mut sign1 = CoseMessage::new_sign();
        sign1.bytes = buf.to_vec();
        sign1
            .init_decoder(None)
            .map_err(|e| Error::Syntax(format!("COSE decoding failed: {e:?}")))?;

        let claims = Claims::from_cbor(&sign1.payload)?;
        claims.validate(true)?;

        Ok(Evidence { claims })
    }

    /// Check the token signature with the supplied public key and extract
    /// the embedded claims-set
    pub fn verify(buf: &[u8], key: &PublicKey) -> Result<Evidence, Error> {
        let mut sign1 = CoseMessage::new_sign();
        sign1.bytes = buf.to_vec();
        sign1
            .init_decoder(None)
            .map_err(|e| Error::Syntax(format!("COSE decoding failed: {e:?}")))?;

        let cose_key = key.to_cose_key(sign1.header.alg)?;

        sign1
            .key(&cose_key)
            .map_err(|e| Error::Key(format!("setting verification key: {e:?}")))?;

        sign1
            .decode(None, None)
            .map_err(|e| Error::Verify(format!("signature verification failed: {e:?}")))?;

        let claims = Claims::from_cbor(&sign1.payload)?;
        claims.validate(true)?;

        Ok(Evidence { claims })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::psa::Profile;
    use crate::test_common::{TEST_ES256_KEY, TEST_ES256_PUB_KEY, TEST_P2_CLAIMS};
    use crate::ValidationMode;

    fn test_claims() -> Claims {
        Claims::from_json(TEST_P2_CLAIMS.as_bytes(), ValidationMode::Strict)
            .expect("loading test claims")
    }

    fn test_signer() -> Signer {
        Signer::from_jwk(TEST_ES256_KEY.as_bytes()).expect("loading test signing key")
    }

    #[test]
    fn sign_then_decode_roundtrips_nonce() {
        let nonce = [0x61; 48];

        let mut claims = test_claims();
        claims.set_nonce(&nonce).unwrap();

        let token = Evidence::new(claims).sign(&test_signer()).unwrap();

        let e = Evidence::decode(&token).expect("decoding freshly signed token");
        assert_eq!(e.claims.profile(), Profile::P2);
        assert_eq!(e.claims.get_nonce().unwrap(), nonce.as_slice());
    }

    #[test]
    fn sign_then_verify() {
        let mut claims = test_claims();
        claims.set_nonce(&[0x61; 32]).unwrap();

        let token = Evidence::new(claims).sign(&test_signer()).unwrap();

        let pk = PublicKey::from_jwk(TEST_ES256_PUB_KEY.as_bytes()).unwrap();
        let e = Evidence::verify(&token, &pk).expect("verifying freshly signed token");
        assert_eq!(e.claims.get_nonce().unwrap(), &[0x61; 32]);
    }

    #[test]
    fn verify_tampered_token() {
        let mut claims = test_claims();
        claims.set_nonce(&[0x61; 32]).unwrap();

        let mut token = Evidence::new(claims).sign(&test_signer()).unwrap();

        // flip one bit in the signature, which sits at the tail of the
        // envelope
        let last = token.len() - 1;
        token[last] ^= 0x01;

        let pk = PublicKey::from_jwk(TEST_ES256_PUB_KEY.as_bytes()).unwrap();
        let e = Evidence::verify(&token, &pk).unwrap_err();
        assert!(matches!(e, Error::Verify(_)), "got {e:?}");
    }

    #[test]
    fn verify_garbage() {
        let pk = PublicKey::from_jwk(TEST_ES256_PUB_KEY.as_bytes()).unwrap();

        let e = Evidence::verify(&[0xff, 0xff, 0xff, 0xff], &pk).unwrap_err();
        assert!(matches!(e, Error::Syntax(_)), "got {e:?}");
    }

    #[test]
    fn sign_without_nonce() {
        let e = Evidence::new(test_claims())
            .sign(&test_signer())
            .unwrap_err();
        assert_eq!(e, Error::MissingClaim("nonce".to_string()));
    }

    #[test]
    fn unvalidated_signing_produces_invalid_evidence() {
        // no nonce: validated signing refuses, unvalidated signing goes
        // through and the resulting token is rejected on decode
        let claims = test_claims();

        let token = Evidence::new(claims)
            .sign_unvalidated(&test_signer())
            .unwrap();

        let e = Evidence::decode(&token).unwrap_err();
        assert_eq!(e, Error::MissingClaim("nonce".to_string()));
    }
}
