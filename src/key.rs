// Copyright 2024 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

//! Key resolution: turning JWK key material into signing and verification
//! capabilities.
//!
//! The signature algorithm is never guessed or defaulted: it is derived
//! from the key itself (curve for EC keys, PS256 for RSA keys) and any key
//! kind or curve outside the supported set is a hard error.

use crate::errors::Error;
use base64::{engine::general_purpose, Engine as _};
use cose::keys::CoseKey;
use cose::message::CoseMessage;
use hex_literal::hex;
use jsonwebtoken::jwk;
use serde::Deserialize;
use std::fmt;

/// Signature algorithms supported for evidence signing.
///
/// PS256 is recognised (it is what an RSA key resolves to) but COSE
/// signing with it is not available, so a PS256 signer fails at signing
/// time with a distinct error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    ES256,
    ES384,
    ES512,
    PS256,
}

impl Algorithm {
    fn to_cose(self) -> Result<i32, Error> {
        match self {
            Algorithm::ES256 => Ok(cose::algs::ES256),
            Algorithm::ES384 => Ok(cose::algs::ES384),
            Algorithm::ES512 => Ok(cose::algs::ES512),
            Algorithm::PS256 => Err(Error::Sign(
                "COSE signing with PS256 is not supported".to_string(),
            )),
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Algorithm::ES256 => "ES256",
            Algorithm::ES384 => "ES384",
            Algorithm::ES512 => "ES512",
            Algorithm::PS256 => "PS256",
        };
        write!(f, "{s}")
    }
}

/// The raw JWK fields needed to build a private signing key
#[derive(Deserialize)]
struct RawJwk {
    kty: String,
    #[serde(default)]
    crv: Option<String>,
    #[serde(default)]
    x: Option<String>,
    #[serde(default)]
    y: Option<String>,
    #[serde(default)]
    d: Option<String>,
}

/// Supported private key shapes, as produced by JWK parsing
enum PrivateKey {
    Ec2(CoseKey),
    Rsa,
}

/// A signing capability bound to one private key and one algorithm
pub struct Signer {
    alg: Algorithm,
    key: PrivateKey,
}

impl fmt::Debug for Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signer").field("alg", &self.alg).finish()
    }
}

impl Signer {
    /// Create a signer from the supplied JWK description of a private key.
    /// The signature algorithm is uniquely determined by the key: P-256,
    /// P-384 and P-521 EC keys map to ES256, ES384 and ES512 respectively,
    /// RSA keys map to PS256.  Anything else is an error.
    pub fn from_jwk(raw: &[u8]) -> Result<Self, Error> {
        let k: RawJwk = serde_json::from_slice(raw)
            .map_err(|e| Error::Key(format!("failed to parse key: {e}")))?;

        match k.kty.as_str() {
            "EC" => {
                let crv = k
                    .crv
                    .as_deref()
                    .ok_or_else(|| Error::Key("missing crv parameter in EC key".to_string()))?;

                let (alg, cose_crv) = match crv {
                    "P-256" => (Algorithm::ES256, cose::keys::P_256),
                    "P-384" => (Algorithm::ES384, cose::keys::P_384),
                    "P-521" => (Algorithm::ES512, cose::keys::P_521),
                    c => return Err(Error::UnsupportedCurve(c.to_string())),
                };

                let mut key = CoseKey::new();
                key.kty(cose::keys::EC2);
                key.crv(cose_crv);
                key.x(decode_jwk_param(&k.x, "x")?);
                key.y(decode_jwk_param(&k.y, "y")?);
                key.d(decode_jwk_param(&k.d, "d")?);
                key.alg(alg.to_cose()?);
                key.key_ops(vec![cose::keys::KEY_OPS_SIGN]);

                Ok(Signer {
                    alg,
                    key: PrivateKey::Ec2(key),
                })
            }
            "RSA" => {
                if k.d.is_none() {
                    return Err(Error::Key(
                        "not a private key: missing d parameter".to_string(),
                    ));
                }

                Ok(Signer {
                    alg: Algorithm::PS256,
                    key: PrivateKey::Rsa,
                })
            }
            kind => Err(Error::UnsupportedKeyType(kind.to_string())),
        }
    }

    pub fn algorithm(&self) -> Algorithm {
        self.alg
    }

    /// Wrap the supplied claims payload in a COSE Sign1 envelope and sign it
    pub(crate) fn sign(&self, payload: Vec<u8>) -> Result<Vec<u8>, Error> {
        let key = match &self.key {
            PrivateKey::Ec2(key) => key,
            PrivateKey::Rsa => {
                return Err(Error::Sign(
                    "COSE signing with PS256 is not supported".to_string(),
                ))
            }
        };

        let mut sign1 = CoseMessage::new_sign();
        sign1.payload(payload);
        sign1.header.alg(self.alg.to_cose()?, true, false);

        sign1.key(key).map_err(|e| Error::Sign(format!("{e:?}")))?;
        sign1
            .secure_content(None)
            .map_err(|e| Error::Sign(format!("{e:?}")))?;
        sign1
            .encode(true)
            .map_err(|e| Error::Sign(format!("{e:?}")))?;

        Ok(sign1.bytes)
    }
}

/// A verification capability wrapping the JWK description of a public key
pub struct PublicKey {
    jwk: jwk::Jwk,
}

impl PublicKey {
    /// Create a verification key from the supplied JWK description.  Only
    /// EC2 (P-256/P-384/P-521) and OKP (Ed25519) keys are usable for COSE
    /// verification.
    pub fn from_jwk(raw: &[u8]) -> Result<Self, Error> {
        let jwk: jwk::Jwk = serde_json::from_slice(raw)
            .map_err(|e| Error::Key(format!("failed to parse key: {e}")))?;

        match &jwk.algorithm {
            jwk::AlgorithmParameters::EllipticCurve(ec_params) => match &ec_params.curve {
                jwk::EllipticCurve::P256 | jwk::EllipticCurve::P384 | jwk::EllipticCurve::P521 => {}
                c => return Err(Error::UnsupportedCurve(format!("{c:?}"))),
            },
            jwk::AlgorithmParameters::OctetKeyPair(okp_params) => match &okp_params.curve {
                jwk::EllipticCurve::Ed25519 => {}
                c => return Err(Error::UnsupportedCurve(format!("{c:?}"))),
            },
            a => return Err(Error::UnsupportedKeyType(format!("{a:?}"))),
        }

        Ok(PublicKey { jwk })
    }

    /// Reformat into a COSE verification key.  The algorithm comes from the
    /// JWK "alg" parameter if present, otherwise from the alg header of the
    /// message being verified.
    pub(crate) fn to_cose_key(&self, message_alg: Option<i32>) -> Result<CoseKey, Error> {
        let mut cose_key = CoseKey::new();

        cose_key.alg(match self.jwk.common.key_algorithm {
            Some(jwk::KeyAlgorithm::ES256) => cose::algs::ES256,
            Some(jwk::KeyAlgorithm::ES384) => cose::algs::ES384,
            Some(jwk::KeyAlgorithm::EdDSA) => cose::algs::EDDSA,
            Some(a) => return Err(Error::Key(format!("unsupported algorithm {a:?}"))),
            None => message_alg.ok_or_else(|| {
                Error::Key("no algorithm in either the key or the message header".to_string())
            })?,
        });
        cose_key.key_ops(vec![cose::keys::KEY_OPS_VERIFY]);

        // cose-rust expects the d param to be set even on keys that are
        // only ever used for verification
        cose_key.d(hex!("deadbeef").to_vec());

        match &self.jwk.algorithm {
            jwk::AlgorithmParameters::EllipticCurve(ec_params) => {
                cose_key.kty(cose::keys::EC2);
                cose_key.crv(match &ec_params.curve {
                    jwk::EllipticCurve::P256 => cose::keys::P_256,
                    jwk::EllipticCurve::P384 => cose::keys::P_384,
                    jwk::EllipticCurve::P521 => cose::keys::P_521,
                    c => return Err(Error::UnsupportedCurve(format!("{c:?}"))),
                });
                cose_key.x(decode_b64url(ec_params.x.as_str(), "x")?);
                cose_key.y(decode_b64url(ec_params.y.as_str(), "y")?);
            }
            jwk::AlgorithmParameters::OctetKeyPair(okp_params) => {
                cose_key.kty(cose::keys::OKP);
                cose_key.crv(match &okp_params.curve {
                    jwk::EllipticCurve::Ed25519 => cose::keys::ED25519,
                    c => return Err(Error::UnsupportedCurve(format!("{c:?}"))),
                });
                cose_key.x(decode_b64url(okp_params.x.as_str(), "x")?);
            }
            a => return Err(Error::UnsupportedKeyType(format!("{a:?}"))),
        }

        Ok(cose_key)
    }
}

fn decode_jwk_param(v: &Option<String>, name: &str) -> Result<Vec<u8>, Error> {
    let s = v
        .as_deref()
        .ok_or_else(|| Error::Key(format!("missing {name} parameter in EC key")))?;

    decode_b64url(s, name)
}

fn decode_b64url(s: &str, name: &str) -> Result<Vec<u8>, Error> {
    general_purpose::URL_SAFE_NO_PAD
        .decode(s)
        .map_err(|e| Error::Key(format!("decoding {name} parameter: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_common::TEST_ES256_KEY;

    const TEST_ES384_KEY: &str = r#"{
        "kty": "EC",
        "crv": "P-384",
        "x": "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA",
        "y": "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA",
        "d": "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA"
    }"#;

    const TEST_ES512_KEY: &str = r#"{
        "kty": "EC",
        "crv": "P-521",
        "x": "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA",
        "y": "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA",
        "d": "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA"
    }"#;

    #[test]
    fn resolve_p256_to_es256() {
        let s = Signer::from_jwk(TEST_ES256_KEY.as_bytes()).unwrap();
        assert_eq!(s.algorithm(), Algorithm::ES256);
    }

    #[test]
    fn resolve_p384_to_es384() {
        let s = Signer::from_jwk(TEST_ES384_KEY.as_bytes()).unwrap();
        assert_eq!(s.algorithm(), Algorithm::ES384);
    }

    #[test]
    fn resolve_p521_to_es512() {
        let s = Signer::from_jwk(TEST_ES512_KEY.as_bytes()).unwrap();
        assert_eq!(s.algorithm(), Algorithm::ES512);
    }

    #[test]
    fn resolve_rsa_to_ps256() {
        let k = r#"{"kty": "RSA", "n": "AQAB", "e": "AQAB", "d": "AQAB"}"#;

        let s = Signer::from_jwk(k.as_bytes()).unwrap();
        assert_eq!(s.algorithm(), Algorithm::PS256);
    }

    #[test]
    fn ps256_signing_unsupported() {
        let k = r#"{"kty": "RSA", "n": "AQAB", "e": "AQAB", "d": "AQAB"}"#;

        let s = Signer::from_jwk(k.as_bytes()).unwrap();
        let e = s.sign(vec![0xa0]).unwrap_err();
        assert_eq!(
            e,
            Error::Sign("COSE signing with PS256 is not supported".to_string())
        );
    }

    #[test]
    fn resolve_unknown_curve() {
        let k = r#"{
            "kty": "EC",
            "crv": "secp256k1",
            "x": "MKBCTNIcKUSDii11ySs3526iDZ8AiTo7Tu6KPAqv7D4",
            "y": "4Etl6SRW2YiLUrN5vfvVHuhp7x8PxltmWWlbbM4IFyM",
            "d": "870MB6gfuTJ4HtUnUvYMyJpr5eUZNP4Bk43bVdj3eAE"
        }"#;

        let e = Signer::from_jwk(k.as_bytes()).unwrap_err();
        assert_eq!(e, Error::UnsupportedCurve("secp256k1".to_string()));
    }

    #[test]
    fn resolve_unknown_key_type() {
        let k = r#"{"kty": "oct", "k": "AQAB"}"#;

        let e = Signer::from_jwk(k.as_bytes()).unwrap_err();
        assert_eq!(e, Error::UnsupportedKeyType("oct".to_string()));
    }

    #[test]
    fn resolve_not_a_private_key() {
        let k = r#"{
            "kty": "EC",
            "crv": "P-256",
            "x": "MKBCTNIcKUSDii11ySs3526iDZ8AiTo7Tu6KPAqv7D4",
            "y": "4Etl6SRW2YiLUrN5vfvVHuhp7x8PxltmWWlbbM4IFyM"
        }"#;

        let e = Signer::from_jwk(k.as_bytes()).unwrap_err();
        assert_eq!(
            e,
            Error::Key("missing d parameter in EC key".to_string())
        );
    }

    #[test]
    fn resolve_malformed_key() {
        let e = Signer::from_jwk(b"[]").unwrap_err();
        assert!(matches!(e, Error::Key(_)));
    }

    #[test]
    fn public_key_ok() {
        let k = r#"{
            "kty": "EC",
            "crv": "P-256",
            "x": "MKBCTNIcKUSDii11ySs3526iDZ8AiTo7Tu6KPAqv7D4",
            "y": "4Etl6SRW2YiLUrN5vfvVHuhp7x8PxltmWWlbbM4IFyM"
        }"#;

        let pk = PublicKey::from_jwk(k.as_bytes()).unwrap();
        let ck = pk.to_cose_key(Some(cose::algs::ES256)).unwrap();
        assert_eq!(ck.alg, Some(cose::algs::ES256));
    }

    #[test]
    fn public_key_no_algorithm_anywhere() {
        let k = r#"{
            "kty": "EC",
            "crv": "P-256",
            "x": "MKBCTNIcKUSDii11ySs3526iDZ8AiTo7Tu6KPAqv7D4",
            "y": "4Etl6SRW2YiLUrN5vfvVHuhp7x8PxltmWWlbbM4IFyM"
        }"#;

        let pk = PublicKey::from_jwk(k.as_bytes()).unwrap();
        assert!(pk.to_cose_key(None).is_err());
    }
}
