// Copyright 2024 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use super::platform::Platform;
use super::realm::Realm;
use crate::common::map_label;
use crate::errors::Error;
use crate::key::{PublicKey, Signer};
use crate::ValidationMode;
use ciborium::de::from_reader;
use ciborium::ser::into_writer;
use ciborium::Value;
use cose::keys::CoseKey;
use cose::message::CoseMessage;
use hex_literal::hex;
use openssl::bn::{BigNum, BigNumContext};
use openssl::ec::{EcGroup, EcPoint};
use openssl::hash::{Hasher, MessageDigest};
use openssl::nid::Nid;
use serde::Deserialize;
use serde_json::value::RawValue;

const CBOR_TAG: u64 = 399;
const PLATFORM_LABEL: i64 = 44234;
const REALM_LABEL: i64 = 44241;

const SHA_256: &str = "sha-256";
const SHA_512: &str = "sha-512";

/// The raw two-token collection wrapped in CBOR tag 399
struct Collection {
    raw_platform_token: Vec<u8>,
    raw_realm_token: Vec<u8>,
}

impl Collection {
    fn decode(buf: &[u8]) -> Result<Collection, Error> {
        let v: Value = from_reader(buf).map_err(|e| Error::Syntax(e.to_string()))?;

        let Value::Tag(t, m) = v else {
            return Err(Error::Syntax("expecting tag type".to_string()));
        };

        if t != CBOR_TAG {
            return Err(Error::Syntax(format!("expecting tag {CBOR_TAG}, got {t}")));
        }

        let Value::Map(contents) = *m else {
            return Err(Error::Syntax("expecting map type".to_string()));
        };

        let mut raw_platform_token: Option<Vec<u8>> = None;
        let mut raw_realm_token: Option<Vec<u8>> = None;

        for (k, v) in contents.iter() {
            let Some(label) = map_label(k) else {
                return Err(Error::Syntax("expecting integer key".to_string()));
            };

            let slot = match label {
                PLATFORM_LABEL => &mut raw_platform_token,
                REALM_LABEL => &mut raw_realm_token,
                unknown => {
                    return Err(Error::Syntax(format!("unknown key {unknown} in collection")))
                }
            };

            let x = v
                .as_bytes()
                .cloned()
                .ok_or_else(|| Error::Syntax(format!("key {label} MUST be bstr")))?;

            *slot = Some(x);
        }

        Ok(Collection {
            raw_platform_token: raw_platform_token
                .ok_or_else(|| Error::Syntax("missing platform token".to_string()))?,
            raw_realm_token: raw_realm_token
                .ok_or_else(|| Error::Syntax("missing realm token".to_string()))?,
        })
    }

    fn encode(&self) -> Result<Vec<u8>, Error> {
        let m = Value::Map(vec![
            (
                Value::from(PLATFORM_LABEL),
                Value::Bytes(self.raw_platform_token.clone()),
            ),
            (
                Value::from(REALM_LABEL),
                Value::Bytes(self.raw_realm_token.clone()),
            ),
        ]);

        let mut buf: Vec<u8> = Vec::new();
        into_writer(&Value::Tag(CBOR_TAG, Box::new(m)), &mut buf)
            .map_err(|e| Error::Syntax(e.to_string()))?;

        Ok(buf)
    }
}

/// Collects the two claims-sets that make up a CCA token
#[derive(Debug)]
pub struct Evidence {
    pub platform: Platform,
    pub realm: Realm,
}

impl Evidence {
    /// Decode the JSON claims document holding the platform and realm
    /// claims-sets as two independent sub-documents.  A decoding failure
    /// reports which of the two failed.
    pub fn decode_claims_from_json(buf: &[u8], mode: ValidationMode) -> Result<Evidence, Error> {
        #[derive(Deserialize)]
        struct JsonCollection<'a> {
            #[serde(rename = "cca-platform-token", borrow)]
            platform_token: &'a RawValue,
            #[serde(rename = "cca-realm-delegated-token", borrow)]
            realm_token: &'a RawValue,
        }

        let c: JsonCollection = serde_json::from_slice(buf)
            .map_err(|e| Error::Syntax(format!("unmarshaling CCA claims: {e}")))?;

        let platform = Platform::from_json(c.platform_token.get().as_bytes(), mode)
            .map_err(|e| in_side("platform claims", e))?;

        let realm = Realm::from_json(c.realm_token.get().as_bytes(), mode)
            .map_err(|e| in_side("realm claims", e))?;

        Ok(Evidence { platform, realm })
    }

    /// Decode a CBOR-encoded CCA token without checking signatures
    pub fn decode(buf: &[u8]) -> Result<Evidence, Error> {
        let c = Collection::decode(buf)?;

        let mut pmsg = CoseMessage::new_sign();
        pmsg.bytes = c.raw_platform_token;
        pmsg.init_decoder(None)
            .map_err(|e| Error::Syntax(format!("platform token: {e:?}")))?;

        let mut rmsg = CoseMessage::new_sign();
        rmsg.bytes = c.raw_realm_token;
        rmsg.init_decoder(None)
            .map_err(|e| Error::Syntax(format!("realm token: {e:?}")))?;

        let platform =
            Platform::from_cbor(&pmsg.payload).map_err(|e| in_side("platform token", e))?;
        platform
            .validate()
            .map_err(|e| in_side("platform token", e))?;

        let realm = Realm::from_cbor(&rmsg.payload).map_err(|e| in_side("realm token", e))?;
        realm.validate().map_err(|e| in_side("realm token", e))?;

        Ok(Evidence { platform, realm })
    }

    /// Validate both claims-sets and produce the signed token.  The
    /// platform and realm claims-sets are signed independently with their
    /// respective keys; before signing, the platform challenge claim is
    /// set to the digest of the realm public key claim, which is the
    /// binding the verifier re-checks.
    pub fn sign(
        &mut self,
        platform_signer: &Signer,
        realm_signer: &Signer,
    ) -> Result<Vec<u8>, Error> {
        self.bind()?;

        self.platform
            .validate()
            .map_err(|e| in_side("platform claims", e))?;
        self.realm
            .validate()
            .map_err(|e| in_side("realm claims", e))?;

        self.encode_signed(platform_signer, realm_signer)
    }

    /// Produce a signed token from the claims-sets as they are.  Only
    /// reachable from permissively loaded claims; used to generate
    /// deliberately invalid evidence for negative testing.
    pub fn sign_unvalidated(
        &mut self,
        platform_signer: &Signer,
        realm_signer: &Signer,
    ) -> Result<Vec<u8>, Error> {
        self.bind()?;

        self.encode_signed(platform_signer, realm_signer)
    }

    fn bind(&mut self) -> Result<(), Error> {
        let rak = self
            .realm
            .rak
            .as_deref()
            .ok_or_else(|| Error::MissingClaim("public-key".to_string()))?;
        let alg = self
            .realm
            .rak_hash_alg
            .as_deref()
            .ok_or_else(|| Error::MissingClaim("public-key-hash-algo-id".to_string()))?;

        let mut hasher = hasher_from_alg(alg)?;
        hasher
            .update(rak)
            .map_err(|e| Error::Sign(format!("computing realm key hash: {e}")))?;
        let sum = hasher
            .finish()
            .map_err(|e| Error::Sign(format!("computing realm key hash: {e}")))?;

        self.platform.challenge = Some(sum.to_vec());

        Ok(())
    }

    fn encode_signed(
        &self,
        platform_signer: &Signer,
        realm_signer: &Signer,
    ) -> Result<Vec<u8>, Error> {
        let c = Collection {
            raw_platform_token: platform_signer
                .sign(self.platform.to_cbor()?)
                .map_err(|e| in_side("platform token", e))?,
            raw_realm_token: realm_signer
                .sign(self.realm.to_cbor()?)
                .map_err(|e| in_side("realm token", e))?,
        };

        c.encode()
    }

    /// Cryptographically verify the token: the platform signature with the
    /// supplied key, the realm signature with the realm public key
    /// embedded in the realm claims-set, and the binding between the two
    /// halves
    pub fn verify(buf: &[u8], platform_key: &PublicKey) -> Result<Evidence, Error> {
        let c = Collection::decode(buf)?;

        let mut pmsg = CoseMessage::new_sign();
        pmsg.bytes = c.raw_platform_token;
        pmsg.init_decoder(None)
            .map_err(|e| Error::Syntax(format!("platform token: {e:?}")))?;

        let mut rmsg = CoseMessage::new_sign();
        rmsg.bytes = c.raw_realm_token;
        rmsg.init_decoder(None)
            .map_err(|e| Error::Syntax(format!("realm token: {e:?}")))?;

        let platform =
            Platform::from_cbor(&pmsg.payload).map_err(|e| in_side("platform token", e))?;
        platform
            .validate()
            .map_err(|e| in_side("platform token", e))?;

        let realm = Realm::from_cbor(&rmsg.payload).map_err(|e| in_side("realm token", e))?;
        realm.validate().map_err(|e| in_side("realm token", e))?;

        let pkey = platform_key.to_cose_key(pmsg.header.alg)?;
        pmsg.key(&pkey)
            .map_err(|e| Error::Key(format!("setting platform verification key: {e:?}")))?;
        pmsg.decode(None, None)
            .map_err(|e| Error::Verify(format!("platform token: {e:?}")))?;

        // the realm key is attested by the platform via the challenge
        // binding, so it can be taken from the realm claims-set itself
        let rak = realm.rak.as_deref().unwrap_or_default();
        let rkey = realm_verification_key(rak, rmsg.header.alg)?;
        rmsg.key(&rkey)
            .map_err(|e| Error::Key(format!("setting realm verification key: {e:?}")))?;
        rmsg.decode(None, None)
            .map_err(|e| Error::Verify(format!("realm token: {e:?}")))?;

        check_binding(&platform, &realm)?;

        Ok(Evidence { platform, realm })
    }

    pub fn claims_to_json(&self) -> Result<String, Error> {
        let v = serde_json::json!({
            "cca-platform-token": self.platform.to_json_value()?,
            "cca-realm-delegated-token": self.realm.to_json_value()?,
        });

        serde_json::to_string_pretty(&v).map_err(|e| Error::Syntax(e.to_string()))
    }
}

/// Re-compute the platform/realm binder and compare it against the
/// platform challenge claim.  Expects validated claims-sets.
fn check_binding(platform: &Platform, realm: &Realm) -> Result<(), Error> {
    let rak = realm
        .rak
        .as_deref()
        .ok_or_else(|| Error::MissingClaim("public-key".to_string()))?;
    let alg = realm
        .rak_hash_alg
        .as_deref()
        .ok_or_else(|| Error::MissingClaim("public-key-hash-algo-id".to_string()))?;
    let challenge = platform
        .challenge
        .as_deref()
        .ok_or_else(|| Error::MissingClaim("challenge".to_string()))?;

    let mut hasher = hasher_from_alg(alg)?;
    hasher
        .update(rak)
        .map_err(|e| Error::Verify(format!("computing realm key hash: {e}")))?;
    let sum = hasher
        .finish()
        .map_err(|e| Error::Verify(format!("computing realm key hash: {e}")))?;

    if sum.as_ref() != challenge {
        return Err(Error::Verify(
            "platform challenge does not match the realm public key hash".to_string(),
        ));
    }

    Ok(())
}

fn hasher_from_alg(alg: &str) -> Result<Hasher, Error> {
    let h = match alg {
        SHA_256 => Hasher::new(MessageDigest::sha256()),
        SHA_512 => Hasher::new(MessageDigest::sha512()),
        x => return Err(Error::Sema(format!("unknown hash algorithm {x}"))),
    };

    h.map_err(|e| Error::Sign(format!("creating hasher: {e}")))
}

/// Re-format the raw realm public key (an uncompressed P-384 point) into a
/// COSE verification key, taking the algorithm from the realm token header
fn realm_verification_key(rak: &[u8], alg: Option<i32>) -> Result<CoseKey, Error> {
    let alg = alg.ok_or_else(|| {
        Error::Syntax("alg header parameter not found in realm token".to_string())
    })?;

    let group = EcGroup::from_curve_name(Nid::SECP384R1)
        .map_err(|e| Error::Key(format!("creating P-384 group: {e}")))?;
    let mut ctx =
        BigNumContext::new().map_err(|e| Error::Key(format!("creating bignum context: {e}")))?;
    let point = EcPoint::from_bytes(&group, rak, &mut ctx)
        .map_err(|e| Error::Key(format!("formatting the realm public key claim: {e}")))?;

    let mut x = BigNum::new().map_err(|e| Error::Key(e.to_string()))?;
    let mut y = BigNum::new().map_err(|e| Error::Key(e.to_string()))?;
    point
        .affine_coordinates(&group, &mut x, &mut y, &mut ctx)
        .map_err(|e| Error::Key(format!("extracting realm public key coordinates: {e}")))?;

    let mut cose_key = CoseKey::new();
    cose_key.kty(cose::keys::EC2);
    cose_key.crv(cose::keys::P_384);
    cose_key.x(x.to_vec());
    cose_key.y(y.to_vec());
    cose_key.alg(alg);
    cose_key.key_ops(vec![cose::keys::KEY_OPS_VERIFY]);

    // cose-rust expects the d param to be set even on keys that are only
    // ever used for verification
    cose_key.d(hex!("deadbeef").to_vec());

    Ok(cose_key)
}

/// Prefix a claims error message with the half of the token it refers to
fn in_side(side: &str, e: Error) -> Error {
    match e {
        Error::Syntax(s) => Error::Syntax(format!("{side}: {s}")),
        Error::Sema(s) => Error::Sema(format!("{side}: {s}")),
        Error::MissingClaim(s) => Error::MissingClaim(format!("{side}: {s}")),
        Error::DuplicatedClaim(s) => Error::DuplicatedClaim(format!("{side}: {s}")),
        Error::TypeMismatch(s) => Error::TypeMismatch(format!("{side}: {s}")),
        Error::Profile(s) => Error::Profile(format!("{side}: {s}")),
        Error::Nonce(s) => Error::Nonce(format!("{side}: {s}")),
        Error::Sign(s) => Error::Sign(format!("{side}: {s}")),
        e => e,
    }
}
