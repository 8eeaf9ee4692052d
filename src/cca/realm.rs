// Copyright 2024 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use crate::common::{is_valid_hash, is_valid_measurement, map_label, to_bstr, to_tstr};
use crate::errors::Error;
use crate::ValidationMode;
use ciborium::de::from_reader;
use ciborium::ser::into_writer;
use ciborium::Value;
use serde::{Deserialize, Serialize};
use serde_with::base64::Base64;
use serde_with::serde_as;

const REALM_CHALLENGE_LABEL: i64 = 10;
const REALM_PERSO_LABEL: i64 = 44235;
const REALM_HASH_ALG_LABEL: i64 = 44236;
const REALM_RAK_LABEL: i64 = 44237;
const REALM_RIM_LABEL: i64 = 44238;
const REALM_REM_LABEL: i64 = 44239;
const REALM_RAK_HASH_ALG_LABEL: i64 = 44240;

/// The CCA realm claims-set
#[derive(Debug, Clone)]
pub struct Realm {
    pub challenge: Option<Vec<u8>>,    //    10 => bytes .size 64
    pub perso: Option<Vec<u8>>,        // 44235 => bytes .size 64
    pub rim: Option<Vec<u8>>,          // 44238 => bytes .size {32,48,64}
    pub rem: Option<Vec<Vec<u8>>>,     // 44239 => [ 4 * bytes .size {32,48,64} ]
    pub hash_alg: Option<String>,      // 44236 => text
    pub rak: Option<Vec<u8>>,          // 44237 => bytes .size 97
    pub rak_hash_alg: Option<String>,  // 44240 => text
}

impl Realm {
    fn new() -> Self {
        Self {
            challenge: None,
            perso: None,
            rim: None,
            rem: None,
            hash_alg: None,
            rak: None,
            rak_hash_alg: None,
        }
    }

    /// Decode a CBOR encoded CCA realm claims-set.  Structural validation
    /// is separate, see [`Realm::validate`].
    pub(crate) fn from_cbor(buf: &[u8]) -> Result<Realm, Error> {
        let v: Value = from_reader(buf).map_err(|e| Error::Syntax(e.to_string()))?;

        let contents = v
            .as_map()
            .ok_or_else(|| Error::TypeMismatch("expecting map type".to_string()))?;

        let mut rc = Realm::new();
        rc.parse(contents)?;

        Ok(rc)
    }

    fn parse(&mut self, contents: &[(Value, Value)]) -> Result<(), Error> {
        for (k, v) in contents.iter() {
            // CCA does not define any non-integer key
            let Some(label) = map_label(k) else { continue };

            match label {
                REALM_CHALLENGE_LABEL => {
                    set_once(&mut self.challenge, to_bstr(v, "challenge")?, "challenge")?
                }
                REALM_PERSO_LABEL => set_once(
                    &mut self.perso,
                    to_bstr(v, "personalization-value")?,
                    "personalization-value",
                )?,
                REALM_RIM_LABEL => set_once(
                    &mut self.rim,
                    to_bstr(v, "initial-measurement")?,
                    "initial-measurement",
                )?,
                REALM_REM_LABEL => self.set_rem(v)?,
                REALM_HASH_ALG_LABEL => {
                    set_once(&mut self.hash_alg, to_tstr(v, "hash-algo-id")?, "hash-algo-id")?
                }
                REALM_RAK_LABEL => {
                    set_once(&mut self.rak, to_bstr(v, "public-key")?, "public-key")?
                }
                REALM_RAK_HASH_ALG_LABEL => set_once(
                    &mut self.rak_hash_alg,
                    to_tstr(v, "public-key-hash-algo-id")?,
                    "public-key-hash-algo-id",
                )?,
                _ => continue,
            }
        }

        Ok(())
    }

    fn set_rem(&mut self, v: &Value) -> Result<(), Error> {
        if self.rem.is_some() {
            return Err(Error::DuplicatedClaim("extensible-measurements".to_string()));
        }

        let x = v.as_array().ok_or_else(|| {
            Error::TypeMismatch("extensible-measurements MUST be array".to_string())
        })?;

        let mut rem = Vec::new();

        for (i, xi) in x.iter().enumerate() {
            rem.push(to_bstr(xi, &format!("extensible-measurement[{i}]"))?);
        }

        self.rem = Some(rem);

        Ok(())
    }

    /// Decode a JSON encoded CCA realm claims-set
    pub(crate) fn from_json(buf: &[u8], mode: ValidationMode) -> Result<Realm, Error> {
        let j: JsonRealm = serde_json::from_slice(buf).map_err(|e| Error::Syntax(e.to_string()))?;

        let mut rc = Realm::new();

        rc.challenge = j.challenge;
        rc.perso = j.perso;
        rc.rim = j.rim;
        rc.rem = j.rem;
        rc.hash_alg = j.hash_alg;
        rc.rak = j.rak;
        rc.rak_hash_alg = j.rak_hash_alg;

        if mode == ValidationMode::Strict {
            rc.validate()?;
        }

        Ok(rc)
    }

    pub(crate) fn to_cbor(&self) -> Result<Vec<u8>, Error> {
        let mut contents: Vec<(Value, Value)> = Vec::new();

        if let Some(x) = &self.challenge {
            contents.push((Value::from(REALM_CHALLENGE_LABEL), Value::Bytes(x.clone())));
        }
        if let Some(x) = &self.perso {
            contents.push((Value::from(REALM_PERSO_LABEL), Value::Bytes(x.clone())));
        }
        if let Some(x) = &self.hash_alg {
            contents.push((Value::from(REALM_HASH_ALG_LABEL), Value::Text(x.clone())));
        }
        if let Some(x) = &self.rak {
            contents.push((Value::from(REALM_RAK_LABEL), Value::Bytes(x.clone())));
        }
        if let Some(x) = &self.rim {
            contents.push((Value::from(REALM_RIM_LABEL), Value::Bytes(x.clone())));
        }
        if let Some(x) = &self.rem {
            contents.push((
                Value::from(REALM_REM_LABEL),
                Value::Array(x.iter().map(|m| Value::Bytes(m.clone())).collect()),
            ));
        }
        if let Some(x) = &self.rak_hash_alg {
            contents.push((Value::from(REALM_RAK_HASH_ALG_LABEL), Value::Text(x.clone())));
        }

        let mut buf: Vec<u8> = Vec::new();
        into_writer(&Value::Map(contents), &mut buf).map_err(|e| Error::Syntax(e.to_string()))?;

        Ok(buf)
    }

    /// Inject the challenge.  The realm challenge claim is exactly 64
    /// bytes; anything else is rejected without touching the claims.
    pub fn set_challenge(&mut self, challenge: &[u8]) -> Result<(), Error> {
        if challenge.len() != 64 {
            return Err(Error::Nonce(format!(
                "wrong challenge length {}: the realm challenge is 64 bytes",
                challenge.len()
            )));
        }

        self.challenge = Some(challenge.to_vec());

        Ok(())
    }

    pub fn get_challenge(&self) -> Result<&[u8], Error> {
        self.challenge
            .as_deref()
            .ok_or_else(|| Error::MissingClaim("challenge".to_string()))
    }

    /// Structural validation: all realm claims are mandatory
    pub(crate) fn validate(&self) -> Result<(), Error> {
        match &self.challenge {
            None => return Err(Error::MissingClaim("challenge".to_string())),
            Some(x) => {
                if x.len() != 64 {
                    return Err(Error::Sema(format!(
                        "challenge: expecting 64 bytes, got {}",
                        x.len()
                    )));
                }
            }
        }

        match &self.perso {
            None => return Err(Error::MissingClaim("personalization-value".to_string())),
            Some(x) => {
                if x.len() != 64 {
                    return Err(Error::Sema(format!(
                        "personalization-value: expecting 64 bytes, got {}",
                        x.len()
                    )));
                }
            }
        }

        match &self.rim {
            None => return Err(Error::MissingClaim("initial-measurement".to_string())),
            Some(x) => {
                if !is_valid_measurement(x) {
                    return Err(Error::Sema(format!(
                        "initial-measurement: expecting 32, 48 or 64 bytes, got {}",
                        x.len()
                    )));
                }
            }
        }

        match &self.rem {
            None => return Err(Error::MissingClaim("extensible-measurements".to_string())),
            Some(x) => {
                if x.len() != 4 {
                    return Err(Error::Sema(format!(
                        "extensible-measurements: expecting 4 slots, got {}",
                        x.len()
                    )));
                }
                for (i, m) in x.iter().enumerate() {
                    if !is_valid_measurement(m) {
                        return Err(Error::Sema(format!(
                            "extensible-measurement[{i}]: expecting 32, 48 or 64 bytes, got {}",
                            m.len()
                        )));
                    }
                }
            }
        }

        match &self.hash_alg {
            None => return Err(Error::MissingClaim("hash-algo-id".to_string())),
            Some(x) => {
                if !is_valid_hash(x) {
                    return Err(Error::Sema(format!("unknown hash algorithm {x}")));
                }
            }
        }

        match &self.rak {
            None => return Err(Error::MissingClaim("public-key".to_string())),
            Some(x) => {
                if x.len() != 97 {
                    return Err(Error::Sema(format!(
                        "public-key: expecting 97 bytes, got {}",
                        x.len()
                    )));
                }
            }
        }

        match &self.rak_hash_alg {
            None => return Err(Error::MissingClaim("public-key-hash-algo-id".to_string())),
            Some(x) => {
                if !is_valid_hash(x) {
                    return Err(Error::Sema(format!("unknown hash algorithm {x}")));
                }
            }
        }

        Ok(())
    }

    pub(crate) fn to_json_value(&self) -> Result<serde_json::Value, Error> {
        serde_json::to_value(JsonRealm::from(self)).map_err(|e| Error::Syntax(e.to_string()))
    }
}

fn set_once<T>(slot: &mut Option<T>, v: T, name: &str) -> Result<(), Error> {
    if slot.is_some() {
        return Err(Error::DuplicatedClaim(name.to_string()));
    }

    *slot = Some(v);

    Ok(())
}

#[serde_as]
#[derive(Serialize, Deserialize)]
struct JsonRealm {
    #[serde_as(as = "Option<Base64>")]
    #[serde(
        rename = "cca-realm-challenge",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    challenge: Option<Vec<u8>>,
    #[serde_as(as = "Option<Base64>")]
    #[serde(
        rename = "cca-realm-personalization-value",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    perso: Option<Vec<u8>>,
    #[serde_as(as = "Option<Base64>")]
    #[serde(
        rename = "cca-realm-initial-measurement",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    rim: Option<Vec<u8>>,
    #[serde_as(as = "Option<Vec<Base64>>")]
    #[serde(
        rename = "cca-realm-extensible-measurements",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    rem: Option<Vec<Vec<u8>>>,
    #[serde(
        rename = "cca-realm-hash-algo-id",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    hash_alg: Option<String>,
    #[serde_as(as = "Option<Base64>")]
    #[serde(
        rename = "cca-realm-public-key",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    rak: Option<Vec<u8>>,
    #[serde(
        rename = "cca-realm-public-key-hash-algo-id",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    rak_hash_alg: Option<String>,
}

impl From<&Realm> for JsonRealm {
    fn from(r: &Realm) -> Self {
        JsonRealm {
            challenge: r.challenge.clone(),
            perso: r.perso.clone(),
            rim: r.rim.clone(),
            rem: r.rem.clone(),
            hash_alg: r.hash_alg.clone(),
            rak: r.rak.clone(),
            rak_hash_alg: r.rak_hash_alg.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    fn test_realm() -> Realm {
        let mut r = Realm::new();
        r.challenge = Some(vec![0u8; 64]);
        r.perso = Some(vec![1u8; 64]);
        r.rim = Some(vec![2u8; 32]);
        r.rem = Some(vec![vec![3u8; 32]; 4]);
        r.hash_alg = Some("sha-256".to_string());
        r.rak = Some(vec![4u8; 97]);
        r.rak_hash_alg = Some("sha-256".to_string());
        r
    }

    #[test]
    fn cbor_roundtrip() {
        let r = test_realm();
        r.validate().expect("validating synthetic realm claims");

        let buf = r.to_cbor().unwrap();
        let back = Realm::from_cbor(&buf).unwrap();
        back.validate().unwrap();

        assert_eq!(back.challenge, r.challenge);
        assert_eq!(back.rak, r.rak);
        assert_eq!(back.rem, r.rem);
    }

    #[test]
    fn challenge_injection() {
        let mut r = test_realm();

        let e = r.set_challenge(&[0xab; 48]).unwrap_err();
        assert_eq!(
            e,
            Error::Nonce(
                "wrong challenge length 48: the realm challenge is 64 bytes".to_string()
            )
        );
        assert_eq!(r.get_challenge().unwrap(), &[0u8; 64]);

        r.set_challenge(&[0xab; 64]).unwrap();
        assert_eq!(r.get_challenge().unwrap(), &[0xab; 64]);
    }

    #[test]
    fn missing_mandatory_claim() {
        let mut r = test_realm();
        r.perso = None;

        let e = r.validate().unwrap_err();
        assert_eq!(e, Error::MissingClaim("personalization-value".to_string()));
    }

    #[test]
    fn bad_rem_slot_count() {
        let mut r = test_realm();
        r.rem = Some(vec![vec![3u8; 32]; 3]);

        assert!(r.validate().is_err());
    }

    #[test]
    fn realm_bad_rubbish_cbor() {
        let buf = hex!("ffffffff").to_vec();

        assert!(Realm::from_cbor(&buf).is_err());
    }

    #[test]
    fn realm_bad_challenge_type() {
        // {10: 10} -- challenge must be a byte string
        let buf = hex!("a10a0a").to_vec();

        assert!(Realm::from_cbor(&buf).is_err());
    }
}
