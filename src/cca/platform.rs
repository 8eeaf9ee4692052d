// Copyright 2024 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use crate::common::{
    is_valid_hash, is_valid_lifecycle, is_valid_measurement, map_label, to_bstr, to_int, to_tstr,
};
use crate::errors::Error;
use crate::psa::{JsonSwComponent, SwComponent};
use crate::ValidationMode;
use ciborium::de::from_reader;
use ciborium::ser::into_writer;
use ciborium::Value;
use serde::{Deserialize, Serialize};
use serde_with::base64::Base64;
use serde_with::serde_as;

pub const CCA_PLATFORM_PROFILE: &str = "http://arm.com/CCA-SSD/1.0.0";

const PLATFORM_PROFILE_LABEL: i64 = 265;
const PLATFORM_CHALLENGE_LABEL: i64 = 10;
const PLATFORM_IMPL_ID_LABEL: i64 = 2396;
const PLATFORM_INST_ID_LABEL: i64 = 256;
const PLATFORM_CONFIG_LABEL: i64 = 2401;
const PLATFORM_LIFECYCLE_LABEL: i64 = 2395;
const PLATFORM_SW_COMPONENTS_LABEL: i64 = 2399;
const PLATFORM_VERIFICATION_SERVICE_LABEL: i64 = 2400;
const PLATFORM_HASH_ALG_LABEL: i64 = 2402;

/// The CCA platform claims-set
#[derive(Debug, Clone)]
pub struct Platform {
    pub profile: Option<String>,          // 265, text
    pub challenge: Option<Vec<u8>>,       // 10, bytes .size {32,48,64}
    pub impl_id: Option<Vec<u8>>,         // 2396, bytes .size 32
    pub inst_id: Option<Vec<u8>>,         // 256, bytes .size 33
    pub config: Option<Vec<u8>>,          // 2401, bytes
    pub lifecycle: Option<u16>,           // 2395, 0x0000..0x00ff ... 0x6000..0x60ff
    pub sw_components: Option<Vec<SwComponent>>, // 2399
    pub verification_service: Option<String>, // 2400, text
    pub hash_alg: Option<String>,         // 2402, text
}

impl Platform {
    fn new() -> Self {
        Self {
            profile: None,
            challenge: None,
            impl_id: None,
            inst_id: None,
            config: None,
            lifecycle: None,
            sw_components: None,
            verification_service: None,
            hash_alg: None,
        }
    }

    /// Decode a CBOR encoded CCA platform claims-set.  Structural
    /// validation is separate, see [`Platform::validate`].
    pub(crate) fn from_cbor(buf: &[u8]) -> Result<Platform, Error> {
        let v: Value = from_reader(buf).map_err(|e| Error::Syntax(e.to_string()))?;

        let contents = v
            .as_map()
            .ok_or_else(|| Error::TypeMismatch("expecting map type".to_string()))?;

        let mut pc = Platform::new();
        pc.parse(contents)?;

        Ok(pc)
    }

    fn parse(&mut self, contents: &[(Value, Value)]) -> Result<(), Error> {
        for (k, v) in contents.iter() {
            // CCA does not define any non-integer key
            let Some(label) = map_label(k) else { continue };

            match label {
                PLATFORM_PROFILE_LABEL => self.set_profile(to_tstr(v, "profile")?)?,
                PLATFORM_CHALLENGE_LABEL => {
                    set_once(&mut self.challenge, to_bstr(v, "challenge")?, "challenge")?
                }
                PLATFORM_IMPL_ID_LABEL => set_once(
                    &mut self.impl_id,
                    to_bstr(v, "implementation-id")?,
                    "implementation-id",
                )?,
                PLATFORM_INST_ID_LABEL => {
                    set_once(&mut self.inst_id, to_bstr(v, "instance-id")?, "instance-id")?
                }
                PLATFORM_CONFIG_LABEL => {
                    set_once(&mut self.config, to_bstr(v, "config")?, "config")?
                }
                PLATFORM_LIFECYCLE_LABEL => {
                    let lc = to_int(v, "lifecycle")?;
                    let lc = lc
                        .try_into()
                        .map_err(|_| Error::Sema(format!("lifecycle out of range: {lc}")))?;
                    set_once(&mut self.lifecycle, lc, "lifecycle")?;
                }
                PLATFORM_SW_COMPONENTS_LABEL => self.set_sw_components(v)?,
                PLATFORM_VERIFICATION_SERVICE_LABEL => set_once(
                    &mut self.verification_service,
                    to_tstr(v, "verification-service")?,
                    "verification-service",
                )?,
                PLATFORM_HASH_ALG_LABEL => {
                    set_once(&mut self.hash_alg, to_tstr(v, "hash-algo-id")?, "hash-algo-id")?
                }
                _ => continue,
            }
        }

        Ok(())
    }

    fn set_profile(&mut self, p: String) -> Result<(), Error> {
        if self.profile.is_some() {
            return Err(Error::DuplicatedClaim("profile".to_string()));
        }

        if p != CCA_PLATFORM_PROFILE {
            return Err(Error::Profile(format!("unknown profile {p}")));
        }

        self.profile = Some(p);

        Ok(())
    }

    fn set_sw_components(&mut self, v: &Value) -> Result<(), Error> {
        if self.sw_components.is_some() {
            return Err(Error::DuplicatedClaim("software-components".to_string()));
        }

        let x = v
            .as_array()
            .ok_or_else(|| Error::TypeMismatch("software-components MUST be array".to_string()))?;

        let mut components = Vec::new();

        for (i, xi) in x.iter().enumerate() {
            let m = xi.as_map().ok_or_else(|| {
                Error::TypeMismatch(format!("software-components[{i}] MUST be map"))
            })?;

            components.push(SwComponent::from_cbor_map(m)?);
        }

        self.sw_components = Some(components);

        Ok(())
    }

    /// Decode a JSON encoded CCA platform claims-set
    pub(crate) fn from_json(buf: &[u8], mode: ValidationMode) -> Result<Platform, Error> {
        let j: JsonPlatform =
            serde_json::from_slice(buf).map_err(|e| Error::Syntax(e.to_string()))?;

        let mut pc = Platform::new();

        if let Some(p) = j.profile {
            pc.set_profile(p)?;
        }
        pc.challenge = j.challenge;
        pc.impl_id = j.implementation_id;
        pc.inst_id = j.instance_id;
        pc.config = j.config;
        pc.lifecycle = j.lifecycle;
        pc.sw_components = j
            .sw_components
            .map(|v| v.into_iter().map(SwComponent::from).collect());
        pc.verification_service = j.verification_service;
        pc.hash_alg = j.hash_alg;

        if mode == ValidationMode::Strict {
            pc.validate()?;
        }

        Ok(pc)
    }

    pub(crate) fn to_cbor(&self) -> Result<Vec<u8>, Error> {
        let mut contents: Vec<(Value, Value)> = Vec::new();

        if let Some(x) = &self.profile {
            contents.push((Value::from(PLATFORM_PROFILE_LABEL), Value::Text(x.clone())));
        }
        if let Some(x) = &self.challenge {
            contents.push((Value::from(PLATFORM_CHALLENGE_LABEL), Value::Bytes(x.clone())));
        }
        if let Some(x) = &self.impl_id {
            contents.push((Value::from(PLATFORM_IMPL_ID_LABEL), Value::Bytes(x.clone())));
        }
        if let Some(x) = &self.inst_id {
            contents.push((Value::from(PLATFORM_INST_ID_LABEL), Value::Bytes(x.clone())));
        }
        if let Some(x) = &self.config {
            contents.push((Value::from(PLATFORM_CONFIG_LABEL), Value::Bytes(x.clone())));
        }
        if let Some(x) = self.lifecycle {
            contents.push((
                Value::from(PLATFORM_LIFECYCLE_LABEL),
                Value::from(i64::from(x)),
            ));
        }
        if let Some(x) = &self.sw_components {
            contents.push((
                Value::from(PLATFORM_SW_COMPONENTS_LABEL),
                Value::Array(x.iter().map(SwComponent::to_cbor_value).collect()),
            ));
        }
        if let Some(x) = &self.verification_service {
            contents.push((
                Value::from(PLATFORM_VERIFICATION_SERVICE_LABEL),
                Value::Text(x.clone()),
            ));
        }
        if let Some(x) = &self.hash_alg {
            contents.push((Value::from(PLATFORM_HASH_ALG_LABEL), Value::Text(x.clone())));
        }

        let mut buf: Vec<u8> = Vec::new();
        into_writer(&Value::Map(contents), &mut buf).map_err(|e| Error::Syntax(e.to_string()))?;

        Ok(buf)
    }

    /// Structural validation: all platform claims are mandatory except the
    /// verification service indicator
    pub(crate) fn validate(&self) -> Result<(), Error> {
        if self.profile.is_none() {
            return Err(Error::MissingClaim("profile".to_string()));
        }

        match &self.challenge {
            None => return Err(Error::MissingClaim("challenge".to_string())),
            Some(x) => {
                if !is_valid_measurement(x) {
                    return Err(Error::Sema(format!(
                        "challenge: expecting 32, 48 or 64 bytes, got {}",
                        x.len()
                    )));
                }
            }
        }

        match &self.impl_id {
            None => return Err(Error::MissingClaim("implementation-id".to_string())),
            Some(x) => {
                if x.len() != 32 {
                    return Err(Error::Sema(format!(
                        "implementation-id: expecting 32 bytes, got {}",
                        x.len()
                    )));
                }
            }
        }

        match &self.inst_id {
            None => return Err(Error::MissingClaim("instance-id".to_string())),
            Some(x) => {
                if x.len() != 33 {
                    return Err(Error::Sema(format!(
                        "instance-id: expecting 33 bytes, got {}",
                        x.len()
                    )));
                }
            }
        }

        if self.config.is_none() {
            return Err(Error::MissingClaim("config".to_string()));
        }

        match self.lifecycle {
            None => return Err(Error::MissingClaim("lifecycle".to_string())),
            Some(lc) => {
                if !is_valid_lifecycle(i128::from(lc)) {
                    return Err(Error::Sema(format!("unknown lifecycle {lc}")));
                }
            }
        }

        match &self.sw_components {
            None => return Err(Error::MissingClaim("software-components".to_string())),
            Some(x) => {
                if x.is_empty() {
                    return Err(Error::Sema(
                        "software-components: expecting at least one slot".to_string(),
                    ));
                }
                for c in x.iter() {
                    c.validate()?;
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

        Ok(())
    }

    pub(crate) fn to_json_value(&self) -> Result<serde_json::Value, Error> {
        serde_json::to_value(JsonPlatform::from(self)).map_err(|e| Error::Syntax(e.to_string()))
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
struct JsonPlatform {
    #[serde(
        rename = "cca-platform-profile",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    profile: Option<String>,
    #[serde_as(as = "Option<Base64>")]
    #[serde(
        rename = "cca-platform-challenge",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    challenge: Option<Vec<u8>>,
    #[serde_as(as = "Option<Base64>")]
    #[serde(
        rename = "cca-platform-implementation-id",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    implementation_id: Option<Vec<u8>>,
    #[serde_as(as = "Option<Base64>")]
    #[serde(
        rename = "cca-platform-instance-id",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    instance_id: Option<Vec<u8>>,
    #[serde_as(as = "Option<Base64>")]
    #[serde(
        rename = "cca-platform-config",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    config: Option<Vec<u8>>,
    #[serde(
        rename = "cca-platform-lifecycle",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    lifecycle: Option<u16>,
    #[serde(
        rename = "cca-platform-sw-components",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    sw_components: Option<Vec<JsonSwComponent>>,
    #[serde(
        rename = "cca-platform-service-indicator",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    verification_service: Option<String>,
    #[serde(
        rename = "cca-platform-hash-algo-id",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    hash_alg: Option<String>,
}

impl From<&Platform> for JsonPlatform {
    fn from(p: &Platform) -> Self {
        JsonPlatform {
            profile: p.profile.clone(),
            challenge: p.challenge.clone(),
            implementation_id: p.impl_id.clone(),
            instance_id: p.inst_id.clone(),
            config: p.config.clone(),
            lifecycle: p.lifecycle,
            sw_components: p
                .sw_components
                .as_ref()
                .map(|v| v.iter().map(JsonSwComponent::from).collect()),
            verification_service: p.verification_service.clone(),
            hash_alg: p.hash_alg.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn cbor_roundtrip() {
        let mut p = Platform::new();
        p.set_profile(CCA_PLATFORM_PROFILE.to_string()).unwrap();
        p.challenge = Some(vec![0u8; 32]);
        p.impl_id = Some(vec![1u8; 32]);
        p.inst_id = Some(vec![2u8; 33]);
        p.config = Some(vec![1, 2, 3]);
        p.lifecycle = Some(0x3000);
        p.sw_components = Some(vec![SwComponent {
            mval: Some(vec![3u8; 32]),
            signer_id: Some(vec![4u8; 32]),
            ..Default::default()
        }]);
        p.hash_alg = Some("sha-256".to_string());

        p.validate().expect("validating synthetic platform claims");

        let buf = p.to_cbor().unwrap();
        let back = Platform::from_cbor(&buf).unwrap();
        back.validate().unwrap();

        assert_eq!(back.profile.as_deref(), Some(CCA_PLATFORM_PROFILE));
        assert_eq!(back.impl_id, p.impl_id);
        assert_eq!(back.lifecycle, Some(0x3000));
    }

    #[test]
    fn unknown_profile() {
        let e = Platform::from_json(
            br#"{"cca-platform-profile": "http://arm.com/psa/2.0.0"}"#,
            crate::ValidationMode::Permissive,
        )
        .unwrap_err();

        assert_eq!(
            e,
            Error::Profile("unknown profile http://arm.com/psa/2.0.0".to_string())
        );
    }

    #[test]
    fn dup_claim() {
        // {10: h'00', 10: h'00'}
        let buf = hex!("a20a41000a4100").to_vec();

        let e = Platform::from_cbor(&buf).unwrap_err();
        assert_eq!(e, Error::DuplicatedClaim("challenge".to_string()));
    }

    #[test]
    fn empty_map_fails_validation() {
        let buf = hex!("a0").to_vec();

        let p = Platform::from_cbor(&buf).expect("decoding an empty map is fine");
        assert!(p.validate().is_err());
    }
}
