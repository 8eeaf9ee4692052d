// Copyright 2024 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use crate::common::{
    is_valid_lifecycle, is_valid_measurement, map_label, to_bstr, to_int, to_tstr,
};
use crate::errors::Error;
use crate::ValidationMode;
use ciborium::de::from_reader;
use ciborium::ser::into_writer;
use ciborium::Value;
use serde::{Deserialize, Serialize};
use serde_with::base64::Base64;
use serde_with::serde_as;
use std::fmt;

pub const PSA_PROFILE_1: &str = "PSA_IOT_PROFILE_1";
pub const PSA_PROFILE_2: &str = "http://arm.com/psa/2.0.0";

/// The claims-set profiles a PSA token can conform to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    P1,
    P2,
}

impl Profile {
    pub fn as_str(self) -> &'static str {
        match self {
            Profile::P1 => PSA_PROFILE_1,
            Profile::P2 => PSA_PROFILE_2,
        }
    }

    pub fn from_name(name: &str) -> Result<Self, Error> {
        match name {
            PSA_PROFILE_1 => Ok(Profile::P1),
            PSA_PROFILE_2 => Ok(Profile::P2),
            _ => Err(Error::Profile(format!(
                "wrong profile {name}: allowed profiles are {PSA_PROFILE_2} and {PSA_PROFILE_1}"
            ))),
        }
    }

    fn labels(self) -> &'static ClaimLabels {
        match self {
            Profile::P1 => &P1_LABELS,
            Profile::P2 => &P2_LABELS,
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// CBOR map labels of the claims-set, which differ between the two profiles
struct ClaimLabels {
    profile: i64,
    partition_id: i64,
    lifecycle: i64,
    impl_id: i64,
    boot_seed: i64,
    hw_version: i64,
    sw_components: i64,
    no_sw_measurements: Option<i64>,
    nonce: i64,
    instance_id: i64,
    vsi: i64,
}

const P1_LABELS: ClaimLabels = ClaimLabels {
    profile: -75000,
    partition_id: -75001,
    lifecycle: -75002,
    impl_id: -75003,
    boot_seed: -75004,
    hw_version: -75005,
    sw_components: -75006,
    no_sw_measurements: Some(-75007),
    nonce: -75008,
    instance_id: -75009,
    vsi: -75010,
};

const P2_LABELS: ClaimLabels = ClaimLabels {
    nonce: 10,
    instance_id: 256,
    profile: 265,
    partition_id: 2394,
    lifecycle: 2395,
    impl_id: 2396,
    boot_seed: 2397,
    hw_version: 2398,
    sw_components: 2399,
    vsi: 2400,
    no_sw_measurements: None,
};

const SW_COMPONENT_MTYP: i64 = 1;
const SW_COMPONENT_MVAL: i64 = 2;
const SW_COMPONENT_VERSION: i64 = 4;
const SW_COMPONENT_SIGNER_ID: i64 = 5;
const SW_COMPONENT_MDESC: i64 = 6;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SwComponent {
    pub mtyp: Option<String>,        // 1, text
    pub mval: Option<Vec<u8>>,       // 2, bytes .size {32,48,64}
    pub version: Option<String>,     // 4, text
    pub signer_id: Option<Vec<u8>>,  // 5, bytes .size {32,48,64}
    pub mdesc: Option<String>,       // 6, text
}

impl SwComponent {
    pub(crate) fn from_cbor_map(contents: &[(Value, Value)]) -> Result<Self, Error> {
        let mut c = SwComponent::default();

        for (k, v) in contents.iter() {
            let Some(label) = map_label(k) else {
                return Err(Error::Syntax(
                    "non-integer key in software-components".to_string(),
                ));
            };

            match label {
                SW_COMPONENT_MTYP => {
                    set_once(&mut c.mtyp, to_tstr(v, "measurement-type")?, "measurement-type")?
                }
                SW_COMPONENT_MVAL => set_once(
                    &mut c.mval,
                    to_bstr(v, "measurement-value")?,
                    "measurement-value",
                )?,
                SW_COMPONENT_VERSION => {
                    set_once(&mut c.version, to_tstr(v, "version")?, "version")?
                }
                SW_COMPONENT_SIGNER_ID => {
                    set_once(&mut c.signer_id, to_bstr(v, "signer-id")?, "signer-id")?
                }
                SW_COMPONENT_MDESC => set_once(
                    &mut c.mdesc,
                    to_tstr(v, "measurement-description")?,
                    "measurement-description",
                )?,
                unknown => {
                    return Err(Error::Syntax(format!(
                        "unknown key {unknown} in software-components"
                    )))
                }
            }
        }

        Ok(c)
    }

    pub(crate) fn to_cbor_value(&self) -> Value {
        let mut contents: Vec<(Value, Value)> = Vec::new();

        if let Some(x) = &self.mtyp {
            contents.push((Value::from(SW_COMPONENT_MTYP), Value::Text(x.clone())));
        }
        if let Some(x) = &self.mval {
            contents.push((Value::from(SW_COMPONENT_MVAL), Value::Bytes(x.clone())));
        }
        if let Some(x) = &self.version {
            contents.push((Value::from(SW_COMPONENT_VERSION), Value::Text(x.clone())));
        }
        if let Some(x) = &self.signer_id {
            contents.push((Value::from(SW_COMPONENT_SIGNER_ID), Value::Bytes(x.clone())));
        }
        if let Some(x) = &self.mdesc {
            contents.push((Value::from(SW_COMPONENT_MDESC), Value::Text(x.clone())));
        }

        Value::Map(contents)
    }

    pub(crate) fn validate(&self) -> Result<(), Error> {
        match &self.mval {
            None => return Err(Error::MissingClaim("measurement-value".to_string())),
            Some(x) => {
                if !is_valid_measurement(x) {
                    return Err(Error::Sema(format!(
                        "measurement-value: expecting 32, 48 or 64 bytes, got {}",
                        x.len()
                    )));
                }
            }
        }

        match &self.signer_id {
            None => return Err(Error::MissingClaim("signer-id".to_string())),
            Some(x) => {
                if !is_valid_measurement(x) {
                    return Err(Error::Sema(format!(
                        "signer-id: expecting 32, 48 or 64 bytes, got {}",
                        x.len()
                    )));
                }
            }
        }

        Ok(())
    }
}

/// A PSA claims-set.  The profile is fixed at load time; the only mutation
/// the type supports is nonce injection via [`Claims::set_nonce`].
#[derive(Debug, Clone)]
pub struct Claims {
    profile: Profile,
    pub partition_id: Option<i64>,
    pub security_life_cycle: Option<u16>,
    pub impl_id: Option<Vec<u8>>,
    pub boot_seed: Option<Vec<u8>>,
    pub hw_version: Option<String>,
    pub sw_components: Option<Vec<SwComponent>>,
    pub no_sw_measurements: Option<u64>,
    pub nonce: Option<Vec<u8>>,
    pub instance_id: Option<Vec<u8>>,
    pub vsi: Option<String>,
}

impl Claims {
    fn new(profile: Profile) -> Self {
        Self {
            profile,
            partition_id: None,
            security_life_cycle: None,
            impl_id: None,
            boot_seed: None,
            hw_version: None,
            sw_components: None,
            no_sw_measurements: None,
            nonce: None,
            instance_id: None,
            vsi: None,
        }
    }

    pub fn profile(&self) -> Profile {
        self.profile
    }

    /// Inject the challenge.  The claims-set accepts 32, 48 or 64 byte
    /// nonces; anything else is rejected without touching the claims.
    pub fn set_nonce(&mut self, nonce: &[u8]) -> Result<(), Error> {
        if !is_valid_measurement(nonce) {
            return Err(Error::Nonce(format!(
                "wrong nonce length {}: allowed values are 32, 48 and 64",
                nonce.len()
            )));
        }

        self.nonce = Some(nonce.to_vec());

        Ok(())
    }

    pub fn get_nonce(&self) -> Result<&[u8], Error> {
        self.nonce
            .as_deref()
            .ok_or_else(|| Error::MissingClaim("nonce".to_string()))
    }

    /// Decode a JSON claims-set, trying each supported profile in turn.
    /// The first profile whose schema matches wins; if none does, the
    /// error reports the failure cause of every attempt.
    pub fn from_json(buf: &[u8], mode: ValidationMode) -> Result<Claims, Error> {
        let mut attempts: Vec<String> = Vec::new();

        for profile in [Profile::P1, Profile::P2] {
            match Claims::from_json_with_profile(buf, profile, mode) {
                Ok(c) => return Ok(c),
                Err(e) => attempts.push(format!("{profile} error: {e}")),
            }
        }

        Err(Error::Syntax(attempts.join("; ")))
    }

    fn from_json_with_profile(
        buf: &[u8],
        profile: Profile,
        mode: ValidationMode,
    ) -> Result<Claims, Error> {
        let j: JsonClaims =
            serde_json::from_slice(buf).map_err(|e| Error::Syntax(e.to_string()))?;

        match profile {
            Profile::P1 => match j.profile.as_deref() {
                None | Some(PSA_PROFILE_1) => (),
                Some(p) => {
                    return Err(Error::Profile(format!(
                        "not a {PSA_PROFILE_1} claims-set: found profile {p}"
                    )))
                }
            },
            Profile::P2 => {
                if j.profile.as_deref() != Some(PSA_PROFILE_2) {
                    return Err(Error::Profile(format!(
                        "expecting profile {PSA_PROFILE_2}, got {}",
                        j.profile.as_deref().unwrap_or("no profile claim")
                    )));
                }

                if j.no_software_measurements.is_some() {
                    return Err(Error::Sema(format!(
                        "no-software-measurements is not defined for profile {PSA_PROFILE_2}"
                    )));
                }
            }
        }

        let c = Claims {
            profile,
            partition_id: j.partition_id,
            security_life_cycle: j.security_life_cycle,
            impl_id: j.implementation_id,
            boot_seed: j.boot_seed,
            hw_version: j.hardware_version,
            sw_components: j
                .software_components
                .map(|v| v.into_iter().map(SwComponent::from).collect()),
            no_sw_measurements: j.no_software_measurements,
            nonce: j.nonce,
            instance_id: j.instance_id,
            vsi: j.verification_service_indicator,
        };

        if mode == ValidationMode::Strict {
            c.validate(false)?;
        }

        Ok(c)
    }

    pub fn to_json(&self) -> Result<String, Error> {
        serde_json::to_string_pretty(&JsonClaims::from(self))
            .map_err(|e| Error::Syntax(e.to_string()))
    }

    /// Decode a CBOR claims-set.  The profile is derived from the profile
    /// claim, whose label differs between the two supported profiles.
    pub(crate) fn from_cbor(buf: &[u8]) -> Result<Claims, Error> {
        let v: Value = from_reader(buf).map_err(|e| Error::Syntax(e.to_string()))?;

        let contents = v
            .as_map()
            .ok_or_else(|| Error::TypeMismatch("expecting map type".to_string()))?;

        let profile = peek_profile(contents)?;

        let mut c = Claims::new(profile);
        c.parse(contents)?;

        Ok(c)
    }

    fn parse(&mut self, contents: &[(Value, Value)]) -> Result<(), Error> {
        let labels = self.profile.labels();
        let mut seen_profile = false;

        for (k, v) in contents.iter() {
            let Some(label) = map_label(k) else { continue };

            if label == labels.profile {
                if seen_profile {
                    return Err(Error::DuplicatedClaim("profile".to_string()));
                }
                seen_profile = true;

                let p = to_tstr(v, "profile")?;
                if p != self.profile.as_str() {
                    return Err(Error::Profile(format!("unexpected profile {p}")));
                }
            } else if label == labels.partition_id {
                set_once(
                    &mut self.partition_id,
                    to_int(v, "partition-id")?,
                    "partition-id",
                )?;
            } else if label == labels.lifecycle {
                let lc = to_int(v, "security-life-cycle")?;
                let lc = lc
                    .try_into()
                    .map_err(|_| Error::Sema(format!("security-life-cycle out of range: {lc}")))?;
                set_once(&mut self.security_life_cycle, lc, "security-life-cycle")?;
            } else if label == labels.impl_id {
                set_once(
                    &mut self.impl_id,
                    to_bstr(v, "implementation-id")?,
                    "implementation-id",
                )?;
            } else if label == labels.boot_seed {
                set_once(&mut self.boot_seed, to_bstr(v, "boot-seed")?, "boot-seed")?;
            } else if label == labels.hw_version {
                set_once(
                    &mut self.hw_version,
                    to_tstr(v, "hardware-version")?,
                    "hardware-version",
                )?;
            } else if label == labels.sw_components {
                self.set_sw_components(v)?;
            } else if Some(label) == labels.no_sw_measurements {
                let x = to_int(v, "no-software-measurements")?;
                let x = x.try_into().map_err(|_| {
                    Error::Sema(format!("no-software-measurements out of range: {x}"))
                })?;
                set_once(&mut self.no_sw_measurements, x, "no-software-measurements")?;
            } else if label == labels.nonce {
                set_once(&mut self.nonce, to_bstr(v, "nonce")?, "nonce")?;
            } else if label == labels.instance_id {
                set_once(
                    &mut self.instance_id,
                    to_bstr(v, "instance-id")?,
                    "instance-id",
                )?;
            } else if label == labels.vsi {
                set_once(
                    &mut self.vsi,
                    to_tstr(v, "verification-service-indicator")?,
                    "verification-service-indicator",
                )?;
            }
        }

        Ok(())
    }

    fn set_sw_components(&mut self, v: &Value) -> Result<(), Error> {
        if self.sw_components.is_some() {
            return Err(Error::DuplicatedClaim("software-components".to_string()));
        }

        let x = v.as_array().ok_or_else(|| {
            Error::TypeMismatch("software-components MUST be array".to_string())
        })?;

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

    pub(crate) fn to_cbor(&self) -> Result<Vec<u8>, Error> {
        let labels = self.profile.labels();

        let mut contents: Vec<(Value, Value)> = vec![(
            Value::from(labels.profile),
            Value::Text(self.profile.as_str().to_string()),
        )];

        if let Some(x) = self.partition_id {
            contents.push((Value::from(labels.partition_id), Value::from(x)));
        }
        if let Some(x) = self.security_life_cycle {
            contents.push((Value::from(labels.lifecycle), Value::from(i64::from(x))));
        }
        if let Some(x) = &self.impl_id {
            contents.push((Value::from(labels.impl_id), Value::Bytes(x.clone())));
        }
        if let Some(x) = &self.boot_seed {
            contents.push((Value::from(labels.boot_seed), Value::Bytes(x.clone())));
        }
        if let Some(x) = &self.hw_version {
            contents.push((Value::from(labels.hw_version), Value::Text(x.clone())));
        }
        if let Some(x) = &self.sw_components {
            contents.push((
                Value::from(labels.sw_components),
                Value::Array(x.iter().map(SwComponent::to_cbor_value).collect()),
            ));
        }
        if let Some(x) = self.no_sw_measurements {
            if let Some(label) = labels.no_sw_measurements {
                contents.push((Value::from(label), Value::from(x)));
            }
        }
        if let Some(x) = &self.nonce {
            contents.push((Value::from(labels.nonce), Value::Bytes(x.clone())));
        }
        if let Some(x) = &self.instance_id {
            contents.push((Value::from(labels.instance_id), Value::Bytes(x.clone())));
        }
        if let Some(x) = &self.vsi {
            contents.push((Value::from(labels.vsi), Value::Text(x.clone())));
        }

        let mut buf: Vec<u8> = Vec::new();
        into_writer(&Value::Map(contents), &mut buf).map_err(|e| Error::Syntax(e.to_string()))?;

        Ok(buf)
    }

    /// Structural validation of the claims-set.  The nonce is only
    /// mandatory when signing: claim files legitimately lack it until the
    /// challenge is injected.
    pub(crate) fn validate(&self, require_nonce: bool) -> Result<(), Error> {
        match self.security_life_cycle {
            None => return Err(Error::MissingClaim("security-life-cycle".to_string())),
            Some(lc) => {
                if !is_valid_lifecycle(i128::from(lc)) {
                    return Err(Error::Sema(format!("unknown security-life-cycle {lc}")));
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

        match &self.instance_id {
            None => return Err(Error::MissingClaim("instance-id".to_string())),
            Some(x) => {
                if x.len() != 33 {
                    return Err(Error::Sema(format!(
                        "instance-id: expecting 33 bytes, got {}",
                        x.len()
                    )));
                }
                if x[0] != 0x01 {
                    return Err(Error::Sema("instance-id MUST start with 0x01".to_string()));
                }
            }
        }

        match self.profile {
            Profile::P1 => match &self.boot_seed {
                None => return Err(Error::MissingClaim("boot-seed".to_string())),
                Some(x) => {
                    if x.len() != 32 {
                        return Err(Error::Sema(format!(
                            "boot-seed: expecting 32 bytes, got {}",
                            x.len()
                        )));
                    }
                }
            },
            Profile::P2 => {
                if let Some(x) = &self.boot_seed {
                    if x.len() < 8 || x.len() > 32 {
                        return Err(Error::Sema(format!(
                            "boot-seed: expecting 8 to 32 bytes, got {}",
                            x.len()
                        )));
                    }
                }
            }
        }

        if let Some(v) = &self.hw_version {
            if v.len() != 13 || !v.chars().all(|c| c.is_ascii_digit()) {
                return Err(Error::Sema(format!(
                    "hardware-version: expecting 13 digits, got {v}"
                )));
            }
        }

        if self.no_sw_measurements.is_some() {
            if self.sw_components.as_ref().is_some_and(|x| !x.is_empty()) {
                return Err(Error::Sema(
                    "no-software-measurements and software-components are mutually exclusive"
                        .to_string(),
                ));
            }
        } else {
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
        }

        match &self.nonce {
            None => {
                if require_nonce {
                    return Err(Error::MissingClaim("nonce".to_string()));
                }
            }
            Some(x) => {
                if !is_valid_measurement(x) {
                    return Err(Error::Sema(format!(
                        "nonce: expecting 32, 48 or 64 bytes, got {}",
                        x.len()
                    )));
                }
            }
        }

        Ok(())
    }
}

fn peek_profile(contents: &[(Value, Value)]) -> Result<Profile, Error> {
    for (k, v) in contents.iter() {
        let Some(label) = map_label(k) else { continue };

        if label == P2_LABELS.profile || label == P1_LABELS.profile {
            let p = to_tstr(v, "profile")?;
            return Profile::from_name(&p);
        }
    }

    Err(Error::Syntax(
        "unable to determine the claims-set profile".to_string(),
    ))
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
struct JsonClaims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    profile: Option<String>,
    #[serde(rename = "partition-id", default, skip_serializing_if = "Option::is_none")]
    partition_id: Option<i64>,
    #[serde(
        rename = "security-life-cycle",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    security_life_cycle: Option<u16>,
    #[serde_as(as = "Option<Base64>")]
    #[serde(
        rename = "implementation-id",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    implementation_id: Option<Vec<u8>>,
    #[serde_as(as = "Option<Base64>")]
    #[serde(rename = "boot-seed", default, skip_serializing_if = "Option::is_none")]
    boot_seed: Option<Vec<u8>>,
    #[serde(
        rename = "hardware-version",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    hardware_version: Option<String>,
    #[serde(
        rename = "software-components",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    software_components: Option<Vec<JsonSwComponent>>,
    #[serde(
        rename = "no-software-measurements",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    no_software_measurements: Option<u64>,
    #[serde_as(as = "Option<Base64>")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    nonce: Option<Vec<u8>>,
    #[serde_as(as = "Option<Base64>")]
    #[serde(rename = "instance-id", default, skip_serializing_if = "Option::is_none")]
    instance_id: Option<Vec<u8>>,
    #[serde(
        rename = "verification-service-indicator",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    verification_service_indicator: Option<String>,
}

impl From<&Claims> for JsonClaims {
    fn from(c: &Claims) -> Self {
        JsonClaims {
            profile: Some(c.profile.as_str().to_string()),
            partition_id: c.partition_id,
            security_life_cycle: c.security_life_cycle,
            implementation_id: c.impl_id.clone(),
            boot_seed: c.boot_seed.clone(),
            hardware_version: c.hw_version.clone(),
            software_components: c
                .sw_components
                .as_ref()
                .map(|v| v.iter().map(JsonSwComponent::from).collect()),
            no_software_measurements: c.no_sw_measurements,
            nonce: c.nonce.clone(),
            instance_id: c.instance_id.clone(),
            verification_service_indicator: c.vsi.clone(),
        }
    }
}

#[serde_as]
#[derive(Serialize, Deserialize)]
pub(crate) struct JsonSwComponent {
    #[serde(
        rename = "measurement-type",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    measurement_type: Option<String>,
    #[serde_as(as = "Option<Base64>")]
    #[serde(
        rename = "measurement-value",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    measurement_value: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    version: Option<String>,
    #[serde_as(as = "Option<Base64>")]
    #[serde(rename = "signer-id", default, skip_serializing_if = "Option::is_none")]
    signer_id: Option<Vec<u8>>,
    #[serde(
        rename = "measurement-description",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    measurement_description: Option<String>,
}

impl From<JsonSwComponent> for SwComponent {
    fn from(j: JsonSwComponent) -> Self {
        SwComponent {
            mtyp: j.measurement_type,
            mval: j.measurement_value,
            version: j.version,
            signer_id: j.signer_id,
            mdesc: j.measurement_description,
        }
    }
}

impl From<&SwComponent> for JsonSwComponent {
    fn from(c: &SwComponent) -> Self {
        JsonSwComponent {
            measurement_type: c.mtyp.clone(),
            measurement_value: c.mval.clone(),
            version: c.version.clone(),
            signer_id: c.signer_id.clone(),
            measurement_description: c.mdesc.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_common::{TEST_P1_CLAIMS, TEST_P2_CLAIMS, TEST_P2_CLAIMS_WITH_NONCE};

    #[test]
    fn p2_claims_load_strict() {
        let c = Claims::from_json(TEST_P2_CLAIMS.as_bytes(), ValidationMode::Strict)
            .expect("loading P2 claims");

        assert_eq!(c.profile(), Profile::P2);
        assert_eq!(c.partition_id, Some(1));
        assert_eq!(c.security_life_cycle, Some(12288));
        assert_eq!(c.sw_components.as_ref().map(Vec::len), Some(2));
        assert!(c.nonce.is_none());
    }

    #[test]
    fn p1_claims_load_strict() {
        let c = Claims::from_json(TEST_P1_CLAIMS.as_bytes(), ValidationMode::Strict)
            .expect("loading P1 claims");

        assert_eq!(c.profile(), Profile::P1);
    }

    #[test]
    fn claims_matching_no_profile() {
        let e = Claims::from_json(b"[]", ValidationMode::Strict).unwrap_err();

        let msg = e.to_string();
        assert!(msg.contains(PSA_PROFILE_1), "missing P1 cause: {msg}");
        assert!(msg.contains(PSA_PROFILE_2), "missing P2 cause: {msg}");
    }

    #[test]
    fn claims_matching_no_profile_reports_both_causes() {
        // well-formed JSON that satisfies neither schema: P2 profile string
        // is absent and the P1 attempt fails structural validation
        let j = br#"{"security-life-cycle": 12288}"#;

        let e = Claims::from_json(j, ValidationMode::Strict).unwrap_err();

        let msg = e.to_string();
        assert!(msg.contains(&format!("{PSA_PROFILE_1} error:")), "{msg}");
        assert!(msg.contains(&format!("{PSA_PROFILE_2} error:")), "{msg}");
    }

    #[test]
    fn invalid_claims_strict_vs_permissive() {
        // implementation-id is 4 bytes instead of 32
        let j = br#"{
            "profile": "http://arm.com/psa/2.0.0",
            "security-life-cycle": 12288,
            "implementation-id": "3q2+7w==",
            "software-components": [
                {
                    "measurement-value": "AAECBAABAgQAAQIEAAECBAABAgQAAQIEAAECBAABAgQ=",
                    "signer-id": "UZIA/1GSAP9RkgD/UZIA/1GSAP9RkgD/UZIA/1GSAP8="
                }
            ],
            "instance-id": "AaChoqOgoaKjoKGio6ChoqOgoaKjoKGio6ChoqOgoaKj"
        }"#;

        assert!(Claims::from_json(j, ValidationMode::Strict).is_err());

        let c = Claims::from_json(j, ValidationMode::Permissive).expect("permissive load");
        assert_eq!(c.impl_id.as_ref().map(Vec::len), Some(4));
        assert!(c.validate(false).is_err());
    }

    #[test]
    fn nonce_injection() {
        let mut c =
            Claims::from_json(TEST_P2_CLAIMS.as_bytes(), ValidationMode::Strict).unwrap();

        assert!(c.get_nonce().is_err());

        let e = c.set_nonce(&[0xab; 47]).unwrap_err();
        assert_eq!(
            e,
            Error::Nonce("wrong nonce length 47: allowed values are 32, 48 and 64".to_string())
        );
        assert!(c.nonce.is_none());

        c.set_nonce(&[0xab; 48]).unwrap();
        assert_eq!(c.get_nonce().unwrap(), &[0xab; 48]);
    }

    #[test]
    fn cbor_roundtrip() {
        let mut c =
            Claims::from_json(TEST_P2_CLAIMS.as_bytes(), ValidationMode::Strict).unwrap();
        c.set_nonce(&[0x42; 32]).unwrap();

        let buf = c.to_cbor().unwrap();
        let back = Claims::from_cbor(&buf).unwrap();

        assert_eq!(back.profile(), Profile::P2);
        assert_eq!(back.partition_id, c.partition_id);
        assert_eq!(back.impl_id, c.impl_id);
        assert_eq!(back.instance_id, c.instance_id);
        assert_eq!(back.get_nonce().unwrap(), &[0x42; 32]);
        assert_eq!(back.sw_components.as_ref().map(Vec::len), Some(2));
    }

    #[test]
    fn cbor_roundtrip_p1() {
        let c = Claims::from_json(TEST_P1_CLAIMS.as_bytes(), ValidationMode::Strict).unwrap();

        let buf = c.to_cbor().unwrap();
        let back = Claims::from_cbor(&buf).unwrap();

        assert_eq!(back.profile(), Profile::P1);
        assert_eq!(back.boot_seed, c.boot_seed);
    }

    #[test]
    fn nonce_already_present_in_claims() {
        let c = Claims::from_json(TEST_P2_CLAIMS_WITH_NONCE.as_bytes(), ValidationMode::Strict)
            .expect("loading claims with nonce");

        assert_eq!(c.get_nonce().unwrap().len(), 32);
        assert!(c.validate(true).is_ok());
    }

    #[test]
    fn profile_name_parsing() {
        assert_eq!(Profile::from_name(PSA_PROFILE_1).unwrap(), Profile::P1);
        assert_eq!(Profile::from_name(PSA_PROFILE_2).unwrap(), Profile::P2);
        assert!(Profile::from_name("http://arm.com/psa/3.0.0").is_err());
    }
}
