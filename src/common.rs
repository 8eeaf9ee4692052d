// Copyright 2024 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use crate::errors::Error;
use ciborium::Value;

/// Controls whether structural validation is applied on top of decoding
/// when loading a claims-set.  Decoding (syntax) is always enforced;
/// [`ValidationMode::Permissive`] exists only to allow deliberately invalid
/// evidence to be produced for negative testing and must not be used on
/// verification paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationMode {
    Strict,
    Permissive,
}

// See https://www.iana.org/assignments/hash-function-text-names/hash-function-text-names.xhtml
pub(crate) fn is_valid_hash(value: &str) -> bool {
    matches!(
        value,
        "md2"
            | "md5"
            | "sha-1"
            | "sha-224"
            | "sha-256"
            | "sha-384"
            | "sha-512"
            | "shake128"
            | "shake256"
    )
}

pub(crate) fn is_valid_measurement(value: &[u8]) -> bool {
    matches!(value.len(), 32 | 48 | 64)
}

pub(crate) fn is_valid_lifecycle(value: i128) -> bool {
    matches!(
        value,
        0x0000..=0x00ff
            | 0x1000..=0x10ff
            | 0x2000..=0x20ff
            | 0x3000..=0x30ff
            | 0x4000..=0x40ff
            | 0x5000..=0x50ff
            | 0x6000..=0x60ff
    )
}

/// Extract the integer label of a CBOR map entry, if it has one
pub(crate) fn map_label(k: &Value) -> Option<i64> {
    match k {
        Value::Integer(i) => i128::from(*i).try_into().ok(),
        _ => None,
    }
}

pub(crate) fn to_bstr(v: &Value, name: &str) -> Result<Vec<u8>, Error> {
    v.as_bytes()
        .cloned()
        .ok_or_else(|| Error::TypeMismatch(format!("{name} MUST be bstr")))
}

pub(crate) fn to_tstr(v: &Value, name: &str) -> Result<String, Error> {
    v.as_text()
        .map(String::from)
        .ok_or_else(|| Error::TypeMismatch(format!("{name} MUST be tstr")))
}

pub(crate) fn to_int(v: &Value, name: &str) -> Result<i64, Error> {
    if let Value::Integer(i) = v {
        i128::from(*i)
            .try_into()
            .map_err(|_| Error::Sema(format!("{name} out of range")))
    } else {
        Err(Error::TypeMismatch(format!("{name} MUST be int")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_names() {
        assert!(is_valid_hash("sha-256"));
        assert!(is_valid_hash("sha-512"));
        assert!(!is_valid_hash("sha256"));
    }

    #[test]
    fn measurement_sizes() {
        assert!(is_valid_measurement(&[0; 32]));
        assert!(is_valid_measurement(&[0; 48]));
        assert!(is_valid_measurement(&[0; 64]));
        assert!(!is_valid_measurement(&[0; 20]));
    }

    #[test]
    fn lifecycle_ranges() {
        assert!(is_valid_lifecycle(0x3000));
        assert!(is_valid_lifecycle(0x60ff));
        assert!(!is_valid_lifecycle(0x7000));
    }

    #[test]
    fn label_extraction() {
        assert_eq!(map_label(&Value::from(10i64)), Some(10));
        assert_eq!(map_label(&Value::from(-75008i64)), Some(-75008));
        assert_eq!(map_label(&Value::Text("nonce".to_string())), None);
    }
}
