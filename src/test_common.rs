// Copyright 2024 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

//! Fixtures shared between the test modules of this crate.

// RFC 7517 A.2
pub(crate) const TEST_ES256_KEY: &str = r#"{
    "kty": "EC",
    "crv": "P-256",
    "x": "MKBCTNIcKUSDii11ySs3526iDZ8AiTo7Tu6KPAqv7D4",
    "y": "4Etl6SRW2YiLUrN5vfvVHuhp7x8PxltmWWlbbM4IFyM",
    "d": "870MB6gfuTJ4HtUnUvYMyJpr5eUZNP4Bk43bVdj3eAE"
}"#;

pub(crate) const TEST_ES256_PUB_KEY: &str = r#"{
    "kty": "EC",
    "crv": "P-256",
    "x": "MKBCTNIcKUSDii11ySs3526iDZ8AiTo7Tu6KPAqv7D4",
    "y": "4Etl6SRW2YiLUrN5vfvVHuhp7x8PxltmWWlbbM4IFyM"
}"#;

pub(crate) const TEST_P2_CLAIMS: &str = r#"{
    "profile": "http://arm.com/psa/2.0.0",
    "partition-id": 1,
    "security-life-cycle": 12288,
    "implementation-id": "UFFSU1RVVldQUVJTVFVWV1BRUlNUVVZXUFFSU1RVVlc=",
    "boot-seed": "3q2+796tvu/erb7v3q2+796tvu/erb7v3q2+796tvu8=",
    "hardware-version": "1234567890123",
    "software-components": [
        {
            "measurement-type": "BL",
            "measurement-value": "AAECBAABAgQAAQIEAAECBAABAgQAAQIEAAECBAABAgQ=",
            "signer-id": "UZIA/1GSAP9RkgD/UZIA/1GSAP9RkgD/UZIA/1GSAP8="
        },
        {
            "measurement-type": "PRoT",
            "measurement-value": "BQYHCAUGBwgFBgcIBQYHCAUGBwgFBgcIBQYHCAUGBwg=",
            "signer-id": "UZIA/1GSAP9RkgD/UZIA/1GSAP9RkgD/UZIA/1GSAP8="
        }
    ],
    "instance-id": "AaChoqOgoaKjoKGio6ChoqOgoaKjoKGio6ChoqOgoaKj",
    "verification-service-indicator": "https://psa-verifier.org"
}"#;

pub(crate) const TEST_P2_CLAIMS_WITH_NONCE: &str = r#"{
    "profile": "http://arm.com/psa/2.0.0",
    "partition-id": 1,
    "security-life-cycle": 12288,
    "implementation-id": "UFFSU1RVVldQUVJTVFVWV1BRUlNUVVZXUFFSU1RVVlc=",
    "boot-seed": "3q2+796tvu/erb7v3q2+796tvu/erb7v3q2+796tvu8=",
    "software-components": [
        {
            "measurement-type": "BL",
            "measurement-value": "AAECBAABAgQAAQIEAAECBAABAgQAAQIEAAECBAABAgQ=",
            "signer-id": "UZIA/1GSAP9RkgD/UZIA/1GSAP9RkgD/UZIA/1GSAP8="
        }
    ],
    "instance-id": "AaChoqOgoaKjoKGio6ChoqOgoaKjoKGio6ChoqOgoaKj",
    "nonce": "QUp8F0FBs9DpodKK8xUg8NQimf6sQAfe2J1ormzZLxk="
}"#;

pub(crate) const TEST_P1_CLAIMS: &str = r#"{
    "profile": "PSA_IOT_PROFILE_1",
    "partition-id": 1,
    "security-life-cycle": 12288,
    "implementation-id": "UFFSU1RVVldQUVJTVFVWV1BRUlNUVVZXUFFSU1RVVlc=",
    "boot-seed": "3q2+796tvu/erb7v3q2+796tvu/erb7v3q2+796tvu8=",
    "software-components": [
        {
            "measurement-type": "BL",
            "measurement-value": "AAECBAABAgQAAQIEAAECBAABAgQAAQIEAAECBAABAgQ=",
            "signer-id": "UZIA/1GSAP9RkgD/UZIA/1GSAP9RkgD/UZIA/1GSAP8="
        }
    ],
    "instance-id": "AaChoqOgoaKjoKGio6ChoqOgoaKjoKGio6ChoqOgoaKj"
}"#;

pub(crate) const TEST_CCA_CLAIMS: &str = r#"{
    "cca-platform-token": {
        "cca-platform-profile": "http://arm.com/CCA-SSD/1.0.0",
        "cca-platform-challenge": "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA=",
        "cca-platform-implementation-id": "UFFSU1RVVldQUVJTVFVWV1BRUlNUVVZXUFFSU1RVVlc=",
        "cca-platform-instance-id": "AaChoqOgoaKjoKGio6ChoqOgoaKjoKGio6ChoqOgoaKj",
        "cca-platform-config": "AQID",
        "cca-platform-lifecycle": 12288,
        "cca-platform-sw-components": [
            {
                "measurement-type": "BL",
                "measurement-value": "AAECBAABAgQAAQIEAAECBAABAgQAAQIEAAECBAABAgQ=",
                "signer-id": "UZIA/1GSAP9RkgD/UZIA/1GSAP9RkgD/UZIA/1GSAP8="
            }
        ],
        "cca-platform-service-indicator": "https://veraison.example/.well-known/veraison",
        "cca-platform-hash-algo-id": "sha-256"
    },
    "cca-realm-delegated-token": {
        "cca-realm-challenge": "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA==",
        "cca-realm-personalization-value": "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA==",
        "cca-realm-initial-measurement": "AAECBAABAgQAAQIEAAECBAABAgQAAQIEAAECBAABAgQ=",
        "cca-realm-extensible-measurements": [
            "AAECBAABAgQAAQIEAAECBAABAgQAAQIEAAECBAABAgQ=",
            "AAECBAABAgQAAQIEAAECBAABAgQAAQIEAAECBAABAgQ=",
            "AAECBAABAgQAAQIEAAECBAABAgQAAQIEAAECBAABAgQ=",
            "AAECBAABAgQAAQIEAAECBAABAgQAAQIEAAECBAABAgQ="
        ],
        "cca-realm-hash-algo-id": "sha-256",
        "cca-realm-public-key": "BAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA==",
        "cca-realm-public-key-hash-algo-id": "sha-256"
    }
}"#;
