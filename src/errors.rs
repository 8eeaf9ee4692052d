// Copyright 2024 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum Error {
    /// serialized claims could not be decoded
    #[error("syntax error: {0}")]
    Syntax(String),
    /// claims decoded but violate the claims-set semantics
    #[error("semantic error: {0}")]
    Sema(String),
    #[error("missing claim: {0}")]
    MissingClaim(String),
    #[error("duplicated claim: {0}")]
    DuplicatedClaim(String),
    #[error("claim type mismatch: {0}")]
    TypeMismatch(String),
    /// unknown profile, or declared and claims-derived profiles disagree
    #[error("profile error: {0}")]
    Profile(String),
    /// challenge injection failed
    #[error("nonce error: {0}")]
    Nonce(String),
    /// key material could not be parsed or is unusable
    #[error("key error: {0}")]
    Key(String),
    #[error("unsupported key type {0}")]
    UnsupportedKeyType(String),
    #[error("unsupported curve {0}")]
    UnsupportedCurve(String),
    /// the signing operation itself failed
    #[error("sign error: {0}")]
    Sign(String),
    /// signature check failed on an existing token
    #[error("verify error: {0}")]
    Verify(String),
    /// none of the offered media types is supported by the active builder
    #[error("expecting media type {expected}, got {offered}")]
    MediaType { expected: String, offered: String },
    /// the offered nonce does not match the one embedded in the token
    #[error("expecting nonce {expected}, got {got}")]
    NonceMismatch { expected: String, got: String },
    /// challenge-response session failure
    #[error("session error: {0}")]
    Session(String),
}
