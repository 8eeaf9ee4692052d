// Copyright 2024 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

//! Blocking driver for Veraison-style challenge-response sessions.
//!
//! Owns the session lifecycle: creation (obtaining the nonce and the
//! accepted media types), evidence submission, bounded polling while the
//! verification service is processing, and optional deletion.  Evidence
//! production itself is delegated to whichever [`EvidenceBuilder`] the
//! caller registered.

use super::EvidenceBuilder;
use crate::errors::Error;
use base64::{engine::general_purpose, Engine as _};
use log::debug;
use reqwest::blocking::{Client, Response};
use reqwest::header::{CONTENT_TYPE, LOCATION};
use reqwest::{Certificate, StatusCode, Url};
use serde::Deserialize;
use std::thread;
use std::time::Duration;

const POLL_INTERVAL: Duration = Duration::from_secs(1);
const MAX_POLLS: u32 = 10;

/// Per-invocation session configuration.  Exactly one of `nonce` (relying
/// party) and `nonce_size` (attester) must be set.
pub struct ChallengeResponseConfig {
    /// URL of the verification service's new-session endpoint
    pub session_uri: String,
    /// The exact nonce to request, when it is dictated by an existing
    /// token
    pub nonce: Option<Vec<u8>>,
    /// The size of nonce to ask the service to generate
    pub nonce_size: Option<usize>,
    /// Delete the session once a terminal state is reached
    pub delete_session: bool,
    /// Skip TLS certificate verification (testing only)
    pub insecure: bool,
    /// Additional PEM-encoded CA certificates to trust
    pub ca_certs: Vec<Vec<u8>>,
}

#[derive(Deserialize)]
struct SessionState {
    nonce: String,
    #[serde(default)]
    accept: Vec<String>,
    status: String,
    result: Option<Box<serde_json::value::RawValue>>,
}

pub struct ChallengeResponseSession {
    http: Client,
    config: ChallengeResponseConfig,
}

impl ChallengeResponseSession {
    pub fn new(config: ChallengeResponseConfig) -> Result<Self, Error> {
        let mut builder = Client::builder();

        if config.insecure {
            builder = builder.danger_accept_invalid_certs(true);
        }

        for pem in &config.ca_certs {
            let cert = Certificate::from_pem(pem)
                .map_err(|e| Error::Session(format!("loading CA certificate: {e}")))?;
            builder = builder.add_root_certificate(cert);
        }

        let http = builder
            .build()
            .map_err(|e| Error::Session(format!("building HTTP client: {e}")))?;

        Ok(Self { http, config })
    }

    /// Run one challenge-response round: open the session, hand the nonce
    /// and accepted media types to the builder, submit the evidence it
    /// produced, and return the serialized attestation result.
    pub fn run(&self, builder: &mut dyn EvidenceBuilder) -> Result<Vec<u8>, Error> {
        let base = Url::parse(&self.config.session_uri)
            .map_err(|e| Error::Session(format!("malformed session URI: {e}")))?;

        let (session_url, state) = self.new_session(&base)?;

        let outcome = self.exchange(&session_url, state, builder);

        if self.config.delete_session {
            match self.http.delete(session_url.clone()).send() {
                Ok(_) => debug!("session {session_url} deleted"),
                Err(e) => debug!("session {session_url} delete failed: {e}"),
            }
        }

        outcome
    }

    fn new_session(&self, base: &Url) -> Result<(Url, SessionState), Error> {
        let mut url = base.clone();

        {
            let mut query = url.query_pairs_mut();

            match (&self.config.nonce, self.config.nonce_size) {
                (Some(nonce), _) => {
                    query.append_pair("nonce", &general_purpose::URL_SAFE.encode(nonce));
                }
                (None, Some(size)) => {
                    query.append_pair("nonceSize", &size.to_string());
                }
                (None, None) => {
                    return Err(Error::Session(
                        "either a nonce or a nonce size must be configured".to_string(),
                    ))
                }
            }
        }

        let resp = self
            .http
            .post(url)
            .send()
            .map_err(|e| Error::Session(format!("session creation failed: {e}")))?;

        if resp.status() != StatusCode::CREATED {
            return Err(Error::Session(format!(
                "session creation failed: unexpected HTTP status {}",
                resp.status()
            )));
        }

        let location = resp
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                Error::Session("no Location header in session creation response".to_string())
            })?;

        let session_url = base
            .join(location)
            .map_err(|e| Error::Session(format!("malformed session location: {e}")))?;

        let state = decode_session_state(resp)?;

        debug!("session created at {session_url}, status {}", state.status);

        Ok((session_url, state))
    }

    fn exchange(
        &self,
        session_url: &Url,
        state: SessionState,
        builder: &mut dyn EvidenceBuilder,
    ) -> Result<Vec<u8>, Error> {
        let nonce = general_purpose::STANDARD
            .decode(&state.nonce)
            .map_err(|e| Error::Session(format!("decoding session nonce: {e}")))?;

        debug!(
            "server nonce: {}, accepted media types: {:?}",
            hex::encode(&nonce),
            state.accept
        );

        let (evidence, media_type) = builder.build_evidence(&nonce, &state.accept)?;

        debug!("submitting {} bytes of {media_type}", evidence.len());

        let resp = self
            .http
            .post(session_url.clone())
            .header(CONTENT_TYPE, media_type)
            .body(evidence)
            .send()
            .map_err(|e| Error::Session(format!("evidence submission failed: {e}")))?;

        if !matches!(resp.status(), StatusCode::OK | StatusCode::ACCEPTED) {
            return Err(Error::Session(format!(
                "evidence submission failed: unexpected HTTP status {}",
                resp.status()
            )));
        }

        let mut state = decode_session_state(resp)?;

        let mut polls = 0;
        loop {
            match state.status.as_str() {
                "complete" => {
                    let result = state.result.ok_or_else(|| {
                        Error::Session("complete session carries no result".to_string())
                    })?;

                    return Ok(result.get().as_bytes().to_vec());
                }
                "failed" => {
                    return Err(Error::Session(
                        "the verification service reported failure".to_string(),
                    ))
                }
                "waiting" | "processing" => {
                    if polls >= MAX_POLLS {
                        return Err(Error::Session(format!(
                            "session did not complete after {MAX_POLLS} polls"
                        )));
                    }
                    polls += 1;

                    thread::sleep(POLL_INTERVAL);

                    let resp = self
                        .http
                        .get(session_url.clone())
                        .send()
                        .map_err(|e| Error::Session(format!("session poll failed: {e}")))?;

                    state = decode_session_state(resp)?;
                    debug!("session status: {}", state.status);
                }
                s => return Err(Error::Session(format!("unexpected session status {s}"))),
            }
        }
    }
}

fn decode_session_state(resp: Response) -> Result<SessionState, Error> {
    resp.json()
        .map_err(|e| Error::Session(format!("decoding session state: {e}")))
}
