// Copyright 2024 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use anyhow::{bail, Context};
use clap::Parser;
use evtool::challenge_response::{self, EvidenceBuilder};
use evtool::challenge_response::client::{ChallengeResponseConfig, ChallengeResponseSession};
use evtool::key::{PublicKey, Signer};
use evtool::psa::{Profile, PSA_PROFILE_2};
use evtool::{cca, psa, ValidationMode};
use std::fs;
use std::path::{Path, PathBuf};

// the CCA realm challenge is format-defined
const CCA_NONCE_SIZE: usize = 64;

#[derive(Parser)]
#[command(
    name = "evtool",
    version,
    about = "Attestation Evidence swiss-army knife",
    long_about = None
)]
enum EvTool {
    /// PSA attestation token manipulation
    #[command(subcommand)]
    Psa(PsaCmd),
    /// CCA attestation token manipulation
    #[command(subcommand)]
    Cca(CcaCmd),
}

#[derive(clap::Subcommand)]
enum PsaCmd {
    Create(PsaCreateArgs),
    Check(PsaCheckArgs),
    Print(PrintArgs),
    /// Use a Veraison verification API to verify PSA tokens
    #[command(subcommand)]
    VerifyAs(PsaVerifyAs),
}

#[derive(clap::Subcommand)]
enum PsaVerifyAs {
    Attester(PsaAttesterArgs),
    RelyingParty(RelyingPartyArgs),
}

#[derive(clap::Subcommand)]
enum CcaCmd {
    Create(CcaCreateArgs),
    Check(CcaCheckArgs),
    Print(PrintArgs),
    /// Use a Veraison verification API to verify CCA tokens
    #[command(subcommand)]
    VerifyAs(CcaVerifyAs),
}

#[derive(clap::Subcommand)]
enum CcaVerifyAs {
    Attester(CcaAttesterArgs),
    RelyingParty(RelyingPartyArgs),
}

#[derive(Debug, clap::Args)]
#[command(about = "create a PSA attestation token from the supplied claims and IAK")]
struct PsaCreateArgs {
    /// JSON file containing the PSA attestation claims to be signed
    #[arg(short, long)]
    claims: PathBuf,

    /// JWK file with the Initial Attestation Key used for signing
    #[arg(short, long)]
    key: PathBuf,

    /// name of the file where the produced token will be stored
    #[arg(short, long)]
    token: Option<PathBuf>,

    /// name of the PSA profile to use
    #[arg(short, long, default_value = PSA_PROFILE_2)]
    profile: String,

    /// do not validate the claims, allowing invalid tokens to be
    /// generated (intended for testing)
    #[arg(short = 'I', long)]
    allow_invalid: bool,
}

#[derive(Debug, clap::Args)]
#[command(about = "run the syntactic and cryptographic checks over a PSA attestation token")]
struct PsaCheckArgs {
    /// CBOR file containing the PSA attestation token to be verified
    #[arg(short, long)]
    token: PathBuf,

    /// JWK file with the public Initial Attestation Key used for
    /// verification
    #[arg(short, long)]
    key: PathBuf,

    /// file where the claims extracted from the token are saved; default
    /// is to use stdout
    #[arg(short, long)]
    claims: Option<PathBuf>,
}

#[derive(Debug, clap::Args)]
#[command(about = "print the embedded claims without any cryptographic check")]
struct PrintArgs {
    /// CBOR file containing the attestation token
    #[arg(short, long)]
    token: PathBuf,
}

#[derive(Debug, clap::Args)]
#[command(about = "emulate an Attester: sign fresh evidence over the server-provided nonce")]
struct PsaAttesterArgs {
    /// URL of the Veraison verification API
    #[arg(short = 's', long)]
    api_server: String,

    /// JSON file containing the PSA attestation claims to be signed
    #[arg(short, long)]
    claims: PathBuf,

    /// JWK file with the Initial Attestation Key used for signing
    #[arg(short, long)]
    key: PathBuf,

    /// nonce size (32, 48 or 64)
    #[arg(short, long, default_value_t = 48)]
    nonce_size: usize,

    /// name of the PSA profile the claims are expected to conform to
    #[arg(long)]
    profile: Option<String>,

    /// do not validate the claims before signing (intended for testing)
    #[arg(short = 'I', long)]
    allow_invalid: bool,

    #[command(flatten)]
    tls: TlsArgs,
}

#[derive(Debug, clap::Args)]
#[command(about = "emulate a Relying Party: replay an existing token, whose embedded nonce \
    seeds the session")]
struct RelyingPartyArgs {
    /// URL of the Veraison verification API
    #[arg(short = 's', long)]
    api_server: String,

    /// file containing a signed attestation token
    #[arg(short, long)]
    token: PathBuf,

    #[command(flatten)]
    tls: TlsArgs,
}

#[derive(Debug, clap::Args)]
#[command(about = "create a CCA attestation token from the supplied claims and keys (PAK and RAK)")]
struct CcaCreateArgs {
    /// JSON file containing the CCA attestation claims to be signed
    #[arg(short, long)]
    claims: PathBuf,

    /// JWK file with the Platform Attestation Key used for signing
    #[arg(short, long)]
    pak: PathBuf,

    /// JWK file with the Realm Attestation Key used for signing
    #[arg(short, long)]
    rak: PathBuf,

    /// name of the file where the produced token will be stored
    #[arg(short, long)]
    token: Option<PathBuf>,

    /// do not validate the claims, allowing invalid tokens to be
    /// generated (intended for testing)
    #[arg(short = 'I', long)]
    allow_invalid: bool,
}

#[derive(Debug, clap::Args)]
#[command(about = "run the syntactic and cryptographic checks over a CCA attestation token")]
struct CcaCheckArgs {
    /// CBOR file containing the CCA attestation token to be verified
    #[arg(short, long)]
    token: PathBuf,

    /// JWK file with the public Platform Attestation Key used for
    /// verification
    #[arg(short, long)]
    key: PathBuf,

    /// file where the claims extracted from the token are saved; default
    /// is to use stdout
    #[arg(short, long)]
    claims: Option<PathBuf>,
}

#[derive(Debug, clap::Args)]
#[command(about = "emulate an Attester: sign fresh evidence over the server-provided nonce")]
struct CcaAttesterArgs {
    /// URL of the Veraison verification API
    #[arg(short = 's', long)]
    api_server: String,

    /// JSON file containing the CCA attestation claims to be signed
    #[arg(short, long)]
    claims: PathBuf,

    /// JWK file with the Platform Attestation Key used for signing
    #[arg(short, long)]
    pak: PathBuf,

    /// JWK file with the Realm Attestation Key used for signing
    #[arg(short, long)]
    rak: PathBuf,

    /// do not validate the claims before signing (intended for testing)
    #[arg(short = 'I', long)]
    allow_invalid: bool,

    #[command(flatten)]
    tls: TlsArgs,
}

#[derive(Debug, clap::Args)]
struct TlsArgs {
    /// skip TLS certificate verification (testing only)
    #[arg(short, long)]
    insecure: bool,

    /// PEM file with a CA certificate to trust, may be repeated
    #[arg(long = "ca-cert")]
    ca_cert: Vec<PathBuf>,
}

fn main() {
    env_logger::init();

    if let Err(e) = run(EvTool::parse()) {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

fn run(cli: EvTool) -> anyhow::Result<()> {
    match cli {
        EvTool::Psa(cmd) => match cmd {
            PsaCmd::Create(args) => psa_create(&args),
            PsaCmd::Check(args) => psa_check(&args),
            PsaCmd::Print(args) => psa_print(&args),
            PsaCmd::VerifyAs(PsaVerifyAs::Attester(args)) => psa_attester(&args),
            PsaCmd::VerifyAs(PsaVerifyAs::RelyingParty(args)) => psa_relying_party(&args),
        },
        EvTool::Cca(cmd) => match cmd {
            CcaCmd::Create(args) => cca_create(&args),
            CcaCmd::Check(args) => cca_check(&args),
            CcaCmd::Print(args) => cca_print(&args),
            CcaCmd::VerifyAs(CcaVerifyAs::Attester(args)) => cca_attester(&args),
            CcaCmd::VerifyAs(CcaVerifyAs::RelyingParty(args)) => cca_relying_party(&args),
        },
    }
}

fn psa_create(args: &PsaCreateArgs) -> anyhow::Result<()> {
    let declared = Profile::from_name(&args.profile)?;
    let mode = validation_mode(args.allow_invalid);

    let claims = load_psa_claims(&args.claims, mode)?;

    if claims.profile() != declared {
        bail!(
            "profile mismatch: requested {declared} but claims declare {}",
            claims.profile()
        );
    }

    let signer = load_signer(&args.key)?;

    let evidence = psa::Evidence::new(claims);
    let token = match mode {
        ValidationMode::Strict => evidence.sign(&signer),
        ValidationMode::Permissive => evidence.sign_unvalidated(&signer),
    }?;

    let path = token_file_name(args.token.as_deref(), &args.claims);
    fs::write(&path, token).with_context(|| format!("saving token to {}", path.display()))?;

    println!(">> {:?} successfully created", path);

    Ok(())
}

fn psa_check(args: &PsaCheckArgs) -> anyhow::Result<()> {
    let key = load_public_key(&args.key)?;

    let token = fs::read(&args.token)
        .with_context(|| format!("loading token from {}", args.token.display()))?;

    let evidence = psa::Evidence::verify(&token, &key)?;

    println!(">> {:?} verified", args.token);

    output_claims(&evidence.claims.to_json()?, args.claims.as_deref())
}

fn psa_print(args: &PrintArgs) -> anyhow::Result<()> {
    let token = fs::read(&args.token)
        .with_context(|| format!("loading token from {}", args.token.display()))?;

    let evidence = psa::Evidence::decode(&token)?;

    println!("{}", evidence.claims.to_json()?);

    Ok(())
}

fn psa_attester(args: &PsaAttesterArgs) -> anyhow::Result<()> {
    check_nonce_size(args.nonce_size)?;

    let mode = validation_mode(args.allow_invalid);
    let claims = load_psa_claims(&args.claims, mode)?;
    let signer = load_signer(&args.key)?;

    let mut builder = challenge_response::psa::AttesterEvidenceBuilder::new(claims, signer, mode);

    if let Some(p) = &args.profile {
        builder = builder.with_declared_profile(Profile::from_name(p)?);
    }

    let session = ChallengeResponseSession::new(ChallengeResponseConfig {
        session_uri: args.api_server.clone(),
        nonce: None,
        nonce_size: Some(args.nonce_size),
        delete_session: true,
        insecure: args.tls.insecure,
        ca_certs: load_ca_certs(&args.tls.ca_cert)?,
    })?;

    run_session(&session, &mut builder)
}

fn psa_relying_party(args: &RelyingPartyArgs) -> anyhow::Result<()> {
    let token = fs::read(&args.token)
        .with_context(|| format!("loading token from {}", args.token.display()))?;

    let mut builder = challenge_response::psa::RelyingPartyEvidenceBuilder::from_token(token)?;

    let session = ChallengeResponseSession::new(ChallengeResponseConfig {
        session_uri: args.api_server.clone(),
        nonce: Some(builder.nonce().to_vec()),
        nonce_size: None,
        delete_session: true,
        insecure: args.tls.insecure,
        ca_certs: load_ca_certs(&args.tls.ca_cert)?,
    })?;

    run_session(&session, &mut builder)
}

fn cca_create(args: &CcaCreateArgs) -> anyhow::Result<()> {
    let mode = validation_mode(args.allow_invalid);

    let mut evidence = load_cca_claims(&args.claims, mode)?;

    let pak = load_signer(&args.pak)?;
    let rak = load_signer(&args.rak)?;

    let token = match mode {
        ValidationMode::Strict => evidence.sign(&pak, &rak),
        ValidationMode::Permissive => evidence.sign_unvalidated(&pak, &rak),
    }?;

    let path = token_file_name(args.token.as_deref(), &args.claims);
    fs::write(&path, token).with_context(|| format!("saving token to {}", path.display()))?;

    println!(">> {:?} successfully created", path);

    Ok(())
}

fn cca_check(args: &CcaCheckArgs) -> anyhow::Result<()> {
    let key = load_public_key(&args.key)?;

    let token = fs::read(&args.token)
        .with_context(|| format!("loading token from {}", args.token.display()))?;

    let evidence = cca::Evidence::verify(&token, &key)?;

    println!(">> {:?} verified", args.token);

    output_claims(&evidence.claims_to_json()?, args.claims.as_deref())
}

fn cca_print(args: &PrintArgs) -> anyhow::Result<()> {
    let token = fs::read(&args.token)
        .with_context(|| format!("loading token from {}", args.token.display()))?;

    let evidence = cca::Evidence::decode(&token)?;

    println!("{}", evidence.claims_to_json()?);

    Ok(())
}

fn cca_attester(args: &CcaAttesterArgs) -> anyhow::Result<()> {
    let mode = validation_mode(args.allow_invalid);

    let evidence = load_cca_claims(&args.claims, mode)?;

    let pak = load_signer(&args.pak)?;
    let rak = load_signer(&args.rak)?;

    let mut builder =
        challenge_response::cca::AttesterEvidenceBuilder::new(evidence, pak, rak, mode);

    let session = ChallengeResponseSession::new(ChallengeResponseConfig {
        session_uri: args.api_server.clone(),
        nonce: None,
        nonce_size: Some(CCA_NONCE_SIZE),
        delete_session: true,
        insecure: args.tls.insecure,
        ca_certs: load_ca_certs(&args.tls.ca_cert)?,
    })?;

    run_session(&session, &mut builder)
}

fn cca_relying_party(args: &RelyingPartyArgs) -> anyhow::Result<()> {
    let token = fs::read(&args.token)
        .with_context(|| format!("loading token from {}", args.token.display()))?;

    let mut builder = challenge_response::cca::RelyingPartyEvidenceBuilder::from_token(token)?;

    let session = ChallengeResponseSession::new(ChallengeResponseConfig {
        session_uri: args.api_server.clone(),
        nonce: Some(builder.nonce().to_vec()),
        nonce_size: None,
        delete_session: true,
        insecure: args.tls.insecure,
        ca_certs: load_ca_certs(&args.tls.ca_cert)?,
    })?;

    run_session(&session, &mut builder)
}

fn run_session(
    session: &ChallengeResponseSession,
    builder: &mut dyn EvidenceBuilder,
) -> anyhow::Result<()> {
    let result = session.run(builder)?;

    println!("{}", String::from_utf8_lossy(&result));

    Ok(())
}

fn validation_mode(allow_invalid: bool) -> ValidationMode {
    if allow_invalid {
        ValidationMode::Permissive
    } else {
        ValidationMode::Strict
    }
}

fn check_nonce_size(size: usize) -> anyhow::Result<()> {
    match size {
        32 | 48 | 64 => Ok(()),
        _ => bail!("wrong nonce length {size}: allowed values are 32, 48 and 64"),
    }
}

fn load_psa_claims(path: &Path, mode: ValidationMode) -> anyhow::Result<psa::Claims> {
    let buf =
        fs::read(path).with_context(|| format!("loading claims from {}", path.display()))?;

    Ok(psa::Claims::from_json(&buf, mode)?)
}

fn load_cca_claims(path: &Path, mode: ValidationMode) -> anyhow::Result<cca::Evidence> {
    let buf =
        fs::read(path).with_context(|| format!("loading claims from {}", path.display()))?;

    Ok(cca::Evidence::decode_claims_from_json(&buf, mode)?)
}

fn load_signer(path: &Path) -> anyhow::Result<Signer> {
    let buf =
        fs::read(path).with_context(|| format!("loading signing key from {}", path.display()))?;

    Signer::from_jwk(&buf).with_context(|| format!("decoding signing key from {}", path.display()))
}

fn load_public_key(path: &Path) -> anyhow::Result<PublicKey> {
    let buf = fs::read(path)
        .with_context(|| format!("loading verification key from {}", path.display()))?;

    PublicKey::from_jwk(&buf)
        .with_context(|| format!("decoding verification key from {}", path.display()))
}

fn load_ca_certs(paths: &[PathBuf]) -> anyhow::Result<Vec<Vec<u8>>> {
    paths
        .iter()
        .map(|p| {
            fs::read(p).with_context(|| format!("loading CA certificate from {}", p.display()))
        })
        .collect()
}

fn token_file_name(token: Option<&Path>, claims: &Path) -> PathBuf {
    match token {
        Some(t) => t.to_path_buf(),
        None => claims.with_extension("cbor"),
    }
}

fn output_claims(claims_json: &str, out: Option<&Path>) -> anyhow::Result<()> {
    match out {
        None => println!(">> embedded claims:\n{claims_json}"),
        Some(path) => {
            fs::write(path, claims_json)
                .with_context(|| format!("saving claims to {}", path.display()))?;
        }
    }

    Ok(())
}
