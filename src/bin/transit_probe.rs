// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Probe binary for a Vault transit key.
//!
//! Reads `VAULT_*` settings from the environment (and `.env`), resolves the
//! configured key and reports what it can do.
//!
//! Usage:
//!   ./transit-probe                 # Human-readable output
//!   ./transit-probe --json          # JSON output
//!   ./transit-probe --roundtrip     # Also encrypt/decrypt or sign/verify a sample

use std::process::ExitCode;

use serde::Serialize;
use transit_kms::kms::KmsError;
use transit_kms::logging::init_console_logging;
use transit_kms::{Decryptor, Encryptor, KeyInfo, Signer, VaultConfig, VaultKms, Verifier};

const SAMPLE: &[u8] = b"transit-probe";

#[derive(Serialize)]
struct ProbeReport {
    address: String,
    mount_path: String,
    key: KeyInfo,
    fingerprints: Vec<VersionFingerprint>,
    roundtrip: Option<RoundTrip>,
}

#[derive(Serialize)]
struct VersionFingerprint {
    version: u32,
    sha256: String,
}

#[derive(Serialize)]
struct RoundTrip {
    encryption: Option<bool>,
    signature: Option<bool>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        println!("Usage: transit-probe [--json] [--roundtrip]");
        return ExitCode::SUCCESS;
    }
    let json_mode = args.iter().any(|a| a == "--json");
    let roundtrip = args.iter().any(|a| a == "--roundtrip");

    if let Err(e) = init_console_logging("transit-probe", "warn") {
        eprintln!("logging already initialized: {e}");
    }

    match probe(roundtrip).await {
        Ok(report) if json_mode => match serde_json::to_string_pretty(&report) {
            Ok(out) => {
                println!("{out}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("failed to encode report: {e}");
                ExitCode::FAILURE
            }
        },
        Ok(report) => {
            print_human(&report);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("transit-probe: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn probe(roundtrip: bool) -> Result<ProbeReport, KmsError> {
    let config = VaultConfig::from_env()?;
    let kms = VaultKms::from_config(&config).await?;
    let key = kms.key_info();

    let fingerprints = key
        .fingerprints()?
        .into_iter()
        .map(|(version, fingerprint)| VersionFingerprint {
            version,
            sha256: fingerprint.to_string(),
        })
        .collect();

    let roundtrip = if roundtrip {
        Some(run_roundtrip(&kms, &key).await?)
    } else {
        None
    };

    Ok(ProbeReport {
        address: config.address.clone(),
        mount_path: kms.mount_path().to_string(),
        key,
        fingerprints,
        roundtrip,
    })
}

async fn run_roundtrip(kms: &VaultKms, key: &KeyInfo) -> Result<RoundTrip, KmsError> {
    let encryption = if key.supports_encryption && key.supports_decryption {
        let ciphertext = kms.encrypt(SAMPLE).await?;
        Some(kms.decrypt(&ciphertext).await? == SAMPLE)
    } else {
        None
    };

    let signature = if key.supports_signing {
        let signature = kms.sign(SAMPLE).await?;
        Some(kms.verify(SAMPLE, &signature).await.is_ok())
    } else {
        None
    };

    Ok(RoundTrip {
        encryption,
        signature,
    })
}

fn print_human(report: &ProbeReport) {
    let key = &report.key;

    println!("=== Transit Key Probe ===");
    println!();
    println!("Vault:              {}", report.address);
    println!("Mount:              {}", report.mount_path);
    println!("Key:                {}", key.name);
    println!("Type:               {}", key.key_type);
    println!(
        "Versions:           {}..={} (min encryption {})",
        key.min_decryption_version, key.latest_version, key.min_encryption_version
    );
    println!("Encrypt:            {}", yes_no(key.supports_encryption));
    println!("Decrypt:            {}", yes_no(key.supports_decryption));
    println!("Sign:               {}", yes_no(key.supports_signing));
    println!("Derivation:         {}", yes_no(key.supports_derivation));
    println!("Exportable:         {}", yes_no(key.exportable));
    if key.auto_rotate_period.is_zero() {
        println!("Auto-rotate:        disabled");
    } else {
        println!("Auto-rotate:        {:?}", key.auto_rotate_period);
    }

    if !report.fingerprints.is_empty() {
        println!();
        println!("Public keys (SHA-256 of SubjectPublicKeyInfo):");
        for fp in &report.fingerprints {
            println!("  v{:<4} {}", fp.version, fp.sha256);
        }
    }

    if let Some(roundtrip) = &report.roundtrip {
        println!();
        println!("Round trip:");
        println!("  Encrypt/decrypt:  {}", outcome(roundtrip.encryption));
        println!("  Sign/verify:      {}", outcome(roundtrip.signature));
    }
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

fn outcome(value: Option<bool>) -> &'static str {
    match value {
        Some(true) => "ok",
        Some(false) => "MISMATCH",
        None => "skipped",
    }
}
