#![forbid(unsafe_code)]

//! `encap`: encapsulate a fresh shared secret to an ML-KEM public key.
//!
//! Reads a `PUBLIC KEY` (SPKI) file, writes the raw shared secret and the raw
//! ciphertext to two files. The parameter set comes from the key's OID.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::{ArgAction, CommandFactory, Parser, ValueEnum};
use encap_crypto::{KeyForm, PublicKey};
use rand::rngs::OsRng;
use tracing::{info, Level};

mod output;
use output::OutputFiles;

#[derive(Debug, Parser)]
#[command(
    name = "encap",
    version,
    about = "Encapsulate a shared secret to an ML-KEM public key"
)]
struct Cli {
    /// File with the encapsulation key
    #[arg(short = 'k', long = "key", value_name = "FILE")]
    key: PathBuf,
    /// File to write the secret
    #[arg(short = 's', long = "secret", value_name = "FILE")]
    secret: PathBuf,
    /// File to write the ciphertext
    #[arg(short = 'c', long = "ciphertext", value_name = "FILE")]
    ciphertext: PathBuf,
    /// Encoding of the key file
    #[arg(short = 'f', long = "key-form", value_enum, default_value_t = KeyFormArg::Pem)]
    key_form: KeyFormArg,
    /// More diagnostics on stderr (repeat for more)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum KeyFormArg {
    Pem,
    Der,
}

impl From<KeyFormArg> for KeyForm {
    fn from(arg: KeyFormArg) -> Self {
        match arg {
            KeyFormArg::Pem => KeyForm::Pem,
            KeyFormArg::Der => KeyForm::Der,
        }
    }
}

/// Resolved settings for one run. There is no config file and no
/// environment lookup; everything comes from the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
struct EncapConfig {
    key_path: PathBuf,
    key_form: KeyForm,
    secret_path: PathBuf,
    ciphertext_path: PathBuf,
}

impl From<&Cli> for EncapConfig {
    fn from(cli: &Cli) -> Self {
        Self {
            key_path: cli.key.clone(),
            key_form: cli.key_form.into(),
            secret_path: cli.secret.clone(),
            ciphertext_path: cli.ciphertext.clone(),
        }
    }
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => return usage_error(e),
    };
    init_logging(cli.verbose);

    match run(&EncapConfig::from(&cli)) {
        Ok(()) => {
            println!("done");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("operation failed");
            eprint!("{}", error_trace(&err));
            ExitCode::FAILURE
        }
    }
}

fn run(config: &EncapConfig) -> Result<()> {
    let outputs = OutputFiles::create(&config.secret_path, &config.ciphertext_path)?;

    // Error::Io already names the path
    let key = PublicKey::load(&config.key_path, config.key_form).context("can't load key file")?;
    info!(algorithm = %key.algorithm(), "loaded encapsulation key");

    let result = encap_crypto::encapsulate(&key, OsRng).context("encapsulation failure")?;
    info!(
        ciphertext = result.ciphertext.len(),
        secret = result.shared_secret.len(),
        "encapsulated"
    );

    outputs.write(&result)
}

/// Help and version go to stdout with status 0 (status 1 if stdout can't be
/// written); any other parse problem prints the error and the usage text to
/// stderr with status 1.
fn usage_error(err: clap::Error) -> ExitCode {
    match err.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => match err.print() {
            Ok(()) => ExitCode::SUCCESS,
            Err(_) => ExitCode::FAILURE,
        },
        _ => {
            eprint!("{}", err.render());
            eprintln!();
            eprint!("{}", Cli::command().render_help());
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    // A subscriber may already be installed when embedded in tests.
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// One line per cause, outermost first.
fn error_trace(err: &anyhow::Error) -> String {
    err.chain()
        .enumerate()
        .map(|(depth, cause)| format!("  {depth}: {cause}\n"))
        .collect()
}
