//!
//! ML-KEM encapsulation primitives for the `encap` tool (unsafe-forbid).
//! - Algorithm: ML-KEM parameter sets keyed by their SPKI OIDs, with published sizes
//! - Key: SubjectPublicKeyInfo loading from PEM or DER (`spki`), FIPS 203 input checks
//! - Encap: size query, buffer allocation and encapsulation against the loaded key
//!
//!   The KEM mathematics is delegated to RustCrypto `ml-kem`.
#![forbid(unsafe_code)]
#![warn(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::unreachable,
    clippy::todo,
    clippy::unimplemented
)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![allow(missing_docs)]

use std::path::PathBuf;

/// ML-KEM parameter sets and their object identifiers.
pub mod algorithm;
/// Encapsulation context and the two-phase size query.
pub mod encap;
/// Public key loading and encoding.
pub mod key;

pub use algorithm::Algorithm;
pub use encap::{encapsulate, BufferSizes, Encapsulation, EncapsulationContext, SharedSecret};
pub use key::{KeyForm, PublicKey};

/// Error type for key loading and encapsulation.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("cannot read {}", path.display())]
    /// Key file could not be opened or read
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid public key: {0}")]
    /// Key material is not a valid public key
    Parse(String),
    #[error("unsupported key algorithm: {0}")]
    /// The key's algorithm identifier is not a known KEM
    UnsupportedAlgorithm(String),
    #[error("cryptographic operation failed: {0}")]
    /// KEM library failure (context, size query, encapsulation)
    Crypto(String),
    #[error("{what} length mismatch: queried {expected} bytes, produced {actual}")]
    /// Buffer produced by the KEM differs from the queried size
    SizeMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
}

/// Convenient Result alias for this crate.
pub type Result<T> = core::result::Result<T, Error>;
