#![forbid(unsafe_code)]

//! Encapsulation (public) key loading.
//!
//! Keys are SubjectPublicKeyInfo structures:
//!
//! ```text
//! SEQUENCE {
//!   SEQUENCE { OBJECT IDENTIFIER id-alg-ml-kem-* }   -- parameters absent
//!   BIT STRING (0 unused bits) ek
//! }
//! ```
//!
//! The algorithm is taken from the OID; nothing here assumes a parameter set.

use std::fs;
use std::path::Path;

use spki::der::asn1::BitStringRef;
use spki::der::pem::LineEnding;
use spki::der::{Decode, Encode, EncodePem};
use spki::{AlgorithmIdentifierRef, SubjectPublicKeyInfoRef};
use tracing::debug;

use crate::algorithm::Algorithm;
use crate::{Error, Result};

/// ML-KEM modulus q.
const Q: u16 = 3329;

/// On-disk encoding of a key file.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum KeyForm {
    #[default]
    Pem,
    Der,
}

/// A validated KEM encapsulation key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublicKey {
    algorithm: Algorithm,
    bytes: Vec<u8>,
}

impl PublicKey {
    /// Wrap raw encapsulation key bytes for `algorithm`.
    ///
    /// Applies the FIPS 203 input checks: the length must match the
    /// parameter set, and every 12-bit coefficient of the encoded vector
    /// must already be reduced modulo q.
    pub fn from_bytes(algorithm: Algorithm, bytes: &[u8]) -> Result<Self> {
        if bytes.len() != algorithm.public_key_size() {
            return Err(Error::Parse(format!(
                "{algorithm} key must be {} bytes, got {}",
                algorithm.public_key_size(),
                bytes.len()
            )));
        }
        let vector = &bytes[..384 * algorithm.rank()];
        if let Some(index) = first_unreduced_coefficient(vector) {
            return Err(Error::Parse(format!(
                "{algorithm} key fails modulus check at coefficient {index}"
            )));
        }
        Ok(Self {
            algorithm,
            bytes: bytes.to_vec(),
        })
    }

    /// Parse a DER SubjectPublicKeyInfo. Trailing data is rejected.
    pub fn from_der(input: &[u8]) -> Result<Self> {
        let spki = SubjectPublicKeyInfoRef::from_der(input)
            .map_err(|e| Error::Parse(format!("malformed SubjectPublicKeyInfo: {e}")))?;

        let oid = spki.algorithm.oid;
        let algorithm =
            Algorithm::from_oid(&oid).ok_or_else(|| Error::UnsupportedAlgorithm(oid.to_string()))?;
        if spki.algorithm.parameters.is_some() {
            return Err(Error::Parse(format!(
                "parameters must be absent for {algorithm}"
            )));
        }

        let key = spki.subject_public_key.as_bytes().ok_or_else(|| {
            Error::Parse(format!(
                "subjectPublicKey has {} unused bits",
                spki.subject_public_key.unused_bits()
            ))
        })?;

        debug!(%algorithm, key_len = key.len(), "decoded SubjectPublicKeyInfo");
        Self::from_bytes(algorithm, key)
    }

    /// Parse the first `PUBLIC KEY` PEM block in `pem`.
    ///
    /// Lines outside the block (comments, other blocks, non-text bytes) are
    /// skipped.
    pub fn from_pem(pem: impl AsRef<[u8]>) -> Result<Self> {
        let mut reader = pem.as_ref();
        let der = rustls_pemfile::public_keys(&mut reader)
            .next()
            .ok_or_else(|| Error::Parse("no PUBLIC KEY block found".into()))?
            .map_err(|e| Error::Parse(format!("bad PUBLIC KEY block: {e}")))?;
        Self::from_der(der.as_ref())
    }

    /// Read and parse a key file. The file is closed before parsing begins.
    pub fn load(path: impl AsRef<Path>, form: KeyForm) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), len = contents.len(), ?form, "read key file");

        match form {
            KeyForm::Der => Self::from_der(&contents),
            KeyForm::Pem => Self::from_pem(&contents),
        }
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Raw encapsulation key bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    fn spki(&self) -> Result<SubjectPublicKeyInfoRef<'_>> {
        let subject_public_key = BitStringRef::from_bytes(&self.bytes)
            .map_err(|e| Error::Parse(format!("cannot encode key: {e}")))?;
        Ok(SubjectPublicKeyInfoRef {
            algorithm: AlgorithmIdentifierRef {
                oid: self.algorithm.oid(),
                parameters: None,
            },
            subject_public_key,
        })
    }

    /// Encode as DER SubjectPublicKeyInfo.
    pub fn to_der(&self) -> Result<Vec<u8>> {
        self.spki()?
            .to_der()
            .map_err(|e| Error::Parse(format!("cannot encode key: {e}")))
    }

    /// Encode as a `PUBLIC KEY` PEM block.
    pub fn to_pem(&self) -> Result<String> {
        self.spki()?
            .to_pem(LineEnding::LF)
            .map_err(|e| Error::Parse(format!("cannot encode key: {e}")))
    }
}

/// Index of the first packed 12-bit coefficient that is not below q.
fn first_unreduced_coefficient(packed: &[u8]) -> Option<usize> {
    packed.chunks_exact(3).enumerate().find_map(|(i, b)| {
        let lo = u16::from(b[0]) | (u16::from(b[1] & 0x0f) << 8);
        let hi = u16::from(b[1] >> 4) | (u16::from(b[2]) << 4);
        if lo >= Q {
            Some(2 * i)
        } else if hi >= Q {
            Some(2 * i + 1)
        } else {
            None
        }
    })
}
