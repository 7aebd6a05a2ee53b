#![forbid(unsafe_code)]

use core::fmt;

use spki::ObjectIdentifier;

/// NIST `id-alg-ml-kem-*` arcs.
const ID_ALG_ML_KEM_512: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.4.1");
const ID_ALG_ML_KEM_768: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.4.2");
const ID_ALG_ML_KEM_1024: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.4.3");

/// ML-KEM shared secrets are 32 bytes for every parameter set.
pub const SHARED_SECRET_SIZE: usize = 32;

/// KEM parameter set identified by a public key's AlgorithmIdentifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Algorithm {
    MlKem512,
    MlKem768,
    MlKem1024,
}

impl Algorithm {
    pub const ALL: [Algorithm; 3] = [Self::MlKem512, Self::MlKem768, Self::MlKem1024];

    /// Module rank `k`.
    pub const fn rank(self) -> usize {
        match self {
            Self::MlKem512 => 2,
            Self::MlKem768 => 3,
            Self::MlKem1024 => 4,
        }
    }

    const fn compression(self) -> (usize, usize) {
        match self {
            Self::MlKem512 | Self::MlKem768 => (10, 4),
            Self::MlKem1024 => (11, 5),
        }
    }

    /// Encoded encapsulation key length: 384·k + 32.
    pub const fn public_key_size(self) -> usize {
        384 * self.rank() + 32
    }

    /// Ciphertext length: 32·(du·k + dv).
    pub const fn ciphertext_size(self) -> usize {
        let (du, dv) = self.compression();
        32 * (du * self.rank() + dv)
    }

    pub const fn shared_secret_size(self) -> usize {
        SHARED_SECRET_SIZE
    }

    /// AlgorithmIdentifier OID carried in the key's SPKI.
    pub const fn oid(self) -> ObjectIdentifier {
        match self {
            Self::MlKem512 => ID_ALG_ML_KEM_512,
            Self::MlKem768 => ID_ALG_ML_KEM_768,
            Self::MlKem1024 => ID_ALG_ML_KEM_1024,
        }
    }

    pub fn from_oid(oid: &ObjectIdentifier) -> Option<Self> {
        Self::ALL.into_iter().find(|alg| alg.oid() == *oid)
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::MlKem512 => "ML-KEM-512",
            Self::MlKem768 => "ML-KEM-768",
            Self::MlKem1024 => "ML-KEM-1024",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
