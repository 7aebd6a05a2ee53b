//! KEM encapsulation against a loaded [`PublicKey`].
//! Uses RustCrypto's ml-kem crate (FIPS 203) for the primitive itself.
#![forbid(unsafe_code)]

use ml_kem::kem::Encapsulate;
use ml_kem::{Ciphertext, Encoded, EncodedSizeUser, KemCore, MlKem1024, MlKem512, MlKem768, SharedKey};
use rand_core::CryptoRngCore;
use tracing::debug;
use zeroize::{Zeroize, Zeroizing};

use crate::algorithm::Algorithm;
use crate::key::PublicKey;
use crate::{Error, Result};

/// Shared secret bytes, wiped on drop.
pub type SharedSecret = Zeroizing<Vec<u8>>;

/// Output lengths reported by the size query.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BufferSizes {
    pub ciphertext: usize,
    pub secret: usize,
}

/// Result of one encapsulation.
pub struct Encapsulation {
    /// Sent to the holder of the decapsulation key.
    pub ciphertext: Vec<u8>,
    pub shared_secret: SharedSecret,
}

impl core::fmt::Debug for Encapsulation {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Encapsulation")
            .field("ciphertext_len", &self.ciphertext.len())
            .field("shared_secret", &"<redacted>")
            .finish()
    }
}

/// Library key object for the parameter set named by the SPKI.
enum LibraryKey {
    MlKem512(<MlKem512 as KemCore>::EncapsulationKey),
    MlKem768(<MlKem768 as KemCore>::EncapsulationKey),
    MlKem1024(<MlKem1024 as KemCore>::EncapsulationKey),
}

/// Handle for exactly one encapsulation with a given key.
///
/// Creation decodes the key into the library representation for the key's
/// own algorithm. [`encapsulate_into`](Self::encapsulate_into) consumes the
/// context, so it cannot be reused.
pub struct EncapsulationContext<R> {
    algorithm: Algorithm,
    key: LibraryKey,
    rng: R,
}

impl<R: CryptoRngCore> EncapsulationContext<R> {
    /// Bind a context to `key`, drawing randomness from `rng`.
    pub fn new(key: &PublicKey, rng: R) -> Result<Self> {
        let algorithm = key.algorithm();
        let bytes = key.as_bytes();
        let key = match algorithm {
            Algorithm::MlKem512 => LibraryKey::MlKem512(decode_key::<MlKem512>(bytes)?),
            Algorithm::MlKem768 => LibraryKey::MlKem768(decode_key::<MlKem768>(bytes)?),
            Algorithm::MlKem1024 => LibraryKey::MlKem1024(decode_key::<MlKem1024>(bytes)?),
        };
        debug!(%algorithm, "encapsulation context ready");
        Ok(Self { algorithm, key, rng })
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Ask the library how large the ciphertext and secret will be.
    ///
    /// Fails if the library's sizes disagree with the published sizes of the
    /// key's parameter set.
    pub fn output_sizes(&self) -> Result<BufferSizes> {
        let sizes = match self.key {
            LibraryKey::MlKem512(_) => library_sizes::<MlKem512>(),
            LibraryKey::MlKem768(_) => library_sizes::<MlKem768>(),
            LibraryKey::MlKem1024(_) => library_sizes::<MlKem1024>(),
        };
        if sizes.ciphertext != self.algorithm.ciphertext_size() {
            return Err(Error::SizeMismatch {
                what: "ciphertext",
                expected: self.algorithm.ciphertext_size(),
                actual: sizes.ciphertext,
            });
        }
        if sizes.secret != self.algorithm.shared_secret_size() {
            return Err(Error::SizeMismatch {
                what: "shared secret",
                expected: self.algorithm.shared_secret_size(),
                actual: sizes.secret,
            });
        }
        Ok(sizes)
    }

    /// Encapsulate into caller buffers, which must be exactly the sizes
    /// returned by [`output_sizes`](Self::output_sizes).
    pub fn encapsulate_into(mut self, ciphertext: &mut [u8], secret: &mut [u8]) -> Result<()> {
        let rng = &mut self.rng;
        match &self.key {
            LibraryKey::MlKem512(ek) => encapsulate_with::<MlKem512, _>(ek, rng, ciphertext, secret),
            LibraryKey::MlKem768(ek) => encapsulate_with::<MlKem768, _>(ek, rng, ciphertext, secret),
            LibraryKey::MlKem1024(ek) => encapsulate_with::<MlKem1024, _>(ek, rng, ciphertext, secret),
        }
    }
}

/// Run the whole size query / allocate / encapsulate sequence for `key`.
pub fn encapsulate<R: CryptoRngCore>(key: &PublicKey, rng: R) -> Result<Encapsulation> {
    let ctx = EncapsulationContext::new(key, rng)?;
    let sizes = ctx.output_sizes()?;
    debug!(
        algorithm = %ctx.algorithm(),
        ciphertext = sizes.ciphertext,
        secret = sizes.secret,
        "queried output sizes"
    );

    let mut ciphertext = vec![0u8; sizes.ciphertext];
    let mut shared_secret = Zeroizing::new(vec![0u8; sizes.secret]);
    ctx.encapsulate_into(&mut ciphertext, &mut shared_secret)?;

    Ok(Encapsulation {
        ciphertext,
        shared_secret,
    })
}

fn decode_key<K: KemCore>(bytes: &[u8]) -> Result<K::EncapsulationKey> {
    let encoded = Encoded::<K::EncapsulationKey>::try_from(bytes)
        .map_err(|_| Error::Crypto(format!("cannot initialise key of {} bytes", bytes.len())))?;
    Ok(K::EncapsulationKey::from_bytes(&encoded))
}

fn library_sizes<K: KemCore>() -> BufferSizes {
    BufferSizes {
        ciphertext: Ciphertext::<K>::default().len(),
        secret: SharedKey::<K>::default().len(),
    }
}

fn encapsulate_with<K: KemCore, R: CryptoRngCore>(
    ek: &K::EncapsulationKey,
    rng: &mut R,
    ciphertext: &mut [u8],
    secret: &mut [u8],
) -> Result<()> {
    let (ct, mut ss) = ek
        .encapsulate(rng)
        .map_err(|e| Error::Crypto(format!("encapsulation failed: {e:?}")))?;
    let copied = copy_exact("ciphertext", &ct, ciphertext)
        .and_then(|()| copy_exact("shared secret", &ss, secret));
    ss.as_mut_slice().zeroize();
    copied
}

fn copy_exact(what: &'static str, produced: &[u8], out: &mut [u8]) -> Result<()> {
    if produced.len() != out.len() {
        return Err(Error::SizeMismatch {
            what,
            expected: out.len(),
            actual: produced.len(),
        });
    }
    out.copy_from_slice(produced);
    Ok(())
}
