#![forbid(unsafe_code)]

//! Secret and ciphertext destinations.
//!
//! Both files are created (or truncated) before any key material is read,
//! so an unwritable destination fails the run early. Handles close on drop.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use encap_crypto::Encapsulation;
use tracing::debug;

/// Create mode for output files before umask; matches `open(2)` with 0666.
#[cfg(unix)]
const OUTPUT_MODE: u32 = 0o666;

struct Output {
    path: PathBuf,
    file: File,
}

impl Output {
    fn create(path: &Path) -> Result<Self> {
        let mut opts = OpenOptions::new();
        opts.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            opts.mode(OUTPUT_MODE);
        }
        let file = opts
            .open(path)
            .with_context(|| format!("can't open output file: {}", path.display()))?;
        debug!(path = %path.display(), "opened output file");
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    fn write(&mut self, what: &str, bytes: &[u8]) -> Result<()> {
        self.file
            .write_all(bytes)
            .and_then(|()| self.file.flush())
            .with_context(|| format!("error writing {what} to {}", self.path.display()))
    }
}

/// The two open destinations of one run.
pub struct OutputFiles {
    secret: Output,
    ciphertext: Output,
}

impl OutputFiles {
    pub fn create(secret: &Path, ciphertext: &Path) -> Result<Self> {
        let secret = Output::create(secret)?;
        let ciphertext = Output::create(ciphertext)?;
        Ok(Self { secret, ciphertext })
    }

    /// Write the secret, then the ciphertext, and close both files.
    pub fn write(mut self, result: &Encapsulation) -> Result<()> {
        self.secret.write("secret", &result.shared_secret)?;
        self.ciphertext.write("ciphertext", &result.ciphertext)?;
        debug!(
            secret = result.shared_secret.len(),
            ciphertext = result.ciphertext.len(),
            "wrote outputs"
        );
        Ok(())
    }
}
