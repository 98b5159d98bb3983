//! `quire fingerprint` — print the ETag the store would record for a file.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Args;
use quire_sync::{fingerprint_file, MultipartPolicy};

#[derive(Args, Debug)]
pub struct FingerprintArgs {
    /// Files to fingerprint.
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
}

impl FingerprintArgs {
    pub async fn run(self) -> Result<ExitCode> {
        for path in &self.files {
            let fp = fingerprint_file(path, MultipartPolicy::STANDARD)
                .await
                .with_context(|| format!("cannot fingerprint {}", path.display()))?;
            println!("{fp}  {}", path.display());
        }
        Ok(ExitCode::SUCCESS)
    }
}
