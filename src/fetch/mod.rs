//! Resource fetching with ranked fallback.
//!
//! A [`ResourceFetcher`] tries each candidate location in order. The first
//! one that downloads, unpacks and contains the expected layout is moved
//! into place; the rest are never contacted. Staging happens next to the
//! destination so the final move is a rename.

pub mod archive;
pub mod download;

pub use archive::{install_root, locate_root, unpack_zip};
pub use download::{Downloader, HttpDownloader, Locator};

use anyhow::{anyhow, Context};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{ProvisionError, Result};
use crate::runlog::RunLog;

/// An archive published at several locations.
#[derive(Debug, Clone)]
pub struct ArchiveResource {
    /// Human readable name used in messages.
    pub name: String,
    /// Locations, most preferred first.
    pub candidates: Vec<String>,
    /// Expected top-level directory inside the archive.
    pub root_name: String,
    /// Subdirectory identifying a usable root when the name differs.
    pub marker_dir: String,
    /// File, relative to the installed root, proving the install is complete.
    pub marker_file: PathBuf,
}

impl ArchiveResource {
    /// Whether `destination` already holds a complete install.
    pub fn is_installed(&self, destination: &Path) -> bool {
        destination.join(&self.marker_file).is_file()
    }
}

/// Fetches archives into place.
pub struct ResourceFetcher {
    downloader: Box<dyn Downloader>,
    log: RunLog,
}

impl ResourceFetcher {
    pub fn new(downloader: Box<dyn Downloader>, log: RunLog) -> Self {
        Self { downloader, log }
    }

    /// Install `resource` at `destination`.
    ///
    /// Returns without any transfer when the marker file already exists.
    /// Fails with [`ProvisionError::AllCandidatesExhausted`] when no
    /// candidate works; a partial download never leaves files at
    /// `destination`.
    pub fn fetch(&self, resource: &ArchiveResource, destination: &Path) -> Result<PathBuf> {
        if resource.is_installed(destination) {
            self.log.info(&format!(
                "{} already present at {}",
                resource.name,
                destination.display()
            ));
            return Ok(destination.to_path_buf());
        }

        let parent = destination
            .parent()
            .ok_or_else(|| anyhow!("{} has no parent directory", destination.display()))?;
        fs::create_dir_all(parent)?;

        for locator in &resource.candidates {
            self.log.info(&format!("Downloading: {}", locator));
            match self.try_candidate(resource, locator, parent, destination) {
                Ok(()) => {
                    self.log.info(&format!(
                        "Installed {} to {}",
                        resource.name,
                        destination.display()
                    ));
                    return Ok(destination.to_path_buf());
                }
                Err(e) => self.log.warn(&format!("Failed with URL {}: {:#}", locator, e)),
            }
        }

        Err(ProvisionError::AllCandidatesExhausted {
            resource: resource.name.clone(),
            locations: resource.candidates.clone(),
        })
    }

    fn try_candidate(
        &self,
        resource: &ArchiveResource,
        locator: &str,
        parent: &Path,
        destination: &Path,
    ) -> anyhow::Result<()> {
        let staging = tempfile::Builder::new()
            .prefix(".staging-")
            .tempdir_in(parent)
            .context("Failed to create staging directory")?;

        let archive = staging.path().join("download.zip");
        let bytes = self.downloader.download(locator, &archive)?;
        self.log
            .record(&format!("Saved {} ({} bytes)", archive.display(), bytes));

        let unpacked = staging.path().join("unpacked");
        unpack_zip(&archive, &unpacked)?;

        let root = locate_root(&unpacked, &resource.root_name, &resource.marker_dir)
            .ok_or_else(|| {
                anyhow!(
                    "archive has no '{}' directory or '{}' subdirectory",
                    resource.root_name,
                    resource.marker_dir
                )
            })?;
        if !root.join(&resource.marker_file).is_file() {
            return Err(anyhow!(
                "archive is missing {}",
                resource.marker_file.display()
            ));
        }

        install_root(&root, destination).context("Failed to move tools into place")?;
        Ok(())
    }
}
