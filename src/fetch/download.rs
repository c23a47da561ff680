//! Byte transfer from remote or local locations.

use anyhow::{bail, Context, Result};
use reqwest::blocking::Client;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::ui::{format_bytes, TransferProgress};

/// Copies the resource at a locator to a local file.
pub trait Downloader: Send {
    /// Transfer `locator` into `dest`, returning the byte count.
    fn download(&self, locator: &str, dest: &Path) -> Result<u64>;
}

/// Where a locator points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    /// `http://` or `https://` URL.
    Remote(String),
    /// `file://` URL or a plain path, typically a local mirror.
    Local(PathBuf),
}

impl Locator {
    pub fn parse(locator: &str) -> Self {
        if locator.starts_with("http://") || locator.starts_with("https://") {
            return Self::Remote(locator.to_string());
        }
        match locator.strip_prefix("file://") {
            Some(rest) => Self::Local(PathBuf::from(file_url_path(rest))),
            None => Self::Local(PathBuf::from(locator)),
        }
    }
}

#[cfg(windows)]
fn file_url_path(rest: &str) -> &str {
    // file:///C:/mirror/tools.zip
    match rest.strip_prefix('/') {
        Some(trimmed) if trimmed.as_bytes().get(1) == Some(&b':') => trimmed,
        _ => rest,
    }
}

#[cfg(not(windows))]
fn file_url_path(rest: &str) -> &str {
    rest
}

/// Downloads over HTTP(S) and copies local files.
pub struct HttpDownloader {
    client: Client,
    show_progress: bool,
}

impl HttpDownloader {
    /// Create a downloader with the default timeouts.
    pub fn new() -> Result<Self> {
        Self::with_timeouts(Duration::from_secs(30), Duration::from_secs(30 * 60))
    }

    /// Create a downloader with explicit connect and overall timeouts.
    pub fn with_timeouts(connect: Duration, overall: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("devprov/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(connect)
            .timeout(overall)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            show_progress: false,
        })
    }

    /// Draw a progress bar while transferring.
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    fn progress(&self, label: &str, total: Option<u64>) -> TransferProgress {
        if self.show_progress {
            TransferProgress::new(label, total)
        } else {
            TransferProgress::hidden()
        }
    }

    fn fetch_remote(&self, url: &str, dest: &Path) -> Result<u64> {
        let mut response = self.client.get(url).send()?;
        if !response.status().is_success() {
            bail!("HTTP {} fetching {}", response.status(), url);
        }

        let expected = response.content_length();
        let progress = self.progress(file_label(url), expected);
        let written = match copy_with_progress(&mut response, dest, &progress) {
            Ok(n) => n,
            Err(e) => {
                progress.abandon();
                return Err(e).with_context(|| format!("Transfer from {} interrupted", url));
            }
        };
        progress.finish();

        if let Some(expected) = expected {
            if written != expected {
                bail!(
                    "Incomplete download from {}: got {} of {}",
                    url,
                    format_bytes(written),
                    format_bytes(expected)
                );
            }
        }
        Ok(written)
    }

    fn copy_local(&self, path: &Path, dest: &Path) -> Result<u64> {
        let mut file =
            File::open(path).with_context(|| format!("Cannot open {}", path.display()))?;
        let total = file.metadata().ok().map(|m| m.len());
        let label = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let progress = self.progress(&label, total);
        let written = copy_with_progress(&mut file, dest, &progress)?;
        progress.finish();
        Ok(written)
    }
}

impl Downloader for HttpDownloader {
    fn download(&self, locator: &str, dest: &Path) -> Result<u64> {
        match Locator::parse(locator) {
            Locator::Remote(url) => self.fetch_remote(&url, dest),
            Locator::Local(path) => self.copy_local(&path, dest),
        }
    }
}

fn file_label(url: &str) -> &str {
    url.rsplit('/').next().unwrap_or(url)
}

fn copy_with_progress(
    reader: &mut impl Read,
    dest: &Path,
    progress: &TransferProgress,
) -> Result<u64> {
    let mut file =
        File::create(dest).with_context(|| format!("Cannot create {}", dest.display()))?;
    let mut buf = vec![0u8; 64 * 1024];
    let mut total = 0u64;
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        file.write_all(&buf[..n])?;
        progress.advance(n as u64);
        total += n as u64;
    }
    file.flush()?;
    Ok(total)
}
