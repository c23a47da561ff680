//! Archive unpacking and installation.

use anyhow::{Context, Result};
use std::collections::VecDeque;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

/// Extract a zip archive into `into`, keeping Unix permissions.
pub fn unpack_zip(archive: &Path, into: &Path) -> Result<()> {
    let file = File::open(archive).context("Failed to open downloaded archive")?;
    let mut zip = zip::ZipArchive::new(file).context("Failed to read zip archive")?;
    fs::create_dir_all(into).context("Failed to create staging directory")?;
    zip.extract(into).context("Failed to extract archive")?;
    Ok(())
}

/// Find the directory worth installing inside an unpacked archive.
///
/// Prefers a top-level directory named `expected`; otherwise the first
/// directory, breadth-first in name order, containing a `marker_dir`
/// subdirectory. The staging directory itself counts when the archive has
/// its content at the top level.
pub fn locate_root(staging: &Path, expected: &str, marker_dir: &str) -> Option<PathBuf> {
    let named = staging.join(expected);
    if named.is_dir() {
        return Some(named);
    }

    let mut queue = VecDeque::from([staging.to_path_buf()]);
    while let Some(dir) = queue.pop_front() {
        if dir.join(marker_dir).is_dir() {
            return Some(dir);
        }
        queue.extend(sorted_subdirs(&dir));
    }
    None
}

fn sorted_subdirs(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut dirs: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    dirs.sort();
    dirs
}

/// Move `src` to `dest`, replacing whatever was there.
///
/// The previous directory is renamed aside first and restored if the move
/// fails. Both paths must be on the same filesystem.
pub fn install_root(src: &Path, dest: &Path) -> io::Result<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }

    if !dest.exists() {
        return fs::rename(src, dest);
    }

    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let previous = dest.with_file_name(format!(".{}.previous", name));
    if previous.exists() {
        fs::remove_dir_all(&previous)?;
    }

    fs::rename(dest, &previous)?;
    if let Err(e) = fs::rename(src, dest) {
        let _ = fs::rename(&previous, dest);
        return Err(e);
    }
    if let Err(e) = fs::remove_dir_all(&previous) {
        tracing::debug!(error = %e, "could not remove previous installation");
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;

    /// Build a zip containing `files` (path, content) pairs.
    pub(crate) fn write_zip(path: &Path, files: &[(&str, &str)]) {
        let file = File::create(path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        let options = SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Stored)
            .unix_permissions(0o755);
        for (name, content) in files {
            zip.start_file(*name, options).unwrap();
            zip.write_all(content.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }

    #[test]
    fn unpacks_nested_entries() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("tools.zip");
        write_zip(&archive, &[("cmdline-tools/bin/sdkmanager", "#!/bin/sh\n")]);

        let out = temp.path().join("out");
        unpack_zip(&archive, &out).unwrap();

        assert!(out.join("cmdline-tools/bin/sdkmanager").is_file());
    }

    #[cfg(unix)]
    #[test]
    fn unpack_keeps_executable_bit() {
        use std::os::unix::fs::PermissionsExt;
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("tools.zip");
        write_zip(&archive, &[("cmdline-tools/bin/sdkmanager", "#!/bin/sh\n")]);

        let out = temp.path().join("out");
        unpack_zip(&archive, &out).unwrap();

        let mode = fs::metadata(out.join("cmdline-tools/bin/sdkmanager"))
            .unwrap()
            .permissions()
            .mode();
        assert_ne!(mode & 0o111, 0);
    }

    #[test]
    fn malformed_archive_is_an_error() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("broken.zip");
        fs::write(&archive, "<html>not found</html>").unwrap();

        assert!(unpack_zip(&archive, &temp.path().join("out")).is_err());
    }

    #[test]
    fn prefers_expected_top_level_name() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("aaa/bin")).unwrap();
        fs::create_dir_all(temp.path().join("cmdline-tools/lib")).unwrap();

        let root = locate_root(temp.path(), "cmdline-tools", "bin").unwrap();
        assert_eq!(root, temp.path().join("cmdline-tools"));
    }

    #[test]
    fn falls_back_to_first_dir_with_marker() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("zzz/bin")).unwrap();
        fs::create_dir_all(temp.path().join("pkg/inner/bin")).unwrap();
        fs::create_dir_all(temp.path().join("alpha/bin")).unwrap();

        let root = locate_root(temp.path(), "cmdline-tools", "bin").unwrap();
        assert_eq!(root, temp.path().join("alpha"));
    }

    #[test]
    fn searches_deeper_levels() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("release/tools/bin")).unwrap();

        let root = locate_root(temp.path(), "cmdline-tools", "bin").unwrap();
        assert_eq!(root, temp.path().join("release/tools"));
    }

    #[test]
    fn flat_archive_uses_staging_root() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("bin")).unwrap();

        let root = locate_root(temp.path(), "cmdline-tools", "bin").unwrap();
        assert_eq!(root, temp.path());
    }

    #[test]
    fn no_root_found() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("docs")).unwrap();
        assert!(locate_root(temp.path(), "cmdline-tools", "bin").is_none());
    }

    #[test]
    fn install_replaces_previous_directory() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("new");
        fs::create_dir_all(src.join("bin")).unwrap();
        fs::write(src.join("bin/tool"), "new").unwrap();

        let dest = temp.path().join("sdk/cmdline-tools/latest");
        fs::create_dir_all(&dest).unwrap();
        fs::write(dest.join("stale.txt"), "old").unwrap();

        install_root(&src, &dest).unwrap();

        assert!(!src.exists());
        assert!(dest.join("bin/tool").is_file());
        assert!(!dest.join("stale.txt").exists());
        assert!(!temp.path().join("sdk/cmdline-tools/.latest.previous").exists());
    }

    #[test]
    fn install_creates_missing_parent() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("new");
        fs::create_dir_all(&src).unwrap();
        let dest = temp.path().join("a/b/latest");

        install_root(&src, &dest).unwrap();

        assert!(dest.is_dir());
    }
}
