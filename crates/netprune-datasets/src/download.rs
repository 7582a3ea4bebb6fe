//! Fetching dataset archives.
//!
//! Archives are unpacked into a staging directory under the root and moved
//! into place only once extraction has finished, so an interrupted download
//! never leaves a partial dataset directory behind.

use crate::registry::CifarKind;
use netprune_data::{DataError, DataResult};
use std::fs;
use std::path::Path;

/// Somewhere a missing or damaged dataset can be fetched from.
pub trait ArchiveSource: Send + Sync {
    /// Install `kind`'s extracted directory under `root`, replacing any
    /// existing copy.
    fn fetch(&self, kind: CifarKind, root: &Path) -> DataResult<()>;
}

/// The canonical archives, fetched over HTTP.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpArchive;

impl ArchiveSource for HttpArchive {
    fn fetch(&self, kind: CifarKind, root: &Path) -> DataResult<()> {
        fetch_archive(kind.archive_url(), root, kind.dir_name())
    }
}

/// Run `fill` against a fresh staging directory in `root`, then move the
/// `dir_name` it produced to `root/dir_name`.
pub fn install_dir<F>(root: &Path, dir_name: &str, fill: F) -> DataResult<()>
where
    F: FnOnce(&Path) -> DataResult<()>,
{
    fs::create_dir_all(root)?;
    let staging = tempfile::Builder::new()
        .prefix(".netprune-staging-")
        .tempdir_in(root)?;
    fill(staging.path())?;

    let extracted = staging.path().join(dir_name);
    if !extracted.is_dir() {
        return Err(DataError::Download(format!(
            "archive did not contain {dir_name}/"
        )));
    }
    let target = root.join(dir_name);
    if target.exists() {
        fs::remove_dir_all(&target)?;
    }
    fs::rename(&extracted, &target)?;
    Ok(())
}

/// Download a `.tar.gz` archive and install its `dir_name` under `root`.
#[cfg(feature = "download")]
pub fn fetch_archive(url: &str, root: &Path, dir_name: &str) -> DataResult<()> {
    use flate2::read::GzDecoder;
    use log::info;

    info!("Downloading {} to {:?}", url, root);
    install_dir(root, dir_name, |staging| {
        let response = ureq::get(url)
            .call()
            .map_err(|e| DataError::Download(format!("{url}: {e}")))?;
        tar::Archive::new(GzDecoder::new(response.into_reader()))
            .unpack(staging)
            .map_err(|e| DataError::Download(format!("extracting {url}: {e}")))
    })?;
    info!("Installed {:?}", root.join(dir_name));
    Ok(())
}

#[cfg(not(feature = "download"))]
pub fn fetch_archive(url: &str, _root: &Path, _dir_name: &str) -> DataResult<()> {
    Err(DataError::Download(format!(
        "{url}: built without the `download` feature"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_install_replaces_existing_dir() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir_all(root.path().join("set")).unwrap();
        fs::write(root.path().join("set").join("stale.bin"), b"old").unwrap();

        install_dir(root.path(), "set", |staging| {
            fs::create_dir_all(staging.join("set"))?;
            fs::write(staging.join("set").join("fresh.bin"), b"new")?;
            Ok(())
        })
        .unwrap();

        assert!(root.path().join("set").join("fresh.bin").exists());
        assert!(!root.path().join("set").join("stale.bin").exists());
    }

    #[test]
    fn test_failed_extraction_leaves_nothing_behind() {
        let root = tempfile::tempdir().unwrap();
        let result = install_dir(root.path(), "set", |staging| {
            fs::create_dir_all(staging.join("set"))?;
            fs::write(staging.join("set").join("half.bin"), b"...")?;
            Err(DataError::Download("connection reset".into()))
        });

        assert!(matches!(result, Err(DataError::Download(_))));
        assert_eq!(fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_archive_without_expected_dir() {
        let root = tempfile::tempdir().unwrap();
        let result = install_dir(root.path(), "set", |staging| {
            fs::create_dir_all(staging.join("other"))?;
            Ok(())
        });
        assert!(matches!(result, Err(DataError::Download(_))));
        assert!(!root.path().join("set").exists());
    }
}
