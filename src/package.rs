//! Server package download, cache, and per-node installation.
//!
//! Release archives are fetched once into a user-level cache and every
//! node directory is a plain copy of the cached tree. Downloads stage
//! through temp files and only land under their final name after the
//! archive extracted and validated.

use crate::error::{NacosctlError, Result};
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info};
use walkdir::WalkDir;

const RELEASE_BASE_URL: &str = "https://github.com/alibaba/nacos/releases/download";
const DOWNLOAD_TIMEOUT_SECS: u64 = 600;
/// Release archives are tens of megabytes; anything smaller is an
/// error page, not a server.
const ARCHIVE_MIN_BYTES: usize = 1024 * 1024;
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
/// Marker proving an unpacked tree is a runnable server.
pub const LAUNCH_SCRIPT: &str = "bin/startup.sh";

/// Download URL of the release archive for `version`.
pub fn archive_url(version: &str) -> String {
    format!("{RELEASE_BASE_URL}/{version}/nacos-server-{version}.tar.gz")
}

/// User-level cache of unpacked server packages, one directory per
/// version.
pub struct PackageCache {
    cache_dir: PathBuf,
}

impl PackageCache {
    pub fn new() -> Self {
        Self {
            cache_dir: default_cache_dir(),
        }
    }

    pub fn with_cache_dir(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Directory holding the unpacked package for `version`.
    pub fn package_dir(&self, version: &str) -> PathBuf {
        self.cache_dir.join(format!("nacos-{version}"))
    }

    pub fn is_cached(&self, version: &str) -> bool {
        self.package_dir(version).join(LAUNCH_SCRIPT).exists()
    }

    /// Returns the cached package directory for `version`, downloading
    /// and unpacking the release archive on a cache miss.
    pub async fn ensure(&self, version: &str) -> Result<PathBuf> {
        let target = self.package_dir(version);
        if self.is_cached(version) {
            debug!(version, dir = %target.display(), "package cache hit");
            return Ok(target);
        }
        std::fs::create_dir_all(&self.cache_dir)?;

        let url = archive_url(version);
        info!(version, url = %url, "downloading server package");
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(DOWNLOAD_TIMEOUT_SECS))
            .build()?;
        let response = client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(NacosctlError::Package(format!(
                "download of {url} failed with HTTP {}; check that version {version} exists",
                response.status()
            )));
        }
        let bytes = response.bytes().await?;
        validate_archive_bytes(&bytes)?;

        let archive = tempfile::NamedTempFile::new_in(&self.cache_dir)?;
        std::fs::write(archive.path(), &bytes)?;
        self.unpack(archive.path(), version, &target).await?;
        info!(version, dir = %target.display(), "server package cached");
        Ok(target)
    }

    /// Copies the cached package for `version` into `dest`, fetching
    /// it first when missing.
    pub async fn install_into(&self, version: &str, dest: &Path) -> Result<()> {
        let source = self.ensure(version).await?;
        copy_tree(&source, dest)?;
        Ok(())
    }

    async fn unpack(&self, archive: &Path, version: &str, target: &Path) -> Result<()> {
        let staging = tempfile::tempdir_in(&self.cache_dir)?;
        let status = Command::new("tar")
            .arg("-xzf")
            .arg(archive)
            .arg("-C")
            .arg(staging.path())
            .status()
            .await?;
        if !status.success() {
            return Err(NacosctlError::Package(format!(
                "tar failed to unpack the {version} archive (exit {status})"
            )));
        }

        // The release archive unpacks to a top-level `nacos/`.
        let unpacked = staging.path().join("nacos");
        if !unpacked.join(LAUNCH_SCRIPT).exists() {
            return Err(NacosctlError::Package(format!(
                "archive for {version} did not contain {LAUNCH_SCRIPT}"
            )));
        }
        if target.exists() {
            std::fs::remove_dir_all(target)?;
        }
        std::fs::rename(&unpacked, target)?;
        Ok(())
    }
}

impl Default for PackageCache {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_archive_bytes(bytes: &[u8]) -> Result<()> {
    if bytes.len() < ARCHIVE_MIN_BYTES {
        return Err(NacosctlError::Package(format!(
            "downloaded archive is only {} bytes, which is too small to be a server package",
            bytes.len()
        )));
    }
    if bytes[..2] != GZIP_MAGIC {
        return Err(NacosctlError::Package(
            "downloaded archive is not gzip data".to_string(),
        ));
    }
    Ok(())
}

fn default_cache_dir() -> PathBuf {
    if let Some(cache) = dirs::cache_dir() {
        return cache.join("nacosctl");
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".cache").join("nacosctl");
    }
    std::env::temp_dir().join("nacosctl-cache")
}

/// Recursively copies `src` into `dest`, preserving file permissions
/// so the launch scripts stay executable.
fn copy_tree(src: &Path, dest: &Path) -> Result<()> {
    for entry in WalkDir::new(src) {
        let entry = entry.map_err(|e| {
            NacosctlError::Package(format!("walking {} failed: {e}", src.display()))
        })?;
        let rel = entry.path().strip_prefix(src).map_err(|e| {
            NacosctlError::Package(format!("walking {} failed: {e}", src.display()))
        })?;
        let target = dest.join(rel);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)?;
        } else {
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn fake_package(cache: &PackageCache, version: &str) {
        let dir = cache.package_dir(version);
        std::fs::create_dir_all(dir.join("bin")).unwrap();
        std::fs::create_dir_all(dir.join("conf")).unwrap();
        std::fs::write(dir.join(LAUNCH_SCRIPT), "#!/bin/bash\n").unwrap();
        std::fs::write(dir.join("conf/application.properties"), "# defaults\n").unwrap();
    }

    #[test]
    fn release_urls_follow_the_published_layout() {
        assert_eq!(
            archive_url("3.0.2"),
            "https://github.com/alibaba/nacos/releases/download/3.0.2/nacos-server-3.0.2.tar.gz"
        );
    }

    #[test]
    fn cache_detection_requires_the_launch_script() {
        let dir = tempdir().unwrap();
        let cache = PackageCache::with_cache_dir(dir.path());
        assert!(!cache.is_cached("3.0.2"));
        std::fs::create_dir_all(cache.package_dir("3.0.2")).unwrap();
        assert!(!cache.is_cached("3.0.2"));
        fake_package(&cache, "3.0.2");
        assert!(cache.is_cached("3.0.2"));
    }

    #[tokio::test]
    async fn ensure_returns_cached_packages_without_downloading() {
        let dir = tempdir().unwrap();
        let cache = PackageCache::with_cache_dir(dir.path());
        fake_package(&cache, "3.0.2");
        let resolved = cache.ensure("3.0.2").await.unwrap();
        assert_eq!(resolved, cache.package_dir("3.0.2"));
    }

    #[tokio::test]
    async fn install_copies_the_whole_tree() {
        let dir = tempdir().unwrap();
        let cache = PackageCache::with_cache_dir(dir.path());
        fake_package(&cache, "3.0.2");

        let dest = dir.path().join("cluster").join("0-v3.0.2");
        cache.install_into("3.0.2", &dest).await.unwrap();
        assert!(dest.join(LAUNCH_SCRIPT).exists());
        assert_eq!(
            std::fs::read_to_string(dest.join("conf/application.properties")).unwrap(),
            "# defaults\n"
        );
    }

    #[test]
    fn tiny_downloads_are_rejected() {
        let err = validate_archive_bytes(b"<html>404</html>").unwrap_err();
        assert!(matches!(err, NacosctlError::Package(_)));
    }

    #[test]
    fn non_gzip_downloads_are_rejected() {
        let bytes = vec![0u8; ARCHIVE_MIN_BYTES];
        assert!(validate_archive_bytes(&bytes).is_err());

        let mut gzip = vec![0u8; ARCHIVE_MIN_BYTES];
        gzip[0] = 0x1f;
        gzip[1] = 0x8b;
        assert!(validate_archive_bytes(&gzip).is_ok());
    }
}
