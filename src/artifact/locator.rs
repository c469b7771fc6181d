use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::bundle::BundleReader;
use super::format::ArtifactFormat;
use super::types::{ArtifactError, ModelArtifact};

/// Resolves the model artifact, preferring an installed copy over the bundled one.
///
/// The check-then-copy sequence in [`resolve`](Self::resolve) is not safe
/// against concurrent callers. The session manager runs it on its single
/// worker, which is what keeps it race-free.
#[derive(Debug, Clone)]
pub struct ArtifactLocator {
    /// Directory bundled resources are extracted into
    cache_dir: PathBuf,
}

impl ArtifactLocator {
    pub fn new<P: Into<PathBuf>>(cache_dir: P) -> Self {
        Self { cache_dir: cache_dir.into() }
    }

    /// Resolves `filename` to a usable artifact.
    ///
    /// 1. `install_dir/filename` if present and non-empty (bundle untouched).
    /// 2. A previously extracted copy in the cache directory.
    /// 3. A fresh byte-for-byte copy of the bundle resource into the cache.
    ///
    /// # Arguments
    ///
    /// * `install_dir` - Application-private storage root
    /// * `bundle` - Read-only application bundle
    /// * `filename` - Fixed artifact filename, shared by all three locations
    ///
    /// # Returns
    ///
    /// The resolved artifact, or the first error encountered
    pub fn resolve(
        &self,
        install_dir: &Path,
        bundle: &dyn BundleReader,
        filename: &str,
    ) -> Result<ModelArtifact, ArtifactError> {
        let installed_path = install_dir.join(filename);
        if let Some(size) = non_empty_size(&installed_path) {
            info!("Using installed model artifact: {} ({} bytes)", installed_path.display(), size);
            return Ok(artifact_at(installed_path, size, true));
        }
        debug!("No installed artifact at {}", installed_path.display());

        let cached_path = self.cache_dir.join(filename);
        if non_empty_size(&cached_path).is_none() {
            self.extract_from_bundle(bundle, filename, &cached_path)?;
        } else {
            debug!("Reusing cached artifact at {}", cached_path.display());
        }

        match non_empty_size(&cached_path) {
            Some(size) => {
                info!("Using cached model artifact: {} ({} bytes)", cached_path.display(), size);
                Ok(artifact_at(cached_path, size, false))
            }
            None => Err(ArtifactError::NotFound(filename.to_string())),
        }
    }

    /// Streams the bundle entry into the cache.
    ///
    /// The copy lands in a `.part` sibling first and is renamed into place only
    /// once it is complete and non-empty.
    fn extract_from_bundle(
        &self,
        bundle: &dyn BundleReader,
        filename: &str,
        cached_path: &Path,
    ) -> Result<(), ArtifactError> {
        let mut reader = bundle
            .open(filename)?
            .ok_or_else(|| ArtifactError::BundleEntryMissing(filename.to_string()))?;

        fs::create_dir_all(&self.cache_dir)?;
        let partial_path = self.cache_dir.join(format!("{}.part", filename));
        info!("Copying bundled artifact '{}' into {}", filename, self.cache_dir.display());

        let copied = (|| -> io::Result<u64> {
            let mut writer = BufWriter::new(File::create(&partial_path)?);
            let copied = io::copy(&mut reader, &mut writer)?;
            writer.flush()?;
            writer.get_ref().sync_all()?;
            Ok(copied)
        })();

        match copied {
            Ok(0) => {
                warn!("Bundled artifact '{}' is empty, discarding copy", filename);
                let _ = fs::remove_file(&partial_path);
                Ok(())
            }
            Ok(bytes) => {
                fs::rename(&partial_path, cached_path)?;
                info!("Copied {} bytes to {}", bytes, cached_path.display());
                Ok(())
            }
            Err(e) => {
                let _ = fs::remove_file(&partial_path);
                Err(ArtifactError::CopyFailed(e))
            }
        }
    }
}

fn non_empty_size(path: &Path) -> Option<u64> {
    fs::metadata(path)
        .ok()
        .filter(|meta| meta.is_file() && meta.len() > 0)
        .map(|meta| meta.len())
}

fn artifact_at(path: PathBuf, size_bytes: u64, installed: bool) -> ModelArtifact {
    let format = ArtifactFormat::probe(&path);
    ModelArtifact { path, size_bytes, installed, format }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    /// In-memory bundle that counts how often entries are opened.
    struct CountingBundle {
        entry: Option<Vec<u8>>,
        opens: AtomicUsize,
    }

    impl CountingBundle {
        fn with(entry: Option<&[u8]>) -> Self {
            Self { entry: entry.map(|e| e.to_vec()), opens: AtomicUsize::new(0) }
        }
    }

    impl BundleReader for CountingBundle {
        fn open(&self, _name: &str) -> io::Result<Option<Box<dyn Read + Send>>> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            Ok(self.entry.clone().map(|bytes| Box::new(io::Cursor::new(bytes)) as Box<dyn Read + Send>))
        }
    }

    /// Reader that fails halfway through.
    struct BrokenReader;

    impl Read for BrokenReader {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::UnexpectedEof, "truncated asset"))
        }
    }

    struct BrokenBundle;

    impl BundleReader for BrokenBundle {
        fn open(&self, _name: &str) -> io::Result<Option<Box<dyn Read + Send>>> {
            Ok(Some(Box::new(BrokenReader)))
        }
    }

    #[test]
    fn test_installed_copy_wins_without_touching_bundle() {
        let install = tempdir().unwrap();
        let cache = tempdir().unwrap();
        fs::write(install.path().join("model.gguf"), b"installed").unwrap();

        let bundle = CountingBundle::with(Some(b"bundled"));
        let locator = ArtifactLocator::new(cache.path());
        let artifact = locator.resolve(install.path(), &bundle, "model.gguf").unwrap();

        assert!(artifact.installed);
        assert_eq!(artifact.size_bytes, 9);
        assert_eq!(bundle.opens.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_empty_installed_file_falls_through_to_bundle() {
        let install = tempdir().unwrap();
        let cache = tempdir().unwrap();
        fs::write(install.path().join("model.gguf"), b"").unwrap();

        let bundle = CountingBundle::with(Some(b"bundled"));
        let artifact = ArtifactLocator::new(cache.path())
            .resolve(install.path(), &bundle, "model.gguf")
            .unwrap();

        assert!(!artifact.installed);
        assert_eq!(artifact.path, cache.path().join("model.gguf"));
        assert_eq!(fs::read(&artifact.path).unwrap(), b"bundled");
    }

    #[test]
    fn test_bundle_is_copied_only_once() {
        let install = tempdir().unwrap();
        let cache = tempdir().unwrap();
        let bundle = CountingBundle::with(Some(b"bundled weights"));
        let locator = ArtifactLocator::new(cache.path().join("models"));

        let first = locator.resolve(install.path(), &bundle, "model.gguf").unwrap();
        let second = locator.resolve(install.path(), &bundle, "model.gguf").unwrap();

        assert_eq!(first.path, second.path);
        assert_eq!(bundle.opens.load(Ordering::SeqCst), 1);
        assert!(!cache.path().join("models").join("model.gguf.part").exists());
    }

    #[test]
    fn test_missing_bundle_entry() {
        let install = tempdir().unwrap();
        let cache = tempdir().unwrap();
        let bundle = CountingBundle::with(None);

        let err = ArtifactLocator::new(cache.path())
            .resolve(install.path(), &bundle, "model.gguf")
            .unwrap_err();
        assert!(matches!(err, ArtifactError::BundleEntryMissing(ref name) if name == "model.gguf"));
        assert_eq!(err.kind(), "BUNDLE_ENTRY_MISSING");
    }

    #[test]
    fn test_empty_bundle_entry_is_not_found() {
        let install = tempdir().unwrap();
        let cache = tempdir().unwrap();
        let bundle = CountingBundle::with(Some(b""));

        let err = ArtifactLocator::new(cache.path())
            .resolve(install.path(), &bundle, "model.gguf")
            .unwrap_err();
        assert!(matches!(err, ArtifactError::NotFound(_)));
        assert!(!cache.path().join("model.gguf").exists());
    }

    #[test]
    fn test_failed_copy_leaves_no_partial_file() {
        let install = tempdir().unwrap();
        let cache = tempdir().unwrap();

        let err = ArtifactLocator::new(cache.path())
            .resolve(install.path(), &BrokenBundle, "model.gguf")
            .unwrap_err();
        assert!(matches!(err, ArtifactError::CopyFailed(_)));
        assert!(!cache.path().join("model.gguf.part").exists());
        assert!(!cache.path().join("model.gguf").exists());
    }
}
