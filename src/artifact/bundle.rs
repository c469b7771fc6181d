use std::fs::File;
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};

/// Read-only access to resources shipped inside the application bundle.
pub trait BundleReader: Send + Sync {
    /// Opens the named resource for streaming.
    ///
    /// Returns `Ok(None)` when the bundle has no such entry, and `Err` only for
    /// failures while opening an entry that does exist.
    fn open(&self, name: &str) -> io::Result<Option<Box<dyn Read + Send>>>;
}

/// A bundle backed by a plain directory of asset files.
#[derive(Debug, Clone)]
pub struct DirectoryBundle {
    root: PathBuf,
}

impl DirectoryBundle {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }
}

impl BundleReader for DirectoryBundle {
    fn open(&self, name: &str) -> io::Result<Option<Box<dyn Read + Send>>> {
        // Entries are flat names; anything that could escape the root is simply absent
        let relative = Path::new(name);
        if name.is_empty() || relative.components().any(|c| !matches!(c, Component::Normal(_))) {
            return Ok(None);
        }

        let path = self.root.join(relative);
        if !path.is_file() {
            return Ok(None);
        }
        let file = File::open(&path)?;
        Ok(Some(Box::new(file)))
    }
}
