use std::io;
use std::path::PathBuf;
use serde::Serialize;
use thiserror::Error;

use super::format::ArtifactFormat;

/// A resolved model artifact on disk.
///
/// Created by [`ArtifactLocator`](super::ArtifactLocator) and never mutated
/// afterwards. A runtime only accepts artifacts that exist and are non-empty.
#[derive(Debug, Clone, Serialize)]
pub struct ModelArtifact {
    /// Absolute or configured path of the artifact file
    pub path: PathBuf,
    /// File size at resolve time
    pub size_bytes: u64,
    /// `true` when found in the install directory, `false` when served from the cache
    pub installed: bool,
    /// Container format detected from the file header
    pub format: ArtifactFormat,
}

/// Errors raised while locating or materializing the model artifact.
#[derive(Debug, Error)]
pub enum ArtifactError {
    /// Neither the install directory nor the cache yielded a usable file
    #[error("model artifact '{0}' not found")]
    NotFound(String),
    /// The application bundle has no resource with the requested name
    #[error("bundle has no entry named '{0}'")]
    BundleEntryMissing(String),
    /// Copying the bundle resource into the cache failed
    #[error("failed to copy artifact into cache: {0}")]
    CopyFailed(#[from] io::Error),
}

impl ArtifactError {
    /// Stable identifier used by the host bridge.
    pub fn kind(&self) -> &'static str {
        match self {
            ArtifactError::NotFound(_) => "MODEL_NOT_FOUND",
            ArtifactError::BundleEntryMissing(_) => "BUNDLE_ENTRY_MISSING",
            ArtifactError::CopyFailed(_) => "COPY_FAILED",
        }
    }
}
