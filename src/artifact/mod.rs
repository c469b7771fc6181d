mod bundle;
mod format;
mod locator;
mod types;

pub use bundle::{BundleReader, DirectoryBundle};
pub use format::ArtifactFormat;
pub use locator::ArtifactLocator;
pub use types::{ArtifactError, ModelArtifact};
