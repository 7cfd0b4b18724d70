use std::path::PathBuf;

use thiserror::Error;

/// Result alias used throughout the crate.
pub type DatasetResult<T> = Result<T, DatasetError>;

/// Errors raised by dataset construction, derivation, and persistence.
#[derive(Debug, Error)]
pub enum DatasetError {
    /// An indexed dataset was requested without an identity function.
    #[error("an identity function must be specified to index a dataset")]
    MissingIdFn,
    /// Two producers declare the same required field with different descriptors.
    #[error("field `{field}` required by model `{model}` conflicts with an earlier definition")]
    ConflictingField {
        /// Field name present in both specs.
        field: String,
        /// Producer whose definition clashed with the merged schema.
        model: String,
    },
    /// A slice was requested with a step of zero.
    #[error("slice step cannot be zero")]
    ZeroSliceStep,
    /// A concrete loader could not build a dataset from a path.
    #[error("failed to load dataset from {path}: {message}")]
    Loader {
        /// Path handed to the loader.
        path: PathBuf,
        /// Loader-provided reason.
        message: String,
    },
    /// Filesystem I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Serialization failure in the JSON codec.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    /// Malformed glob pattern.
    #[error("invalid glob pattern: {0}")]
    Pattern(#[from] glob::PatternError),
    /// A path matched by a glob could not be read.
    #[error("glob error: {0}")]
    Glob(#[from] glob::GlobError),
}
