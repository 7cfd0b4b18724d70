use std::{
    collections::BTreeMap,
    fmt, fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use chrono::{DateTime, Local};
use parking_lot::RwLock;

use crate::{
    codec::{JsonCodec, RecordCodec},
    config::DatasetConfig,
    error::{DatasetError, DatasetResult},
};

/// Suffix of every persisted datapoint file.
pub const DATAPOINT_SUFFIX: &str = ".lit.json";

/// Filesystem collaborator used by datapoint persistence.
pub trait FileStore: Send + Sync {
    /// Paths matching a glob pattern. Order carries no meaning.
    fn glob(&self, pattern: &str) -> DatasetResult<Vec<PathBuf>>;

    /// Reads a whole file as text.
    fn read(&self, path: &Path) -> DatasetResult<String>;

    /// Replaces the contents of a file.
    fn write(&self, path: &Path, contents: &str) -> DatasetResult<()>;
}

/// [`FileStore`] backed by the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileStore;

impl FileStore for LocalFileStore {
    fn glob(&self, pattern: &str) -> DatasetResult<Vec<PathBuf>> {
        let mut paths = Vec::new();
        for entry in glob::glob(pattern)? {
            paths.push(entry?);
        }
        Ok(paths)
    }

    fn read(&self, path: &Path) -> DatasetResult<String> {
        Ok(fs::read_to_string(path)?)
    }

    fn write(&self, path: &Path, contents: &str) -> DatasetResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, contents)?;
        Ok(())
    }
}

/// In-process [`FileStore`]; paths enumerate in sorted order.
#[derive(Debug, Default)]
pub struct MemoryFileStore {
    files: RwLock<BTreeMap<PathBuf, String>>,
}

impl MemoryFileStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every stored path.
    #[must_use]
    pub fn paths(&self) -> Vec<PathBuf> {
        self.files.read().keys().cloned().collect()
    }
}

impl FileStore for MemoryFileStore {
    fn glob(&self, pattern: &str) -> DatasetResult<Vec<PathBuf>> {
        let pattern = glob::Pattern::new(pattern)?;
        Ok(self
            .files
            .read()
            .keys()
            .filter(|path| pattern.matches_path(path))
            .cloned()
            .collect())
    }

    fn read(&self, path: &Path) -> DatasetResult<String> {
        self.files.read().get(path).cloned().ok_or_else(|| {
            DatasetError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} not found", path.display()),
            ))
        })
    }

    fn write(&self, path: &Path, contents: &str) -> DatasetResult<()> {
        self.files
            .write()
            .insert(path.to_path_buf(), contents.to_owned());
        Ok(())
    }
}

/// Codec plus file store used to load and save additional datapoints.
#[derive(Clone)]
pub struct DatapointStore {
    codec: Arc<dyn RecordCodec>,
    files: Arc<dyn FileStore>,
}

impl fmt::Debug for DatapointStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatapointStore").finish_non_exhaustive()
    }
}

impl DatapointStore {
    /// Bundles explicit collaborators.
    #[must_use]
    pub fn new(codec: Arc<dyn RecordCodec>, files: Arc<dyn FileStore>) -> Self {
        Self { codec, files }
    }

    /// JSON codec over the local filesystem, styled per `config`.
    #[must_use]
    pub fn local(config: &DatasetConfig) -> Self {
        let codec = if config.pretty_json {
            JsonCodec::pretty()
        } else {
            JsonCodec::compact()
        };
        Self::new(Arc::new(codec), Arc::new(LocalFileStore))
    }

    /// Serialization collaborator.
    #[must_use]
    pub fn codec(&self) -> &dyn RecordCodec {
        self.codec.as_ref()
    }

    /// Filesystem collaborator.
    #[must_use]
    pub fn files(&self) -> &dyn FileStore {
        self.files.as_ref()
    }
}

/// Glob matching every saved datapoint file of `dataset_name` under `base_path`.
#[must_use]
pub fn additional_pattern(base_path: &Path, dataset_name: &str) -> String {
    format!(
        "{}*{DATAPOINT_SUFFIX}",
        base_path.join(dataset_name).display()
    )
}

/// Path, without suffix, of a datapoint file saved at `timestamp`.
#[must_use]
pub fn timestamped_path(base_path: &Path, dataset_name: &str, timestamp: DateTime<Local>) -> PathBuf {
    base_path.join(format!(
        "{dataset_name}_{}",
        timestamp.format("%Y%m%d-%H%M%S")
    ))
}

/// Appends [`DATAPOINT_SUFFIX`] to a path.
#[must_use]
pub fn with_datapoint_suffix(path: &Path) -> PathBuf {
    let mut raw = path.as_os_str().to_owned();
    raw.push(DATAPOINT_SUFFIX);
    PathBuf::from(raw)
}
