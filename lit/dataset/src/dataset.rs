use std::{
    fmt,
    ops::{Bound, RangeBounds},
    path::{Path, PathBuf},
    sync::Arc,
};

use chrono::{DateTime, Local};
use rand::{seq::SliceRandom, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde_json::json;
use shared_logging::LogLevel;

use crate::{
    error::DatasetResult,
    slice::SliceSpec,
    storage::{additional_pattern, timestamped_path, with_datapoint_suffix, DatapointStore},
    telemetry::DatasetTelemetry,
    types::{remap_keys, FieldMap, Record, Spec},
};

/// Seed used by [`Dataset::sample`] and [`Dataset::shuffle`].
pub const DEFAULT_SEED: u64 = 42;

const DATASET_DOC: &str = "In-memory collection of typed example records.";

/// Read-only capabilities shared by every dataset variant.
pub trait DatasetView {
    /// Schema describing the records.
    fn schema(&self) -> DatasetResult<Spec>;

    /// Records in canonical order.
    fn records(&self) -> &[Record];

    /// Human-readable description.
    fn describe(&self) -> String;

    /// Number of records.
    fn len(&self) -> usize {
        self.records().len()
    }

    /// Whether the dataset holds no records.
    fn is_empty(&self) -> bool {
        self.records().is_empty()
    }
}

/// Concrete loader behind a root dataset.
///
/// Loaders parse a path into a fresh dataset and may persist records in their
/// own layout next to the generic `*.lit.json` files.
pub trait DatasetSource: Send + Sync {
    /// Builds a new root dataset from `path`.
    fn load_from_path(&self, path: &Path) -> DatasetResult<Dataset>;

    /// Writes `records` in the loader's native format at `path` (no suffix).
    fn save_formatted(&self, _records: &[Record], _path: &Path) -> DatasetResult<()> {
        Ok(())
    }

    /// Built-in description of the loader, used when none was set.
    fn description(&self) -> Option<String> {
        None
    }

    /// Whether `load_from_path` is meaningfully implemented.
    fn can_load_by_path(&self) -> bool {
        true
    }
}

/// Immutable, cheaply clonable dataset.
///
/// Derivations (`slice`, `sample`, `shuffle`, `remap`) never touch `self`; they
/// return a new dataset whose base is `self`.
#[derive(Clone)]
pub struct Dataset {
    inner: Arc<DatasetInner>,
}

struct DatasetInner {
    spec: Arc<Spec>,
    records: Arc<Vec<Record>>,
    description: Option<String>,
    base: Option<Dataset>,
    source: Option<Arc<dyn DatasetSource>>,
    can_load_by_path: bool,
    telemetry: DatasetTelemetry,
}

impl fmt::Debug for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dataset")
            .field("fields", &self.inner.spec.keys().collect::<Vec<_>>())
            .field("records", &self.inner.records.len())
            .field("description", &self.inner.description)
            .field("has_base", &self.inner.base.is_some())
            .field("can_load_by_path", &self.inner.can_load_by_path)
            .finish_non_exhaustive()
    }
}

impl Default for Dataset {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Resolves a dataset field by field against an optional base.
///
/// Unset fields come from the base (or empty defaults for a root). Empty
/// overrides count as unset.
#[derive(Default)]
pub struct DatasetBuilder {
    base: Option<Dataset>,
    spec: Option<Spec>,
    records: Option<Vec<Record>>,
    replace_records: bool,
    description: Option<String>,
    source: Option<Arc<dyn DatasetSource>>,
    telemetry: Option<DatasetTelemetry>,
}

impl DatasetBuilder {
    /// Derives from `base`.
    #[must_use]
    pub fn base(mut self, base: &Dataset) -> Self {
        self.base = Some(base.clone());
        self
    }

    /// Overrides the schema.
    #[must_use]
    pub fn spec(mut self, spec: Spec) -> Self {
        self.spec = Some(spec);
        self
    }

    /// Overrides the records.
    #[must_use]
    pub fn records(mut self, records: Vec<Record>) -> Self {
        self.records = Some(records);
        self
    }

    /// Overrides the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Attaches the loader that backs this dataset.
    #[must_use]
    pub fn source(mut self, source: Arc<dyn DatasetSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Overrides the telemetry handle.
    #[must_use]
    pub fn telemetry(mut self, telemetry: DatasetTelemetry) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    // Derivations set records even when the selection is empty.
    fn exact_records(mut self, records: Vec<Record>) -> Self {
        self.records = Some(records);
        self.replace_records = true;
        self
    }

    /// Resolves every field and freezes the dataset.
    #[must_use]
    pub fn build(self) -> Dataset {
        let (mut spec, mut records, mut description, mut can_load_by_path, mut telemetry) =
            match &self.base {
                Some(base) => (
                    Arc::clone(&base.inner.spec),
                    Arc::clone(&base.inner.records),
                    Some(base.describe()),
                    base.can_load_by_path(),
                    base.telemetry().clone(),
                ),
                None => (
                    Arc::default(),
                    Arc::default(),
                    None,
                    false,
                    DatasetTelemetry::disabled(),
                ),
            };

        if let Some(override_spec) = self.spec.filter(|s| !s.is_empty()) {
            spec = Arc::new(override_spec);
        }
        let replace_records = self.replace_records;
        if let Some(override_records) = self.records.filter(|r| replace_records || !r.is_empty()) {
            records = Arc::new(override_records);
        }
        if let Some(source) = &self.source {
            can_load_by_path = source.can_load_by_path();
            if let Some(text) = source.description().filter(|d| !d.is_empty()) {
                description = Some(text);
            }
        }
        if let Some(text) = self.description.filter(|d| !d.is_empty()) {
            description = Some(text);
        }
        if let Some(handle) = self.telemetry {
            telemetry = handle;
        }

        Dataset {
            inner: Arc::new(DatasetInner {
                spec,
                records,
                description,
                base: self.base,
                source: self.source,
                can_load_by_path,
                telemetry,
            }),
        }
    }
}

impl Dataset {
    /// Starts a builder with nothing set.
    #[must_use]
    pub fn builder() -> DatasetBuilder {
        DatasetBuilder::default()
    }

    /// Root dataset from a schema and records.
    #[must_use]
    pub fn new(spec: Spec, records: Vec<Record>) -> Self {
        Self::builder().spec(spec).records(records).build()
    }

    /// Schema of the records.
    #[must_use]
    pub fn spec(&self) -> &Spec {
        &self.inner.spec
    }

    /// Records in canonical order.
    #[must_use]
    pub fn records(&self) -> &[Record] {
        &self.inner.records
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.records.len()
    }

    /// Whether the dataset holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.records.is_empty()
    }

    /// Resolved description, else the loader's, else the built-in one.
    #[must_use]
    pub fn describe(&self) -> String {
        self.inner
            .description
            .clone()
            .or_else(|| self.inner.source.as_ref().and_then(|s| s.description()))
            .unwrap_or_else(|| DATASET_DOC.to_owned())
    }

    /// Dataset this one was derived from.
    #[must_use]
    pub fn base(&self) -> Option<&Self> {
        self.inner.base.as_ref()
    }

    /// Whether [`Dataset::clone_with_new_path`] can produce a dataset.
    #[must_use]
    pub fn can_load_by_path(&self) -> bool {
        self.inner.can_load_by_path
    }

    /// Telemetry handle, inherited along derivations.
    #[must_use]
    pub fn telemetry(&self) -> &DatasetTelemetry {
        &self.inner.telemetry
    }

    /// Whether both handles point at the same dataset.
    #[must_use]
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }

    /// Loads a new dataset from `path` through the nearest loader.
    ///
    /// Walks the base chain; `Ok(None)` means no dataset in the chain has a
    /// loader.
    pub fn clone_with_new_path(&self, path: &Path) -> DatasetResult<Option<Self>> {
        if let Some(source) = &self.inner.source {
            return source.load_from_path(path).map(Some);
        }
        match &self.inner.base {
            Some(base) => base.clone_with_new_path(path),
            None => Ok(None),
        }
    }

    /// Saves `records` in the nearest loader's native format; no-op without one.
    pub fn save_formatted(&self, records: &[Record], path: &Path) -> DatasetResult<()> {
        if let Some(source) = &self.inner.source {
            return source.save_formatted(records, path);
        }
        match &self.inner.base {
            Some(base) => base.save_formatted(records, path),
            None => Ok(()),
        }
    }

    /// Reads every datapoint file saved for `dataset_name` under `base_path`.
    ///
    /// Records are concatenated in glob order; ordering across files is not
    /// guaranteed.
    pub fn load_additional(
        &self,
        store: &DatapointStore,
        dataset_name: &str,
        base_path: &Path,
    ) -> DatasetResult<Vec<Record>> {
        let pattern = additional_pattern(base_path, dataset_name);
        let files = store.files().glob(&pattern)?;
        let mut records = Vec::new();
        for path in &files {
            let text = store.files().read(path)?;
            records.extend(store.codec().deserialize(&text)?);
        }
        self.telemetry().emit(
            LogLevel::Info,
            "dataset.additional.loaded",
            json!({ "dataset": dataset_name, "files": files.len(), "records": records.len() }),
        );
        Ok(records)
    }

    /// Saves new datapoints under a timestamped name; returns the written path.
    pub fn save_additional(
        &self,
        store: &DatapointStore,
        records: &[Record],
        dataset_name: &str,
        base_path: &Path,
    ) -> DatasetResult<PathBuf> {
        self.save_additional_at(store, records, dataset_name, base_path, Local::now())
    }

    /// [`Dataset::save_additional`] with an explicit timestamp.
    pub fn save_additional_at(
        &self,
        store: &DatapointStore,
        records: &[Record],
        dataset_name: &str,
        base_path: &Path,
        timestamp: DateTime<Local>,
    ) -> DatasetResult<PathBuf> {
        let file_path = timestamped_path(base_path, dataset_name, timestamp);
        self.save_formatted(records, &file_path)?;
        let lit_path = with_datapoint_suffix(&file_path);
        let text = store.codec().serialize(records)?;
        store.files().write(&lit_path, &text)?;
        self.telemetry().emit(
            LogLevel::Info,
            "dataset.additional.saved",
            json!({
                "dataset": dataset_name,
                "records": records.len(),
                "path": lit_path.display().to_string(),
            }),
        );
        Ok(lit_path)
    }

    /// Contiguous subsequence; bounds past the end clamp.
    #[must_use]
    pub fn slice<R: RangeBounds<usize>>(&self, range: R) -> Self {
        let len = self.len();
        let start = match range.start_bound() {
            Bound::Included(&s) => s,
            Bound::Excluded(&s) => s.saturating_add(1),
            Bound::Unbounded => 0,
        }
        .min(len);
        let end = match range.end_bound() {
            Bound::Included(&e) => e.saturating_add(1),
            Bound::Excluded(&e) => e,
            Bound::Unbounded => len,
        }
        .clamp(start, len);
        self.derive("slice", None, self.records()[start..end].to_vec())
    }

    /// Extended slice with negative indices and strides.
    pub fn slice_by(&self, selection: SliceSpec) -> DatasetResult<Self> {
        let records = selection
            .indices(self.len())?
            .into_iter()
            .map(|i| self.inner.records[i].clone())
            .collect();
        Ok(self.derive("slice", None, records))
    }

    /// Random subset of `n` records with the default seed.
    #[must_use]
    pub fn sample(&self, n: usize) -> Self {
        self.sample_with_seed(n, DEFAULT_SEED)
    }

    /// Random subset of `min(n, len)` records, reproducible for a given seed.
    ///
    /// Asking for more records than exist logs a warning and returns every
    /// record.
    #[must_use]
    pub fn sample_with_seed(&self, n: usize, seed: u64) -> Self {
        let available = self.len();
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let records = if n < available {
            self.records()
                .choose_multiple(&mut rng, n)
                .cloned()
                .collect()
        } else {
            if n > available {
                self.telemetry().emit(
                    LogLevel::Warn,
                    "dataset.sample.oversized",
                    json!({ "requested": n, "available": available }),
                );
            }
            let mut all = self.records().to_vec();
            all.shuffle(&mut rng);
            all
        };
        self.derive("sample", None, records)
    }

    /// Random permutation of all records with the default seed.
    #[must_use]
    pub fn shuffle(&self) -> Self {
        self.shuffle_with_seed(DEFAULT_SEED)
    }

    /// Random permutation of all records; the original order is untouched.
    #[must_use]
    pub fn shuffle_with_seed(&self, seed: u64) -> Self {
        self.sample_with_seed(self.len(), seed)
    }

    /// Copy with fields renamed in the schema and in every record.
    #[must_use]
    pub fn remap(&self, field_map: &FieldMap) -> Self {
        let spec = remap_keys(self.spec(), field_map);
        let records = self
            .records()
            .iter()
            .map(|record| remap_keys(record, field_map))
            .collect();
        self.derive("remap", Some(spec), records)
    }

    fn derive(&self, op: &str, spec: Option<Spec>, records: Vec<Record>) -> Self {
        self.telemetry().emit(
            LogLevel::Debug,
            "dataset.derive",
            json!({ "op": op, "records": records.len() }),
        );
        let mut builder = Self::builder().base(self).exact_records(records);
        if let Some(spec) = spec {
            builder = builder.spec(spec);
        }
        builder.build()
    }
}

impl DatasetView for Dataset {
    fn schema(&self) -> DatasetResult<Spec> {
        Ok(self.inner.spec.as_ref().clone())
    }

    fn records(&self) -> &[Record] {
        &self.inner.records
    }

    fn describe(&self) -> String {
        Self::describe(self)
    }
}
