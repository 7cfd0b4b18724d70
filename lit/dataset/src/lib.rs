#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

//! Immutable, composable in-memory datasets for feeding typed example records
//! to models and analysis tools.
//!
//! A [`Dataset`] is never mutated: slicing, sampling, shuffling and renaming
//! fields produce new datasets that keep a handle on their base. An
//! [`IndexedDataset`] adds a stable identity per record, and a
//! [`SchemaOnlyDataset`] synthesizes a schema from model requirements when no
//! data exists yet.

/// Settings loaded from TOML.
pub mod config;
/// Record list serialization.
pub mod codec;
/// Base dataset and its derivations.
pub mod dataset;
/// Error type shared by the crate.
pub mod error;
/// Identity indexing on top of a dataset.
pub mod indexed;
/// Schema merged from model requirements.
pub mod schema_only;
/// Extended slice selection.
pub mod slice;
/// Filesystem collaborators and datapoint file naming.
pub mod storage;
/// Structured logging for dataset operations.
pub mod telemetry;
/// Records, schemas and identities.
pub mod types;

pub use codec::{JsonCodec, RecordCodec};
pub use config::DatasetConfig;
pub use dataset::{Dataset, DatasetBuilder, DatasetSource, DatasetView, DEFAULT_SEED};
pub use error::{DatasetError, DatasetResult};
pub use indexed::{IdFn, IndexView, IndexedDataset, IndexedDatasetBuilder};
pub use schema_only::{has_conflicting_keys, ModelSpec, SchemaOnlyDataset, SpecProducer};
pub use slice::SliceSpec;
pub use storage::{DatapointStore, FileStore, LocalFileStore, MemoryFileStore, DATAPOINT_SUFFIX};
pub use telemetry::{DatasetTelemetry, DatasetTelemetryBuilder};
pub use types::{
    content_id, record_from_json, remap_keys, ExampleId, FieldMap, FieldSpec, IndexedRecord,
    Record, Spec,
};
