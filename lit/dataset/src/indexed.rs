use std::{fmt, sync::Arc};

use indexmap::IndexMap;
use serde_json::json;
use shared_logging::LogLevel;

use crate::{
    dataset::{Dataset, DatasetBuilder, DatasetView},
    error::{DatasetError, DatasetResult},
    telemetry::DatasetTelemetry,
    types::{ExampleId, IndexedRecord, Record, Spec},
};

/// Identity function: must be pure and deterministic.
pub type IdFn = Arc<dyn Fn(&Record) -> ExampleId + Send + Sync>;

/// Dataset wrapper that assigns every record an identity.
///
/// The index is built once at construction. If two records share an id, the
/// later record wins the index entry; both stay in
/// [`IndexedDataset::indexed_records`].
#[derive(Clone)]
pub struct IndexedDataset {
    dataset: Dataset,
    id_fn: IdFn,
    indexed: Arc<[IndexedRecord]>,
    index: Arc<IndexMap<ExampleId, usize>>,
}

impl fmt::Debug for IndexedDataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexedDataset")
            .field("dataset", &self.dataset)
            .field("unique_ids", &self.index.len())
            .finish_non_exhaustive()
    }
}

impl IndexedDataset {
    /// Indexes every record of `dataset` with `id_fn`.
    #[must_use]
    pub fn new(dataset: Dataset, id_fn: IdFn) -> Self {
        let indexed: Arc<[IndexedRecord]> = index_with(&id_fn, dataset.records()).into();
        let mut index = IndexMap::with_capacity(indexed.len());
        for (pos, record) in indexed.iter().enumerate() {
            index.insert(record.id.clone(), pos);
        }
        report_index(dataset.telemetry(), indexed.len(), index.len());
        Self {
            dataset,
            id_fn,
            indexed,
            index: Arc::new(index),
        }
    }

    /// Starts a builder; `build` fails without an identity function.
    #[must_use]
    pub fn builder() -> IndexedDatasetBuilder {
        IndexedDatasetBuilder::default()
    }

    /// Indexes every dataset of a named collection with the same function.
    #[must_use]
    pub fn index_all<'a, I>(datasets: I, id_fn: &IdFn) -> IndexMap<String, Self>
    where
        I: IntoIterator<Item = (&'a String, &'a Dataset)>,
    {
        datasets
            .into_iter()
            .map(|(name, dataset)| (name.clone(), Self::index_single(dataset, id_fn)))
            .collect()
    }

    /// Indexes one dataset, keeping it as the base of the result.
    #[must_use]
    pub fn index_single(dataset: &Dataset, id_fn: &IdFn) -> Self {
        let wrapped = Dataset::builder().base(dataset).build();
        Self::new(wrapped, Arc::clone(id_fn))
    }

    /// Pairs records outside this dataset with ids from the same function.
    #[must_use]
    pub fn index_records(&self, records: &[Record]) -> Vec<IndexedRecord> {
        index_with(&self.id_fn, records)
    }

    /// Identity of one record.
    #[must_use]
    pub fn id_of(&self, record: &Record) -> ExampleId {
        (self.id_fn)(record)
    }

    /// Records with ids, in dataset order.
    #[must_use]
    pub fn indexed_records(&self) -> &[IndexedRecord] {
        &self.indexed
    }

    /// Read-only view of the id to record mapping.
    #[must_use]
    pub fn index(&self) -> IndexView<'_> {
        IndexView {
            index: &self.index,
            records: &self.indexed,
        }
    }

    /// Wrapped dataset, for derivations and persistence.
    #[must_use]
    pub const fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    /// Schema of the wrapped dataset.
    #[must_use]
    pub fn spec(&self) -> &Spec {
        self.dataset.spec()
    }

    /// Identity function used to build the index.
    #[must_use]
    pub fn id_fn(&self) -> &IdFn {
        &self.id_fn
    }
}

impl DatasetView for IndexedDataset {
    fn schema(&self) -> DatasetResult<Spec> {
        Ok(self.dataset.spec().clone())
    }

    fn records(&self) -> &[Record] {
        self.dataset.records()
    }

    fn describe(&self) -> String {
        self.dataset.describe()
    }
}

/// Non-mutating accessor over an [`IndexedDataset`]'s index.
#[derive(Debug, Clone, Copy)]
pub struct IndexView<'a> {
    index: &'a IndexMap<ExampleId, usize>,
    records: &'a [IndexedRecord],
}

impl<'a> IndexView<'a> {
    /// Entry for `id`.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&'a IndexedRecord> {
        self.index.get(id).map(|&pos| &self.records[pos])
    }

    /// Whether `id` is indexed.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Number of distinct ids.
    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Whether nothing is indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Distinct ids in order of first appearance.
    pub fn ids(&self) -> impl Iterator<Item = &'a ExampleId> + 'a {
        self.index.keys()
    }

    /// Entries in order of first appearance of each id.
    pub fn iter(&self) -> impl Iterator<Item = (&'a ExampleId, &'a IndexedRecord)> + 'a {
        let records = self.records;
        self.index.iter().map(move |(id, &pos)| (id, &records[pos]))
    }
}

/// Builder mirroring [`DatasetBuilder`] plus the identity function.
#[derive(Default)]
pub struct IndexedDatasetBuilder {
    dataset: DatasetBuilder,
    id_fn: Option<IdFn>,
}

impl IndexedDatasetBuilder {
    /// Derives from `base`.
    #[must_use]
    pub fn base(mut self, base: &Dataset) -> Self {
        self.dataset = self.dataset.base(base);
        self
    }

    /// Overrides the schema.
    #[must_use]
    pub fn spec(mut self, spec: Spec) -> Self {
        self.dataset = self.dataset.spec(spec);
        self
    }

    /// Overrides the records.
    #[must_use]
    pub fn records(mut self, records: Vec<Record>) -> Self {
        self.dataset = self.dataset.records(records);
        self
    }

    /// Overrides the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.dataset = self.dataset.description(description);
        self
    }

    /// Overrides the telemetry handle.
    #[must_use]
    pub fn telemetry(mut self, telemetry: DatasetTelemetry) -> Self {
        self.dataset = self.dataset.telemetry(telemetry);
        self
    }

    /// Sets the identity function.
    #[must_use]
    pub fn id_fn(mut self, id_fn: IdFn) -> Self {
        self.id_fn = Some(id_fn);
        self
    }

    /// Builds the dataset and its index.
    pub fn build(self) -> DatasetResult<IndexedDataset> {
        let id_fn = self.id_fn.ok_or(DatasetError::MissingIdFn)?;
        Ok(IndexedDataset::new(self.dataset.build(), id_fn))
    }
}

fn index_with(id_fn: &IdFn, records: &[Record]) -> Vec<IndexedRecord> {
    records
        .iter()
        .map(|record| IndexedRecord::new(record.clone(), id_fn(record)))
        .collect()
}

fn report_index(telemetry: &DatasetTelemetry, records: usize, unique_ids: usize) {
    telemetry.emit(
        LogLevel::Debug,
        "dataset.index.built",
        json!({ "records": records, "unique_ids": unique_ids }),
    );
    if unique_ids < records {
        telemetry.emit(
            LogLevel::Warn,
            "dataset.index.collisions",
            json!({ "overwritten": records - unique_ids }),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{content_id, FieldSpec};
    use serde_json::json;

    fn rec(text: &str, label: &str) -> Record {
        let mut record = Record::new();
        record.insert("text".into(), json!(text));
        record.insert("label".into(), json!(label));
        record
    }

    fn base() -> Dataset {
        let mut spec = Spec::new();
        spec.insert("text".into(), FieldSpec::new("TextSegment"));
        spec.insert("label".into(), FieldSpec::new("CategoryLabel"));
        Dataset::builder()
            .spec(spec)
            .records(vec![rec("a", "0"), rec("b", "1"), rec("c", "0")])
            .description("letters")
            .build()
    }

    fn by_text() -> IdFn {
        Arc::new(|record: &Record| ExampleId::new(record["text"].as_str().unwrap_or_default()))
    }

    fn by_label() -> IdFn {
        Arc::new(|record: &Record| ExampleId::new(record["label"].as_str().unwrap_or_default()))
    }

    #[test]
    fn index_covers_every_record() {
        let ds = base();
        let indexed = IndexedDataset::index_single(&ds, &by_text());
        let index = indexed.index();
        assert_eq!(index.len(), ds.len());
        for record in ds.records() {
            let id = indexed.id_of(record);
            assert_eq!(&index.get(id.as_str()).unwrap().data, record);
        }
        assert!(index.contains("b"));
        assert!(!index.contains("z"));
        assert!(indexed.indexed_records().iter().all(|r| r.meta.is_empty()));
        let ids: Vec<_> = index.ids().map(ExampleId::as_str).collect();
        assert_eq!(ids, ["a", "b", "c"]);
    }

    #[test]
    fn colliding_ids_keep_the_later_record() {
        let indexed = IndexedDataset::index_single(&base(), &by_label());
        let index = indexed.index();
        assert_eq!(index.len(), 2);
        assert_eq!(index.get("0").unwrap().data, rec("c", "0"));
        assert_eq!(index.get("1").unwrap().data, rec("b", "1"));
        assert_eq!(indexed.indexed_records().len(), 3);
        let ids: Vec<_> = index.iter().map(|(id, r)| (id.as_str(), r.id.as_str())).collect();
        assert_eq!(ids, [("0", "0"), ("1", "1")]);
    }

    #[test]
    fn builder_requires_identity_function() {
        let err = IndexedDataset::builder().base(&base()).build().unwrap_err();
        assert!(matches!(err, DatasetError::MissingIdFn));

        let indexed = IndexedDataset::builder()
            .base(&base())
            .records(vec![rec("x", "1")])
            .id_fn(Arc::new(content_id))
            .build()
            .unwrap();
        assert_eq!(indexed.len(), 1);
        assert_eq!(indexed.describe(), "letters");
        assert_eq!(indexed.spec().len(), 2);
        assert!(indexed.index().contains(content_id(&rec("x", "1")).as_str()));
    }

    #[test]
    fn index_single_keeps_source_dataset_as_base() {
        let ds = base();
        let indexed = IndexedDataset::index_single(&ds, &by_text());
        let wrapped_base = indexed.dataset().base().unwrap();
        assert!(Dataset::ptr_eq(wrapped_base, &ds));
        assert_eq!(indexed.schema().unwrap(), *ds.spec());
    }

    #[test]
    fn index_all_converts_every_named_dataset() {
        let mut datasets = IndexMap::new();
        datasets.insert("train".to_string(), base());
        datasets.insert("dev".to_string(), base().slice(..1));
        let indexed = IndexedDataset::index_all(&datasets, &by_text());
        let names: Vec<_> = indexed.keys().map(String::as_str).collect();
        assert_eq!(names, ["train", "dev"]);
        assert_eq!(indexed["dev"].index().len(), 1);
        assert_eq!(indexed["train"].index().len(), 3);
    }

    #[test]
    fn index_records_uses_same_identity_and_leaves_index_untouched() {
        let indexed = IndexedDataset::index_single(&base(), &by_text());
        let fresh = indexed.index_records(&[rec("d", "1")]);
        assert_eq!(fresh[0].id, ExampleId::new("d"));
        let annotated = fresh[0].clone().with_meta("added", json!(true));
        assert_eq!(annotated.meta["added"], json!(true));
        assert!(!indexed.index().contains("d"));
    }

    #[test]
    fn derivations_of_wrapped_dataset_are_plain_datasets() {
        let indexed = IndexedDataset::index_single(&base(), &by_text());
        let sampled = indexed.dataset().sample(2);
        assert_eq!(sampled.len(), 2);
        let reindexed = IndexedDataset::index_single(&sampled, indexed.id_fn());
        assert_eq!(reindexed.index().len(), 2);
    }
}
