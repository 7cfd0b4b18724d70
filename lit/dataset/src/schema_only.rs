use std::{fmt, sync::Arc};

use indexmap::IndexMap;

use crate::{
    dataset::DatasetView,
    error::{DatasetError, DatasetResult},
    types::{Record, Spec},
};

const SCHEMA_ONLY_DOC: &str = "Empty dataset whose fields are the union of model input specs.";

/// Input and output schema of a model-like producer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelSpec {
    /// Fields the producer consumes.
    pub input: Spec,
    /// Fields the producer emits.
    pub output: Spec,
}

/// Anything that declares the fields it needs as input.
pub trait SpecProducer: Send + Sync {
    /// Current input/output schema.
    fn spec(&self) -> ModelSpec;
}

impl SpecProducer for ModelSpec {
    fn spec(&self) -> ModelSpec {
        self.clone()
    }
}

/// Record-free dataset whose schema is merged from producers on demand.
#[derive(Clone, Default)]
pub struct SchemaOnlyDataset {
    models: IndexMap<String, Arc<dyn SpecProducer>>,
    description: Option<String>,
}

impl fmt::Debug for SchemaOnlyDataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaOnlyDataset")
            .field("models", &self.models.keys().collect::<Vec<_>>())
            .field("description", &self.description)
            .finish()
    }
}

impl SchemaOnlyDataset {
    /// Keeps the named producers; no records are ever loaded.
    #[must_use]
    pub fn new(models: IndexMap<String, Arc<dyn SpecProducer>>) -> Self {
        Self {
            models,
            description: None,
        }
    }

    /// Overrides the built-in description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Producer names in insertion order.
    pub fn model_names(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(String::as_str)
    }

    /// Union of every producer's required input fields.
    ///
    /// Fails when two producers require the same field with different
    /// descriptors. Iteration order only affects field order in the result.
    pub fn spec(&self) -> DatasetResult<Spec> {
        let mut combined = Spec::new();
        for (name, model) in &self.models {
            let required: Spec = model
                .spec()
                .input
                .into_iter()
                .filter(|(_, field)| field.required)
                .collect();
            if let Some(field) = first_conflict(&combined, &required) {
                return Err(DatasetError::ConflictingField {
                    field: field.to_owned(),
                    model: name.clone(),
                });
            }
            combined.extend(required);
        }
        Ok(combined)
    }
}

impl DatasetView for SchemaOnlyDataset {
    fn schema(&self) -> DatasetResult<Spec> {
        self.spec()
    }

    fn records(&self) -> &[Record] {
        &[]
    }

    fn describe(&self) -> String {
        self.description
            .clone()
            .unwrap_or_else(|| SCHEMA_ONLY_DOC.to_owned())
    }
}

/// Whether some key present in both specs maps to different descriptors.
#[must_use]
pub fn has_conflicting_keys(a: &Spec, b: &Spec) -> bool {
    first_conflict(a, b).is_some()
}

fn first_conflict<'a>(a: &'a Spec, b: &Spec) -> Option<&'a str> {
    a.iter()
        .find(|(key, field)| b.get(key.as_str()).is_some_and(|other| other != *field))
        .map(|(key, _)| key.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FieldSpec;
    use serde_json::json;

    fn model(fields: &[(&str, FieldSpec)]) -> Arc<dyn SpecProducer> {
        Arc::new(ModelSpec {
            input: fields
                .iter()
                .map(|(name, field)| ((*name).to_owned(), field.clone()))
                .collect(),
            output: Spec::new(),
        })
    }

    fn models(
        entries: Vec<(&str, Arc<dyn SpecProducer>)>,
    ) -> IndexMap<String, Arc<dyn SpecProducer>> {
        entries
            .into_iter()
            .map(|(name, producer)| (name.to_owned(), producer))
            .collect()
    }

    #[test]
    fn only_required_inputs_are_merged() {
        let text = FieldSpec::new("TextSegment");
        let ds = SchemaOnlyDataset::new(models(vec![
            ("A", model(&[("text", text.clone())])),
            ("B", model(&[("label", FieldSpec::new("CategoryLabel").optional())])),
        ]));
        let spec = ds.spec().unwrap();
        assert_eq!(spec.len(), 1);
        assert_eq!(spec["text"], text);
        assert!(ds.records().is_empty());
        assert!(ds.is_empty());
    }

    #[test]
    fn disjoint_and_identical_fields_merge() {
        let ds = SchemaOnlyDataset::new(models(vec![
            ("A", model(&[("text", FieldSpec::new("TextSegment"))])),
            (
                "B",
                model(&[
                    ("text", FieldSpec::new("TextSegment")),
                    ("premise", FieldSpec::new("TextSegment")),
                ]),
            ),
        ]));
        let spec = ds.spec().unwrap();
        let keys: Vec<_> = spec.keys().map(String::as_str).collect();
        assert_eq!(keys, ["text", "premise"]);
    }

    #[test]
    fn conflicting_descriptors_fail_in_any_order() {
        let vocab_label = FieldSpec::new("CategoryLabel").with_attr("vocab", json!(["0", "1"]));
        let a = model(&[("label", vocab_label)]);
        let b = model(&[("label", FieldSpec::new("Scalar"))]);

        let forward = SchemaOnlyDataset::new(models(vec![("A", a.clone()), ("B", b.clone())]));
        let err = forward.spec().unwrap_err();
        assert!(matches!(
            err,
            DatasetError::ConflictingField { ref field, ref model }
                if field == "label" && model == "B"
        ));

        let backward = SchemaOnlyDataset::new(models(vec![("B", b), ("A", a)]));
        assert!(matches!(
            backward.spec().unwrap_err(),
            DatasetError::ConflictingField { .. }
        ));
    }

    #[test]
    fn optional_fields_never_conflict() {
        let ds = SchemaOnlyDataset::new(models(vec![
            ("A", model(&[("label", FieldSpec::new("CategoryLabel"))])),
            ("B", model(&[("label", FieldSpec::new("Scalar").optional())])),
        ]));
        assert_eq!(ds.spec().unwrap()["label"].kind, "CategoryLabel");
    }

    #[test]
    fn conflict_predicate_compares_shared_keys_only() {
        let mut a = Spec::new();
        a.insert("text".into(), FieldSpec::new("TextSegment"));
        a.insert("label".into(), FieldSpec::new("CategoryLabel"));
        let mut b = Spec::new();
        b.insert("text".into(), FieldSpec::new("TextSegment"));
        b.insert("score".into(), FieldSpec::new("Scalar"));
        assert!(!has_conflicting_keys(&a, &b));
        assert!(!has_conflicting_keys(&b, &a));

        b.insert("label".into(), FieldSpec::new("CategoryLabel").optional());
        assert!(has_conflicting_keys(&a, &b));
        assert!(has_conflicting_keys(&b, &a));
        assert!(!has_conflicting_keys(&a, &Spec::new()));
    }

    #[test]
    fn describes_itself_and_lists_models() {
        let ds = SchemaOnlyDataset::new(models(vec![("A", model(&[]))]));
        assert_eq!(ds.describe(), SCHEMA_ONLY_DOC);
        assert_eq!(ds.model_names().collect::<Vec<_>>(), ["A"]);
        let named = ds.with_description("placeholder for A");
        assert_eq!(named.describe(), "placeholder for A");
        assert!(SchemaOnlyDataset::default().spec().unwrap().is_empty());
    }
}
