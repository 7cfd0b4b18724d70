use crate::{error::DatasetResult, types::Record};

/// Serialization collaborator: record lists to text and back.
///
/// Implementations must round-trip, `deserialize(serialize(x)) == x`.
pub trait RecordCodec: Send + Sync {
    /// Serializes records to text.
    fn serialize(&self, records: &[Record]) -> DatasetResult<String>;

    /// Parses text produced by [`RecordCodec::serialize`].
    fn deserialize(&self, text: &str) -> DatasetResult<Vec<Record>>;
}

/// JSON array codec used for `*.lit.json` files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JsonCodec {
    pretty: bool,
}

impl JsonCodec {
    /// Compact single-line output.
    #[must_use]
    pub const fn compact() -> Self {
        Self { pretty: false }
    }

    /// Indented output.
    #[must_use]
    pub const fn pretty() -> Self {
        Self { pretty: true }
    }
}

impl RecordCodec for JsonCodec {
    fn serialize(&self, records: &[Record]) -> DatasetResult<String> {
        let text = if self.pretty {
            serde_json::to_string_pretty(records)?
        } else {
            serde_json::to_string(records)?
        };
        Ok(text)
    }

    fn deserialize(&self, text: &str) -> DatasetResult<Vec<Record>> {
        Ok(serde_json::from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DatasetError;
    use serde_json::json;

    fn records() -> Vec<Record> {
        let mut first = Record::new();
        first.insert("text".into(), json!("a great movie"));
        first.insert("label".into(), json!("1"));
        let mut second = Record::new();
        second.insert("text".into(), json!("dull"));
        second.insert("scores".into(), json!([0.1, 0.9]));
        vec![first, second]
    }

    #[test]
    fn codec_preserves_records_and_field_order() {
        for codec in [JsonCodec::compact(), JsonCodec::pretty()] {
            let text = codec.serialize(&records()).unwrap();
            let parsed = codec.deserialize(&text).unwrap();
            assert_eq!(parsed, records());
            let keys: Vec<_> = parsed[0].keys().map(String::as_str).collect();
            assert_eq!(keys, ["text", "label"]);
        }
    }

    #[test]
    fn malformed_text_is_a_json_error() {
        let err = JsonCodec::compact().deserialize("[{\"text\": ").unwrap_err();
        assert!(matches!(err, DatasetError::Json(_)));
    }
}
