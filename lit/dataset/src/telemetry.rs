use std::{fmt, path::PathBuf, sync::Arc};

use anyhow::Result;
use serde_json::Value;
use shared_logging::{JsonLogger, LogLevel, LogRecord};

use crate::config::DatasetConfig;

/// Builder configuring telemetry for dataset operations.
pub struct DatasetTelemetryBuilder {
    module: String,
    log_path: Option<PathBuf>,
    min_level: LogLevel,
}

impl DatasetTelemetryBuilder {
    /// Creates a new builder.
    #[must_use]
    pub fn new(module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            log_path: None,
            min_level: LogLevel::Debug,
        }
    }

    /// Sets the JSON log path.
    #[must_use]
    pub fn log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_path = Some(path.into());
        self
    }

    /// Drops file records below `level`.
    #[must_use]
    pub const fn min_level(mut self, level: LogLevel) -> Self {
        self.min_level = level;
        self
    }

    /// Finalizes the builder, opening the log file if one was configured.
    pub fn build(self) -> Result<DatasetTelemetry> {
        let logger = match self.log_path {
            Some(path) => Some(JsonLogger::with_min_level(path, self.min_level)?),
            None => None,
        };
        Ok(DatasetTelemetry {
            inner: Arc::new(TelemetryInner {
                module: self.module,
                logger,
            }),
        })
    }
}

/// Telemetry handle shared by a dataset and everything derived from it.
///
/// Every record goes to `tracing`; records are also appended to a JSON-lines
/// file when a log path was configured.
#[derive(Clone)]
pub struct DatasetTelemetry {
    inner: Arc<TelemetryInner>,
}

struct TelemetryInner {
    module: String,
    logger: Option<JsonLogger>,
}

impl fmt::Debug for DatasetTelemetry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatasetTelemetry")
            .field("module", &self.inner.module)
            .field(
                "log_path",
                &self.inner.logger.as_ref().map(JsonLogger::path),
            )
            .finish()
    }
}

impl Default for DatasetTelemetry {
    fn default() -> Self {
        Self::disabled()
    }
}

impl DatasetTelemetry {
    /// Returns a builder for this telemetry helper.
    #[must_use]
    pub fn builder(module: impl Into<String>) -> DatasetTelemetryBuilder {
        DatasetTelemetryBuilder::new(module)
    }

    /// Telemetry that only forwards to `tracing`.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            inner: Arc::new(TelemetryInner {
                module: "dataset".into(),
                logger: None,
            }),
        }
    }

    /// Builds telemetry from the logging section of a config.
    pub fn from_config(module: impl Into<String>, config: &DatasetConfig) -> Result<Self> {
        let mut builder = Self::builder(module).min_level(config.log_level);
        if let Some(path) = &config.log_path {
            builder = builder.log_path(path);
        }
        builder.build()
    }

    /// Module name stamped on every record.
    #[must_use]
    pub fn module(&self) -> &str {
        &self.inner.module
    }

    /// Logs a structured record.
    pub fn log(&self, level: LogLevel, message: &str, metadata: Value) -> Result<()> {
        let module = self.inner.module.as_str();
        match level {
            LogLevel::Debug => tracing::debug!(module, %metadata, "{message}"),
            LogLevel::Info => tracing::info!(module, %metadata, "{message}"),
            LogLevel::Warn => tracing::warn!(module, %metadata, "{message}"),
            LogLevel::Error => tracing::error!(module, %metadata, "{message}"),
        }
        if let Some(logger) = &self.inner.logger {
            let mut record = LogRecord::new(module, level, message);
            if let Value::Object(obj) = metadata {
                record.metadata = obj;
            }
            logger.log(&record)?;
        }
        Ok(())
    }

    /// Logs a record, reporting file-sink failures through `tracing` only.
    ///
    /// Dataset operations call this so that a broken log file never fails a
    /// derivation.
    pub(crate) fn emit(&self, level: LogLevel, message: &str, metadata: Value) {
        if let Err(err) = self.log(level, message, metadata) {
            tracing::error!(module = self.module(), "telemetry write failed: {err:?}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use shared_logging::read_records;
    use tempfile::tempdir;

    #[test]
    fn telemetry_writes_structured_records() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("dataset.log");
        let telemetry = DatasetTelemetry::builder("dataset")
            .log_path(&log_path)
            .build()
            .unwrap();
        telemetry
            .log(LogLevel::Info, "dataset.test", json!({ "records": 2 }))
            .unwrap();
        let records = read_records(&log_path).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].module, "dataset");
        assert_eq!(records[0].metadata["records"], json!(2));
    }

    #[test]
    fn config_level_filters_file_output() {
        let dir = tempdir().unwrap();
        let config = DatasetConfig {
            log_path: Some(dir.path().join("filtered.log")),
            log_level: LogLevel::Warn,
            ..DatasetConfig::default()
        };
        let telemetry = DatasetTelemetry::from_config("dataset", &config).unwrap();
        telemetry.emit(LogLevel::Debug, "dataset.derive", json!({}));
        telemetry.emit(LogLevel::Warn, "dataset.sample.oversized", json!({}));
        let records = read_records(config.log_path.unwrap()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].message, "dataset.sample.oversized");
    }

    #[test]
    fn disabled_telemetry_accepts_records() {
        let telemetry = DatasetTelemetry::disabled();
        assert!(telemetry
            .log(LogLevel::Warn, "dataset.test", json!({ "ok": true }))
            .is_ok());
    }
}
