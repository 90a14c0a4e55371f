use std::{fmt, path::PathBuf, sync::Arc};

use anyhow::Result;
use serde_json::Value;
use shared_logging::{JsonLogger, LevelFilter, LogLevel, LogRecord, LogSink};

/// Builder configuring telemetry for discovery workflows.
pub struct LibraryTelemetryBuilder {
    module: String,
    log_path: Option<PathBuf>,
    sink: Option<Arc<dyn LogSink>>,
    min_level: LogLevel,
}

impl LibraryTelemetryBuilder {
    /// Creates a new builder.
    #[must_use]
    pub fn new(module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            log_path: None,
            sink: None,
            min_level: LogLevel::Debug,
        }
    }

    /// Sets the JSON log path.
    #[must_use]
    pub fn log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_path = Some(path.into());
        self
    }

    /// Adds an extra sink, written after the JSON log.
    #[must_use]
    pub fn sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Drops records below `level`.
    #[must_use]
    pub fn min_level(mut self, level: LogLevel) -> Self {
        self.min_level = level;
        self
    }

    /// Finalizes the builder.
    pub fn build(self) -> Result<LibraryTelemetry> {
        let mut sinks: Vec<LevelFilter> = Vec::new();
        if let Some(path) = self.log_path {
            let logger: Arc<dyn LogSink> = Arc::new(JsonLogger::new(path)?);
            sinks.push(LevelFilter::new(self.min_level, logger));
        }
        if let Some(sink) = self.sink {
            sinks.push(LevelFilter::new(self.min_level, sink));
        }
        Ok(LibraryTelemetry {
            inner: Arc::new(TelemetryInner {
                module: self.module,
                sinks,
            }),
        })
    }
}

/// Telemetry handle for discovery workflows.
#[derive(Clone)]
pub struct LibraryTelemetry {
    inner: Arc<TelemetryInner>,
}

impl fmt::Debug for LibraryTelemetry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LibraryTelemetry")
            .field("module", &self.inner.module)
            .field("sinks", &self.inner.sinks.len())
            .finish()
    }
}

struct TelemetryInner {
    module: String,
    sinks: Vec<LevelFilter>,
}

impl LibraryTelemetry {
    /// Returns a builder for this telemetry helper.
    #[must_use]
    pub fn builder(module: impl Into<String>) -> LibraryTelemetryBuilder {
        LibraryTelemetryBuilder::new(module)
    }

    /// Module name stamped on every record.
    #[must_use]
    pub fn module(&self) -> &str {
        &self.inner.module
    }

    /// Logs a structured record to every sink.
    pub fn log(&self, level: LogLevel, message: &str, metadata: Value) -> Result<()> {
        if self.inner.sinks.is_empty() {
            return Ok(());
        }
        let record = LogRecord::new(&self.inner.module, level, message).with_fields(&metadata);
        for sink in &self.inner.sinks {
            sink.write(&record)?;
        }
        Ok(())
    }
}
