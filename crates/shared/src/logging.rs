use std::sync::{Arc, Mutex};

/// Logging capability handed to every component explicitly.
///
/// Components never reach for a process-wide logger; whoever builds them
/// decides where records go.
pub trait LogSink: Send + Sync {
    fn info(&self, message: &str);
    fn warn(&self, message: &str);
    fn error(&self, message: &str);
    fn debug(&self, message: &str);
}

/// Forwards records to the `log` facade under a fixed target, so the
/// subscriber installed by the binary decides formatting and destinations.
#[derive(Debug, Clone)]
pub struct LogCrateSink {
    target: String,
}

impl LogCrateSink {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
        }
    }

    pub fn shared(target: impl Into<String>) -> Arc<dyn LogSink> {
        Arc::new(Self::new(target))
    }
}

impl LogSink for LogCrateSink {
    fn info(&self, message: &str) {
        log::info!(target: &self.target, "{message}");
    }

    fn warn(&self, message: &str) {
        log::warn!(target: &self.target, "{message}");
    }

    fn error(&self, message: &str) {
        log::error!(target: &self.target, "{message}");
    }

    fn debug(&self, message: &str) {
        log::debug!(target: &self.target, "{message}");
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub level: LogLevel,
    pub message: String,
}

/// Sink that keeps every record in memory. Used by tests to assert on what
/// a component reported.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<LogRecord>>,
}

impl MemorySink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn records(&self) -> Vec<LogRecord> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }

    pub fn messages_at(&self, level: LogLevel) -> Vec<String> {
        self.records()
            .into_iter()
            .filter(|record| record.level == level)
            .map(|record| record.message)
            .collect()
    }

    fn push(&self, level: LogLevel, message: &str) {
        if let Ok(mut records) = self.records.lock() {
            records.push(LogRecord {
                level,
                message: message.to_string(),
            });
        }
    }
}

impl LogSink for MemorySink {
    fn info(&self, message: &str) {
        self.push(LogLevel::Info, message);
    }

    fn warn(&self, message: &str) {
        self.push(LogLevel::Warn, message);
    }

    fn error(&self, message: &str) {
        self.push(LogLevel::Error, message);
    }

    fn debug(&self, message: &str) {
        self.push(LogLevel::Debug, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_sink_keeps_order_and_level() {
        let sink = MemorySink::new();
        sink.info("first");
        sink.warn("second");
        sink.info("third");

        let records = sink.records();
        assert_eq!(records.len(), 3);
        assert_eq!(records[1].level, LogLevel::Warn);
        assert_eq!(sink.messages_at(LogLevel::Info), vec!["first", "third"]);
    }
}
