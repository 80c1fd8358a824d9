//
// Copyright (c) The yang-rs Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! Per-context diagnostics.
//!
//! Every context owns its own sink: a log level, an optional callback and the
//! queue of pending errors and warnings. Nothing here is process-global.

use std::borrow::Cow;
use std::sync::Mutex;

use crate::error::{Error, ErrorCode};

/// Severity of a diagnostic.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub enum LogLevel {
    Error,
    Warning,
    Verbose,
    Debug,
}

/// A custom logger attached to a context.
pub trait LogCallback: Send + Sync + 'static {
    fn log<'a>(
        &'a self,
        level: LogLevel,
        msg: Option<Cow<'a, str>>,
        data_path: Option<Cow<'a, str>>,
        schema_path: Option<Cow<'a, str>>,
        line: u64,
    );
}

/// A queued diagnostic.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ErrorRecord {
    pub level: LogLevel,
    pub errcode: ErrorCode,
    pub msg: String,
    pub data_path: Option<String>,
    pub schema_path: Option<String>,
    pub apptag: Option<String>,
    pub line: u64,
}

pub(crate) struct LogSink {
    level: LogLevel,
    callback: Option<Box<dyn LogCallback>>,
    // Oldest first; drained in reverse.
    queue: Mutex<Vec<ErrorRecord>>,
}

/// A logger that logs engine messages using the `log` crate.
#[derive(Debug, Default)]
pub struct DefaultLogger {
    _private: (),
}

// ===== impl LogLevel =====

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warning => "warning",
            LogLevel::Verbose => "verbose",
            LogLevel::Debug => "debug",
        }
    }
}

// ===== impl LogSink =====

impl LogSink {
    pub(crate) fn new() -> LogSink {
        LogSink {
            level: LogLevel::Warning,
            callback: None,
            queue: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn level(&self) -> LogLevel {
        self.level
    }

    pub(crate) fn set_level(&mut self, level: LogLevel) {
        self.level = level;
    }

    pub(crate) fn set_callback(&mut self, callback: Box<dyn LogCallback>) {
        self.callback = Some(callback);
    }

    fn emit(&self, record: &ErrorRecord) {
        if let Some(cb) = &self.callback {
            cb.log(
                record.level,
                Some(Cow::Borrowed(record.msg.as_str())),
                record.data_path.as_deref().map(Cow::Borrowed),
                record.schema_path.as_deref().map(Cow::Borrowed),
                record.line,
            );
        }
    }

    fn push(&self, record: ErrorRecord) {
        if record.level > self.level {
            return;
        }
        self.emit(&record);
        if record.level <= LogLevel::Warning {
            let mut queue = match self.queue.lock() {
                Ok(queue) => queue,
                Err(poisoned) => poisoned.into_inner(),
            };
            queue.push(record);
        }
    }

    /// Record a failing operation and hand the error back.
    pub(crate) fn error(&self, err: Error) -> Error {
        let (schema_path, data_path) = split_path(err.path.as_deref());
        self.push(ErrorRecord {
            level: LogLevel::Error,
            errcode: err.errcode,
            msg: err.to_string(),
            data_path,
            schema_path,
            apptag: err.apptag.clone(),
            line: 0,
        });
        err
    }

    pub(crate) fn warn(&self, msg: impl Into<String>, path: Option<&str>) {
        let (schema_path, data_path) = split_path(path);
        self.push(ErrorRecord {
            level: LogLevel::Warning,
            errcode: ErrorCode::Validation,
            msg: msg.into(),
            data_path,
            schema_path,
            apptag: None,
            line: 0,
        });
    }

    pub(crate) fn verbose(&self, msg: impl Into<String>) {
        self.push(ErrorRecord {
            level: LogLevel::Verbose,
            errcode: ErrorCode::Native,
            msg: msg.into(),
            data_path: None,
            schema_path: None,
            apptag: None,
            line: 0,
        });
    }

    pub(crate) fn debug(&self, msg: impl Into<String>) {
        self.push(ErrorRecord {
            level: LogLevel::Debug,
            errcode: ErrorCode::Native,
            msg: msg.into(),
            data_path: None,
            schema_path: None,
            apptag: None,
            line: 0,
        });
    }

    /// Drain the queue, most recent first.
    pub(crate) fn drain(&self) -> Vec<ErrorRecord> {
        let mut queue = match self.queue.lock() {
            Ok(queue) => queue,
            Err(poisoned) => poisoned.into_inner(),
        };
        let mut records: Vec<ErrorRecord> = queue.drain(..).collect();
        records.reverse();
        records
    }
}

impl std::fmt::Debug for LogSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogSink")
            .field("level", &self.level)
            .field("callback", &self.callback.is_some())
            .finish()
    }
}

// Data paths have predicates or point below a list instance; schema paths
// never carry predicates.
fn split_path(path: Option<&str>) -> (Option<String>, Option<String>) {
    match path {
        Some(path) if path.contains('[') => (None, Some(path.to_owned())),
        Some(path) => (Some(path.to_owned()), None),
        None => (None, None),
    }
}

/// Format drained diagnostics behind a leading message.
pub(crate) fn format_records(msg: &str, records: &[ErrorRecord]) -> String {
    let mut out = msg.to_owned();
    for record in records {
        if !record.msg.is_empty() {
            out.push_str(": ");
            out.push_str(&record.msg);
        }
        if let Some(data_path) = &record.data_path {
            out.push_str(": Data path: ");
            out.push_str(data_path);
        }
        if let Some(schema_path) = &record.schema_path {
            out.push_str(": Schema path: ");
            out.push_str(schema_path);
        }
        if record.line != 0 {
            out.push_str(&format!(" (line {})", record.line));
        }
    }
    out
}

// ===== impl DefaultLogger =====

impl LogCallback for DefaultLogger {
    fn log<'a>(
        &'a self,
        level: LogLevel,
        msg: Option<Cow<'a, str>>,
        data_path: Option<Cow<'a, str>>,
        schema_path: Option<Cow<'a, str>>,
        line: u64,
    ) {
        let level = match level {
            LogLevel::Error => log::Level::Error,
            LogLevel::Warning => log::Level::Warn,
            LogLevel::Verbose => log::Level::Info,
            LogLevel::Debug => log::Level::Debug,
        };
        let msg = msg.unwrap_or_else(|| Cow::from(""));
        log::log! {
            target: "yang_core",
            level,
            "schema_path={schema_path:?}, data_path={data_path:?}, line={line}, msg={msg}",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[derive(Default)]
    struct Capture(Arc<Mutex<Vec<(LogLevel, String)>>>);

    impl LogCallback for Capture {
        fn log<'a>(
            &'a self,
            level: LogLevel,
            msg: Option<Cow<'a, str>>,
            _data_path: Option<Cow<'a, str>>,
            _schema_path: Option<Cow<'a, str>>,
            _line: u64,
        ) {
            self.0
                .lock()
                .unwrap()
                .push((level, msg.unwrap_or_default().into_owned()));
        }
    }

    #[test]
    fn queue_most_recent_first() {
        let sink = LogSink::new();
        sink.error(Error::syntax("first"));
        sink.error(Error::syntax("second"));
        let records = sink.drain();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].msg, "second");
        assert_eq!(records[1].msg, "first");
        assert!(sink.drain().is_empty());
    }

    #[test]
    fn level_filtering() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut sink = LogSink::new();
        sink.set_callback(Box::new(Capture(seen.clone())));
        sink.debug("hidden");
        sink.set_level(LogLevel::Debug);
        sink.debug("shown");
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0], (LogLevel::Debug, "shown".to_owned()));
        // Debug messages are emitted but never queued.
        assert!(sink.drain().is_empty());
    }

    #[test]
    fn format() {
        let sink = LogSink::new();
        sink.error(
            Error::new(ErrorCode::Validation, "Duplicate instance").with_path("/m:c/l[k='1']"),
        );
        let records = sink.drain();
        assert_eq!(
            format_records("failed to validate", &records),
            "failed to validate: Duplicate instance: Data path: /m:c/l[k='1']"
        );
    }
}
