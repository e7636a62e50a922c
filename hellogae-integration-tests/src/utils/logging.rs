//! Testing utilities to work with logs.
//!
//! The server under test handles requests on its own worker threads, so a
//! thread local subscriber would miss most events. Instead a single global
//! subscriber writes JSON lines into a shared buffer, and tests pick out the
//! events that belong to them, usually by the target of the request that
//! produced them (see [`TracingJsonEvent::in_request`]).

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{
    collections::HashMap,
    io::Write,
    ops::Deref,
    sync::{Arc, Mutex, Once},
};
use tracing_subscriber::{fmt::MakeWriter, layer::SubscriberExt, EnvFilter};

lazy_static! {
    /// Every JSON line written by the global subscriber.
    static ref LOG_BUFFER: Arc<Mutex<Vec<u8>>> = Arc::new(Mutex::new(Vec::new()));
}

/// Guards installation of the global subscriber.
static INSTALL: Once = Once::new();

/// Levels recorded for tests. Per test logging settings can't apply to a
/// global subscriber, so this is fixed.
const TEST_LOG_LEVELS: &str = "info,hellogae_web=debug,hellogae_platform=debug";

/// Helper to collect events emitted by Tracing and later make assertions about
/// the collected events.
#[derive(Default)]
pub struct LogWatcher {
    /// The raw bytes received from Tracing. Should represent new-line separated JSON objects.
    buf: Arc<Mutex<Vec<u8>>>,

    /// Events parsed from [`buf`](Self::buf) by the last call to
    /// [`events`](Self::events).
    events: Vec<TracingJsonEvent>,
}

impl LogWatcher {
    /// A watcher over every event of the process, installing the global
    /// subscriber on first use.
    ///
    /// # Panics
    /// If some other global subscriber was installed first.
    #[must_use]
    pub fn global() -> Self {
        INSTALL.call_once(|| {
            let subscriber = tracing_subscriber::registry()
                .with(EnvFilter::new(TEST_LOG_LEVELS))
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_current_span(true)
                        .with_span_list(true)
                        .with_writer(LogWatcherWriter {
                            buf: LOG_BUFFER.clone(),
                        }),
                );
            tracing::subscriber::set_global_default(subscriber)
                .expect("no other global subscriber should be installed");
        });
        Self {
            buf: LOG_BUFFER.clone(),
            events: Vec::new(),
        }
    }

    /// Make a new LogWatcher with some events pre-populated. Primarily for testing LogWatcher itself.
    #[must_use]
    pub fn with_events(events: Vec<TracingJsonEvent>) -> Self {
        Self {
            events,
            buf: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Iterate over the events collected so far by this log watcher.
    pub fn events(&mut self) -> std::slice::Iter<TracingJsonEvent> {
        self.convert_events();
        self.events.iter()
    }

    /// Test if any event this logger received matches `predicate`.
    #[must_use = "LogWatcher::has does not make assertions alone, you probably want to wrap it in assert!()"]
    pub fn has<F>(&mut self, predicate: F) -> bool
    where
        F: FnMut(&TracingJsonEvent) -> bool,
    {
        self.events().any(predicate)
    }

    /// Parse every complete line in the shared buffer. The buffer is left in
    /// place since other tests read it too. Events given to
    /// [`with_events`](Self::with_events) are kept if the buffer is empty.
    fn convert_events(&mut self) {
        let buf = self.buf.lock().expect("mutex was poisoned");
        let Some(end) = buf.iter().rposition(|&byte| byte == b'\n') else {
            return;
        };
        let log_text = std::str::from_utf8(&buf[..end]).expect("bad utf8");

        self.events = log_text
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                serde_json::from_str(line)
                    .unwrap_or_else(|_| panic!("Bad JSON in log line: {}", line))
            })
            .collect();
    }
}

/// A helper that collects log events emitted from Tracing.
///
/// This is needed because Tracing consumes its subscribers. This type is
/// handed to Tracing, and the data is written back to the shared buffer the
/// [`LogWatcher`]s read.
#[derive(Clone)]
pub struct LogWatcherWriter {
    /// The shared buffer.
    buf: Arc<Mutex<Vec<u8>>>,
}

impl<'a> MakeWriter<'a> for LogWatcherWriter {
    type Writer = LogWatcherWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

impl Write for LogWatcherWriter {
    fn write(&mut self, new_bytes: &[u8]) -> std::io::Result<usize> {
        let mut buf = self
            .buf
            .lock()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
        buf.extend(new_bytes.iter());
        Ok(new_bytes.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// A deserialization of [`tracing_subscriber::fmt::format::Json`]'s output format.
#[derive(Debug, Deserialize, Serialize)]
pub struct TracingJsonEvent {
    /// The key-value fields logged on the event, usually including `message`.
    pub fields: HashMap<String, Value>,
    /// The level the event was emitted at, like `INFO`.
    pub level: String,
    /// The target of the event.
    pub target: String,
    /// The time the event was emitted.
    pub timestamp: String,
    /// The spans the event was emitted in, from the root outwards, with their
    /// fields.
    #[serde(default)]
    pub spans: Vec<HashMap<String, Value>>,
}

impl TracingJsonEvent {
    /// Test if the field named `field_name` is a string that contains `pat` as a
    /// substring.
    pub fn field_contains<'a, S>(&'a self, field_name: &'a str, pat: S) -> bool
    where
        S: Deref<Target = str>,
    {
        self.fields
            .get(field_name)
            .and_then(serde_json::Value::as_str)
            .map_or(false, |value| value.contains(&*pat))
    }

    /// Test if the event happened while handling a request for `target`, a
    /// path with its query string.
    pub fn in_request(&self, target: &str) -> bool {
        self.spans.iter().any(|span| {
            span.get("http.target").and_then(Value::as_str) == Some(target)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{LogWatcher, TracingJsonEvent};
    use serde_json::json;
    use std::collections::HashMap;

    #[test]
    fn test_prepopulated_events() {
        let mut fields = HashMap::new();
        fields.insert("message".to_string(), json!("Request success"));
        let mut span = HashMap::new();
        span.insert("http.target".to_string(), json!("/?case=prepopulated"));
        let mut log_watcher = LogWatcher::with_events(vec![TracingJsonEvent {
            fields,
            level: "INFO".to_string(),
            target: "hellogae_web::logging".to_string(),
            timestamp: String::new(),
            spans: vec![span],
        }]);

        assert!(log_watcher.has(|event| event.field_contains("message", "success")
            && event.in_request("/?case=prepopulated")));
        assert!(!log_watcher.has(|event| event.in_request("/")));
    }
}
