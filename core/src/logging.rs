//! Structured session logs with correlation IDs

use crate::controller::SessionEvent;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use uuid::Uuid;

static REQUEST_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Correlation ID tying log lines to one client session and game
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct CorrelationId {
    /// Unique ID of this log line
    pub request_id: String,
    /// Client session the line belongs to
    pub session_id: String,
    /// Game number within the session, if in a game
    pub game: Option<u32>,
}

impl CorrelationId {
    /// Create a new correlation ID for a request
    pub fn new(session_id: String) -> Self {
        let request_id = format!(
            "{}-{}",
            Uuid::new_v4().simple(),
            REQUEST_COUNTER.fetch_add(1, Ordering::SeqCst)
        );

        Self {
            request_id,
            session_id,
            game: None,
        }
    }

    /// A fresh session ID
    pub fn new_session() -> Self {
        Self::new(Uuid::new_v4().to_string())
    }

    /// Add game context
    pub fn with_game(mut self, game: u32) -> Self {
        self.game = Some(game);
        self
    }

    /// Same session and game under a new request ID
    pub fn next(&self) -> Self {
        let mut next = Self::new(self.session_id.clone());
        next.game = self.game;
        next
    }
}

/// Structured log entry
#[derive(Debug, Serialize)]
pub struct LogEntry {
    /// RFC 3339 timestamp
    pub timestamp: String,
    pub level: String,
    pub component: String,
    pub message: String,
    pub correlation: CorrelationId,
    /// Additional context fields
    #[serde(flatten)]
    pub fields: serde_json::Value,
}

impl LogEntry {
    pub fn new(level: &str, component: &str, message: &str, correlation: CorrelationId) -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            level: level.to_string(),
            component: component.to_string(),
            message: message.to_string(),
            correlation,
            fields: serde_json::json!({}),
        }
    }

    /// Add additional context fields
    pub fn with_fields(mut self, fields: serde_json::Value) -> Self {
        self.fields = fields;
        self
    }
}

/// Structured logger trait
pub trait StructuredLogger: Send + Sync {
    /// Log a structured entry
    fn log(&self, entry: LogEntry);
}

/// Writes each entry as a single JSON line
pub struct JsonLogger<W: Write + Send> {
    out: Mutex<W>,
}

impl JsonLogger<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> JsonLogger<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        match self.out.into_inner() {
            Ok(out) => out,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl<W: Write + Send> StructuredLogger for JsonLogger<W> {
    fn log(&self, entry: LogEntry) {
        let Ok(json) = serde_json::to_string(&entry) else {
            return;
        };
        if let Ok(mut out) = self.out.lock() {
            if let Err(e) = writeln!(out, "{}", json) {
                tracing::warn!("Failed to write log entry: {}", e);
            }
        }
    }
}

/// Logs session events under one correlation context
pub struct SessionLogger {
    inner: Box<dyn StructuredLogger>,
    correlation: CorrelationId,
    component: String,
}

impl SessionLogger {
    pub fn new(inner: Box<dyn StructuredLogger>, correlation: CorrelationId, component: &str) -> Self {
        Self {
            inner,
            correlation,
            component: component.to_string(),
        }
    }

    pub fn correlation(&self) -> &CorrelationId {
        &self.correlation
    }

    /// Log one session event; game starts move the correlation to the new game
    pub fn event(&mut self, event: &SessionEvent) {
        match event {
            SessionEvent::Started { game, .. } | SessionEvent::Restarted { game } => {
                self.correlation.game = Some(*game);
            }
            SessionEvent::Interrupted | SessionEvent::Reset { .. } => {
                self.correlation.game = None;
            }
            _ => {}
        }

        let level = match event {
            SessionEvent::Error { .. } | SessionEvent::SchedulerHalted { .. } => "ERROR",
            SessionEvent::MoveRejected { .. } => "WARN",
            _ => "INFO",
        };
        let mut fields = serde_json::to_value(event).unwrap_or_else(|_| serde_json::json!({}));
        // `message` is taken by the entry itself
        if let Some(map) = fields.as_object_mut() {
            if let Some(detail) = map.remove("message") {
                map.insert("detail".to_string(), detail);
            }
        }
        self.log(level, event.summary(), fields);
    }

    pub fn info(&self, message: &str) {
        self.log("INFO", message, serde_json::json!({}));
    }

    pub fn error(&self, message: &str) {
        self.log("ERROR", message, serde_json::json!({}));
    }

    fn log(&self, level: &str, message: &str, fields: serde_json::Value) {
        let entry = LogEntry::new(level, &self.component, message, self.correlation.next())
            .with_fields(fields);
        self.inner.log(entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ScoreTally, Winner};
    use std::sync::Arc;

    /// Collects entries as JSON values
    #[derive(Default, Clone)]
    struct Capture(Arc<Mutex<Vec<serde_json::Value>>>);

    impl StructuredLogger for Capture {
        fn log(&self, entry: LogEntry) {
            let value = serde_json::to_value(&entry).unwrap();
            self.0.lock().unwrap().push(value);
        }
    }

    #[test]
    fn test_correlation_id_creation() {
        let corr = CorrelationId::new("session123".to_string()).with_game(2);
        assert_eq!(corr.session_id, "session123");
        assert_eq!(corr.game, Some(2));
        assert!(!corr.request_id.is_empty());

        let next = corr.next();
        assert_eq!(next.session_id, corr.session_id);
        assert_eq!(next.game, Some(2));
        assert_ne!(next.request_id, corr.request_id);
    }

    #[test]
    fn test_log_entry_serialization() {
        let corr = CorrelationId::new("test-session".to_string());
        let entry = LogEntry::new("INFO", "controller", "Test message", corr)
            .with_fields(serde_json::json!({"key": "value"}));

        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains("\"level\":\"INFO\""));
        assert!(json.contains("\"component\":\"controller\""));
        assert!(json.contains("\"message\":\"Test message\""));
        assert!(json.contains("\"key\":\"value\""));
    }

    #[test]
    fn json_logger_writes_one_line_per_entry() {
        let logger = JsonLogger::new(Vec::new());
        logger.log(LogEntry::new("INFO", "cli", "one", CorrelationId::new_session()));
        logger.log(LogEntry::new("INFO", "cli", "two", CorrelationId::new_session()));
        let text = String::from_utf8(logger.into_inner()).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert!(text.lines().all(|l| serde_json::from_str::<serde_json::Value>(l).is_ok()));
    }

    #[test]
    fn session_logger_tracks_game_number() {
        let capture = Capture::default();
        let mut logger = SessionLogger::new(
            Box::new(capture.clone()),
            CorrelationId::new("s1".to_string()),
            "session",
        );

        logger.event(&SessionEvent::Restarted { game: 3 });
        logger.event(&SessionEvent::GameEnded {
            winner: Winner::White,
            tally: ScoreTally {
                white: 1,
                black: 0,
                draws: 0,
            },
        });
        logger.event(&SessionEvent::Interrupted);
        logger.event(&SessionEvent::Error {
            message: "backend down".to_string(),
        });

        let entries = capture.0.lock().unwrap();
        assert_eq!(entries.len(), 4);
        assert_eq!(entries[1]["correlation"]["game"], 3);
        assert_eq!(entries[1]["event"], "game_ended");
        assert_eq!(entries[1]["winner"], "white");
        assert_eq!(entries[2]["correlation"]["game"], serde_json::Value::Null);
        assert_eq!(entries[3]["level"], "ERROR");
        assert_eq!(entries[3]["message"], "Error");
        assert_eq!(entries[3]["detail"], "backend down");
    }
}
