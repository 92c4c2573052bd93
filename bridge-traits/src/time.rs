//! Injectable time, tick scheduling and log forwarding.
//!
//! Cache ages, TTL expiry and fade stepping all read time through these
//! traits, so tests drive a manual clock and mock tickers while
//! production binds the system clock and tokio timers.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::error::Result;

/// Source of the current UTC instant.
///
/// ```ignore
/// use bridge_traits::time::Clock;
///
/// fn entry_age(clock: &dyn Clock, created_at: chrono::DateTime<chrono::Utc>) -> i64 {
///     (clock.now() - created_at).num_seconds()
/// }
/// ```
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Seconds since the Unix epoch.
    fn unix_timestamp(&self) -> i64 {
        self.now().timestamp()
    }

    /// Milliseconds since the Unix epoch.
    fn unix_timestamp_millis(&self) -> i64 {
        self.now().timestamp_millis()
    }
}

/// Production clock reading the actual system time.
#[derive(Debug, Clone)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A sequence of timer ticks produced by a [`TickSource`].
#[async_trait]
pub trait Ticker: Send {
    /// Wait for the next tick.
    async fn tick(&mut self);
}

/// Fixed-interval timer factory.
///
/// Stepped algorithms such as the crossfade volume ramp take one of
/// these instead of calling tokio timers directly, which lets tests
/// substitute instant or frozen tickers.
pub trait TickSource: Send + Sync {
    /// Create a ticker firing every `period`.
    fn interval(&self, period: Duration) -> Box<dyn Ticker>;
}

/// Tokio-timer-backed tick source used in production.
#[derive(Debug, Clone, Default)]
pub struct IntervalTickSource;

struct TokioTicker(tokio::time::Interval);

#[async_trait]
impl Ticker for TokioTicker {
    async fn tick(&mut self) {
        self.0.tick().await;
    }
}

impl TickSource for IntervalTickSource {
    fn interval(&self, period: Duration) -> Box<dyn Ticker> {
        let mut interval = tokio::time::interval(period);
        // First tick fires immediately; callers expect one period of delay.
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        interval.reset();
        Box::new(TokioTicker(interval))
    }
}

/// Severity attached to forwarded log entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }
}

/// One structured log record crossing the bridge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub level: LogLevel,
    pub timestamp: DateTime<Utc>,
    /// Module path the record originated from.
    pub target: String,
    pub message: String,
    /// Key/value pairs recorded alongside the message.
    pub fields: HashMap<String, String>,
    /// Span name for correlating related events.
    pub span_id: Option<String>,
}

impl LogEntry {
    pub fn new(level: LogLevel, target: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level,
            timestamp: Utc::now(),
            target: target.into(),
            message: message.into(),
            fields: HashMap::new(),
            span_id: None,
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn with_span_id(mut self, span_id: impl Into<String>) -> Self {
        self.span_id = Some(span_id.into());
        self
    }
}

/// Receives the core's structured logs on the host side.
///
/// Hosts route entries into whatever pipeline they own (OSLog, Logcat,
/// files, a console). Implementations must not persist signed provider
/// URLs or other sensitive query material verbatim; the core redacts
/// known field names before forwarding, the sink is the second line.
#[async_trait]
pub trait LoggerSink: Send + Sync {
    /// Forward one entry to the host logging system.
    async fn log(&self, entry: LogEntry) -> Result<()>;

    /// Flush any buffered entries.
    async fn flush(&self) -> Result<()> {
        Ok(())
    }

    /// Entries below this level are dropped before crossing the bridge.
    fn min_level(&self) -> LogLevel {
        LogLevel::Info
    }
}

/// Stdout sink for development builds and examples.
#[derive(Debug, Clone)]
pub struct ConsoleLogger {
    pub min_level: LogLevel,
}

impl Default for ConsoleLogger {
    fn default() -> Self {
        Self {
            min_level: LogLevel::Info,
        }
    }
}

#[async_trait]
impl LoggerSink for ConsoleLogger {
    async fn log(&self, entry: LogEntry) -> Result<()> {
        if entry.level < self.min_level {
            return Ok(());
        }

        let mut line = format!(
            "[{}] {} {}: {}",
            entry.timestamp.format("%Y-%m-%d %H:%M:%S%.3f"),
            entry.level.as_str(),
            entry.target,
            entry.message
        );
        for (key, value) in &entry.fields {
            line.push_str(&format!(" {}={}", key, value));
        }
        println!("{}", line);
        Ok(())
    }

    fn min_level(&self) -> LogLevel {
        self.min_level
    }
}
