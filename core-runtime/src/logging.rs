//! Structured logging built on `tracing` and `tracing-subscriber`.
//!
//! One [`init_logging`] call wires up the whole stack: an [`EnvFilter`]
//! derived from [`LoggingConfig`], a formatting layer in one of three
//! output shapes, and an optional mirror layer that forwards every
//! surviving event to a host [`LoggerSink`] (`os_log`, Logcat, a test
//! collector). Resolved stream URLs carry signed query material, so the
//! module also ships the [`redact_if_sensitive`] and [`strip_path`]
//! helpers call sites use before logging URLs or blob paths.
//!
//! ```ignore
//! use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
//! use bridge_traits::time::LogLevel;
//!
//! init_logging(
//!     LoggingConfig::default()
//!         .with_format(LogFormat::Compact)
//!         .with_level(LogLevel::Debug),
//! )?;
//! tracing::info!(tier = "warm", "cache primed");
//! ```

use crate::error::{Error, Result};

use bridge_traits::time::{LogEntry, LogLevel, LoggerSink};

use std::collections::HashMap;
use std::fmt;
use std::io;
use std::sync::Arc;

use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::{
    filter::EnvFilter,
    fmt::format::FmtSpan,
    layer::{Context, SubscriberExt},
    registry::LookupSpan,
    util::SubscriberInitExt,
    Layer,
};

/// Shape of the formatted log output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Multi-line human-readable output with colors.
    Pretty,
    /// One JSON object per event, fields flattened.
    Json,
    /// Single-line text output.
    Compact,
}

impl Default for LogFormat {
    fn default() -> Self {
        #[cfg(debug_assertions)]
        return Self::Pretty;

        #[cfg(not(debug_assertions))]
        return Self::Json;
    }
}

/// Logging configuration consumed once by [`init_logging`].
#[derive(Clone)]
pub struct LoggingConfig {
    pub format: LogFormat,
    /// Level applied to the workspace crates; dependencies stay at warn.
    pub level: LogLevel,
    /// Redact signed URLs and secret-bearing fields.
    pub redact_sensitive: bool,
    /// Full filter directive, overriding the derived one
    /// (e.g. `"core_playback=trace,bridge_desktop=debug"`).
    pub filter: Option<String>,
    /// Host sink every surviving event is mirrored to.
    pub logger_sink: Option<Arc<dyn LoggerSink>>,
    /// Emit span enter/exit events alongside regular events.
    pub enable_spans: bool,
    pub display_target: bool,
    pub display_thread_info: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            level: LogLevel::Info,
            redact_sensitive: true,
            filter: None,
            logger_sink: None,
            enable_spans: true,
            display_target: true,
            display_thread_info: false,
        }
    }
}

impl LoggingConfig {
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn with_redaction(mut self, redact: bool) -> Self {
        self.redact_sensitive = redact;
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn with_logger_sink(mut self, sink: Arc<dyn LoggerSink>) -> Self {
        self.logger_sink = Some(sink);
        self
    }

    pub fn with_spans(mut self, enable: bool) -> Self {
        self.enable_spans = enable;
        self
    }

    pub fn with_target(mut self, display: bool) -> Self {
        self.display_target = display;
        self
    }

    pub fn with_thread_info(mut self, display: bool) -> Self {
        self.display_thread_info = display;
        self
    }
}

/// Install the global tracing subscriber.
///
/// Call once at startup. A second call fails because the global
/// subscriber slot is already taken.
pub fn init_logging(config: LoggingConfig) -> Result<()> {
    let filter = build_filter(&config)?;

    let span_events = if config.enable_spans {
        FmtSpan::ACTIVE
    } else {
        FmtSpan::NONE
    };

    let base = tracing_subscriber::fmt::layer()
        .with_target(config.display_target)
        .with_thread_ids(config.display_thread_info)
        .with_thread_names(config.display_thread_info)
        .with_writer(io::stdout);

    let fmt_layer = match config.format {
        LogFormat::Pretty => base.pretty().with_span_events(span_events).boxed(),
        LogFormat::Compact => base.compact().with_span_events(span_events).boxed(),
        LogFormat::Json => base
            .json()
            .flatten_event(true)
            .with_current_span(config.enable_spans)
            .with_span_list(config.enable_spans)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .with(SinkMirrorLayer::new(config.logger_sink))
        .try_init()
        .map_err(|e| Error::Logging(format!("subscriber already installed: {}", e)))
}

fn build_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    if let Some(custom) = &config.filter {
        return EnvFilter::try_new(custom)
            .map_err(|e| Error::Logging(format!("invalid log filter {:?}: {}", custom, e)));
    }

    let level = match config.level {
        LogLevel::Trace => "trace",
        LogLevel::Debug => "debug",
        LogLevel::Info => "info",
        LogLevel::Warn => "warn",
        LogLevel::Error => "error",
    };

    let mut directives = vec![format!("{}={}", env!("CARGO_PKG_NAME"), level)];
    for member in ["core_playback", "bridge_traits", "bridge_desktop"] {
        directives.push(format!("{}={}", member, level));
    }
    // HTTP internals are noisy at debug.
    for dependency in ["h2", "hyper", "reqwest"] {
        directives.push(format!("{}=warn", dependency));
    }

    let joined = directives.join(",");
    EnvFilter::try_new(&joined)
        .map_err(|e| Error::Logging(format!("derived filter {:?} rejected: {}", joined, e)))
}

/// Mirrors every event that survives filtering into a host [`LoggerSink`].
struct SinkMirrorLayer {
    sink: Option<Arc<dyn LoggerSink>>,
}

impl SinkMirrorLayer {
    fn new(sink: Option<Arc<dyn LoggerSink>>) -> Self {
        Self { sink }
    }

    fn deliver(sink: Arc<dyn LoggerSink>, entry: LogEntry) {
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                if let Err(err) = sink.log(entry).await {
                    eprintln!("LoggerSink error: {}", err);
                }
            });
            return;
        }

        // Sync context without a runtime (startup paths, unit tests):
        // deliver inline on a throwaway current-thread runtime.
        let outcome = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .map(|rt| rt.block_on(async move { sink.log(entry).await }));

        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(err)) => eprintln!("LoggerSink error: {}", err),
            Err(err) => eprintln!("LoggerSink runtime error: {}", err),
        }
    }
}

impl<S> Layer<S> for SinkMirrorLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let Some(sink) = self.sink.as_ref() else {
            return;
        };

        let metadata = event.metadata();
        let level = sink_level(*metadata.level());
        if level < sink.min_level() {
            return;
        }

        let mut collected = EventFields::default();
        event.record(&mut collected);

        let mut entry = LogEntry::new(
            level,
            metadata.target(),
            collected
                .message
                .unwrap_or_else(|| metadata.name().to_string()),
        );
        for (key, value) in collected.fields {
            entry = entry.with_field(key, value);
        }
        if let Some(span) = ctx.lookup_current() {
            entry.span_id = Some(span.name().to_string());
        }

        Self::deliver(Arc::clone(sink), entry);
    }
}

/// Field visitor flattening every recorded value to a string.
#[derive(Default)]
struct EventFields {
    message: Option<String>,
    fields: HashMap<String, String>,
}

impl EventFields {
    fn push(&mut self, field: &Field, value: String) {
        if field.name() == "message" {
            self.message = Some(value);
        } else {
            self.fields.insert(field.name().to_string(), value);
        }
    }
}

impl Visit for EventFields {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.push(field, value.to_string());
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.push(field, value.to_string());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.push(field, value.to_string());
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.push(field, value.to_string());
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.push(field, value.to_string());
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.push(field, value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.push(field, format!("{:?}", value));
    }
}

fn sink_level(level: tracing::Level) -> LogLevel {
    match level {
        tracing::Level::TRACE => LogLevel::Trace,
        tracing::Level::DEBUG => LogLevel::Debug,
        tracing::Level::INFO => LogLevel::Info,
        tracing::Level::WARN => LogLevel::Warn,
        tracing::Level::ERROR => LogLevel::Error,
    }
}

const SENSITIVE_FIELD_MARKERS: &[&str] = &[
    "token",
    "signature",
    "signed_url",
    "password",
    "secret",
    "api_key",
    "authorization",
    "bearer",
];

/// Redact values that must never reach a log line verbatim.
///
/// Fields whose name marks them as secret-bearing are replaced outright.
/// Provider stream URLs keep their path but lose the query string, which
/// is where expiry tokens and signatures live.
pub fn redact_if_sensitive(field_name: &str, value: &str) -> String {
    let name = field_name.to_lowercase();
    if SENSITIVE_FIELD_MARKERS
        .iter()
        .any(|marker| name.contains(marker))
    {
        return "[REDACTED]".to_string();
    }

    let is_http = value.starts_with("http://") || value.starts_with("https://");
    match (is_http, value.split_once('?')) {
        (true, Some((base, _))) => format!("{}?[REDACTED]", base),
        _ => value.to_string(),
    }
}

/// Reduce a filesystem path to its final component.
///
/// Blob store paths embed the user's home directory; logs only need the
/// cache file name.
pub fn strip_path(path: &str) -> &str {
    let after_slash = path.rsplit('/').next().unwrap_or(path);
    after_slash.rsplit('\\').next().unwrap_or(after_slash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::Result as SinkResult;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct CollectingSink {
        entries: Mutex<Vec<LogEntry>>,
    }

    #[async_trait]
    impl LoggerSink for CollectingSink {
        async fn log(&self, entry: LogEntry) -> SinkResult<()> {
            self.entries.lock().unwrap().push(entry);
            Ok(())
        }

        fn min_level(&self) -> LogLevel {
            LogLevel::Trace
        }
    }

    #[test]
    fn test_config_builders_set_every_knob() {
        let config = LoggingConfig::default()
            .with_format(LogFormat::Json)
            .with_level(LogLevel::Debug)
            .with_redaction(false)
            .with_filter("core_playback=trace")
            .with_spans(false)
            .with_target(false)
            .with_thread_info(true);

        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.level, LogLevel::Debug);
        assert!(!config.redact_sensitive);
        assert_eq!(config.filter.as_deref(), Some("core_playback=trace"));
        assert!(!config.enable_spans);
        assert!(!config.display_target);
        assert!(config.display_thread_info);
    }

    #[test]
    fn test_derived_filter_carries_level_and_quiets_http() {
        let filter = build_filter(&LoggingConfig::default().with_level(LogLevel::Trace)).unwrap();
        let rendered = filter.to_string();
        assert!(rendered.contains("core_playback=trace"));
        assert!(rendered.contains("hyper=warn"));
    }

    #[test]
    fn test_custom_filter_wins_over_derived() {
        let filter = build_filter(
            &LoggingConfig::default().with_filter("bridge_desktop=debug"),
        )
        .unwrap();
        assert_eq!(filter.to_string(), "bridge_desktop=debug");
    }

    #[test]
    fn test_invalid_custom_filter_is_rejected() {
        assert!(build_filter(&LoggingConfig::default().with_filter("===")).is_err());
    }

    #[test]
    fn test_named_secret_fields_are_replaced() {
        assert_eq!(redact_if_sensitive("signature", "abc123"), "[REDACTED]");
        assert_eq!(redact_if_sensitive("api_key", "k"), "[REDACTED]");
        assert_eq!(redact_if_sensitive("Authorization", "Basic x"), "[REDACTED]");
    }

    #[test]
    fn test_signed_url_loses_query_string() {
        let redacted =
            redact_if_sensitive("url", "https://cdn.example.com/a.mp3?Expires=1&Sig=zzz");
        assert_eq!(redacted, "https://cdn.example.com/a.mp3?[REDACTED]");

        // Plain values and non-URL query-ish strings pass through.
        assert_eq!(redact_if_sensitive("track_id", "12345"), "12345");
        assert_eq!(redact_if_sensitive("note", "what?really"), "what?really");
    }

    #[test]
    fn test_strip_path_handles_both_separator_styles() {
        assert_eq!(strip_path("/home/user/music/song.mp3"), "song.mp3");
        assert_eq!(strip_path("C:\\Users\\John\\Music\\song.mp3"), "song.mp3");
        assert_eq!(strip_path("song.mp3"), "song.mp3");
        assert_eq!(strip_path("/var/cache/"), "");
    }

    #[test]
    fn test_default_format_tracks_build_profile() {
        #[cfg(debug_assertions)]
        assert_eq!(LogFormat::default(), LogFormat::Pretty);

        #[cfg(not(debug_assertions))]
        assert_eq!(LogFormat::default(), LogFormat::Json);
    }

    #[tokio::test]
    async fn test_sink_mirror_receives_message_and_fields() {
        let sink = Arc::new(CollectingSink::default());
        let layer = SinkMirrorLayer::new(Some(sink.clone() as Arc<dyn LoggerSink>));
        let subscriber = tracing_subscriber::registry().with(layer);
        let _guard = tracing::subscriber::set_default(subscriber);

        tracing::info!(target: "test.target", tier = "durable", "hello world");

        // Delivery is spawned onto the runtime; yield so it runs.
        tokio::task::yield_now().await;

        let entries = sink.entries.lock().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].target, "test.target");
        assert_eq!(entries[0].message, "hello world");
        assert_eq!(entries[0].fields.get("tier"), Some(&"durable".to_string()));
    }
}
