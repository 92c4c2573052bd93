//! Walks one simulated playback session through the tracing pipeline.
//!
//! ```bash
//! cargo run --example logging_demo                  # profile default format
//! cargo run --example logging_demo -- json          # machine readable
//! cargo run --example logging_demo -- compact
//! cargo run --example logging_demo -- pretty "core_runtime=trace"
//! ```

use bridge_traits::time::LogLevel;
use core_runtime::logging::{
    init_logging, redact_if_sensitive, strip_path, LogFormat, LoggingConfig,
};
use std::env;
use std::time::Duration;
use tracing::{debug, info, info_span, instrument, trace, warn, Instrument};

#[tokio::main]
async fn main() {
    let mut args = env::args().skip(1);

    let format = match args.next().as_deref() {
        Some("json") => LogFormat::Json,
        Some("compact") => LogFormat::Compact,
        Some("pretty") => LogFormat::Pretty,
        _ => LogFormat::default(),
    };

    let mut config = LoggingConfig::default()
        .with_format(format)
        .with_level(LogLevel::Trace)
        .with_redaction(true)
        .with_spans(true)
        .with_target(true);
    if let Some(filter) = args.next() {
        config = config.with_filter(filter);
    }

    init_logging(config).expect("logging init");
    info!(format = ?format, "pipeline ready, replaying a session");

    resolve_track("catalog://4821").await;
    score_preload_candidates(&["catalog://4822", "catalog://4830", "catalog://5001"]).await;
    crossfade_report();

    info!("session replay finished");
}

/// Emits the span shape the resolver produces on a cold lookup.
async fn resolve_track(reference: &str) {
    async {
        debug!(tier = "hot", hit = false, "url cache miss");
        debug!(tier = "warm", hit = false, "url cache miss");
        tokio::time::sleep(Duration::from_millis(10)).await;

        let signed = "https://edge.example.com/a.mp3?Expires=1700000000&Signature=abc";
        info!(
            tier = "network",
            elapsed_ms = 120,
            url = %redact_if_sensitive("signed_url", signed),
            "resolved fresh stream"
        );
    }
    .instrument(info_span!("resolve", reference))
    .await;
}

#[instrument(fields(count = candidates.len()))]
async fn score_preload_candidates(candidates: &[&str]) {
    for (rank, reference) in candidates.iter().enumerate() {
        trace!(%reference, rank, "scoring candidate");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    info!(selected = candidates.len().min(2), "cycle selection complete");
}

fn crossfade_report() {
    let span = info_span!("crossfade");
    let _enter = span.enter();

    let local = "/home/user/private/music/song.mp3";
    info!(file = %strip_path(local), fade_ms = 5000, "fade scheduled");
    warn!(remaining_ms = 800, "overlap shorter than configured window");
}
