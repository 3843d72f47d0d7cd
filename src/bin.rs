//! `relay-bot` command.
//!
//! Connects to Slack over socket mode and answers every @-mention in its thread
//! with an LLM completion built from the channel's recent messages. Messages are
//! kept in SurrealDB, and a health probe is served on `/demo/health` while the
//! bot runs. Stops cleanly on Ctrl-C.

use clap::Parser;
use opentelemetry::trace::TracerProvider;
use opentelemetry_otlp::{Protocol, WithExportConfig};
use relay_bot::base::{config::Config, types::Void};
use tracing::Level;
use tracing_subscriber::{filter::LevelFilter, fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt};

/// Relay Slack @-mentions to an LLM and reply in-thread.
///
/// Settings are read from `RELAY_BOT_*` environment variables and a TOML file
/// (`.hidden/config.toml` unless `--config` is given). At minimum the bot needs
/// `slack_app_token`, `slack_bot_token`, and the API key of the selected
/// `llm_provider` (`gemini` by default).
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to a TOML config file, used instead of `.hidden/config.toml`.
    #[arg(short, long)]
    config: Option<std::path::PathBuf>,
    /// Log more: `-v` for debug output (prompts and completions), `-vv` for trace.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
    /// Also export spans over OTLP/HTTP, configured by the `OTEL_EXPORTER_OTLP_*` variables.
    #[arg(long)]
    otlp: bool,
}

#[tokio::main]
async fn main() -> Void {
    let args = Args::parse();

    init_tracing(args.verbose, args.otlp)?;

    let config = Config::load(args.config.as_deref())?;

    relay_bot::start(config).await
}

/// Install the global subscriber: a compact stdout log, plus span export when asked.
///
/// Each mention is handled inside its own span, so span open/close events show
/// the lifetime of every relayed message.
fn init_tracing(verbose: u8, otlp: bool) -> Void {
    let level = match verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let stdout = tracing_subscriber::fmt::layer()
        .without_time()
        .with_target(false)
        .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE);

    let otel = if otlp {
        let exporter = opentelemetry_otlp::SpanExporter::builder().with_http().with_protocol(Protocol::HttpBinary).build()?;
        let provider = opentelemetry_sdk::trace::SdkTracerProvider::builder().with_simple_exporter(exporter).build();
        Some(tracing_opentelemetry::layer().with_tracer(provider.tracer("relay-bot")))
    } else {
        None
    };

    tracing_subscriber::registry().with(otel).with(LevelFilter::from_level(level)).with(stdout).init();

    Ok(())
}
