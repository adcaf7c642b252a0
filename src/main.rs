//! MotionVis - command-line entry point
//!
//! Streams samples from the configured source, shows a live summary of the
//! latest values, and writes flushed windows to the output directory.
//!
//! Usage:
//!   motionvis --source mock --output data --window-secs 10 --duration 60
//!   motionvis --source lines --input capture.csv
//!
//! While running, type `s` + Enter to flush the current window now, or
//! `q` + Enter to quit (unless stdin is the sample source).

use anyhow::Context;
use clap::Parser;
use motionvis_rs::{
    config::{default_config_path, AppConfig, SourceKind},
    render::SlidingWindowView,
    session::build_sink,
    source,
    stream::{FlushHandle, RenderUpdate},
    SessionOptions, StreamSession,
};
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// How often the latest values are printed
const PRINT_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Parser, Debug)]
#[command(name = "motionvis")]
#[command(
    about = "Stream motion-sensor samples to a live view and windowed files",
    long_about = None
)]
struct Args {
    /// Config file (defaults to the platform config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Sample source: "mock", "lines" or "json"
    #[arg(short, long)]
    source: Option<SourceKind>,

    /// Input file for line/JSON sources (stdin if omitted)
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Output directory for flushed windows
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Window duration in seconds
    #[arg(long)]
    window_secs: Option<f64>,

    /// Minimum samples for a window to be written
    #[arg(long)]
    min_samples: Option<usize>,

    /// Stop after this many seconds (runs until Ctrl+C or `q` if omitted)
    #[arg(short, long)]
    duration: Option<u64>,
}

fn load_config(args: &Args) -> anyhow::Result<AppConfig> {
    let mut config = match &args.config {
        Some(path) => AppConfig::load(path)?,
        None => default_config_path()
            .map(AppConfig::load_or_default)
            .unwrap_or_default(),
    };

    if let Some(kind) = args.source {
        config.source.kind = kind;
    }
    if let Some(input) = &args.input {
        config.source.path = input.clone();
    }
    if let Some(output) = &args.output {
        config.output.dir = output.clone();
    }
    if let Some(secs) = args.window_secs {
        config.flush.window_secs = secs;
    }
    if let Some(min) = args.min_samples {
        config.flush.min_samples = min;
    }

    config.validate().context("Invalid settings")?;
    Ok(config)
}

/// Install the stderr logger and, if configured, a daily rolling log file.
///
/// The returned guard must live until exit so buffered file logs are written.
fn init_logging(config: &AppConfig) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.filter));

    let (file_layer, guard) = if config.logging.file.as_os_str().is_empty() {
        (None, None)
    } else {
        let appender = tracing_appender::rolling::daily(&config.logging.file, "motionvis.log");
        let (writer, guard) = tracing_appender::non_blocking(appender);
        (
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(writer),
            ),
            Some(guard),
        )
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();
    guard
}

/// Serve `s` (flush now) and `q` (quit) typed on stdin.
fn spawn_keyboard(flush: FlushHandle, running: Arc<AtomicBool>) {
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            match line.trim() {
                "s" => {
                    if !flush.request_flush() {
                        tracing::warn!("Flush request queue is full");
                    }
                }
                "q" => {
                    running.store(false, Ordering::SeqCst);
                    break;
                }
                "" => {}
                other => println!("Unknown command '{}' (s = flush now, q = quit)", other),
            }
        }
    });
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;
    let _log_guard = init_logging(&config);

    let channels = config.channel_set()?;
    tracing::info!("Starting MotionVis with channels {:?}", channels.names());

    let session = StreamSession::new(channels.clone());
    let source = source::from_settings(&config.source, channels.len())
        .context("Failed to open sample source")?;

    // Live view: keep the sliding window and print the latest values
    let mut view = SlidingWindowView::new(channels.clone(), config.render.window_points);
    let mut last_print = Instant::now();
    let consumer = move |update: RenderUpdate| {
        let appended = matches!(update, RenderUpdate::Append(_));
        motionvis_rs::stream::RenderConsumer::apply(&mut view, update);
        if appended && last_print.elapsed() >= PRINT_INTERVAL {
            last_print = Instant::now();
            if let Some(latest) = view.latest() {
                let values: Vec<String> = view
                    .channels()
                    .names()
                    .iter()
                    .zip(&latest)
                    .map(|(name, v)| format!("{}={:+.3}", name, v))
                    .collect();
                println!("{} | points={}", values.join(" "), view.len(0));
            }
        }
    };

    let mut handle = session.start(
        SessionOptions::from_config(&config)?,
        Box::new(consumer),
        build_sink(&config.output),
    )?;
    handle.spawn_source(source)?;

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })?;

    if config.source.reads_stdin() {
        println!("Reading samples from stdin (Ctrl+C to stop)");
    } else {
        println!("Type s + Enter to flush now, q + Enter to quit (Ctrl+C also stops)");
        spawn_keyboard(handle.flush_handle(), running.clone());
    }

    let end_time = args
        .duration
        .map(|d| Instant::now() + Duration::from_secs(d));

    while running.load(Ordering::SeqCst) {
        if end_time.is_some_and(|end| Instant::now() >= end) {
            tracing::info!("Duration elapsed");
            break;
        }
        if handle.sources_finished() {
            tracing::info!("Source finished");
            break;
        }
        if let Ok(outcome) = handle.outcomes().recv_timeout(Duration::from_millis(100)) {
            println!("{}", outcome);
        }
    }

    let outcomes = handle.outcomes().clone();
    let summary = handle.shutdown();
    for outcome in outcomes.try_iter() {
        println!("{}", outcome);
    }

    println!();
    println!("Samples accepted: {}", summary.accepted);
    if summary.rejected > 0 {
        println!("Samples rejected: {}", summary.rejected);
    }
    for stats in &summary.sources {
        println!("Source: {}", stats);
    }
    println!("Windows written: {}", summary.windows_flushed);
    println!("Output: {}", config.output.dir.display());

    Ok(())
}
