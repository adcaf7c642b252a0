//! Full sessions: sources, render thread, flush thread and file sinks

mod common;

use common::mock_helpers::{recording_consumer, RecordingSink};
use motionvis_rs::config::{AppConfig, OutputFormat, SourceKind};
use motionvis_rs::render::SlidingWindowView;
use motionvis_rs::session::build_sink;
use motionvis_rs::sink::json::WindowDocument;
use motionvis_rs::source::{self, LineSource, MockSource};
use motionvis_rs::stream::{FlushSettings, RenderUpdate};
use motionvis_rs::{ChannelSet, FlushReason, SessionOptions, StreamSession};
use std::io::Cursor;
use std::time::Duration;

fn quick_options() -> SessionOptions {
    SessionOptions {
        render_period: Duration::from_millis(5),
        max_step: 50,
        window_len: 1000,
        flush: FlushSettings {
            window_duration: Duration::from_secs(60),
            min_samples: 5,
            max_samples: None,
        },
        poll_interval: Duration::from_millis(10),
        flush_on_shutdown: true,
    }
}

#[test]
fn test_shutdown_flushes_remaining_window() {
    let sink = RecordingSink::new();
    let (consumer, seen) = recording_consumer();
    let mut handle = StreamSession::new(ChannelSet::xyz())
        .start(quick_options(), Box::new(consumer), Box::new(sink.clone()))
        .unwrap();

    handle
        .spawn_source(Box::new(MockSource::motion(2000.0).with_limit(40)))
        .unwrap();
    assert!(common::wait_until(common::test_timeout(), || handle.sources_finished()));

    let summary = handle.shutdown();
    assert_eq!(summary.accepted, 40);
    assert_eq!(summary.sources[0].produced, 40);
    assert_eq!(summary.windows_flushed, 1);

    let windows = sink.windows();
    assert_eq!(windows.len(), 1);
    assert_eq!(windows[0].reason, FlushReason::Manual);
    assert_eq!(windows[0].len(), 40);
    assert!(!seen.lock().unwrap().is_empty());
}

#[test]
fn test_shutdown_skips_small_window() {
    let sink = RecordingSink::new();
    let handle = StreamSession::new(ChannelSet::xyz())
        .start(quick_options(), Box::new(|_: RenderUpdate| {}), Box::new(sink.clone()))
        .unwrap();

    handle.ingest().push_now(vec![0.0, 0.0, 1.0]).unwrap();
    let outcomes = handle.outcomes().clone();
    let summary = handle.shutdown();

    assert_eq!(summary.windows_flushed, 0);
    assert_eq!(sink.count(), 0);
    let last = outcomes.try_iter().last().unwrap();
    assert_eq!(last.to_string(), "[manual] skipped: only 1 samples");
}

#[test]
fn test_line_source_into_csv_files() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = AppConfig::default();
    config.output.dir = dir.path().to_path_buf();
    config.output.format = OutputFormat::Both;

    let input: String = (0..12).map(|i| format!("{},{},{}\n", i, i * 2, i * 3)).collect();
    let session = StreamSession::new(config.channel_set().unwrap());
    let view = SlidingWindowView::new(session.channels().clone(), 8);
    let mut handle = session
        .start(quick_options(), Box::new(view), build_sink(&config.output))
        .unwrap();
    handle
        .spawn_source(Box::new(LineSource::new(Cursor::new(input))))
        .unwrap();
    assert!(common::wait_until(common::test_timeout(), || handle.sources_finished()));

    let outcome = handle.flush_now(common::test_timeout()).unwrap();
    assert!(outcome.is_flushed(), "{}", outcome);
    handle.shutdown();

    let mut csv_files: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|n| n.ends_with(".csv") && n != "annotations.csv")
        .collect();
    csv_files.sort();
    assert_eq!(csv_files.len(), 1);
    assert!(csv_files[0].starts_with("001_"));

    let content = std::fs::read_to_string(dir.path().join(&csv_files[0])).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines[0], "timestamp,x,y,z");
    assert_eq!(lines.len(), 13);
    assert!(lines[12].ends_with(",11,22,33"));

    let annotations = std::fs::read_to_string(dir.path().join("annotations.csv")).unwrap();
    assert!(annotations.starts_with("filename,label\n001_"));

    let jsonl = std::fs::read_to_string(dir.path().join("windows.jsonl")).unwrap();
    let doc: WindowDocument = serde_json::from_str(jsonl.lines().next().unwrap()).unwrap();
    assert_eq!(doc.reason, FlushReason::Manual);
    assert_eq!(doc.samples.len(), 12);
    common::assert_float_eq(doc.summary[0].mean, 5.5, 1e-9);
}

#[test]
fn test_source_from_config_file_input() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("capture.jsonl");
    std::fs::write(
        &input,
        "{\"x\": 1, \"y\": 2, \"z\": 3}\n{\"x\": 4, \"y\": 5, \"z\": 6}\n",
    )
    .unwrap();

    let mut config = AppConfig::default();
    config.source.kind = SourceKind::Json;
    config.source.path = input;

    let sink = RecordingSink::new();
    let mut options = quick_options();
    options.flush.min_samples = 1;
    let mut handle = StreamSession::new(config.channel_set().unwrap())
        .start(options, Box::new(|_: RenderUpdate| {}), Box::new(sink.clone()))
        .unwrap();
    handle
        .spawn_source(source::from_settings(&config.source, 3).unwrap())
        .unwrap();
    assert!(common::wait_until(common::test_timeout(), || handle.sources_finished()));

    let summary = handle.shutdown();
    assert_eq!(summary.accepted, 2);
    assert_eq!(sink.windows()[0].samples()[1].values(), &[4.0, 5.0, 6.0]);
}
