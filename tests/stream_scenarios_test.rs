//! End-to-end behaviour of the buffer, accumulator and flush policy

mod common;

use common::builders::{SampleBuilder, TestStream};
use common::mock_helpers::{recording_consumer, RecordingSink};
use motionvis_rs::stream::{
    BatchDrainer, FlushAttempt, FlushController, FlushHandle, FlushOutcome, FlushSettings,
    RenderUpdate, TickStatus, WindowFlushPolicy,
};
use motionvis_rs::{ChannelSet, FlushReason, Sample, StreamBuffer};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

fn settings(window: Duration, min_samples: usize) -> FlushSettings {
    FlushSettings {
        window_duration: window,
        min_samples,
        max_samples: None,
    }
}

#[test]
fn test_drain_scenario() {
    let buffer = StreamBuffer::new(ChannelSet::new(["X", "Y", "Z"]).unwrap());
    let first = SampleBuilder::new().at_secs(0).values(&[1.0, 2.0, 3.0]).build();
    let second = SampleBuilder::new().at_secs(1).values(&[4.0, 5.0, 6.0]).build();
    buffer.push(first.clone()).unwrap();
    buffer.push(second.clone()).unwrap();

    assert_eq!(buffer.drain(1), vec![first]);
    assert_eq!(buffer.drain(10), vec![second]);
    assert!(buffer.drain(10).is_empty());
}

#[test]
fn test_arity_mismatch_leaves_buffer_unchanged() {
    let stream = TestStream::xyz();
    stream.ingest.push_now(vec![1.0, 2.0, 3.0]).unwrap();

    for bad in [vec![], vec![1.0], vec![1.0, 2.0], vec![1.0, 2.0, 3.0, 4.0]] {
        let err = stream.ingest.push_now(bad).unwrap_err();
        assert!(err.is_arity());
    }
    assert_eq!(stream.buffer.len(), 1);
    assert_eq!(stream.accumulator.len(), 1);
    assert_eq!(stream.ingest.rejected(), 4);
}

#[test]
fn test_min_samples_scenario() {
    let stream = TestStream::xyz();
    let policy = WindowFlushPolicy::new(
        stream.accumulator.clone(),
        settings(Duration::from_secs(10), 3),
    );

    for t in 0..2 {
        stream.ingest.push_at(Duration::from_secs(t), vec![t as f64; 3]).unwrap();
    }
    assert_eq!(policy.attempt(), FlushAttempt::Skipped { count: 2 });
    assert_eq!(stream.accumulator.len(), 2);

    stream.ingest.push_at(Duration::from_secs(2), vec![2.0; 3]).unwrap();
    let FlushAttempt::Ready(window) = policy.attempt() else {
        panic!("expected a window");
    };
    let times: Vec<Duration> = window.samples.iter().map(Sample::timestamp).collect();
    assert_eq!(
        times,
        vec![Duration::from_secs(0), Duration::from_secs(1), Duration::from_secs(2)]
    );
    assert!(stream.accumulator.is_empty());
    assert!(stream.accumulator.status().is_idle());
}

#[test]
fn test_manual_skip_reports_and_keeps_window() {
    let stream = TestStream::xyz();
    let sink = RecordingSink::new();
    let mut controller = FlushController::new(
        WindowFlushPolicy::new(stream.accumulator.clone(), settings(Duration::from_secs(10), 3)),
        Box::new(sink.clone()),
        chrono::Local::now(),
    );

    stream.ingest.push_now(vec![1.0, 2.0, 3.0]).unwrap();
    stream.ingest.push_now(vec![1.0, 2.0, 3.0]).unwrap();
    let outcome = controller.flush(FlushReason::Manual);
    assert_eq!(outcome.to_string(), "[manual] skipped: only 2 samples");
    assert_eq!(sink.count(), 0);

    stream.ingest.push_now(vec![1.0, 2.0, 3.0]).unwrap();
    let outcome = controller.flush(FlushReason::Manual);
    assert!(outcome.is_flushed());
    assert_eq!(sink.windows()[0].len(), 3);
    assert_eq!(sink.windows()[0].reason, FlushReason::Manual);
}

#[test]
fn test_timer_flush_at_eleven_seconds() {
    let stream = TestStream::xyz();
    let sink = RecordingSink::new();
    let mut controller = FlushController::new(
        WindowFlushPolicy::new(stream.accumulator.clone(), settings(Duration::from_secs(10), 1)),
        Box::new(sink.clone()),
        chrono::Local::now(),
    );

    let t0 = Instant::now();
    stream
        .accumulator
        .add_at(SampleBuilder::new().values(&[0.0, 0.0, 1.0]).build(), t0)
        .unwrap();

    // poll every second: nothing until the window is ten seconds old
    for s in 1..10 {
        assert!(controller.poll_at(t0 + Duration::from_secs(s)).is_none());
    }
    let outcome = controller.poll_at(t0 + Duration::from_secs(11)).unwrap();
    assert_eq!(outcome.reason(), FlushReason::Timer);
    assert!(outcome.is_flushed());
    assert_eq!(sink.windows()[0].reason, FlushReason::Timer);
    assert!(controller.poll_at(t0 + Duration::from_secs(12)).is_none());
}

#[test]
fn test_size_trigger_flushes_with_size_reason() {
    let stream = TestStream::xyz();
    let sink = RecordingSink::new();
    let mut controller = FlushController::new(
        WindowFlushPolicy::new(
            stream.accumulator.clone(),
            FlushSettings {
                max_samples: Some(4),
                ..settings(Duration::from_secs(60), 2)
            },
        ),
        Box::new(sink.clone()),
        chrono::Local::now(),
    );

    for _ in 0..4 {
        stream.ingest.push_now(vec![0.0; 3]).unwrap();
    }
    let outcome = controller.poll().unwrap();
    assert_eq!(outcome.reason(), FlushReason::Size);
    assert_eq!(sink.windows()[0].len(), 4);
}

#[test]
fn test_sink_failure_is_reported_not_retried() {
    let stream = TestStream::xyz();
    let sink = RecordingSink::failing();
    let mut controller = FlushController::new(
        WindowFlushPolicy::new(stream.accumulator.clone(), settings(Duration::from_secs(10), 1)),
        Box::new(sink.clone()),
        chrono::Local::now(),
    );

    stream.ingest.push_now(vec![0.0; 3]).unwrap();
    let outcome = controller.flush(FlushReason::Manual);
    assert!(matches!(outcome, FlushOutcome::Failed { samples: 1, .. }));
    assert!(outcome.to_string().contains("simulated failure"));
    assert!(stream.accumulator.is_empty());

    // nothing left to retry
    assert!(controller.flush(FlushReason::Manual).is_skipped());
    assert_eq!(sink.count(), 1);
}

#[test]
fn test_render_and_flush_are_independent() {
    let stream = TestStream::xyz();
    let (consumer, seen) = recording_consumer();
    let mut drainer = BatchDrainer::new(stream.buffer.clone(), Box::new(consumer), 2, 50);

    for t in 0..5u64 {
        stream.ingest.push_at(Duration::from_millis(t), vec![t as f64; 3]).unwrap();
    }
    assert_eq!(drainer.tick(), TickStatus::Appended { count: 2, pending: 3 });
    assert_eq!(drainer.tick(), TickStatus::Appended { count: 2, pending: 1 });
    assert_eq!(drainer.tick(), TickStatus::Appended { count: 1, pending: 0 });
    assert_eq!(drainer.tick(), TickStatus::Waiting);

    // rendering consumed the buffer, the open window still has everything
    assert_eq!(stream.accumulator.len(), 5);
    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 4);
    assert_eq!(seen[3], RenderUpdate::NoUpdate);
}

#[test]
fn test_controller_loop_timer_and_manual() {
    let stream = TestStream::xyz();
    let sink = RecordingSink::new();
    let (status_tx, status_rx) = crossbeam_channel::bounded(16);
    let mut controller = FlushController::new(
        WindowFlushPolicy::new(stream.accumulator.clone(), settings(Duration::from_millis(150), 1)),
        Box::new(sink.clone()),
        chrono::Local::now(),
    )
    .with_status(status_tx);

    let (handle, requests) = FlushHandle::new();
    let running = Arc::new(AtomicBool::new(true));
    let flag = running.clone();
    let worker = std::thread::spawn(move || {
        controller.run(&flag, Duration::from_millis(10), requests);
        controller.flushed()
    });

    stream.ingest.push_now(vec![1.0, 1.0, 1.0]).unwrap();
    let timer = status_rx.recv_timeout(common::test_timeout()).unwrap();
    assert_eq!(timer.reason(), FlushReason::Timer);
    assert!(timer.is_flushed());

    stream.ingest.push_now(vec![2.0, 2.0, 2.0]).unwrap();
    let manual = handle.flush_now(common::test_timeout()).unwrap();
    assert_eq!(manual.reason(), FlushReason::Manual);
    assert!(manual.is_flushed());

    handle.shutdown();
    let flushed = worker.join().unwrap();
    running.store(false, Ordering::Relaxed);
    assert_eq!(flushed, 2);
    assert_eq!(sink.count(), 2);
}
