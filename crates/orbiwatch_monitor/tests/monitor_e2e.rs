//! End-to-end tests for a single acquisition session
//!
//! All tests run on a paused tokio clock, so poll intervals and retry
//! backoffs are exercised in virtual time.

mod harness;

use harness::*;
use orbiwatch_monitor::{
    AcquisitionMonitor, CancellationToken, MemorySink, MonitorError, Phase, ReportEvent,
    SessionOutcome, StatusFileOpener,
};
use std::path::Path;
use std::time::Duration;

fn start(
    script: &Script,
    sink: &MemorySink,
    cancel: &CancellationToken,
) -> (AcquisitionMonitor<ScriptedSource>, std::sync::Arc<SourceProbe>) {
    let (source, probe) = script.source("run01.raw");
    let monitor = AcquisitionMonitor::from_source(
        source,
        Path::new("/data/run01.raw"),
        test_config(),
        shared_sink(sink),
        cancel.clone(),
    )
    .unwrap();
    (monitor, probe)
}

// ============================================================================
// Phase progression
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_full_session_record_sequence() {
    let sink = MemorySink::new();
    let cancel = CancellationToken::new();
    let (monitor, probe) = start(&standard_run(), &sink, &cancel);

    let outcome = monitor.run().await.unwrap();

    assert_eq!(
        kinds(&sink),
        vec![
            "file_observed",
            "awaiting",
            "awaiting",
            "first_spectrum",
            "progress",
            "progress",
            "progress",
            "complete",
        ]
    );
    match outcome {
        SessionOutcome::Completed(summary) => {
            assert_eq!(summary.file_name, "run01.raw");
            assert_eq!(summary.monitoring_polls, 3);
            assert_eq!(summary.final_spectrum_count, 3);
        }
        other => panic!("expected completion, got {:?}", other),
    }
    // 2 refreshes while awaiting, 3 while monitoring.
    assert_eq!(probe.refresh_calls(), 5);
}

#[tokio::test(start_paused = true)]
async fn test_first_spectrum_detected_on_third_read() {
    let sink = MemorySink::new();
    let cancel = CancellationToken::new();
    let (monitor, _probe) = start(&standard_run(), &sink, &cancel);

    monitor.run().await.unwrap();

    let records = sink.records();
    let waits: Vec<f64> = records
        .iter()
        .filter_map(|r| match r.event {
            ReportEvent::AwaitingFirstSpectrum { elapsed_secs } => Some(elapsed_secs),
            _ => None,
        })
        .collect();
    assert_eq!(waits.len(), 2);
    assert_close(waits[0], 0.0);
    assert_close(waits[1], 5.0);

    // Bootstrap read, then reads at 5 s and 10 s: the third one qualifies.
    let baseline = records
        .iter()
        .find_map(|r| match r.event {
            ReportEvent::FirstSpectrumRecorded {
                first_spectrum_index,
                first_retention_secs,
                dead_time_secs,
            } => Some((first_spectrum_index, first_retention_secs, dead_time_secs)),
            _ => None,
        })
        .expect("baseline record");
    assert_eq!(baseline.0, 1);
    assert_close(baseline.1, RT_MINUTES_PER_SCAN * 60.0);
    assert_close(baseline.2, 10.0 - RT_MINUTES_PER_SCAN * 60.0);
}

#[tokio::test(start_paused = true)]
async fn test_monitoring_polls_at_configured_interval() {
    let sink = MemorySink::new();
    let cancel = CancellationToken::new();
    let (monitor, _probe) = start(&standard_run(), &sink, &cancel);

    monitor.run().await.unwrap();

    let progress: Vec<(f64, i64, i64)> = sink
        .records()
        .iter()
        .filter_map(|r| match r.event {
            ReportEvent::Progress {
                elapsed_secs,
                spectrum_count,
                last_spectrum_index,
                ..
            } => Some((elapsed_secs, spectrum_count, last_spectrum_index)),
            _ => None,
        })
        .collect();

    assert_eq!(progress.len(), 3);
    assert!(progress.windows(2).all(|w| w[0].1 <= w[1].1));
    assert_close(progress[0].0, 10.0);
    assert_close(progress[1].0, 40.0);
    assert_close(progress[2].0, 70.0);
    assert_eq!((progress[0].1, progress[0].2), (2, 2));
    assert_eq!((progress[2].1, progress[2].2), (3, 3));
}

#[tokio::test(start_paused = true)]
async fn test_exactly_one_terminal_record_and_no_polling_after() {
    let sink = MemorySink::new();
    let cancel = CancellationToken::new();
    let (monitor, probe) = start(&standard_run(), &sink, &cancel);

    monitor.run().await.unwrap();
    let calls = probe.refresh_calls();

    tokio::time::sleep(Duration::from_secs(600)).await;

    let records = sink.records();
    assert_eq!(records.iter().filter(|r| r.is_terminal()).count(), 1);
    assert!(records.last().unwrap().is_terminal());
    match &records.last().unwrap().event {
        ReportEvent::AcquisitionComplete { file_name } => assert_eq!(file_name, "run01.raw"),
        other => panic!("unexpected terminal record {:?}", other),
    }
    assert_eq!(probe.refresh_calls(), calls);
}

#[tokio::test(start_paused = true)]
async fn test_one_signal_change_does_not_leave_awaiting() {
    let script = Script::new(vec![
        Frame::new(0, 0),
        Frame::new(1, 0),
        Frame::new(0, 1),
    ]);
    let sink = MemorySink::new();
    let cancel = CancellationToken::new();
    let (monitor, probe) = start(&script, &sink, &cancel);

    let handle = tokio::spawn(monitor.run());
    tokio::time::sleep(Duration::from_secs(32)).await;
    cancel.cancel();

    let outcome = handle.await.unwrap().unwrap();
    assert_eq!(
        outcome,
        SessionOutcome::Cancelled {
            phase: Phase::AwaitingFirstSpectrum
        }
    );
    assert!(probe.successful_refreshes() >= 2);
    assert!(!kinds(&sink).contains(&"first_spectrum"));
}

#[tokio::test(start_paused = true)]
async fn test_initial_values_come_from_bootstrap_snapshot() {
    let script = Script::new(vec![Frame::new(3, 7), Frame::new(4, 8).finished()]);
    let sink = MemorySink::new();
    let cancel = CancellationToken::new();
    let (monitor, _probe) = start(&script, &sink, &cancel);

    assert_eq!(monitor.session().initial_spectrum_count(), 3);
    assert_eq!(monitor.session().initial_last_spectrum_index(), 7);
    assert_eq!(monitor.session().phase(), Phase::AwaitingFirstSpectrum);

    match &sink.records()[0].event {
        ReportEvent::FileObserved {
            spectrum_count,
            last_spectrum_index,
            in_acquisition,
            run_header,
            ..
        } => {
            assert_eq!((*spectrum_count, *last_spectrum_index), (3, 7));
            assert!(*in_acquisition);
            assert_eq!(run_header.as_deref(), Some("scripted run"));
        }
        other => panic!("unexpected first record {:?}", other),
    }

    // The second frame is already finished: no progress records, straight to complete.
    monitor.run().await.unwrap();
    assert_eq!(
        kinds(&sink),
        vec!["file_observed", "awaiting", "first_spectrum", "complete"]
    );
}

#[tokio::test(start_paused = true)]
async fn test_bootstrap_does_not_read_scans() {
    // The header already counts two spectra, but no scan is readable until
    // the first refresh.
    let script = Script::new(vec![
        Frame::new(2, 2),
        Frame::new(3, 3),
        Frame::new(4, 4).finished(),
    ])
    .scans_readable_from(1);
    let sink = MemorySink::new();
    let cancel = CancellationToken::new();
    let (monitor, _probe) = start(&script, &sink, &cancel);

    assert_eq!(monitor.session().initial_spectrum_count(), 2);
    let outcome = monitor.run().await.unwrap();

    assert!(outcome.is_completed());
    assert!(!kinds(&sink).contains(&"read_failed"));
}

#[tokio::test(start_paused = true)]
async fn test_decreasing_count_keeps_monitoring() {
    let script = Script::new(vec![
        Frame::new(0, 0),
        Frame::new(5, 5),
        Frame::new(3, 3),
        Frame::new(4, 4).finished(),
    ]);
    let sink = MemorySink::new();
    let cancel = CancellationToken::new();
    let (monitor, _probe) = start(&script, &sink, &cancel);

    let outcome = monitor.run().await.unwrap();

    match outcome {
        SessionOutcome::Completed(summary) => {
            assert_eq!(summary.monitoring_polls, 2);
            assert_eq!(summary.final_spectrum_count, 4);
        }
        other => panic!("expected completion, got {:?}", other),
    }
    let counts: Vec<i64> = sink
        .records()
        .iter()
        .filter_map(|r| match r.event {
            ReportEvent::Progress { spectrum_count, .. } => Some(spectrum_count),
            _ => None,
        })
        .collect();
    assert_eq!(counts, vec![3, 4]);
    assert_eq!(kinds(&sink).last(), Some(&"complete"));
}

// ============================================================================
// Cancellation
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_cancel_while_awaiting() {
    let script = Script::new(vec![Frame::new(0, 0)]);
    let sink = MemorySink::new();
    let cancel = CancellationToken::new();
    let (monitor, _probe) = start(&script, &sink, &cancel);

    let handle = tokio::spawn(monitor.run());
    tokio::time::sleep(Duration::from_secs(12)).await;
    cancel.cancel();

    let outcome = handle.await.unwrap().unwrap();
    assert_eq!(
        outcome,
        SessionOutcome::Cancelled {
            phase: Phase::AwaitingFirstSpectrum
        }
    );
    assert_eq!(
        kinds(&sink),
        vec!["file_observed", "awaiting", "awaiting", "awaiting", "cancelled"]
    );
}

#[tokio::test(start_paused = true)]
async fn test_cancel_while_monitoring() {
    let script = Script::new(vec![Frame::new(0, 0), Frame::new(1, 1)]);
    let sink = MemorySink::new();
    let cancel = CancellationToken::new();
    let (monitor, _probe) = start(&script, &sink, &cancel);

    let handle = tokio::spawn(monitor.run());
    tokio::time::sleep(Duration::from_secs(50)).await;
    cancel.cancel();

    let outcome = handle.await.unwrap().unwrap();
    assert_eq!(outcome, SessionOutcome::Cancelled { phase: Phase::Monitoring });
    assert_eq!(
        kinds(&sink),
        vec![
            "file_observed",
            "awaiting",
            "first_spectrum",
            "progress",
            "progress",
            "cancelled",
        ]
    );
    match &sink.records().last().unwrap().event {
        ReportEvent::SessionCancelled { path, phase } => {
            assert_eq!(path, Path::new("/data/run01.raw"));
            assert_eq!(*phase, Phase::Monitoring);
        }
        other => panic!("unexpected last record {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_before_run_emits_single_record() {
    let sink = MemorySink::new();
    let cancel = CancellationToken::new();
    let (monitor, probe) = start(&standard_run(), &sink, &cancel);

    cancel.cancel();
    let outcome = monitor.run().await.unwrap();

    assert!(!outcome.is_completed());
    assert_eq!(kinds(&sink), vec!["file_observed", "awaiting", "cancelled"]);
    assert_eq!(probe.refresh_calls(), 0);
}

// ============================================================================
// Read failures
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_refresh_failure_within_budget_is_absorbed() {
    let sink = MemorySink::new();
    let cancel = CancellationToken::new();
    let (monitor, probe) = start(&standard_run().fail_refresh(2), &sink, &cancel);

    let outcome = monitor.run().await.unwrap();

    assert!(outcome.is_completed());
    assert!(!kinds(&sink).contains(&"read_failed"));
    assert_eq!(probe.refresh_calls(), 6);
    assert_eq!(probe.successful_refreshes(), 5);

    // The failed read at 10 s is retried after 1 s, delaying the baseline.
    let dead_time = sink
        .records()
        .iter()
        .find_map(|r| match r.event {
            ReportEvent::FirstSpectrumRecorded { dead_time_secs, .. } => Some(dead_time_secs),
            _ => None,
        })
        .unwrap();
    assert_close(dead_time, 11.0 - RT_MINUTES_PER_SCAN * 60.0);
}

#[tokio::test(start_paused = true)]
async fn test_refresh_failure_beyond_budget_fails_session() {
    let sink = MemorySink::new();
    let cancel = CancellationToken::new();
    let (monitor, probe) = start(&standard_run().fail_from(1), &sink, &cancel);

    let err = monitor.run().await.unwrap_err();

    assert!(matches!(err, MonitorError::Read(_)));
    assert_eq!(probe.refresh_calls(), 3);
    assert_eq!(kinds(&sink), vec!["file_observed", "awaiting", "read_failed"]);
    match &sink.records().last().unwrap().event {
        ReportEvent::ReadFailed { phase, message, .. } => {
            assert_eq!(*phase, Phase::AwaitingFirstSpectrum);
            assert!(message.contains("file is locked"));
        }
        other => panic!("unexpected last record {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_open_failure_is_returned_without_records() {
    let opener = ScriptedOpener::new(standard_run()).failing_first(1);
    let sink = MemorySink::new();

    let result = AcquisitionMonitor::bootstrap(
        &opener,
        Path::new("/data/run01.raw"),
        test_config(),
        shared_sink(&sink),
        CancellationToken::new(),
    );

    match result {
        Err(err) => assert!(err.is_open_error()),
        Ok(_) => panic!("open should have failed"),
    }
    assert!(sink.is_empty());
    assert_eq!(opener.open_calls(), 1);
}

// ============================================================================
// Status document source
// ============================================================================

fn write_status(raw: &Path, in_acquisition: bool, count: i64) {
    let scans: Vec<serde_json::Value> = (1..=count)
        .map(|i| {
            serde_json::json!({
                "index": i,
                "retention_time_minutes": i as f64 * 0.1,
                "ms_order": "ms",
                "base_intensity": 5.0e5,
            })
        })
        .collect();
    let doc = serde_json::json!({
        "file_name": "run01.raw",
        "in_acquisition": in_acquisition,
        "run_header": {
            "first_spectrum": if count > 0 { 1 } else { 0 },
            "last_spectrum": count,
            "spectra_count": count,
            "expected_runtime_seconds": 600.0,
        },
        "scans": scans,
    });
    std::fs::write(
        orbiwatch_monitor::status_file::status_path_for(raw),
        serde_json::to_string_pretty(&doc).unwrap(),
    )
    .unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_status_file_session_runs_to_completion() {
    let tmp = tempfile::TempDir::new().unwrap();
    let raw = tmp.path().join("run01.raw");
    write_status(&raw, true, 0);

    let sink = MemorySink::new();
    let monitor = AcquisitionMonitor::bootstrap(
        &StatusFileOpener,
        &raw,
        test_config(),
        shared_sink(&sink),
        CancellationToken::new(),
    )
    .unwrap();
    let handle = tokio::spawn(monitor.run());

    tokio::time::sleep(Duration::from_secs(7)).await;
    write_status(&raw, true, 4);
    tokio::time::sleep(Duration::from_secs(30)).await;
    write_status(&raw, false, 9);

    let outcome = handle.await.unwrap().unwrap();
    match outcome {
        SessionOutcome::Completed(summary) => {
            assert_eq!(summary.file_name, "run01.raw");
            assert_eq!(summary.final_spectrum_count, 9);
            // First spectrum seen at 10 s with a retention time of 6 s.
            assert_close(summary.dead_time_secs, 4.0);
        }
        other => panic!("expected completion, got {:?}", other),
    }
    assert_eq!(kinds(&sink).last(), Some(&"complete"));
}
