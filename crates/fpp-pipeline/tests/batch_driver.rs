mod common;

use std::fs;
use std::path::PathBuf;

use common::{write_target, FakeBackend};
use fpp_core::FailureKind;
use fpp_pipeline::{
    run_batch, BatchReport, BatchSettings, InterruptFlag, RunOptions, TargetOutcome,
};

fn run(
    backend: &FakeBackend,
    targets: &[PathBuf],
    opts: &RunOptions,
) -> (Result<BatchReport, fpp_core::FppError>, String) {
    let mut out = Vec::new();
    let result = run_batch(
        backend,
        targets,
        opts,
        BatchSettings::default(),
        &backend.interrupt,
        &mut out,
    );
    (result, String::from_utf8(out).expect("utf8 summary"))
}

#[test]
fn failing_target_does_not_stop_the_batch() {
    let temp = tempfile::tempdir().expect("tmp dir");
    let names = ["KOI-1", "KOI-2", "KOI-3"];
    let targets: Vec<PathBuf> = names
        .iter()
        .map(|name| {
            let dir = temp.path().join(name);
            write_target(&dir, name);
            dir
        })
        .collect();
    let backend = FakeBackend {
        fail_load: vec!["KOI-2".to_string()],
        ..FakeBackend::new()
    };

    let (result, stdout) = run(&backend, &targets, &RunOptions::default());
    let report = result.expect("batch completes");

    assert_eq!(report.targets.len(), 3);
    assert_eq!(report.completed(), 2);
    match &report.targets[1].outcome {
        TargetOutcome::Failed { kind, error } => {
            assert_eq!(*kind, FailureKind::Unclassified);
            assert_eq!(error.info().code, "population_failed");
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("KOI-1 FPP: "));
    assert!(lines[1].starts_with("KOI-3 FPP: "));

    let log = fs::read_to_string(targets[1].join("run.log")).expect("failed target log");
    assert!(log.contains("target failed"));
    assert!(log.contains("population_failed"));
    assert!(log.contains("unclassified"));
}

#[test]
fn missing_photometry_fails_only_that_target() {
    let temp = tempfile::tempdir().expect("tmp dir");
    let first = temp.path().join("broken");
    let second = temp.path().join("good");
    write_target(&first, "KOI-BROKEN");
    fs::remove_file(first.join("star.ini")).expect("remove star.ini");
    write_target(&second, "KOI-GOOD");
    let backend = FakeBackend::new();

    let (result, stdout) = run(&backend, &[first.clone(), second], &RunOptions::default());
    let report = result.expect("batch completes");

    assert!(matches!(
        report.targets[0].outcome,
        TargetOutcome::Failed {
            kind: FailureKind::Configuration,
            ..
        }
    ));
    match &report.targets[1].outcome {
        TargetOutcome::Completed(summary) => assert!(summary.fpp > 0.0 && summary.fpp < 1.0),
        other => panic!("unexpected outcome {other:?}"),
    }
    assert_eq!(stdout.lines().count(), 1);
    assert!(stdout.starts_with("KOI-GOOD FPP: "));
    let log = fs::read_to_string(first.join("run.log")).expect("log");
    assert!(log.contains("photometry_read"));
}

#[test]
fn valid_cached_target_prints_one_line_without_rework() {
    let temp = tempfile::tempdir().expect("tmp dir");
    let dir = temp.path().join("koi");
    write_target(&dir, "KOI-7");
    let backend = FakeBackend::new();
    let targets = vec![dir];
    run(&backend, &targets, &RunOptions::default()).0.expect("warm run");
    backend.calls.clear();

    let (result, stdout) = run(&backend, &targets, &RunOptions::default());
    result.expect("cached run");

    assert_eq!(stdout.lines().count(), 1);
    assert_eq!(backend.calls.count("refit"), 0);
    assert_eq!(backend.calls.count("signal_corner"), 0);
    assert_eq!(backend.calls.count("star_corners"), 0);
    assert_eq!(backend.calls.count("load:recalc=true"), 0);
}

#[test]
fn interrupt_aborts_remaining_targets() {
    let temp = tempfile::tempdir().expect("tmp dir");
    let names = ["KOI-1", "KOI-2", "KOI-3"];
    let targets: Vec<PathBuf> = names
        .iter()
        .map(|name| {
            let dir = temp.path().join(name);
            write_target(&dir, name);
            dir
        })
        .collect();
    let backend = FakeBackend {
        interrupt_compute: vec!["KOI-2".to_string()],
        ..FakeBackend::new()
    };

    let (result, stdout) = run(&backend, &targets, &RunOptions::default());

    let err = result.unwrap_err();
    assert!(err.is_interrupt());
    assert_eq!(stdout.lines().count(), 1);
    assert_eq!(backend.calls.count("load:recalc=true:KOI-3"), 0);
    assert_eq!(backend.calls.count("load:recalc=false:KOI-3"), 0);
    assert!(!targets[2].join("run.log").exists());
    let log = fs::read_to_string(targets[1].join("run.log")).expect("log");
    assert!(log.contains("target interrupted"));
    assert!(!log.contains("target failed"));
}

#[test]
fn interrupt_during_final_target_still_aborts() {
    let temp = tempfile::tempdir().expect("tmp dir");
    let dir = temp.path().join("K1");
    write_target(&dir, "K1");
    let backend = FakeBackend {
        interrupt_corners: vec!["mist_starmodel_triple.h5".to_string()],
        ..FakeBackend::new()
    };

    let (result, stdout) = run(&backend, &[dir.clone()], &RunOptions::default());

    assert!(result.unwrap_err().is_interrupt());
    assert!(stdout.is_empty());
    let log = fs::read_to_string(dir.join("run.log")).expect("log");
    assert!(log.contains("target interrupted"));
}

#[test]
fn logs_stay_with_their_target() {
    let temp = tempfile::tempdir().expect("tmp dir");
    let a = temp.path().join("a");
    let b = temp.path().join("b");
    write_target(&a, "KOI-A");
    write_target(&b, "KOI-B");
    let backend = FakeBackend::new();

    run(&backend, &[a.clone(), b.clone()], &RunOptions::default())
        .0
        .expect("batch");

    let log_a = fs::read_to_string(a.join("run.log")).expect("log a");
    let log_b = fs::read_to_string(b.join("run.log")).expect("log b");
    assert!(log_a.contains("KOI-A"));
    assert!(!log_a.contains("KOI-B"));
    assert!(log_b.contains("KOI-B"));
    assert!(!log_b.contains("KOI-A"));
    assert_eq!(log_a.matches("processing target").count(), 1);
    assert_eq!(log_b.matches("processing target").count(), 1);
}

#[test]
fn newlog_truncates_and_default_appends() {
    let temp = tempfile::tempdir().expect("tmp dir");
    let dir = temp.path().join("koi");
    write_target(&dir, "KOI-9");
    let backend = FakeBackend::new();
    let targets = vec![dir.clone()];

    run(&backend, &targets, &RunOptions::default()).0.expect("first");
    run(&backend, &targets, &RunOptions::default()).0.expect("second");
    let appended = fs::read_to_string(dir.join("run.log")).expect("log");
    assert_eq!(appended.matches("processing target").count(), 2);

    let fresh = RunOptions {
        newlog: true,
        ..RunOptions::default()
    };
    run(&backend, &targets, &fresh).0.expect("fresh");
    let truncated = fs::read_to_string(dir.join("run.log")).expect("log");
    assert_eq!(truncated.matches("processing target").count(), 1);
}

#[test]
fn debug_flag_records_skipped_stages() {
    let temp = tempfile::tempdir().expect("tmp dir");
    let dir = temp.path().join("koi");
    write_target(&dir, "KOI-9");
    let backend = FakeBackend::new();
    let targets = vec![dir.clone()];
    run(&backend, &targets, &RunOptions::default()).0.expect("first");
    let quiet = fs::read_to_string(dir.join("run.log")).expect("log");
    assert!(!quiet.contains("DEBUG"));

    let debug = RunOptions {
        debug: true,
        newlog: true,
        ..RunOptions::default()
    };
    run(&backend, &targets, &debug).0.expect("debug run");
    let verbose = fs::read_to_string(dir.join("run.log")).expect("log");
    assert!(verbose.contains("outputs reusable, skipping"));
    assert!(verbose.contains("log session bound"));
    assert!(verbose.contains("level=DEBUG") || verbose.contains("level=debug"));
}

#[test]
fn report_round_trips_through_disk() {
    let temp = tempfile::tempdir().expect("tmp dir");
    let dir = temp.path().join("koi");
    write_target(&dir, "KOI-5");
    let backend = FakeBackend::new();
    let (result, _) = run(&backend, &[dir], &RunOptions::default());
    let report = result.expect("batch");

    let path = temp.path().join("report.json");
    report.write(&path).expect("write report");
    let loaded = BatchReport::load(&path).expect("load report");

    assert_eq!(loaded.provenance, report.provenance);
    assert_eq!(loaded.completed(), 1);
    match (&loaded.targets[0].outcome, &report.targets[0].outcome) {
        (TargetOutcome::Completed(a), TargetOutcome::Completed(b)) => {
            assert_eq!(a.name, b.name);
            assert_eq!(a.stages_run, b.stages_run);
            assert!((a.fpp - b.fpp).abs() < 1e-12);
        }
        other => panic!("unexpected outcomes {other:?}"),
    }
    assert_eq!(loaded.provenance.tool_versions.len(), 1);
    assert_eq!(loaded.provenance.options_hash.len(), 64);
}

#[test]
fn report_from_another_major_schema_is_rejected() {
    let temp = tempfile::tempdir().expect("tmp dir");
    let dir = temp.path().join("koi");
    write_target(&dir, "KOI-6");
    let backend = FakeBackend::new();
    let report = run(&backend, &[dir], &RunOptions::default()).0.expect("batch");
    let path = temp.path().join("report.json");
    report.write(&path).expect("write report");

    let text = fs::read_to_string(&path).expect("read report");
    assert!(text.contains("\"major\":1"));
    fs::write(&path, text.replace("\"major\":1", "\"major\":2")).expect("edit report");

    let err = BatchReport::load(&path).unwrap_err();
    assert_eq!(err.info().code, "report_schema");
    assert_eq!(err.info().context.get("found").map(String::as_str), Some("2.0.0"));
}
