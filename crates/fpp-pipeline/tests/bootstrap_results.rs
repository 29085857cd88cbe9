mod common;

use common::{write_target, FakeBackend};
use fpp_core::derive_substream_seed;
use fpp_pipeline::{run_target, BootstrapResult, InterruptFlag, RunOptions, StageKind};

fn bootstrap_options(resamples: usize, seed: u64) -> RunOptions {
    RunOptions {
        bootstrap: resamples,
        seed,
        ..RunOptions::default()
    }
}

#[test]
fn zero_resamples_writes_nothing() {
    let temp = tempfile::tempdir().expect("tmp dir");
    write_target(temp.path(), "KOI-1");
    let backend = FakeBackend::new();

    let summary =
        run_target(&backend, temp.path(), &bootstrap_options(0, 3), &InterruptFlag::new()).expect("run");

    assert!(summary.bootstrap.is_none());
    assert!(!summary.stages_run.contains(&StageKind::Bootstrap));
    assert!(!temp.path().join("results_bootstrap.txt").exists());
    assert_eq!(backend.calls.count("resample"), 0);
}

#[test]
fn resample_count_matches_request() {
    let temp = tempfile::tempdir().expect("tmp dir");
    write_target(temp.path(), "KOI-1");
    let backend = FakeBackend::new();

    let summary =
        run_target(&backend, temp.path(), &bootstrap_options(7, 11), &InterruptFlag::new()).expect("run");

    let stats = summary.bootstrap.expect("bootstrap summary");
    assert_eq!(stats.count, 7);
    assert!(stats.q16 <= stats.q50 && stats.q50 <= stats.q84);
    let loaded =
        BootstrapResult::load(&temp.path().join("results_bootstrap.txt")).expect("load results");
    assert_eq!(loaded.values.len(), 7);
    assert_eq!(loaded.name, "KOI-1");
    assert_eq!(loaded.seed, 11);
    assert!(loaded.values.iter().all(|fpp| (0.0..=1.0).contains(fpp)));
    assert_eq!(backend.calls.count("resample"), 7);
    assert_eq!(backend.calls.count("compute:recalc=true"), 8);
}

#[test]
fn seeds_are_derived_per_iteration() {
    let temp = tempfile::tempdir().expect("tmp dir");
    write_target(temp.path(), "KOI-1");
    let backend = FakeBackend::new();

    run_target(&backend, temp.path(), &bootstrap_options(3, 42), &InterruptFlag::new()).expect("run");

    let resamples: Vec<String> = backend
        .calls
        .entries()
        .into_iter()
        .filter(|entry| entry.starts_with("resample"))
        .collect();
    let expected: Vec<String> = (0..3)
        .map(|i| format!("resample:{}:KOI-1", derive_substream_seed(42, i)))
        .collect();
    assert_eq!(resamples, expected);
}

#[test]
fn same_seed_gives_same_distribution() {
    let first = tempfile::tempdir().expect("tmp dir");
    let second = tempfile::tempdir().expect("tmp dir");
    write_target(first.path(), "KOI-1");
    write_target(second.path(), "KOI-1");
    let opts = bootstrap_options(5, 9);

    run_target(&FakeBackend::new(), first.path(), &opts, &InterruptFlag::new()).expect("first");
    run_target(&FakeBackend::new(), second.path(), &opts, &InterruptFlag::new()).expect("second");

    let a = std::fs::read_to_string(first.path().join("results_bootstrap.txt")).expect("a");
    let b = std::fs::read_to_string(second.path().join("results_bootstrap.txt")).expect("b");
    assert_eq!(a, b);
}

#[test]
fn malformed_rows_are_rejected() {
    let temp = tempfile::tempdir().expect("tmp dir");
    let path = temp.path().join("results_bootstrap.txt");
    std::fs::write(&path, "# name: x\niteration fpp\n0 0.1\n1 oops\n").expect("write");
    let err = BootstrapResult::load(&path).unwrap_err();
    assert_eq!(err.info().code, "bootstrap_malformed");
    assert_eq!(err.info().context.get("line").map(String::as_str), Some("4"));
}

#[test]
fn rendered_text_starts_with_header() {
    let result = BootstrapResult::new("KOI-3", 1, vec![0.1, 0.2, 0.3]);
    let text = result.render();
    let mut lines = text.lines();
    assert_eq!(lines.next(), Some("# name: KOI-3"));
    assert_eq!(lines.next(), Some("# resamples: 3"));
    assert!(text.contains("# median: 0.2\n"));
    assert!(text.ends_with("iteration fpp\n0 0.1\n1 0.2\n2 0.3\n"));
}
