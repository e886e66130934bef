//! End-to-end run tests against stub stage executables.
//!
//! Each test builds a directory of shell-script stages that honor the
//! positional-argument contracts, then drives a full run through
//! `execute_run` and inspects the working tree and delivered output.

#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use tempfile::tempdir;

use diarsplit::logging::LogConfig;
use diarsplit::run::{execute_run, RunOptions, JOBS_DIR, RUN_REPORT_FILE};

fn write_stage(dir: &Path, name: &str, body: &str) {
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    let mut perms = fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms).unwrap();
}

/// Install the full stub stage set into `dir`.
///
/// `detect_body` lets a test substitute a failing detector.
fn install_stages(dir: &Path, detect_body: &str) {
    write_stage(dir, "diar-probe", r#"echo "1500.00 16000""#);
    write_stage(
        dir,
        "diar-split",
        r#"base=$(basename "$1" .wav)
for i in 001 002 003; do
  cp "$1" "$2/${base}_${i}.wav"
done"#,
    );
    write_stage(dir, "diar-detect", detect_body);
    write_stage(dir, "diar-bicseg", r#"cp "$4" "$2""#);
    write_stage(
        dir,
        "diar-cluster",
        r#"base=$(basename "$1" .wav)
printf '0.0 4.5 spk1\n' > "$4/${base}.c.seg"
printf '0.0 2.0 spk1\n' > "$4/${base}.rc.c.seg""#,
    );
    write_stage(
        dir,
        "diar-rescore",
        r#"base=$(basename "$1" .wav)
while read f; do cat "$f"; done < "$2" > "$4/${base}.merged.seg""#,
    );
    write_stage(
        dir,
        "diar-crossval",
        r#"base=$(basename "$1" .wav)
cp "$2" "$4/${base}.final.seg""#,
    );
}

const DETECT_OK: &str = r#"printf '0.0 4.5 speech\n' > "$2""#;

/// Detector that fails for the second segment only.
const DETECT_FAILS_002: &str = r#"case "$1" in
  *_002*) echo "model blew up" >&2; exit 3;;
esac
printf '0.0 4.5 speech\n' > "$2""#;

fn options(root: &Path, stage_dir: &Path, recording: &Path) -> RunOptions {
    RunOptions {
        recording: recording.to_path_buf(),
        output: root.join("out/final.seg"),
        work_root: root.join("work"),
        use_changepoint: false,
        concurrency: 2,
        segment_duration_secs: 600,
        poll_interval_ms: 5,
        stage_dir: stage_dir.display().to_string(),
        log_config: LogConfig::default(),
    }
}

fn make_recording(root: &Path) -> PathBuf {
    let recording = root.join("rec.wav");
    fs::write(&recording, b"fake audio payload").unwrap();
    recording
}

#[test]
fn full_run_delivers_final_segmentation() {
    let root = tempdir().unwrap();
    let stage_dir = tempdir().unwrap();
    install_stages(stage_dir.path(), DETECT_OK);
    let recording = make_recording(root.path());

    let opts = options(root.path(), stage_dir.path(), &recording);
    let summary = execute_run(&opts).unwrap();

    assert_eq!(summary.segments_total, 3);
    assert_eq!(summary.jobs_done, 3);
    assert_eq!(summary.jobs_failed, 0);

    // Merged output concatenates one clustered line per segment.
    let delivered = fs::read_to_string(&summary.output).unwrap();
    assert_eq!(delivered.lines().count(), 3);

    // The clustered manifest never lists re-cluster refinements.
    let manifest = fs::read_to_string(opts.work_root.join("rec.clustered.scp")).unwrap();
    assert_eq!(manifest.lines().count(), 3);
    assert!(!manifest.contains(".rc.c.seg"));

    // Per-job logs exist and recorded every stage invocation.
    let job_dir = opts.work_root.join(JOBS_DIR).join("rec").join("rec_001");
    let log = fs::read_to_string(job_dir.join("rec_001.log")).unwrap();
    assert!(log.contains("=== Detect ==="));
    assert!(log.contains("=== Cluster ==="));
    assert!(log.contains("ChangePoint skipped"));

    let report = fs::read_to_string(opts.work_root.join(RUN_REPORT_FILE)).unwrap();
    assert!(report.contains("\"jobs_done\": 3"));
}

#[test]
fn changepoint_runs_when_enabled() {
    let root = tempdir().unwrap();
    let stage_dir = tempdir().unwrap();
    install_stages(stage_dir.path(), DETECT_OK);
    let recording = make_recording(root.path());

    let mut opts = options(root.path(), stage_dir.path(), &recording);
    opts.use_changepoint = true;

    let summary = execute_run(&opts).unwrap();
    assert_eq!(summary.jobs_done, 3);

    let job_dir = opts.work_root.join(JOBS_DIR).join("rec").join("rec_002");
    assert!(job_dir.join("rec_002.bic.seg").exists());

    let log = fs::read_to_string(job_dir.join("rec_002.log")).unwrap();
    assert!(!log.contains("ChangePoint skipped"));
}

#[test]
fn failed_segment_is_excluded_not_fatal() {
    let root = tempdir().unwrap();
    let stage_dir = tempdir().unwrap();
    install_stages(stage_dir.path(), DETECT_FAILS_002);
    let recording = make_recording(root.path());

    let opts = options(root.path(), stage_dir.path(), &recording);
    let summary = execute_run(&opts).unwrap();

    assert_eq!(summary.segments_total, 3);
    assert_eq!(summary.jobs_done, 2);
    assert_eq!(summary.jobs_failed, 1);

    // The failed segment contributes nothing to the output.
    let delivered = fs::read_to_string(&summary.output).unwrap();
    assert_eq!(delivered.lines().count(), 2);

    // The report names the failed segment and the stage exit code.
    let report = fs::read_to_string(&summary.report_path).unwrap();
    assert!(report.contains("rec_002"));
    assert!(report.contains("exit code 3"));

    // The failing stage's stderr landed in the job log.
    let job_dir = opts.work_root.join(JOBS_DIR).join("rec").join("rec_002");
    let log = fs::read_to_string(job_dir.join("rec_002.log")).unwrap();
    assert!(log.contains("model blew up"));
}

#[test]
fn missing_stage_aborts_before_any_work() {
    let root = tempdir().unwrap();
    let stage_dir = tempdir().unwrap();
    install_stages(stage_dir.path(), DETECT_OK);
    fs::remove_file(stage_dir.path().join("diar-cluster")).unwrap();
    let recording = make_recording(root.path());

    let opts = options(root.path(), stage_dir.path(), &recording);
    let err = execute_run(&opts).unwrap_err();
    assert!(err.to_string().contains("diar-cluster"));

    // Preflight failed before the working tree was touched.
    assert!(!opts.work_root.exists());
}

#[test]
fn stale_work_root_is_replaced() {
    let root = tempdir().unwrap();
    let stage_dir = tempdir().unwrap();
    install_stages(stage_dir.path(), DETECT_OK);
    let recording = make_recording(root.path());

    let opts = options(root.path(), stage_dir.path(), &recording);

    // Leftovers from an earlier run.
    let stale = opts.work_root.join(JOBS_DIR).join("rec").join("rec_009");
    fs::create_dir_all(&stale).unwrap();
    fs::write(stale.join("rec_009.c.seg"), "0.0 1.0 ghost\n").unwrap();

    let summary = execute_run(&opts).unwrap();
    assert_eq!(summary.jobs_done, 3);
    assert!(!stale.exists());

    let delivered = fs::read_to_string(&summary.output).unwrap();
    assert!(!delivered.contains("ghost"));
}
