//! End-to-end tests for the runlimit binary
//!
//! These drive the built binary the way the grading sandbox does and check
//! the exit-code contract: child code on completion, 124 on timeout.

use std::process::{Command, Output};
use std::time::{Duration, Instant};

fn runlimit() -> Command {
    Command::new(env!("CARGO_BIN_EXE_runlimit"))
}

fn run(args: &[&str]) -> Output {
    runlimit()
        .args(args)
        .env_remove("RUNLIMIT_CONFIG")
        .output()
        .expect("failed to launch runlimit")
}

#[test]
fn test_exit_code_transparency_for_all_codes() {
    for code in 0..=255 {
        let script = format!("exit {}", code);
        let out = run(&["5", "--", "sh", "-c", &script]);
        assert_eq!(out.status.code(), Some(code), "exit code {} not passed through", code);
        assert!(out.stdout.is_empty());
    }
}

#[test]
fn test_false_exits_one_without_message() {
    let out = run(&["5", "--", "false"]);
    assert_eq!(out.status.code(), Some(1));
    assert!(out.stdout.is_empty());
}

#[test]
fn test_sleep_past_limit_is_killed_with_124() {
    let start = Instant::now();
    let out = run(&["2", "--", "sleep", "5"]);
    let elapsed = start.elapsed();

    assert_eq!(out.status.code(), Some(124));
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert_eq!(stdout.trim(), "Time limit of 2 seconds exceeded");
    assert!(elapsed >= Duration::from_secs(2));
    assert!(elapsed < Duration::from_secs(4), "took {:?}", elapsed);
}

#[test]
fn test_largest_time_limit_runs_to_completion() {
    let out = run(&["18446744073709551615", "--", "true"]);
    assert_eq!(out.status.code(), Some(0));
    assert!(out.stdout.is_empty());
}

#[test]
fn test_unsatisfiable_ceiling_still_times_out() {
    let start = Instant::now();
    let out = run(&[
        "1",
        "64",
        "18446744073709551614",
        "18446744073709551614",
        "--",
        "sleep",
        "5",
    ]);
    assert_eq!(out.status.code(), Some(124));
    assert!(start.elapsed() < Duration::from_secs(3), "took {:?}", start.elapsed());
}

#[test]
fn test_child_output_is_not_captured() {
    let out = run(&["5", "--", "echo", "hello"]);
    assert_eq!(out.status.code(), Some(0));
    assert_eq!(String::from_utf8_lossy(&out.stdout), "hello\n");
}

#[test]
fn test_arguments_are_not_shell_expanded() {
    let out = run(&["5", "--", "echo", "$HOME", "*"]);
    assert_eq!(String::from_utf8_lossy(&out.stdout), "$HOME *\n");
}

#[test]
fn test_empty_command_is_usage_error() {
    let out = run(&["5", "--"]);
    assert_eq!(out.status.code(), Some(2));
    assert!(!out.stderr.is_empty());
    assert!(out.stdout.is_empty());
}

#[test]
fn test_non_positive_time_limit_is_usage_error() {
    for limit in ["0", "-1", "1.5", "soon"] {
        let out = run(&[limit, "--", "true"]);
        assert_eq!(out.status.code(), Some(2), "time limit {:?} accepted", limit);
    }
}

#[test]
fn test_malformed_invocation_spawns_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("spawned");
    let marker = marker.to_str().unwrap();

    let out = run(&["5", "10", "--", "touch", marker]);
    assert_eq!(out.status.code(), Some(2));
    assert!(!dir.path().join("spawned").exists());
}

#[test]
fn test_missing_program_exits_127() {
    let out = run(&["5", "--", "/nonexistent/runlimit-missing"]);
    assert_eq!(out.status.code(), Some(127));
    assert!(String::from_utf8_lossy(&out.stderr).contains("Failed to start"));
}

#[cfg(target_os = "linux")]
fn limit_line<'a>(limits: &'a str, name: &str) -> Vec<&'a str> {
    limits
        .lines()
        .find(|l| l.starts_with(name))
        .unwrap_or_else(|| panic!("no {} line in:\n{}", name, limits))[name.len()..]
        .split_whitespace()
        .collect()
}

#[cfg(target_os = "linux")]
#[test]
fn test_satisfiable_ceilings_are_enforced() {
    // No shell: cat execs directly so the process ceiling cannot get in the way.
    let out = run(&[
        "5",
        "64",
        "8388608",
        "1073741824",
        "--",
        "cat",
        "/proc/self/limits",
    ]);
    assert_eq!(out.status.code(), Some(0));

    let limits = String::from_utf8_lossy(&out.stdout);
    assert_eq!(&limit_line(&limits, "Max processes")[..2], &["64", "64"]);
    assert_eq!(&limit_line(&limits, "Max stack size")[..2], &["8388608", "8388608"]);
    // Linux has no RLIMIT_VMEM; the ceiling lands on RLIMIT_AS.
    assert_eq!(
        &limit_line(&limits, "Max address space")[..2],
        &["1073741824", "1073741824"]
    );
}

#[test]
fn test_process_ceiling_bounds_fork_bomb() {
    let start = Instant::now();
    let out = run(&[
        "5",
        "1",
        "8388608",
        "1073741824",
        "--",
        "sh",
        "-c",
        "for i in 1 2 3 4 5 6 7 8; do sleep 10 & done; wait",
    ]);

    // Unprivileged: fork fails and sh gives up. Root ignores RLIMIT_NPROC,
    // so the deadline is what stops it.
    assert_ne!(out.status.code(), Some(0));
    assert!(start.elapsed() < Duration::from_secs(8), "took {:?}", start.elapsed());
}

#[cfg(target_os = "linux")]
fn process_gone(pid: i32) -> bool {
    match std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
        Err(_) => true,
        // Field 3 is the state; a zombie is already dead.
        Ok(stat) => stat
            .rsplit(')')
            .next()
            .and_then(|rest| rest.split_whitespace().next())
            .map_or(true, |state| state == "Z" || state == "X"),
    }
}

#[cfg(target_os = "linux")]
#[test]
fn test_timeout_kills_background_descendants() {
    let dir = tempfile::tempdir().unwrap();
    let pid_file = dir.path().join("bg.pid");
    let script = format!("sleep 30 & echo $! > {}; wait", pid_file.display());

    let out = run(&["1", "--", "sh", "-c", &script]);
    assert_eq!(out.status.code(), Some(124));

    let pid: i32 = std::fs::read_to_string(&pid_file)
        .unwrap()
        .trim()
        .parse()
        .unwrap();

    let deadline = Instant::now() + Duration::from_secs(2);
    while !process_gone(pid) && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(20));
    }
    assert!(process_gone(pid), "background pid {} still running", pid);
}

#[test]
fn test_terminated_runner_kills_child() {
    let start = Instant::now();
    let child = runlimit()
        .args(["30", "--", "sleep", "30"])
        .env_remove("RUNLIMIT_CONFIG")
        .spawn()
        .unwrap();

    std::thread::sleep(Duration::from_millis(300));
    unsafe {
        libc::kill(child.id() as i32, libc::SIGTERM);
    }

    let out = child.wait_with_output().unwrap();
    assert_eq!(out.status.code(), Some(128 + libc::SIGTERM));
    assert!(start.elapsed() < Duration::from_secs(5));
}

#[test]
fn test_report_file_records_outcome() {
    let dir = tempfile::tempdir().unwrap();
    let report = dir.path().join("outcome.json");
    let report_arg = report.to_str().unwrap();

    let out = run(&["--report", report_arg, "5", "--", "sh", "-c", "exit 3"]);
    assert_eq!(out.status.code(), Some(3));

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&report).unwrap()).unwrap();
    assert_eq!(json["status"], "completed");
    assert_eq!(json["exit_code"], 3);

    let out = run(&["--report", report_arg, "1", "--", "sleep", "5"]);
    assert_eq!(out.status.code(), Some(124));
    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&report).unwrap()).unwrap();
    assert_eq!(json["status"], "timed_out");
}

#[test]
fn test_invalid_settings_file_fails_before_spawn() {
    let dir = tempfile::tempdir().unwrap();
    let settings = dir.path().join("settings.json");
    std::fs::write(&settings, r#"{"poll_interval_ms": 0}"#).unwrap();
    let marker = dir.path().join("spawned");

    let out = run(&[
        "--config",
        settings.to_str().unwrap(),
        "5",
        "--",
        "touch",
        marker.to_str().unwrap(),
    ]);
    assert_eq!(out.status.code(), Some(1));
    assert!(!marker.exists());
}

#[test]
fn test_settings_from_environment() {
    let dir = tempfile::tempdir().unwrap();
    let settings = dir.path().join("settings.json");
    std::fs::write(&settings, r#"{"poll_interval_ms": 50, "kill_process_group": false}"#)
        .unwrap();

    let out = runlimit()
        .args(["5", "--", "sh", "-c", "exit 9"])
        .env("RUNLIMIT_CONFIG", &settings)
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(9));
}
