//! Remote command-line inspection against a real child process.
//!
//! These tests exercise the PEB walk end-to-end, so they only run on
//! Windows; the crate's non-Windows stubs are covered by the unit tests.
#![cfg(windows)]

use std::process::{Command, Stdio};
use std::time::Duration;

use shell_process_monitor::identify;

/// Spawns a `cmd.exe` that blocks reading from a pipe we never write to,
/// keeping a live process with a known command line around.
fn spawn_marked_child(marker: &str) -> std::process::Child {
    Command::new("cmd.exe")
        .args(["/d", "/q", "/k", "rem", marker])
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("failed to spawn cmd.exe")
}

#[test]
fn reads_the_command_line_of_a_live_child() {
    let marker = "shell-process-monitor-itest-marker";
    let mut child = spawn_marked_child(marker);

    // The parameters block is set up at process creation, but give a slow
    // machine a little slack before giving up.
    let mut command_line = None;
    for _ in 0..20 {
        command_line = identify::command_line_of(child.id());
        if command_line.is_some() {
            break;
        }
        std::thread::sleep(Duration::from_millis(50));
    }

    let _ = child.kill();
    let _ = child.wait();

    let command_line = command_line.expect("command line of a live child must be readable");
    assert!(
        command_line.to_lowercase().contains(marker),
        "marker argument missing from remote command line: {command_line:?}"
    );
    // A plain cmd.exe is of course not a factory host.
    assert!(!identify::is_factory_command_line(&command_line));
}

#[test]
fn an_exited_child_is_never_classified_as_factory() {
    let mut child = Command::new("cmd.exe")
        .args(["/d", "/c", "exit"])
        .spawn()
        .expect("failed to spawn cmd.exe");
    let pid = child.id();
    child.wait().expect("child did not exit");

    assert_eq!(identify::command_line_of(pid), None);
    assert!(!identify::is_factory_process(pid));
}
