#![cfg(unix)]

use std::path::PathBuf;
use std::process::Command;

fn pclipsync() -> Command {
    Command::new(env!("CARGO_BIN_EXE_pclipsync"))
}

fn unique_socket_path(tag: &str) -> PathBuf {
    std::env::temp_dir().join(format!(
        "pclipsync-cli-{tag}-{}-{}.sock",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ))
}

#[test]
fn missing_mode_is_a_usage_error() {
    let output = pclipsync()
        .args(["--socket", "/tmp/unused.sock"])
        .output()
        .expect("binary should run");
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn both_modes_is_a_usage_error() {
    let output = pclipsync()
        .args(["--server", "--client", "--socket", "/tmp/unused.sock"])
        .output()
        .expect("binary should run");
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn missing_socket_is_a_usage_error() {
    let output = pclipsync()
        .args(["--server"])
        .output()
        .expect("binary should run");
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("--socket"));
}

#[test]
fn help_exits_zero_and_names_both_modes() {
    let output = pclipsync().arg("--help").output().expect("binary should run");
    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("--server"));
    assert!(stdout.contains("--client"));
    assert!(stdout.contains("--socket"));
}

#[test]
fn server_without_display_fails_fast() {
    let socket = unique_socket_path("server-nodisplay");
    let output = pclipsync()
        .args(["--server", "--socket"])
        .arg(&socket)
        .env_remove("DISPLAY")
        .output()
        .expect("binary should run");

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("DISPLAY"));
    // The X check runs before the bind, so no socket file is left behind.
    assert!(!socket.exists());
}

#[test]
fn client_without_display_fails_fast() {
    let socket = unique_socket_path("client-nodisplay");
    let output = pclipsync()
        .args(["--client", "--socket"])
        .arg(&socket)
        .env_remove("DISPLAY")
        .output()
        .expect("binary should run");

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("DISPLAY"));
}
