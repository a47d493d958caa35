//! Sidecar lifecycle against real child processes.

#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tier_client::sidecar::{HealthCheck, SidecarConfig, SidecarManager, SidecarState, Signal};

/// Write an executable stand-in for `tier` that ignores its arguments.
fn fake_tier(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("tier");
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn config(program: PathBuf, health_check: HealthCheck, timeout: Duration) -> SidecarConfig {
    SidecarConfig {
        program,
        health_check,
        startup_timeout: timeout,
        health_poll_interval: Duration::from_millis(20),
        ..Default::default()
    }
}

/// Poll until child `pid` has exited, reaping it if nobody else has.
async fn child_exited(pid: u32) -> bool {
    let pid = pid as libc::pid_t;
    for _ in 0..100 {
        let mut status = 0;
        // SAFETY: waitpid only writes to `status`.
        let rc = unsafe { libc::waitpid(pid, &mut status, libc::WNOHANG) };
        if rc == pid {
            return true;
        }
        if rc == -1 {
            // Already reaped by the runtime.
            return std::io::Error::last_os_error().raw_os_error() == Some(libc::ECHILD);
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}

#[tokio::test]
async fn missing_program_is_spawn_failure() {
    let manager = SidecarManager::new(config(
        PathBuf::from("/nonexistent/bin/tier"),
        HealthCheck::None,
        Duration::from_secs(1),
    ));

    let err = manager.ensure_ready().await.unwrap_err();

    assert!(err.is_spawn_failure(), "got {err:?}");
    assert_eq!(manager.tracked_pid(), None);
    assert_eq!(manager.state(), SidecarState::Failed);
}

#[tokio::test]
async fn process_exiting_during_startup_is_spawn_failure() {
    let dir = tempfile::tempdir().unwrap();
    let program = fake_tier(dir.path(), "exit 3");
    let manager = SidecarManager::new(config(program, HealthCheck::Tcp, Duration::from_secs(5)));

    let err = manager.ensure_ready().await.unwrap_err();

    assert!(err.is_spawn_failure(), "got {err:?}");
    assert_eq!(manager.tracked_pid(), None);
}

#[tokio::test]
async fn unready_process_times_out_and_is_killed() {
    let dir = tempfile::tempdir().unwrap();
    let program = fake_tier(dir.path(), "exec sleep 30");
    let manager =
        SidecarManager::new(config(program, HealthCheck::Tcp, Duration::from_millis(500)));

    let starting = {
        let manager = manager.clone();
        tokio::spawn(async move { manager.ensure_ready().await })
    };

    let mut pid = None;
    for _ in 0..100 {
        pid = manager.tracked_pid();
        if pid.is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    let pid = pid.expect("sidecar pid was never tracked");

    let err = starting.await.unwrap().unwrap_err();

    assert!(err.is_timeout(), "got {err:?}");
    assert_eq!(manager.tracked_pid(), None);
    assert_eq!(manager.state(), SidecarState::Failed);
    assert!(child_exited(pid).await, "timed out sidecar pid {pid} still running");
}

#[tokio::test]
async fn ready_process_is_tracked_then_signaled_once() {
    let dir = tempfile::tempdir().unwrap();
    let program = fake_tier(dir.path(), "exec sleep 30");
    let manager = SidecarManager::new(config(program, HealthCheck::None, Duration::from_secs(5)));

    let endpoint = manager.ensure_ready().await.unwrap();
    let again = manager.ensure_ready().await.unwrap();

    assert_eq!(endpoint, again);
    assert_eq!(endpoint.host, "127.0.0.1");
    assert_ne!(endpoint.port, 0);
    assert_eq!(manager.state(), SidecarState::Ready);
    let pid = manager.tracked_pid().unwrap();

    manager.handle_exit(Some(Signal::Term));
    assert_eq!(manager.tracked_pid(), None);
    assert!(child_exited(pid).await, "sidecar pid {pid} survived SIGTERM");

    // Nothing left to signal.
    manager.handle_exit(None);
    assert_eq!(manager.tracked_pid(), None);
}
