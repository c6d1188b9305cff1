// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test harness: spawn `fpd` against a temp state dir with a stub shell
//! runtime standing in for bun.

use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::Duration;
use tempfile::TempDir;

/// Fake runtime binary: skips `--preload <file>` and execs the worker
/// script with sh, exactly where a real bun would exec the worker entry.
const FAKE_RUNTIME: &str = r#"#!/bin/sh
while [ "$1" = "--preload" ]; do shift 2; done
exec /bin/sh "$1"
"#;

/// Stub worker: speaks just enough NDJSON to pass the ready handshake and
/// answer every invoke with base64("hello").
const STUB_WORKER: &str = r#"#!/bin/sh
printf '{"id":"%s","type":"ready","payload":{}}\n' "$WORKER_ID"
while IFS= read -r line; do
  id=$(printf '%s' "$line" | sed -n 's/.*"id":"\([^"]*\)".*/\1/p')
  printf '{"id":"%s","type":"response","payload":{"status":200,"headers":{},"body":"aGVsbG8="}}\n' "$id"
done
"#;

pub struct DaemonHandle {
    pub child: Child,
    pub state_dir: TempDir,
    pub http_base: String,
}

impl DaemonHandle {
    pub fn socket_path(&self) -> PathBuf {
        self.state_dir.path().join("fpd.sock")
    }

    pub fn terminate(&mut self) {
        let _ = Command::new("kill")
            .arg("-TERM")
            .arg(self.child.id().to_string())
            .status();
    }

    /// Wait (bounded) for the daemon process to exit.
    pub fn wait_exit(&mut self) -> bool {
        for _ in 0..100 {
            if let Ok(Some(_)) = self.child.try_wait() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(50));
        }
        false
    }
}

impl Drop for DaemonHandle {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

fn write_executable(path: &PathBuf, contents: &str) {
    let mut file = std::fs::File::create(path).expect("script file");
    file.write_all(contents.as_bytes()).expect("script body");
    drop(file);
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).expect("chmod");
}

fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("probe port");
    listener.local_addr().expect("probe addr").port()
}

/// Spawn `fpd` with the stub runtime and wait until its health endpoint
/// answers.
pub async fn spawn_daemon() -> DaemonHandle {
    let state_dir = TempDir::new().expect("state dir");
    let fake_runtime = state_dir.path().join("fakebun");
    let worker_script = state_dir.path().join("worker.sh");
    write_executable(&fake_runtime, FAKE_RUNTIME);
    write_executable(&worker_script, STUB_WORKER);

    let port = free_port();
    let http_base = format!("http://127.0.0.1:{}", port);
    let child = Command::new(assert_cmd::cargo::cargo_bin("fpd"))
        .env("FP_STATE_DIR", state_dir.path())
        .env("FP_HTTP_ADDR", format!("127.0.0.1:{}", port))
        .env("FP_BUN_PROGRAM", &fake_runtime)
        .env("FP_WORKER_SCRIPT", &worker_script)
        .env("FP_SANDBOX_SCRIPT", &worker_script)
        .env("FP_PORT_COUNT", "2")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn fpd");

    let handle = DaemonHandle { child, state_dir, http_base };
    wait_for_health(&handle).await;
    handle
}

async fn wait_for_health(handle: &DaemonHandle) {
    let client = reqwest::Client::new();
    for _ in 0..100 {
        if let Ok(response) =
            client.get(format!("{}/v1/health", handle.http_base)).send().await
        {
            if response.status().is_success() {
                return;
            }
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    panic!("fpd never became healthy");
}
