#![allow(dead_code)]

use serde_json::{json, Value};
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use tempfile::TempDir;

pub const DEMO_PASSWORD: &str = "1234";

/// A running `homeworkd` speaking JSON lines over stdio, bound to a fresh
/// workspace that is removed on drop.
pub struct Sidecar {
    child: Child,
    stdin: ChildStdin,
    reader: BufReader<ChildStdout>,
    next_id: u64,
    pub workspace: TempDir,
}

impl Sidecar {
    pub fn start() -> Sidecar {
        let workspace = tempfile::tempdir().expect("temp workspace");
        let mut sidecar = Sidecar::spawn_bare(workspace);
        let path = sidecar.workspace.path().to_string_lossy().to_string();
        sidecar.ok(None, "workspace.select", json!({ "path": path }));
        sidecar
    }

    /// Spawned without a workspace selected.
    pub fn spawn_bare(workspace: TempDir) -> Sidecar {
        let exe = env!("CARGO_BIN_EXE_homeworkd");
        let mut child = Command::new(exe)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .env_remove("HOMEWORK_WORKSPACE")
            .spawn()
            .expect("spawn homeworkd");
        let stdin = child.stdin.take().expect("child stdin");
        let stdout = child.stdout.take().expect("child stdout");
        Sidecar {
            child,
            stdin,
            reader: BufReader::new(stdout),
            next_id: 0,
            workspace,
        }
    }

    pub fn raw_line(&mut self, line: &str) -> Value {
        writeln!(self.stdin, "{line}").expect("write request");
        self.stdin.flush().expect("flush request");
        let mut out = String::new();
        self.reader.read_line(&mut out).expect("read response line");
        assert!(!out.trim().is_empty(), "empty response for {line}");
        serde_json::from_str(out.trim()).expect("parse response json")
    }

    /// Sends one action; `token` overrides the remembered session.
    pub fn request(&mut self, token: Option<&str>, action: &str, params: Value) -> Value {
        self.next_id += 1;
        let id = format!("t{}", self.next_id);
        let mut payload = json!({ "action": action, "requestId": id });
        if let Some(t) = token {
            payload["token"] = json!(t);
        }
        if let (Some(obj), Value::Object(extra)) = (payload.as_object_mut(), params) {
            obj.extend(extra);
        }
        let value = self.raw_line(&payload.to_string());
        assert_eq!(value["requestId"], id.as_str());
        assert_ne!(value["errorCode"], "UNKNOWN_ACTION", "unknown action {action}");
        value
    }

    /// Expects success and returns `data` (null when absent).
    pub fn ok(&mut self, token: Option<&str>, action: &str, params: Value) -> Value {
        let resp = self.request(token, action, params);
        assert_eq!(resp["success"], true, "{action} failed: {resp}");
        resp.get("data").cloned().unwrap_or(Value::Null)
    }

    /// Expects failure and returns the whole envelope.
    pub fn fail(&mut self, token: Option<&str>, action: &str, params: Value) -> Value {
        let resp = self.request(token, action, params);
        assert_eq!(resp["success"], false, "{action} unexpectedly succeeded: {resp}");
        resp
    }

    pub fn login(&mut self, email: &str) -> String {
        let data = self.ok(
            None,
            "login",
            json!({ "email": email, "password": DEMO_PASSWORD }),
        );
        data["token"].as_str().expect("token").to_string()
    }
}

impl Drop for Sidecar {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
