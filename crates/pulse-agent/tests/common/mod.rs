#![allow(dead_code)]

use async_trait::async_trait;
use pulse_agent::dispatcher::{Backoff, BatchDispatcher, RetryPolicy};
use pulse_agent::transport::{Transport, TransportError};
use pulse_storage::queue::SqliteQueue;
use pulse_storage::DurableQueue;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

pub const CREDENTIAL: &str = "test-server-key";
pub const HOSTNAME: &str = "web-01";

/// What the scripted transport does on one call.
#[derive(Debug, Clone, Copy)]
pub enum Step {
    Status(u16),
    /// Fails immediately with a timeout error, without waiting for it.
    TimedOut,
    Hang,
}

#[derive(Debug, Clone)]
pub struct Call {
    pub credential: String,
    pub body: Vec<u8>,
}

impl Call {
    pub fn sequence_ids(&self) -> Vec<i64> {
        let items: Vec<Value> = serde_json::from_slice(&self.body).unwrap();
        items
            .iter()
            .map(|item| item["sequence_id"].as_i64().unwrap())
            .collect()
    }
}

/// Transport that plays back a fixed script, then repeats `fallback`.
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Step>>,
    fallback: Step,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedTransport {
    pub fn new(script: Vec<Step>, fallback: Step) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn always(step: Step) -> Self {
        Self::new(Vec::new(), step)
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn deliver(&self, body: &[u8], credential: &str) -> Result<u16, TransportError> {
        self.calls.lock().unwrap().push(Call {
            credential: credential.to_string(),
            body: body.to_vec(),
        });
        let step = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(self.fallback);
        match step {
            Step::Status(status) => Ok(status),
            Step::TimedOut => Err(TransportError::Timeout(Duration::ZERO)),
            Step::Hang => std::future::pending().await,
        }
    }
}

pub struct TestContext {
    pub temp_dir: TempDir,
    pub queue: Arc<SqliteQueue>,
    pub transport: Arc<ScriptedTransport>,
}

impl TestContext {
    pub fn dispatcher(&self, policy: RetryPolicy) -> BatchDispatcher {
        BatchDispatcher::new(
            self.queue.clone(),
            self.transport.clone(),
            CREDENTIAL.to_string(),
            HOSTNAME.to_string(),
            policy,
        )
    }

    pub fn enqueue(&self, n: i64) -> i64 {
        self.queue
            .enqueue(&sample_payload(n), 1_700_000_000 + n)
            .unwrap()
    }

    pub fn queued_ids(&self) -> Vec<i64> {
        self.queue
            .read_all()
            .unwrap()
            .into_iter()
            .map(|r| r.sequence_id)
            .collect()
    }
}

pub fn build_test_context(transport: ScriptedTransport) -> TestContext {
    let temp_dir = tempfile::tempdir().unwrap();
    let queue = Arc::new(SqliteQueue::open(&temp_dir.path().join("metrics.db")).unwrap());
    TestContext {
        temp_dir,
        queue,
        transport: Arc::new(transport),
    }
}

pub fn fixed_policy(attempts: u32, gap: Duration) -> RetryPolicy {
    RetryPolicy {
        attempts,
        gap,
        backoff: Backoff::Fixed,
        attempt_timeout: Duration::from_secs(10),
    }
}

pub fn sample_payload(n: i64) -> Value {
    json!({
        "hostname": HOSTNAME,
        "timestamp": 1_700_000_000 + n,
        "cpu": {"avg": 12.5, "max": 40.0, "cores": 8},
        "memory": {"used": 1024, "total": 4096, "percent": 25.0},
        "services": {"ssh.service": "running"},
    })
}

/// Paused-clock timers land on millisecond ticks; allow for that rounding.
pub fn assert_elapsed(started: tokio::time::Instant, expected: Duration) {
    let elapsed = started.elapsed();
    assert!(
        elapsed >= expected && elapsed < expected + Duration::from_millis(5),
        "expected ~{expected:?}, got {elapsed:?}"
    );
}
