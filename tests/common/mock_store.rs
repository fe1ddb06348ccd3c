//! Scripted lock store that records every call.

#![allow(dead_code)]

use futures::future::BoxFuture;
use parallel_lock_core::error::{LockError, LockResult};
use parallel_lock_core::traits::LockStore;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

/// One recorded store call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    SetIfAbsent {
        namespace: String,
        subkey: String,
        value: u64,
    },
    Delete {
        namespace: String,
        subkey: String,
    },
    Exists {
        namespace: String,
        subkey: String,
    },
}

#[derive(Default)]
struct Script {
    set_results: VecDeque<bool>,
    exists_results: VecDeque<bool>,
    calls: Vec<StoreCall>,
    delete_times: Vec<Instant>,
    after_next_set: Option<BoxFuture<'static, ()>>,
}

/// Mock lock store.
///
/// `set_if_absent` and `exists` answer from scripted queues; once a queue is
/// empty they answer `true` and `false` respectively.
#[derive(Clone, Default)]
pub struct MockLockStore {
    script: Arc<Mutex<Script>>,
    set_delay: Option<Duration>,
    delete_delay: Option<Duration>,
    fail_deletes: bool,
    deletes_running: Arc<AtomicUsize>,
    max_deletes_running: Arc<AtomicUsize>,
}

impl MockLockStore {
    /// Creates a store that grants every acquisition.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every `set_if_absent` take `delay` before answering.
    pub fn with_set_delay(mut self, delay: Duration) -> Self {
        self.set_delay = Some(delay);
        self
    }

    /// Makes every `delete` take `delay` before answering.
    pub fn with_delete_delay(mut self, delay: Duration) -> Self {
        self.delete_delay = Some(delay);
        self
    }

    /// Makes every `delete` fail after recording the call.
    pub fn with_failing_deletes(mut self) -> Self {
        self.fail_deletes = true;
        self
    }

    /// Queues answers for upcoming `set_if_absent` calls.
    pub fn push_set_results(&self, results: impl IntoIterator<Item = bool>) {
        self.script.lock().unwrap().set_results.extend(results);
    }

    /// Queues answers for upcoming `exists` calls.
    pub fn push_exists_results(&self, results: impl IntoIterator<Item = bool>) {
        self.script.lock().unwrap().exists_results.extend(results);
    }

    /// Runs `task` inside the next `set_if_absent`, after its answer is decided
    /// and before it returns.
    pub fn run_after_next_set(&self, task: BoxFuture<'static, ()>) {
        self.script.lock().unwrap().after_next_set = Some(task);
    }

    /// All calls in order.
    pub fn calls(&self) -> Vec<StoreCall> {
        self.script.lock().unwrap().calls.clone()
    }

    /// `(namespace, subkey, value)` of every `set_if_absent` call.
    pub fn set_calls(&self) -> Vec<(String, String, u64)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                StoreCall::SetIfAbsent {
                    namespace,
                    subkey,
                    value,
                } => Some((namespace, subkey, value)),
                _ => None,
            })
            .collect()
    }

    /// `(namespace, subkey)` of every `delete` call.
    pub fn delete_calls(&self) -> Vec<(String, String)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                StoreCall::Delete { namespace, subkey } => Some((namespace, subkey)),
                _ => None,
            })
            .collect()
    }

    /// Number of `exists` calls.
    pub fn exists_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, StoreCall::Exists { .. }))
            .count()
    }

    /// When each `delete` call was made.
    pub fn delete_times(&self) -> Vec<Instant> {
        self.script.lock().unwrap().delete_times.clone()
    }

    /// Highest number of `delete` calls that were running at the same time.
    pub fn max_concurrent_deletes(&self) -> usize {
        self.max_deletes_running.load(Ordering::SeqCst)
    }
}

impl LockStore for MockLockStore {
    async fn set_if_absent(&self, namespace: &str, subkey: &str, value: u64) -> LockResult<bool> {
        let (result, after) = {
            let mut script = self.script.lock().unwrap();
            script.calls.push(StoreCall::SetIfAbsent {
                namespace: namespace.to_string(),
                subkey: subkey.to_string(),
                value,
            });
            let result = script.set_results.pop_front().unwrap_or(true);
            (result, script.after_next_set.take())
        };
        if let Some(delay) = self.set_delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(after) = after {
            after.await;
        }
        Ok(result)
    }

    async fn delete(&self, namespace: &str, subkey: &str) -> LockResult<()> {
        {
            let mut script = self.script.lock().unwrap();
            script.calls.push(StoreCall::Delete {
                namespace: namespace.to_string(),
                subkey: subkey.to_string(),
            });
            script.delete_times.push(Instant::now());
        }

        let running = self.deletes_running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_deletes_running.fetch_max(running, Ordering::SeqCst);
        if let Some(delay) = self.delete_delay {
            tokio::time::sleep(delay).await;
        }
        self.deletes_running.fetch_sub(1, Ordering::SeqCst);

        if self.fail_deletes {
            return Err(LockError::backend(std::io::Error::other("delete refused")));
        }
        Ok(())
    }

    async fn exists(&self, namespace: &str, subkey: &str) -> LockResult<bool> {
        let mut script = self.script.lock().unwrap();
        script.calls.push(StoreCall::Exists {
            namespace: namespace.to_string(),
            subkey: subkey.to_string(),
        });
        Ok(script.exists_results.pop_front().unwrap_or(false))
    }
}
