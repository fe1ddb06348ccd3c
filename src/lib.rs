//! Run an async operation at most once per key across every process that
//! shares a lock store.
//!
//! A [`LockController`] wraps operations into [`LockedOperation`]s. Each call
//! atomically creates a lock record in the shared store, runs the operation,
//! and deletes the record again. A call that finds the record already present
//! either fails with a contention error or, with a poll interval, waits for
//! the record to disappear and tries again.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use parallel_lock::*;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = RedisLockStore::new("redis://localhost:6379").await?;
//!     let shutdown = GracefulShutdown::new();
//!     let controller = LockController::builder()
//!         .namespace("jobs")
//!         .build(store, &shutdown);
//!
//!     // At most one worker sends the report for a given day.
//!     let report = controller.wrap(
//!         |day: String| async move {
//!             println!("sending report for {day}");
//!             Ok::<_, LockError>(())
//!         },
//!         LockOptions::new("daily-report")
//!             .key_fn(|path, day: &String| format!("{path}:{day}"))
//!             .minimum_hold(Duration::from_secs(60)),
//!     )?;
//!
//!     match report.call("2026-10-14".to_string()).await {
//!         Ok(()) => println!("report sent"),
//!         Err(err) if err.is_contention() => println!("another worker has it"),
//!         Err(err) => return Err(err.into()),
//!     }
//!
//!     // Releases every lock this process still holds.
//!     shutdown.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! # Lock Options
//!
//! - **`key_fn`**: derive the lock subkey from the call arguments
//! - **`minimum_hold`**: keep the lock recorded at least this long, without
//!   making the caller wait
//! - **`poll_interval`**: wait for a contended lock instead of failing
//! - **`never_release`**: keep the lock after success until shutdown
//!
//! # Stores
//!
//! - `parallel-lock-redis`: Redis hashes (`HSETNX`/`HDEL`/`HEXISTS`)
//! - `parallel-lock-memory`: in-process map, for development and tests
//!
//! # Crate Organization
//!
//! This is a meta-crate that re-exports types from:
//! - `parallel-lock-core`: controller, options, errors and collaborator traits
//! - `parallel-lock-memory`: in-memory store
//! - `parallel-lock-redis`: Redis store
//!
//! For fine-grained control, you can depend on individual crates instead.

// Re-export core types and traits
pub use parallel_lock_core::*;

// Re-export the in-memory store
pub use parallel_lock_memory::MemoryLockStore;

// Re-export the Redis store
pub use parallel_lock_redis::{RedisLockStore, RedisLockStoreBuilder};
