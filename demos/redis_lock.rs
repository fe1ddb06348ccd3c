//! Example: deduplicating a scheduled job with Redis
//!
//! Run with: `cargo run --example redis_lock`
//!
//! Requires a Redis server. Set REDIS_URL environment variable
//! or modify the URL below. Start it in several terminals at once: only one
//! of them runs the job at a time, the rest wait their turn.

use parallel_lock::*;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    // Get Redis URL from environment or use default
    let redis_url = std::env::var("REDIS_URL")
        .unwrap_or_else(|_| "redis://localhost:6379".to_string());

    println!("Connecting to Redis...");
    let store = RedisLockStore::builder().url(&redis_url).build().await?;
    let shutdown = GracefulShutdown::new();
    let controller = LockController::builder()
        .namespace("parallel-lock-demo")
        .build(store, &shutdown);

    // Hold the lock at least 5 seconds so a fast run still blocks the others
    let cleanup = controller.wrap(
        |_: ()| async {
            println!("Running cleanup...");
            tokio::time::sleep(Duration::from_secs(2)).await;
            println!("Cleanup done");
            Ok::<_, LockError>(())
        },
        LockOptions::new("cleanup")
            .minimum_hold(Duration::from_secs(5))
            .poll_interval(Duration::from_millis(500)),
    )?;

    cleanup.call(()).await?;

    // Release anything still held before exiting
    shutdown.shutdown().await;
    Ok(())
}
