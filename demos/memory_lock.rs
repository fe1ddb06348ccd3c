//! Example: two workers sharing an in-memory lock store
//!
//! Run with: `cargo run --example memory_lock`

use parallel_lock::*;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "debug".into()))
        .init();

    // Both "workers" share one store, as two processes would share Redis
    let store = MemoryLockStore::new();
    let shutdown = GracefulShutdown::new();
    let worker_a = LockController::builder().build(store.clone(), &shutdown);
    let worker_b = LockController::builder().build(store.clone(), &shutdown);

    let sync_a = worker_a.wrap(
        |account: u64| async move {
            println!("worker A syncing account {account}");
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok::<_, LockError>(())
        },
        LockOptions::new("sync").key_fn(|path, account: &u64| format!("{path}:{account}")),
    )?;
    let sync_b = worker_b.wrap(
        |account: u64| async move {
            println!("worker B syncing account {account}");
            Ok::<_, LockError>(())
        },
        LockOptions::new("sync").key_fn(|path, account: &u64| format!("{path}:{account}")),
    )?;

    let (a, b) = tokio::join!(sync_a.call(7), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        sync_b.call(7).await
    });
    a?;
    match b {
        Err(err) if err.is_contention() => println!("worker B skipped: {err}"),
        other => other?,
    }

    // Different account, no contention
    sync_b.call(8).await?;

    shutdown.shutdown().await;
    Ok(())
}
