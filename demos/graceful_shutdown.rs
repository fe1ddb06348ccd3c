//! Example: a leader lock released on Ctrl-C
//!
//! Run with: `cargo run --example graceful_shutdown`
//!
//! The first instance takes the `leader` lock and keeps it after its job
//! succeeds. Further instances report that the lock is held. Pressing Ctrl-C
//! in the first instance drains the lock so another instance can lead.

use parallel_lock::*;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let redis_url = std::env::var("REDIS_URL")
        .unwrap_or_else(|_| "redis://localhost:6379".to_string());
    let store = RedisLockStore::new(redis_url).await?;
    let shutdown = GracefulShutdown::new();
    let controller = LockController::builder()
        .namespace("parallel-lock-demo")
        .build(store, &shutdown);

    let elect = controller.wrap(
        |_: ()| async {
            println!("This instance is now the leader");
            Ok::<_, LockError>(())
        },
        LockOptions::new("leader").never_release(true),
    )?;

    match elect.call(()).await {
        Ok(()) => {
            println!("Holding leadership, press Ctrl-C to step down");
            let handlers = shutdown.wait_for_signal().await?;
            println!(
                "Ran {handlers} shutdown handler(s), in flight now: {:?}",
                controller.in_flight()
            );
        }
        Err(err) if err.is_contention() => println!("Another instance leads: {err}"),
        Err(err) => return Err(err.into()),
    }

    Ok(())
}
