//! Graceful shutdown dispatcher.
//!
//! Collects shutdown handlers (one per lock controller) and runs each of them
//! exactly once, when asked to or when the process receives SIGINT/SIGTERM.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use futures::future::join_all;
use tracing::{info, warn};

use crate::traits::{ShutdownHandler, ShutdownRegistrar};

/// Runs registered shutdown handlers once.
#[derive(Default)]
pub struct GracefulShutdown {
    handlers: Mutex<Vec<ShutdownHandler>>,
    started: AtomicBool,
}

impl GracefulShutdown {
    /// Creates a dispatcher with no handlers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true once [`shutdown`](Self::shutdown) has been called.
    pub fn is_shutting_down(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Number of handlers waiting to run.
    pub fn pending(&self) -> usize {
        self.handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Runs every registered handler concurrently and waits for all of them.
    ///
    /// Returns the number of handlers run. Later calls run nothing.
    pub async fn shutdown(&self) -> usize {
        let handlers: Vec<ShutdownHandler> = {
            let mut handlers = self.handlers.lock().unwrap_or_else(PoisonError::into_inner);
            if self.started.swap(true, Ordering::SeqCst) {
                return 0;
            }
            std::mem::take(&mut *handlers)
        };
        let count = handlers.len();
        info!(handlers = count, "graceful shutdown started");

        join_all(handlers.into_iter().map(|handler| handler())).await;

        info!("graceful shutdown finished");
        count
    }

    /// Waits for SIGINT or SIGTERM (Ctrl-C on non-unix), then runs [`shutdown`](Self::shutdown).
    pub async fn wait_for_signal(&self) -> std::io::Result<usize> {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};

            let mut sigint = signal(SignalKind::interrupt())?;
            let mut sigterm = signal(SignalKind::terminate())?;

            tokio::select! {
                _ = sigint.recv() => info!("received SIGINT"),
                _ = sigterm.recv() => info!("received SIGTERM"),
            }
        }

        #[cfg(not(unix))]
        {
            tokio::signal::ctrl_c().await?;
            info!("received Ctrl-C");
        }

        Ok(self.shutdown().await)
    }
}

impl ShutdownRegistrar for GracefulShutdown {
    fn register(&self, handler: ShutdownHandler) {
        {
            let mut handlers = self.handlers.lock().unwrap_or_else(PoisonError::into_inner);
            if !self.is_shutting_down() {
                handlers.push(handler);
                return;
            }
        }

        // Registered after shutdown started: run it right away.
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(handler());
            }
            Err(_) => warn!("shutdown handler registered after shutdown outside a runtime, dropped"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    fn counting_handler(counter: &Arc<AtomicUsize>) -> ShutdownHandler {
        let counter = Arc::clone(counter);
        Box::new(move || {
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
            .boxed()
        })
    }

    #[tokio::test]
    async fn test_handlers_run_once() {
        let shutdown = GracefulShutdown::new();
        let counter = Arc::new(AtomicUsize::new(0));
        shutdown.register(counting_handler(&counter));
        shutdown.register(counting_handler(&counter));
        assert_eq!(shutdown.pending(), 2);

        assert_eq!(shutdown.shutdown().await, 2);
        assert_eq!(shutdown.shutdown().await, 0);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
        assert!(shutdown.is_shutting_down());
    }

    #[tokio::test]
    async fn test_late_registration_runs_immediately() {
        let shutdown = GracefulShutdown::new();
        shutdown.shutdown().await;

        let counter = Arc::new(AtomicUsize::new(0));
        shutdown.register(counting_handler(&counter));
        tokio::task::yield_now().await;
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(shutdown.pending(), 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_sigterm_runs_handlers() {
        use nix::sys::signal::{raise, Signal};
        use std::time::Duration;
        use tokio::signal::unix::{signal, SignalKind};

        // Keeps SIGTERM from terminating the test process.
        let _guard = signal(SignalKind::terminate()).unwrap();

        let shutdown = Arc::new(GracefulShutdown::new());
        let counter = Arc::new(AtomicUsize::new(0));
        shutdown.register(counting_handler(&counter));

        let waiter = tokio::spawn({
            let shutdown = Arc::clone(&shutdown);
            async move { shutdown.wait_for_signal().await }
        });

        // The listener may not be installed yet, so keep signalling until it hears one.
        for _ in 0..100 {
            raise(Signal::SIGTERM).unwrap();
            tokio::time::sleep(Duration::from_millis(20)).await;
            if waiter.is_finished() {
                break;
            }
        }

        assert_eq!(waiter.await.unwrap().unwrap(), 1);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(shutdown.is_shutting_down());
    }
}
