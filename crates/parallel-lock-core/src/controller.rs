//! Lock controller: wraps async operations so they run at most once per subkey
//! across every process sharing the lock store.

use std::collections::HashSet;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use futures::stream::{self, StreamExt};
use futures::FutureExt;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};

use crate::error::{ContentionError, LockError, LockResult};
use crate::options::{error_factory, ErrorFactory, KeyFn, LockOptions, SharedError};
use crate::traits::{LockStore, ShutdownRegistrar};

/// Namespace used when the builder is not given one.
pub const DEFAULT_NAMESPACE: &str = "parallel";

/// Maximum number of records the shutdown drain deletes at once.
pub const DRAIN_CONCURRENCY: usize = 10;

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or_default()
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for [`LockController`] configuration.
pub struct ControllerBuilder {
    namespace: String,
    error_factory: ErrorFactory,
}

impl ControllerBuilder {
    /// Creates a builder with the default namespace and contention error.
    pub fn new() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            error_factory: error_factory(|path, minimum_hold| ContentionError {
                path: path.to_string(),
                minimum_hold,
            }),
        }
    }

    /// Sets the namespace key all subkeys of this controller live under.
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Sets the default contention error factory for wrapped operations.
    pub fn error_factory(mut self, factory: ErrorFactory) -> Self {
        self.error_factory = factory;
        self
    }

    /// Builds the controller and registers its drain with `registrar`.
    pub fn build<S, R>(self, store: S, registrar: &R) -> LockController<S>
    where
        S: LockStore,
        R: ShutdownRegistrar + ?Sized,
    {
        let state = Arc::new(ControllerState {
            namespace: self.namespace,
            store,
            default_error_factory: self.error_factory,
            in_flight: Mutex::new(HashSet::new()),
            exiting: AtomicBool::new(false),
        });

        let drain_state = Arc::clone(&state);
        registrar.register(Box::new(move || {
            async move {
                drain_state.drain().await;
            }
            .boxed()
        }));

        LockController { state }
    }
}

impl Default for ControllerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Controller State
// ============================================================================

struct ControllerState<S> {
    namespace: String,
    store: S,
    default_error_factory: ErrorFactory,
    /// Subkeys acquired by this process and not yet released.
    in_flight: Mutex<HashSet<String>>,
    exiting: AtomicBool,
}

impl<S: LockStore> ControllerState<S> {
    fn in_flight(&self) -> MutexGuard<'_, HashSet<String>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_exiting(&self) -> bool {
        self.exiting.load(Ordering::SeqCst)
    }

    /// Records a freshly acquired subkey as in flight.
    ///
    /// The flag is read under the in-flight mutex, which the drain also holds
    /// while raising the flag and taking its snapshot. Either the subkey lands
    /// in the snapshot or this returns false.
    fn admit(&self, subkey: &str) -> bool {
        let mut in_flight = self.in_flight();
        if self.is_exiting() {
            return false;
        }
        in_flight.insert(subkey.to_string());
        true
    }

    /// Deletes a record acquired after the drain started.
    async fn abandon(&self, subkey: &str) {
        if let Err(err) = self.store.delete(&self.namespace, subkey).await {
            warn!(
                lock.subkey = %subkey,
                error = %err,
                "failed to release lock acquired during shutdown"
            );
        }
    }

    /// Releases `subkey` if this process still tracks it.
    ///
    /// A subkey already taken by the drain is not deleted a second time.
    async fn release(&self, subkey: &str) -> LockResult<()> {
        let removed = self.in_flight().remove(subkey);
        if !removed {
            debug!(lock.subkey = %subkey, "lock already released by shutdown drain");
            return Ok(());
        }
        self.store.delete(&self.namespace, subkey).await?;
        debug!(lock.subkey = %subkey, "lock released");
        Ok(())
    }

    #[instrument(skip(self), fields(lock.namespace = %self.namespace))]
    async fn drain(&self) -> usize {
        let mut subkeys: Vec<String> = {
            let in_flight = self.in_flight();
            self.exiting.store(true, Ordering::SeqCst);
            in_flight.iter().cloned().collect()
        };
        subkeys.sort();
        info!(in_flight = ?subkeys, "shutdown drain started");

        let released = stream::iter(subkeys)
            .map(|subkey| async move {
                let removed = self.in_flight().remove(&subkey);
                if !removed {
                    return false;
                }
                match self.store.delete(&self.namespace, &subkey).await {
                    Ok(()) => {
                        info!(lock.subkey = %subkey, "shutdown drain released lock");
                        true
                    }
                    Err(err) => {
                        error!(
                            lock.subkey = %subkey,
                            error = %err,
                            "shutdown drain failed to release lock"
                        );
                        false
                    }
                }
            })
            .buffer_unordered(DRAIN_CONCURRENCY)
            .fold(0, |count, released| std::future::ready(count + usize::from(released)))
            .await;

        info!(released, "shutdown drain finished");
        released
    }
}

// ============================================================================
// Lock Controller
// ============================================================================

/// Turns async operations into locked operations sharing one namespace.
///
/// Clones share the same in-flight set and shutdown flag.
///
/// # Example
///
/// ```rust,ignore
/// let shutdown = GracefulShutdown::new();
/// let controller = LockController::builder()
///     .namespace("billing")
///     .build(store, &shutdown);
///
/// let invoice = controller.wrap(
///     |customer: u64| async move { send_invoice(customer).await },
///     LockOptions::new("invoice").key_fn(|path, customer: &u64| format!("{path}:{customer}")),
/// )?;
///
/// invoice.call(42).await?;
/// ```
pub struct LockController<S> {
    state: Arc<ControllerState<S>>,
}

impl<S> Clone for LockController<S> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl LockController<()> {
    /// Returns a new builder for configuring a controller.
    pub fn builder() -> ControllerBuilder {
        ControllerBuilder::new()
    }
}

impl<S: LockStore> LockController<S> {
    /// Returns the namespace key.
    pub fn namespace(&self) -> &str {
        &self.state.namespace
    }

    /// Returns the lock store.
    pub fn store(&self) -> &S {
        &self.state.store
    }

    /// Returns true once the shutdown drain has started.
    pub fn is_exiting(&self) -> bool {
        self.state.is_exiting()
    }

    /// Sorted snapshot of the subkeys this process currently holds.
    pub fn in_flight(&self) -> Vec<String> {
        let mut subkeys: Vec<String> = self.state.in_flight().iter().cloned().collect();
        subkeys.sort();
        subkeys
    }

    /// Runs the shutdown drain now, returning how many locks it released.
    ///
    /// Normally this is triggered through the registrar passed to
    /// [`ControllerBuilder::build`].
    pub async fn drain(&self) -> usize {
        self.state.drain().await
    }

    /// Wraps `operation` so each call runs under the lock described by `options`.
    ///
    /// Fails with [`LockError::InvalidPath`] right away if the path is empty.
    /// The contention error is built here, once, and shared by every call.
    pub fn wrap<A, F, Fut, T, E>(
        &self,
        operation: F,
        options: LockOptions<A>,
    ) -> LockResult<LockedOperation<S, A, F>>
    where
        F: Fn(A) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<LockError>,
    {
        if options.path.is_empty() {
            return Err(LockError::InvalidPath);
        }

        let factory = options
            .error_factory
            .unwrap_or_else(|| Arc::clone(&self.state.default_error_factory));
        let contention = factory(&options.path, options.minimum_hold);

        Ok(LockedOperation {
            inner: Arc::new(Wrapped {
                state: Arc::clone(&self.state),
                operation,
                path: options.path,
                key_fn: options.key_fn,
                minimum_hold: options.minimum_hold,
                poll_interval: options.poll_interval,
                never_release: options.never_release,
                contention,
            }),
        })
    }
}

// ============================================================================
// Locked Operation
// ============================================================================

struct Wrapped<S, A, F> {
    state: Arc<ControllerState<S>>,
    operation: F,
    path: String,
    key_fn: Option<KeyFn<A>>,
    minimum_hold: Duration,
    poll_interval: Option<Duration>,
    never_release: bool,
    contention: SharedError,
}

impl<S: LockStore, A, F> Wrapped<S, A, F> {
    fn subkey(&self, args: &A) -> String {
        match &self.key_fn {
            Some(key_fn) => key_fn(&self.path, args),
            None => self.path.clone(),
        }
    }

    /// Releases now, or in the background once the minimum hold has elapsed.
    async fn release(&self, subkey: String, started: Instant) -> LockResult<()> {
        let remaining = self.minimum_hold.saturating_sub(started.elapsed());
        if remaining.is_zero() {
            return self.state.release(&subkey).await;
        }

        debug!(lock.subkey = %subkey, ?remaining, "release deferred until minimum hold elapses");
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            tokio::time::sleep(remaining).await;
            if let Err(err) = state.release(&subkey).await {
                warn!(lock.subkey = %subkey, error = %err, "deferred lock release failed");
            }
        });
        Ok(())
    }
}

/// An operation that runs under a distributed lock.
///
/// Created by [`LockController::wrap`]. Cheap to clone.
pub struct LockedOperation<S, A, F> {
    inner: Arc<Wrapped<S, A, F>>,
}

impl<S, A, F> Clone for LockedOperation<S, A, F> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: LockStore, A, F> LockedOperation<S, A, F> {
    /// Returns the lock path.
    pub fn path(&self) -> &str {
        &self.inner.path
    }

    /// Acquires the lock for `args`, runs the operation and releases.
    ///
    /// # Returns
    ///
    /// * `Ok(value)` - the operation ran and succeeded
    /// * `Err(LockError::Contention)` - the lock is held and no poll interval is set
    /// * `Err(LockError::ProcessExiting)` - the controller is draining
    /// * `Err(LockError::Backend)` - a store command failed
    /// * `Err(e)` - the operation's own error, unchanged
    ///
    /// With a poll interval, a contended call waits until the record is gone and
    /// tries again from the start, as often as it takes.
    #[instrument(skip_all, fields(lock.namespace = %self.inner.state.namespace, lock.path = %self.inner.path))]
    pub async fn call<Fut, T, E>(&self, args: A) -> Result<T, E>
    where
        F: Fn(A) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<LockError>,
    {
        let wrapped = &*self.inner;
        let state = &*wrapped.state;

        let subkey = loop {
            if state.is_exiting() {
                return Err(LockError::ProcessExiting.into());
            }

            let subkey = wrapped.subkey(&args);
            let acquired = state
                .store
                .set_if_absent(&state.namespace, &subkey, now_millis())
                .await?;

            if acquired {
                // Shutdown may have started while the acquisition was in flight.
                if !state.admit(&subkey) {
                    state.abandon(&subkey).await;
                    return Err(LockError::ProcessExiting.into());
                }
                break subkey;
            }

            if state.is_exiting() {
                return Err(LockError::ProcessExiting.into());
            }

            let Some(interval) = wrapped.poll_interval else {
                debug!(lock.subkey = %subkey, "lock contended");
                return Err(LockError::Contention(Arc::clone(&wrapped.contention)).into());
            };

            debug!(lock.subkey = %subkey, ?interval, "lock contended, waiting for release");
            while state.store.exists(&state.namespace, &subkey).await? {
                tokio::time::sleep(interval).await;
            }
        };

        let started = Instant::now();
        debug!(lock.subkey = %subkey, "lock acquired");

        match (wrapped.operation)(args).await {
            Ok(value) => {
                if !wrapped.never_release {
                    wrapped.release(subkey, started).await?;
                }
                Ok(value)
            }
            Err(err) => {
                if let Err(release_err) = wrapped.release(subkey, started).await {
                    warn!(error = %release_err, "lock release failed after operation error");
                }
                Err(err)
            }
        }
    }
}
