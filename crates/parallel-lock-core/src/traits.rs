//! Collaborator traits the lock controller is built on.

use std::future::Future;

use futures::future::BoxFuture;

use crate::error::LockResult;

// ============================================================================
// Lock Store Trait
// ============================================================================

/// Shared key-value store holding lock records.
///
/// A record is addressed by `(namespace, subkey)` and its value is the
/// acquisition time in milliseconds since the Unix epoch. Presence of the
/// record means the lock is held.
///
/// Mutual exclusion depends entirely on [`set_if_absent`](Self::set_if_absent)
/// being a single atomic operation in the backing store.
///
/// # Example
///
/// ```rust,ignore
/// let created = store.set_if_absent("parallel", "nightly-report", now_millis()).await?;
/// if created {
///     run_report().await;
///     store.delete("parallel", "nightly-report").await?;
/// }
/// ```
pub trait LockStore: Send + Sync + 'static {
    /// Creates the record if it does not exist.
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - the record was created by this call
    /// * `Ok(false)` - the record already existed
    /// * `Err(...)` - the store could not be reached
    fn set_if_absent(
        &self,
        namespace: &str,
        subkey: &str,
        value: u64,
    ) -> impl Future<Output = LockResult<bool>> + Send;

    /// Removes the record. Removing an absent record is not an error.
    fn delete(&self, namespace: &str, subkey: &str) -> impl Future<Output = LockResult<()>> + Send;

    /// Returns whether the record currently exists.
    fn exists(&self, namespace: &str, subkey: &str) -> impl Future<Output = LockResult<bool>> + Send;
}

// ============================================================================
// Shutdown Registrar Trait
// ============================================================================

/// Callback run once when the process begins shutting down.
pub type ShutdownHandler = Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send>;

/// Process-wide dispatcher of shutdown callbacks.
///
/// Every [`LockController`](crate::LockController) registers exactly one
/// handler here, its drain.
pub trait ShutdownRegistrar {
    /// Registers a handler to run when shutdown starts.
    fn register(&self, handler: ShutdownHandler);
}

impl<R: ShutdownRegistrar + ?Sized> ShutdownRegistrar for &R {
    fn register(&self, handler: ShutdownHandler) {
        (**self).register(handler);
    }
}

impl<R: ShutdownRegistrar + ?Sized> ShutdownRegistrar for std::sync::Arc<R> {
    fn register(&self, handler: ShutdownHandler) {
        (**self).register(handler);
    }
}

impl<S: LockStore> LockStore for std::sync::Arc<S> {
    fn set_if_absent(
        &self,
        namespace: &str,
        subkey: &str,
        value: u64,
    ) -> impl Future<Output = LockResult<bool>> + Send {
        (**self).set_if_absent(namespace, subkey, value)
    }

    fn delete(&self, namespace: &str, subkey: &str) -> impl Future<Output = LockResult<()>> + Send {
        (**self).delete(namespace, subkey)
    }

    fn exists(&self, namespace: &str, subkey: &str) -> impl Future<Output = LockResult<bool>> + Send {
        (**self).exists(namespace, subkey)
    }
}
