//! Per-operation lock configuration.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Shared error value returned on contention.
pub type SharedError = Arc<dyn std::error::Error + Send + Sync>;

/// Builds the contention error for a wrapped operation from its path and minimum hold.
pub type ErrorFactory = Arc<dyn Fn(&str, Duration) -> SharedError + Send + Sync>;

/// Derives the lock subkey from the lock path and the call arguments.
pub type KeyFn<A> = Arc<dyn Fn(&str, &A) -> String + Send + Sync>;

/// Wraps a typed error constructor into an [`ErrorFactory`].
pub fn error_factory<F, E>(factory: F) -> ErrorFactory
where
    F: Fn(&str, Duration) -> E + Send + Sync + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    Arc::new(move |path: &str, minimum_hold: Duration| {
        Arc::new(factory(path, minimum_hold)) as SharedError
    })
}

/// Options for one wrapped operation.
///
/// `A` is the argument type the locked operation is called with.
///
/// # Example
///
/// ```rust,ignore
/// let options = LockOptions::new("orders:sync")
///     .key_fn(|path, customer: &u64| format!("{path}:{customer}"))
///     .minimum_hold(Duration::from_secs(1))
///     .poll_interval(Duration::from_millis(200));
/// ```
pub struct LockOptions<A> {
    pub(crate) path: String,
    pub(crate) key_fn: Option<KeyFn<A>>,
    pub(crate) minimum_hold: Duration,
    pub(crate) error_factory: Option<ErrorFactory>,
    pub(crate) poll_interval: Option<Duration>,
    pub(crate) never_release: bool,
}

impl<A> LockOptions<A> {
    /// Creates options for the given lock path.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            key_fn: None,
            minimum_hold: Duration::ZERO,
            error_factory: None,
            poll_interval: None,
            never_release: false,
        }
    }

    /// Sets the function deriving the subkey from `(path, &args)`.
    ///
    /// Without one, the subkey is the path itself.
    pub fn key_fn<F>(mut self, key_fn: F) -> Self
    where
        F: Fn(&str, &A) -> String + Send + Sync + 'static,
    {
        self.key_fn = Some(Arc::new(key_fn));
        self
    }

    /// Keeps the lock recorded for at least this long after acquisition.
    pub fn minimum_hold(mut self, minimum_hold: Duration) -> Self {
        self.minimum_hold = minimum_hold;
        self
    }

    /// Overrides the controller's default contention error factory.
    pub fn error_factory(mut self, factory: ErrorFactory) -> Self {
        self.error_factory = Some(factory);
        self
    }

    /// Waits for a contended lock, polling its record at this interval, instead
    /// of failing with a contention error.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    /// Leaves the lock held after a successful call until the shutdown drain.
    pub fn never_release(mut self, never_release: bool) -> Self {
        self.never_release = never_release;
        self
    }

    /// Returns the lock path.
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl<A> Clone for LockOptions<A> {
    fn clone(&self) -> Self {
        Self {
            path: self.path.clone(),
            key_fn: self.key_fn.clone(),
            minimum_hold: self.minimum_hold,
            error_factory: self.error_factory.clone(),
            poll_interval: self.poll_interval,
            never_release: self.never_release,
        }
    }
}

impl<A> fmt::Debug for LockOptions<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockOptions")
            .field("path", &self.path)
            .field("key_fn", &self.key_fn.is_some())
            .field("minimum_hold", &self.minimum_hold)
            .field("error_factory", &self.error_factory.is_some())
            .field("poll_interval", &self.poll_interval)
            .field("never_release", &self.never_release)
            .finish()
    }
}
