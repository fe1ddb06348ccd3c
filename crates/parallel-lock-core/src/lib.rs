//! Core traits and the lock controller for parallel-lock.

pub mod controller;
pub mod error;
pub mod options;
pub mod prelude;
pub mod shutdown;
pub mod traits;

pub use controller::{
    now_millis, ControllerBuilder, LockController, LockedOperation, DEFAULT_NAMESPACE,
    DRAIN_CONCURRENCY,
};
pub use error::{ContentionError, LockError, LockResult};
pub use options::{error_factory, ErrorFactory, KeyFn, LockOptions, SharedError};
pub use shutdown::GracefulShutdown;
pub use traits::{LockStore, ShutdownHandler, ShutdownRegistrar};
