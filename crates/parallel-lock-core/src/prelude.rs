//! Convenience prelude for parallel-lock types.

pub use crate::controller::{LockController, LockedOperation};
pub use crate::error::{ContentionError, LockError, LockResult};
pub use crate::options::{error_factory, LockOptions};
pub use crate::shutdown::GracefulShutdown;
pub use crate::traits::{LockStore, ShutdownRegistrar};
