//! Redis backend for parallel-lock.
//!
//! Each controller namespace is one Redis hash; lock subkeys are its fields.

pub mod builder;
pub mod store;

pub use builder::RedisLockStoreBuilder;
pub use store::RedisLockStore;
