//! Redis adapter for the [`crate::domain::ports::ExpiringStore`] port.
//!
//! Uses `bb8-redis` for connection pooling. Values are written with `SETEX`
//! so Redis expires them; member sets get an `EXPIRE` on every insert.

mod redis_store;

pub use redis_store::{RedisExpiringStore, RedisStoreError};
