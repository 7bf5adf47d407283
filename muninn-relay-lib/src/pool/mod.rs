mod idle;
mod key;
mod manager;

pub use idle::IdleSet;
pub use key::PoolKey;
pub use manager::{ConnectionPool, PoolStats};
