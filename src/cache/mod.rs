//! Shared query cache between the resource client and the scoped stores.
//!
//! This module provides a read-mostly cache that:
//! - Serves fresh cached resources without touching the network
//! - Shares one in-flight fetch among every concurrent reader of a key
//! - Hands the same error to all of those readers, and never caches failures
//! - Drops entries only through explicit invalidation

mod key;
mod layer;

pub use key::QueryKey;
pub use layer::{QueryCache, Snapshot};
