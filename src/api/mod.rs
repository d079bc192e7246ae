//! Remote meal-request API.
//!
//! Resource definitions, wire types and the HTTP client that talks to the
//! backend. Nothing in here caches; see [`crate::cache`] for that.

pub mod client;
pub mod error;
pub mod resource;
pub mod types;

#[cfg(test)]
pub mod fake;

pub use client::{decode_records, HttpResourceClient, ResourceClient, RetryPolicy};
pub use error::ApiError;
pub use resource::{CachePolicy, Resource};
