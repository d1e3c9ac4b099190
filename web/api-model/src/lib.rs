//! Wire types of the Hiro HTTP API.

pub mod coverage;
pub mod feed;
pub mod job;
pub mod pr;
pub mod repo;
pub mod user;

/// Unix timestamp in seconds.
pub type UnixTime = i64;
