//! Database models for the Hiro backend.
//!
//! ## Primary Key Uniqueness
//! All primary keys should be as unique as possible,
//! in order to avoid conflicts with all historical IDs.
//! Test job IDs are UUID v7 so that ID order matches creation order.

pub mod bus;
pub mod db;
pub mod feed;
pub mod installation;
pub mod job;
pub mod pr;
pub mod repo;
pub mod user;
