pub mod feed;
pub mod job;
pub mod pr;
