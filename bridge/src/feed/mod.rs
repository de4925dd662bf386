//! ZMQ transaction feed: line parsing and the subscriber connection.

pub mod client;
pub mod event;

pub use client::{FeedClient, FeedError};
pub use event::{FeedEvent, ResourceStats};
