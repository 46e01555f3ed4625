//! Rate-limited scheduling for on-chain reads.
//!
//! `ReadGateway` is a queueing discipline, not a cache: it spaces out reads
//! against rate-sensitive RPC providers on a per-chain sliding window and
//! never deduplicates identical reads.

pub mod gateway;

pub use gateway::{GatewayError, ReadGateway, ThrottleConfig};
