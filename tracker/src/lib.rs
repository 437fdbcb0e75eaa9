//! Core library for the request-coalescing tracking proxy.
//!
//! Lookups are served from the cache when possible; concurrent misses are
//! coalesced by the [`batcher`] into grouped upstream fetches and fanned back
//! to the original callers. The [`service`] module ties the cache, batcher,
//! and upstream source together behind a single facade.

pub mod batcher;
pub mod cache;
pub mod client;
pub mod config;
pub mod errors;
pub mod metrics_defs;
pub mod models;
pub mod service;

#[cfg(test)]
mod testutil;
