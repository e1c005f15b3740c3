//! Morphfeed Generation Library
//!
//! Client for the remote generative endpoint. One [`InvocationClient::invoke`]
//! call sends a single generation request with:
//!
//! - a per-attempt deadline that aborts the in-flight request when it fires,
//! - status classification (`401` auth, `429` rate limited, `5xx` server,
//!   anything else protocol),
//! - capped exponential backoff with additive jitter for transient failures,
//! - tolerant extraction of the output URL from differently shaped payloads,
//! - lifecycle events tagged with the run's correlation id.
//!
//! Orchestrators depend on the [`Generator`] trait so tests can script outcomes
//! without a network.

pub mod client;
pub mod error;
pub mod extract;
pub mod retry;

pub use client::{Generator, InvocationClient, InvocationRequest, InvocationSuccess};
pub use error::{classify_status, InvocationError};
pub use extract::{extract_output_url, ExtractionStrategy, DEFAULT_STRATEGIES};
pub use retry::{with_retry, Backoff, RetryPolicy};
