//! Prometheus metrics for the validator client.

pub mod metrics;
