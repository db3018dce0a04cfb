//! End-to-end host checks built from tools.
//!
//! Each scenario takes a [`HostSession`](crate::registry::HostSession),
//! resolves the capabilities it needs and returns a serializable report.
//! Failures come back as `hc_common::Error` carrying the last command result.

pub mod network;
pub mod timesync;

pub use network::{validate_ring_buffer_change, RingBufferChange};
pub use timesync::{verify_time_sync, verify_time_sync_with, TimeSyncOptions, TimeSyncReport};
