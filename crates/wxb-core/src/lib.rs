//! Core data types, wire decoding, and derived quantities for wxbridge
//!
//! This crate provides the observation model shared by the provider
//! client, the local store, and the aggregator forwarder, together with
//! the small pure computations (dew point, unit conversion, forward
//! throttling) the ingestion loop needs.

pub mod derived;
pub mod pipeline;
pub mod throttle;
pub mod types;
pub mod units;

pub use derived::*;
pub use pipeline::*;
pub use throttle::*;
pub use types::*;
pub use units::*;
