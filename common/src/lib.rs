//! Shared building blocks for the presence workspace.
//!
//! ## Architecture
//!
//! - **common** (this crate): cross-crate utilities (error locations)
//! - **models**: presence payload data structures
//! - **presence-core**: protocol engine, discovery, transport and configuration
//! - **presence**: demo application wiring everything together

pub mod error;

pub use error::error_location::ErrorLocation;
