//! Core infrastructure.
//!
//! - [`config`] - Configuration parsing and validation
//! - [`time`] - Clock abstraction and millisecond ticks
//! - [`error`] - Errors delivered through deferred results

pub mod config;
pub mod error;
pub mod time;
