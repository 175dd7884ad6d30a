//! raft-purgatory - deadline-bounded registry of deferred results.
//!
//! Consensus protocols park requests while they wait for something to happen:
//! a quorum acknowledgment, the high watermark passing an offset, a fetch that
//! should return once data arrives. The purgatory holds the deferred result of
//! each such request and guarantees it is resolved exactly once, either by an
//! application-triggered bulk completion or by a timeout.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Protocol state machine                      │
//! │      await_result(result, timeout)   │   complete_all(value)    │
//! └─────────────────────────────────────────────────────────────────┘
//!                                  │
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                           Purgatory                             │
//! │       Deadline index │ Expiration sweep │ Resolve-once bridge   │
//! └─────────────────────────────────────────────────────────────────┘
//!                                  │
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                             Clock                               │
//! │   ManualClock (advance sweeps) │ SystemClock + ExpirationDriver │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Module Organization
//!
//! ## Core
//! - [`core::config`] - Configuration parsing and validation
//! - [`core::time`] - Clock abstraction and ticks
//! - [`core::error`] - Errors delivered through deferred results
//!
//! ## Purgatory
//! - [`purgatory`] - The registry and its expiration sweep
//! - [`purgatory::deferred`] - Deferred result capability and implementations
//! - [`purgatory::index`] - Deadline-ordered index
//! - [`purgatory::driver`] - Background sweeping for self-advancing clocks
//!
//! ## Operations
//! - [`ops::telemetry`] - Logging setup
//!
//! # Key Invariants
//!
//! - A deferred result is resolved at most once; completion and expiration
//!   race through the result's own guard
//! - `num_waiting()` counts exactly the indexed, unresolved results
//! - Advancing a manual clock expires every due entry before returning

// Core infrastructure
pub mod core;

// Purgatory and its collaborators
pub mod purgatory;

// Operations
pub mod ops;

// Re-exports for convenience
pub use self::core::{config, error, time};
pub use purgatory::deferred::{channel, DeferredResult, OneshotCompleter, Promise};
pub use purgatory::driver::{DriverHandle, ExpirationDriver};
pub use purgatory::{Purgatory, PurgatoryStatsSnapshot};
