//! Common test utilities.
//!
//! This module contains shared helpers for integration tests.
//! Import with `mod common;` in test files.

#![allow(dead_code)]

use raft_purgatory::core::error::PurgatoryError;
use raft_purgatory::core::time::ManualClock;
use raft_purgatory::purgatory::deferred::Promise;
use raft_purgatory::purgatory::Purgatory;
use std::io::Write;
use std::sync::Arc;
use tempfile::NamedTempFile;

/// A purgatory driven by a fresh manual clock.
pub fn manual_purgatory() -> (Arc<ManualClock>, Arc<Purgatory<u64>>) {
    let clock = ManualClock::shared();
    let purgatory = Purgatory::new(clock.clone());
    (clock, purgatory)
}

/// Register a fresh promise with the given timeout and return it.
pub fn await_promise(purgatory: &Purgatory<u64>, timeout_ms: u64) -> Promise<u64> {
    let promise = Promise::new();
    purgatory.await_result(promise.clone(), timeout_ms);
    promise
}

/// Assert that a promise failed with a timeout.
pub fn assert_timed_out(promise: &Promise<u64>) {
    match promise.outcome() {
        Some(Err(PurgatoryError::Timeout { .. })) => {}
        other => panic!("expected timeout, got {:?}", other),
    }
}

/// Write TOML content to a temporary file.
pub fn config_file(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    file.write_all(content.as_bytes())
        .expect("Failed to write config");
    file
}
