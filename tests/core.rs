//! Core infrastructure tests.

mod common;

use raft_purgatory::core::config::Config;
use raft_purgatory::core::error::PurgatoryError;
use raft_purgatory::core::time::{Clock, ManualClock, Tick};

// ============================================================================
// Config tests
// ============================================================================

#[test]
fn parse_empty_config_uses_defaults() {
    let file = common::config_file("");
    let config = Config::from_file(file.path()).unwrap();
    assert_eq!(config.purgatory.max_timeout_ms, 86_400_000);
    assert_eq!(config.driver.idle_wait_ms, 1_000);
    assert_eq!(config.telemetry.log_level, "info");
}

#[test]
fn parse_full_config() {
    let file = common::config_file(
        r#"
[purgatory]
max_timeout_ms = 30000

[driver]
idle_wait_ms = 250

[telemetry]
log_level = "debug"
"#,
    );

    let config = Config::from_file(file.path()).unwrap();
    assert_eq!(config.purgatory.max_timeout_ms, 30_000);
    assert_eq!(config.driver.idle_wait_ms, 250);
    assert_eq!(config.telemetry.log_level, "debug");
}

#[test]
fn validate_zero_max_timeout() {
    let result = Config::from_toml("[purgatory]\nmax_timeout_ms = 0\n");
    assert!(result.is_err());
    assert!(result.unwrap_err().to_string().contains("max_timeout_ms"));
}

#[test]
fn validate_zero_idle_wait() {
    let result = Config::from_toml("[driver]\nidle_wait_ms = 0\n");
    assert!(result.is_err());
    assert!(result.unwrap_err().to_string().contains("idle_wait_ms"));
}

#[test]
fn validate_log_level() {
    let result = Config::from_toml("[telemetry]\nlog_level = \"loud\"\n");
    assert!(result.is_err());
    assert!(result.unwrap_err().to_string().contains("log_level"));
}

#[test]
fn missing_config_file_reports_path() {
    let result = Config::from_file(std::path::Path::new("/nonexistent/purgatory.toml"));
    let err = format!("{:#}", result.unwrap_err());
    assert!(err.contains("/nonexistent/purgatory.toml"), "{}", err);
}

#[test]
fn malformed_toml_is_rejected() {
    let result = Config::from_toml("[purgatory\nmax_timeout_ms = ");
    assert!(result.is_err());
}

// ============================================================================
// Error tests
// ============================================================================

#[test]
fn timeout_error_carries_deadline() {
    let err = PurgatoryError::timeout(500, Tick::new(500));
    match err {
        PurgatoryError::Timeout {
            timeout_ms,
            deadline,
        } => {
            assert_eq!(timeout_ms, 500);
            assert_eq!(deadline, Tick::new(500));
        }
        PurgatoryError::Cancelled => panic!("expected timeout"),
    }
}

// ============================================================================
// Time tests
// ============================================================================

#[test]
fn manual_clock_advances_monotonically() {
    let clock = ManualClock::new();
    assert_eq!(clock.now(), Tick::zero());
    clock.advance(0);
    assert_eq!(clock.now(), Tick::zero());
    clock.advance(500);
    clock.advance(500);
    assert_eq!(clock.now(), Tick::new(1000));
}

#[test]
fn tick_display() {
    assert_eq!(Tick::new(42).to_string(), "Tick(42ms)");
}
