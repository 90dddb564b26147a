//! arb-sentinel: Risk controls for synthetic arbitrage across correlated market pairs
//!
//! This library provides the core components for:
//! - Tick validation and bookmaker labeling
//! - Cross-market opportunity detection
//! - Per-relationship circuit breakers with sustained and instant rules
//! - Post-fill adverse move monitoring
//! - Daily loss limits with UTC rollover
//! - A single-writer async service around the processor
//! - JSON replay of recorded streams
//! - Structured logging and Prometheus metrics

pub mod cli;
pub mod config;
pub mod feed;
pub mod market;
pub mod model;
pub mod processor;
pub mod risk;
pub mod signal;
pub mod telemetry;
