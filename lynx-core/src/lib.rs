//! Lynx Core: backtest simulation engine, domain types, fees and cost model.
//!
//! This crate contains the heart of the backtester:
//! - Domain types (positions, trades, equity snapshots, portfolio)
//! - Per-market fee schedules and lot sizes
//! - Date × symbol price and signal tables, with input validation
//! - Date-by-date event loop with five phases per date
//! - Deterministic run fingerprints

pub mod data;
pub mod domain;
pub mod engine;
pub mod fees;
pub mod fingerprint;
