//! Property tests for engine invariants.
//!
//! Uses proptest to verify:
//! 1. Conservation: zero fees and flat prices never create or destroy equity
//! 2. Lot compliance: every `.TW` trade is a whole number of lots
//! 3. Snapshots: one per date, ascending, equity == cash + holdings
//! 4. Cash: never negative, whatever the signals
//! 5. Position uniqueness: at most one open position per symbol

use chrono::NaiveDate;
use lynx_core::data::Table;
use lynx_core::domain::ExitReason;
use lynx_core::engine::{run_backtest, ConflictMode, EngineConfig};
use lynx_core::fees::{FeeOverride, FeeOverrides};
use proptest::prelude::*;
use std::collections::HashMap;

const SYMBOLS: [&str; 3] = ["2330.TW", "2317.TW", "AAPL.US"];

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_price() -> impl Strategy<Value = f64> {
    (10.0..1000.0_f64).prop_map(|p| (p * 100.0).round() / 100.0)
}

/// Signals are mostly zero, with occasional partial or full strength.
fn arb_signal() -> impl Strategy<Value = f64> {
    prop_oneof![
        6 => Just(0.0),
        2 => (0.05..1.0_f64),
        1 => Just(1.0),
    ]
}

fn arb_conflict_mode() -> impl Strategy<Value = ConflictMode> {
    prop_oneof![
        Just(ConflictMode::ExitFirst),
        Just(ConflictMode::EntryFirst),
        Just(ConflictMode::Ignore),
    ]
}

fn dates(n: usize) -> Vec<NaiveDate> {
    let start = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
    (0..n as i64).map(|i| start + chrono::Duration::days(i)).collect()
}

fn build(n: usize, values: &[Vec<f64>]) -> Table {
    Table::new(
        dates(n),
        SYMBOLS
            .iter()
            .zip(values)
            .map(|(s, v)| (s.to_string(), v.clone()))
            .collect(),
    )
    .unwrap()
}

/// Prices, entry and exit tables for all `SYMBOLS` over `n` dates.
fn arb_market(n: usize) -> impl Strategy<Value = (Table, Table, Table)> {
    let column = |s: BoxedStrategy<f64>| prop::collection::vec(s, n);
    (
        prop::collection::vec(column(arb_price().boxed()), SYMBOLS.len()),
        prop::collection::vec(column(arb_signal().boxed()), SYMBOLS.len()),
        prop::collection::vec(column(arb_signal().boxed()), SYMBOLS.len()),
    )
        .prop_map(move |(p, e, x)| (build(n, &p), build(n, &e), build(n, &x)))
}

fn zero_fees() -> FeeOverrides {
    ["_default", ".TW", ".US"]
        .into_iter()
        .map(|m| (m.to_string(), FeeOverride::zero()))
        .collect()
}

// ── 1. Conservation ──────────────────────────────────────────────────

proptest! {
    /// With no fees and constant prices, equity stays at initial capital.
    #[test]
    fn flat_prices_and_zero_fees_conserve_equity(
        (_, entry, exit) in arb_market(12),
        mode in arb_conflict_mode(),
        capital in 100_000.0..5_000_000.0_f64,
    ) {
        let flat = build(12, &[vec![500.0; 12], vec![100.0; 12], vec![200.0; 12]]);
        let config = EngineConfig::new(capital)
            .with_conflict_mode(mode)
            .with_fee_overrides(zero_fees());

        let result = run_backtest(&flat, &entry, &exit, &config).unwrap();

        for snap in &result.equity {
            prop_assert!((snap.equity - capital).abs() < 1e-6 * capital);
        }
        prop_assert!((result.final_equity - capital).abs() < 1e-6 * capital);
        for t in &result.trades {
            prop_assert!(t.pnl.abs() < 1e-6 * capital);
        }
    }
}

// ── 2. Lot Compliance ────────────────────────────────────────────────

proptest! {
    /// `.TW` trades are multiples of 1000 shares, except full closes which
    /// sell whatever is left (itself always a multiple here).
    #[test]
    fn tw_trades_are_whole_lots(
        (prices, entry, exit) in arb_market(15),
        stop in prop::option::of(0.02..0.3_f64),
    ) {
        let mut config = EngineConfig::new(5_000_000.0);
        config.stop_loss = stop;

        let result = run_backtest(&prices, &entry, &exit, &config).unwrap();

        for t in result.trades.iter().filter(|t| t.symbol.ends_with(".TW")) {
            prop_assert!(t.shares > 0);
            prop_assert_eq!(t.shares % 1000, 0);
        }
    }
}

// ── 3. Snapshots ─────────────────────────────────────────────────────

proptest! {
    /// One snapshot per date in ascending order, and the equity identity
    /// holds on every one of them.
    #[test]
    fn snapshots_cover_every_date(
        (prices, entry, exit) in arb_market(20),
        mode in arb_conflict_mode(),
        take in prop::option::of(0.05..0.5_f64),
    ) {
        let mut config = EngineConfig::new(2_000_000.0).with_conflict_mode(mode);
        config.take_profit = take;

        let result = run_backtest(&prices, &entry, &exit, &config).unwrap();

        prop_assert_eq!(result.equity.len(), prices.len());
        for (snap, date) in result.equity.iter().zip(prices.dates()) {
            prop_assert_eq!(snap.date, *date);
            prop_assert!((snap.equity - (snap.cash + snap.holdings)).abs() < 1e-6);
        }
        for pair in result.equity.windows(2) {
            prop_assert!(pair[0].date < pair[1].date);
        }
    }
}

// ── 4. Cash ──────────────────────────────────────────────────────────

proptest! {
    /// Entries never spend more than the cash on hand.
    #[test]
    fn cash_never_negative(
        (prices, entry, exit) in arb_market(20),
        mode in arb_conflict_mode(),
    ) {
        let config = EngineConfig::new(1_000_000.0).with_conflict_mode(mode);

        let result = run_backtest(&prices, &entry, &exit, &config).unwrap();

        for snap in &result.equity {
            prop_assert!(snap.cash >= 0.0);
            prop_assert!(snap.holdings >= 0.0);
        }
        prop_assert!(result.final_equity >= 0.0);
    }
}

// ── 5. Position Uniqueness ───────────────────────────────────────────

proptest! {
    /// A symbol is never held twice: a new holding starts no earlier than
    /// the exit of the previous one, and forced closes happen on the last date.
    #[test]
    fn at_most_one_position_per_symbol(
        (prices, entry, exit) in arb_market(20),
        mode in arb_conflict_mode(),
        stop in prop::option::of(0.02..0.3_f64),
    ) {
        let mut config = EngineConfig::new(3_000_000.0).with_conflict_mode(mode);
        config.stop_loss = stop;

        let result = run_backtest(&prices, &entry, &exit, &config).unwrap();

        let mut last_close: HashMap<&str, (NaiveDate, NaiveDate)> = HashMap::new();
        for t in &result.trades {
            if let Some((prev_entry, prev_exit)) = last_close.get(t.symbol.as_str()) {
                if t.entry_date != *prev_entry {
                    prop_assert!(t.entry_date >= *prev_exit);
                }
            }
            last_close.insert(t.symbol.as_str(), (t.entry_date, t.exit_date));
        }

        let final_date = *prices.dates().last().unwrap();
        let closed_at_end = result
            .trades
            .iter()
            .filter(|t| t.exit_reason == ExitReason::EndOfData)
            .all(|t| t.exit_date == final_date);
        prop_assert!(closed_at_end);
    }
}
