//! Date-by-date event loop: the heart of the backtesting engine.
//!
//! Five phases per date, always in this order:
//! 1. Drain stop-loss/take-profit exits queued on the previous date
//! 2. Detect new stop-loss/take-profit triggers at today's price
//! 3. Exit signals (with same-day entry conflict resolution)
//! 4. Entry signals: capital allocation by relative weight
//! 5. Equity snapshot
//!
//! After the last date every remaining position is closed with reason
//! `end_of_data`.

use std::collections::HashSet;

use chrono::NaiveDate;
use log::{debug, info, trace};

use crate::data::{AlignedSignals, PriceTable, SignalTable};
use crate::domain::{EquitySnapshot, ExitReason, Position, TradeRecord};
use crate::fees::{resolve_fees, resolve_lot_size, round_to_lot};

use super::cost_model::{buy_cost, sell_proceeds};
use super::state::{ConflictMode, EngineConfig, EngineError, EngineState, RunResult};

/// The date currently being simulated.
struct Day<'a> {
    index: usize,
    date: NaiveDate,
    prices: &'a PriceTable,
}

impl Day<'_> {
    fn price(&self, symbol: &str) -> f64 {
        self.prices.get(symbol, self.index).unwrap_or_default()
    }
}

/// Run a backtest over `prices`, driven by `entry` and `exit` signal strength.
///
/// Signal tables are reindexed onto the price table first: dates or symbols
/// they lack read as 0, and symbols absent from the price table are ignored.
/// Fails before simulating anything if the configuration is invalid, the price
/// table is empty, or any price is non-positive.
pub fn run_backtest(
    prices: &PriceTable,
    entry: &SignalTable,
    exit: &SignalTable,
    config: &EngineConfig,
) -> Result<RunResult, EngineError> {
    config.validate()?;
    if prices.is_empty() {
        return Err(EngineError::EmptyPriceTable);
    }
    check_prices(prices)?;

    let entry = AlignedSignals::align(entry, prices);
    let exit = AlignedSignals::align(exit, prices);
    let symbols = prices.symbols();
    let dates = prices.dates();

    info!(
        "backtest start: {} symbols, {} dates ({} .. {}), capital {:.2}",
        symbols.len(),
        dates.len(),
        dates[0],
        dates[dates.len() - 1],
        config.initial_capital
    );

    let mut state = EngineState::new(config.initial_capital);

    for (t, &date) in dates.iter().enumerate() {
        let day = Day {
            index: t,
            date,
            prices,
        };

        // ─── Phase 1: queued stop/take-profit exits ───
        drain_pending_exits(&mut state, config, symbols, &day);

        // ─── Phase 2: trigger detection ───
        detect_triggers(&mut state, config, symbols, &day);

        // ─── Phase 3: exit signals ───
        let blocked = process_exit_signals(&mut state, config, symbols, &day, &entry, &exit);

        // ─── Phase 4: entry signals ───
        process_entries(&mut state, config, symbols, &day, &entry, &blocked);

        // ─── Phase 5: equity snapshot ───
        let holdings = state.portfolio.holdings_value(|s| day.price(s));
        let snapshot =
            EquitySnapshot::new(date, state.portfolio.cash, holdings, state.previous_equity());
        state.equity.push(snapshot);
    }

    // The forced close supersedes anything still queued from the final date.
    if !state.pending_exits.is_empty() {
        debug!(
            "discarding {} queued exits from the final date in favour of end_of_data",
            state.pending_exits.len()
        );
        state.pending_exits.clear();
    }

    let last = Day {
        index: dates.len() - 1,
        date: dates[dates.len() - 1],
        prices,
    };
    for symbol in symbols {
        if state.portfolio.has_position(symbol) {
            execute_exit(&mut state, config, symbol, &last, None, ExitReason::EndOfData);
        }
    }

    let final_equity = state.portfolio.cash;
    info!(
        "backtest done: {} trades, final equity {:.2}",
        state.trades.len(),
        final_equity
    );

    Ok(RunResult {
        trades: state.trades,
        equity: state.equity,
        final_equity,
        date_count: dates.len(),
    })
}

/// Every price must be positive and finite.
fn check_prices(prices: &PriceTable) -> Result<(), EngineError> {
    for (symbol, column) in prices.iter_columns() {
        for (price, date) in column.iter().zip(prices.dates()) {
            if !(price.is_finite() && *price > 0.0) {
                return Err(EngineError::InvalidPrice {
                    symbol: symbol.to_string(),
                    date: *date,
                    price: *price,
                });
            }
        }
    }
    Ok(())
}

fn drain_pending_exits(
    state: &mut EngineState,
    config: &EngineConfig,
    symbols: &[String],
    day: &Day<'_>,
) {
    let pending = std::mem::take(&mut state.pending_exits);
    if pending.is_empty() {
        return;
    }
    for symbol in symbols {
        if let Some(&reason) = pending.get(symbol) {
            if state.portfolio.has_position(symbol) {
                execute_exit(state, config, symbol, day, None, reason);
            }
        }
    }
}

/// Queue at most one exit per symbol. Stop-loss is checked first.
fn detect_triggers(
    state: &mut EngineState,
    config: &EngineConfig,
    symbols: &[String],
    day: &Day<'_>,
) {
    if config.stop_loss.is_none() && config.take_profit.is_none() {
        return;
    }
    for symbol in symbols {
        let Some(pos) = state.portfolio.get_position(symbol) else {
            continue;
        };
        let ret = pos.return_pct(day.price(symbol));

        let reason = match (config.stop_loss, config.take_profit) {
            (Some(sl), _) if ret <= -sl => Some(ExitReason::StopLoss),
            (_, Some(tp)) if ret >= tp => Some(ExitReason::TakeProfit),
            _ => None,
        };
        if let Some(reason) = reason {
            debug!(
                "{} {symbol}: {reason} triggered at return {ret:.4}, exiting next date",
                day.date
            );
            state.pending_exits.insert(symbol.clone(), reason);
        }
    }
}

/// Shares to sell for an exit signal of strength `exit_value`.
///
/// Full exits sell everything held. Partial exits take `floor(held * value)`
/// rounded down to the lot size.
pub(crate) fn signal_exit_shares(held: u64, exit_value: f64, lot_size: u64) -> u64 {
    if exit_value >= 1.0 {
        return held;
    }
    let raw = (held as f64 * exit_value).floor() as u64;
    if raw >= held {
        return held;
    }
    round_to_lot(raw, lot_size)
}

/// Whole lots affordable with `allocation` at `price` (before fees).
pub(crate) fn entry_shares(allocation: f64, price: f64, lot_size: u64) -> u64 {
    let raw = (allocation / price).floor();
    if !(raw.is_finite() && raw > 0.0) {
        return 0;
    }
    round_to_lot(raw as u64, lot_size)
}

/// Returns the symbols whose entry is suppressed today by `ConflictMode::Ignore`.
fn process_exit_signals(
    state: &mut EngineState,
    config: &EngineConfig,
    symbols: &[String],
    day: &Day<'_>,
    entry: &AlignedSignals,
    exit: &AlignedSignals,
) -> HashSet<String> {
    let mut blocked = HashSet::new();

    for symbol in symbols {
        let exit_value = exit.value(symbol, day.index);
        if exit_value <= 0.0 {
            continue;
        }
        let Some(held) = state.portfolio.get_position(symbol).map(|p| p.shares) else {
            continue;
        };

        if entry.value(symbol, day.index) > 0.0 {
            match config.conflict_mode {
                ConflictMode::ExitFirst => {}
                ConflictMode::EntryFirst => {
                    trace!("{} {symbol}: entry_first conflict, exit skipped", day.date);
                    continue;
                }
                ConflictMode::Ignore => {
                    trace!("{} {symbol}: ignore conflict, exit and entry skipped", day.date);
                    blocked.insert(symbol.clone());
                    continue;
                }
            }
        }

        let lot_size = resolve_lot_size(symbol, Some(&config.lot_size_overrides));
        let shares = signal_exit_shares(held, exit_value, lot_size);
        if shares == 0 {
            trace!(
                "{} {symbol}: exit {exit_value} of {held} shares rounds to zero lots",
                day.date
            );
            continue;
        }
        execute_exit(state, config, symbol, day, Some(shares), ExitReason::Signal);
    }

    blocked
}

fn process_entries(
    state: &mut EngineState,
    config: &EngineConfig,
    symbols: &[String],
    day: &Day<'_>,
    entry: &AlignedSignals,
    blocked: &HashSet<String>,
) {
    let row_sum = entry.row_sum(day.index);
    if row_sum <= 0.0 {
        return;
    }
    // Weights above 100% in total never commit more than the cash on hand.
    let investable = state.portfolio.cash * row_sum.min(1.0);

    for symbol in symbols {
        let weight = entry.value(symbol, day.index);
        if weight <= 0.0 || blocked.contains(symbol) || state.portfolio.has_position(symbol) {
            continue;
        }

        let price = day.price(symbol);
        let allocation = investable * (weight / row_sum);
        let lot_size = resolve_lot_size(symbol, Some(&config.lot_size_overrides));
        let shares = entry_shares(allocation, price, lot_size);
        if shares == 0 {
            trace!(
                "{} {symbol}: allocation {allocation:.2} buys no whole lot of {lot_size} at {price}",
                day.date
            );
            continue;
        }

        let fees = resolve_fees(symbol, Some(&config.fee_overrides));
        let cost = buy_cost(price, shares, &fees);
        if cost > state.portfolio.cash {
            trace!(
                "{} {symbol}: cost {cost:.2} exceeds cash {:.2}, entry skipped",
                day.date,
                state.portfolio.cash
            );
            continue;
        }

        state.portfolio.cash -= cost;
        state
            .portfolio
            .open(Position::new(symbol.clone(), shares, price, day.date, cost));
        debug!(
            "{} {symbol}: opened {shares} @ {price} (cost {cost:.2})",
            day.date
        );
    }
}

/// Sell `requested` shares of `symbol` (everything held when `None`) at the
/// day's price and record the trade. Returns the shares actually sold.
fn execute_exit(
    state: &mut EngineState,
    config: &EngineConfig,
    symbol: &str,
    day: &Day<'_>,
    requested: Option<u64>,
    reason: ExitReason,
) -> u64 {
    let fees = resolve_fees(symbol, Some(&config.fee_overrides));
    let price = day.price(symbol);

    let Some(pos) = state.portfolio.get_position_mut(symbol) else {
        return 0;
    };
    let held = pos.shares;
    let exited = pos.reduce(requested.unwrap_or(held));
    if exited == 0 {
        return 0;
    }
    let cost_basis = pos.release_cost(exited, held);
    let entry_date = pos.entry_date;
    let entry_price = pos.entry_price;

    let proceeds = sell_proceeds(price, exited, &fees);
    state.portfolio.cash += proceeds;

    let pnl = proceeds - cost_basis;
    let return_pct = if cost_basis != 0.0 {
        pnl / cost_basis
    } else {
        0.0
    };

    debug!(
        "{} {symbol}: {reason} exit {exited}/{held} @ {price} (return {return_pct:.4})",
        day.date
    );
    state.trades.push(TradeRecord {
        symbol: symbol.to_string(),
        entry_date,
        entry_price,
        exit_date: day.date,
        exit_price: price,
        exit_reason: reason,
        shares: exited,
        pnl,
        return_pct,
    });

    state.portfolio.remove_if_flat(symbol);
    // A queued trigger belongs to the position it was measured on.
    if !state.portfolio.has_position(symbol) && state.pending_exits.remove(symbol).is_some() {
        trace!("{} {symbol}: position closed, queued trigger dropped", day.date);
    }
    exited
}
