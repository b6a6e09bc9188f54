//! # Lobster
//! [`Lobster`] is an event-driven backtesting kernel for **ultra-high-frequency trading
//! strategies**. It replays recorded per-instrument order book snapshots (best bid/ask with
//! sizes) and trade prints in strict time order, and drives a user-supplied strategy through a
//! simulated exchange that matches limit & market orders against the recorded book.
//!
//! ## Overview
//! At a high level, the kernel provides several de-coupled components that interact via a set of
//! traits and a single event queue:
//!
//! * **Data**: Continuer & MarketGenerator traits govern the advancement of the simulated clock,
//!   acting as the system heartbeat. The [`HistoricTradeLobHandler`](data::cursor::HistoricTradeLobHandler)
//!   implementation merges multi-instrument historical files into one monotone timeline and loads
//!   them in hourly chunks to bound resident memory. All market state is read back through the
//!   [`MarketReader`](data::MarketReader) trait.
//! * **Strategy**: The [`Strategy`](strategy::Strategy) trait reacts to market updates & fill
//!   confirmations, and submits orders by enqueuing [`Event::Order`](event::Event)s.
//! * **Portfolio**: The [`Portfolio`](portfolio::Portfolio) trait observes market updates & fills.
//!   A [`RecordingPortfolio`](portfolio::recorder::RecordingPortfolio) implementation is provided
//!   that keeps the fill log, signed positions and an equity time series.
//! * **Execution**: The [`ExecutionHandler`](execution::ExecutionHandler) trait governs the
//!   consumption of [`OrderEvent`](execution::order::OrderEvent)s and the generation of
//!   [`FillEvent`](execution::fill::FillEvent)s. The
//!   [`SimulatedExchange`](execution::simulated::SimulatedExchange) implementation tracks resting
//!   orders per instrument, applies MARKET / IOC / LIMIT / POST_ONLY semantics, models
//!   order-arrival latency, and emits fills with maker/taker-aware fees.
//! * **Scheduler**: Single-threaded [`Scheduler`](engine::Scheduler) owning the event queue.
//!   It advances the clock, enqueues exactly one `Market` event per tick, then drains the queue,
//!   dispatching each event to the registered handlers in a fixed priority order.
//!
//! Components never hold references to each other: orders and fills flow exclusively through the
//! event queue, and all market state is read through the [`MarketReader`](data::MarketReader)
//! supplied to each handler invocation.

#![warn(missing_copy_implementations)]

/// Defines the Orderbook & Trade tick records, the Continuer & MarketGenerator traits that
/// advance the simulated clock, the MarketReader read surface, and the hourly-chunked
/// HistoricTradeLobHandler that produces a monotone event stream from on-disk data.
pub mod data;

/// Defines the Strategy trait. A strategy reacts to market updates & fill confirmations and may
/// submit orders by enqueuing Order events.
pub mod strategy;

/// Defines the Portfolio trait, a pure observer of market updates & fills, and a
/// RecordingPortfolio implementation that keeps the fill log, positions, and equity series.
pub mod portfolio;

/// Defines the OrderEvent & FillEvent records, the per-venue maker/taker FeeTable, and the
/// SimulatedExchange matching engine that generates fills from resting orders.
pub mod execution;

/// Defines the Event enum whose variants drive the trading event loop (Market, Order, Fill), as
/// well as the FIFO EventQueue they travel through.
pub mod event;

/// Single-threaded Scheduler that owns the event queue, advances the market data cursor, and
/// drains events to the registered handlers in a fixed priority order.
pub mod engine;

/// Utilities for initialising tracing subscribers.
pub mod logging;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Communicates a String is a unique identifier for a trading venue (eg/ "binance").
pub type VenueId = String;

/// Communicates a String is a unique identifier for a pair symbol (eg/ "btc_usdt").
pub type SymbolId = String;

/// Communicates a String represents a unique canonical instrument identifier
/// (eg/ "btc_usdt_binance").
pub type InstrumentId = String;

/// Milliseconds since the Unix epoch. The simulated clock advances monotonically and
/// non-strictly over these values.
pub type Timestamp = i64;

/// Represents a unique combination of a [`SymbolId`] & a [`VenueId`]. The set of instruments a
/// backtest runs on is fixed at construction.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize, Deserialize)]
pub struct Instrument {
    pub symbol: SymbolId,
    pub venue: VenueId,
}

impl Instrument {
    /// Constructs a new [`Instrument`] using the provided [`SymbolId`] & [`VenueId`].
    pub fn new<S, V>(symbol: S, venue: V) -> Self
    where
        S: Into<SymbolId>,
        V: Into<VenueId>,
    {
        Self {
            symbol: symbol.into().to_lowercase(),
            venue: venue.into().to_lowercase(),
        }
    }

    /// Returns the canonical [`InstrumentId`] associated with this [`Instrument`] by utilising
    /// [`determine_instrument_id`] (eg/ "btc_usdt_binance").
    pub fn id(&self) -> InstrumentId {
        determine_instrument_id(&self.symbol, &self.venue)
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.symbol, self.venue)
    }
}

/// Returns the canonical identifier for a given instrument, where an 'instrument' is a unique
/// symbol-venue combination (eg/ "btc_usdt_binance").
pub fn determine_instrument_id(symbol: &str, venue: &str) -> InstrumentId {
    format!("{}_{}", symbol, venue)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_canonicalise_instrument_id_from_symbol_and_venue() {
        let instrument = Instrument::new("BTC_USDT", "Binance");
        assert_eq!(instrument.id(), "btc_usdt_binance");
        assert_eq!(instrument.to_string(), "btc_usdt_binance");
    }
}
