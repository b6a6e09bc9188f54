use crate::data::error::DataError;
use crate::{Instrument, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Lobster data module specific errors.
pub mod error;

/// Seam between the kernel and on-disk market data files, plus the bundled CSV implementation.
pub mod source;

/// Append-only per-instrument history of the ticks observed so far, with O(1) latest access.
pub mod registry;

/// Hourly-chunked historic market data cursor that merges trade & orderbook files into one
/// monotone timeline and acts as the system heartbeat.
pub mod cursor;

/// Best bid & ask order book snapshot for one instrument at one timestamp.
///
/// A well-formed tick has `bid <= ask` and non-negative sizes. At most one orderbook tick exists
/// per `(instrument, time)`: duplicated timestamps within a file are reduced to the last sample.
#[derive(Copy, Clone, PartialEq, PartialOrd, Debug, Serialize, Deserialize)]
pub struct Orderbook {
    pub time: Timestamp,
    pub bid: f64,
    pub bid_qty: f64,
    pub ask: f64,
    pub ask_qty: f64,
}

impl Orderbook {
    /// Mid price of the snapshot.
    pub fn mid(&self) -> f64 {
        (self.bid + self.ask) / 2.0
    }
}

/// Trade print for one instrument at one timestamp.
///
/// Multiple trades may share a `(instrument, time)` and are preserved in input order.
#[derive(Copy, Clone, PartialEq, PartialOrd, Debug, Serialize, Deserialize)]
pub struct Trade {
    pub time: Timestamp,
    pub price: f64,
    pub qty: f64,
    pub is_buyer_maker: bool,
}

/// Determines if a process can continue.
pub trait Continuer {
    /// Returns a [`Continuation`] to communicate if a process can continue.
    fn can_continue(&self) -> &Continuation;
}

/// Returned by a [`Continuer`] to communicate if a process should continue.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize, Deserialize)]
pub enum Continuation {
    Continue,
    Stop,
}

/// Advances the simulated clock to the next recorded timestamp, acting as the system heartbeat.
pub trait MarketGenerator {
    /// Move the clock forward one timeline entry, merging any ticks that carry the new timestamp
    /// into the latest-view registry.
    ///
    /// Returns `Ok(true)` if a new market event was produced, or `Ok(false)` once the timeline is
    /// exhausted (after which [`Continuer::can_continue`] reports
    /// [`Continuation::Stop`]).
    fn advance(&mut self) -> Result<bool, DataError>;
}

/// Read access to the simulated clock and the ticks observed up to it.
///
/// All data returned has timestamp `<= now()`. Handlers receive a `&dyn MarketReader` on every
/// dispatch and must not hold tick data across invocations.
pub trait MarketReader {
    /// Current simulated timestamp.
    fn now(&self) -> Timestamp;

    /// First timestamp of the backtest timeline.
    fn start_time(&self) -> Timestamp;

    /// The fixed instrument set this backtest runs on.
    fn instruments(&self) -> &[Instrument];

    /// Last observed orderbook snapshot for the instrument, if any has been observed yet.
    fn latest_lob(&self, instrument: &Instrument) -> Option<Orderbook>;

    /// Most recent trade print for the instrument, if any has been observed yet.
    fn latest_trade(&self, instrument: &Instrument) -> Option<Trade>;

    /// Latest price for the instrument: the trade price if a trade arrived at `now()`, otherwise
    /// the mid of the latest orderbook snapshot.
    fn latest_price(&self, instrument: &Instrument) -> Option<f64>;

    /// Instruments whose trade list received at least one new record at `now()`.
    fn updated_trade_instruments(&self) -> Vec<Instrument>;

    /// Last observed orderbook snapshot per instrument, absent if never observed.
    fn latest_lobs(&self) -> HashMap<Instrument, Orderbook> {
        self.instruments()
            .iter()
            .filter_map(|instrument| {
                self.latest_lob(instrument)
                    .map(|lob| (instrument.clone(), lob))
            })
            .collect()
    }

    /// Most recent trade print per instrument, absent if never observed.
    fn latest_trades(&self) -> HashMap<Instrument, Trade> {
        self.instruments()
            .iter()
            .filter_map(|instrument| {
                self.latest_trade(instrument)
                    .map(|trade| (instrument.clone(), trade))
            })
            .collect()
    }

    /// Latest price per instrument, see [`MarketReader::latest_price`].
    fn latest_prices(&self) -> HashMap<Instrument, f64> {
        self.instruments()
            .iter()
            .filter_map(|instrument| {
                self.latest_price(instrument)
                    .map(|price| (instrument.clone(), price))
            })
            .collect()
    }
}
