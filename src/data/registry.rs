use crate::data::{Orderbook, Trade};
use crate::{Instrument, Timestamp};
use std::collections::HashMap;

/// Observed tick history for one instrument.
///
/// Sparse maps keyed only by timestamps that actually carried a tick, plus the latest such
/// timestamp for O(1) "latest" access. Written exclusively by the cursor between advancing the
/// clock and the scheduler's `Market` enqueue, so every read satisfies `tick time <= now`.
#[derive(Clone, Debug, Default)]
pub struct InstrumentHistory {
    last_lob_time: Option<Timestamp>,
    lobs: HashMap<Timestamp, Orderbook>,
    last_trade_time: Option<Timestamp>,
    trades: HashMap<Timestamp, Vec<Trade>>,
}

impl InstrumentHistory {
    /// Timestamp of the most recent orderbook tick observed.
    pub fn last_lob_time(&self) -> Option<Timestamp> {
        self.last_lob_time
    }

    /// Timestamp of the most recent trade tick observed.
    pub fn last_trade_time(&self) -> Option<Timestamp> {
        self.last_trade_time
    }

    /// Record an orderbook tick as observed.
    pub fn register_lob(&mut self, lob: Orderbook) {
        self.last_lob_time = Some(lob.time);
        self.lobs.insert(lob.time, lob);
    }

    /// Record the trade ticks that arrived at one timestamp, preserving input order.
    pub fn register_trades(&mut self, time: Timestamp, trades: &[Trade]) {
        if trades.is_empty() {
            return;
        }
        self.last_trade_time = Some(time);
        self.trades.insert(time, trades.to_vec());
    }

    /// Most recent orderbook tick observed, if any.
    pub fn latest_lob(&self) -> Option<Orderbook> {
        self.last_lob_time
            .and_then(|time| self.lobs.get(&time).copied())
    }

    /// Most recent trade tick observed (last element of the latest timestamp's list), if any.
    pub fn latest_trade(&self) -> Option<Trade> {
        self.last_trade_time
            .and_then(|time| self.trades.get(&time))
            .and_then(|trades| trades.last().copied())
    }

    /// Orderbook tick observed at the exact timestamp, if one was registered.
    pub fn lob_at(&self, time: Timestamp) -> Option<Orderbook> {
        self.lobs.get(&time).copied()
    }

    /// Trade ticks observed at the exact timestamp, if any were registered.
    pub fn trades_at(&self, time: Timestamp) -> Option<&[Trade]> {
        self.trades.get(&time).map(Vec::as_slice)
    }
}

/// Latest-view registry: [`InstrumentHistory`] per instrument of the fixed backtest set.
#[derive(Clone, Debug, Default)]
pub struct TickRegistry {
    all: HashMap<Instrument, InstrumentHistory>,
}

impl TickRegistry {
    /// Constructs a new [`TickRegistry`] with an empty history per provided [`Instrument`].
    pub fn new(instruments: &[Instrument]) -> Self {
        Self {
            all: instruments
                .iter()
                .cloned()
                .map(|instrument| (instrument, InstrumentHistory::default()))
                .collect(),
        }
    }

    /// History of the specified [`Instrument`], if it is part of the backtest set.
    pub fn history(&self, instrument: &Instrument) -> Option<&InstrumentHistory> {
        self.all.get(instrument)
    }

    /// Record an orderbook tick as observed for the specified [`Instrument`].
    pub fn register_lob(&mut self, instrument: &Instrument, lob: Orderbook) {
        self.all.entry(instrument.clone()).or_default().register_lob(lob);
    }

    /// Record trade ticks as observed for the specified [`Instrument`].
    pub fn register_trades(&mut self, instrument: &Instrument, time: Timestamp, trades: &[Trade]) {
        self.all
            .entry(instrument.clone())
            .or_default()
            .register_trades(time, trades);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lob(time: Timestamp, bid: f64, ask: f64) -> Orderbook {
        Orderbook {
            time,
            bid,
            bid_qty: 1.0,
            ask,
            ask_qty: 1.0,
        }
    }

    fn trade(time: Timestamp, price: f64) -> Trade {
        Trade {
            time,
            price,
            qty: 1.0,
            is_buyer_maker: false,
        }
    }

    #[test]
    fn should_return_latest_lob_after_multiple_registrations() {
        let instrument = Instrument::new("btc_usdt", "binance");
        let mut registry = TickRegistry::new(std::slice::from_ref(&instrument));

        registry.register_lob(&instrument, lob(1000, 99.0, 100.0));
        registry.register_lob(&instrument, lob(2000, 99.5, 100.5));

        let history = registry.history(&instrument).unwrap();
        assert_eq!(history.last_lob_time(), Some(2000));
        assert_eq!(history.latest_lob().unwrap().bid, 99.5);
        assert_eq!(history.lob_at(1000).unwrap().bid, 99.0);
    }

    #[test]
    fn should_preserve_trade_order_and_expose_last_print() {
        let instrument = Instrument::new("btc_usdt", "binance");
        let mut registry = TickRegistry::new(std::slice::from_ref(&instrument));

        registry.register_trades(&instrument, 1000, &[trade(1000, 10.0), trade(1000, 11.0)]);

        let history = registry.history(&instrument).unwrap();
        assert_eq!(history.last_trade_time(), Some(1000));
        assert_eq!(history.latest_trade().unwrap().price, 11.0);
        assert_eq!(history.trades_at(1000).unwrap().len(), 2);
    }

    #[test]
    fn should_ignore_empty_trade_registrations() {
        let instrument = Instrument::new("btc_usdt", "binance");
        let mut registry = TickRegistry::new(std::slice::from_ref(&instrument));

        registry.register_trades(&instrument, 1000, &[]);

        let history = registry.history(&instrument).unwrap();
        assert_eq!(history.last_trade_time(), None);
        assert_eq!(history.latest_trade(), None);
    }
}
