use crate::data::MarketReader;
use crate::execution::fill::{FillEvent, FillFlag};
use crate::portfolio::{EquityPoint, Portfolio};
use crate::Instrument;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Configuration for constructing a [`RecordingPortfolio`] via the new() constructor method.
#[derive(Copy, Clone, PartialEq, PartialOrd, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Starting cash balance in quote currency.
    pub initial_capital: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            initial_capital: 100_000.0,
        }
    }
}

/// Pure-observer [`Portfolio`] that records the run: cash balance, signed per-instrument
/// positions, the chronological fill log, and a net-value (equity) time series marked to the
/// latest observed price on every market update.
#[derive(Clone, Debug)]
pub struct RecordingPortfolio {
    initial_capital: f64,
    cash: f64,
    positions: HashMap<Instrument, f64>,
    equity_curve: Vec<EquityPoint>,
    fills: Vec<FillEvent>,
}

impl RecordingPortfolio {
    /// Constructs a new [`RecordingPortfolio`] with zeroed positions for the provided fixed
    /// instrument set.
    pub fn new(instruments: &[Instrument], config: Config) -> Self {
        Self {
            initial_capital: config.initial_capital,
            cash: config.initial_capital,
            positions: instruments
                .iter()
                .cloned()
                .map(|instrument| (instrument, 0.0))
                .collect(),
            equity_curve: Vec::new(),
            fills: Vec::new(),
        }
    }

    /// Starting cash balance.
    pub fn initial_capital(&self) -> f64 {
        self.initial_capital
    }

    /// Current cash balance.
    pub fn cash(&self) -> f64 {
        self.cash
    }

    /// Current signed position of the specified [`Instrument`].
    pub fn position(&self, instrument: &Instrument) -> f64 {
        self.positions.get(instrument).copied().unwrap_or(0.0)
    }

    /// Current signed position per instrument.
    pub fn positions(&self) -> &HashMap<Instrument, f64> {
        &self.positions
    }

    /// Chronological log of every traded fill observed.
    pub fn fills(&self) -> &[FillEvent] {
        &self.fills
    }

    /// Net value time series, one point per market update.
    pub fn equity_curve(&self) -> &[EquityPoint] {
        &self.equity_curve
    }
}

impl Portfolio for RecordingPortfolio {
    fn on_market(&mut self, data: &dyn MarketReader) {
        let mut equity = self.cash;
        for (instrument, position) in &self.positions {
            if *position == 0.0 {
                continue;
            }
            if let Some(price) = data.latest_price(instrument) {
                equity += position * price;
            }
        }
        self.equity_curve.push(EquityPoint {
            time: data.now(),
            equity,
        });
    }

    fn on_fill(&mut self, fill: &FillEvent, _: &dyn MarketReader) {
        // Cancelled fills are cleanup signals for the exchange, not trades
        if fill.flag != FillFlag::All {
            return;
        }

        *self.positions.entry(fill.instrument.clone()).or_insert(0.0) +=
            fill.side.signum() * fill.quantity;
        self.cash -= fill.cash_cost;
        debug!(
            order_id = fill.order_id,
            instrument = %fill.instrument,
            cash = self.cash,
            "updated holdings from fill"
        );
        self.fills.push(fill.clone());
    }
}
