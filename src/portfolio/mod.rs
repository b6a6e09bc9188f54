use crate::data::MarketReader;
use crate::execution::fill::FillEvent;
use crate::Timestamp;
use serde::{Deserialize, Serialize};

/// Recording portfolio keeping the fill log, signed positions & equity series of a run.
pub mod recorder;

/// Observes the backtest from the outside: reacts to market updates & fills but never produces
/// events. Bookkeeping, analytics & reporting live behind this seam.
pub trait Portfolio {
    /// React to the simulated clock advancing.
    fn on_market(&mut self, data: &dyn MarketReader);

    /// React to a [`FillEvent`] generated by the execution handler.
    fn on_fill(&mut self, fill: &FillEvent, data: &dyn MarketReader);
}

/// Total equity at a point in simulated time.
#[derive(Copy, Clone, PartialEq, PartialOrd, Debug, Serialize, Deserialize)]
pub struct EquityPoint {
    pub time: Timestamp,
    pub equity: f64,
}
