use crate::data::MarketReader;
use crate::event::EventQueue;
use crate::execution::error::ExecutionError;
use crate::execution::fill::FillEvent;
use crate::execution::order::OrderEvent;

/// Lobster execution module specific errors.
pub mod error;

/// Order vocabulary: sides, order types, the resting-order lifecycle, and the OrderEvent record.
pub mod order;

/// FillEvent record, per-venue maker/taker fee schedule, and signed cash-cost arithmetic.
pub mod fill;

/// SimulatedExchange: the miniature matching engine backtests execute against.
pub mod simulated;

/// Capability set of a simulated venue: consumes [`OrderEvent`]s, generates [`FillEvent`]s, and
/// releases resting orders when their fills come back around the queue.
pub trait ExecutionHandler {
    /// Accept a new [`OrderEvent`] onto the venue's resting book, then immediately try it
    /// against the current market so arrival-time fills happen without waiting for the next
    /// tick.
    fn on_order(
        &mut self,
        order: OrderEvent,
        data: &dyn MarketReader,
        events: &mut EventQueue,
    ) -> Result<(), ExecutionError>;

    /// Try every matchable resting order against the latest market state, enqueuing a
    /// [`FillEvent`] per match.
    fn on_market(
        &mut self,
        data: &dyn MarketReader,
        events: &mut EventQueue,
    ) -> Result<(), ExecutionError>;

    /// Release the resting order the [`FillEvent`] refers to. Cancelled fills are cleanup
    /// signals only: no bookkeeping happens beyond the removal.
    fn on_fill(&mut self, fill: &FillEvent) -> Result<(), ExecutionError>;

    /// Drop every resting order across every instrument. Emits no fills.
    fn cancel_all(&mut self);
}
