use crate::{Instrument, Timestamp};
use serde::{Deserialize, Serialize};

/// Communicates a u64 is a unique order identifier, supplied by the strategy and unique across
/// the run.
pub type OrderId = u64;

/// Side of an order or fill.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// Sign applied to a quantity on this side: +1 for buys, -1 for sells.
    pub fn signum(&self) -> f64 {
        match self {
            Side::Buy => 1.0,
            Side::Sell => -1.0,
        }
    }
}

/// Order semantics supported by the simulated exchange.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize, Deserialize)]
pub enum OrderType {
    /// Fill immediately at the touch, regardless of limit price.
    Market,
    /// Immediate-or-cancel: fill at the touch if the limit crosses, otherwise cancel.
    Ioc,
    /// Fill as taker at the touch if the limit crosses on arrival, otherwise rest and fill as
    /// maker at the limit price once the book crosses it.
    Limit,
    /// Never take: a limit that would cross on arrival is repriced to the passive side of the
    /// book (or cancelled, depending on exchange configuration), then fills as maker.
    PostOnly,
}

/// Lifecycle of an order on the simulated exchange.
///
/// `Pending` orders have not yet been tried against the book (they may still be in flight due to
/// order-arrival latency); the first match attempt prices them with arrival (taker) semantics
/// and moves them on. `Resting` orders have been tried at least once and price with maker
/// semantics. `Done` orders have had their terminal fill emitted and are dropped once that fill
/// traverses the queue.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize, Deserialize)]
pub enum OrderState {
    Pending,
    Resting,
    Done,
}

/// Order request produced by a strategy for the execution handler to action.
///
/// `effective_time` is the timestamp at which the order reaches the exchange, ie/ submission
/// time plus the strategy's configured latency. An order is never matchable before the simulated
/// clock reaches it.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct OrderEvent {
    pub effective_time: Timestamp,
    pub instrument: Instrument,
    pub order_id: OrderId,
    pub kind: OrderType,
    pub side: Side,
    /// Non-negative quantity to trade.
    pub quantity: f64,
    /// Limit price, required for every [`OrderType`] except [`OrderType::Market`].
    pub limit_price: Option<f64>,
}

/// An order resting on the simulated exchange, waiting to be matched against the recorded book.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct RestingOrder {
    pub order_id: OrderId,
    pub instrument: Instrument,
    pub effective_time: Timestamp,
    pub side: Side,
    pub kind: OrderType,
    pub quantity: f64,
    /// Limit price. A crossing POST_ONLY is repriced in place, so this may differ from the
    /// submitted price.
    pub limit_price: Option<f64>,
    pub state: OrderState,
}

impl From<OrderEvent> for RestingOrder {
    fn from(order: OrderEvent) -> Self {
        Self {
            order_id: order.order_id,
            instrument: order.instrument,
            effective_time: order.effective_time,
            side: order.side,
            kind: order.kind,
            quantity: order.quantity,
            limit_price: order.limit_price,
            state: OrderState::Pending,
        }
    }
}
