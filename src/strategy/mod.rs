use crate::data::MarketReader;
use crate::event::EventQueue;
use crate::execution::fill::FillEvent;

/// Reacts to market updates & fill confirmations, and may submit orders or synthetic cancels by
/// enqueuing [`Event::Order`](crate::event::Event) / [`Event::Fill`](crate::event::Event)s.
///
/// A strategy cancels one of its resting orders by enqueuing a
/// [`FillEvent`](crate::execution::fill::FillEvent) with
/// [`FillFlag::Canceled`](crate::execution::fill::FillFlag) for the outstanding order id: the
/// event queue is the sole channel between components, and the matching engine treats such a
/// fill as a cleanup signal.
///
/// Order-arrival latency is the strategy's to model: the `effective_time` it stamps on an
/// [`OrderEvent`](crate::execution::order::OrderEvent) is the submission time plus its
/// configured latency.
pub trait Strategy {
    /// React to the simulated clock advancing. The ticks that arrived are read back through the
    /// provided [`MarketReader`].
    fn on_market(&mut self, data: &dyn MarketReader, events: &mut EventQueue);

    /// React to a [`FillEvent`] for one of this strategy's orders.
    fn on_fill(&mut self, fill: &FillEvent, data: &dyn MarketReader, events: &mut EventQueue);
}
