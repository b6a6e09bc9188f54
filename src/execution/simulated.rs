use crate::data::{MarketReader, Orderbook};
use crate::event::{Event, EventQueue};
use crate::execution::error::ExecutionError;
use crate::execution::fill::{FeeTable, FillEvent};
use crate::execution::order::{OrderEvent, OrderState, OrderType, RestingOrder, Side};
use crate::execution::ExecutionHandler;
use crate::{Instrument, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Configuration for constructing a [`SimulatedExchange`] via the new() constructor method.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Per-venue maker/taker fee schedule applied to generated fills.
    pub fees: FeeTable,
    /// Reprice a POST_ONLY order that would cross on arrival to the passive side of the book,
    /// instead of cancelling it the way a conventional venue would.
    pub reprice_crossing_post_only: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            fees: FeeTable::default(),
            reprice_crossing_post_only: true,
        }
    }
}

/// Simulated execution handler: a miniature matching engine that tracks the backtest's own
/// resting orders per instrument and matches them against the recorded best bid/ask.
///
/// Matching always consults the latest orderbook snapshot, never the trade stream. Order size is
/// not modelled for fill feasibility: a request exceeding the advertised size at the touch still
/// fills in full, and is surfaced as a warning. Partial fills do not exist.
#[derive(Clone, Debug)]
pub struct SimulatedExchange {
    fees: FeeTable,
    reprice_crossing_post_only: bool,
    /// Resting orders per instrument, in insertion order.
    resting: HashMap<Instrument, Vec<RestingOrder>>,
    /// Cached minimum effective time per instrument, recomputed on every insertion, removal &
    /// bulk-cancel so frequent market events skip instruments with nothing matchable yet.
    min_effective_time: HashMap<Instrument, Option<Timestamp>>,
}

impl SimulatedExchange {
    /// Constructs a new [`SimulatedExchange`] for the provided fixed instrument set.
    pub fn new(instruments: &[Instrument], config: Config) -> Self {
        Self {
            fees: config.fees,
            reprice_crossing_post_only: config.reprice_crossing_post_only,
            resting: instruments
                .iter()
                .cloned()
                .map(|instrument| (instrument, Vec::new()))
                .collect(),
            min_effective_time: instruments
                .iter()
                .cloned()
                .map(|instrument| (instrument, None))
                .collect(),
        }
    }

    /// Resting orders of the specified [`Instrument`], in insertion order.
    pub fn resting_orders(&self, instrument: &Instrument) -> &[RestingOrder] {
        self.resting
            .get(instrument)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Cached minimum effective time of the specified [`Instrument`]'s resting orders.
    pub fn min_effective_time(&self, instrument: &Instrument) -> Option<Timestamp> {
        self.min_effective_time.get(instrument).copied().flatten()
    }

    fn recompute_min_effective_time(&mut self) {
        for (instrument, orders) in &self.resting {
            let min = orders.iter().map(|order| order.effective_time).min();
            self.min_effective_time.insert(instrument.clone(), min);
        }
    }

    /// Attempt to match every due resting order of one instrument against its latest book.
    fn try_execute_orders(
        &mut self,
        instrument: &Instrument,
        data: &dyn MarketReader,
        events: &mut EventQueue,
    ) -> Result<(), ExecutionError> {
        let now = data.now();
        // No book observed yet: nothing to price against
        let Some(lob) = data.latest_lob(instrument) else {
            return Ok(());
        };
        let Some(orders) = self.resting.get_mut(instrument) else {
            return Ok(());
        };

        for order in orders.iter_mut() {
            if order.state == OrderState::Done || order.effective_time > now {
                continue;
            }

            let fill = match order.kind {
                OrderType::Market => execute_market_order(order, &lob, &self.fees, now)?,
                OrderType::Ioc => execute_ioc_order(order, &lob, &self.fees, now)?,
                OrderType::Limit => execute_limit_order(order, &lob, &self.fees, now)?,
                OrderType::PostOnly => execute_post_only_order(
                    order,
                    &lob,
                    &self.fees,
                    now,
                    self.reprice_crossing_post_only,
                )?,
            };

            if let Some(fill) = fill {
                debug!(
                    order_id = fill.order_id,
                    instrument = %fill.instrument,
                    flag = ?fill.flag,
                    price = fill.price,
                    is_maker = fill.is_maker,
                    "generated fill"
                );
                events.push(Event::Fill(fill));
            }
        }

        Ok(())
    }
}

impl ExecutionHandler for SimulatedExchange {
    fn on_order(
        &mut self,
        order: OrderEvent,
        data: &dyn MarketReader,
        events: &mut EventQueue,
    ) -> Result<(), ExecutionError> {
        if order.kind != OrderType::Market && order.limit_price.is_none() {
            return Err(ExecutionError::MissingLimitPrice {
                order_id: order.order_id,
                kind: order.kind,
            });
        }

        let Some(orders) = self.resting.get_mut(&order.instrument) else {
            return Err(ExecutionError::UnknownInstrument {
                order_id: order.order_id,
                instrument: order.instrument.id(),
            });
        };
        debug!(
            order_id = order.order_id,
            instrument = %order.instrument,
            kind = ?order.kind,
            side = ?order.side,
            effective_time = order.effective_time,
            "accepted order"
        );
        orders.push(RestingOrder::from(order));
        self.recompute_min_effective_time();

        // Try the order against the current book without waiting for the next tick
        self.on_market(data, events)
    }

    fn on_market(
        &mut self,
        data: &dyn MarketReader,
        events: &mut EventQueue,
    ) -> Result<(), ExecutionError> {
        let now = data.now();
        let due: Vec<Instrument> = self
            .min_effective_time
            .iter()
            .filter(|(_, min)| min.is_some_and(|min| min <= now))
            .map(|(instrument, _)| instrument.clone())
            .collect();

        for instrument in due {
            self.try_execute_orders(&instrument, data, events)?;
        }

        Ok(())
    }

    fn on_fill(&mut self, fill: &FillEvent) -> Result<(), ExecutionError> {
        if let Some(orders) = self.resting.get_mut(&fill.instrument) {
            orders.retain(|order| order.order_id != fill.order_id);
            self.recompute_min_effective_time();
        }
        Ok(())
    }

    fn cancel_all(&mut self) {
        for orders in self.resting.values_mut() {
            orders.clear();
        }
        self.recompute_min_effective_time();
        debug!("cancelled all resting orders");
    }
}

/// The price an aggressive order of this side trades at: the opposite touch.
fn touch_price(side: Side, lob: &Orderbook) -> f64 {
    match side {
        Side::Buy => lob.ask,
        Side::Sell => lob.bid,
    }
}

/// The advertised size at the touch an aggressive order of this side consumes.
fn touch_qty(side: Side, lob: &Orderbook) -> f64 {
    match side {
        Side::Buy => lob.ask_qty,
        Side::Sell => lob.bid_qty,
    }
}

/// The passive price an order of this side can rest at without taking.
fn passive_price(side: Side, lob: &Orderbook) -> f64 {
    match side {
        Side::Buy => lob.bid,
        Side::Sell => lob.ask,
    }
}

/// Whether a limit price of this side crosses the current touch.
fn crosses(side: Side, limit_price: f64, lob: &Orderbook) -> bool {
    match side {
        Side::Buy => limit_price >= lob.ask,
        Side::Sell => limit_price <= lob.bid,
    }
}

fn warn_if_oversize(order: &RestingOrder, lob: &Orderbook) {
    let available = touch_qty(order.side, lob);
    if order.quantity > available {
        warn!(
            order_id = order.order_id,
            instrument = %order.instrument,
            quantity = order.quantity,
            available,
            "fill quantity exceeds the advertised size at the best level"
        );
    }
}

fn execute_market_order(
    order: &mut RestingOrder,
    lob: &Orderbook,
    fees: &FeeTable,
    now: Timestamp,
) -> Result<Option<FillEvent>, ExecutionError> {
    if order.effective_time > now {
        return Ok(None);
    }

    warn_if_oversize(order, lob);
    let fee_rate = fees.rate(&order.instrument.venue, false);
    order.state = OrderState::Done;

    Ok(Some(FillEvent::filled(
        now,
        order.instrument.clone(),
        order.order_id,
        order.side,
        order.quantity,
        touch_price(order.side, lob),
        false,
        fee_rate,
    )))
}

fn execute_ioc_order(
    order: &mut RestingOrder,
    lob: &Orderbook,
    fees: &FeeTable,
    now: Timestamp,
) -> Result<Option<FillEvent>, ExecutionError> {
    if order.effective_time > now {
        return Ok(None);
    }
    let limit_price = order.limit_price.ok_or(ExecutionError::MissingLimitPrice {
        order_id: order.order_id,
        kind: order.kind,
    })?;

    let fee_rate = fees.rate(&order.instrument.venue, false);
    order.state = OrderState::Done;

    // An IOC always produces a fill event: traded in full, or cancelled untouched
    if crosses(order.side, limit_price, lob) {
        warn_if_oversize(order, lob);
        Ok(Some(FillEvent::filled(
            now,
            order.instrument.clone(),
            order.order_id,
            order.side,
            order.quantity,
            touch_price(order.side, lob),
            false,
            fee_rate,
        )))
    } else {
        Ok(Some(FillEvent::canceled(
            now,
            order.instrument.clone(),
            order.order_id,
            order.side,
            order.quantity,
            false,
            fee_rate,
        )))
    }
}

fn execute_limit_order(
    order: &mut RestingOrder,
    lob: &Orderbook,
    fees: &FeeTable,
    now: Timestamp,
) -> Result<Option<FillEvent>, ExecutionError> {
    if order.effective_time > now {
        return Ok(None);
    }
    let limit_price = order.limit_price.ok_or(ExecutionError::MissingLimitPrice {
        order_id: order.order_id,
        kind: order.kind,
    })?;

    let crossed = crosses(order.side, limit_price, lob);
    match order.state {
        // Arrival attempt: a crossing limit takes at the touch
        OrderState::Pending => {
            if crossed {
                warn_if_oversize(order, lob);
                let fee_rate = fees.rate(&order.instrument.venue, false);
                order.state = OrderState::Done;
                Ok(Some(FillEvent::filled(
                    now,
                    order.instrument.clone(),
                    order.order_id,
                    order.side,
                    order.quantity,
                    touch_price(order.side, lob),
                    false,
                    fee_rate,
                )))
            } else {
                order.state = OrderState::Resting;
                Ok(None)
            }
        }
        // Resting attempt: once the book crosses the order, it makes at its own price
        OrderState::Resting => {
            if crossed {
                let fee_rate = fees.rate(&order.instrument.venue, true);
                order.state = OrderState::Done;
                Ok(Some(FillEvent::filled(
                    now,
                    order.instrument.clone(),
                    order.order_id,
                    order.side,
                    order.quantity,
                    limit_price,
                    true,
                    fee_rate,
                )))
            } else {
                Ok(None)
            }
        }
        OrderState::Done => Ok(None),
    }
}

fn execute_post_only_order(
    order: &mut RestingOrder,
    lob: &Orderbook,
    fees: &FeeTable,
    now: Timestamp,
    reprice_crossing: bool,
) -> Result<Option<FillEvent>, ExecutionError> {
    if order.effective_time > now {
        return Ok(None);
    }
    let limit_price = order.limit_price.ok_or(ExecutionError::MissingLimitPrice {
        order_id: order.order_id,
        kind: order.kind,
    })?;

    let crossed = crosses(order.side, limit_price, lob);
    match order.state {
        // Arrival attempt: a POST_ONLY never takes
        OrderState::Pending => {
            if crossed {
                if reprice_crossing {
                    order.limit_price = Some(passive_price(order.side, lob));
                    order.state = OrderState::Resting;
                    Ok(None)
                } else {
                    let fee_rate = fees.rate(&order.instrument.venue, true);
                    order.state = OrderState::Done;
                    Ok(Some(FillEvent::canceled(
                        now,
                        order.instrument.clone(),
                        order.order_id,
                        order.side,
                        order.quantity,
                        true,
                        fee_rate,
                    )))
                }
            } else {
                order.state = OrderState::Resting;
                Ok(None)
            }
        }
        // Resting attempt: makes at its (possibly repriced) own price
        OrderState::Resting => {
            if crossed {
                let fee_rate = fees.rate(&order.instrument.venue, true);
                order.state = OrderState::Done;
                Ok(Some(FillEvent::filled(
                    now,
                    order.instrument.clone(),
                    order.order_id,
                    order.side,
                    order.quantity,
                    limit_price,
                    true,
                    fee_rate,
                )))
            } else {
                Ok(None)
            }
        }
        OrderState::Done => Ok(None),
    }
}
