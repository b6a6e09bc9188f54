use crate::data::{Continuation, Continuer, MarketGenerator, MarketReader};
use crate::engine::error::EngineError;
use crate::event::{Event, EventQueue};
use crate::execution::ExecutionHandler;
use crate::portfolio::Portfolio;
use crate::strategy::Strategy;
use tracing::{debug, info};
use uuid::Uuid;

/// Lobster engine module specific errors.
pub mod error;

/// Lego components for constructing a [`Scheduler`] via the new() constructor method.
#[derive(Debug)]
pub struct SchedulerLego<Data, Strat, Port, Exec>
where
    Data: Continuer + MarketGenerator + MarketReader,
    Strat: Strategy,
    Port: Portfolio,
    Exec: ExecutionHandler,
{
    /// Unique identifier for this backtest run.
    pub engine_id: Uuid,
    /// Market data handler acting as the system heartbeat.
    pub data: Data,
    /// Strategy reacting to market updates & fills, generating [`Event::Order`]s.
    pub strategy: Strat,
    /// Portfolio observing market updates & fills.
    pub portfolio: Port,
    /// Execution handler consuming [`Event::Order`]s & generating [`Event::Fill`]s.
    pub execution: Exec,
}

/// Deterministic single-threaded event scheduler: the only owner of the event queue.
///
/// Each iteration of the outer loop advances the simulated clock by exactly one recorded
/// timestamp and enqueues one `Market` event; the inner loop then drains the queue, dispatching
/// every event to the registered handlers in a fixed priority order:
///
/// | Event    | Dispatch order                      |
/// |----------|-------------------------------------|
/// | `Market` | Strategy -> Portfolio -> Execution  |
/// | `Order`  | Execution                           |
/// | `Fill`   | Execution -> Portfolio -> Strategy  |
///
/// Handlers may enqueue events freely during a drain; the drain processes them (in enqueue
/// order) before the clock advances again, so every event within a drain shares one timestamp.
#[derive(Debug)]
pub struct Scheduler<Data, Strat, Port, Exec>
where
    Data: Continuer + MarketGenerator + MarketReader,
    Strat: Strategy,
    Port: Portfolio,
    Exec: ExecutionHandler,
{
    engine_id: Uuid,
    data: Data,
    strategy: Strat,
    portfolio: Port,
    execution: Exec,
    /// Queue for storing [`Event`]s used by the trading loop in the run() method.
    events: EventQueue,
}

impl<Data, Strat, Port, Exec> Scheduler<Data, Strat, Port, Exec>
where
    Data: Continuer + MarketGenerator + MarketReader,
    Strat: Strategy,
    Port: Portfolio,
    Exec: ExecutionHandler,
{
    /// Constructs a new [`Scheduler`] instance using the provided [`SchedulerLego`].
    pub fn new(lego: SchedulerLego<Data, Strat, Port, Exec>) -> Self {
        info!(
            engine_id = %lego.engine_id,
            "constructed new Scheduler instance"
        );

        Self {
            engine_id: lego.engine_id,
            data: lego.data,
            strategy: lego.strategy,
            portfolio: lego.portfolio,
            execution: lego.execution,
            events: EventQueue::new(),
        }
    }

    /// Builder to construct [`Scheduler`] instances.
    pub fn builder() -> SchedulerBuilder<Data, Strat, Port, Exec> {
        SchedulerBuilder::new()
    }

    /// Run the backtest event-loop until the market data is exhausted or a fatal error occurs.
    ///
    /// Returns the [`Scheduler`] on natural termination so callers can harvest outputs from its
    /// components (eg/ a recording portfolio's fill log & equity series).
    pub fn run(mut self) -> Result<Self, EngineError> {
        info!(engine_id = %self.engine_id, "backtest running");

        'backtest: loop {
            // If the backtest should continue, advance the clock & enqueue exactly one Market
            match self.data.can_continue() {
                Continuation::Continue => {
                    if self.data.advance()? {
                        self.events.push(Event::Market);
                    } else {
                        break 'backtest;
                    }
                }
                Continuation::Stop => break 'backtest,
            }

            // Handle Events in the queue while the clock is frozen
            // '--> loop breaks when the queue is empty and requires another Market
            while let Some(event) = self.events.pop() {
                match event {
                    Event::Market => {
                        debug!(now = self.data.now(), "dispatching market event");
                        self.strategy.on_market(&self.data, &mut self.events);
                        self.portfolio.on_market(&self.data);
                        self.execution.on_market(&self.data, &mut self.events)?;
                    }

                    Event::Order(order) => {
                        self.execution.on_order(order, &self.data, &mut self.events)?;
                    }

                    Event::Fill(fill) => {
                        self.execution.on_fill(&fill)?;
                        self.portfolio.on_fill(&fill, &self.data);
                        self.strategy.on_fill(&fill, &self.data, &mut self.events);
                    }
                }
            }
        }

        info!(engine_id = %self.engine_id, "backtest finished");
        Ok(self)
    }

    /// Unique identifier of this backtest run.
    pub fn engine_id(&self) -> Uuid {
        self.engine_id
    }

    /// The market data handler.
    pub fn data(&self) -> &Data {
        &self.data
    }

    /// The strategy handler.
    pub fn strategy(&self) -> &Strat {
        &self.strategy
    }

    /// The portfolio handler.
    pub fn portfolio(&self) -> &Port {
        &self.portfolio
    }

    /// The execution handler.
    pub fn execution(&self) -> &Exec {
        &self.execution
    }
}

/// Builder to construct [`Scheduler`] instances.
#[derive(Debug, Default)]
pub struct SchedulerBuilder<Data, Strat, Port, Exec>
where
    Data: Continuer + MarketGenerator + MarketReader,
    Strat: Strategy,
    Port: Portfolio,
    Exec: ExecutionHandler,
{
    engine_id: Option<Uuid>,
    data: Option<Data>,
    strategy: Option<Strat>,
    portfolio: Option<Port>,
    execution: Option<Exec>,
}

impl<Data, Strat, Port, Exec> SchedulerBuilder<Data, Strat, Port, Exec>
where
    Data: Continuer + MarketGenerator + MarketReader,
    Strat: Strategy,
    Port: Portfolio,
    Exec: ExecutionHandler,
{
    pub fn new() -> Self {
        Self {
            engine_id: None,
            data: None,
            strategy: None,
            portfolio: None,
            execution: None,
        }
    }

    pub fn engine_id(self, value: Uuid) -> Self {
        Self {
            engine_id: Some(value),
            ..self
        }
    }

    pub fn data(self, value: Data) -> Self {
        Self {
            data: Some(value),
            ..self
        }
    }

    pub fn strategy(self, value: Strat) -> Self {
        Self {
            strategy: Some(value),
            ..self
        }
    }

    pub fn portfolio(self, value: Port) -> Self {
        Self {
            portfolio: Some(value),
            ..self
        }
    }

    pub fn execution(self, value: Exec) -> Self {
        Self {
            execution: Some(value),
            ..self
        }
    }

    pub fn build(self) -> Result<Scheduler<Data, Strat, Port, Exec>, EngineError> {
        Ok(Scheduler {
            engine_id: self.engine_id.unwrap_or_else(Uuid::new_v4),
            data: self.data.ok_or(EngineError::BuilderIncomplete)?,
            strategy: self.strategy.ok_or(EngineError::BuilderIncomplete)?,
            portfolio: self.portfolio.ok_or(EngineError::BuilderIncomplete)?,
            execution: self.execution.ok_or(EngineError::BuilderIncomplete)?,
            events: EventQueue::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::error::DataError;
    use crate::data::{Orderbook, Trade};
    use crate::execution::fill::{FillEvent, FillFlag};
    use crate::execution::order::{OrderEvent, OrderType, Side};
    use crate::execution::simulated::{Config as ExchangeConfig, SimulatedExchange};
    use crate::portfolio::recorder::{Config as PortfolioConfig, RecordingPortfolio};
    use crate::{Instrument, Timestamp};

    /// Scripted market data: one orderbook tick per timeline entry for a single instrument.
    struct ScriptedData {
        instruments: Vec<Instrument>,
        ticks: Vec<Orderbook>,
        cursor: usize,
        latest: Option<Orderbook>,
        now: Timestamp,
        can_continue: Continuation,
    }

    impl ScriptedData {
        fn new(instrument: Instrument, ticks: Vec<Orderbook>) -> Self {
            Self {
                instruments: vec![instrument],
                now: ticks.first().map(|lob| lob.time).unwrap_or(0),
                ticks,
                cursor: 0,
                latest: None,
                can_continue: Continuation::Continue,
            }
        }
    }

    impl Continuer for ScriptedData {
        fn can_continue(&self) -> &Continuation {
            &self.can_continue
        }
    }

    impl MarketGenerator for ScriptedData {
        fn advance(&mut self) -> Result<bool, DataError> {
            match self.ticks.get(self.cursor) {
                Some(lob) => {
                    self.cursor += 1;
                    self.now = lob.time;
                    self.latest = Some(*lob);
                    Ok(true)
                }
                None => {
                    self.can_continue = Continuation::Stop;
                    Ok(false)
                }
            }
        }
    }

    impl MarketReader for ScriptedData {
        fn now(&self) -> Timestamp {
            self.now
        }

        fn start_time(&self) -> Timestamp {
            self.ticks.first().map(|lob| lob.time).unwrap_or(0)
        }

        fn instruments(&self) -> &[Instrument] {
            &self.instruments
        }

        fn latest_lob(&self, _: &Instrument) -> Option<Orderbook> {
            self.latest
        }

        fn latest_trade(&self, _: &Instrument) -> Option<Trade> {
            None
        }

        fn latest_price(&self, instrument: &Instrument) -> Option<f64> {
            self.latest_lob(instrument).map(|lob| lob.mid())
        }

        fn updated_trade_instruments(&self) -> Vec<Instrument> {
            Vec::new()
        }
    }

    /// Strategy scripted to submit fixed orders once the clock reaches their submission times.
    struct ScriptedStrategy {
        pending: Vec<(Timestamp, OrderEvent)>,
        observed_market_times: Vec<Timestamp>,
        observed_fills: Vec<FillEvent>,
    }

    impl ScriptedStrategy {
        fn new(mut orders: Vec<(Timestamp, OrderEvent)>) -> Self {
            orders.sort_by_key(|(submit_time, _)| *submit_time);
            Self {
                pending: orders,
                observed_market_times: Vec::new(),
                observed_fills: Vec::new(),
            }
        }
    }

    impl Strategy for ScriptedStrategy {
        fn on_market(&mut self, data: &dyn MarketReader, events: &mut EventQueue) {
            self.observed_market_times.push(data.now());
            while self
                .pending
                .first()
                .is_some_and(|(submit_time, _)| *submit_time <= data.now())
            {
                let (_, order) = self.pending.remove(0);
                events.push(Event::Order(order));
            }
        }

        fn on_fill(&mut self, fill: &FillEvent, _: &dyn MarketReader, _: &mut EventQueue) {
            self.observed_fills.push(fill.clone());
        }
    }

    fn btc_binance() -> Instrument {
        Instrument::new("btc_usdt", "binance")
    }

    fn lob(time: Timestamp, bid: f64, ask: f64) -> Orderbook {
        Orderbook {
            time,
            bid,
            bid_qty: 10.0,
            ask,
            ask_qty: 10.0,
        }
    }

    fn market_order(order_id: u64, effective_time: Timestamp) -> OrderEvent {
        OrderEvent {
            effective_time,
            instrument: btc_binance(),
            order_id,
            kind: OrderType::Market,
            side: Side::Buy,
            quantity: 1.0,
            limit_price: None,
        }
    }

    fn run_scheduler(
        ticks: Vec<Orderbook>,
        orders: Vec<(Timestamp, OrderEvent)>,
    ) -> Scheduler<ScriptedData, ScriptedStrategy, RecordingPortfolio, SimulatedExchange> {
        let instrument = btc_binance();
        Scheduler::builder()
            .data(ScriptedData::new(instrument.clone(), ticks))
            .strategy(ScriptedStrategy::new(orders))
            .portfolio(RecordingPortfolio::new(
                std::slice::from_ref(&instrument),
                PortfolioConfig::default(),
            ))
            .execution(SimulatedExchange::new(
                std::slice::from_ref(&instrument),
                ExchangeConfig::default(),
            ))
            .build()
            .unwrap()
            .run()
            .unwrap()
    }

    #[test]
    fn should_dispatch_market_events_with_monotone_clock() {
        let scheduler = run_scheduler(
            vec![lob(1000, 99.0, 100.0), lob(1000, 99.1, 100.1), lob(2000, 99.2, 100.2)],
            vec![],
        );

        let times = &scheduler.strategy().observed_market_times;
        assert_eq!(times.len(), 3);
        assert!(times.windows(2).all(|window| window[0] <= window[1]));
    }

    #[test]
    fn should_fill_order_within_the_same_drain_it_was_submitted() {
        let scheduler = run_scheduler(
            vec![lob(1000, 99.0, 100.0), lob(2000, 99.5, 100.5)],
            vec![(1000, market_order(1, 1000))],
        );

        let fills = scheduler.portfolio().fills();
        assert_eq!(fills.len(), 1);
        // Filled at the t=1000 book, not the later one
        assert_eq!(fills[0].time, 1000);
        assert_eq!(fills[0].price, 100.0);
        // The strategy saw its own fill after the portfolio did
        assert_eq!(scheduler.strategy().observed_fills.len(), 1);
        // The matching engine released the order
        assert!(scheduler.execution().resting_orders(&btc_binance()).is_empty());
    }

    #[test]
    fn should_defer_fill_until_clock_reaches_order_effective_time() {
        let scheduler = run_scheduler(
            vec![lob(1000, 99.0, 100.0), lob(2000, 99.5, 100.5)],
            // Submitted under the t=1000 dispatch, effective from t=1100
            vec![(1000, market_order(1, 1100))],
        );

        let fills = scheduler.portfolio().fills();
        assert_eq!(fills.len(), 1);
        assert_eq!(fills[0].time, 2000);
        assert_eq!(fills[0].price, 100.5);
    }

    #[test]
    fn should_remove_resting_order_cancelled_by_synthetic_fill() {
        struct CancellingStrategy {
            submitted: bool,
            cancelled: bool,
        }

        impl Strategy for CancellingStrategy {
            fn on_market(&mut self, data: &dyn MarketReader, events: &mut EventQueue) {
                if !self.submitted {
                    self.submitted = true;
                    events.push(Event::Order(OrderEvent {
                        effective_time: data.now(),
                        instrument: btc_binance(),
                        order_id: 1,
                        kind: OrderType::Limit,
                        side: Side::Buy,
                        quantity: 1.0,
                        limit_price: Some(98.0),
                    }));
                } else if !self.cancelled {
                    self.cancelled = true;
                    events.push(Event::Fill(FillEvent::canceled(
                        data.now(),
                        btc_binance(),
                        1,
                        Side::Buy,
                        1.0,
                        false,
                        0.0,
                    )));
                }
            }

            fn on_fill(&mut self, _: &FillEvent, _: &dyn MarketReader, _: &mut EventQueue) {}
        }

        let instrument = btc_binance();
        let scheduler = Scheduler::builder()
            .data(ScriptedData::new(
                instrument.clone(),
                // The final book crosses the resting bid, but the order is cancelled by then
                vec![lob(1000, 99.0, 100.0), lob(2000, 99.0, 100.0), lob(3000, 97.0, 98.0)],
            ))
            .strategy(CancellingStrategy {
                submitted: false,
                cancelled: false,
            })
            .portfolio(RecordingPortfolio::new(
                std::slice::from_ref(&instrument),
                PortfolioConfig::default(),
            ))
            .execution(SimulatedExchange::new(
                std::slice::from_ref(&instrument),
                ExchangeConfig::default(),
            ))
            .build()
            .unwrap()
            .run()
            .unwrap();

        assert!(scheduler.execution().resting_orders(&instrument).is_empty());
        assert!(scheduler.portfolio().fills().is_empty());
    }

    #[test]
    fn should_fail_build_with_incomplete_lego() {
        let result = Scheduler::<
            ScriptedData,
            ScriptedStrategy,
            RecordingPortfolio,
            SimulatedExchange,
        >::builder()
        .build();
        assert!(matches!(result, Err(EngineError::BuilderIncomplete)));
    }

    #[test]
    fn should_abort_run_on_execution_error() {
        // A limit order without a limit price is a programmer bug that kills the run
        let order = OrderEvent {
            effective_time: 1000,
            instrument: btc_binance(),
            order_id: 1,
            kind: OrderType::Limit,
            side: Side::Buy,
            quantity: 1.0,
            limit_price: None,
        };
        let instrument = btc_binance();
        let result = Scheduler::builder()
            .data(ScriptedData::new(
                instrument.clone(),
                vec![lob(1000, 99.0, 100.0)],
            ))
            .strategy(ScriptedStrategy::new(vec![(1000, order)]))
            .portfolio(RecordingPortfolio::new(
                std::slice::from_ref(&instrument),
                PortfolioConfig::default(),
            ))
            .execution(SimulatedExchange::new(
                std::slice::from_ref(&instrument),
                ExchangeConfig::default(),
            ))
            .build()
            .unwrap()
            .run();

        assert!(matches!(result, Err(EngineError::Execution(_))));
    }

    #[test]
    fn should_record_equity_point_per_market_dispatch() {
        let scheduler = run_scheduler(
            vec![lob(1000, 99.0, 100.0), lob(2000, 99.5, 100.5)],
            vec![],
        );

        let curve = scheduler.portfolio().equity_curve();
        assert_eq!(curve.len(), 2);
        assert_eq!(curve[0].time, 1000);
        assert_eq!(curve[1].time, 2000);
    }

    #[test]
    fn should_observe_fill_flag_all_for_every_traded_fill() {
        let scheduler = run_scheduler(
            vec![lob(1000, 99.0, 100.0)],
            vec![(1000, market_order(1, 1000))],
        );

        assert!(scheduler
            .portfolio()
            .fills()
            .iter()
            .all(|fill| fill.flag == FillFlag::All));
    }
}
