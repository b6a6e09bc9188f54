use crate::execution::order::{OrderId, Side};
use crate::{Instrument, Timestamp, VenueId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::warn;

/// Terminal disposition of a [`FillEvent`]: fully traded, or cancelled without trading.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize, Deserialize)]
pub enum FillFlag {
    All,
    Canceled,
}

/// Communicative type alias for a fee rate in decimal form (eg/ 0.000173 for 1.73bps). Negative
/// maker rates are rebates.
pub type FeeRate = f64;

/// Maker & taker fee rates of one venue.
#[derive(Copy, Clone, PartialEq, PartialOrd, Debug, Serialize, Deserialize)]
pub struct VenueFees {
    pub maker: FeeRate,
    pub taker: FeeRate,
}

impl VenueFees {
    /// Constructs a new [`VenueFees`] from the provided maker & taker rates.
    pub fn new(maker: FeeRate, taker: FeeRate) -> Self {
        Self { maker, taker }
    }
}

/// Per-venue maker/taker fee schedule.
///
/// Defaults to the recorded venue rates; a venue missing from the table is charged zero fees and
/// logged as a warning.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct FeeTable {
    venues: HashMap<VenueId, VenueFees>,
}

impl Default for FeeTable {
    fn default() -> Self {
        Self {
            venues: HashMap::from([
                ("binance".to_string(), VenueFees::new(-0.00006, 0.000173)),
                ("okex".to_string(), VenueFees::new(-0.00005, 0.00015)),
            ]),
        }
    }
}

impl FeeTable {
    /// Register (or override) the [`VenueFees`] of a venue.
    pub fn with_venue<V>(mut self, venue: V, fees: VenueFees) -> Self
    where
        V: Into<VenueId>,
    {
        self.venues.insert(venue.into().to_lowercase(), fees);
        self
    }

    /// Fee rate charged by the venue for a maker or taker execution.
    pub fn rate(&self, venue: &str, is_maker: bool) -> FeeRate {
        match self.venues.get(&venue.to_lowercase()) {
            Some(fees) if is_maker => fees.maker,
            Some(fees) => fees.taker,
            None => {
                warn!(venue, "venue missing from fee schedule, charging zero fees");
                0.0
            }
        }
    }
}

/// Fills are journals of work done by the execution handler. These are sent back through the
/// event queue so the matching engine can release the resting order and the portfolio & strategy
/// can apply updates.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct FillEvent {
    pub time: Timestamp,
    pub instrument: Instrument,
    pub order_id: OrderId,
    pub side: Side,
    pub quantity: f64,
    /// Traded price, NaN for cancelled fills.
    pub price: f64,
    pub is_maker: bool,
    pub flag: FillFlag,
    pub fee_rate: FeeRate,
    /// Signed cash flow: positive for buys (cash out), negative for sells (cash in), fees
    /// included. NaN for cancelled fills.
    pub cash_cost: f64,
}

impl FillEvent {
    /// Constructs a fully-traded [`FillEvent`], deriving `cash_cost` via
    /// [`calculate_cash_cost`].
    #[allow(clippy::too_many_arguments)]
    pub fn filled(
        time: Timestamp,
        instrument: Instrument,
        order_id: OrderId,
        side: Side,
        quantity: f64,
        price: f64,
        is_maker: bool,
        fee_rate: FeeRate,
    ) -> Self {
        Self {
            time,
            instrument,
            order_id,
            side,
            quantity,
            price,
            is_maker,
            flag: FillFlag::All,
            fee_rate,
            cash_cost: calculate_cash_cost(side, quantity, price, fee_rate),
        }
    }

    /// Constructs a cancelled [`FillEvent`]: a cleanup signal that releases the resting order
    /// without trading. Price & cash cost are NaN.
    pub fn canceled(
        time: Timestamp,
        instrument: Instrument,
        order_id: OrderId,
        side: Side,
        quantity: f64,
        is_maker: bool,
        fee_rate: FeeRate,
    ) -> Self {
        Self {
            time,
            instrument,
            order_id,
            side,
            quantity,
            price: f64::NAN,
            is_maker,
            flag: FillFlag::Canceled,
            fee_rate,
            cash_cost: f64::NAN,
        }
    }
}

/// Signed cash flow of a fill: `+quantity * price * (1 + fee)` for a buy,
/// `-quantity * price * (1 - fee)` for a sell. Maker rebates (negative rates) reduce a buy's
/// cost and increase a sell's proceeds.
pub fn calculate_cash_cost(side: Side, quantity: f64, price: f64, fee_rate: FeeRate) -> f64 {
    match side {
        Side::Buy => quantity * price * (1.0 + fee_rate),
        Side::Sell => -(quantity * price * (1.0 - fee_rate)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_charge_recorded_venue_rates_exactly() {
        struct TestCase {
            venue: &'static str,
            is_maker: bool,
            expected: FeeRate,
        }

        let tests = vec![
            TestCase {
                // TC0: binance maker rebate
                venue: "binance",
                is_maker: true,
                expected: -0.00006,
            },
            TestCase {
                // TC1: binance taker fee
                venue: "binance",
                is_maker: false,
                expected: 0.000173,
            },
            TestCase {
                // TC2: okex maker rebate
                venue: "okex",
                is_maker: true,
                expected: -0.00005,
            },
            TestCase {
                // TC3: okex taker fee
                venue: "okex",
                is_maker: false,
                expected: 0.00015,
            },
            TestCase {
                // TC4: venue lookup is case-insensitive
                venue: "Binance",
                is_maker: false,
                expected: 0.000173,
            },
            TestCase {
                // TC5: unknown venue falls back to zero fees
                venue: "grand_exchange",
                is_maker: false,
                expected: 0.0,
            },
        ];

        let table = FeeTable::default();
        for (index, test) in tests.into_iter().enumerate() {
            let actual = table.rate(test.venue, test.is_maker);
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn should_support_registering_additional_venues() {
        let table = FeeTable::default().with_venue("Bybit", VenueFees::new(-0.0001, 0.0002));
        assert_eq!(table.rate("bybit", true), -0.0001);
        assert_eq!(table.rate("bybit", false), 0.0002);
    }

    #[test]
    fn should_sign_cash_cost_by_side() {
        // Buy cash flows out, fees on top
        let buy = calculate_cash_cost(Side::Buy, 3.0, 100.0, 0.000173);
        assert!((buy - 300.0519).abs() < 1e-9);
        assert!(buy > 0.0);

        // Sell cash flows in, fees deducted
        let sell = calculate_cash_cost(Side::Sell, 3.0, 100.0, 0.000173);
        assert!((sell + 299.9481).abs() < 1e-9);
        assert!(sell < 0.0);

        // Maker rebate reduces a buy's cost below the gross notional
        let rebated = calculate_cash_cost(Side::Buy, 1.0, 100.0, -0.00006);
        assert!(rebated < 100.0);
    }

    #[test]
    fn should_construct_cancelled_fill_with_nan_price_and_cost() {
        let fill = FillEvent::canceled(
            1000,
            Instrument::new("btc_usdt", "binance"),
            1,
            Side::Buy,
            1.0,
            false,
            0.000173,
        );
        assert_eq!(fill.flag, FillFlag::Canceled);
        assert!(fill.price.is_nan());
        assert!(fill.cash_cost.is_nan());
        assert!(!fill.is_maker);
    }
}
