use crate::data::error::DataError;
use crate::data::registry::TickRegistry;
use crate::data::source::TickSource;
use crate::data::{Continuation, Continuer, MarketGenerator, MarketReader, Orderbook, Trade};
use crate::{Instrument, Timestamp};
use chrono::DateTime;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

/// One hour in milliseconds: the maximum wall-time span of a bulk-load chunk.
const CHUNK_SPAN_MS: i64 = 60 * 60 * 1000;

/// Configuration for constructing a [`HistoricTradeLobHandler`] via the new() constructor method.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Stage trade rows alongside orderbook rows when loading a chunk. Disabling this skips the
    /// trade files entirely; trade-derived reads then fall back to orderbook data.
    pub load_trades: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self { load_trades: true }
    }
}

/// Lego components for constructing a [`HistoricTradeLobHandler`] via the new() constructor
/// method.
#[derive(Debug)]
pub struct HistoricTradeLobLego<Source>
where
    Source: TickSource,
{
    /// Pair symbols to backtest on (eg/ "btc_usdt"), one entry per instrument.
    pub symbols: Vec<String>,
    /// Venue of each symbol (eg/ "binance"), index-aligned with `symbols`.
    pub venues: Vec<String>,
    /// Source of the recorded trade & orderbook files.
    pub source: Source,
    pub config: Config,
}

/// Market data handler that implements [`Continuer`], [`MarketGenerator`] & [`MarketReader`].
/// **Simulates** a live multi-instrument feed by replaying historical trade & orderbook files in
/// strict time order.
///
/// On construction every file is scanned once to build the union timeline of all instruments.
/// The timeline is partitioned into contiguous chunks spanning at most one hour of wall time;
/// rows are bulk-loaded one chunk at a time and released before the next chunk loads, so
/// resident memory stays O(chunk size) rather than O(history).
#[derive(Debug)]
pub struct HistoricTradeLobHandler<Source>
where
    Source: TickSource,
{
    instruments: Vec<Instrument>,
    source: Source,
    config: Config,
    /// Sorted, deduplicated union of every instrument's trade & orderbook timestamps.
    timeline: Vec<Timestamp>,
    /// Index into `timeline` of the next timestamp to advance to.
    cursor: usize,
    /// Inclusive `[start, end]` bounds of each hourly chunk, as offsets into the timeline.
    chunks: Vec<(Timestamp, Timestamp)>,
    /// Index into `chunks` of the currently staged chunk, None before the first load.
    staged_chunk: Option<usize>,
    staged_lobs: HashMap<Instrument, HashMap<Timestamp, Orderbook>>,
    staged_trades: HashMap<Instrument, HashMap<Timestamp, Vec<Trade>>>,
    registry: TickRegistry,
    now: Timestamp,
    can_continue: Continuation,
}

impl<Source> HistoricTradeLobHandler<Source>
where
    Source: TickSource,
{
    /// Constructs a new [`HistoricTradeLobHandler`] using the provided [`HistoricTradeLobLego`]
    /// components.
    ///
    /// Scans every instrument's files once to discover the backtest timeline. Fails fast on
    /// unequal symbol/venue lists, duplicate instrument keys, missing files, or an empty
    /// timeline.
    pub fn new(lego: HistoricTradeLobLego<Source>) -> Result<Self, DataError> {
        let instruments = aggregate_instruments(&lego.symbols, &lego.venues)?;
        let mut source = lego.source;

        let mut timeline = Vec::new();
        for instrument in &instruments {
            timeline.extend(source.scan_times(instrument)?);
        }
        timeline.sort_unstable();
        timeline.dedup();

        let start_time = match timeline.first() {
            Some(first) => *first,
            None => return Err(DataError::EmptyTimeline),
        };
        let chunks = hourly_chunks(&timeline);

        info!(
            instruments = ?instruments.iter().map(Instrument::id).collect::<Vec<_>>(),
            timestamps = timeline.len(),
            chunks = chunks.len(),
            "constructed new HistoricTradeLobHandler instance"
        );

        Ok(Self {
            registry: TickRegistry::new(&instruments),
            instruments,
            source,
            config: lego.config,
            timeline,
            cursor: 0,
            chunks,
            staged_chunk: None,
            staged_lobs: HashMap::new(),
            staged_trades: HashMap::new(),
            now: start_time,
            can_continue: Continuation::Continue,
        })
    }

    /// Returns a [`HistoricTradeLobHandlerBuilder`] instance.
    pub fn builder() -> HistoricTradeLobHandlerBuilder<Source> {
        HistoricTradeLobHandlerBuilder::new()
    }

    /// Inclusive `[start, end]` bounds of each hourly bulk-load chunk.
    pub fn chunks(&self) -> &[(Timestamp, Timestamp)] {
        &self.chunks
    }

    /// The full backtest timeline.
    pub fn timeline(&self) -> &[Timestamp] {
        &self.timeline
    }

    /// Drop the staged maps of the previous chunk and bulk-load the rows of chunk `index`.
    fn load_chunk(&mut self, index: usize) -> Result<(), DataError> {
        let (start, end) = self.chunks[index];
        info!(
            chunk = index,
            start = %DateTime::from_timestamp_millis(start).unwrap_or(DateTime::UNIX_EPOCH),
            end = %DateTime::from_timestamp_millis(end).unwrap_or(DateTime::UNIX_EPOCH),
            "loading hourly market data chunk"
        );

        self.staged_lobs.clear();
        self.staged_trades.clear();

        for instrument in &self.instruments {
            let rows = self.source.load_lobs(instrument, start, end)?;
            let mut lobs_by_time = HashMap::with_capacity(rows.len());
            for lob in rows {
                // Timestamps key the staged map, so duplicated samples reduce to the last one
                lobs_by_time.insert(lob.time, lob);
            }
            self.staged_lobs.insert(instrument.clone(), lobs_by_time);

            if self.config.load_trades {
                let rows = self.source.load_trades(instrument, start, end)?;
                let mut trades_by_time: HashMap<Timestamp, Vec<Trade>> = HashMap::new();
                for trade in rows {
                    trades_by_time.entry(trade.time).or_default().push(trade);
                }
                self.staged_trades.insert(instrument.clone(), trades_by_time);
            }
        }

        self.staged_chunk = Some(index);
        Ok(())
    }

    /// Merge the staged ticks carrying the current timestamp into the latest-view registry.
    fn register_now(&mut self) {
        for instrument in &self.instruments {
            if let Some(lob) = self
                .staged_lobs
                .get(instrument)
                .and_then(|by_time| by_time.get(&self.now))
                .copied()
            {
                self.registry.register_lob(instrument, lob);
            }

            if let Some(trades) = self
                .staged_trades
                .get(instrument)
                .and_then(|by_time| by_time.get(&self.now))
            {
                self.registry.register_trades(instrument, self.now, trades);
            }
        }
    }
}

impl<Source> Continuer for HistoricTradeLobHandler<Source>
where
    Source: TickSource,
{
    fn can_continue(&self) -> &Continuation {
        &self.can_continue
    }
}

impl<Source> MarketGenerator for HistoricTradeLobHandler<Source>
where
    Source: TickSource,
{
    fn advance(&mut self) -> Result<bool, DataError> {
        let next = match self.timeline.get(self.cursor) {
            Some(next) => *next,
            None => {
                self.can_continue = Continuation::Stop;
                return Ok(false);
            }
        };
        self.cursor += 1;
        self.now = next;

        // Crossing the staged chunk's end triggers a reload of the next chunk
        while self
            .staged_chunk
            .map_or(true, |index| self.now > self.chunks[index].1)
        {
            let next_chunk = self.staged_chunk.map_or(0, |index| index + 1);
            self.load_chunk(next_chunk)?;
        }

        self.register_now();
        debug!(now = self.now, "advanced simulated clock");
        Ok(true)
    }
}

impl<Source> MarketReader for HistoricTradeLobHandler<Source>
where
    Source: TickSource,
{
    fn now(&self) -> Timestamp {
        self.now
    }

    fn start_time(&self) -> Timestamp {
        self.timeline.first().copied().unwrap_or(self.now)
    }

    fn instruments(&self) -> &[Instrument] {
        &self.instruments
    }

    fn latest_lob(&self, instrument: &Instrument) -> Option<Orderbook> {
        self.registry
            .history(instrument)
            .and_then(|history| history.latest_lob())
    }

    fn latest_trade(&self, instrument: &Instrument) -> Option<Trade> {
        self.registry
            .history(instrument)
            .and_then(|history| history.latest_trade())
    }

    fn latest_price(&self, instrument: &Instrument) -> Option<f64> {
        let history = self.registry.history(instrument)?;
        if history.last_trade_time() == Some(self.now) {
            return history.latest_trade().map(|trade| trade.price);
        }
        history.latest_lob().map(|lob| lob.mid())
    }

    fn updated_trade_instruments(&self) -> Vec<Instrument> {
        self.instruments
            .iter()
            .filter(|instrument| {
                self.registry
                    .history(instrument)
                    .and_then(|history| history.last_trade_time())
                    == Some(self.now)
            })
            .cloned()
            .collect()
    }
}

/// Canonicalise index-aligned symbol & venue lists into the fixed instrument set, rejecting
/// unequal lengths and duplicate keys.
fn aggregate_instruments(
    symbols: &[String],
    venues: &[String],
) -> Result<Vec<Instrument>, DataError> {
    if symbols.len() != venues.len() {
        return Err(DataError::MismatchedInstrumentLists {
            symbols: symbols.len(),
            venues: venues.len(),
        });
    }

    let mut seen = HashSet::with_capacity(symbols.len());
    let mut instruments = Vec::with_capacity(symbols.len());
    for (symbol, venue) in symbols.iter().zip(venues) {
        let instrument = Instrument::new(symbol.clone(), venue.clone());
        if !seen.insert(instrument.id()) {
            return Err(DataError::DuplicateInstrument(instrument.id()));
        }
        instruments.push(instrument);
    }

    Ok(instruments)
}

/// Partition the sorted timeline into contiguous groups spanning at most
/// [`CHUNK_SPAN_MS`] of wall time. Bounds are inclusive.
fn hourly_chunks(timeline: &[Timestamp]) -> Vec<(Timestamp, Timestamp)> {
    let mut chunks = Vec::new();
    let Some(&first) = timeline.first() else {
        return chunks;
    };

    let mut start = first;
    let mut last = first;
    for &time in timeline {
        if time - start > CHUNK_SPAN_MS {
            chunks.push((start, last));
            start = time;
        }
        last = time;
    }
    chunks.push((start, last));

    chunks
}

/// Builder to construct [`HistoricTradeLobHandler`] instances.
#[derive(Debug, Default)]
pub struct HistoricTradeLobHandlerBuilder<Source>
where
    Source: TickSource,
{
    symbols: Option<Vec<String>>,
    venues: Option<Vec<String>>,
    source: Option<Source>,
    config: Option<Config>,
}

impl<Source> HistoricTradeLobHandlerBuilder<Source>
where
    Source: TickSource,
{
    pub fn new() -> Self {
        Self {
            symbols: None,
            venues: None,
            source: None,
            config: None,
        }
    }

    pub fn symbols<I, S>(self, value: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            symbols: Some(value.into_iter().map(S::into).collect()),
            ..self
        }
    }

    pub fn venues<I, S>(self, value: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            venues: Some(value.into_iter().map(S::into).collect()),
            ..self
        }
    }

    pub fn source(self, value: Source) -> Self {
        Self {
            source: Some(value),
            ..self
        }
    }

    pub fn config(self, value: Config) -> Self {
        Self {
            config: Some(value),
            ..self
        }
    }

    pub fn build(self) -> Result<HistoricTradeLobHandler<Source>, DataError> {
        let lego = HistoricTradeLobLego {
            symbols: self.symbols.ok_or(DataError::BuilderIncomplete)?,
            venues: self.venues.ok_or(DataError::BuilderIncomplete)?,
            source: self.source.ok_or(DataError::BuilderIncomplete)?,
            config: self.config.unwrap_or_default(),
        };
        HistoricTradeLobHandler::new(lego)
    }
}
