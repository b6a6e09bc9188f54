use crate::data::error::DataError;
use crate::data::{Orderbook, Trade};
use crate::{Instrument, Timestamp};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::{Path, PathBuf};

/// On-disk market data file format.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Serialize, Deserialize)]
pub enum FileFormat {
    Csv,
    Parquet,
}

/// Source of recorded market data for the
/// [`HistoricTradeLobHandler`](crate::data::cursor::HistoricTradeLobHandler).
///
/// This is the seam between the kernel and file parsing: the cursor scans every instrument's
/// timestamps once at construction, then bulk-loads rows an hourly chunk at a time. Range bounds
/// are inclusive.
pub trait TickSource {
    /// Union of the timestamps carried by the instrument's trade & orderbook files, in any order.
    fn scan_times(&mut self, instrument: &Instrument) -> Result<Vec<Timestamp>, DataError>;

    /// Orderbook rows with `start <= time <= end`, in file order.
    fn load_lobs(
        &mut self,
        instrument: &Instrument,
        start: Timestamp,
        end: Timestamp,
    ) -> Result<Vec<Orderbook>, DataError>;

    /// Trade rows with `start <= time <= end`, in file order.
    fn load_trades(
        &mut self,
        instrument: &Instrument,
        start: Timestamp,
        end: Timestamp,
    ) -> Result<Vec<Trade>, DataError>;
}

/// Orderbook row as found in `{instrument}_LOB.csv` files. Quantity columns accept the historical
/// dataset header variants (`bid_qty1` / `bidqty1`).
#[derive(Copy, Clone, PartialEq, PartialOrd, Debug, Deserialize)]
struct LobRow {
    time: Timestamp,
    bid1: f64,
    #[serde(alias = "bidqty1")]
    bid_qty1: f64,
    ask1: f64,
    #[serde(alias = "askqty1")]
    ask_qty1: f64,
}

impl From<LobRow> for Orderbook {
    fn from(row: LobRow) -> Self {
        Self {
            time: row.time,
            bid: row.bid1,
            bid_qty: row.bid_qty1,
            ask: row.ask1,
            ask_qty: row.ask_qty1,
        }
    }
}

/// Trade row as found in `{instrument}_trade.csv` files.
#[derive(Copy, Clone, PartialEq, PartialOrd, Debug, Deserialize)]
struct TradeRow {
    time: Timestamp,
    price: f64,
    qty: f64,
    is_buyer_maker: bool,
}

impl From<TradeRow> for Trade {
    fn from(row: TradeRow) -> Self {
        Self {
            time: row.time,
            price: row.price,
            qty: row.qty,
            is_buyer_maker: row.is_buyer_maker,
        }
    }
}

/// CSV-backed [`TickSource`].
///
/// Expects a directory holding one pair of files per instrument, named by the canonical
/// instrument id: `{symbol}_{venue}_trade.csv` & `{symbol}_{venue}_LOB.csv`. A missing file is a
/// construction-time error surfaced on the first scan.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct CsvTickSource {
    dir: PathBuf,
}

impl CsvTickSource {
    /// Constructs a new [`CsvTickSource`] reading from the provided directory.
    ///
    /// Only [`FileFormat::Csv`] is bundled; any other format can be supplied through a custom
    /// [`TickSource`] implementation.
    pub fn new<P>(dir: P, format: FileFormat) -> Result<Self, DataError>
    where
        P: Into<PathBuf>,
    {
        match format {
            FileFormat::Csv => Ok(Self { dir: dir.into() }),
            other => Err(DataError::UnsupportedFormat(other)),
        }
    }

    fn trade_path(&self, instrument: &Instrument) -> PathBuf {
        self.dir.join(format!("{}_trade.csv", instrument.id()))
    }

    fn lob_path(&self, instrument: &Instrument) -> PathBuf {
        self.dir.join(format!("{}_LOB.csv", instrument.id()))
    }

    fn open(&self, instrument: &Instrument, path: &Path) -> Result<csv::Reader<File>, DataError> {
        if !path.exists() {
            return Err(DataError::MissingFile {
                instrument: instrument.id(),
                path: path.to_path_buf(),
            });
        }
        Ok(csv::Reader::from_path(path)?)
    }
}

impl TickSource for CsvTickSource {
    fn scan_times(&mut self, instrument: &Instrument) -> Result<Vec<Timestamp>, DataError> {
        let mut times = Vec::new();

        let mut trades = self.open(instrument, &self.trade_path(instrument))?;
        for row in trades.deserialize::<TradeRow>() {
            times.push(row?.time);
        }

        let mut lobs = self.open(instrument, &self.lob_path(instrument))?;
        for row in lobs.deserialize::<LobRow>() {
            times.push(row?.time);
        }

        Ok(times)
    }

    fn load_lobs(
        &mut self,
        instrument: &Instrument,
        start: Timestamp,
        end: Timestamp,
    ) -> Result<Vec<Orderbook>, DataError> {
        let mut reader = self.open(instrument, &self.lob_path(instrument))?;
        let mut lobs = Vec::new();
        for row in reader.deserialize::<LobRow>() {
            let row = row?;
            if row.time >= start && row.time <= end {
                lobs.push(Orderbook::from(row));
            }
        }
        Ok(lobs)
    }

    fn load_trades(
        &mut self,
        instrument: &Instrument,
        start: Timestamp,
        end: Timestamp,
    ) -> Result<Vec<Trade>, DataError> {
        let mut reader = self.open(instrument, &self.trade_path(instrument))?;
        let mut trades = Vec::new();
        for row in reader.deserialize::<TradeRow>() {
            let row = row?;
            if row.time >= start && row.time <= end {
                trades.push(Trade::from(row));
            }
        }
        Ok(trades)
    }
}
