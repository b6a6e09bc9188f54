use crate::data::source::FileFormat;
use crate::InstrumentId;
use std::path::PathBuf;
use thiserror::Error;

/// All errors generated in the lobster::data module.
#[derive(Error, Debug)]
pub enum DataError {
    #[error("Failed to build struct due to incomplete attributes provided")]
    BuilderIncomplete,

    #[error("symbol and venue lists have different lengths: {symbols} != {venues}")]
    MismatchedInstrumentLists { symbols: usize, venues: usize },

    #[error("duplicate instrument key: {0}")]
    DuplicateInstrument(InstrumentId),

    #[error("no timestamps found in the supplied market data")]
    EmptyTimeline,

    #[error("unsupported market data file format: {0:?}")]
    UnsupportedFormat(FileFormat),

    #[error("market data file missing for instrument {instrument}: {path}")]
    MissingFile {
        instrument: InstrumentId,
        path: PathBuf,
    },

    #[error("Csv: {0}")]
    Csv(#[from] csv::Error),

    #[error("Io: {0}")]
    Io(#[from] std::io::Error),
}
