use crate::execution::order::{OrderId, OrderType};
use crate::InstrumentId;
use thiserror::Error;

/// All errors generated in the lobster::execution module.
///
/// These are programmer bugs in the submitting strategy and terminate the run immediately;
/// recoverable conditions (oversize fills, unknown fee venues) are surfaced as warnings instead.
#[derive(Error, Clone, Debug)]
pub enum ExecutionError {
    #[error("Failed to build struct due to incomplete attributes provided")]
    BuilderIncomplete,

    #[error("order {order_id} of type {kind:?} submitted without a limit price")]
    MissingLimitPrice { order_id: OrderId, kind: OrderType },

    #[error("order {order_id} references instrument {instrument} the exchange is not configured for")]
    UnknownInstrument {
        order_id: OrderId,
        instrument: InstrumentId,
    },
}
