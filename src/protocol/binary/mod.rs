//! Binary protocol operations

mod item;
mod multi_get;
mod sasl;
mod server;

pub use item::{ConcatOperation, DeleteOperation, GetOperation, MutatorOperation, StoreOperation};
pub use multi_get::MultiGetOperation;
pub use sasl::{SaslListOperation, SaslStartOperation, SaslStepOperation};
pub use server::{FlushOperation, NoOpOperation, StatsOperation, VersionOperation};

use super::{BinaryResponse, OperationResult};

/// Pass/fail result of a single response, carrying the server's message on failure
pub(crate) fn result_from_response(response: &BinaryResponse) -> OperationResult {
    OperationResult::from_status(response.status(), response.status_message()).with_cas(response.cas())
}
