use thiserror::Error;

/// Failures surfaced by a `RecordStore` implementation.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store query failed: {0}")]
    Query(String),

    #[error("conditional update matched no row")]
    ConditionFailed,
}

/// Failures surfaced by a `NetworkGateway` implementation.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("gateway transport error: {0}")]
    Transport(String),

    #[error("gateway rejected request: {0}")]
    Api(String),
}

/// Failures surfaced by a `TransferBuilder` implementation.
#[derive(Error, Debug)]
pub enum BuildError {
    #[error("invalid transfer input: {0}")]
    InvalidInput(String),

    #[error("signing failed: {0}")]
    Signing(String),
}
