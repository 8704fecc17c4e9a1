use payout_core::GatewayError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, LedgerError>;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Ledger API error: {0}")]
    Api(String),
}

impl From<LedgerError> for GatewayError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Api(detail) => GatewayError::Api(detail),
            other => GatewayError::Transport(other.to_string()),
        }
    }
}
