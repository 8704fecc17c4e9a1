pub mod builder;
pub mod error;
pub mod traits;
pub mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use builder::Ed25519TransferBuilder;
pub use error::{BuildError, GatewayError, StoreError};
pub use traits::{NetworkGateway, RecordStore, TransferBuilder};
pub use types::{
    LedgerEntry, LedgerEntryKind, SubmitOutcome, TransferPayload, WithdrawalRequest,
    WithdrawalStatus,
};
