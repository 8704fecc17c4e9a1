pub mod client;
pub mod config;
pub mod error;

pub use client::LedgerClient;
pub use config::Config;
pub use error::{LedgerError, Result};
