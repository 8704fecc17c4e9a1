pub mod balance;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod server;
pub mod store;
