//! Scheduled Transaction Dispatcher Library
//!
//! Time-windowed submission of stake, unstake, wrap and two-hop swap
//! transactions against fixed contracts, with the forward swap's output
//! persisted so the dependent swap can spend it in a later invocation.
//!
//! Author: AI-Generated
//! Created: 2026-10-14

pub mod amount;
pub mod calldata;
pub mod chain_store;
pub mod client;
pub mod config;
pub mod contracts;
pub mod dispatcher;
pub mod error;
pub mod nonce;
pub mod receipt;
pub mod scheduler;
pub mod types;

// Re-export commonly used types
pub use chain_store::{SwapChainRecord, SwapChainStore};
pub use client::{AlloyChainClient, ChainClient};
pub use config::{load_private_key, ScheduleFile};
pub use dispatcher::{Dispatcher, RunSummary};
pub use error::{DispatchError, DispatchResult};
pub use nonce::NonceSequencer;
pub use types::{BotConfig, TransactionTemplate, TxKind};
