//! Dispatch Error Taxonomy
//!
//! One enum for every failure class the scheduler can hit. Only
//! `Configuration` and `Rpc` (the startup nonce lookup) abort a run;
//! everything else is local to a template or a single repeat.
//!
//! Author: AI-Generated
//! Created: 2026-10-14

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DispatchError {
    /// Missing key, malformed table, unknown token reference
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("invalid amount '{amount}': {reason}")]
    InvalidAmount { amount: String, reason: String },

    #[error("encoding error: {0}")]
    Encoding(String),

    /// Rejected before inclusion or left unconfirmed (send failed, receipt timeout)
    #[error("submission failed: {0}")]
    Submission(String),

    /// Mined with failure status; the nonce is spent on chain
    #[error("transaction {tx_hash} reverted")]
    Reverted { tx_hash: String },

    /// Chain-state file unreadable or unwritable
    #[error("state file error: {0}")]
    StateIo(String),

    #[error("no Transfer to {recipient} observed from token {token}")]
    NoTransferObserved { token: String, recipient: String },

    #[error("rpc error: {0}")]
    Rpc(String),
}

impl DispatchError {
    /// True when the failed transaction was mined and used its nonce
    pub fn consumed_nonce(&self) -> bool {
        matches!(self, Self::Reverted { .. })
    }
}

pub type DispatchResult<T> = std::result::Result<T, DispatchError>;
