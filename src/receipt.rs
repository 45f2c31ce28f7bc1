//! Receipt Transfer Extraction
//!
//! Recovers how much of a token a recipient received in a confirmed
//! transaction by scanning its ERC20 `Transfer(from, to, value)` logs.
//! First matching log wins.
//!
//! Author: AI-Generated
//! Created: 2026-10-14

use crate::contracts::IERC20;
use alloy::primitives::{Address, Log, U256};
use alloy::sol_types::SolEvent;
use tracing::debug;

/// Result of a receipt scan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferOutcome {
    Observed(U256),
    /// No matching Transfer log; callers record zero and warn
    NoTransferObserved,
}

impl TransferOutcome {
    /// Transferred amount, zero when nothing was observed
    pub fn amount(&self) -> U256 {
        match self {
            TransferOutcome::Observed(v) => *v,
            TransferOutcome::NoTransferObserved => U256::ZERO,
        }
    }

    pub fn is_observed(&self) -> bool {
        matches!(self, TransferOutcome::Observed(_))
    }
}

/// True if `log` is a Transfer emitted by `token` whose indexed `to` is `recipient`
fn is_transfer_to(log: &Log, token: Address, recipient: Address) -> bool {
    let topics = log.topics();
    log.address == token
        && topics.len() == 3
        && topics[0] == IERC20::Transfer::SIGNATURE_HASH
        && topics[2] == recipient.into_word()
}

/// Scan `logs` for the first Transfer of `token` to `recipient`
pub fn extract_transfer_amount(logs: &[Log], token: Address, recipient: Address) -> TransferOutcome {
    let Some(log) = logs.iter().find(|l| is_transfer_to(l, token, recipient)) else {
        debug!("No Transfer of {:?} to {:?} in {} logs", token, recipient, logs.len());
        return TransferOutcome::NoTransferObserved;
    };

    // Non-indexed `value` is the first (and only) data word
    let data = &log.data.data;
    if data.len() < 32 {
        debug!("Transfer log from {:?} has short data ({} bytes)", token, data.len());
        return TransferOutcome::NoTransferObserved;
    }
    TransferOutcome::Observed(U256::from_be_slice(&data[..32]))
}
