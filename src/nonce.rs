//! Per-invocation nonce sequencing.
//!
//! Seeded once from the pending transaction count, advanced only after a
//! confirmed submission. A failed attempt leaves the counter where it was so
//! the next attempt reuses the same nonce.

use crate::client::ChainClient;
use crate::error::DispatchResult;
use tracing::info;

#[derive(Debug)]
pub struct NonceSequencer {
    current: u64,
}

impl NonceSequencer {
    pub fn new(start: u64) -> Self {
        Self { current: start }
    }

    /// Seed from the account's pending nonce (fatal to the run on failure)
    pub async fn from_chain<C: ChainClient + ?Sized>(client: &C) -> DispatchResult<Self> {
        let start = client.pending_nonce().await?;
        info!("Starting nonce for {:?}: {}", client.account(), start);
        Ok(Self::new(start))
    }

    /// Nonce for the next submission
    pub fn next(&self) -> u64 {
        self.current
    }

    /// Call only after a confirmed submission
    pub fn advance(&mut self) {
        self.current += 1;
    }
}
