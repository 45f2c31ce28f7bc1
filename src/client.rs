//! Network / Signing Collaborator
//!
//! `ChainClient` is the seam between dispatch logic and the chain: pending
//! nonce lookup, sign + broadcast + receipt wait, and ERC20 balance reads.
//! `AlloyChainClient` implements it over an alloy HTTP provider with a local
//! private-key wallet. Transactions are legacy-priced: fixed gas price, fixed
//! gas limit, fixed chain id, no estimation.
//!
//! Author: AI-Generated
//! Created: 2026-10-14

use crate::contracts::IERC20;
use crate::error::{DispatchError, DispatchResult};
use alloy::network::{EthereumWallet, TransactionBuilder};
use alloy::primitives::{Address, Bytes, Log, TxHash, U256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;
use alloy::transports::http::reqwest::Url;
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info};

/// Per-submission fields produced by the calldata builder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTxFields {
    pub to: Address,
    /// Native value in smallest units
    pub value: U256,
    pub data: Bytes,
    pub gas_limit: u64,
}

/// What we keep from a confirmed receipt
#[derive(Debug, Clone)]
pub struct SubmissionReceipt {
    pub tx_hash: TxHash,
    pub block_number: Option<u64>,
    pub logs: Vec<Log>,
}

#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Signing account address
    fn account(&self) -> Address;

    /// Authoritative pending transaction count for the signing account
    async fn pending_nonce(&self) -> DispatchResult<u64>;

    /// Sign, broadcast and wait for a successful receipt.
    /// A mined failure is `DispatchError::Reverted`; a rejected or
    /// unconfirmed transaction is `DispatchError::Submission`.
    async fn sign_and_submit(&self, tx: &RawTxFields, nonce: u64)
        -> DispatchResult<SubmissionReceipt>;

    /// ERC20 balance (informational only)
    async fn token_balance(&self, token: Address, owner: Address) -> DispatchResult<U256>;
}

/// Chain client over alloy's HTTP provider
pub struct AlloyChainClient {
    provider: DynProvider,
    account: Address,
    chain_id: u64,
    gas_price_wei: u128,
    receipt_timeout: Duration,
}

impl AlloyChainClient {
    /// Build the client. Fails with `Configuration` on a malformed key or URL.
    pub fn connect(
        rpc_url: &str,
        private_key: &str,
        chain_id: u64,
        gas_price_wei: u128,
        receipt_timeout: Duration,
    ) -> DispatchResult<Self> {
        let signer: PrivateKeySigner = private_key
            .trim()
            .parse()
            .map_err(|e| DispatchError::Configuration(format!("invalid private key: {}", e)))?;
        let account = signer.address();

        let url: Url = rpc_url
            .parse()
            .map_err(|e| DispatchError::Configuration(format!("invalid RPC URL '{}': {}", rpc_url, e)))?;

        let provider = ProviderBuilder::new()
            .wallet(EthereumWallet::from(signer))
            .connect_http(url)
            .erased();

        info!("Chain client ready: {:?} on chain {}", account, chain_id);

        Ok(Self {
            provider,
            account,
            chain_id,
            gas_price_wei,
            receipt_timeout,
        })
    }
}

#[async_trait]
impl ChainClient for AlloyChainClient {
    fn account(&self) -> Address {
        self.account
    }

    async fn pending_nonce(&self) -> DispatchResult<u64> {
        self.provider
            .get_transaction_count(self.account)
            .pending()
            .await
            .map_err(|e| DispatchError::Rpc(format!("pending nonce lookup failed: {}", e)))
    }

    async fn sign_and_submit(
        &self,
        tx: &RawTxFields,
        nonce: u64,
    ) -> DispatchResult<SubmissionReceipt> {
        let request = TransactionRequest::default()
            .with_from(self.account)
            .with_to(tx.to)
            .with_value(tx.value)
            .with_input(tx.data.clone())
            .with_gas_limit(tx.gas_limit)
            .with_gas_price(self.gas_price_wei)
            .with_nonce(nonce)
            .with_chain_id(self.chain_id);

        debug!("Submitting to {:?} | nonce {} | value {}", tx.to, nonce, tx.value);

        let pending = self
            .provider
            .send_transaction(request)
            .await
            .map_err(|e| DispatchError::Submission(format!("send failed: {}", e)))?;
        let tx_hash = *pending.tx_hash();
        info!("Tx submitted: {:?} (nonce {})", tx_hash, nonce);

        let receipt = pending
            .with_timeout(Some(self.receipt_timeout))
            .get_receipt()
            .await
            .map_err(|e| DispatchError::Submission(format!("no receipt for {:?}: {}", tx_hash, e)))?;

        if !receipt.inner.status() {
            return Err(DispatchError::Reverted {
                tx_hash: format!("{:?}", tx_hash),
            });
        }

        Ok(SubmissionReceipt {
            tx_hash,
            block_number: receipt.block_number,
            logs: receipt.inner.logs().iter().map(|l| l.inner.clone()).collect(),
        })
    }

    async fn token_balance(&self, token: Address, owner: Address) -> DispatchResult<U256> {
        IERC20::new(token, &self.provider)
            .balanceOf(owner)
            .call()
            .await
            .map_err(|e| DispatchError::Rpc(format!("balanceOf({:?}) on {:?} failed: {}", owner, token, e)))
    }
}
