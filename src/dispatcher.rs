//! Dispatcher
//!
//! One invocation: match the schedule, then for each due template in
//! declaration order run Idle -> Building -> Submitting -> {Confirmed, Failed}
//! once per repeat. Submissions are awaited one at a time. Failures stay
//! local to the template (or the repeat); only startup steps are fatal.
//! The nonce moves on confirmation, or when a mined transaction reverted.
//!
//! Forward swaps record their observed output under the window's slot key.
//! Dependent swaps spend the amount recorded for their window's source slot
//! and are skipped without touching the nonce when that amount is zero.
//!
//! Author: AI-Generated
//! Created: 2026-10-14

use crate::amount::from_smallest_unit;
use crate::calldata::build_request;
use crate::chain_store::SwapChainStore;
use crate::client::{ChainClient, SubmissionReceipt};
use crate::error::DispatchError;
use crate::nonce::NonceSequencer;
use crate::receipt::extract_transfer_amount;
use crate::scheduler::{DueTemplate, Scheduler};
use crate::types::{BotConfig, SwapLeg, TransactionTemplate, TxKind, WallClock};
use alloy::primitives::U256;
use chrono::{DateTime, Utc};
use std::fmt;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Per-attempt lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    Idle,
    Building,
    Submitting,
    Confirmed,
    Failed,
}

impl fmt::Display for DispatchState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            DispatchState::Idle => "idle",
            DispatchState::Building => "building",
            DispatchState::Submitting => "submitting",
            DispatchState::Confirmed => "confirmed",
            DispatchState::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// Outcome counts of one invocation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub due: usize,
    pub confirmed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub final_nonce: u64,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "due={} confirmed={} failed={} skipped={} next_nonce={}",
            self.due, self.confirmed, self.failed, self.skipped, self.final_nonce
        )
    }
}

pub struct Dispatcher<'a, C: ChainClient + ?Sized> {
    client: &'a C,
    templates: &'a [TransactionTemplate],
    config: &'a BotConfig,
    store: SwapChainStore,
    nonce: NonceSequencer,
    repeat_pause: Duration,
}

impl<'a, C: ChainClient + ?Sized> Dispatcher<'a, C> {
    pub fn new(
        client: &'a C,
        templates: &'a [TransactionTemplate],
        config: &'a BotConfig,
        nonce: NonceSequencer,
    ) -> Self {
        Self {
            client,
            templates,
            config,
            store: SwapChainStore::new(&config.state_file, config.default_slots.clone()),
            nonce,
            repeat_pause: Duration::from_millis(config.repeat_pause_ms),
        }
    }

    /// Dispatch everything due at `now`
    pub async fn run(&mut self, now: DateTime<Utc>) -> RunSummary {
        let clock = WallClock::from_datetime(&now);
        let now_unix = u64::try_from(now.timestamp()).unwrap_or(0);

        if self.config.test_mode {
            warn!("TEST MODE: schedule checks bypassed, every template runs");
        }

        let due = Scheduler::new(self.templates, self.config.test_mode).due_templates(clock);
        info!("{} UTC: {} template(s) due", clock, due.len());

        let mut summary = RunSummary {
            due: due.len(),
            ..Default::default()
        };

        for item in due {
            info!(
                "=== {} [{}] window {} ===",
                item.template.name,
                item.template.kind,
                item.window.slot_key()
            );
            match item.template.kind {
                TxKind::Stake | TxKind::Unstake | TxKind::Wrap => {
                    self.dispatch_repeated(item, now_unix, &mut summary).await;
                }
                TxKind::SwapAToB => self.dispatch_forward_swap(item, now_unix, &mut summary).await,
                TxKind::SwapBToA => self.dispatch_dependent_swap(item, now_unix, &mut summary).await,
            }
        }

        summary.final_nonce = self.nonce.next();
        summary
    }

    /// Stake / Unstake / Wrap: `repeat_count` independent attempts
    async fn dispatch_repeated(&mut self, item: DueTemplate<'_>, now_unix: u64, summary: &mut RunSummary) {
        let total = item.template.repeat_count;
        for attempt in 1..=total {
            if total > 1 {
                info!("{} {}/{}", item.template.name, attempt, total);
            }

            match self.attempt(item.template, None, now_unix).await {
                Ok(_) => summary.confirmed += 1,
                Err(e) if is_template_fatal(&e) => {
                    error!("{}: {} - abandoning template", item.template.name, e);
                    summary.failed += 1;
                    return;
                }
                Err(_) => summary.failed += 1,
            }

            if attempt < total && !self.repeat_pause.is_zero() {
                tokio::time::sleep(self.repeat_pause).await;
            }
        }
    }

    async fn dispatch_forward_swap(&mut self, item: DueTemplate<'_>, now_unix: u64, summary: &mut RunSummary) {
        let Some(leg) = item.template.swap_leg() else {
            error!("{}: swap template without swap parameters", item.template.name);
            summary.failed += 1;
            return;
        };

        let receipt = match self.attempt(item.template, None, now_unix).await {
            Ok(r) => r,
            Err(_) => {
                summary.failed += 1;
                return;
            }
        };
        summary.confirmed += 1;

        let account = self.client.account();
        let outcome = extract_transfer_amount(&receipt.logs, leg.token_out.address, account);
        if !outcome.is_observed() {
            warn!(
                "{}",
                DispatchError::NoTransferObserved {
                    token: format!("{:?}", leg.token_out.address),
                    recipient: format!("{:?}", account),
                }
            );
        }

        let amount = outcome.amount();
        let slot = item.window.slot_key();
        info!(
            "Swap output: {} {} ({} smallest units) -> slot {}",
            from_smallest_unit(amount, leg.token_out.decimals),
            leg.token_out.symbol,
            amount,
            slot
        );
        if let Err(e) = self.store.record_output(&slot, amount) {
            error!("Failed to record swap output for {}: {}", slot, e);
        }
    }

    async fn dispatch_dependent_swap(&mut self, item: DueTemplate<'_>, now_unix: u64, summary: &mut RunSummary) {
        let Some(leg) = item.template.swap_leg() else {
            error!("{}: swap template without swap parameters", item.template.name);
            summary.failed += 1;
            return;
        };
        let Some(source) = item.window.source_slot.as_deref() else {
            error!("{}: window {} has no source slot", item.template.name, item.window.slot_key());
            summary.failed += 1;
            return;
        };

        let amount = self.store.amount_for(source);
        if amount.is_zero() {
            info!(
                "No recorded output for slot {}, skipping {}",
                source, item.template.name
            );
            summary.skipped += 1;
            return;
        }

        info!(
            "Using {} {} from slot {}",
            from_smallest_unit(amount, leg.token_in.decimals),
            leg.token_in.symbol,
            source
        );
        self.log_balance(leg).await;

        match self.attempt(item.template, Some(amount), now_unix).await {
            Ok(_) => summary.confirmed += 1,
            Err(_) => summary.failed += 1,
        }
    }

    async fn log_balance(&self, leg: &SwapLeg) {
        let account = self.client.account();
        match self.client.token_balance(leg.token_in.address, account).await {
            Ok(balance) => info!(
                "Current {} balance: {}",
                leg.token_in.symbol,
                from_smallest_unit(balance, leg.token_in.decimals)
            ),
            Err(e) => warn!("Balance lookup for {} failed: {}", leg.token_in.symbol, e),
        }
    }

    /// One Building -> Submitting -> {Confirmed, Failed} cycle.
    /// The nonce advances on Confirmed and on a mined revert.
    async fn attempt(
        &mut self,
        template: &TransactionTemplate,
        chained_amount: Option<U256>,
        now_unix: u64,
    ) -> Result<SubmissionReceipt, DispatchError> {
        let mut state = DispatchState::Idle;
        transition(template, &mut state, DispatchState::Building);

        let request = match build_request(
            template,
            chained_amount,
            now_unix,
            self.config.swap_deadline_secs,
            &self.config.swap_trailer,
        ) {
            Ok(r) => r,
            Err(e) => {
                transition(template, &mut state, DispatchState::Failed);
                return Err(e);
            }
        };

        let nonce = self.nonce.next();
        transition(template, &mut state, DispatchState::Submitting);

        match self.client.sign_and_submit(&request, nonce).await {
            Ok(receipt) => {
                transition(template, &mut state, DispatchState::Confirmed);
                self.nonce.advance();
                info!(
                    "{} confirmed: {:?} (block {:?}, nonce {})",
                    template.name, receipt.tx_hash, receipt.block_number, nonce
                );
                Ok(receipt)
            }
            Err(e) if e.consumed_nonce() => {
                transition(template, &mut state, DispatchState::Failed);
                self.nonce.advance();
                error!("{} failed (nonce {} spent): {}", template.name, nonce, e);
                Err(e)
            }
            Err(e) => {
                transition(template, &mut state, DispatchState::Failed);
                error!("{} failed (nonce {} kept): {}", template.name, nonce, e);
                Err(e)
            }
        }
    }
}

fn transition(template: &TransactionTemplate, state: &mut DispatchState, next: DispatchState) {
    debug!("{}: {} -> {}", template.name, state, next);
    *state = next;
}

/// Malformed template or amount: retrying the same template cannot succeed
fn is_template_fatal(e: &DispatchError) -> bool {
    matches!(e, DispatchError::Encoding(_) | DispatchError::InvalidAmount { .. })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain_store::SwapChainRecord;
    use crate::client::RawTxFields;
    use crate::contracts::IERC20;
    use crate::error::DispatchResult;
    use crate::types::{
        ScheduleWindow, SwapInput, SwapTrailer, TemplatePayload, TokenInfo,
    };
    use alloy::primitives::{address, Address, Bytes, Log, LogData, TxHash, B256};
    use alloy::sol_types::SolEvent;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::collections::VecDeque;
    use std::path::Path;
    use std::sync::Mutex;

    const ME: Address = address!("1111111111111111111111111111111111111111");
    const POOL: Address = address!("2222222222222222222222222222222222222222");
    const USDT: Address = address!("aDC7bcB5d8fe053Ef19b4E0C861c262Af6e0db60");
    const WINJ: Address = address!("0000000088827d2d103ee2d9A6b781773AE03FfB");
    const DEX: Address = address!("822f872763B7Be16c9b9687D8b9D73f1b5017Df0");

    /// Scripted chain: pops one result per submission, defaults to success
    struct MockClient {
        script: Mutex<VecDeque<DispatchResult<SubmissionReceipt>>>,
        submissions: Mutex<Vec<(RawTxFields, u64)>>,
        start_nonce: u64,
    }

    impl MockClient {
        fn new(script: Vec<DispatchResult<SubmissionReceipt>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                submissions: Mutex::new(Vec::new()),
                start_nonce: 7,
            }
        }

        fn submitted_nonces(&self) -> Vec<u64> {
            self.submissions.lock().unwrap().iter().map(|(_, n)| *n).collect()
        }
    }

    #[async_trait]
    impl ChainClient for MockClient {
        fn account(&self) -> Address {
            ME
        }

        async fn pending_nonce(&self) -> DispatchResult<u64> {
            Ok(self.start_nonce)
        }

        async fn sign_and_submit(&self, tx: &RawTxFields, nonce: u64) -> DispatchResult<SubmissionReceipt> {
            self.submissions.lock().unwrap().push((tx.clone(), nonce));
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(receipt(vec![])))
        }

        async fn token_balance(&self, _token: Address, _owner: Address) -> DispatchResult<U256> {
            Err(DispatchError::Rpc("balance unavailable".into()))
        }
    }

    fn receipt(logs: Vec<Log>) -> SubmissionReceipt {
        SubmissionReceipt {
            tx_hash: TxHash::repeat_byte(0xaa),
            block_number: Some(1),
            logs,
        }
    }

    fn transfer_to_me(token: Address, value: u64) -> Log {
        Log {
            address: token,
            data: LogData::new_unchecked(
                vec![IERC20::Transfer::SIGNATURE_HASH, POOL.into_word(), ME.into_word()],
                Bytes::from(U256::from(value).to_be_bytes::<32>().to_vec()),
            ),
        }
    }

    fn config(state_file: &Path, test_mode: bool) -> BotConfig {
        BotConfig {
            rpc_url: "http://localhost:8545".into(),
            chain_id: 1439,
            gas_price_wei: 192_000_000,
            receipt_timeout_secs: 120,
            state_file: state_file.to_path_buf(),
            default_slots: vec!["12:00".into(), "19:00".into()],
            repeat_pause_ms: 0,
            swap_deadline_secs: 600,
            swap_trailer: SwapTrailer {
                trailing_word_1: B256::ZERO,
                trailing_word_2: B256::ZERO,
            },
            test_mode,
        }
    }

    fn token(symbol: &str, address: Address, decimals: u8) -> TokenInfo {
        TokenInfo {
            symbol: symbol.into(),
            address,
            decimals,
        }
    }

    fn wrap_template(repeat: u32) -> TransactionTemplate {
        TransactionTemplate {
            name: "Wrap INJ".into(),
            kind: TxKind::Wrap,
            target_contract: WINJ,
            method_selector: [0xd0, 0xe3, 0x0d, 0xb0],
            payload: TemplatePayload::NativeValue(U256::from(1_000_000_000_000_000u64)),
            repeat_count: repeat,
            gas_limit: 52_619,
            schedule: vec![ScheduleWindow::new(6, 0)],
        }
    }

    fn forward_swap() -> TransactionTemplate {
        TransactionTemplate {
            name: "Swap USDT -> wINJ".into(),
            kind: TxKind::SwapAToB,
            target_contract: DEX,
            method_selector: [0x41, 0x4b, 0xf3, 0x89],
            payload: TemplatePayload::Swap(SwapLeg {
                token_in: token("USDT", USDT, 6),
                token_out: token("WINJ", WINJ, 18),
                input: SwapInput::Fixed(U256::from(10_000u64)),
                min_amount_out: U256::from(1u64),
                recipient: ME,
            }),
            repeat_count: 1,
            gas_limit: 657_795,
            schedule: vec![ScheduleWindow::new(12, 0), ScheduleWindow::new(19, 0)],
        }
    }

    fn dependent_swap() -> TransactionTemplate {
        TransactionTemplate {
            name: "Swap wINJ -> USDT".into(),
            kind: TxKind::SwapBToA,
            target_contract: DEX,
            method_selector: [0x41, 0x4b, 0xf3, 0x89],
            payload: TemplatePayload::Swap(SwapLeg {
                token_in: token("WINJ", WINJ, 18),
                token_out: token("USDT", USDT, 6),
                input: SwapInput::Chained,
                min_amount_out: U256::from(1u64),
                recipient: ME,
            }),
            repeat_count: 1,
            gas_limit: 657_795,
            schedule: vec![
                ScheduleWindow::new(20, 0).with_source_slot("12:00"),
                ScheduleWindow::new(0, 0).with_source_slot("19:00"),
            ],
        }
    }

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 14, hour, minute, 0).unwrap()
    }

    #[tokio::test]
    async fn test_failed_repeat_reuses_nonce() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(&dir.path().join("s.json"), false);
        let table = vec![wrap_template(3)];
        let client = MockClient::new(vec![
            Ok(receipt(vec![])),
            Err(DispatchError::Submission("nonce too low".into())),
            Ok(receipt(vec![])),
        ]);

        let mut d = Dispatcher::new(&client, &table, &cfg, NonceSequencer::new(7));
        let summary = d.run(at(6, 2)).await;

        assert_eq!(client.submitted_nonces(), vec![7, 8, 8]);
        assert_eq!(summary.confirmed, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.final_nonce, 9);
    }

    #[tokio::test]
    async fn test_reverted_repeat_spends_nonce() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(&dir.path().join("s.json"), false);
        let table = vec![wrap_template(3)];
        let client = MockClient::new(vec![
            Ok(receipt(vec![])),
            Err(DispatchError::Reverted { tx_hash: "0xaa".into() }),
            Ok(receipt(vec![])),
        ]);

        let mut d = Dispatcher::new(&client, &table, &cfg, NonceSequencer::new(7));
        let summary = d.run(at(6, 1)).await;

        assert_eq!(client.submitted_nonces(), vec![7, 8, 9]);
        assert_eq!(summary.confirmed, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.final_nonce, 10);
    }

    #[tokio::test]
    async fn test_state_write_failure_does_not_stop_run() {
        let dir = tempfile::tempdir().unwrap();
        // Non-empty directory in place of the state file: reads fall back, writes fail
        let state = dir.path().join("taken");
        std::fs::create_dir_all(state.join("inner")).unwrap();
        let cfg = config(&state, true);
        let table = vec![forward_swap(), wrap_template(1)];
        let client = MockClient::new(vec![
            Ok(receipt(vec![transfer_to_me(WINJ, 4_200)])),
            Ok(receipt(vec![])),
        ]);

        let mut d = Dispatcher::new(&client, &table, &cfg, NonceSequencer::new(7));
        let summary = d.run(at(12, 0)).await;

        assert_eq!(summary.confirmed, 2);
        assert_eq!(summary.failed, 0);
        assert_eq!(client.submitted_nonces(), vec![7, 8]);
        assert!(state.is_dir());
    }

    #[tokio::test]
    async fn test_nothing_due_submits_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(&dir.path().join("s.json"), false);
        let table = vec![wrap_template(2)];
        let client = MockClient::new(vec![]);

        let mut d = Dispatcher::new(&client, &table, &cfg, NonceSequencer::new(7));
        let summary = d.run(at(6, 5)).await;

        assert!(client.submitted_nonces().is_empty());
        assert_eq!(summary, RunSummary { final_nonce: 7, ..Default::default() });
    }

    #[tokio::test]
    async fn test_dependent_swap_skipped_when_slot_zero() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(&dir.path().join("s.json"), false);
        let table = vec![dependent_swap()];
        let client = MockClient::new(vec![]);

        let mut d = Dispatcher::new(&client, &table, &cfg, NonceSequencer::new(7));
        let summary = d.run(at(20, 1)).await;

        assert!(client.submitted_nonces().is_empty());
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.final_nonce, 7);
    }

    #[tokio::test]
    async fn test_forward_swap_records_output_under_window_slot() {
        let dir = tempfile::tempdir().unwrap();
        let state = dir.path().join("s.json");
        let cfg = config(&state, false);
        let table = vec![forward_swap()];
        let client = MockClient::new(vec![Ok(receipt(vec![
            transfer_to_me(USDT, 1),
            transfer_to_me(WINJ, 4_200),
        ]))]);

        let mut d = Dispatcher::new(&client, &table, &cfg, NonceSequencer::new(7));
        let summary = d.run(at(19, 3)).await;
        assert_eq!(summary.confirmed, 1);

        let store = SwapChainStore::new(&state, cfg.default_slots.clone());
        assert_eq!(store.amount_for("19:00"), U256::from(4_200u64));
        assert_eq!(store.amount_for("12:00"), U256::ZERO);
    }

    #[tokio::test]
    async fn test_forward_swap_without_transfer_records_zero() {
        let dir = tempfile::tempdir().unwrap();
        let state = dir.path().join("s.json");
        let cfg = config(&state, false);
        let store = SwapChainStore::new(&state, cfg.default_slots.clone());
        let mut seeded = SwapChainRecord::new();
        seeded.insert("12:00".into(), "999".into());
        store.write(&seeded).unwrap();

        let table = vec![forward_swap()];
        let client = MockClient::new(vec![Ok(receipt(vec![]))]);
        let mut d = Dispatcher::new(&client, &table, &cfg, NonceSequencer::new(7));
        d.run(at(12, 0)).await;

        assert_eq!(store.amount_for("12:00"), U256::ZERO);
    }

    #[tokio::test]
    async fn test_failed_forward_swap_keeps_record() {
        let dir = tempfile::tempdir().unwrap();
        let state = dir.path().join("s.json");
        let cfg = config(&state, false);
        let store = SwapChainStore::new(&state, cfg.default_slots.clone());
        store.record_output("12:00", U256::from(5u64)).unwrap();

        let table = vec![forward_swap()];
        let client = MockClient::new(vec![Err(DispatchError::Submission("reverted".into()))]);
        let mut d = Dispatcher::new(&client, &table, &cfg, NonceSequencer::new(7));
        let summary = d.run(at(12, 4)).await;

        assert_eq!(summary.failed, 1);
        assert_eq!(summary.final_nonce, 7);
        assert_eq!(store.amount_for("12:00"), U256::from(5u64));
    }

    #[tokio::test]
    async fn test_dependent_swap_spends_source_slot() {
        let dir = tempfile::tempdir().unwrap();
        let state = dir.path().join("s.json");
        let cfg = config(&state, false);
        let store = SwapChainStore::new(&state, cfg.default_slots.clone());
        store.record_output("19:00", U256::from(4_200u64)).unwrap();

        let table = vec![dependent_swap()];
        let client = MockClient::new(vec![]);
        let mut d = Dispatcher::new(&client, &table, &cfg, NonceSequencer::new(7));
        let summary = d.run(at(0, 2)).await;

        assert_eq!(summary.confirmed, 1);
        let subs = client.submissions.lock().unwrap();
        assert_eq!(subs.len(), 1);
        // amount_in is the third word after the selector
        assert_eq!(&subs[0].0.data[4 + 64..4 + 96], &U256::from(4_200u64).to_be_bytes::<32>());
    }

    #[tokio::test]
    async fn test_test_mode_chains_forward_into_dependent() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(&dir.path().join("s.json"), true);
        let table = vec![wrap_template(1), forward_swap(), dependent_swap()];
        let client = MockClient::new(vec![
            Ok(receipt(vec![])),
            Ok(receipt(vec![transfer_to_me(WINJ, 77)])),
        ]);

        let mut d = Dispatcher::new(&client, &table, &cfg, NonceSequencer::new(7));
        let summary = d.run(at(3, 33)).await;

        assert_eq!(summary.due, 3);
        assert_eq!(summary.confirmed, 3);
        assert_eq!(client.submitted_nonces(), vec![7, 8, 9]);
        assert_eq!(summary.final_nonce, 10);
    }

    #[tokio::test]
    async fn test_encoding_error_abandons_only_that_template() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(&dir.path().join("s.json"), true);
        // A chained swap routed through the repeat path has no input amount
        let mut broken = dependent_swap();
        broken.kind = TxKind::Wrap;
        broken.repeat_count = 3;
        let table = vec![broken, wrap_template(1)];
        let client = MockClient::new(vec![]);

        let mut d = Dispatcher::new(&client, &table, &cfg, NonceSequencer::new(7));
        let summary = d.run(at(6, 0)).await;

        assert_eq!(summary.failed, 1);
        assert_eq!(summary.confirmed, 1);
        assert_eq!(client.submitted_nonces(), vec![7]);
    }
}
