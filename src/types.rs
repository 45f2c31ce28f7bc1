// Core data model: transaction templates, schedule windows, run settings

use alloy::primitives::{Address, B256, U256};
use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Width of every schedule window in minutes: `[minute, minute + 5)`
pub const WINDOW_SPAN_MINUTES: u16 = 5;

/// Transaction kinds we dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxKind {
    Stake,
    Unstake,
    Wrap,
    /// Forward swap (token A -> token B), records its output
    SwapAToB,
    /// Dependent swap (token B -> token A), consumes a recorded output
    SwapBToA,
}

impl fmt::Display for TxKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TxKind::Stake => write!(f, "STAKE"),
            TxKind::Unstake => write!(f, "UNSTAKE"),
            TxKind::Wrap => write!(f, "WRAP"),
            TxKind::SwapAToB => write!(f, "SWAP_A_TO_B"),
            TxKind::SwapBToA => write!(f, "SWAP_B_TO_A"),
        }
    }
}

/// UTC hour/minute sample used for schedule matching
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WallClock {
    pub hour: u8,
    pub minute: u8,
}

impl WallClock {
    pub fn new(hour: u8, minute: u8) -> Self {
        Self { hour, minute }
    }

    pub fn from_datetime(now: &DateTime<Utc>) -> Self {
        Self {
            hour: now.hour() as u8,
            minute: now.minute() as u8,
        }
    }
}

impl fmt::Display for WallClock {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

/// One scheduled window. Never wraps across the hour boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleWindow {
    pub hour: u8,
    pub minute: u8,
    /// Dependent swaps only: the forward-swap slot whose output this window consumes
    pub source_slot: Option<String>,
}

impl ScheduleWindow {
    pub fn new(hour: u8, minute: u8) -> Self {
        Self {
            hour,
            minute,
            source_slot: None,
        }
    }

    pub fn with_source_slot(mut self, slot: &str) -> Self {
        self.source_slot = Some(slot.to_string());
        self
    }

    /// Same hour and `minute <= now.minute < minute + 5`
    pub fn matches(&self, now: WallClock) -> bool {
        let start = self.minute as u16;
        let sample = now.minute as u16;
        now.hour == self.hour && sample >= start && sample < start + WINDOW_SPAN_MINUTES
    }

    /// "HH:MM" key under which a forward swap in this window records its output
    pub fn slot_key(&self) -> String {
        format!("{:02}:{:02}", self.hour, self.minute)
    }
}

/// Token metadata from the configuration table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenInfo {
    pub symbol: String,
    pub address: Address,
    pub decimals: u8,
}

/// Where a swap's input amount comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwapInput {
    /// Statically configured amount (smallest units)
    Fixed(U256),
    /// Read from the swap chain record at dispatch time
    Chained,
}

/// Swap leg parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapLeg {
    pub token_in: TokenInfo,
    pub token_out: TokenInfo,
    pub input: SwapInput,
    pub min_amount_out: U256,
    pub recipient: Address,
}

/// Kind-dependent amount payload of a template
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplatePayload {
    /// Native currency sent in the transaction value field (Stake, Wrap)
    NativeValue(U256),
    /// Single padded uint256 argument in calldata (Unstake)
    Argument(U256),
    Swap(SwapLeg),
}

/// Immutable transaction template, one per transaction kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionTemplate {
    pub name: String,
    pub kind: TxKind,
    pub target_contract: Address,
    pub method_selector: [u8; 4],
    pub payload: TemplatePayload,
    /// Independent submissions per trigger (>= 1)
    pub repeat_count: u32,
    pub gas_limit: u64,
    /// Ordered, non-empty
    pub schedule: Vec<ScheduleWindow>,
}

impl TransactionTemplate {
    /// First window matching `now`, if any
    pub fn matching_window(&self, now: WallClock) -> Option<&ScheduleWindow> {
        self.schedule.iter().find(|w| w.matches(now))
    }

    pub fn swap_leg(&self) -> Option<&SwapLeg> {
        match &self.payload {
            TemplatePayload::Swap(leg) => Some(leg),
            _ => None,
        }
    }
}

/// The two opaque trailing words of the swap calldata layout.
/// Copied from a known-good reference transaction; their meaning is unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapTrailer {
    pub trailing_word_1: B256,
    pub trailing_word_2: B256,
}

/// Process-wide run settings (network constants + dispatch knobs)
#[derive(Debug, Clone)]
pub struct BotConfig {
    // Network
    pub rpc_url: String,
    pub chain_id: u64,
    pub gas_price_wei: u128,
    pub receipt_timeout_secs: u64,

    // Dispatch
    pub state_file: PathBuf,
    pub default_slots: Vec<String>,
    pub repeat_pause_ms: u64,
    pub swap_deadline_secs: u64,
    pub swap_trailer: SwapTrailer,
    /// Run every template regardless of the clock
    pub test_mode: bool,
}
