//! Configuration management
//!
//! Static template table from TOML (config/schedule.toml), secrets and
//! network overrides from the environment / .env file.
//!
//! Env:
//!   INJECTIVE_PRIVATE_KEY  signing key (required)
//!   RPC_URL, CHAIN_ID, GAS_PRICE_WEI, STATE_FILE  override the TOML values
//!   TEST_MODE=true         run every template regardless of the clock

use crate::amount::to_smallest_unit;
use crate::error::{DispatchError, DispatchResult};
use crate::types::{
    BotConfig, ScheduleWindow, SwapInput, SwapLeg, SwapTrailer, TemplatePayload, TokenInfo,
    TransactionTemplate, TxKind,
};
use alloy::primitives::{Address, B256};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::error;

pub const PRIVATE_KEY_ENV: &str = "INJECTIVE_PRIVATE_KEY";

/// Top-level TOML structure
#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleFile {
    #[serde(default)]
    pub network: NetworkSection,
    #[serde(default)]
    pub dispatch: DispatchSection,
    pub swap: SwapSection,
    #[serde(rename = "token", default)]
    pub tokens: Vec<TokenEntry>,
    #[serde(rename = "template")]
    pub templates: Vec<TemplateEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkSection {
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,
    /// Wei. TOML integers are i64, so this is widened to u128 in `BotConfig`
    #[serde(default = "default_gas_price_wei")]
    pub gas_price_wei: u64,
    #[serde(default = "default_receipt_timeout")]
    pub receipt_timeout_secs: u64,
}

impl Default for NetworkSection {
    fn default() -> Self {
        Self {
            rpc_url: default_rpc_url(),
            chain_id: default_chain_id(),
            gas_price_wei: default_gas_price_wei(),
            receipt_timeout_secs: default_receipt_timeout(),
        }
    }
}

fn default_rpc_url() -> String { "https://k8s.testnet.json-rpc.injective.network/".to_string() }
fn default_chain_id() -> u64 { 1439 }
fn default_gas_price_wei() -> u64 { 192_000_000 }
fn default_receipt_timeout() -> u64 { 120 }

#[derive(Debug, Clone, Deserialize)]
pub struct DispatchSection {
    #[serde(default = "default_state_file")]
    pub state_file: String,
    #[serde(default = "default_slots")]
    pub default_slots: Vec<String>,
    #[serde(default = "default_repeat_pause")]
    pub repeat_pause_ms: u64,
    #[serde(default = "default_deadline")]
    pub swap_deadline_secs: u64,
}

impl Default for DispatchSection {
    fn default() -> Self {
        Self {
            state_file: default_state_file(),
            default_slots: default_slots(),
            repeat_pause_ms: default_repeat_pause(),
            swap_deadline_secs: default_deadline(),
        }
    }
}

fn default_state_file() -> String { "data/swap_outputs.json".to_string() }
fn default_slots() -> Vec<String> { vec!["12:00".to_string(), "19:00".to_string()] }
fn default_repeat_pause() -> u64 { 500 }
fn default_deadline() -> u64 { 600 }

/// Opaque trailing words of the swap layout, as 0x-prefixed 32-byte hex
#[derive(Debug, Clone, Deserialize)]
pub struct SwapSection {
    pub trailing_word_1: String,
    pub trailing_word_2: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenEntry {
    pub symbol: String,
    pub address: String,
    pub decimals: u8,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WindowEntry {
    pub hour: u8,
    pub minute: u8,
    #[serde(default)]
    pub source_slot: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TemplateEntry {
    pub name: String,
    pub kind: TxKind,
    pub contract: String,
    pub selector: String,
    /// Human-decimal amount: native value (stake/wrap), argument (unstake)
    /// or fixed swap input (forward swap)
    #[serde(default)]
    pub amount: Option<String>,
    /// Token symbol whose decimals apply to `amount` (default "INJ" for native kinds)
    #[serde(default)]
    pub amount_token: Option<String>,
    #[serde(default)]
    pub token_in: Option<String>,
    #[serde(default)]
    pub token_out: Option<String>,
    /// Smallest-unit minimum output (swaps)
    #[serde(default)]
    pub min_amount_out: Option<String>,
    /// Swap recipient; defaults to the signing account
    #[serde(default)]
    pub recipient: Option<String>,
    #[serde(default = "default_repeat")]
    pub repeat: u32,
    pub gas_limit: u64,
    pub schedule: Vec<WindowEntry>,
}

fn default_repeat() -> u32 { 1 }

/// Native currency decimals (INJ)
pub const NATIVE_DECIMALS: u8 = 18;

impl ScheduleFile {
    /// Load the table from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read schedule file: {}", path.as_ref().display()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let file: Self = toml::from_str(content).context("Failed to parse schedule TOML")?;
        Ok(file)
    }

    /// Run settings, with environment overrides applied by the caller
    pub fn bot_config(&self, test_mode: bool) -> DispatchResult<BotConfig> {
        Ok(BotConfig {
            rpc_url: self.network.rpc_url.clone(),
            chain_id: self.network.chain_id,
            gas_price_wei: u128::from(self.network.gas_price_wei),
            receipt_timeout_secs: self.network.receipt_timeout_secs,
            state_file: PathBuf::from(&self.dispatch.state_file),
            default_slots: self.dispatch.default_slots.clone(),
            repeat_pause_ms: self.dispatch.repeat_pause_ms,
            swap_deadline_secs: self.dispatch.swap_deadline_secs,
            swap_trailer: SwapTrailer {
                trailing_word_1: parse_word("trailing_word_1", &self.swap.trailing_word_1)?,
                trailing_word_2: parse_word("trailing_word_2", &self.swap.trailing_word_2)?,
            },
            test_mode,
        })
    }

    /// Resolve and validate every template. `sender` is the default swap recipient.
    ///
    /// A malformed amount or selector drops only that template (logged);
    /// structural problems such as unknown tokens or empty schedules reject
    /// the whole table.
    pub fn resolve_templates(&self, sender: Address) -> DispatchResult<Vec<TransactionTemplate>> {
        let mut tokens: HashMap<String, TokenInfo> = HashMap::new();
        for t in &self.tokens {
            let info = TokenInfo {
                symbol: t.symbol.clone(),
                address: parse_address(&format!("token {}", t.symbol), &t.address)?,
                decimals: t.decimals,
            };
            tokens.insert(t.symbol.to_uppercase(), info);
        }

        if self.templates.is_empty() {
            return Err(DispatchError::Configuration("no templates defined".into()));
        }

        let mut resolved = Vec::with_capacity(self.templates.len());
        for entry in &self.templates {
            match resolve_template(entry, &tokens, sender) {
                Ok(template) => resolved.push(template),
                Err(e @ (DispatchError::InvalidAmount { .. } | DispatchError::Encoding(_))) => {
                    error!("Template \"{}\" disabled: {}", entry.name, e);
                }
                Err(e) => return Err(e),
            }
        }

        if resolved.is_empty() {
            return Err(DispatchError::Configuration("no usable templates".into()));
        }
        Ok(resolved)
    }
}

fn config_err(template: &str, msg: impl std::fmt::Display) -> DispatchError {
    DispatchError::Configuration(format!("template \"{}\": {}", template, msg))
}

fn parse_address(what: &str, raw: &str) -> DispatchResult<Address> {
    Address::from_str(raw.trim())
        .map_err(|e| DispatchError::Configuration(format!("{}: invalid address '{}': {}", what, raw, e)))
}

fn parse_word(what: &str, raw: &str) -> DispatchResult<B256> {
    B256::from_str(raw.trim())
        .map_err(|e| DispatchError::Configuration(format!("{}: expected 32-byte hex '{}': {}", what, raw, e)))
}

fn parse_selector(template: &str, raw: &str) -> DispatchResult<[u8; 4]> {
    let bytes = alloy::hex::decode(raw.trim()).map_err(|e| {
        DispatchError::Encoding(format!("template \"{}\": selector '{}': {}", template, raw, e))
    })?;
    bytes.as_slice().try_into().map_err(|_| {
        DispatchError::Encoding(format!("template \"{}\": selector '{}' is not 4 bytes", template, raw))
    })
}

fn lookup_token(
    template: &str,
    tokens: &HashMap<String, TokenInfo>,
    symbol: Option<&String>,
    field: &str,
) -> DispatchResult<TokenInfo> {
    let symbol = symbol.ok_or_else(|| config_err(template, format!("missing {}", field)))?;
    tokens
        .get(&symbol.to_uppercase())
        .cloned()
        .ok_or_else(|| config_err(template, format!("{} references unknown token '{}'", field, symbol)))
}

fn required_amount(entry: &TemplateEntry) -> DispatchResult<&str> {
    entry
        .amount
        .as_deref()
        .ok_or_else(|| config_err(&entry.name, "missing amount"))
}

/// Decimals for stake/wrap/unstake amounts: `amount_token` if set, else native
fn native_decimals(entry: &TemplateEntry, tokens: &HashMap<String, TokenInfo>) -> DispatchResult<u8> {
    match &entry.amount_token {
        Some(_) => Ok(lookup_token(&entry.name, tokens, entry.amount_token.as_ref(), "amount_token")?.decimals),
        None => Ok(NATIVE_DECIMALS),
    }
}

fn resolve_template(
    entry: &TemplateEntry,
    tokens: &HashMap<String, TokenInfo>,
    sender: Address,
) -> DispatchResult<TransactionTemplate> {
    let name = entry.name.as_str();

    if entry.repeat < 1 {
        return Err(config_err(name, "repeat must be >= 1"));
    }
    if entry.schedule.is_empty() {
        return Err(config_err(name, "at least one schedule window required"));
    }

    let mut schedule = Vec::with_capacity(entry.schedule.len());
    for w in &entry.schedule {
        if w.hour > 23 || w.minute > 59 {
            return Err(config_err(name, format!("window {:02}:{:02} out of range", w.hour, w.minute)));
        }
        if entry.kind == TxKind::SwapBToA && w.source_slot.is_none() {
            return Err(config_err(
                name,
                format!("window {:02}:{:02} needs a source_slot", w.hour, w.minute),
            ));
        }
        schedule.push(ScheduleWindow {
            hour: w.hour,
            minute: w.minute,
            source_slot: w.source_slot.clone(),
        });
    }

    let payload = match entry.kind {
        TxKind::Stake | TxKind::Wrap => TemplatePayload::NativeValue(to_smallest_unit(
            required_amount(entry)?,
            native_decimals(entry, tokens)?,
        )?),
        TxKind::Unstake => TemplatePayload::Argument(to_smallest_unit(
            required_amount(entry)?,
            native_decimals(entry, tokens)?,
        )?),
        TxKind::SwapAToB | TxKind::SwapBToA => {
            let token_in = lookup_token(name, tokens, entry.token_in.as_ref(), "token_in")?;
            let token_out = lookup_token(name, tokens, entry.token_out.as_ref(), "token_out")?;
            let input = if entry.kind == TxKind::SwapAToB {
                SwapInput::Fixed(to_smallest_unit(required_amount(entry)?, token_in.decimals)?)
            } else {
                SwapInput::Chained
            };
            // Already in smallest units
            let min_amount_out = to_smallest_unit(entry.min_amount_out.as_deref().unwrap_or("1"), 0)?;
            let recipient = match &entry.recipient {
                Some(raw) => parse_address(&format!("template {} recipient", name), raw)?,
                None => sender,
            };
            TemplatePayload::Swap(SwapLeg {
                token_in,
                token_out,
                input,
                min_amount_out,
                recipient,
            })
        }
    };

    Ok(TransactionTemplate {
        name: entry.name.clone(),
        kind: entry.kind,
        target_contract: parse_address(&format!("template {} contract", name), &entry.contract)?,
        method_selector: parse_selector(name, &entry.selector)?,
        payload,
        repeat_count: entry.repeat,
        gas_limit: entry.gas_limit,
        schedule,
    })
}

/// Signing key from the environment. Missing key is fatal before any work.
pub fn load_private_key() -> DispatchResult<String> {
    match std::env::var(PRIVATE_KEY_ENV) {
        Ok(k) if !k.trim().is_empty() => Ok(k),
        _ => Err(DispatchError::Configuration(format!("{} is not set", PRIVATE_KEY_ENV))),
    }
}

/// Apply RPC_URL / CHAIN_ID / GAS_PRICE_WEI / STATE_FILE overrides
pub fn apply_env_overrides(config: &mut BotConfig) -> Result<()> {
    if let Ok(url) = std::env::var("RPC_URL") {
        config.rpc_url = url;
    }
    if let Ok(id) = std::env::var("CHAIN_ID") {
        config.chain_id = id.parse().context("CHAIN_ID must be an integer")?;
    }
    if let Ok(price) = std::env::var("GAS_PRICE_WEI") {
        config.gas_price_wei = price.parse().context("GAS_PRICE_WEI must be an integer")?;
    }
    if let Ok(path) = std::env::var("STATE_FILE") {
        config.state_file = PathBuf::from(path);
    }
    Ok(())
}
