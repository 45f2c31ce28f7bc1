//! Calldata Encoder
//!
//! Builds the exact data payload for each transaction kind.
//! Three shapes:
//!   selector-only            Stake, Wrap (amount travels in the value field)
//!   selector + uint256       Unstake
//!   selector + 8 words       Swap (either direction)
//!
//! Swap layout, every word 32 bytes, addresses and integers left-zero-padded:
//!   [0] token in   [1] token out   [2] amount in   [3] recipient
//!   [4] deadline   [5] min amount out
//!   [6] trailing word 1   [7] trailing word 2   (opaque, from configuration)
//!
//! The router at the target address is not a standard V2 router ABI; this layout
//! was lifted from a known-good transaction and must stay byte-exact.
//!
//! Author: AI-Generated
//! Created: 2026-10-14

use crate::client::RawTxFields;
use crate::error::{DispatchError, DispatchResult};
use crate::types::{SwapInput, SwapTrailer, TemplatePayload, TransactionTemplate};
use alloy::primitives::{Address, Bytes, U256};

/// EVM word size
pub const WORD_LEN: usize = 32;

/// Number of words after the selector in the swap layout
pub const SWAP_WORDS: usize = 8;

/// Left-pad a 20-byte address into a 32-byte word
pub fn address_word(address: &[u8]) -> DispatchResult<[u8; WORD_LEN]> {
    if address.len() != 20 {
        return Err(DispatchError::Encoding(format!(
            "address must be 20 bytes, got {}",
            address.len()
        )));
    }
    let mut word = [0u8; WORD_LEN];
    word[12..].copy_from_slice(address);
    Ok(word)
}

/// Big-endian, left-zero-padded unsigned integer word
pub fn uint_word(value: U256) -> [u8; WORD_LEN] {
    value.to_be_bytes::<WORD_LEN>()
}

/// Selector-only calldata
pub fn encode_selector_only(selector: [u8; 4]) -> Bytes {
    Bytes::copy_from_slice(&selector)
}

/// Selector followed by a single uint256 argument
pub fn encode_single_amount(selector: [u8; 4], amount: U256) -> Bytes {
    let mut data = Vec::with_capacity(4 + WORD_LEN);
    data.extend_from_slice(&selector);
    data.extend_from_slice(&uint_word(amount));
    data.into()
}

/// Dynamic parameters of one swap submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapParams {
    pub token_in: Address,
    pub token_out: Address,
    pub amount_in: U256,
    pub recipient: Address,
    /// Unix seconds
    pub deadline: u64,
    pub min_amount_out: U256,
}

/// Fixed multi-field swap layout (see module docs)
pub fn encode_swap(
    selector: [u8; 4],
    params: &SwapParams,
    trailer: &SwapTrailer,
) -> DispatchResult<Bytes> {
    let mut data = Vec::with_capacity(4 + SWAP_WORDS * WORD_LEN);
    data.extend_from_slice(&selector);
    data.extend_from_slice(&address_word(params.token_in.as_slice())?);
    data.extend_from_slice(&address_word(params.token_out.as_slice())?);
    data.extend_from_slice(&uint_word(params.amount_in));
    data.extend_from_slice(&address_word(params.recipient.as_slice())?);
    data.extend_from_slice(&uint_word(U256::from(params.deadline)));
    data.extend_from_slice(&uint_word(params.min_amount_out));
    data.extend_from_slice(trailer.trailing_word_1.as_slice());
    data.extend_from_slice(trailer.trailing_word_2.as_slice());
    Ok(data.into())
}

/// Build the raw transaction fields for one submission of `template`.
///
/// `chained_amount` supplies the input of a `SwapInput::Chained` swap and is
/// ignored otherwise. `now_unix` feeds the swap deadline.
pub fn build_request(
    template: &TransactionTemplate,
    chained_amount: Option<U256>,
    now_unix: u64,
    deadline_secs: u64,
    trailer: &SwapTrailer,
) -> DispatchResult<RawTxFields> {
    let (value, data) = match &template.payload {
        TemplatePayload::NativeValue(amount) => {
            (*amount, encode_selector_only(template.method_selector))
        }
        TemplatePayload::Argument(amount) => (
            U256::ZERO,
            encode_single_amount(template.method_selector, *amount),
        ),
        TemplatePayload::Swap(leg) => {
            let amount_in = match leg.input {
                SwapInput::Fixed(amount) => amount,
                SwapInput::Chained => chained_amount.ok_or_else(|| {
                    DispatchError::Encoding(format!(
                        "{}: chained swap built without an input amount",
                        template.name
                    ))
                })?,
            };
            let params = SwapParams {
                token_in: leg.token_in.address,
                token_out: leg.token_out.address,
                amount_in,
                recipient: leg.recipient,
                deadline: now_unix.saturating_add(deadline_secs),
                min_amount_out: leg.min_amount_out,
            };
            (
                U256::ZERO,
                encode_swap(template.method_selector, &params, trailer)?,
            )
        }
    };

    Ok(RawTxFields {
        to: template.target_contract,
        value,
        data,
        gas_limit: template.gas_limit,
    })
}
