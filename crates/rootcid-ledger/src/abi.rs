//! Minimal Solidity ABI codec for the `Registry` contract.
//!
//! The contract exposes `getRootCID() returns (string)`,
//! `setRootCID(string)` and the event `RootCIDSet(string)`. Only dynamic
//! `string` values need encoding: a 32-byte offset word, a 32-byte length
//! word, then the UTF-8 bytes right-padded to a word boundary.

use thiserror::Error;

/// First four bytes of `keccak256("getRootCID()")`.
pub const GET_ROOT_CID: [u8; 4] = [0xea, 0x37, 0x35, 0x64];

/// First four bytes of `keccak256("setRootCID(string)")`.
pub const SET_ROOT_CID: [u8; 4] = [0x7c, 0x0c, 0xf8, 0x36];

/// `keccak256("RootCIDSet(string)")`, topic 0 of the set event.
pub const ROOT_CID_SET_TOPIC: &str =
    "0x1c7f9a438dcb86da83caafaa2e710334f97c58c69f7eba99fa99ff99b44daf7c";

const WORD: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AbiError {
    #[error("invalid hex: {0}")]
    InvalidHex(String),

    #[error("abi data truncated: need {needed} bytes, have {available}")]
    Truncated { needed: usize, available: usize },

    #[error("abi word does not fit in usize")]
    Overflow,

    #[error("string is not valid UTF-8")]
    InvalidUtf8,
}

/// Calldata for a function without arguments.
pub fn encode_call(selector: [u8; 4]) -> String {
    format!("0x{}", hex::encode(selector))
}

/// Calldata for `setRootCID(value)`.
pub fn encode_set_root_cid(value: &str) -> String {
    let mut data = SET_ROOT_CID.to_vec();
    data.extend(encode_string(value));
    format!("0x{}", hex::encode(data))
}

/// ABI encoding of a single dynamic `string` (offset, length, padded bytes).
pub fn encode_string(value: &str) -> Vec<u8> {
    let bytes = value.as_bytes();
    let padded = bytes.len().div_ceil(WORD) * WORD;
    let mut out = Vec::with_capacity(2 * WORD + padded);
    out.extend(word(WORD as u64));
    out.extend(word(bytes.len() as u64));
    out.extend_from_slice(bytes);
    out.resize(2 * WORD + padded, 0);
    out
}

/// Decode a single ABI-encoded `string` from `0x`-prefixed hex.
pub fn decode_string(data: &str) -> Result<String, AbiError> {
    let bytes = decode_hex(data)?;
    let offset = read_word(&bytes, 0)?;
    let length = read_word(&bytes, offset)?;
    let start = offset.checked_add(WORD).ok_or(AbiError::Overflow)?;
    let end = start.checked_add(length).ok_or(AbiError::Overflow)?;
    if bytes.len() < end {
        return Err(AbiError::Truncated {
            needed: end,
            available: bytes.len(),
        });
    }
    String::from_utf8(bytes[start..end].to_vec()).map_err(|_| AbiError::InvalidUtf8)
}

/// Parse a JSON-RPC hex quantity such as `0x1a`.
pub fn parse_quantity(quantity: &str) -> Result<u64, AbiError> {
    let digits = quantity.trim_start_matches("0x");
    if digits.is_empty() {
        return Ok(0);
    }
    u64::from_str_radix(digits, 16).map_err(|e| AbiError::InvalidHex(e.to_string()))
}

/// Render a JSON-RPC hex quantity.
pub fn quantity(value: u64) -> String {
    format!("0x{value:x}")
}

fn decode_hex(data: &str) -> Result<Vec<u8>, AbiError> {
    let digits = data.strip_prefix("0x").unwrap_or(data);
    hex::decode(digits).map_err(|e| AbiError::InvalidHex(e.to_string()))
}

fn word(value: u64) -> [u8; WORD] {
    let mut out = [0u8; WORD];
    out[WORD - 8..].copy_from_slice(&value.to_be_bytes());
    out
}

fn read_word(bytes: &[u8], at: usize) -> Result<usize, AbiError> {
    let end = at.checked_add(WORD).ok_or(AbiError::Overflow)?;
    if bytes.len() < end {
        return Err(AbiError::Truncated {
            needed: end,
            available: bytes.len(),
        });
    }
    let word = &bytes[at..end];
    if word[..WORD - 8].iter().any(|b| *b != 0) {
        return Err(AbiError::Overflow);
    }
    let mut low = [0u8; 8];
    low.copy_from_slice(&word[WORD - 8..]);
    usize::try_from(u64::from_be_bytes(low)).map_err(|_| AbiError::Overflow)
}
