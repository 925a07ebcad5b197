// Minimal Solidity ABI codec for the escrow contract's static types

use sha3::{Digest, Keccak256};
use thiserror::Error;

use super::types::{Address, GameHash};

/// Selector of the standard `Error(string)` revert payload
const ERROR_STRING_SELECTOR: [u8; 4] = [0x08, 0xc3, 0x79, 0xa0];

pub type Word = [u8; 32];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AbiError {
    #[error("return data is {0} bytes, not a multiple of 32")]
    Misaligned(usize),
    #[error("expected at least {expected} words, got {actual}")]
    TooShort { expected: usize, actual: usize },
    #[error("word does not fit in {0} bits")]
    Overflow(u32),
    #[error("invalid {0} encoding")]
    Invalid(&'static str),
}

pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// First four bytes of the keccak-256 of a function signature
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// Topic 0 of an event log
pub fn event_topic(signature: &str) -> Word {
    keccak256(signature.as_bytes())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Address(Address),
    Uint(u128),
    FixedBytes(GameHash),
}

impl Token {
    fn to_word(&self) -> Word {
        let mut word = [0u8; 32];
        match self {
            Token::Address(a) => word[12..].copy_from_slice(&a.0),
            Token::Uint(v) => word[16..].copy_from_slice(&v.to_be_bytes()),
            Token::FixedBytes(h) => word.copy_from_slice(&h.0),
        }
        word
    }
}

/// Calldata for a function taking only static arguments
pub fn encode_call(signature: &str, args: &[Token]) -> Vec<u8> {
    let mut data = Vec::with_capacity(4 + 32 * args.len());
    data.extend_from_slice(&selector(signature));
    for arg in args {
        data.extend_from_slice(&arg.to_word());
    }
    data
}

pub fn split_words(data: &[u8]) -> Result<Vec<Word>, AbiError> {
    if data.len() % 32 != 0 {
        return Err(AbiError::Misaligned(data.len()));
    }
    Ok(data
        .chunks_exact(32)
        .map(|chunk| {
            let mut word = [0u8; 32];
            word.copy_from_slice(chunk);
            word
        })
        .collect())
}

pub fn expect_words(data: &[u8], expected: usize) -> Result<Vec<Word>, AbiError> {
    let words = split_words(data)?;
    if words.len() < expected {
        return Err(AbiError::TooShort {
            expected,
            actual: words.len(),
        });
    }
    Ok(words)
}

pub fn decode_address(word: &Word) -> Result<Address, AbiError> {
    if word[..12].iter().any(|b| *b != 0) {
        return Err(AbiError::Invalid("address"));
    }
    let mut out = [0u8; 20];
    out.copy_from_slice(&word[12..]);
    Ok(Address(out))
}

pub fn decode_u128(word: &Word) -> Result<u128, AbiError> {
    if word[..16].iter().any(|b| *b != 0) {
        return Err(AbiError::Overflow(128));
    }
    let mut out = [0u8; 16];
    out.copy_from_slice(&word[16..]);
    Ok(u128::from_be_bytes(out))
}

pub fn decode_u64(word: &Word) -> Result<u64, AbiError> {
    let value = decode_u128(word)?;
    u64::try_from(value).map_err(|_| AbiError::Overflow(64))
}

pub fn decode_bool(word: &Word) -> Result<bool, AbiError> {
    if word[..31].iter().any(|b| *b != 0) || word[31] > 1 {
        return Err(AbiError::Invalid("bool"));
    }
    Ok(word[31] == 1)
}

/// Extract the message from an `Error(string)` revert payload
pub fn decode_revert_reason(data: &[u8]) -> Option<String> {
    let body = data.strip_prefix(&ERROR_STRING_SELECTOR[..])?;
    let words = split_words(body.get(..body.len() - body.len() % 32)?).ok()?;
    let offset = usize::try_from(decode_u64(words.first()?).ok()?).ok()?;
    let start = offset.checked_add(32)?;
    let len_word = body.get(offset..start)?;
    let mut len_buf = [0u8; 32];
    len_buf.copy_from_slice(len_word);
    let len = usize::try_from(decode_u64(&len_buf).ok()?).ok()?;
    let bytes = body.get(start..start.checked_add(len)?)?;
    String::from_utf8(bytes.to_vec()).ok()
}
