// Primitive chain types: addresses, hashes and native-currency amounts

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use super::abi::keccak256;

/// Decimal places of the chain's native currency (wei per ether = 10^18)
pub const ETHER_DECIMALS: u32 = 18;
const WEI_PER_ETHER: u128 = 1_000_000_000_000_000_000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AmountError {
    #[error("amount is empty")]
    Empty,
    #[error("amount must be a positive decimal number, got '{0}'")]
    Invalid(String),
    #[error("amount has more than 18 decimal places")]
    TooPrecise,
    #[error("amount is too large")]
    Overflow,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseHexError {
    #[error("expected {expected} bytes of hex, got '{input}'")]
    Length { expected: usize, input: String },
    #[error("invalid hex '{0}'")]
    Hex(String),
}

fn strip_0x(s: &str) -> &str {
    s.strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s)
}

fn decode_fixed<const N: usize>(s: &str) -> Result<[u8; N], ParseHexError> {
    let raw = strip_0x(s.trim());
    if raw.len() != N * 2 {
        return Err(ParseHexError::Length {
            expected: N,
            input: s.to_string(),
        });
    }
    let mut out = [0u8; N];
    hex::decode_to_slice(raw, &mut out).map_err(|_| ParseHexError::Hex(s.to_string()))?;
    Ok(out)
}

/// 20-byte account or contract address.
///
/// Equality is byte-wise, so `0xAbC…` and `0xabc…` name the same account.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address(pub [u8; 20]);

impl Address {
    pub const ZERO: Address = Address([0u8; 20]);

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }

    /// EIP-55 mixed-case checksum encoding
    pub fn to_checksum(&self) -> String {
        let lower = hex::encode(self.0);
        let hash = keccak256(lower.as_bytes());
        let mut out = String::with_capacity(42);
        out.push_str("0x");
        for (i, c) in lower.chars().enumerate() {
            let nibble = (hash[i / 2] >> (if i % 2 == 0 { 4 } else { 0 })) & 0x0f;
            if c.is_ascii_alphabetic() && nibble >= 8 {
                out.push(c.to_ascii_uppercase());
            } else {
                out.push(c);
            }
        }
        out
    }

    /// Lowercase `0x`-prefixed form, as JSON-RPC expects it
    pub fn to_rpc(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl FromStr for Address {
    type Err = ParseHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_fixed::<20>(s).map(Address)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_checksum())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_rpc())
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_checksum())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Opaque 32-byte game result identifier supplied by the wager creator
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct GameHash(pub [u8; 32]);

impl GameHash {
    /// Build the on-chain `bytes32` from user input.
    ///
    /// - `0x` followed by 64 hex digits is taken verbatim
    /// - up to 32 UTF-8 bytes are right-padded with zeros
    /// - anything longer is keccak-256 hashed
    pub fn from_input(input: &str) -> Option<GameHash> {
        let input = input.trim();
        if input.is_empty() {
            return None;
        }
        let raw = strip_0x(input);
        if raw.len() == 64 && raw.len() != input.len() {
            if let Ok(bytes) = decode_fixed::<32>(input) {
                return Some(GameHash(bytes));
            }
        }
        let bytes = input.as_bytes();
        if bytes.len() <= 32 {
            let mut out = [0u8; 32];
            out[..bytes.len()].copy_from_slice(bytes);
            Some(GameHash(out))
        } else {
            Some(GameHash(keccak256(bytes)))
        }
    }
}

impl fmt::Display for GameHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for GameHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GameHash({})", self)
    }
}

impl Serialize for GameHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Transaction hash returned by the node
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TxHash(pub [u8; 32]);

impl FromStr for TxHash {
    type Err = ParseHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_fixed::<32>(s).map(TxHash)
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxHash({})", self)
    }
}

impl Serialize for TxHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TxHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Native-currency amount in base units (wei).
///
/// This is the only place decimal ether and base units are converted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Wei(pub u128);

impl Wei {
    pub const ZERO: Wei = Wei(0);

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Parse a decimal ether string such as `"0.1"` or `"12"`
    pub fn from_ether_str(input: &str) -> Result<Wei, AmountError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(AmountError::Empty);
        }
        let (whole, frac) = match input.split_once('.') {
            Some((w, f)) => (w, f),
            None => (input, ""),
        };
        if (whole.is_empty() && frac.is_empty())
            || !whole.chars().all(|c| c.is_ascii_digit())
            || !frac.chars().all(|c| c.is_ascii_digit())
        {
            return Err(AmountError::Invalid(input.to_string()));
        }
        let frac = frac.trim_end_matches('0');
        if frac.len() > ETHER_DECIMALS as usize {
            return Err(AmountError::TooPrecise);
        }

        let whole_wei = if whole.is_empty() {
            0u128
        } else {
            whole
                .parse::<u128>()
                .map_err(|_| AmountError::Overflow)?
                .checked_mul(WEI_PER_ETHER)
                .ok_or(AmountError::Overflow)?
        };
        let frac_wei = if frac.is_empty() {
            0u128
        } else {
            let scale = 10u128.pow(ETHER_DECIMALS - frac.len() as u32);
            frac.parse::<u128>().map_err(|_| AmountError::Overflow)? * scale
        };

        whole_wei
            .checked_add(frac_wei)
            .map(Wei)
            .ok_or(AmountError::Overflow)
    }

    /// Exact decimal ether string without trailing zeros (`"0.1"`, `"2"`)
    pub fn to_ether_string(&self) -> String {
        let whole = self.0 / WEI_PER_ETHER;
        let frac = self.0 % WEI_PER_ETHER;
        if frac == 0 {
            return whole.to_string();
        }
        let frac = format!("{:018}", frac);
        format!("{}.{}", whole, frac.trim_end_matches('0'))
    }

    /// Lossy conversion for display aggregates
    pub fn to_ether_f64(&self) -> f64 {
        let whole = (self.0 / WEI_PER_ETHER) as f64;
        let frac = (self.0 % WEI_PER_ETHER) as f64 / WEI_PER_ETHER as f64;
        whole + frac
    }

    /// `0x`-prefixed hex quantity for JSON-RPC `value` fields
    pub fn to_rpc(&self) -> String {
        format!("{:#x}", self.0)
    }

    pub fn saturating_add(self, other: Wei) -> Wei {
        Wei(self.0.saturating_add(other.0))
    }
}

impl fmt::Display for Wei {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ETH", self.to_ether_string())
    }
}

/// Stake as it arrives over HTTP: a JSON number (`0.1`) or a decimal string (`"0.1"`)
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum EtherAmount {
    Number(serde_json::Number),
    Text(String),
}

impl EtherAmount {
    pub fn to_wei(&self) -> Result<Wei, AmountError> {
        match self {
            EtherAmount::Text(s) => Wei::from_ether_str(s),
            EtherAmount::Number(n) => {
                let text = n.to_string();
                if text.starts_with('-') {
                    return Err(AmountError::Invalid(text));
                }
                if text.contains(['e', 'E']) {
                    let value = n.as_f64().ok_or_else(|| AmountError::Invalid(text.clone()))?;
                    let fixed = format!("{:.18}", value);
                    return Wei::from_ether_str(&fixed);
                }
                Wei::from_ether_str(&text)
            }
        }
    }
}
