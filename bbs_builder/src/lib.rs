use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub mod codec;

#[derive(Debug, PartialEq, Eq, Clone, Error)]
pub enum CodecError {
    #[error("Incomplete data")]
    IncompleteData,

    #[error("Field data is not ASCII")]
    NotAscii,

    #[error("Value too long for field: max {max}, got {len}")]
    TooLong { max: usize, len: usize },

    #[error("Expected a decimal number, got {0:?}")]
    NotNumeric(String),

    #[error("Number does not fit in a field of {0} digits")]
    Overflow(usize),

    #[error("Unknown token: {0:?}")]
    UnknownToken(Vec<u8>),

    #[error("Unknown message type: 0x{0:02x}")]
    UnknownMessageType(u8),

    #[error("Expected constant {expected:?}, got {found:?}")]
    ConstantMismatch { expected: Vec<u8>, found: Vec<u8> },

    #[error("Missing field delimiter")]
    MissingDelimiter,

    #[error("Trailing data after a delimited field")]
    TrailingData,

    #[error("Invalid timestamp: {0}")]
    BadTimestamp(String),
}

pub type CodecResult<T> = ::std::result::Result<T, CodecError>;

/// Trait for concrete message types.
///
/// Every message on the wire starts with a one byte type discriminator. The
/// constant is written in front of the encoded fields and validated when
/// decoding.
pub trait BbsMessage {
    const MSG_TYPE: u8;
}

/// Serializes/deserializes a complete message.
///
/// The trait wraps [codec::Encoding] for the canonical codec of a type and
/// is blanket-implemented for everything the derive macros touch.
pub trait BbsSerialize
where
    Self: Sized,
{
    fn to_bytes(&self) -> CodecResult<Vec<u8>>;
    fn from_bytes(bytes: &[u8]) -> CodecResult<Self>;
}

impl<T> BbsSerialize for T
where
    codec::Default: codec::Encoding<T>,
{
    fn to_bytes(&self) -> CodecResult<Vec<u8>> {
        <codec::Default as codec::Encoding<T>>::encode(self)
    }

    fn from_bytes(bytes: &[u8]) -> CodecResult<Self> {
        log::debug!(
            "decoding {} from {} bytes",
            std::any::type_name::<Self>(),
            bytes.len()
        );
        Ok(<codec::Default as codec::Encoding<T>>::decode(bytes)?.0)
    }
}

/// A monetary amount in 1/10_000ths of a currency unit.
///
/// The wire format is an 11 digit zero padded decimal of the raw value, so
/// decoding and re-encoding a well-formed field is the identity.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Price(u64);

impl Price {
    pub const ZERO: Price = Price(0);

    /// 1/10_000ths of a currency unit.
    pub const fn from_raw(raw: u64) -> Self {
        Price(raw)
    }

    /// Whole currency units.
    pub const fn from_major(units: u64) -> Self {
        Price(units * 10_000)
    }

    pub const fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:04}", self.0 / 10_000, self.0 % 10_000)
    }
}

impl FromStr for Price {
    type Err = CodecError;

    /// Parses a decimal amount with at most four fractional digits.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || CodecError::NotNumeric(s.to_string());
        let (units, frac) = match s.split_once('.') {
            None => (s, ""),
            Some(parts) => parts,
        };
        if frac.len() > 4 || !frac.bytes().all(|b| b.is_ascii_digit()) {
            return Err(bad());
        }
        let units: u64 = units.parse().map_err(|_| bad())?;
        let mut raw = units.checked_mul(10_000).ok_or(CodecError::Overflow(11))?;
        let mut scale = 1_000;
        for digit in frac.bytes() {
            raw += (digit - b'0') as u64 * scale;
            scale /= 10;
        }
        Ok(Price(raw))
    }
}

/// One instruction for a receipt printer.
///
/// Print text from the ITU arrives as a stream of ASCII interleaved with cut
/// control codes; the host receives it as a list of these commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrintCommand {
    Write(String),
    CutPartial,
    CutThrough,
}
