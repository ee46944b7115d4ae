//! Interface identifiers
//!
//! A `Guid` has the classic `{data1, data2, data3, data4}` layout so a
//! pointer to it can be handed straight to a foreign `QueryInterface`.

use core::fmt;
use core::str::FromStr;

/// 128-bit interface id, ABI-compatible with the foreign `GUID` struct
#[repr(C)]
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Guid {
    pub data1: u32,
    pub data2: u16,
    pub data3: u16,
    pub data4: [u8; 8],
}

/// `00000000-0000-0000-C000-000000000046`
pub const IID_IUNKNOWN: Guid = Guid::from_u128(0x00000000_0000_0000_c000_000000000046);

/// Reasons a textual GUID was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum GuidParseError {
    #[error("GUID must be 36 characters (38 with braces), got {0}")]
    Length(usize),
    #[error("expected '-' at offset {0}")]
    Separator(usize),
    #[error("invalid hex digit at offset {0}")]
    Digit(usize),
}

impl Guid {
    pub const ZERO: Guid = Guid::from_u128(0);

    /// Build from the big-endian value of the textual form
    #[inline]
    pub const fn from_u128(value: u128) -> Self {
        Self {
            data1: (value >> 96) as u32,
            data2: (value >> 80) as u16,
            data3: (value >> 64) as u16,
            data4: (value as u64).to_be_bytes(),
        }
    }

    #[inline]
    pub const fn to_u128(self) -> u128 {
        ((self.data1 as u128) << 96)
            | ((self.data2 as u128) << 80)
            | ((self.data3 as u128) << 64)
            | (u64::from_be_bytes(self.data4) as u128)
    }

    /// Parse a GUID literal at compile time
    ///
    /// Intended for `const` items; an invalid literal fails the build.
    pub const fn parse_const(text: &str) -> Self {
        match decode(text.as_bytes()) {
            Ok(value) => Self::from_u128(value),
            Err(_) => panic!("invalid GUID literal"),
        }
    }

    /// Parse `xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx`, optionally braced
    pub fn parse(text: &str) -> Result<Self, GuidParseError> {
        decode(text.as_bytes()).map(Self::from_u128)
    }
}

const fn hex_value(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

const fn decode(bytes: &[u8]) -> Result<u128, GuidParseError> {
    let (start, end) = if bytes.len() == 38 && bytes[0] == b'{' && bytes[37] == b'}' {
        (1, 37)
    } else if bytes.len() == 36 {
        (0, 36)
    } else {
        return Err(GuidParseError::Length(bytes.len()));
    };

    let mut value: u128 = 0;
    let mut i = start;
    while i < end {
        let c = bytes[i];
        let pos = i - start;
        if pos == 8 || pos == 13 || pos == 18 || pos == 23 {
            if c != b'-' {
                return Err(GuidParseError::Separator(i));
            }
        } else {
            match hex_value(c) {
                Some(digit) => value = (value << 4) | digit as u128,
                None => return Err(GuidParseError::Digit(i)),
            }
        }
        i += 1;
    }
    Ok(value)
}

impl FromStr for Guid {
    type Err = GuidParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let d = &self.data4;
        write!(
            f,
            "{:08x}-{:04x}-{:04x}-{:02x}{:02x}-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
            self.data1, self.data2, self.data3, d[0], d[1], d[2], d[3], d[4], d[5], d[6], d[7]
        )
    }
}

impl fmt::Debug for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}}}", self)
    }
}

impl From<u128> for Guid {
    #[inline]
    fn from(value: u128) -> Self {
        Self::from_u128(value)
    }
}
