//! Status codes
//!
//! Zero means success, a set top bit means failure. The bit pattern of a
//! failure is defined by whoever produced it and is carried verbatim.

use crate::error::{InteropError, Result};
use core::fmt;

/// Signed 32-bit status returned by every foreign vtable slot
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HResult(pub i32);

impl HResult {
    pub const S_OK: HResult = HResult(0);
    pub const S_FALSE: HResult = HResult(1);
    pub const E_NOTIMPL: HResult = HResult(0x8000_4001_u32 as i32);
    pub const E_NOINTERFACE: HResult = HResult(0x8000_4002_u32 as i32);
    pub const E_POINTER: HResult = HResult(0x8000_4003_u32 as i32);
    pub const E_FAIL: HResult = HResult(0x8000_4005_u32 as i32);
    pub const E_BOUNDS: HResult = HResult(0x8000_000B_u32 as i32);
    pub const E_UNEXPECTED: HResult = HResult(0x8000_FFFF_u32 as i32);
    pub const E_INVALIDARG: HResult = HResult(0x8007_0057_u32 as i32);
    pub const RPC_E_DISCONNECTED: HResult = HResult(0x8001_0108_u32 as i32);

    #[inline]
    pub const fn from_raw(code: i32) -> Self {
        Self(code)
    }

    #[inline]
    pub const fn code(self) -> i32 {
        self.0
    }

    #[inline]
    pub const fn is_ok(self) -> bool {
        self.0 >= 0
    }

    #[inline]
    pub const fn is_err(self) -> bool {
        self.0 < 0
    }

    /// `Ok(())` for success codes, `InteropError::Foreign` otherwise
    #[inline]
    pub fn ok(self) -> Result<()> {
        if self.is_ok() {
            Ok(())
        } else {
            Err(InteropError::Foreign { status: self })
        }
    }

    /// Symbolic name for the well-known codes
    pub const fn name(self) -> Option<&'static str> {
        Some(match self {
            Self::S_OK => "S_OK",
            Self::S_FALSE => "S_FALSE",
            Self::E_NOTIMPL => "E_NOTIMPL",
            Self::E_NOINTERFACE => "E_NOINTERFACE",
            Self::E_POINTER => "E_POINTER",
            Self::E_FAIL => "E_FAIL",
            Self::E_BOUNDS => "E_BOUNDS",
            Self::E_UNEXPECTED => "E_UNEXPECTED",
            Self::E_INVALIDARG => "E_INVALIDARG",
            Self::RPC_E_DISCONNECTED => "RPC_E_DISCONNECTED",
            _ => return None,
        })
    }
}

impl fmt::Display for HResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{} (0x{:08X})", name, self.0 as u32),
            None => write!(f, "0x{:08X}", self.0 as u32),
        }
    }
}

impl fmt::Debug for HResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HResult({})", self)
    }
}

impl From<i32> for HResult {
    #[inline]
    fn from(code: i32) -> Self {
        Self(code)
    }
}

impl From<HResult> for i32 {
    #[inline]
    fn from(status: HResult) -> Self {
        status.0
    }
}
