//! Foreign ABI - binary layouts shared with COM-style callers
//!
//! Design: Everything that crosses the boundary is `#[repr(C)]` or
//! `#[repr(transparent)]`:
//! - `guid.rs` - 128-bit interface ids with the 4/2/2/8 wire layout
//! - `hresult.rs` - signed status codes (0 = success, negative = failure)
//! - `vtable.rs` - the query/retain/release triplet, opaque instance
//!   pointers and a bounds-checked view over a raw slot array

mod guid;
mod hresult;
mod vtable;

pub use guid::{Guid, GuidParseError, IID_IUNKNOWN};
pub use hresult::HResult;
pub use vtable::{
    AddRefFn, ForeignPtr, IUnknownVtbl, QueryInterfaceFn, ReleaseFn, VTable, BASE_SLOT_COUNT,
};

use crate::error::Result;

/// Convert a call-through status into a `Result`
///
/// Negative statuses become `InteropError::Foreign` carrying the code verbatim.
#[inline]
pub fn check(status: HResult) -> Result<()> {
    status.ok()
}
