//! Error type shared by both interop directions
//!
//! Every variant maps to exactly one status code so that a failure can be
//! handed back across the boundary without losing its meaning.

use crate::abi::HResult;
use crate::registry::RegistrationError;

pub type Result<T, E = InteropError> = std::result::Result<T, E>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InteropError {
    /// A foreign call returned a failure status
    #[error("foreign call failed with {status}")]
    Foreign { status: HResult },

    /// The interface is unregistered or the object declined it
    #[error("interface `{interface}` is not supported by this object")]
    NoInterface { interface: &'static str },

    #[error("null pointer at the interop boundary")]
    NullPointer,

    /// The wrapper already gave its references back
    #[error("foreign object has already been released")]
    Released,

    #[error("vtable slot {slot} is out of range for a table of {len} slots")]
    SlotOutOfRange { slot: usize, len: usize },

    #[error("not supported: {0}")]
    NotSupported(&'static str),

    /// Local failure raised by an exposed method
    #[error("{message} ({status})")]
    Failed { status: HResult, message: String },

    #[error(transparent)]
    Registration(#[from] RegistrationError),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl InteropError {
    /// Local failure carrying an explicit status
    pub fn failed(status: impl Into<HResult>, message: impl Into<String>) -> Self {
        Self::Failed {
            status: status.into(),
            message: message.into(),
        }
    }

    /// Status code reported to foreign callers
    pub fn status(&self) -> HResult {
        match self {
            Self::Foreign { status } => *status,
            Self::NoInterface { .. } => HResult::E_NOINTERFACE,
            Self::NullPointer => HResult::E_POINTER,
            Self::Released => HResult::RPC_E_DISCONNECTED,
            Self::SlotOutOfRange { .. } => HResult::E_BOUNDS,
            Self::NotSupported(_) => HResult::E_NOTIMPL,
            Self::Failed { status, .. } if status.is_err() => *status,
            Self::Failed { .. } => HResult::E_FAIL,
            Self::Registration(_) | Self::Config(_) => HResult::E_INVALIDARG,
        }
    }

    /// True when the error means "this object does not implement that"
    pub fn is_no_interface(&self) -> bool {
        self.status() == HResult::E_NOINTERFACE
    }
}

impl From<HResult> for InteropError {
    fn from(status: HResult) -> Self {
        Self::Foreign { status }
    }
}
