//! `com_interface!` - one declaration, both directions
//!
//! ```ignore
//! com_interface! {
//!     /// Reads and writes a single value
//!     pub interface IValue("2c3f9903-b586-46b1-881b-adfce9af47b1") {
//!         [3] fn get(&self) -> i32;
//!         [4] fn set(&self, value: i32);
//!     }
//! }
//! ```
//!
//! expands to:
//! - `trait IValue: Send + Sync`, every method returning `vtbridge::Result`
//! - `impl ComInterface for dyn IValue` (id, name, slot count, static vtable
//!   of trampolines for local implementations)
//! - `impl IValue for ComObject`, calling through the foreign vtable
//!
//! Methods with a return type use the foreign convention of a trailing
//! output pointer; the status is the real return value. Argument and return
//! types must be FFI-safe.
//!
//! A slot written `[5, preserve_sig]` keeps the raw status instead: the
//! method returns `HResult` on both sides and success codes such as
//! `S_FALSE` reach the caller unchanged. Such methods take no return type.

/// Slot count for a table whose method slots are `slots`
///
/// # Panics
/// At compile time, when a slot overlaps the base triplet or repeats.
#[doc(hidden)]
pub const fn vtable_len(slots: &[usize]) -> usize {
    let mut len = crate::abi::BASE_SLOT_COUNT;
    let mut i = 0;
    while i < slots.len() {
        assert!(
            slots[i] >= crate::abi::BASE_SLOT_COUNT,
            "method slots start after the base triplet"
        );
        let mut j = i + 1;
        while j < slots.len() {
            assert!(slots[i] != slots[j], "duplicate method slot");
            j += 1;
        }
        if slots[i] + 1 > len {
            len = slots[i] + 1;
        }
        i += 1;
    }
    len
}

#[macro_export]
macro_rules! com_interface {
    (
        $(#[$meta:meta])*
        $vis:vis interface $name:ident($iid:literal) {
            $(
                $(#[$method_meta:meta])*
                [$slot:literal $(, $flag:ident)?] fn $method:ident(&self $(, $arg:ident : $ty:ty)* $(,)?) $(-> $ret:ty)?;
            )*
        }
    ) => {
        $(#[$meta])*
        $vis trait $name: ::core::marker::Send + ::core::marker::Sync {
            $(
                $crate::__com_trait_fn! {
                    [$($flag)?] $(#[$method_meta])* fn $method(&self $(, $arg: $ty)*) $(-> $ret)?
                }
            )*
        }

        impl $crate::ComInterface for dyn $name {
            const IID: $crate::abi::Guid = $crate::abi::Guid::parse_const($iid);
            const NAME: &'static str = ::core::stringify!($name);
            const VTABLE_LEN: usize = $crate::__private::vtable_len(&[$($slot),*]);

            fn managed_vtable() -> ::core::option::Option<::core::ptr::NonNull<*const ::core::ffi::c_void>> {
                const LEN: usize = <dyn $name as $crate::ComInterface>::VTABLE_LEN;
                static STORAGE: $crate::exposer::VTableStorage<LEN> = $crate::exposer::VTableStorage::new();

                $( $crate::__com_trampoline!([$($flag)?] $name, $method, ($($arg: $ty),*) $(-> $ret)?); )*

                ::core::option::Option::Some(STORAGE.get_or_populate(::core::stringify!($name), |_writer| {
                    $( _writer.set($slot, $method as *const ()); )*
                }))
            }

            fn project(object: &$crate::ComObject) -> &Self {
                object
            }
        }

        impl $name for $crate::ComObject {
            $(
                $crate::__com_forward_fn! {
                    [$($flag)?] $name, $slot, fn $method(&self $(, $arg: $ty)*) $(-> $ret)?
                }
            )*
        }
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __com_ret {
    () => { () };
    ($ret:ty) => { $ret };
}

/// Trait method signature for one slot
#[doc(hidden)]
#[macro_export]
macro_rules! __com_trait_fn {
    ([] $(#[$meta:meta])* fn $method:ident(&self $(, $arg:ident : $ty:ty)*) $(-> $ret:ty)?) => {
        $(#[$meta])*
        fn $method(&self $(, $arg: $ty)*) -> $crate::Result<$crate::__com_ret!($($ret)?)>;
    };
    ([preserve_sig] $(#[$meta:meta])* fn $method:ident(&self $(, $arg:ident : $ty:ty)*)) => {
        $(#[$meta])*
        fn $method(&self $(, $arg: $ty)*) -> $crate::abi::HResult;
    };
}

/// Wrapper-side method calling through the foreign slot
#[doc(hidden)]
#[macro_export]
macro_rules! __com_forward_fn {
    ([] $name:ident, $slot:literal, fn $method:ident(&self $(, $arg:ident : $ty:ty)*) $(-> $ret:ty)?) => {
        fn $method(&self $(, $arg: $ty)*) -> $crate::Result<$crate::__com_ret!($($ret)?)> {
            $crate::__com_call!(self, $name, $slot, ($($arg: $ty),*) $(-> $ret)?)
        }
    };
    ([preserve_sig] $name:ident, $slot:literal, fn $method:ident(&self $(, $arg:ident : $ty:ty)*)) => {
        fn $method(&self $(, $arg: $ty)*) -> $crate::abi::HResult {
            let info = match $crate::ComObject::vtable::<dyn $name>(self) {
                ::core::result::Result::Ok(info) => info,
                ::core::result::Result::Err(err) => return err.status(),
            };
            let method: unsafe extern "system" fn(*mut ::core::ffi::c_void $(, $ty)*) -> $crate::abi::HResult =
                match unsafe { info.method($slot) } {
                    ::core::result::Result::Ok(method) => method,
                    ::core::result::Result::Err(err) => return err.status(),
                };
            unsafe { method(info.this().as_raw() $(, $arg)*) }
        }
    };
}

/// Foreign-callable entry point forwarding to the local implementation
#[doc(hidden)]
#[macro_export]
macro_rules! __com_trampoline {
    ([preserve_sig] $name:ident, $method:ident, ($($arg:ident : $ty:ty),*)) => {
        extern "system" fn $method(this: *mut ::core::ffi::c_void $(, $arg: $ty)*) -> $crate::abi::HResult {
            $crate::exposer::with_target_status::<dyn $name, _>(this, |target| target.$method($($arg),*))
        }
    };
    ([] $name:ident, $method:ident, ($($arg:ident : $ty:ty),*)) => {
        extern "system" fn $method(this: *mut ::core::ffi::c_void $(, $arg: $ty)*) -> $crate::abi::HResult {
            $crate::exposer::with_target::<dyn $name, _>(this, |target| target.$method($($arg),*))
        }
    };
    ([] $name:ident, $method:ident, ($($arg:ident : $ty:ty),*) -> $ret:ty) => {
        extern "system" fn $method(
            this: *mut ::core::ffi::c_void
            $(, $arg: $ty)*,
            out: *mut $ret,
        ) -> $crate::abi::HResult {
            if out.is_null() {
                return $crate::abi::HResult::E_POINTER;
            }
            $crate::exposer::with_target::<dyn $name, _>(this, |target| {
                let value = target.$method($($arg),*)?;
                unsafe { out.write(value) };
                ::core::result::Result::Ok(())
            })
        }
    };
}

/// Call-through from a wrapper into the foreign vtable slot
#[doc(hidden)]
#[macro_export]
macro_rules! __com_call {
    ($this:expr, $name:ident, $slot:literal, ($($arg:ident : $ty:ty),*)) => {{
        let info = $crate::ComObject::vtable::<dyn $name>($this)?;
        let method: unsafe extern "system" fn(*mut ::core::ffi::c_void $(, $ty)*) -> $crate::abi::HResult =
            unsafe { info.method($slot)? };
        let status = unsafe { method(info.this().as_raw() $(, $arg)*) };
        $crate::abi::check(status)
    }};
    ($this:expr, $name:ident, $slot:literal, ($($arg:ident : $ty:ty),*) -> $ret:ty) => {{
        let info = $crate::ComObject::vtable::<dyn $name>($this)?;
        let method: unsafe extern "system" fn(*mut ::core::ffi::c_void $(, $ty)*, *mut $ret) -> $crate::abi::HResult =
            unsafe { info.method($slot)? };
        let mut out = ::core::mem::MaybeUninit::<$ret>::uninit();
        let status = unsafe { method(info.this().as_raw() $(, $arg)*, out.as_mut_ptr()) };
        $crate::abi::check(status)?;
        ::core::result::Result::Ok(unsafe { out.assume_init() })
    }};
}
