//! Private-key password callback
//!
//! OpenSSL asks for a passphrase through a plain C function pointer plus one
//! untyped user-data pointer per context. `PasswordHolder` is the owned,
//! typed object that pointer refers to, and `password_trampoline` is the
//! fixed C entry point that turns the raw arguments back into a call on it.

use libc::{c_char, c_int, c_void};
use std::panic::{self, AssertUnwindSafe};
use std::slice;

/// Why the engine needs a password
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordPurpose {
    /// Decrypting existing key material
    ForReading,
    /// Encrypting key material being written out
    ForWriting,
}

impl PasswordPurpose {
    /// Map OpenSSL's `rwflag` (0 = reading, non-zero = writing)
    pub(crate) fn from_rwflag(rwflag: c_int) -> Self {
        if rwflag == 0 {
            PasswordPurpose::ForReading
        } else {
            PasswordPurpose::ForWriting
        }
    }
}

/// Caller-supplied password function: `(max_length, purpose) -> password`
pub type PasswordFn = dyn Fn(usize, PasswordPurpose) -> String + Send + Sync;

/// Heap-allocated callback holder attached to one context
///
/// The owning `Context` keeps this boxed so its address stays stable while
/// the native user-data slot points at it.
pub(crate) struct PasswordHolder {
    callback: Box<PasswordFn>,
}

impl PasswordHolder {
    pub(crate) fn new(callback: Box<PasswordFn>) -> Box<Self> {
        #[cfg(test)]
        counters::allocated();

        Box::new(PasswordHolder { callback })
    }

    /// Swap the function in place; the holder allocation is kept
    pub(crate) fn replace(&mut self, callback: Box<PasswordFn>) {
        self.callback = callback;
    }

    /// Address stored in the engine's user-data slot
    pub(crate) fn as_userdata(&self) -> *mut c_void {
        self as *const PasswordHolder as *mut c_void
    }

    /// Ask the callback for a password and copy it into `buf`
    ///
    /// The password is cut at the first NUL byte and at `buf.len()`.
    /// Returns the number of bytes written; a panicking callback writes
    /// nothing.
    pub(crate) fn fill(&self, buf: &mut [u8], purpose: PasswordPurpose) -> usize {
        let size = buf.len();
        let call = AssertUnwindSafe(|| (self.callback)(size, purpose));
        let password = match panic::catch_unwind(call) {
            Ok(password) => password,
            Err(_) => {
                log::warn!("password callback panicked; reporting no password");
                return 0;
            }
        };
        let bytes = password.as_bytes();
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        let len = end.min(buf.len());
        buf[..len].copy_from_slice(&bytes[..len]);
        len
    }
}

impl Drop for PasswordHolder {
    fn drop(&mut self) {
        #[cfg(test)]
        counters::freed();

        log::trace!("password callback holder released");
    }
}

/// `pem_password_cb` installed on every context
///
/// Returns 0 ("no password") when no holder is attached.
pub(crate) unsafe extern "C" fn password_trampoline(
    buf: *mut c_char,
    size: c_int,
    rwflag: c_int,
    userdata: *mut c_void,
) -> c_int {
    if userdata.is_null() || buf.is_null() || size <= 0 {
        return 0;
    }

    // SAFETY: a non-null userdata is only ever set by `Context` to the
    // address of the `PasswordHolder` it owns, and the slot is cleared before
    // the holder is dropped.
    let holder = unsafe { &*(userdata as *const PasswordHolder) };
    // SAFETY: OpenSSL provides a writable buffer of `size` bytes.
    let buf = unsafe { slice::from_raw_parts_mut(buf as *mut u8, size as usize) };
    let purpose = PasswordPurpose::from_rwflag(rwflag);

    // `fill` contains callback panics; unwinding into OpenSSL is undefined
    // behavior.
    holder.fill(buf, purpose) as c_int
}
