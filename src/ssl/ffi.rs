//! OpenSSL entry points not bound by `openssl-sys`' public surface.

use libc::{c_char, c_int, c_void};
use openssl_sys::SSL_CTX;

/// `pem_password_cb`
pub(crate) type PemPasswordCb =
    unsafe extern "C" fn(buf: *mut c_char, size: c_int, rwflag: c_int, userdata: *mut c_void) -> c_int;

extern "C" {
    pub(crate) fn SSL_CTX_set_default_passwd_cb(ctx: *mut SSL_CTX, cb: Option<PemPasswordCb>);

    pub(crate) fn SSL_CTX_set_default_passwd_cb_userdata(ctx: *mut SSL_CTX, u: *mut c_void);
}
