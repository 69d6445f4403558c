//! Owned TLS context
//!
//! `Context` owns one native `SSL_CTX` together with the password-callback
//! holder whose address is stored in that context's user-data slot.

use super::ffi;
use super::init::EngineGuard;
use super::method::Method;
use super::password::{password_trampoline, PasswordHolder, PasswordPurpose};
use super::{Error, Result};
use foreign_types::ForeignTypeRef;
use libc::c_int;
use openssl::dh::Dh;
use openssl::error::ErrorStack;
use openssl::pkey::PKey;
use openssl::rsa::Rsa;
use openssl::ssl::{SslContextBuilder, SslContextRef, SslFiletype, SslOptions, SslVersion};
use std::ffi::CString;
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::ops::BitOr;
use std::path::Path;
use std::ptr;

/// Encoding selector for certificate and key files
///
/// Only `ASN1` and `PEM` are recognized; any other raw value is rejected
/// before the file is touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileFormat(c_int);

impl FileFormat {
    /// DER-encoded ASN.1
    pub const ASN1: FileFormat = FileFormat(openssl_sys::SSL_FILETYPE_ASN1);
    /// PEM
    pub const PEM: FileFormat = FileFormat(openssl_sys::SSL_FILETYPE_PEM);

    /// Wrap a raw `SSL_FILETYPE_*` value; unrecognized values are kept and
    /// rejected when used
    pub fn from_raw(raw: c_int) -> FileFormat {
        FileFormat(raw)
    }

    /// Raw `SSL_FILETYPE_*` value
    pub fn as_raw(&self) -> c_int {
        self.0
    }

    fn encoding(self) -> Result<Encoding> {
        match self.0 {
            openssl_sys::SSL_FILETYPE_ASN1 => Ok(Encoding::Asn1),
            openssl_sys::SSL_FILETYPE_PEM => Ok(Encoding::Pem),
            raw => Err(Error::InvalidFormat(raw)),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Encoding {
    Asn1,
    Pem,
}

impl Encoding {
    fn filetype(self) -> SslFiletype {
        match self {
            Encoding::Asn1 => SslFiletype::ASN1,
            Encoding::Pem => SslFiletype::PEM,
        }
    }
}

/// Peer verification policy; flags combine with `|`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifyMode(c_int);

impl VerifyMode {
    /// Do not verify the peer
    pub const NONE: VerifyMode = VerifyMode(0x00);
    /// Verify the peer's certificate
    pub const PEER: VerifyMode = VerifyMode(0x01);
    /// Fail if the peer presents no certificate (with `PEER`, server side)
    pub const FAIL_IF_NO_PEER_CERT: VerifyMode = VerifyMode(0x02);
    /// Request a client certificate only on the initial handshake
    pub const CLIENT_ONCE: VerifyMode = VerifyMode(0x04);

    /// Raw `SSL_VERIFY_*` bits
    pub fn bits(&self) -> c_int {
        self.0
    }

    /// Whether every flag in `other` is set
    pub fn contains(&self, other: VerifyMode) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for VerifyMode {
    type Output = VerifyMode;

    fn bitor(self, rhs: VerifyMode) -> VerifyMode {
        VerifyMode(self.0 | rhs.0)
    }
}

/// A native TLS context and the callback state attached to it
pub struct Context {
    ctx: SslContextBuilder,
    password: Option<Box<PasswordHolder>>,
    method: Method,
    _engine: EngineGuard,
}

impl Context {
    /// Allocate a context for `method`
    ///
    /// The password trampoline is installed immediately with an empty
    /// user-data slot, so encrypted keys fail to load (rather than prompting
    /// on a terminal) until a callback is registered.
    pub fn new(method: Method) -> Result<Context> {
        let engine = EngineGuard::acquire();
        let (ssl_method, version) = method.resolve()?;
        Context::from_builder(method, version, engine, SslContextBuilder::new(ssl_method))
    }

    /// Finish construction from the engine's allocation result
    fn from_builder(
        method: Method,
        version: Option<SslVersion>,
        engine: EngineGuard,
        builder: std::result::Result<SslContextBuilder, ErrorStack>,
    ) -> Result<Context> {
        let mut ctx = builder.map_err(|source| Error::Create { method, source })?;

        if let Some(version) = version {
            ctx.set_min_proto_version(Some(version))
                .map_err(|source| Error::Create { method, source })?;
            ctx.set_max_proto_version(Some(version))
                .map_err(|source| Error::Create { method, source })?;
        }

        let context = Context {
            ctx,
            password: None,
            method,
            _engine: engine,
        };
        context.install_password_trampoline();

        log::debug!("created SSL context for {}", method);
        Ok(context)
    }

    /// Protocol method the context was created for
    pub fn method(&self) -> Method {
        self.method
    }

    /// Borrow the native context, e.g. to create an `Ssl` for a stream
    pub fn native(&self) -> &SslContextRef {
        // SAFETY: the builder owns a valid SSL_CTX for the lifetime of self.
        unsafe { SslContextRef::from_ptr(self.ctx.as_ptr()) }
    }

    /// Raw `SSL_CTX` pointer, valid while `self` is alive
    pub fn as_ptr(&self) -> *mut openssl_sys::SSL_CTX {
        self.ctx.as_ptr()
    }

    /// Whether a password callback is attached
    pub fn has_password_callback(&self) -> bool {
        self.password.is_some()
    }

    /// Set protocol options; returns the resulting option set
    pub fn set_options(&mut self, options: SslOptions) -> SslOptions {
        log::trace!("{}: set options {:#x}", self.method, options.bits());
        self.ctx.set_options(options)
    }

    /// Set the peer verification policy
    ///
    /// The engine's default chain verification is used; no verify callback
    /// is installed.
    pub fn set_verify_mode(&mut self, mode: VerifyMode) {
        log::trace!("{}: set verify mode {:#x}", self.method, mode.bits());
        // SAFETY: valid context; a null callback selects the default verifier.
        unsafe { openssl_sys::SSL_CTX_set_verify(self.ctx.as_ptr(), mode.bits(), None) };
    }

    /// Load a PEM bundle of trust anchors
    pub fn load_verify_file<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let path = path.as_ref();
        log::trace!("{}: load verify file {}", self.method, path.display());
        self.ctx
            .set_ca_file(path)
            .map_err(|e| Error::load("trust anchors", path, e))
    }

    /// Add a directory of hashed trust-anchor files
    pub fn add_verify_path<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let path = path.as_ref();
        log::trace!("{}: add verify path {}", self.method, path.display());

        // The engine defers directory lookups to verification time.
        if !path.is_dir() {
            return Err(Error::InvalidPath(path.to_path_buf()));
        }
        let dir = path_to_cstring(path).ok_or_else(|| Error::InvalidPath(path.to_path_buf()))?;

        // SAFETY: valid context and NUL-terminated directory path.
        let rc = unsafe {
            openssl_sys::SSL_CTX_load_verify_locations(self.ctx.as_ptr(), ptr::null(), dir.as_ptr())
        };
        if rc != 1 {
            return Err(Error::load(
                "trust anchor directory",
                path,
                ErrorStack::get(),
            ));
        }
        Ok(())
    }

    /// Load a single certificate
    pub fn use_certificate_file<P: AsRef<Path>>(&mut self, path: P, format: FileFormat) -> Result<()> {
        let encoding = format.encoding()?;
        let path = path.as_ref();
        log::trace!("{}: use certificate {}", self.method, path.display());
        self.ctx
            .set_certificate_file(path, encoding.filetype())
            .map_err(|e| Error::load("certificate", path, e))
    }

    /// Load a certificate followed by its issuer chain from one PEM file
    pub fn use_certificate_chain_file<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let path = path.as_ref();
        log::trace!("{}: use certificate chain {}", self.method, path.display());
        self.ctx
            .set_certificate_chain_file(path)
            .map_err(|e| Error::load("certificate chain", path, e))
    }

    /// Load a private key of any supported type
    ///
    /// Encrypted PEM keys are decrypted with the registered password
    /// callback, invoked synchronously from within this call.
    pub fn use_private_key_file<P: AsRef<Path>>(&mut self, path: P, format: FileFormat) -> Result<()> {
        let encoding = format.encoding()?;
        let path = path.as_ref();
        log::trace!("{}: use private key {}", self.method, path.display());
        self.ctx
            .set_private_key_file(path, encoding.filetype())
            .map_err(|e| Error::load("private key", path, e))
    }

    /// Load an RSA private key
    ///
    /// PEM input may be encrypted (see `use_private_key_file`); ASN.1 input
    /// must be an unencrypted PKCS#1 `RSAPrivateKey`.
    pub fn use_rsa_private_key_file<P: AsRef<Path>>(
        &mut self,
        path: P,
        format: FileFormat,
    ) -> Result<()> {
        let encoding = format.encoding()?;
        let path = path.as_ref();
        log::trace!("{}: use RSA private key {}", self.method, path.display());

        let data = read_file(path)?;
        let rsa = match encoding {
            Encoding::Pem => Rsa::private_key_from_pem_callback(&data, |buf| {
                Ok(self.read_password(buf))
            }),
            Encoding::Asn1 => Rsa::private_key_from_der(&data),
        }
        .map_err(|e| Error::load("RSA private key", path, e))?;

        let key = PKey::from_rsa(rsa).map_err(|e| Error::load("RSA private key", path, e))?;
        self.ctx
            .set_private_key(&key)
            .map_err(|e| Error::load("RSA private key", path, e))
    }

    /// Load ephemeral Diffie-Hellman parameters from a PEM file
    pub fn use_tmp_dh_file<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let path = path.as_ref();
        log::trace!("{}: use DH parameters {}", self.method, path.display());

        let pem = read_file(path)?;
        let dh = Dh::params_from_pem(&pem).map_err(|e| Error::load("DH parameters", path, e))?;
        self.ctx
            .set_tmp_dh(&dh)
            .map_err(|e| Error::load("DH parameters", path, e))
    }

    /// Register the password callback used to decrypt private keys
    ///
    /// A context carries at most one holder: registering again swaps the
    /// function inside the existing holder.
    pub fn set_password_callback<F>(&mut self, callback: F)
    where
        F: Fn(usize, PasswordPurpose) -> String + Send + Sync + 'static,
    {
        match self.password.as_mut() {
            Some(holder) => {
                log::trace!("{}: replace password callback", self.method);
                holder.replace(Box::new(callback));
            }
            None => {
                log::trace!("{}: attach password callback", self.method);
                self.password = Some(PasswordHolder::new(Box::new(callback)));
            }
        }
        self.install_password_trampoline();
    }

    /// Point the engine's password hook at the trampoline and the slot at
    /// the current holder (or null)
    fn install_password_trampoline(&self) {
        let userdata = self
            .password
            .as_ref()
            .map_or(ptr::null_mut(), |holder| holder.as_userdata());

        // SAFETY: valid context; the holder outlives its registration because
        // Drop clears the slot before releasing it.
        unsafe {
            ffi::SSL_CTX_set_default_passwd_cb(self.ctx.as_ptr(), Some(password_trampoline));
            ffi::SSL_CTX_set_default_passwd_cb_userdata(self.ctx.as_ptr(), userdata);
        }
    }

    fn read_password(&self, buf: &mut [u8]) -> usize {
        self.password
            .as_ref()
            .map_or(0, |holder| holder.fill(buf, PasswordPurpose::ForReading))
    }

    #[cfg(test)]
    pub(crate) fn password_holder_addr(&self) -> Option<*mut libc::c_void> {
        self.password.as_ref().map(|holder| holder.as_userdata())
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        // Slot first, then the holder, then (via field drop) the SSL_CTX.
        if let Some(holder) = self.password.take() {
            // SAFETY: valid context.
            unsafe {
                ffi::SSL_CTX_set_default_passwd_cb_userdata(self.ctx.as_ptr(), ptr::null_mut())
            };
            drop(holder);
        }
        log::debug!("destroying SSL context for {}", self.method);
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("method", &self.method)
            .field("password_callback", &self.password.is_some())
            .finish()
    }
}

#[cfg(unix)]
fn path_to_cstring(path: &Path) -> Option<CString> {
    use std::os::unix::ffi::OsStrExt;
    CString::new(path.as_os_str().as_bytes()).ok()
}

#[cfg(not(unix))]
fn path_to_cstring(path: &Path) -> Option<CString> {
    path.to_str().and_then(|s| CString::new(s).ok())
}

fn read_file(path: &Path) -> Result<Vec<u8>> {
    let mut data = Vec::new();
    File::open(path)
        .and_then(|mut file| file.read_to_end(&mut data))
        .map_err(|e| Error::io(path, e))?;
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ssl::method::{Protocol, Role};
    use crate::ssl::password::counters;
    use crate::ssl::ErrorKind;

    const MISSING: &str = "/nonexistent/sslctx/file.pem";

    #[test]
    fn test_create_every_method() {
        for method in Method::all() {
            match Context::new(method) {
                Ok(context) => {
                    assert!(method.protocol.is_supported());
                    assert_eq!(context.method(), method);
                    assert!(!context.has_password_callback());
                }
                // SSLv3 depends on how the engine was built
                Err(e) => {
                    assert!(
                        matches!(method.protocol, Protocol::Sslv2 | Protocol::Sslv3),
                        "{} failed: {}",
                        method,
                        e
                    );
                    assert_eq!(e.kind(), ErrorKind::ContextCreation);
                }
            }
        }
    }

    #[test]
    fn test_allocation_failure_is_creation_error() {
        let method = Method::any_server();
        let engine = EngineGuard::acquire();
        match Context::from_builder(method, None, engine, Err(ErrorStack::get())) {
            Err(e @ Error::Create { .. }) => {
                assert_eq!(e.kind(), ErrorKind::ContextCreation);
                assert!(e.to_string().contains(&method.to_string()));
            }
            other => panic!("expected Create error, got {:?}", other),
        }
    }

    #[test]
    fn test_create_sslv2_fails() {
        let err = Context::new(Method::new(Protocol::Sslv2, Role::Server)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ContextCreation);
    }

    #[test]
    fn test_password_callback_allocates_once() {
        let (allocated, freed) = counters::snapshot();

        let mut context = Context::new(Method::any_server()).unwrap();
        context.set_password_callback(|_, _| "first".to_string());
        let addr = context.password_holder_addr();
        context.set_password_callback(|_, _| "second".to_string());

        assert_eq!(context.password_holder_addr(), addr);
        assert_eq!(counters::snapshot(), (allocated + 1, freed));

        drop(context);
        assert_eq!(counters::snapshot(), (allocated + 1, freed + 1));
    }

    #[test]
    fn test_drop_without_callback_frees_nothing() {
        let (allocated, freed) = counters::snapshot();
        drop(Context::new(Method::any()).unwrap());
        assert_eq!(counters::snapshot(), (allocated, freed));
    }

    #[test]
    fn test_invalid_format_rejected_before_io() {
        let mut context = Context::new(Method::any_server()).unwrap();
        let bogus = FileFormat::from_raw(42);

        for result in [
            context.use_certificate_file(MISSING, bogus),
            context.use_private_key_file(MISSING, bogus),
            context.use_rsa_private_key_file(MISSING, bogus),
        ] {
            match result {
                Err(Error::InvalidFormat(42)) => {}
                other => panic!("expected InvalidFormat, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_missing_files_are_invalid_arguments() {
        let mut context = Context::new(Method::any_server()).unwrap();

        let results = [
            context.load_verify_file(MISSING),
            context.add_verify_path(MISSING),
            context.use_certificate_file(MISSING, FileFormat::PEM),
            context.use_certificate_chain_file(MISSING),
            context.use_private_key_file(MISSING, FileFormat::ASN1),
            context.use_rsa_private_key_file(MISSING, FileFormat::PEM),
            context.use_tmp_dh_file(MISSING),
        ];
        for result in results {
            assert_eq!(result.unwrap_err().kind(), ErrorKind::InvalidArgument);
        }
    }

    #[test]
    fn test_tmp_dh_missing_file_is_io_error() {
        let mut context = Context::new(Method::any_server()).unwrap();
        match context.use_tmp_dh_file(MISSING) {
            Err(Error::Io { path, .. }) => assert_eq!(path, Path::new(MISSING)),
            other => panic!("expected Io error, got {:?}", other),
        }
    }

    #[test]
    fn test_add_verify_path_directory() {
        let dir = tempfile::tempdir().unwrap();
        let mut context = Context::new(Method::any_client()).unwrap();
        context.add_verify_path(dir.path()).unwrap();
    }

    // macOS filesystems refuse non-UTF-8 names
    #[cfg(target_os = "linux")]
    #[test]
    fn test_add_verify_path_non_utf8_directory() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = tempfile::tempdir().unwrap();
        let certs = dir.path().join(OsStr::from_bytes(b"certs-\xff"));
        std::fs::create_dir(&certs).unwrap();

        let mut context = Context::new(Method::any_client()).unwrap();
        context.add_verify_path(&certs).unwrap();
    }

    #[test]
    fn test_options_and_verify_mode() {
        let mut context = Context::new(Method::any()).unwrap();
        let options = context.set_options(SslOptions::NO_SSLV3 | SslOptions::NO_TLSV1);
        assert!(options.contains(SslOptions::NO_SSLV3 | SslOptions::NO_TLSV1));

        let mode = VerifyMode::PEER | VerifyMode::FAIL_IF_NO_PEER_CERT;
        context.set_verify_mode(mode);
        assert_eq!(context.native().verify_mode().bits(), mode.bits());
    }

    #[test]
    fn test_verify_mode_flags() {
        let mode = VerifyMode::PEER | VerifyMode::CLIENT_ONCE;
        assert!(mode.contains(VerifyMode::PEER));
        assert!(mode.contains(VerifyMode::CLIENT_ONCE));
        assert!(!mode.contains(VerifyMode::FAIL_IF_NO_PEER_CERT));
        assert_eq!(mode.bits(), 0x05);
    }

    #[test]
    fn test_file_format_raw() {
        assert_eq!(FileFormat::from_raw(FileFormat::PEM.as_raw()), FileFormat::PEM);
        assert!(FileFormat::ASN1.encoding().is_ok());
        assert!(FileFormat::from_raw(-1).encoding().is_err());
    }
}
