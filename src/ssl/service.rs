//! Handle-based context service
//!
//! `ContextService` is the entry point used by the I/O framework. It keeps no
//! per-context state: every call names the `ContextHandle` it works on, and
//! every fallible call takes an error handler that is invoked exactly once
//! with `Ok(())` or the failure. Nothing is returned, logged as an error, or
//! retried on the caller's behalf.

use super::context::{Context, FileFormat, VerifyMode};
use super::init::EngineGuard;
use super::method::Method;
use super::password::PasswordPurpose;
use super::{Error, Result};
use openssl::ssl::SslOptions;
use std::path::Path;

/// Nullable owner of one `Context`
///
/// A handle is null until `create` succeeds and again after `destroy`.
/// Dropping a non-null handle destroys its context.
#[derive(Debug, Default)]
pub struct ContextHandle {
    inner: Option<Context>,
}

impl ContextHandle {
    /// The null handle
    pub fn null() -> ContextHandle {
        ContextHandle { inner: None }
    }

    /// Whether the handle holds no context
    pub fn is_null(&self) -> bool {
        self.inner.is_none()
    }

    /// Borrow the context, if any
    pub fn get(&self) -> Option<&Context> {
        self.inner.as_ref()
    }

    /// Mutably borrow the context, if any
    pub fn get_mut(&mut self) -> Option<&mut Context> {
        self.inner.as_mut()
    }

    /// Take the context out, leaving the handle null
    pub fn take(&mut self) -> Option<Context> {
        self.inner.take()
    }
}

impl From<Context> for ContextHandle {
    fn from(context: Context) -> ContextHandle {
        ContextHandle {
            inner: Some(context),
        }
    }
}

/// Creates, configures and destroys contexts through handles
#[derive(Debug, Clone)]
pub struct ContextService {
    _engine: EngineGuard,
}

impl Default for ContextService {
    fn default() -> Self {
        ContextService::new()
    }
}

impl ContextService {
    /// Create the service, initializing the engine if needed
    pub fn new() -> ContextService {
        ContextService {
            _engine: EngineGuard::acquire(),
        }
    }

    /// The null handle
    pub fn null() -> ContextHandle {
        ContextHandle::null()
    }

    /// Create a context for `method` in `handle`
    ///
    /// A context already held by `handle` is destroyed first. On failure the
    /// handle is left null and the handler receives an error whose kind is
    /// `ErrorKind::ContextCreation`.
    pub fn create<H>(&self, handle: &mut ContextHandle, method: Method, on_error: H)
    where
        H: FnOnce(Result<()>),
    {
        self.destroy(handle);
        let result = Context::new(method).map(|context| {
            handle.inner = Some(context);
        });
        on_error(result);
    }

    /// Destroy the context held by `handle`; a null handle is left as is
    pub fn destroy(&self, handle: &mut ContextHandle) {
        // Context::drop clears the callback slot and frees the holder
        // before the native context.
        drop(handle.take());
    }

    /// Set protocol options
    pub fn set_options<H>(&self, handle: &mut ContextHandle, options: SslOptions, on_error: H)
    where
        H: FnOnce(Result<()>),
    {
        on_error(with_context(handle, |ctx| {
            ctx.set_options(options);
            Ok(())
        }));
    }

    /// Set the peer verification policy
    pub fn set_verify_mode<H>(&self, handle: &mut ContextHandle, mode: VerifyMode, on_error: H)
    where
        H: FnOnce(Result<()>),
    {
        on_error(with_context(handle, |ctx| {
            ctx.set_verify_mode(mode);
            Ok(())
        }));
    }

    /// Load a PEM bundle of trust anchors
    pub fn load_verify_file<P, H>(&self, handle: &mut ContextHandle, path: P, on_error: H)
    where
        P: AsRef<Path>,
        H: FnOnce(Result<()>),
    {
        on_error(with_context(handle, |ctx| ctx.load_verify_file(path)));
    }

    /// Add a directory of hashed trust-anchor files
    pub fn add_verify_path<P, H>(&self, handle: &mut ContextHandle, path: P, on_error: H)
    where
        P: AsRef<Path>,
        H: FnOnce(Result<()>),
    {
        on_error(with_context(handle, |ctx| ctx.add_verify_path(path)));
    }

    /// Load a single certificate
    pub fn use_certificate_file<P, H>(
        &self,
        handle: &mut ContextHandle,
        path: P,
        format: FileFormat,
        on_error: H,
    ) where
        P: AsRef<Path>,
        H: FnOnce(Result<()>),
    {
        on_error(with_context(handle, |ctx| ctx.use_certificate_file(path, format)));
    }

    /// Load a certificate and its chain from one PEM file
    pub fn use_certificate_chain_file<P, H>(&self, handle: &mut ContextHandle, path: P, on_error: H)
    where
        P: AsRef<Path>,
        H: FnOnce(Result<()>),
    {
        on_error(with_context(handle, |ctx| ctx.use_certificate_chain_file(path)));
    }

    /// Load a private key
    pub fn use_private_key_file<P, H>(
        &self,
        handle: &mut ContextHandle,
        path: P,
        format: FileFormat,
        on_error: H,
    ) where
        P: AsRef<Path>,
        H: FnOnce(Result<()>),
    {
        on_error(with_context(handle, |ctx| ctx.use_private_key_file(path, format)));
    }

    /// Load an RSA private key
    pub fn use_rsa_private_key_file<P, H>(
        &self,
        handle: &mut ContextHandle,
        path: P,
        format: FileFormat,
        on_error: H,
    ) where
        P: AsRef<Path>,
        H: FnOnce(Result<()>),
    {
        on_error(with_context(handle, |ctx| ctx.use_rsa_private_key_file(path, format)));
    }

    /// Load ephemeral Diffie-Hellman parameters from a PEM file
    pub fn use_tmp_dh_file<P, H>(&self, handle: &mut ContextHandle, path: P, on_error: H)
    where
        P: AsRef<Path>,
        H: FnOnce(Result<()>),
    {
        on_error(with_context(handle, |ctx| ctx.use_tmp_dh_file(path)));
    }

    /// Register the private-key password callback
    pub fn set_password_callback<F, H>(&self, handle: &mut ContextHandle, callback: F, on_error: H)
    where
        F: Fn(usize, PasswordPurpose) -> String + Send + Sync + 'static,
        H: FnOnce(Result<()>),
    {
        on_error(with_context(handle, |ctx| {
            ctx.set_password_callback(callback);
            Ok(())
        }));
    }
}

fn with_context<F>(handle: &mut ContextHandle, f: F) -> Result<()>
where
    F: FnOnce(&mut Context) -> Result<()>,
{
    match handle.get_mut() {
        Some(context) => f(context),
        None => Err(Error::NullContext),
    }
}
