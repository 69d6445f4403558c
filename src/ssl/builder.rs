//! Context configuration builder
//!
//! Chains the `Context` configuration calls in one expression, stopping at
//! the first failure.

use super::context::{Context, FileFormat, VerifyMode};
use super::method::Method;
use super::password::PasswordPurpose;
use super::Result;
use openssl::ssl::SslOptions;
use std::path::Path;

/// Fluent builder for a `Context`
pub struct ContextBuilder {
    context: Context,
}

impl ContextBuilder {
    /// Start from a fresh context for `method`
    pub fn new(method: Method) -> Result<Self> {
        Ok(ContextBuilder {
            context: Context::new(method)?,
        })
    }

    /// Set protocol options
    pub fn options(mut self, options: SslOptions) -> Self {
        self.context.set_options(options);
        self
    }

    /// Set the peer verification policy
    pub fn verify_mode(mut self, mode: VerifyMode) -> Self {
        self.context.set_verify_mode(mode);
        self
    }

    /// Load a PEM bundle of trust anchors
    pub fn ca_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self> {
        self.context.load_verify_file(path)?;
        Ok(self)
    }

    /// Add a directory of hashed trust anchors
    pub fn ca_path<P: AsRef<Path>>(mut self, path: P) -> Result<Self> {
        self.context.add_verify_path(path)?;
        Ok(self)
    }

    /// Load a single certificate
    pub fn certificate_file<P: AsRef<Path>>(mut self, path: P, format: FileFormat) -> Result<Self> {
        self.context.use_certificate_file(path, format)?;
        Ok(self)
    }

    /// Load a certificate chain from a PEM file
    pub fn certificate_chain_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self> {
        self.context.use_certificate_chain_file(path)?;
        Ok(self)
    }

    /// Load a private key
    ///
    /// Register the password callback first if the key is encrypted.
    pub fn private_key_file<P: AsRef<Path>>(mut self, path: P, format: FileFormat) -> Result<Self> {
        self.context.use_private_key_file(path, format)?;
        Ok(self)
    }

    /// Load an RSA private key
    pub fn rsa_private_key_file<P: AsRef<Path>>(
        mut self,
        path: P,
        format: FileFormat,
    ) -> Result<Self> {
        self.context.use_rsa_private_key_file(path, format)?;
        Ok(self)
    }

    /// Load ephemeral DH parameters
    pub fn tmp_dh_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self> {
        self.context.use_tmp_dh_file(path)?;
        Ok(self)
    }

    /// Register the private-key password callback
    pub fn password_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(usize, PasswordPurpose) -> String + Send + Sync + 'static,
    {
        self.context.set_password_callback(callback);
        self
    }

    /// Finish configuration
    pub fn build(self) -> Context {
        self.context
    }
}
