//! TLS context configuration
//!
//! This module wraps OpenSSL's `SSL_CTX` for callers that drive a TLS stream
//! layer. It is split into two levels:
//!
//! 1. `Context` owns one native context plus the password-callback holder
//!    attached to it, and exposes `Result`-returning configuration methods.
//! 2. `ContextService` works on nullable `ContextHandle`s and reports every
//!    outcome through a caller-supplied error handler, invoked exactly once
//!    per operation.
//!
//! # Ownership
//!
//! OpenSSL offers a single untyped user-data pointer per context for the
//! password callback. `Context` keeps the callback in a boxed holder it owns
//! and stores only the holder's address in that slot. Re-registering a
//! callback replaces the function inside the existing holder, and dropping
//! the context clears the slot and frees the holder before the native
//! context is released.
//!
//! # Examples
//!
//! ## Handle-based service
//!
//! ```no_run
//! use sslctx::ssl::{ContextHandle, ContextService, FileFormat, Method};
//!
//! let service = ContextService::new();
//! let mut handle = ContextHandle::null();
//!
//! service.create(&mut handle, Method::any_server(), |r| r.unwrap());
//! service.set_password_callback(&mut handle, |_size, _purpose| "secret".to_string(), |r| r.unwrap());
//! service.use_certificate_chain_file(&mut handle, "chain.pem", |r| r.unwrap());
//! service.use_private_key_file(&mut handle, "key.pem", FileFormat::PEM, |r| {
//!     if let Err(e) = r {
//!         eprintln!("key rejected: {}", e);
//!     }
//! });
//! service.destroy(&mut handle);
//! assert!(handle.is_null());
//! ```
//!
//! ## Builder
//!
//! ```no_run
//! use sslctx::ssl::{ContextBuilder, Method, VerifyMode, options};
//!
//! let context = ContextBuilder::new(Method::any_server())
//!     .unwrap()
//!     .options(options::DEFAULT_WORKAROUNDS | options::NO_SSLV2)
//!     .verify_mode(VerifyMode::PEER | VerifyMode::FAIL_IF_NO_PEER_CERT)
//!     .certificate_chain_file("chain.pem")
//!     .unwrap()
//!     .private_key_file("key.pem", sslctx::ssl::FileFormat::PEM)
//!     .unwrap()
//!     .build();
//!
//! let _ssl = openssl::ssl::Ssl::new(context.native()).unwrap();
//! ```

pub mod builder;
pub mod context;
mod ffi;
pub mod init;
pub mod method;
pub mod password;
pub mod service;

pub use builder::ContextBuilder;
pub use context::{Context, FileFormat, VerifyMode};
pub use init::EngineGuard;
pub use method::{Method, Protocol, Role};
pub use password::PasswordPurpose;
pub use service::{ContextHandle, ContextService};

pub use openssl::ssl::SslOptions;

use std::path::PathBuf;

/// Result type for context operations
pub type Result<T> = std::result::Result<T, Error>;

/// Protocol option constants accepted by `set_options`
pub mod options {
    use openssl::ssl::SslOptions;

    /// Enable the engine's bug workarounds (`SSL_OP_ALL`)
    pub const DEFAULT_WORKAROUNDS: SslOptions = SslOptions::ALL;
    /// Always create a new key when using ephemeral DH parameters
    pub const SINGLE_DH_USE: SslOptions = SslOptions::SINGLE_DH_USE;
    /// Disable SSL v2
    pub const NO_SSLV2: SslOptions = SslOptions::NO_SSLV2;
    /// Disable SSL v3
    pub const NO_SSLV3: SslOptions = SslOptions::NO_SSLV3;
    /// Disable TLS v1
    pub const NO_TLSV1: SslOptions = SslOptions::NO_TLSV1;
}

/// Error classification reported to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A load/parse/attach step failed, a selector was out of range,
    /// or the handle was null
    InvalidArgument,
    /// The native context could not be allocated for the requested method
    ContextCreation,
}

/// Context errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Failed to create SSL context for {method}: {source}")]
    Create {
        method: Method,
        #[source]
        source: openssl::error::ErrorStack,
    },

    #[error("Unsupported protocol method: {0}")]
    UnsupportedMethod(Method),

    #[error("Operation on a null context handle")]
    NullContext,

    #[error("Invalid file format selector: {0}")]
    InvalidFormat(libc::c_int),

    #[error("Invalid path: {}", .0.display())]
    InvalidPath(PathBuf),

    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to load {what} from {}: {source}", path.display())]
    Load {
        what: &'static str,
        path: PathBuf,
        #[source]
        source: openssl::error::ErrorStack,
    },

    #[error("Invalid protocol name: {0}")]
    InvalidProtocol(String),
}

impl Error {
    /// Classify the error into the coarse status reported by the service
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Create { .. } | Error::UnsupportedMethod(_) => ErrorKind::ContextCreation,
            _ => ErrorKind::InvalidArgument,
        }
    }

    pub(crate) fn load(
        what: &'static str,
        path: &std::path::Path,
        source: openssl::error::ErrorStack,
    ) -> Self {
        Error::Load {
            what,
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        Error::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}
