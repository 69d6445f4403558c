//! sslctx - TLS context service
//!
//! This crate manages the lifecycle and configuration of OpenSSL `SSL_CTX`
//! objects for a connection-oriented I/O framework: creation for a protocol
//! method, options, peer verification, certificate/key/trust-anchor loading,
//! Diffie-Hellman parameters and the private-key password callback.

pub mod ssl;
