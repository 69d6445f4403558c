//! Protocol method selection
//!
//! A `Method` is a protocol version paired with the role the context will
//! play. It maps onto one of OpenSSL's version-flexible methods, with the
//! version range pinned for the fixed-version protocols.

use super::{Error, Result};
use openssl::ssl::{SslMethod, SslVersion};
use std::fmt;
use std::str::FromStr;

/// Protocol version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    /// SSL 2.0 (no longer provided by OpenSSL)
    Sslv2,
    /// SSL 3.0
    Sslv3,
    /// TLS 1.0
    Tlsv1,
    /// TLS 1.1
    Tlsv11,
    /// TLS 1.2
    Tlsv12,
    /// TLS 1.3
    Tlsv13,
    /// Any version both peers support (historically "SSLv23")
    Any,
}

impl Protocol {
    /// Every protocol, oldest first
    pub const ALL: [Protocol; 7] = [
        Protocol::Sslv2,
        Protocol::Sslv3,
        Protocol::Tlsv1,
        Protocol::Tlsv11,
        Protocol::Tlsv12,
        Protocol::Tlsv13,
        Protocol::Any,
    ];

    /// Whether the engine can still produce a context for this protocol
    pub fn is_supported(&self) -> bool {
        *self != Protocol::Sslv2
    }

    /// Get the pinned OpenSSL version, `None` for a negotiated method
    fn to_openssl_version(self) -> Option<SslVersion> {
        match self {
            Protocol::Sslv2 | Protocol::Any => None,
            Protocol::Sslv3 => Some(SslVersion::SSL3),
            Protocol::Tlsv1 => Some(SslVersion::TLS1),
            Protocol::Tlsv11 => Some(SslVersion::TLS1_1),
            Protocol::Tlsv12 => Some(SslVersion::TLS1_2),
            Protocol::Tlsv13 => Some(SslVersion::TLS1_3),
        }
    }

    /// Get protocol name as string
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Sslv2 => "SSLv2",
            Protocol::Sslv3 => "SSLv3",
            Protocol::Tlsv1 => "TLSv1",
            Protocol::Tlsv11 => "TLSv1.1",
            Protocol::Tlsv12 => "TLSv1.2",
            Protocol::Tlsv13 => "TLSv1.3",
            Protocol::Any => "SSLv23",
        }
    }
}

impl FromStr for Protocol {
    type Err = Error;

    /// Parse a protocol name (case-insensitive)
    fn from_str(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "SSLV2" | "SSL2" => Ok(Protocol::Sslv2),
            "SSLV3" | "SSL3" => Ok(Protocol::Sslv3),
            "TLSV1.0" | "TLS1.0" | "TLSV1" | "TLS1" => Ok(Protocol::Tlsv1),
            "TLSV1.1" | "TLS1.1" => Ok(Protocol::Tlsv11),
            "TLSV1.2" | "TLS1.2" => Ok(Protocol::Tlsv12),
            "TLSV1.3" | "TLS1.3" => Ok(Protocol::Tlsv13),
            "SSLV23" | "TLS" | "ANY" => Ok(Protocol::Any),
            _ => Err(Error::InvalidProtocol(s.to_string())),
        }
    }
}

/// Which side of the handshake the context may be used for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Client or server
    Either,
    /// Client only
    Client,
    /// Server only
    Server,
}

impl Role {
    /// Every role
    pub const ALL: [Role; 3] = [Role::Either, Role::Client, Role::Server];

    fn to_ssl_method(self) -> SslMethod {
        match self {
            Role::Either => SslMethod::tls(),
            Role::Client => SslMethod::tls_client(),
            Role::Server => SslMethod::tls_server(),
        }
    }
}

/// Protocol method: a protocol version for a role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Method {
    /// Protocol version
    pub protocol: Protocol,
    /// Handshake side
    pub role: Role,
}

impl Method {
    /// Pair a protocol with a role
    pub const fn new(protocol: Protocol, role: Role) -> Self {
        Method { protocol, role }
    }

    /// Negotiated version, client or server
    pub const fn any() -> Self {
        Method::new(Protocol::Any, Role::Either)
    }

    /// Negotiated version, client only
    pub const fn any_client() -> Self {
        Method::new(Protocol::Any, Role::Client)
    }

    /// Negotiated version, server only
    pub const fn any_server() -> Self {
        Method::new(Protocol::Any, Role::Server)
    }

    /// Every protocol/role combination
    pub fn all() -> impl Iterator<Item = Method> {
        Protocol::ALL
            .into_iter()
            .flat_map(|p| Role::ALL.into_iter().map(move |r| Method::new(p, r)))
    }

    /// Resolve to the OpenSSL method and the pinned version, if any
    pub(crate) fn resolve(self) -> Result<(SslMethod, Option<SslVersion>)> {
        if !self.protocol.is_supported() {
            return Err(Error::UnsupportedMethod(self));
        }
        Ok((self.role.to_ssl_method(), self.protocol.to_openssl_version()))
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.role {
            Role::Either => write!(f, "{}", self.protocol.as_str()),
            Role::Client => write!(f, "{}_client", self.protocol.as_str()),
            Role::Server => write!(f, "{}_server", self.protocol.as_str()),
        }
    }
}
