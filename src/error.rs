//! Error types for certificate inspection.
//!
//! Every failure of an inspection is reported as exactly one
//! [`InspectionError`]. The [`ErrorKind`] tag is what callers match on when
//! they need to tell failures apart without looking at the message.

use std::fmt;
use std::io;
use strum_macros::{AsRefStr, Display, IntoStaticStr};

/// Classification of an inspection failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr, IntoStaticStr)]
pub enum ErrorKind {
    /// The handshake completed but the server sent no certificate
    NoCertificate,
    /// The certificate could not be interpreted
    ParseFailure,
    /// DNS resolution, TCP connect or the TLS handshake failed
    ConnectionFailed,
    /// The connection or handshake did not finish in time
    Timeout,
}

/// Error returned when a certificate could not be inspected.
#[derive(Debug)]
pub enum InspectionError {
    /// The handshake succeeded but no peer certificate was presented
    NoCertificate {
        /// The host that was inspected
        hostname: String,
    },

    /// Certificate fields could not be extracted
    ParseFailure {
        /// What could not be parsed
        reason: String,
    },

    /// The hostname did not resolve to any address
    DnsResolution {
        /// The hostname that failed to resolve
        hostname: String,
        /// The underlying I/O error
        source: io::Error,
    },

    /// TCP connection failed to the target address
    ConnectionFailed {
        /// The address (host:port) that connection failed to
        address: String,
        /// The underlying I/O error
        source: io::Error,
    },

    /// TLS handshake failed
    HandshakeFailed {
        /// The address (host:port) the handshake was attempted with
        address: String,
        /// Details about why the handshake failed
        details: String,
    },

    /// Connect or handshake exceeded the timeout window
    Timeout {
        /// The address (host:port) that timed out
        address: String,
        /// Which step was in flight when the deadline passed
        operation: String,
    },
}

impl InspectionError {
    /// The classification tag of this error.
    ///
    /// DNS, TCP and TLS protocol failures all map to
    /// [`ErrorKind::ConnectionFailed`].
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NoCertificate { .. } => ErrorKind::NoCertificate,
            Self::ParseFailure { .. } => ErrorKind::ParseFailure,
            Self::DnsResolution { .. }
            | Self::ConnectionFailed { .. }
            | Self::HandshakeFailed { .. } => ErrorKind::ConnectionFailed,
            Self::Timeout { .. } => ErrorKind::Timeout,
        }
    }

    pub(crate) fn parse<S: Into<String>>(reason: S) -> Self {
        Self::ParseFailure {
            reason: reason.into(),
        }
    }
}

impl fmt::Display for InspectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoCertificate { hostname } => {
                write!(f, "No SSL certificate found for {}", hostname)
            }
            Self::ParseFailure { reason } => {
                write!(f, "Failed to parse certificate data: {}", reason)
            }
            Self::DnsResolution { hostname, source } => {
                write!(
                    f,
                    "Connection failed: could not resolve hostname {}: {}",
                    hostname, source
                )
            }
            Self::ConnectionFailed { address, source } => {
                write!(f, "Connection failed: {}: {}", address, source)
            }
            Self::HandshakeFailed { address, details } => {
                write!(
                    f,
                    "Connection failed: TLS handshake with {} failed: {}",
                    address, details
                )
            }
            Self::Timeout { address, operation } => {
                write!(f, "Connection timeout: {} to {}", operation, address)
            }
        }
    }
}

impl std::error::Error for InspectionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::DnsResolution { source, .. } => Some(source),
            Self::ConnectionFailed { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<openssl::error::ErrorStack> for InspectionError {
    fn from(e: openssl::error::ErrorStack) -> Self {
        Self::ParseFailure {
            reason: e.to_string(),
        }
    }
}
