//! Live certificate inspection over TLS.

use chrono::Utc;
use log::{debug, info, warn};
use openssl::ssl::{HandshakeError, Ssl, SslContext, SslMethod, SslStream, SslVerifyMode};
use std::io;
use std::net::{IpAddr, Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

use crate::error::InspectionError;
use crate::report::CertificateReport;

/// Port inspected when none is configured.
pub const DEFAULT_PORT: u16 = 443;

/// Time allowed for resolving, connecting and completing the handshake.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Longest window an inspection is allowed. Larger timeouts are capped to it.
pub const MAX_TIMEOUT: Duration = Duration::from_secs(3600);

/// Connects to a host and reports on the certificate it presents.
///
/// Certificate verification is switched off on purpose. Self-signed,
/// expired, untrusted and mismatched certificates are all reported instead
/// of failing the handshake, because the inspector observes certificates and
/// never decides whether to trust them. Callers porting this to a TLS stack
/// that verifies by default must disable that verification too.
///
/// An `Inspector` holds no mutable state, so one value can be shared by any
/// number of threads inspecting different hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Inspector {
    port: u16,
    timeout: Duration,
}

impl Default for Inspector {
    fn default() -> Self {
        Inspector {
            port: DEFAULT_PORT,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl Inspector {
    /// Inspector for port 443 with a 10 second timeout.
    pub fn new() -> Self {
        Inspector::default()
    }

    /// Same inspector, connecting to `port` instead.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Same inspector with a different timeout window.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Port the inspector connects to.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Timeout window covering connect and handshake.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Inspects the leaf certificate served by `hostname`.
    ///
    /// `hostname` must already be stripped of any URL scheme and `www.`
    /// prefix. Exactly one attempt is made. The socket is closed before this
    /// returns, whatever the outcome.
    ///
    /// ```no_run
    /// # use certinspect::Inspector;
    /// let report = Inspector::new().inspect("example.com")?;
    /// println!("{} expires in {} days", report.subject, report.days_left);
    /// # Ok::<(), certinspect::InspectionError>(())
    /// ```
    pub fn inspect(&self, hostname: &str) -> Result<CertificateReport, InspectionError> {
        let now = Instant::now();
        let deadline = now
            .checked_add(self.timeout.min(MAX_TIMEOUT))
            .unwrap_or(now);
        let address = display_address(hostname, self.port);

        let stream = self.connect(hostname, &address, deadline)?;
        let ssl = client_ssl(hostname).map_err(|e| InspectionError::HandshakeFailed {
            address: address.clone(),
            details: e.to_string(),
        })?;
        let stream = handshake(ssl, stream, &address, deadline)?;
        debug!("handshake with {} completed", address);

        let peer = stream.ssl().peer_certificate();
        let result =
            CertificateReport::from_peer_certificate(hostname, peer.as_deref(), Utc::now());
        abort(stream.get_ref());

        match &result {
            Ok(report) => info!(
                "inspected {}: issued by {}, {} days left",
                address, report.issuer_name, report.days_left
            ),
            Err(e) => warn!("inspection of {} failed: {}", address, e),
        }
        result
    }

    fn connect(
        &self,
        hostname: &str,
        address: &str,
        deadline: Instant,
    ) -> Result<TcpStream, InspectionError> {
        let addrs = resolve(hostname, self.port)?;
        debug!("{} resolved to {:?}", hostname, addrs);

        let mut last_error = None;
        for addr in addrs {
            let left = remaining(deadline).ok_or_else(|| timeout(address, "TCP connect"))?;
            match TcpStream::connect_timeout(&addr, left) {
                Ok(stream) => {
                    debug!("connected to {} via {}", address, addr);
                    return Ok(stream);
                }
                Err(e) => {
                    debug!("connection to {} failed: {}", addr, e);
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) if is_timeout(&e) => Err(timeout(address, "TCP connect")),
            Some(source) => Err(InspectionError::ConnectionFailed {
                address: address.to_string(),
                source,
            }),
            None => Err(InspectionError::DnsResolution {
                hostname: hostname.to_string(),
                source: io::Error::new(io::ErrorKind::NotFound, "no addresses found"),
            }),
        }
    }
}

fn resolve(hostname: &str, port: u16) -> Result<Vec<SocketAddr>, InspectionError> {
    if hostname.is_empty() {
        return Err(InspectionError::DnsResolution {
            hostname: String::new(),
            source: io::Error::new(io::ErrorKind::InvalidInput, "hostname is empty"),
        });
    }
    match (hostname, port).to_socket_addrs() {
        Ok(addrs) => Ok(addrs.collect()),
        Err(source) => Err(InspectionError::DnsResolution {
            hostname: hostname.to_string(),
            source,
        }),
    }
}

fn client_ssl(hostname: &str) -> Result<Ssl, openssl::error::ErrorStack> {
    let mut context = SslContext::builder(SslMethod::tls_client())?;
    context.set_verify(SslVerifyMode::NONE);
    let context = context.build();

    let mut ssl = Ssl::new(&context)?;
    // SNI must not carry IP literals.
    if hostname.parse::<IpAddr>().is_err() {
        ssl.set_hostname(hostname)?;
    }
    Ok(ssl)
}

fn handshake(
    ssl: Ssl,
    stream: TcpStream,
    address: &str,
    deadline: Instant,
) -> Result<SslStream<TcpStream>, InspectionError> {
    if let Err(e) = limit_io(&stream, address, deadline) {
        abort(&stream);
        return Err(e);
    }

    let mut attempt = ssl.connect(stream);
    loop {
        match attempt {
            Ok(stream) => return Ok(stream),
            Err(HandshakeError::WouldBlock(mid)) => {
                if let Err(e) = limit_io(mid.get_ref(), address, deadline) {
                    abort(mid.get_ref());
                    return Err(e);
                }
                attempt = mid.handshake();
            }
            Err(HandshakeError::Failure(mid)) => {
                abort(mid.get_ref());
                if mid.error().io_error().map_or(false, is_timeout) {
                    return Err(timeout(address, "TLS handshake"));
                }
                return Err(InspectionError::HandshakeFailed {
                    address: address.to_string(),
                    details: mid.error().to_string(),
                });
            }
            Err(HandshakeError::SetupFailure(e)) => {
                return Err(InspectionError::HandshakeFailed {
                    address: address.to_string(),
                    details: e.to_string(),
                });
            }
        }
    }
}

/// Caps blocking reads and writes at the time left before `deadline`.
fn limit_io(stream: &TcpStream, address: &str, deadline: Instant) -> Result<(), InspectionError> {
    let left = remaining(deadline).ok_or_else(|| timeout(address, "TLS handshake"))?;
    stream
        .set_read_timeout(Some(left))
        .and_then(|_| stream.set_write_timeout(Some(left)))
        .map_err(|source| InspectionError::ConnectionFailed {
            address: address.to_string(),
            source,
        })
}

fn abort(stream: &TcpStream) {
    if let Err(e) = stream.shutdown(Shutdown::Both) {
        debug!("socket shutdown failed: {}", e);
    }
}

fn remaining(deadline: Instant) -> Option<Duration> {
    let left = deadline.checked_duration_since(Instant::now())?;
    if left.is_zero() {
        None
    } else {
        Some(left)
    }
}

fn is_timeout(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
    )
}

fn timeout(address: &str, operation: &str) -> InspectionError {
    warn!("{} to {} timed out", operation, address);
    InspectionError::Timeout {
        address: address.to_string(),
        operation: operation.to_string(),
    }
}

fn display_address(hostname: &str, port: u16) -> String {
    match hostname.parse::<IpAddr>() {
        Ok(IpAddr::V6(ip)) => format!("[{}]:{}", ip, port),
        _ => format!("{}:{}", hostname, port),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let inspector = Inspector::new();
        assert_eq!(inspector.port(), 443);
        assert_eq!(inspector.timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_builder_methods() {
        let inspector = Inspector::new()
            .with_port(8443)
            .with_timeout(Duration::from_millis(250));
        assert_eq!(inspector.port(), 8443);
        assert_eq!(inspector.timeout(), Duration::from_millis(250));
    }

    #[test]
    fn test_display_address() {
        assert_eq!(display_address("example.com", 443), "example.com:443");
        assert_eq!(display_address("127.0.0.1", 8443), "127.0.0.1:8443");
        assert_eq!(display_address("::1", 443), "[::1]:443");
    }

    #[test]
    fn test_remaining_after_deadline() {
        assert!(remaining(Instant::now() - Duration::from_millis(1)).is_none());
        assert!(remaining(Instant::now() + Duration::from_secs(5)).is_some());
    }

    #[test]
    fn test_empty_hostname_is_connection_failure() {
        let err = Inspector::new().inspect("").unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::ConnectionFailed);
        assert!(err.to_string().contains("hostname is empty"));
    }

    #[test]
    fn test_client_ssl_skips_sni_for_ip_literals() {
        assert!(client_ssl("127.0.0.1").is_ok());
        assert!(client_ssl("::1").is_ok());
        assert!(client_ssl("example.com").is_ok());
    }

    #[test]
    fn test_huge_timeout_is_capped() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let err = Inspector::new()
            .with_port(port)
            .with_timeout(Duration::from_secs(u64::MAX))
            .inspect("127.0.0.1")
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::ConnectionFailed);
    }

    #[test]
    fn test_is_timeout() {
        assert!(is_timeout(&io::Error::from(io::ErrorKind::TimedOut)));
        assert!(is_timeout(&io::Error::from(io::ErrorKind::WouldBlock)));
        assert!(!is_timeout(&io::Error::from(io::ErrorKind::ConnectionRefused)));
    }
}
