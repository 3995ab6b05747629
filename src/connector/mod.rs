//! Connection establishment.
//!
//! This module provides the dialers a whois query can run over:
//! - `Direct`: Direct TCP connection through the host network stack
//! - `Socks5`: Connection tunnelled through a SOCKS5 proxy
//! - `FnConnector`: Caller-supplied dial function

use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::time::{Duration, Instant};

use crate::error::{ConnectErrorKind, Result, WhoisError};

#[cfg(feature = "async")]
use async_trait::async_trait;
#[cfg(feature = "async")]
use tokio::io::{AsyncRead, AsyncWrite};

mod custom;
mod direct;
mod socks5;

#[cfg(feature = "async")]
pub use custom::{AsyncDialFuture, AsyncFnConnector};
pub use custom::FnConnector;
pub use direct::{Direct, DirectOptions};
pub use socks5::{proxy_auth, ProxyAuth, Socks5};

/// Dial target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Addr {
    /// Hostname or IP address
    pub host: String,
    /// Port number
    pub port: u16,
}

impl Addr {
    /// Create a new Addr
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Get the address string in host:port format
    pub fn addr_string(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl std::fmt::Display for Addr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Instant `timeout` from now; `InvalidInput` when it cannot be represented.
pub(crate) fn deadline_after(timeout: Duration) -> Result<Instant> {
    Instant::now().checked_add(timeout).ok_or_else(|| {
        WhoisError::connect(
            ConnectErrorKind::InvalidInput,
            format!("Timeout too large: {:?}", timeout),
        )
    })
}

/// Connection establishment interface.
pub trait Connector: Send + Sync {
    /// Establish a connection to `addr`, giving up after `timeout`.
    fn dial(&self, addr: &Addr, timeout: Duration) -> Result<Box<dyn Conn>>;
}

impl<C: Connector + ?Sized> Connector for Box<C> {
    fn dial(&self, addr: &Addr, timeout: Duration) -> Result<Box<dyn Conn>> {
        (**self).dial(addr, timeout)
    }
}

impl<C: Connector + ?Sized> Connector for std::sync::Arc<C> {
    fn dial(&self, addr: &Addr, timeout: Duration) -> Result<Box<dyn Conn>> {
        (**self).dial(addr, timeout)
    }
}

/// Bidirectional byte stream returned by a `Connector`.
pub trait Conn: Read + Write + Send {
    /// Set read timeout
    fn set_read_timeout(&self, dur: Option<Duration>) -> io::Result<()>;

    /// Set write timeout
    fn set_write_timeout(&self, dur: Option<Duration>) -> io::Result<()>;

    /// Shutdown both halves of the connection
    fn shutdown(&self) -> io::Result<()> {
        Ok(())
    }
}

impl Conn for TcpStream {
    fn set_read_timeout(&self, dur: Option<Duration>) -> io::Result<()> {
        TcpStream::set_read_timeout(self, dur)
    }

    fn set_write_timeout(&self, dur: Option<Duration>) -> io::Result<()> {
        TcpStream::set_write_timeout(self, dur)
    }

    fn shutdown(&self) -> io::Result<()> {
        TcpStream::shutdown(self, Shutdown::Both)
    }
}

/// Async connection establishment interface.
///
/// Callers bound the dial with their own timeout; implementations only need
/// to be cancel-safe.
#[cfg(feature = "async")]
#[async_trait]
pub trait AsyncConnector: Send + Sync {
    /// Establish an async connection to `addr`.
    async fn dial(&self, addr: &Addr) -> Result<Box<dyn AsyncConn>>;
}

#[cfg(feature = "async")]
#[async_trait]
impl<C: AsyncConnector + ?Sized> AsyncConnector for Box<C> {
    async fn dial(&self, addr: &Addr) -> Result<Box<dyn AsyncConn>> {
        (**self).dial(addr).await
    }
}

/// Async bidirectional byte stream.
#[cfg(feature = "async")]
pub trait AsyncConn: AsyncRead + AsyncWrite + Send + Unpin {}

#[cfg(feature = "async")]
impl<T: AsyncRead + AsyncWrite + Send + Unpin> AsyncConn for T {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[test]
    fn test_addr_new_basic() {
        let addr = Addr::new("whois.verisign-grs.com", 43);
        assert_eq!(addr.host, "whois.verisign-grs.com");
        assert_eq!(addr.port, 43);
    }

    #[test]
    fn test_addr_display() {
        let addr = Addr::new("whois.nic.uk", 43);
        assert_eq!(format!("{}", addr), "whois.nic.uk:43");
        assert_eq!(addr.addr_string(), "whois.nic.uk:43");
    }

    #[test]
    fn test_tcp_stream_is_conn() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let stream = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        let conn: Box<dyn Conn> = Box::new(stream);
        conn.set_read_timeout(Some(Duration::from_millis(50))).unwrap();
        conn.set_write_timeout(None).unwrap();
        conn.shutdown().unwrap();
    }

    #[test]
    fn test_deadline_after() {
        let deadline = deadline_after(Duration::from_secs(1)).unwrap();
        assert!(deadline > Instant::now());

        let err = deadline_after(Duration::MAX).unwrap_err();
        assert!(matches!(
            err,
            WhoisError::ConnectError {
                kind: ConnectErrorKind::InvalidInput,
                ..
            }
        ));
    }
}
