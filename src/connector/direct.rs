//! Direct connection implementation.
//!
//! Connects straight to the whois server using the local network.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

use crate::error::{ConnectErrorKind, Result, WhoisError};

use super::{deadline_after, Addr, Conn, Connector};

#[cfg(feature = "async")]
use super::{AsyncConn, AsyncConnector};
#[cfg(feature = "async")]
use async_trait::async_trait;
#[cfg(feature = "async")]
use tokio::net::TcpStream as TokioTcpStream;

/// Options for creating a Direct connector.
#[derive(Debug, Clone, Default)]
pub struct DirectOptions {
    /// Bind IPv4 address for outgoing connections
    pub bind_ip4: Option<Ipv4Addr>,
    /// Bind IPv6 address for outgoing connections
    pub bind_ip6: Option<Ipv6Addr>,
}

/// Direct connector using the system resolver and TCP stack.
#[derive(Debug, Clone, Default)]
pub struct Direct {
    bind_ip4: Option<Ipv4Addr>,
    bind_ip6: Option<Ipv6Addr>,
}

impl Direct {
    /// Create a new Direct connector with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new Direct connector with the given options.
    pub fn with_options(opts: DirectOptions) -> Self {
        Self {
            bind_ip4: opts.bind_ip4,
            bind_ip6: opts.bind_ip6,
        }
    }

    /// Resolve the target using system DNS.
    fn resolve(&self, addr: &Addr) -> Result<Vec<SocketAddr>> {
        let addrs: Vec<SocketAddr> = (addr.host.as_str(), addr.port)
            .to_socket_addrs()
            .map_err(|e| {
                WhoisError::connect(
                    ConnectErrorKind::DnsFailed,
                    format!("Failed to resolve {}: {}", addr.host, e),
                )
            })?
            .collect();

        if addrs.is_empty() {
            return Err(WhoisError::connect(
                ConnectErrorKind::DnsFailed,
                format!("No address found for {}", addr.host),
            ));
        }
        Ok(addrs)
    }

    /// Get the bind IP for the given target IP.
    fn get_bind_ip(&self, target: &IpAddr) -> Option<IpAddr> {
        match target {
            IpAddr::V4(_) => self.bind_ip4.map(IpAddr::V4),
            IpAddr::V6(_) => self.bind_ip6.map(IpAddr::V6),
        }
    }

    /// Create a TCP socket2::Socket bound to `bind_ip`.
    fn create_tcp_socket(&self, target: &SocketAddr, bind_ip: IpAddr) -> Result<socket2::Socket> {
        let socket = socket2::Socket::new(
            socket2::Domain::for_address(*target),
            socket2::Type::STREAM,
            Some(socket2::Protocol::TCP),
        )
        .map_err(|e| {
            WhoisError::connect(
                ConnectErrorKind::ConnectionFailed,
                format!("Failed to create socket: {}", e),
            )
        })?;

        socket
            .bind(&SocketAddr::new(bind_ip, 0).into())
            .map_err(|e| {
                WhoisError::connect(
                    ConnectErrorKind::InvalidInput,
                    format!("Failed to bind {}: {}", bind_ip, e),
                )
            })?;

        Ok(socket)
    }

    /// Dial a single resolved address.
    fn dial_socket_addr(&self, target: SocketAddr, timeout: Duration) -> Result<TcpStream> {
        let connect_err = |e: std::io::Error| {
            let kind = if e.kind() == std::io::ErrorKind::TimedOut {
                ConnectErrorKind::Timeout
            } else {
                ConnectErrorKind::ConnectionFailed
            };
            WhoisError::connect(kind, format!("Failed to connect to {}: {}", target, e))
        };

        match self.get_bind_ip(&target.ip()) {
            Some(bind_ip) => {
                let socket = self.create_tcp_socket(&target, bind_ip)?;
                socket
                    .connect_timeout(&target.into(), timeout)
                    .map_err(connect_err)?;
                Ok(TcpStream::from(socket))
            }
            None => TcpStream::connect_timeout(&target, timeout).map_err(connect_err),
        }
    }

    /// Async dial a single resolved address.
    #[cfg(feature = "async")]
    async fn async_dial_socket_addr(&self, target: SocketAddr) -> Result<TokioTcpStream> {
        let connect_err = |e: std::io::Error| {
            WhoisError::connect(
                ConnectErrorKind::ConnectionFailed,
                format!("Failed to connect to {}: {}", target, e),
            )
        };

        match self.get_bind_ip(&target.ip()) {
            Some(bind_ip) => {
                let socket = self.create_tcp_socket(&target, bind_ip)?;
                socket.set_nonblocking(true).map_err(connect_err)?;
                let std_stream: std::net::TcpStream = socket.into();
                let tokio_socket = tokio::net::TcpSocket::from_std_stream(std_stream);
                tokio_socket.connect(target).await.map_err(connect_err)
            }
            None => TokioTcpStream::connect(target).await.map_err(connect_err),
        }
    }
}

impl Connector for Direct {
    fn dial(&self, addr: &Addr, timeout: Duration) -> Result<Box<dyn Conn>> {
        let deadline = deadline_after(timeout)?;
        let targets = self.resolve(addr)?;

        let mut last_err = None;
        for target in targets {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            match self.dial_socket_addr(target, remaining) {
                Ok(stream) => {
                    log::debug!("whois: connected to {} via {}", addr, target);
                    return Ok(Box::new(stream));
                }
                Err(e) => {
                    log::warn!("whois: dial {} ({}) failed: {}", addr, target, e);
                    last_err = Some(e);
                }
            }
        }

        Err(last_err.unwrap_or_else(|| {
            WhoisError::connect(ConnectErrorKind::Timeout, "Connection timeout")
        }))
    }
}

#[cfg(feature = "async")]
#[async_trait]
impl AsyncConnector for Direct {
    async fn dial(&self, addr: &Addr) -> Result<Box<dyn AsyncConn>> {
        let targets: Vec<SocketAddr> = tokio::net::lookup_host(addr.addr_string())
            .await
            .map_err(|e| {
                WhoisError::connect(
                    ConnectErrorKind::DnsFailed,
                    format!("Failed to resolve {}: {}", addr.host, e),
                )
            })?
            .collect();

        let mut last_err = None;
        for target in targets {
            match self.async_dial_socket_addr(target).await {
                Ok(stream) => {
                    log::debug!("whois: connected to {} via {}", addr, target);
                    return Ok(Box::new(stream));
                }
                Err(e) => {
                    log::warn!("whois: dial {} ({}) failed: {}", addr, target, e);
                    last_err = Some(e);
                }
            }
        }

        Err(last_err.unwrap_or_else(|| {
            WhoisError::connect(
                ConnectErrorKind::DnsFailed,
                format!("No address found for {}", addr.host),
            )
        }))
    }
}
