//! SOCKS5 proxy connector implementation.
//!
//! Tunnels the whois connection through a SOCKS5 proxy (RFC 1928), with
//! optional username/password authentication (RFC 1929).

use std::io::{self, Read, Write};
use std::net::{IpAddr, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

use crate::error::{ConnectErrorKind, Result, WhoisError};

use super::{deadline_after, Addr, Conn, Connector};

#[cfg(feature = "async")]
use super::{AsyncConn, AsyncConnector};
#[cfg(feature = "async")]
use async_trait::async_trait;
#[cfg(feature = "async")]
use tokio::io::{AsyncReadExt, AsyncWriteExt};
#[cfg(feature = "async")]
use tokio::net::TcpStream as TokioTcpStream;

const SOCKS5_VERSION: u8 = 0x05;
const SOCKS5_AUTH_NONE: u8 = 0x00;
const SOCKS5_AUTH_PASSWORD: u8 = 0x02;
const SOCKS5_AUTH_NO_ACCEPTABLE: u8 = 0xFF;
const SOCKS5_AUTH_SUBNEGOTIATION_VERSION: u8 = 0x01;

const SOCKS5_CMD_CONNECT: u8 = 0x01;

const SOCKS5_ATYP_IPV4: u8 = 0x01;
const SOCKS5_ATYP_DOMAIN: u8 = 0x03;
const SOCKS5_ATYP_IPV6: u8 = 0x04;

const SOCKS5_REP_SUCCESS: u8 = 0x00;

/// Username/password credentials for a SOCKS5 proxy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyAuth {
    pub username: String,
    pub password: String,
}

impl ProxyAuth {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

/// Build proxy credentials for [`crate::lookup_via_proxy`].
pub fn proxy_auth(username: &str, password: &str) -> ProxyAuth {
    ProxyAuth::new(username, password)
}

/// SOCKS5 proxy connector.
///
/// The target host is always sent to the proxy as given, so name resolution
/// of the whois server happens on the proxy side unless the host is already
/// an IP literal.
#[derive(Debug, Clone)]
pub struct Socks5 {
    /// Proxy server address (`host:port`)
    addr: String,
    /// Optional credentials
    auth: Option<ProxyAuth>,
    /// Upper bound on proxy connect plus handshake
    timeout: Option<Duration>,
}

impl Socks5 {
    /// Create a new unauthenticated SOCKS5 connector.
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            auth: None,
            timeout: None,
        }
    }

    /// Create a new SOCKS5 connector with authentication.
    pub fn with_auth(
        addr: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            addr: addr.into(),
            auth: Some(ProxyAuth::new(username, password)),
            timeout: None,
        }
    }

    /// Create a new SOCKS5 connector with optional credentials.
    pub fn with_optional_auth(addr: impl Into<String>, auth: Option<ProxyAuth>) -> Self {
        Self {
            addr: addr.into(),
            auth,
            timeout: None,
        }
    }

    /// Set handshake timeout.
    ///
    /// Caps the time spent reaching the proxy and completing the CONNECT
    /// exchange. A shorter timeout passed to `dial` still wins.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn handshake_timeout(&self, timeout: Duration) -> Duration {
        match self.timeout {
            Some(limit) => limit.min(timeout),
            None => timeout,
        }
    }

    /// Method selection message offered to the proxy.
    fn greeting(&self) -> Vec<u8> {
        if self.auth.is_some() {
            vec![SOCKS5_VERSION, 2, SOCKS5_AUTH_NONE, SOCKS5_AUTH_PASSWORD]
        } else {
            vec![SOCKS5_VERSION, 1, SOCKS5_AUTH_NONE]
        }
    }

    /// Username/password sub-negotiation request.
    fn auth_request(auth: &ProxyAuth) -> Result<Vec<u8>> {
        if auth.username.len() > 255 || auth.password.len() > 255 {
            return Err(WhoisError::connect(
                ConnectErrorKind::InvalidInput,
                "SOCKS5 username or password longer than 255 bytes",
            ));
        }
        let mut req = vec![SOCKS5_AUTH_SUBNEGOTIATION_VERSION];
        req.push(auth.username.len() as u8);
        req.extend(auth.username.as_bytes());
        req.push(auth.password.len() as u8);
        req.extend(auth.password.as_bytes());
        Ok(req)
    }

    /// CONNECT request for the target.
    fn connect_request(addr: &Addr) -> Result<Vec<u8>> {
        let (atyp, dst_addr) = addr_to_socks5(&addr.host)?;
        let mut req = vec![SOCKS5_VERSION, SOCKS5_CMD_CONNECT, 0x00, atyp];
        req.extend(&dst_addr);
        req.extend(&addr.port.to_be_bytes());
        Ok(req)
    }

    /// Credentials required by a proxy that selected password auth.
    fn required_auth(&self) -> Result<&ProxyAuth> {
        self.auth.as_ref().ok_or_else(|| {
            WhoisError::connect(
                ConnectErrorKind::AuthFailed,
                "Server requires authentication but no credentials provided",
            )
        })
    }

    fn proxy_socket_addrs(&self) -> Result<Vec<SocketAddr>> {
        let addrs: Vec<SocketAddr> = self
            .addr
            .to_socket_addrs()
            .map_err(|e| {
                WhoisError::connect(
                    ConnectErrorKind::InvalidInput,
                    format!("Invalid proxy address {}: {}", self.addr, e),
                )
            })?
            .collect();
        if addrs.is_empty() {
            return Err(WhoisError::connect(
                ConnectErrorKind::DnsFailed,
                format!("No address found for proxy {}", self.addr),
            ));
        }
        Ok(addrs)
    }

    /// Connect to the proxy and perform method negotiation.
    fn dial_and_negotiate(&self, deadline: Instant) -> Result<TcpStream> {
        let mut last_err = None;
        let mut connected = None;
        for proxy in self.proxy_socket_addrs()? {
            let remaining = remaining_until(deadline)?;
            match TcpStream::connect_timeout(&proxy, remaining) {
                Ok(stream) => {
                    connected = Some(stream);
                    break;
                }
                Err(e) => last_err = Some(e),
            }
        }
        let mut stream = match (connected, last_err) {
            (Some(stream), _) => stream,
            (None, Some(e)) => return Err(map_io("Failed to connect to proxy", e)),
            (None, None) => {
                return Err(WhoisError::connect(
                    ConnectErrorKind::ConnectionFailed,
                    "Failed to connect to proxy",
                ))
            }
        };

        set_stream_deadline(&stream, deadline)?;
        stream
            .write_all(&self.greeting())
            .map_err(|e| map_io("Failed to send negotiation", e))?;

        let mut resp = [0u8; 2];
        stream
            .read_exact(&mut resp)
            .map_err(|e| map_io("Failed to read negotiation response", e))?;
        check_version(resp[0])?;

        match resp[1] {
            SOCKS5_AUTH_NONE => {}
            SOCKS5_AUTH_PASSWORD => {
                let auth_req = Self::auth_request(self.required_auth()?)?;
                set_stream_deadline(&stream, deadline)?;
                stream
                    .write_all(&auth_req)
                    .map_err(|e| map_io("Failed to send auth", e))?;

                let mut auth_resp = [0u8; 2];
                stream
                    .read_exact(&mut auth_resp)
                    .map_err(|e| map_io("Failed to read auth response", e))?;
                check_auth_status(auth_resp[1])?;
            }
            method => return Err(unsupported_method(method)),
        }

        Ok(stream)
    }

    /// Send the CONNECT request and consume the reply.
    fn request(&self, stream: &mut TcpStream, addr: &Addr, deadline: Instant) -> Result<()> {
        let req = Self::connect_request(addr)?;
        set_stream_deadline(stream, deadline)?;
        stream
            .write_all(&req)
            .map_err(|e| map_io("Failed to send request", e))?;

        let mut resp_header = [0u8; 4];
        stream
            .read_exact(&mut resp_header)
            .map_err(|e| map_io("Failed to read response", e))?;
        check_reply(&resp_header)?;

        let len = match resp_header[3] {
            SOCKS5_ATYP_DOMAIN => {
                let mut len_buf = [0u8; 1];
                stream
                    .read_exact(&mut len_buf)
                    .map_err(|e| map_io("Failed to read domain length", e))?;
                len_buf[0] as usize
            }
            atyp => bound_addr_len(atyp)?,
        };
        // Bound address and port are not needed for a CONNECT tunnel
        let mut bound = vec![0u8; len + 2];
        stream
            .read_exact(&mut bound)
            .map_err(|e| map_io("Failed to read bound address", e))?;

        stream.set_read_timeout(None).ok();
        stream.set_write_timeout(None).ok();
        Ok(())
    }

    /// Async: Connect to the proxy and perform negotiation.
    #[cfg(feature = "async")]
    async fn async_dial_and_negotiate(&self) -> Result<TokioTcpStream> {
        let mut stream = TokioTcpStream::connect(self.addr.as_str())
            .await
            .map_err(|e| map_io("Failed to connect to proxy", e))?;

        stream
            .write_all(&self.greeting())
            .await
            .map_err(|e| map_io("Failed to send negotiation", e))?;

        let mut resp = [0u8; 2];
        stream
            .read_exact(&mut resp)
            .await
            .map_err(|e| map_io("Failed to read negotiation response", e))?;
        check_version(resp[0])?;

        match resp[1] {
            SOCKS5_AUTH_NONE => {}
            SOCKS5_AUTH_PASSWORD => {
                let auth_req = Self::auth_request(self.required_auth()?)?;
                stream
                    .write_all(&auth_req)
                    .await
                    .map_err(|e| map_io("Failed to send auth", e))?;

                let mut auth_resp = [0u8; 2];
                stream
                    .read_exact(&mut auth_resp)
                    .await
                    .map_err(|e| map_io("Failed to read auth response", e))?;
                check_auth_status(auth_resp[1])?;
            }
            method => return Err(unsupported_method(method)),
        }

        Ok(stream)
    }

    /// Async: Send the CONNECT request and consume the reply.
    #[cfg(feature = "async")]
    async fn async_request(&self, stream: &mut TokioTcpStream, addr: &Addr) -> Result<()> {
        let req = Self::connect_request(addr)?;
        stream
            .write_all(&req)
            .await
            .map_err(|e| map_io("Failed to send request", e))?;

        let mut resp_header = [0u8; 4];
        stream
            .read_exact(&mut resp_header)
            .await
            .map_err(|e| map_io("Failed to read response", e))?;
        check_reply(&resp_header)?;

        let len = match resp_header[3] {
            SOCKS5_ATYP_DOMAIN => stream
                .read_u8()
                .await
                .map_err(|e| map_io("Failed to read domain length", e))?
                as usize,
            atyp => bound_addr_len(atyp)?,
        };
        let mut bound = vec![0u8; len + 2];
        stream
            .read_exact(&mut bound)
            .await
            .map_err(|e| map_io("Failed to read bound address", e))?;
        Ok(())
    }
}

impl Connector for Socks5 {
    fn dial(&self, addr: &Addr, timeout: Duration) -> Result<Box<dyn Conn>> {
        let deadline = deadline_after(self.handshake_timeout(timeout))?;
        let mut stream = self.dial_and_negotiate(deadline)?;
        self.request(&mut stream, addr, deadline)?;
        log::debug!("whois: connected to {} via SOCKS5 proxy {}", addr, self.addr);
        Ok(Box::new(stream))
    }
}

#[cfg(feature = "async")]
#[async_trait]
impl AsyncConnector for Socks5 {
    async fn dial(&self, addr: &Addr) -> Result<Box<dyn AsyncConn>> {
        let handshake = async {
            let mut stream = self.async_dial_and_negotiate().await?;
            self.async_request(&mut stream, addr).await?;
            Ok::<_, WhoisError>(stream)
        };
        let stream = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, handshake).await.map_err(|_| {
                WhoisError::connect(ConnectErrorKind::Timeout, "SOCKS5 handshake timeout")
            })??,
            None => handshake.await?,
        };
        log::debug!("whois: connected to {} via SOCKS5 proxy {}", addr, self.addr);
        Ok(Box::new(stream))
    }
}

/// Convert a host to SOCKS5 address type and bytes.
fn addr_to_socks5(host: &str) -> Result<(u8, Vec<u8>)> {
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(match ip {
            IpAddr::V4(v4) => (SOCKS5_ATYP_IPV4, v4.octets().to_vec()),
            IpAddr::V6(v6) => (SOCKS5_ATYP_IPV6, v6.octets().to_vec()),
        });
    }
    let domain = host.as_bytes();
    if domain.is_empty() || domain.len() > 255 {
        return Err(WhoisError::connect(
            ConnectErrorKind::InvalidInput,
            format!("Invalid SOCKS5 target host: {:?}", host),
        ));
    }
    let mut addr = vec![domain.len() as u8];
    addr.extend(domain);
    Ok((SOCKS5_ATYP_DOMAIN, addr))
}

/// Length of a fixed-size bound address.
fn bound_addr_len(atyp: u8) -> Result<usize> {
    match atyp {
        SOCKS5_ATYP_IPV4 => Ok(4),
        SOCKS5_ATYP_IPV6 => Ok(16),
        atyp => Err(WhoisError::connect(
            ConnectErrorKind::Protocol,
            format!("Unknown address type: {}", atyp),
        )),
    }
}

fn check_version(version: u8) -> Result<()> {
    if version != SOCKS5_VERSION {
        return Err(WhoisError::connect(
            ConnectErrorKind::Protocol,
            format!("Invalid SOCKS version: {}", version),
        ));
    }
    Ok(())
}

fn check_auth_status(status: u8) -> Result<()> {
    if status != 0x00 {
        return Err(WhoisError::connect(
            ConnectErrorKind::AuthFailed,
            "SOCKS5 authentication failed",
        ));
    }
    Ok(())
}

fn check_reply(header: &[u8; 4]) -> Result<()> {
    check_version(header[0])?;
    if header[1] != SOCKS5_REP_SUCCESS {
        return Err(WhoisError::connect(
            ConnectErrorKind::Protocol,
            format!("SOCKS5 request failed: {}", rep_to_string(header[1])),
        ));
    }
    Ok(())
}

fn unsupported_method(method: u8) -> WhoisError {
    if method == SOCKS5_AUTH_NO_ACCEPTABLE {
        WhoisError::connect(
            ConnectErrorKind::AuthFailed,
            "No acceptable authentication method",
        )
    } else {
        WhoisError::connect(
            ConnectErrorKind::Protocol,
            format!("Unsupported authentication method: {}", method),
        )
    }
}

/// Convert reply code to string.
fn rep_to_string(rep: u8) -> &'static str {
    match rep {
        0x00 => "succeeded",
        0x01 => "general SOCKS server failure",
        0x02 => "connection not allowed by ruleset",
        0x03 => "network unreachable",
        0x04 => "host unreachable",
        0x05 => "connection refused",
        0x06 => "TTL expired",
        0x07 => "command not supported",
        0x08 => "address type not supported",
        _ => "undefined",
    }
}

fn map_io(context: &str, e: io::Error) -> WhoisError {
    let kind = match e.kind() {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => ConnectErrorKind::Timeout,
        _ => ConnectErrorKind::ConnectionFailed,
    };
    WhoisError::connect(kind, format!("{}: {}", context, e))
}

fn remaining_until(deadline: Instant) -> Result<Duration> {
    let remaining = deadline.saturating_duration_since(Instant::now());
    if remaining.is_zero() {
        return Err(WhoisError::connect(
            ConnectErrorKind::Timeout,
            "Connection timeout",
        ));
    }
    Ok(remaining)
}

fn set_stream_deadline(stream: &TcpStream, deadline: Instant) -> Result<()> {
    let remaining = remaining_until(deadline)?;
    stream.set_read_timeout(Some(remaining)).ok();
    stream.set_write_timeout(Some(remaining)).ok();
    Ok(())
}
