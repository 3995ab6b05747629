//! Whois request/response exchange.
//!
//! A query is a single-shot exchange: dial the server, write the domain
//! followed by CRLF, read until the server closes the connection. The connect
//! phase and the response phase are bounded by separate timeouts; the
//! response timeout is one deadline covering both the write and the read.

use std::io::{self, Read, Write};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::connector::{deadline_after, Addr, Conn, Connector};
use crate::error::{ConnectErrorKind, Result, WhoisError};

#[cfg(feature = "async")]
use crate::connector::AsyncConnector;
#[cfg(feature = "async")]
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Well-known whois port
pub const WHOIS_PORT: u16 = 43;

/// Time allowed for establishing the connection
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(12);

/// Time allowed for sending the query and receiving the full response
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(30);

const READ_CHUNK_SIZE: usize = 4096;

/// Query settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WhoisOptions {
    /// Server port
    pub port: u16,
    /// Connect phase timeout
    pub connect_timeout: Duration,
    /// Write + read deadline, counted from a successful connect
    pub response_timeout: Duration,
}

impl Default for WhoisOptions {
    fn default() -> Self {
        Self {
            port: WHOIS_PORT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
        }
    }
}

impl WhoisOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set server port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set response timeout.
    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }
}

/// Outcome of a successful lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LookupResult {
    /// Whois server that answered
    pub server: String,
    /// Raw response text, uninterpreted
    pub response: String,
}

/// Query `server` for `domain` over a connection from `connector`.
///
/// The dial runs on a helper thread so the connect timeout holds even for
/// connectors that ignore the timeout they are given. A connection produced
/// after the timeout is dropped, closing it. A dial that never returns keeps
/// its helper thread alive, so connectors should honour the timeout too.
///
/// Timeouts too large to express as a deadline are rejected up front with
/// [`ConnectErrorKind::InvalidInput`].
pub fn query(
    domain: &str,
    server: &str,
    connector: Arc<dyn Connector>,
    options: &WhoisOptions,
) -> Result<LookupResult> {
    check_timeouts(options)?;
    let addr = Addr::new(server, options.port);
    let mut conn = dial_with_timeout(connector, &addr, options.connect_timeout)?;

    let deadline = deadline_after(options.response_timeout)?;
    let result = exchange(conn.as_mut(), domain, deadline);
    conn.shutdown().ok();
    let raw = result?;

    log::debug!("whois: read {} bytes from {}", raw.len(), addr);
    Ok(LookupResult {
        server: server.to_string(),
        response: String::from_utf8_lossy(&raw).into_owned(),
    })
}

fn check_timeouts(options: &WhoisOptions) -> Result<()> {
    deadline_after(options.connect_timeout)?;
    deadline_after(options.response_timeout)?;
    Ok(())
}

fn dial_with_timeout(
    connector: Arc<dyn Connector>,
    addr: &Addr,
    timeout: Duration,
) -> Result<Box<dyn Conn>> {
    let (tx, rx) = mpsc::channel();
    let target = addr.clone();
    thread::spawn(move || {
        let _ = tx.send(connector.dial(&target, timeout));
    });

    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(mpsc::RecvTimeoutError::Timeout) => Err(WhoisError::connect(
            ConnectErrorKind::Timeout,
            format!("Connection to {} timed out after {:?}", addr, timeout),
        )),
        Err(mpsc::RecvTimeoutError::Disconnected) => Err(WhoisError::connect(
            ConnectErrorKind::ConnectionFailed,
            format!("Dialer for {} exited without a result", addr),
        )),
    }
}

/// Write the query and read the whole response before `deadline`.
fn exchange(conn: &mut dyn Conn, domain: &str, deadline: Instant) -> Result<Vec<u8>> {
    conn.set_write_timeout(Some(remaining(deadline)?))?;
    conn.write_all(request_line(domain).as_bytes())?;
    conn.flush()?;

    let mut response = Vec::new();
    let mut chunk = [0u8; READ_CHUNK_SIZE];
    loop {
        conn.set_read_timeout(Some(remaining(deadline)?))?;
        match conn.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => response.extend_from_slice(&chunk[..n]),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(response)
}

fn remaining(deadline: Instant) -> Result<Duration> {
    let left = deadline.saturating_duration_since(Instant::now());
    if left.is_zero() {
        return Err(io::Error::new(io::ErrorKind::TimedOut, "response deadline exceeded").into());
    }
    Ok(left)
}

fn request_line(domain: &str) -> String {
    format!("{}\r\n", domain)
}

/// Async: query `server` for `domain` over a connection from `connector`.
#[cfg(feature = "async")]
pub async fn query_async(
    domain: &str,
    server: &str,
    connector: &dyn AsyncConnector,
    options: &WhoisOptions,
) -> Result<LookupResult> {
    check_timeouts(options)?;
    let addr = Addr::new(server, options.port);
    let mut conn = tokio::time::timeout(options.connect_timeout, connector.dial(&addr))
        .await
        .map_err(|_| {
            WhoisError::connect(
                ConnectErrorKind::Timeout,
                format!(
                    "Connection to {} timed out after {:?}",
                    addr, options.connect_timeout
                ),
            )
        })??;

    let deadline = tokio::time::Instant::from_std(deadline_after(options.response_timeout)?);
    let exchange = async {
        conn.write_all(request_line(domain).as_bytes()).await?;
        conn.flush().await?;
        let mut response = Vec::new();
        conn.read_to_end(&mut response).await?;
        Ok::<_, io::Error>(response)
    };
    let raw = tokio::time::timeout_at(deadline, exchange)
        .await
        .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "response deadline exceeded"))??;
    conn.shutdown().await.ok();

    log::debug!("whois: read {} bytes from {}", raw.len(), addr);
    Ok(LookupResult {
        server: server.to_string(),
        response: String::from_utf8_lossy(&raw).into_owned(),
    })
}
