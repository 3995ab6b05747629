//! Caller-supplied dialers.
//!
//! Lets callers route whois traffic over transports this crate does not know
//! about (Tor, a VPN socket, an instrumented fake in tests).

use std::io;
use std::time::Duration;

use crate::error::{ConnectErrorKind, Result, WhoisError};

use super::{Addr, Conn, Connector};

#[cfg(feature = "async")]
use super::{AsyncConn, AsyncConnector};
#[cfg(feature = "async")]
use async_trait::async_trait;
#[cfg(feature = "async")]
use std::future::Future;
#[cfg(feature = "async")]
use std::pin::Pin;

/// Connector wrapping a dial function.
///
/// The function receives the target as `host:port` together with the connect
/// timeout. Nothing is validated beyond invoking it.
///
/// The function should give up once the timeout elapses. A blocking
/// [`crate::query`] stops waiting on time regardless, but a dial that never
/// returns pins its helper thread and this connector for the life of the
/// process.
pub struct FnConnector<F> {
    dial: F,
}

impl<F> FnConnector<F>
where
    F: Fn(&str, Duration) -> io::Result<Box<dyn Conn>> + Send + Sync,
{
    pub fn new(dial: F) -> Self {
        Self { dial }
    }
}

impl<F> Connector for FnConnector<F>
where
    F: Fn(&str, Duration) -> io::Result<Box<dyn Conn>> + Send + Sync,
{
    fn dial(&self, addr: &Addr, timeout: Duration) -> Result<Box<dyn Conn>> {
        (self.dial)(&addr.addr_string(), timeout).map_err(|e| {
            let kind = if e.kind() == io::ErrorKind::TimedOut {
                ConnectErrorKind::Timeout
            } else {
                ConnectErrorKind::ConnectionFailed
            };
            WhoisError::connect(kind, format!("Failed to connect to {}: {}", addr, e))
        })
    }
}

/// Boxed future returned by an async dial function.
#[cfg(feature = "async")]
pub type AsyncDialFuture =
    Pin<Box<dyn Future<Output = io::Result<Box<dyn AsyncConn>>> + Send + 'static>>;

/// Async connector wrapping a dial function.
#[cfg(feature = "async")]
pub struct AsyncFnConnector<F> {
    dial: F,
}

#[cfg(feature = "async")]
impl<F> AsyncFnConnector<F>
where
    F: Fn(String) -> AsyncDialFuture + Send + Sync,
{
    pub fn new(dial: F) -> Self {
        Self { dial }
    }
}

#[cfg(feature = "async")]
#[async_trait]
impl<F> AsyncConnector for AsyncFnConnector<F>
where
    F: Fn(String) -> AsyncDialFuture + Send + Sync,
{
    async fn dial(&self, addr: &Addr) -> Result<Box<dyn AsyncConn>> {
        (self.dial)(addr.addr_string()).await.map_err(|e| {
            WhoisError::connect(
                ConnectErrorKind::ConnectionFailed,
                format!("Failed to connect to {}: {}", addr, e),
            )
        })
    }
}


#[cfg(all(test, feature = "async"))]
mod async_tests {
    use super::*;

    #[tokio::test]
    async fn test_async_fn_connector_error() {
        let connector = AsyncFnConnector::new(|addr: String| -> AsyncDialFuture {
            Box::pin(async move {
                Err(io::Error::new(
                    io::ErrorKind::ConnectionRefused,
                    format!("refused {}", addr),
                ))
            })
        });
        let result = AsyncConnector::dial(&connector, &Addr::new("whois.nic.io", 43)).await;
        match result {
            Err(e) => assert!(e.to_string().contains("refused whois.nic.io:43")),
            Ok(_) => panic!("Expected error"),
        }
    }
}
