//! Top-level lookup entry points.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use crate::connector::{Conn, Connector, Direct, FnConnector, ProxyAuth, Socks5};
use crate::error::Result;
use crate::query::{query, LookupResult, WhoisOptions};
use crate::suffix::resolve_server;

#[cfg(feature = "async")]
use crate::connector::{AsyncConnector, AsyncDialFuture, AsyncFnConnector};
#[cfg(feature = "async")]
use crate::query::query_async;

/// Resolve the server for `domain` and run the query over `connector`.
///
/// Returns [`crate::WhoisError::NoServer`] without touching the network when
/// no suffix matches.
pub fn whois(
    domain: &str,
    connector: Arc<dyn Connector>,
    options: &WhoisOptions,
) -> Result<LookupResult> {
    let record = resolve_server(domain)?;
    query(domain, &record.server, connector, options)
}

/// Look up `domain` over a direct connection.
pub fn lookup(domain: &str) -> Result<LookupResult> {
    whois(domain, Arc::new(Direct::new()), &WhoisOptions::default())
}

/// Look up `domain` through the SOCKS5 proxy at `proxy_addr`.
///
/// `auth` can be `None` if the proxy requires no authentication.
pub fn lookup_via_proxy(
    domain: &str,
    proxy_addr: &str,
    auth: Option<ProxyAuth>,
) -> Result<LookupResult> {
    let connector = Socks5::with_optional_auth(proxy_addr, auth);
    whois(domain, Arc::new(connector), &WhoisOptions::default())
}

/// Look up `domain` using a caller-supplied dial function.
///
/// The function receives `host:port` and the connect timeout, and should
/// return within that timeout. The lookup fails with a timeout either way, but
/// a dial that never returns leaks the thread it runs on.
pub fn lookup_with_dialer<F>(domain: &str, dial: F) -> Result<LookupResult>
where
    F: Fn(&str, Duration) -> io::Result<Box<dyn Conn>> + Send + Sync + 'static,
{
    whois(
        domain,
        Arc::new(FnConnector::new(dial)),
        &WhoisOptions::default(),
    )
}

/// Look up `domain` over any connector.
pub fn lookup_with_connector<C>(domain: &str, connector: C) -> Result<LookupResult>
where
    C: Connector + 'static,
{
    whois(domain, Arc::new(connector), &WhoisOptions::default())
}

/// Async: resolve the server for `domain` and run the query over `connector`.
#[cfg(feature = "async")]
pub async fn whois_async(
    domain: &str,
    connector: &dyn AsyncConnector,
    options: &WhoisOptions,
) -> Result<LookupResult> {
    let record = resolve_server(domain)?;
    query_async(domain, &record.server, connector, options).await
}

/// Async: look up `domain` over a direct connection.
#[cfg(feature = "async")]
pub async fn lookup_async(domain: &str) -> Result<LookupResult> {
    whois_async(domain, &Direct::new(), &WhoisOptions::default()).await
}

/// Async: look up `domain` through a SOCKS5 proxy.
#[cfg(feature = "async")]
pub async fn lookup_via_proxy_async(
    domain: &str,
    proxy_addr: &str,
    auth: Option<ProxyAuth>,
) -> Result<LookupResult> {
    let connector = Socks5::with_optional_auth(proxy_addr, auth);
    whois_async(domain, &connector, &WhoisOptions::default()).await
}

/// Async: look up `domain` using a caller-supplied dial function.
#[cfg(feature = "async")]
pub async fn lookup_with_async_dialer<F>(domain: &str, dial: F) -> Result<LookupResult>
where
    F: Fn(String) -> AsyncDialFuture + Send + Sync,
{
    let connector = AsyncFnConnector::new(dial);
    whois_async(domain, &connector, &WhoisOptions::default()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WhoisError;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn test_unknown_suffix_skips_dial() {
        let dialed = Arc::new(AtomicBool::new(false));
        let dialed_clone = dialed.clone();
        let result = lookup_with_dialer("example.invalid", move |_: &str, _: Duration| {
            dialed_clone.store(true, Ordering::SeqCst);
            Err(io::Error::new(io::ErrorKind::Other, "should not dial"))
        });
        assert!(matches!(result, Err(WhoisError::NoServer(_))));
        assert!(!dialed.load(Ordering::SeqCst));
    }

    #[test]
    fn test_lookup_with_dialer_dials_registry_server() {
        let target = Arc::new(std::sync::Mutex::new(String::new()));
        let target_clone = target.clone();
        let result = lookup_with_dialer("example.io", move |addr: &str, _: Duration| {
            *target_clone.lock().unwrap() = addr.to_string();
            Err(io::Error::new(io::ErrorKind::ConnectionRefused, "refused"))
        });
        assert!(matches!(result, Err(WhoisError::ConnectError { .. })));
        assert_eq!(*target.lock().unwrap(), "whois.nic.io:43");
    }
}

#[cfg(all(test, feature = "async"))]
mod async_tests {
    use super::*;
    use crate::error::WhoisError;

    #[tokio::test]
    async fn test_async_unknown_suffix() {
        let result = lookup_with_async_dialer("example.invalid", |_: String| -> AsyncDialFuture {
            Box::pin(async { Err(io::Error::new(io::ErrorKind::Other, "should not dial")) })
        })
        .await;
        assert!(matches!(result, Err(WhoisError::NoServer(_))));
    }
}
