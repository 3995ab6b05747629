//! whois-r - Whois client for Rust
//!
//! This library queries the authoritative whois server of a domain's suffix
//! over TCP port 43 and returns the raw response text:
//! - Embedded suffix -> server table, first match in table order wins
//! - Direct, SOCKS5-proxied, or caller-supplied connections
//! - Connect timeout (12s) and a single response deadline (30s)
//! - Blocking API, plus an async API on tokio behind the `async` feature
//!
//! # Example
//!
//! ```rust,no_run
//! use whois_r::{lookup, lookup_via_proxy, proxy_auth};
//!
//! // Direct connection
//! let result = lookup("example.com").unwrap();
//! println!("{} answered:\n{}", result.server, result.response);
//!
//! // Through an authenticated SOCKS5 proxy
//! let auth = proxy_auth("alice", "secret");
//! let result = lookup_via_proxy("example.com", "127.0.0.1:1080", Some(auth)).unwrap();
//! println!("{}", result.response);
//! ```
//!
//! # Custom dialers
//!
//! ```rust,no_run
//! use std::net::TcpStream;
//! use std::time::Duration;
//! use whois_r::{lookup_with_dialer, Conn};
//!
//! let result = lookup_with_dialer("example.com", |addr: &str, _timeout: Duration| {
//!     let stream = TcpStream::connect(addr)?;
//!     Ok(Box::new(stream) as Box<dyn Conn>)
//! });
//! ```
//!
//! The response is never parsed; referral lines such as `refer:` are left for
//! the caller to follow.

pub mod connector;
pub mod error;
pub mod lookup;
pub mod query;
pub mod suffix;

// Re-export commonly used items
pub use error::{ConnectErrorKind, Result, WhoisError};
pub use lookup::{lookup, lookup_via_proxy, lookup_with_connector, lookup_with_dialer, whois};
pub use query::{
    query, LookupResult, WhoisOptions, DEFAULT_CONNECT_TIMEOUT, DEFAULT_RESPONSE_TIMEOUT,
    WHOIS_PORT,
};
pub use suffix::{resolve_server, suffix_table, SuffixRecord, SuffixTable};

// Re-export connector types
pub use connector::{
    proxy_auth, Addr, Conn, Connector, Direct, DirectOptions, FnConnector, ProxyAuth, Socks5,
};

#[cfg(feature = "async")]
pub use connector::{AsyncConn, AsyncConnector, AsyncDialFuture, AsyncFnConnector};
#[cfg(feature = "async")]
pub use lookup::{
    lookup_async, lookup_via_proxy_async, lookup_with_async_dialer, whois_async,
};
#[cfg(feature = "async")]
pub use query::query_async;
