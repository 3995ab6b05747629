use thiserror::Error;

/// Classifies connection errors for programmatic matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectErrorKind {
    /// Connection to the remote host or proxy failed
    ConnectionFailed,
    /// Connect phase exceeded its timeout
    Timeout,
    /// Host name could not be resolved
    DnsFailed,
    /// Proxy authentication failed or was rejected
    AuthFailed,
    /// Proxy protocol error (bad version, refused request, etc.)
    Protocol,
    /// Input validation failed (bad address, oversized field, etc.)
    InvalidInput,
}

/// Whois error types
#[derive(Error, Debug)]
pub enum WhoisError {
    #[error("No whois server for {0}")]
    NoServer(String),

    #[error("Connect error: {message}")]
    ConnectError {
        kind: ConnectErrorKind,
        message: String,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Config error at line {line}: {message}")]
    ConfigError { line: usize, message: String },
}

impl WhoisError {
    pub(crate) fn connect(kind: ConnectErrorKind, message: impl Into<String>) -> Self {
        WhoisError::ConnectError {
            kind,
            message: message.into(),
        }
    }

    /// Returns true if the error was caused by the connect timeout or the
    /// response deadline elapsing.
    pub fn is_timeout(&self) -> bool {
        match self {
            WhoisError::ConnectError { kind, .. } => *kind == ConnectErrorKind::Timeout,
            WhoisError::IoError(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
            ),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, WhoisError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_error_kind_is_matchable() {
        let err = WhoisError::connect(ConnectErrorKind::AuthFailed, "SOCKS5 authentication failed");
        match &err {
            WhoisError::ConnectError { kind, .. } => {
                assert!(matches!(kind, ConnectErrorKind::AuthFailed));
            }
            _ => panic!("expected ConnectError"),
        }
    }

    #[test]
    fn test_no_server_display() {
        let err = WhoisError::NoServer("example.invalid".into());
        assert_eq!(err.to_string(), "No whois server for example.invalid");
    }

    #[test]
    fn test_config_error_display_includes_line() {
        let err = WhoisError::ConfigError {
            line: 3,
            message: "expected 2 columns, found 1".into(),
        };
        let display = format!("{}", err);
        assert!(display.contains("line 3"), "got: {}", display);
    }

    #[test]
    fn test_is_timeout() {
        let err = WhoisError::connect(ConnectErrorKind::Timeout, "Connection timeout");
        assert!(err.is_timeout());

        let err = WhoisError::from(std::io::Error::from(std::io::ErrorKind::TimedOut));
        assert!(err.is_timeout());

        let err = WhoisError::from(std::io::Error::from(std::io::ErrorKind::WouldBlock));
        assert!(err.is_timeout());

        let err = WhoisError::connect(ConnectErrorKind::ConnectionFailed, "refused");
        assert!(!err.is_timeout());

        assert!(!WhoisError::NoServer("x".into()).is_timeout());
    }
}
