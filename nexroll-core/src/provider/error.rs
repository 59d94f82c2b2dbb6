use thiserror::Error;

/// Failures talking to a media server, classified so the engine can log a
/// stable kind label and keep ticking.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("server not configured: {0}")]
    NotConfigured(String),

    #[error("request timed out")]
    Timeout,

    #[error("TLS verification failed: {0}")]
    SslVerifyFailed(String),

    #[error("DNS resolution failed: {0}")]
    Dns(String),

    #[error("connection refused: {0}")]
    ConnRefused(String),

    #[error("host unreachable: {0}")]
    HostUnreachable(String),

    #[error("connection error: {0}")]
    Conn(String),

    #[error("authentication rejected (HTTP {0})")]
    Auth(u16),

    #[error("HTTP status {0}")]
    Http(u16),

    #[error("protocol error: {0}")]
    Protocol(String),
}

impl ProviderError {
    /// Stable classification label for log lines.
    pub fn kind(&self) -> String {
        match self {
            Self::NotConfigured(_) => "config".to_string(),
            Self::Timeout => "timeout".to_string(),
            Self::SslVerifyFailed(_) => "ssl_verify_failed".to_string(),
            Self::Dns(_) => "dns".to_string(),
            Self::ConnRefused(_) => "conn_refused".to_string(),
            Self::HostUnreachable(_) => "host_unreachable".to_string(),
            Self::Conn(_) => "conn_error".to_string(),
            Self::Auth(code) | Self::Http(code) => format!("http_{code}"),
            Self::Protocol(_) => "protocol".to_string(),
        }
    }

    pub fn from_status(code: u16) -> Self {
        match code {
            401 | 403 => Self::Auth(code),
            _ => Self::Http(code),
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return Self::Timeout;
        }
        if let Some(status) = err.status() {
            return Self::from_status(status.as_u16());
        }

        // Walk the source chain; reqwest wraps hyper/rustls/io errors and the
        // distinguishing detail only shows up in the message text.
        let mut detail = err.to_string();
        let mut source = std::error::Error::source(&err);
        while let Some(inner) = source {
            detail = format!("{detail}: {inner}");
            source = inner.source();
        }
        let lowered = detail.to_lowercase();

        if lowered.contains("certificate") || lowered.contains("tls") || lowered.contains("ssl") {
            Self::SslVerifyFailed(detail)
        } else if lowered.contains("dns") || lowered.contains("failed to lookup") {
            Self::Dns(detail)
        } else if lowered.contains("connection refused") {
            Self::ConnRefused(detail)
        } else if lowered.contains("unreachable") {
            Self::HostUnreachable(detail)
        } else {
            Self::Conn(detail)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_labels_are_stable() {
        assert_eq!(ProviderError::Timeout.kind(), "timeout");
        assert_eq!(ProviderError::Dns("x".into()).kind(), "dns");
        assert_eq!(ProviderError::ConnRefused("x".into()).kind(), "conn_refused");
        assert_eq!(ProviderError::Http(503).kind(), "http_503");
        assert_eq!(ProviderError::from_status(401).kind(), "http_401");
    }

    #[test]
    fn auth_statuses_classify_separately() {
        assert!(matches!(ProviderError::from_status(401), ProviderError::Auth(401)));
        assert!(matches!(ProviderError::from_status(403), ProviderError::Auth(403)));
        assert!(matches!(ProviderError::from_status(500), ProviderError::Http(500)));
    }
}
