use std::net::IpAddr;

use url::Url;

/// Decide whether to verify TLS certificates for a media-server URL.
///
/// An explicit override (config or environment) always wins. Otherwise https
/// URLs pointing at local or private hosts default to no verification, since
/// home-lab servers almost never carry a valid certificate; everything else
/// verifies.
pub fn infer_tls_verify(url: Option<&str>, env_override: Option<bool>) -> bool {
    if let Some(v) = env_override {
        return v;
    }
    let Some(raw) = url else {
        return true;
    };
    let Ok(parsed) = Url::parse(raw) else {
        return true;
    };
    if parsed.scheme() != "https" {
        return true;
    }
    let Some(host) = parsed.host_str() else {
        return true;
    };

    if host == "localhost" {
        return false;
    }
    if let Ok(ip) = host.parse::<IpAddr>() {
        let private = match ip {
            IpAddr::V4(v4) => {
                v4.is_private() || v4.is_loopback() || v4.is_link_local()
            }
            IpAddr::V6(v6) => v6.is_loopback(),
        };
        if private {
            return false;
        }
        return true;
    }
    if host.ends_with(".local") || host.ends_with(".docker.internal") {
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_always_verifies() {
        assert!(infer_tls_verify(Some("http://192.168.1.2:32400"), None));
    }

    #[test]
    fn https_private_hosts_skip_verification() {
        assert!(!infer_tls_verify(Some("https://localhost:32400"), None));
        assert!(!infer_tls_verify(Some("https://127.0.0.1:32400"), None));
        assert!(!infer_tls_verify(Some("https://192.168.1.2:32400"), None));
        assert!(!infer_tls_verify(Some("https://10.0.0.5"), None));
        assert!(!infer_tls_verify(Some("https://plex.local:32400"), None));
        assert!(!infer_tls_verify(Some("https://host.docker.internal"), None));
    }

    #[test]
    fn https_public_hosts_verify() {
        assert!(infer_tls_verify(Some("https://plex.example.com:32400"), None));
        assert!(infer_tls_verify(Some("https://8.8.8.8"), None));
    }

    #[test]
    fn override_beats_heuristic() {
        assert!(infer_tls_verify(Some("https://localhost"), Some(true)));
        assert!(!infer_tls_verify(Some("https://plex.example.com"), Some(false)));
    }

    #[test]
    fn missing_or_bad_url_verifies() {
        assert!(infer_tls_verify(None, None));
        assert!(infer_tls_verify(Some("not a url"), None));
    }
}
