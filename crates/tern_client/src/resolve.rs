/// Decide which server address a sync pass should use.
///
/// Resolution order: an address pushed by the server for the current
/// session wins; an empty or port-only (`":5000"`) value falls back to the
/// address of the currently connected host, keeping the pushed port when
/// one was given. With no host connection and nothing pushed there is no
/// address to resolve and the sync is skipped.
///
/// The scheme defaults to `http://` and a trailing slash is trimmed, so the
/// result can be used as a URL base directly.
pub fn resolve_server_url(
    override_url: Option<&str>,
    connected_host: Option<&str>,
    default_port: u16,
) -> Option<String> {
    let mut url = override_url.unwrap_or("").trim().to_string();

    if url.is_empty() || url.starts_with(':') {
        let host = connected_host?;
        // drop any port baked into the host address
        let host = host.split(':').next().unwrap_or(host);
        url = if url.starts_with(':') {
            format!("{host}{url}")
        } else {
            format!("{host}:{default_port}")
        };
    }

    let lower = url.to_ascii_lowercase();
    if !lower.starts_with("http://") && !lower.starts_with("https://") {
        url = format!("http://{url}");
    }

    Some(url.trim_end_matches('/').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pushed_address_wins() {
        assert_eq!(
            resolve_server_url(Some("http://sync.example.net:9000"), Some("10.0.0.2"), 5000),
            Some("http://sync.example.net:9000".to_string())
        );
    }

    #[test]
    fn port_only_override_uses_connected_host() {
        assert_eq!(
            resolve_server_url(Some(":9000"), Some("10.0.0.2:25565"), 5000),
            Some("http://10.0.0.2:9000".to_string())
        );
    }

    #[test]
    fn empty_override_uses_host_and_default_port() {
        assert_eq!(
            resolve_server_url(None, Some("play.example.net"), 5000),
            Some("http://play.example.net:5000".to_string())
        );
        assert_eq!(
            resolve_server_url(Some("  "), Some("play.example.net"), 5000),
            Some("http://play.example.net:5000".to_string())
        );
    }

    #[test]
    fn no_host_and_no_override_is_unresolvable() {
        assert_eq!(resolve_server_url(None, None, 5000), None);
        assert_eq!(resolve_server_url(Some(":9000"), None, 5000), None);
    }

    #[test]
    fn scheme_and_trailing_slash_are_normalized() {
        assert_eq!(
            resolve_server_url(Some("sync.example.net:5000/"), None, 5000),
            Some("http://sync.example.net:5000".to_string())
        );
        assert_eq!(
            resolve_server_url(Some("HTTPS://sync.example.net/"), None, 5000),
            Some("HTTPS://sync.example.net".to_string())
        );
    }
}
