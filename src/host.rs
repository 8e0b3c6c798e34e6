//! Turns user input into a hostname the inspector accepts.

use url::Url;

/// Strips an `http://` or `https://` scheme and a leading `www.` label.
///
/// Scheme-prefixed input is parsed as a URL so that a port, path or query
/// does not end up in the hostname. Returns `None` when nothing is left.
///
/// ```
/// # use certinspect::host::normalize;
/// assert_eq!(normalize("https://www.example.com/login"), Some("example.com".to_string()));
/// assert_eq!(normalize("example.org"), Some("example.org".to_string()));
/// assert_eq!(normalize("   "), None);
/// ```
pub fn normalize(input: &str) -> Option<String> {
    let input = input.trim();
    let host = if has_http_scheme(input) {
        match Url::parse(input) {
            Ok(url) => url
                .host_str()
                .map(|h| h.trim_start_matches('[').trim_end_matches(']').to_string())
                .unwrap_or_default(),
            Err(_) => input
                .split_once("://")
                .map(|(_, rest)| rest.to_string())
                .unwrap_or_default(),
        }
    } else {
        input.to_string()
    };

    let host = match host.get(..4) {
        Some(prefix) if prefix.eq_ignore_ascii_case("www.") => host[4..].to_string(),
        _ => host,
    };

    if host.is_empty() {
        None
    } else {
        Some(host)
    }
}

fn has_http_scheme(input: &str) -> bool {
    ["http://", "https://"].iter().any(|scheme| {
        input
            .get(..scheme.len())
            .map_or(false, |prefix| prefix.eq_ignore_ascii_case(scheme))
    })
}
