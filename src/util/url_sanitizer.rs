use std::fmt;

use thiserror::Error;
use url::form_urlencoded;

/// Query parameter names that carry credentials. Matched exactly against the
/// percent-decoded key.
pub const TOKEN_QUERY_KEYS: [&str; 6] = [
    "token",
    "access_token",
    "auth_token",
    "api_key",
    "apikey",
    "key",
];

/// Host literals a CI server reports when it describes its own address.
pub const LOOPBACK_HOSTS: [&str; 2] = ["localhost", "127.0.0.1"];

const REDACTED: &str = "[REDACTED]";

/// Errors that can occur while splitting a URL into its components.
///
/// None of the variants carry the offending input: URLs reported by CI
/// servers routinely embed credentials, so only the failure kind is kept.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UrlError {
    /// The authority has a port that is not a number in `0..=65535`.
    #[error("Invalid port in URL authority")]
    InvalidPort,
    /// The authority has unbalanced brackets or a bracketed host that is
    /// not an IPv6 address.
    #[error("Invalid IPv6 host in URL authority")]
    InvalidIpv6,
}

/// A URL split along `scheme://userinfo@host:port/path;params?query#fragment`.
///
/// Userinfo is never stored, so every value rendered from `UrlParts` is
/// credential-free. Every other component borrows its text verbatim from the
/// input. `None` means the delimiter was absent and `Some("")` means it was
/// present with nothing after it, so a URL without credentials or token keys
/// renders back to exactly its input.
#[derive(Debug, Default, PartialEq, Eq)]
struct UrlParts<'a> {
    scheme: &'a str,
    host: Option<&'a str>,
    port: Option<&'a str>,
    path: &'a str,
    params: Option<&'a str>,
    query: Option<&'a str>,
    fragment: Option<&'a str>,
}

impl<'a> UrlParts<'a> {
    fn parse(input: &'a str) -> Result<Self, UrlError> {
        let (scheme, mut rest) = split_scheme(input);
        let mut parts = UrlParts {
            scheme,
            ..Default::default()
        };

        if let Some(after_slashes) = rest.strip_prefix("//") {
            let end = after_slashes
                .find(&['/', '?', '#'][..])
                .unwrap_or(after_slashes.len());
            let (authority, tail) = after_slashes.split_at(end);
            let (host, port) = parse_authority(authority)?;
            parts.host = Some(host);
            parts.port = port;
            rest = tail;
        }

        let (rest, fragment) = split_off(rest, '#');
        let (rest, query) = split_off(rest, '?');
        let (path, params) = split_params(rest);

        parts.path = path;
        parts.params = params;
        parts.query = query;
        parts.fragment = fragment;
        Ok(parts)
    }

    fn is_loopback(&self) -> bool {
        self.host.is_some_and(|host| LOOPBACK_HOSTS.contains(&host))
    }
}

impl fmt::Display for UrlParts<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.scheme.is_empty() {
            write!(f, "{}:", self.scheme)?;
        }
        if let Some(host) = self.host {
            write!(f, "//{host}")?;
            if let Some(port) = self.port {
                write!(f, ":{port}")?;
            }
        }
        f.write_str(self.path)?;
        if let Some(params) = self.params {
            write!(f, ";{params}")?;
        }
        if let Some(query) = self.query {
            write!(f, "?{query}")?;
        }
        if let Some(fragment) = self.fragment {
            write!(f, "#{fragment}")?;
        }
        Ok(())
    }
}

/// Splits a leading `scheme:` off the input. The scheme must start with a
/// letter and contain only letters, digits, `+`, `-` or `.`; anything else
/// means the input has no scheme.
fn split_scheme(input: &str) -> (&str, &str) {
    if let Some((candidate, rest)) = input.split_once(':') {
        let mut chars = candidate.chars();
        let starts_with_letter = chars.next().is_some_and(|c| c.is_ascii_alphabetic());
        if starts_with_letter
            && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        {
            return (candidate, rest);
        }
    }
    ("", input)
}

fn split_off(input: &str, delimiter: char) -> (&str, Option<&str>) {
    match input.split_once(delimiter) {
        Some((head, tail)) => (head, Some(tail)),
        None => (input, None),
    }
}

/// Splits an authority into host and raw port text, discarding any userinfo.
fn parse_authority(authority: &str) -> Result<(&str, Option<&str>), UrlError> {
    // Userinfo may itself contain '@', so only the last one delimits it
    let host_port = authority
        .rsplit_once('@')
        .map_or(authority, |(_, host_port)| host_port);

    let (host, port) = if let Some(bracketed) = host_port.strip_prefix('[') {
        let (address, after) = bracketed.split_once(']').ok_or(UrlError::InvalidIpv6)?;
        if !matches!(
            url::Host::parse(&format!("[{address}]")),
            Ok(url::Host::Ipv6(_))
        ) {
            return Err(UrlError::InvalidIpv6);
        }
        let port = match after {
            "" => None,
            other => Some(other.strip_prefix(':').ok_or(UrlError::InvalidPort)?),
        };
        (&host_port[..address.len() + 2], port)
    } else if host_port.contains(&['[', ']'][..]) {
        return Err(UrlError::InvalidIpv6);
    } else {
        match host_port.rsplit_once(':') {
            Some((host, port)) => (host, Some(port)),
            None => (host_port, None),
        }
    };

    if let Some(port) = port {
        validate_port(port)?;
    }
    Ok((host, port))
}

/// An empty port is allowed (`host:`); anything else must be a number in
/// `0..=65535`.
fn validate_port(raw: &str) -> Result<(), UrlError> {
    if raw.is_empty() {
        return Ok(());
    }
    if !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(UrlError::InvalidPort);
    }
    raw.parse::<u16>().map(|_| ()).map_err(|_| UrlError::InvalidPort)
}

/// Splits `;params` off the last path segment.
fn split_params(path: &str) -> (&str, Option<&str>) {
    let last_segment = path.rfind('/').unwrap_or(0);
    match path[last_segment..].find(';') {
        Some(offset) => {
            let split = last_segment + offset;
            (&path[..split], Some(&path[split + 1..]))
        }
        None => (path, None),
    }
}

/// Drops every `key=value` pair whose decoded key is a token key.
///
/// A query without token keys comes back untouched. Otherwise the surviving
/// pairs keep their original encoding and relative order, empty segments are
/// dropped, and `None` is returned when nothing survives.
fn scrub_query(query: &str) -> Option<String> {
    if !query.split('&').any(is_token_pair) {
        return Some(query.to_string());
    }

    let kept: Vec<&str> = query
        .split('&')
        .filter(|pair| !pair.is_empty() && !is_token_pair(pair))
        .collect();
    (!kept.is_empty()).then(|| kept.join("&"))
}

fn is_token_pair(pair: &str) -> bool {
    form_urlencoded::parse(pair.as_bytes())
        .next()
        .is_some_and(|(key, _)| TOKEN_QUERY_KEYS.contains(&key.as_ref()))
}

/// Strips credentials and token query parameters from a URL reported by a
/// feed, and points loopback hosts at a publicly reachable server.
///
/// When the URL's host is `localhost` or `127.0.0.1`, its host and port are
/// replaced by those of `main_url`, or of `feed_url` when `main_url` is
/// empty. If that replacement has no usable host, the loopback authority is
/// kept. Scheme, path, params and fragment are kept verbatim.
///
/// # Returns
///
/// The sanitized URL. An empty input yields an empty string. If the URL
/// cannot be split into components it is returned unchanged and a generic
/// warning is logged; the URL itself is never logged.
///
/// # Examples
///
/// ```
/// use cctray_monitor::util::sanitize_url;
///
/// assert_eq!(
///     sanitize_url(
///         "http://localhost:8080/build/123?token=abc&project=test",
///         "http://feed.example.com:8111/feed",
///         "http://main.example.com:9000",
///     ),
///     "http://main.example.com:9000/build/123?project=test"
/// );
/// ```
pub fn sanitize_url(url: &str, feed_url: &str, main_url: &str) -> String {
    if url.is_empty() {
        return String::new();
    }

    match try_sanitize(url, feed_url, main_url) {
        Ok(sanitized) => sanitized,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to sanitize URL, leaving it unchanged");
            url.to_string()
        }
    }
}

/// Renders `url` with credentials and token keys removed, for logs and
/// `Debug` output.
///
/// Unlike [`sanitize_url`], a URL that cannot be split is replaced by
/// `[REDACTED]` rather than returned as-is. Loopback hosts are left alone.
pub fn redact_url(url: &str) -> String {
    if url.is_empty() {
        return String::new();
    }
    try_sanitize(url, url, "").unwrap_or_else(|_| REDACTED.to_string())
}

fn try_sanitize(url: &str, feed_url: &str, main_url: &str) -> Result<String, UrlError> {
    let parts = UrlParts::parse(url)?;

    let (host, port) = if parts.is_loopback() {
        let replacement = if main_url.is_empty() { feed_url } else { main_url };
        match UrlParts::parse(replacement) {
            Ok(UrlParts {
                host: Some(host),
                port,
                ..
            }) if !host.is_empty() => (Some(host), port),
            Ok(_) => {
                tracing::warn!("Replacement URL has no host, keeping loopback host");
                (parts.host, parts.port)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to parse replacement URL, keeping loopback host");
                (parts.host, parts.port)
            }
        }
    } else {
        (parts.host, parts.port)
    };

    let query = parts.query.and_then(scrub_query);
    let sanitized = UrlParts {
        host,
        port,
        query: query.as_deref(),
        ..parts
    };
    Ok(sanitized.to_string())
}

/// Reduces a URL to `scheme://host[:port]`.
///
/// Credentials, path, params, query and fragment are all dropped, as is an
/// empty port. A scheme-less network location such as `//host:8111/path`
/// reduces to `//host:8111`. Empty or unparseable input yields an empty
/// string.
///
/// # Examples
///
/// ```
/// use cctray_monitor::util::base_url;
///
/// assert_eq!(
///     base_url("http://simple:pw@10.226.181.2:8111/httpAuth/app/rest/cctray/projects.xml"),
///     "http://10.226.181.2:8111"
/// );
/// ```
pub fn base_url(url: &str) -> String {
    if url.is_empty() {
        return String::new();
    }

    match UrlParts::parse(url) {
        Ok(parts) if parts.host.is_some() => UrlParts {
            scheme: parts.scheme,
            host: parts.host,
            port: parts.port.filter(|port| !port.is_empty()),
            ..Default::default()
        }
        .to_string(),
        Ok(_) => String::new(),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to extract base URL");
            String::new()
        }
    }
}
