//! URL utilities for joining server URLs with endpoint paths.

/// Normalize a base URL by removing trailing slashes
///
/// ```
/// use sherpa::utils::url::normalize_base_url;
///
/// assert_eq!(normalize_base_url("http://localhost:3333"), "http://localhost:3333");
/// assert_eq!(normalize_base_url("http://localhost:3333///"), "http://localhost:3333");
/// ```
pub fn normalize_base_url(base_url: &str) -> String {
    base_url.trim_end_matches('/').to_string()
}

/// Join a server URL and an endpoint path with exactly one slash between them.
///
/// ```
/// use sherpa::utils::url::join_endpoint_url;
///
/// assert_eq!(
///     join_endpoint_url("http://localhost:3333", "/command"),
///     "http://localhost:3333/command"
/// );
/// assert_eq!(
///     join_endpoint_url("http://localhost:3333/", "repl"),
///     "http://localhost:3333/repl"
/// );
/// ```
pub fn join_endpoint_url(base_url: &str, endpoint: &str) -> String {
    let normalized_base = normalize_base_url(base_url);
    let endpoint = endpoint.trim_start_matches('/');
    format!("{normalized_base}/{endpoint}")
}
