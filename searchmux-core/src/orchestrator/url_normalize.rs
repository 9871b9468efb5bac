//! URL normalisation for result deduplication.
//!
//! Canonicalises URLs so that equivalent pages (differing only in scheme,
//! trailing slash, query-parameter order, tracking parameters, fragments,
//! or host capitalisation) compare as equal.

use url::Url;

/// Tracking query parameters that are stripped during normalisation.
const TRACKING_PARAMS: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "fbclid",
    "gclid",
    "ref",
    "si",
    "feature",
];

/// Normalise a URL, keeping its scheme.
///
/// 1. Lowercase scheme and host (path is preserved as-is).
/// 2. Remove default ports (`:80` for HTTP, `:443` for HTTPS).
/// 3. Remove trailing slash from the path (unless path is exactly `"/"`).
/// 4. Strip known tracking parameters (UTM, fbclid, gclid, etc.) and sort
///    the rest by key, then value.
/// 5. Remove the fragment.
///
/// If the input cannot be parsed as a URL it is returned trimmed.
///
/// # Examples
///
/// ```
/// use searchmux_core::orchestrator::url_normalize::normalize_url;
///
/// let a = normalize_url("https://Example.COM/path/?b=2&a=1#section");
/// let b = normalize_url("https://example.com/path?a=1&b=2");
/// assert_eq!(a, b);
/// ```
pub fn normalize_url(raw: &str) -> String {
    let raw = raw.trim();
    let Ok(mut parsed) = Url::parse(raw) else {
        return raw.to_string();
    };

    parsed.set_fragment(None);

    if is_default_port(&parsed) {
        let _ = parsed.set_port(None);
    }

    let mut params: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(key, _)| !TRACKING_PARAMS.contains(&key.to_lowercase().as_str()))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    params.sort();

    if params.is_empty() {
        parsed.set_query(None);
    } else {
        parsed.query_pairs_mut().clear().extend_pairs(&params);
    }

    let path = parsed.path().to_string();
    if path.len() > 1 && path.ends_with('/') {
        parsed.set_path(path.trim_end_matches('/'));
        if parsed.path().is_empty() {
            parsed.set_path("/");
        }
    }

    parsed.to_string()
}

/// Deduplication key: the normalised URL with its scheme removed, so
/// `http://` and `https://` copies of a page collapse together.
///
/// ```
/// use searchmux_core::orchestrator::url_normalize::dedup_key;
///
/// assert_eq!(
///     dedup_key("http://example.com/page"),
///     dedup_key("https://example.com/page/"),
/// );
/// ```
pub fn dedup_key(raw: &str) -> String {
    let normalized = normalize_url(raw);
    match normalized.split_once("://") {
        Some((_, rest)) => rest.to_string(),
        None => normalized,
    }
}

fn is_default_port(url: &Url) -> bool {
    matches!(
        (url.scheme(), url.port()),
        ("http", Some(80)) | ("https", Some(443))
    )
}
