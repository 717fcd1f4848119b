use crate::UrlError;
use url::Url;

/// Computes the canonical form of a URL, used as the deduplication key
///
/// # Canonicalization Steps
///
/// 1. Parse the URL; reject if malformed
/// 2. Accept only `http` and `https`
/// 3. Require a host (the `url` crate lowercases it and drops default ports)
/// 4. Remove the fragment
///
/// Dot segments are resolved and an empty path becomes `/` during parsing.
/// The query string is kept verbatim: two URLs differing only in query are
/// distinct resources.
///
/// # Examples
///
/// ```
/// use site_harvest::url::canonicalize_url;
///
/// let url = canonicalize_url("HTTP://Example.COM:80/a/../b#top").unwrap();
/// assert_eq!(url.as_str(), "http://example.com/b");
/// ```
pub fn canonicalize_url(url_str: &str) -> Result<Url, UrlError> {
    let mut url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(UrlError::MissingDomain);
    }

    url.set_fragment(None);

    Ok(url)
}

/// Canonicalizes an already parsed URL, returning it as a dedup key string
pub fn canonical_key(url: &Url) -> String {
    let mut url = url.clone();
    url.set_fragment(None);
    url.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keeps_scheme() {
        let result = canonicalize_url("http://example.com/page").unwrap();
        assert_eq!(result.as_str(), "http://example.com/page");
    }

    #[test]
    fn test_remove_fragment() {
        let result = canonicalize_url("https://example.com/page#section").unwrap();
        assert_eq!(result.as_str(), "https://example.com/page");
    }

    #[test]
    fn test_lowercase_domain() {
        let result = canonicalize_url("https://EXAMPLE.COM/Page").unwrap();
        assert_eq!(result.as_str(), "https://example.com/Page");
    }

    #[test]
    fn test_default_port_dropped() {
        let result = canonicalize_url("https://example.com:443/").unwrap();
        assert_eq!(result.as_str(), "https://example.com/");

        let result = canonicalize_url("http://example.com:8080/").unwrap();
        assert_eq!(result.as_str(), "http://example.com:8080/");
    }

    #[test]
    fn test_normalize_path_with_dots() {
        let result = canonicalize_url("https://example.com/a/../b/./c").unwrap();
        assert_eq!(result.as_str(), "https://example.com/b/c");
    }

    #[test]
    fn test_query_preserved() {
        let result = canonicalize_url("https://example.com/page?b=2&a=1").unwrap();
        assert_eq!(result.as_str(), "https://example.com/page?b=2&a=1");
    }

    #[test]
    fn test_empty_path_becomes_root() {
        let result = canonicalize_url("https://example.com").unwrap();
        assert_eq!(result.as_str(), "https://example.com/");
    }

    #[test]
    fn test_trailing_slash_is_significant() {
        let with = canonicalize_url("https://example.com/a/").unwrap();
        let without = canonicalize_url("https://example.com/a").unwrap();
        assert_ne!(with, without);
    }

    #[test]
    fn test_invalid_scheme() {
        let result = canonicalize_url("ftp://example.com/page");
        assert!(matches!(result.unwrap_err(), UrlError::InvalidScheme(_)));
    }

    #[test]
    fn test_malformed_url() {
        assert!(matches!(
            canonicalize_url("not a url").unwrap_err(),
            UrlError::Parse(_)
        ));
    }

    #[test]
    fn test_canonical_key_strips_fragment() {
        let url = Url::parse("https://example.com/x#frag").unwrap();
        assert_eq!(canonical_key(&url), "https://example.com/x");
    }
}
