//! URL handling module for Site-Harvest
//!
//! This module provides URL canonicalization (the crawl dedup key), host
//! extraction, and the allowed-domain check established by the seed URL.

mod canonical;

pub use canonical::{canonical_key, canonicalize_url};

use url::Url;

/// Extracts the lowercase host from a URL
///
/// # Examples
///
/// ```
/// use url::Url;
/// use site_harvest::url::extract_domain;
///
/// let url = Url::parse("https://EXAMPLE.COM:8080/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("example.com".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Checks whether `host` falls inside the allowed domain
///
/// A host is allowed when it equals the allowed domain or is one of its
/// subdomains. Matching is on label boundaries, so `notexample.com` is not
/// inside `example.com`.
pub fn is_allowed_host(allowed: &str, host: &str) -> bool {
    if allowed.is_empty() || host.is_empty() {
        return false;
    }
    host == allowed
        || host
            .strip_suffix(allowed)
            .is_some_and(|prefix| prefix.ends_with('.'))
}

/// The set of hosts link-following is restricted to
///
/// Established once from the seed URL. Resource fetches are not checked
/// against it.
#[derive(Debug, Clone)]
pub struct AllowedDomains {
    domains: Vec<String>,
}

impl AllowedDomains {
    /// Builds the allowed set from the seed URL's host
    pub fn from_seed(seed: &Url) -> Option<Self> {
        extract_domain(seed).map(|domain| Self {
            domains: vec![domain],
        })
    }

    /// Returns true if the URL's host is inside the allowed set
    pub fn allows(&self, url: &Url) -> bool {
        match extract_domain(url) {
            Some(host) => self.domains.iter().any(|d| is_allowed_host(d, &host)),
            None => false,
        }
    }

    /// The primary (seed) domain, used to root the mirrored content
    pub fn primary(&self) -> &str {
        &self.domains[0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_subdomain() {
        let url = Url::parse("https://blog.example.com/post").unwrap();
        assert_eq!(extract_domain(&url), Some("blog.example.com".to_string()));
    }

    #[test]
    fn test_exact_host_allowed() {
        assert!(is_allowed_host("example.com", "example.com"));
        assert!(!is_allowed_host("example.com", "other.com"));
    }

    #[test]
    fn test_subdomains_allowed() {
        assert!(is_allowed_host("example.com", "blog.example.com"));
        assert!(is_allowed_host("example.com", "api.v2.example.com"));
    }

    #[test]
    fn test_label_boundary_respected() {
        assert!(!is_allowed_host("example.com", "notexample.com"));
        assert!(!is_allowed_host("example.com", "example.com.evil.org"));
        assert!(!is_allowed_host("blog.example.com", "example.com"));
    }

    #[test]
    fn test_empty_strings() {
        assert!(!is_allowed_host("", "example.com"));
        assert!(!is_allowed_host("example.com", ""));
    }

    #[test]
    fn test_allowed_domains_from_seed() {
        let seed = Url::parse("https://Example.com/start").unwrap();
        let allowed = AllowedDomains::from_seed(&seed).unwrap();

        assert_eq!(allowed.primary(), "example.com");
        assert!(allowed.allows(&Url::parse("https://example.com/a").unwrap()));
        assert!(allowed.allows(&Url::parse("http://cdn.example.com/x.js").unwrap()));
        assert!(!allowed.allows(&Url::parse("https://example.org/").unwrap()));
    }

    #[test]
    fn test_ip_seed_host() {
        let seed = Url::parse("http://127.0.0.1:4000/").unwrap();
        let allowed = AllowedDomains::from_seed(&seed).unwrap();
        assert!(allowed.allows(&Url::parse("http://127.0.0.1:4000/page").unwrap()));
        assert!(!allowed.allows(&Url::parse("http://10.0.0.1/").unwrap()));
    }
}
