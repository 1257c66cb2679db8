use url::Url;

/// Extracts the lowercase host of a URL
///
/// Returns `None` for URLs without a host (e.g. `mailto:` or `data:` URLs).
///
/// # Examples
///
/// ```
/// use url::Url;
/// use sumi_harvest::url::extract_domain;
///
/// let url = Url::parse("https://EXAMPLE.COM:8080/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("example.com".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Derives the rate limiter key for an acquisition target
///
/// URL targets are keyed by their lowercase host so every path on a site
/// shares one admission bucket. Anything that does not parse as a URL with a
/// host is keyed by the trimmed target itself.
///
/// ```
/// use sumi_harvest::url::rate_limit_key;
///
/// assert_eq!(rate_limit_key("https://Docs.Example.com/a?b=c"), "docs.example.com");
/// assert_eq!(rate_limit_key("orcid:0000-0002"), "orcid:0000-0002");
/// ```
pub fn rate_limit_key(target: &str) -> String {
    let trimmed = target.trim();
    Url::parse(trimmed)
        .ok()
        .and_then(|url| extract_domain(&url))
        .unwrap_or_else(|| trimmed.to_string())
}

/// Checks a lowercase domain against a configured pattern
///
/// `example.com` matches only itself. `*.example.com` matches the bare
/// domain and any subdomain at any depth, but never a domain that merely
/// ends with the same characters (`myexample.com`).
pub fn matches_domain_pattern(pattern: &str, domain: &str) -> bool {
    match pattern.strip_prefix("*.") {
        Some(base) => {
            domain == base
                || domain
                    .strip_suffix(base)
                    .is_some_and(|prefix| prefix.ends_with('.'))
        }
        None => domain == pattern,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_domain_lowercases_and_drops_port() {
        let url = Url::parse("https://Blog.Example.COM:8443/post?x=1#frag").unwrap();
        assert_eq!(extract_domain(&url), Some("blog.example.com".to_string()));
    }

    #[test]
    fn test_extract_domain_without_host() {
        let url = Url::parse("mailto:someone@example.com").unwrap();
        assert_eq!(extract_domain(&url), None);
    }

    #[test]
    fn test_rate_limit_key_shares_host() {
        assert_eq!(
            rate_limit_key("https://example.com/people/1"),
            rate_limit_key("http://EXAMPLE.com/people/2")
        );
    }

    #[test]
    fn test_rate_limit_key_for_non_url_target() {
        assert_eq!(rate_limit_key("  doi:10.1000/182 "), "doi:10.1000/182");
        assert_eq!(rate_limit_key("not a url"), "not a url");
    }

    #[test]
    fn test_exact_pattern() {
        assert!(matches_domain_pattern("example.com", "example.com"));
        assert!(!matches_domain_pattern("example.com", "blog.example.com"));
        assert!(!matches_domain_pattern("example.com", "other.com"));
    }

    #[test]
    fn test_wildcard_pattern() {
        assert!(matches_domain_pattern("*.example.com", "example.com"));
        assert!(matches_domain_pattern("*.example.com", "blog.example.com"));
        assert!(matches_domain_pattern("*.example.com", "api.v2.example.com"));
        assert!(!matches_domain_pattern("*.example.com", "myexample.com"));
        assert!(!matches_domain_pattern("*.example.com", "example.com.org"));
        assert!(!matches_domain_pattern("*.example.com", ""));
    }
}
