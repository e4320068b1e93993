/// Checks whether `candidate` is `base` or, when allowed, one of its subdomains
///
/// Both sides are expected to be lowercase with any `www.` already removed.
///
/// # Examples
///
/// ```
/// use nightcrawl::url::host_matches;
///
/// assert!(host_matches("example.com", "example.com", false));
/// assert!(host_matches("example.com", "api.v2.example.com", true));
/// assert!(!host_matches("example.com", "api.example.com", false));
/// assert!(!host_matches("example.com", "notexample.com", true));
/// ```
pub fn host_matches(base: &str, candidate: &str, include_subdomains: bool) -> bool {
    if base.is_empty() || candidate.is_empty() {
        return false;
    }
    if candidate == base {
        return true;
    }
    include_subdomains
        && candidate.len() > base.len()
        && candidate.ends_with(base)
        && candidate.as_bytes()[candidate.len() - base.len() - 1] == b'.'
}
