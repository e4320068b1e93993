use crate::UrlError;
use url::Url;

/// Query parameters that never select different content
const TRACKING_PARAMS: &[&str] = &["fbclid", "gclid", "mc_eid", "ref", "source"];

/// Normalizes a link so equivalent URLs deduplicate in the domain walk
///
/// The host is lowercased (by the parser) and kept otherwise; scheme and
/// `www.` are preserved because the server may only answer on that exact
/// origin. The fragment, tracking parameters, dot segments, repeated slashes
/// and a trailing slash are removed, and the remaining query pairs are sorted.
///
/// # Examples
///
/// ```
/// use nightcrawl::url::normalize_url;
///
/// let url = normalize_url("https://Example.COM/a/../news/?utm_source=x#top").unwrap();
/// assert_eq!(url.as_str(), "https://example.com/news");
/// ```
pub fn normalize_url(url_str: &str) -> Result<Url, UrlError> {
    let mut url = Url::parse(url_str).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(UrlError::MissingDomain);
    }

    let path = collapse_path(url.path());
    url.set_path(&path);
    url.set_fragment(None);

    if url.query().is_some() {
        let mut pairs: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(key, _)| !is_tracking_param(key))
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        pairs.sort();

        if pairs.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(pairs);
        }
    }

    Ok(url)
}

fn collapse_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    format!("/{}", segments.join("/"))
}

fn is_tracking_param(key: &str) -> bool {
    key.starts_with("utm_") || TRACKING_PARAMS.contains(&key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheme_and_www_preserved() {
        let result = normalize_url("http://www.example.com/page").unwrap();
        assert_eq!(result.as_str(), "http://www.example.com/page");
    }

    #[test]
    fn test_trailing_slash_and_root() {
        assert_eq!(
            normalize_url("https://example.com/page/").unwrap().as_str(),
            "https://example.com/page"
        );
        assert_eq!(
            normalize_url("https://example.com").unwrap().as_str(),
            "https://example.com/"
        );
    }

    #[test]
    fn test_fragment_removed() {
        let result = normalize_url("https://example.com/page#section").unwrap();
        assert_eq!(result.as_str(), "https://example.com/page");
    }

    #[test]
    fn test_tracking_params_removed_and_sorted() {
        let result = normalize_url(
            "https://example.com/page?keep=yes&utm_medium=email&another=value&fbclid=123",
        )
        .unwrap();
        assert_eq!(
            result.as_str(),
            "https://example.com/page?another=value&keep=yes"
        );

        let result = normalize_url("https://example.com/page?utm_source=a&gclid=c").unwrap();
        assert_eq!(result.as_str(), "https://example.com/page");
    }

    #[test]
    fn test_dot_segments_and_slashes() {
        assert_eq!(
            normalize_url("https://example.com/a/../b/./c").unwrap().as_str(),
            "https://example.com/b/c"
        );
        assert_eq!(
            normalize_url("https://example.com///path//to///page")
                .unwrap()
                .as_str(),
            "https://example.com/path/to/page"
        );
    }

    #[test]
    fn test_rejections() {
        assert!(matches!(
            normalize_url("ftp://example.com/page"),
            Err(UrlError::InvalidScheme(_))
        ));
        assert!(matches!(normalize_url("not a url"), Err(UrlError::Parse(_))));
    }
}
