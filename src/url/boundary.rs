use crate::state::Domain;
use crate::url::domain::{comparable_host, strip_www};
use crate::url::matcher::host_matches;
use url::Url;

/// Extensions fetched as files rather than crawled as pages
const DOWNLOAD_EXTENSIONS: &[&str] = &[
    "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "zip", "txt", "csv", "json", "xml",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    InScope,
    OutOfScope,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Crawlable,
    DirectDownload,
}

/// Result of a boundary check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Classification {
    pub scope: Scope,
    pub kind: ResourceKind,
}

impl Classification {
    const REJECTED: Self = Self {
        scope: Scope::OutOfScope,
        kind: ResourceKind::Crawlable,
    };

    /// In-scope page that the walk may fetch
    pub fn is_crawlable(&self) -> bool {
        self.scope == Scope::InScope && self.kind == ResourceKind::Crawlable
    }

    /// In-scope file to hand to the sink as a download candidate
    pub fn is_download(&self) -> bool {
        self.scope == Scope::InScope && self.kind == ResourceKind::DirectDownload
    }
}

/// Classifies a candidate URL against a domain's boundary rules
///
/// A host is in scope when it equals the root, is a subdomain of it (if the
/// domain allows subdomains), or equals or sits under a declared derivative.
/// A single leading `www.` is ignored on both sides. A URL with a download
/// extension is in scope on any host when the domain allows file downloads
/// and the referring page was in scope; otherwise the host rules apply.
///
/// Malformed URLs and non-HTTP(S) schemes are `OutOfScope`.
///
/// # Examples
///
/// ```
/// use nightcrawl::state::Domain;
/// use nightcrawl::url::{classify, ResourceKind, Scope};
///
/// let domain = Domain::new("example.com");
/// let c = classify(&domain, "https://blog.example.com/post", true);
/// assert_eq!((c.scope, c.kind), (Scope::InScope, ResourceKind::Crawlable));
///
/// let c = classify(&domain, "https://example.org/", true);
/// assert_eq!(c.scope, Scope::OutOfScope);
/// ```
pub fn classify(domain: &Domain, candidate: &str, referrer_in_scope: bool) -> Classification {
    let Ok(url) = Url::parse(candidate) else {
        return Classification::REJECTED;
    };
    if url.scheme() != "http" && url.scheme() != "https" {
        return Classification::REJECTED;
    }
    let Some(host) = comparable_host(&url) else {
        return Classification::REJECTED;
    };

    let kind = if has_download_extension(&url) {
        ResourceKind::DirectDownload
    } else {
        ResourceKind::Crawlable
    };

    let download_pass =
        kind == ResourceKind::DirectDownload && domain.allow_file_downloads && referrer_in_scope;

    let scope = if download_pass || host_in_scope(domain, &host) {
        Scope::InScope
    } else {
        Scope::OutOfScope
    };

    Classification { scope, kind }
}

fn host_in_scope(domain: &Domain, host: &str) -> bool {
    if host_matches(strip_www(&domain.root), host, domain.allow_subdomains) {
        return true;
    }
    domain
        .derivatives
        .iter()
        .any(|derivative| host_matches(strip_www(derivative), host, true))
}

fn has_download_extension(url: &Url) -> bool {
    let last = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or("");
    match last.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => {
            let ext = ext.to_ascii_lowercase();
            DOWNLOAD_EXTENSIONS.contains(&ext.as_str())
        }
        _ => false,
    }
}
