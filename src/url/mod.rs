//! URL handling module for Nightcrawl
//!
//! Link normalization for the domain walk, host extraction and matching, and
//! the domain boundary checker.

mod boundary;
mod domain;
mod matcher;
mod normalize;

pub use boundary::{classify, Classification, ResourceKind, Scope};
pub use domain::{comparable_host, extract_domain, strip_www};
pub use matcher::host_matches;
pub use normalize::normalize_url;
