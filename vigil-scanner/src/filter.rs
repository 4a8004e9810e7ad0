//! Link filtering: decides which discovered URLs are worth visiting.

/// Asset extensions that never contain page text worth scoring.
const IGNORED_EXTENSIONS: [&str; 6] = [".pdf", ".svg", ".png", ".css", ".ico", ".js"];

/// Returns true when a discovered URL should be crawled.
///
/// A URL qualifies when it is same-domain or root-relative. The domain
/// check is a deliberately permissive substring test, not authority
/// parsing: any URL containing the base domain string anywhere passes.
/// URLs ending in a known asset extension are rejected regardless.
pub fn is_useful_link(url: &str, base_domain: &str) -> bool {
    if !url.contains(base_domain) && !url.starts_with('/') {
        return false;
    }

    !IGNORED_EXTENSIONS.iter().any(|ext| url.ends_with(ext))
}
