//! Detail-page link discovery on the listing page
//!
//! # Link Filtering Rules
//!
//! **Keep** an `<a href>` target only if, once resolved against the listing URL:
//! - it is http(s) on the listing page's host and port
//! - its path starts with the configured path prefix
//! - it has at least `min-path-segments` non-empty path segments
//! - it contains none of the configured exclude patterns
//! - it is not the listing page itself
//!
//! **Ignore:**
//! - `javascript:`, `mailto:`, `tel:`, `data:` and fragment-only hrefs
//! - `<a href="..." download>`
//!
//! Fragments are dropped before comparison; results are deduplicated by exact
//! URL string in first-occurrence order.

use crate::config::SourceConfig;
use scraper::{Html, Selector};
use std::collections::HashSet;
use url::Url;

/// Extracts candidate detail-page URLs from listing page HTML
///
/// Zero links is not an error: an empty vector is returned.
///
/// # Example
///
/// ```
/// use marquee::config::SourceConfig;
/// use marquee::crawler::discover_links;
/// use url::Url;
///
/// let source = SourceConfig {
///     name: "TimeOut".to_string(),
///     listing_url: "https://www.timeout.com/sydney/events".to_string(),
///     path_prefix: "/sydney/".to_string(),
///     exclude_patterns: vec!["events/sydney".to_string()],
///     min_path_segments: 3,
///     default_city: "Sydney".to_string(),
///     utc_offset: "+10:00".to_string(),
/// };
/// let base = Url::parse(&source.listing_url).unwrap();
/// let html = r#"<a href="/sydney/music/jazz-night">Jazz</a><a href="/sydney/music">Music</a>"#;
///
/// let links = discover_links(html, &base, &source);
/// assert_eq!(links.len(), 1);
/// assert_eq!(links[0].as_str(), "https://www.timeout.com/sydney/music/jazz-night");
/// ```
pub fn discover_links(html: &str, base_url: &Url, source: &SourceConfig) -> Vec<Url> {
    let document = Html::parse_document(html);
    let Ok(a_selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    let listing = without_fragment(base_url);
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for element in document.select(&a_selector) {
        if element.value().attr("download").is_some() {
            continue;
        }

        let Some(href) = element.value().attr("href") else {
            continue;
        };

        let Some(url) = resolve_link(href, base_url) else {
            continue;
        };

        if url == listing || !is_detail_link(&url, base_url, source) {
            tracing::debug!(link = %url, "Ignoring non-detail link");
            continue;
        }

        if seen.insert(url.as_str().to_string()) {
            links.push(url);
        }
    }

    links
}

/// Resolves a link href to an absolute http(s) URL without fragment
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - fragment-only links
/// - Invalid URLs
/// - Non-HTTP(S) URLs after resolution
fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lowered = href.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| lowered.starts_with(scheme))
    {
        return None;
    }

    let absolute = base_url.join(href).ok()?;
    match absolute.scheme() {
        "http" | "https" => Some(without_fragment(&absolute)),
        _ => None,
    }
}

fn without_fragment(url: &Url) -> Url {
    let mut url = url.clone();
    url.set_fragment(None);
    url
}

fn is_detail_link(url: &Url, base_url: &Url, source: &SourceConfig) -> bool {
    if url.host_str() != base_url.host_str()
        || url.port_or_known_default() != base_url.port_or_known_default()
    {
        return false;
    }

    if !url.path().starts_with(&source.path_prefix) {
        return false;
    }

    let segments = url
        .path_segments()
        .map(|segments| segments.filter(|s| !s.is_empty()).count())
        .unwrap_or(0);
    if segments < source.min_path_segments {
        return false;
    }

    !source
        .exclude_patterns
        .iter()
        .any(|pattern| url.as_str().contains(pattern.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> SourceConfig {
        SourceConfig {
            name: "TimeOut".to_string(),
            listing_url: "https://www.timeout.com/sydney/events".to_string(),
            path_prefix: "/sydney/".to_string(),
            exclude_patterns: vec!["events/sydney".to_string()],
            min_path_segments: 3,
            default_city: "Sydney".to_string(),
            utc_offset: "+10:00".to_string(),
        }
    }

    fn base_url() -> Url {
        Url::parse("https://www.timeout.com/sydney/events").unwrap()
    }

    fn discover(html: &str) -> Vec<String> {
        discover_links(html, &base_url(), &source())
            .into_iter()
            .map(|u| u.to_string())
            .collect()
    }

    #[test]
    fn test_keeps_detail_links() {
        let links = discover(
            r#"<a href="/sydney/music/jazz-night">A</a>
               <a href="https://www.timeout.com/sydney/art/late-gallery">B</a>"#,
        );
        assert_eq!(
            links,
            vec![
                "https://www.timeout.com/sydney/music/jazz-night",
                "https://www.timeout.com/sydney/art/late-gallery",
            ]
        );
    }

    #[test]
    fn test_deduplicates_in_first_occurrence_order() {
        let links = discover(
            r#"<a href="/sydney/music/a">A</a>
               <a href="/sydney/music/b">B</a>
               <a href="/sydney/music/a">A again</a>"#,
        );
        assert_eq!(
            links,
            vec![
                "https://www.timeout.com/sydney/music/a",
                "https://www.timeout.com/sydney/music/b",
            ]
        );
    }

    #[test]
    fn test_fragments_dropped_before_dedup() {
        let links = discover(
            r#"<a href="/sydney/music/a#tickets">A</a>
               <a href="/sydney/music/a">A</a>"#,
        );
        assert_eq!(links, vec!["https://www.timeout.com/sydney/music/a"]);
    }

    #[test]
    fn test_rejects_other_sites_and_prefixes() {
        let links = discover(
            r#"<a href="https://other.com/sydney/music/a">Other host</a>
               <a href="/melbourne/music/a">Other city</a>
               <a href="http://www.timeout.com:8080/sydney/music/a">Other port</a>"#,
        );
        assert!(links.is_empty());
    }

    #[test]
    fn test_rejects_index_pages() {
        let links = discover(
            r#"<a href="/sydney/events">Listing</a>
               <a href="/sydney/music">Section</a>
               <a href="/sydney/events/sydney/weekend">Excluded</a>"#,
        );
        assert!(links.is_empty());
    }

    #[test]
    fn test_skips_non_navigational_links() {
        let links = discover(
            r##"<a href="javascript:void(0)">JS</a>
               <a href="mailto:test@example.com">Mail</a>
               <a href="tel:+61200000000">Call</a>
               <a href="data:text/html,hi">Data</a>
               <a href="#top">Top</a>
               <a href="/sydney/music/brochure.pdf" download>File</a>"##,
        );
        assert!(links.is_empty());
    }

    #[test]
    fn test_no_links_is_empty() {
        assert!(discover("<html><body><p>Nothing here</p></body></html>").is_empty());
    }
}
