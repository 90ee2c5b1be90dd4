//! Link extraction from schedule listing pages.

use std::collections::HashSet;
use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use url::Url;

static ANCHOR_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("valid selector"));

/// A schedule PDF linked from a listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentLink {
    /// Document name, e.g. `April 6th - 10th`. Drives date resolution.
    pub name: String,
    pub url: Url,
}

impl DocumentLink {
    /// Build a link for a URL that points straight at a PDF.
    pub fn from_url(url: Url) -> Self {
        let name = file_stem(&url).unwrap_or_else(|| url.to_string());
        Self { name, url }
    }
}

/// Every anchor on the page whose resolved path ends in `.pdf`.
///
/// Deduplicated by URL, in page order. The name is the percent-decoded file
/// stem, or the anchor text when the stem is empty.
pub fn find_document_links(html: &str, base: &Url) -> Vec<DocumentLink> {
    let doc = Html::parse_document(html);
    let mut seen = HashSet::new();

    resolved_anchors(&doc, base)
        .filter(|(_, url)| is_pdf(url))
        .filter(|(_, url)| seen.insert(url.to_string()))
        .map(|(anchor, url)| {
            let name = file_stem(&url).unwrap_or_else(|| anchor_text(&anchor));
            DocumentLink { name, url }
        })
        .filter(|link| !link.name.is_empty())
        .collect()
}

/// Non-PDF anchors whose text mentions "download": pages that list further
/// documents. The page itself is excluded.
pub fn find_download_pages(html: &str, base: &Url) -> Vec<Url> {
    let doc = Html::parse_document(html);
    let mut seen = HashSet::from([base.to_string()]);

    resolved_anchors(&doc, base)
        .filter(|(_, url)| !is_pdf(url))
        .filter(|(anchor, _)| anchor_text(anchor).to_lowercase().contains("download"))
        .filter(|(_, url)| seen.insert(url.to_string()))
        .map(|(_, url)| url)
        .collect()
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Anchors with an http(s) target, resolved against `base`, fragment stripped.
fn resolved_anchors<'a>(
    doc: &'a Html,
    base: &'a Url,
) -> impl Iterator<Item = (ElementRef<'a>, Url)> + 'a {
    doc.select(&ANCHOR_SEL).filter_map(move |el| {
        let href = el.value().attr("href")?.trim();
        if href.starts_with('#') || href.starts_with("javascript:") || href.starts_with("mailto:")
        {
            return None;
        }
        let mut url = base.join(href).ok()?;
        if !matches!(url.scheme(), "http" | "https") {
            return None;
        }
        url.set_fragment(None);
        Some((el, url))
    })
}

fn is_pdf(url: &Url) -> bool {
    url.path().to_ascii_lowercase().ends_with(".pdf")
}

/// Percent-decoded last path segment without its `.pdf` extension.
fn file_stem(url: &Url) -> Option<String> {
    let segment = url.path_segments()?.next_back()?;
    let decoded = urlencoding::decode(segment).ok()?;
    let stem = match decoded.len().checked_sub(4) {
        Some(cut) if decoded.is_char_boundary(cut) && decoded[cut..].eq_ignore_ascii_case(".pdf") => {
            &decoded[..cut]
        }
        _ => &decoded[..],
    };
    let stem = stem.trim();
    (!stem.is_empty()).then(|| stem.to_string())
}

fn anchor_text(el: &ElementRef<'_>) -> String {
    el.text()
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
