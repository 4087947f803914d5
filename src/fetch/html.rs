// src/fetch/html.rs
// =============================================================================
// This module extracts links and assets from HTML pages.
//
// We use the `scraper` crate which:
// - Parses HTML into a tree (built on html5ever, Mozilla's HTML parser)
// - Accepts broken real-world markup the way browsers do
//
// The tree is walked in document order (each element before its children),
// which fixes the order of the links and assets we return.
//
// Every element we care about falls into one of a few kinds:
// - Anchor: <a href> becomes a Link
// - StylesheetLink: <link> only counts when rel="stylesheet"
// - GroupedSource: <source>, labelled "picture>source" / "video>source"
//   inside <picture> or <video>
// - PictureFallback: <img> inside <picture>, labelled "picture>img"
// - Media: <img>, <script>, <video> anywhere else
//
// Rust concepts:
// - Enums with behavior: each kind knows how to extract its own assets
// - Option chaining: skipping anything we cannot turn into a URL
// =============================================================================

use scraper::node::Element;
use scraper::Html;
use tracing::trace;
use url::Url;

use super::response::{Asset, Link};

/// The kinds of elements that reference other resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ElementKind {
    Anchor,
    StylesheetLink,
    GroupedSource,
    PictureFallback,
    Media,
}

impl ElementKind {
    // Parameters:
    //   tag: the element name
    //   parent: the name of the parent element, if the parent is an element
    fn classify(tag: &str, parent: Option<&str>) -> Option<Self> {
        match tag {
            "a" => Some(ElementKind::Anchor),
            "link" => Some(ElementKind::StylesheetLink),
            "source" => Some(ElementKind::GroupedSource),
            "img" if parent == Some("picture") => Some(ElementKind::PictureFallback),
            "img" | "script" | "video" => Some(ElementKind::Media),
            _ => None,
        }
    }

    fn assets(self, base: &Url, element: &Element, parent: Option<&str>) -> Vec<Asset> {
        let tag = element.name();
        match self {
            ElementKind::Anchor => Vec::new(),
            ElementKind::StylesheetLink => simple_assets(base, element, tag)
                .into_iter()
                .filter(|asset| asset.rel.as_deref() == Some("stylesheet"))
                .collect(),
            ElementKind::GroupedSource | ElementKind::PictureFallback => match parent {
                Some(group @ ("picture" | "video")) => {
                    simple_assets(base, element, &format!("{}>{}", group, tag))
                }
                // A <source> outside a group is an ordinary asset
                _ => simple_assets(base, element, tag),
            },
            ElementKind::Media => simple_assets(base, element, tag),
        }
    }
}

/// Extracts the links and assets of an HTML document.
///
/// Parameters:
///   base: URL the page was served from, used to resolve relative URLs
///   body: the HTML content
///
/// Returns: (links, assets) in document order
///
/// Example:
///   base = "https://example.com/docs/"
///   body = "<a href='intro'>Intro</a><script src='/app.js'></script>"
///   links = ["https://example.com/docs/intro"]
///   assets = [script "https://example.com/app.js"]
pub fn extract(base: &Url, body: &str) -> (Vec<Link>, Vec<Asset>) {
    let document = Html::parse_document(body);

    let mut links = Vec::new();
    let mut assets = Vec::new();

    for node in document.tree.root().descendants() {
        let Some(element) = node.value().as_element() else {
            continue;
        };
        let parent = node
            .parent()
            .and_then(|parent| parent.value().as_element())
            .map(|parent| parent.name());

        match ElementKind::classify(element.name(), parent) {
            Some(ElementKind::Anchor) => {
                if let Some(link) = extract_link(base, element) {
                    links.push(link);
                }
            }
            Some(kind) => assets.extend(kind.assets(base, element, parent)),
            None => {}
        }
    }

    trace!(base = %base, links = links.len(), assets = assets.len(), "extracted page");
    (links, assets)
}

// Reads the href of an anchor.
//
// Links to other schemes (mailto:, tel:, javascript:, ...) are dropped and
// fragments are removed, so "#top" points back at the page itself.
//
// If the element declared href more than once the last one read wins. In
// practice html5ever already keeps only the first declaration.
fn extract_link(base: &Url, element: &Element) -> Option<Link> {
    let mut link = None;
    for (name, value) in element.attrs() {
        if name != "href" {
            continue;
        }
        if let Some(url) = resolve_web_url(base, value) {
            link = Some(Link { url });
        }
    }
    link
}

fn resolve_web_url(base: &Url, href: &str) -> Option<String> {
    let mut url = base.join(href.trim()).ok()?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return None;
    }
    url.set_fragment(None);
    Some(url.to_string())
}

// Resolves an asset reference. Unlike links, the fragment is kept
// (e.g. media fragments like "video.webm#t=10,20").
fn resolve_url(base: &Url, src: &str) -> Option<String> {
    base.join(src.trim())
        .ok()
        .map(String::from)
        .filter(|url| !url.is_empty())
}

// Reads src/href plus rel and type from an element.
//
// When a srcset attribute is present it takes over from src, producing one
// asset per candidate.
fn simple_assets(base: &Url, element: &Element, tag: &str) -> Vec<Asset> {
    let mut url = None;
    let mut srcset = None;
    let mut rel = None;
    let mut mime_type = None;

    for (name, value) in element.attrs() {
        match name {
            "src" | "href" => {
                if let Some(resolved) = resolve_url(base, value) {
                    url = Some(resolved);
                }
            }
            "srcset" => srcset = Some(value),
            "rel" => rel = non_empty(value),
            "type" => mime_type = non_empty(value),
            _ => {}
        }
    }

    let template = Asset {
        tag: tag.to_string(),
        url: String::new(),
        rel,
        mime_type,
    };

    match srcset.filter(|set| !set.trim().is_empty()) {
        Some(set) => expand_srcset(base, &template, set),
        None => url
            .map(|url| Asset { url, ..template })
            .into_iter()
            .collect(),
    }
}

// Splits "a.png, b.png 2x, c.png 800w" into one asset per candidate URL.
fn expand_srcset(base: &Url, template: &Asset, srcset: &str) -> Vec<Asset> {
    srcset
        .split(',')
        .filter_map(|candidate| candidate.split_whitespace().next())
        .filter_map(|src| resolve_url(base, src))
        .map(|url| Asset {
            url,
            ..template.clone()
        })
        .collect()
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

// -----------------------------------------------------------------------------
// BEGINNER NOTES:
//
// 1. Why walk the tree instead of using CSS selectors?
//    - Selectors answer "which elements match", one query at a time
//    - We need links and assets interleaved in document order, and for
//      <source>/<img> we also need to know the parent element
//    - descendants() visits every node once, parents before children
//
// 2. What is `let ... else`?
//    - `let Some(element) = ... else { continue };` binds element if the
//      pattern matches, otherwise runs the else block (which must leave)
//
// 3. What does `Some(group @ ("picture" | "video"))` mean?
//    - `@` binds the matched value to a name while also testing the pattern
//
// 4. What does `..template` do?
//    - Struct update syntax: fill every field not listed from `template`
// -----------------------------------------------------------------------------
