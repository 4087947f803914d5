// src/fetch/response.rs
// =============================================================================
// The records handed to the crawl callback for every fetched page.
//
// The serialized shape (url, original_url, links, assets) is what output
// formatters depend on, so fields only used while crawling are skipped.
// =============================================================================

use serde::{Deserialize, Serialize};
use url::Url;

use super::html;
use crate::error::ExtractError;

/// Details from crawling a single URL.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    /// URL actually reached, after any normalization by the HTTP client
    pub url: String,

    /// URL that was requested, only when it differs from `url`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_url: Option<String>,

    /// Target of a redirect response. Redirects carry no links or assets.
    #[serde(skip)]
    pub redirect_to: Option<String>,

    pub links: Vec<Link>,
    pub assets: Vec<Asset>,
}

/// Target of a single `<a href>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Link {
    pub url: String,
}

/// A resource referenced by the page: script, stylesheet, image or media.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Asset {
    /// Tag that referenced the asset, e.g. `img` or `picture>source`
    pub tag: String,

    pub url: String,

    /// Text of the `rel` attribute
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rel: Option<String>,

    /// Text of the `type` attribute
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

impl Response {
    /// Reads the links and assets of an HTML page, resolving relative URLs
    /// against `base_url`.
    pub fn read(base_url: &str, body: &str) -> Result<Self, ExtractError> {
        let base = Url::parse(base_url).map_err(|source| ExtractError::InvalidBase {
            url: base_url.to_string(),
            source,
        })?;
        Ok(Self::from_page(&base, body))
    }

    pub(crate) fn from_page(base: &Url, body: &str) -> Self {
        let (links, assets) = html::extract(base, body);
        Self {
            url: base.to_string(),
            links,
            assets,
            ..Self::default()
        }
    }

    /// Response for a redirect: the requested URL and where it points to.
    pub fn redirect(url: &Url, redirect_to: Option<String>) -> Self {
        Self {
            url: url.to_string(),
            redirect_to,
            ..Self::default()
        }
    }

    pub fn is_redirect(&self) -> bool {
        self.redirect_to.is_some()
    }
}
