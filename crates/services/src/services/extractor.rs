//! Content extractor: snapshots a page of the public site into canonical
//! blocks. Fetches the rendered HTML from the site origin, walks the
//! document in encounter order, and replaces the page's stored block list.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use db::models::content_block::CreateContentBlock;
use scraper::{ElementRef, Html};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;
use ts_rs::TS;
use url::Url;
use utils::path::{matches_excluded, normalize_page_path};

use super::{
    block_store::{BlockStore, BlockStoreError},
    config::ExtractDefaults,
};

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("page fetch failed: {0}")]
    Fetch(String),
    #[error("http {status} fetching {url}")]
    Http { status: u16, url: String },
    #[error("invalid page url: {0}")]
    Url(#[from] url::ParseError),
    #[error(transparent)]
    Store(#[from] BlockStoreError),
}

impl ExtractError {
    /// Transient fetch failures are retried; everything else is not.
    fn should_retry(&self) -> bool {
        match self {
            Self::Fetch(_) => true,
            Self::Http { status, .. } => (500..=599).contains(status),
            _ => false,
        }
    }
}

/// Per-request extraction switches. Unset fields fall back to the configured
/// defaults when a request omits them.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(default)]
pub struct ExtractOptions {
    pub include_headings: bool,
    pub include_paragraphs: bool,
    pub include_lists: bool,
    pub include_links: bool,
    pub include_images: bool,
    /// Path substrings that disable extraction entirely.
    pub exclude_paths: Vec<String>,
    /// Delay before fetching, for origin-side rendering to settle.
    pub settle_ms: u64,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        let defaults = ExtractDefaults::default();
        Self {
            include_headings: true,
            include_paragraphs: true,
            include_lists: true,
            include_links: true,
            include_images: true,
            exclude_paths: defaults.exclude_paths,
            settle_ms: defaults.settle_ms,
        }
    }
}

/// What an extraction run did.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ExtractionOutcome {
    Extracted {
        page_path: String,
        block_count: usize,
        version: i64,
    },
    /// The path matched an excluded substring; nothing was read or written.
    Skipped { page_path: String, matched: String },
}

/// Seam for fetching page HTML, so extraction logic is testable offline.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<String, ExtractError>;
}

pub struct HttpPageFetcher {
    client: reqwest::Client,
}

impl HttpPageFetcher {
    pub fn new() -> Result<Self, ExtractError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| ExtractError::Fetch(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch(&self, url: &Url) -> Result<String, ExtractError> {
        let fetch = || async {
            let response = self
                .client
                .get(url.clone())
                .send()
                .await
                .map_err(|e| ExtractError::Fetch(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                return Err(ExtractError::Http {
                    status: status.as_u16(),
                    url: url.to_string(),
                });
            }

            response
                .text()
                .await
                .map_err(|e| ExtractError::Fetch(e.to_string()))
        };

        fetch
            .retry(ExponentialBuilder::default().with_max_times(2))
            .when(ExtractError::should_retry)
            .await
    }
}

pub struct ContentExtractor {
    store: BlockStore,
    fetcher: Arc<dyn PageFetcher>,
    site_origin: Url,
    defaults: ExtractDefaults,
}

impl ContentExtractor {
    pub fn new(
        store: BlockStore,
        fetcher: Arc<dyn PageFetcher>,
        site_origin: Url,
        defaults: ExtractDefaults,
    ) -> Self {
        Self {
            store,
            fetcher,
            site_origin,
            defaults,
        }
    }

    /// Options seeded from the service configuration.
    pub fn default_options(&self) -> ExtractOptions {
        ExtractOptions {
            exclude_paths: self.defaults.exclude_paths.clone(),
            settle_ms: self.defaults.settle_ms,
            ..ExtractOptions::default()
        }
    }

    /// Extract one page and replace its stored blocks. Excluded paths
    /// short-circuit before any fetch or store call.
    pub async fn extract_page(
        &self,
        page_path: &str,
        options: &ExtractOptions,
    ) -> Result<ExtractionOutcome, ExtractError> {
        let page_path = normalize_page_path(page_path);

        if let Some(matched) = matches_excluded(&page_path, &options.exclude_paths) {
            info!(page_path = %page_path, matched = %matched, "extraction skipped");
            return Ok(ExtractionOutcome::Skipped { page_path, matched });
        }

        if options.settle_ms > 0 {
            tokio::time::sleep(Duration::from_millis(options.settle_ms)).await;
        }

        let url = self.site_origin.join(&page_path)?;
        let html = self.fetcher.fetch(&url).await?;
        let blocks = extract_blocks(&html, &url, options);

        let saved = self.store.replace_page(&page_path, blocks, None).await?;
        info!(
            page_path = %saved.page_path,
            blocks = saved.blocks.len(),
            version = saved.version,
            "extraction complete"
        );

        Ok(ExtractionOutcome::Extracted {
            page_path: saved.page_path,
            block_count: saved.blocks.len(),
            version: saved.version,
        })
    }
}

/// Walk the document in encounter order and collect blocks for every enabled
/// category. Pure, so extraction of an unchanged document is idempotent.
pub fn extract_blocks(html: &str, base_url: &Url, options: &ExtractOptions) -> Vec<CreateContentBlock> {
    let document = Html::parse_document(html);
    let mut blocks = Vec::new();

    for node in document.root_element().descendants() {
        let Some(element) = ElementRef::wrap(node) else {
            continue;
        };
        if !is_visible(&element) {
            continue;
        }

        match element.value().name() {
            tag @ ("h1" | "h2" | "h3" | "h4" | "h5" | "h6") if options.include_headings => {
                let text = element_text(&element);
                if !text.is_empty() {
                    let level = tag[1..].parse::<u8>().unwrap_or(2);
                    blocks.push(CreateContentBlock::heading(text, level));
                }
            }
            "p" if options.include_paragraphs => {
                let text = element_text(&element);
                if !text.is_empty() {
                    blocks.push(CreateContentBlock::paragraph(text));
                }
            }
            "ul" | "ol" if options.include_lists => {
                let items: Vec<String> = element
                    .children()
                    .filter_map(ElementRef::wrap)
                    .filter(|child| child.value().name() == "li")
                    .map(|li| element_text(&li))
                    .filter(|text| !text.is_empty())
                    .collect();
                if !items.is_empty() {
                    blocks.push(CreateContentBlock::paragraph(items.join("\n")));
                }
            }
            "a" if options.include_links => {
                if inside_page_chrome(&element) {
                    continue;
                }
                let text = element_text(&element);
                let Some(href) = element.value().attr("href").filter(|h| !h.trim().is_empty())
                else {
                    continue;
                };
                let Ok(resolved) = base_url.join(href.trim()) else {
                    continue;
                };
                if !text.is_empty() {
                    blocks.push(CreateContentBlock::button(text, resolved.to_string()));
                }
            }
            "img" if options.include_images => {
                let Some(src) = element.value().attr("src").filter(|s| !s.trim().is_empty())
                else {
                    continue;
                };
                let Ok(resolved) = base_url.join(src.trim()) else {
                    continue;
                };
                let alt = element.value().attr("alt").unwrap_or("").trim().to_string();
                blocks.push(CreateContentBlock::image(resolved.to_string(), alt));
            }
            _ => {}
        }
    }

    blocks
}

/// Element text with whitespace collapsed, so reflowed markup extracts
/// identically.
fn element_text(element: &ElementRef) -> String {
    element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Links inside site chrome are navigation, not page content.
fn inside_page_chrome(element: &ElementRef) -> bool {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .any(|a| matches!(a.value().name(), "nav" | "header" | "footer"))
}

fn is_visible(element: &ElementRef) -> bool {
    if hidden_by_own_markup(element) {
        return false;
    }
    // display:none and the hidden attribute hide the whole subtree.
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .all(|ancestor| {
            let style = ancestor.value().attr("style").unwrap_or("");
            ancestor.value().attr("hidden").is_none()
                && style_value(style, "display") != Some("none")
        })
}

fn hidden_by_own_markup(element: &ElementRef) -> bool {
    if element.value().attr("hidden").is_some() {
        return true;
    }

    let style = element.value().attr("style").unwrap_or("");
    if style_value(style, "display") == Some("none")
        || style_value(style, "visibility") == Some("hidden")
    {
        return true;
    }
    if let Some(opacity) = style_value(style, "opacity") {
        if opacity.parse::<f64>() == Ok(0.0) {
            return true;
        }
    }

    zero_dimension(element, "width") || zero_dimension(element, "height")
}

/// A zero-area element never renders; an explicit zero in the markup is the
/// static equivalent of a zero bounding box.
fn zero_dimension(element: &ElementRef, dimension: &str) -> bool {
    if element.value().attr(dimension).map(str::trim) == Some("0") {
        return true;
    }
    let style = element.value().attr("style").unwrap_or("");
    matches!(style_value(style, dimension), Some("0") | Some("0px"))
}

fn style_value<'a>(style: &'a str, property: &str) -> Option<&'a str> {
    style.split(';').find_map(|declaration| {
        let (prop, value) = declaration.split_once(':')?;
        if prop.trim().eq_ignore_ascii_case(property) {
            Some(value.trim())
        } else {
            None
        }
    })
}
