//! One-time importer from the legacy per-element content rows onto the
//! canonical block model. Legacy rows are read-only; importing a page
//! replaces its block list transactionally.

use db::{
    DBService,
    models::{content_block::CreateContentBlock, legacy_content::LegacyContentItem},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};
use ts_rs::TS;
use utils::path::normalize_page_path;

use super::block_store::{BlockStore, BlockStoreError};

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Store(#[from] BlockStoreError),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
pub struct ImportReport {
    pub page_path: String,
    pub imported: usize,
    pub skipped: usize,
    /// Page version after the import; unchanged when the page had no
    /// legacy rows.
    pub version: i64,
}

pub struct LegacyImporter {
    db: DBService,
    store: BlockStore,
}

impl LegacyImporter {
    pub fn new(db: DBService, store: BlockStore) -> Self {
        Self { db, store }
    }

    /// Import one page. A page without legacy rows is a no-op so an import
    /// run can never wipe already-migrated content.
    pub async fn import_page(&self, page_path: &str) -> Result<ImportReport, ImportError> {
        let page_path = normalize_page_path(page_path);
        let items = LegacyContentItem::find_by_page(&self.db.pool, &page_path).await?;

        if items.is_empty() {
            let current = self.store.fetch_page(&page_path).await?;
            return Ok(ImportReport {
                page_path,
                imported: 0,
                skipped: 0,
                version: current.version,
            });
        }

        let mut blocks = Vec::with_capacity(items.len());
        let mut skipped = 0;
        for item in &items {
            match convert(item) {
                Some(block) => blocks.push(block),
                None => {
                    warn!(
                        page_path = %page_path,
                        section = %item.section,
                        name = %item.name,
                        "legacy item not importable, skipping"
                    );
                    skipped += 1;
                }
            }
        }

        let imported = blocks.len();
        let saved = self.store.replace_page(&page_path, blocks, None).await?;

        info!(page_path = %page_path, imported, skipped, "legacy page imported");
        Ok(ImportReport {
            page_path,
            imported,
            skipped,
            version: saved.version,
        })
    }

    pub async fn import_all(&self) -> Result<Vec<ImportReport>, ImportError> {
        let pages = LegacyContentItem::distinct_pages(&self.db.pool).await?;
        let mut reports = Vec::with_capacity(pages.len());
        for page in pages {
            reports.push(self.import_page(&page).await?);
        }
        Ok(reports)
    }
}

/// Section-to-block mapping. Lists were stored newline-joined already, so
/// they land as paragraphs; the canonical model has no list variant.
fn convert(item: &LegacyContentItem) -> Option<CreateContentBlock> {
    match item.section.as_str() {
        "heading" => {
            let level = item.properties["level"].as_u64().unwrap_or(2) as u8;
            Some(CreateContentBlock::heading(item.content.clone(), level))
        }
        "paragraph" | "text" | "list" => Some(CreateContentBlock::paragraph(item.content.clone())),
        "link" => {
            let href = item.properties["url"].as_str()?;
            Some(CreateContentBlock::button(item.content.clone(), href))
        }
        "image" => {
            let src = item.image_url.as_deref().filter(|s| !s.is_empty())?;
            Some(CreateContentBlock::image(src, item.content.clone()))
        }
        _ => None,
    }
}
