//! Typed CRUD over the canonical block model, scoped by page path. Full-list
//! writes are transactional and version-checked; every committed mutation
//! bumps the page version and publishes a change event.

use db::{
    DBService,
    models::{
        content_block::{BlockType, ContentBlock, CreateContentBlock},
        page_revision::PageRevision,
    },
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::info;
use ts_rs::TS;
use utils::path::normalize_page_path;
use uuid::Uuid;

use super::events::{BlockChange, ChangeOp, PageEvents};

#[derive(Debug, Error)]
pub enum BlockStoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("stale page version: save is based on {base} but the page is at {current}")]
    StaleVersion { base: i64, current: i64 },
    #[error("block not found: {0}")]
    BlockNotFound(Uuid),
}

/// A page's full ordered block list plus its version token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
pub struct PageBlocks {
    pub page_path: String,
    pub version: i64,
    pub blocks: Vec<ContentBlock>,
}

/// Payload for a single-block upsert.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct UpsertBlock {
    pub id: Option<Uuid>,
    pub page_path: String,
    pub block_type: BlockType,
    #[ts(type = "Record<string, unknown>")]
    pub properties: Value,
}

#[derive(Clone)]
pub struct BlockStore {
    db: DBService,
    events: PageEvents,
}

impl BlockStore {
    pub fn new(db: DBService, events: PageEvents) -> Self {
        Self { db, events }
    }

    /// Ordered blocks for a page; an unknown page yields an empty list at
    /// version 0 rather than an error.
    pub async fn fetch_page(&self, page_path: &str) -> Result<PageBlocks, BlockStoreError> {
        let page_path = normalize_page_path(page_path);
        let blocks = ContentBlock::find_by_page(&self.db.pool, &page_path).await?;
        let version = PageRevision::current(&self.db.pool, &page_path).await?;

        Ok(PageBlocks {
            page_path,
            version,
            blocks,
        })
    }

    /// Replace the page's whole block list in one transaction. When
    /// `base_version` is given, a save based on a stale version is rejected
    /// without touching the stored list. Positions are reassigned from the
    /// incoming order.
    pub async fn replace_page(
        &self,
        page_path: &str,
        blocks: Vec<CreateContentBlock>,
        base_version: Option<i64>,
    ) -> Result<PageBlocks, BlockStoreError> {
        let page_path = normalize_page_path(page_path);
        let mut tx = self.db.pool.begin().await?;

        let current = PageRevision::current(&mut *tx, &page_path).await?;
        if let Some(base) = base_version {
            if base != current {
                return Err(BlockStoreError::StaleVersion { base, current });
            }
        }

        ContentBlock::delete_by_page(&mut *tx, &page_path).await?;

        let mut saved = Vec::with_capacity(blocks.len());
        for (position, block) in blocks.into_iter().enumerate() {
            let id = block.id.unwrap_or_else(Uuid::new_v4);
            saved.push(
                ContentBlock::insert(
                    &mut *tx,
                    id,
                    &page_path,
                    block.block_type,
                    position as i64,
                    &block.properties,
                )
                .await?,
            );
        }

        let version = PageRevision::bump(&mut *tx, &page_path).await?;
        tx.commit().await?;

        info!(
            page_path = %page_path,
            blocks = saved.len(),
            version,
            "replaced page blocks"
        );
        self.events.publish(BlockChange {
            page_path: page_path.clone(),
            op: ChangeOp::Replaced,
            block_id: None,
            version,
        });

        Ok(PageBlocks {
            page_path,
            version,
            blocks: saved,
        })
    }

    /// Insert-or-update one block by id. A new block appends after the
    /// current maximum position; an existing one keeps its position, so
    /// sibling ordering is untouched either way.
    pub async fn upsert_block(&self, data: UpsertBlock) -> Result<ContentBlock, BlockStoreError> {
        let page_path = normalize_page_path(&data.page_path);

        let existing = match data.id {
            Some(id) => ContentBlock::find_by_id(&self.db.pool, id).await?,
            None => None,
        };

        let saved = match existing {
            Some(block) => {
                ContentBlock::update_content(
                    &self.db.pool,
                    block.id,
                    data.block_type,
                    &data.properties,
                )
                .await?
            }
            None => {
                let id = data.id.unwrap_or_else(Uuid::new_v4);
                let position = ContentBlock::max_position(&self.db.pool, &page_path).await? + 1;
                ContentBlock::insert(
                    &self.db.pool,
                    id,
                    &page_path,
                    data.block_type,
                    position,
                    &data.properties,
                )
                .await?
            }
        };

        let version = PageRevision::bump(&self.db.pool, &saved.page_path).await?;
        self.events.publish(BlockChange {
            page_path: saved.page_path.clone(),
            op: ChangeOp::Upserted,
            block_id: Some(saved.id),
            version,
        });

        Ok(saved)
    }

    pub async fn delete_block(&self, id: Uuid) -> Result<(), BlockStoreError> {
        let block = ContentBlock::find_by_id(&self.db.pool, id)
            .await?
            .ok_or(BlockStoreError::BlockNotFound(id))?;

        ContentBlock::delete(&self.db.pool, id).await?;
        let version = PageRevision::bump(&self.db.pool, &block.page_path).await?;

        self.events.publish(BlockChange {
            page_path: block.page_path,
            op: ChangeOp::Deleted,
            block_id: Some(id),
            version,
        });

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    async fn store() -> (BlockStore, PageEvents) {
        let db = DBService::new_in_memory().await.unwrap();
        let events = PageEvents::new();
        (BlockStore::new(db, events.clone()), events)
    }

    #[tokio::test]
    async fn replace_leaves_no_residue() {
        let (store, _) = store().await;

        store
            .replace_page(
                "/eyecare",
                vec![
                    CreateContentBlock::heading("Old Title", 1),
                    CreateContentBlock::paragraph("old body"),
                ],
                None,
            )
            .await
            .unwrap();

        let saved = store
            .replace_page(
                "/eyecare",
                vec![
                    CreateContentBlock::heading("New Title", 1),
                    CreateContentBlock::image("/img/lasik.jpg", "LASIK suite"),
                    CreateContentBlock::button("Book now", "/contact"),
                ],
                None,
            )
            .await
            .unwrap();

        let fetched = store.fetch_page("/eyecare").await.unwrap();
        assert_eq!(fetched.blocks, saved.blocks);
        assert_eq!(fetched.version, 2);
        assert_eq!(fetched.blocks.len(), 3);
        assert_eq!(fetched.blocks[0].properties["text"], "New Title");
        assert_eq!(
            fetched.blocks.iter().map(|b| b.position).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
    }

    #[tokio::test]
    async fn stale_save_is_rejected_without_writes() {
        let (store, _) = store().await;

        let first = store
            .replace_page("/eyecare", vec![CreateContentBlock::paragraph("v1")], None)
            .await
            .unwrap();

        // A second session saves on top, moving the version past `first`.
        store
            .replace_page(
                "/eyecare",
                vec![CreateContentBlock::paragraph("v2")],
                Some(first.version),
            )
            .await
            .unwrap();

        let err = store
            .replace_page(
                "/eyecare",
                vec![CreateContentBlock::paragraph("stale")],
                Some(first.version),
            )
            .await
            .unwrap_err();

        match err {
            BlockStoreError::StaleVersion { base, current } => {
                assert_eq!(base, 1);
                assert_eq!(current, 2);
            }
            other => panic!("expected StaleVersion, got {other:?}"),
        }

        let fetched = store.fetch_page("/eyecare").await.unwrap();
        assert_eq!(fetched.blocks[0].properties["text"], "v2");
        assert_eq!(fetched.version, 2);
    }

    #[tokio::test]
    async fn upsert_appends_then_updates_in_place() {
        let (store, _) = store().await;

        store
            .replace_page(
                "/gynecology",
                vec![
                    CreateContentBlock::heading("Women's Health", 1),
                    CreateContentBlock::paragraph("intro"),
                ],
                None,
            )
            .await
            .unwrap();

        let appended = store
            .upsert_block(UpsertBlock {
                id: None,
                page_path: "/gynecology".to_string(),
                block_type: BlockType::Button,
                properties: json!({ "label": "Call us", "href": "tel:+15550100" }),
            })
            .await
            .unwrap();
        assert_eq!(appended.position, 2);

        let updated = store
            .upsert_block(UpsertBlock {
                id: Some(appended.id),
                page_path: "/gynecology".to_string(),
                block_type: BlockType::Button,
                properties: json!({ "label": "Call today", "href": "tel:+15550100" }),
            })
            .await
            .unwrap();
        assert_eq!(updated.position, 2);
        assert_eq!(updated.properties["label"], "Call today");

        let fetched = store.fetch_page("/gynecology").await.unwrap();
        assert_eq!(fetched.blocks.len(), 3);
    }

    #[tokio::test]
    async fn mutations_publish_change_events() {
        let (store, events) = store().await;
        let mut rx = events.subscribe();

        let page = store
            .replace_page("/eyecare", vec![CreateContentBlock::paragraph("hi")], None)
            .await
            .unwrap();

        let change = rx.recv().await.unwrap();
        assert_eq!(change.op, ChangeOp::Replaced);
        assert_eq!(change.version, page.version);

        store.delete_block(page.blocks[0].id).await.unwrap();
        let change = rx.recv().await.unwrap();
        assert_eq!(change.op, ChangeOp::Deleted);
        assert_eq!(change.block_id, Some(page.blocks[0].id));
    }

    #[tokio::test]
    async fn deleting_unknown_block_errors() {
        let (store, _) = store().await;
        let err = store.delete_block(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, BlockStoreError::BlockNotFound(_)));
    }
}
