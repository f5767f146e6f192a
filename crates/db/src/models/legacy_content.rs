use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{FromRow, SqlitePool};
use ts_rs::TS;
use uuid::Uuid;

use super::content_block::parse_properties;

/// Row from the older per-element content system, keyed by
/// `(page_path, section, name)`. Read-only migration source: the importer
/// converts these to canonical blocks and nothing writes them back.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
pub struct LegacyContentItem {
    pub id: Uuid,
    pub page_path: String,
    pub section: String,
    pub name: String,
    pub content: String,
    pub image_url: Option<String>,
    #[ts(type = "Record<string, unknown>")]
    pub properties: Value,
    pub position: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct LegacyContentRow {
    id: Uuid,
    page_path: String,
    section: String,
    name: String,
    content: String,
    image_url: Option<String>,
    properties: String,
    position: i64,
    created_at: DateTime<Utc>,
}

impl From<LegacyContentRow> for LegacyContentItem {
    fn from(row: LegacyContentRow) -> Self {
        Self {
            id: row.id,
            page_path: row.page_path,
            section: row.section,
            name: row.name,
            content: row.content,
            image_url: row.image_url,
            // Some legacy rows carry the bag as a doubly-encoded or truncated
            // string; fall back to an empty object instead of failing.
            properties: parse_properties(&row.properties),
            position: row.position,
            created_at: row.created_at,
        }
    }
}

impl LegacyContentItem {
    pub async fn find_by_page(
        pool: &SqlitePool,
        page_path: &str,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let rows = sqlx::query_as::<_, LegacyContentRow>(
            r#"SELECT id, page_path, section, name, content, image_url, properties, position, created_at
               FROM legacy_content_items
               WHERE page_path = ?
               ORDER BY position ASC"#,
        )
        .bind(page_path)
        .fetch_all(pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// All page paths that still have legacy rows.
    pub async fn distinct_pages(pool: &SqlitePool) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT DISTINCT page_path FROM legacy_content_items ORDER BY page_path ASC",
        )
        .fetch_all(pool)
        .await
    }

    /// Seed helper for tests and for loading a legacy export dump.
    #[allow(clippy::too_many_arguments)]
    pub async fn create(
        pool: &SqlitePool,
        page_path: &str,
        section: &str,
        name: &str,
        content: &str,
        image_url: Option<&str>,
        properties: &Value,
        position: i64,
    ) -> Result<Self, sqlx::Error> {
        let id = Uuid::new_v4();
        let row = sqlx::query_as::<_, LegacyContentRow>(
            r#"INSERT INTO legacy_content_items
                   (id, page_path, section, name, content, image_url, properties, position)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?)
               RETURNING id, page_path, section, name, content, image_url, properties, position, created_at"#,
        )
        .bind(id)
        .bind(page_path)
        .bind(section)
        .bind(name)
        .bind(content)
        .bind(image_url)
        .bind(properties.to_string())
        .bind(position)
        .fetch_one(pool)
        .await?;

        Ok(row.into())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::DBService;

    #[tokio::test]
    async fn roundtrip_and_page_listing() {
        let db = DBService::new_in_memory().await.unwrap();

        LegacyContentItem::create(
            &db.pool,
            "/eyecare",
            "heading",
            "heading-1",
            "Comprehensive Eye Care",
            None,
            &json!({ "level": 2 }),
            0,
        )
        .await
        .unwrap();
        LegacyContentItem::create(
            &db.pool,
            "/gynecology",
            "image",
            "image-1",
            "Dr. Alvarez",
            Some("https://clinic.example/img/alvarez.jpg"),
            &json!({}),
            0,
        )
        .await
        .unwrap();

        let pages = LegacyContentItem::distinct_pages(&db.pool).await.unwrap();
        assert_eq!(pages, vec!["/eyecare".to_string(), "/gynecology".to_string()]);

        let items = LegacyContentItem::find_by_page(&db.pool, "/eyecare").await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].properties["level"], 2);
    }

    #[tokio::test]
    async fn malformed_property_bag_reads_as_empty_object() {
        let db = DBService::new_in_memory().await.unwrap();

        // Bypass the typed helper to simulate a corrupt legacy row.
        sqlx::query(
            "INSERT INTO legacy_content_items (id, page_path, section, name, content, properties, position)
             VALUES (?, '/eyecare', 'paragraph', 'paragraph-1', 'hello', '{broken', 0)",
        )
        .bind(Uuid::new_v4())
        .execute(&db.pool)
        .await
        .unwrap();

        let items = LegacyContentItem::find_by_page(&db.pool, "/eyecare").await.unwrap();
        assert_eq!(items[0].properties, json!({}));
    }
}
