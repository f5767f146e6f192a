use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sqlx::{Executor, FromRow, Sqlite, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

/// Kind of content block; determines which `properties` keys are meaningful.
#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display,
)]
#[sqlx(type_name = "block_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum BlockType {
    Heading,
    Paragraph,
    Image,
    Button,
}

/// One ordered unit of editable page content.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
pub struct ContentBlock {
    pub id: Uuid,
    pub page_path: String,
    pub block_type: BlockType,
    pub position: i64,
    #[ts(type = "Record<string, unknown>")]
    pub properties: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Raw row shape; `properties` is stored as JSON text and parsed defensively
/// on the way out.
#[derive(Debug, FromRow)]
struct ContentBlockRow {
    id: Uuid,
    page_path: String,
    block_type: BlockType,
    position: i64,
    properties: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ContentBlockRow> for ContentBlock {
    fn from(row: ContentBlockRow) -> Self {
        Self {
            id: row.id,
            page_path: row.page_path,
            block_type: row.block_type,
            position: row.position,
            properties: parse_properties(&row.properties),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Malformed or non-object property bags fall back to an empty object
/// rather than failing the page load.
pub fn parse_properties(raw: &str) -> Value {
    match serde_json::from_str::<Value>(raw) {
        Ok(value) if value.is_object() => value,
        _ => json!({}),
    }
}

/// Payload for creating a block. `id` is kept when the client supplies one
/// (stable identity across editor saves) and generated otherwise.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
pub struct CreateContentBlock {
    pub id: Option<Uuid>,
    pub block_type: BlockType,
    #[ts(type = "Record<string, unknown>")]
    pub properties: Value,
}

impl CreateContentBlock {
    pub fn heading(text: impl Into<String>, level: u8) -> Self {
        Self {
            id: None,
            block_type: BlockType::Heading,
            properties: json!({ "text": text.into(), "level": level }),
        }
    }

    pub fn paragraph(text: impl Into<String>) -> Self {
        Self {
            id: None,
            block_type: BlockType::Paragraph,
            properties: json!({ "text": text.into() }),
        }
    }

    pub fn image(src: impl Into<String>, alt: impl Into<String>) -> Self {
        Self {
            id: None,
            block_type: BlockType::Image,
            properties: json!({ "src": src.into(), "alt": alt.into() }),
        }
    }

    pub fn button(label: impl Into<String>, href: impl Into<String>) -> Self {
        Self {
            id: None,
            block_type: BlockType::Button,
            properties: json!({ "label": label.into(), "href": href.into() }),
        }
    }
}

impl ContentBlock {
    pub async fn find_by_page(
        pool: &SqlitePool,
        page_path: &str,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let rows = sqlx::query_as::<_, ContentBlockRow>(
            r#"SELECT id, page_path, block_type, position, properties, created_at, updated_at
               FROM content_blocks
               WHERE page_path = ?
               ORDER BY position ASC"#,
        )
        .bind(page_path)
        .fetch_all(pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let row = sqlx::query_as::<_, ContentBlockRow>(
            r#"SELECT id, page_path, block_type, position, properties, created_at, updated_at
               FROM content_blocks
               WHERE id = ?"#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(row.map(Into::into))
    }

    pub async fn insert<'e, E>(
        executor: E,
        id: Uuid,
        page_path: &str,
        block_type: BlockType,
        position: i64,
        properties: &Value,
    ) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let row = sqlx::query_as::<_, ContentBlockRow>(
            r#"INSERT INTO content_blocks (id, page_path, block_type, position, properties)
               VALUES (?, ?, ?, ?, ?)
               RETURNING id, page_path, block_type, position, properties, created_at, updated_at"#,
        )
        .bind(id)
        .bind(page_path)
        .bind(block_type)
        .bind(position)
        .bind(properties.to_string())
        .fetch_one(executor)
        .await?;

        Ok(row.into())
    }

    /// Update type and properties in place; position and siblings untouched.
    pub async fn update_content(
        pool: &SqlitePool,
        id: Uuid,
        block_type: BlockType,
        properties: &Value,
    ) -> Result<Self, sqlx::Error> {
        let row = sqlx::query_as::<_, ContentBlockRow>(
            r#"UPDATE content_blocks
               SET block_type = ?, properties = ?, updated_at = datetime('now', 'subsec')
               WHERE id = ?
               RETURNING id, page_path, block_type, position, properties, created_at, updated_at"#,
        )
        .bind(block_type)
        .bind(properties.to_string())
        .bind(id)
        .fetch_one(pool)
        .await?;

        Ok(row.into())
    }

    pub async fn max_position<'e, E>(executor: E, page_path: &str) -> Result<i64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let max: Option<i64> =
            sqlx::query_scalar("SELECT MAX(position) FROM content_blocks WHERE page_path = ?")
                .bind(page_path)
                .fetch_one(executor)
                .await?;

        Ok(max.unwrap_or(-1))
    }

    pub async fn delete<'e, E>(executor: E, id: Uuid) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query("DELETE FROM content_blocks WHERE id = ?")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn delete_by_page<'e, E>(executor: E, page_path: &str) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query("DELETE FROM content_blocks WHERE page_path = ?")
            .bind(page_path)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::DBService;

    #[tokio::test]
    async fn insert_and_fetch_ordered() {
        let db = DBService::new_in_memory().await.unwrap();

        for (i, text) in ["Eye Care", "Our Doctors", "Visit Us"].iter().enumerate() {
            ContentBlock::insert(
                &db.pool,
                Uuid::new_v4(),
                "/eyecare",
                BlockType::Heading,
                i as i64,
                &json!({ "text": text, "level": 2 }),
            )
            .await
            .unwrap();
        }

        let blocks = ContentBlock::find_by_page(&db.pool, "/eyecare").await.unwrap();
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0].properties["text"], "Eye Care");
        assert_eq!(blocks[2].properties["text"], "Visit Us");
        assert_eq!(
            blocks.iter().map(|b| b.position).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );

        let other = ContentBlock::find_by_page(&db.pool, "/gynecology").await.unwrap();
        assert!(other.is_empty());
    }

    #[tokio::test]
    async fn update_keeps_position() {
        let db = DBService::new_in_memory().await.unwrap();
        let id = Uuid::new_v4();
        ContentBlock::insert(
            &db.pool,
            id,
            "/eyecare",
            BlockType::Paragraph,
            4,
            &json!({ "text": "old" }),
        )
        .await
        .unwrap();

        let updated = ContentBlock::update_content(
            &db.pool,
            id,
            BlockType::Paragraph,
            &json!({ "text": "new" }),
        )
        .await
        .unwrap();

        assert_eq!(updated.position, 4);
        assert_eq!(updated.properties["text"], "new");
    }

    #[tokio::test]
    async fn max_position_defaults_to_minus_one() {
        let db = DBService::new_in_memory().await.unwrap();
        assert_eq!(
            ContentBlock::max_position(&db.pool, "/empty").await.unwrap(),
            -1
        );
    }

    #[test]
    fn malformed_properties_fall_back_to_empty_object() {
        assert_eq!(parse_properties("{not json"), json!({}));
        assert_eq!(parse_properties("[1, 2]"), json!({}));
        assert_eq!(parse_properties(r#"{"text":"ok"}"#), json!({ "text": "ok" }));
    }
}
