use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Sqlite};
use ts_rs::TS;

/// Optimistic-concurrency token for one page's block list. Bumped on every
/// successful mutation; full-list saves must present the version they were
/// loaded from.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct PageRevision {
    pub page_path: String,
    pub version: i64,
    pub updated_at: DateTime<Utc>,
}

impl PageRevision {
    /// Current version for a page; 0 when the page has never been written.
    pub async fn current<'e, E>(executor: E, page_path: &str) -> Result<i64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let version: Option<i64> =
            sqlx::query_scalar("SELECT version FROM page_revisions WHERE page_path = ?")
                .bind(page_path)
                .fetch_optional(executor)
                .await?;

        Ok(version.unwrap_or(0))
    }

    /// Increment (creating at 1 if absent) and return the new version.
    pub async fn bump<'e, E>(executor: E, page_path: &str) -> Result<i64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_scalar(
            r#"INSERT INTO page_revisions (page_path, version)
               VALUES (?, 1)
               ON CONFLICT(page_path) DO UPDATE SET
                   version = version + 1,
                   updated_at = datetime('now', 'subsec')
               RETURNING version"#,
        )
        .bind(page_path)
        .fetch_one(executor)
        .await
    }
}
