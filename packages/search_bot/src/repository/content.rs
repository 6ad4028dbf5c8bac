use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::error::StorageError;
use crate::models::{ContentRecord, InsertOutcome, MessageRef, NewContentRecord, Page};

use super::ContentRepository;

const RECORD_COLUMNS: &str =
    "id, owner_id, body, created_at, source_chat_id, source_message_id";

/// Rows read per round trip while scanning for search hits.
const SEARCH_BATCH: i64 = 200;

fn record_from_row(r: &SqliteRow) -> ContentRecord {
    let source_chat: Option<i64> = r.get("source_chat_id");
    let source_message: Option<i64> = r.get("source_message_id");
    ContentRecord {
        id: r.get("id"),
        owner_id: r.get("owner_id"),
        body: r.get("body"),
        created_at: r.get("created_at"),
        source: source_chat
            .zip(source_message)
            .map(|(chat_id, message_id)| MessageRef::new(chat_id, message_id)),
    }
}

impl ContentRepository {
    /// Store `body` for `owner_id` and return the new record id.
    pub async fn insert(&self, owner_id: i64, body: &str) -> Result<i64, StorageError> {
        let outcome = self
            .insert_record(&NewContentRecord::new(owner_id, body))
            .await?;
        Ok(outcome.id)
    }

    /// Insert a record; a second insert with the same origin message
    /// returns the first record's id instead of creating a duplicate.
    pub async fn insert_record(
        &self,
        record: &NewContentRecord,
    ) -> Result<InsertOutcome, StorageError> {
        let inserted: Option<i64> = sqlx::query_scalar(
            r#"
            INSERT INTO content_records
                (owner_id, body, created_at, source_chat_id, source_message_id, origin_chat_id, origin_message_id)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(origin_chat_id, origin_message_id) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(record.owner_id)
        .bind(&record.body)
        .bind(record.created_at)
        .bind(record.source.map(|s| s.chat_id))
        .bind(record.source.map(|s| s.message_id))
        .bind(record.origin.map(|o| o.chat_id))
        .bind(record.origin.map(|o| o.message_id))
        .fetch_optional(&self.pool)
        .await?;

        if let Some(id) = inserted {
            return Ok(InsertOutcome { id, created: true });
        }

        let id: i64 = sqlx::query_scalar(
            "SELECT id FROM content_records WHERE origin_chat_id = ? AND origin_message_id = ?",
        )
        .bind(record.origin.map(|o| o.chat_id))
        .bind(record.origin.map(|o| o.message_id))
        .fetch_one(&self.pool)
        .await?;

        Ok(InsertOutcome { id, created: false })
    }

    /// All records of `owner_id`, oldest first.
    pub async fn list_by_owner(&self, owner_id: i64) -> Result<Vec<ContentRecord>, StorageError> {
        let sql = format!(
            "SELECT {} FROM content_records WHERE owner_id = ? ORDER BY id ASC",
            RECORD_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(owner_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(record_from_row).collect())
    }

    pub async fn count_by_owner(&self, owner_id: i64) -> Result<i64, StorageError> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM content_records WHERE owner_id = ?")
            .bind(owner_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(total)
    }

    /// One page of `owner_id`'s records, oldest first. Pages are 1-based.
    pub async fn list_page_by_owner(
        &self,
        owner_id: i64,
        page: i64,
        per_page: i64,
    ) -> Result<Page<ContentRecord>, StorageError> {
        let page = page.max(1);
        let per_page = per_page.max(1);
        // Pages far past the end saturate instead of wrapping to a negative OFFSET
        let offset = (page - 1).saturating_mul(per_page);

        let total = self.count_by_owner(owner_id).await?;

        let sql = format!(
            "SELECT {} FROM content_records WHERE owner_id = ? ORDER BY id ASC LIMIT ? OFFSET ?",
            RECORD_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(owner_id)
            .bind(per_page)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        Ok(Page {
            items: rows.iter().map(record_from_row).collect(),
            total,
            page,
            per_page,
            total_pages: Page::<ContentRecord>::total_pages_for(total, per_page),
        })
    }

    pub async fn get_by_owner(
        &self,
        owner_id: i64,
        id: i64,
    ) -> Result<Option<ContentRecord>, StorageError> {
        let sql = format!(
            "SELECT {} FROM content_records WHERE id = ? AND owner_id = ?",
            RECORD_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .bind(owner_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(record_from_row))
    }

    /// Up to `limit` records of `owner_id` whose body contains `keyword`,
    /// ignoring case, oldest first.
    ///
    /// Matching happens in Rust rather than SQL: SQLite's `lower()` and `LIKE`
    /// only fold ASCII, which would miss "Éxito" for "éxito". Rows are read in
    /// batches of `SEARCH_BATCH` and the scan stops at `limit` hits, so memory
    /// stays bounded however many records the owner has.
    pub async fn search_by_owner(
        &self,
        owner_id: i64,
        keyword: &str,
        limit: usize,
    ) -> Result<Vec<ContentRecord>, StorageError> {
        let needle = keyword.to_lowercase();
        let sql = format!(
            "SELECT {} FROM content_records WHERE owner_id = ? AND id > ? ORDER BY id ASC LIMIT ?",
            RECORD_COLUMNS
        );

        let mut hits = Vec::new();
        let mut after_id = 0_i64;
        while hits.len() < limit {
            let rows = sqlx::query(&sql)
                .bind(owner_id)
                .bind(after_id)
                .bind(SEARCH_BATCH)
                .fetch_all(&self.pool)
                .await?;
            let Some(last) = rows.last() else {
                break;
            };
            after_id = last.get("id");

            let exhausted = (rows.len() as i64) < SEARCH_BATCH;
            hits.extend(
                rows.iter()
                    .map(record_from_row)
                    .filter(|r| r.body.to_lowercase().contains(&needle)),
            );
            if exhausted {
                break;
            }
        }
        hits.truncate(limit);
        Ok(hits)
    }

    /// Delete record `id` if and only if it belongs to `owner_id`.
    pub async fn delete(&self, owner_id: i64, id: i64) -> Result<bool, StorageError> {
        let result = sqlx::query("DELETE FROM content_records WHERE id = ? AND owner_id = ?")
            .bind(id)
            .bind(owner_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
