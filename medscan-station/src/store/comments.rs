//! Comment persistence and fan-out
//!
//! Two-phase write discipline: when a submission carries an attachment,
//! the attachment goes to the object store first and the row is only
//! inserted once that succeeded. Attachment and row storage are separate
//! systems, so atomicity is a compensating check, not a transaction: an
//! insert failure removes the just-stored object, and an attachment
//! failure never reaches the insert.

use super::objects::ObjectStore;
use chrono::{DateTime, Utc};
use medscan_common::events::{EventBus, StationEvent};
use medscan_common::records::{FeedbackRecord, NewComment};
use medscan_common::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Pool, Row, Sqlite};
use tokio::sync::broadcast;
use tracing::{info, warn};
use uuid::Uuid;

/// Per-receiver buffer for the record fan-out channel
const FANOUT_CAPACITY: usize = 128;

/// Create the comments table if missing. Idempotent; runs at startup.
pub async fn ensure_schema(pool: &Pool<Sqlite>) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS comments (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            email TEXT NOT NULL,
            comment TEXT NOT NULL,
            picture_url TEXT,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

/// Durable store for training comments with insert fan-out
pub struct CommentStore {
    pool: Pool<Sqlite>,
    objects: ObjectStore,
    events: EventBus,
    records_tx: broadcast::Sender<FeedbackRecord>,
}

impl CommentStore {
    pub fn new(pool: Pool<Sqlite>, objects: ObjectStore, events: EventBus) -> Self {
        let (records_tx, _) = broadcast::channel(FANOUT_CAPACITY);
        Self {
            pool,
            objects,
            events,
            records_tx,
        }
    }

    /// Persist a submission and fan it out to all subscribers
    ///
    /// Fails with `Validation` before anything is written, and with
    /// `Storage` if either write phase fails — in which case no row exists
    /// and no orphaned object is left behind.
    pub async fn submit(&self, draft: NewComment) -> Result<FeedbackRecord> {
        draft.validate()?;

        let picture_url = match &draft.attachment {
            Some(attachment) => Some(self.objects.store(attachment).await?),
            None => None,
        };

        let id = Uuid::new_v4();
        let created_at = Utc::now();

        let inserted = sqlx::query(
            r#"
            INSERT INTO comments (id, name, email, comment, picture_url, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(&draft.name)
        .bind(&draft.email)
        .bind(&draft.comment)
        .bind(picture_url.as_deref())
        .bind(created_at.to_rfc3339())
        .execute(&self.pool)
        .await;

        if let Err(e) = inserted {
            // Compensate: do not leave an unreferenced object behind
            if let Some(key) = &picture_url {
                if let Err(cleanup) = self.objects.remove(key).await {
                    warn!(key = %key, error = %cleanup, "orphaned attachment cleanup failed");
                }
            }
            return Err(Error::Storage(format!("comment insert failed: {e}")));
        }

        let record = FeedbackRecord {
            id,
            name: draft.name,
            email: draft.email,
            comment: draft.comment,
            picture_url,
            created_at,
        };

        info!(id = %record.id, has_picture = record.picture_url.is_some(), "comment stored");

        // Fan out to live viewers; no receivers is OK
        let _ = self.records_tx.send(record.clone());
        self.events.emit_lossy(StationEvent::CommentPosted {
            record: record.clone(),
        });

        Ok(record)
    }

    /// All records, newest first; same-timestamp inserts keep insertion order
    pub async fn list(&self) -> Result<Vec<FeedbackRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, email, comment, picture_url, created_at
            FROM comments
            ORDER BY created_at DESC, rowid DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(record_from_row).collect()
    }

    /// Subscribe to records inserted after this call, from any client
    ///
    /// Dropping the receiver is the (idempotent) unsubscribe.
    pub fn subscribe(&self) -> broadcast::Receiver<FeedbackRecord> {
        self.records_tx.subscribe()
    }

    /// Public URL for a stored attachment key
    pub fn attachment_url(&self, key: &str) -> String {
        self.objects.public_url(key)
    }

    /// The backing object store (read path for serving attachments)
    pub fn objects(&self) -> &ObjectStore {
        &self.objects
    }
}

fn record_from_row(row: &SqliteRow) -> Result<FeedbackRecord> {
    let id: String = row.get("id");
    let created_at: String = row.get("created_at");
    Ok(FeedbackRecord {
        id: Uuid::parse_str(&id)
            .map_err(|e| Error::Internal(format!("malformed record id '{id}': {e}")))?,
        name: row.get("name"),
        email: row.get("email"),
        comment: row.get("comment"),
        picture_url: row.get("picture_url"),
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map_err(|e| Error::Internal(format!("malformed created_at '{created_at}': {e}")))?
            .with_timezone(&Utc),
    })
}
