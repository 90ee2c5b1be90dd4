//! libSQL storage for schedule entries and document provenance.
//!
//! The [`Storage`] struct wraps a local libSQL database. The ingest driver is
//! the sole writer via [`Storage::open`]; listing commands may use
//! [`Storage::open_readonly`].

mod migrations;

use std::path::Path;

use bellgrid_shared::{BellgridError, DocumentRecord, Result, ScheduleEntry};
use chrono::{NaiveDateTime, Utc};
use libsql::{Connection, Database, params};
use tracing::{debug, info};
use uuid::Uuid;

/// On-disk format of entry times. Sorts lexicographically.
const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    readonly: bool,
}

impl Storage {
    /// Open or create a database at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| BellgridError::io(parent, e))?;
        }

        let (db, conn) = connect(path).await?;
        let storage = Self {
            db,
            conn,
            readonly: false,
        };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Open an existing database at `path` in read-only mode.
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(BellgridError::Storage(format!(
                "no database at {}; run `bellgrid ingest` first",
                path.display()
            )));
        }

        let (db, conn) = connect(path).await?;
        Ok(Self {
            db,
            conn,
            readonly: true,
        })
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn.execute_batch(migration.sql).await.map_err(|e| {
                    BellgridError::Storage(format!("migration v{} failed: {e}", migration.version))
                })?;
            }
        }
        Ok(())
    }

    /// Current schema version, or 0 before the first migration.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => match rows.next().await {
                Ok(Some(row)) => row.get::<u32>(0).unwrap_or(0),
                _ => 0,
            },
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(BellgridError::Storage(
                "database is opened in read-only mode".into(),
            ));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Schedule entries
    // -----------------------------------------------------------------------

    /// Insert `entries` for `document` in one transaction. Returns the count.
    pub async fn insert_many(&self, document: &str, entries: &[ScheduleEntry]) -> Result<usize> {
        self.check_writable()?;
        let tx = self.conn.transaction().await.map_err(db_err)?;
        insert_entries(&tx, document, entries).await?;
        tx.commit().await.map_err(db_err)?;

        debug!(document, entries = entries.len(), "entries inserted");
        Ok(entries.len())
    }

    /// Swap a document's entries for `entries` atomically.
    pub async fn replace_document_entries(
        &self,
        document: &str,
        entries: &[ScheduleEntry],
    ) -> Result<usize> {
        self.check_writable()?;
        let tx = self.conn.transaction().await.map_err(db_err)?;
        let removed = tx
            .execute(
                "DELETE FROM schedule_entries WHERE document = ?1",
                params![document],
            )
            .await
            .map_err(db_err)?;
        insert_entries(&tx, document, entries).await?;
        tx.commit().await.map_err(db_err)?;

        debug!(document, removed, inserted = entries.len(), "document entries replaced");
        Ok(entries.len())
    }

    /// Delete every entry belonging to `document`. Returns the count removed.
    pub async fn delete_document_entries(&self, document: &str) -> Result<u64> {
        self.check_writable()?;
        self.conn
            .execute(
                "DELETE FROM schedule_entries WHERE document = ?1",
                params![document],
            )
            .await
            .map_err(db_err)
    }

    /// Wipe all entries and document records. Returns the entry count removed.
    pub async fn clear_all(&self) -> Result<u64> {
        self.check_writable()?;
        let tx = self.conn.transaction().await.map_err(db_err)?;
        let removed = tx
            .execute("DELETE FROM schedule_entries", params![])
            .await
            .map_err(db_err)?;
        tx.execute("DELETE FROM documents", params![])
            .await
            .map_err(db_err)?;
        tx.commit().await.map_err(db_err)?;

        info!(removed, "store cleared");
        Ok(removed)
    }

    /// Every stored entry, by start time then name.
    pub async fn get_all(&self) -> Result<Vec<ScheduleEntry>> {
        let mut rows = self
            .conn
            .query(
                "SELECT name, start_time, end_time FROM schedule_entries
                 ORDER BY start_time, name",
                params![],
            )
            .await
            .map_err(db_err)?;

        let mut entries = Vec::new();
        while let Some(row) = rows.next().await.map_err(db_err)? {
            entries.push(row_to_entry(&row)?);
        }
        Ok(entries)
    }

    /// Entries belonging to one document, by start time then name.
    pub async fn get_document_entries(&self, document: &str) -> Result<Vec<ScheduleEntry>> {
        let mut rows = self
            .conn
            .query(
                "SELECT name, start_time, end_time FROM schedule_entries
                 WHERE document = ?1 ORDER BY start_time, name",
                params![document],
            )
            .await
            .map_err(db_err)?;

        let mut entries = Vec::new();
        while let Some(row) = rows.next().await.map_err(db_err)? {
            entries.push(row_to_entry(&row)?);
        }
        Ok(entries)
    }

    // -----------------------------------------------------------------------
    // Documents
    // -----------------------------------------------------------------------

    /// Insert or update the provenance record for a document.
    pub async fn upsert_document(&self, record: &DocumentRecord) -> Result<()> {
        self.check_writable()?;
        self.conn
            .execute(
                "INSERT INTO documents
                   (name, source_url, content_hash, entry_count, ingested_at, academic_year_start)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(name) DO UPDATE SET
                   source_url = excluded.source_url,
                   content_hash = excluded.content_hash,
                   entry_count = excluded.entry_count,
                   ingested_at = excluded.ingested_at,
                   academic_year_start = excluded.academic_year_start",
                params![
                    record.name.as_str(),
                    record.source_url.as_deref(),
                    record.content_hash.as_str(),
                    record.entry_count as i64,
                    record.ingested_at.to_rfc3339(),
                    record.academic_year_start.map(i64::from),
                ],
            )
            .await
            .map_err(db_err)?;
        Ok(())
    }

    /// Provenance record for `name`, if it was ever ingested.
    pub async fn get_document(&self, name: &str) -> Result<Option<DocumentRecord>> {
        let mut rows = self
            .conn
            .query(
                "SELECT name, source_url, content_hash, entry_count, ingested_at,
                        academic_year_start
                 FROM documents WHERE name = ?1",
                params![name],
            )
            .await
            .map_err(db_err)?;

        match rows.next().await.map_err(db_err)? {
            Some(row) => Ok(Some(row_to_document(&row)?)),
            None => Ok(None),
        }
    }

    /// All provenance records, by name.
    pub async fn list_documents(&self) -> Result<Vec<DocumentRecord>> {
        let mut rows = self
            .conn
            .query(
                "SELECT name, source_url, content_hash, entry_count, ingested_at,
                        academic_year_start
                 FROM documents ORDER BY name",
                params![],
            )
            .await
            .map_err(db_err)?;

        let mut records = Vec::new();
        while let Some(row) = rows.next().await.map_err(db_err)? {
            records.push(row_to_document(&row)?);
        }
        Ok(records)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn connect(path: &Path) -> Result<(Database, Connection)> {
    let db = libsql::Builder::new_local(path)
        .build()
        .await
        .map_err(db_err)?;
    let conn = db.connect().map_err(db_err)?;
    Ok((db, conn))
}

async fn insert_entries(conn: &Connection, document: &str, entries: &[ScheduleEntry]) -> Result<()> {
    let created_at = Utc::now().to_rfc3339();
    for entry in entries {
        conn.execute(
            "INSERT INTO schedule_entries (id, document, name, start_time, end_time, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                Uuid::now_v7().to_string(),
                document,
                entry.name.as_str(),
                entry.start_time.format(TIME_FORMAT).to_string(),
                entry.end_time.format(TIME_FORMAT).to_string(),
                created_at.as_str(),
            ],
        )
        .await
        .map_err(db_err)?;
    }
    Ok(())
}

fn db_err(e: libsql::Error) -> BellgridError {
    BellgridError::Storage(e.to_string())
}

fn parse_time(s: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, TIME_FORMAT)
        .map_err(|e| BellgridError::Storage(format!("invalid entry time '{s}': {e}")))
}

fn row_to_entry(row: &libsql::Row) -> Result<ScheduleEntry> {
    Ok(ScheduleEntry {
        name: row.get::<String>(0).map_err(db_err)?,
        start_time: parse_time(&row.get::<String>(1).map_err(db_err)?)?,
        end_time: parse_time(&row.get::<String>(2).map_err(db_err)?)?,
    })
}

fn row_to_document(row: &libsql::Row) -> Result<DocumentRecord> {
    Ok(DocumentRecord {
        name: row.get::<String>(0).map_err(db_err)?,
        source_url: row.get::<String>(1).ok(),
        content_hash: row.get::<String>(2).map_err(db_err)?,
        entry_count: row.get::<i64>(3).map_err(db_err)? as usize,
        ingested_at: {
            let s: String = row.get(4).map_err(db_err)?;
            chrono::DateTime::parse_from_rfc3339(&s)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| BellgridError::Storage(format!("invalid date: {e}")))?
        },
        academic_year_start: row
            .get::<Option<i64>>(5)
            .map_err(db_err)?
            .and_then(|year| i32::try_from(year).ok()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    async fn test_storage() -> Storage {
        let tmp = std::env::temp_dir().join(format!("bellgrid_test_{}.db", Uuid::now_v7()));
        Storage::open(&tmp).await.expect("open test db")
    }

    fn entry(name: &str, day: u32, hour: u32) -> ScheduleEntry {
        let date = NaiveDate::from_ymd_opt(2026, 4, day).unwrap();
        ScheduleEntry {
            name: name.to_string(),
            start_time: date.and_hms_opt(hour, 0, 0).unwrap(),
            end_time: date.and_hms_opt(hour, 50, 0).unwrap(),
        }
    }

    fn record(name: &str, hash: &str) -> DocumentRecord {
        DocumentRecord {
            name: name.to_string(),
            source_url: Some(format!("https://school.example.org/{name}.pdf")),
            content_hash: hash.to_string(),
            entry_count: 3,
            ingested_at: Utc::now(),
            academic_year_start: Some(2025),
        }
    }

    #[tokio::test]
    async fn open_and_migrate() {
        let storage = test_storage().await;
        assert_eq!(storage.get_schema_version().await, 3);
    }

    #[tokio::test]
    async fn idempotent_migration() {
        let tmp = std::env::temp_dir().join(format!("bellgrid_test_{}.db", Uuid::now_v7()));
        let first = Storage::open(&tmp).await.expect("first open");
        drop(first);
        let second = Storage::open(&tmp).await.expect("second open");
        assert_eq!(second.get_schema_version().await, 3);
    }

    #[tokio::test]
    async fn get_all_is_sorted_by_start_then_name() {
        let storage = test_storage().await;
        storage
            .insert_many("April 6th - 10th", &[entry("Period 2", 7, 9), entry("Period 1", 6, 8)])
            .await
            .unwrap();
        storage
            .insert_many("extra", &[entry("Period 1", 7, 9), entry("Period 0", 6, 7)])
            .await
            .unwrap();

        let all = storage.get_all().await.unwrap();
        let keys: Vec<(u32, &str)> = all
            .iter()
            .map(|e| (chrono::Datelike::day(&e.start_time), e.name.as_str()))
            .collect();
        assert_eq!(
            keys,
            vec![(6, "Period 0"), (6, "Period 1"), (7, "Period 1"), (7, "Period 2")]
        );
        assert_eq!(all[0].end_time - all[0].start_time, chrono::Duration::minutes(50));
    }

    #[tokio::test]
    async fn insert_many_with_no_entries() {
        let storage = test_storage().await;
        assert_eq!(storage.insert_many("empty", &[]).await.unwrap(), 0);
        assert!(storage.get_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn replace_and_delete_are_scoped_to_document() {
        let storage = test_storage().await;
        storage.insert_many("a", &[entry("Period 1", 6, 8)]).await.unwrap();
        storage.insert_many("b", &[entry("Period 1", 7, 8)]).await.unwrap();

        storage
            .replace_document_entries("a", &[entry("Period 2", 6, 9), entry("Period 3", 6, 10)])
            .await
            .unwrap();
        assert_eq!(storage.get_document_entries("a").await.unwrap().len(), 2);
        assert_eq!(storage.get_document_entries("b").await.unwrap().len(), 1);

        assert_eq!(storage.delete_document_entries("b").await.unwrap(), 1);
        assert_eq!(storage.get_all().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn clear_all_wipes_everything() {
        let storage = test_storage().await;
        storage.insert_many("a", &[entry("Period 1", 6, 8)]).await.unwrap();
        storage.upsert_document(&record("a", "abc")).await.unwrap();

        assert_eq!(storage.clear_all().await.unwrap(), 1);
        assert!(storage.get_all().await.unwrap().is_empty());
        assert!(storage.get_document("a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn document_upsert_and_get() {
        let storage = test_storage().await;
        storage.upsert_document(&record("week", "h1")).await.unwrap();
        storage.upsert_document(&record("week", "h2")).await.unwrap();

        let doc = storage.get_document("week").await.unwrap().unwrap();
        assert_eq!(doc.content_hash, "h2");
        assert_eq!(doc.entry_count, 3);
        assert_eq!(doc.academic_year_start, Some(2025));
        assert_eq!(doc.source_url.as_deref(), Some("https://school.example.org/week.pdf"));
        assert_eq!(storage.list_documents().await.unwrap().len(), 1);
        assert!(storage.get_document("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn document_without_academic_year() {
        let storage = test_storage().await;
        let mut legacy = record("week", "h1");
        legacy.academic_year_start = None;
        storage.upsert_document(&legacy).await.unwrap();

        let doc = storage.get_document("week").await.unwrap().unwrap();
        assert_eq!(doc.academic_year_start, None);
    }

    #[tokio::test]
    async fn readonly_rejects_writes() {
        let tmp = std::env::temp_dir().join(format!("bellgrid_test_{}.db", Uuid::now_v7()));
        let rw = Storage::open(&tmp).await.unwrap();
        rw.insert_many("a", &[entry("Period 1", 6, 8)]).await.unwrap();
        drop(rw);

        let ro = Storage::open_readonly(&tmp).await.unwrap();
        assert_eq!(ro.get_all().await.unwrap().len(), 1);
        let result = ro.clear_all().await;
        assert!(result.unwrap_err().to_string().contains("read-only"));
    }

    #[tokio::test]
    async fn readonly_requires_existing_db() {
        let tmp = std::env::temp_dir().join(format!("bellgrid_missing_{}.db", Uuid::now_v7()));
        assert!(Storage::open_readonly(&tmp).await.is_err());
    }
}
