use crate::config::ExportLayout;
use crate::core::record::{AnalysisRecord, StoredRecord, join_fighters, split_fighters};
use crate::error::{Error, Result};
use chrono::NaiveDateTime;
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::fs;
use std::path::Path;

const TABLE: &str = "podcast_analysis";
const SQLITE_TIMESTAMP: &str = "%Y-%m-%d %H:%M:%S";

/// SQLite-backed store keyed by video id.
///
/// Owns the one connection of the process; open it at startup, lend it out by
/// reference, and release it with [`RecordStore::close`].
pub struct RecordStore {
    conn: Connection,
}

impl RecordStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        Self::from_connection(Connection::open(path)?)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    /// Removes the table so every later write fails.
    #[cfg(test)]
    pub fn drop_table(&self) -> Result<()> {
        self.conn.execute(&format!("DROP TABLE {TABLE}"), [])?;
        Ok(())
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        let store = Self { conn };
        store.ensure_schema()?;
        Ok(store)
    }

    pub fn ensure_schema(&self) -> Result<()> {
        self.conn.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS {TABLE} (
                    video_id TEXT PRIMARY KEY,
                    event_name TEXT,
                    fighters TEXT,
                    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
                )"
            ),
            [],
        )?;
        Ok(())
    }

    /// Inserts or replaces the row for `record.video_id`; `created_at` is reset.
    pub fn upsert(&self, record: &AnalysisRecord) -> Result<()> {
        self.conn.execute(
            &format!(
                "INSERT OR REPLACE INTO {TABLE} (video_id, event_name, fighters) VALUES (?1, ?2, ?3)"
            ),
            params![record.video_id, record.event_name, record.joined_fighters()],
        )?;
        Ok(())
    }

    pub fn get(&self, video_id: &str) -> Result<Option<StoredRecord>> {
        let row = self
            .conn
            .query_row(
                &format!(
                    "SELECT video_id, event_name, fighters, created_at FROM {TABLE} WHERE video_id = ?1"
                ),
                [video_id],
                RawRow::from_row,
            )
            .optional()?;

        row.map(RawRow::into_stored).transpose()
    }

    /// Every stored row, newest first.
    pub fn all(&self) -> Result<Vec<StoredRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT video_id, event_name, fighters, created_at FROM {TABLE}
             ORDER BY created_at DESC, video_id ASC"
        ))?;

        let rows = stmt.query_map([], RawRow::from_row)?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row?.into_stored()?);
        }

        Ok(result)
    }

    pub fn count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM {TABLE}"), [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Writes the records of a run (not the table) to a CSV file.
    pub fn export_all(
        &self,
        records: &[AnalysisRecord],
        destination: impl AsRef<Path>,
        layout: ExportLayout,
    ) -> Result<()> {
        export_csv(records, destination.as_ref(), layout)
    }

    pub fn close(self) -> Result<()> {
        self.conn.close().map_err(|(_, e)| Error::from(e))
    }
}

struct RawRow {
    video_id: String,
    event_name: Option<String>,
    fighters: Option<String>,
    created_at: String,
}

impl RawRow {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            video_id: row.get(0)?,
            event_name: row.get(1)?,
            fighters: row.get(2)?,
            created_at: row.get(3)?,
        })
    }

    fn into_stored(self) -> Result<StoredRecord> {
        let created_at = NaiveDateTime::parse_from_str(&self.created_at, SQLITE_TIMESTAMP)
            .map_err(|e| {
                Error::custom(format!(
                    "Bad created_at '{}' for {}: {e}",
                    self.created_at, self.video_id
                ))
            })?;

        Ok(StoredRecord {
            record: AnalysisRecord {
                video_id: self.video_id,
                title: None,
                event_name: self.event_name,
                fighters: self.fighters.as_deref().map(split_fighters).unwrap_or_default(),
            },
            created_at,
        })
    }
}

fn export_csv(records: &[AnalysisRecord], destination: &Path, layout: ExportLayout) -> Result<()> {
    if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let mut header = vec!["video_id".to_string(), "event_name".to_string()];
    let width = records.iter().map(|r| r.fighters.len()).max().unwrap_or(0);
    match layout {
        ExportLayout::Joined => header.push("fighters".to_string()),
        ExportLayout::Positional => header.extend((1..=width).map(|i| format!("fighter_{i}"))),
    }

    let mut out = csv_line(header.iter().map(String::as_str));

    for record in records {
        let mut cells = vec![
            record.video_id.clone(),
            record.event_name.clone().unwrap_or_default(),
        ];
        match layout {
            ExportLayout::Joined => cells.push(join_fighters(&record.fighters)),
            ExportLayout::Positional => {
                cells.extend((0..width).map(|i| record.fighters.get(i).cloned().unwrap_or_default()))
            }
        }
        out.push_str(&csv_line(cells.iter().map(String::as_str)));
    }

    fs::write(destination, out)?;
    Ok(())
}

fn csv_line<'a>(cells: impl Iterator<Item = &'a str>) -> String {
    let mut line = cells.map(csv_cell).collect::<Vec<_>>().join(",");
    line.push('\n');
    line
}

fn csv_cell(value: &str) -> String {
    let needs_quote = value.contains(',')
        || value.contains('"')
        || value.contains('\n')
        || value.contains('\r');
    if needs_quote {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
