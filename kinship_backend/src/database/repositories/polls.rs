use crate::database::models::PollRecord;
use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension, Row};

pub(super) struct SqlitePollRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

const COLUMNS: &str = "id, question, options, created_by, created_at, closes_at";

fn map_row(row: &Row<'_>) -> rusqlite::Result<PollRecord> {
    let raw_options: String = row.get(2)?;
    // Options are stored as an opaque JSON array; a malformed value yields an
    // empty option list rather than a hard failure.
    let options: Vec<String> = serde_json::from_str(&raw_options).unwrap_or_default();
    Ok(PollRecord {
        id: row.get(0)?,
        question: row.get(1)?,
        options,
        created_by: row.get(3)?,
        created_at: row.get(4)?,
        closes_at: row.get(5)?,
    })
}

impl<'conn> super::PollRepository for SqlitePollRepository<'conn> {
    fn create(&self, record: &PollRecord) -> Result<()> {
        let options = serde_json::to_string(&record.options)?;
        self.conn.execute(
            &format!("INSERT INTO polls ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)"),
            params![
                record.id,
                record.question,
                options,
                record.created_by,
                record.created_at,
                record.closes_at,
            ],
        )?;
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<PollRecord>> {
        Ok(self
            .conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM polls WHERE id = ?1"),
                params![id],
                map_row,
            )
            .optional()?)
    }

    fn list_recent(&self, limit: usize) -> Result<Vec<PollRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {COLUMNS} FROM polls ORDER BY datetime(created_at) DESC LIMIT ?1"
        ))?;
        let rows = stmt.query_map(params![limit as i64], map_row)?;
        let mut polls = Vec::new();
        for row in rows {
            polls.push(row?);
        }
        Ok(polls)
    }
}
