use crate::database::models::EventRecord;
use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension, Row};

pub(super) struct SqliteEventRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

const COLUMNS: &str =
    "id, title, description, event_date, location, created_by, created_at, updated_at";

fn map_row(row: &Row<'_>) -> rusqlite::Result<EventRecord> {
    Ok(EventRecord {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        event_date: row.get(3)?,
        location: row.get(4)?,
        created_by: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

impl<'conn> super::EventRepository for SqliteEventRepository<'conn> {
    fn create(&self, record: &EventRecord) -> Result<()> {
        self.conn.execute(
            &format!("INSERT INTO events ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"),
            params![
                record.id,
                record.title,
                record.description,
                record.event_date,
                record.location,
                record.created_by,
                record.created_at,
                record.updated_at,
            ],
        )?;
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<EventRecord>> {
        Ok(self
            .conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM events WHERE id = ?1"),
                params![id],
                map_row,
            )
            .optional()?)
    }

    fn list(&self) -> Result<Vec<EventRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {COLUMNS} FROM events ORDER BY datetime(event_date) ASC"
        ))?;
        let rows = stmt.query_map([], map_row)?;
        let mut events = Vec::new();
        for row in rows {
            events.push(row?);
        }
        Ok(events)
    }

    fn delete(&self, id: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM events WHERE id = ?1", params![id])?;
        Ok(())
    }
}
