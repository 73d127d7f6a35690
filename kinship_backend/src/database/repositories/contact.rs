use crate::database::models::ContactMessageRecord;
use anyhow::Result;
use rusqlite::{params, Connection, Row};

pub(super) struct SqliteContactRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

const COLUMNS: &str = "id, name, email, subject, message, created_at";

fn map_row(row: &Row<'_>) -> rusqlite::Result<ContactMessageRecord> {
    Ok(ContactMessageRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        subject: row.get(3)?,
        message: row.get(4)?,
        created_at: row.get(5)?,
    })
}

impl<'conn> super::ContactRepository for SqliteContactRepository<'conn> {
    fn create(&self, record: &ContactMessageRecord) -> Result<()> {
        self.conn.execute(
            &format!("INSERT INTO contact_messages ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)"),
            params![
                record.id,
                record.name,
                record.email,
                record.subject,
                record.message,
                record.created_at,
            ],
        )?;
        Ok(())
    }

    fn list_recent(&self, limit: usize) -> Result<Vec<ContactMessageRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {COLUMNS} FROM contact_messages ORDER BY datetime(created_at) DESC LIMIT ?1"
        ))?;
        let rows = stmt.query_map(params![limit as i64], map_row)?;
        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        Ok(messages)
    }
}
