use crate::database::models::MediaRecord;
use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension, Row};

pub(super) struct SqliteMediaRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

const COLUMNS: &str = "id, title, description, media_type, file_url, thumbnail_url, branch_id, \
                       member_id, uploaded_by, path, size_bytes, checksum, created_at";

fn map_row(row: &Row<'_>) -> rusqlite::Result<MediaRecord> {
    Ok(MediaRecord {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        media_type: row.get(3)?,
        file_url: row.get(4)?,
        thumbnail_url: row.get(5)?,
        branch_id: row.get(6)?,
        member_id: row.get(7)?,
        uploaded_by: row.get(8)?,
        path: row.get(9)?,
        size_bytes: row.get(10)?,
        checksum: row.get(11)?,
        created_at: row.get(12)?,
    })
}

impl<'conn> super::MediaRepository for SqliteMediaRepository<'conn> {
    fn create(&self, record: &MediaRecord) -> Result<()> {
        self.conn.execute(
            &format!(
                "INSERT INTO media ({COLUMNS}) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)"
            ),
            params![
                record.id,
                record.title,
                record.description,
                record.media_type,
                record.file_url,
                record.thumbnail_url,
                record.branch_id,
                record.member_id,
                record.uploaded_by,
                record.path,
                record.size_bytes,
                record.checksum,
                record.created_at,
            ],
        )?;
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<MediaRecord>> {
        Ok(self
            .conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM media WHERE id = ?1"),
                params![id],
                map_row,
            )
            .optional()?)
    }

    fn list(&self, media_type: Option<&str>) -> Result<Vec<MediaRecord>> {
        let mut items = Vec::new();
        match media_type {
            Some(kind) => {
                let mut stmt = self.conn.prepare(&format!(
                    "SELECT {COLUMNS} FROM media WHERE media_type = ?1 \
                     ORDER BY datetime(created_at) DESC"
                ))?;
                let rows = stmt.query_map(params![kind], map_row)?;
                for row in rows {
                    items.push(row?);
                }
            }
            None => {
                let mut stmt = self.conn.prepare(&format!(
                    "SELECT {COLUMNS} FROM media ORDER BY datetime(created_at) DESC"
                ))?;
                let rows = stmt.query_map([], map_row)?;
                for row in rows {
                    items.push(row?);
                }
            }
        }
        Ok(items)
    }

    fn list_for_branch(&self, branch_id: &str) -> Result<Vec<MediaRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {COLUMNS} FROM media WHERE branch_id = ?1 ORDER BY datetime(created_at) DESC"
        ))?;
        let rows = stmt.query_map(params![branch_id], map_row)?;
        let mut items = Vec::new();
        for row in rows {
            items.push(row?);
        }
        Ok(items)
    }

    fn delete(&self, id: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM media WHERE id = ?1", params![id])?;
        Ok(())
    }
}
