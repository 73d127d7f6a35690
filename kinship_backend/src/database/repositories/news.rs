use crate::database::models::FamilyNewsRecord;
use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension, Row};

pub(super) struct SqliteNewsRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

const COLUMNS: &str = "id, branch_id, title, content, image_url, author_id, created_at, updated_at";

fn map_row(row: &Row<'_>) -> rusqlite::Result<FamilyNewsRecord> {
    Ok(FamilyNewsRecord {
        id: row.get(0)?,
        branch_id: row.get(1)?,
        title: row.get(2)?,
        content: row.get(3)?,
        image_url: row.get(4)?,
        author_id: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

impl<'conn> super::NewsRepository for SqliteNewsRepository<'conn> {
    fn create(&self, record: &FamilyNewsRecord) -> Result<()> {
        self.conn.execute(
            &format!(
                "INSERT INTO family_news ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"
            ),
            params![
                record.id,
                record.branch_id,
                record.title,
                record.content,
                record.image_url,
                record.author_id,
                record.created_at,
                record.updated_at,
            ],
        )?;
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<FamilyNewsRecord>> {
        Ok(self
            .conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM family_news WHERE id = ?1"),
                params![id],
                map_row,
            )
            .optional()?)
    }

    fn list_recent(&self, limit: usize) -> Result<Vec<FamilyNewsRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {COLUMNS} FROM family_news ORDER BY datetime(created_at) DESC LIMIT ?1"
        ))?;
        let rows = stmt.query_map(params![limit as i64], map_row)?;
        let mut news = Vec::new();
        for row in rows {
            news.push(row?);
        }
        Ok(news)
    }

    fn list_for_branch(&self, branch_id: &str) -> Result<Vec<FamilyNewsRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {COLUMNS} FROM family_news WHERE branch_id = ?1 ORDER BY datetime(created_at) DESC"
        ))?;
        let rows = stmt.query_map(params![branch_id], map_row)?;
        let mut news = Vec::new();
        for row in rows {
            news.push(row?);
        }
        Ok(news)
    }

    fn delete(&self, id: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM family_news WHERE id = ?1", params![id])?;
        Ok(())
    }
}
