use crate::database::models::BlogCommentRecord;
use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashMap;

pub(super) struct SqliteCommentRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

const COLUMNS: &str = "id, post_id, user_id, content, created_at, updated_at";

fn map_row(row: &Row<'_>) -> rusqlite::Result<BlogCommentRecord> {
    Ok(BlogCommentRecord {
        id: row.get(0)?,
        post_id: row.get(1)?,
        user_id: row.get(2)?,
        content: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

impl<'conn> super::CommentRepository for SqliteCommentRepository<'conn> {
    fn create(&self, record: &BlogCommentRecord) -> Result<()> {
        self.conn.execute(
            &format!("INSERT INTO blog_comments ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)"),
            params![
                record.id,
                record.post_id,
                record.user_id,
                record.content,
                record.created_at,
                record.updated_at,
            ],
        )?;
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<BlogCommentRecord>> {
        Ok(self
            .conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM blog_comments WHERE id = ?1"),
                params![id],
                map_row,
            )
            .optional()?)
    }

    fn list_for_post(&self, post_id: &str) -> Result<Vec<BlogCommentRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {COLUMNS} FROM blog_comments WHERE post_id = ?1 \
             ORDER BY datetime(created_at) DESC"
        ))?;
        let rows = stmt.query_map(params![post_id], map_row)?;
        let mut comments = Vec::new();
        for row in rows {
            comments.push(row?);
        }
        Ok(comments)
    }

    fn count_by_post(&self) -> Result<HashMap<String, i64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT post_id, COUNT(*) FROM blog_comments GROUP BY post_id")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;
        let mut counts = HashMap::new();
        for row in rows {
            let (post_id, count) = row?;
            counts.insert(post_id, count);
        }
        Ok(counts)
    }

    fn delete(&self, id: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM blog_comments WHERE id = ?1", params![id])?;
        Ok(())
    }
}
