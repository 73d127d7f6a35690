use crate::database::models::BlogLikeRecord;
use anyhow::Result;
use rusqlite::{params, Connection};
use std::collections::HashMap;

pub(super) struct SqliteLikeRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

impl<'conn> super::LikeRepository for SqliteLikeRepository<'conn> {
    fn add(&self, record: &BlogLikeRecord) -> Result<()> {
        // Toggling twice in quick succession must not error; the unique
        // constraint makes the second insert a no-op.
        self.conn.execute(
            r#"
            INSERT INTO blog_likes (id, post_id, user_id, created_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(post_id, user_id) DO NOTHING
            "#,
            params![record.id, record.post_id, record.user_id, record.created_at],
        )?;
        Ok(())
    }

    fn remove(&self, post_id: &str, user_id: &str) -> Result<()> {
        self.conn.execute(
            "DELETE FROM blog_likes WHERE post_id = ?1 AND user_id = ?2",
            params![post_id, user_id],
        )?;
        Ok(())
    }

    fn exists(&self, post_id: &str, user_id: &str) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM blog_likes WHERE post_id = ?1 AND user_id = ?2",
            params![post_id, user_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn count_for_post(&self, post_id: &str) -> Result<i64> {
        Ok(self.conn.query_row(
            "SELECT COUNT(*) FROM blog_likes WHERE post_id = ?1",
            params![post_id],
            |row| row.get(0),
        )?)
    }

    fn count_by_post(&self) -> Result<HashMap<String, i64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT post_id, COUNT(*) FROM blog_likes GROUP BY post_id")?;
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
}
