use crate::database::models::BlogPostRecord;
use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension, Row};

pub(super) struct SqliteBlogPostRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

const COLUMNS: &str =
    "id, title, content, category, image_url, author_id, published, created_at, updated_at";

fn map_row(row: &Row<'_>) -> rusqlite::Result<BlogPostRecord> {
    Ok(BlogPostRecord {
        id: row.get(0)?,
        title: row.get(1)?,
        content: row.get(2)?,
        category: row.get(3)?,
        image_url: row.get(4)?,
        author_id: row.get(5)?,
        published: row.get::<_, i64>(6)? != 0,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

impl<'conn> super::BlogPostRepository for SqliteBlogPostRepository<'conn> {
    fn create(&self, record: &BlogPostRecord) -> Result<()> {
        self.conn.execute(
            &format!("INSERT INTO blog_posts ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"),
            params![
                record.id,
                record.title,
                record.content,
                record.category,
                record.image_url,
                record.author_id,
                if record.published { 1 } else { 0 },
                record.created_at,
                record.updated_at,
            ],
        )?;
        Ok(())
    }

    fn update(&self, record: &BlogPostRecord) -> Result<()> {
        self.conn.execute(
            r#"
            UPDATE blog_posts
            SET title = ?2, content = ?3, category = ?4, image_url = ?5,
                published = ?6, updated_at = ?7
            WHERE id = ?1
            "#,
            params![
                record.id,
                record.title,
                record.content,
                record.category,
                record.image_url,
                if record.published { 1 } else { 0 },
                record.updated_at,
            ],
        )?;
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<BlogPostRecord>> {
        Ok(self
            .conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM blog_posts WHERE id = ?1"),
                params![id],
                map_row,
            )
            .optional()?)
    }

    fn list_published(&self, category: Option<&str>) -> Result<Vec<BlogPostRecord>> {
        let mut posts = Vec::new();
        match category {
            Some(category) => {
                let mut stmt = self.conn.prepare(&format!(
                    "SELECT {COLUMNS} FROM blog_posts \
                     WHERE published = 1 AND category = ?1 \
                     ORDER BY datetime(created_at) DESC"
                ))?;
                let rows = stmt.query_map(params![category], map_row)?;
                for row in rows {
                    posts.push(row?);
                }
            }
            None => {
                let mut stmt = self.conn.prepare(&format!(
                    "SELECT {COLUMNS} FROM blog_posts \
                     WHERE published = 1 \
                     ORDER BY datetime(created_at) DESC"
                ))?;
                let rows = stmt.query_map([], map_row)?;
                for row in rows {
                    posts.push(row?);
                }
            }
        }
        Ok(posts)
    }

    fn list_all(&self) -> Result<Vec<BlogPostRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {COLUMNS} FROM blog_posts ORDER BY datetime(created_at) DESC"
        ))?;
        let rows = stmt.query_map([], map_row)?;
        let mut posts = Vec::new();
        for row in rows {
            posts.push(row?);
        }
        Ok(posts)
    }

    fn delete(&self, id: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM blog_posts WHERE id = ?1", params![id])?;
        Ok(())
    }
}
