use crate::database::models::ProfileRecord;
use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension, Row};

pub(super) struct SqliteProfileRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

fn map_row(row: &Row<'_>) -> rusqlite::Result<ProfileRecord> {
    Ok(ProfileRecord {
        id: row.get(0)?,
        email: row.get(1)?,
        full_name: row.get(2)?,
        avatar_url: row.get(3)?,
        password_salt: row.get(4)?,
        password_hash: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

const COLUMNS: &str =
    "id, email, full_name, avatar_url, password_salt, password_hash, created_at, updated_at";

impl<'conn> super::ProfileRepository for SqliteProfileRepository<'conn> {
    fn create(&self, record: &ProfileRecord) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO profiles (id, email, full_name, avatar_url, password_salt, password_hash, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                record.id,
                record.email,
                record.full_name,
                record.avatar_url,
                record.password_salt,
                record.password_hash,
                record.created_at,
                record.updated_at,
            ],
        )?;
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<ProfileRecord>> {
        Ok(self
            .conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM profiles WHERE id = ?1"),
                params![id],
                map_row,
            )
            .optional()?)
    }

    fn get_by_email(&self, email: &str) -> Result<Option<ProfileRecord>> {
        Ok(self
            .conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM profiles WHERE email = ?1"),
                params![email],
                map_row,
            )
            .optional()?)
    }

    fn update_info(
        &self,
        id: &str,
        full_name: Option<&str>,
        avatar_url: Option<&str>,
    ) -> Result<()> {
        self.conn.execute(
            r#"
            UPDATE profiles
            SET full_name = ?2, avatar_url = ?3, updated_at = datetime('now')
            WHERE id = ?1
            "#,
            params![id, full_name, avatar_url],
        )?;
        Ok(())
    }
}
