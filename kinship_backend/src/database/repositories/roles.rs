use crate::database::models::UserRoleRecord;
use anyhow::Result;
use rusqlite::{params, Connection};

pub(super) struct SqliteRoleRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

impl<'conn> super::RoleRepository for SqliteRoleRepository<'conn> {
    fn grant(&self, record: &UserRoleRecord) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO user_roles (id, user_id, role, created_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(user_id, role) DO NOTHING
            "#,
            params![record.id, record.user_id, record.role, record.created_at],
        )?;
        Ok(())
    }

    fn has_role(&self, user_id: &str, role: &str) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM user_roles WHERE user_id = ?1 AND role = ?2",
            params![user_id, role],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn roles_for(&self, user_id: &str) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT role FROM user_roles WHERE user_id = ?1 ORDER BY role ASC")?;
        let rows = stmt.query_map(params![user_id], |row| row.get::<_, String>(0))?;
        let mut roles = Vec::new();
        for row in rows {
            roles.push(row?);
        }
        Ok(roles)
    }
}
