use crate::database::models::FamilyBranchRecord;
use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension, Row};

pub(super) struct SqliteBranchRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

fn map_row(row: &Row<'_>) -> rusqlite::Result<FamilyBranchRecord> {
    Ok(FamilyBranchRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        father_id: row.get(3)?,
        mother_id: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

const COLUMNS: &str = "id, name, description, father_id, mother_id, created_at, updated_at";

impl<'conn> super::BranchRepository for SqliteBranchRepository<'conn> {
    fn create(&self, record: &FamilyBranchRecord) -> Result<()> {
        self.conn.execute(
            &format!("INSERT INTO family_branches ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"),
            params![
                record.id,
                record.name,
                record.description,
                record.father_id,
                record.mother_id,
                record.created_at,
                record.updated_at,
            ],
        )?;
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<FamilyBranchRecord>> {
        Ok(self
            .conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM family_branches WHERE id = ?1"),
                params![id],
                map_row,
            )
            .optional()?)
    }

    fn list(&self) -> Result<Vec<FamilyBranchRecord>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {COLUMNS} FROM family_branches ORDER BY name ASC"))?;
        let rows = stmt.query_map([], map_row)?;
        let mut branches = Vec::new();
        for row in rows {
            branches.push(row?);
        }
        Ok(branches)
    }

    fn delete(&self, id: &str) -> Result<()> {
        // Media and member rows outlive the branch; news cascades via its FK.
        self.conn.execute(
            "UPDATE media SET branch_id = NULL WHERE branch_id = ?1",
            params![id],
        )?;
        self.conn.execute(
            "UPDATE family_members SET parent_id = NULL WHERE parent_id = ?1",
            params![id],
        )?;
        self.conn
            .execute("DELETE FROM family_branches WHERE id = ?1", params![id])?;
        Ok(())
    }
}
