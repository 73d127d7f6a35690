use crate::database::models::FamilyMemberRecord;
use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension, Row};

pub(super) struct SqliteMemberRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

const COLUMNS: &str = "id, full_name, generation, parent_id, birth_date, bio, occupation, \
                       email, phone_number, address, profile_photo_url, created_at, updated_at";

fn map_row(row: &Row<'_>) -> rusqlite::Result<FamilyMemberRecord> {
    Ok(FamilyMemberRecord {
        id: row.get(0)?,
        full_name: row.get(1)?,
        generation: row.get(2)?,
        parent_id: row.get(3)?,
        birth_date: row.get(4)?,
        bio: row.get(5)?,
        occupation: row.get(6)?,
        email: row.get(7)?,
        phone_number: row.get(8)?,
        address: row.get(9)?,
        profile_photo_url: row.get(10)?,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}

impl<'conn> super::MemberRepository for SqliteMemberRepository<'conn> {
    fn create(&self, record: &FamilyMemberRecord) -> Result<()> {
        self.conn.execute(
            &format!(
                "INSERT INTO family_members ({COLUMNS}) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)"
            ),
            params![
                record.id,
                record.full_name,
                record.generation,
                record.parent_id,
                record.birth_date,
                record.bio,
                record.occupation,
                record.email,
                record.phone_number,
                record.address,
                record.profile_photo_url,
                record.created_at,
                record.updated_at,
            ],
        )?;
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<FamilyMemberRecord>> {
        Ok(self
            .conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM family_members WHERE id = ?1"),
                params![id],
                map_row,
            )
            .optional()?)
    }

    fn list(&self) -> Result<Vec<FamilyMemberRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {COLUMNS} FROM family_members ORDER BY generation ASC, full_name ASC"
        ))?;
        let rows = stmt.query_map([], map_row)?;
        let mut members = Vec::new();
        for row in rows {
            members.push(row?);
        }
        Ok(members)
    }

    fn list_for_parent(&self, parent_id: &str) -> Result<Vec<FamilyMemberRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {COLUMNS} FROM family_members WHERE parent_id = ?1 ORDER BY full_name ASC"
        ))?;
        let rows = stmt.query_map(params![parent_id], map_row)?;
        let mut members = Vec::new();
        for row in rows {
            members.push(row?);
        }
        Ok(members)
    }

    fn delete(&self, id: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM family_members WHERE id = ?1", params![id])?;
        Ok(())
    }
}
