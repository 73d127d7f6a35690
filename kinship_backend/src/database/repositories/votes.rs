use crate::database::models::PollVoteRecord;
use anyhow::Result;
use rusqlite::{params, Connection, Row};

pub(super) struct SqliteVoteRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

const COLUMNS: &str = "id, poll_id, user_id, option_index, created_at";

fn map_row(row: &Row<'_>) -> rusqlite::Result<PollVoteRecord> {
    Ok(PollVoteRecord {
        id: row.get(0)?,
        poll_id: row.get(1)?,
        user_id: row.get(2)?,
        option_index: row.get(3)?,
        created_at: row.get(4)?,
    })
}

impl<'conn> super::VoteRepository for SqliteVoteRepository<'conn> {
    fn create(&self, record: &PollVoteRecord) -> Result<()> {
        // Deliberately no ON CONFLICT clause: the UNIQUE(poll_id, user_id)
        // violation must surface so callers can report "already voted".
        self.conn.execute(
            &format!("INSERT INTO poll_votes ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5)"),
            params![
                record.id,
                record.poll_id,
                record.user_id,
                record.option_index,
                record.created_at,
            ],
        )?;
        Ok(())
    }

    fn list_all(&self) -> Result<Vec<PollVoteRecord>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {COLUMNS} FROM poll_votes"))?;
        let rows = stmt.query_map([], map_row)?;
        let mut votes = Vec::new();
        for row in rows {
            votes.push(row?);
        }
        Ok(votes)
    }

    fn list_for_poll(&self, poll_id: &str) -> Result<Vec<PollVoteRecord>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {COLUMNS} FROM poll_votes WHERE poll_id = ?1"))?;
        let rows = stmt.query_map(params![poll_id], map_row)?;
        let mut votes = Vec::new();
        for row in rows {
            votes.push(row?);
        }
        Ok(votes)
    }
}
