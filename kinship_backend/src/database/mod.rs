pub mod models;
pub mod repositories;

use crate::config::KinshipPaths;
use anyhow::{anyhow, Result};
use rusqlite::Connection;
use std::sync::{Arc, Mutex};

pub(crate) const MIGRATIONS: &str = r#"
    PRAGMA journal_mode = WAL;
    PRAGMA foreign_keys = ON;

    CREATE TABLE IF NOT EXISTS profiles (
        id TEXT PRIMARY KEY,
        email TEXT NOT NULL UNIQUE,
        full_name TEXT,
        avatar_url TEXT,
        password_salt TEXT NOT NULL,
        password_hash TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT
    );

    CREATE TABLE IF NOT EXISTS user_roles (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        role TEXT NOT NULL CHECK (role IN ('admin', 'moderator', 'user')),
        created_at TEXT NOT NULL,
        UNIQUE (user_id, role),
        FOREIGN KEY (user_id) REFERENCES profiles(id) ON DELETE CASCADE
    );

    CREATE TABLE IF NOT EXISTS sessions (
        token TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        created_at TEXT NOT NULL,
        expires_at TEXT NOT NULL,
        FOREIGN KEY (user_id) REFERENCES profiles(id) ON DELETE CASCADE
    );

    -- parent_id is a flat grouping reference (branch or elder member) and is
    -- never traversed recursively, so it carries no FK constraint.
    CREATE TABLE IF NOT EXISTS family_members (
        id TEXT PRIMARY KEY,
        full_name TEXT NOT NULL,
        generation INTEGER NOT NULL DEFAULT 1,
        parent_id TEXT,
        birth_date TEXT,
        bio TEXT,
        occupation TEXT,
        email TEXT,
        phone_number TEXT,
        address TEXT,
        profile_photo_url TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT
    );

    CREATE TABLE IF NOT EXISTS family_branches (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        description TEXT,
        father_id TEXT,
        mother_id TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT,
        FOREIGN KEY (father_id) REFERENCES family_members(id),
        FOREIGN KEY (mother_id) REFERENCES family_members(id)
    );

    CREATE TABLE IF NOT EXISTS family_news (
        id TEXT PRIMARY KEY,
        branch_id TEXT,
        title TEXT NOT NULL,
        content TEXT NOT NULL,
        image_url TEXT,
        author_id TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT,
        FOREIGN KEY (branch_id) REFERENCES family_branches(id) ON DELETE CASCADE
    );

    CREATE TABLE IF NOT EXISTS media (
        id TEXT PRIMARY KEY,
        title TEXT NOT NULL,
        description TEXT,
        media_type TEXT NOT NULL CHECK (media_type IN ('photo', 'video', 'story')),
        file_url TEXT NOT NULL,
        thumbnail_url TEXT,
        branch_id TEXT,
        member_id TEXT,
        uploaded_by TEXT,
        path TEXT,
        size_bytes INTEGER,
        checksum TEXT,
        created_at TEXT NOT NULL,
        FOREIGN KEY (branch_id) REFERENCES family_branches(id),
        FOREIGN KEY (member_id) REFERENCES family_members(id)
    );

    CREATE TABLE IF NOT EXISTS events (
        id TEXT PRIMARY KEY,
        title TEXT NOT NULL,
        description TEXT,
        event_date TEXT NOT NULL,
        location TEXT,
        created_by TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT
    );

    CREATE TABLE IF NOT EXISTS blog_posts (
        id TEXT PRIMARY KEY,
        title TEXT NOT NULL,
        content TEXT NOT NULL,
        category TEXT,
        image_url TEXT,
        author_id TEXT,
        published INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL,
        updated_at TEXT
    );

    CREATE TABLE IF NOT EXISTS blog_comments (
        id TEXT PRIMARY KEY,
        post_id TEXT NOT NULL,
        user_id TEXT NOT NULL,
        content TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT,
        FOREIGN KEY (post_id) REFERENCES blog_posts(id) ON DELETE CASCADE
    );

    CREATE TABLE IF NOT EXISTS blog_likes (
        id TEXT PRIMARY KEY,
        post_id TEXT NOT NULL,
        user_id TEXT NOT NULL,
        created_at TEXT NOT NULL,
        UNIQUE (post_id, user_id),
        FOREIGN KEY (post_id) REFERENCES blog_posts(id) ON DELETE CASCADE
    );

    CREATE TABLE IF NOT EXISTS polls (
        id TEXT PRIMARY KEY,
        question TEXT NOT NULL,
        options TEXT NOT NULL,
        created_by TEXT,
        created_at TEXT NOT NULL,
        closes_at TEXT
    );

    CREATE TABLE IF NOT EXISTS poll_votes (
        id TEXT PRIMARY KEY,
        poll_id TEXT NOT NULL,
        user_id TEXT NOT NULL,
        option_index INTEGER NOT NULL,
        created_at TEXT NOT NULL,
        UNIQUE (poll_id, user_id),
        FOREIGN KEY (poll_id) REFERENCES polls(id) ON DELETE CASCADE
    );

    CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id);
    CREATE INDEX IF NOT EXISTS idx_roles_user ON user_roles(user_id);
    CREATE INDEX IF NOT EXISTS idx_members_parent ON family_members(parent_id);
    CREATE INDEX IF NOT EXISTS idx_news_branch ON family_news(branch_id);
    CREATE INDEX IF NOT EXISTS idx_media_branch ON media(branch_id);
    CREATE INDEX IF NOT EXISTS idx_comments_post ON blog_comments(post_id);
    CREATE INDEX IF NOT EXISTS idx_likes_post ON blog_likes(post_id);
    CREATE INDEX IF NOT EXISTS idx_votes_poll ON poll_votes(poll_id);
"#;

#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    newly_created: bool,
}

impl Database {
    pub fn connect(paths: &KinshipPaths) -> Result<Self> {
        let newly_created = !paths.db_path.exists();
        let conn = Connection::open(&paths.db_path)?;
        Ok(Self::from_connection(conn, newly_created))
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self::from_connection(conn, true);
        db.ensure_migrations()?;
        Ok(db)
    }

    pub fn from_connection(conn: Connection, newly_created: bool) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
            newly_created,
        }
    }

    pub fn ensure_migrations(&self) -> Result<bool> {
        self.with_conn(|conn| {
            conn.execute_batch(MIGRATIONS)?;
            self.ensure_media_storage_columns(conn)?;
            self.ensure_contact_messages_table(conn)?;
            Ok(())
        })?;
        Ok(self.newly_created)
    }

    pub fn with_repositories<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(repositories::SqliteRepositories<'_>) -> Result<T>,
    {
        self.with_conn(|conn| {
            let repos = repositories::SqliteRepositories::new(conn);
            f(repos)
        })
    }

    fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let guard = self
            .conn
            .lock()
            .map_err(|_| anyhow!("database mutex poisoned"))?;
        f(&guard)
    }

    // Older deployments created the media table before rows uploaded through
    // the API grew local-storage bookkeeping columns.
    fn ensure_media_storage_columns(&self, conn: &Connection) -> Result<()> {
        let mut stmt = conn.prepare("PRAGMA table_info(media)")?;
        let mut has_path = false;
        let mut has_checksum = false;
        let rows = stmt.query_map([], |row| {
            let name: String = row.get(1)?;
            Ok(name)
        })?;
        for row in rows {
            let name = row?;
            if name.eq_ignore_ascii_case("path") {
                has_path = true;
            }
            if name.eq_ignore_ascii_case("checksum") {
                has_checksum = true;
            }
        }
        if !has_path {
            conn.execute("ALTER TABLE media ADD COLUMN path TEXT", [])?;
            conn.execute("ALTER TABLE media ADD COLUMN size_bytes INTEGER", [])?;
        }
        if !has_checksum {
            conn.execute("ALTER TABLE media ADD COLUMN checksum TEXT", [])?;
        }
        Ok(())
    }

    fn ensure_contact_messages_table(&self, conn: &Connection) -> Result<()> {
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS contact_messages (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                email TEXT NOT NULL,
                subject TEXT NOT NULL,
                message TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
            [],
        )?;
        Ok(())
    }
}
