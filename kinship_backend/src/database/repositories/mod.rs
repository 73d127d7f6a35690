mod branches;
mod comments;
mod contact;
mod events;
mod likes;
mod media;
mod members;
mod news;
mod polls;
mod posts;
mod profiles;
mod roles;
mod sessions;
mod votes;

use super::models::{
    BlogCommentRecord, BlogLikeRecord, BlogPostRecord, ContactMessageRecord, EventRecord,
    FamilyBranchRecord, FamilyMemberRecord, FamilyNewsRecord, MediaRecord, PollRecord,
    PollVoteRecord, ProfileRecord, SessionRecord, UserRoleRecord,
};
use anyhow::Result;
use rusqlite::Connection;
use std::collections::HashMap;

pub trait ProfileRepository {
    fn create(&self, record: &ProfileRecord) -> Result<()>;
    fn get(&self, id: &str) -> Result<Option<ProfileRecord>>;
    fn get_by_email(&self, email: &str) -> Result<Option<ProfileRecord>>;
    fn update_info(&self, id: &str, full_name: Option<&str>, avatar_url: Option<&str>)
        -> Result<()>;
}

pub trait RoleRepository {
    fn grant(&self, record: &UserRoleRecord) -> Result<()>;
    fn has_role(&self, user_id: &str, role: &str) -> Result<bool>;
    fn roles_for(&self, user_id: &str) -> Result<Vec<String>>;
}

pub trait SessionRepository {
    fn create(&self, record: &SessionRecord) -> Result<()>;
    fn get(&self, token: &str) -> Result<Option<SessionRecord>>;
    fn delete(&self, token: &str) -> Result<()>;
    fn purge_expired(&self, now: &str) -> Result<usize>;
}

pub trait MemberRepository {
    fn create(&self, record: &FamilyMemberRecord) -> Result<()>;
    fn get(&self, id: &str) -> Result<Option<FamilyMemberRecord>>;
    fn list(&self) -> Result<Vec<FamilyMemberRecord>>;
    fn list_for_parent(&self, parent_id: &str) -> Result<Vec<FamilyMemberRecord>>;
    fn delete(&self, id: &str) -> Result<()>;
}

pub trait BranchRepository {
    fn create(&self, record: &FamilyBranchRecord) -> Result<()>;
    fn get(&self, id: &str) -> Result<Option<FamilyBranchRecord>>;
    fn list(&self) -> Result<Vec<FamilyBranchRecord>>;
    fn delete(&self, id: &str) -> Result<()>;
}

pub trait NewsRepository {
    fn create(&self, record: &FamilyNewsRecord) -> Result<()>;
    fn get(&self, id: &str) -> Result<Option<FamilyNewsRecord>>;
    fn list_recent(&self, limit: usize) -> Result<Vec<FamilyNewsRecord>>;
    fn list_for_branch(&self, branch_id: &str) -> Result<Vec<FamilyNewsRecord>>;
    fn delete(&self, id: &str) -> Result<()>;
}

pub trait MediaRepository {
    fn create(&self, record: &MediaRecord) -> Result<()>;
    fn get(&self, id: &str) -> Result<Option<MediaRecord>>;
    fn list(&self, media_type: Option<&str>) -> Result<Vec<MediaRecord>>;
    fn list_for_branch(&self, branch_id: &str) -> Result<Vec<MediaRecord>>;
    fn delete(&self, id: &str) -> Result<()>;
}

pub trait EventRepository {
    fn create(&self, record: &EventRecord) -> Result<()>;
    fn get(&self, id: &str) -> Result<Option<EventRecord>>;
    fn list(&self) -> Result<Vec<EventRecord>>;
    fn delete(&self, id: &str) -> Result<()>;
}

pub trait BlogPostRepository {
    fn create(&self, record: &BlogPostRecord) -> Result<()>;
    fn update(&self, record: &BlogPostRecord) -> Result<()>;
    fn get(&self, id: &str) -> Result<Option<BlogPostRecord>>;
    fn list_published(&self, category: Option<&str>) -> Result<Vec<BlogPostRecord>>;
    fn list_all(&self) -> Result<Vec<BlogPostRecord>>;
    fn delete(&self, id: &str) -> Result<()>;
}

pub trait CommentRepository {
    fn create(&self, record: &BlogCommentRecord) -> Result<()>;
    fn get(&self, id: &str) -> Result<Option<BlogCommentRecord>>;
    fn list_for_post(&self, post_id: &str) -> Result<Vec<BlogCommentRecord>>;
    /// Batched per-post counts, one query for the whole listing.
    fn count_by_post(&self) -> Result<HashMap<String, i64>>;
    fn delete(&self, id: &str) -> Result<()>;
}

pub trait LikeRepository {
    fn add(&self, record: &BlogLikeRecord) -> Result<()>;
    fn remove(&self, post_id: &str, user_id: &str) -> Result<()>;
    fn exists(&self, post_id: &str, user_id: &str) -> Result<bool>;
    fn count_for_post(&self, post_id: &str) -> Result<i64>;
    /// Batched per-post counts, one query for the whole listing.
    fn count_by_post(&self) -> Result<HashMap<String, i64>>;
}

pub trait PollRepository {
    fn create(&self, record: &PollRecord) -> Result<()>;
    fn get(&self, id: &str) -> Result<Option<PollRecord>>;
    fn list_recent(&self, limit: usize) -> Result<Vec<PollRecord>>;
}

pub trait VoteRepository {
    fn create(&self, record: &PollVoteRecord) -> Result<()>;
    fn list_all(&self) -> Result<Vec<PollVoteRecord>>;
    fn list_for_poll(&self, poll_id: &str) -> Result<Vec<PollVoteRecord>>;
}

pub trait ContactRepository {
    fn create(&self, record: &ContactMessageRecord) -> Result<()>;
    fn list_recent(&self, limit: usize) -> Result<Vec<ContactMessageRecord>>;
}

/// Per-call factory over a borrowed connection; handlers never hold it
/// across an await point.
pub struct SqliteRepositories<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteRepositories<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    pub fn profiles(&self) -> impl ProfileRepository + '_ {
        profiles::SqliteProfileRepository { conn: self.conn }
    }

    pub fn roles(&self) -> impl RoleRepository + '_ {
        roles::SqliteRoleRepository { conn: self.conn }
    }

    pub fn sessions(&self) -> impl SessionRepository + '_ {
        sessions::SqliteSessionRepository { conn: self.conn }
    }

    pub fn members(&self) -> impl MemberRepository + '_ {
        members::SqliteMemberRepository { conn: self.conn }
    }

    pub fn branches(&self) -> impl BranchRepository + '_ {
        branches::SqliteBranchRepository { conn: self.conn }
    }

    pub fn news(&self) -> impl NewsRepository + '_ {
        news::SqliteNewsRepository { conn: self.conn }
    }

    pub fn media(&self) -> impl MediaRepository + '_ {
        media::SqliteMediaRepository { conn: self.conn }
    }

    pub fn events(&self) -> impl EventRepository + '_ {
        events::SqliteEventRepository { conn: self.conn }
    }

    pub fn blog_posts(&self) -> impl BlogPostRepository + '_ {
        posts::SqliteBlogPostRepository { conn: self.conn }
    }

    pub fn comments(&self) -> impl CommentRepository + '_ {
        comments::SqliteCommentRepository { conn: self.conn }
    }

    pub fn likes(&self) -> impl LikeRepository + '_ {
        likes::SqliteLikeRepository { conn: self.conn }
    }

    pub fn polls(&self) -> impl PollRepository + '_ {
        polls::SqlitePollRepository { conn: self.conn }
    }

    pub fn votes(&self) -> impl VoteRepository + '_ {
        votes::SqliteVoteRepository { conn: self.conn }
    }

    pub fn contact(&self) -> impl ContactRepository + '_ {
        contact::SqliteContactRepository { conn: self.conn }
    }

    pub fn conn(&self) -> &'conn Connection {
        self.conn
    }
}
