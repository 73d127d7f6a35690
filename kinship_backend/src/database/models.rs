use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileRecord {
    pub id: String,
    pub email: String,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
    pub password_salt: String,
    pub password_hash: String,
    pub created_at: String,
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRoleRecord {
    pub id: String,
    pub user_id: String,
    pub role: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub token: String,
    pub user_id: String,
    pub created_at: String,
    pub expires_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FamilyMemberRecord {
    pub id: String,
    pub full_name: String,
    pub generation: i64,
    pub parent_id: Option<String>,
    pub birth_date: Option<String>,
    pub bio: Option<String>,
    pub occupation: Option<String>,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub address: Option<String>,
    pub profile_photo_url: Option<String>,
    pub created_at: String,
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FamilyBranchRecord {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub father_id: Option<String>,
    pub mother_id: Option<String>,
    pub created_at: String,
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FamilyNewsRecord {
    pub id: String,
    pub branch_id: Option<String>,
    pub title: String,
    pub content: String,
    pub image_url: Option<String>,
    pub author_id: Option<String>,
    pub created_at: String,
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaRecord {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub media_type: String, // 'photo', 'video', or 'story'
    pub file_url: String,
    pub thumbnail_url: Option<String>,
    pub branch_id: Option<String>,
    pub member_id: Option<String>,
    pub uploaded_by: Option<String>,
    /// Set only for rows whose bytes live in local storage.
    pub path: Option<String>,
    pub size_bytes: Option<i64>,
    pub checksum: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub event_date: String,
    pub location: Option<String>,
    pub created_by: Option<String>,
    pub created_at: String,
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlogPostRecord {
    pub id: String,
    pub title: String,
    /// Opaque HTML produced by the editor; rendered verbatim by the client.
    pub content: String,
    pub category: Option<String>,
    pub image_url: Option<String>,
    pub author_id: Option<String>,
    pub published: bool,
    pub created_at: String,
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlogCommentRecord {
    pub id: String,
    pub post_id: String,
    pub user_id: String,
    pub content: String,
    pub created_at: String,
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlogLikeRecord {
    pub id: String,
    pub post_id: String,
    pub user_id: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollRecord {
    pub id: String,
    pub question: String,
    /// JSON array of option labels, stored opaquely.
    pub options: Vec<String>,
    pub created_by: Option<String>,
    pub created_at: String,
    pub closes_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollVoteRecord {
    pub id: String,
    pub poll_id: String,
    pub user_id: String,
    pub option_index: i64,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactMessageRecord {
    pub id: String,
    pub name: String,
    pub email: String,
    pub subject: String,
    pub message: String,
    pub created_at: String,
}
