//! Blog posts, comments and likes.
//!
//! Listings carry like and comment counts gathered with one grouped query per
//! table, whatever the number of posts. Drafts are visible to their author and
//! to admins only; everyone else sees them as missing. Mutations publish a
//! change event after the write lands.

use crate::auth::SessionContext;
use crate::database::models::{BlogCommentRecord, BlogLikeRecord, BlogPostRecord};
use crate::database::repositories::{
    BlogPostRepository, CommentRepository, LikeRepository, ProfileRepository,
};
use crate::database::Database;
use crate::errors::DomainError;
use crate::realtime::{ChangeEvent, ChangeHub, ChangeOp};
use crate::utils::now_utc_iso;
use anyhow::Result;
use html2text::from_read;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

const EXCERPT_CHARS: usize = 200;
const MAX_TITLE_CHARS: usize = 200;
const MAX_COMMENT_CHARS: usize = 1000;

#[derive(Clone)]
pub struct BlogService {
    database: Database,
    hub: ChangeHub,
}

#[derive(Debug, Clone, Serialize)]
pub struct PostSummary {
    pub id: String,
    pub title: String,
    pub excerpt: String,
    pub category: Option<String>,
    pub image_url: Option<String>,
    pub author_id: Option<String>,
    pub published: bool,
    pub created_at: String,
    pub like_count: i64,
    pub comment_count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommentView {
    pub id: String,
    pub post_id: String,
    pub user_id: String,
    pub author_name: Option<String>,
    pub content: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PostDetails {
    pub id: String,
    pub title: String,
    pub content: String,
    pub category: Option<String>,
    pub image_url: Option<String>,
    pub author_id: Option<String>,
    pub author_name: Option<String>,
    pub published: bool,
    pub created_at: String,
    pub updated_at: Option<String>,
    pub like_count: i64,
    pub comment_count: i64,
    pub viewer_has_liked: bool,
    pub comments: Vec<CommentView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LikeStatus {
    pub post_id: String,
    pub liked: bool,
    pub like_count: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatePostInput {
    pub title: String,
    pub content: String,
    pub category: Option<String>,
    pub image_url: Option<String>,
    #[serde(default)]
    pub published: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdatePostInput {
    pub title: Option<String>,
    pub content: Option<String>,
    pub category: Option<String>,
    pub image_url: Option<String>,
    pub published: Option<bool>,
}

impl BlogService {
    pub fn new(database: Database, hub: ChangeHub) -> Self {
        Self { database, hub }
    }

    /// Published posts, newest first, with batched like/comment counts.
    pub fn list_posts(&self, category: Option<&str>) -> Result<Vec<PostSummary>> {
        self.database.with_repositories(|repos| {
            let posts = repos.blog_posts().list_published(category)?;
            let like_counts = repos.likes().count_by_post()?;
            let comment_counts = repos.comments().count_by_post()?;
            Ok(summarize(posts, &like_counts, &comment_counts))
        })
    }

    /// Every post including drafts; admin dashboard listing.
    pub fn list_all_posts(&self, viewer: &SessionContext) -> Result<Vec<PostSummary>> {
        if !viewer.is_admin() {
            return Err(DomainError::forbidden("admin role required"));
        }
        self.database.with_repositories(|repos| {
            let posts = repos.blog_posts().list_all()?;
            let like_counts = repos.likes().count_by_post()?;
            let comment_counts = repos.comments().count_by_post()?;
            Ok(summarize(posts, &like_counts, &comment_counts))
        })
    }

    pub fn get_post(&self, post_id: &str, viewer: Option<&SessionContext>) -> Result<PostDetails> {
        self.database.with_repositories(|repos| {
            let Some(post) = repos.blog_posts().get(post_id)? else {
                return Err(DomainError::not_found("post not found"));
            };
            if !post.published && !can_manage(&post, viewer) {
                // Drafts look absent to everyone but their author and admins.
                return Err(DomainError::not_found("post not found"));
            }

            let comments = repos.comments().list_for_post(post_id)?;
            let like_count = repos.likes().count_for_post(post_id)?;
            let viewer_has_liked = match viewer {
                Some(ctx) => repos.likes().exists(post_id, &ctx.user_id)?,
                None => false,
            };

            let mut author_names: HashMap<String, Option<String>> = HashMap::new();
            let mut comment_views = Vec::with_capacity(comments.len());
            for comment in comments {
                let author_name = match author_names.get(&comment.user_id) {
                    Some(name) => name.clone(),
                    None => {
                        let name = repos
                            .profiles()
                            .get(&comment.user_id)?
                            .and_then(|profile| profile.full_name);
                        author_names.insert(comment.user_id.clone(), name.clone());
                        name
                    }
                };
                comment_views.push(CommentView {
                    id: comment.id,
                    post_id: comment.post_id,
                    user_id: comment.user_id,
                    author_name,
                    content: comment.content,
                    created_at: comment.created_at,
                });
            }

            let author_name = match &post.author_id {
                Some(author_id) => repos
                    .profiles()
                    .get(author_id)?
                    .and_then(|profile| profile.full_name),
                None => None,
            };

            Ok(PostDetails {
                id: post.id,
                title: post.title,
                content: post.content,
                category: post.category,
                image_url: post.image_url,
                author_id: post.author_id,
                author_name,
                published: post.published,
                created_at: post.created_at,
                updated_at: post.updated_at,
                like_count,
                comment_count: comment_views.len() as i64,
                viewer_has_liked,
                comments: comment_views,
            })
        })
    }

    pub fn create_post(
        &self,
        input: CreatePostInput,
        author: &SessionContext,
    ) -> Result<PostDetails> {
        validate_title(&input.title)?;
        if input.content.trim().is_empty() {
            return Err(DomainError::invalid("post content may not be empty"));
        }
        if let Some(image_url) = input.image_url.as_deref() {
            if !crate::utils::looks_like_url(image_url) {
                return Err(DomainError::invalid("image_url is not a valid URL"));
            }
        }
        let record = BlogPostRecord {
            id: Uuid::new_v4().to_string(),
            title: input.title.trim().to_string(),
            content: input.content,
            category: input.category,
            image_url: input.image_url,
            author_id: Some(author.user_id.clone()),
            published: input.published.unwrap_or(true),
            created_at: now_utc_iso(),
            updated_at: None,
        };
        self.database
            .with_repositories(|repos| repos.blog_posts().create(&record))?;
        self.hub
            .publish(ChangeEvent::new("blog_posts", ChangeOp::Insert, &record.id));
        self.get_post(&record.id, Some(author))
    }

    pub fn update_post(
        &self,
        post_id: &str,
        input: UpdatePostInput,
        viewer: &SessionContext,
    ) -> Result<PostDetails> {
        let updated = self.database.with_repositories(|repos| {
            let Some(mut post) = repos.blog_posts().get(post_id)? else {
                return Err(DomainError::not_found("post not found"));
            };
            if !can_manage(&post, Some(viewer)) {
                return Err(DomainError::forbidden("only the author or an admin may edit"));
            }
            if let Some(title) = input.title {
                validate_title(&title)?;
                post.title = title.trim().to_string();
            }
            if let Some(content) = input.content {
                if content.trim().is_empty() {
                    return Err(DomainError::invalid("post content may not be empty"));
                }
                post.content = content;
            }
            // An empty string clears the stored value; an absent field
            // leaves it alone.
            if let Some(category) = input.category {
                let category = category.trim().to_string();
                post.category = if category.is_empty() {
                    None
                } else {
                    Some(category)
                };
            }
            if let Some(image_url) = input.image_url {
                if image_url.trim().is_empty() {
                    post.image_url = None;
                } else {
                    if !crate::utils::looks_like_url(&image_url) {
                        return Err(DomainError::invalid("image_url is not a valid URL"));
                    }
                    post.image_url = Some(image_url);
                }
            }
            if let Some(published) = input.published {
                post.published = published;
            }
            post.updated_at = Some(now_utc_iso());
            repos.blog_posts().update(&post)?;
            Ok(post)
        })?;
        self.hub
            .publish(ChangeEvent::new("blog_posts", ChangeOp::Update, &updated.id));
        self.get_post(post_id, Some(viewer))
    }

    pub fn delete_post(&self, post_id: &str, viewer: &SessionContext) -> Result<()> {
        self.database.with_repositories(|repos| {
            let Some(post) = repos.blog_posts().get(post_id)? else {
                return Err(DomainError::not_found("post not found"));
            };
            if !can_manage(&post, Some(viewer)) {
                return Err(DomainError::forbidden(
                    "only the author or an admin may delete",
                ));
            }
            repos.blog_posts().delete(post_id)
        })?;
        self.hub
            .publish(ChangeEvent::new("blog_posts", ChangeOp::Delete, post_id));
        Ok(())
    }

    pub fn add_comment(
        &self,
        post_id: &str,
        content: &str,
        viewer: &SessionContext,
    ) -> Result<CommentView> {
        if content.trim().is_empty() {
            return Err(DomainError::invalid("comment may not be empty"));
        }
        if content.chars().count() > MAX_COMMENT_CHARS {
            return Err(DomainError::invalid(format!(
                "comment may not exceed {MAX_COMMENT_CHARS} characters"
            )));
        }
        let record = BlogCommentRecord {
            id: Uuid::new_v4().to_string(),
            post_id: post_id.to_string(),
            user_id: viewer.user_id.clone(),
            content: content.trim().to_string(),
            created_at: now_utc_iso(),
            updated_at: None,
        };
        self.database.with_repositories(|repos| {
            if repos.blog_posts().get(post_id)?.is_none() {
                return Err(DomainError::not_found("post not found"));
            }
            repos.comments().create(&record)
        })?;
        self.hub.publish(
            ChangeEvent::new("blog_comments", ChangeOp::Insert, &record.id)
                .with_field("post_id", post_id),
        );
        Ok(CommentView {
            id: record.id,
            post_id: record.post_id,
            user_id: record.user_id,
            author_name: viewer.full_name.clone(),
            content: record.content,
            created_at: record.created_at,
        })
    }

    pub fn delete_comment(&self, comment_id: &str, viewer: &SessionContext) -> Result<()> {
        let post_id = self.database.with_repositories(|repos| {
            let Some(comment) = repos.comments().get(comment_id)? else {
                return Err(DomainError::not_found("comment not found"));
            };
            if comment.user_id != viewer.user_id && !viewer.is_admin() {
                return Err(DomainError::forbidden(
                    "only the comment author or an admin may delete",
                ));
            }
            repos.comments().delete(comment_id)?;
            Ok(comment.post_id)
        })?;
        self.hub.publish(
            ChangeEvent::new("blog_comments", ChangeOp::Delete, comment_id)
                .with_field("post_id", &post_id),
        );
        Ok(())
    }

    /// Idempotent form of the toggle for the explicit like/unlike endpoints.
    pub fn set_like(
        &self,
        post_id: &str,
        viewer: &SessionContext,
        liked: bool,
    ) -> Result<LikeStatus> {
        let (current, like_count) = self.database.with_repositories(|repos| {
            if repos.blog_posts().get(post_id)?.is_none() {
                return Err(DomainError::not_found("post not found"));
            }
            let likes = repos.likes();
            Ok((
                likes.exists(post_id, &viewer.user_id)?,
                likes.count_for_post(post_id)?,
            ))
        })?;
        if current == liked {
            return Ok(LikeStatus {
                post_id: post_id.to_string(),
                liked,
                like_count,
            });
        }
        self.toggle_like(post_id, viewer)
    }

    /// Adds the like if missing, removes it otherwise.
    pub fn toggle_like(&self, post_id: &str, viewer: &SessionContext) -> Result<LikeStatus> {
        let (liked, like_count, op, row_id) = self.database.with_repositories(|repos| {
            if repos.blog_posts().get(post_id)?.is_none() {
                return Err(DomainError::not_found("post not found"));
            }
            let likes = repos.likes();
            if likes.exists(post_id, &viewer.user_id)? {
                likes.remove(post_id, &viewer.user_id)?;
                let count = likes.count_for_post(post_id)?;
                Ok((false, count, ChangeOp::Delete, post_id.to_string()))
            } else {
                let record = BlogLikeRecord {
                    id: Uuid::new_v4().to_string(),
                    post_id: post_id.to_string(),
                    user_id: viewer.user_id.clone(),
                    created_at: now_utc_iso(),
                };
                likes.add(&record)?;
                let count = likes.count_for_post(post_id)?;
                Ok((true, count, ChangeOp::Insert, record.id))
            }
        })?;
        self.hub.publish(
            ChangeEvent::new("blog_likes", op, &row_id).with_field("post_id", post_id),
        );
        Ok(LikeStatus {
            post_id: post_id.to_string(),
            liked,
            like_count,
        })
    }
}

fn validate_title(title: &str) -> Result<()> {
    if title.trim().is_empty() {
        return Err(DomainError::invalid("post title may not be empty"));
    }
    if title.chars().count() > MAX_TITLE_CHARS {
        return Err(DomainError::invalid(format!(
            "post title may not exceed {MAX_TITLE_CHARS} characters"
        )));
    }
    Ok(())
}

fn can_manage(post: &BlogPostRecord, viewer: Option<&SessionContext>) -> bool {
    let Some(viewer) = viewer else {
        return false;
    };
    viewer.is_admin() || post.author_id.as_deref() == Some(viewer.user_id.as_str())
}

fn summarize(
    posts: Vec<BlogPostRecord>,
    like_counts: &HashMap<String, i64>,
    comment_counts: &HashMap<String, i64>,
) -> Vec<PostSummary> {
    posts
        .into_iter()
        .map(|post| {
            let like_count = like_counts.get(&post.id).copied().unwrap_or(0);
            let comment_count = comment_counts.get(&post.id).copied().unwrap_or(0);
            PostSummary {
                excerpt: excerpt_of(&post.content),
                id: post.id,
                title: post.title,
                category: post.category,
                image_url: post.image_url,
                author_id: post.author_id,
                published: post.published,
                created_at: post.created_at,
                like_count,
                comment_count,
            }
        })
        .collect()
}

/// Plain-text excerpt of the stored HTML body.
fn excerpt_of(content: &str) -> String {
    let text = from_read(content.as_bytes(), 120);
    let flattened = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flattened.chars().count() <= EXCERPT_CHARS {
        return flattened;
    }
    let cut: String = flattened.chars().take(EXCERPT_CHARS).collect();
    format!("{}…", cut.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AuthService, SignUpInput, ROLE_ADMIN};
    use rusqlite::Connection;

    fn setup() -> (BlogService, AuthService, ChangeHub) {
        let conn = Connection::open_in_memory().expect("in-memory db");
        let db = Database::from_connection(conn, true);
        db.ensure_migrations().expect("migrations");
        let hub = ChangeHub::new();
        (
            BlogService::new(db.clone(), hub.clone()),
            AuthService::new(db, 24),
            hub,
        )
    }

    fn user(auth: &AuthService, email: &str) -> SessionContext {
        auth.sign_up(SignUpInput {
            email: email.into(),
            password: "hunter22".into(),
            full_name: Some(email.split('@').next().unwrap_or("user").into()),
        })
        .expect("sign up")
        .user
    }

    fn admin(auth: &AuthService, email: &str) -> SessionContext {
        let ctx = user(auth, email);
        auth.grant_role(&ctx.user_id, ROLE_ADMIN).expect("grant");
        auth.context_for(&ctx.user_id)
            .expect("reload")
            .expect("exists")
    }

    fn post(blog: &BlogService, author: &SessionContext, title: &str) -> PostDetails {
        blog.create_post(
            CreatePostInput {
                title: title.into(),
                content: "<p>Hello <b>family</b></p>".into(),
                category: Some("News".into()),
                image_url: None,
                published: Some(true),
            },
            author,
        )
        .expect("create post")
    }

    #[test]
    fn listing_carries_counts_and_excerpts() {
        let (blog, auth, _hub) = setup();
        let alice = user(&auth, "alice@example.com");
        let bob = user(&auth, "bob@example.com");
        let created = post(&blog, &alice, "Summer reunion");

        blog.add_comment(&created.id, "Count me in", &bob)
            .expect("comment");
        blog.toggle_like(&created.id, &bob).expect("like");
        blog.toggle_like(&created.id, &alice).expect("like");

        let listing = blog.list_posts(None).expect("list");
        assert_eq!(listing.len(), 1);
        let summary = &listing[0];
        assert_eq!(summary.like_count, 2);
        assert_eq!(summary.comment_count, 1);
        assert!(summary.excerpt.contains("Hello family"));
        assert!(!summary.excerpt.contains('<'));
    }

    #[test]
    fn drafts_are_invisible_to_other_users() {
        let (blog, auth, _hub) = setup();
        let alice = user(&auth, "alice@example.com");
        let bob = user(&auth, "bob@example.com");
        let boss = admin(&auth, "root@example.com");

        let draft = blog
            .create_post(
                CreatePostInput {
                    title: "Draft".into(),
                    content: "<p>wip</p>".into(),
                    category: None,
                    image_url: None,
                    published: Some(false),
                },
                &alice,
            )
            .expect("create draft");

        assert!(blog.list_posts(None).expect("list").is_empty());
        assert!(blog.get_post(&draft.id, Some(&alice)).is_ok());
        assert!(blog.get_post(&draft.id, Some(&boss)).is_ok());

        let err = blog.get_post(&draft.id, Some(&bob)).expect_err("hidden");
        assert!(matches!(
            err.downcast_ref::<DomainError>(),
            Some(DomainError::NotFound(_))
        ));
        let err = blog.get_post(&draft.id, None).expect_err("hidden");
        assert!(matches!(
            err.downcast_ref::<DomainError>(),
            Some(DomainError::NotFound(_))
        ));
    }

    #[test]
    fn like_toggle_flips_state_without_double_counting() {
        let (blog, auth, _hub) = setup();
        let alice = user(&auth, "alice@example.com");
        let created = post(&blog, &alice, "Likes");

        let first = blog.toggle_like(&created.id, &alice).expect("like");
        assert!(first.liked);
        assert_eq!(first.like_count, 1);

        let second = blog.toggle_like(&created.id, &alice).expect("unlike");
        assert!(!second.liked);
        assert_eq!(second.like_count, 0);

        let third = blog.toggle_like(&created.id, &alice).expect("re-like");
        assert!(third.liked);
        assert_eq!(third.like_count, 1);
    }

    #[test]
    fn comment_mutations_publish_filterable_events() {
        let (blog, auth, hub) = setup();
        let alice = user(&auth, "alice@example.com");
        let created = post(&blog, &alice, "Events");

        let mut rx = hub.subscribe();
        let comment = blog
            .add_comment(&created.id, "First!", &alice)
            .expect("comment");

        let event = rx.try_recv().expect("event published");
        assert_eq!(event.table, "blog_comments");
        assert_eq!(event.op, ChangeOp::Insert);
        assert_eq!(event.row_id, comment.id);
        assert_eq!(event.fields.get("post_id"), Some(&created.id));
    }

    #[test]
    fn only_author_or_admin_may_edit_or_delete() {
        let (blog, auth, _hub) = setup();
        let alice = user(&auth, "alice@example.com");
        let bob = user(&auth, "bob@example.com");
        let boss = admin(&auth, "root@example.com");
        let created = post(&blog, &alice, "Ownership");

        let err = blog
            .update_post(
                &created.id,
                UpdatePostInput {
                    title: Some("Hijacked".into()),
                    content: None,
                    category: None,
                    image_url: None,
                    published: None,
                },
                &bob,
            )
            .expect_err("bob may not edit");
        assert!(matches!(
            err.downcast_ref::<DomainError>(),
            Some(DomainError::Forbidden(_))
        ));

        blog.update_post(
            &created.id,
            UpdatePostInput {
                title: Some("Renamed".into()),
                content: None,
                category: None,
                image_url: None,
                published: None,
            },
            &boss,
        )
        .expect("admin may edit");

        assert!(blog.delete_post(&created.id, &bob).is_err());
        blog.delete_post(&created.id, &alice).expect("author may delete");
    }

    #[test]
    fn empty_strings_clear_optional_post_fields() {
        let (blog, auth, _hub) = setup();
        let alice = user(&auth, "alice@example.com");
        let created = blog
            .create_post(
                CreatePostInput {
                    title: "Decorated".into(),
                    content: "<p>body</p>".into(),
                    category: Some("News".into()),
                    image_url: Some("https://example.com/cover.png".into()),
                    published: Some(true),
                },
                &alice,
            )
            .expect("create post");
        assert_eq!(created.category.as_deref(), Some("News"));

        let updated = blog
            .update_post(
                &created.id,
                UpdatePostInput {
                    title: None,
                    content: None,
                    category: Some(String::new()),
                    image_url: Some(String::new()),
                    published: None,
                },
                &alice,
            )
            .expect("clear fields");
        assert_eq!(updated.category, None);
        assert_eq!(updated.image_url, None);

        // Absent fields are left untouched.
        let untouched = blog
            .update_post(
                &created.id,
                UpdatePostInput {
                    title: Some("Still decorated".into()),
                    content: None,
                    category: None,
                    image_url: None,
                    published: None,
                },
                &alice,
            )
            .expect("partial update");
        assert_eq!(untouched.category, None);
        assert_eq!(untouched.title, "Still decorated");
    }

    #[test]
    fn form_level_validation_runs_before_any_write() {
        let (blog, auth, _hub) = setup();
        let alice = user(&auth, "alice@example.com");
        let created = post(&blog, &alice, "Bounds");

        let oversized = "x".repeat(1001);
        assert!(blog.add_comment(&created.id, &oversized, &alice).is_err());
        assert!(blog.add_comment(&created.id, "   ", &alice).is_err());

        let err = blog
            .create_post(
                CreatePostInput {
                    title: "Bad image".into(),
                    content: "<p>ok</p>".into(),
                    category: None,
                    image_url: Some("javascript:alert(1)".into()),
                    published: None,
                },
                &alice,
            )
            .expect_err("bad image url");
        assert!(matches!(
            err.downcast_ref::<DomainError>(),
            Some(DomainError::Invalid(_))
        ));
    }

    #[test]
    fn deleting_a_comment_requires_ownership_or_admin() {
        let (blog, auth, _hub) = setup();
        let alice = user(&auth, "alice@example.com");
        let bob = user(&auth, "bob@example.com");
        let created = post(&blog, &alice, "Comments");

        let comment = blog
            .add_comment(&created.id, "mine", &bob)
            .expect("comment");
        assert!(blog.delete_comment(&comment.id, &alice).is_err());
        blog.delete_comment(&comment.id, &bob).expect("owner deletes");
    }
}
