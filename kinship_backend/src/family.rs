//! Family tree: branches, members and branch news.
//!
//! The tree is shallow by construction. A member's `parent_id` points at a
//! branch (or an elder member acting as a grouping key) and is only ever used
//! as an equality filter, never walked recursively.

use crate::auth::SessionContext;
use crate::database::models::{FamilyBranchRecord, FamilyMemberRecord, FamilyNewsRecord};
use crate::database::repositories::{BranchRepository, MemberRepository, NewsRepository};
use crate::database::Database;
use crate::errors::DomainError;
use crate::realtime::{ChangeEvent, ChangeHub, ChangeOp};
use crate::utils::now_utc_iso;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const NEWS_LISTING_LIMIT: usize = 50;

#[derive(Clone)]
pub struct FamilyService {
    database: Database,
    hub: ChangeHub,
}

/// A branch with the members filed under it.
#[derive(Debug, Clone, Serialize)]
pub struct BranchView {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub father_id: Option<String>,
    pub mother_id: Option<String>,
    pub members: Vec<FamilyMemberRecord>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateBranchInput {
    pub name: String,
    pub description: Option<String>,
    pub father_id: Option<String>,
    pub mother_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateMemberInput {
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
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateNewsInput {
    pub title: String,
    pub content: String,
    pub branch_id: Option<String>,
    pub image_url: Option<String>,
}

impl FamilyService {
    pub fn new(database: Database, hub: ChangeHub) -> Self {
        Self { database, hub }
    }

    pub fn list_branches(&self) -> Result<Vec<BranchView>> {
        self.database.with_repositories(|repos| {
            let branches = repos.branches().list()?;
            let mut views = Vec::with_capacity(branches.len());
            for branch in branches {
                let members = repos.members().list_for_parent(&branch.id)?;
                views.push(BranchView {
                    id: branch.id,
                    name: branch.name,
                    description: branch.description,
                    father_id: branch.father_id,
                    mother_id: branch.mother_id,
                    members,
                });
            }
            Ok(views)
        })
    }

    pub fn get_branch(&self, branch_id: &str) -> Result<BranchView> {
        self.database.with_repositories(|repos| {
            let Some(branch) = repos.branches().get(branch_id)? else {
                return Err(DomainError::not_found("branch not found"));
            };
            let members = repos.members().list_for_parent(branch_id)?;
            Ok(BranchView {
                id: branch.id,
                name: branch.name,
                description: branch.description,
                father_id: branch.father_id,
                mother_id: branch.mother_id,
                members,
            })
        })
    }

    pub fn create_branch(
        &self,
        input: CreateBranchInput,
        viewer: &SessionContext,
    ) -> Result<FamilyBranchRecord> {
        if !viewer.is_admin() {
            return Err(DomainError::forbidden("admin role required"));
        }
        if input.name.trim().is_empty() {
            return Err(DomainError::invalid("branch name may not be empty"));
        }
        let record = FamilyBranchRecord {
            id: Uuid::new_v4().to_string(),
            name: input.name.trim().to_string(),
            description: input.description,
            father_id: input.father_id,
            mother_id: input.mother_id,
            created_at: now_utc_iso(),
            updated_at: None,
        };
        self.database
            .with_repositories(|repos| repos.branches().create(&record))?;
        self.hub.publish(ChangeEvent::new(
            "family_branches",
            ChangeOp::Insert,
            &record.id,
        ));
        Ok(record)
    }

    /// Removes a branch. Its news cascades away; gallery media and members
    /// that pointed at it stay behind, unscoped.
    pub fn delete_branch(&self, branch_id: &str, viewer: &SessionContext) -> Result<()> {
        if !viewer.is_admin() {
            return Err(DomainError::forbidden("admin role required"));
        }
        self.database.with_repositories(|repos| {
            if repos.branches().get(branch_id)?.is_none() {
                return Err(DomainError::not_found("branch not found"));
            }
            repos.branches().delete(branch_id)
        })?;
        self.hub.publish(ChangeEvent::new(
            "family_branches",
            ChangeOp::Delete,
            branch_id,
        ));
        Ok(())
    }

    pub fn list_members(&self) -> Result<Vec<FamilyMemberRecord>> {
        self.database.with_repositories(|repos| repos.members().list())
    }

    pub fn get_member(&self, member_id: &str) -> Result<FamilyMemberRecord> {
        self.database.with_repositories(|repos| {
            repos
                .members()
                .get(member_id)?
                .ok_or_else(|| DomainError::NotFound("member not found".into()).into())
        })
    }

    pub fn create_member(
        &self,
        input: CreateMemberInput,
        viewer: &SessionContext,
    ) -> Result<FamilyMemberRecord> {
        if !viewer.is_admin() {
            return Err(DomainError::forbidden("admin role required"));
        }
        if input.full_name.trim().is_empty() {
            return Err(DomainError::invalid("member name may not be empty"));
        }
        let record = FamilyMemberRecord {
            id: Uuid::new_v4().to_string(),
            full_name: input.full_name.trim().to_string(),
            generation: input.generation,
            parent_id: input.parent_id,
            birth_date: input.birth_date,
            bio: input.bio,
            occupation: input.occupation,
            email: input.email,
            phone_number: input.phone_number,
            address: input.address,
            profile_photo_url: input.profile_photo_url,
            created_at: now_utc_iso(),
            updated_at: None,
        };
        self.database
            .with_repositories(|repos| repos.members().create(&record))?;
        self.hub.publish(ChangeEvent::new(
            "family_members",
            ChangeOp::Insert,
            &record.id,
        ));
        Ok(record)
    }

    pub fn delete_member(&self, member_id: &str, viewer: &SessionContext) -> Result<()> {
        if !viewer.is_admin() {
            return Err(DomainError::forbidden("admin role required"));
        }
        self.database.with_repositories(|repos| {
            if repos.members().get(member_id)?.is_none() {
                return Err(DomainError::not_found("member not found"));
            }
            repos.members().delete(member_id)
        })?;
        self.hub.publish(ChangeEvent::new(
            "family_members",
            ChangeOp::Delete,
            member_id,
        ));
        Ok(())
    }

    /// News items, newest first; optionally scoped to one branch.
    pub fn list_news(&self, branch_id: Option<&str>) -> Result<Vec<FamilyNewsRecord>> {
        self.database.with_repositories(|repos| match branch_id {
            Some(branch_id) => repos.news().list_for_branch(branch_id),
            None => repos.news().list_recent(NEWS_LISTING_LIMIT),
        })
    }

    pub fn create_news(
        &self,
        input: CreateNewsInput,
        viewer: &SessionContext,
    ) -> Result<FamilyNewsRecord> {
        if !viewer.is_admin() {
            return Err(DomainError::forbidden("admin role required"));
        }
        if input.title.trim().is_empty() {
            return Err(DomainError::invalid("news title may not be empty"));
        }
        let record = FamilyNewsRecord {
            id: Uuid::new_v4().to_string(),
            branch_id: input.branch_id.clone(),
            title: input.title.trim().to_string(),
            content: input.content,
            image_url: input.image_url,
            author_id: Some(viewer.user_id.clone()),
            created_at: now_utc_iso(),
            updated_at: None,
        };
        self.database
            .with_repositories(|repos| repos.news().create(&record))?;
        let mut event = ChangeEvent::new("family_news", ChangeOp::Insert, &record.id);
        if let Some(branch_id) = &record.branch_id {
            event = event.with_field("branch_id", branch_id);
        }
        self.hub.publish(event);
        Ok(record)
    }

    pub fn delete_news(&self, news_id: &str, viewer: &SessionContext) -> Result<()> {
        if !viewer.is_admin() {
            return Err(DomainError::forbidden("admin role required"));
        }
        self.database.with_repositories(|repos| {
            if repos.news().get(news_id)?.is_none() {
                return Err(DomainError::not_found("news item not found"));
            }
            repos.news().delete(news_id)
        })?;
        self.hub
            .publish(ChangeEvent::new("family_news", ChangeOp::Delete, news_id));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AuthService, SignUpInput, ROLE_ADMIN};
    use rusqlite::Connection;

    fn setup() -> (FamilyService, AuthService) {
        let conn = Connection::open_in_memory().expect("in-memory db");
        let db = Database::from_connection(conn, true);
        db.ensure_migrations().expect("migrations");
        (
            FamilyService::new(db.clone(), ChangeHub::new()),
            AuthService::new(db, 24),
        )
    }

    fn admin(auth: &AuthService) -> SessionContext {
        let ctx = auth
            .sign_up(SignUpInput {
                email: "root@example.com".into(),
                password: "hunter22".into(),
                full_name: None,
            })
            .expect("sign up")
            .user;
        auth.grant_role(&ctx.user_id, ROLE_ADMIN).expect("grant");
        auth.context_for(&ctx.user_id)
            .expect("reload")
            .expect("exists")
    }

    fn member_input(name: &str, parent_id: Option<&str>) -> CreateMemberInput {
        CreateMemberInput {
            full_name: name.into(),
            generation: 2,
            parent_id: parent_id.map(str::to_string),
            birth_date: None,
            bio: None,
            occupation: None,
            email: None,
            phone_number: None,
            address: None,
            profile_photo_url: None,
        }
    }

    #[test]
    fn branches_list_with_their_members() {
        let (family, auth) = setup();
        let boss = admin(&auth);

        let branch = family
            .create_branch(
                CreateBranchInput {
                    name: "Eldest house".into(),
                    description: None,
                    father_id: None,
                    mother_id: None,
                },
                &boss,
            )
            .expect("branch");
        family
            .create_member(member_input("Jane", Some(&branch.id)), &boss)
            .expect("member");
        family
            .create_member(member_input("Stray", None), &boss)
            .expect("member without branch");

        let views = family.list_branches().expect("list");
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].members.len(), 1);
        assert_eq!(views[0].members[0].full_name, "Jane");

        // The unscoped member still exists in the flat listing.
        assert_eq!(family.list_members().expect("members").len(), 2);
    }

    #[test]
    fn member_management_is_admin_only() {
        let (family, auth) = setup();
        let plain = auth
            .sign_up(SignUpInput {
                email: "alice@example.com".into(),
                password: "hunter22".into(),
                full_name: None,
            })
            .expect("sign up")
            .user;

        let err = family
            .create_member(member_input("Jane", None), &plain)
            .expect_err("non-admin");
        assert!(matches!(
            err.downcast_ref::<DomainError>(),
            Some(DomainError::Forbidden(_))
        ));
    }

    #[test]
    fn news_creation_is_admin_only() {
        let (family, auth) = setup();
        let plain = auth
            .sign_up(SignUpInput {
                email: "alice@example.com".into(),
                password: "hunter22".into(),
                full_name: None,
            })
            .expect("sign up")
            .user;

        let err = family
            .create_news(
                CreateNewsInput {
                    title: "Unsanctioned".into(),
                    content: "Hello".into(),
                    branch_id: None,
                    image_url: None,
                },
                &plain,
            )
            .expect_err("non-admin may not post news");
        assert!(matches!(
            err.downcast_ref::<DomainError>(),
            Some(DomainError::Forbidden(_))
        ));
        assert!(family.list_news(None).expect("list").is_empty());
    }

    #[test]
    fn branch_deletion_cascades_news_and_is_admin_only() {
        let (family, auth) = setup();
        let boss = admin(&auth);
        let plain = auth
            .sign_up(SignUpInput {
                email: "alice@example.com".into(),
                password: "hunter22".into(),
                full_name: None,
            })
            .expect("sign up")
            .user;

        let branch = family
            .create_branch(
                CreateBranchInput {
                    name: "Doomed house".into(),
                    description: None,
                    father_id: None,
                    mother_id: None,
                },
                &boss,
            )
            .expect("branch");
        family
            .create_news(
                CreateNewsInput {
                    title: "Last notice".into(),
                    content: "Moving out".into(),
                    branch_id: Some(branch.id.clone()),
                    image_url: None,
                },
                &boss,
            )
            .expect("news");

        let err = family
            .delete_branch(&branch.id, &plain)
            .expect_err("non-admin may not delete");
        assert!(matches!(
            err.downcast_ref::<DomainError>(),
            Some(DomainError::Forbidden(_))
        ));

        family.delete_branch(&branch.id, &boss).expect("delete");
        assert!(family.list_branches().expect("list").is_empty());
        assert!(family.list_news(None).expect("news").is_empty());

        let err = family
            .delete_branch(&branch.id, &boss)
            .expect_err("already gone");
        assert!(matches!(
            err.downcast_ref::<DomainError>(),
            Some(DomainError::NotFound(_))
        ));
    }

    #[test]
    fn deleting_missing_news_is_not_found() {
        let (family, auth) = setup();
        let boss = admin(&auth);
        let err = family
            .delete_news("no-such-news", &boss)
            .expect_err("missing id");
        assert!(matches!(
            err.downcast_ref::<DomainError>(),
            Some(DomainError::NotFound(_))
        ));
    }

    #[test]
    fn news_scopes_by_branch() {
        let (family, auth) = setup();
        let boss = admin(&auth);
        let branch = family
            .create_branch(
                CreateBranchInput {
                    name: "House".into(),
                    description: None,
                    father_id: None,
                    mother_id: None,
                },
                &boss,
            )
            .expect("branch");

        family
            .create_news(
                CreateNewsInput {
                    title: "Reunion".into(),
                    content: "Save the date".into(),
                    branch_id: Some(branch.id.clone()),
                    image_url: None,
                },
                &boss,
            )
            .expect("news");
        family
            .create_news(
                CreateNewsInput {
                    title: "General".into(),
                    content: "Hello all".into(),
                    branch_id: None,
                    image_url: None,
                },
                &boss,
            )
            .expect("news");

        assert_eq!(family.list_news(None).expect("all").len(), 2);
        assert_eq!(
            family.list_news(Some(&branch.id)).expect("scoped").len(),
            1
        );
    }
}
