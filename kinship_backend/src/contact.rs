//! Contact form intake.
//!
//! Submissions are stored for the admin dashboard to read; there is no
//! outbound mail.

use crate::auth::SessionContext;
use crate::database::models::ContactMessageRecord;
use crate::database::repositories::ContactRepository;
use crate::database::Database;
use crate::errors::DomainError;
use crate::utils::now_utc_iso;
use anyhow::Result;
use serde::Deserialize;
use uuid::Uuid;

const MESSAGE_LISTING_LIMIT: usize = 200;

#[derive(Clone)]
pub struct ContactService {
    database: Database,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContactInput {
    pub name: String,
    pub email: String,
    pub subject: String,
    pub message: String,
}

impl ContactService {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    pub fn submit(&self, input: ContactInput) -> Result<ContactMessageRecord> {
        if input.name.trim().is_empty() {
            return Err(DomainError::invalid("name may not be empty"));
        }
        if !input.email.contains('@') {
            return Err(DomainError::invalid("a valid email address is required"));
        }
        if input.message.trim().is_empty() {
            return Err(DomainError::invalid("message may not be empty"));
        }
        let record = ContactMessageRecord {
            id: Uuid::new_v4().to_string(),
            name: input.name.trim().to_string(),
            email: input.email.trim().to_string(),
            subject: input.subject.trim().to_string(),
            message: input.message.trim().to_string(),
            created_at: now_utc_iso(),
        };
        self.database
            .with_repositories(|repos| repos.contact().create(&record))?;
        tracing::info!(message_id = %record.id, "contact message received");
        Ok(record)
    }

    pub fn list_messages(&self, viewer: &SessionContext) -> Result<Vec<ContactMessageRecord>> {
        if !viewer.is_admin() {
            return Err(DomainError::forbidden("admin role required"));
        }
        self.database
            .with_repositories(|repos| repos.contact().list_recent(MESSAGE_LISTING_LIMIT))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AuthService, SignUpInput, ROLE_ADMIN};
    use rusqlite::Connection;

    fn setup() -> (ContactService, AuthService) {
        let conn = Connection::open_in_memory().expect("in-memory db");
        let db = Database::from_connection(conn, true);
        db.ensure_migrations().expect("migrations");
        (ContactService::new(db.clone()), AuthService::new(db, 24))
    }

    #[test]
    fn submissions_store_and_list_for_admins_only() {
        let (contact, auth) = setup();
        contact
            .submit(ContactInput {
                name: "Visitor".into(),
                email: "visitor@example.com".into(),
                subject: "Hello".into(),
                message: "Lovely site".into(),
            })
            .expect("submit");

        let plain = auth
            .sign_up(SignUpInput {
                email: "alice@example.com".into(),
                password: "hunter22".into(),
                full_name: None,
            })
            .expect("sign up")
            .user;
        assert!(contact.list_messages(&plain).is_err());

        auth.grant_role(&plain.user_id, ROLE_ADMIN).expect("grant");
        let boss = auth
            .context_for(&plain.user_id)
            .expect("reload")
            .expect("exists");
        let messages = contact.list_messages(&boss).expect("list");
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].subject, "Hello");
    }

    #[test]
    fn invalid_submissions_are_rejected() {
        let (contact, _auth) = setup();
        assert!(contact
            .submit(ContactInput {
                name: "  ".into(),
                email: "v@example.com".into(),
                subject: "s".into(),
                message: "m".into(),
            })
            .is_err());
        assert!(contact
            .submit(ContactInput {
                name: "Visitor".into(),
                email: "not-an-email".into(),
                subject: "s".into(),
                message: "m".into(),
            })
            .is_err());
    }
}
