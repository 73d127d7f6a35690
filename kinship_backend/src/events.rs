//! Family calendar events.

use crate::auth::SessionContext;
use crate::database::models::EventRecord;
use crate::database::repositories::EventRepository;
use crate::database::Database;
use crate::errors::DomainError;
use crate::realtime::{ChangeEvent, ChangeHub, ChangeOp};
use crate::utils::now_utc_iso;
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Clone)]
pub struct EventService {
    database: Database,
    hub: ChangeHub,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateEventInput {
    pub title: String,
    pub description: Option<String>,
    pub event_date: String,
    pub location: Option<String>,
}

impl EventService {
    pub fn new(database: Database, hub: ChangeHub) -> Self {
        Self { database, hub }
    }

    /// All events in date order; the repository sorts by `event_date`.
    pub fn list_events(&self) -> Result<Vec<EventRecord>> {
        self.database.with_repositories(|repos| repos.events().list())
    }

    /// Events whose date is today or later.
    pub fn list_upcoming(&self) -> Result<Vec<EventRecord>> {
        let now = Utc::now();
        let events = self.list_events()?;
        Ok(events
            .into_iter()
            .filter(|event| match DateTime::parse_from_rfc3339(&event.event_date) {
                Ok(date) => date >= now,
                // Keep undated oddities visible rather than silently dropping them.
                Err(_) => true,
            })
            .collect())
    }

    pub fn get_event(&self, event_id: &str) -> Result<EventRecord> {
        self.database.with_repositories(|repos| {
            repos
                .events()
                .get(event_id)?
                .ok_or_else(|| DomainError::NotFound("event not found".into()).into())
        })
    }

    pub fn create_event(
        &self,
        input: CreateEventInput,
        viewer: &SessionContext,
    ) -> Result<EventRecord> {
        if !viewer.is_admin() {
            return Err(DomainError::forbidden("admin role required"));
        }
        if input.title.trim().is_empty() {
            return Err(DomainError::invalid("event title may not be empty"));
        }
        if DateTime::parse_from_rfc3339(&input.event_date).is_err() {
            return Err(DomainError::invalid(
                "event_date must be an RFC 3339 timestamp",
            ));
        }
        let record = EventRecord {
            id: Uuid::new_v4().to_string(),
            title: input.title.trim().to_string(),
            description: input.description,
            event_date: input.event_date,
            location: input.location,
            created_by: Some(viewer.user_id.clone()),
            created_at: now_utc_iso(),
            updated_at: None,
        };
        self.database
            .with_repositories(|repos| repos.events().create(&record))?;
        self.hub
            .publish(ChangeEvent::new("events", ChangeOp::Insert, &record.id));
        Ok(record)
    }

    pub fn delete_event(&self, event_id: &str, viewer: &SessionContext) -> Result<()> {
        if !viewer.is_admin() {
            return Err(DomainError::forbidden("admin role required"));
        }
        self.database.with_repositories(|repos| {
            if repos.events().get(event_id)?.is_none() {
                return Err(DomainError::not_found("event not found"));
            }
            repos.events().delete(event_id)
        })?;
        self.hub
            .publish(ChangeEvent::new("events", ChangeOp::Delete, event_id));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AuthService, SignUpInput, ROLE_ADMIN};
    use rusqlite::Connection;

    fn setup() -> (EventService, SessionContext) {
        let conn = Connection::open_in_memory().expect("in-memory db");
        let db = Database::from_connection(conn, true);
        db.ensure_migrations().expect("migrations");
        let auth = AuthService::new(db.clone(), 24);
        let ctx = auth
            .sign_up(SignUpInput {
                email: "root@example.com".into(),
                password: "hunter22".into(),
                full_name: None,
            })
            .expect("sign up")
            .user;
        auth.grant_role(&ctx.user_id, ROLE_ADMIN).expect("grant");
        let ctx = auth
            .context_for(&ctx.user_id)
            .expect("reload")
            .expect("exists");
        (EventService::new(db, ChangeHub::new()), ctx)
    }

    #[test]
    fn events_require_a_parseable_date() {
        let (events, boss) = setup();
        let err = events
            .create_event(
                CreateEventInput {
                    title: "Picnic".into(),
                    description: None,
                    event_date: "next tuesday".into(),
                    location: None,
                },
                &boss,
            )
            .expect_err("bad date");
        assert!(matches!(
            err.downcast_ref::<DomainError>(),
            Some(DomainError::Invalid(_))
        ));
    }

    #[test]
    fn upcoming_filters_out_the_past() {
        let (events, boss) = setup();
        events
            .create_event(
                CreateEventInput {
                    title: "Long ago".into(),
                    description: None,
                    event_date: "2020-06-01T12:00:00+00:00".into(),
                    location: None,
                },
                &boss,
            )
            .expect("past event");
        events
            .create_event(
                CreateEventInput {
                    title: "Far future".into(),
                    description: None,
                    event_date: "2099-06-01T12:00:00+00:00".into(),
                    location: Some("The hall".into()),
                },
                &boss,
            )
            .expect("future event");

        assert_eq!(events.list_events().expect("all").len(), 2);
        let upcoming = events.list_upcoming().expect("upcoming");
        assert_eq!(upcoming.len(), 1);
        assert_eq!(upcoming[0].title, "Far future");
    }

    #[test]
    fn delete_round_trips() {
        let (events, boss) = setup();
        let created = events
            .create_event(
                CreateEventInput {
                    title: "Ephemeral".into(),
                    description: None,
                    event_date: "2099-01-01T00:00:00+00:00".into(),
                    location: None,
                },
                &boss,
            )
            .expect("create");
        events.delete_event(&created.id, &boss).expect("delete");
        assert!(events.get_event(&created.id).is_err());
    }
}
