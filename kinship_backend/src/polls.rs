//! Polls and voting.
//!
//! Vote counting is delegated to [`crate::voting`]; this service wires it to
//! storage and enforces the one-vote-per-user rule. That rule lives in the
//! schema as a UNIQUE constraint, so two racing votes cannot both land; the
//! loser's constraint error is reported as a conflict.

use crate::auth::SessionContext;
use crate::database::models::{PollRecord, PollVoteRecord};
use crate::database::repositories::{PollRepository, VoteRepository};
use crate::database::Database;
use crate::errors::{is_constraint_violation, DomainError};
use crate::realtime::{ChangeEvent, ChangeHub, ChangeOp};
use crate::utils::now_utc_iso;
use crate::voting::{aggregate, tally_poll, OptionTally};
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const POLL_LISTING_LIMIT: usize = 50;
const MIN_OPTIONS: usize = 2;

#[derive(Clone)]
pub struct PollService {
    database: Database,
    hub: ChangeHub,
}

#[derive(Debug, Clone, Serialize)]
pub struct PollView {
    pub id: String,
    pub question: String,
    pub created_by: Option<String>,
    pub created_at: String,
    pub closes_at: Option<String>,
    pub closed: bool,
    pub total_votes: u64,
    pub options: Vec<OptionTally>,
    /// The requesting user's chosen option index, if they voted.
    pub user_vote: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatePollInput {
    pub question: String,
    pub options: Vec<String>,
    #[serde(default)]
    pub closes_at: Option<String>,
}

impl PollService {
    pub fn new(database: Database, hub: ChangeHub) -> Self {
        Self { database, hub }
    }

    /// Recent polls with their tallies, one vote scan for the whole listing.
    pub fn list_polls(&self, viewer: Option<&SessionContext>) -> Result<Vec<PollView>> {
        self.database.with_repositories(|repos| {
            let polls = repos.polls().list_recent(POLL_LISTING_LIMIT)?;
            let votes = repos.votes().list_all()?;
            let agg = aggregate(&votes, viewer.map(|ctx| ctx.user_id.as_str()));
            Ok(polls
                .into_iter()
                .map(|poll| poll_view(poll, &agg))
                .collect())
        })
    }

    pub fn get_poll(&self, poll_id: &str, viewer: Option<&SessionContext>) -> Result<PollView> {
        self.database.with_repositories(|repos| {
            let Some(poll) = repos.polls().get(poll_id)? else {
                return Err(DomainError::not_found("poll not found"));
            };
            let votes = repos.votes().list_for_poll(poll_id)?;
            let agg = aggregate(&votes, viewer.map(|ctx| ctx.user_id.as_str()));
            Ok(poll_view(poll, &agg))
        })
    }

    pub fn create_poll(&self, input: CreatePollInput, viewer: &SessionContext) -> Result<PollView> {
        if !viewer.is_admin() {
            return Err(DomainError::forbidden("admin role required"));
        }
        if input.question.trim().is_empty() {
            return Err(DomainError::invalid("poll question may not be empty"));
        }
        let options: Vec<String> = input
            .options
            .into_iter()
            .map(|option| option.trim().to_string())
            .filter(|option| !option.is_empty())
            .collect();
        if options.len() < MIN_OPTIONS {
            return Err(DomainError::invalid(format!(
                "a poll needs at least {MIN_OPTIONS} options"
            )));
        }

        let record = PollRecord {
            id: Uuid::new_v4().to_string(),
            question: input.question.trim().to_string(),
            options,
            created_by: Some(viewer.user_id.clone()),
            created_at: now_utc_iso(),
            closes_at: input.closes_at,
        };
        self.database
            .with_repositories(|repos| repos.polls().create(&record))?;
        self.hub
            .publish(ChangeEvent::new("polls", ChangeOp::Insert, &record.id));
        self.get_poll(&record.id, Some(viewer))
    }

    /// Records one vote and returns the refreshed tally. A second vote by the
    /// same user is a conflict regardless of the chosen option.
    pub fn vote(
        &self,
        poll_id: &str,
        option_index: i64,
        viewer: &SessionContext,
    ) -> Result<PollView> {
        let record = PollVoteRecord {
            id: Uuid::new_v4().to_string(),
            poll_id: poll_id.to_string(),
            user_id: viewer.user_id.clone(),
            option_index,
            created_at: now_utc_iso(),
        };

        let outcome = self.database.with_repositories(|repos| {
            let Some(poll) = repos.polls().get(poll_id)? else {
                return Err(DomainError::not_found("poll not found"));
            };
            if option_index < 0 || option_index as usize >= poll.options.len() {
                return Err(DomainError::invalid("option index out of range"));
            }
            if is_closed(poll.closes_at.as_deref()) {
                return Err(DomainError::conflict("this poll has closed"));
            }
            repos.votes().create(&record)
        });

        if let Err(err) = outcome {
            if is_constraint_violation(&err) {
                return Err(DomainError::conflict("you have already voted in this poll"));
            }
            return Err(err);
        }

        self.hub.publish(
            ChangeEvent::new("poll_votes", ChangeOp::Insert, &record.id)
                .with_field("poll_id", poll_id),
        );
        self.get_poll(poll_id, Some(viewer))
    }
}

fn poll_view(poll: PollRecord, agg: &crate::voting::VoteAggregate) -> PollView {
    let tally = tally_poll(&poll, agg);
    PollView {
        closed: is_closed(poll.closes_at.as_deref()),
        id: poll.id,
        question: poll.question,
        created_by: poll.created_by,
        created_at: poll.created_at,
        closes_at: poll.closes_at,
        total_votes: tally.total_votes,
        options: tally.options,
        user_vote: tally.user_vote,
    }
}

/// A missing or unparseable deadline means the poll stays open.
fn is_closed(closes_at: Option<&str>) -> bool {
    match closes_at {
        Some(raw) => match DateTime::parse_from_rfc3339(raw) {
            Ok(deadline) => deadline < Utc::now(),
            Err(_) => false,
        },
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AuthService, SignUpInput, ROLE_ADMIN};
    use rusqlite::Connection;

    fn setup() -> (PollService, AuthService) {
        let conn = Connection::open_in_memory().expect("in-memory db");
        let db = Database::from_connection(conn, true);
        db.ensure_migrations().expect("migrations");
        (
            PollService::new(db.clone(), ChangeHub::new()),
            AuthService::new(db, 24),
        )
    }

    fn user(auth: &AuthService, email: &str) -> SessionContext {
        auth.sign_up(SignUpInput {
            email: email.into(),
            password: "hunter22".into(),
            full_name: None,
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

    fn venue_poll(polls: &PollService, creator: &SessionContext) -> PollView {
        polls
            .create_poll(
                CreatePollInput {
                    question: "Where should the reunion be?".into(),
                    options: vec!["Home".into(), "Hall".into()],
                    closes_at: None,
                },
                creator,
            )
            .expect("create poll")
    }

    #[test]
    fn poll_creation_requires_admin_and_two_options() {
        let (polls, auth) = setup();
        let plain = user(&auth, "alice@example.com");
        let boss = admin(&auth, "root@example.com");

        let err = polls
            .create_poll(
                CreatePollInput {
                    question: "Q?".into(),
                    options: vec!["A".into(), "B".into()],
                    closes_at: None,
                },
                &plain,
            )
            .expect_err("non-admin");
        assert!(matches!(
            err.downcast_ref::<DomainError>(),
            Some(DomainError::Forbidden(_))
        ));

        // Blank options do not count towards the minimum.
        let err = polls
            .create_poll(
                CreatePollInput {
                    question: "Q?".into(),
                    options: vec!["A".into(), "   ".into()],
                    closes_at: None,
                },
                &boss,
            )
            .expect_err("one real option");
        assert!(matches!(
            err.downcast_ref::<DomainError>(),
            Some(DomainError::Invalid(_))
        ));

        let created = venue_poll(&polls, &boss);
        assert_eq!(created.options.len(), 2);
        assert_eq!(created.total_votes, 0);
    }

    #[test]
    fn votes_tally_with_percentages_and_user_choice() {
        let (polls, auth) = setup();
        let boss = admin(&auth, "root@example.com");
        let a = user(&auth, "a@example.com");
        let b = user(&auth, "b@example.com");
        let c = user(&auth, "c@example.com");
        let created = venue_poll(&polls, &boss);

        polls.vote(&created.id, 0, &a).expect("vote a");
        polls.vote(&created.id, 0, &b).expect("vote b");
        let seen_by_c = polls.vote(&created.id, 1, &c).expect("vote c");

        assert_eq!(seen_by_c.total_votes, 3);
        assert_eq!(seen_by_c.options[0].votes, 2);
        assert_eq!(seen_by_c.options[0].percentage, 67);
        assert_eq!(seen_by_c.options[1].percentage, 33);
        assert_eq!(seen_by_c.user_vote, Some(1));

        let anonymous = polls.get_poll(&created.id, None).expect("get");
        assert_eq!(anonymous.user_vote, None);
        assert_eq!(anonymous.total_votes, 3);
    }

    #[test]
    fn second_vote_by_same_user_is_a_conflict() {
        let (polls, auth) = setup();
        let boss = admin(&auth, "root@example.com");
        let a = user(&auth, "a@example.com");
        let created = venue_poll(&polls, &boss);

        polls.vote(&created.id, 0, &a).expect("first vote");
        let err = polls
            .vote(&created.id, 1, &a)
            .expect_err("second vote must fail");
        assert!(matches!(
            err.downcast_ref::<DomainError>(),
            Some(DomainError::Conflict(_))
        ));

        // The losing vote left no trace.
        let view = polls.get_poll(&created.id, Some(&a)).expect("get");
        assert_eq!(view.total_votes, 1);
        assert_eq!(view.user_vote, Some(0));
    }

    #[test]
    fn out_of_range_votes_are_rejected() {
        let (polls, auth) = setup();
        let boss = admin(&auth, "root@example.com");
        let a = user(&auth, "a@example.com");
        let created = venue_poll(&polls, &boss);

        assert!(polls.vote(&created.id, 2, &a).is_err());
        assert!(polls.vote(&created.id, -1, &a).is_err());
        assert!(polls.vote("no-such-poll", 0, &a).is_err());
    }

    #[test]
    fn closed_polls_reject_new_votes() {
        let (polls, auth) = setup();
        let boss = admin(&auth, "root@example.com");
        let a = user(&auth, "a@example.com");
        let created = polls
            .create_poll(
                CreatePollInput {
                    question: "Too late?".into(),
                    options: vec!["Yes".into(), "No".into()],
                    closes_at: Some("2020-01-01T00:00:00+00:00".into()),
                },
                &boss,
            )
            .expect("create poll");
        assert!(created.closed);

        let err = polls.vote(&created.id, 0, &a).expect_err("closed");
        assert!(matches!(
            err.downcast_ref::<DomainError>(),
            Some(DomainError::Conflict(_))
        ));
    }
}
