//! Accounts, sessions and roles.
//!
//! Passwords are stored as salted SHA-256 digests and sessions are opaque
//! random bearer tokens with a configured TTL. Role checks always go back to
//! the database, so a revocation takes effect on the next request.

use crate::database::models::{ProfileRecord, SessionRecord, UserRoleRecord};
use crate::database::repositories::{ProfileRepository, RoleRepository, SessionRepository};
use crate::database::Database;
use crate::errors::DomainError;
use crate::utils::now_utc_iso;
use anyhow::Result;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_MODERATOR: &str = "moderator";

const MIN_PASSWORD_LEN: usize = 6;

#[derive(Clone)]
pub struct AuthService {
    database: Database,
    session_ttl_hours: i64,
}

/// Resolved identity for one request.
#[derive(Debug, Clone, Serialize)]
pub struct SessionContext {
    pub user_id: String,
    pub email: String,
    pub full_name: Option<String>,
    pub roles: Vec<String>,
}

impl SessionContext {
    pub fn is_admin(&self) -> bool {
        self.roles.iter().any(|role| role == ROLE_ADMIN)
    }
}

/// Token handed to the client after sign-up or sign-in.
#[derive(Debug, Clone, Serialize)]
pub struct AuthSession {
    pub token: String,
    pub expires_at: String,
    pub user: SessionContext,
}

#[derive(Debug, Clone)]
pub struct SignUpInput {
    pub email: String,
    pub password: String,
    pub full_name: Option<String>,
}

/// Display fields a user may change about themselves. Both fields overwrite;
/// an absent or blank value clears the stored one.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateProfileInput {
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

impl AuthService {
    pub fn new(database: Database, session_ttl_hours: i64) -> Self {
        Self {
            database,
            session_ttl_hours,
        }
    }

    pub fn sign_up(&self, input: SignUpInput) -> Result<AuthSession> {
        let email = normalize_email(&input.email);
        if !email.contains('@') {
            return Err(DomainError::invalid("a valid email address is required"));
        }
        if input.password.len() < MIN_PASSWORD_LEN {
            return Err(DomainError::invalid(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }

        let salt = random_hex(16);
        let profile = ProfileRecord {
            id: Uuid::new_v4().to_string(),
            email: email.clone(),
            full_name: input
                .full_name
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty()),
            avatar_url: None,
            password_hash: digest_password(&salt, &input.password),
            password_salt: salt,
            created_at: now_utc_iso(),
            updated_at: None,
        };

        self.database.with_repositories(|repos| {
            if repos.profiles().get_by_email(&email)?.is_some() {
                return Err(DomainError::conflict(
                    "an account with this email already exists",
                ));
            }
            repos.profiles().create(&profile)?;
            Ok(())
        })?;

        tracing::info!(user_id = %profile.id, "account created");
        self.open_session(&profile.id)
    }

    pub fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession> {
        let email = normalize_email(email);
        let profile = self
            .database
            .with_repositories(|repos| repos.profiles().get_by_email(&email))?;
        let Some(profile) = profile else {
            return Err(DomainError::unauthorized("invalid email or password"));
        };
        if digest_password(&profile.password_salt, password) != profile.password_hash {
            return Err(DomainError::unauthorized("invalid email or password"));
        }
        self.open_session(&profile.id)
    }

    pub fn sign_out(&self, token: &str) -> Result<()> {
        self.database
            .with_repositories(|repos| repos.sessions().delete(token))
    }

    /// Resolves a bearer token to its user, or `None` when the token is
    /// unknown or past its expiry.
    pub fn authenticate(&self, token: &str) -> Result<Option<SessionContext>> {
        let session = self
            .database
            .with_repositories(|repos| repos.sessions().get(token))?;
        let Some(session) = session else {
            return Ok(None);
        };
        if is_expired(&session.expires_at) {
            self.database
                .with_repositories(|repos| repos.sessions().delete(token))?;
            return Ok(None);
        }
        self.context_for(&session.user_id)
    }

    pub fn context_for(&self, user_id: &str) -> Result<Option<SessionContext>> {
        self.database.with_repositories(|repos| {
            let Some(profile) = repos.profiles().get(user_id)? else {
                return Ok(None);
            };
            let roles = repos.roles().roles_for(user_id)?;
            Ok(Some(SessionContext {
                user_id: profile.id,
                email: profile.email,
                full_name: profile.full_name,
                roles,
            }))
        })
    }

    pub fn update_profile(
        &self,
        user_id: &str,
        input: UpdateProfileInput,
    ) -> Result<SessionContext> {
        let full_name = input
            .full_name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty());
        let avatar_url = input
            .avatar_url
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty());
        if let Some(url) = avatar_url.as_deref() {
            if !crate::utils::looks_like_url(url) {
                return Err(DomainError::invalid("avatar_url is not a valid URL"));
            }
        }
        self.database.with_repositories(|repos| {
            if repos.profiles().get(user_id)?.is_none() {
                return Err(DomainError::not_found("profile not found"));
            }
            repos
                .profiles()
                .update_info(user_id, full_name.as_deref(), avatar_url.as_deref())
        })?;
        self.context_for(user_id)?
            .ok_or_else(|| DomainError::NotFound("profile not found".into()).into())
    }

    pub fn grant_role(&self, user_id: &str, role: &str) -> Result<()> {
        self.database.with_repositories(|repos| {
            if repos.roles().has_role(user_id, role)? {
                return Ok(());
            }
            repos.roles().grant(&UserRoleRecord {
                id: Uuid::new_v4().to_string(),
                user_id: user_id.to_string(),
                role: role.to_string(),
                created_at: now_utc_iso(),
            })
        })
    }

    pub fn purge_expired_sessions(&self) -> Result<usize> {
        self.database
            .with_repositories(|repos| repos.sessions().purge_expired(&now_utc_iso()))
    }

    fn open_session(&self, user_id: &str) -> Result<AuthSession> {
        let token = random_token();
        let expires_at = (Utc::now() + Duration::hours(self.session_ttl_hours)).to_rfc3339();
        let record = SessionRecord {
            token: token.clone(),
            user_id: user_id.to_string(),
            created_at: now_utc_iso(),
            expires_at: expires_at.clone(),
        };
        self.database
            .with_repositories(|repos| repos.sessions().create(&record))?;
        let user = self
            .context_for(user_id)?
            .ok_or_else(|| DomainError::NotFound("user vanished during sign-in".into()))?;
        Ok(AuthSession {
            token,
            expires_at,
            user,
        })
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn digest_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(b":");
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

fn random_hex(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    rand::rng().fill_bytes(&mut buf);
    hex::encode(buf)
}

fn random_token() -> String {
    let mut buf = [0u8; 32];
    rand::rng().fill_bytes(&mut buf);
    URL_SAFE_NO_PAD.encode(buf)
}

/// An unparseable expiry counts as expired.
fn is_expired(expires_at: &str) -> bool {
    match DateTime::parse_from_rfc3339(expires_at) {
        Ok(expiry) => expiry < Utc::now(),
        Err(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    fn setup_service() -> AuthService {
        let conn = Connection::open_in_memory().expect("in-memory db");
        let db = Database::from_connection(conn, true);
        db.ensure_migrations().expect("migrations");
        AuthService::new(db, 24)
    }

    fn sign_up(service: &AuthService, email: &str) -> AuthSession {
        service
            .sign_up(SignUpInput {
                email: email.into(),
                password: "hunter22".into(),
                full_name: Some("Alice".into()),
            })
            .expect("sign up")
    }

    #[test]
    fn sign_up_then_sign_in_round_trip() {
        let service = setup_service();
        let session = sign_up(&service, "Alice@Example.com ");
        assert_eq!(session.user.email, "alice@example.com");
        assert_eq!(session.user.full_name.as_deref(), Some("Alice"));
        assert!(!session.user.is_admin());

        let again = service
            .sign_in("alice@example.com", "hunter22")
            .expect("sign in");
        assert_eq!(again.user.user_id, session.user.user_id);
        assert_ne!(again.token, session.token);
    }

    #[test]
    fn duplicate_email_is_a_conflict() {
        let service = setup_service();
        sign_up(&service, "alice@example.com");
        let err = service
            .sign_up(SignUpInput {
                email: "ALICE@example.com".into(),
                password: "different1".into(),
                full_name: None,
            })
            .expect_err("duplicate should fail");
        assert!(matches!(
            err.downcast_ref::<DomainError>(),
            Some(DomainError::Conflict(_))
        ));
    }

    #[test]
    fn wrong_password_and_unknown_email_look_the_same() {
        let service = setup_service();
        sign_up(&service, "alice@example.com");
        let wrong_pass = service
            .sign_in("alice@example.com", "not-it-at-all")
            .expect_err("wrong password");
        let unknown = service
            .sign_in("bob@example.com", "hunter22")
            .expect_err("unknown email");
        assert_eq!(wrong_pass.to_string(), unknown.to_string());
    }

    #[test]
    fn short_passwords_are_rejected() {
        let service = setup_service();
        let err = service
            .sign_up(SignUpInput {
                email: "alice@example.com".into(),
                password: "tiny".into(),
                full_name: None,
            })
            .expect_err("short password");
        assert!(matches!(
            err.downcast_ref::<DomainError>(),
            Some(DomainError::Invalid(_))
        ));
    }

    #[test]
    fn sign_out_invalidates_the_token() {
        let service = setup_service();
        let session = sign_up(&service, "alice@example.com");
        assert!(service
            .authenticate(&session.token)
            .expect("authenticate")
            .is_some());
        service.sign_out(&session.token).expect("sign out");
        assert!(service
            .authenticate(&session.token)
            .expect("authenticate")
            .is_none());
    }

    #[test]
    fn granted_roles_show_up_on_the_next_authenticate() {
        let service = setup_service();
        let session = sign_up(&service, "alice@example.com");
        service
            .grant_role(&session.user.user_id, ROLE_ADMIN)
            .expect("grant");
        // Granting twice is a no-op, not an error.
        service
            .grant_role(&session.user.user_id, ROLE_ADMIN)
            .expect("grant again");
        let ctx = service
            .authenticate(&session.token)
            .expect("authenticate")
            .expect("session valid");
        assert!(ctx.is_admin());
    }

    #[test]
    fn profile_updates_overwrite_and_clear_display_fields() {
        let service = setup_service();
        let session = sign_up(&service, "alice@example.com");

        let ctx = service
            .update_profile(
                &session.user.user_id,
                UpdateProfileInput {
                    full_name: Some("Alice Cooper".into()),
                    avatar_url: Some("https://example.com/a.png".into()),
                },
            )
            .expect("update");
        assert_eq!(ctx.full_name.as_deref(), Some("Alice Cooper"));

        // Blank input clears the stored name.
        let ctx = service
            .update_profile(&session.user.user_id, UpdateProfileInput::default())
            .expect("clear");
        assert_eq!(ctx.full_name, None);

        assert!(service
            .update_profile(
                &session.user.user_id,
                UpdateProfileInput {
                    full_name: None,
                    avatar_url: Some("javascript:alert(1)".into()),
                },
            )
            .is_err());
        assert!(service
            .update_profile("no-such-user", UpdateProfileInput::default())
            .is_err());
    }

    #[test]
    fn purge_removes_only_stale_sessions() {
        let service = setup_service();
        let stale = sign_up(&service, "alice@example.com");
        let fresh = service
            .sign_in("alice@example.com", "hunter22")
            .expect("sign in");

        let database = service.database.clone();
        database
            .with_repositories(|repos| {
                repos.conn().execute(
                    "UPDATE sessions SET expires_at = '2020-01-01T00:00:00+00:00' WHERE token = ?1",
                    rusqlite::params![stale.token],
                )?;
                Ok(())
            })
            .expect("age session");

        assert_eq!(service.purge_expired_sessions().expect("purge"), 1);
        assert!(service
            .authenticate(&fresh.token)
            .expect("authenticate")
            .is_some());
    }

    #[test]
    fn expired_sessions_do_not_authenticate() {
        let service = setup_service();
        let session = sign_up(&service, "alice@example.com");

        // Rewrite the expiry into the past.
        let database = service.database.clone();
        database
            .with_repositories(|repos| {
                repos.conn().execute(
                    "UPDATE sessions SET expires_at = '2020-01-01T00:00:00+00:00' WHERE token = ?1",
                    rusqlite::params![session.token],
                )?;
                Ok(())
            })
            .expect("age session");

        assert!(service
            .authenticate(&session.token)
            .expect("authenticate")
            .is_none());
    }
}
