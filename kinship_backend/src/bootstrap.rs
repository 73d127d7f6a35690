use crate::auth::{AuthService, ROLE_ADMIN};
use crate::config::KinshipConfig;
use crate::database::repositories::ProfileRepository;
use crate::database::Database;
use anyhow::Result;
use std::fs;

pub struct BootstrapResources {
    pub directories_created: Vec<String>,
    pub database_initialized: bool,
    pub database: Database,
    /// Email of the profile granted admin during this bootstrap, if any.
    pub admin_granted: Option<String>,
}

pub async fn initialize(config: &KinshipConfig) -> Result<BootstrapResources> {
    let mut directories_created = Vec::new();
    create_dir_if_missing(&config.paths.data_dir, &mut directories_created)?;
    create_dir_if_missing(&config.paths.files_dir, &mut directories_created)?;
    create_dir_if_missing(&config.paths.uploads_dir, &mut directories_created)?;
    create_dir_if_missing(&config.paths.logs_dir, &mut directories_created)?;

    let database = Database::connect(&config.paths)?;
    let database_initialized = database.ensure_migrations()?;

    let admin_granted = grant_bootstrap_admin(config, &database)?;

    Ok(BootstrapResources {
        directories_created,
        database_initialized,
        database,
        admin_granted,
    })
}

/// If `KINSHIP_BOOTSTRAP_ADMIN_EMAIL` names an existing profile, make sure it
/// holds the admin role. A profile that does not exist yet is skipped; the
/// grant happens on the next start after sign-up.
fn grant_bootstrap_admin(config: &KinshipConfig, database: &Database) -> Result<Option<String>> {
    let Some(email) = &config.auth.bootstrap_admin_email else {
        return Ok(None);
    };
    let profile = database.with_repositories(|repos| repos.profiles().get_by_email(email))?;
    let Some(profile) = profile else {
        tracing::info!(%email, "bootstrap admin profile not found yet, skipping grant");
        return Ok(None);
    };
    let auth = AuthService::new(database.clone(), config.auth.session_ttl_hours);
    auth.grant_role(&profile.id, ROLE_ADMIN)?;
    tracing::info!(%email, "bootstrap admin role ensured");
    Ok(Some(email.clone()))
}

fn create_dir_if_missing(path: &std::path::Path, created: &mut Vec<String>) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)?;
        created.push(path.display().to_string());
    }
    Ok(())
}
