use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct KinshipConfig {
    pub api_port: u16,
    pub paths: KinshipPaths,
    pub auth: AuthConfig,
    pub file: FileConfig,
}

impl KinshipConfig {
    pub fn from_env() -> Result<Self> {
        let paths = KinshipPaths::discover()?;
        let api_port = env::var("KINSHIP_API_PORT")
            .ok()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(8080);
        let auth = AuthConfig::from_env();
        let file = FileConfig::from_env();
        Ok(Self {
            api_port,
            paths,
            auth,
            file,
        })
    }

    pub fn with_base_dir<P: AsRef<Path>>(api_port: u16, base: P) -> Result<Self> {
        Ok(Self {
            api_port,
            paths: KinshipPaths::from_base_dir(base)?,
            auth: AuthConfig::from_env(),
            file: FileConfig::from_env(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Profile that receives the admin role during bootstrap, if it exists.
    pub bootstrap_admin_email: Option<String>,
    /// Session lifetime in hours.
    pub session_ttl_hours: i64,
}

impl AuthConfig {
    pub fn from_env() -> Self {
        let bootstrap_admin_email = env::var("KINSHIP_BOOTSTRAP_ADMIN_EMAIL")
            .ok()
            .and_then(|raw| {
                let trimmed = raw.trim().to_string();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(trimmed)
                }
            });
        let session_ttl_hours = env::var("KINSHIP_SESSION_TTL_HOURS")
            .ok()
            .and_then(|raw| raw.parse::<i64>().ok())
            .unwrap_or(24 * 30);
        Self {
            bootstrap_admin_email,
            session_ttl_hours,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            bootstrap_admin_email: None,
            session_ttl_hours: 24 * 30,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FileConfig {
    pub max_upload_bytes: Option<u64>,
}

impl FileConfig {
    pub fn from_env() -> Self {
        let max_upload_bytes = env::var("KINSHIP_MAX_UPLOAD_BYTES")
            .ok()
            .and_then(|raw| raw.parse::<u64>().ok());
        Self { max_upload_bytes }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct KinshipPaths {
    pub base: PathBuf,
    pub data_dir: PathBuf,
    pub db_path: PathBuf,
    pub files_dir: PathBuf,
    pub uploads_dir: PathBuf,
    pub logs_dir: PathBuf,
}

impl KinshipPaths {
    pub fn discover() -> Result<Self> {
        let exe_path = std::env::current_exe()
            .map_err(|err| anyhow!("failed to resolve current executable: {err}"))?;
        let base = exe_path
            .parent()
            .ok_or_else(|| anyhow!("executable path missing parent"))?
            .to_path_buf();
        Self::from_base_dir(base)
    }

    pub fn from_base_dir<P: AsRef<Path>>(base: P) -> Result<Self> {
        let base = base.as_ref().to_path_buf();
        let data_dir = base.join("data");
        let db_path = data_dir.join("kinship.db");
        let files_dir = base.join("files");
        let uploads_dir = files_dir.join("uploads");
        let logs_dir = base.join("logs");

        Ok(Self {
            base,
            data_dir,
            db_path,
            files_dir,
            uploads_dir,
            logs_dir,
        })
    }
}
