//! Gallery storage: photos, videos and written stories.
//!
//! Uploaded bytes live under `files/uploads/` inside the data directory and
//! the database row keeps the relative path plus a blake3 checksum. The
//! public `file_url` always points back at this server.

use crate::auth::SessionContext;
use crate::config::KinshipPaths;
use crate::database::models::MediaRecord;
use crate::database::repositories::MediaRepository;
use crate::database::Database;
use crate::errors::DomainError;
use crate::realtime::{ChangeEvent, ChangeHub, ChangeOp};
use crate::utils::now_utc_iso;
use anyhow::{Context, Result};
use blake3::Hasher;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::fs;
use uuid::Uuid;

pub const MEDIA_TYPES: &[&str] = &["photo", "video", "story"];

#[derive(Clone)]
pub struct MediaService {
    database: Database,
    paths: KinshipPaths,
    hub: ChangeHub,
}

#[derive(Debug, Clone)]
pub struct SaveMediaInput {
    pub title: String,
    pub description: Option<String>,
    pub media_type: String,
    pub branch_id: Option<String>,
    pub member_id: Option<String>,
    pub original_name: Option<String>,
    pub mime: Option<String>,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MediaView {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub media_type: String,
    pub file_url: String,
    pub thumbnail_url: Option<String>,
    pub branch_id: Option<String>,
    pub member_id: Option<String>,
    pub uploaded_by: Option<String>,
    pub size_bytes: Option<i64>,
    pub checksum: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct MediaDownload {
    pub metadata: MediaView,
    pub mime: String,
    pub absolute_path: PathBuf,
}

impl MediaView {
    fn from_record(record: MediaRecord) -> Self {
        Self {
            id: record.id,
            title: record.title,
            description: record.description,
            media_type: record.media_type,
            file_url: record.file_url,
            thumbnail_url: record.thumbnail_url,
            branch_id: record.branch_id,
            member_id: record.member_id,
            uploaded_by: record.uploaded_by,
            size_bytes: record.size_bytes,
            checksum: record.checksum,
            created_at: record.created_at,
        }
    }
}

impl MediaService {
    pub fn new(database: Database, paths: KinshipPaths, hub: ChangeHub) -> Self {
        Self {
            database,
            paths,
            hub,
        }
    }

    pub async fn save_media(
        &self,
        input: SaveMediaInput,
        viewer: &SessionContext,
    ) -> Result<MediaView> {
        if input.title.trim().is_empty() {
            return Err(DomainError::invalid("media title may not be empty"));
        }
        if !MEDIA_TYPES.contains(&input.media_type.as_str()) {
            return Err(DomainError::invalid(format!(
                "media_type must be one of {MEDIA_TYPES:?}"
            )));
        }
        if input.data.is_empty() {
            return Err(DomainError::invalid("file data may not be empty"));
        }

        let media_id = Uuid::new_v4().to_string();
        let original_name = input.original_name.as_deref().map(sanitize_filename);
        let stored_name = match original_name
            .as_deref()
            .and_then(|name| Path::new(name).extension().and_then(|ext| ext.to_str()))
        {
            Some(ext) if !ext.is_empty() => format!("{media_id}.{ext}"),
            _ => media_id.clone(),
        };

        let relative_path = format!("files/uploads/{stored_name}");
        let absolute_path = self.paths.base.join(&relative_path);
        if let Some(parent) = absolute_path.parent() {
            fs::create_dir_all(parent).await.with_context(|| {
                format!("failed to create upload directory {}", parent.display())
            })?;
        }
        fs::write(&absolute_path, &input.data)
            .await
            .with_context(|| {
                format!(
                    "failed to write uploaded file to {}",
                    absolute_path.display()
                )
            })?;

        let mut hasher = Hasher::new();
        hasher.update(&input.data);
        let checksum = format!("blake3:{}", hasher.finalize().to_hex());

        let record = MediaRecord {
            id: media_id.clone(),
            title: input.title.trim().to_string(),
            description: input.description,
            media_type: input.media_type,
            file_url: format!("/media/files/{media_id}"),
            thumbnail_url: None,
            branch_id: input.branch_id,
            member_id: input.member_id,
            uploaded_by: Some(viewer.user_id.clone()),
            path: Some(relative_path),
            size_bytes: Some(input.data.len() as i64),
            checksum: Some(checksum),
            created_at: now_utc_iso(),
        };

        self.database
            .with_repositories(|repos| repos.media().create(&record))?;

        let mut event = ChangeEvent::new("media", ChangeOp::Insert, &record.id);
        if let Some(branch_id) = &record.branch_id {
            event = event.with_field("branch_id", branch_id);
        }
        self.hub.publish(event);
        Ok(MediaView::from_record(record))
    }

    pub fn list_media(&self, media_type: Option<&str>) -> Result<Vec<MediaView>> {
        if let Some(kind) = media_type {
            if !MEDIA_TYPES.contains(&kind) {
                return Err(DomainError::invalid(format!(
                    "media_type must be one of {MEDIA_TYPES:?}"
                )));
            }
        }
        self.database.with_repositories(|repos| {
            let rows = repos.media().list(media_type)?;
            Ok(rows.into_iter().map(MediaView::from_record).collect())
        })
    }

    pub fn list_for_branch(&self, branch_id: &str) -> Result<Vec<MediaView>> {
        self.database.with_repositories(|repos| {
            let rows = repos.media().list_for_branch(branch_id)?;
            Ok(rows.into_iter().map(MediaView::from_record).collect())
        })
    }

    pub async fn prepare_download(&self, id: &str) -> Result<Option<MediaDownload>> {
        let record = self
            .database
            .with_repositories(|repos| repos.media().get(id))?;
        let Some(record) = record else {
            return Ok(None);
        };
        let Some(relative_path) = record.path.clone() else {
            // Row predates local storage; only its external URL exists.
            return Ok(None);
        };
        let absolute_path = self.paths.base.join(&relative_path);
        let bytes = match fs::read(&absolute_path).await {
            Ok(bytes) => bytes,
            Err(_) => {
                tracing::warn!(path = %absolute_path.display(), "media file missing on disk");
                return Ok(None);
            }
        };
        let mime = infer::get(&bytes)
            .map(|kind| kind.mime_type().to_string())
            .unwrap_or_else(|| "application/octet-stream".to_string());
        Ok(Some(MediaDownload {
            metadata: MediaView::from_record(record),
            mime,
            absolute_path,
        }))
    }

    pub async fn delete_media(&self, id: &str, viewer: &SessionContext) -> Result<()> {
        let record = self.database.with_repositories(|repos| {
            let Some(record) = repos.media().get(id)? else {
                return Err(DomainError::not_found("media not found"));
            };
            let owns = record.uploaded_by.as_deref() == Some(viewer.user_id.as_str());
            if !owns && !viewer.is_admin() {
                return Err(DomainError::forbidden(
                    "only the uploader or an admin may delete",
                ));
            }
            repos.media().delete(id)?;
            Ok(record)
        })?;

        // Best effort: a missing file on disk is not an error once the row
        // is gone.
        if let Some(relative_path) = record.path {
            let absolute_path = self.paths.base.join(relative_path);
            if let Err(err) = fs::remove_file(&absolute_path).await {
                tracing::warn!(path = %absolute_path.display(), error = %err, "could not remove media file");
            }
        }
        self.hub
            .publish(ChangeEvent::new("media", ChangeOp::Delete, id));
        Ok(())
    }
}

fn sanitize_filename(name: &str) -> String {
    Path::new(name)
        .file_name()
        .and_then(|file| file.to_str())
        .unwrap_or("upload")
        .chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '.' | '-' | '_' => c,
            _ => '_',
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AuthService, SignUpInput};
    use rusqlite::Connection;
    use tempfile::tempdir;
    use tokio::runtime::Runtime;

    fn setup(base: &Path) -> (MediaService, SessionContext) {
        let paths = KinshipPaths::from_base_dir(base).expect("paths");
        let conn = Connection::open_in_memory().expect("db");
        let db = Database::from_connection(conn, true);
        db.ensure_migrations().expect("migrations");
        let auth = AuthService::new(db.clone(), 24);
        let ctx = auth
            .sign_up(SignUpInput {
                email: "alice@example.com".into(),
                password: "hunter22".into(),
                full_name: None,
            })
            .expect("sign up")
            .user;
        (MediaService::new(db, paths, ChangeHub::new()), ctx)
    }

    #[test]
    fn save_list_and_download_round_trip() {
        let rt = Runtime::new().unwrap();
        rt.block_on(async {
            let temp = tempdir().expect("tempdir");
            let (service, alice) = setup(temp.path());

            // A real PNG header so mime sniffing has something to go on.
            let mut data = vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
            data.extend_from_slice(&[0u8; 64]);

            let saved = service
                .save_media(
                    SaveMediaInput {
                        title: "Reunion photo".into(),
                        description: Some("Front porch".into()),
                        media_type: "photo".into(),
                        branch_id: None,
                        member_id: None,
                        original_name: Some("porch photo!.png".into()),
                        mime: Some("image/png".into()),
                        data,
                    },
                    &alice,
                )
                .await
                .expect("save media");

            assert_eq!(saved.file_url, format!("/media/files/{}", saved.id));
            assert!(saved
                .checksum
                .as_deref()
                .map(|c| c.starts_with("blake3:"))
                .unwrap_or(false));

            let photos = service.list_media(Some("photo")).expect("list");
            assert_eq!(photos.len(), 1);
            assert!(service.list_media(Some("video")).expect("videos").is_empty());
            assert!(service.list_media(Some("bogus")).is_err());

            let download = service
                .prepare_download(&saved.id)
                .await
                .expect("prepare")
                .expect("present");
            assert_eq!(download.mime, "image/png");
            assert!(download.absolute_path.exists());
        });
    }

    #[test]
    fn deletion_is_restricted_and_removes_the_file() {
        let rt = Runtime::new().unwrap();
        rt.block_on(async {
            let temp = tempdir().expect("tempdir");
            let (service, alice) = setup(temp.path());

            let saved = service
                .save_media(
                    SaveMediaInput {
                        title: "Short story".into(),
                        description: None,
                        media_type: "story".into(),
                        branch_id: None,
                        member_id: None,
                        original_name: Some("story.txt".into()),
                        mime: Some("text/plain".into()),
                        data: b"Once upon a time".to_vec(),
                    },
                    &alice,
                )
                .await
                .expect("save media");

            let stranger = SessionContext {
                user_id: "someone-else".into(),
                email: "other@example.com".into(),
                full_name: None,
                roles: vec![],
            };
            assert!(service.delete_media(&saved.id, &stranger).await.is_err());

            service
                .delete_media(&saved.id, &alice)
                .await
                .expect("uploader deletes");
            assert!(service
                .prepare_download(&saved.id)
                .await
                .expect("prepare")
                .is_none());
        });
    }
}
