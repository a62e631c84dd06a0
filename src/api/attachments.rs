//! Attachment upload/download endpoints.
//!
//! Uploads arrive as multipart form data and are stored either on disk or
//! as a database blob, per configuration.

use axum::{
    extract::{Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::AuthContext;
use crate::domain::changelog::Change;
use crate::domain::ids;
use crate::domain::pagination::{Page, PageParams};
use crate::error::{AppError, FieldError, Result};
use crate::metrics::UPLOADS_STORED_TOTAL;
use crate::server::AppState;
use crate::store::{Attachment, NewAttachment};

use super::extract::require_write;

const ATTACHABLE_TYPES: &[&str] = &["test_case", "test_plan", "test_run", "bug", "comment"];

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/attachments", get(list_attachments).post(upload_attachment))
        .route(
            "/attachments/{id}",
            get(download_attachment).delete(delete_attachment),
        )
}

#[derive(Debug, Serialize)]
pub struct AttachmentResponse {
    #[serde(with = "ids")]
    pub id: i64,
    pub entity_type: String,
    #[serde(with = "ids")]
    pub entity_id: i64,
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: i64,
    #[serde(with = "ids")]
    pub uploaded_by: i64,
    pub created_at: DateTime<Utc>,
}

impl From<Attachment> for AttachmentResponse {
    fn from(attachment: Attachment) -> Self {
        Self {
            id: attachment.id,
            entity_type: attachment.entity_type,
            entity_id: attachment.entity_id,
            file_name: attachment.file_name,
            content_type: attachment.content_type,
            size_bytes: attachment.size_bytes,
            uploaded_by: attachment.uploaded_by,
            created_at: attachment.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub entity_type: String,
    pub entity_id: i64,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

struct UploadParts {
    entity_type: Option<String>,
    entity_id: Option<i64>,
    file_name: Option<String>,
    content_type: Option<String>,
    data: Option<Vec<u8>>,
}

async fn read_multipart(multipart: &mut Multipart) -> Result<UploadParts> {
    let mut parts = UploadParts {
        entity_type: None,
        entity_id: None,
        file_name: None,
        content_type: None,
        data: None,
    };

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::validation(format!("Malformed multipart body: {}", e)))?
    {
        let name = field.name().map(|s| s.to_string());
        match name.as_deref() {
            Some("entity_type") => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| AppError::invalid_field("entity_type", e.to_string()))?;
                parts.entity_type = Some(value);
            }
            Some("entity_id") => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| AppError::invalid_field("entity_id", e.to_string()))?;
                parts.entity_id = Some(value.parse().map_err(|_| {
                    AppError::invalid_field("entity_id", "entity id must be an integer")
                })?);
            }
            Some("file") => {
                parts.file_name = field.file_name().map(|s| s.to_string());
                parts.content_type = field.content_type().map(|s| s.to_string());
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::invalid_field("file", e.to_string()))?;
                parts.data = Some(bytes.to_vec());
            }
            _ => continue,
        }
    }

    Ok(parts)
}

#[tracing::instrument(name = "http.upload_attachment", skip(state, ctx, multipart))]
pub async fn upload_attachment(
    State(state): State<AppState>,
    ctx: AuthContext,
    mut multipart: Multipart,
) -> Result<Json<AttachmentResponse>> {
    require_write(&ctx)?;

    let parts = read_multipart(&mut multipart).await?;

    let mut details = Vec::new();
    let entity_type = parts.entity_type.unwrap_or_default();
    if !ATTACHABLE_TYPES.contains(&entity_type.as_str()) {
        details.push(FieldError::new(
            "entity_type",
            format!("entity type must be one of {:?}", ATTACHABLE_TYPES),
        ));
    }
    if parts.entity_id.is_none() {
        details.push(FieldError::new("entity_id", "entity id is required"));
    }
    let data = parts.data.unwrap_or_default();
    if data.is_empty() {
        details.push(FieldError::new("file", "file part is required"));
    }
    if !details.is_empty() {
        return Err(AppError::Validation {
            message: "Invalid upload".to_string(),
            details,
        });
    }

    let max_bytes = state.settings.uploads.max_file_bytes;
    if data.len() > max_bytes {
        return Err(AppError::invalid_field(
            "file",
            format!("file exceeds the {} byte limit", max_bytes),
        ));
    }

    let entity_id = parts.entity_id.unwrap();
    let file_name = parts.file_name.unwrap_or_else(|| "upload.bin".to_string());
    let content_type = parts
        .content_type
        .unwrap_or_else(|| "application/octet-stream".to_string());
    let size_bytes = data.len() as i64;

    let backend = state.settings.uploads.backend.as_str();
    let (storage_path, blob_data) = match backend {
        "database" => (None, Some(data)),
        _ => {
            let directory = &state.settings.uploads.directory;
            tokio::fs::create_dir_all(directory)
                .await
                .map_err(|e| AppError::Internal(format!("Failed to create upload dir: {}", e)))?;

            let disk_name = format!("{}_{}", Uuid::new_v4(), sanitize_file_name(&file_name));
            let path = std::path::Path::new(directory).join(&disk_name);
            tokio::fs::write(&path, &data)
                .await
                .map_err(|e| AppError::Internal(format!("Failed to store upload: {}", e)))?;

            (Some(path.to_string_lossy().into_owned()), None)
        }
    };

    let attachment = state
        .attachments
        .create(
            ctx.tenant_id,
            ctx.user_id,
            NewAttachment {
                entity_type,
                entity_id,
                file_name,
                content_type,
                size_bytes,
                storage_path,
                blob_data,
            },
        )
        .await?;

    UPLOADS_STORED_TOTAL
        .with_label_values(&[if backend == "database" { "database" } else { "disk" }])
        .inc();

    state
        .change_logger
        .record(
            ctx.tenant_id,
            ctx.user_id,
            Change::created("attachment", attachment.id, &attachment),
        )
        .await;

    Ok(Json(AttachmentResponse::from(attachment)))
}

pub async fn list_attachments(
    State(state): State<AppState>,
    ctx: AuthContext,
    Query(query): Query<ListQuery>,
) -> Result<Json<Page<AttachmentResponse>>> {
    let params = PageParams {
        page: query.page,
        limit: query.limit,
    };
    let page = state
        .attachments
        .list_for_entity(ctx.tenant_id, &query.entity_type, query.entity_id, params)
        .await?;
    Ok(Json(page.map(AttachmentResponse::from)))
}

pub async fn download_attachment(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(id): Path<i64>,
) -> Result<Response> {
    let attachment = state.attachments.fetch(ctx.tenant_id, id).await?;

    let bytes = match (&attachment.blob_data, &attachment.storage_path) {
        (Some(blob), _) => blob.clone(),
        (None, Some(path)) => tokio::fs::read(path)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to read attachment: {}", e)))?,
        (None, None) => {
            return Err(AppError::Internal(format!(
                "Attachment {} has no stored content",
                id
            )))
        }
    };

    let response = (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, attachment.content_type.clone()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", attachment.file_name),
            ),
        ],
        bytes,
    )
        .into_response();

    Ok(response)
}

pub async fn delete_attachment(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>> {
    require_write(&ctx)?;

    let before = state.attachments.soft_delete(ctx.tenant_id, id).await?;

    state
        .change_logger
        .record(
            ctx.tenant_id,
            ctx.user_id,
            Change::deleted("attachment", id, &before),
        )
        .await;

    Ok(Json(serde_json::json!({ "deleted": true })))
}

/// Keep only path-safe characters from a client-supplied file name.
fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.is_empty() {
        "upload.bin".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("report.pdf"), "report.pdf");
        assert_eq!(sanitize_file_name("../../etc/passwd"), ".._.._etc_passwd");
        assert_eq!(sanitize_file_name(""), "upload.bin");
    }
}
