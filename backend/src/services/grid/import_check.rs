use crate::engine::error::{ImportError, Result};
use crate::engine::import::{self, ImportCheck};
use crate::engine::Engine;
use crate::services::grid::run_blocking;
use crate::session::SessionStore;
use actix_multipart::{Field, Multipart, MultipartError};
use actix_web::{web, HttpRequest, HttpResponse, Responder, ResponseError};
use common::responses::CheckImportResponse;
use futures_util::StreamExt;
use log::warn;
use std::io::{BufWriter, Write};
use tempfile::NamedTempFile;

/// Stage one of an import: expects a `module` text part and a `file` part.
pub async fn process(
    req: HttpRequest,
    payload: Multipart,
    engine: web::Data<Engine>,
    sessions: web::Data<SessionStore>,
) -> impl Responder {
    match check_upload(&req, payload, &engine, &sessions).await {
        Ok(check) => HttpResponse::Ok().json(CheckImportResponse {
            success: true,
            stats: check.stats,
            temp_file: check.handle,
        }),
        Err(e) => {
            warn!("Import check rejected: {}", e);
            e.error_response()
        }
    }
}

fn upload_error(e: MultipartError) -> ImportError {
    ImportError::Upload(e.to_string())
}

async fn read_text(field: &mut Field) -> std::result::Result<String, ImportError> {
    let mut bytes = Vec::new();
    while let Some(chunk) = field.next().await {
        bytes.extend_from_slice(&chunk.map_err(upload_error)?);
    }
    Ok(String::from_utf8_lossy(&bytes).trim().to_string())
}

/// Streams the file part into a scratch file inside the staging directory.
async fn receive_file(
    field: &mut Field,
    engine: &Engine,
) -> std::result::Result<NamedTempFile, ImportError> {
    let mut writer = BufWriter::new(engine.staging.new_upload()?);
    while let Some(chunk) = field.next().await {
        writer.write_all(&chunk.map_err(upload_error)?)?;
    }
    writer
        .into_inner()
        .map_err(|e| ImportError::Upload(e.to_string()))
}

async fn check_upload(
    req: &HttpRequest,
    mut payload: Multipart,
    engine: &Engine,
    sessions: &SessionStore,
) -> Result<ImportCheck> {
    sessions.verify(req).await?;

    let mut module: Option<String> = None;
    let mut upload: Option<NamedTempFile> = None;
    while let Some(item) = payload.next().await {
        let mut field = item.map_err(upload_error)?;
        let name = field
            .content_disposition()
            .and_then(|cd| cd.get_name().map(|n| n.to_string()));

        match name.as_deref() {
            Some("module") => module = Some(read_text(&mut field).await?),
            Some("file") => upload = Some(receive_file(&mut field, engine).await?),
            _ => {}
        }
    }

    let module = module
        .filter(|m| !m.is_empty())
        .ok_or_else(|| ImportError::Upload("Missing module".into()))?;
    let schema = engine.registry.dataset(&module)?;
    let upload = upload.ok_or_else(|| ImportError::Upload("No file uploaded".into()))?;

    let staging = engine.staging.clone();
    run_blocking(move || import::check_import(&staging, &schema, upload)).await
}
