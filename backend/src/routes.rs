use actix_files::{Files, NamedFile};
use actix_multipart::{Multipart, MultipartError};
use actix_web::http::StatusCode;
use actix_web::http::header::CONTENT_LENGTH;
use actix_web::{HttpRequest, HttpResponse, web};
use futures::TryStreamExt;
use log::{error, info, warn};
use shared::{ClassifyResponse, ErrorResponse, PingResponse};
use std::path::PathBuf;

use crate::pipeline::{
    ClassificationPipeline, ErrorKind, NamingPolicy, PipelineError, PipelineResult,
    ValidationError,
};
use crate::storage::artifact_namer::{self, sanitize_filename};
use crate::storage::local_store::LocalStore;

pub const IMAGE_FIELD: &str = "image";
pub const INDEX_PLACEHOLDER: &str = "Upload page not found. Create static/index.html";
pub const DECODE_FAILED_MESSAGE: &str = "Failed to load image after upload";

pub fn configure_routes(cfg: &mut web::ServiceConfig, static_dir: PathBuf) {
    cfg.service(web::resource("/").route(web::get().to(index)))
        .service(web::resource("/api/classify").route(web::post().to(handle_classify)))
        .service(web::resource("/api/ping").route(web::get().to(ping)))
        .service(Files::new("/static", static_dir));
}

async fn index(req: HttpRequest, store: web::Data<LocalStore>) -> HttpResponse {
    match NamedFile::open_async(store.static_dir().join("index.html")).await {
        Ok(file) => file.into_response(&req),
        Err(_) => HttpResponse::Ok()
            .content_type("text/plain; charset=utf-8")
            .body(INDEX_PLACEHOLDER),
    }
}

async fn ping() -> HttpResponse {
    HttpResponse::Ok().json(PingResponse::ok())
}

struct Upload {
    filename: String,
    data: Vec<u8>,
}

#[derive(Debug, thiserror::Error)]
enum UploadError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error("Malformed multipart body: {0}")]
    Multipart(#[from] MultipartError),
}

async fn handle_classify(
    req: HttpRequest,
    pipeline: web::Data<ClassificationPipeline>,
    store: web::Data<LocalStore>,
    payload: Multipart,
) -> HttpResponse {
    if declared_length(&req).is_some_and(|len| len > store.max_upload_bytes()) {
        return rejection(ValidationError::TooLarge);
    }

    let upload = match read_image_field(payload, &store).await {
        Ok(upload) => upload,
        Err(UploadError::Invalid(e)) => return rejection(e),
        Err(e @ UploadError::Multipart(_)) => {
            warn!("Rejected upload: {}", e);
            return error_json(StatusCode::BAD_REQUEST, e.to_string());
        }
    };

    let paths = store.plan_upload(&upload.filename, artifact_namer::now());
    let policy = NamingPolicy::Managed {
        paths: paths.clone(),
        display_name: sanitize_filename(&upload.filename),
    };

    let worker_store = store.clone();
    let worker_pipeline = pipeline.clone();
    let result = web::block(move || -> PipelineResult {
        worker_store
            .stage_upload(&paths, &upload.data)
            .map_err(|e| PipelineError::PersistFailed {
                path: paths.input_path.clone(),
                reason: e.to_string(),
            })?;
        worker_pipeline.classify_and_annotate(&paths.input_path, &policy)
    })
    .await;

    match result {
        Ok(Ok(artifact)) => {
            info!(
                "Classified {} as '{}' (class #{})",
                artifact.paths.input_path.display(),
                artifact.outcome.class_label,
                artifact.outcome.class_index
            );
            HttpResponse::Ok().json(ClassifyResponse {
                ok: true,
                label: artifact.outcome.class_label,
                confidence: shared::percent_value(artifact.outcome.confidence),
                class_idx: artifact.outcome.class_index,
                network: artifact.outcome.model_name,
                input_image_url: LocalStore::input_url(&artifact.paths.input_path),
                output_image_url: LocalStore::output_url(&artifact.paths.output_path),
            })
        }
        Ok(Err(e)) => pipeline_failure(e),
        Err(e) => {
            error!("Blocking pool error: {:?}", e);
            error_json(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Classification worker unavailable",
            )
        }
    }
}

/// Pulls the first `image` file field, validating its name before reading
/// and its size while streaming. Other fields are drained.
async fn read_image_field(
    mut payload: Multipart,
    store: &LocalStore,
) -> Result<Upload, UploadError> {
    let mut upload: Option<Upload> = None;
    let mut received = 0usize;

    while let Some(mut field) = payload.try_next().await? {
        let filename = match (upload.is_none(), field.name() == Some(IMAGE_FIELD)) {
            (true, true) => field
                .content_disposition()
                .and_then(|cd| cd.get_filename())
                .map(str::to_string),
            _ => None,
        };

        let Some(filename) = filename else {
            while let Some(chunk) = field.try_next().await? {
                received += chunk.len();
                store.validate_image_size(received)?;
            }
            continue;
        };

        LocalStore::validate_upload_name(&filename)?;

        let mut data = Vec::new();
        while let Some(chunk) = field.try_next().await? {
            received += chunk.len();
            store.validate_image_size(received)?;
            data.extend_from_slice(&chunk);
        }
        upload = Some(Upload { filename, data });
    }

    upload.ok_or(UploadError::Invalid(ValidationError::MissingField))
}

fn declared_length(req: &HttpRequest) -> Option<usize> {
    req.headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

fn rejection(e: ValidationError) -> HttpResponse {
    warn!("Rejected upload: {}", e);
    let status = match e {
        ValidationError::TooLarge => StatusCode::PAYLOAD_TOO_LARGE,
        _ => status_for(e.kind()),
    };
    error_json(status, e.to_string())
}

fn pipeline_failure(e: PipelineError) -> HttpResponse {
    let status = status_for(e.kind());
    if status.is_server_error() {
        error!("{}", e);
        return error_json(status, e.to_string());
    }
    // Only decoding fails on the client side once the upload is accepted.
    warn!("{}", e);
    error_json(status, DECODE_FAILED_MESSAGE)
}

/// Client errors for bad input, server errors for everything past decoding.
fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::ValidationFailed | ErrorKind::DecodeFailed => StatusCode::BAD_REQUEST,
        ErrorKind::ClassificationFailed | ErrorKind::PersistFailed => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn error_json(status: StatusCode, message: impl Into<String>) -> HttpResponse {
    HttpResponse::build(status).json(ErrorResponse::new(message))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_per_error_kind() {
        assert_eq!(status_for(ErrorKind::ValidationFailed), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(ErrorKind::DecodeFailed), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_for(ErrorKind::ClassificationFailed),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_for(ErrorKind::PersistFailed),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn every_validation_error_is_a_client_error() {
        for e in [
            ValidationError::MissingField,
            ValidationError::EmptyFilename,
            ValidationError::UnsupportedType,
            ValidationError::TooLarge,
        ] {
            assert_eq!(e.kind(), ErrorKind::ValidationFailed);
            assert!(rejection(e).status().is_client_error());
        }
    }
}
