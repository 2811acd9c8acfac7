use actix_multipart::Multipart;
use actix_web::{http::header, web, HttpRequest, HttpResponse, Responder, ResponseError};
use futures_util::StreamExt;
use serde::Deserialize;

use super::model::{
    CreateSubmissionRequest, MergeDocumentsResponse, PreviewFormPayload, PreviewRequest, Submission,
    SubmitResponse,
};
use super::multipart::MultipartParser;
use super::service;
use crate::error::PipelineError;
use crate::{AppState, ErrorResponse};

/// Header carrying the authenticated caller's user id.
pub const USER_ID_HEADER: &str = "X-User-Id";

fn caller_id(req: &HttpRequest) -> Result<i32, PipelineError> {
    let raw = req
        .headers()
        .get(USER_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| PipelineError::validation(format!("{} header is required", USER_ID_HEADER)))?;

    match raw.parse::<i32>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(PipelineError::validation(format!(
            "{} header must be a positive integer",
            USER_ID_HEADER
        ))),
    }
}

#[derive(Deserialize)]
pub struct SubmissionPath {
    pub id: i32,
}

#[utoipa::path(
    post,
    path = "/api/submissions",
    tag = "Submissions",
    request_body = CreateSubmissionRequest,
    params(("X-User-Id" = i32, Header, description = "Caller user id")),
    responses(
        (status = 201, description = "Draft submission created", body = Submission),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn create_submission(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Json<CreateSubmissionRequest>,
) -> impl Responder {
    let user_id = match caller_id(&req) {
        Ok(id) => id,
        Err(e) => return e.error_response(),
    };

    match service::create_submission(&state, user_id, &body).await {
        Ok(submission) => HttpResponse::Created().json(submission),
        Err(e) => {
            log::error!("Failed to create submission: {}", e);
            e.error_response()
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/submissions/{id}/submit",
    tag = "Submissions",
    params(
        ("id" = i32, Path, description = "Submission id"),
        ("X-User-Id" = i32, Header, description = "Caller user id")
    ),
    responses(
        (status = 200, description = "Submission finalised", body = SubmitResponse),
        (status = 400, description = "Submission is not a draft", body = ErrorResponse),
        (status = 404, description = "Submission not found", body = ErrorResponse),
        (status = 500, description = "Rendering, conversion or database failure", body = ErrorResponse)
    )
)]
pub async fn submit_submission(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<SubmissionPath>,
) -> impl Responder {
    let user_id = match caller_id(&req) {
        Ok(id) => id,
        Err(e) => return e.error_response(),
    };

    match service::submit_submission(&state, path.id, user_id).await {
        Ok(response) => HttpResponse::Ok().json(response),
        Err(e) => {
            log::error!("[submit] submission {} failed: {}", path.id, e);
            e.error_response()
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/submissions/{id}/merge-documents",
    tag = "Submissions",
    params(
        ("id" = i32, Path, description = "Submission id"),
        ("X-User-Id" = i32, Header, description = "Caller user id")
    ),
    responses(
        (status = 200, description = "Merged file, or null when there are no PDFs", body = MergeDocumentsResponse),
        (status = 400, description = "Submission not submitted yet", body = ErrorResponse),
        (status = 404, description = "Submission or stored file not found", body = ErrorResponse),
        (status = 500, description = "Merge failed", body = ErrorResponse)
    )
)]
pub async fn merge_submission_documents(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<SubmissionPath>,
) -> impl Responder {
    let user_id = match caller_id(&req) {
        Ok(id) => id,
        Err(e) => return e.error_response(),
    };

    match service::merge_submission_documents(&state, path.id, user_id).await {
        Ok(response) => HttpResponse::Ok().json(response),
        Err(e) => {
            log::error!("[merge] submission {} failed: {}", path.id, e);
            e.error_response()
        }
    }
}

/// What a preview request renders.
enum PreviewSource {
    /// A stored publication reward submission.
    Stored(i32),
    /// Form data for a request that has not been saved.
    Form(Box<PreviewFormPayload>),
}

/// Accepts a JSON `PreviewRequest`, or a multipart form with either `submission_id` or a
/// `data` JSON payload plus `attachments*` PDF files.
#[utoipa::path(
    post,
    path = "/api/publication-rewards/preview",
    tag = "Publication Rewards",
    request_body(content = PreviewRequest, description = "JSON body, or multipart form with submission_id or data (PreviewFormPayload) and attachments"),
    params(("X-User-Id" = i32, Header, description = "Caller user id")),
    responses(
        (status = 200, description = "Rendered reward form", body = Vec<u8>, content_type = "application/pdf"),
        (status = 400, description = "Invalid request or attachment", body = ErrorResponse),
        (status = 404, description = "Submission or template not found", body = ErrorResponse),
        (status = 413, description = "Request body over the upload limit", body = ErrorResponse),
        (status = 500, description = "Rendering or conversion failure", body = ErrorResponse)
    )
)]
pub async fn preview_reward_form(
    req: HttpRequest,
    state: web::Data<AppState>,
    payload: web::Payload,
) -> impl Responder {
    let user_id = match caller_id(&req) {
        Ok(id) => id,
        Err(e) => return e.error_response(),
    };

    let limit = state.config.max_upload_bytes;
    let (source, attachments) = match read_preview_request(&req, payload, limit).await {
        Ok(parsed) => parsed,
        Err(e) => return e.error_response(),
    };

    let (result, filename) = match &source {
        PreviewSource::Stored(submission_id) => (
            service::preview_reward_form(&state, *submission_id, user_id, &attachments).await,
            format!("publication_reward_preview_{}.pdf", submission_id),
        ),
        PreviewSource::Form(form) => (
            service::preview_reward_form_from_form(&state, form, &attachments).await,
            "publication_reward_preview.pdf".to_string(),
        ),
    };

    match result {
        Ok(pdf) => HttpResponse::Ok()
            .content_type("application/pdf")
            .insert_header((
                header::CONTENT_DISPOSITION,
                format!("inline; filename=\"{}\"", filename),
            ))
            .body(pdf),
        Err(e) => {
            log::error!("Preview {} failed: {}", filename, e);
            e.error_response()
        }
    }
}

async fn read_preview_request(
    req: &HttpRequest,
    mut payload: web::Payload,
    limit: usize,
) -> Result<(PreviewSource, Vec<(String, Vec<u8>)>), PipelineError> {
    let content_type = req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("")
        .to_ascii_lowercase();

    if content_type.starts_with("multipart/form-data") {
        let multipart = Multipart::new(req.headers(), payload);
        let upload = MultipartParser::parse_preview_multipart(multipart, limit).await?;
        if let Some(raw) = upload.data.as_deref() {
            let form: PreviewFormPayload = serde_json::from_str(raw)
                .map_err(|e| PipelineError::validation(format!("invalid form payload: {}", e)))?;
            return Ok((PreviewSource::Form(Box::new(form)), upload.attachments));
        }
        let submission_id = upload
            .submission_id
            .ok_or_else(|| PipelineError::validation("submission_id or data is required"))?;
        return Ok((PreviewSource::Stored(submission_id), upload.attachments));
    }

    let mut body = web::BytesMut::new();
    while let Some(chunk) = payload.next().await {
        let chunk = chunk.map_err(|e| PipelineError::validation(format!("failed to read request body: {}", e)))?;
        if body.len() + chunk.len() > limit {
            return Err(PipelineError::PayloadTooLarge(format!(
                "request body exceeds the {} byte limit",
                limit
            )));
        }
        body.extend_from_slice(&chunk);
    }
    let request: PreviewRequest = serde_json::from_slice(&body)
        .map_err(|e| PipelineError::validation(format!("invalid preview request: {}", e)))?;
    Ok((PreviewSource::Stored(request.submission_id), Vec::new()))
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/submissions").route(web::post().to(create_submission)))
        .service(web::resource("/submissions/{id}/submit").route(web::post().to(submit_submission)))
        .service(
            web::resource("/submissions/{id}/merge-documents")
                .route(web::post().to(merge_submission_documents)),
        )
        .service(
            web::resource("/publication-rewards/preview").route(web::post().to(preview_reward_form)),
        );
}
