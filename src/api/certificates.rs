use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentUser;
use crate::core::state::AppState;
use crate::core::time::{format_primitive, primitive_now_utc};
use crate::db::models::User;
use crate::repositories::certificates::{self, CertificateRecord};
use crate::repositories::{attempts, enrollments};
use crate::schemas::certificate::{
    CertificateDownloadResponse, CertificateResponse, CertificateVerification,
    GenerateCertificateRequest,
};
use crate::services::certificates as certificate_service;
use crate::services::notifications::{self, CertificateDelivery};

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_my_certificates))
        .route("/generate", post(generate_certificate))
        .route("/course/:course_id", get(list_course_certificates))
        .route("/verify/:certificate_number", get(verify_certificate))
        .route("/:certificate_id", get(get_certificate))
        .route("/:certificate_id/download", get(download_certificate))
        .route("/:certificate_id/email", post(resend_certificate_email))
}

async fn list_my_certificates(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<CertificateResponse>>, ApiError> {
    let records = certificates::list_records_for_user(state.db(), &user.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load certificates"))?;

    Ok(Json(records.into_iter().map(CertificateResponse::from).collect()))
}

async fn list_course_certificates(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Path(course_id): Path<String>,
) -> Result<Json<Vec<CertificateResponse>>, ApiError> {
    let records = certificates::list_records_for_user_course(state.db(), &user.id, &course_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load course certificates"))?;

    Ok(Json(records.into_iter().map(CertificateResponse::from).collect()))
}

/// Manual issuance for an attempt that already passed, covering the case
/// where the post-grade issuance was lost. Idempotent: an already issued
/// attempt returns its existing certificate.
async fn generate_certificate(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<GenerateCertificateRequest>,
) -> Result<Json<CertificateResponse>, ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let attempt = attempts::find_by_id(state.db(), &payload.test_attempt_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load test attempt"))?
        .ok_or_else(|| ApiError::NotFound("Test attempt not found".to_string()))?;

    let enrollment = enrollments::find_by_id(state.db(), &attempt.enrollment_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load enrollment"))?
        .ok_or_else(|| ApiError::internal(&attempt.enrollment_id, "Enrollment missing for attempt"))?;

    if enrollment.user_id != user.id && !user.is_admin {
        return Err(ApiError::Forbidden("Not enough permissions"));
    }

    if !attempt.is_passed {
        return Err(ApiError::BadRequest(
            "Certificates are only issued for passing attempts".to_string(),
        ));
    }

    let issued = certificate_service::issue_for_attempt(
        state.db(),
        &attempt,
        &enrollment.user_id,
        &enrollment.course_id,
        state.settings().api(),
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to issue certificate"))?;

    let record = certificates::find_record_by_id(state.db(), &issued.certificate.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load certificate"))?
        .ok_or_else(|| ApiError::internal(&issued.certificate.id, "Issued certificate missing"))?;

    Ok(Json(CertificateResponse::from(record)))
}

async fn get_certificate(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Path(certificate_id): Path<String>,
) -> Result<Json<CertificateResponse>, ApiError> {
    let record = load_certificate_for(&state, &user, &certificate_id).await?;
    Ok(Json(CertificateResponse::from(record)))
}

async fn download_certificate(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Path(certificate_id): Path<String>,
) -> Result<Json<CertificateDownloadResponse>, ApiError> {
    let record = load_certificate_for(&state, &user, &certificate_id).await?;

    Ok(Json(CertificateDownloadResponse {
        certificate_number: record.certificate_number.clone(),
        user_name: record.holder_name(),
        course_title: record.course_title.clone(),
        score: record.score,
        issue_date: format_primitive(record.issue_date),
    }))
}

/// Re-sends the certificate email on demand. Unlike the best-effort send
/// after grading, a delivery failure here is reported to the caller.
async fn resend_certificate_email(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Path(certificate_id): Path<String>,
) -> Result<Json<CertificateResponse>, ApiError> {
    let record = load_certificate_for(&state, &user, &certificate_id).await?;

    let timeout = std::time::Duration::from_secs(state.settings().smtp().send_timeout_seconds);
    let delivery = CertificateDelivery {
        recipient_email: record.email.clone(),
        recipient_name: record.holder_name(),
        course_title: record.course_title.clone(),
        certificate_number: record.certificate_number.clone(),
        score: record.score,
        download_url: record.download_url.clone(),
    };

    notifications::send_certificate_email(state.notifier(), timeout, &delivery)
        .await
        .map_err(|err| {
            tracing::warn!(error = %err, certificate_id = %record.id, "Certificate email delivery failed");
            ApiError::ServiceUnavailable("Failed to send certificate email".to_string())
        })?;

    let emailed_date = primitive_now_utc();
    certificates::mark_emailed(state.db(), &record.id, emailed_date)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to mark certificate emailed"))?;

    let mut response = CertificateResponse::from(record);
    response.is_emailed = true;
    response.emailed_date = Some(format_primitive(emailed_date));
    Ok(Json(response))
}

/// Public endpoint: anyone with a certificate number can check it.
async fn verify_certificate(
    State(state): State<AppState>,
    Path(certificate_number): Path<String>,
) -> Result<Response, ApiError> {
    let record = certificates::find_record_by_number(state.db(), &certificate_number)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to verify certificate"))?;

    let Some(record) = record else {
        let body = CertificateVerification {
            valid: false,
            certificate_number,
            user_name: None,
            course_title: None,
            score: None,
            issue_date: None,
        };
        return Ok((StatusCode::NOT_FOUND, Json(body)).into_response());
    };

    let body = CertificateVerification {
        valid: true,
        certificate_number: record.certificate_number.clone(),
        user_name: Some(record.holder_name()),
        course_title: Some(record.course_title.clone()),
        score: Some(record.score),
        issue_date: Some(format_primitive(record.issue_date)),
    };
    Ok(Json(body).into_response())
}

async fn load_certificate_for(
    state: &AppState,
    user: &User,
    certificate_id: &str,
) -> Result<CertificateRecord, ApiError> {
    let record = certificates::find_record_by_id(state.db(), certificate_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load certificate"))?
        .ok_or_else(|| ApiError::NotFound("Certificate not found".to_string()))?;

    if record.user_id != user.id && !user.is_admin {
        return Err(ApiError::Forbidden("Not enough permissions"));
    }

    Ok(record)
}
