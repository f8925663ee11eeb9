use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::time::format_primitive;
use crate::repositories::certificates::CertificateRecord;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerateCertificateRequest {
    #[validate(length(min = 1, message = "testAttemptId must not be empty"))]
    pub(crate) test_attempt_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CertificateResponse {
    pub(crate) id: String,
    pub(crate) certificate_number: String,
    pub(crate) course_title: String,
    pub(crate) user_name: String,
    pub(crate) score: i32,
    pub(crate) issue_date: String,
    pub(crate) is_emailed: bool,
    pub(crate) emailed_date: Option<String>,
    pub(crate) download_url: String,
}

impl From<CertificateRecord> for CertificateResponse {
    fn from(record: CertificateRecord) -> Self {
        Self {
            user_name: record.holder_name(),
            id: record.id,
            certificate_number: record.certificate_number,
            course_title: record.course_title,
            score: record.score,
            issue_date: format_primitive(record.issue_date),
            is_emailed: record.is_emailed,
            emailed_date: record.emailed_date.map(format_primitive),
            download_url: record.download_url,
        }
    }
}

/// Payload for the download endpoint. PDF rendering is out of scope, so
/// the endpoint returns the canonical facts a renderer needs.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CertificateDownloadResponse {
    pub(crate) certificate_number: String,
    pub(crate) user_name: String,
    pub(crate) course_title: String,
    pub(crate) score: i32,
    pub(crate) issue_date: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CertificateVerification {
    pub(crate) valid: bool,
    pub(crate) certificate_number: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) user_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) course_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) score: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) issue_date: Option<String>,
}
