use sqlx::{FromRow, PgPool};
use time::PrimitiveDateTime;

use crate::db::models::Certificate;

const COLUMNS: &str = "\
    id, user_id, course_id, test_attempt_id, certificate_number, score, \
    issue_date, is_emailed, emailed_date, download_url";

// Certificate columns joined with holder and course context for responses.
const RECORD_COLUMNS: &str = "\
    c.id, c.user_id, c.course_id, c.test_attempt_id, c.certificate_number, c.score, \
    c.issue_date, c.is_emailed, c.emailed_date, c.download_url, \
    co.title AS course_title, u.first_name, u.last_name, u.email";

#[derive(Debug, Clone, FromRow)]
pub(crate) struct CertificateRecord {
    pub(crate) id: String,
    pub(crate) user_id: String,
    pub(crate) course_id: String,
    pub(crate) test_attempt_id: String,
    pub(crate) certificate_number: String,
    pub(crate) score: i32,
    pub(crate) issue_date: PrimitiveDateTime,
    pub(crate) is_emailed: bool,
    pub(crate) emailed_date: Option<PrimitiveDateTime>,
    pub(crate) download_url: String,
    pub(crate) course_title: String,
    pub(crate) first_name: String,
    pub(crate) last_name: String,
    pub(crate) email: String,
}

impl CertificateRecord {
    pub(crate) fn holder_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

pub(crate) struct CreateCertificate<'a> {
    pub id: &'a str,
    pub user_id: &'a str,
    pub course_id: &'a str,
    pub test_attempt_id: &'a str,
    pub certificate_number: &'a str,
    pub score: i32,
    pub issue_date: PrimitiveDateTime,
    pub download_url: &'a str,
}

/// Inserts a certificate unless one already exists for the attempt.
/// Returns `None` when the per-attempt unique constraint suppressed the
/// insert; a certificate-number collision still surfaces as an error.
pub(crate) async fn insert_if_absent(
    pool: &PgPool,
    params: CreateCertificate<'_>,
) -> Result<Option<Certificate>, sqlx::Error> {
    sqlx::query_as::<_, Certificate>(&format!(
        "INSERT INTO certificates (
            id, user_id, course_id, test_attempt_id, certificate_number,
            score, issue_date, is_emailed, download_url
        ) VALUES ($1,$2,$3,$4,$5,$6,$7,FALSE,$8)
        ON CONFLICT (test_attempt_id) DO NOTHING
        RETURNING {COLUMNS}",
    ))
    .bind(params.id)
    .bind(params.user_id)
    .bind(params.course_id)
    .bind(params.test_attempt_id)
    .bind(params.certificate_number)
    .bind(params.score)
    .bind(params.issue_date)
    .bind(params.download_url)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn find_by_attempt(
    pool: &PgPool,
    test_attempt_id: &str,
) -> Result<Option<Certificate>, sqlx::Error> {
    sqlx::query_as::<_, Certificate>(&format!(
        "SELECT {COLUMNS} FROM certificates WHERE test_attempt_id = $1"
    ))
    .bind(test_attempt_id)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn find_record_by_id(
    pool: &PgPool,
    id: &str,
) -> Result<Option<CertificateRecord>, sqlx::Error> {
    sqlx::query_as::<_, CertificateRecord>(&format!(
        "SELECT {RECORD_COLUMNS}
         FROM certificates c
         JOIN courses co ON co.id = c.course_id
         JOIN users u ON u.id = c.user_id
         WHERE c.id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn find_record_by_number(
    pool: &PgPool,
    certificate_number: &str,
) -> Result<Option<CertificateRecord>, sqlx::Error> {
    sqlx::query_as::<_, CertificateRecord>(&format!(
        "SELECT {RECORD_COLUMNS}
         FROM certificates c
         JOIN courses co ON co.id = c.course_id
         JOIN users u ON u.id = c.user_id
         WHERE c.certificate_number = $1"
    ))
    .bind(certificate_number)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn list_records_for_user(
    pool: &PgPool,
    user_id: &str,
) -> Result<Vec<CertificateRecord>, sqlx::Error> {
    sqlx::query_as::<_, CertificateRecord>(&format!(
        "SELECT {RECORD_COLUMNS}
         FROM certificates c
         JOIN courses co ON co.id = c.course_id
         JOIN users u ON u.id = c.user_id
         WHERE c.user_id = $1
         ORDER BY c.issue_date DESC"
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await
}

pub(crate) async fn list_records_for_user_course(
    pool: &PgPool,
    user_id: &str,
    course_id: &str,
) -> Result<Vec<CertificateRecord>, sqlx::Error> {
    sqlx::query_as::<_, CertificateRecord>(&format!(
        "SELECT {RECORD_COLUMNS}
         FROM certificates c
         JOIN courses co ON co.id = c.course_id
         JOIN users u ON u.id = c.user_id
         WHERE c.user_id = $1 AND c.course_id = $2
         ORDER BY c.issue_date DESC"
    ))
    .bind(user_id)
    .bind(course_id)
    .fetch_all(pool)
    .await
}

pub(crate) async fn mark_emailed(
    pool: &PgPool,
    id: &str,
    emailed_date: PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE certificates SET is_emailed = TRUE, emailed_date = $1 WHERE id = $2",
    )
    .bind(emailed_date)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}
