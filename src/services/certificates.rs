//! Certificate issuance for passing attempts.

use rand::Rng;
use sqlx::PgPool;
use time::PrimitiveDateTime;
use uuid::Uuid;

use crate::core::config::ApiSettings;
use crate::core::time::primitive_now_utc;
use crate::db::models::{Certificate, TestAttempt};
use crate::repositories::certificates;

const NUMBER_SUFFIX_LEN: usize = 8;
const NUMBER_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const MAX_NUMBER_RETRIES: u32 = 3;

/// Result of issuance: the certificate for the attempt, and whether this
/// call created it or found one already issued.
pub(crate) struct IssuedCertificate {
    pub(crate) certificate: Certificate,
    pub(crate) newly_created: bool,
}

/// Issues a certificate for a passed attempt. Idempotent per attempt: a
/// concurrent or repeated call returns the already issued certificate
/// instead of creating a second one. Certificate-number collisions are
/// retried with a fresh number.
pub(crate) async fn issue_for_attempt(
    pool: &PgPool,
    attempt: &TestAttempt,
    user_id: &str,
    course_id: &str,
    api: &ApiSettings,
) -> Result<IssuedCertificate, sqlx::Error> {
    if let Some(existing) = certificates::find_by_attempt(pool, &attempt.id).await? {
        return Ok(IssuedCertificate { certificate: existing, newly_created: false });
    }

    let issue_date = primitive_now_utc();
    let mut last_err: Option<sqlx::Error> = None;

    for _ in 0..MAX_NUMBER_RETRIES {
        let id = Uuid::new_v4().to_string();
        let certificate_number = generate_certificate_number(issue_date);
        let download_url = format!(
            "{}{}/certificates/{}/download",
            api.public_base_url, api.api_v1_str, id
        );

        let inserted = certificates::insert_if_absent(
            pool,
            certificates::CreateCertificate {
                id: &id,
                user_id,
                course_id,
                test_attempt_id: &attempt.id,
                certificate_number: &certificate_number,
                score: attempt.score,
                issue_date,
                download_url: &download_url,
            },
        )
        .await;

        match inserted {
            Ok(Some(certificate)) => {
                return Ok(IssuedCertificate { certificate, newly_created: true })
            }
            Ok(None) => {
                // Another submission for this attempt won the insert.
                if let Some(existing) = certificates::find_by_attempt(pool, &attempt.id).await? {
                    return Ok(IssuedCertificate { certificate: existing, newly_created: false });
                }
                return Err(sqlx::Error::RowNotFound);
            }
            Err(err) if is_number_collision(&err) => {
                tracing::warn!(%certificate_number, "Certificate number collision, retrying");
                last_err = Some(err);
            }
            Err(err) => return Err(err),
        }
    }

    Err(last_err.unwrap_or(sqlx::Error::RowNotFound))
}

fn is_number_collision(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err
            .constraint()
            .is_some_and(|name| name.contains("certificate_number")),
        _ => false,
    }
}

/// Builds a `PC-YYYYMMDD-XXXXXXXX` number with a random uppercase
/// alphanumeric suffix.
pub(crate) fn generate_certificate_number(issue_date: PrimitiveDateTime) -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..NUMBER_SUFFIX_LEN)
        .map(|_| NUMBER_ALPHABET[rng.gen_range(0..NUMBER_ALPHABET.len())] as char)
        .collect();
    format!(
        "PC-{:04}{:02}{:02}-{}",
        issue_date.year(),
        u8::from(issue_date.month()),
        issue_date.day(),
        suffix
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::test_support;

    #[tokio::test]
    async fn issuance_is_idempotent_per_attempt() {
        let Some(ctx) = test_support::setup_test_context().await else { return };
        let db = ctx.state.db();

        let instructor = test_support::insert_user(db, "prof@example.com", false).await;
        let learner = test_support::insert_user(db, "learner@example.com", false).await;
        let course = test_support::insert_course(db, "Rust fundamentals", &instructor.id).await;
        let enrollment = test_support::insert_enrollment(db, &learner.id, &course.id).await;
        let test = test_support::insert_test(db, &course.id, 70).await;
        let attempt =
            test_support::insert_attempt(db, &enrollment.id, &test.id, 100, true).await;

        let api = ctx.state.settings().api();

        let first = issue_for_attempt(db, &attempt, &learner.id, &course.id, api)
            .await
            .expect("first issuance");
        assert!(first.newly_created);
        assert_eq!(first.certificate.test_attempt_id, attempt.id);

        let second = issue_for_attempt(db, &attempt, &learner.id, &course.id, api)
            .await
            .expect("second issuance");
        assert!(!second.newly_created);
        assert_eq!(second.certificate.id, first.certificate.id);
        assert_eq!(second.certificate.certificate_number, first.certificate.certificate_number);
    }

    #[test]
    fn certificate_number_has_expected_shape() {
        let date = time::macros::datetime!(2026-08-26 12:00:00);
        let number = generate_certificate_number(date);
        assert_eq!(number.len(), "PC-20260826-".len() + NUMBER_SUFFIX_LEN);
        assert!(number.starts_with("PC-20260826-"));
        let suffix = &number["PC-20260826-".len()..];
        assert!(suffix.chars().all(|ch| ch.is_ascii_uppercase() || ch.is_ascii_digit()));
    }

    #[test]
    fn certificate_number_zero_pads_month_and_day() {
        let date = time::macros::datetime!(2026-01-05 00:00:00);
        let number = generate_certificate_number(date);
        assert!(number.starts_with("PC-20260105-"));
    }

    #[test]
    fn certificate_numbers_vary() {
        let date = time::macros::datetime!(2026-08-26 12:00:00);
        let first = generate_certificate_number(date);
        let second = generate_certificate_number(date);
        // Astronomically unlikely to collide with a 36^8 suffix space.
        assert_ne!(first, second);
    }
}
