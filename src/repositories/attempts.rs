use sqlx::{PgConnection, PgPool};
use time::PrimitiveDateTime;

use crate::db::models::{TestAttempt, UserAnswer};

const COLUMNS: &str = "\
    id, enrollment_id, test_id, attempt_date, score, is_passed, \
    total_questions, correct_answers";

const ANSWER_COLUMNS: &str = "id, test_attempt_id, question_id, selected_option_id, is_correct";

pub(crate) struct CreateAttempt<'a> {
    pub id: &'a str,
    pub enrollment_id: &'a str,
    pub test_id: &'a str,
    pub attempt_date: PrimitiveDateTime,
    pub score: i32,
    pub is_passed: bool,
    pub total_questions: i32,
    pub correct_answers: i32,
}

pub(crate) async fn create(
    conn: &mut PgConnection,
    params: CreateAttempt<'_>,
) -> Result<TestAttempt, sqlx::Error> {
    sqlx::query_as::<_, TestAttempt>(&format!(
        "INSERT INTO test_attempts (
            id, enrollment_id, test_id, attempt_date, score, is_passed,
            total_questions, correct_answers
        ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8)
        RETURNING {COLUMNS}",
    ))
    .bind(params.id)
    .bind(params.enrollment_id)
    .bind(params.test_id)
    .bind(params.attempt_date)
    .bind(params.score)
    .bind(params.is_passed)
    .bind(params.total_questions)
    .bind(params.correct_answers)
    .fetch_one(conn)
    .await
}

pub(crate) struct CreateAnswer<'a> {
    pub id: &'a str,
    pub test_attempt_id: &'a str,
    pub question_id: &'a str,
    pub selected_option_id: Option<&'a str>,
    pub is_correct: bool,
}

pub(crate) async fn create_answer(
    conn: &mut PgConnection,
    params: CreateAnswer<'_>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO user_answers (id, test_attempt_id, question_id, selected_option_id, is_correct)
         VALUES ($1,$2,$3,$4,$5)",
    )
    .bind(params.id)
    .bind(params.test_attempt_id)
    .bind(params.question_id)
    .bind(params.selected_option_id)
    .bind(params.is_correct)
    .execute(conn)
    .await?;
    Ok(())
}

pub(crate) async fn find_by_id(
    pool: &PgPool,
    id: &str,
) -> Result<Option<TestAttempt>, sqlx::Error> {
    sqlx::query_as::<_, TestAttempt>(&format!(
        "SELECT {COLUMNS} FROM test_attempts WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn list_by_enrollment_and_test(
    pool: &PgPool,
    enrollment_id: &str,
    test_id: &str,
) -> Result<Vec<TestAttempt>, sqlx::Error> {
    sqlx::query_as::<_, TestAttempt>(&format!(
        "SELECT {COLUMNS} FROM test_attempts
         WHERE enrollment_id = $1 AND test_id = $2
         ORDER BY attempt_date DESC"
    ))
    .bind(enrollment_id)
    .bind(test_id)
    .fetch_all(pool)
    .await
}

pub(crate) async fn list_answers(
    pool: &PgPool,
    attempt_id: &str,
) -> Result<Vec<UserAnswer>, sqlx::Error> {
    sqlx::query_as::<_, UserAnswer>(&format!(
        "SELECT {ANSWER_COLUMNS} FROM user_answers WHERE test_attempt_id = $1"
    ))
    .bind(attempt_id)
    .fetch_all(pool)
    .await
}
