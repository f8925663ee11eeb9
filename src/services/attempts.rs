//! Persists a graded submission as one attempt plus its answer rows.

use sqlx::PgPool;
use time::PrimitiveDateTime;
use uuid::Uuid;

use crate::db::models::TestAttempt;
use crate::repositories::attempts;
use crate::services::grading::GradingOutcome;

/// Writes the attempt and all answer rows in a single transaction, so a
/// failed answer insert never leaves a dangling attempt.
pub(crate) async fn record_attempt(
    pool: &PgPool,
    enrollment_id: &str,
    test_id: &str,
    attempt_date: PrimitiveDateTime,
    outcome: &GradingOutcome,
) -> Result<TestAttempt, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let attempt = attempts::create(
        &mut *tx,
        attempts::CreateAttempt {
            id: &Uuid::new_v4().to_string(),
            enrollment_id,
            test_id,
            attempt_date,
            score: outcome.score,
            is_passed: outcome.is_passed,
            total_questions: outcome.total_questions,
            correct_answers: outcome.correct_answers,
        },
    )
    .await?;

    for answer in &outcome.answers {
        attempts::create_answer(
            &mut *tx,
            attempts::CreateAnswer {
                id: &Uuid::new_v4().to_string(),
                test_attempt_id: &attempt.id,
                question_id: &answer.question_id,
                selected_option_id: answer.selected_option_id.as_deref(),
                is_correct: answer.is_correct,
            },
        )
        .await?;
    }

    tx.commit().await?;

    Ok(attempt)
}
