use axum::{
    extract::{Path, State},
    routing::post,
    Json, Router,
};
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentUser;
use crate::core::state::AppState;
use crate::core::time::{format_primitive, primitive_now_utc};
use crate::db::models::{Course, CourseTest, Enrollment, TestAttempt, User};
use crate::repositories::{attempts, certificates, courses, enrollments, tests, users};
use crate::schemas::attempt::{
    AttemptResponse, SubmitTestRequest, SubmittedAnswerPayload, TestResultResponse,
};
use crate::services::certificates::IssuedCertificate;
use crate::services::grading::{self, SubmittedAnswer};
use crate::services::notifications::{AttemptOutcome, CertificateDelivery};
use crate::services::{
    attempts as attempt_service, certificates as certificate_service, notifications,
};

pub(crate) fn router() -> Router<AppState> {
    Router::new().route("/:test_id/attempts", post(submit_test).get(list_attempts))
}

/// Grades a submission, records it, and runs the post-grade overlays
/// (certificate issuance and notifications). Overlay failures are logged
/// and never fail the request; the graded attempt is already durable by
/// the time they run.
async fn submit_test(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Path(test_id): Path<String>,
    Json(payload): Json<SubmitTestRequest>,
) -> Result<Json<TestResultResponse>, ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let (test, enrollment) = load_test_for_learner(&state, &user, &test_id).await?;
    let course = courses::find_by_id(state.db(), &test.course_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load course"))?
        .ok_or_else(|| ApiError::internal(&test.course_id, "Course missing for test"))?;

    let questions = tests::list_questions(state.db(), &test.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load test questions"))?;
    let options = tests::list_options_for_test(state.db(), &test.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load question options"))?;

    let question_set = grading::build_question_set(questions, options);
    let submitted = payload.answers.into_iter().map(into_submitted).collect();
    let outcome = grading::grade_submission(&question_set, submitted, test.passing_score);

    let attempt_date = primitive_now_utc();
    let attempt = attempt_service::record_attempt(
        state.db(),
        &enrollment.id,
        &test.id,
        attempt_date,
        &outcome,
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to record test attempt"))?;

    tracing::info!(
        attempt_id = %attempt.id,
        user_id = %user.id,
        test_id = %test.id,
        score = attempt.score,
        is_passed = attempt.is_passed,
        "Test attempt recorded"
    );

    run_post_grade_overlays(&state, &user, &course, &test, &attempt).await;

    let message = if attempt.is_passed {
        format!("Congratulations! You passed the test with a score of {}%.", attempt.score)
    } else {
        format!(
            "You scored {}% but didn't pass. The passing score is {}%.",
            attempt.score, test.passing_score
        )
    };

    Ok(Json(TestResultResponse {
        attempt_id: attempt.id,
        score: attempt.score,
        is_passed: attempt.is_passed,
        correct_answers: attempt.correct_answers,
        total_questions: attempt.total_questions,
        message,
        attempt_date: format_primitive(attempt.attempt_date),
    }))
}

async fn list_attempts(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Path(test_id): Path<String>,
) -> Result<Json<Vec<AttemptResponse>>, ApiError> {
    let (test, enrollment) = load_test_for_learner(&state, &user, &test_id).await?;

    let attempts = attempts::list_by_enrollment_and_test(state.db(), &enrollment.id, &test.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load attempts"))?;

    let mut response = Vec::with_capacity(attempts.len());
    for attempt in attempts {
        let answers = attempts::list_answers(state.db(), &attempt.id)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to load attempt answers"))?;
        response.push(AttemptResponse::from_attempt(attempt, answers));
    }

    Ok(Json(response))
}

async fn load_test_for_learner(
    state: &AppState,
    user: &User,
    test_id: &str,
) -> Result<(CourseTest, Enrollment), ApiError> {
    let test = tests::find_by_id(state.db(), test_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load test"))?
        .ok_or_else(|| ApiError::NotFound("Test not found".to_string()))?;

    let enrollment = enrollments::find_for_user_course(state.db(), &user.id, &test.course_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load enrollment"))?
        .ok_or(ApiError::Forbidden("You must be enrolled in the course to take the test"))?;

    Ok((test, enrollment))
}

fn into_submitted(payload: SubmittedAnswerPayload) -> SubmittedAnswer {
    SubmittedAnswer {
        question_id: payload.question_id,
        selected_option_id: payload.selected_option_id,
    }
}

/// Best-effort stage after the attempt is durable: certificate issuance
/// for passing attempts, then outcome emails.
async fn run_post_grade_overlays(
    state: &AppState,
    user: &User,
    course: &Course,
    test: &CourseTest,
    attempt: &TestAttempt,
) {
    let timeout = std::time::Duration::from_secs(state.settings().smtp().send_timeout_seconds);

    let issued = if attempt.is_passed {
        match certificate_service::issue_for_attempt(
            state.db(),
            attempt,
            &user.id,
            &course.id,
            state.settings().api(),
        )
        .await
        {
            Ok(issued) => Some(issued),
            Err(err) => {
                tracing::error!(error = %err, attempt_id = %attempt.id, "Certificate issuance failed");
                None
            }
        }
    } else {
        None
    };

    let instructor_email = match users::find_by_id(state.db(), &course.instructor_id).await {
        Ok(Some(instructor)) => Some(instructor.email),
        Ok(None) => None,
        Err(err) => {
            tracing::warn!(error = %err, course_id = %course.id, "Failed to load instructor");
            None
        }
    };

    let outcome = AttemptOutcome {
        learner_email: user.email.clone(),
        learner_name: user.full_name(),
        instructor_email,
        test_title: test.title.clone(),
        course_title: course.title.clone(),
        score: attempt.score,
        passing_score: test.passing_score,
        is_passed: attempt.is_passed,
        correct_answers: attempt.correct_answers,
        total_questions: attempt.total_questions,
    };
    notifications::dispatch_attempt_outcome(state.notifier(), timeout, &outcome).await;

    let Some(IssuedCertificate { certificate, newly_created: true }) = issued else {
        return;
    };
    let delivery = CertificateDelivery {
        recipient_email: user.email.clone(),
        recipient_name: user.full_name(),
        course_title: course.title.clone(),
        certificate_number: certificate.certificate_number.clone(),
        score: certificate.score,
        download_url: certificate.download_url.clone(),
    };
    match notifications::send_certificate_email(state.notifier(), timeout, &delivery).await {
        Ok(()) => {
            if let Err(err) =
                certificates::mark_emailed(state.db(), &certificate.id, primitive_now_utc()).await
            {
                tracing::warn!(error = %err, certificate_id = %certificate.id, "Failed to mark certificate emailed");
            }
        }
        Err(err) => {
            tracing::warn!(error = %err, certificate_id = %certificate.id, "Failed to send certificate email");
        }
    }
}

#[cfg(test)]
mod attempt_tests {
    use std::sync::Arc;

    use axum::http::{Method, StatusCode};
    use tower::ServiceExt;

    use crate::db::models::CourseTest;
    use crate::test_support::{self, FailingSender, TestContext};

    struct Seed {
        token: String,
        test: CourseTest,
        // (question_id, correct_option_id, wrong_option_id)
        questions: Vec<(String, String, String)>,
    }

    async fn seed_four_question_test(ctx: &TestContext) -> Seed {
        let db = ctx.state.db();
        let instructor = test_support::insert_user(db, "prof@example.com", false).await;
        let learner = test_support::insert_user(db, "learner@example.com", false).await;
        let course = test_support::insert_course(db, "Rust fundamentals", &instructor.id).await;
        test_support::insert_enrollment(db, &learner.id, &course.id).await;
        let test = test_support::insert_test(db, &course.id, 70).await;

        let mut questions = Vec::new();
        for index in 0..4 {
            questions.push(test_support::insert_question(db, &test.id, index).await);
        }

        let token = test_support::bearer_token(&learner.id, ctx.state.settings());
        Seed { token, test, questions }
    }

    fn submission_body(
        questions: &[(String, String, String)],
        correct_count: usize,
    ) -> serde_json::Value {
        let answers: Vec<serde_json::Value> = questions
            .iter()
            .enumerate()
            .map(|(index, (question_id, correct_id, wrong_id))| {
                let selected = if index < correct_count { correct_id } else { wrong_id };
                serde_json::json!({ "questionId": question_id, "selectedOptionId": selected })
            })
            .collect();
        serde_json::json!({ "answers": answers })
    }

    async fn submit(
        ctx: &TestContext,
        token: &str,
        test_id: &str,
        body: serde_json::Value,
    ) -> axum::response::Response {
        let request = test_support::json_request(
            Method::POST,
            &format!("/api/v1/tests/{test_id}/attempts"),
            Some(token),
            Some(body),
        );
        ctx.app.clone().oneshot(request).await.expect("response")
    }

    #[tokio::test]
    async fn three_of_four_passes_and_issues_a_certificate() {
        let Some(ctx) = test_support::setup_test_context().await else { return };
        let seed = seed_four_question_test(&ctx).await;

        let response =
            submit(&ctx, &seed.token, &seed.test.id, submission_body(&seed.questions, 3)).await;
        assert_eq!(response.status(), StatusCode::OK);

        let json = test_support::read_json(response).await;
        assert_eq!(json["score"], 75);
        assert_eq!(json["isPassed"], true);
        assert_eq!(json["correctAnswers"], 3);
        assert_eq!(json["totalQuestions"], 4);
        let attempt_id = json["attemptId"].as_str().expect("attempt id").to_string();

        let answer_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM user_answers WHERE test_attempt_id = $1")
                .bind(&attempt_id)
                .fetch_one(ctx.state.db())
                .await
                .expect("answer count");
        assert_eq!(answer_count, 4);

        let number: String = sqlx::query_scalar(
            "SELECT certificate_number FROM certificates WHERE test_attempt_id = $1",
        )
        .bind(&attempt_id)
        .fetch_one(ctx.state.db())
        .await
        .expect("certificate");
        assert!(number.starts_with("PC-"));
        assert_eq!(number.len(), "PC-YYYYMMDD-".len() + 8);
    }

    #[tokio::test]
    async fn unenrolled_learner_gets_403_and_no_attempt_is_recorded() {
        let Some(ctx) = test_support::setup_test_context().await else { return };
        let seed = seed_four_question_test(&ctx).await;

        let outsider = test_support::insert_user(ctx.state.db(), "other@example.com", false).await;
        let token = test_support::bearer_token(&outsider.id, ctx.state.settings());

        let response =
            submit(&ctx, &token, &seed.test.id, submission_body(&seed.questions, 4)).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let attempt_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM test_attempts")
            .fetch_one(ctx.state.db())
            .await
            .expect("attempt count");
        assert_eq!(attempt_count, 0);
    }

    #[tokio::test]
    async fn unknown_test_returns_404() {
        let Some(ctx) = test_support::setup_test_context().await else { return };
        let seed = seed_four_question_test(&ctx).await;

        let response =
            submit(&ctx, &seed.token, "no-such-test", submission_body(&seed.questions, 1)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn resubmission_appends_history_and_keeps_one_certificate() {
        let Some(ctx) = test_support::setup_test_context().await else { return };
        let seed = seed_four_question_test(&ctx).await;

        let first =
            submit(&ctx, &seed.token, &seed.test.id, submission_body(&seed.questions, 0)).await;
        assert_eq!(first.status(), StatusCode::OK);
        let first_json = test_support::read_json(first).await;
        assert_eq!(first_json["isPassed"], false);

        let second =
            submit(&ctx, &seed.token, &seed.test.id, submission_body(&seed.questions, 4)).await;
        assert_eq!(second.status(), StatusCode::OK);
        let second_json = test_support::read_json(second).await;
        assert_eq!(second_json["score"], 100);
        let second_attempt_id = second_json["attemptId"].as_str().expect("attempt id");

        let history = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::GET,
                &format!("/api/v1/tests/{}/attempts", seed.test.id),
                Some(seed.token.as_str()),
                None,
            ))
            .await
            .expect("history response");
        assert_eq!(history.status(), StatusCode::OK);
        let history_json = test_support::read_json(history).await;
        let entries = history_json.as_array().expect("history array");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0]["score"], 100);
        assert_eq!(entries[0]["answers"].as_array().expect("answers").len(), 4);

        let issued: Vec<String> =
            sqlx::query_scalar("SELECT test_attempt_id FROM certificates")
                .fetch_all(ctx.state.db())
                .await
                .expect("certificates");
        assert_eq!(issued, vec![second_attempt_id.to_string()]);
    }

    #[tokio::test]
    async fn failing_notifier_does_not_fail_the_submission() {
        let Some(ctx) =
            test_support::setup_test_context_with_sender(Arc::new(FailingSender)).await
        else {
            return;
        };
        let seed = seed_four_question_test(&ctx).await;

        let response =
            submit(&ctx, &seed.token, &seed.test.id, submission_body(&seed.questions, 4)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let json = test_support::read_json(response).await;
        assert_eq!(json["isPassed"], true);
        let attempt_id = json["attemptId"].as_str().expect("attempt id");

        let is_emailed: bool =
            sqlx::query_scalar("SELECT is_emailed FROM certificates WHERE test_attempt_id = $1")
                .bind(attempt_id)
                .fetch_one(ctx.state.db())
                .await
                .expect("certificate persisted");
        assert!(!is_emailed);
    }

    #[tokio::test]
    async fn unknown_question_ids_are_dropped_from_the_record() {
        let Some(ctx) = test_support::setup_test_context().await else { return };
        let seed = seed_four_question_test(&ctx).await;

        let (question_id, correct_id, _) = &seed.questions[0];
        let body = serde_json::json!({
            "answers": [
                { "questionId": question_id, "selectedOptionId": correct_id },
                { "questionId": "not-a-question", "selectedOptionId": correct_id },
            ]
        });
        let response = submit(&ctx, &seed.token, &seed.test.id, body).await;
        assert_eq!(response.status(), StatusCode::OK);
        let json = test_support::read_json(response).await;
        assert_eq!(json["score"], 25);
        let attempt_id = json["attemptId"].as_str().expect("attempt id");

        let answer_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM user_answers WHERE test_attempt_id = $1")
                .bind(attempt_id)
                .fetch_one(ctx.state.db())
                .await
                .expect("answer count");
        assert_eq!(answer_count, 1);
    }
}
