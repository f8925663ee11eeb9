use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::db::models::{TestAttempt, UserAnswer};

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct SubmitTestRequest {
    #[validate(nested)]
    pub(crate) answers: Vec<SubmittedAnswerPayload>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SubmittedAnswerPayload {
    #[validate(length(min = 1, message = "questionId must not be empty"))]
    pub(crate) question_id: String,
    pub(crate) selected_option_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TestResultResponse {
    pub(crate) attempt_id: String,
    pub(crate) score: i32,
    pub(crate) is_passed: bool,
    pub(crate) correct_answers: i32,
    pub(crate) total_questions: i32,
    pub(crate) message: String,
    pub(crate) attempt_date: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AttemptResponse {
    pub(crate) id: String,
    pub(crate) test_id: String,
    pub(crate) attempt_date: String,
    pub(crate) score: i32,
    pub(crate) is_passed: bool,
    pub(crate) correct_answers: i32,
    pub(crate) total_questions: i32,
    pub(crate) answers: Vec<AnswerResponse>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AnswerResponse {
    pub(crate) question_id: String,
    pub(crate) selected_option_id: Option<String>,
    pub(crate) is_correct: bool,
}

impl AttemptResponse {
    pub(crate) fn from_attempt(attempt: TestAttempt, answers: Vec<UserAnswer>) -> Self {
        Self {
            id: attempt.id,
            test_id: attempt.test_id,
            attempt_date: crate::core::time::format_primitive(attempt.attempt_date),
            score: attempt.score,
            is_passed: attempt.is_passed,
            correct_answers: attempt.correct_answers,
            total_questions: attempt.total_questions,
            answers: answers
                .into_iter()
                .map(|answer| AnswerResponse {
                    question_id: answer.question_id,
                    selected_option_id: answer.selected_option_id,
                    is_correct: answer.is_correct,
                })
                .collect(),
        }
    }
}
