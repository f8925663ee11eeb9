use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::PrimitiveDateTime;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct User {
    pub(crate) id: String,
    pub(crate) email: String,
    pub(crate) first_name: String,
    pub(crate) last_name: String,
    pub(crate) is_admin: bool,
    pub(crate) is_active: bool,
    pub(crate) created_at: PrimitiveDateTime,
}

impl User {
    pub(crate) fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Course {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) instructor_id: String,
    pub(crate) created_at: PrimitiveDateTime,
}

/// A quiz attached to a course. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct CourseTest {
    pub(crate) id: String,
    pub(crate) course_id: String,
    pub(crate) title: String,
    pub(crate) description: Option<String>,
    pub(crate) passing_score: i32,
    pub(crate) created_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct TestQuestion {
    pub(crate) id: String,
    pub(crate) test_id: String,
    pub(crate) question_text: String,
    pub(crate) order_index: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct QuestionOption {
    pub(crate) id: String,
    pub(crate) question_id: String,
    pub(crate) option_text: String,
    pub(crate) is_correct: bool,
    pub(crate) order_index: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Enrollment {
    pub(crate) id: String,
    pub(crate) user_id: String,
    pub(crate) course_id: String,
    pub(crate) is_completed: bool,
    pub(crate) completion_date: Option<PrimitiveDateTime>,
    pub(crate) enrolled_at: PrimitiveDateTime,
}

/// One graded submission of a test. Append-only: rows are never updated
/// or deleted by the submission workflow.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct TestAttempt {
    pub(crate) id: String,
    pub(crate) enrollment_id: String,
    pub(crate) test_id: String,
    pub(crate) attempt_date: PrimitiveDateTime,
    pub(crate) score: i32,
    pub(crate) is_passed: bool,
    pub(crate) total_questions: i32,
    pub(crate) correct_answers: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct UserAnswer {
    pub(crate) id: String,
    pub(crate) test_attempt_id: String,
    pub(crate) question_id: String,
    pub(crate) selected_option_id: Option<String>,
    pub(crate) is_correct: bool,
}

/// Proof-of-passing artifact. The score is a copy of the source attempt's
/// score at issuance time; only the emailed flag is ever updated.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Certificate {
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
}
