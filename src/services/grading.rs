//! Pure grading of a test submission against the question set.
//!
//! Grading never touches the database: callers load the questions and
//! options up front and get back a fully resolved outcome that the
//! recording stage persists verbatim.

use std::collections::{HashMap, HashSet};

use crate::db::models::{QuestionOption, TestQuestion};

/// One submitted (question, option) pair, already validated for shape.
#[derive(Debug, Clone)]
pub(crate) struct SubmittedAnswer {
    pub(crate) question_id: String,
    pub(crate) selected_option_id: Option<String>,
}

/// A question with its options, keyed for O(1) lookup during grading.
pub(crate) struct QuestionSet {
    questions: Vec<TestQuestion>,
    options_by_question: HashMap<String, Vec<QuestionOption>>,
}

impl QuestionSet {
    pub(crate) fn total_questions(&self) -> usize {
        self.questions.len()
    }

    fn contains(&self, question_id: &str) -> bool {
        self.questions.iter().any(|question| question.id == question_id)
    }

    fn correct_option_id(&self, question_id: &str) -> Option<&str> {
        self.options_by_question
            .get(question_id)?
            .iter()
            .find(|option| option.is_correct)
            .map(|option| option.id.as_str())
    }

    fn option_belongs(&self, question_id: &str, option_id: &str) -> bool {
        self.options_by_question
            .get(question_id)
            .is_some_and(|options| options.iter().any(|option| option.id == option_id))
    }
}

pub(crate) fn build_question_set(
    questions: Vec<TestQuestion>,
    options: Vec<QuestionOption>,
) -> QuestionSet {
    let mut options_by_question: HashMap<String, Vec<QuestionOption>> = HashMap::new();
    for option in options {
        options_by_question.entry(option.question_id.clone()).or_default().push(option);
    }
    QuestionSet { questions, options_by_question }
}

/// One answer as it will be persisted: the selected option is kept only
/// when it actually belongs to the question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct GradedAnswer {
    pub(crate) question_id: String,
    pub(crate) selected_option_id: Option<String>,
    pub(crate) is_correct: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct GradingOutcome {
    pub(crate) score: i32,
    pub(crate) is_passed: bool,
    pub(crate) correct_answers: i32,
    pub(crate) total_questions: i32,
    pub(crate) answers: Vec<GradedAnswer>,
}

/// Grades a submission. Pairs naming a question outside the set are
/// dropped; a pair with a missing or foreign option is recorded as
/// unanswered and incorrect. Duplicate pairs for one question each
/// produce an answer row, and each correct duplicate counts.
pub(crate) fn grade_submission(
    question_set: &QuestionSet,
    submitted: Vec<SubmittedAnswer>,
    passing_score: i32,
) -> GradingOutcome {
    let total_questions = question_set.total_questions() as i32;
    let mut correct_answers = 0i32;
    let mut answers = Vec::with_capacity(submitted.len());
    let mut seen_questions: HashSet<String> = HashSet::new();

    for answer in submitted {
        if !question_set.contains(&answer.question_id) {
            continue;
        }
        if !seen_questions.insert(answer.question_id.clone()) {
            tracing::debug!(question_id = %answer.question_id, "Duplicate answer for question");
        }

        let selected = answer
            .selected_option_id
            .filter(|option_id| question_set.option_belongs(&answer.question_id, option_id));
        let is_correct = match (&selected, question_set.correct_option_id(&answer.question_id)) {
            (Some(option_id), Some(correct_id)) => option_id.as_str() == correct_id,
            _ => false,
        };
        if is_correct {
            correct_answers += 1;
        }

        answers.push(GradedAnswer {
            question_id: answer.question_id,
            selected_option_id: selected,
            is_correct,
        });
    }

    // Ties round to even, so 12.5 scores 12 and 37.5 scores 38.
    let score = if total_questions == 0 {
        0
    } else {
        (f64::from(correct_answers) / f64::from(total_questions) * 100.0).round_ties_even() as i32
    };

    GradingOutcome {
        score,
        is_passed: score >= passing_score,
        correct_answers,
        total_questions,
        answers,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{QuestionOption, TestQuestion};

    fn question(id: &str) -> TestQuestion {
        TestQuestion {
            id: id.to_string(),
            test_id: "test-1".to_string(),
            question_text: format!("Question {id}"),
            order_index: 0,
        }
    }

    fn option(id: &str, question_id: &str, is_correct: bool) -> QuestionOption {
        QuestionOption {
            id: id.to_string(),
            question_id: question_id.to_string(),
            option_text: format!("Option {id}"),
            is_correct,
            order_index: 0,
        }
    }

    fn four_question_set() -> QuestionSet {
        let questions = vec![question("q1"), question("q2"), question("q3"), question("q4")];
        let options = vec![
            option("q1-a", "q1", true),
            option("q1-b", "q1", false),
            option("q2-a", "q2", true),
            option("q2-b", "q2", false),
            option("q3-a", "q3", true),
            option("q3-b", "q3", false),
            option("q4-a", "q4", true),
            option("q4-b", "q4", false),
        ];
        build_question_set(questions, options)
    }

    fn submitted(question_id: &str, option_id: Option<&str>) -> SubmittedAnswer {
        SubmittedAnswer {
            question_id: question_id.to_string(),
            selected_option_id: option_id.map(str::to_string),
        }
    }

    #[test]
    fn three_of_four_correct_scores_75_and_passes_at_70() {
        let set = four_question_set();
        let outcome = grade_submission(
            &set,
            vec![
                submitted("q1", Some("q1-a")),
                submitted("q2", Some("q2-a")),
                submitted("q3", Some("q3-a")),
                submitted("q4", Some("q4-b")),
            ],
            70,
        );
        assert_eq!(outcome.score, 75);
        assert!(outcome.is_passed);
        assert_eq!(outcome.correct_answers, 3);
        assert_eq!(outcome.total_questions, 4);
        assert_eq!(outcome.answers.len(), 4);
    }

    #[test]
    fn score_equal_to_passing_score_passes() {
        let questions = vec![question("q1"), question("q2")];
        let options = vec![
            option("q1-a", "q1", true),
            option("q2-a", "q2", true),
            option("q2-b", "q2", false),
        ];
        let set = build_question_set(questions, options);
        let outcome = grade_submission(
            &set,
            vec![submitted("q1", Some("q1-a")), submitted("q2", Some("q2-b"))],
            50,
        );
        assert_eq!(outcome.score, 50);
        assert!(outcome.is_passed);
    }

    #[test]
    fn empty_question_set_scores_zero_and_fails() {
        let set = build_question_set(Vec::new(), Vec::new());
        let outcome = grade_submission(&set, vec![submitted("ghost", Some("x"))], 70);
        assert_eq!(outcome.score, 0);
        assert!(!outcome.is_passed);
        assert_eq!(outcome.total_questions, 0);
        assert!(outcome.answers.is_empty());
    }

    #[test]
    fn empty_question_set_passes_when_passing_score_is_zero() {
        let set = build_question_set(Vec::new(), Vec::new());
        let outcome = grade_submission(&set, Vec::new(), 0);
        assert_eq!(outcome.score, 0);
        assert!(outcome.is_passed);
    }

    #[test]
    fn unknown_question_id_is_dropped_entirely() {
        let set = four_question_set();
        let outcome = grade_submission(
            &set,
            vec![submitted("q1", Some("q1-a")), submitted("not-a-question", Some("q2-a"))],
            70,
        );
        assert_eq!(outcome.answers.len(), 1);
        assert_eq!(outcome.answers[0].question_id, "q1");
        assert_eq!(outcome.correct_answers, 1);
    }

    #[test]
    fn missing_option_is_recorded_unanswered_and_incorrect() {
        let set = four_question_set();
        let outcome = grade_submission(&set, vec![submitted("q1", None)], 70);
        assert_eq!(
            outcome.answers,
            vec![GradedAnswer {
                question_id: "q1".to_string(),
                selected_option_id: None,
                is_correct: false,
            }]
        );
        assert_eq!(outcome.correct_answers, 0);
    }

    #[test]
    fn foreign_option_is_recorded_unanswered_and_incorrect() {
        let set = four_question_set();
        // q2-a exists but belongs to q2, not q1.
        let outcome = grade_submission(&set, vec![submitted("q1", Some("q2-a"))], 70);
        assert_eq!(outcome.answers.len(), 1);
        assert_eq!(outcome.answers[0].selected_option_id, None);
        assert!(!outcome.answers[0].is_correct);
    }

    #[test]
    fn duplicate_answers_each_produce_a_row_and_each_correct_counts() {
        let set = four_question_set();
        let outcome = grade_submission(
            &set,
            vec![submitted("q1", Some("q1-a")), submitted("q1", Some("q1-a"))],
            70,
        );
        assert_eq!(outcome.answers.len(), 2);
        assert_eq!(outcome.correct_answers, 2);
        // 2/4 rounds to 50.
        assert_eq!(outcome.score, 50);
    }

    #[test]
    fn score_rounds_ties_to_even() {
        let questions: Vec<TestQuestion> =
            (1..=8).map(|index| question(&format!("q{index}"))).collect();
        let mut options = Vec::new();
        for q in &questions {
            options.push(option(&format!("{}-a", q.id), &q.id, true));
            options.push(option(&format!("{}-b", q.id), &q.id, false));
        }
        let set = build_question_set(questions, options);

        // 1/8 = 12.5 rounds down to the even 12.
        let outcome = grade_submission(&set, vec![submitted("q1", Some("q1-a"))], 70);
        assert_eq!(outcome.score, 12);

        // 3/8 = 37.5 rounds up to the even 38.
        let outcome = grade_submission(
            &set,
            vec![
                submitted("q1", Some("q1-a")),
                submitted("q2", Some("q2-a")),
                submitted("q3", Some("q3-a")),
            ],
            70,
        );
        assert_eq!(outcome.score, 38);
    }

    #[test]
    fn exact_half_at_the_passing_boundary_fails() {
        let questions: Vec<TestQuestion> =
            (1..=8).map(|index| question(&format!("q{index}"))).collect();
        let mut options = Vec::new();
        for q in &questions {
            options.push(option(&format!("{}-a", q.id), &q.id, true));
            options.push(option(&format!("{}-b", q.id), &q.id, false));
        }
        let set = build_question_set(questions, options);

        // 1/8 with a passing score of 13: the tie resolves to 12, a fail.
        let outcome = grade_submission(&set, vec![submitted("q1", Some("q1-a"))], 13);
        assert_eq!(outcome.score, 12);
        assert!(!outcome.is_passed);
    }

    #[test]
    fn unsubmitted_questions_lower_the_score() {
        let set = four_question_set();
        let outcome = grade_submission(&set, vec![submitted("q1", Some("q1-a"))], 70);
        assert_eq!(outcome.score, 25);
        assert!(!outcome.is_passed);
        assert_eq!(outcome.answers.len(), 1);
    }

    #[test]
    fn question_without_correct_option_grades_incorrect() {
        let questions = vec![question("q1")];
        let options = vec![option("q1-a", "q1", false), option("q1-b", "q1", false)];
        let set = build_question_set(questions, options);
        let outcome = grade_submission(&set, vec![submitted("q1", Some("q1-a"))], 70);
        assert_eq!(outcome.answers[0].selected_option_id, Some("q1-a".to_string()));
        assert!(!outcome.answers[0].is_correct);
    }
}
