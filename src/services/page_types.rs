use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::services::grading::{FieldError, GradingError};

/// One page of a flow, as published in the flow descriptor. The set of page
/// types is closed; behavior is dispatched on the variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum Page {
    Static {
        title: String,
        body: String,
    },
    ChoiceQuestion {
        title: String,
        body: String,
        choices: Vec<String>,
        correct_choice: usize,
        max_points: f64,
    },
    TextQuestion {
        title: String,
        body: String,
        answers: Vec<String>,
        max_points: f64,
    },
    HumanTextQuestion {
        title: String,
        body: String,
        max_points: f64,
        #[serde(default)]
        rubric: Option<String>,
    },
}

/// Correctness and commentary attached to one grade record; round-trips
/// through the stored feedback JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct AnswerFeedback {
    pub(crate) correctness: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) comment: Option<String>,
}

impl AnswerFeedback {
    pub(crate) fn from_json(value: &Value) -> Option<Self> {
        serde_json::from_value(value.clone()).ok()
    }

    pub(crate) fn as_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Instructor-entered grading form values. `score` is in points, not a
/// fraction; correctness is derived against the page's max_points.
#[derive(Debug, Clone, Default)]
pub(crate) struct GradeInput {
    pub(crate) score: Option<f64>,
    pub(crate) feedback_comment: Option<String>,
}

#[derive(Debug)]
pub(crate) struct HumanGradeOutcome {
    pub(crate) grade_data: Value,
    pub(crate) feedback: AnswerFeedback,
}

impl Page {
    pub(crate) fn title(&self) -> &str {
        match self {
            Page::Static { title, .. }
            | Page::ChoiceQuestion { title, .. }
            | Page::TextQuestion { title, .. }
            | Page::HumanTextQuestion { title, .. } => title,
        }
    }

    pub(crate) fn body(&self) -> &str {
        match self {
            Page::Static { body, .. }
            | Page::ChoiceQuestion { body, .. }
            | Page::TextQuestion { body, .. }
            | Page::HumanTextQuestion { body, .. } => body,
        }
    }

    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Page::Static { .. } => "static",
            Page::ChoiceQuestion { .. } => "choice_question",
            Page::TextQuestion { .. } => "text_question",
            Page::HumanTextQuestion { .. } => "human_text_question",
        }
    }

    pub(crate) fn expects_answer(&self) -> bool {
        !matches!(self, Page::Static { .. })
    }

    pub(crate) fn is_auto_gradable(&self) -> bool {
        matches!(self, Page::ChoiceQuestion { .. } | Page::TextQuestion { .. })
    }

    pub(crate) fn max_points(&self) -> f64 {
        match self {
            Page::Static { .. } => 0.0,
            Page::ChoiceQuestion { max_points, .. }
            | Page::TextQuestion { max_points, .. }
            | Page::HumanTextQuestion { max_points, .. } => *max_points,
        }
    }

    /// Structural checks beyond what deserialization enforces. Run once at
    /// publish time so grading can rely on a well-formed page.
    pub(crate) fn validate(&self) -> Result<(), String> {
        match self {
            Page::Static { .. } => Ok(()),
            Page::ChoiceQuestion { choices, correct_choice, max_points, .. } => {
                if choices.is_empty() {
                    return Err("choice_question must define at least one choice".to_string());
                }
                if *correct_choice >= choices.len() {
                    return Err(format!(
                        "correct_choice {correct_choice} is out of range for {} choices",
                        choices.len()
                    ));
                }
                validate_max_points(*max_points)
            }
            Page::TextQuestion { answers, max_points, .. } => {
                if answers.is_empty() {
                    return Err("text_question must define at least one accepted answer".to_string());
                }
                validate_max_points(*max_points)
            }
            Page::HumanTextQuestion { max_points, .. } => validate_max_points(*max_points),
        }
    }

    /// Machine scoring of a stored answer. None for pages that only a human
    /// can grade (or that expect no answer at all).
    pub(crate) fn grade_by_machine(&self, answer: &Value) -> Option<AnswerFeedback> {
        match self {
            Page::ChoiceQuestion { correct_choice, .. } => {
                let chosen = answer.get("choice").and_then(Value::as_u64).map(|v| v as usize);
                let correct = chosen == Some(*correct_choice);
                Some(AnswerFeedback {
                    correctness: Some(if correct { 1.0 } else { 0.0 }),
                    comment: None,
                })
            }
            Page::TextQuestion { answers, .. } => {
                let given = answer.get("text").and_then(Value::as_str).unwrap_or("");
                let normalized = normalize_text_answer(given);
                let correct =
                    answers.iter().any(|accepted| normalize_text_answer(accepted) == normalized);
                Some(AnswerFeedback {
                    correctness: Some(if correct { 1.0 } else { 0.0 }),
                    comment: None,
                })
            }
            Page::Static { .. } | Page::HumanTextQuestion { .. } => None,
        }
    }

    /// Turn an instructor's grading form into grade data and feedback. For
    /// auto-gradable pages an empty score preserves the prior (machine)
    /// correctness; a present score overrides it.
    pub(crate) fn grade_by_human(
        &self,
        prior_correctness: Option<f64>,
        input: &GradeInput,
    ) -> Result<HumanGradeOutcome, GradingError> {
        if !self.expects_answer() {
            return Err(GradingError::NothingToGrade);
        }

        let max_points = self.max_points();
        let mut errors = Vec::new();

        let correctness = match input.score {
            Some(score) if !score.is_finite() => {
                errors.push(FieldError::new("score", "score must be a finite number"));
                None
            }
            Some(score) if score < 0.0 => {
                errors.push(FieldError::new("score", "score must not be negative"));
                None
            }
            Some(score) if score > max_points => {
                errors.push(FieldError::new(
                    "score",
                    format!("score must not exceed the page maximum of {max_points}"),
                ));
                None
            }
            Some(score) => Some(score / max_points),
            None if self.is_auto_gradable() => prior_correctness,
            None => {
                errors.push(FieldError::new("score", "score is required for this page"));
                None
            }
        };

        if !errors.is_empty() {
            return Err(GradingError::Validation(errors));
        }

        let grade_data = serde_json::json!({
            "score": input.score,
            "feedback_comment": input.feedback_comment,
        });
        let feedback =
            AnswerFeedback { correctness, comment: input.feedback_comment.clone() };

        Ok(HumanGradeOutcome { grade_data, feedback })
    }
}

fn validate_max_points(max_points: f64) -> Result<(), String> {
    if max_points.is_finite() && max_points > 0.0 {
        Ok(())
    } else {
        Err(format!("max_points must be positive, got {max_points}"))
    }
}

fn normalize_text_answer(text: &str) -> String {
    text.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn choice_page() -> Page {
        Page::ChoiceQuestion {
            title: "Pick one".to_string(),
            body: "Which is prime?".to_string(),
            choices: vec!["4".to_string(), "7".to_string(), "9".to_string()],
            correct_choice: 1,
            max_points: 10.0,
        }
    }

    fn human_page() -> Page {
        Page::HumanTextQuestion {
            title: "Essay".to_string(),
            body: "Explain.".to_string(),
            max_points: 20.0,
            rubric: None,
        }
    }

    #[test]
    fn page_descriptor_roundtrip() {
        let value = json!({
            "type": "text_question",
            "title": "Capital",
            "body": "Capital of France?",
            "answers": ["Paris"],
            "max_points": 5.0
        });
        let page: Page = serde_json::from_value(value).expect("parse page");
        assert!(page.expects_answer());
        assert!(page.is_auto_gradable());
        assert_eq!(page.max_points(), 5.0);
        assert_eq!(page.kind(), "text_question");
    }

    #[test]
    fn unknown_page_type_is_rejected() {
        let value = json!({"type": "video", "title": "t", "body": "b"});
        assert!(serde_json::from_value::<Page>(value).is_err());
    }

    #[test]
    fn validate_rejects_out_of_range_correct_choice() {
        let page = Page::ChoiceQuestion {
            title: "t".to_string(),
            body: "b".to_string(),
            choices: vec!["a".to_string()],
            correct_choice: 3,
            max_points: 1.0,
        };
        assert!(page.validate().is_err());
    }

    #[test]
    fn validate_rejects_nonpositive_max_points() {
        let page = Page::HumanTextQuestion {
            title: "t".to_string(),
            body: "b".to_string(),
            max_points: 0.0,
            rubric: None,
        };
        assert!(page.validate().is_err());
    }

    #[test]
    fn machine_grades_choice_answers() {
        let page = choice_page();
        let right = page.grade_by_machine(&json!({"choice": 1})).expect("feedback");
        assert_eq!(right.correctness, Some(1.0));

        let wrong = page.grade_by_machine(&json!({"choice": 0})).expect("feedback");
        assert_eq!(wrong.correctness, Some(0.0));

        let missing = page.grade_by_machine(&json!({})).expect("feedback");
        assert_eq!(missing.correctness, Some(0.0));
    }

    #[test]
    fn machine_grades_text_answers_case_insensitively() {
        let page = Page::TextQuestion {
            title: "t".to_string(),
            body: "b".to_string(),
            answers: vec!["Paris".to_string()],
            max_points: 5.0,
        };
        let feedback = page.grade_by_machine(&json!({"text": "  paris "})).expect("feedback");
        assert_eq!(feedback.correctness, Some(1.0));
    }

    #[test]
    fn machine_grading_is_unavailable_for_human_pages() {
        assert!(human_page().grade_by_machine(&json!({"text": "essay"})).is_none());
    }

    #[test]
    fn human_grade_derives_correctness_from_score() {
        let input = GradeInput { score: Some(15.0), feedback_comment: Some("good".to_string()) };
        let outcome = human_page().grade_by_human(None, &input).expect("outcome");
        assert_eq!(outcome.feedback.correctness, Some(0.75));
        assert_eq!(outcome.feedback.comment.as_deref(), Some("good"));
        assert_eq!(outcome.grade_data["score"], json!(15.0));
    }

    #[test]
    fn human_grade_rejects_score_above_max() {
        let input = GradeInput { score: Some(21.0), feedback_comment: None };
        match human_page().grade_by_human(None, &input) {
            Err(GradingError::Validation(errors)) => {
                assert_eq!(errors.len(), 1);
                assert_eq!(errors[0].field, "score");
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn human_grade_rejects_negative_score() {
        let input = GradeInput { score: Some(-1.0), feedback_comment: None };
        assert!(matches!(
            human_page().grade_by_human(None, &input),
            Err(GradingError::Validation(_))
        ));
    }

    #[test]
    fn human_grade_requires_score_for_human_pages() {
        let input = GradeInput::default();
        assert!(matches!(
            human_page().grade_by_human(None, &input),
            Err(GradingError::Validation(_))
        ));
    }

    #[test]
    fn empty_score_preserves_machine_correctness_on_auto_pages() {
        let input = GradeInput { score: None, feedback_comment: Some("checked".to_string()) };
        let outcome = choice_page().grade_by_human(Some(1.0), &input).expect("outcome");
        assert_eq!(outcome.feedback.correctness, Some(1.0));
    }

    #[test]
    fn present_score_overrides_machine_correctness() {
        let input = GradeInput { score: Some(5.0), feedback_comment: None };
        let outcome = choice_page().grade_by_human(Some(1.0), &input).expect("outcome");
        assert_eq!(outcome.feedback.correctness, Some(0.5));
    }

    #[test]
    fn static_pages_cannot_be_graded() {
        let page = Page::Static { title: "t".to_string(), body: "b".to_string() };
        let input = GradeInput { score: Some(1.0), feedback_comment: None };
        assert!(matches!(
            page.grade_by_human(None, &input),
            Err(GradingError::NothingToGrade)
        ));
    }

    #[test]
    fn feedback_roundtrips_through_json() {
        let feedback =
            AnswerFeedback { correctness: Some(0.5), comment: Some("half".to_string()) };
        let restored = AnswerFeedback::from_json(&feedback.as_json()).expect("roundtrip");
        assert_eq!(restored, feedback);
    }
}
