use serde::{Deserialize, Serialize};

use crate::core::time::format_primitive;
use crate::db::models::{FlowSession, GradingOpportunity, PageVisitGrade};
use crate::services::grading::FieldError;
use crate::services::page_types::{AnswerFeedback, Page};

/// The instructor's grading form submission. `score` is in points; an
/// absent score on an auto-gradable page keeps the machine correctness.
#[derive(Debug, Deserialize)]
pub(crate) struct GradeSubmissionRequest {
    #[serde(default)]
    pub(crate) score: Option<f64>,
    #[serde(default)]
    pub(crate) feedback_comment: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct GradingSessionView {
    pub(crate) id: String,
    pub(crate) participation_id: String,
    pub(crate) student_name: String,
    pub(crate) in_progress: bool,
    pub(crate) for_credit: bool,
    pub(crate) started_at: String,
    pub(crate) points: Option<f64>,
    pub(crate) max_points: Option<f64>,
}

impl GradingSessionView {
    pub(crate) fn new(session: &FlowSession, student_name: &str) -> Self {
        Self {
            id: session.id.clone(),
            participation_id: session.participation_id.clone(),
            student_name: student_name.to_string(),
            in_progress: session.in_progress,
            for_credit: session.for_credit,
            started_at: format_primitive(session.started_at),
            points: session.points,
            max_points: session.max_points,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct GradingPageView {
    pub(crate) ordinal: i32,
    pub(crate) kind: &'static str,
    pub(crate) title: String,
    pub(crate) body: String,
    pub(crate) expects_answer: bool,
    pub(crate) max_points: Option<f64>,
}

impl GradingPageView {
    pub(crate) fn new(ordinal: i32, page: &Page) -> Self {
        Self {
            ordinal,
            kind: page.kind(),
            title: page.title().to_string(),
            body: page.body().to_string(),
            expects_answer: page.expects_answer(),
            max_points: page.expects_answer().then(|| page.max_points()),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct VisitGradeView {
    pub(crate) id: String,
    pub(crate) grader_id: Option<String>,
    pub(crate) graded_at_revision: String,
    pub(crate) grade_data: Option<serde_json::Value>,
    pub(crate) max_points: f64,
    pub(crate) correctness: Option<f64>,
    pub(crate) points_awarded: Option<f64>,
    pub(crate) feedback: Option<AnswerFeedback>,
    pub(crate) created_at: String,
}

impl From<&PageVisitGrade> for VisitGradeView {
    fn from(grade: &PageVisitGrade) -> Self {
        Self {
            id: grade.id.clone(),
            grader_id: grade.grader_id.clone(),
            graded_at_revision: grade.graded_at_revision.clone(),
            grade_data: grade.grade_data.as_ref().map(|data| data.0.clone()),
            max_points: grade.max_points,
            correctness: grade.correctness,
            points_awarded: grade.points_awarded(),
            feedback: grade
                .feedback
                .as_ref()
                .and_then(|feedback| AnswerFeedback::from_json(&feedback.0)),
            created_at: format_primitive(grade.created_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct GradingOpportunityView {
    pub(crate) identifier: String,
    pub(crate) name: String,
}

impl From<&GradingOpportunity> for GradingOpportunityView {
    fn from(opportunity: &GradingOpportunity) -> Self {
        Self { identifier: opportunity.identifier.clone(), name: opportunity.name.clone() }
    }
}

/// The grading form as it should be rendered: current values plus any
/// validation errors from the last submission attempt.
#[derive(Debug, Serialize)]
pub(crate) struct GradingFormView {
    pub(crate) score: Option<f64>,
    pub(crate) feedback_comment: Option<String>,
    pub(crate) errors: Vec<FieldError>,
}

#[derive(Debug, Serialize)]
pub(crate) struct GradingPageResponse {
    pub(crate) flow_id: String,
    pub(crate) flow_title: String,
    pub(crate) session: GradingSessionView,
    pub(crate) page: GradingPageView,
    pub(crate) answer: Option<serde_json::Value>,
    pub(crate) grade: Option<VisitGradeView>,
    /// Full regrade history for the visit, oldest first. The last entry is
    /// the authoritative grade.
    pub(crate) grade_history: Vec<VisitGradeView>,
    pub(crate) grading_opportunity: GradingOpportunityView,
    pub(crate) prev_session_id: Option<String>,
    pub(crate) next_session_id: Option<String>,
    /// None when the page has no submitted answer to grade.
    pub(crate) grading_form: Option<GradingFormView>,
}
