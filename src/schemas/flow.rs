use serde::{Deserialize, Serialize};

use crate::db::models::FlowSession;

#[derive(Debug, Deserialize)]
pub(crate) struct PublishRevisionRequest {
    pub(crate) descriptor: serde_json::Value,
}

#[derive(Debug, Serialize)]
pub(crate) struct FlowRevisionResponse {
    pub(crate) id: String,
    pub(crate) course_id: String,
    pub(crate) flow_id: String,
    pub(crate) revision: String,
    pub(crate) created_at: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct FlowSummaryResponse {
    pub(crate) flow_id: String,
    pub(crate) title: String,
    pub(crate) revision: String,
    pub(crate) page_count: usize,
    pub(crate) page_titles: Vec<String>,
    pub(crate) opportunity_identifier: String,
}

#[derive(Debug, Deserialize, Default)]
pub(crate) struct StartSessionRequest {
    #[serde(default)]
    pub(crate) for_credit: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct FlowSessionResponse {
    pub(crate) id: String,
    pub(crate) course_id: String,
    pub(crate) flow_id: String,
    pub(crate) participation_id: String,
    pub(crate) revision: String,
    pub(crate) in_progress: bool,
    pub(crate) for_credit: bool,
    pub(crate) started_at: String,
    pub(crate) completed_at: Option<String>,
    pub(crate) points: Option<f64>,
    pub(crate) max_points: Option<f64>,
}

impl From<&FlowSession> for FlowSessionResponse {
    fn from(session: &FlowSession) -> Self {
        use crate::core::time::format_primitive;

        Self {
            id: session.id.clone(),
            course_id: session.course_id.clone(),
            flow_id: session.flow_id.clone(),
            participation_id: session.participation_id.clone(),
            revision: session.revision.clone(),
            in_progress: session.in_progress,
            for_credit: session.for_credit,
            started_at: format_primitive(session.started_at),
            completed_at: session.completed_at.map(format_primitive),
            points: session.points,
            max_points: session.max_points,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct SubmitAnswerRequest {
    pub(crate) answer: serde_json::Value,
}

#[derive(Debug, Serialize)]
pub(crate) struct StudentPageResponse {
    pub(crate) ordinal: i32,
    pub(crate) kind: &'static str,
    pub(crate) title: String,
    pub(crate) body: String,
    pub(crate) expects_answer: bool,
    pub(crate) max_points: Option<f64>,
    pub(crate) answer: Option<serde_json::Value>,
    /// Grade feedback is withheld while the session is still in progress.
    pub(crate) correctness: Option<f64>,
    pub(crate) points_awarded: Option<f64>,
    pub(crate) feedback_comment: Option<String>,
}
