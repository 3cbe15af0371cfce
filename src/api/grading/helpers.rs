use serde_json::Value;

use crate::api::errors::ApiError;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::models::FlowSession;
use crate::repositories;
use crate::schemas::grading::{
    GradingFormView, GradingOpportunityView, GradingPageResponse, GradingPageView,
    GradingSessionView, VisitGradeView,
};
use crate::services::flow_descriptor::FlowDescriptor;
use crate::services::page_types::Page;

/// Previous/next ids around `current` in an already-ordered sibling list.
pub(super) fn neighbors(ids: &[String], current: &str) -> (Option<String>, Option<String>) {
    let Some(index) = ids.iter().position(|id| id == current) else {
        return (None, None);
    };

    let prev = index.checked_sub(1).map(|i| ids[i].clone());
    let next = ids.get(index + 1).cloned();
    (prev, next)
}

/// Grading-form values stored in a grade's grade_data, for redisplay.
pub(super) fn form_values_from_grade_data(
    grade_data: Option<&Value>,
) -> (Option<f64>, Option<String>) {
    let Some(data) = grade_data else {
        return (None, None);
    };

    let score = data.get("score").and_then(Value::as_f64);
    let feedback_comment = data
        .get("feedback_comment")
        .and_then(Value::as_str)
        .map(|comment| comment.to_string());
    (score, feedback_comment)
}

/// Assemble the full grading page render context: the reconstructed student
/// view, the authoritative grade, sibling navigation, and the grading form
/// (pass `form_override` to re-render a rejected submission).
pub(super) async fn build_context(
    state: &AppState,
    session: &FlowSession,
    descriptor: &FlowDescriptor,
    ordinal: i32,
    page: &Page,
    form_override: Option<GradingFormView>,
) -> Result<GradingPageResponse, ApiError> {
    let student = repositories::users::find_by_id(state.db(), &session.participation_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch session participant"))?
        .ok_or_else(|| ApiError::Internal("Session participant is missing".to_string()))?;

    let answer_visit =
        repositories::page_visits::latest_answer_visit(state.db(), &session.id, ordinal)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to fetch answer"))?;

    let (grade, grade_history) = match &answer_visit {
        Some(visit) => {
            let history = repositories::visit_grades::list_for_visit(state.db(), &visit.id)
                .await
                .map_err(|e| ApiError::internal(e, "Failed to fetch grade history"))?;
            (history.last().cloned(), history)
        }
        None => (None, Vec::new()),
    };

    let opportunity = repositories::grading_opportunities::get_or_create(
        state.db(),
        &session.course_id,
        &session.flow_id,
        descriptor.opportunity_identifier(&session.flow_id),
        &descriptor.title,
        primitive_now_utc(),
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to resolve grading opportunity"))?;

    let siblings = repositories::flow_sessions::list_sibling_ids(
        state.db(),
        &session.course_id,
        &session.flow_id,
        session.in_progress,
        session.for_credit,
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to list sibling sessions"))?;
    let (prev_session_id, next_session_id) = neighbors(&siblings, &session.id);

    let grading_form = if page.expects_answer() && answer_visit.is_some() {
        Some(form_override.unwrap_or_else(|| {
            let (score, feedback_comment) = form_values_from_grade_data(
                grade
                    .as_ref()
                    .and_then(|grade| grade.grade_data.as_ref())
                    .map(|data| &data.0),
            );
            GradingFormView { score, feedback_comment, errors: Vec::new() }
        }))
    } else {
        None
    };

    Ok(GradingPageResponse {
        flow_id: session.flow_id.clone(),
        flow_title: descriptor.title.clone(),
        session: GradingSessionView::new(session, &student.full_name),
        page: GradingPageView::new(ordinal, page),
        answer: answer_visit.and_then(|visit| visit.answer.map(|answer| answer.0)),
        grade: grade.as_ref().map(VisitGradeView::from),
        grade_history: grade_history.iter().map(VisitGradeView::from).collect(),
        grading_opportunity: GradingOpportunityView::from(&opportunity),
        prev_session_id,
        next_session_id,
        grading_form,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn neighbors_in_the_middle() {
        let list = ids(&["a", "b", "c"]);
        assert_eq!(neighbors(&list, "b"), (Some("a".to_string()), Some("c".to_string())));
    }

    #[test]
    fn neighbors_at_the_edges() {
        let list = ids(&["a", "b", "c"]);
        assert_eq!(neighbors(&list, "a"), (None, Some("b".to_string())));
        assert_eq!(neighbors(&list, "c"), (Some("b".to_string()), None));
    }

    #[test]
    fn neighbors_of_single_or_missing_session() {
        let list = ids(&["only"]);
        assert_eq!(neighbors(&list, "only"), (None, None));
        assert_eq!(neighbors(&list, "absent"), (None, None));
    }

    #[test]
    fn form_values_read_stored_grade_data() {
        let data = json!({"score": 7.5, "feedback_comment": "solid work"});
        let (score, comment) = form_values_from_grade_data(Some(&data));
        assert_eq!(score, Some(7.5));
        assert_eq!(comment.as_deref(), Some("solid work"));
    }

    #[test]
    fn form_values_tolerate_missing_fields() {
        let data = json!({"score": null});
        let (score, comment) = form_values_from_grade_data(Some(&data));
        assert_eq!(score, None);
        assert_eq!(comment, None);

        assert_eq!(form_values_from_grade_data(None), (None, None));
    }
}
