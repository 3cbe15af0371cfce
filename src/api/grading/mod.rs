mod helpers;

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};

use crate::api::errors::ApiError;
use crate::api::guards::{require_grading_role, CurrentUser};
use crate::core::state::AppState;
use crate::db::models::FlowSession;
use crate::repositories;
use crate::schemas::grading::{GradeSubmissionRequest, GradingFormView, GradingPageResponse};
use crate::services::flow_descriptor::FlowDescriptor;
use crate::services::grading::{self, GradingError, RecordGrade};
use crate::services::page_types::{GradeInput, Page};

pub(crate) fn router() -> Router<AppState> {
    Router::new().route(
        "/:course_id/grading/sessions/:session_id/pages/:ordinal",
        get(get_grading_page).post(post_grade),
    )
}

async fn get_grading_page(
    Path((course_id, session_id, ordinal)): Path<(String, String, i32)>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<GradingPageResponse>, ApiError> {
    require_grading_role(&state, &user, &course_id).await?;

    let (session, descriptor, page) =
        resolve_graded_page(&state, &course_id, &session_id, ordinal).await?;

    let context =
        helpers::build_context(&state, &session, &descriptor, ordinal, &page, None).await?;
    Ok(Json(context))
}

async fn post_grade(
    Path((course_id, session_id, ordinal)): Path<(String, String, i32)>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<GradeSubmissionRequest>,
) -> Result<Json<GradingPageResponse>, ApiError> {
    require_grading_role(&state, &user, &course_id).await?;

    let (session, descriptor, page) =
        resolve_graded_page(&state, &course_id, &session_id, ordinal).await?;

    if !page.expects_answer() {
        return Err(ApiError::BadRequest("Page does not expect an answer".to_string()));
    }

    let visit = repositories::page_visits::latest_answer_visit(state.db(), &session.id, ordinal)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch answer"))?;

    let Some(visit) = visit else {
        return Err(ApiError::BadRequest(
            "Nothing to grade: no submitted answer for this page".to_string(),
        ));
    };

    let prior = repositories::visit_grades::most_recent_for_visit(state.db(), &visit.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch prior grade"))?;
    let prior_correctness = prior.as_ref().and_then(|grade| grade.correctness);

    let input = GradeInput {
        score: payload.score,
        feedback_comment: payload.feedback_comment.clone(),
    };

    let outcome = match page.grade_by_human(prior_correctness, &input) {
        Ok(outcome) => outcome,
        Err(GradingError::Validation(errors)) => {
            // Recovered locally: re-render the form with the submitted
            // values and field errors; no grade row is written.
            let form = GradingFormView {
                score: payload.score,
                feedback_comment: payload.feedback_comment,
                errors,
            };
            let context =
                helpers::build_context(&state, &session, &descriptor, ordinal, &page, Some(form))
                    .await?;
            return Ok(Json(context));
        }
        Err(GradingError::NothingToGrade) => {
            return Err(ApiError::BadRequest("Page does not expect an answer".to_string()));
        }
        Err(other) => return Err(ApiError::internal(other, "Failed to compute feedback")),
    };

    grading::submit_page_grade(
        state.db(),
        &session,
        &descriptor,
        RecordGrade {
            visit_id: &visit.id,
            grader_id: Some(&user.id),
            graded_at_revision: &session.revision,
            grade_data: Some(&outcome.grade_data),
            max_points: page.max_points(),
            feedback: Some(&outcome.feedback),
        },
    )
    .await
    .map_err(|err| {
        let context = match &err {
            GradingError::MissingPolicy(_) => "Flow defines no grade aggregation policy",
            _ => "Failed to record grade",
        };
        ApiError::internal(err, context)
    })?;

    tracing::info!(
        grader_id = %user.id,
        course_id = %course_id,
        session_id = %session.id,
        ordinal,
        action = "page_grade_recorded",
        "Page grade recorded"
    );
    metrics::counter!(crate::core::metrics::GRADES_RECORDED).increment(1);

    // Re-read the session so the response carries the recomputed aggregate.
    let session = repositories::flow_sessions::find_in_course(state.db(), &course_id, &session_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch flow session"))?
        .ok_or_else(|| ApiError::Internal("Session missing after grading".to_string()))?;

    let context =
        helpers::build_context(&state, &session, &descriptor, ordinal, &page, None).await?;
    Ok(Json(context))
}

async fn resolve_graded_page(
    state: &AppState,
    course_id: &str,
    session_id: &str,
    ordinal: i32,
) -> Result<(FlowSession, FlowDescriptor, Page), ApiError> {
    let session = repositories::flow_sessions::find_in_course(state.db(), course_id, session_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch flow session"))?;

    let Some(session) = session else {
        return Err(ApiError::NotFound("Flow session not found".to_string()));
    };

    let revision = repositories::flow_revisions::find_by_revision(
        state.db(),
        course_id,
        &session.flow_id,
        &session.revision,
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to fetch flow revision"))?
    .ok_or_else(|| ApiError::Internal("Flow revision is missing for session".to_string()))?;

    let descriptor = FlowDescriptor::parse(&revision.descriptor.0)
        .map_err(|e| ApiError::internal(e, "Stored flow descriptor is invalid"))?;

    let Some(page) = descriptor.page(ordinal) else {
        return Err(ApiError::NotFound("Flow page not found".to_string()));
    };
    let page = page.clone();

    Ok((session, descriptor, page))
}
