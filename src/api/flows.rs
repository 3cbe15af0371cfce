use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    routing::post,
    Json, Router,
};
use uuid::Uuid;

use crate::api::errors::ApiError;
use crate::api::guards::{require_course_membership, CurrentUser};
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::models::FlowSession;
use crate::repositories;
use crate::schemas::flow::{
    FlowSessionResponse, StartSessionRequest, StudentPageResponse, SubmitAnswerRequest,
};
use crate::services::flow_descriptor::FlowDescriptor;
use crate::services::grading::{self, GradingError};
use crate::services::page_types::{AnswerFeedback, Page};

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/:course_id/flows/:flow_id/sessions", post(start_session))
        .route("/:course_id/sessions/:session_id/pages/:ordinal", get(view_page))
        .route("/:course_id/sessions/:session_id/pages/:ordinal/answer", post(submit_answer))
        .route("/:course_id/sessions/:session_id/finish", post(finish_session))
}

async fn start_session(
    Path((course_id, flow_id)): Path<(String, String)>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    payload: Option<Json<StartSessionRequest>>,
) -> Result<(StatusCode, Json<FlowSessionResponse>), ApiError> {
    require_course_membership(&state, &user, &course_id).await?;

    let revision = repositories::flow_revisions::find_active(state.db(), &course_id, &flow_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch flow revision"))?;

    let Some(revision) = revision else {
        return Err(ApiError::NotFound("Flow not found".to_string()));
    };

    let for_credit = payload.map(|Json(body)| body.for_credit).unwrap_or(false);
    let now = primitive_now_utc();
    let session = repositories::flow_sessions::create(
        state.db(),
        repositories::flow_sessions::CreateFlowSession {
            id: &Uuid::new_v4().to_string(),
            course_id: &course_id,
            flow_id: &flow_id,
            participation_id: &user.id,
            revision: &revision.revision,
            in_progress: true,
            for_credit,
            started_at: now,
            updated_at: now,
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to start flow session"))?;

    Ok((StatusCode::CREATED, Json(FlowSessionResponse::from(&session))))
}

async fn view_page(
    Path((course_id, session_id, ordinal)): Path<(String, String, i32)>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<StudentPageResponse>, ApiError> {
    require_course_membership(&state, &user, &course_id).await?;

    let (session, _descriptor, page) =
        resolve_owned_page(&state, &user.id, &course_id, &session_id, ordinal).await?;

    // Every rendering of a page is a visit; the answer rides on later ones.
    repositories::page_visits::create(
        state.db(),
        repositories::page_visits::CreatePageVisit {
            id: &Uuid::new_v4().to_string(),
            flow_session_id: &session.id,
            page_ordinal: ordinal,
            answer: None,
            visited_at: primitive_now_utc(),
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to record page visit"))?;

    let answer_visit =
        repositories::page_visits::latest_answer_visit(state.db(), &session.id, ordinal)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to fetch answer"))?;

    let grade = match (&answer_visit, session.in_progress) {
        (Some(visit), false) => {
            repositories::visit_grades::most_recent_for_visit(state.db(), &visit.id)
                .await
                .map_err(|e| ApiError::internal(e, "Failed to fetch grade"))?
        }
        _ => None,
    };

    let feedback_comment = grade
        .as_ref()
        .and_then(|grade| grade.feedback.as_ref())
        .and_then(|feedback| AnswerFeedback::from_json(&feedback.0))
        .and_then(|feedback| feedback.comment);

    Ok(Json(StudentPageResponse {
        ordinal,
        kind: page.kind(),
        title: page.title().to_string(),
        body: page.body().to_string(),
        expects_answer: page.expects_answer(),
        max_points: page.expects_answer().then(|| page.max_points()),
        answer: answer_visit.and_then(|visit| visit.answer.map(|answer| answer.0)),
        correctness: grade.as_ref().and_then(|grade| grade.correctness),
        points_awarded: grade.as_ref().and_then(|grade| grade.points_awarded()),
        feedback_comment,
    }))
}

async fn submit_answer(
    Path((course_id, session_id, ordinal)): Path<(String, String, i32)>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<SubmitAnswerRequest>,
) -> Result<Json<FlowSessionResponse>, ApiError> {
    require_course_membership(&state, &user, &course_id).await?;

    let (session, _descriptor, page) =
        resolve_owned_page(&state, &user.id, &course_id, &session_id, ordinal).await?;

    if !session.in_progress {
        return Err(ApiError::BadRequest("Session is no longer in progress".to_string()));
    }
    if !page.expects_answer() {
        return Err(ApiError::BadRequest("Page does not accept an answer".to_string()));
    }

    repositories::page_visits::create(
        state.db(),
        repositories::page_visits::CreatePageVisit {
            id: &Uuid::new_v4().to_string(),
            flow_session_id: &session.id,
            page_ordinal: ordinal,
            answer: Some(&payload.answer),
            visited_at: primitive_now_utc(),
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to store answer"))?;

    Ok(Json(FlowSessionResponse::from(&session)))
}

async fn finish_session(
    Path((course_id, session_id)): Path<(String, String)>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<FlowSessionResponse>, ApiError> {
    require_course_membership(&state, &user, &course_id).await?;

    let (session, descriptor) =
        resolve_owned_session(&state, &user.id, &course_id, &session_id).await?;

    if !session.in_progress {
        return Err(ApiError::BadRequest("Session is already finished".to_string()));
    }

    grading::finish_session(state.db(), &session, &descriptor).await.map_err(|err| {
        let context = match &err {
            GradingError::MissingPolicy(_) => "Flow defines no grade aggregation policy",
            _ => "Failed to finish flow session",
        };
        ApiError::internal(err, context)
    })?;

    let finished =
        repositories::flow_sessions::find_in_course(state.db(), &course_id, &session_id)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to fetch finished session"))?
            .ok_or_else(|| ApiError::Internal("Session missing after finish".to_string()))?;

    tracing::info!(
        session_id = %finished.id,
        course_id = %course_id,
        action = "flow_session_finished",
        "Flow session finished"
    );
    metrics::counter!(crate::core::metrics::SESSIONS_FINISHED).increment(1);

    Ok(Json(FlowSessionResponse::from(&finished)))
}

async fn resolve_owned_session(
    state: &AppState,
    user_id: &str,
    course_id: &str,
    session_id: &str,
) -> Result<(FlowSession, FlowDescriptor), ApiError> {
    let session = repositories::flow_sessions::find_in_course(state.db(), course_id, session_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch flow session"))?;

    let Some(session) = session else {
        return Err(ApiError::NotFound("Flow session not found".to_string()));
    };

    if session.participation_id != user_id {
        return Err(ApiError::Forbidden("Access denied"));
    }

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

    Ok((session, descriptor))
}

async fn resolve_owned_page(
    state: &AppState,
    user_id: &str,
    course_id: &str,
    session_id: &str,
    ordinal: i32,
) -> Result<(FlowSession, FlowDescriptor, Page), ApiError> {
    let (session, descriptor) =
        resolve_owned_session(state, user_id, course_id, session_id).await?;

    let Some(page) = descriptor.page(ordinal) else {
        return Err(ApiError::NotFound("Flow page not found".to_string()));
    };
    let page = page.clone();

    Ok((session, descriptor, page))
}
