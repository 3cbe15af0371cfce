use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    routing::post,
    Json, Router,
};
use uuid::Uuid;
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::{require_course_membership, require_course_role, CurrentAdmin, CurrentUser};
use crate::core::state::AppState;
use crate::core::time::{format_primitive, primitive_now_utc};
use crate::db::types::{CourseRole, MembershipStatus};
use crate::repositories;
use crate::schemas::course::{
    CourseCreateRequest, CourseResponse, MembershipResponse, MembershipUpsertRequest,
};
use crate::schemas::flow::{FlowRevisionResponse, FlowSummaryResponse, PublishRevisionRequest};
use crate::services::flow_descriptor::FlowDescriptor;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_course))
        .route("/:course_id/memberships", post(upsert_membership))
        .route("/:course_id/flows/:flow_id", get(flow_summary))
        .route("/:course_id/flows/:flow_id/revisions", post(publish_revision))
}

async fn create_course(
    CurrentAdmin(admin): CurrentAdmin,
    State(state): State<AppState>,
    Json(payload): Json<CourseCreateRequest>,
) -> Result<(StatusCode, Json<CourseResponse>), ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let now = primitive_now_utc();
    let course = repositories::courses::create(
        state.db(),
        repositories::courses::CreateCourse {
            id: &Uuid::new_v4().to_string(),
            slug: &payload.slug,
            title: &payload.title,
            is_active: true,
            created_by: &admin.id,
            created_at: now,
            updated_at: now,
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to create course"))?;

    Ok((
        StatusCode::CREATED,
        Json(CourseResponse {
            id: course.id,
            slug: course.slug,
            title: course.title,
            is_active: course.is_active,
            created_by: course.created_by,
        }),
    ))
}

async fn upsert_membership(
    Path(course_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<MembershipUpsertRequest>,
) -> Result<Json<MembershipResponse>, ApiError> {
    require_course_role(&state, &user, &course_id, CourseRole::Instructor).await?;
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let course = repositories::courses::find_by_id(state.db(), &course_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch course"))?;
    if course.is_none() {
        return Err(ApiError::NotFound("Course not found".to_string()));
    }

    let member = repositories::users::find_by_id(state.db(), &payload.user_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch user"))?;
    if member.is_none() {
        return Err(ApiError::NotFound("User not found".to_string()));
    }

    let membership = repositories::course_memberships::upsert(
        state.db(),
        repositories::course_memberships::UpsertMembership {
            course_id: &course_id,
            user_id: &payload.user_id,
            role: payload.role,
            status: payload.status.unwrap_or(MembershipStatus::Active),
            joined_at: primitive_now_utc(),
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to update membership"))?;

    Ok(Json(MembershipResponse {
        id: membership.id,
        course_id: membership.course_id,
        user_id: membership.user_id,
        role: membership.role,
        status: membership.status,
    }))
}

async fn publish_revision(
    Path((course_id, flow_id)): Path<(String, String)>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<PublishRevisionRequest>,
) -> Result<(StatusCode, Json<FlowRevisionResponse>), ApiError> {
    require_course_role(&state, &user, &course_id, CourseRole::Instructor).await?;

    let course = repositories::courses::find_by_id(state.db(), &course_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch course"))?;
    if course.is_none() {
        return Err(ApiError::NotFound("Course not found".to_string()));
    }

    FlowDescriptor::parse(&payload.descriptor)
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let revision = Uuid::new_v4().simple().to_string();
    let created = repositories::flow_revisions::create(
        state.db(),
        repositories::flow_revisions::CreateFlowRevision {
            id: &Uuid::new_v4().to_string(),
            course_id: &course_id,
            flow_id: &flow_id,
            revision: &revision,
            descriptor: &payload.descriptor,
            created_by: &user.id,
            created_at: primitive_now_utc(),
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to publish flow revision"))?;

    tracing::info!(
        course_id = %course_id,
        flow_id = %flow_id,
        revision = %created.revision,
        action = "flow_revision_published",
        "Flow revision published"
    );

    Ok((
        StatusCode::CREATED,
        Json(FlowRevisionResponse {
            id: created.id,
            course_id: created.course_id,
            flow_id: created.flow_id,
            revision: created.revision,
            created_at: format_primitive(created.created_at),
        }),
    ))
}

async fn flow_summary(
    Path((course_id, flow_id)): Path<(String, String)>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<FlowSummaryResponse>, ApiError> {
    require_course_membership(&state, &user, &course_id).await?;

    let revision = repositories::flow_revisions::find_active(state.db(), &course_id, &flow_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch flow revision"))?;

    let Some(revision) = revision else {
        return Err(ApiError::NotFound("Flow not found".to_string()));
    };

    let descriptor = FlowDescriptor::parse(&revision.descriptor.0)
        .map_err(|e| ApiError::internal(e, "Stored flow descriptor is invalid"))?;

    Ok(Json(FlowSummaryResponse {
        flow_id: revision.flow_id,
        title: descriptor.title.clone(),
        revision: revision.revision,
        page_count: descriptor.pages.len(),
        page_titles: descriptor.pages.iter().map(|page| page.title().to_string()).collect(),
        opportunity_identifier: descriptor.opportunity_identifier(&flow_id).to_string(),
    }))
}
