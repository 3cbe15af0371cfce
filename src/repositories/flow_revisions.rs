use sqlx::PgPool;

use crate::db::models::FlowRevision;

const COLUMNS: &str = "id, course_id, flow_id, revision, descriptor, created_by, created_at";

/// The newest published revision for a flow; new sessions start under it.
pub(crate) async fn find_active(
    pool: &PgPool,
    course_id: &str,
    flow_id: &str,
) -> Result<Option<FlowRevision>, sqlx::Error> {
    sqlx::query_as::<_, FlowRevision>(&format!(
        "SELECT {COLUMNS} FROM flow_revisions
         WHERE course_id = $1 AND flow_id = $2
         ORDER BY created_at DESC, id DESC
         LIMIT 1"
    ))
    .bind(course_id)
    .bind(flow_id)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn find_by_revision(
    pool: &PgPool,
    course_id: &str,
    flow_id: &str,
    revision: &str,
) -> Result<Option<FlowRevision>, sqlx::Error> {
    sqlx::query_as::<_, FlowRevision>(&format!(
        "SELECT {COLUMNS} FROM flow_revisions
         WHERE course_id = $1 AND flow_id = $2 AND revision = $3"
    ))
    .bind(course_id)
    .bind(flow_id)
    .bind(revision)
    .fetch_optional(pool)
    .await
}

pub(crate) struct CreateFlowRevision<'a> {
    pub(crate) id: &'a str,
    pub(crate) course_id: &'a str,
    pub(crate) flow_id: &'a str,
    pub(crate) revision: &'a str,
    pub(crate) descriptor: &'a serde_json::Value,
    pub(crate) created_by: &'a str,
    pub(crate) created_at: time::PrimitiveDateTime,
}

pub(crate) async fn create(
    pool: &PgPool,
    params: CreateFlowRevision<'_>,
) -> Result<FlowRevision, sqlx::Error> {
    sqlx::query_as::<_, FlowRevision>(&format!(
        "INSERT INTO flow_revisions (
            id, course_id, flow_id, revision, descriptor, created_by, created_at
        ) VALUES ($1,$2,$3,$4,$5,$6,$7)
        RETURNING {COLUMNS}",
    ))
    .bind(params.id)
    .bind(params.course_id)
    .bind(params.flow_id)
    .bind(params.revision)
    .bind(params.descriptor)
    .bind(params.created_by)
    .bind(params.created_at)
    .fetch_one(pool)
    .await
}
