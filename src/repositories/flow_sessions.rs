use sqlx::PgPool;

use crate::db::models::FlowSession;

const COLUMNS: &str = "\
    id, course_id, flow_id, participation_id, revision, in_progress, \
    for_credit, started_at, completed_at, points, max_points, updated_at";

/// Session lookups are course-scoped so a session reached under the wrong
/// course is indistinguishable from a missing one.
pub(crate) async fn find_in_course(
    pool: &PgPool,
    course_id: &str,
    id: &str,
) -> Result<Option<FlowSession>, sqlx::Error> {
    sqlx::query_as::<_, FlowSession>(&format!(
        "SELECT {COLUMNS} FROM flow_sessions WHERE course_id = $1 AND id = $2"
    ))
    .bind(course_id)
    .bind(id)
    .fetch_optional(pool)
    .await
}

/// Ids of all sessions sharing the current session's grading cohort, in the
/// order the grading page walks them: participant surname, then start time,
/// then session id to keep equal keys deterministic.
pub(crate) async fn list_sibling_ids(
    pool: &PgPool,
    course_id: &str,
    flow_id: &str,
    in_progress: bool,
    for_credit: bool,
) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>(
        "SELECT fs.id
         FROM flow_sessions fs
         JOIN users u ON u.id = fs.participation_id
         WHERE fs.course_id = $1 AND fs.flow_id = $2
           AND fs.in_progress = $3 AND fs.for_credit = $4
         ORDER BY u.surname, fs.started_at, fs.id",
    )
    .bind(course_id)
    .bind(flow_id)
    .bind(in_progress)
    .bind(for_credit)
    .fetch_all(pool)
    .await
}

pub(crate) struct CreateFlowSession<'a> {
    pub(crate) id: &'a str,
    pub(crate) course_id: &'a str,
    pub(crate) flow_id: &'a str,
    pub(crate) participation_id: &'a str,
    pub(crate) revision: &'a str,
    pub(crate) in_progress: bool,
    pub(crate) for_credit: bool,
    pub(crate) started_at: time::PrimitiveDateTime,
    pub(crate) updated_at: time::PrimitiveDateTime,
}

pub(crate) async fn create(
    pool: &PgPool,
    params: CreateFlowSession<'_>,
) -> Result<FlowSession, sqlx::Error> {
    sqlx::query_as::<_, FlowSession>(&format!(
        "INSERT INTO flow_sessions (
            id, course_id, flow_id, participation_id, revision,
            in_progress, for_credit, started_at, updated_at
        ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9)
        RETURNING {COLUMNS}",
    ))
    .bind(params.id)
    .bind(params.course_id)
    .bind(params.flow_id)
    .bind(params.participation_id)
    .bind(params.revision)
    .bind(params.in_progress)
    .bind(params.for_credit)
    .bind(params.started_at)
    .bind(params.updated_at)
    .fetch_one(pool)
    .await
}

pub(crate) async fn update_grade(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
    points: f64,
    max_points: f64,
    now: time::PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE flow_sessions SET points = $1, max_points = $2, updated_at = $3 WHERE id = $4")
        .bind(points)
        .bind(max_points)
        .bind(now)
        .bind(id)
        .execute(executor)
        .await?;
    Ok(())
}

pub(crate) async fn finish(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
    now: time::PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE flow_sessions
         SET in_progress = FALSE, completed_at = $1, updated_at = $1
         WHERE id = $2",
    )
    .bind(now)
    .bind(id)
    .execute(executor)
    .await?;
    Ok(())
}
