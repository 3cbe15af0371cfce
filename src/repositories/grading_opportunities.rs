use sqlx::PgPool;
use uuid::Uuid;

use crate::db::models::GradingOpportunity;

const COLUMNS: &str = "id, course_id, flow_id, identifier, name, created_at";

/// Get-or-create the grading opportunity for a (course, flow) pair. The
/// identifier and name come from the flow descriptor the first time the
/// flow is graded; later descriptor edits do not rename it.
pub(crate) async fn get_or_create(
    pool: &PgPool,
    course_id: &str,
    flow_id: &str,
    identifier: &str,
    name: &str,
    now: time::PrimitiveDateTime,
) -> Result<GradingOpportunity, sqlx::Error> {
    sqlx::query(
        "INSERT INTO grading_opportunities (id, course_id, flow_id, identifier, name, created_at)
         VALUES ($1,$2,$3,$4,$5,$6)
         ON CONFLICT (course_id, flow_id) DO NOTHING",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(course_id)
    .bind(flow_id)
    .bind(identifier)
    .bind(name)
    .bind(now)
    .execute(pool)
    .await?;

    sqlx::query_as::<_, GradingOpportunity>(&format!(
        "SELECT {COLUMNS} FROM grading_opportunities WHERE course_id = $1 AND flow_id = $2"
    ))
    .bind(course_id)
    .bind(flow_id)
    .fetch_one(pool)
    .await
}
