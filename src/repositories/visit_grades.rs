use crate::db::models::PageVisitGrade;

const COLUMNS: &str = "\
    id, visit_id, grader_id, graded_at_revision, grade_data, max_points, \
    correctness, feedback, created_at";

/// The authoritative grade for a visit: most recent by creation time, ties
/// broken by id. Older rows are never touched.
pub(crate) async fn most_recent_for_visit(
    executor: impl sqlx::PgExecutor<'_>,
    visit_id: &str,
) -> Result<Option<PageVisitGrade>, sqlx::Error> {
    sqlx::query_as::<_, PageVisitGrade>(&format!(
        "SELECT {COLUMNS} FROM page_visit_grades
         WHERE visit_id = $1
         ORDER BY created_at DESC, id DESC
         LIMIT 1"
    ))
    .bind(visit_id)
    .fetch_optional(executor)
    .await
}

pub(crate) async fn list_for_visit(
    executor: impl sqlx::PgExecutor<'_>,
    visit_id: &str,
) -> Result<Vec<PageVisitGrade>, sqlx::Error> {
    sqlx::query_as::<_, PageVisitGrade>(&format!(
        "SELECT {COLUMNS} FROM page_visit_grades
         WHERE visit_id = $1
         ORDER BY created_at, id"
    ))
    .bind(visit_id)
    .fetch_all(executor)
    .await
}

pub(crate) struct CreateVisitGrade<'a> {
    pub(crate) id: &'a str,
    pub(crate) visit_id: &'a str,
    pub(crate) grader_id: Option<&'a str>,
    pub(crate) graded_at_revision: &'a str,
    pub(crate) grade_data: Option<&'a serde_json::Value>,
    pub(crate) max_points: f64,
    pub(crate) correctness: Option<f64>,
    pub(crate) feedback: Option<&'a serde_json::Value>,
    pub(crate) created_at: time::PrimitiveDateTime,
}

/// Append a new grade row. Prior grades are left untouched so the regrade
/// history stays auditable.
pub(crate) async fn create(
    executor: impl sqlx::PgExecutor<'_>,
    params: CreateVisitGrade<'_>,
) -> Result<PageVisitGrade, sqlx::Error> {
    sqlx::query_as::<_, PageVisitGrade>(&format!(
        "INSERT INTO page_visit_grades (
            id, visit_id, grader_id, graded_at_revision, grade_data,
            max_points, correctness, feedback, created_at
        ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9)
        RETURNING {COLUMNS}",
    ))
    .bind(params.id)
    .bind(params.visit_id)
    .bind(params.grader_id)
    .bind(params.graded_at_revision)
    .bind(params.grade_data)
    .bind(params.max_points)
    .bind(params.correctness)
    .bind(params.feedback)
    .bind(params.created_at)
    .fetch_one(executor)
    .await
}
