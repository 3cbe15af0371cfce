use crate::db::models::PageVisit;

const COLUMNS: &str = "id, flow_session_id, page_ordinal, answer, visited_at";

/// The visit holding the session's current answer for one page: the most
/// recent visit with a non-null answer at that ordinal.
pub(crate) async fn latest_answer_visit(
    executor: impl sqlx::PgExecutor<'_>,
    flow_session_id: &str,
    page_ordinal: i32,
) -> Result<Option<PageVisit>, sqlx::Error> {
    sqlx::query_as::<_, PageVisit>(&format!(
        "SELECT {COLUMNS} FROM page_visits
         WHERE flow_session_id = $1 AND page_ordinal = $2 AND answer IS NOT NULL
         ORDER BY visited_at DESC, id DESC
         LIMIT 1"
    ))
    .bind(flow_session_id)
    .bind(page_ordinal)
    .fetch_optional(executor)
    .await
}

/// One row per answered ordinal: the latest answer visit for each page of
/// the session, in ordinal order.
pub(crate) async fn latest_answer_visits(
    executor: impl sqlx::PgExecutor<'_>,
    flow_session_id: &str,
) -> Result<Vec<PageVisit>, sqlx::Error> {
    sqlx::query_as::<_, PageVisit>(&format!(
        "SELECT DISTINCT ON (page_ordinal) {COLUMNS} FROM page_visits
         WHERE flow_session_id = $1 AND answer IS NOT NULL
         ORDER BY page_ordinal, visited_at DESC, id DESC"
    ))
    .bind(flow_session_id)
    .fetch_all(executor)
    .await
}

pub(crate) struct CreatePageVisit<'a> {
    pub(crate) id: &'a str,
    pub(crate) flow_session_id: &'a str,
    pub(crate) page_ordinal: i32,
    pub(crate) answer: Option<&'a serde_json::Value>,
    pub(crate) visited_at: time::PrimitiveDateTime,
}

pub(crate) async fn create(
    executor: impl sqlx::PgExecutor<'_>,
    params: CreatePageVisit<'_>,
) -> Result<PageVisit, sqlx::Error> {
    sqlx::query_as::<_, PageVisit>(&format!(
        "INSERT INTO page_visits (id, flow_session_id, page_ordinal, answer, visited_at)
         VALUES ($1,$2,$3,$4,$5)
         RETURNING {COLUMNS}",
    ))
    .bind(params.id)
    .bind(params.flow_session_id)
    .bind(params.page_ordinal)
    .bind(params.answer)
    .bind(params.visited_at)
    .fetch_one(executor)
    .await
}
