use sqlx::PgPool;
use uuid::Uuid;

use crate::db::models::CourseMembership;
use crate::db::types::{CourseRole, MembershipStatus};

const COLUMNS: &str = "id, course_id, user_id, role, status, joined_at";

pub(crate) async fn find_for_user_course(
    pool: &PgPool,
    user_id: &str,
    course_id: &str,
) -> Result<Option<CourseMembership>, sqlx::Error> {
    sqlx::query_as::<_, CourseMembership>(&format!(
        "SELECT {COLUMNS} FROM course_memberships WHERE user_id = $1 AND course_id = $2"
    ))
    .bind(user_id)
    .bind(course_id)
    .fetch_optional(pool)
    .await
}

pub(crate) struct UpsertMembership<'a> {
    pub(crate) course_id: &'a str,
    pub(crate) user_id: &'a str,
    pub(crate) role: CourseRole,
    pub(crate) status: MembershipStatus,
    pub(crate) joined_at: time::PrimitiveDateTime,
}

pub(crate) async fn upsert(
    pool: &PgPool,
    params: UpsertMembership<'_>,
) -> Result<CourseMembership, sqlx::Error> {
    sqlx::query_as::<_, CourseMembership>(&format!(
        "INSERT INTO course_memberships (id, course_id, user_id, role, status, joined_at)
         VALUES ($1,$2,$3,$4,$5,$6)
         ON CONFLICT (course_id, user_id)
         DO UPDATE SET role = EXCLUDED.role, status = EXCLUDED.status
         RETURNING {COLUMNS}",
    ))
    .bind(Uuid::new_v4().to_string())
    .bind(params.course_id)
    .bind(params.user_id)
    .bind(params.role)
    .bind(params.status)
    .bind(params.joined_at)
    .fetch_one(pool)
    .await
}
