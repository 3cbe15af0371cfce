use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use time::PrimitiveDateTime;

use crate::db::types::{CourseRole, MembershipStatus};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct User {
    pub(crate) id: String,
    pub(crate) username: String,
    pub(crate) hashed_password: String,
    pub(crate) full_name: String,
    pub(crate) surname: String,
    pub(crate) is_active: bool,
    pub(crate) is_platform_admin: bool,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Course {
    pub(crate) id: String,
    pub(crate) slug: String,
    pub(crate) title: String,
    pub(crate) is_active: bool,
    pub(crate) created_by: String,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct CourseMembership {
    pub(crate) id: String,
    pub(crate) course_id: String,
    pub(crate) user_id: String,
    pub(crate) role: CourseRole,
    pub(crate) status: MembershipStatus,
    pub(crate) joined_at: PrimitiveDateTime,
}

/// One immutable published version of a flow's content. The newest revision
/// for a (course, flow) pair is the one new sessions are started under.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct FlowRevision {
    pub(crate) id: String,
    pub(crate) course_id: String,
    pub(crate) flow_id: String,
    pub(crate) revision: String,
    pub(crate) descriptor: Json<serde_json::Value>,
    pub(crate) created_by: String,
    pub(crate) created_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct GradingOpportunity {
    pub(crate) id: String,
    pub(crate) course_id: String,
    pub(crate) flow_id: String,
    pub(crate) identifier: String,
    pub(crate) name: String,
    pub(crate) created_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct FlowSession {
    pub(crate) id: String,
    pub(crate) course_id: String,
    pub(crate) flow_id: String,
    pub(crate) participation_id: String,
    pub(crate) revision: String,
    pub(crate) in_progress: bool,
    pub(crate) for_credit: bool,
    pub(crate) started_at: PrimitiveDateTime,
    pub(crate) completed_at: Option<PrimitiveDateTime>,
    pub(crate) points: Option<f64>,
    pub(crate) max_points: Option<f64>,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct PageVisit {
    pub(crate) id: String,
    pub(crate) flow_session_id: String,
    pub(crate) page_ordinal: i32,
    pub(crate) answer: Option<Json<serde_json::Value>>,
    pub(crate) visited_at: PrimitiveDateTime,
}

/// Append-only grade record for a page visit. Regrading inserts a new row;
/// the most recent row by (created_at, id) is the authoritative grade.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct PageVisitGrade {
    pub(crate) id: String,
    pub(crate) visit_id: String,
    pub(crate) grader_id: Option<String>,
    pub(crate) graded_at_revision: String,
    pub(crate) grade_data: Option<Json<serde_json::Value>>,
    pub(crate) max_points: f64,
    pub(crate) correctness: Option<f64>,
    pub(crate) feedback: Option<Json<serde_json::Value>>,
    pub(crate) created_at: PrimitiveDateTime,
}

impl PageVisitGrade {
    pub(crate) fn points_awarded(&self) -> Option<f64> {
        self.correctness.map(|correctness| self.max_points * correctness)
    }
}
