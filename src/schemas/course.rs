use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::db::types::{CourseRole, MembershipStatus};

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct CourseCreateRequest {
    #[validate(length(min = 1, max = 64, message = "slug must be 1-64 characters"))]
    pub(crate) slug: String,
    #[validate(length(min = 1, max = 200, message = "title must be 1-200 characters"))]
    pub(crate) title: String,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct MembershipUpsertRequest {
    #[validate(length(min = 1, message = "user_id must not be empty"))]
    pub(crate) user_id: String,
    pub(crate) role: CourseRole,
    #[serde(default)]
    pub(crate) status: Option<MembershipStatus>,
}

#[derive(Debug, Serialize)]
pub(crate) struct MembershipResponse {
    pub(crate) id: String,
    pub(crate) course_id: String,
    pub(crate) user_id: String,
    pub(crate) role: CourseRole,
    pub(crate) status: MembershipStatus,
}

#[derive(Debug, Serialize)]
pub(crate) struct CourseResponse {
    pub(crate) id: String,
    pub(crate) slug: String,
    pub(crate) title: String,
    pub(crate) is_active: bool,
    pub(crate) created_by: String,
}
