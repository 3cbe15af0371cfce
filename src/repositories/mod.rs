pub(crate) mod course_memberships;
pub(crate) mod courses;
pub(crate) mod flow_revisions;
pub(crate) mod flow_sessions;
pub(crate) mod grading_opportunities;
pub(crate) mod page_visits;
pub(crate) mod users;
pub(crate) mod visit_grades;
