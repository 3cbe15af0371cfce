use serde::{Deserialize, Serialize};
use sqlx::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "courserole", rename_all = "lowercase")]
pub(crate) enum CourseRole {
    Instructor,
    Ta,
    Student,
}

impl CourseRole {
    /// Roles that may open the grading page and record grades.
    pub(crate) fn may_grade(self) -> bool {
        matches!(self, CourseRole::Instructor | CourseRole::Ta)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "membershipstatus", rename_all = "lowercase")]
pub(crate) enum MembershipStatus {
    Active,
    Suspended,
    Left,
}

#[cfg(test)]
mod tests {
    use super::CourseRole;

    #[test]
    fn grading_is_limited_to_staff_roles() {
        assert!(CourseRole::Instructor.may_grade());
        assert!(CourseRole::Ta.may_grade());
        assert!(!CourseRole::Student.may_grade());
    }
}
