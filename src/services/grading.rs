use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value;
use sqlx::{PgPool, Postgres, Transaction};
use thiserror::Error;
use time::PrimitiveDateTime;
use uuid::Uuid;

use crate::core::time::primitive_now_utc;
use crate::db::models::{FlowSession, PageVisit, PageVisitGrade};
use crate::repositories;
use crate::services::flow_descriptor::{FlowDescriptor, UngradedPolicy};
use crate::services::page_types::AnswerFeedback;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct FieldError {
    pub(crate) field: &'static str,
    pub(crate) message: String,
}

impl FieldError {
    pub(crate) fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self { field, message: message.into() }
    }
}

#[derive(Debug, Error)]
pub(crate) enum GradingError {
    #[error("page does not expect an answer")]
    NothingToGrade,
    #[error("invalid grade input")]
    Validation(Vec<FieldError>),
    #[error("flow {0} defines no grade aggregation policy")]
    MissingPolicy(String),
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

/// The authoritative grade of one visit, reduced to what aggregation needs.
#[derive(Debug, Clone, Copy)]
pub(crate) struct GradeSnapshot {
    pub(crate) correctness: Option<f64>,
    pub(crate) max_points: f64,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct PageScore {
    pub(crate) ordinal: i32,
    pub(crate) page_max_points: f64,
    pub(crate) grade: Option<GradeSnapshot>,
}

/// Combine per-page scores into (points, max_points) for a session.
///
/// A graded page contributes `grade.max_points * correctness` over
/// `grade.max_points` (the maximum snapshotted at grading time). A page
/// without a grade, or whose grade carries no correctness, follows the
/// flow's ungraded-pages policy. Excluded ordinals are skipped entirely.
pub(crate) fn combine_session_points(
    scores: &[PageScore],
    policy: UngradedPolicy,
    excluded: &[i32],
) -> (f64, f64) {
    let mut points = 0.0;
    let mut max_points = 0.0;

    for score in scores {
        if excluded.contains(&score.ordinal) {
            continue;
        }
        match score.grade {
            Some(GradeSnapshot { correctness: Some(correctness), max_points: grade_max }) => {
                points += grade_max * correctness;
                max_points += grade_max;
            }
            _ => {
                if policy == UngradedPolicy::Zero {
                    max_points += score.page_max_points;
                }
            }
        }
    }

    (points, max_points)
}

/// Recompute and persist a session's overall grade from the authoritative
/// grade of each answered page. Runs on the caller's transaction so the
/// update commits or rolls back together with whatever triggered it.
pub(crate) async fn recompute_session_grade(
    tx: &mut Transaction<'_, Postgres>,
    session: &FlowSession,
    descriptor: &FlowDescriptor,
    now: PrimitiveDateTime,
) -> Result<(f64, f64), GradingError> {
    let policy = descriptor
        .ungraded_policy()
        .ok_or_else(|| GradingError::MissingPolicy(session.flow_id.clone()))?;
    let excluded = descriptor.excluded_pages(session.in_progress, session.for_credit);

    let visits = repositories::page_visits::latest_answer_visits(&mut **tx, &session.id).await?;
    let by_ordinal: HashMap<i32, PageVisit> =
        visits.into_iter().map(|visit| (visit.page_ordinal, visit)).collect();

    let mut scores = Vec::new();
    for (ordinal, page) in descriptor.gradable_pages() {
        let grade = match by_ordinal.get(&ordinal) {
            Some(visit) => {
                repositories::visit_grades::most_recent_for_visit(&mut **tx, &visit.id)
                    .await?
                    .map(|grade| GradeSnapshot {
                        correctness: grade.correctness,
                        max_points: grade.max_points,
                    })
            }
            None => None,
        };
        scores.push(PageScore { ordinal, page_max_points: page.max_points(), grade });
    }

    let (points, max_points) = combine_session_points(&scores, policy, &excluded);
    repositories::flow_sessions::update_grade(&mut **tx, &session.id, points, max_points, now)
        .await?;

    Ok((points, max_points))
}

pub(crate) struct RecordGrade<'a> {
    pub(crate) visit_id: &'a str,
    pub(crate) grader_id: Option<&'a str>,
    pub(crate) graded_at_revision: &'a str,
    pub(crate) grade_data: Option<&'a Value>,
    pub(crate) max_points: f64,
    pub(crate) feedback: Option<&'a AnswerFeedback>,
}

/// The grading sequence of a grade submission: append the grade record,
/// then recompute the session aggregate, as one transaction. Either both
/// effects commit or neither does.
pub(crate) async fn submit_page_grade(
    pool: &PgPool,
    session: &FlowSession,
    descriptor: &FlowDescriptor,
    grade: RecordGrade<'_>,
) -> Result<(PageVisitGrade, (f64, f64)), GradingError> {
    let now = primitive_now_utc();
    let mut tx = pool.begin().await?;

    let recorded = record_grade(&mut tx, &grade, now).await?;
    let totals = recompute_session_grade(&mut tx, session, descriptor, now).await?;

    tx.commit().await?;

    Ok((recorded, totals))
}

async fn record_grade(
    tx: &mut Transaction<'_, Postgres>,
    grade: &RecordGrade<'_>,
    now: PrimitiveDateTime,
) -> Result<PageVisitGrade, GradingError> {
    let feedback_json = grade.feedback.map(AnswerFeedback::as_json);

    let recorded = repositories::visit_grades::create(
        &mut **tx,
        repositories::visit_grades::CreateVisitGrade {
            id: &Uuid::new_v4().to_string(),
            visit_id: grade.visit_id,
            grader_id: grade.grader_id,
            graded_at_revision: grade.graded_at_revision,
            grade_data: grade.grade_data,
            max_points: grade.max_points,
            correctness: grade.feedback.and_then(|feedback| feedback.correctness),
            feedback: feedback_json.as_ref(),
            created_at: now,
        },
    )
    .await?;

    Ok(recorded)
}

/// Close out a session: machine-grade every auto-gradable answered page
/// that has no grade yet (grader NULL marks machine grading), recompute the
/// aggregate, and mark the session finished. One transaction.
pub(crate) async fn finish_session(
    pool: &PgPool,
    session: &FlowSession,
    descriptor: &FlowDescriptor,
) -> Result<(f64, f64), GradingError> {
    let now = primitive_now_utc();
    let mut tx = pool.begin().await?;

    let visits = repositories::page_visits::latest_answer_visits(&mut *tx, &session.id).await?;
    for visit in &visits {
        let Some(page) = descriptor.page(visit.page_ordinal) else {
            continue;
        };
        if !page.is_auto_gradable() {
            continue;
        }
        if repositories::visit_grades::most_recent_for_visit(&mut *tx, &visit.id)
            .await?
            .is_some()
        {
            continue;
        }
        let Some(answer) = visit.answer.as_ref() else {
            continue;
        };
        let Some(feedback) = page.grade_by_machine(&answer.0) else {
            continue;
        };

        let feedback_json = feedback.as_json();
        repositories::visit_grades::create(
            &mut *tx,
            repositories::visit_grades::CreateVisitGrade {
                id: &Uuid::new_v4().to_string(),
                visit_id: &visit.id,
                grader_id: None,
                graded_at_revision: &session.revision,
                grade_data: None,
                max_points: page.max_points(),
                correctness: feedback.correctness,
                feedback: Some(&feedback_json),
                created_at: now,
            },
        )
        .await?;
    }

    let totals = recompute_session_grade(&mut tx, session, descriptor, now).await?;
    repositories::flow_sessions::finish(&mut *tx, &session.id, now).await?;

    tx.commit().await?;

    Ok(totals)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graded(ordinal: i32, page_max: f64, grade_max: f64, correctness: f64) -> PageScore {
        PageScore {
            ordinal,
            page_max_points: page_max,
            grade: Some(GradeSnapshot { correctness: Some(correctness), max_points: grade_max }),
        }
    }

    fn ungraded(ordinal: i32, page_max: f64) -> PageScore {
        PageScore { ordinal, page_max_points: page_max, grade: None }
    }

    #[test]
    fn ungraded_pages_count_toward_denominator_under_zero_policy() {
        let scores = [graded(0, 10.0, 10.0, 0.5), ungraded(1, 20.0)];
        let (points, max_points) =
            combine_session_points(&scores, UngradedPolicy::Zero, &[]);
        assert_eq!(points, 5.0);
        assert_eq!(max_points, 30.0);
    }

    #[test]
    fn ungraded_pages_are_dropped_under_excluded_policy() {
        let scores = [graded(0, 10.0, 10.0, 0.5), ungraded(1, 20.0)];
        let (points, max_points) =
            combine_session_points(&scores, UngradedPolicy::Excluded, &[]);
        assert_eq!(points, 5.0);
        assert_eq!(max_points, 10.0);
    }

    #[test]
    fn grade_without_correctness_counts_as_ungraded() {
        let scores = [PageScore {
            ordinal: 0,
            page_max_points: 10.0,
            grade: Some(GradeSnapshot { correctness: None, max_points: 10.0 }),
        }];
        let (points, max_points) =
            combine_session_points(&scores, UngradedPolicy::Zero, &[]);
        assert_eq!(points, 0.0);
        assert_eq!(max_points, 10.0);

        let (points, max_points) =
            combine_session_points(&scores, UngradedPolicy::Excluded, &[]);
        assert_eq!(points, 0.0);
        assert_eq!(max_points, 0.0);
    }

    #[test]
    fn excluded_ordinals_are_skipped_entirely() {
        let scores = [graded(0, 10.0, 10.0, 1.0), graded(1, 20.0, 20.0, 1.0)];
        let (points, max_points) =
            combine_session_points(&scores, UngradedPolicy::Zero, &[1]);
        assert_eq!(points, 10.0);
        assert_eq!(max_points, 10.0);
    }

    #[test]
    fn awarded_points_never_exceed_grade_max() {
        let scores = [graded(0, 10.0, 10.0, 1.0)];
        let (points, max_points) =
            combine_session_points(&scores, UngradedPolicy::Zero, &[]);
        assert!(points <= max_points);
        assert_eq!(points, 10.0);
    }

    #[test]
    fn combination_is_deterministic() {
        let scores =
            [graded(0, 10.0, 10.0, 0.3), ungraded(1, 5.0), graded(2, 8.0, 8.0, 1.0)];
        let first = combine_session_points(&scores, UngradedPolicy::Zero, &[]);
        let second = combine_session_points(&scores, UngradedPolicy::Zero, &[]);
        assert_eq!(first, second);
    }

    #[test]
    fn grade_max_from_grading_time_wins_over_page_max() {
        // The page was later republished with a different maximum; the
        // recorded grade keeps the maximum it was graded against.
        let scores = [graded(0, 15.0, 10.0, 0.5)];
        let (points, max_points) =
            combine_session_points(&scores, UngradedPolicy::Zero, &[]);
        assert_eq!(points, 5.0);
        assert_eq!(max_points, 10.0);
    }
}
