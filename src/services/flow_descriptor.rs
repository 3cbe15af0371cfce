use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::services::page_types::Page;

/// Parsed view of a stored flow revision descriptor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct FlowDescriptor {
    pub(crate) title: String,
    #[serde(default)]
    pub(crate) grading: Option<GradingSection>,
    #[serde(default)]
    pub(crate) access_rules: Vec<AccessRule>,
    pub(crate) pages: Vec<Page>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct GradingSection {
    #[serde(default)]
    pub(crate) opportunity_id: Option<String>,
    #[serde(default)]
    pub(crate) ungraded_pages: Option<UngradedPolicy>,
}

/// How pages without an authoritative grade enter the session aggregate.
/// Deliberately has no default: the flow author must choose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum UngradedPolicy {
    /// Ungraded pages count their max_points in the denominator with zero
    /// awarded points.
    Zero,
    /// Ungraded pages are left out of the denominator entirely.
    Excluded,
}

/// First-match access rule; a matching rule names the page ordinals that
/// are skipped during aggregation for sessions in that state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct AccessRule {
    #[serde(default)]
    pub(crate) if_in_progress: Option<bool>,
    #[serde(default)]
    pub(crate) if_for_credit: Option<bool>,
    #[serde(default)]
    pub(crate) excluded_pages: Vec<i32>,
}

impl AccessRule {
    fn matches(&self, in_progress: bool, for_credit: bool) -> bool {
        self.if_in_progress.map_or(true, |wanted| wanted == in_progress)
            && self.if_for_credit.map_or(true, |wanted| wanted == for_credit)
    }
}

#[derive(Debug, Error)]
pub(crate) enum DescriptorError {
    #[error("invalid flow descriptor: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("flow descriptor has no pages")]
    NoPages,
    #[error("page {ordinal}: {message}")]
    InvalidPage { ordinal: i32, message: String },
    #[error("access rule {index} excludes unknown page ordinal {ordinal}")]
    UnknownExcludedPage { index: usize, ordinal: i32 },
}

impl FlowDescriptor {
    pub(crate) fn parse(value: &Value) -> Result<Self, DescriptorError> {
        let descriptor: FlowDescriptor = serde_json::from_value(value.clone())?;

        if descriptor.pages.is_empty() {
            return Err(DescriptorError::NoPages);
        }
        for (ordinal, page) in descriptor.pages.iter().enumerate() {
            page.validate().map_err(|message| DescriptorError::InvalidPage {
                ordinal: ordinal as i32,
                message,
            })?;
        }
        let page_count = descriptor.pages.len() as i32;
        for (index, rule) in descriptor.access_rules.iter().enumerate() {
            if let Some(&ordinal) =
                rule.excluded_pages.iter().find(|&&ordinal| ordinal < 0 || ordinal >= page_count)
            {
                return Err(DescriptorError::UnknownExcludedPage { index, ordinal });
            }
        }

        Ok(descriptor)
    }

    pub(crate) fn page(&self, ordinal: i32) -> Option<&Page> {
        usize::try_from(ordinal).ok().and_then(|index| self.pages.get(index))
    }

    /// Answer-expecting pages with their ordinals, in page order.
    pub(crate) fn gradable_pages(&self) -> impl Iterator<Item = (i32, &Page)> {
        self.pages
            .iter()
            .enumerate()
            .filter(|(_, page)| page.expects_answer())
            .map(|(index, page)| (index as i32, page))
    }

    pub(crate) fn ungraded_policy(&self) -> Option<UngradedPolicy> {
        self.grading.as_ref().and_then(|grading| grading.ungraded_pages)
    }

    /// The grading opportunity identifier, defaulting to the flow id when
    /// the descriptor does not name one.
    pub(crate) fn opportunity_identifier<'a>(&'a self, flow_id: &'a str) -> &'a str {
        self.grading
            .as_ref()
            .and_then(|grading| grading.opportunity_id.as_deref())
            .unwrap_or(flow_id)
    }

    /// Page ordinals excluded by the first access rule matching the
    /// session's state; empty when no rule matches.
    pub(crate) fn excluded_pages(&self, in_progress: bool, for_credit: bool) -> Vec<i32> {
        self.access_rules
            .iter()
            .find(|rule| rule.matches(in_progress, for_credit))
            .map(|rule| rule.excluded_pages.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn descriptor_json() -> Value {
        json!({
            "title": "Quiz 1",
            "grading": {"opportunity_id": "quiz-1", "ungraded_pages": "zero"},
            "access_rules": [
                {"if_in_progress": true, "excluded_pages": [1]}
            ],
            "pages": [
                {"type": "static", "title": "Intro", "body": "Welcome"},
                {
                    "type": "choice_question",
                    "title": "Pick",
                    "body": "Which?",
                    "choices": ["a", "b"],
                    "correct_choice": 0,
                    "max_points": 10.0
                },
                {
                    "type": "human_text_question",
                    "title": "Essay",
                    "body": "Explain",
                    "max_points": 20.0
                }
            ]
        })
    }

    #[test]
    fn parses_a_valid_descriptor() {
        let descriptor = FlowDescriptor::parse(&descriptor_json()).expect("parse");
        assert_eq!(descriptor.title, "Quiz 1");
        assert_eq!(descriptor.pages.len(), 3);
        assert_eq!(descriptor.ungraded_policy(), Some(UngradedPolicy::Zero));
        assert_eq!(descriptor.opportunity_identifier("weekly"), "quiz-1");
    }

    #[test]
    fn gradable_pages_skip_static_pages() {
        let descriptor = FlowDescriptor::parse(&descriptor_json()).expect("parse");
        let ordinals: Vec<i32> =
            descriptor.gradable_pages().map(|(ordinal, _)| ordinal).collect();
        assert_eq!(ordinals, vec![1, 2]);
    }

    #[test]
    fn page_lookup_is_bounded() {
        let descriptor = FlowDescriptor::parse(&descriptor_json()).expect("parse");
        assert!(descriptor.page(0).is_some());
        assert!(descriptor.page(3).is_none());
        assert!(descriptor.page(-1).is_none());
    }

    #[test]
    fn missing_grading_section_yields_no_policy() {
        let value = json!({
            "title": "Ungoverned",
            "pages": [{"type": "static", "title": "t", "body": "b"}]
        });
        let descriptor = FlowDescriptor::parse(&value).expect("parse");
        assert_eq!(descriptor.ungraded_policy(), None);
        assert_eq!(descriptor.opportunity_identifier("flow-7"), "flow-7");
    }

    #[test]
    fn unknown_ungraded_policy_fails_to_parse() {
        let value = json!({
            "title": "Bad",
            "grading": {"ungraded_pages": "halved"},
            "pages": [{"type": "static", "title": "t", "body": "b"}]
        });
        assert!(matches!(FlowDescriptor::parse(&value), Err(DescriptorError::Parse(_))));
    }

    #[test]
    fn rejects_empty_page_list() {
        let value = json!({"title": "Empty", "pages": []});
        assert!(matches!(FlowDescriptor::parse(&value), Err(DescriptorError::NoPages)));
    }

    #[test]
    fn rejects_invalid_page() {
        let value = json!({
            "title": "Bad page",
            "pages": [{
                "type": "choice_question",
                "title": "t",
                "body": "b",
                "choices": [],
                "correct_choice": 0,
                "max_points": 5.0
            }]
        });
        assert!(matches!(
            FlowDescriptor::parse(&value),
            Err(DescriptorError::InvalidPage { ordinal: 0, .. })
        ));
    }

    #[test]
    fn rejects_access_rule_with_unknown_ordinal() {
        let value = json!({
            "title": "Bad rule",
            "access_rules": [{"excluded_pages": [5]}],
            "pages": [{"type": "static", "title": "t", "body": "b"}]
        });
        assert!(matches!(
            FlowDescriptor::parse(&value),
            Err(DescriptorError::UnknownExcludedPage { index: 0, ordinal: 5 })
        ));
    }

    #[test]
    fn access_rules_match_first_by_session_state() {
        let descriptor = FlowDescriptor::parse(&descriptor_json()).expect("parse");
        assert_eq!(descriptor.excluded_pages(true, false), vec![1]);
        assert!(descriptor.excluded_pages(false, false).is_empty());
    }
}
