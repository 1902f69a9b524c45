//! The canned evaluation suite.

use serde::{Deserialize, Serialize};

/// One evaluation question with its expected grounded answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalCase {
    pub question: String,
    pub expected: String,
    /// Descriptive only; does not change how the case is scored.
    pub category: String,
}

impl EvalCase {
    pub fn new(question: &str, expected: &str, category: &str) -> Self {
        Self {
            question: question.to_string(),
            expected: expected.to_string(),
            category: category.to_string(),
        }
    }
}

/// The five-case suite run by `ragkit eval`.
pub fn default_suite() -> Vec<EvalCase> {
    vec![
        EvalCase::new(
            "How much does the Pro plan cost?",
            "The Pro plan costs $129 per month.",
            "factual_retrieval",
        ),
        EvalCase::new(
            "Can Lite plan users access the API?",
            "No, Lite plans do not include API access.",
            "factual_retrieval",
        ),
        EvalCase::new(
            "How long is data retained after cancellation?",
            "Data is retained for 90 days after cancellation.",
            "factual_retrieval",
        ),
        EvalCase::new(
            "Does ACME support Okta for SSO?",
            "Yes, Okta is a supported identity provider for SSO on Enterprise plans.",
            "factual_retrieval",
        ),
        EvalCase::new(
            "What is the CEO's favorite color?",
            "This information is not available in the knowledge base.",
            "out_of_scope",
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_suite_shape() {
        let suite = default_suite();
        assert_eq!(suite.len(), 5);
        assert_eq!(
            suite
                .iter()
                .filter(|c| c.category == "factual_retrieval")
                .count(),
            4
        );
        assert_eq!(suite[4].category, "out_of_scope");
        assert!(suite[0].expected.contains("$129"));
    }
}
