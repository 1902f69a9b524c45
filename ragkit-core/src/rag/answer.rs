//! Structured answers: the `format_answer` function schema and its decoder.

use crate::error::SchemaError;
use crate::types::ToolDefinition;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// Name of the function the chat model is forced to call.
pub const FORMAT_ANSWER_TOOL: &str = "format_answer";

/// How well the retrieved sources cover the question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::High => "high",
            Confidence::Medium => "medium",
            Confidence::Low => "low",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "high" => Some(Confidence::High),
            "medium" => Some(Confidence::Medium),
            "low" => Some(Confidence::Low),
            _ => None,
        }
    }
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declaration of the `format_answer` function.
pub fn format_answer_tool() -> ToolDefinition {
    ToolDefinition {
        name: FORMAT_ANSWER_TOOL.to_string(),
        description: "Format a structured answer with source attribution and confidence level"
            .to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "answer": {
                    "type": "string",
                    "description": "The direct answer to the user's question"
                },
                "sources_used": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "List of source document titles used to form the answer"
                },
                "confidence": {
                    "type": "string",
                    "enum": ["high", "medium", "low"],
                    "description": "Confidence level based on how well the sources cover the question"
                },
                "follow_up_suggestion": {
                    "type": "string",
                    "description": "A suggested follow-up question the user might want to ask"
                }
            },
            "required": ["answer", "sources_used", "confidence"]
        }),
    }
}

/// The model-produced part of an answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormattedAnswer {
    pub answer: String,
    pub sources_used: Vec<String>,
    pub confidence: Confidence,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub follow_up_suggestion: Option<String>,
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> SchemaError {
    SchemaError::InvalidField {
        field: field.to_string(),
        reason: reason.into(),
    }
}

fn required<'a>(obj: &'a Map<String, Value>, field: &str) -> Result<&'a Value, SchemaError> {
    obj.get(field).ok_or_else(|| SchemaError::MissingField {
        field: field.to_string(),
    })
}

impl FormattedAnswer {
    /// Validate function-call arguments against the `format_answer` schema.
    ///
    /// Arguments that arrived as an undecodable string are reported as an
    /// encoding error. Nothing is repaired or defaulted except the optional
    /// follow-up suggestion.
    pub fn from_arguments(arguments: &Value) -> Result<Self, SchemaError> {
        if let Value::String(raw) = arguments {
            let decoded: Value =
                serde_json::from_str(raw).map_err(|e| SchemaError::InvalidEncoding {
                    message: e.to_string(),
                })?;
            return match decoded {
                Value::Object(_) => Self::from_arguments(&decoded),
                other => Err(SchemaError::NotAnObject {
                    found: json_type(&other).to_string(),
                }),
            };
        }

        let obj = arguments
            .as_object()
            .ok_or_else(|| SchemaError::NotAnObject {
                found: json_type(arguments).to_string(),
            })?;

        let answer = required(obj, "answer")?
            .as_str()
            .ok_or_else(|| invalid("answer", "expected a string"))?
            .to_string();

        let sources_used = required(obj, "sources_used")?
            .as_array()
            .ok_or_else(|| invalid("sources_used", "expected an array of strings"))?
            .iter()
            .map(|s| {
                s.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| invalid("sources_used", "expected an array of strings"))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let confidence_raw = required(obj, "confidence")?
            .as_str()
            .ok_or_else(|| invalid("confidence", "expected a string"))?;
        let confidence = Confidence::parse(confidence_raw).ok_or_else(|| {
            invalid(
                "confidence",
                format!("'{confidence_raw}' is not one of high, medium, low"),
            )
        })?;

        let follow_up_suggestion = match obj.get("follow_up_suggestion") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(_) => return Err(invalid("follow_up_suggestion", "expected a string")),
        };

        Ok(Self {
            answer,
            sources_used,
            confidence,
            follow_up_suggestion,
        })
    }
}

/// A complete answer with provenance and timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerResult {
    pub answer: String,
    pub sources_used: Vec<String>,
    pub confidence: Confidence,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub follow_up_suggestion: Option<String>,
    /// Titles of the passages shown to the model, in rank order.
    pub retrieved_docs: Vec<String>,
    pub model: String,
    pub prompt_version: String,
    pub latency_ms: f64,
}

impl AnswerResult {
    pub fn new(
        formatted: FormattedAnswer,
        retrieved_docs: Vec<String>,
        model: String,
        prompt_version: String,
        latency_ms: f64,
    ) -> Self {
        Self {
            answer: formatted.answer,
            sources_used: formatted.sources_used,
            confidence: formatted.confidence,
            follow_up_suggestion: formatted.follow_up_suggestion,
            retrieved_docs,
            model,
            prompt_version,
            latency_ms,
        }
    }

    /// Cited sources that were not among the retrieved passages.
    pub fn unsupported_sources(&self) -> Vec<&str> {
        self.sources_used
            .iter()
            .filter(|s| !self.retrieved_docs.contains(*s))
            .map(String::as_str)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_decode_full_answer() {
        let args = json!({
            "answer": "The Pro plan costs $129 per month.",
            "sources_used": ["Pricing"],
            "confidence": "high",
            "follow_up_suggestion": "Would you like to compare plans?"
        });
        let decoded = FormattedAnswer::from_arguments(&args).unwrap();
        assert_eq!(
            decoded,
            FormattedAnswer {
                answer: "The Pro plan costs $129 per month.".into(),
                sources_used: vec!["Pricing".into()],
                confidence: Confidence::High,
                follow_up_suggestion: Some("Would you like to compare plans?".into()),
            }
        );
    }

    #[test]
    fn test_decode_without_optional_field() {
        let args = json!({"answer": "x", "sources_used": [], "confidence": "low"});
        let decoded = FormattedAnswer::from_arguments(&args).unwrap();
        assert_eq!(decoded.follow_up_suggestion, None);
        assert!(decoded.sources_used.is_empty());
    }

    #[test]
    fn test_decode_missing_confidence() {
        let args = json!({"answer": "x", "sources_used": []});
        match FormattedAnswer::from_arguments(&args) {
            Err(SchemaError::MissingField { field }) => assert_eq!(field, "confidence"),
            other => panic!("expected MissingField, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_bad_enum_value() {
        let args = json!({"answer": "x", "sources_used": [], "confidence": "certain"});
        match FormattedAnswer::from_arguments(&args) {
            Err(SchemaError::InvalidField { field, reason }) => {
                assert_eq!(field, "confidence");
                assert!(reason.contains("certain"));
            }
            other => panic!("expected InvalidField, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_wrong_types() {
        let args = json!({"answer": 42, "sources_used": [], "confidence": "high"});
        assert!(matches!(
            FormattedAnswer::from_arguments(&args),
            Err(SchemaError::InvalidField { ref field, .. }) if field == "answer"
        ));
        let args = json!({"answer": "x", "sources_used": "Pricing", "confidence": "high"});
        assert!(matches!(
            FormattedAnswer::from_arguments(&args),
            Err(SchemaError::InvalidField { ref field, .. }) if field == "sources_used"
        ));
    }

    #[test]
    fn test_decode_invalid_encoding() {
        let args = Value::String("{\"answer\": ".into());
        assert!(matches!(
            FormattedAnswer::from_arguments(&args),
            Err(SchemaError::InvalidEncoding { .. })
        ));
    }

    #[test]
    fn test_decode_not_an_object() {
        assert!(matches!(
            FormattedAnswer::from_arguments(&json!(["answer"])),
            Err(SchemaError::NotAnObject { ref found }) if found == "array"
        ));
        assert!(matches!(
            FormattedAnswer::from_arguments(&Value::String("[1, 2]".into())),
            Err(SchemaError::NotAnObject { .. })
        ));
    }

    #[test]
    fn test_decode_string_encoded_object() {
        let args = Value::String(
            r#"{"answer": "ok", "sources_used": ["FAQ"], "confidence": "medium"}"#.into(),
        );
        let decoded = FormattedAnswer::from_arguments(&args).unwrap();
        assert_eq!(decoded.confidence, Confidence::Medium);
    }

    #[test]
    fn test_unsupported_sources() {
        let result = AnswerResult::new(
            FormattedAnswer {
                answer: "x".into(),
                sources_used: vec!["Pricing".into(), "Made Up".into()],
                confidence: Confidence::Medium,
                follow_up_suggestion: None,
            },
            vec!["Pricing".into(), "Plans".into()],
            "gpt-4o-mini".into(),
            "1.1".into(),
            12.5,
        );
        assert_eq!(result.unsupported_sources(), vec!["Made Up"]);
    }

    #[test]
    fn test_answer_result_wire_format() {
        let result = AnswerResult::new(
            FormattedAnswer {
                answer: "x".into(),
                sources_used: vec![],
                confidence: Confidence::Low,
                follow_up_suggestion: None,
            },
            vec![],
            "m".into(),
            "1.0".into(),
            1.0,
        );
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["confidence"], "low");
        assert!(json.get("follow_up_suggestion").is_none());
    }

    #[test]
    fn test_tool_schema_required_fields() {
        let tool = format_answer_tool();
        assert_eq!(tool.name, "format_answer");
        assert_eq!(
            tool.parameters["required"],
            json!(["answer", "sources_used", "confidence"])
        );
    }
}
