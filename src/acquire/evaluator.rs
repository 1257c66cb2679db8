//! Sufficiency evaluation
//!
//! An evaluator decides whether acquired data covers a required-field
//! contract. Implementations range from simple presence rules to model-based
//! judgments; the escalator treats any evaluator failure as "not sufficient".

use crate::acquire::fetch::Fields;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Outcome of one sufficiency check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sufficiency {
    pub sufficient: bool,
    #[serde(rename = "missingFields", alias = "missing_fields", default)]
    pub missing_fields: Vec<String>,
}

impl Sufficiency {
    pub fn sufficient() -> Self {
        Self {
            sufficient: true,
            missing_fields: Vec::new(),
        }
    }

    pub fn missing(fields: Vec<String>) -> Self {
        Self {
            sufficient: false,
            missing_fields: fields,
        }
    }

    /// Parses an evaluator's JSON answer, e.g. `{"sufficient": false, "missingFields": ["email"]}`
    ///
    /// A verdict of sufficient that still lists missing fields is rejected
    /// as malformed rather than trusted.
    pub fn from_json(raw: &str) -> Result<Self, EvaluationError> {
        let parsed: Self = serde_json::from_str(raw.trim())
            .map_err(|e| EvaluationError::Malformed(e.to_string()))?;

        if parsed.sufficient && !parsed.missing_fields.is_empty() {
            return Err(EvaluationError::Malformed(format!(
                "sufficient verdict lists missing fields: {:?}",
                parsed.missing_fields
            )));
        }

        Ok(parsed)
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EvaluationError {
    #[error("Evaluation failed: {0}")]
    Failed(String),

    #[error("Malformed evaluation result: {0}")]
    Malformed(String),
}

/// Judges whether `data` satisfies `required`
#[async_trait]
pub trait SufficiencyEvaluator: Send + Sync {
    async fn evaluate(
        &self,
        data: &Fields,
        required: &[String],
    ) -> Result<Sufficiency, EvaluationError>;
}

/// Rule-based evaluator: every required field must hold a meaningful value
///
/// Null, empty strings (after trimming), empty arrays and empty objects all
/// count as missing.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequiredFieldsEvaluator;

impl RequiredFieldsEvaluator {
    pub fn missing_fields(data: &Fields, required: &[String]) -> Vec<String> {
        required
            .iter()
            .filter(|field| !data.get(field.as_str()).is_some_and(has_content))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl SufficiencyEvaluator for RequiredFieldsEvaluator {
    async fn evaluate(
        &self,
        data: &Fields,
        required: &[String],
    ) -> Result<Sufficiency, EvaluationError> {
        let missing = Self::missing_fields(data, required);
        if missing.is_empty() {
            Ok(Sufficiency::sufficient())
        } else {
            Ok(Sufficiency::missing(missing))
        }
    }
}

fn has_content(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        Value::Bool(_) | Value::Number(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> Fields {
        value.as_object().cloned().unwrap()
    }

    fn required(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_all_present_is_sufficient() {
        let data = fields(json!({"title": "Lab", "email": "a@b.org", "count": 0}));
        let result = RequiredFieldsEvaluator
            .evaluate(&data, &required(&["title", "email", "count"]))
            .await
            .unwrap();
        assert_eq!(result, Sufficiency::sufficient());
    }

    #[tokio::test]
    async fn test_empty_values_are_missing() {
        let data = fields(json!({
            "title": "  ",
            "email": null,
            "tags": [],
            "address": {},
            "name": "Ada"
        }));
        let result = RequiredFieldsEvaluator
            .evaluate(
                &data,
                &required(&["title", "email", "tags", "address", "name", "phone"]),
            )
            .await
            .unwrap();

        assert!(!result.sufficient);
        assert_eq!(
            result.missing_fields,
            required(&["title", "email", "tags", "address", "phone"])
        );
    }

    #[tokio::test]
    async fn test_no_requirements_is_sufficient() {
        let result = RequiredFieldsEvaluator
            .evaluate(&Fields::new(), &[])
            .await
            .unwrap();
        assert!(result.sufficient);
    }

    #[test]
    fn test_from_json() {
        let parsed =
            Sufficiency::from_json(r#"{"sufficient": false, "missingFields": ["email"]}"#).unwrap();
        assert_eq!(parsed, Sufficiency::missing(vec!["email".to_string()]));

        let parsed = Sufficiency::from_json(r#" {"sufficient": true} "#).unwrap();
        assert!(parsed.sufficient);

        let parsed =
            Sufficiency::from_json(r#"{"sufficient": false, "missing_fields": ["a"]}"#).unwrap();
        assert_eq!(parsed.missing_fields, vec!["a".to_string()]);
    }

    #[test]
    fn test_from_json_rejects_malformed() {
        assert!(matches!(
            Sufficiency::from_json("yes, looks complete"),
            Err(EvaluationError::Malformed(_))
        ));
        assert!(matches!(
            Sufficiency::from_json(r#"{"sufficient": true, "missingFields": ["email"]}"#),
            Err(EvaluationError::Malformed(_))
        ));
    }
}
