//! Seam for the schema-validation collaborator.
//!
//! Tandem does not implement a validation language. A [`Schema`] is anything
//! that can turn a raw JSON value into a parsed one or fail with a structured
//! issue list. [`TypedSchema`] covers the common case by delegating to serde,
//! using `serde_path_to_error` so failures carry the path of the offending
//! field inside the slot's structure.

use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One field-level validation problem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    /// Machine-readable kind of the problem.
    pub code: String,
    /// Human-readable explanation.
    pub message: String,
    /// Path locating the field inside the validated slot, outermost first.
    pub path: Vec<String>,
}

impl Issue {
    pub fn new(code: impl Into<String>, message: impl Into<String>, path: Vec<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            path,
        }
    }
}

/// Why a schema did not produce a value.
///
/// `Invalid` is the expected per-request outcome and becomes a
/// `validation-error` response; `Fault` is a crash inside the validator and
/// is routed through the endpoint's error handler instead.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("input failed validation with {} issue(s)", .0.len())]
    Invalid(Vec<Issue>),
    #[error(transparent)]
    Fault(#[from] anyhow::Error),
}

/// Parse-or-fail over a raw JSON value.
pub trait Schema: Send + Sync + 'static {
    fn parse(&self, raw: &Value) -> Result<Value, SchemaError>;
}

/// Plain functions and closures are schemas.
impl<F> Schema for F
where
    F: Fn(&Value) -> Result<Value, SchemaError> + Send + Sync + 'static,
{
    fn parse(&self, raw: &Value) -> Result<Value, SchemaError> {
        (self)(raw)
    }
}

/// Schema that parses into `T` via serde and re-serializes the result, so
/// defaults and renames applied by `T`'s derive land in the accumulated data.
pub struct TypedSchema<T> {
    _marker: PhantomData<fn() -> T>,
}

/// Shorthand for [`TypedSchema`] construction: `typed::<CreateUser>()`.
pub fn typed<T>() -> TypedSchema<T>
where
    T: DeserializeOwned + Serialize + 'static,
{
    TypedSchema {
        _marker: PhantomData,
    }
}

impl<T> Schema for TypedSchema<T>
where
    T: DeserializeOwned + Serialize + 'static,
{
    fn parse(&self, raw: &Value) -> Result<Value, SchemaError> {
        match serde_path_to_error::deserialize::<_, T>(raw.clone()) {
            Ok(parsed) => serde_json::to_value(parsed)
                .map_err(|e| SchemaError::Fault(anyhow::Error::new(e))),
            Err(err) => {
                let path = err
                    .path()
                    .iter()
                    .map(|segment| match segment {
                        serde_path_to_error::Segment::Map { key } => key.clone(),
                        serde_path_to_error::Segment::Seq { index } => index.to_string(),
                        serde_path_to_error::Segment::Enum { variant } => variant.clone(),
                        _ => "?".to_string(),
                    })
                    .collect();
                let message = err.into_inner().to_string();
                Err(SchemaError::Invalid(vec![Issue::new(
                    "invalid_value",
                    message,
                    path,
                )]))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Serialize, Deserialize)]
    struct Address {
        street: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    struct User {
        name: String,
        address: Address,
    }

    #[derive(Debug, Serialize, Deserialize)]
    struct Form {
        user: User,
    }

    #[test]
    fn typed_schema_accepts_matching_input() {
        let schema = typed::<Form>();
        let parsed = schema
            .parse(&json!({"user": {"name": "ada", "address": {"street": "main"}}}))
            .unwrap();
        assert_eq!(parsed["user"]["address"]["street"], "main");
    }

    #[test]
    fn typed_schema_locates_nested_failures() {
        let schema = typed::<Form>();
        let err = schema
            .parse(&json!({"user": {"name": "ada", "address": {"street": 42}}}))
            .unwrap_err();
        match err {
            SchemaError::Invalid(issues) => {
                assert_eq!(issues.len(), 1);
                assert_eq!(issues[0].path, vec!["user", "address", "street"]);
                assert_eq!(issues[0].code, "invalid_value");
            }
            SchemaError::Fault(e) => panic!("expected invalid input, got fault: {e}"),
        }
    }

    #[test]
    fn typed_schema_applies_serde_defaults() {
        #[derive(Debug, Serialize, Deserialize)]
        struct Page {
            #[serde(default = "default_limit")]
            limit: u32,
        }
        fn default_limit() -> u32 {
            50
        }

        let parsed = typed::<Page>().parse(&json!({})).unwrap();
        assert_eq!(parsed["limit"], 50);
    }

    #[test]
    fn closure_schema_can_report_many_issues() {
        let schema = |raw: &Value| -> Result<Value, SchemaError> {
            let mut issues = Vec::new();
            if raw.get("a").is_none() {
                issues.push(Issue::new("missing", "a is required", vec!["a".into()]));
            }
            if raw.get("b").is_none() {
                issues.push(Issue::new("missing", "b is required", vec!["b".into()]));
            }
            if issues.is_empty() {
                Ok(raw.clone())
            } else {
                Err(SchemaError::Invalid(issues))
            }
        };
        match schema.parse(&json!({})) {
            Err(SchemaError::Invalid(issues)) => assert_eq!(issues.len(), 2),
            other => panic!("expected two issues, got {other:?}"),
        }
    }
}
