use serde_json::Value;

use crate::tools::ToolError;

/// Check `args` against a tool's declared JSON schema.
///
/// A schema that does not compile and any violation both surface as
/// [`ToolError::InvalidArguments`], with every violation joined into one message.
pub fn validate_arguments(schema: &Value, args: &Value) -> Result<(), ToolError> {
    let validator = jsonschema::Validator::new(schema)
        .map_err(|error| ToolError::InvalidArguments(format!("invalid tool schema: {error}")))?;
    if validator.is_valid(args) {
        return Ok(());
    }

    let errors: Vec<String> = validator
        .iter_errors(args)
        .map(|error| error.to_string())
        .collect();
    Err(ToolError::InvalidArguments(errors.join("; ")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn todo_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "todo_id": { "type": "integer" },
                "note": { "type": "string" }
            },
            "required": ["todo_id"]
        })
    }

    fn message(error: ToolError) -> String {
        match error {
            ToolError::InvalidArguments(message) => message,
            other => panic!("expected InvalidArguments, got {other:?}"),
        }
    }

    #[test]
    fn accepts_well_typed_arguments() {
        assert!(validate_arguments(&todo_schema(), &json!({"todo_id": 3})).is_ok());
        assert!(validate_arguments(&todo_schema(), &json!({"todo_id": 3, "extra": true})).is_ok());
    }

    #[test]
    fn rejects_missing_required_field() {
        let error = validate_arguments(&todo_schema(), &json!({"note": "x"})).unwrap_err();
        assert!(message(error).contains("todo_id"));
    }

    #[test]
    fn rejects_type_mismatch() {
        let error = validate_arguments(&todo_schema(), &json!({"todo_id": "one"})).unwrap_err();
        assert!(matches!(error, ToolError::InvalidArguments(_)));

        let fractional = validate_arguments(&todo_schema(), &json!({"todo_id": 1.5}));
        assert!(fractional.is_err());
    }

    #[test]
    fn rejects_non_object_arguments() {
        assert!(validate_arguments(&todo_schema(), &json!([1])).is_err());
    }

    #[test]
    fn reports_every_violation() {
        let error = validate_arguments(&todo_schema(), &json!({"note": 5})).unwrap_err();
        let message = message(error);
        assert!(message.contains("todo_id"));
        assert!(message.contains("; "));
    }

    #[test]
    fn broken_schema_is_an_argument_error() {
        let broken = json!({"type": "no-such-type"});
        let error = validate_arguments(&broken, &json!({})).unwrap_err();
        assert!(message(error).starts_with("invalid tool schema"));
    }
}
