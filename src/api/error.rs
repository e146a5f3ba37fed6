//! Server error surface
//!
//! The API reports failures either as a bare `{"detail": "..."}` message or
//! as a field-level validation map (`{"field": ["msg", ...]}`, possibly
//! nested for the patient's user/address sub-objects). The display policy is
//! first message under the first failing field key; multi-field responses
//! under-report by design.

use serde_json::Value;

/// Unstructured failure detail, when present
pub fn detail_message(body: &Value) -> Option<String> {
    body.get("detail")?.as_str().map(str::to_string)
}

/// First message under the first failing field key of a validation payload
pub fn first_field_error(body: &Value) -> Option<String> {
    let map = body.as_object()?;
    let (_, value) = map.iter().next()?;
    match value {
        Value::Array(messages) => messages
            .first()
            .and_then(Value::as_str)
            .map(str::to_string),
        Value::String(message) => Some(message.clone()),
        // Nested serializer errors ({"user": {"email": [...]}})
        Value::Object(_) => first_field_error(value),
        _ => None,
    }
}

/// Convert a raw error response body into the single user-facing message
pub fn user_message(body: &str, fallback: &str) -> String {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return fallback.to_string();
    };

    detail_message(&value)
        .or_else(|| first_field_error(&value))
        .unwrap_or_else(|| {
            serde_json::to_string(&value).unwrap_or_else(|_| fallback.to_string())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_error_takes_first_message() {
        let body = r#"{"description": ["This field is required."]}"#;
        assert_eq!(
            user_message(body, "Falha ao salvar."),
            "This field is required."
        );
    }

    #[test]
    fn test_detail_wins_over_field_errors() {
        let body = r#"{"detail": "Esta receita já está assinada."}"#;
        assert_eq!(
            user_message(body, "Falha ao enviar."),
            "Esta receita já está assinada."
        );
    }

    #[test]
    fn test_nested_field_error_is_unwrapped() {
        let body = r#"{"user": {"email": ["Enter a valid email address."]}}"#;
        assert_eq!(
            user_message(body, "Falha."),
            "Enter a valid email address."
        );
    }

    #[test]
    fn test_non_json_body_uses_fallback() {
        assert_eq!(
            user_message("<html>502</html>", "Falha na comunicação."),
            "Falha na comunicação."
        );
    }

    #[test]
    fn test_unrecognized_json_is_rendered_raw() {
        let body = r#"{"weird": 42}"#;
        assert_eq!(user_message(body, "Falha."), r#"{"weird":42}"#);
    }
}
