use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// Body returned by `POST /chat`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChatReply {
    /// The user message the server answered, echoed back.
    #[serde(default)]
    pub message: String,

    /// The assistant's reply, as markdown.
    pub response: String,

    /// The backend that produced the reply.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,

    /// Whether the backend drew on retrieved context for this reply.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_used: Option<bool>,
}

impl ChatReply {
    /// Create a reply carrying only response text.
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            message: String::new(),
            response: response.into(),
            provider: None,
            context_used: None,
        }
    }

    /// Attach a provider tag.
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Validate an untyped JSON body against the reply contract.
    ///
    /// Shape violations are reported as [`Error::MalformedResponse`] naming the
    /// offending field, so they never reach rendering as placeholder text.
    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Object(object) = value else {
            return Err(Error::malformed_response(
                format!("expected a JSON object, got {}", kind_of(&value)),
                None,
            ));
        };
        let response = match object.get("response") {
            Some(Value::String(s)) => s.clone(),
            Some(other) => {
                return Err(Error::malformed_response(
                    format!("expected a string, got {}", kind_of(other)),
                    Some("response".to_string()),
                ));
            }
            None => {
                return Err(Error::malformed_response(
                    "missing reply text",
                    Some("response".to_string()),
                ));
            }
        };
        let message = optional_field(&object, "message", |v| v.as_str().map(String::from))?
            .unwrap_or_default();
        let provider = optional_field(&object, "provider", |v| v.as_str().map(String::from))?;
        let context_used = optional_field(&object, "contextUsed", Value::as_bool)?;
        Ok(Self {
            message,
            response,
            provider,
            context_used,
        })
    }
}

fn optional_field<T>(
    object: &serde_json::Map<String, Value>,
    field: &str,
    extract: impl Fn(&Value) -> Option<T>,
) -> Result<Option<T>> {
    match object.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => extract(value).map(Some).ok_or_else(|| {
            Error::malformed_response(
                format!("unexpected {}", kind_of(value)),
                Some(field.to_string()),
            )
        }),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn full_reply() {
        let reply = ChatReply::from_value(json!({
            "message": "hi",
            "response": "Hello!",
            "provider": "anthropic",
            "contextUsed": true
        }))
        .unwrap();
        assert_eq!(reply.message, "hi");
        assert_eq!(reply.response, "Hello!");
        assert_eq!(reply.provider.as_deref(), Some("anthropic"));
        assert_eq!(reply.context_used, Some(true));
    }

    #[test]
    fn minimal_reply() {
        let reply = ChatReply::from_value(json!({"response": "ok", "provider": null})).unwrap();
        assert_eq!(reply, ChatReply::new("ok"));
    }

    #[test]
    fn missing_response_is_malformed() {
        let err = ChatReply::from_value(json!({"message": "hi"})).unwrap_err();
        assert!(err.is_malformed_response());
        assert!(err.to_string().contains("response"));
    }

    #[test]
    fn wrong_types_are_malformed() {
        let err = ChatReply::from_value(json!({"response": 7})).unwrap_err();
        assert!(matches!(
            err,
            Error::MalformedResponse { field: Some(ref f), .. } if f == "response"
        ));

        let err = ChatReply::from_value(json!({"response": "ok", "provider": 3})).unwrap_err();
        assert!(matches!(
            err,
            Error::MalformedResponse { field: Some(ref f), .. } if f == "provider"
        ));

        let err = ChatReply::from_value(json!(["response"])).unwrap_err();
        assert!(err.to_string().contains("array"));
    }

    #[test]
    fn serializes_camel_case() {
        let mut reply = ChatReply::new("x").with_provider("p");
        reply.context_used = Some(false);
        let json = serde_json::to_value(&reply).unwrap();
        assert_eq!(json["contextUsed"], json!(false));
        assert_eq!(json["provider"], json!("p"));
    }
}
