use crate::controller::ParamSource;
use crate::di::{Dependencies, Injectable};
use crate::error::DiResult;
use crate::exception::{Exception, HttpException};
use crate::pipe::{Argument, ArgumentMetadata, Pipe, ValidationFailure};
use async_trait::async_trait;
use serde_json::{Map, Value, json};

/// A pipe that parses a numeric string into an integer
#[derive(Debug, Clone, Copy, Default)]
pub struct ParseIntPipe;

impl Injectable for ParseIntPipe {
    fn inject(_: &mut Dependencies) -> DiResult<Self> {
        Ok(ParseIntPipe)
    }
}

#[async_trait]
impl Pipe for ParseIntPipe {
    async fn transform(&self, value: Argument, _: &ArgumentMetadata) -> Result<Argument, Exception> {
        let invalid = || HttpException::bad_request("Validation failed (numeric string is expected)");
        match value {
            Argument::Json(Value::String(text)) => {
                let number = text.trim().parse::<i64>().map_err(|_| invalid())?;
                Ok(Argument::Json(json!(number)))
            }
            Argument::Json(Value::Number(number)) if number.is_i64() || number.is_u64() => {
                Ok(Argument::Json(Value::Number(number)))
            }
            Argument::Json(_) => Err(invalid().into()),
            other => Ok(other),
        }
    }
}

/// Validates arguments whose declared type carries validation rules
/// (parameters marked `#[valid]`).
///
/// Other arguments pass through unchanged. A failure is a `400` listing
/// each invalid property with its value and violated constraints.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidationPipe;

impl Injectable for ValidationPipe {
    fn inject(_: &mut Dependencies) -> DiResult<Self> {
        Ok(ValidationPipe)
    }
}

impl ValidationPipe {
    fn failure(value: &Value, failure: ValidationFailure) -> HttpException {
        let errors: Vec<Value> = match failure {
            ValidationFailure::Malformed(message) => vec![json!({
                "property": Value::Null,
                "value": value,
                "constraints": { "type": message },
            })],
            ValidationFailure::Invalid(errors) => {
                let mut fields: Vec<(String, Map<String, Value>)> = errors
                    .field_errors()
                    .into_iter()
                    .map(|(property, errors)| {
                        let property = property.to_string();
                        let constraints = errors
                            .iter()
                            .map(|error| {
                                let message = match &error.message {
                                    Some(message) => message.to_string(),
                                    None => format!("{} failed {} validation", property, error.code),
                                };
                                (error.code.to_string(), Value::String(message))
                            })
                            .collect();
                        (property, constraints)
                    })
                    .collect();
                fields.sort_by(|a, b| a.0.cmp(&b.0));
                fields
                    .into_iter()
                    .map(|(property, constraints)| {
                        json!({
                            "property": property,
                            "value": value.get(&property).cloned().unwrap_or(Value::Null),
                            "constraints": constraints,
                        })
                    })
                    .collect()
            }
        };
        tracing::debug!("Validation failed: {:?}", errors);
        HttpException::bad_request(json!({
            "message": "Input data validation failed",
            "errors": errors,
        }))
    }
}

#[async_trait]
impl Pipe for ValidationPipe {
    async fn transform(&self, value: Argument, metadata: &ArgumentMetadata) -> Result<Argument, Exception> {
        let Some(validate) = metadata.param_type.validator else {
            return Ok(value);
        };
        if metadata.source == ParamSource::Request || metadata.source == ParamSource::File {
            return Ok(value);
        }
        let Argument::Json(json) = &value else {
            return Ok(value);
        };
        match validate(json) {
            Ok(()) => Ok(value),
            Err(failure) => Err(Self::failure(json, failure).into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::ParamType;
    use axum::http::StatusCode;
    use serde::{Deserialize, Serialize};
    use validator::Validate;

    #[derive(Debug, Serialize, Deserialize, Validate)]
    struct CreateItem {
        #[validate(length(min = 1))]
        name: String,
        #[validate(range(max = 100))]
        quantity: u32,
    }

    fn metadata(param_type: ParamType) -> ArgumentMetadata {
        ArgumentMetadata {
            source: ParamSource::Body,
            param_type,
            key: None,
        }
    }

    #[tokio::test]
    async fn parse_int_converts_numeric_strings() {
        let meta = metadata(ParamType::of::<i64>());
        let parsed = ParseIntPipe.transform(Argument::Json(json!("42")), &meta).await.unwrap();
        assert_eq!(parsed.as_json(), Some(&json!(42)));

        let err = ParseIntPipe.transform(Argument::Json(json!("4x")), &meta).await.unwrap_err();
        assert_eq!(err.status(), Some(StatusCode::BAD_REQUEST));
        assert_eq!(err.message(), "Validation failed (numeric string is expected)");
    }

    #[tokio::test]
    async fn validation_reports_each_property() {
        let meta = metadata(ParamType::validated::<CreateItem>());
        let input = json!({"name": "", "quantity": 200});

        let err = ValidationPipe.transform(Argument::Json(input), &meta).await.unwrap_err();
        assert_eq!(err.status(), Some(StatusCode::BAD_REQUEST));

        let payload = err.response().unwrap();
        assert_eq!(payload["message"], "Input data validation failed");
        assert_eq!(payload["statusCode"], 400);
        let errors = payload["errors"].as_array().unwrap();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0]["property"], "name");
        assert_eq!(errors[1]["property"], "quantity");
        assert_eq!(errors[1]["value"], 200);
        assert!(errors[1]["constraints"]["range"].is_string());
    }

    #[tokio::test]
    async fn validation_skips_plain_types() {
        let meta = metadata(ParamType::of::<Value>());
        let value = ValidationPipe
            .transform(Argument::Json(json!({"quantity": 200})), &meta)
            .await
            .unwrap();
        assert_eq!(value.as_json(), Some(&json!({"quantity": 200})));

        let meta = metadata(ParamType::validated::<CreateItem>());
        assert!(ValidationPipe
            .transform(Argument::Json(json!({"name": "x", "quantity": 2})), &meta)
            .await
            .is_ok());
    }
}
