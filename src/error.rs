use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;
use serde_json::json;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Kind of a single field-level validation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Missing,
    IntType,
    FloatType,
    StringType,
    GreaterThan,
    GreaterThanEqual,
    LessThan,
    LessThanEqual,
    Enum,
    DictType,
    JsonInvalid,
}

/// One offending location in the request body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldError {
    pub loc: Vec<String>,
    pub msg: String,
    #[serde(rename = "type")]
    pub kind: ErrorKind,
}

impl FieldError {
    pub fn field(name: &str, kind: ErrorKind, msg: impl Into<String>) -> Self {
        FieldError {
            loc: vec!["body".to_string(), name.to_string()],
            msg: msg.into(),
            kind,
        }
    }

    pub fn body(kind: ErrorKind, msg: impl Into<String>) -> Self {
        FieldError {
            loc: vec!["body".to_string()],
            msg: msg.into(),
            kind,
        }
    }

    /// Name of the offending field, if the error targets one.
    pub fn field_name(&self) -> Option<&str> {
        self.loc.get(1).map(String::as_str)
    }
}

/// The request body violates the declared input schema.
///
/// Carries every failing field, not only the first one, and renders as
/// `422 Unprocessable Entity` with a `detail` array.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    pub errors: Vec<FieldError>,
}

impl ValidationError {
    pub fn new(errors: Vec<FieldError>) -> Self {
        ValidationError { errors }
    }

    pub fn single(error: FieldError) -> Self {
        ValidationError {
            errors: vec![error],
        }
    }

    /// True if some error targets `field`.
    pub fn concerns(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field_name() == Some(field))
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let plural = if self.errors.len() == 1 { "" } else { "s" };
        write!(f, "{} validation error{}", self.errors.len(), plural)?;
        for error in &self.errors {
            write!(f, "; {}: {}", error.loc.join("."), error.msg)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

impl ResponseError for ValidationError {
    fn status_code(&self) -> StatusCode {
        StatusCode::UNPROCESSABLE_ENTITY
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({ "detail": self.errors }))
    }
}

/// Failures on the alignment/inference path of an already validated request.
#[derive(Debug, Error)]
pub enum PredictError {
    /// The feature vector does not have the width a downstream stage expects.
    /// Only possible when the column schema, scaler and model come from
    /// different training runs.
    #[error("{stage} expects {expected} features, got {actual}")]
    AlignmentInconsistency {
        stage: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("inference failed: {0}")]
    Inference(String),
    #[error("blocking task failed: {0}")]
    Blocking(String),
}

impl ResponseError for PredictError {
    fn status_code(&self) -> StatusCode {
        StatusCode::INTERNAL_SERVER_ERROR
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({ "detail": self.to_string() }))
    }
}

/// Startup failures while loading the model, scaler or column schema.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to compile ONNX model {}: {message}", path.display())]
    Onnx { path: PathBuf, message: String },
    #[error("invalid artifact {}: {reason}", path.display())]
    Invalid { path: PathBuf, reason: String },
    #[error("artifacts do not belong together: {0}")]
    Inconsistent(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}: {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
    #[error("unknown prediction variant {0:?} (expected `insurance` or `vehicle`)")]
    UnknownVariant(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;

    #[test]
    fn validation_error_lists_every_field() {
        let err = ValidationError::new(vec![
            FieldError::field("age", ErrorKind::Missing, "Field required"),
            FieldError::field("bmi", ErrorKind::LessThan, "Input should be less than 60"),
        ]);
        assert_eq!(
            err.to_string(),
            "2 validation errors; body.age: Field required; body.bmi: Input should be less than 60"
        );
        assert!(err.concerns("age"));
        assert!(!err.concerns("sex"));
    }

    #[actix_web::test]
    async fn validation_error_renders_detail_array() {
        let err = ValidationError::single(FieldError::field(
            "sex",
            ErrorKind::Enum,
            "Input should be 'male' or 'female'",
        ));
        let response = err.error_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let body = to_bytes(response.into_body()).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["detail"][0]["loc"], json!(["body", "sex"]));
        assert_eq!(body["detail"][0]["type"], "enum");
    }

    #[actix_web::test]
    async fn predict_error_renders_text_detail() {
        let err = PredictError::AlignmentInconsistency {
            stage: "scaler",
            expected: 8,
            actual: 7,
        };
        let response = err.error_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = to_bytes(response.into_body()).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["detail"], "scaler expects 8 features, got 7");
    }
}
