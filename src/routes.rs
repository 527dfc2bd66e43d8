use crate::error::{ErrorKind, FieldError, PredictError, ValidationError};
use crate::inference::ModelInference;
use crate::models::{MessageResponse, PredictionResponse};
use crate::schema::{InputRecord, Variant};
use actix_cors::Cors;
use actix_web::error::JsonPayloadError;
use actix_web::{web, HttpRequest, HttpResponse};
use log::{error, info, warn};
use serde_json::{json, Value};
use std::time::Instant;

pub const DEFAULT_JSON_LIMIT: usize = 64 * 1024;

/// Registers the prediction routes for one deployment.
pub fn configure(cfg: &mut web::ServiceConfig, variant: Variant, json_limit: usize) {
    cfg.app_data(
        web::JsonConfig::default()
            .limit(json_limit)
            .error_handler(json_error_handler),
    )
    .route("/predict", web::post().to(predict));

    if variant == Variant::Vehicle {
        cfg.route("/", web::get().to(root));
    }
}

/// Every origin, method and header, with credentials.
pub fn cors() -> Cors {
    Cors::default()
        .allow_any_origin()
        .allow_any_method()
        .allow_any_header()
        .supports_credentials()
        .max_age(3600)
}

pub async fn not_found() -> HttpResponse {
    HttpResponse::NotFound().json(json!({ "detail": "Not Found" }))
}

async fn root() -> HttpResponse {
    HttpResponse::Ok().json(MessageResponse::new("CO2 Emission API is Live."))
}

async fn predict(
    model: web::Data<ModelInference>,
    body: web::Json<Value>,
) -> Result<HttpResponse, actix_web::Error> {
    let start_time = Instant::now();
    let variant = model.variant();
    info!("Prediction request received ({variant})");

    let record = match InputRecord::from_value(variant, &body) {
        Ok(record) => record,
        Err(e) => {
            warn!("Validation failed: {}", e);
            return Err(e.into());
        }
    };

    let model_clone = model.clone();
    let outcome = match web::block(move || model_clone.predict(&record)).await {
        Ok(result) => result,
        Err(e) => Err(PredictError::Blocking(e.to_string())),
    };

    match outcome {
        Ok(value) => {
            info!(
                "Prediction successful: {}={:.3} in {}ms",
                variant.target_key(),
                value,
                start_time.elapsed().as_millis()
            );
            Ok(HttpResponse::Ok().json(PredictionResponse::new(variant, value)))
        }
        Err(e) => {
            error!("Prediction failed: {}", e);
            Err(e.into())
        }
    }
}

fn json_error_handler(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    let detail = match err {
        JsonPayloadError::Overflow { .. } | JsonPayloadError::OverflowKnownLength { .. } => {
            warn!("Rejected request body: {}", err);
            return err.into();
        }
        JsonPayloadError::ContentType => FieldError::body(
            ErrorKind::JsonInvalid,
            "Expected a JSON body with Content-Type: application/json",
        ),
        other => FieldError::body(ErrorKind::JsonInvalid, format!("JSON decode error: {other}")),
    };
    warn!("Rejected request body: {}", detail.msg);
    ValidationError::single(detail).into()
}
