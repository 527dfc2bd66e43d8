use crate::schema::Variant;
use serde::ser::{Serialize, SerializeMap, Serializer};

pub const PREDICTION_SUCCESS: &str = "Prediction successful";

/// Success body of `POST /predict`.
///
/// The key of the predicted value depends on the deployment:
/// `{"predicted_cost": 4021.7, "message": "Prediction successful"}`.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionResponse {
    pub variant: Variant,
    pub value: f64,
    pub message: String,
}

impl PredictionResponse {
    pub fn new(variant: Variant, value: f64) -> Self {
        PredictionResponse {
            variant,
            value,
            message: PREDICTION_SUCCESS.to_string(),
        }
    }
}

impl Serialize for PredictionResponse {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry(self.variant.target_key(), &self.value)?;
        map.serialize_entry("message", &self.message)?;
        map.end()
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        MessageResponse {
            message: message.into(),
        }
    }
}
