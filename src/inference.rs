use crate::artifacts::{self, ArtifactPaths, Regressor, Scaler};
use crate::encoding::{self, FeatureVector, TrainingColumns};
use crate::error::{ArtifactError, PredictError};
use crate::schema::{InputRecord, Variant};
use log::info;

/// Everything needed to answer a prediction, loaded once at startup and
/// shared read-only between workers.
pub struct ModelInference {
    variant: Variant,
    columns: TrainingColumns,
    scaler: Scaler,
    model: Box<dyn Regressor>,
}

impl ModelInference {
    pub fn load(variant: Variant, paths: &ArtifactPaths) -> Result<Self, ArtifactError> {
        let columns = artifacts::load_columns(&paths.columns)?;
        info!("Loaded {} training columns from {}", columns.len(), paths.columns.display());

        let scaler = Scaler::load(&paths.scaler)?;
        info!("Loaded scaler from {}", paths.scaler.display());

        let model = artifacts::load_regressor(&paths.model, columns.len())?;
        info!("Loaded {} model from {}", model.backend(), paths.model.display());

        Self::from_parts(variant, columns, scaler, model)
    }

    /// Assembles the predictor, refusing artifacts from different training runs.
    pub fn from_parts(
        variant: Variant,
        columns: TrainingColumns,
        scaler: Scaler,
        model: Box<dyn Regressor>,
    ) -> Result<Self, ArtifactError> {
        if scaler.n_features() != columns.len() {
            return Err(ArtifactError::Inconsistent(format!(
                "scaler was fitted on {} features but the column schema has {}",
                scaler.n_features(),
                columns.len()
            )));
        }
        if let Some(names) = scaler.feature_names() {
            if names != columns.names() {
                return Err(ArtifactError::Inconsistent(
                    "scaler feature names differ from the column schema".to_string(),
                ));
            }
        }
        if model.n_features() != columns.len() {
            return Err(ArtifactError::Inconsistent(format!(
                "model expects {} features but the column schema has {}",
                model.n_features(),
                columns.len()
            )));
        }

        Ok(ModelInference {
            variant,
            columns,
            scaler,
            model,
        })
    }

    pub fn variant(&self) -> Variant {
        self.variant
    }

    /// Encoded and scaled features, ready for the model.
    pub fn features(&self, record: &InputRecord) -> Result<FeatureVector, PredictError> {
        let encoded = encoding::encode(record, &self.columns);
        debug_assert_eq!(encoded.len(), self.columns.len());
        self.scaler.transform(&encoded)
    }

    pub fn predict(&self, record: &InputRecord) -> Result<f64, PredictError> {
        if record.variant() != self.variant {
            return Err(PredictError::Inference(format!(
                "{} record sent to the {} model",
                record.variant(),
                self.variant
            )));
        }
        let scaled = self.features(record)?;
        let prediction = self.model.predict(&scaled)?;
        if !prediction.is_finite() {
            return Err(PredictError::Inference(format!(
                "model produced a non-finite prediction ({prediction})"
            )));
        }
        Ok(prediction)
    }

    pub fn describe(&self) -> ModelInfo {
        ModelInfo {
            variant: self.variant,
            target: self.variant.target_key(),
            backend: self.model.backend(),
            n_features: self.columns.len(),
            columns: self.columns.names().to_vec(),
        }
    }
}

#[derive(Debug)]
pub struct ModelInfo {
    pub variant: Variant,
    pub target: &'static str,
    pub backend: &'static str,
    pub n_features: usize,
    pub columns: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::LinearModel;
    use crate::schema::{FuelType, VehicleInput};

    fn vehicle_columns() -> TrainingColumns {
        TrainingColumns::new(
            ["Engine_Size", "Cylinders", "Comb_Cons", "Fuel_Type_X", "Fuel_Type_Z"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        )
        .unwrap()
    }

    fn vehicle_model() -> ModelInference {
        let scaler = Scaler::new(vec![3.0, 5.0, 10.0, 0.5, 0.5], vec![1.0, 2.0, 2.0, 0.5, 0.5]).unwrap();
        let model = LinearModel::new(vec![20.0, 5.0, 30.0, -4.0, 4.0], 250.0).unwrap();
        ModelInference::from_parts(Variant::Vehicle, vehicle_columns(), scaler, Box::new(model)).unwrap()
    }

    fn record(fuel_type: FuelType) -> InputRecord {
        InputRecord::Vehicle(VehicleInput {
            engine_size: 3.5,
            cylinders: 6,
            fuel_consumption: 11.2,
            fuel_type,
        })
    }

    #[test]
    fn predicts_through_encode_scale_and_model() {
        let inference = vehicle_model();
        let scaled = inference.features(&record(FuelType::Premium)).unwrap();
        let expected = [0.5, 0.5, 0.6, -1.0, 1.0];
        for (got, want) in scaled.as_slice().iter().zip(expected) {
            assert!((got - want).abs() < 1e-9, "{got} != {want}");
        }

        // 250 + 10 + 2.5 + 18 + 4 + 4
        let y = inference.predict(&record(FuelType::Premium)).unwrap();
        assert!((y - 288.5).abs() < 1e-9);
    }

    #[test]
    fn prediction_is_deterministic() {
        let inference = vehicle_model();
        let first = inference.predict(&record(FuelType::Diesel)).unwrap();
        for _ in 0..10 {
            assert_eq!(inference.predict(&record(FuelType::Diesel)).unwrap(), first);
        }
    }

    #[test]
    fn rejects_scaler_of_another_width() {
        let scaler = Scaler::new(vec![0.0; 4], vec![1.0; 4]).unwrap();
        let model = LinearModel::new(vec![1.0; 5], 0.0).unwrap();
        let result = ModelInference::from_parts(Variant::Vehicle, vehicle_columns(), scaler, Box::new(model));
        assert!(matches!(result, Err(ArtifactError::Inconsistent(_))));
    }

    #[test]
    fn rejects_model_of_another_width() {
        let scaler = Scaler::new(vec![0.0; 5], vec![1.0; 5]).unwrap();
        let model = LinearModel::new(vec![1.0; 6], 0.0).unwrap();
        let result = ModelInference::from_parts(Variant::Vehicle, vehicle_columns(), scaler, Box::new(model));
        assert!(matches!(result, Err(ArtifactError::Inconsistent(_))));
    }

    #[test]
    fn describe_reports_target_and_columns() {
        let info = vehicle_model().describe();
        assert_eq!(info.target, "predicted_co2");
        assert_eq!(info.backend, "linear");
        assert_eq!(info.n_features, 5);
        assert_eq!(info.columns[2], "Comb_Cons");
    }
}
