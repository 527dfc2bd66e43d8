//! Typed input records and their validation.
//!
//! Each deployment serves exactly one [`Variant`]. A raw JSON object from the
//! request body is turned into an [`InputRecord`] by [`InputRecord::from_raw`],
//! which either yields a fully typed record or a [`ValidationError`] naming
//! every offending field.

use crate::encoding::{Feature, TrainingRecord};
use crate::error::{ConfigError, ErrorKind, FieldError, ValidationError};
use serde_json::{json, Map, Value};
use std::fmt;
use std::ops::Bound::{self, Excluded, Included};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    Insurance,
    Vehicle,
}

impl Variant {
    /// Key of the predicted value in the success response.
    pub fn target_key(self) -> &'static str {
        match self {
            Variant::Insurance => "predicted_cost",
            Variant::Vehicle => "predicted_co2",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Variant::Insurance => "Insurance Cost Prediction API",
            Variant::Vehicle => "EcoCar CO2 Predictor",
        }
    }

    pub fn default_model_file(self) -> &'static str {
        match self {
            Variant::Insurance => "my_best_insurance_model.json",
            Variant::Vehicle => "my_best_co2_model.json",
        }
    }

    /// A valid request body for this variant.
    pub fn example(self) -> Value {
        match self {
            Variant::Insurance => json!({
                "age": 30,
                "sex": "male",
                "bmi": 28.5,
                "children": 1,
                "smoker": "no",
                "region": "southeast"
            }),
            Variant::Vehicle => json!({
                "engine_size": 3.5,
                "cylinders": 6,
                "fuel_consumption": 11.2,
                "fuel_type": "Z"
            }),
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Variant::Insurance => "insurance",
            Variant::Vehicle => "vehicle",
        })
    }
}

impl FromStr for Variant {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "insurance" => Ok(Variant::Insurance),
            "vehicle" | "co2" => Ok(Variant::Vehicle),
            _ => Err(ConfigError::UnknownVariant(s.to_string())),
        }
    }
}

/// A closed set of string values accepted by a categorical field.
pub trait Categorical: Sized + Copy + 'static {
    const ALL: &'static [Self];

    fn as_str(self) -> &'static str;

    fn parse(value: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.as_str() == value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sex {
    Male,
    Female,
}

impl Categorical for Sex {
    const ALL: &'static [Self] = &[Sex::Male, Sex::Female];

    fn as_str(self) -> &'static str {
        match self {
            Sex::Male => "male",
            Sex::Female => "female",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Smoker {
    Yes,
    No,
}

impl Categorical for Smoker {
    const ALL: &'static [Self] = &[Smoker::Yes, Smoker::No];

    fn as_str(self) -> &'static str {
        match self {
            Smoker::Yes => "yes",
            Smoker::No => "no",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    Southwest,
    Southeast,
    Northwest,
    Northeast,
}

impl Categorical for Region {
    const ALL: &'static [Self] = &[
        Region::Southwest,
        Region::Southeast,
        Region::Northwest,
        Region::Northeast,
    ];

    fn as_str(self) -> &'static str {
        match self {
            Region::Southwest => "southwest",
            Region::Southeast => "southeast",
            Region::Northwest => "northwest",
            Region::Northeast => "northeast",
        }
    }
}

/// Fuel codes as they appear in the vehicle dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FuelType {
    /// `X`
    Regular,
    /// `Z`
    Premium,
    /// `D`
    Diesel,
    /// `E`
    Ethanol,
}

impl Categorical for FuelType {
    const ALL: &'static [Self] = &[
        FuelType::Regular,
        FuelType::Premium,
        FuelType::Diesel,
        FuelType::Ethanol,
    ];

    fn as_str(self) -> &'static str {
        match self {
            FuelType::Regular => "X",
            FuelType::Premium => "Z",
            FuelType::Diesel => "D",
            FuelType::Ethanol => "E",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InsuranceInput {
    pub age: i64,
    pub sex: Sex,
    pub bmi: f64,
    pub children: i64,
    pub smoker: Smoker,
    pub region: Region,
}

impl InsuranceInput {
    pub fn from_raw(raw: &Map<String, Value>) -> Result<Self, ValidationError> {
        let mut fields = FieldReader::new(raw);
        let age = fields.integer("age", Excluded(0), Included(100));
        let sex = fields.choice::<Sex>("sex");
        let bmi = fields.float("bmi", Excluded(10.0), Excluded(60.0));
        let children = fields.integer("children", Included(0), Included(20));
        let smoker = fields.choice::<Smoker>("smoker");
        let region = fields.choice::<Region>("region");

        let (Some(age), Some(sex), Some(bmi), Some(children), Some(smoker), Some(region)) =
            (age, sex, bmi, children, smoker, region)
        else {
            return Err(fields.into_error());
        };
        Ok(InsuranceInput {
            age,
            sex,
            bmi,
            children,
            smoker,
            region,
        })
    }
}

impl TrainingRecord for InsuranceInput {
    // Trained on the raw dataset column names.
    fn training_features(&self) -> Vec<Feature> {
        vec![
            Feature::numeric("age", self.age as f64),
            Feature::category("sex", self.sex.as_str()),
            Feature::numeric("bmi", self.bmi),
            Feature::numeric("children", self.children as f64),
            Feature::category("smoker", self.smoker.as_str()),
            Feature::category("region", self.region.as_str()),
        ]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VehicleInput {
    /// Litres.
    pub engine_size: f64,
    pub cylinders: i64,
    /// Combined consumption, L/100 km.
    pub fuel_consumption: f64,
    pub fuel_type: FuelType,
}

impl VehicleInput {
    pub fn from_raw(raw: &Map<String, Value>) -> Result<Self, ValidationError> {
        let mut fields = FieldReader::new(raw);
        let engine_size = fields.float("engine_size", Excluded(0.0), Included(10.0));
        let cylinders = fields.integer("cylinders", Excluded(2), Included(16));
        let fuel_consumption = fields.float("fuel_consumption", Excluded(0.0), Included(50.0));
        let fuel_type = fields.choice::<FuelType>("fuel_type");

        let (Some(engine_size), Some(cylinders), Some(fuel_consumption), Some(fuel_type)) =
            (engine_size, cylinders, fuel_consumption, fuel_type)
        else {
            return Err(fields.into_error());
        };
        Ok(VehicleInput {
            engine_size,
            cylinders,
            fuel_consumption,
            fuel_type,
        })
    }
}

impl TrainingRecord for VehicleInput {
    fn training_features(&self) -> Vec<Feature> {
        vec![
            Feature::numeric("Engine_Size", self.engine_size),
            Feature::numeric("Cylinders", self.cylinders as f64),
            Feature::numeric("Comb_Cons", self.fuel_consumption),
            Feature::category("Fuel_Type", self.fuel_type.as_str()),
        ]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum InputRecord {
    Insurance(InsuranceInput),
    Vehicle(VehicleInput),
}

impl InputRecord {
    pub fn from_raw(variant: Variant, raw: &Map<String, Value>) -> Result<Self, ValidationError> {
        match variant {
            Variant::Insurance => InsuranceInput::from_raw(raw).map(InputRecord::Insurance),
            Variant::Vehicle => VehicleInput::from_raw(raw).map(InputRecord::Vehicle),
        }
    }

    /// Validates any JSON value; only objects can become records.
    pub fn from_value(variant: Variant, raw: &Value) -> Result<Self, ValidationError> {
        match raw {
            Value::Object(map) => Self::from_raw(variant, map),
            _ => Err(ValidationError::single(FieldError::body(
                ErrorKind::DictType,
                "Input should be a valid dictionary or object",
            ))),
        }
    }

    pub fn variant(&self) -> Variant {
        match self {
            InputRecord::Insurance(_) => Variant::Insurance,
            InputRecord::Vehicle(_) => Variant::Vehicle,
        }
    }
}

impl TrainingRecord for InputRecord {
    fn training_features(&self) -> Vec<Feature> {
        match self {
            InputRecord::Insurance(input) => input.training_features(),
            InputRecord::Vehicle(input) => input.training_features(),
        }
    }
}

/// Reads typed fields out of a raw object, collecting every failure.
struct FieldReader<'a> {
    raw: &'a Map<String, Value>,
    errors: Vec<FieldError>,
}

impl<'a> FieldReader<'a> {
    fn new(raw: &'a Map<String, Value>) -> Self {
        FieldReader {
            raw,
            errors: Vec::new(),
        }
    }

    fn into_error(self) -> ValidationError {
        ValidationError::new(self.errors)
    }

    fn present(&mut self, name: &str) -> Option<&'a Value> {
        let value = self.raw.get(name);
        if value.is_none() {
            self.errors
                .push(FieldError::field(name, ErrorKind::Missing, "Field required"));
        }
        value
    }

    fn integer(&mut self, name: &str, lower: Bound<i64>, upper: Bound<i64>) -> Option<i64> {
        let value = self.present(name)?;
        let Some(value) = coerce_integer(value) else {
            self.errors.push(FieldError::field(
                name,
                ErrorKind::IntType,
                "Input should be a valid integer",
            ));
            return None;
        };
        self.in_range(name, value, lower, upper)
    }

    fn float(&mut self, name: &str, lower: Bound<f64>, upper: Bound<f64>) -> Option<f64> {
        let value = self.present(name)?;
        let Some(value) = coerce_float(value) else {
            self.errors.push(FieldError::field(
                name,
                ErrorKind::FloatType,
                "Input should be a valid number",
            ));
            return None;
        };
        self.in_range(name, value, lower, upper)
    }

    fn choice<C: Categorical>(&mut self, name: &str) -> Option<C> {
        let value = self.present(name)?;
        let Value::String(value) = value else {
            self.errors.push(FieldError::field(
                name,
                ErrorKind::StringType,
                "Input should be a valid string",
            ));
            return None;
        };
        let parsed = C::parse(value);
        if parsed.is_none() {
            let options: Vec<String> = C::ALL.iter().map(|c| format!("'{}'", c.as_str())).collect();
            self.errors.push(FieldError::field(
                name,
                ErrorKind::Enum,
                format!("Input should be {}", join_options(&options)),
            ));
        }
        parsed
    }

    fn in_range<T>(&mut self, name: &str, value: T, lower: Bound<T>, upper: Bound<T>) -> Option<T>
    where
        T: PartialOrd + fmt::Display + Copy,
    {
        // Comparisons are written so that NaN fails every bound.
        let failure = match lower {
            Excluded(min) if !(value > min) => {
                Some((ErrorKind::GreaterThan, format!("Input should be greater than {min}")))
            }
            Included(min) if !(value >= min) => Some((
                ErrorKind::GreaterThanEqual,
                format!("Input should be greater than or equal to {min}"),
            )),
            _ => None,
        }
        .or_else(|| match upper {
            Excluded(max) if !(value < max) => {
                Some((ErrorKind::LessThan, format!("Input should be less than {max}")))
            }
            Included(max) if !(value <= max) => Some((
                ErrorKind::LessThanEqual,
                format!("Input should be less than or equal to {max}"),
            )),
            _ => None,
        });

        match failure {
            Some((kind, msg)) => {
                self.errors.push(FieldError::field(name, kind, msg));
                None
            }
            None => Some(value),
        }
    }
}

fn coerce_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            let f = n.as_f64()?;
            (f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64).then_some(f as i64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(i64::from(*b)),
        _ => None,
    }
}

fn coerce_float(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(f64::from(u8::from(*b))),
        _ => None,
    }
}

fn join_options(options: &[String]) -> String {
    match options {
        [] => String::new(),
        [only] => only.clone(),
        [init @ .., last] => format!("{} or {}", init.join(", "), last),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("not an object: {other}"),
        }
    }

    fn insurance_with(field: &str, value: Value) -> Result<InsuranceInput, ValidationError> {
        let mut raw = object(Variant::Insurance.example());
        raw.insert(field.to_string(), value);
        InsuranceInput::from_raw(&raw)
    }

    fn vehicle_with(field: &str, value: Value) -> Result<VehicleInput, ValidationError> {
        let mut raw = object(Variant::Vehicle.example());
        raw.insert(field.to_string(), value);
        VehicleInput::from_raw(&raw)
    }

    #[test]
    fn examples_are_valid() {
        let insurance = InsuranceInput::from_raw(&object(Variant::Insurance.example())).unwrap();
        assert_eq!(
            insurance,
            InsuranceInput {
                age: 30,
                sex: Sex::Male,
                bmi: 28.5,
                children: 1,
                smoker: Smoker::No,
                region: Region::Southeast,
            }
        );

        let vehicle = VehicleInput::from_raw(&object(Variant::Vehicle.example())).unwrap();
        assert_eq!(vehicle.fuel_type, FuelType::Premium);
        assert_eq!(vehicle.cylinders, 6);
    }

    #[test]
    fn rejects_out_of_range_insurance_values() {
        let cases = [
            ("age", json!(0), ErrorKind::GreaterThan),
            ("age", json!(101), ErrorKind::LessThanEqual),
            ("bmi", json!(9.9), ErrorKind::GreaterThan),
            ("bmi", json!(60.0), ErrorKind::LessThan),
            ("children", json!(-1), ErrorKind::GreaterThanEqual),
            ("children", json!(21), ErrorKind::LessThanEqual),
            ("sex", json!("M"), ErrorKind::Enum),
            ("smoker", json!("Yes"), ErrorKind::Enum),
            ("region", json!("north"), ErrorKind::Enum),
        ];
        for (field, value, kind) in cases {
            let err = insurance_with(field, value.clone()).unwrap_err();
            assert_eq!(err.errors.len(), 1, "{field}={value}");
            assert_eq!(err.errors[0].field_name(), Some(field));
            assert_eq!(err.errors[0].kind, kind, "{field}={value}");
        }
    }

    #[test]
    fn rejects_out_of_range_vehicle_values() {
        let cases = [
            ("fuel_type", json!("P"), ErrorKind::Enum),
            ("cylinders", json!(2), ErrorKind::GreaterThan),
            ("cylinders", json!(17), ErrorKind::LessThanEqual),
            ("engine_size", json!(10.01), ErrorKind::LessThanEqual),
            ("engine_size", json!(0.0), ErrorKind::GreaterThan),
            ("fuel_consumption", json!(50.5), ErrorKind::LessThanEqual),
        ];
        for (field, value, kind) in cases {
            let err = vehicle_with(field, value.clone()).unwrap_err();
            assert_eq!(err.errors.len(), 1, "{field}={value}");
            assert!(err.concerns(field));
            assert_eq!(err.errors[0].kind, kind, "{field}={value}");
        }
    }

    #[test]
    fn accepts_boundary_adjacent_values() {
        assert_eq!(insurance_with("age", json!(1)).unwrap().age, 1);
        assert_eq!(insurance_with("age", json!(100)).unwrap().age, 100);
        assert_eq!(insurance_with("children", json!(0)).unwrap().children, 0);
        assert_eq!(insurance_with("children", json!(20)).unwrap().children, 20);
        assert_eq!(insurance_with("bmi", json!(59.99)).unwrap().bmi, 59.99);
        assert_eq!(vehicle_with("cylinders", json!(3)).unwrap().cylinders, 3);
        assert_eq!(vehicle_with("cylinders", json!(16)).unwrap().cylinders, 16);
        assert_eq!(vehicle_with("engine_size", json!(10.0)).unwrap().engine_size, 10.0);
    }

    #[test]
    fn coerces_lax_numeric_inputs() {
        assert_eq!(insurance_with("age", json!("42")).unwrap().age, 42);
        assert_eq!(insurance_with("age", json!(42.0)).unwrap().age, 42);
        assert_eq!(insurance_with("bmi", json!("31.2")).unwrap().bmi, 31.2);
        assert_eq!(insurance_with("bmi", json!(31)).unwrap().bmi, 31.0);
    }

    #[test]
    fn booleans_count_as_zero_or_one() {
        assert_eq!(insurance_with("children", json!(true)).unwrap().children, 1);
        assert_eq!(insurance_with("children", json!(false)).unwrap().children, 0);
        assert_eq!(insurance_with("age", json!(true)).unwrap().age, 1);

        // Still subject to the range checks.
        let err = insurance_with("age", json!(false)).unwrap_err();
        assert_eq!(err.errors[0].kind, ErrorKind::GreaterThan);
        let err = insurance_with("bmi", json!(true)).unwrap_err();
        assert_eq!(err.errors[0].kind, ErrorKind::GreaterThan);
    }

    #[test]
    fn rejects_wrong_types() {
        let err = insurance_with("age", json!(30.5)).unwrap_err();
        assert_eq!(err.errors[0].kind, ErrorKind::IntType);

        let err = insurance_with("bmi", json!("heavy")).unwrap_err();
        assert_eq!(err.errors[0].kind, ErrorKind::FloatType);

        let err = insurance_with("bmi", json!("NaN")).unwrap_err();
        assert_eq!(err.errors[0].kind, ErrorKind::GreaterThan);

        let err = vehicle_with("fuel_type", json!(1)).unwrap_err();
        assert_eq!(err.errors[0].kind, ErrorKind::StringType);

        let err = vehicle_with("cylinders", Value::Null).unwrap_err();
        assert_eq!(err.errors[0].kind, ErrorKind::IntType);
    }

    #[test]
    fn reports_every_missing_field() {
        let err = InsuranceInput::from_raw(&object(json!({ "age": 30, "sex": "male" }))).unwrap_err();
        let missing: Vec<_> = err.errors.iter().filter_map(FieldError::field_name).collect();
        assert_eq!(missing, vec!["bmi", "children", "smoker", "region"]);
        assert!(err.errors.iter().all(|e| e.kind == ErrorKind::Missing));
    }

    #[test]
    fn collects_errors_across_fields() {
        let raw = object(json!({
            "engine_size": 12.0,
            "cylinders": 1,
            "fuel_consumption": 8.0,
            "fuel_type": "P"
        }));
        let err = VehicleInput::from_raw(&raw).unwrap_err();
        assert_eq!(err.errors.len(), 3);
        assert!(err.concerns("engine_size"));
        assert!(err.concerns("cylinders"));
        assert!(err.concerns("fuel_type"));
    }

    #[test]
    fn ignores_unknown_fields() {
        let mut raw = object(Variant::Vehicle.example());
        raw.insert("colour".to_string(), json!("red"));
        assert!(VehicleInput::from_raw(&raw).is_ok());
    }

    #[test]
    fn enum_error_lists_options() {
        let err = vehicle_with("fuel_type", json!("N")).unwrap_err();
        assert_eq!(err.errors[0].msg, "Input should be 'X', 'Z', 'D' or 'E'");
    }

    #[test]
    fn non_object_body_is_rejected() {
        let err = InputRecord::from_value(Variant::Insurance, &json!([1, 2])).unwrap_err();
        assert_eq!(err.errors[0].kind, ErrorKind::DictType);
        assert_eq!(err.errors[0].field_name(), None);
    }

    #[test]
    fn parses_variant_names() {
        assert_eq!("insurance".parse::<Variant>().unwrap(), Variant::Insurance);
        assert_eq!(" Vehicle ".parse::<Variant>().unwrap(), Variant::Vehicle);
        assert!("weather".parse::<Variant>().is_err());
        assert_eq!(Variant::Vehicle.target_key(), "predicted_co2");
    }
}
