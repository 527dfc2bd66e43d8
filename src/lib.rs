//! Serves a pre-trained tabular regression model over HTTP.
//!
//! A deployment loads one column schema, scaler and model at startup and
//! answers `POST /predict` by validating the body ([`schema`]), aligning it
//! to the training columns ([`encoding`]) and running the model
//! ([`inference`]).

pub mod artifacts;
pub mod config;
pub mod encoding;
pub mod error;
pub mod inference;
pub mod models;
pub mod routes;
pub mod schema;
