use actix_web::middleware::{DefaultHeaders, Logger};
use actix_web::{web, App, HttpServer};
use anyhow::Context;
use log::{error, info};
use predict_api::config::Config;
use predict_api::inference::ModelInference;
use predict_api::routes;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .format_module_path(false)
        .init();

    let config = Config::from_env().context("invalid configuration")?;
    let variant = config.variant;
    let json_limit = config.json_limit;
    info!("Starting {} ({} variant)", variant.title(), variant);

    // Refuse to serve without a complete, consistent set of artifacts.
    let model = match ModelInference::load(variant, &config.artifacts) {
        Ok(model) => model,
        Err(e) => {
            error!("Failed to load model artifacts: {}", e);
            return Err(e).context("failed to load model artifacts");
        }
    };
    let info = model.describe();
    info!(
        "Model ready: {} backend, {} features, target {}",
        info.backend, info.n_features, info.target
    );
    info!("Training columns: {}", info.columns.join(", "));

    let model_data = web::Data::new(model);
    let bind_address = config.bind_address();

    info!("Listening on http://{} with {} workers", bind_address, config.workers);
    info!("   POST /predict");
    if variant == predict_api::schema::Variant::Vehicle {
        info!("   GET  /");
    }

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(DefaultHeaders::new().add(("X-Content-Type-Options", "nosniff")))
            .wrap(routes::cors())
            .app_data(model_data.clone())
            .configure(|cfg| routes::configure(cfg, variant, json_limit))
            .default_service(web::route().to(routes::not_found))
    })
    .workers(config.workers)
    .bind(&bind_address)
    .with_context(|| format!("failed to bind {bind_address}"))?
    .run()
    .await
    .context("server terminated with an error")
}
