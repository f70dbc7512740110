use actix_cors::Cors;
use actix_web::{App, HttpServer, web};
use fruitveg::config::AppConfig;
use fruitveg::inference::load_classifier;
use fruitveg::pipeline::ClassificationPipeline;
use fruitveg::routes::configure_routes;
use fruitveg::storage::local_store::LocalStore;
use std::env;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    if let Ok(current_dir) = env::current_dir() {
        log::info!("Current working directory: {}", current_dir.display());
    } else {
        log::error!("Failed to get the current working directory.");
    }

    let config = AppConfig::from_env().map_err(|e| {
        log::error!("{}", e);
        std::io::Error::other(e.to_string())
    })?;

    log::info!("Base directory: {}", config.base_dir.display());
    log::info!("Using model:  {}", config.classifier.model_path.display());
    log::info!("Using labels: {}", config.classifier.labels_path.display());
    log::info!(
        "Blobs: {} / {}",
        config.classifier.input_tensor_name,
        config.classifier.output_tensor_name
    );

    let classifier = load_classifier(&config.classifier).map_err(|e| {
        log::error!("Failed to load network at startup: {}", e);
        std::io::Error::other(format!("Model loading failed: {}", e))
    })?;
    log::info!("Loaded network '{}'", classifier.network_name());

    let pipeline = ClassificationPipeline::new(classifier);
    let store = LocalStore::new(&config.static_dir, config.max_content_length);
    store.ensure_dirs().map_err(|e| {
        log::error!("{}", e);
        std::io::Error::other(e.to_string())
    })?;

    let static_dir = config.static_dir.clone();
    let bind_address = format!("0.0.0.0:{}", config.port);
    log::info!(
        "Serving {} (max upload {} bytes)",
        static_dir.display(),
        config.max_content_length
    );
    log::info!("Starting server on {}", bind_address);

    HttpServer::new(move || {
        App::new()
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allowed_methods(vec!["GET", "POST", "OPTIONS"])
                    .allowed_headers(vec![
                        actix_web::http::header::ACCEPT,
                        actix_web::http::header::CONTENT_TYPE,
                    ])
                    .max_age(3600),
            )
            .app_data(web::Data::new(pipeline.clone()))
            .app_data(web::Data::new(store.clone()))
            .configure(|cfg| configure_routes(cfg, static_dir.clone()))
    })
    .bind(&bind_address)?
    .run()
    .await
}
