/// Convert Service - HTTP Server
///
/// Accepts conversion requests, serves status polling, and dispatches
/// work items to the conversion workers.
use actix_web::{middleware as actix_middleware, web, App, HttpResponse, HttpServer};
use convert_service::db::PgConvertRepo;
use convert_service::handlers;
use convert_service::kafka::ConvertJobProducer;
use convert_service::middleware::{JwtAuth, RequestTimer};
use convert_service::services::RequestService;
use convert_service::storage::S3Storage;
use convert_service::Config;
use sqlx::postgres::PgPoolOptions;
use std::io;
use std::sync::Arc;

#[actix_web::main]
async fn main() -> io::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    // Load configuration from environment
    dotenvy::dotenv().ok();
    let config = Config::from_env()
        .map_err(|e| io::Error::new(io::ErrorKind::Other, format!("{e}")))?;

    let bind_address = format!("{}:{}", config.app.host, config.app.port);

    let jwt_secret = config.auth.jwt_secret.clone().ok_or_else(|| {
        io::Error::new(io::ErrorKind::Other, "JWT_SECRET not set")
    })?;

    // Initialize database connection pool
    let db_pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&config.database.url)
        .await
        .map_err(|e| {
            io::Error::new(io::ErrorKind::Other, format!("Failed to connect to database: {e}"))
        })?;

    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await
        .map_err(|e| io::Error::new(io::ErrorKind::Other, format!("Migration failed: {e}")))?;

    // Object storage; the pipeline cannot run without it, so fail fast.
    let storage = S3Storage::from_config(&config.s3)
        .await
        .map_err(|e| io::Error::new(io::ErrorKind::Other, format!("{e}")))?;
    storage
        .health_check()
        .await
        .map_err(|e| io::Error::new(io::ErrorKind::Other, format!("{e}")))?;

    // Dispatch channel handle, owned here and injected into the service.
    let producer = ConvertJobProducer::new(&config.kafka.brokers, &config.kafka.jobs_topic)
        .map_err(|e| io::Error::new(io::ErrorKind::Other, format!("{e}")))?;

    let request_service = Arc::new(RequestService::new(
        Arc::new(PgConvertRepo::new(db_pool)),
        Arc::new(storage),
        Arc::new(producer),
    ));

    tracing::info!(%bind_address, "convert-service starting HTTP server");

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(request_service.clone()))
            .wrap(actix_middleware::Logger::default())
            .route(
                "/api/v1/health",
                web::get()
                    .to(|| async { HttpResponse::Ok().json(serde_json::json!({"status": "ok"})) }),
            )
            .route(
                "/api/v1/health/ready",
                web::get().to(|| async { HttpResponse::Ok().finish() }),
            )
            .route(
                "/api/v1/health/live",
                web::get().to(|| async { HttpResponse::Ok().finish() }),
            )
            .service(
                web::scope("/api/v1")
                    .wrap(JwtAuth::new(jwt_secret.clone()))
                    .wrap(RequestTimer)
                    .service(
                        web::scope("/requests")
                            .route("", web::post().to(handlers::submit_request))
                            .route("", web::get().to(handlers::list_requests))
                            .route("/{request_id}", web::get().to(handlers::get_request))
                            .route("/{request_id}", web::delete().to(handlers::delete_request)),
                    ),
            )
    })
    .bind(&bind_address)?
    .run()
    .await?;

    tracing::info!("convert-service shutting down");

    Ok(())
}
