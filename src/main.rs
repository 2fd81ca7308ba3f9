//! Main entry point for the identity service.
//!
//! Initializes logging and configuration, connects to the database, runs
//! migrations and starts the actix-web server with the user routes and the
//! session middleware.

use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;

use identity_auth::config::AppConfig;
use identity_auth::handlers;
use identity_auth::services::{
    AccountService, PgUserStore, RateLimits, SessionAuth, SessionSigner, SmtpMailer, UserStore,
};

#[actix_web::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();
    dotenv::dotenv().ok();

    let config = AppConfig::from_env()?;

    tracing::info!("connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("database connection established");

    let store: Arc<dyn UserStore> = Arc::new(PgUserStore::new(pool));
    let mailer = Arc::new(SmtpMailer::new(&config.smtp)?);
    let signer = SessionSigner::new(&config.jwt_secret);

    let accounts = web::Data::new(AccountService::new(
        store.clone(),
        mailer,
        signer.clone(),
        config.base_url.clone(),
    ));
    let limits = web::Data::new(RateLimits::new());
    let store_data: web::Data<dyn UserStore> = web::Data::from(store);

    let port = config.port;
    tracing::info!(port, "starting identity service");

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .supports_credentials();

        App::new()
            .wrap(cors)
            .wrap(Logger::default())
            .app_data(accounts.clone())
            .app_data(limits.clone())
            .app_data(store_data.clone())
            .route("/healthz", web::get().to(handlers::auth::healthz))
            .configure(|cfg| handlers::configure_routes(cfg, SessionAuth::new(signer.clone())))
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await?;

    Ok(())
}
