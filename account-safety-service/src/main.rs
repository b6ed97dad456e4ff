use account_safety_service::{
    config::Config,
    db::{AppealsDb, BansDb, RecoveryCodesDb, UsersDb},
    grpc::{
        server::account_safety::account_safety_service_server::AccountSafetyServiceServer,
        AccountSafetyServiceImpl,
    },
    services::{
        AppealService, BanService, DeviceService, ImpersonationService, StatusSynchronizer,
    },
};
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "account_safety_service=info,info".into()),
        )
        .with_target(false)
        .init();

    tracing::info!("Starting Account Safety Service...");

    // Load configuration
    let config = Arc::new(Config::from_env()?);
    tracing::info!(
        service = %config.service_name,
        environment = %config.environment,
        grpc_port = %config.grpc_port,
        "Configuration loaded"
    );

    // Initialize database pool using shared library
    let db_config = db_pool::DbConfig::for_service(&config.service_name);
    db_config.log_config();
    let db = Arc::new(db_pool::create_pool(db_config).await?);

    // Run migrations
    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations").run(&*db).await.map_err(|e| {
        tracing::error!("Migration failed: {}", e);
        e
    })?;
    tracing::info!("Migrations completed");

    // Initialize services
    let ban_service = Arc::new(BanService::new(db.clone(), config.clone()));
    let appeal_service = Arc::new(AppealService::new(db.clone()));
    let device_service = Arc::new(DeviceService::new(db.clone(), config.clone()));
    let impersonation_service = Arc::new(ImpersonationService::new(db.clone()));
    let status_sync = Arc::new(StatusSynchronizer::new(db.clone()));
    let bans_db = Arc::new(BansDb::new(db.clone()));
    let appeals_db = Arc::new(AppealsDb::new(db.clone()));
    let users_db = Arc::new(UsersDb::new(db.clone()));
    let recovery_codes = Arc::new(RecoveryCodesDb::new(db.clone()));

    // Optional background sweep: re-runs the reconciliation pass for
    // hygiene. Expiry stays lazy at read time either way.
    if config.status_sync_interval_secs > 0 {
        let sweep_sync = status_sync.clone();
        let interval_secs = config.status_sync_interval_secs;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if let Err(e) = sweep_sync.reconcile().await {
                    tracing::error!("Background status sync failed: {}", e);
                }
            }
        });
        tracing::info!(
            interval_secs = interval_secs,
            "Background status sync sweep enabled"
        );
    }

    // Create gRPC service
    let safety_service = AccountSafetyServiceImpl::new(
        ban_service,
        appeal_service,
        device_service,
        impersonation_service,
        status_sync,
        bans_db,
        appeals_db,
        users_db,
        recovery_codes,
    );

    // Start health check server (HTTP)
    let health_addr = format!("0.0.0.0:{}", config.health_port);
    let health_addr_clone = health_addr.clone();
    let health_server = tokio::spawn(async move {
        use actix_web::{web, App, HttpResponse, HttpServer};

        HttpServer::new(|| {
            App::new()
                .route(
                    "/health",
                    web::get().to(|| async { HttpResponse::Ok().body("OK") }),
                )
                .route(
                    "/ready",
                    web::get().to(|| async { HttpResponse::Ok().body("READY") }),
                )
        })
        .bind(&health_addr_clone)
        .expect("Failed to bind health check HTTP server address")
        .run()
        .await
    });

    tracing::info!("Health check server started on {}", health_addr);

    // Start gRPC server with health reporting
    let grpc_addr = format!("0.0.0.0:{}", config.grpc_port).parse()?;

    let (mut health_reporter, health_service) = tonic_health::server::health_reporter();
    health_reporter
        .set_serving::<AccountSafetyServiceServer<AccountSafetyServiceImpl>>()
        .await;

    let grpc_server = tonic::transport::Server::builder()
        .add_service(health_service)
        .add_service(AccountSafetyServiceServer::new(safety_service))
        .serve(grpc_addr);

    tracing::info!("Account Safety Service is running");
    tracing::info!("   gRPC: {}", grpc_addr);
    tracing::info!("   Health: http://0.0.0.0:{}", config.health_port);

    // Run both servers concurrently
    tokio::select! {
        result = grpc_server => {
            if let Err(e) = result {
                tracing::error!("gRPC server error: {}", e);
            }
        }
        result = health_server => {
            if let Err(e) = result {
                tracing::error!("Health server error: {}", e);
            }
        }
    }

    Ok(())
}
