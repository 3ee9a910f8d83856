use actix_web::{web, App, HttpServer};
use clap::Parser;
use gobana_rs::Connection;
use gobana_server::cli::{exit, ElastuiCli};
use gobana_server::{api, telemetry, tls};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_actix_web::TracingLogger;

#[actix_web::main]
async fn main() -> ExitCode {
    let cli = ElastuiCli::parse();

    let (config, origin) = match cli.load_config() {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("{:#}", e);
            return ExitCode::from(exit::CONFIG);
        }
    };

    let _guard = match telemetry::init_telemetry(config.loglevel, &config.logfile) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Could not initialize logging: {:#}", e);
            return ExitCode::from(exit::CONFIG);
        }
    };
    origin.log();

    let tls_config = match tls::load_server_config(&config.tls_cert, &config.tls_key) {
        Ok(tls_config) => tls_config,
        Err(e) => {
            tracing::error!("TLS setup failed: {:#}", e);
            return ExitCode::from(exit::CONFIG);
        }
    };

    let connection = match Connection::new(&config.connection()) {
        Ok(connection) => connection,
        Err(e) => {
            tracing::error!(error = %e, "Can't create connection");
            return ExitCode::from(exit::CONFIG);
        }
    };

    let bind_addr = match (config.listen.as_str(), tls_config.is_some()) {
        ("", true) => "0.0.0.0:8443".to_string(),
        ("", false) => "0.0.0.0:8080".to_string(),
        (listen, _) => listen.to_string(),
    };

    tracing::info!("elastui starting");
    tracing::info!("  Elasticsearch: {}", connection.base_url());
    tracing::info!("  Static directory: {}", config.static_dir);
    tracing::info!("  TLS: {}", tls_config.is_some());

    let app_state = web::Data::new(api::AppState {
        connection: Arc::new(connection),
    });
    let static_dir = config.static_dir.clone();

    let server = HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .wrap(TracingLogger::default())
            .configure(api::configure)
            .service(api::static_files(&static_dir))
    });

    let server = match tls_config {
        Some(tls_config) => server.bind_rustls_0_23(&bind_addr, tls_config),
        None => server.bind(&bind_addr),
    };
    let server = match server {
        Ok(server) => server,
        Err(e) => {
            tracing::error!(address = %bind_addr, error = %e, "Can't bind");
            return ExitCode::FAILURE;
        }
    };

    tracing::info!("Starting HTTP server on {}", bind_addr);
    if let Err(e) = server.run().await {
        tracing::error!(error = %e, "Server error");
        return ExitCode::FAILURE;
    }

    tracing::info!("elastui stopped");
    ExitCode::SUCCESS
}
